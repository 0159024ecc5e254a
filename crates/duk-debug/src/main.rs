use duk_debug::DebugBridge;
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting duk-debug adapter");
    let mut bridge = DebugBridge::new();
    if let Err(err) = bridge.run_stdio() {
        eprintln!("duk-debug error: {err}");
        std::process::exit(1);
    }
}
