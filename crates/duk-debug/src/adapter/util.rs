//! Small bridge utilities.
//! - bypasses_request_guard: requests served while another waits on the wire
//! - env_flag: parse boolean env vars
//! - parse_arguments: typed request arguments

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::Request;

/// Requests that must not queue behind a request blocked on the runtime.
pub(super) fn bypasses_request_guard(command: &str) -> bool {
    matches!(command, "disconnect" | "terminate")
}

pub(super) fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_ascii_lowercase();
            matches!(value.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => false,
    }
}

pub(super) fn parse_arguments<T: DeserializeOwned>(request: &Request<Value>) -> Option<T> {
    request
        .arguments
        .clone()
        .and_then(|value| serde_json::from_value::<T>(value).ok())
}
