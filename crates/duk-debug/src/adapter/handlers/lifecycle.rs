//! Session teardown handlers.
//! - handle_disconnect: drop the runtime connection and exit
//! - handle_terminate: same teardown, driven by the terminate request

use serde_json::Value;
use tracing::info;

use crate::protocol::{DisconnectArguments, Request, TerminateArguments};

use super::super::util::parse_arguments;
use super::super::{DebugBridge, DispatchOutcome};

impl DebugBridge {
    pub(in crate::adapter) fn handle_disconnect(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let restart = parse_arguments::<DisconnectArguments>(&request)
            .and_then(|args| args.restart);
        self.tear_down(request, restart)
    }

    pub(in crate::adapter) fn handle_terminate(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let restart =
            parse_arguments::<TerminateArguments>(&request).and_then(|args| args.restart);
        self.tear_down(request, restart)
    }

    /// Fail everything still waiting, close the runtime connection and exit.
    fn tear_down(&mut self, request: Request<Value>, restart: Option<bool>) -> DispatchOutcome {
        let mut responses = Vec::new();
        if let Some(response) = self.fail_active("session terminated") {
            responses.push(response);
        }
        while let Some(deferred) = self.backlog.pop_front() {
            responses.push(self.error_response(&deferred, "session terminated"));
        }

        let attached = self.flags.attach_mode;
        if let Some(client) = self.client.as_mut() {
            let abandoned = client.abandon_pending();
            info!(
                "{} from runtime {}; {} command(s) abandoned",
                request.command,
                client.peer(),
                abandoned.len()
            );
        }
        self.end_session();

        responses.push(self.ok_response::<Value>(&request, None));
        DispatchOutcome {
            responses,
            events: vec![
                self.debug_output_message(format!(
                    "[duk-debug] {}: attached={attached}",
                    request.command
                )),
                self.terminated_event(restart),
            ],
            should_exit: true,
            ..DispatchOutcome::default()
        }
    }
}
