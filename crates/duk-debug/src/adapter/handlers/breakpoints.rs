//! Breakpoint-related requests.
//! - handle_set_breakpoints: list runtime breakpoints, then add each line in turn
//! - handle_set_exception_breakpoints: ignore exception breakpoints

use std::collections::VecDeque;

use serde_json::Value;

use crate::protocol::{
    Breakpoint, Request, SetBreakpointsArguments, SetBreakpointsResponseBody,
};
use crate::wire::ReplyMode;

use super::super::jobs::{ActiveRequest, Job};
use super::super::util::parse_arguments;
use super::super::{DebugBridge, DispatchOutcome};

impl DebugBridge {
    /// Existing runtime breakpoints are not reconciled: every requested line is
    /// added again, one command per reply.
    pub(in crate::adapter) fn handle_set_breakpoints(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let Some(args) = parse_arguments::<SetBreakpointsArguments>(&request) else {
            return DispatchOutcome::respond(
                self.error_response(&request, "invalid setBreakpoints args"),
            );
        };

        let lines = args
            .breakpoints
            .as_ref()
            .map(|items| items.iter().map(|item| item.line).collect::<VecDeque<_>>())
            .or_else(|| args.lines.clone().map(VecDeque::from))
            .unwrap_or_default();
        let log = self.debug_output_message(format!(
            "[duk-debug] setBreakpoints: path={} requested={} target={}",
            args.source.path.as_deref().unwrap_or("<none>"),
            lines.len(),
            self.target_file
        ));

        if lines.is_empty() {
            let body = SetBreakpointsResponseBody {
                breakpoints: Vec::new(),
            };
            return DispatchOutcome {
                responses: vec![self.ok_response(&request, Some(body))],
                events: vec![log],
                ..DispatchOutcome::default()
            };
        }

        let Some(client) = self.client.as_mut() else {
            let breakpoints = lines
                .iter()
                .map(|line| {
                    Breakpoint::unverified(
                        *line,
                        Some(args.source.clone()),
                        Some("not attached".to_string()),
                    )
                })
                .collect();
            let body = SetBreakpointsResponseBody { breakpoints };
            return DispatchOutcome {
                responses: vec![self.ok_response(&request, Some(body))],
                events: vec![log],
                ..DispatchOutcome::default()
            };
        };

        match client.list_breakpoints(ReplyMode::Awaited) {
            Ok(ticket) => {
                self.active = Some(ActiveRequest {
                    request,
                    ticket: Some(ticket),
                    job: Job::ListBreakpoints {
                        source: args.source,
                        lines,
                    },
                });
                DispatchOutcome {
                    events: vec![log],
                    ..DispatchOutcome::default()
                }
            }
            Err(err) => {
                let mut outcome = self.wire_send_failed(&request, err);
                outcome.events.insert(0, log);
                outcome
            }
        }
    }

    pub(in crate::adapter) fn handle_set_exception_breakpoints(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        DispatchOutcome {
            responses: vec![self.ok_response::<Value>(&request, None)],
            events: vec![self.debug_output_message("[duk-debug] setExceptionBreakpoints ignored")],
            ..DispatchOutcome::default()
        }
    }
}
