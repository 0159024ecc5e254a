//! Requests in flight against the runtime.
//! - ActiveRequest: the single request allowed to wait on the wire
//! - on_reply: resume a waiting request with its reply
//! - advance_breakpoints: one add-breakpoint per reply, in request order

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{
    Breakpoint, Request, SetBreakpointsResponseBody, Source, VariablesResponseBody,
};
use crate::wire::{Reply, ReplyMode, Ticket};

use super::{DebugBridge, DispatchOutcome};

#[derive(Debug)]
pub(super) struct ActiveRequest {
    pub(super) request: Request<Value>,
    pub(super) ticket: Option<Ticket>,
    pub(super) job: Job,
}

#[derive(Debug)]
pub(super) enum Job {
    /// Waiting for the target to connect and report its first status.
    Attach,
    /// Waiting for the runtime breakpoint list before adding.
    ListBreakpoints {
        source: Source,
        lines: VecDeque<u32>,
    },
    /// Waiting for the current add-breakpoint to be acknowledged.
    AddBreakpoints {
        source: Source,
        current: u32,
        remaining: VecDeque<u32>,
        done: Vec<Breakpoint>,
    },
    StackTrace {
        start_frame: usize,
        levels: Option<usize>,
    },
    Variables,
    Step,
}

impl DebugBridge {
    /// Route a reply for an awaited command to the request waiting on it.
    pub(super) fn on_reply(&mut self, ticket: Ticket, reply: Reply) -> DispatchOutcome {
        let Some(active) = self.active.take() else {
            warn!("reply {ticket:?} arrived with no request waiting");
            return DispatchOutcome::default();
        };
        if active.ticket != Some(ticket) {
            warn!(
                "reply {ticket:?} does not belong to active {} request",
                active.request.command
            );
            self.active = Some(active);
            return DispatchOutcome::default();
        }

        let ActiveRequest { request, job, .. } = active;
        match job {
            Job::ListBreakpoints { source, lines } => {
                let listing = self.debug_output_message(format!(
                    "[duk-debug] runtime breakpoints: {}",
                    Value::Array(reply.args)
                ));
                let mut outcome = self.advance_breakpoints(request, source, lines, Vec::new());
                outcome.events.insert(0, listing);
                outcome
            }
            Job::AddBreakpoints {
                source,
                current,
                remaining,
                mut done,
            } => {
                done.push(Breakpoint::verified(current, Some(source.clone())));
                self.advance_breakpoints(request, source, remaining, done)
            }
            Job::StackTrace { start_frame, levels } => {
                self.complete_stack_trace(&request, &reply.args, start_frame, levels)
            }
            Job::Variables => {
                debug!("locals payload: {:?}", reply.args);
                let log = self.debug_output_message(format!(
                    "[duk-debug] locals: {}",
                    Value::Array(reply.args)
                ));
                DispatchOutcome {
                    responses: vec![self.ok_response(
                        &request,
                        Some(VariablesResponseBody {
                            variables: Vec::new(),
                        }),
                    )],
                    events: vec![log],
                    ..DispatchOutcome::default()
                }
            }
            Job::Step => DispatchOutcome::respond(self.ok_response::<Value>(&request, None)),
            Job::Attach => {
                warn!("unexpected reply while attaching");
                self.active = Some(ActiveRequest {
                    request,
                    ticket: None,
                    job: Job::Attach,
                });
                DispatchOutcome::default()
            }
        }
    }

    /// Send the next add-breakpoint, or answer the request once all are acknowledged.
    ///
    /// `remaining` holds client lines; lines with no runtime equivalent are
    /// reported unverified without touching the wire.
    pub(super) fn advance_breakpoints(
        &mut self,
        request: Request<Value>,
        source: Source,
        mut remaining: VecDeque<u32>,
        mut done: Vec<Breakpoint>,
    ) -> DispatchOutcome {
        while let Some(line) = remaining.pop_front() {
            let Some(runtime_line) = self.to_runtime_line(line) else {
                done.push(Breakpoint::unverified(
                    line,
                    Some(source.clone()),
                    Some("line out of range".to_string()),
                ));
                continue;
            };
            let target = self.target_file.clone();
            let Some(client) = self.client.as_mut() else {
                return DispatchOutcome::respond(self.error_response(&request, "not attached"));
            };
            match client.add_breakpoint(&target, runtime_line, ReplyMode::Awaited) {
                Ok(ticket) => {
                    self.active = Some(ActiveRequest {
                        request,
                        ticket: Some(ticket),
                        job: Job::AddBreakpoints {
                            source,
                            current: line,
                            remaining,
                            done,
                        },
                    });
                    return DispatchOutcome::default();
                }
                Err(err) => return self.wire_send_failed(&request, err),
            }
        }

        let body = SetBreakpointsResponseBody { breakpoints: done };
        DispatchOutcome::respond(self.ok_response(&request, Some(body)))
    }
}
