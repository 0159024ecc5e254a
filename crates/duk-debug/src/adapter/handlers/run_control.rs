//! Continue/step handlers.
//! - handle_continue: resume without waiting on the runtime
//! - handle_next/step_in: stepping commands, answered on the runtime reply

use serde_json::Value;

use crate::protocol::{
    ContinueArguments, ContinueResponseBody, NextArguments, Request, StepInArguments,
};
use crate::wire::{ReplyMode, Ticket, WireClient, WireResult};

use super::super::jobs::{ActiveRequest, Job};
use super::super::util::parse_arguments;
use super::super::{DebugBridge, DispatchOutcome};

impl DebugBridge {
    pub(in crate::adapter) fn handle_continue(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        if parse_arguments::<ContinueArguments>(&request).is_none() {
            return DispatchOutcome::respond(
                self.error_response(&request, "invalid continue args"),
            );
        }
        let Some(client) = self.client.as_mut() else {
            return DispatchOutcome::respond(self.error_response(&request, "not attached"));
        };

        if let Err(err) = client.resume(ReplyMode::Discard) {
            return self.wire_send_failed(&request, err);
        }
        self.variable_handles.clear();
        DispatchOutcome::respond(self.ok_response(
            &request,
            Some(ContinueResponseBody {
                all_threads_continued: Some(true),
            }),
        ))
    }

    pub(in crate::adapter) fn handle_next(&mut self, request: Request<Value>) -> DispatchOutcome {
        if parse_arguments::<NextArguments>(&request).is_none() {
            return DispatchOutcome::respond(self.error_response(&request, "invalid next args"));
        }
        self.start_step(request, WireClient::step_over)
    }

    pub(in crate::adapter) fn handle_step_in(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        if parse_arguments::<StepInArguments>(&request).is_none() {
            return DispatchOutcome::respond(
                self.error_response(&request, "invalid stepIn args"),
            );
        }
        self.start_step(request, WireClient::step_in)
    }

    fn start_step(
        &mut self,
        request: Request<Value>,
        send: fn(&mut WireClient, ReplyMode) -> WireResult<Ticket>,
    ) -> DispatchOutcome {
        let Some(client) = self.client.as_mut() else {
            return DispatchOutcome::respond(self.error_response(&request, "not attached"));
        };
        match send(client, ReplyMode::Awaited) {
            Ok(ticket) => {
                self.variable_handles.clear();
                self.active = Some(ActiveRequest {
                    request,
                    ticket: Some(ticket),
                    job: Job::Step,
                });
                DispatchOutcome::default()
            }
            Err(err) => self.wire_send_failed(&request, err),
        }
    }
}
