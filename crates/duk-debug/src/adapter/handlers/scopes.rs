//! Scope and variable handlers.
//! - handle_scopes: one "Locals" scope per frame
//! - handle_variables: fetch runtime locals for a scope handle

use serde_json::Value;
use tracing::debug;

use crate::protocol::{Request, Scope, ScopesArguments, ScopesResponseBody, VariablesArguments};
use crate::wire::{ReplyMode, CURRENT_FRAME};

use super::super::jobs::{ActiveRequest, Job};
use super::super::util::parse_arguments;
use super::super::{DebugBridge, DispatchOutcome, VariableHandle};

impl DebugBridge {
    pub(in crate::adapter) fn handle_scopes(&mut self, request: Request<Value>) -> DispatchOutcome {
        let Some(args) = parse_arguments::<ScopesArguments>(&request) else {
            return DispatchOutcome::respond(self.error_response(&request, "invalid scopes args"));
        };

        let reference = self.variable_handles.create(VariableHandle::Locals {
            frame_id: args.frame_id,
        });
        let body = ScopesResponseBody {
            scopes: vec![Scope {
                name: "Locals".to_string(),
                variables_reference: reference,
                expensive: false,
                source: None,
                line: None,
                column: None,
                end_line: None,
                end_column: None,
            }],
        };
        DispatchOutcome::respond(self.ok_response(&request, Some(body)))
    }

    pub(in crate::adapter) fn handle_variables(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let Some(args) = parse_arguments::<VariablesArguments>(&request) else {
            return DispatchOutcome::respond(
                self.error_response(&request, "invalid variables args"),
            );
        };
        let Some(VariableHandle::Locals { frame_id }) =
            self.variable_handles.get(args.variables_reference).copied()
        else {
            return DispatchOutcome::respond(
                self.error_response(&request, "unknown variables reference"),
            );
        };
        let Some(client) = self.client.as_mut() else {
            return DispatchOutcome::respond(self.error_response(&request, "not attached"));
        };

        // Locals are always read from the innermost frame.
        debug!("variables for frame {frame_id} (reference {})", args.variables_reference);
        match client.get_locals(CURRENT_FRAME, ReplyMode::Awaited) {
            Ok(ticket) => {
                self.active = Some(ActiveRequest {
                    request,
                    ticket: Some(ticket),
                    job: Job::Variables,
                });
                DispatchOutcome::default()
            }
            Err(err) => self.wire_send_failed(&request, err),
        }
    }
}
