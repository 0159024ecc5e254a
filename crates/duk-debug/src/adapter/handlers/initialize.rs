//! Initialize/attach/configuration handlers.
//! - handle_initialize: client capabilities + line conventions
//! - handle_launch: rejected, the bridge only attaches
//! - handle_attach: connect and wait for the first runtime status
//! - handle_configuration_done: release a running target

use serde_json::Value;
use tracing::info;

use crate::protocol::{
    AttachArguments, Capabilities, InitializeArguments, InitializeResponseBody, Request,
};
use crate::wire::{ReplyMode, WireClient};

use super::super::jobs::{ActiveRequest, Job};
use super::super::util::parse_arguments;
use super::super::{
    CoordinateConverter, DebugBridge, DispatchOutcome, SessionPhase, StatusListener,
    DEFAULT_TARGET_FILE,
};

impl DebugBridge {
    pub(in crate::adapter) fn handle_initialize(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = parse_arguments::<InitializeArguments>(&request).unwrap_or_default();

        self.coordinate = CoordinateConverter::new(
            args.lines_start_at1.unwrap_or(true),
            args.columns_start_at1.unwrap_or(true),
        );

        let capabilities = Capabilities {
            supports_configuration_done_request: Some(true),
            supports_conditional_breakpoints: Some(false),
            supports_function_breakpoints: Some(false),
            supports_evaluate_for_hovers: Some(false),
            supports_set_variable: Some(false),
            supports_pause_request: Some(false),
            supports_terminate_request: Some(true),
        };

        let response = self.ok_response(&request, Some(InitializeResponseBody { capabilities }));
        let debug_event = self.debug_output_message(format!(
            "[duk-debug] initialize: lines_start_at1={} columns_start_at1={}",
            self.coordinate.lines_start_at1(),
            self.coordinate.columns_start_at1()
        ));

        DispatchOutcome {
            responses: vec![response],
            events: vec![debug_event],
            ..DispatchOutcome::default()
        }
    }

    pub(in crate::adapter) fn handle_launch(&mut self, request: Request<Value>) -> DispatchOutcome {
        DispatchOutcome::respond(
            self.error_response(&request, "launch is not supported; use attach"),
        )
    }

    pub(in crate::adapter) fn handle_attach(&mut self, request: Request<Value>) -> DispatchOutcome {
        if self.client.is_some() {
            return DispatchOutcome::respond(self.error_response(&request, "already attached"));
        }
        let Some(args) = parse_arguments::<AttachArguments>(&request) else {
            return DispatchOutcome::respond(self.error_response(&request, "invalid attach args"));
        };

        match WireClient::connect(self.connector.as_mut(), &args.host, args.port) {
            Ok((client, reader)) => {
                info!("attached to runtime at {}", client.peer());
                let connected = self.debug_output_message(format!(
                    "[duk-debug] attach: connected to {}",
                    client.peer()
                ));
                self.client = Some(client);
                self.start_reader(reader);
                self.flags.attach_mode = true;
                self.phase = SessionPhase::Attaching;
                self.status_listener = StatusListener::Inactive;
                self.target_file = args
                    .target_file
                    .unwrap_or_else(|| DEFAULT_TARGET_FILE.to_string());
                self.active = Some(ActiveRequest {
                    request,
                    ticket: None,
                    job: Job::Attach,
                });
                DispatchOutcome {
                    events: vec![connected],
                    ..DispatchOutcome::default()
                }
            }
            Err(err) => {
                let failure =
                    self.debug_output_message(format!("[duk-debug] attach failed: {err}"));
                DispatchOutcome {
                    responses: vec![self.error_response(&request, &err.to_string())],
                    events: vec![failure],
                    ..DispatchOutcome::default()
                }
            }
        }
    }

    pub(in crate::adapter) fn handle_configuration_done(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let mut events =
            vec![self.debug_output_message("[duk-debug] configurationDone received")];

        if self.flags.need_continue_on_config_done {
            self.flags.need_continue_on_config_done = false;
            if let Some(client) = self.client.as_mut() {
                if let Err(err) = client.resume(ReplyMode::Discard) {
                    return self.wire_send_failed(&request, err);
                }
                events.push(self.debug_output_message("[duk-debug] resuming target"));
            }
        }
        if matches!(self.phase, SessionPhase::Initialized(_)) {
            self.status_listener = StatusListener::SteadyState;
        }

        DispatchOutcome {
            responses: vec![self.ok_response::<Value>(&request, None)],
            events,
            ..DispatchOutcome::default()
        }
    }
}
