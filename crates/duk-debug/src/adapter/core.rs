//! Bridge core loop + request dispatch.
//! - DebugBridge::new/with_connector
//! - run_stdio/run_with_io: merged DAP + wire event loop
//! - dispatch_request: single in-flight guard and routing
//! - handle_wire_line/handle_wire_closed: runtime traffic
//! - response/event helpers

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufWriter, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{
    Event, MessageType, OutputEventBody, Request, Response, StoppedEventBody, TerminatedEventBody,
};
use crate::wire::{
    spawn_reader, ExecutionState, PrintNotification, ReplyMode, StatusNotification, TcpConnector,
    WireConnector, WireError, WireEvent, WireInbound,
};

use super::jobs::Job;
use super::protocol_io::{read_message, write_message, write_protocol_log};
use super::util::{bypasses_request_guard, env_flag};
use super::{
    AttachFlags, BridgeInput, CoordinateConverter, DebugBridge, DispatchOutcome, Handles,
    SessionPhase, StatusListener, DEFAULT_TARGET_FILE, THREAD_ID,
};

impl Default for DebugBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }

    #[must_use]
    pub fn with_connector(connector: impl WireConnector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            client: None,
            inbound: None,
            phase: SessionPhase::Uninitialized,
            status_listener: StatusListener::Inactive,
            flags: AttachFlags::default(),
            active: None,
            backlog: VecDeque::new(),
            variable_handles: Handles::new(),
            coordinate: CoordinateConverter::new(true, true),
            target_file: DEFAULT_TARGET_FILE.to_string(),
            next_seq: AtomicU32::new(1),
        }
    }

    /// Run the bridge over stdin/stdout until the client disconnects.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        self.run_with_io(io::BufReader::new(io::stdin()), io::stdout())
    }

    /// Run the bridge over an arbitrary DAP stream.
    pub fn run_with_io<R, W>(&mut self, reader: R, writer: W) -> io::Result<()>
    where
        R: BufRead + Send + 'static,
        W: Write,
    {
        let mut writer = BufWriter::new(writer);
        let dap_log_path = std::env::var("DUK_DEBUG_DAP_LOG").ok();
        let mut dap_log = dap_log_path
            .as_deref()
            .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok())
            .map(BufWriter::new);
        let dap_verbose = env_flag("DUK_DEBUG_DAP_VERBOSE");
        if dap_verbose {
            let hint = match dap_log_path.as_deref() {
                Some(path) => format!("[duk-debug] DAP verbose logging enabled; raw log: {path}"),
                None => "[duk-debug] DAP verbose logging enabled (set DUK_DEBUG_DAP_LOG=/path for raw)"
                    .to_string(),
            };
            let event = self.debug_output_message(hint);
            self.write_value(&mut writer, dap_log.as_mut(), &event)?;
        }

        let (tx, rx) = mpsc::channel::<BridgeInput>();
        self.inbound = Some(tx.clone());
        let dap_tx = tx;
        thread::spawn(move || {
            let mut reader = reader;
            loop {
                match read_message(&mut reader) {
                    Ok(Some(payload)) => {
                        if dap_tx.send(BridgeInput::Dap(payload)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("DAP read failed: {err}");
                        break;
                    }
                }
            }
            let _ = dap_tx.send(BridgeInput::DapClosed);
        });

        while let Ok(input) = rx.recv() {
            let outcome = match input {
                BridgeInput::Dap(payload) => {
                    if let Some(logger) = dap_log.as_mut() {
                        let _ = write_protocol_log(logger, "<-", &payload);
                    }
                    if dap_verbose {
                        let event = self.debug_output_message(format!(
                            "[duk-debug][dap<-] len={} payload={}",
                            payload.len(),
                            payload
                        ));
                        self.write_value(&mut writer, dap_log.as_mut(), &event)?;
                    }
                    match serde_json::from_str::<Request<Value>>(&payload) {
                        Ok(request) => self.dispatch_request(request),
                        Err(err) => {
                            warn!("invalid DAP message: {err}");
                            continue;
                        }
                    }
                }
                BridgeInput::Wire(WireInbound::Frame(line)) => self.handle_wire_line(&line),
                BridgeInput::Wire(WireInbound::Closed) => self.handle_wire_closed(),
                BridgeInput::DapClosed => {
                    info!("DAP input closed");
                    break;
                }
            };

            let should_exit = outcome.should_exit;
            for message in outcome.into_messages() {
                if dap_verbose {
                    let event = self.debug_output_message(format!("[duk-debug][dap->] {message}"));
                    self.write_value(&mut writer, dap_log.as_mut(), &message)?;
                    self.write_value(&mut writer, dap_log.as_mut(), &event)?;
                } else {
                    self.write_value(&mut writer, dap_log.as_mut(), &message)?;
                }
            }
            if should_exit {
                break;
            }
        }

        self.inbound = None;
        self.client = None;
        Ok(())
    }

    fn write_value<W: Write>(
        &self,
        writer: &mut W,
        dap_log: Option<&mut BufWriter<std::fs::File>>,
        message: &Value,
    ) -> io::Result<()> {
        let serialized = serde_json::to_string(message)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        if let Some(logger) = dap_log {
            let _ = write_protocol_log(logger, "->", &serialized);
        }
        write_message(writer, &serialized)
    }

    pub(super) fn dispatch_request(&mut self, request: Request<Value>) -> DispatchOutcome {
        if request.message_type != MessageType::Request {
            return DispatchOutcome::default();
        }
        if self.active.is_some() && !bypasses_request_guard(&request.command) {
            debug!(
                "deferring {} (seq {}) behind active request",
                request.command, request.seq
            );
            self.backlog.push_back(request);
            return DispatchOutcome::default();
        }

        match request.command.as_str() {
            "initialize" => self.handle_initialize(request),
            "launch" => self.handle_launch(request),
            "attach" => self.handle_attach(request),
            "configurationDone" => self.handle_configuration_done(request),
            "disconnect" => self.handle_disconnect(request),
            "terminate" => self.handle_terminate(request),
            "setBreakpoints" => self.handle_set_breakpoints(request),
            "setExceptionBreakpoints" => self.handle_set_exception_breakpoints(request),
            "threads" => self.handle_threads(request),
            "stackTrace" => self.handle_stack_trace(request),
            "scopes" => self.handle_scopes(request),
            "variables" => self.handle_variables(request),
            "continue" => self.handle_continue(request),
            "next" => self.handle_next(request),
            "stepIn" => self.handle_step_in(request),
            "evaluate" => self.handle_evaluate(request),
            _ => DispatchOutcome::respond(self.error_response(&request, "unsupported command")),
        }
    }

    /// Dispatch deferred requests until one of them has to wait on the wire.
    fn drain_backlog(&mut self, outcome: &mut DispatchOutcome) {
        while self.active.is_none() {
            let Some(request) = self.backlog.pop_front() else {
                break;
            };
            let next = self.dispatch_request(request);
            outcome.merge(next);
            if outcome.should_exit {
                break;
            }
        }
    }

    /// Process one complete frame from the runtime.
    pub(super) fn handle_wire_line(&mut self, line: &str) -> DispatchOutcome {
        let Some(client) = self.client.as_mut() else {
            debug!("dropping wire frame with no session: {line}");
            return DispatchOutcome::default();
        };
        let mut outcome = match client.ingest(line) {
            Ok(WireEvent::Reply {
                ticket,
                mode: ReplyMode::Awaited,
                reply,
                ..
            }) => self.on_reply(ticket, reply),
            Ok(WireEvent::Reply {
                opcode,
                mode: ReplyMode::Discard,
                reply,
                ..
            }) => {
                debug!("discarded reply to {opcode:#04x}: {:?}", reply.args);
                DispatchOutcome::default()
            }
            Ok(WireEvent::TargetConnected) => self.on_target_connected(),
            Ok(WireEvent::Status(status)) => self.on_status(status),
            Ok(WireEvent::Print(print)) => self.on_print(print),
            Ok(WireEvent::Ignored { command }) => {
                debug!("ignoring notification {command:#04x}");
                DispatchOutcome::default()
            }
            Err(err) => {
                warn!("wire protocol error: {err}");
                DispatchOutcome {
                    events: vec![
                        self.debug_output_message(format!("[duk-debug] protocol error: {err}"))
                    ],
                    ..DispatchOutcome::default()
                }
            }
        };
        self.drain_backlog(&mut outcome);
        outcome
    }

    /// The runtime connection is gone: fail whatever waits on it and end the session.
    pub(super) fn handle_wire_closed(&mut self) -> DispatchOutcome {
        let Some(mut client) = self.client.take() else {
            return DispatchOutcome::default();
        };
        let abandoned = client.abandon_pending();
        info!(
            "runtime {} disconnected; {} command(s) abandoned",
            client.peer(),
            abandoned.len()
        );
        drop(client);

        let mut outcome = DispatchOutcome::default();
        if let Some(response) = self.fail_active(&WireError::Disconnected.to_string()) {
            outcome.responses.push(response);
        }
        self.end_session();
        outcome
            .events
            .push(self.debug_output_message("[duk-debug] runtime disconnected"));
        outcome.events.push(self.terminated_event(None));
        self.drain_backlog(&mut outcome);
        outcome
    }

    /// Answer a request whose wire command could not be written.
    pub(super) fn wire_send_failed(
        &mut self,
        request: &Request<Value>,
        err: WireError,
    ) -> DispatchOutcome {
        warn!("{} failed on the wire: {err}", request.command);
        let mut outcome = DispatchOutcome::respond(self.error_response(request, &err.to_string()));
        if err.is_fatal() {
            outcome.merge(self.handle_wire_closed());
        }
        outcome
    }

    pub(super) fn fail_active(&mut self, message: &str) -> Option<Value> {
        let active = self.active.take()?;
        Some(self.error_response(&active.request, message))
    }

    pub(super) fn end_session(&mut self) {
        self.client = None;
        self.phase = SessionPhase::Terminated;
        self.status_listener = StatusListener::Inactive;
        self.flags = AttachFlags::default();
        self.variable_handles.clear();
    }

    pub(super) fn start_reader(&self, reader: Box<dyn BufRead + Send>) {
        let Some(tx) = self.inbound.clone() else {
            return;
        };
        spawn_reader(reader, move |inbound| {
            tx.send(BridgeInput::Wire(inbound)).is_ok()
        });
    }

    fn on_target_connected(&mut self) -> DispatchOutcome {
        if self.phase != SessionPhase::Attaching {
            debug!("target connected again in phase {:?}", self.phase);
            return DispatchOutcome::default();
        }
        self.phase = SessionPhase::AwaitingFirstStatus;
        self.status_listener = StatusListener::FirstStatus;
        DispatchOutcome {
            events: vec![self.debug_output_message("[duk-debug] target connected")],
            ..DispatchOutcome::default()
        }
    }

    fn on_status(&mut self, status: StatusNotification) -> DispatchOutcome {
        debug!(
            "status {:?} at {}:{} ({}) pc={}",
            status.state, status.file_name, status.line, status.function_name, status.pc
        );
        if matches!(self.phase, SessionPhase::Initialized(_)) {
            self.phase = SessionPhase::Initialized(status.state);
        }
        match self.status_listener {
            StatusListener::FirstStatus => self.on_first_status(&status),
            StatusListener::SteadyState => match status.state {
                ExecutionState::Paused => {
                    // References handed out for the previous stop are stale now.
                    self.variable_handles.clear();
                    DispatchOutcome {
                        events: vec![self.stopped_event("step")],
                        ..DispatchOutcome::default()
                    }
                }
                ExecutionState::Running => DispatchOutcome::default(),
            },
            StatusListener::Inactive => DispatchOutcome::default(),
        }
    }

    fn on_first_status(&mut self, status: &StatusNotification) -> DispatchOutcome {
        self.status_listener = StatusListener::Inactive;
        self.phase = SessionPhase::Initialized(status.state);
        match status.state {
            ExecutionState::Paused => self.flags.stop_on_entry = true,
            ExecutionState::Running => self.flags.need_continue_on_config_done = true,
        }

        let mut outcome = DispatchOutcome {
            preamble: vec![self.event("initialized", Option::<Value>::None)],
            ..DispatchOutcome::default()
        };
        match self.active.take() {
            Some(active) if matches!(active.job, Job::Attach) => {
                outcome
                    .responses
                    .push(self.ok_response::<Value>(&active.request, None));
            }
            other => {
                warn!("first status arrived without a pending attach");
                self.active = other;
            }
        }
        outcome.events.push(self.debug_output_message(format!(
            "[duk-debug] attached: state={:?} stopOnEntry={}",
            status.state, self.flags.stop_on_entry
        )));
        if self.flags.stop_on_entry {
            outcome.events.push(self.stopped_event("entry"));
        }
        outcome
    }

    fn on_print(&mut self, print: PrintNotification) -> DispatchOutcome {
        let output = if print.message.ends_with('\n') {
            print.message
        } else {
            format!("{}\n", print.message)
        };
        DispatchOutcome {
            events: vec![self.output_event(output, "stdout")],
            ..DispatchOutcome::default()
        }
    }

    fn next_seq(&self) -> u32 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn ok_response<T>(&self, request: &Request<Value>, body: Option<T>) -> Value
    where
        T: Serialize,
    {
        let body = body
            .map(|payload| serde_json::to_value(payload))
            .transpose()
            .unwrap_or(None);
        let response = Response {
            seq: self.next_seq(),
            message_type: MessageType::Response,
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body,
        };
        serde_json::to_value(response).unwrap_or(Value::Null)
    }

    pub(super) fn error_response(&self, request: &Request<Value>, message: &str) -> Value {
        let response: Response<Value> = Response {
            seq: self.next_seq(),
            message_type: MessageType::Response,
            request_seq: request.seq,
            success: false,
            command: request.command.clone(),
            message: Some(message.to_string()),
            body: None,
        };
        serde_json::to_value(response).unwrap_or(Value::Null)
    }

    pub(super) fn event<T>(&self, name: &str, body: Option<T>) -> Value
    where
        T: Serialize,
    {
        let body = body
            .map(|payload| serde_json::to_value(payload))
            .transpose()
            .unwrap_or(None);
        let event = Event {
            seq: self.next_seq(),
            message_type: MessageType::Event,
            event: name.to_string(),
            body,
        };
        serde_json::to_value(event).unwrap_or(Value::Null)
    }

    fn output_event(&self, output: String, category: &str) -> Value {
        let body = OutputEventBody {
            output,
            category: Some(category.to_string()),
            source: None,
            line: None,
            column: None,
        };
        self.event("output", Some(body))
    }

    pub(super) fn debug_output_message(&self, message: impl Into<String>) -> Value {
        self.output_event(format!("{}\n", message.into()), "console")
    }

    pub(super) fn stopped_event(&self, reason: &str) -> Value {
        self.event(
            "stopped",
            Some(StoppedEventBody {
                reason: reason.to_string(),
                thread_id: Some(THREAD_ID),
                all_threads_stopped: Some(true),
            }),
        )
    }

    pub(super) fn terminated_event(&self, restart: Option<bool>) -> Value {
        self.event("terminated", Some(TerminatedEventBody { restart }))
    }

    pub(super) fn to_client_line(&self, line: u32) -> u32 {
        self.coordinate.to_client_line(line)
    }

    pub(super) fn to_runtime_line(&self, line: u32) -> Option<u32> {
        self.coordinate.to_runtime_line(line)
    }

    pub(super) fn default_column(&self) -> u32 {
        self.coordinate.default_column()
    }
}
