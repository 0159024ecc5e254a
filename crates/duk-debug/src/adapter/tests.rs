//! Bridge unit tests.
//! - stdio framing roundtrips
//! - attach handshake and configuration
//! - sequential breakpoint sync, stack traces, locals
//! - request guard, run control, teardown

use std::io::{self, BufReader, Cursor, Write};
use std::sync::{Arc, Mutex};

use serde_json::json;

use super::protocol_io::{read_message, write_message};
use super::*;
use crate::protocol::{
    ContinueResponseBody, EvaluateResponseBody, Event, MessageType, OutputEventBody, Response,
    ScopesResponseBody, SetBreakpointsResponseBody, StackTraceResponseBody, StoppedEventBody,
    ThreadsResponseBody, VariablesResponseBody,
};
use crate::wire::{Command, WireConnection, WireConnector, WireError, WireResult, CURRENT_FRAME};

const TARGET_CONNECTED: &str = r#"{"notify":"_TargetConnected"}"#;

/// Captures everything the bridge writes to the runtime.
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn commands(&self) -> Vec<Command> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| Command::decode(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MockConnector {
    sent: SharedBuffer,
    refuse: bool,
}

impl WireConnector for MockConnector {
    fn connect(&mut self, host: &str, port: u16) -> WireResult<WireConnection> {
        let peer = format!("{host}:{port}");
        if self.refuse {
            return Err(WireError::Connect {
                addr: peer,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        Ok(WireConnection {
            peer,
            writer: Box::new(self.sent.clone()),
            reader: Box::new(io::empty()),
        })
    }
}

fn bridge() -> (DebugBridge, SharedBuffer) {
    let sent = SharedBuffer::default();
    let bridge = DebugBridge::with_connector(MockConnector {
        sent: sent.clone(),
        refuse: false,
    });
    (bridge, sent)
}

fn request(seq: u32, command: &str, arguments: Option<serde_json::Value>) -> Request<Value> {
    Request {
        seq,
        message_type: MessageType::Request,
        command: command.to_string(),
        arguments,
    }
}

fn status(run_flag: u8) -> String {
    json!({
        "notify": true,
        "command": 1,
        "args": [run_flag, "main.js", "global", 3, 17],
    })
    .to_string()
}

fn reply(args: serde_json::Value) -> String {
    json!({ "reply": true, "args": args }).to_string()
}

fn all_messages(outcome: DispatchOutcome) -> Vec<Value> {
    outcome.into_messages().collect()
}

fn events_named<'a>(messages: &'a [Value], name: &str) -> Vec<&'a Value> {
    messages
        .iter()
        .filter(|message| message["type"] == "event" && message["event"] == name)
        .collect()
}

fn response<T: serde::de::DeserializeOwned>(message: &Value) -> Response<T> {
    serde_json::from_value(message.clone()).unwrap()
}

/// Drive initialize + attach up to and including the first status.
fn attach(bridge: &mut DebugBridge, run_flag: u8) -> Vec<Value> {
    let outcome = bridge.dispatch_request(request(
        1,
        "initialize",
        Some(json!({ "adapterID": "duk", "linesStartAt1": true, "columnsStartAt1": true })),
    ));
    assert_eq!(outcome.responses.len(), 1);

    let outcome = bridge.dispatch_request(request(
        2,
        "attach",
        Some(json!({ "host": "127.0.0.1", "port": 9091 })),
    ));
    assert!(outcome.responses.is_empty(), "attach answers on first status");

    let outcome = bridge.handle_wire_line(TARGET_CONNECTED);
    assert!(outcome.responses.is_empty());

    all_messages(bridge.handle_wire_line(&status(run_flag)))
}

fn configuration_done(bridge: &mut DebugBridge) {
    let outcome = bridge.dispatch_request(request(3, "configurationDone", None));
    let done: Response<Value> = response(&outcome.responses[0]);
    assert!(done.success);
}

#[test]
fn stdio_roundtrip() {
    let payload = r#"{"seq":1,"type":"request","command":"initialize"}"#;
    let mut buffer = Vec::new();
    write_message(&mut buffer, payload).unwrap();

    let mut reader = BufReader::new(&buffer[..]);
    let read = read_message(&mut reader).unwrap().unwrap();
    assert_eq!(read, payload);
    assert!(read_message(&mut reader).unwrap().is_none());
}

#[test]
fn read_message_requires_content_length() {
    let mut reader = BufReader::new(&b"X-Other: 3\r\n\r\n{}"[..]);
    let err = read_message(&mut reader).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn paused_first_status_stops_on_entry_without_resuming() {
    let (mut bridge, sent) = bridge();
    let messages = attach(&mut bridge, 1);

    assert_eq!(messages[0]["event"], "initialized");
    let attach: Response<Value> = response(&messages[1]);
    assert_eq!(attach.command, "attach");
    assert!(attach.success);
    assert_eq!(attach.request_seq, 2);

    let stopped = events_named(&messages, "stopped");
    assert_eq!(stopped.len(), 1);
    let stopped: Event<StoppedEventBody> = serde_json::from_value(stopped[0].clone()).unwrap();
    let body = stopped.body.unwrap();
    assert_eq!(body.reason, "entry");
    assert_eq!(body.thread_id, Some(THREAD_ID));

    configuration_done(&mut bridge);
    assert!(sent.commands().is_empty(), "paused target must not be resumed");
}

#[test]
fn running_first_status_resumes_on_configuration_done() {
    let (mut bridge, sent) = bridge();
    let messages = attach(&mut bridge, 0);
    assert_eq!(messages[0]["event"], "initialized");
    assert!(events_named(&messages, "stopped").is_empty());
    assert!(sent.commands().is_empty());

    configuration_done(&mut bridge);
    assert_eq!(sent.commands(), vec![Command::resume()]);

    // The resume acknowledgement is consumed without answering anything.
    let outcome = bridge.handle_wire_line(&reply(json!([])));
    assert!(outcome.responses.is_empty());

    let messages = all_messages(bridge.handle_wire_line(&status(1)));
    let stopped = events_named(&messages, "stopped");
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0]["body"]["reason"], "step");
}

#[test]
fn status_before_configuration_done_is_not_surfaced() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);
    let outcome = bridge.handle_wire_line(&status(1));
    assert!(outcome.events.is_empty());
}

#[test]
fn target_connected_before_attach_is_ignored() {
    let (mut bridge, _sent) = bridge();
    let outcome = bridge.handle_wire_line(TARGET_CONNECTED);
    assert!(outcome.responses.is_empty());
    assert!(outcome.events.is_empty());
}

#[test]
fn stack_trace_rejects_unknown_thread_without_wire_traffic() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    configuration_done(&mut bridge);

    let outcome = bridge.dispatch_request(request(
        4,
        "stackTrace",
        Some(json!({ "threadId": 2 })),
    ));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert!(!failed.success);
    assert_eq!(failed.message.as_deref(), Some("unknown thread id 2"));
    assert!(sent.commands().is_empty());
    assert!(bridge.active.is_none());
}

#[test]
fn set_breakpoints_adds_each_line_after_the_previous_reply() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    configuration_done(&mut bridge);

    let outcome = bridge.dispatch_request(request(
        4,
        "setBreakpoints",
        Some(json!({
            "source": { "path": "/work/app/main.js" },
            "breakpoints": [{ "line": 5 }, { "line": 9 }],
        })),
    ));
    assert!(outcome.responses.is_empty());
    assert_eq!(sent.commands(), vec![Command::list_breakpoints()]);

    let outcome = bridge.handle_wire_line(&reply(json!([])));
    assert!(outcome.responses.is_empty());
    assert_eq!(
        sent.commands(),
        vec![
            Command::list_breakpoints(),
            Command::add_breakpoint(DEFAULT_TARGET_FILE, 5),
        ]
    );

    // A status between replies must not be taken for the add acknowledgement.
    let messages = all_messages(bridge.handle_wire_line(&status(1)));
    assert_eq!(events_named(&messages, "stopped").len(), 1);
    assert_eq!(sent.commands().len(), 2);

    let outcome = bridge.handle_wire_line(&reply(json!([])));
    assert!(outcome.responses.is_empty());
    assert_eq!(
        sent.commands()[2],
        Command::add_breakpoint(DEFAULT_TARGET_FILE, 9)
    );

    let outcome = bridge.handle_wire_line(&reply(json!([])));
    let done: Response<SetBreakpointsResponseBody> = response(&outcome.responses[0]);
    assert!(done.success);
    let breakpoints = done.body.unwrap().breakpoints;
    assert_eq!(
        breakpoints
            .iter()
            .map(|bp| (bp.line, bp.verified))
            .collect::<Vec<_>>(),
        vec![(Some(5), true), (Some(9), true)]
    );
    assert_eq!(sent.commands().len(), 3);
    assert!(bridge.active.is_none());
}

#[test]
fn set_breakpoints_uses_attach_target_file() {
    let (mut bridge, sent) = bridge();
    bridge.dispatch_request(request(1, "initialize", Some(json!({}))));
    bridge.dispatch_request(request(
        2,
        "attach",
        Some(json!({ "port": 9091, "targetFile": "lib/app.js" })),
    ));
    bridge.handle_wire_line(TARGET_CONNECTED);
    bridge.handle_wire_line(&status(1));

    bridge.dispatch_request(request(
        3,
        "setBreakpoints",
        Some(json!({ "source": { "path": "app.js" }, "lines": [12] })),
    ));
    bridge.handle_wire_line(&reply(json!([])));
    assert_eq!(
        sent.commands()[1],
        Command::add_breakpoint("lib/app.js", 12)
    );
}

#[test]
fn set_breakpoints_with_no_lines_sends_nothing() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);

    let outcome = bridge.dispatch_request(request(
        4,
        "setBreakpoints",
        Some(json!({ "source": { "path": "main.js" }, "breakpoints": [] })),
    ));
    let done: Response<SetBreakpointsResponseBody> = response(&outcome.responses[0]);
    assert!(done.success);
    assert!(done.body.unwrap().breakpoints.is_empty());
    assert!(sent.commands().is_empty());
}

#[test]
fn set_breakpoints_before_attach_reports_unverified() {
    let (mut bridge, sent) = bridge();
    let outcome = bridge.dispatch_request(request(
        1,
        "setBreakpoints",
        Some(json!({ "source": { "path": "main.js" }, "breakpoints": [{ "line": 4 }] })),
    ));
    let done: Response<SetBreakpointsResponseBody> = response(&outcome.responses[0]);
    let breakpoint = &done.body.unwrap().breakpoints[0];
    assert!(!breakpoint.verified);
    assert_eq!(breakpoint.message.as_deref(), Some("not attached"));
    assert!(sent.commands().is_empty());
}

#[test]
fn stack_trace_maps_callstack_records() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    configuration_done(&mut bridge);

    let outcome = bridge.dispatch_request(request(
        4,
        "stackTrace",
        Some(json!({ "threadId": THREAD_ID })),
    ));
    assert!(outcome.responses.is_empty());
    assert_eq!(sent.commands(), vec![Command::get_callstack()]);

    let outcome = bridge.handle_wire_line(&reply(json!([
        "/srv/app/main.js", "inner", 12, 40,
        "/srv/app/main.js", "global", 30, 7,
    ])));
    let trace: Response<StackTraceResponseBody> = response(&outcome.responses[0]);
    let body = trace.body.unwrap();
    assert_eq!(body.total_frames, Some(2));
    assert_eq!(body.stack_frames.len(), 2);

    let top = &body.stack_frames[0];
    assert_eq!(top.id, 0);
    assert_eq!(top.name, "inner");
    assert_eq!(top.line, 12);
    assert_eq!(top.column, 1);
    let source = top.source.as_ref().unwrap();
    assert_eq!(source.name.as_deref(), Some("main.js"));
    assert_eq!(source.path.as_deref(), Some("/srv/app/main.js"));
    assert_eq!(body.stack_frames[1].id, 1);
    assert_eq!(body.stack_frames[1].name, "global");
}

#[test]
fn stack_trace_drops_trailing_partial_record() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);

    bridge.dispatch_request(request(4, "stackTrace", Some(json!({ "threadId": 1 }))));
    let outcome = bridge.handle_wire_line(&reply(json!([
        "a.js", "f", 1, 0,
        "a.js", "g", 2, 0,
        "a.js", "h",
    ])));
    let trace: Response<StackTraceResponseBody> = response(&outcome.responses[0]);
    let frames = trace.body.unwrap().stack_frames;
    assert_eq!(
        frames.iter().map(|frame| frame.name.as_str()).collect::<Vec<_>>(),
        vec!["f", "g"]
    );
}

#[test]
fn stack_trace_slices_requested_window() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);

    bridge.dispatch_request(request(
        4,
        "stackTrace",
        Some(json!({ "threadId": 1, "startFrame": 1, "levels": 1 })),
    ));
    let outcome = bridge.handle_wire_line(&reply(json!([
        "a.js", "f", 1, 0,
        "a.js", "g", 2, 0,
        "a.js", "h", 3, 0,
    ])));
    let trace: Response<StackTraceResponseBody> = response(&outcome.responses[0]);
    let body = trace.body.unwrap();
    assert_eq!(body.total_frames, Some(3));
    assert_eq!(body.stack_frames.len(), 1);
    assert_eq!(body.stack_frames[0].id, 1);
    assert_eq!(body.stack_frames[0].name, "g");
}

#[test]
fn zero_based_client_lines_are_converted() {
    let (mut bridge, sent) = bridge();
    bridge.dispatch_request(request(
        1,
        "initialize",
        Some(json!({ "linesStartAt1": false, "columnsStartAt1": false })),
    ));
    bridge.dispatch_request(request(2, "attach", Some(json!({ "port": 9091 }))));
    bridge.handle_wire_line(TARGET_CONNECTED);
    bridge.handle_wire_line(&status(1));

    bridge.dispatch_request(request(
        3,
        "setBreakpoints",
        Some(json!({ "source": { "path": "main.js" }, "lines": [4] })),
    ));
    bridge.handle_wire_line(&reply(json!([])));
    assert_eq!(sent.commands()[1], Command::add_breakpoint(DEFAULT_TARGET_FILE, 5));
    let outcome = bridge.handle_wire_line(&reply(json!([])));
    let done: Response<SetBreakpointsResponseBody> = response(&outcome.responses[0]);
    assert_eq!(done.body.unwrap().breakpoints[0].line, Some(4));

    bridge.dispatch_request(request(4, "stackTrace", Some(json!({ "threadId": 1 }))));
    let outcome = bridge.handle_wire_line(&reply(json!(["main.js", "global", 5, 0])));
    let trace: Response<StackTraceResponseBody> = response(&outcome.responses[0]);
    let frame = &trace.body.unwrap().stack_frames[0];
    assert_eq!(frame.line, 4);
    assert_eq!(frame.column, 0);
}

#[test]
fn scopes_and_variables_fetch_locals() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);

    let outcome = bridge.dispatch_request(request(4, "scopes", Some(json!({ "frameId": 0 }))));
    let scopes: Response<ScopesResponseBody> = response(&outcome.responses[0]);
    let scopes = scopes.body.unwrap().scopes;
    assert_eq!(scopes.len(), 1);
    assert_eq!(scopes[0].name, "Locals");
    assert!(!scopes[0].expensive);
    assert!(sent.commands().is_empty());

    let reference = scopes[0].variables_reference;
    let outcome = bridge.dispatch_request(request(
        5,
        "variables",
        Some(json!({ "variablesReference": reference })),
    ));
    assert!(outcome.responses.is_empty());
    assert_eq!(sent.commands(), vec![Command::get_locals(CURRENT_FRAME)]);

    let outcome = bridge.handle_wire_line(&reply(json!(["x", 1, "y", "two"])));
    let variables: Response<VariablesResponseBody> = response(&outcome.responses[0]);
    assert!(variables.success);
    assert!(variables.body.unwrap().variables.is_empty());
}

#[test]
fn variables_with_unknown_reference_fail() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    let outcome = bridge.dispatch_request(request(
        4,
        "variables",
        Some(json!({ "variablesReference": 42 })),
    ));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert!(!failed.success);
    assert_eq!(failed.message.as_deref(), Some("unknown variables reference"));
    assert!(sent.commands().is_empty());
}

#[test]
fn continue_answers_at_once_and_step_waits_for_its_reply() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    configuration_done(&mut bridge);

    let outcome = bridge.dispatch_request(request(4, "continue", Some(json!({ "threadId": 1 }))));
    let resumed: Response<ContinueResponseBody> = response(&outcome.responses[0]);
    assert_eq!(resumed.body.unwrap().all_threads_continued, Some(true));
    assert!(bridge.active.is_none());

    let outcome = bridge.dispatch_request(request(5, "next", Some(json!({ "threadId": 1 }))));
    assert!(outcome.responses.is_empty());
    assert_eq!(sent.commands(), vec![Command::resume(), Command::step_over()]);

    // The first reply belongs to resume, not to the step.
    let outcome = bridge.handle_wire_line(&reply(json!([])));
    assert!(outcome.responses.is_empty());
    assert!(bridge.active.is_some());

    let outcome = bridge.handle_wire_line(&reply(json!([])));
    let stepped: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(stepped.command, "next");
    assert!(stepped.success);

    bridge.dispatch_request(request(6, "stepIn", Some(json!({ "threadId": 1 }))));
    assert_eq!(sent.commands()[2], Command::step_in());
    let outcome = bridge.handle_wire_line(&reply(json!([])));
    let stepped: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(stepped.command, "stepIn");
}

#[test]
fn requests_wait_behind_the_active_request() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);

    bridge.dispatch_request(request(4, "stackTrace", Some(json!({ "threadId": 1 }))));
    let outcome = bridge.dispatch_request(request(5, "threads", None));
    assert!(outcome.responses.is_empty());
    assert_eq!(bridge.backlog.len(), 1);

    let outcome = bridge.handle_wire_line(&reply(json!(["a.js", "f", 1, 0])));
    let commands = outcome
        .responses
        .iter()
        .map(|response| response["command"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(commands, vec!["stackTrace", "threads"]);
    let threads: Response<ThreadsResponseBody> = response(&outcome.responses[1]);
    let threads = threads.body.unwrap().threads;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, THREAD_ID);
    assert_eq!(threads[0].name, "Duktape Thread #1");
    assert!(bridge.backlog.is_empty());
}

#[test]
fn runtime_disconnect_fails_active_request_and_terminates() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);

    bridge.dispatch_request(request(4, "stackTrace", Some(json!({ "threadId": 1 }))));
    bridge.dispatch_request(request(5, "threads", None));

    let outcome = bridge.handle_wire_closed();
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(failed.command, "stackTrace");
    assert!(!failed.success);
    assert_eq!(failed.message.as_deref(), Some("runtime connection closed"));
    let threads: Response<Value> = response(&outcome.responses[1]);
    assert_eq!(threads.command, "threads");
    assert!(threads.success);
    let messages = all_messages(outcome);
    assert_eq!(events_named(&messages, "terminated").len(), 1);
    assert_eq!(bridge.phase, SessionPhase::Terminated);

    let outcome = bridge.dispatch_request(request(6, "stackTrace", Some(json!({ "threadId": 1 }))));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(failed.message.as_deref(), Some("not attached"));
}

#[test]
fn disconnect_bypasses_the_guard_and_exits() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);

    bridge.dispatch_request(request(4, "stackTrace", Some(json!({ "threadId": 1 }))));
    bridge.dispatch_request(request(5, "threads", None));
    let outcome = bridge.dispatch_request(request(
        6,
        "disconnect",
        Some(json!({ "restart": false })),
    ));
    assert!(outcome.should_exit);

    let results = outcome
        .responses
        .iter()
        .map(|message| {
            let response: Response<Value> = response(message);
            (response.command, response.success)
        })
        .collect::<Vec<_>>();
    assert_eq!(
        results,
        vec![
            ("stackTrace".to_string(), false),
            ("threads".to_string(), false),
            ("disconnect".to_string(), true),
        ]
    );
    let messages = all_messages(outcome);
    let terminated = events_named(&messages, "terminated");
    assert_eq!(terminated[0]["body"]["restart"], false);
    assert!(bridge.client.is_none());
    assert!(bridge.backlog.is_empty());
}

#[test]
fn launch_is_rejected() {
    let (mut bridge, _sent) = bridge();
    let outcome = bridge.dispatch_request(request(1, "launch", Some(json!({ "program": "a.js" }))));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert!(!failed.success);
    assert_eq!(
        failed.message.as_deref(),
        Some("launch is not supported; use attach")
    );
}

#[test]
fn attach_reports_connection_errors() {
    let mut bridge = DebugBridge::with_connector(MockConnector {
        sent: SharedBuffer::default(),
        refuse: true,
    });
    let outcome = bridge.dispatch_request(request(
        1,
        "attach",
        Some(json!({ "host": "10.0.0.2", "port": 9091 })),
    ));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert!(!failed.success);
    assert_eq!(
        failed.message.as_deref(),
        Some("failed to connect to 10.0.0.2:9091: connection refused")
    );
    assert!(bridge.active.is_none());
    assert!(bridge.client.is_none());
}

#[test]
fn second_attach_is_rejected() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);
    let outcome = bridge.dispatch_request(request(9, "attach", Some(json!({ "port": 9091 }))));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(failed.message.as_deref(), Some("already attached"));
}

#[test]
fn evaluate_returns_placeholder() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    let outcome = bridge.dispatch_request(request(
        4,
        "evaluate",
        Some(json!({ "expression": "x + 1", "context": "watch" })),
    ));
    let evaluated: Response<EvaluateResponseBody> = response(&outcome.responses[0]);
    let body = evaluated.body.unwrap();
    assert_eq!(body.result, "evaluation is not supported");
    assert_eq!(body.variables_reference, 0);
    assert!(sent.commands().is_empty());
}

#[test]
fn print_notifications_become_stdout_output() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);
    let outcome = bridge.handle_wire_line(r#"{"notify":true,"command":2,"args":["hello"]}"#);
    let output: Event<OutputEventBody> = serde_json::from_value(outcome.events[0].clone()).unwrap();
    let body = output.body.unwrap();
    assert_eq!(body.category.as_deref(), Some("stdout"));
    assert_eq!(body.output, "hello\n");
}

#[test]
fn unexpected_reply_is_reported_not_fatal() {
    let (mut bridge, _sent) = bridge();
    attach(&mut bridge, 1);
    let outcome = bridge.handle_wire_line(&reply(json!([])));
    assert!(outcome.responses.is_empty());
    let messages = all_messages(outcome);
    let output = events_named(&messages, "output");
    assert!(output[0]["body"]["output"]
        .as_str()
        .unwrap()
        .contains("reply received with no pending command"));
    assert!(bridge.client.is_some());
}

#[test]
fn undecodable_frame_leaves_the_waiting_request_pending() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);

    bridge.dispatch_request(request(4, "stackTrace", Some(json!({ "threadId": 1 }))));
    assert_eq!(sent.commands(), vec![Command::get_callstack()]);

    let outcome = bridge.handle_wire_line(r#"{"bogus":1}"#);
    assert!(outcome.responses.is_empty());
    let messages = all_messages(outcome);
    let output = events_named(&messages, "output");
    assert_eq!(output.len(), 1);
    assert!(output[0]["body"]["output"]
        .as_str()
        .unwrap()
        .contains("protocol error"));
    assert!(bridge.active.is_some());

    let outcome = bridge.handle_wire_line(&reply(json!(["a.js", "f", 7, 0])));
    let trace: Response<StackTraceResponseBody> = response(&outcome.responses[0]);
    assert!(trace.success);
    assert_eq!(trace.request_seq, 4);
    assert_eq!(trace.body.unwrap().stack_frames[0].line, 7);
}

#[test]
fn variable_references_expire_when_execution_moves() {
    let (mut bridge, sent) = bridge();
    attach(&mut bridge, 1);
    configuration_done(&mut bridge);

    let scopes = |bridge: &mut DebugBridge, seq: u32| {
        let outcome = bridge.dispatch_request(request(seq, "scopes", Some(json!({ "frameId": 0 }))));
        let scopes: Response<ScopesResponseBody> = response(&outcome.responses[0]);
        scopes.body.unwrap().scopes[0].variables_reference
    };
    let variables = |bridge: &mut DebugBridge, seq: u32, reference: u32| {
        bridge.dispatch_request(request(
            seq,
            "variables",
            Some(json!({ "variablesReference": reference })),
        ))
    };

    let first = scopes(&mut bridge, 4);
    scopes(&mut bridge, 5);
    assert_eq!(bridge.variable_handles.entries.len(), 2);

    // A new stop invalidates the previous references.
    bridge.handle_wire_line(&status(1));
    assert!(bridge.variable_handles.entries.is_empty());
    let outcome = variables(&mut bridge, 6, first);
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(failed.message.as_deref(), Some("unknown variables reference"));

    let second = scopes(&mut bridge, 7);
    assert_ne!(second, first);
    bridge.dispatch_request(request(8, "continue", Some(json!({ "threadId": 1 }))));
    assert!(bridge.variable_handles.entries.is_empty());

    let third = scopes(&mut bridge, 9);
    bridge.dispatch_request(request(10, "next", Some(json!({ "threadId": 1 }))));
    assert!(bridge.variable_handles.entries.is_empty());
    let outcome = variables(&mut bridge, 11, third);
    assert!(outcome.responses.is_empty());
    assert_eq!(sent.commands(), vec![Command::resume(), Command::step_over()]);

    bridge.handle_wire_line(&reply(json!([])));
    let outcome = bridge.handle_wire_line(&reply(json!([])));
    let results = outcome
        .responses
        .iter()
        .map(|message| {
            let response: Response<Value> = response(message);
            (response.command, response.message)
        })
        .collect::<Vec<_>>();
    assert_eq!(
        results,
        vec![
            ("next".to_string(), None),
            (
                "variables".to_string(),
                Some("unknown variables reference".to_string())
            ),
        ]
    );
}

#[test]
fn unsupported_command_is_answered_with_an_error() {
    let (mut bridge, _sent) = bridge();
    let outcome = bridge.dispatch_request(request(1, "pause", Some(json!({ "threadId": 1 }))));
    let failed: Response<Value> = response(&outcome.responses[0]);
    assert_eq!(failed.message.as_deref(), Some("unsupported command"));
}

#[test]
fn initialize_advertises_capabilities() {
    let (mut bridge, _sent) = bridge();
    let outcome = bridge.dispatch_request(request(1, "initialize", Some(json!({}))));
    let body = &outcome.responses[0]["body"];
    assert_eq!(body["supportsConfigurationDoneRequest"], true);
    assert_eq!(body["supportsTerminateRequest"], true);
    assert_eq!(body["supportsEvaluateForHovers"], false);
    assert!(events_named(&all_messages(outcome), "initialized").is_empty());
}

#[test]
fn run_with_io_serves_until_disconnect() {
    let mut input = Vec::new();
    for payload in [
        r#"{"seq":1,"type":"request","command":"initialize","arguments":{}}"#,
        r#"{"seq":2,"type":"request","command":"threads"}"#,
        r#"{"seq":3,"type":"request","command":"disconnect"}"#,
    ] {
        write_message(&mut input, payload).unwrap();
    }
    let mut output = Vec::new();
    let (mut bridge, _sent) = bridge();
    bridge.run_with_io(Cursor::new(input), &mut output).unwrap();

    let mut reader = BufReader::new(&output[..]);
    let mut written = Vec::new();
    while let Some(payload) = read_message(&mut reader).unwrap() {
        written.push(serde_json::from_str::<Value>(&payload).unwrap());
    }
    let commands = written
        .iter()
        .filter(|message| message["type"] == "response")
        .map(|message| message["command"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(commands, vec!["initialize", "threads", "disconnect"]);
    assert_eq!(written.last().unwrap()["event"], "terminated");
}
