//! Wire message codec.
//! - Command: outbound `{"request": op, "args": [...]}` lines
//! - decode: classify inbound frames into replies and notifications
//! - Message::to_frame: runtime-side encoding (fake runtimes, tests)

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::{WireError, WireResult};

pub const OP_RESUME: u8 = 0x13;
pub const OP_STEP_IN: u8 = 0x14;
pub const OP_STEP_OVER: u8 = 0x15;
pub const OP_LIST_BREAKPOINTS: u8 = 0x17;
pub const OP_ADD_BREAKPOINT: u8 = 0x18;
pub const OP_GET_CALLSTACK: u8 = 0x1c;
pub const OP_GET_LOCALS: u8 = 0x1d;

pub const NOTIFY_STATUS: u64 = 0x01;
pub const NOTIFY_PRINT: u64 = 0x02;

/// `get-locals` depth of the innermost (currently executing) frame.
pub const CURRENT_FRAME: i64 = -1;

const TARGET_CONNECTED: &str = "_TargetConnected";

/// A request sent to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "request")]
    opcode: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<Value>,
}

impl Command {
    #[must_use]
    pub fn new(opcode: u8, args: Vec<Value>) -> Self {
        Self { opcode, args }
    }

    #[must_use]
    pub fn resume() -> Self {
        Self::new(OP_RESUME, Vec::new())
    }

    #[must_use]
    pub fn step_in() -> Self {
        Self::new(OP_STEP_IN, Vec::new())
    }

    #[must_use]
    pub fn step_over() -> Self {
        Self::new(OP_STEP_OVER, Vec::new())
    }

    #[must_use]
    pub fn list_breakpoints() -> Self {
        Self::new(OP_LIST_BREAKPOINTS, Vec::new())
    }

    #[must_use]
    pub fn add_breakpoint(file: &str, line: u32) -> Self {
        Self::new(OP_ADD_BREAKPOINT, vec![json!(file), json!(line)])
    }

    #[must_use]
    pub fn get_callstack() -> Self {
        Self::new(OP_GET_CALLSTACK, Vec::new())
    }

    #[must_use]
    pub fn get_locals(stack_depth: i64) -> Self {
        Self::new(OP_GET_LOCALS, vec![json!(stack_depth)])
    }

    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Serialize to a single newline-terminated frame.
    pub fn encode(&self) -> WireResult<String> {
        let mut frame = serde_json::to_string(self).map_err(WireError::Encode)?;
        frame.push('\n');
        Ok(frame)
    }

    /// Parse a command frame as the runtime would.
    pub fn decode(frame: &str) -> WireResult<Self> {
        serde_json::from_str(frame.trim_end()).map_err(WireError::Decode)
    }
}

/// Run state reported by a status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Paused,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotification {
    pub state: ExecutionState,
    pub file_name: String,
    pub function_name: String,
    pub line: u32,
    pub pc: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintNotification {
    pub message: String,
}

/// Unsolicited runtime message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Status(StatusNotification),
    Print(PrintNotification),
}

/// Response to the oldest outstanding command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub args: Vec<Value>,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Reply(Reply),
    TargetConnected,
    Notification(Notification),
    /// Notification with a command code this bridge does not know.
    Unknown { command: u64 },
}

impl Message {
    /// Encode the message the way the runtime puts it on the wire.
    pub fn to_frame(&self) -> WireResult<String> {
        let value = match self {
            Self::Reply(reply) => json!({ "reply": true, "args": reply.args }),
            Self::TargetConnected => json!({ "notify": TARGET_CONNECTED }),
            Self::Notification(Notification::Status(status)) => json!({
                "notify": true,
                "command": NOTIFY_STATUS,
                "args": [
                    match status.state {
                        ExecutionState::Running => 0,
                        ExecutionState::Paused => 1,
                    },
                    status.file_name,
                    status.function_name,
                    status.line,
                    status.pc,
                ],
            }),
            Self::Notification(Notification::Print(print)) => json!({
                "notify": true,
                "command": NOTIFY_PRINT,
                "args": [print.message],
            }),
            Self::Unknown { command } => json!({ "notify": true, "command": command, "args": [] }),
        };
        let mut frame = serde_json::to_string(&value).map_err(WireError::Encode)?;
        frame.push('\n');
        Ok(frame)
    }
}

/// Decode and classify one complete inbound frame.
pub fn decode(frame: &str) -> WireResult<Message> {
    let value: Value = serde_json::from_str(frame.trim_end()).map_err(WireError::Decode)?;
    let Value::Object(object) = value else {
        return Err(WireError::Malformed(frame.trim_end().to_string()));
    };

    if object.get("reply").and_then(Value::as_bool) == Some(true) {
        return Ok(Message::Reply(Reply {
            args: args_of(&object),
        }));
    }

    match object.get("notify") {
        Some(Value::String(tag)) if tag == TARGET_CONNECTED => Ok(Message::TargetConnected),
        Some(Value::Bool(true)) => decode_notification(&object, frame),
        _ => Err(WireError::Malformed(frame.trim_end().to_string())),
    }
}

fn decode_notification(object: &Map<String, Value>, frame: &str) -> WireResult<Message> {
    let malformed = || WireError::Malformed(frame.trim_end().to_string());
    let command = object
        .get("command")
        .and_then(Value::as_u64)
        .ok_or_else(malformed)?;
    let args = args_of(object);

    match command {
        NOTIFY_STATUS => {
            // Only a zero run flag means running; anything else, including a
            // missing flag, reports a paused target.
            let running = match args.first() {
                Some(Value::Number(flag)) => flag.as_f64() == Some(0.0),
                Some(Value::Bool(flag)) => !flag,
                Some(Value::String(flag)) => flag.trim() == "0",
                _ => false,
            };
            let state = if running {
                ExecutionState::Running
            } else {
                ExecutionState::Paused
            };
            Ok(Message::Notification(Notification::Status(
                StatusNotification {
                    state,
                    file_name: string_at(&args, 1),
                    function_name: string_at(&args, 2),
                    line: args
                        .get(3)
                        .and_then(Value::as_u64)
                        .and_then(|line| u32::try_from(line).ok())
                        .unwrap_or(0),
                    pc: args.get(4).and_then(Value::as_u64).unwrap_or(0),
                },
            )))
        }
        NOTIFY_PRINT => Ok(Message::Notification(Notification::Print(
            PrintNotification {
                message: string_at(&args, 0),
            },
        ))),
        other => Ok(Message::Unknown { command: other }),
    }
}

fn args_of(object: &Map<String, Value>) -> Vec<Value> {
    object
        .get("args")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn string_at(args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
