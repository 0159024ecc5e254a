//! Debug bridge module map.
//! - core: event loop, dispatch, wire event routing, response/event builders
//! - handlers: DAP request handlers by area
//! - jobs: requests waiting on a wire reply or the attach handshake
//! - protocol_io: message framing + transcript logging
//! - util: small shared helpers
//! - tests: bridge unit tests

mod core;
mod handlers;
mod jobs;
mod protocol_io;
mod util;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::AtomicU32;
use std::sync::mpsc::Sender;

use serde_json::Value;

use crate::protocol::Request;
use crate::wire::{ExecutionState, WireClient, WireConnector, WireInbound};

use self::jobs::ActiveRequest;

/// The only thread the runtime exposes.
const THREAD_ID: u32 = 1;

/// Runtime script used for breakpoints when attach does not name one.
pub const DEFAULT_TARGET_FILE: &str = "main.js";

/// Input to the bridge event loop.
#[derive(Debug)]
enum BridgeInput {
    Dap(String),
    DapClosed,
    Wire(WireInbound),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Uninitialized,
    Attaching,
    AwaitingFirstStatus,
    Initialized(ExecutionState),
    Terminated,
}

/// Which listener status notifications are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusListener {
    Inactive,
    FirstStatus,
    SteadyState,
}

#[derive(Debug, Clone, Copy, Default)]
struct AttachFlags {
    attach_mode: bool,
    stop_on_entry: bool,
    need_continue_on_config_done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableHandle {
    Locals { frame_id: u32 },
}

/// Opaque integer handles scoped to one debug session.
#[derive(Debug)]
struct Handles<T> {
    next: u32,
    entries: HashMap<u32, T>,
}

impl<T> Handles<T> {
    fn new() -> Self {
        Self {
            next: 1,
            entries: HashMap::new(),
        }
    }

    fn create(&mut self, value: T) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        self.entries.insert(id, value);
        id
    }

    fn get(&self, id: u32) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Drop every entry; ids keep counting so stale references stay unknown.
    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Line/column conversion between the client and the runtime (1-based lines).
#[derive(Debug, Clone, Copy)]
struct CoordinateConverter {
    lines_start_at1: bool,
    columns_start_at1: bool,
}

impl CoordinateConverter {
    fn new(lines_start_at1: bool, columns_start_at1: bool) -> Self {
        Self {
            lines_start_at1,
            columns_start_at1,
        }
    }

    fn lines_start_at1(self) -> bool {
        self.lines_start_at1
    }

    fn columns_start_at1(self) -> bool {
        self.columns_start_at1
    }

    fn to_client_line(self, line: u32) -> u32 {
        if self.lines_start_at1 {
            line
        } else {
            line.saturating_sub(1)
        }
    }

    fn to_runtime_line(self, line: u32) -> Option<u32> {
        if self.lines_start_at1 {
            (line > 0).then_some(line)
        } else {
            line.checked_add(1)
        }
    }

    fn default_column(self) -> u32 {
        u32::from(self.columns_start_at1)
    }
}

/// Bridges DAP requests to the runtime debug wire protocol.
///
/// All state is touched from one thread; wire frames and DAP requests are
/// processed one at a time in arrival order.
pub struct DebugBridge {
    connector: Box<dyn WireConnector>,
    client: Option<WireClient>,
    inbound: Option<Sender<BridgeInput>>,
    phase: SessionPhase,
    status_listener: StatusListener,
    flags: AttachFlags,
    active: Option<ActiveRequest>,
    backlog: VecDeque<Request<Value>>,
    variable_handles: Handles<VariableHandle>,
    coordinate: CoordinateConverter,
    target_file: String,
    next_seq: AtomicU32,
}

/// Messages produced by one step of the bridge, in write order:
/// `preamble`, then `responses`, then `events`.
#[derive(Debug, Default)]
struct DispatchOutcome {
    preamble: Vec<Value>,
    responses: Vec<Value>,
    events: Vec<Value>,
    should_exit: bool,
}

impl DispatchOutcome {
    fn respond(response: Value) -> Self {
        Self {
            responses: vec![response],
            ..Self::default()
        }
    }

    fn merge(&mut self, other: DispatchOutcome) {
        self.preamble.extend(other.preamble);
        self.responses.extend(other.responses);
        self.events.extend(other.events);
        self.should_exit |= other.should_exit;
    }

    fn into_messages(self) -> impl Iterator<Item = Value> {
        self.preamble
            .into_iter()
            .chain(self.responses)
            .chain(self.events)
    }
}
