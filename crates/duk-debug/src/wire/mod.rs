//! Runtime debug wire protocol.
//! - codec: frame encoding and message classification
//! - client: command sending + FIFO reply correlation
//! - transport: connection seam and inbound reader thread
//! - error: wire error taxonomy

mod client;
mod codec;
mod error;
mod transport;

pub use client::{ReplyMode, Ticket, WireClient, WireEvent};
pub use codec::{
    decode, Command, ExecutionState, Message, Notification, PrintNotification, Reply,
    StatusNotification, CURRENT_FRAME, NOTIFY_PRINT, NOTIFY_STATUS, OP_ADD_BREAKPOINT,
    OP_GET_CALLSTACK, OP_GET_LOCALS, OP_LIST_BREAKPOINTS, OP_RESUME, OP_STEP_IN, OP_STEP_OVER,
};
pub use error::{WireError, WireResult};
pub use transport::{spawn_reader, TcpConnector, WireConnection, WireConnector, WireInbound};
