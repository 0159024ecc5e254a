//! Wire protocol client.
//! - send: write a command and queue it for its reply
//! - ingest: classify an inbound frame and correlate replies FIFO
//! - command helpers: breakpoints, callstack, locals, run control

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use tracing::debug;

use super::codec::{
    decode, Command, Message, Notification, PrintNotification, Reply, StatusNotification,
};
use super::error::{WireError, WireResult};
use super::transport::WireConnector;

/// How the sender intends to consume a command's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// The reply resolves a waiting request.
    Awaited,
    /// The reply is popped and dropped.
    Discard,
}

/// Identifies one sent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    ticket: Ticket,
    opcode: u8,
    mode: ReplyMode,
}

/// A classified inbound frame, with replies matched to their command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    Reply {
        ticket: Ticket,
        opcode: u8,
        mode: ReplyMode,
        reply: Reply,
    },
    TargetConnected,
    Status(StatusNotification),
    Print(PrintNotification),
    Ignored {
        command: u64,
    },
}

/// Single owner of the runtime connection and its pending-reply queue.
///
/// The wire protocol has no correlation ids: each reply belongs to the oldest
/// command still waiting, so commands must be written in the order they were
/// queued and replies never reordered.
pub struct WireClient {
    peer: String,
    writer: Box<dyn Write + Send>,
    pending: VecDeque<PendingCommand>,
    next_ticket: u64,
}

impl std::fmt::Debug for WireClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireClient")
            .field("peer", &self.peer)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl WireClient {
    /// Connect and return the client plus the inbound half of the stream.
    pub fn connect(
        connector: &mut dyn WireConnector,
        host: &str,
        port: u16,
    ) -> WireResult<(Self, Box<dyn BufRead + Send>)> {
        let connection = connector.connect(host, port)?;
        debug!("connected to runtime at {}", connection.peer);
        let client = Self::new(connection.peer, connection.writer);
        Ok((client, connection.reader))
    }

    #[must_use]
    pub fn new(peer: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            peer: peer.into(),
            writer,
            pending: VecDeque::new(),
            next_ticket: 1,
        }
    }

    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn send(&mut self, command: &Command, mode: ReplyMode) -> WireResult<Ticket> {
        let frame = command.encode()?;
        debug!("wire -> {}", frame.trim_end());
        self.writer.write_all(frame.as_bytes())?;
        self.writer.flush()?;
        let ticket = Ticket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.pending.push_back(PendingCommand {
            ticket,
            opcode: command.opcode(),
            mode,
        });
        Ok(ticket)
    }

    /// Decode one frame. Replies consume the oldest pending command.
    pub fn ingest(&mut self, frame: &str) -> WireResult<WireEvent> {
        debug!("wire <- {}", frame.trim_end());
        match decode(frame)? {
            Message::Reply(reply) => {
                let pending = self
                    .pending
                    .pop_front()
                    .ok_or(WireError::UnexpectedReply)?;
                Ok(WireEvent::Reply {
                    ticket: pending.ticket,
                    opcode: pending.opcode,
                    mode: pending.mode,
                    reply,
                })
            }
            Message::TargetConnected => Ok(WireEvent::TargetConnected),
            Message::Notification(Notification::Status(status)) => Ok(WireEvent::Status(status)),
            Message::Notification(Notification::Print(print)) => Ok(WireEvent::Print(print)),
            Message::Unknown { command } => Ok(WireEvent::Ignored { command }),
        }
    }

    /// Forget every outstanding command, returning the tickets that will never resolve.
    pub fn abandon_pending(&mut self) -> Vec<Ticket> {
        self.pending.drain(..).map(|pending| pending.ticket).collect()
    }

    pub fn add_breakpoint(&mut self, file: &str, line: u32, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::add_breakpoint(file, line), mode)
    }

    pub fn list_breakpoints(&mut self, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::list_breakpoints(), mode)
    }

    pub fn get_callstack(&mut self, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::get_callstack(), mode)
    }

    pub fn get_locals(&mut self, stack_depth: i64, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::get_locals(stack_depth), mode)
    }

    pub fn resume(&mut self, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::resume(), mode)
    }

    pub fn step_in(&mut self, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::step_in(), mode)
    }

    pub fn step_over(&mut self, mode: ReplyMode) -> WireResult<Ticket> {
        self.send(&Command::step_over(), mode)
    }
}
