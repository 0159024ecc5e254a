//! Debug Adapter Protocol (DAP) bridge for runtimes speaking the line-delimited
//! JSON debug wire protocol.

mod adapter;
mod protocol;
pub mod wire;

pub use adapter::{DebugBridge, DEFAULT_TARGET_FILE};
pub use protocol::{
    AttachArguments, Breakpoint, Capabilities, ContinueArguments, ContinueResponseBody,
    DisconnectArguments, EvaluateArguments, EvaluateResponseBody, Event, InitializeArguments,
    InitializeResponseBody, MessageType, NextArguments, OutputEventBody, Request, Response, Scope,
    ScopesArguments, ScopesResponseBody, SetBreakpointsArguments, SetBreakpointsResponseBody,
    Source, SourceBreakpoint, StackFrame, StackTraceArguments, StackTraceResponseBody,
    StepInArguments, StoppedEventBody, TerminateArguments, TerminatedEventBody, Thread,
    ThreadsResponseBody, Variable, VariablesArguments, VariablesResponseBody,
};
