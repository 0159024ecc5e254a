//! Request handlers grouped by DAP area.
//! - initialize: initialize/launch/attach/configuration timing
//! - breakpoints: breakpoint sync with the runtime
//! - lifecycle: disconnect/terminate
//! - threads: thread list
//! - stack_trace: stackTrace request + callstack decoding
//! - scopes: scope enumeration and variables
//! - run_control: continue/step
//! - evaluate: placeholder evaluation

mod breakpoints;
mod evaluate;
mod initialize;
mod lifecycle;
mod run_control;
mod scopes;
mod stack_trace;
mod threads;
