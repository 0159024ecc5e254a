//! Stack trace request handling.
//! - handle_stack_trace: validate the thread and request the callstack
//! - complete_stack_trace: decode the reply and apply client slicing
//! - callstack_entries: flat reply -> (file, function, line, pc) records

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{Request, Source, StackFrame, StackTraceArguments, StackTraceResponseBody};
use crate::wire::ReplyMode;

use super::super::jobs::{ActiveRequest, Job};
use super::super::util::parse_arguments;
use super::super::{DebugBridge, DispatchOutcome, THREAD_ID};

/// Values per callstack record: file name, function name, line, pc.
const CALLSTACK_RECORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(in crate::adapter) struct CallstackEntry {
    pub(in crate::adapter) file_name: String,
    pub(in crate::adapter) function_name: String,
    pub(in crate::adapter) line: u32,
    pub(in crate::adapter) pc: u64,
}

/// Split a get-callstack reply into records; a trailing partial record is dropped.
pub(in crate::adapter) fn callstack_entries(args: &[Value]) -> Vec<CallstackEntry> {
    let records = args.chunks_exact(CALLSTACK_RECORD_LEN);
    if !records.remainder().is_empty() {
        warn!(
            "malformed callstack reply: {} values for {} records",
            args.len(),
            args.len().div_ceil(CALLSTACK_RECORD_LEN)
        );
    }
    records
        .map(|record| CallstackEntry {
            file_name: text(&record[0]),
            function_name: text(&record[1]),
            line: record[2]
                .as_u64()
                .and_then(|line| u32::try_from(line).ok())
                .unwrap_or(0),
            pc: record[3].as_u64().unwrap_or(0),
        })
        .collect()
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl DebugBridge {
    pub(in crate::adapter) fn handle_stack_trace(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let Some(args) = parse_arguments::<StackTraceArguments>(&request) else {
            return DispatchOutcome::respond(
                self.error_response(&request, "invalid stackTrace args"),
            );
        };
        if args.thread_id != THREAD_ID {
            return DispatchOutcome::respond(self.error_response(
                &request,
                &format!("unknown thread id {}", args.thread_id),
            ));
        }
        let Some(client) = self.client.as_mut() else {
            return DispatchOutcome::respond(self.error_response(&request, "not attached"));
        };

        match client.get_callstack(ReplyMode::Awaited) {
            Ok(ticket) => {
                let start_frame = usize::try_from(args.start_frame.unwrap_or(0)).unwrap_or(0);
                let levels = args
                    .levels
                    .filter(|levels| *levels > 0)
                    .and_then(|levels| usize::try_from(levels).ok());
                self.active = Some(ActiveRequest {
                    request,
                    ticket: Some(ticket),
                    job: Job::StackTrace {
                        start_frame,
                        levels,
                    },
                });
                DispatchOutcome::default()
            }
            Err(err) => self.wire_send_failed(&request, err),
        }
    }

    pub(in crate::adapter) fn complete_stack_trace(
        &self,
        request: &Request<Value>,
        args: &[Value],
        start_frame: usize,
        levels: Option<usize>,
    ) -> DispatchOutcome {
        let mut stack_frames = callstack_entries(args)
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                debug!(
                    "frame {index}: {} at {}:{} pc={}",
                    entry.function_name, entry.file_name, entry.line, entry.pc
                );
                StackFrame {
                    id: u32::try_from(index).unwrap_or(u32::MAX),
                    name: entry.function_name,
                    source: Some(Source {
                        name: Path::new(&entry.file_name)
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned()),
                        path: Some(entry.file_name),
                        source_reference: None,
                    }),
                    line: self.to_client_line(entry.line),
                    column: self.default_column(),
                    end_line: None,
                    end_column: None,
                }
            })
            .collect::<Vec<_>>();
        let total_frames = u32::try_from(stack_frames.len()).unwrap_or(u32::MAX);

        let levels = levels.unwrap_or(stack_frames.len());
        let sliced = stack_frames
            .drain(start_frame.min(stack_frames.len())..)
            .take(levels)
            .collect::<Vec<_>>();

        let body = StackTraceResponseBody {
            stack_frames: sliced,
            total_frames: Some(total_frames),
        };
        DispatchOutcome::respond(self.ok_response(request, Some(body)))
    }
}
