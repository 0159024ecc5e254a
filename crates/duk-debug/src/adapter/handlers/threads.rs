//! Thread requests.
//! - handle_threads: the runtime's single thread

use serde_json::Value;

use crate::protocol::{Request, Thread, ThreadsResponseBody};

use super::super::{DebugBridge, DispatchOutcome, THREAD_ID};

impl DebugBridge {
    pub(in crate::adapter) fn handle_threads(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let body = ThreadsResponseBody {
            threads: vec![Thread {
                id: THREAD_ID,
                name: "Duktape Thread #1".to_string(),
            }],
        };
        DispatchOutcome::respond(self.ok_response(&request, Some(body)))
    }
}
