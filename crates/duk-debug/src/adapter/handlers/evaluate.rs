//! Expression evaluation.
//! - handle_evaluate: fixed placeholder result

use serde_json::Value;
use tracing::debug;

use crate::protocol::{EvaluateArguments, EvaluateResponseBody, Request};

use super::super::util::parse_arguments;
use super::super::{DebugBridge, DispatchOutcome};

const EVALUATE_PLACEHOLDER: &str = "evaluation is not supported";

impl DebugBridge {
    pub(in crate::adapter) fn handle_evaluate(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let Some(args) = parse_arguments::<EvaluateArguments>(&request) else {
            return DispatchOutcome::respond(self.error_response(&request, "invalid evaluate args"));
        };
        debug!("evaluate '{}' not supported", args.expression);
        let body = EvaluateResponseBody {
            result: EVALUATE_PLACEHOLDER.to_string(),
            r#type: None,
            variables_reference: 0,
            named_variables: None,
            indexed_variables: None,
        };
        DispatchOutcome::respond(self.ok_response(&request, Some(body)))
    }
}
