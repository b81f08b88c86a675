//! Error bodies written back to callers.
//!
//! Callers always receive a JSON object; internal detail stays in the logs.

use serde_json::{Value, json};

use super::errors::TransportError;
use crate::routing::DispatchHalt;

/// Maps a per-connection failure to the body sent to the caller.
pub(crate) fn error_body(error: &TransportError) -> Value {
    match error {
        TransportError::Unauthenticated => error_object(401, "Unauthorized"),
        TransportError::Dispatch(DispatchHalt::Unauthenticated) => {
            error_object(403, "Not Authenticated")
        }
        TransportError::Dispatch(DispatchHalt::Validation(errors)) => json!({
            "status": "error",
            "code": 422,
            "message": "Validation failed",
            "errors": errors,
        }),
        _ => error_object(500, "Internal Server Error"),
    }
}

fn error_object(code: u16, message: &str) -> Value {
    json!({ "status": "error", "code": code, "message": message })
}
