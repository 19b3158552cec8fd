//! Request handling shared by every worker implementation
//!
//! Takes one serialized request and produces either a serialized response or
//! a reason the worker must be torn down.

use crate::processing::fallback;
use crate::protocol::{decode_request, encode_response, CodecError, ResponseEnvelope};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Outcome of handling one request payload
#[derive(Debug, Clone, PartialEq)]
pub enum HandledRequest {
    /// Serialized response envelope for the task
    Reply(String),
    /// The worker cannot continue
    Fatal(String),
}

/// Decode, compute and encode a single task
///
/// Failures that can be pinned to one task (a broken body with a readable
/// `taskId`, or a panic inside the computation) become an `error` envelope.
/// A payload with no readable task id is fatal.
pub fn handle_request(payload: &str) -> HandledRequest {
    let response = match decode_request(payload) {
        Ok(envelope) => {
            let task_id = envelope.task_id;
            let request = envelope.request;
            match panic::catch_unwind(AssertUnwindSafe(|| fallback::execute(&request))) {
                Ok(output) => ResponseEnvelope::from_output(task_id, output),
                Err(panic) => ResponseEnvelope::error(
                    task_id,
                    format!("computation panicked: {}", panic_message(panic.as_ref())),
                ),
            }
        }
        Err(CodecError::InvalidTask { task_id, source }) => {
            ResponseEnvelope::error(task_id, format!("invalid task envelope: {source}"))
        }
        Err(e) => return HandledRequest::Fatal(format!("unreadable request envelope: {e}")),
    };

    encode(response)
}

fn encode(response: ResponseEnvelope) -> HandledRequest {
    match encode_response(&response) {
        Ok(payload) => HandledRequest::Reply(payload),
        Err(e) => {
            let error_reply = ResponseEnvelope::error(response.task_id().clone(), e.to_string());
            match encode_response(&error_reply) {
                Ok(payload) => HandledRequest::Reply(payload),
                Err(e) => HandledRequest::Fatal(format!("cannot encode responses: {e}")),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
