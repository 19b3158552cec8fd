//! Task envelopes exchanged with the background worker
//!
//! Requests and responses cross the worker boundary as JSON text. Nothing is
//! shared by reference: the worker only ever sees what is in the envelope.

use super::records::{Features, ProcessingOptions, ProcessingResult, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Longest error string carried in an `error` envelope
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

const TRUNCATED_SUFFIX: &str = "...[truncated]";

/// The two kinds of offloadable work
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ProcessProperties,
    ExtractFeatures,
}

impl TaskKind {
    /// Prefix used when minting task identifiers for this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            TaskKind::ProcessProperties => "process",
            TaskKind::ExtractFeatures => "extract",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ProcessProperties => "process-properties",
            TaskKind::ExtractFeatures => "extract-features",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-unique task identifier such as `process-7` or `extract-12`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(kind: TaskKind, sequence: u64) -> Self {
        Self(format!("{}-{}", kind.id_prefix(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of work before it is given an identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "task", rename_all = "kebab-case")]
pub enum TaskRequest {
    ProcessProperties {
        data: Vec<Record>,
        #[serde(default)]
        options: ProcessingOptions,
    },
    ExtractFeatures {
        data: Vec<Record>,
    },
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::ProcessProperties { .. } => TaskKind::ProcessProperties,
            TaskRequest::ExtractFeatures { .. } => TaskKind::ExtractFeatures,
        }
    }

    pub fn records(&self) -> &[Record] {
        match self {
            TaskRequest::ProcessProperties { data, .. } => data,
            TaskRequest::ExtractFeatures { data } => data,
        }
    }
}

/// Result of a completed task, one variant per [`TaskKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Processed(ProcessingResult),
    Features(Features),
}

impl TaskOutput {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskOutput::Processed(_) => TaskKind::ProcessProperties,
            TaskOutput::Features(_) => TaskKind::ExtractFeatures,
        }
    }
}

/// Typed view over a [`TaskOutput`], used by pending task handles
pub trait FromTaskOutput: Sized {
    /// Hands the output back unchanged when it is the wrong variant
    fn from_task_output(output: TaskOutput) -> Result<Self, TaskOutput>;
}

impl FromTaskOutput for TaskOutput {
    fn from_task_output(output: TaskOutput) -> Result<Self, TaskOutput> {
        Ok(output)
    }
}

impl FromTaskOutput for ProcessingResult {
    fn from_task_output(output: TaskOutput) -> Result<Self, TaskOutput> {
        match output {
            TaskOutput::Processed(result) => Ok(result),
            other => Err(other),
        }
    }
}

impl FromTaskOutput for Features {
    fn from_task_output(output: TaskOutput) -> Result<Self, TaskOutput> {
        match output {
            TaskOutput::Features(features) => Ok(features),
            other => Err(other),
        }
    }
}

/// Request sent to the background worker
///
/// # Examples
/// ```
/// use property_offload::protocol::{RequestEnvelope, TaskId, TaskKind, TaskRequest};
///
/// let envelope = RequestEnvelope {
///     task_id: TaskId::new(TaskKind::ExtractFeatures, 1),
///     request: TaskRequest::ExtractFeatures { data: vec![] },
/// };
/// let json = serde_json::to_value(&envelope).unwrap();
/// assert_eq!(json["taskId"], "extract-1");
/// assert_eq!(json["task"], "extract-features");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
    #[serde(flatten)]
    pub request: TaskRequest,
}

/// Reply from the background worker; at most one per request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResponseEnvelope {
    ProcessedProperties {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        result: ProcessingResult,
    },
    ExtractedFeatures {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        features: Features,
    },
    Error {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        error: String,
    },
}

impl ResponseEnvelope {
    pub fn task_id(&self) -> &TaskId {
        match self {
            ResponseEnvelope::ProcessedProperties { task_id, .. } => task_id,
            ResponseEnvelope::ExtractedFeatures { task_id, .. } => task_id,
            ResponseEnvelope::Error { task_id, .. } => task_id,
        }
    }

    /// Wrap a finished computation in the matching response variant
    pub fn from_output(task_id: TaskId, output: TaskOutput) -> Self {
        match output {
            TaskOutput::Processed(result) => ResponseEnvelope::ProcessedProperties { task_id, result },
            TaskOutput::Features(features) => ResponseEnvelope::ExtractedFeatures { task_id, features },
        }
    }

    /// Build an `error` response, capping the message length
    pub fn error<S: AsRef<str>>(task_id: TaskId, message: S) -> Self {
        ResponseEnvelope::Error {
            task_id,
            error: truncate_error_message(message.as_ref()),
        }
    }

    /// Split into the task identifier and either its output or its error string
    pub fn into_outcome(self) -> (TaskId, Result<TaskOutput, String>) {
        match self {
            ResponseEnvelope::ProcessedProperties { task_id, result } => {
                (task_id, Ok(TaskOutput::Processed(result)))
            }
            ResponseEnvelope::ExtractedFeatures { task_id, features } => {
                (task_id, Ok(TaskOutput::Features(features)))
            }
            ResponseEnvelope::Error { task_id, error } => (task_id, Err(error)),
        }
    }
}

/// Envelope encoding and decoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Invalid envelope for task {task_id}: {source}")]
    InvalidTask {
        task_id: TaskId,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode_request(envelope: &RequestEnvelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Encode)
}

/// Decode a request, recovering the task id when only the body is broken
///
/// A payload that is not JSON or has no string `taskId` yields
/// [`CodecError::Malformed`]; anything else yields [`CodecError::InvalidTask`].
pub fn decode_request(payload: &str) -> Result<RequestEnvelope, CodecError> {
    let value: Value = serde_json::from_str(payload).map_err(CodecError::Malformed)?;

    let task_id = match value.get("taskId").and_then(Value::as_str) {
        Some(id) => TaskId::from(id),
        None => {
            return serde_json::from_value(value).map_err(CodecError::Malformed);
        }
    };

    serde_json::from_value(value).map_err(|source| CodecError::InvalidTask { task_id, source })
}

pub fn encode_response(envelope: &ResponseEnvelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Encode)
}

pub fn decode_response(payload: &str) -> Result<ResponseEnvelope, CodecError> {
    serde_json::from_str(payload).map_err(CodecError::Malformed)
}

/// Cap an error string at [`MAX_ERROR_MESSAGE_LEN`] bytes on a char boundary
pub fn truncate_error_message(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }

    let mut cut = MAX_ERROR_MESSAGE_LEN - TRUNCATED_SUFFIX.len();
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &message[..cut], TRUNCATED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::records::{SortDirection, SortKey};
    use serde_json::json;

    #[test]
    fn test_task_id_format() {
        assert_eq!(TaskId::new(TaskKind::ProcessProperties, 7).as_str(), "process-7");
        assert_eq!(TaskId::new(TaskKind::ExtractFeatures, 12).as_str(), "extract-12");
    }

    #[test]
    fn test_request_wire_format() {
        let envelope = RequestEnvelope {
            task_id: TaskId::new(TaskKind::ProcessProperties, 1),
            request: TaskRequest::ProcessProperties {
                data: vec![Record::new().with_price(100.0)],
                options: ProcessingOptions::new()
                    .filter_by_type("Venda")
                    .sort_by_price(SortDirection::Asc),
            },
        };

        let value: Value = serde_json::from_str(&encode_request(&envelope).unwrap()).unwrap();
        assert_eq!(value["taskId"], "process-1");
        assert_eq!(value["task"], "process-properties");
        assert_eq!(value["data"][0]["preco"], 100.0);
        assert_eq!(value["options"]["filterByType"], "Venda");
        assert_eq!(value["options"]["sortBy"], "price");
        assert_eq!(value["options"]["sortDirection"], "asc");
    }

    #[test]
    fn test_request_options_are_optional() {
        let payload = r#"{"taskId":"process-3","task":"process-properties","data":[]}"#;
        let envelope = decode_request(payload).unwrap();

        match envelope.request {
            TaskRequest::ProcessProperties { data, options } => {
                assert!(data.is_empty());
                assert_eq!(options, ProcessingOptions::default());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_decode_request_unknown_task_keeps_id() {
        let payload = r#"{"taskId":"process-9","task":"compress-images","data":[]}"#;
        let err = decode_request(payload).unwrap_err();

        match err {
            CodecError::InvalidTask { task_id, .. } => assert_eq!(task_id.as_str(), "process-9"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_request_without_id_is_malformed() {
        let err = decode_request(r#"{"task":"extract-features","data":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));

        let err = decode_request("not json").unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_response_wire_format() {
        let processed = ResponseEnvelope::from_output(
            TaskId::from("process-1"),
            TaskOutput::Processed(ProcessingResult::default()),
        );
        let value = serde_json::to_value(&processed).unwrap();
        assert_eq!(value["type"], "processed-properties");
        assert_eq!(value["taskId"], "process-1");
        assert_eq!(value["result"]["metadata"]["totalCount"], 0);

        let features = ResponseEnvelope::from_output(
            TaskId::from("extract-2"),
            TaskOutput::Features(Features::default()),
        );
        let value = serde_json::to_value(&features).unwrap();
        assert_eq!(value["type"], "extracted-features");
        assert_eq!(value["features"]["minPrice"], 0.0);

        let error = ResponseEnvelope::error(TaskId::from("extract-3"), "boom");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"type": "error", "taskId": "extract-3", "error": "boom"})
        );
    }

    #[test]
    fn test_decode_response_rejects_unknown_type() {
        let err = decode_response(r#"{"type":"progress","taskId":"process-1"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_into_outcome() {
        let (id, outcome) = ResponseEnvelope::error(TaskId::from("process-4"), "bad").into_outcome();
        assert_eq!(id.as_str(), "process-4");
        assert_eq!(outcome.unwrap_err(), "bad");
    }

    #[test]
    fn test_unsupported_sort_key_survives_encoding() {
        let options: ProcessingOptions = serde_json::from_value(json!({"sortBy": "area"})).unwrap();
        let encoded = serde_json::to_string(&options).unwrap();
        let decoded: ProcessingOptions = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.sort_by, Some(SortKey::Unsupported));
    }

    #[test]
    fn test_output_conversion_checks_kind() {
        let output = TaskOutput::Features(Features::default());
        assert_eq!(output.kind(), TaskKind::ExtractFeatures);
        assert!(ProcessingResult::from_task_output(output.clone()).is_err());
        assert!(TaskOutput::from_task_output(output.clone()).is_ok());
        assert!(Features::from_task_output(output).is_ok());
    }

    #[test]
    fn test_truncate_error_message() {
        let short = "x".repeat(MAX_ERROR_MESSAGE_LEN);
        assert_eq!(truncate_error_message(&short), short);

        let long = "x".repeat(600);
        let truncated = truncate_error_message(&long);
        assert!(truncated.len() <= MAX_ERROR_MESSAGE_LEN);
        assert!(truncated.ends_with(TRUNCATED_SUFFIX));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "ã".repeat(400);
        let truncated = truncate_error_message(&long);
        assert!(truncated.len() <= MAX_ERROR_MESSAGE_LEN);
        assert!(truncated.ends_with(TRUNCATED_SUFFIX));
    }
}
