//! Offload protocol: record shapes and the task envelopes that carry them
//!
//! This module defines the vocabulary shared by the dispatcher and the
//! background worker. It performs no computation of its own.

pub mod envelopes;
pub mod records;

pub use envelopes::{
    decode_request, decode_response, encode_request, encode_response, truncate_error_message,
    CodecError, FromTaskOutput, RequestEnvelope, ResponseEnvelope, TaskId, TaskKind, TaskOutput, TaskRequest,
    MAX_ERROR_MESSAGE_LEN,
};
pub use records::{
    Features, ProcessingMetadata, ProcessingOptions, ProcessingResult, Record, SortDirection,
    SortKey, TRANSACTION_RENT, TRANSACTION_SALE,
};
