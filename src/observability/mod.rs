//! Observability for the offload dispatcher
//!
//! Structured logging setup and per-dispatcher metrics.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{DispatchMetrics, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{dispatch_span, worker_span};
