//! Task dispatch
//!
//! The [`Dispatcher`] hands tasks to a background worker, correlates the
//! responses and enforces per-task deadlines. When no worker can be started
//! it runs the same computation in-process.

pub mod dispatcher;
pub mod pending;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use pending::PendingTask;
pub use registry::{PendingEntry, TaskRegistry};
