//! Background execution context
//!
//! A worker is an isolated unit of execution that receives serialized request
//! envelopes and answers with serialized response envelopes. The dispatcher
//! never shares memory with it. Workers are created through a
//! [`WorkerSpawner`] so the dispatcher can be tested without real threads.

pub mod handler;
pub mod thread;

pub use handler::{handle_request, HandledRequest};
pub use thread::{ThreadWorker, ThreadWorkerSpawner};

use thiserror::Error;
use tokio::sync::mpsc;

/// Something a worker tells the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A serialized response envelope
    Message { generation: u64, payload: String },
    /// The worker can no longer be used
    Failed { generation: u64, reason: String },
}

impl WorkerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            WorkerEvent::Message { generation, .. } => *generation,
            WorkerEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// Return path from one worker instance to the dispatcher
///
/// Each spawned worker gets a link stamped with its generation so the
/// dispatcher can ignore anything a retired worker sends.
#[derive(Debug, Clone)]
pub struct WorkerLink {
    generation: u64,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerLink {
    pub fn new(generation: u64, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send a serialized response; false once the dispatcher is gone
    pub fn reply(&self, payload: String) -> bool {
        self.events
            .send(WorkerEvent::Message {
                generation: self.generation,
                payload,
            })
            .is_ok()
    }

    /// Report an unrecoverable failure; false once the dispatcher is gone
    pub fn fail<S: Into<String>>(&self, reason: S) -> bool {
        self.events
            .send(WorkerEvent::Failed {
                generation: self.generation,
                reason: reason.into(),
            })
            .is_ok()
    }
}

/// Worker creation and posting errors
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Worker unavailable: {0}")]
    Unavailable(String),
    #[error("Worker is disconnected")]
    Disconnected,
}

/// Creates background workers on demand
pub trait WorkerSpawner: Send + Sync {
    /// Start a new worker that reports back through `link`
    fn spawn(&self, link: WorkerLink) -> Result<Box<dyn WorkerPort>, WorkerError>;
}

/// Sending side of one live worker
pub trait WorkerPort: Send {
    /// Hand a serialized request envelope to the worker
    fn post(&mut self, payload: String) -> Result<(), WorkerError>;

    /// Stop the worker. Work already in progress is abandoned, not awaited.
    fn terminate(&mut self);
}
