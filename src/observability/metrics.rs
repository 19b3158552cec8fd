//! Dispatcher counters
//!
//! Each dispatcher owns one collector. Counters are atomics so the handle,
//! the actor and tests can read them without going through the actor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Thread-safe counters for one dispatcher instance
#[derive(Debug)]
pub struct DispatchMetrics {
    instance_id: Uuid,
    started_at: DateTime<Utc>,

    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_timed_out: AtomicU64,
    fallback_runs: AtomicU64,
    late_responses: AtomicU64,
    pending_tasks: AtomicU64,

    contexts_spawned: AtomicU64,
    context_failures: AtomicU64,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            started_at: Utc::now(),
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_timed_out: AtomicU64::new(0),
            fallback_runs: AtomicU64::new(0),
            late_responses: AtomicU64::new(0),
            pending_tasks: AtomicU64::new(0),
            contexts_spawned: AtomicU64::new(0),
            context_failures: AtomicU64::new(0),
        }
    }

    /// Identifier attached to this dispatcher's log spans
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// A task ran in-process instead of on a worker
    pub fn record_fallback(&self) {
        self.fallback_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// A response arrived for a task that was no longer pending
    pub fn record_late_response(&self) {
        self.late_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_spawned(&self) {
        self.contexts_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_failure(&self) {
        self.context_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_pending(&self, pending: usize) {
        self.pending_tasks.store(pending as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            instance_id: self.instance_id,
            started_at: self.started_at,
            captured_at: Utc::now(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
            fallback_runs: self.fallback_runs.load(Ordering::Relaxed),
            late_responses: self.late_responses.load(Ordering::Relaxed),
            pending_tasks: self.pending_tasks.load(Ordering::Relaxed),
            contexts_spawned: self.contexts_spawned.load(Ordering::Relaxed),
            context_failures: self.context_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub instance_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_timed_out: u64,
    pub fallback_runs: u64,
    pub late_responses: u64,
    pub pending_tasks: u64,
    pub contexts_spawned: u64,
    pub context_failures: u64,
}
