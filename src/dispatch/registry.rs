//! Pending task bookkeeping
//!
//! Maps each outstanding task id to the channel its caller is waiting on.
//! An entry is removed exactly once, by whichever of response, timeout,
//! worker failure or shutdown gets to it first.

use crate::error::{OffloadError, OffloadResult};
use crate::protocol::{TaskId, TaskKind, TaskOutput};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// One outstanding task
#[derive(Debug)]
pub struct PendingEntry {
    kind: TaskKind,
    responder: oneshot::Sender<OffloadResult<TaskOutput>>,
    deadline: Instant,
    submitted_at: Instant,
}

impl PendingEntry {
    pub fn new(
        kind: TaskKind,
        responder: oneshot::Sender<OffloadResult<TaskOutput>>,
        deadline: Instant,
    ) -> Self {
        Self {
            kind,
            responder,
            deadline,
            submitted_at: Instant::now(),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// Deliver the output. A caller that stopped waiting is not an error.
    pub fn resolve(self, output: TaskOutput) {
        let _ = self.responder.send(Ok(output));
    }

    pub fn reject(self, error: OffloadError) {
        let _ = self.responder.send(Err(error));
    }
}

/// Outstanding tasks keyed by id
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: HashMap<TaskId, PendingEntry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; ids come from a per-dispatcher counter and never repeat
    pub fn insert(&mut self, task_id: TaskId, entry: PendingEntry) {
        self.entries.insert(task_id, entry);
    }

    pub fn take(&mut self, task_id: &TaskId) -> Option<PendingEntry> {
        self.entries.remove(task_id)
    }

    /// Remove every entry whose deadline is at or before `now`, earliest first
    pub fn take_expired(&mut self, now: Instant) -> Vec<(TaskId, PendingEntry)> {
        let expired: Vec<TaskId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(task_id, _)| task_id.clone())
            .collect();

        let mut taken: Vec<(TaskId, PendingEntry)> = expired
            .into_iter()
            .filter_map(|task_id| self.entries.remove(&task_id).map(|entry| (task_id, entry)))
            .collect();
        taken.sort_by_key(|(_, entry)| entry.deadline);
        taken
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|entry| entry.deadline).min()
    }

    /// Remove every entry
    pub fn drain(&mut self) -> Vec<(TaskId, PendingEntry)> {
        self.entries.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Features;

    fn entry(
        kind: TaskKind,
        deadline: Instant,
    ) -> (PendingEntry, oneshot::Receiver<OffloadResult<TaskOutput>>) {
        let (tx, rx) = oneshot::channel();
        (PendingEntry::new(kind, tx, deadline), rx)
    }

    #[test]
    fn test_insert_and_take() {
        let mut registry = TaskRegistry::new();
        let id = TaskId::new(TaskKind::ExtractFeatures, 1);
        let (pending, _rx) = entry(TaskKind::ExtractFeatures, Instant::now());

        registry.insert(id.clone(), pending);
        assert_eq!(registry.len(), 1);

        let taken = registry.take(&id).unwrap();
        assert_eq!(taken.kind(), TaskKind::ExtractFeatures);
        assert!(registry.take(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_take_expired_respects_deadlines() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new();
        let (late, _rx1) = entry(TaskKind::ProcessProperties, now + Duration::from_secs(10));
        let (second, _rx2) = entry(TaskKind::ExtractFeatures, now);
        let (first, _rx3) = entry(TaskKind::ExtractFeatures, now - Duration::from_millis(5));

        registry.insert(TaskId::from("process-1"), late);
        registry.insert(TaskId::from("extract-2"), second);
        registry.insert(TaskId::from("extract-3"), first);

        let expired = registry.take_expired(now);
        let ids: Vec<&str> = expired.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["extract-3", "extract-2"]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.next_deadline(),
            Some(now + Duration::from_secs(10))
        );
    }

    #[test]
    fn test_next_deadline_empty() {
        assert!(TaskRegistry::new().next_deadline().is_none());
    }

    #[test]
    fn test_drain_empties_registry() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new();
        let (a, _rx1) = entry(TaskKind::ProcessProperties, now);
        let (b, _rx2) = entry(TaskKind::ExtractFeatures, now);
        let (c, _rx3) = entry(TaskKind::ExtractFeatures, now);
        registry.insert(TaskId::from("process-1"), a);
        registry.insert(TaskId::from("extract-2"), b);
        registry.insert(TaskId::from("extract-3"), c);

        let mut drained: Vec<TaskKind> = registry.drain().into_iter().map(|(_, e)| e.kind()).collect();
        drained.sort_by_key(|kind| kind.to_string());
        assert_eq!(
            drained,
            vec![TaskKind::ExtractFeatures, TaskKind::ExtractFeatures, TaskKind::ProcessProperties]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_and_reject_reach_the_caller() {
        let (resolved, mut rx) = entry(TaskKind::ExtractFeatures, Instant::now());
        resolved.resolve(TaskOutput::Features(Features::default()));
        assert!(matches!(rx.try_recv(), Ok(Ok(TaskOutput::Features(_)))));

        let (rejected, mut rx) = entry(TaskKind::ExtractFeatures, Instant::now());
        rejected.reject(OffloadError::DispatcherClosed);
        assert!(matches!(
            rx.try_recv(),
            Ok(Err(OffloadError::DispatcherClosed))
        ));
    }

    #[test]
    fn test_resolve_after_caller_left_is_silent() {
        let (pending, rx) = entry(TaskKind::ExtractFeatures, Instant::now());
        drop(rx);
        pending.resolve(TaskOutput::Features(Features::default()));
    }
}
