//! Mock worker implementations
//!
//! [`MockWorkerSpawner`] stands in for real worker threads so dispatcher
//! behaviour (fallback, failures, timeouts, late responses) can be driven
//! deterministically from tests.

use crate::protocol::{decode_request, encode_response, ResponseEnvelope, TaskId};
use crate::worker::{
    handle_request, HandledRequest, WorkerError, WorkerLink, WorkerPort, WorkerSpawner,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// How a mock worker reacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockWorkerBehavior {
    /// Computes every task immediately with the real handler
    Healthy,
    /// Spawning fails
    Unavailable,
    /// Accepts tasks but never answers unless driven by the test
    Silent,
    /// Answers every task with an `error` envelope
    FailTasks,
    /// Reports a catastrophic failure on the first post
    CrashOnPost,
}

pub const MOCK_TASK_ERROR: &str = "mock task failure";
pub const MOCK_CRASH_REASON: &str = "mock worker crashed";

#[derive(Debug, Default)]
struct MockState {
    spawn_attempts: AtomicUsize,
    terminations: AtomicUsize,
    posted: Mutex<Vec<String>>,
    link: Mutex<Option<WorkerLink>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Spawner whose workers follow a script of behaviours
///
/// Each spawn consumes the next behaviour; the last one repeats.
#[derive(Debug)]
pub struct MockWorkerSpawner {
    script: Mutex<VecDeque<MockWorkerBehavior>>,
    state: Arc<MockState>,
}

impl MockWorkerSpawner {
    pub fn new(behavior: MockWorkerBehavior) -> Self {
        Self::scripted(vec![behavior])
    }

    pub fn scripted(behaviors: Vec<MockWorkerBehavior>) -> Self {
        Self {
            script: Mutex::new(behaviors.into()),
            state: Arc::new(MockState::default()),
        }
    }

    fn next_behavior(&self) -> MockWorkerBehavior {
        let mut script = lock(&self.script);
        if script.len() > 1 {
            script.pop_front().unwrap_or(MockWorkerBehavior::Healthy)
        } else {
            script.front().copied().unwrap_or(MockWorkerBehavior::Healthy)
        }
    }

    pub fn spawn_attempts(&self) -> usize {
        self.state.spawn_attempts.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.state.terminations.load(Ordering::SeqCst)
    }

    /// Every request payload posted to any mock worker, in order
    pub fn posted(&self) -> Vec<String> {
        lock(&self.state.posted).clone()
    }

    pub fn posted_task_ids(&self) -> Vec<TaskId> {
        self.posted()
            .iter()
            .filter_map(|payload| decode_request(payload).ok())
            .map(|envelope| envelope.task_id)
            .collect()
    }

    /// Generation of the most recently spawned worker
    pub fn current_generation(&self) -> Option<u64> {
        lock(&self.state.link).as_ref().map(WorkerLink::generation)
    }

    /// Report a catastrophic failure from the most recent worker
    pub fn crash(&self, reason: &str) -> bool {
        match lock(&self.state.link).as_ref() {
            Some(link) => link.fail(reason),
            None => false,
        }
    }

    /// Send an arbitrary response from the most recent worker
    pub fn inject_response(&self, response: &ResponseEnvelope) -> bool {
        match encode_response(response) {
            Ok(payload) => self.inject_raw(payload),
            Err(_) => false,
        }
    }

    /// Send a raw payload from the most recent worker
    pub fn inject_raw(&self, payload: String) -> bool {
        match lock(&self.state.link).as_ref() {
            Some(link) => link.reply(payload),
            None => false,
        }
    }

    /// Compute a posted task with the real handler and send its response
    pub fn complete(&self, task_id: &TaskId) -> bool {
        let payload = self.posted().into_iter().find(|payload| {
            decode_request(payload)
                .map(|envelope| &envelope.task_id == task_id)
                .unwrap_or(false)
        });

        match payload.map(|payload| handle_request(&payload)) {
            Some(HandledRequest::Reply(response)) => self.inject_raw(response),
            _ => false,
        }
    }
}

impl WorkerSpawner for MockWorkerSpawner {
    fn spawn(&self, link: WorkerLink) -> Result<Box<dyn WorkerPort>, WorkerError> {
        self.state.spawn_attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self.next_behavior();

        if behavior == MockWorkerBehavior::Unavailable {
            return Err(WorkerError::Unavailable(
                "mock worker unavailable".to_string(),
            ));
        }

        *lock(&self.state.link) = Some(link.clone());
        Ok(Box::new(MockWorker {
            behavior,
            link,
            state: self.state.clone(),
            terminated: AtomicBool::new(false),
        }))
    }
}

struct MockWorker {
    behavior: MockWorkerBehavior,
    link: WorkerLink,
    state: Arc<MockState>,
    terminated: AtomicBool,
}

impl WorkerPort for MockWorker {
    fn post(&mut self, payload: String) -> Result<(), WorkerError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(WorkerError::Disconnected);
        }
        lock(&self.state.posted).push(payload.clone());

        match self.behavior {
            MockWorkerBehavior::Healthy => match handle_request(&payload) {
                HandledRequest::Reply(response) => {
                    self.link.reply(response);
                }
                HandledRequest::Fatal(reason) => {
                    self.link.fail(reason);
                }
            },
            MockWorkerBehavior::FailTasks => {
                if let Ok(envelope) = decode_request(&payload) {
                    let response = ResponseEnvelope::error(envelope.task_id, MOCK_TASK_ERROR);
                    if let Ok(response) = encode_response(&response) {
                        self.link.reply(response);
                    }
                }
            }
            MockWorkerBehavior::CrashOnPost => {
                self.link.fail(MOCK_CRASH_REASON);
            }
            MockWorkerBehavior::Silent | MockWorkerBehavior::Unavailable => {}
        }
        Ok(())
    }

    fn terminate(&mut self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            self.state.terminations.fetch_add(1, Ordering::SeqCst);
        }
    }
}
