//! Offload dispatcher
//!
//! [`Dispatcher`] is a cheap, cloneable handle. All mutable state (the
//! pending registry and the background worker) lives in a single actor task
//! that reacts to three things in one `select!` loop: commands from handles,
//! events from the worker, and the earliest pending deadline. Because only
//! the actor touches the registry, every entry is settled exactly once
//! without locking.

use super::pending::PendingTask;
use super::registry::{PendingEntry, TaskRegistry};
use crate::config::DispatcherConfig;
use crate::error::{OffloadError, OffloadResult};
use crate::observability::{DispatchMetrics, MetricsSnapshot};
use crate::processing::fallback;
use crate::protocol::{
    decode_response, encode_request, Features, FromTaskOutput, ProcessingOptions,
    ProcessingResult, Record, RequestEnvelope, TaskId, TaskOutput, TaskRequest,
};
use crate::worker::{ThreadWorkerSpawner, WorkerEvent, WorkerLink, WorkerPort, WorkerSpawner};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Messages from handles to the actor
enum Command {
    Submit {
        task_id: TaskId,
        request: TaskRequest,
        deadline: Instant,
        responder: oneshot::Sender<OffloadResult<TaskOutput>>,
    },
    Shutdown {
        done: oneshot::Sender<usize>,
    },
}

/// Handle for offloading record processing to a background worker
///
/// Construct one per host application and clone it to every call site.
/// When the last handle is dropped the actor stops, the worker is
/// terminated and outstanding tasks are rejected.
///
/// # Examples
/// ```no_run
/// use property_offload::{DispatcherConfig, Dispatcher, ProcessingOptions, Record};
///
/// # async fn run() -> Result<(), property_offload::OffloadError> {
/// let dispatcher = Dispatcher::new(&DispatcherConfig::default());
/// let records = vec![Record::new().with_price(350_000.0)];
/// let result = dispatcher
///     .process_properties(records, ProcessingOptions::new().limit(10))
///     .await?;
/// assert_eq!(result.metadata.total_count, 1);
/// dispatcher.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    commands: mpsc::UnboundedSender<Command>,
    sequence: Arc<AtomicU64>,
    task_timeout: Duration,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("instance_id", &self.metrics.instance_id())
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher backed by OS worker threads
    ///
    /// Must be called from within a Tokio runtime. No worker is started
    /// until the first submission.
    pub fn new(config: &DispatcherConfig) -> Self {
        let spawner = ThreadWorkerSpawner::new(config.worker_thread_name.clone());
        Self::with_spawner(config, Arc::new(spawner))
    }

    /// Create a dispatcher with a custom worker factory
    pub fn with_spawner(config: &DispatcherConfig, spawner: Arc<dyn WorkerSpawner>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(DispatchMetrics::new());
        let task_timeout = config.task_timeout();

        let actor = DispatcherActor::new(
            commands_rx,
            spawner,
            task_timeout,
            config.worker_enabled,
            metrics.clone(),
        );
        let span = crate::dispatch_span!(instance_id = %metrics.instance_id());
        tokio::spawn(actor.run().instrument(span));

        info!(
            instance_id = %metrics.instance_id(),
            task_timeout_ms = task_timeout.as_millis() as u64,
            worker_enabled = config.worker_enabled,
            "Offload dispatcher created"
        );

        Self {
            commands: commands_tx,
            sequence: Arc::new(AtomicU64::new(0)),
            task_timeout,
            metrics,
        }
    }

    /// Offload one task
    ///
    /// Never blocks. The returned future settles with the task's output or
    /// with the error that ended it.
    pub fn submit<T: FromTaskOutput>(&self, request: TaskRequest) -> PendingTask<T> {
        let kind = request.kind();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let task_id = TaskId::new(kind, sequence);
        let deadline = Instant::now() + self.task_timeout;
        let (responder, receiver) = oneshot::channel();

        let command = Command::Submit {
            task_id: task_id.clone(),
            request,
            deadline,
            responder,
        };
        // On failure the responder is dropped with the command and the
        // pending task resolves to DispatcherClosed.
        if self.commands.send(command).is_err() {
            warn!(task_id = %task_id, "Submission after dispatcher stopped");
        }

        PendingTask::new(task_id, kind, deadline, receiver)
    }

    /// Filter, sort and limit a record list in the background
    pub fn process_properties(
        &self,
        data: Vec<Record>,
        options: ProcessingOptions,
    ) -> PendingTask<ProcessingResult> {
        self.submit(TaskRequest::ProcessProperties { data, options })
    }

    /// Summarise a record list in the background
    pub fn extract_features(&self, data: Vec<Record>) -> PendingTask<Features> {
        self.submit(TaskRequest::ExtractFeatures { data })
    }

    /// Terminate the worker and reject every outstanding task
    ///
    /// Returns how many tasks were rejected. The dispatcher stays usable:
    /// the next submission starts a fresh worker.
    pub async fn shutdown(&self) -> OffloadResult<usize> {
        let (done, rejected) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { done })
            .map_err(|_| OffloadError::DispatcherClosed)?;
        rejected.await.map_err(|_| OffloadError::DispatcherClosed)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }
}

/// Lifecycle of the background worker as seen by the actor
enum ContextState {
    /// Nothing running; the next submission spawns a worker
    Idle,
    Running(ActiveWorker),
    /// Spawning failed; everything runs in-process until shutdown
    Unavailable { reason: String },
    /// Workers are switched off by configuration
    Disabled,
}

struct ActiveWorker {
    generation: u64,
    port: Box<dyn WorkerPort>,
}

struct DispatcherActor {
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    spawner: Arc<dyn WorkerSpawner>,
    registry: TaskRegistry,
    context: ContextState,
    generation: u64,
    task_timeout: Duration,
    worker_enabled: bool,
    metrics: Arc<DispatchMetrics>,
}

impl DispatcherActor {
    fn new(
        commands: mpsc::UnboundedReceiver<Command>,
        spawner: Arc<dyn WorkerSpawner>,
        task_timeout: Duration,
        worker_enabled: bool,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            commands,
            events_tx,
            events_rx,
            spawner,
            registry: TaskRegistry::new(),
            context: Self::initial_context(worker_enabled),
            generation: 0,
            task_timeout,
            worker_enabled,
            metrics,
        }
    }

    fn initial_context(worker_enabled: bool) -> ContextState {
        if worker_enabled {
            ContextState::Idle
        } else {
            ContextState::Disabled
        }
    }

    async fn run(mut self) {
        debug!("Dispatcher actor started");

        loop {
            let next_deadline = self.registry.next_deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(event) = self.events_rx.recv() => self.handle_worker_event(event),

                _ = wait_for_deadline(next_deadline) => self.expire_overdue(Instant::now()),
            }
        }

        let rejected = self.teardown();
        info!(rejected, "Dispatcher actor stopped, all handles dropped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit {
                task_id,
                request,
                deadline,
                responder,
            } => self.handle_submit(task_id, request, deadline, responder),
            Command::Shutdown { done } => {
                let rejected = self.teardown();
                info!(rejected, "Dispatcher shut down");
                let _ = done.send(rejected);
            }
        }
    }

    fn handle_submit(
        &mut self,
        task_id: TaskId,
        request: TaskRequest,
        deadline: Instant,
        responder: oneshot::Sender<OffloadResult<TaskOutput>>,
    ) {
        self.metrics.record_submitted();

        if !self.ensure_context() {
            self.run_fallback(&task_id, &request, responder);
            return;
        }

        let kind = request.kind();
        let records = request.records().len();
        self.registry
            .insert(task_id.clone(), PendingEntry::new(kind, responder, deadline));

        let envelope = RequestEnvelope {
            task_id: task_id.clone(),
            request,
        };
        let payload = match encode_request(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                if let Some(entry) = self.registry.take(&task_id) {
                    self.metrics.record_failed();
                    entry.reject(e.into());
                }
                return;
            }
        };

        let posted = match &mut self.context {
            ContextState::Running(worker) => worker.port.post(payload),
            _ => Ok(()),
        };
        match posted {
            Ok(()) => debug!(task_id = %task_id, kind = %kind, records, "Task posted to worker"),
            Err(e) => self.fail_context(format!("failed to post task {task_id}: {e}")),
        }

        self.metrics.set_pending(self.registry.len());
    }

    /// Make sure a worker is running; false means run in-process
    fn ensure_context(&mut self) -> bool {
        match self.context {
            ContextState::Running(_) => return true,
            ContextState::Unavailable { .. } | ContextState::Disabled => return false,
            ContextState::Idle => {}
        }

        self.generation += 1;
        let link = WorkerLink::new(self.generation, self.events_tx.clone());
        match self.spawner.spawn(link) {
            Ok(port) => {
                self.metrics.record_context_spawned();
                info!(generation = self.generation, "Background worker started");
                self.context = ContextState::Running(ActiveWorker {
                    generation: self.generation,
                    port,
                });
                true
            }
            Err(e) => {
                self.metrics.record_context_failure();
                warn!(
                    error = %e,
                    "Background worker unavailable, running tasks in-process"
                );
                self.context = ContextState::Unavailable {
                    reason: e.to_string(),
                };
                false
            }
        }
    }

    fn run_fallback(
        &mut self,
        task_id: &TaskId,
        request: &TaskRequest,
        responder: oneshot::Sender<OffloadResult<TaskOutput>>,
    ) {
        if let ContextState::Unavailable { reason } = &self.context {
            debug!(task_id = %task_id, reason = %reason, "Running task in-process");
        } else {
            debug!(task_id = %task_id, "Running task in-process");
        }

        self.metrics.record_fallback();
        let output = fallback::execute(request);
        self.metrics.record_completed();
        let _ = responder.send(Ok(output));
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        let current = match &self.context {
            ContextState::Running(worker) => Some(worker.generation),
            _ => None,
        };
        if current != Some(event.generation()) {
            debug!(
                generation = event.generation(),
                "Ignoring event from retired worker"
            );
            return;
        }

        match event {
            WorkerEvent::Message { payload, .. } => self.handle_response(&payload),
            WorkerEvent::Failed { reason, .. } => self.fail_context(reason),
        }
    }

    fn handle_response(&mut self, payload: &str) {
        let envelope = match decode_response(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Without a readable id the response cannot be routed
                error!(error = %e, "Undecodable response from worker");
                self.fail_context(format!("undecodable response: {e}"));
                return;
            }
        };

        let (task_id, outcome) = envelope.into_outcome();
        let Some(entry) = self.registry.take(&task_id) else {
            self.metrics.record_late_response();
            debug!(task_id = %task_id, "Dropping response for task no longer pending");
            return;
        };
        self.metrics.set_pending(self.registry.len());

        match outcome {
            Ok(output) if output.kind() == entry.kind() => {
                self.metrics.record_completed();
                debug!(
                    task_id = %task_id,
                    elapsed_ms = entry.elapsed().as_millis() as u64,
                    "Task completed"
                );
                entry.resolve(output);
            }
            Ok(output) => {
                self.metrics.record_failed();
                warn!(
                    task_id = %task_id,
                    expected = %entry.kind(),
                    actual = %output.kind(),
                    "Worker answered with the wrong result kind"
                );
                let expected = entry.kind();
                entry.reject(OffloadError::UnexpectedOutput {
                    task_id,
                    expected,
                    actual: output.kind(),
                });
            }
            Err(message) => {
                self.metrics.record_failed();
                debug!(task_id = %task_id, error = %message, "Task failed in worker");
                entry.reject(OffloadError::task_failed(task_id, message));
            }
        }
    }

    fn expire_overdue(&mut self, now: Instant) {
        for (task_id, entry) in self.registry.take_expired(now) {
            self.metrics.record_timed_out();
            warn!(
                task_id = %task_id,
                kind = %entry.kind(),
                timeout_ms = self.task_timeout.as_millis() as u64,
                "Task timed out, late response will be dropped"
            );
            entry.reject(OffloadError::timeout(task_id, self.task_timeout));
        }
        self.metrics.set_pending(self.registry.len());
    }

    /// Retire the current worker and reject everything pending on it
    fn fail_context(&mut self, reason: String) {
        self.metrics.record_context_failure();
        error!(reason = %reason, pending = self.registry.len(), "Background worker failed");

        if let ContextState::Running(mut worker) =
            std::mem::replace(&mut self.context, ContextState::Idle)
        {
            worker.port.terminate();
        }

        for (task_id, entry) in self.registry.drain() {
            self.metrics.record_failed();
            debug!(task_id = %task_id, "Rejecting task after worker failure");
            entry.reject(OffloadError::worker_failed(reason.clone()));
        }
        self.metrics.set_pending(0);
    }

    /// Terminate the worker, reject all pending tasks, reset the context
    fn teardown(&mut self) -> usize {
        let previous = std::mem::replace(
            &mut self.context,
            Self::initial_context(self.worker_enabled),
        );
        if let ContextState::Running(mut worker) = previous {
            info!(generation = worker.generation, "Terminating background worker");
            worker.port.terminate();
        }

        let pending = self.registry.drain();
        let rejected = pending.len();
        for (task_id, entry) in pending {
            self.metrics.record_failed();
            entry.reject(OffloadError::Shutdown { task_id });
        }
        self.metrics.set_pending(0);
        rejected
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
