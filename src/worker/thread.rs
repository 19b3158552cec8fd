//! Worker backed by a dedicated OS thread
//!
//! The thread owns nothing but its request queue and its link back to the
//! dispatcher. Requests and responses are JSON strings, so the only data the
//! thread sees is what the envelope carries.

use super::handler::{handle_request, HandledRequest};
use super::{WorkerError, WorkerLink, WorkerPort, WorkerSpawner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Spawns one OS thread per worker generation
#[derive(Clone)]
pub struct ThreadWorkerSpawner {
    thread_name: String,
    handler: fn(&str) -> HandledRequest,
}

impl std::fmt::Debug for ThreadWorkerSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorkerSpawner")
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl ThreadWorkerSpawner {
    pub fn new<S: Into<String>>(thread_name: S) -> Self {
        Self {
            thread_name: thread_name.into(),
            handler: handle_request,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_handler(mut self, handler: fn(&str) -> HandledRequest) -> Self {
        self.handler = handler;
        self
    }
}

impl WorkerSpawner for ThreadWorkerSpawner {
    fn spawn(&self, link: WorkerLink) -> Result<Box<dyn WorkerPort>, WorkerError> {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let name = format!("{}-{}", self.thread_name, link.generation());
        let generation = link.generation();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handler = self.handler;

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(requests_rx, link, thread_stop, handler))?;

        info!(thread = %name, generation, "Worker thread spawned");

        Ok(Box::new(ThreadWorker {
            generation,
            requests: Some(requests_tx),
            stop,
            handle: Some(handle),
        }))
    }
}

/// Dispatcher-side handle to a worker thread
pub struct ThreadWorker {
    generation: u64,
    requests: Option<mpsc::UnboundedSender<String>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerPort for ThreadWorker {
    fn post(&mut self, payload: String) -> Result<(), WorkerError> {
        let requests = self.requests.as_ref().ok_or(WorkerError::Disconnected)?;
        requests.send(payload).map_err(|_| WorkerError::Disconnected)
    }

    fn terminate(&mut self) {
        // The thread finishes the task in hand, then discards its backlog.
        // It is detached rather than joined.
        self.stop.store(true, Ordering::Release);
        if self.requests.take().is_some() {
            debug!(generation = self.generation, "Worker thread queue closed");
        }
        self.handle.take();
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Reports the worker as failed if the thread unwinds
struct CrashGuard {
    link: WorkerLink,
}

impl Drop for CrashGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(generation = self.link.generation(), "Worker thread panicked");
            self.link.fail("worker thread panicked");
        }
    }
}

fn run_worker(
    mut requests: mpsc::UnboundedReceiver<String>,
    link: WorkerLink,
    stop: Arc<AtomicBool>,
    handler: fn(&str) -> HandledRequest,
) {
    let _span = crate::worker_span!(generation = link.generation()).entered();
    let _guard = CrashGuard { link: link.clone() };

    while let Some(payload) = requests.blocking_recv() {
        if stop.load(Ordering::Acquire) {
            debug!("Worker terminated, discarding queued requests");
            break;
        }
        match handler(&payload) {
            HandledRequest::Reply(response) => {
                if !link.reply(response) {
                    debug!("Dispatcher gone, stopping worker");
                    break;
                }
            }
            HandledRequest::Fatal(reason) => {
                error!(reason = %reason, "Worker cannot continue");
                link.fail(reason);
                break;
            }
        }
    }

    debug!("Worker thread exiting");
}
