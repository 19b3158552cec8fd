//! Caller-side handle to an offloaded task

use crate::error::{OffloadError, OffloadResult};
use crate::protocol::{FromTaskOutput, TaskId, TaskKind, TaskOutput};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Resolves once the dispatcher settles the task
///
/// Dropping the handle does not cancel the task. The dispatcher still
/// removes the entry when a response, timeout or failure arrives.
#[derive(Debug)]
pub struct PendingTask<T> {
    task_id: TaskId,
    kind: TaskKind,
    deadline: Instant,
    receiver: oneshot::Receiver<OffloadResult<TaskOutput>>,
    _output: PhantomData<fn() -> T>,
}

impl<T> PendingTask<T> {
    pub(crate) fn new(
        task_id: TaskId,
        kind: TaskKind,
        deadline: Instant,
        receiver: oneshot::Receiver<OffloadResult<TaskOutput>>,
    ) -> Self {
        Self {
            task_id,
            kind,
            deadline,
            receiver,
            _output: PhantomData,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Instant after which the task is rejected with a timeout
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl<T: FromTaskOutput> Future for PendingTask<T> {
    type Output = OffloadResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let settled = match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(settled) => settled,
        };

        let result = match settled {
            Ok(Ok(output)) => {
                T::from_task_output(output).map_err(|other| OffloadError::UnexpectedOutput {
                    task_id: self.task_id.clone(),
                    expected: self.kind,
                    actual: other.kind(),
                })
            }
            Ok(Err(error)) => Err(error),
            // Actor exited without settling the entry
            Err(_) => Err(OffloadError::DispatcherClosed),
        };
        Poll::Ready(result)
    }
}
