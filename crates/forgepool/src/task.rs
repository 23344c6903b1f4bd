use crate::error::PoolError;
use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use parking_lot::Mutex;
use std::sync::Weak;
use tokio::sync::oneshot;

/// Identifier for a submitted task, unique within its pool and monotonically
/// increasing in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Type-erased job body. Resolves its own completion cell when run.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Failure injected by the pool manager rather than by the job itself.
#[derive(Debug, Clone)]
pub(crate) enum Abort {
    Crashed { detail: String },
    TimedOut { limit: Duration },
    Cancelled,
    Shutdown,
}

impl Abort {
    fn into_error<E>(self) -> PoolError<E> {
        match self {
            Abort::Crashed { detail } => PoolError::WorkerCrashed { detail },
            Abort::TimedOut { limit } => PoolError::TimedOut { limit },
            Abort::Cancelled => PoolError::Cancelled,
            Abort::Shutdown => PoolError::Shutdown,
        }
    }
}

/// Manager-side view of a completion: the pool can only fail a task, never
/// succeed it on the job's behalf.
pub(crate) trait Fail: Send + Sync {
    /// Resolves the handle with `abort` unless it has already resolved.
    /// Returns whether this call performed the resolution.
    fn fail(&self, abort: Abort) -> bool;
}

/// Take-once wrapper around the handle's oneshot sender.
///
/// The sender can be taken by exactly one resolver, so double resolution is
/// unrepresentable: a late worker result for a timed-out task, or a late
/// abort for a finished one, finds the cell empty and is discarded.
pub(crate) struct Completion<T, E> {
    tx: Mutex<Option<oneshot::Sender<Result<T, PoolError<E>>>>>,
}

impl<T, E> Completion<T, E> {
    pub(crate) fn new(tx: oneshot::Sender<Result<T, PoolError<E>>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Takes the sender and resolves the handle. A dropped handle is treated
    /// the same as a delivered result.
    pub(crate) fn resolve(&self, result: Result<T, PoolError<E>>) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }
}

impl<T: Send, E: Send> Fail for Completion<T, E> {
    fn fail(&self, abort: Abort) -> bool {
        self.resolve(Err(abort.into_error()))
    }
}

/// Completion handle for a submitted task.
///
/// Resolves exactly once: with the job's own `Ok`/`Err` outcome, or with a
/// pool-level error ([`PoolError::WorkerCrashed`], [`PoolError::TimedOut`],
/// [`PoolError::Cancelled`], [`PoolError::Shutdown`]). Dropping the handle
/// does not cancel the task; use [`TaskHandle::cancel`] for that.
pub struct TaskHandle<T, E> {
    id: TaskId,
    rx: oneshot::Receiver<Result<T, PoolError<E>>>,
    pool: Weak<crate::pool::Shared>,
}

impl<T, E> TaskHandle<T, E> {
    pub(crate) fn new(
        id: TaskId,
        rx: oneshot::Receiver<Result<T, PoolError<E>>>,
        pool: Weak<crate::pool::Shared>,
    ) -> Self {
        Self { id, rx, pool }
    }

    /// The identifier assigned to this task at submission.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Cancels the task if it is still waiting in the queue, resolving the
    /// handle with [`PoolError::Cancelled`].
    ///
    /// Returns `false` if the task was already dispatched, already resolved,
    /// or the pool is gone. A task running on a worker thread cannot be
    /// interrupted, so in-flight cancellation is best-effort only.
    pub fn cancel(&self) -> bool {
        match self.pool.upgrade() {
            Some(shared) => shared.cancel(self.id),
            None => false,
        }
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, PoolError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // A closed channel means the pool was torn down without resolving
            // this task.
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Shutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}
