//! Error types for the worker pool.
//!
//! This module defines the central [`PoolError`] enum, which captures every
//! way a submitted task can fail to produce its result. A task-local failure
//! never affects other tasks or the pool itself.
//!
//! ## Error Cases
//! - `Task`: the job's own logic returned an error.
//! - `WorkerCrashed`: the worker thread executing the job died mid-task.
//! - `QueueFull`: submission rejected because a bounded queue was at capacity.
//! - `TimedOut`: the task exceeded its execution budget.
//! - `Cancelled`: the task was cancelled while still queued.
//! - `Shutdown`: the pool was shut down before (or while) the task ran.

use core::time::Duration;
use thiserror::Error;

/// Unified error type surfaced through a task's completion handle or returned
/// synchronously by [`Pool::submit`].
///
/// `E` is the error type of the submitted job itself.
///
/// [`Pool::submit`]: crate::Pool::submit
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The job returned an error. Pool health is unaffected.
    #[error("task execution failed")]
    Task(E),

    /// The worker thread died (a panic escaped the job) while this task was
    /// assigned to it.
    #[error("worker crashed while executing the task: {detail}")]
    WorkerCrashed { detail: String },

    /// A bounded task queue was at capacity at submission time. Returned
    /// synchronously; the task was never enqueued.
    #[error("task queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// The task exceeded its configured execution budget. The worker may
    /// still be running; its eventual result is discarded.
    #[error("task timed out after {limit:?}")]
    TimedOut { limit: Duration },

    /// The task was cancelled while it was still waiting in the queue.
    #[error("task cancelled before dispatch")]
    Cancelled,

    /// The pool is shutting down or has shut down.
    #[error("pool is shut down")]
    Shutdown,
}
