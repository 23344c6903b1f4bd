use core::time::Duration;

/// How the pool reacts when a worker thread crashes.
///
/// The policy is chosen once at construction and applied at the single
/// crash-handling site; the in-flight task always fails with
/// [`PoolError::WorkerCrashed`] first, regardless of policy.
///
/// [`PoolError::WorkerCrashed`]: crate::PoolError::WorkerCrashed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrashPolicy {
    /// Replace the crashed slot with a fresh thread, preserving pool size.
    #[default]
    Respawn,

    /// Run on with one fewer slot. If the last slot crashes away, the pool
    /// stops and queued tasks fail with [`PoolError::Shutdown`].
    ///
    /// [`PoolError::Shutdown`]: crate::PoolError::Shutdown
    Degrade,

    /// Stop the pool: every other queued and in-flight task fails with
    /// [`PoolError::Shutdown`].
    ///
    /// [`PoolError::Shutdown`]: crate::PoolError::Shutdown
    FailPool,
}

/// Shutdown behavior for [`Pool::shutdown`].
///
/// [`Pool::shutdown`]: crate::Pool::shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Reject new submissions, let queued and in-flight tasks complete, then
    /// terminate the workers.
    Graceful,

    /// Reject new submissions and fail all queued and in-flight tasks with
    /// [`PoolError::Shutdown`]. Worker threads cannot be pre-empted
    /// mid-instruction, so a busy thread finishes its current job in the
    /// background and its result is discarded.
    ///
    /// [`PoolError::Shutdown`]: crate::PoolError::Shutdown
    Immediate,
}

/// Construction options for a [`Pool`].
///
/// ```
/// use forgepool::{CrashPolicy, PoolConfig};
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .queue_capacity(128)
///     .task_timeout(Duration::from_secs(30))
///     .crash_policy(CrashPolicy::Respawn);
/// ```
///
/// [`Pool`]: crate::Pool
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    pub(crate) queue_capacity: Option<usize>,
    pub(crate) task_timeout: Option<Duration>,
    pub(crate) crash_policy: CrashPolicy,
}

impl PoolConfig {
    /// Default options: unbounded queue, no task timeout, respawn-on-crash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the backlog of tasks waiting for an idle worker. Submissions
    /// that would exceed the bound fail synchronously with
    /// [`PoolError::QueueFull`].
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    ///
    /// [`PoolError::QueueFull`]: crate::PoolError::QueueFull
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets a per-task execution budget, measured from dispatch to a worker.
    /// Time spent waiting in the queue does not count.
    ///
    /// The timeout is advisory: it resolves the task's handle with
    /// [`PoolError::TimedOut`] but does not stop the worker, whose eventual
    /// result is discarded.
    ///
    /// [`PoolError::TimedOut`]: crate::PoolError::TimedOut
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Sets the [`CrashPolicy`]. Defaults to [`CrashPolicy::Respawn`].
    pub fn crash_policy(mut self, policy: CrashPolicy) -> Self {
        self.crash_policy = policy;
        self
    }
}
