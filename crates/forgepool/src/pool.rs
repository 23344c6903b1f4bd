//! Pool manager: submission, dispatch, completion routing, and shutdown.
//!
//! The manager is the sole owner of the shared mutable state (task queue,
//! pending registry, idle set, slot table). Every mutation happens under one
//! mutex, so assignment bookkeeping is a single serialization point: no two
//! changes to a worker's busy/idle status can interleave.

use crate::config::{CrashPolicy, PoolConfig, ShutdownMode};
use crate::error::PoolError;
use crate::state::{InFlight, Phase, PoolState, QueuedTask, Slot, WorkerId};
use crate::task::{Abort, Completion, Fail, Job, TaskHandle, TaskId};
use crate::worker::{self, Directive};
use core::future::Future;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, watch};

/// Read-only snapshot of pool occupancy.
///
/// Taken under the state lock, so the three counters are mutually
/// consistent. Useful for backpressure decisions by the caller; reading it
/// never mutates pool state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Worker slots waiting for an assignment.
    pub idle_workers: usize,
    /// Worker slots currently executing a task.
    pub busy_workers: usize,
    /// Tasks waiting in the queue for an idle worker.
    pub queued_tasks: usize,
}

/// A fixed-size pool of worker threads for CPU-bound jobs.
///
/// All workers are spawned eagerly at construction, so steady-state
/// throughput is deterministic. [`Pool::submit`] never blocks: it hands the
/// job to an idle worker or appends it to a FIFO queue and returns a
/// [`TaskHandle`] that the caller awaits. Tasks dispatched directly to idle
/// workers run in parallel with no ordering guarantee; tasks that land in
/// the queue are dispatched in FIFO order relative to each other.
///
/// Dropping the pool behaves like `shutdown(ShutdownMode::Immediate)`: no
/// handle is ever left pending.
///
/// ```
/// use forgepool::{Pool, ShutdownMode};
///
/// # #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
/// # async fn main() {
/// let pool = Pool::new(2);
///
/// let task = pool.submit(|| Ok::<_, String>(21 * 2)).unwrap();
/// assert_eq!(task.await.unwrap(), 42);
///
/// pool.shutdown(ShutdownMode::Graceful).await;
/// # }
/// ```
pub struct Pool {
    shared: Arc<Shared>,
}

impl Pool {
    /// Creates a pool of `size` worker threads with default options.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        Self::with_config(size, PoolConfig::default())
    }

    /// Creates a pool of `size` worker threads with the given options.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero, or if a task timeout is configured and the
    /// pool is constructed outside a Tokio runtime (the timeout timers need
    /// a runtime to run on).
    pub fn with_config(size: usize, config: PoolConfig) -> Self {
        assert!(size >= 1, "pool size must be at least 1");

        let timer = config.task_timeout.map(|_| Handle::current());
        let (drained, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::new()),
            config,
            drained,
            timer,
        });

        {
            let mut state = shared.state.lock();
            for _ in 0..size {
                let id = state.next_worker_id();
                let (assign_tx, assign_rx) = mpsc::channel(1);
                state.slots.insert(id, Slot { assign_tx });
                state.idle.push(id);
                worker::spawn_slot(&shared, id, assign_rx);
            }
            state.assert_consistent();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(size, "pool started");

        Self { shared }
    }

    /// Submits a job and returns its completion handle.
    ///
    /// If an idle worker exists the job is dispatched immediately; otherwise
    /// it joins the FIFO queue. The handle resolves exactly once: with the
    /// job's outcome, or with a pool-level error (worker crash, timeout,
    /// cancellation, shutdown).
    ///
    /// # Errors
    ///
    /// Fails synchronously with [`PoolError::QueueFull`] when a bounded
    /// queue is at capacity, and with [`PoolError::Shutdown`] once shutdown
    /// has begun. In both cases the job is dropped without running.
    pub fn submit<F, T, E>(&self, job: F) -> Result<TaskHandle<T, E>, PoolError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Completion::new(tx));
        let erased: Arc<dyn Fail> = Arc::clone(&completion) as Arc<dyn Fail>;
        let body: Job = Box::new(move || {
            let outcome = job();
            completion.resolve(outcome.map_err(PoolError::Task));
        });

        let mut state = self.shared.state.lock();
        if state.phase != Phase::Running {
            return Err(PoolError::Shutdown);
        }

        let id = state.next_task_id();
        if let Some(worker) = state.idle.pop() {
            self.shared.dispatch(
                &mut state,
                worker,
                QueuedTask {
                    id,
                    job: body,
                    completion: erased,
                },
            );
        } else {
            if let Some(capacity) = self.shared.config.queue_capacity {
                if state.queue.len() >= capacity {
                    return Err(PoolError::QueueFull { capacity });
                }
            }
            state.queue.push_back(QueuedTask {
                id,
                job: body,
                completion: erased,
            });
        }
        state.assert_consistent();

        Ok(TaskHandle::new(id, rx, Arc::downgrade(&self.shared)))
    }

    /// Shuts the pool down.
    ///
    /// The transition happens synchronously in this call, so a
    /// [`Pool::submit`] racing the returned future already fails with
    /// [`PoolError::Shutdown`]. The returned future resolves once the pool
    /// is fully drained ([`ShutdownMode::Graceful`]) or once all outstanding
    /// handles have been failed ([`ShutdownMode::Immediate`]).
    ///
    /// Shutdown is idempotent; a graceful shutdown in progress can be
    /// escalated by a later immediate one.
    pub fn shutdown(&self, mode: ShutdownMode) -> impl Future<Output = ()> + '_ {
        self.shared.begin_shutdown(mode);
        self.shared.drained()
    }

    /// Snapshot of the current idle/busy/queued counts.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            idle_workers: state.idle.len(),
            busy_workers: state.pending.len(),
            queued_tasks: state.queue.len(),
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shared.begin_shutdown(ShutdownMode::Immediate);
    }
}

/// State shared between the pool handle, its worker threads, and timeout
/// timers.
pub(crate) struct Shared {
    state: Mutex<PoolState>,
    config: PoolConfig,
    drained: watch::Sender<bool>,
    timer: Option<Handle>,
}

impl Shared {
    /// Hands a task to a worker and records the pending entry. The caller
    /// must have removed `worker` from the idle set already; both steps
    /// happen under the same lock so the busy/idle and pending bookkeeping
    /// move together.
    fn dispatch(&self, state: &mut PoolState, worker: WorkerId, task: QueuedTask) {
        let QueuedTask {
            id,
            job,
            completion,
        } = task;

        let sent = match state.slots.get(&worker) {
            Some(slot) => slot.assign_tx.try_send(job),
            None => Err(TrySendError::Closed(job)),
        };
        match sent {
            Ok(()) => {
                self.arm_timeout(&completion);
                state.pending.insert(worker, InFlight { completion });
            }
            Err(rejected) => {
                // Only reachable if a slot died without reporting a crash.
                debug_assert!(false, "{worker} rejected an assignment");
                state.slots.remove(&worker);
                state.queue.push_front(QueuedTask {
                    id,
                    job: rejected.into_inner(),
                    completion,
                });
            }
        }
    }

    /// Starts the advisory timeout clock for a dispatched task.
    fn arm_timeout(&self, completion: &Arc<dyn Fail>) {
        let (Some(limit), Some(handle)) = (self.config.task_timeout, self.timer.as_ref()) else {
            return;
        };
        let completion = Arc::clone(completion);
        handle.spawn(async move {
            tokio::time::sleep(limit).await;
            completion.fail(Abort::TimedOut { limit });
        });
    }

    /// Completion callback from a worker: one atomic step that retires the
    /// pending entry and decides what the slot does next.
    pub(crate) fn task_finished(&self, worker: WorkerId) -> Directive {
        let mut state = self.state.lock();
        state.pending.remove(&worker);

        let directive = match state.phase {
            Phase::Stopped => {
                state.slots.remove(&worker);
                Directive::Exit
            }
            Phase::Running | Phase::Draining => {
                if let Some(task) = state.queue.pop_front() {
                    let QueuedTask {
                        job, completion, ..
                    } = task;
                    self.arm_timeout(&completion);
                    state.pending.insert(worker, InFlight { completion });
                    Directive::Run(job)
                } else if state.phase == Phase::Draining {
                    state.slots.remove(&worker);
                    self.signal_if_drained(&state);
                    Directive::Exit
                } else {
                    state.idle.push(worker);
                    Directive::Wait
                }
            }
        };
        state.assert_consistent();
        directive
    }

    /// Crash callback from a worker: fails the in-flight task with
    /// [`PoolError::WorkerCrashed`] and applies the configured crash policy.
    ///
    /// [`PoolError::WorkerCrashed`]: crate::PoolError::WorkerCrashed
    pub(crate) fn slot_crashed(self: &Arc<Self>, worker: WorkerId, detail: String) {
        #[cfg(feature = "tracing")]
        tracing::warn!(worker = worker.0, %detail, "worker crashed");

        let mut state = self.state.lock();
        state.slots.remove(&worker);
        if let Some(inflight) = state.pending.remove(&worker) {
            inflight.completion.fail(Abort::Crashed { detail });
        }

        if state.phase == Phase::Stopped {
            state.assert_consistent();
            return;
        }

        match self.config.crash_policy {
            CrashPolicy::Respawn => {
                if state.phase == Phase::Draining && state.queue.is_empty() {
                    // The drain no longer needs this slot.
                    self.signal_if_drained(&state);
                } else {
                    let id = state.next_worker_id();
                    let (assign_tx, assign_rx) = mpsc::channel(1);
                    state.slots.insert(id, Slot { assign_tx });
                    worker::spawn_slot(self, id, assign_rx);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(worker = id.0, "respawned worker slot");
                    if let Some(task) = state.queue.pop_front() {
                        self.dispatch(&mut state, id, task);
                    } else {
                        state.idle.push(id);
                    }
                }
            }
            CrashPolicy::Degrade => {
                if state.slots.is_empty() {
                    self.stop(&mut state);
                } else if state.phase == Phase::Draining {
                    self.signal_if_drained(&state);
                }
            }
            CrashPolicy::FailPool => self.stop(&mut state),
        }
        state.assert_consistent();
    }

    /// Cancels a still-queued task. Returns whether the task was removed.
    pub(crate) fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.lock();
        match state.take_queued(id) {
            Some(task) => {
                task.completion.fail(Abort::Cancelled);
                true
            }
            None => false,
        }
    }

    pub(crate) fn begin_shutdown(&self, mode: ShutdownMode) {
        let mut state = self.state.lock();
        match (state.phase, mode) {
            (Phase::Stopped, _) => {}
            (Phase::Draining, ShutdownMode::Graceful) => {}
            (_, ShutdownMode::Immediate) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    queued = state.queue.len(),
                    busy = state.pending.len(),
                    "immediate shutdown: aborting outstanding tasks"
                );
                self.stop(&mut state);
            }
            (Phase::Running, ShutdownMode::Graceful) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    queued = state.queue.len(),
                    busy = state.pending.len(),
                    "graceful shutdown: draining"
                );
                state.phase = Phase::Draining;
                let idle: Vec<WorkerId> = state.idle.drain(..).collect();
                for worker in idle {
                    state.slots.remove(&worker);
                }
                self.signal_if_drained(&state);
            }
        }
        state.assert_consistent();
    }

    /// Fails everything still outstanding and terminates the pool.
    fn stop(&self, state: &mut PoolState) {
        state.phase = Phase::Stopped;
        for task in state.queue.drain(..) {
            task.completion.fail(Abort::Shutdown);
        }
        for (_, inflight) in state.pending.drain() {
            inflight.completion.fail(Abort::Shutdown);
        }
        state.idle.clear();
        // Dropping the assignment senders releases workers blocked on their
        // channels; busy workers exit on their next completion callback.
        state.slots.clear();
        self.drained.send_replace(true);
    }

    fn signal_if_drained(&self, state: &PoolState) {
        if state.phase == Phase::Draining && state.is_drained() {
            self.drained.send_replace(true);
        }
    }

    /// Resolves once the pool has finished shutting down.
    pub(crate) async fn drained(&self) {
        let mut rx = self.drained.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
