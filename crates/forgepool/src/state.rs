use crate::task::{Fail, Job, TaskId};
use core::fmt;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::mpsc;

/// Identifier for a worker slot. A respawned slot gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WorkerId(pub(crate) u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Lifecycle phase of the pool as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    /// Graceful shutdown: no new submissions, the backlog still drains.
    Draining,
    Stopped,
}

/// A task waiting for an idle worker.
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) job: Job,
    pub(crate) completion: Arc<dyn Fail>,
}

/// Pending-registry entry: the task currently owned by a busy worker.
pub(crate) struct InFlight {
    pub(crate) completion: Arc<dyn Fail>,
}

/// Manager-side handle to a live worker slot. Dropping the sender releases a
/// worker blocked on its assignment channel.
pub(crate) struct Slot {
    pub(crate) assign_tx: mpsc::Sender<Job>,
}

/// The composite pool state: task queue, pending registry, idle set, and
/// slot table, guarded by a single mutex so the busy/idle bookkeeping and the
/// pending registry can never be observed half-updated.
pub(crate) struct PoolState {
    pub(crate) queue: VecDeque<QueuedTask>,
    pub(crate) pending: HashMap<WorkerId, InFlight>,
    pub(crate) idle: Vec<WorkerId>,
    pub(crate) slots: HashMap<WorkerId, Slot>,
    pub(crate) phase: Phase,
    next_task: u64,
    next_worker: u64,
}

impl PoolState {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            pending: HashMap::new(),
            idle: Vec::new(),
            slots: HashMap::new(),
            phase: Phase::Running,
            next_task: 0,
            next_worker: 0,
        }
    }

    pub(crate) fn next_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    pub(crate) fn next_worker_id(&mut self) -> WorkerId {
        let id = WorkerId(self.next_worker);
        self.next_worker += 1;
        id
    }

    /// Removes a still-queued task by id.
    pub(crate) fn take_queued(&mut self, id: TaskId) -> Option<QueuedTask> {
        let at = self.queue.iter().position(|task| task.id == id)?;
        self.queue.remove(at)
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.pending.is_empty()
    }

    /// Every pending entry corresponds to a non-idle slot and vice versa,
    /// and no task waits while a worker sits idle. A violation here is a
    /// bookkeeping bug, not a recoverable runtime condition.
    pub(crate) fn assert_consistent(&self) {
        debug_assert!(
            self.idle.iter().all(|id| !self.pending.contains_key(id)),
            "worker marked idle while holding an in-flight task"
        );
        debug_assert_eq!(
            self.pending.len() + self.idle.len(),
            self.slots.len(),
            "pending registry and idle set disagree with the slot table"
        );
        debug_assert!(
            self.queue.is_empty() || self.idle.is_empty(),
            "tasks queued while a worker sat idle"
        );
    }
}
