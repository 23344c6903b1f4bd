//! Worker slot lifecycle: thread spawn, assignment loop, crash detection.
//!
//! Each slot is one OS thread listening on its own capacity-1 assignment
//! channel. After finishing a job the thread reports back to the pool manager
//! and is told, inside the same critical section, whether to run the next
//! queued task, go idle, or terminate. A panic escaping a job is caught here
//! and reported as a crash; the thread then exits and the configured crash
//! policy decides whether a replacement is spawned.

use crate::pool::Shared;
use crate::state::WorkerId;
use crate::task::Job;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a worker does after reporting a finished task. Decided by the pool
/// manager while it holds the state lock.
pub(crate) enum Directive {
    /// Run the next queued task without going idle in between.
    Run(Job),
    /// Wait for the next assignment on the slot channel.
    Wait,
    /// Terminate the slot.
    Exit,
}

/// Spawns the OS thread backing one worker slot.
pub(crate) fn spawn_slot(shared: &Arc<Shared>, id: WorkerId, rx: mpsc::Receiver<Job>) {
    let shared = Arc::clone(shared);
    std::thread::Builder::new()
        .name(format!("forgepool-{id}"))
        .spawn(move || run(shared, id, rx))
        .expect("failed to spawn worker thread");
}

fn run(shared: Arc<Shared>, id: WorkerId, mut rx: mpsc::Receiver<Job>) {
    #[cfg(feature = "tracing")]
    tracing::trace!(worker = id.0, "worker started");

    // The manager only assigns to slots it has already marked busy, so the
    // channel never holds more than one job.
    while let Some(first) = rx.blocking_recv() {
        let mut job = first;
        loop {
            match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(()) => match shared.task_finished(id) {
                    Directive::Run(next) => job = next,
                    Directive::Wait => break,
                    Directive::Exit => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(worker = id.0, "worker stopped");
                        return;
                    }
                },
                Err(payload) => {
                    shared.slot_crashed(id, panic_message(payload.as_ref()));
                    return;
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(worker = id.0, "worker stopped");
}

/// Best-effort extraction of a panic payload into displayable form.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
