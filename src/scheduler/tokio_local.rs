//! Scheduler backed by tokio local tasks.

use super::{ScheduledTask, Scheduler, TaskHandle};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tokio::task::JoinHandle;

/// Fires callbacks as `spawn_local` tasks
///
/// Scope trees are single-threaded, so callbacks are `!Send`; this scheduler must be
/// used from inside a [`tokio::task::LocalSet`]. Cancelling aborts the local task.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    inner: Rc<LocalTasks>,
}

#[derive(Default)]
struct LocalTasks {
    next_id: Cell<u64>,
    running: RefCell<HashMap<TaskHandle, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks spawned but not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.inner.running.borrow().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: ScheduledTask) -> TaskHandle {
        let handle = TaskHandle::new(self.inner.next_id.get());
        self.inner.next_id.set(handle.as_u64() + 1);

        let tasks = Rc::downgrade(&self.inner);
        let join = tokio::task::spawn_local(async move {
            if let Some(tasks) = tasks.upgrade() {
                tasks.running.borrow_mut().remove(&handle);
            }
            task();
        });
        self.inner.running.borrow_mut().insert(handle, join);
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        if let Some(join) = self.inner.running.borrow_mut().remove(&handle) {
            join.abort();
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
