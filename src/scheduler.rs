//! Deferred Trigger Scheduling
//!
//! The engine never sleeps or spawns on its own. `schedule_soon` and
//! `schedule_coalesced` hand a one-shot callback to the tree's [`Scheduler`], which
//! must run it once, after the currently running synchronous work, unless it is
//! cancelled first.

mod tokio_local;

pub use tokio_local::TokioScheduler;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Callback handed to a scheduler
pub type ScheduledTask = Box<dyn FnOnce()>;

/// Identifies a scheduled callback so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn new(id: u64) -> Self {
        TaskHandle(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Deferred execution capability
pub trait Scheduler {
    fn schedule(&self, task: ScheduledTask) -> TaskHandle;

    /// Cancel a callback that has not fired yet. Unknown or fired handles are ignored.
    fn cancel(&self, handle: TaskHandle);
}

/// Test-controlled scheduler: callbacks only fire when the owner drives the queue
///
/// Clones share one queue, so a test can keep a clone after handing one to a tree.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<ManualQueue>,
}

#[derive(Default)]
struct ManualQueue {
    next_id: Cell<u64>,
    tasks: RefCell<VecDeque<(TaskHandle, ScheduledTask)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Fire every callback that was queued when this call started, in FIFO order.
    ///
    /// Callbacks scheduled while running wait for the next call; callbacks cancelled
    /// while running never fire. Returns how many fired.
    pub fn run_pending(&self) -> usize {
        let horizon = self.inner.next_id.get();
        let mut fired = 0;
        loop {
            let next = {
                let mut tasks = self.inner.tasks.borrow_mut();
                match tasks.front() {
                    Some((handle, _)) if handle.0 < horizon => tasks.pop_front(),
                    _ => None,
                }
            };
            let Some((handle, task)) = next else {
                break;
            };
            trace!(task = handle.0, "Firing scheduled task");
            task();
            fired += 1;
        }
        fired
    }

    /// Keep firing until nothing is queued. Returns the total fired.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let fired = self.run_pending();
            if fired == 0 {
                return total;
            }
            total += fired;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: ScheduledTask) -> TaskHandle {
        let handle = TaskHandle(self.inner.next_id.get());
        self.inner.next_id.set(handle.0 + 1);
        self.inner.tasks.borrow_mut().push_back((handle, task));
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.inner
            .tasks
            .borrow_mut()
            .retain(|(queued, _)| *queued != handle);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
