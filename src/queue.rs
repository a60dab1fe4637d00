//! Deferred Work Queues
//!
//! Three queues shared by every node of a tree:
//!
//! - evaluate-soon: drained before every pass of the current (or next) cycle;
//! - apply-soon: batched into one coalesced flush per tree, which runs the whole
//!   batch under `run_with_cycle`. A cycle that starts first drains the batch inline
//!   and cancels the flush;
//! - after-convergence: drained once after a cycle stabilizes, outside dirty-checking.
//!
//! Every task runs against the scope that queued it, exactly once. A failing task is
//! reported and the drain continues.

use crate::digest::Phase;
use crate::report::FailureSource;
use crate::scheduler::TaskHandle;
use crate::scope::node::NodeData;
use crate::scope::tree::Tree;
use crate::scope::Scope;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Deferred work: runs once against the scope that queued it
pub type TaskFn = Box<dyn FnOnce(&Scope) -> anyhow::Result<()>>;

pub(crate) struct DeferredTask {
    source: Rc<NodeData>,
    work: TaskFn,
}

#[derive(Default)]
pub(crate) struct QueueSet {
    evaluate_soon: RefCell<VecDeque<DeferredTask>>,
    apply_soon: RefCell<VecDeque<DeferredTask>>,
    after_convergence: RefCell<VecDeque<DeferredTask>>,
    /// Pending coalesced flush, if one is scheduled.
    apply_flush: Cell<Option<TaskHandle>>,
}

impl QueueSet {
    pub(crate) fn evaluate_soon_is_empty(&self) -> bool {
        self.evaluate_soon.borrow().is_empty()
    }

    pub(crate) fn evaluate_soon_len(&self) -> usize {
        self.evaluate_soon.borrow().len()
    }

    pub(crate) fn apply_soon_len(&self) -> usize {
        self.apply_soon.borrow().len()
    }

    pub(crate) fn after_convergence_len(&self) -> usize {
        self.after_convergence.borrow().len()
    }

    fn pop(queue: &RefCell<VecDeque<DeferredTask>>) -> Option<DeferredTask> {
        queue.borrow_mut().pop_front()
    }
}

impl Scope {
    /// Queue `expr` to run against this scope before the next pass.
    ///
    /// Inside a cycle it runs within that cycle. Outside one, the first task queued
    /// also asks the scheduler for a deferred root digest, which only runs if the
    /// queue is still non-empty when it fires.
    pub fn schedule_soon(&self, expr: impl FnOnce(&Scope) -> anyhow::Result<()> + 'static) {
        if self.is_destroyed() {
            debug!(scope = %self.id(), "Dropping evaluate-soon task for destroyed scope");
            return;
        }
        let tree = &self.tree;
        if tree.phase.get() == Phase::None && tree.queues.evaluate_soon_is_empty() {
            let weak = Rc::downgrade(tree);
            tree.scheduler.schedule(Box::new(move || {
                if let Some(tree) = weak.upgrade() {
                    if !tree.queues.evaluate_soon_is_empty() {
                        Scope::run_deferred_digest(tree);
                    }
                }
            }));
        }
        tree.queues.evaluate_soon.borrow_mut().push_back(self.task(expr));
    }

    /// Queue `expr` for the tree's coalesced flush, scheduling the flush if none is
    /// pending. All tasks queued before the flush fires run in one `run_with_cycle`.
    pub fn schedule_coalesced(&self, expr: impl FnOnce(&Scope) -> anyhow::Result<()> + 'static) {
        if self.is_destroyed() {
            debug!(scope = %self.id(), "Dropping apply-soon task for destroyed scope");
            return;
        }
        let tree = &self.tree;
        tree.queues.apply_soon.borrow_mut().push_back(self.task(expr));
        if tree.queues.apply_flush.get().is_none() {
            let weak = Rc::downgrade(tree);
            let handle = tree
                .scheduler
                .schedule(Box::new(move || Scope::run_coalesced_flush(weak)));
            tree.queues.apply_flush.set(Some(handle));
        }
    }

    /// Queue `callback` to run once after the next cycle stabilizes.
    ///
    /// Changes it makes are only seen by a later cycle.
    pub fn after_convergence(
        &self,
        callback: impl FnOnce(&Scope) -> anyhow::Result<()> + 'static,
    ) {
        if self.is_destroyed() {
            debug!(scope = %self.id(), "Dropping after-convergence task for destroyed scope");
            return;
        }
        self.tree
            .queues
            .after_convergence
            .borrow_mut()
            .push_back(self.task(callback));
    }

    /// Tasks waiting in the evaluate-soon, apply-soon and after-convergence queues.
    pub fn queued_tasks(&self) -> (usize, usize, usize) {
        let queues = &self.tree.queues;
        (
            queues.evaluate_soon_len(),
            queues.apply_soon_len(),
            queues.after_convergence_len(),
        )
    }

    /// True while a coalesced flush is scheduled and has not run.
    pub fn has_pending_flush(&self) -> bool {
        self.tree.queues.apply_flush.get().is_some()
    }

    fn task(&self, work: impl FnOnce(&Scope) -> anyhow::Result<()> + 'static) -> DeferredTask {
        DeferredTask {
            source: self.node.clone(),
            work: Box::new(work),
        }
    }

    fn run_task(&self, task: DeferredTask, source: FailureSource) {
        let scope = Scope::from_parts(self.tree.clone(), task.source);
        if let Err(error) = (task.work)(&scope) {
            self.tree.report(source, scope.id(), error);
        }
    }

    /// Run every evaluate-soon task, including ones queued while draining.
    pub(crate) fn drain_evaluate_soon(&self) {
        while let Some(task) = QueueSet::pop(&self.tree.queues.evaluate_soon) {
            self.run_task(task, FailureSource::EvaluateSoon);
            // The task may have changed anything; no earlier clean result still holds.
            self.tree.last_dirty.set(None);
        }
    }

    pub(crate) fn drain_after_convergence(&self) {
        while let Some(task) = QueueSet::pop(&self.tree.queues.after_convergence) {
            self.run_task(task, FailureSource::AfterConvergence);
        }
    }

    /// Cancel a pending coalesced flush and run its batch now.
    pub(crate) fn flush_pending_apply(&self) {
        if let Some(handle) = self.tree.queues.apply_flush.get() {
            trace!(task = handle.as_u64(), "Cancelling coalesced flush; draining inline");
            self.tree.scheduler.cancel(handle);
            self.drain_apply_soon();
        }
    }

    fn drain_apply_soon(&self) {
        while let Some(task) = QueueSet::pop(&self.tree.queues.apply_soon) {
            self.run_task(task, FailureSource::ApplySoon);
        }
        self.tree.queues.apply_flush.set(None);
    }

    fn run_coalesced_flush(tree: Weak<Tree>) {
        let Some(tree) = tree.upgrade() else {
            return;
        };
        let root = Scope::root_of(tree);
        if let Err(error) = root.run_with_cycle(|scope| {
            scope.drain_apply_soon();
            Ok(())
        }) {
            root.tree
                .report(FailureSource::DeferredCycle, root.id(), error.into());
        }
    }

    fn run_deferred_digest(tree: Rc<Tree>) {
        let root = Scope::root_of(tree);
        if let Err(error) = root.digest() {
            root.tree
                .report(FailureSource::DeferredCycle, root.id(), error.into());
        }
    }
}
