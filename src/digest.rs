//! Digest Engine
//!
//! A stabilization cycle alternates between draining the evaluate-soon queue and
//! running one pass over the digest tree, until a pass comes back clean with nothing
//! queued. The iteration budget (`ttl`) bounds how many dirty passes may follow the
//! first one; running out is fatal to the call that started the cycle.
//!
//! A pass is a pre-order traversal: each node's watchers in registration order, then
//! its children. The tree-wide last-dirty marker lets a pass stop as soon as it comes
//! back around to the last watcher that changed, since everything after it was
//! already clean on the previous pass.

mod phase;

pub use phase::Phase;
pub(crate) use phase::PhaseGuard;

use crate::error::DigestError;
use crate::report::FailureSource;
use crate::scope::node::NodeData;
use crate::scope::Scope;
use crate::value::Value;
use crate::watch::Watcher;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Result of evaluating one watcher.
enum Outcome {
    Dirty,
    Clean,
    /// Clean, and it was the last dirty watcher: nothing changed since.
    ShortCircuit,
}

impl Scope {
    /// Evaluate `expr` against this scope and return its result. Starts no cycle.
    pub fn evaluate_now<T>(&self, expr: impl FnOnce(&Scope) -> T) -> T {
        expr(self)
    }

    /// [`evaluate_now`](Scope::evaluate_now) with extra caller-supplied values.
    pub fn evaluate_with<T>(&self, locals: &Value, expr: impl FnOnce(&Scope, &Value) -> T) -> T {
        expr(self, locals)
    }

    /// Run `expr` exclusively, then stabilize the whole tree from its root.
    ///
    /// A failing `expr` is reported and yields `Ok(None)`; the cycle still runs.
    /// Fails without running anything when a phase is already active.
    pub fn run_with_cycle<T>(
        &self,
        expr: impl FnOnce(&Scope) -> anyhow::Result<T>,
    ) -> Result<Option<T>, DigestError> {
        if self.is_destroyed() {
            return Ok(None);
        }
        let result = {
            let _guard = PhaseGuard::begin(&self.tree.phase, Phase::Apply)?;
            expr(self)
        };
        let value = match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.tree.report(FailureSource::Apply, self.id(), error);
                None
            }
        };
        self.root().digest()?;
        Ok(value)
    }

    /// Stabilize this node's subtree, then run the after-convergence queue.
    pub fn digest(&self) -> Result<(), DigestError> {
        if self.is_destroyed() {
            return Ok(());
        }
        let guard = PhaseGuard::begin(&self.tree.phase, Phase::Digest)?;
        self.flush_pending_apply();

        let ttl = self.tree.config.ttl;
        let mut budget = ttl;
        let mut passes = 0u32;
        self.tree.last_dirty.set(None);
        debug!(scope = %self.id(), ttl, "Digest started");

        loop {
            self.drain_evaluate_soon();
            let dirty = self.run_pass();
            passes += 1;

            if !dirty && self.tree.queues.evaluate_soon_is_empty() {
                break;
            }
            if budget == 0 {
                warn!(scope = %self.id(), ttl, passes, "Digest did not stabilize");
                return Err(DigestError::StabilizationExceeded { ttl });
            }
            budget -= 1;
        }

        drop(guard);
        self.drain_after_convergence();
        debug!(scope = %self.id(), passes, "Digest stabilized");
        Ok(())
    }

    /// One pass over this node's subtree. Returns whether any watcher was dirty.
    fn run_pass(&self) -> bool {
        let mut dirty = false;
        let mut stack: Vec<Rc<NodeData>> = vec![self.node.clone()];

        while let Some(node) = stack.pop() {
            let scope = Scope::from_parts(self.tree.clone(), node.clone());
            let watchers = node.watchers.borrow().snapshot();
            for watcher in watchers {
                if !watcher.is_active() {
                    continue;
                }
                match self.evaluate(&watcher, &scope) {
                    Outcome::Dirty => dirty = true,
                    Outcome::Clean => {}
                    Outcome::ShortCircuit => {
                        trace!(scope = %node.id, "Pass short-circuited at last dirty watcher");
                        return false;
                    }
                }
            }

            let children: Vec<Rc<NodeData>> = node
                .children
                .borrow()
                .iter()
                .rev()
                .filter_map(|id| self.tree.node(*id))
                .collect();
            stack.extend(children);
        }

        trace!(scope = %self.id(), dirty, "Pass finished");
        dirty
    }

    fn evaluate(&self, watcher: &Watcher, scope: &Scope) -> Outcome {
        let value = match (watcher.read)(scope) {
            Ok(value) => value,
            Err(error) => {
                self.tree.report(FailureSource::Watch, scope.id(), error);
                return Outcome::Clean;
            }
        };

        let unchanged = match &*watcher.last.borrow() {
            Some(last) => watcher.equality.matches(&value, last),
            None => false,
        };
        if unchanged {
            return if self.tree.last_dirty.get() == Some(watcher.id) {
                Outcome::ShortCircuit
            } else {
                Outcome::Clean
            };
        }

        self.tree.last_dirty.set(Some(watcher.id));
        let previous = watcher
            .last
            .replace(Some(watcher.equality.snapshot(&value)));
        if let Some(listener) = &watcher.listener {
            let old = previous.unwrap_or_else(|| value.clone());
            if let Err(error) = listener(&value, &old, scope) {
                self.tree.report(FailureSource::Listener, scope.id(), error);
            }
        }
        Outcome::Dirty
    }
}
