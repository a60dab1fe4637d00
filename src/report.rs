//! Failure Reporting
//!
//! Caller code that fails inside a cycle (a read function, a reaction, a deferred task)
//! is trapped at the point of invocation and handed to the tree's [`ErrorReporter`].
//! The cycle then carries on with the next unit of work.

use crate::scope::ScopeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::error;

/// Where a trapped failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureSource {
    /// A watcher's read function
    Watch,
    /// A watcher's reaction
    Listener,
    /// A task queued with `schedule_soon`
    EvaluateSoon,
    /// A task queued with `schedule_coalesced`
    ApplySoon,
    /// A callback queued with `after_convergence`
    AfterConvergence,
    /// The expression passed to `run_with_cycle`
    Apply,
    /// A cycle started by a deferred trigger, which has no caller to return to
    DeferredCycle,
}

impl FailureSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureSource::Watch => "watch",
            FailureSource::Listener => "listener",
            FailureSource::EvaluateSoon => "evaluate_soon",
            FailureSource::ApplySoon => "apply_soon",
            FailureSource::AfterConvergence => "after_convergence",
            FailureSource::Apply => "apply",
            FailureSource::DeferredCycle => "deferred_cycle",
        }
    }
}

impl fmt::Display for FailureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trapped failure
#[derive(Debug)]
pub struct TaskFailure {
    pub source: FailureSource,
    pub scope: ScopeId,
    pub error: anyhow::Error,
}

/// Receives every failure trapped by the engine
pub trait ErrorReporter {
    fn report(&self, failure: TaskFailure);
}

impl<F> ErrorReporter for F
where
    F: Fn(TaskFailure),
{
    fn report(&self, failure: TaskFailure) {
        self(failure)
    }
}

/// Default reporter: one `error!` event per failure
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, failure: TaskFailure) {
        error!(
            source = %failure.source,
            scope = %failure.scope,
            error = %format!("{:#}", failure.error),
            "Scope task failed"
        );
    }
}

/// Keeps failures in memory; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    failures: Rc<RefCell<Vec<TaskFailure>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.failures.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.borrow().is_empty()
    }

    pub fn sources(&self) -> Vec<FailureSource> {
        self.failures.borrow().iter().map(|f| f.source).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.failures
            .borrow()
            .iter()
            .map(|f| f.error.to_string())
            .collect()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<TaskFailure> {
        std::mem::take(&mut *self.failures.borrow_mut())
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, failure: TaskFailure) {
        self.failures.borrow_mut().push(failure);
    }
}
