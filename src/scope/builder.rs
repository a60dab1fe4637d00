//! Root scope construction.

use super::tree::Tree;
use super::Scope;
use crate::config::DigestConfig;
use crate::report::{ErrorReporter, TracingReporter};
use crate::scheduler::{ManualScheduler, Scheduler};
use std::rc::Rc;

/// Builds the root of a new scope tree
pub struct ScopeBuilder {
    config: DigestConfig,
    scheduler: Option<Rc<dyn Scheduler>>,
    reporter: Option<Rc<dyn ErrorReporter>>,
}

impl Default for ScopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeBuilder {
    pub fn new() -> Self {
        Self {
            config: DigestConfig::default(),
            scheduler: None,
            reporter: None,
        }
    }

    pub fn config(mut self, config: DigestConfig) -> Self {
        self.config = config;
        self
    }

    /// Iteration budget for each stabilization cycle.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.config.ttl = ttl;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Some(Rc::new(reporter));
        self
    }

    pub fn build(self) -> Scope {
        let scheduler: Rc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Rc::new(ManualScheduler::new()),
        };
        let reporter: Rc<dyn ErrorReporter> = match self.reporter {
            Some(reporter) => reporter,
            None => Rc::new(TracingReporter),
        };
        Scope::root_of(Rc::new(Tree::new(self.config, scheduler, reporter)))
    }
}
