//! Shared test utilities for integration tests
//!
//! Counters and read-function helpers used across the suites, plus serialized access
//! to process environment variables.

use settle::{ReadFn, Scope, Value};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Mutex;

/// Global mutex to serialize environment variable access across all tests
/// This prevents race conditions when tests run in parallel
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Shared call counter for closures handed to the engine
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<usize>>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// Read function returning the scope's current value for `name`
pub fn read(name: &'static str) -> ReadFn {
    Box::new(move |scope: &Scope| -> anyhow::Result<Value> { Ok(scope.get(name)) })
}

/// Increment a numeric state entry, treating a missing one as zero
pub fn increment(scope: &Scope, name: &str) {
    let current = scope.get(name).as_f64().unwrap_or_default();
    scope.set(name, current + 1.0);
}

/// Run `f` with the given environment variables set, restoring them afterwards
///
/// Uses a global mutex to prevent race conditions in parallel test execution.
pub fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| (key.to_string(), std::env::var(key).ok()))
        .collect();

    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    for (key, original) in saved {
        match original {
            Some(value) => std::env::set_var(&key, value),
            None => std::env::remove_var(&key),
        }
    }

    result
}
