//! Settle: Dirty-Checking Stabilization Runtime
//!
//! A tree of scopes holding observable state, watchers that detect changes by
//! re-reading it, and a digest loop that re-runs watchers until the whole tree stops
//! changing, with deferred-work queues shared by every node of a tree.

pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod scope;
pub mod value;
pub mod watch;

pub use config::{ConfigLoader, DigestConfig, SettleConfig};
pub use digest::Phase;
pub use error::{ConfigError, DigestError};
pub use logging::{init_logging, LoggingConfig};
pub use queue::TaskFn;
pub use report::{ErrorReporter, FailureSource, RecordingReporter, TaskFailure, TracingReporter};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use scope::{Scope, ScopeBuilder, ScopeId, WeakScope};
pub use value::{deep_equals, same_value, Array, Equality, Object, Value};
pub use watch::{GroupListenerFn, ListenerFn, ReadFn, WatchHandle, WatcherId};
