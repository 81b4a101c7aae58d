//! Logging facilities for rxmodel.
//!
//! rxmodel uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("rxmodel::when=debug,rxmodel::store=trace")
//!     .init();
//! ```
//!
//! Property writes and flushes log at `trace`, registration and cancellation
//! at `debug`. A task queue that gives up on a self-feeding cycle logs at
//! `warn`.

/// Span names used throughout rxmodel for tracing.
pub mod span_names {
    /// A single property write and its listener fan-out.
    pub const WRITE: &str = "rxmodel::write";
    /// A combinator flush.
    pub const FLUSH: &str = "rxmodel::flush";
    /// One tick of the task queue.
    pub const TICK: &str = "rxmodel::tick";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Crate-wide target.
    pub const CORE: &str = "rxmodel";
    /// Property store writes.
    pub const STORE: &str = "rxmodel::store";
    /// Listener add/remove.
    pub const REGISTRY: &str = "rxmodel::registry";
    /// Debounce requests and flushes.
    pub const SCHEDULER: &str = "rxmodel::scheduler";
    /// Combinator registration and invocation.
    pub const WHEN: &str = "rxmodel::when";
    /// Task queue ticks.
    pub const TASK: &str = "rxmodel::task";
    /// Model construction and teardown.
    pub const MODEL: &str = "rxmodel::model";
}
