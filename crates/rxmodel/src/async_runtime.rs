//! Tokio integration for rxmodel.
//!
//! This module provides an [`Executor`] that posts combinator flushes onto a
//! Tokio runtime, so models can live inside an async application without a
//! separately driven [`TaskQueue`](crate::TaskQueue).
//!
//! # Feature Flag
//!
//! This module requires the `tokio` feature to be enabled:
//!
//! ```toml
//! [dependencies]
//! rxmodel = { version = "0.1", features = ["tokio"] }
//! ```
//!
//! # Runtime flavor
//!
//! Flushes must not run while a burst of writes is still in progress. Use a
//! current-thread runtime (the `#[tokio::main(flavor = "current_thread")]`
//! and `#[tokio::test]` default) so that a flush only starts once the writing
//! task yields. On a multi-threaded runtime a flush may start on another
//! worker in the middle of a burst and observe only part of it.
//!
//! # Example
//!
//! ```no_run
//! use rxmodel::Model;
//! use rxmodel::async_runtime::TokioExecutor;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let model = Model::builder()
//!         .executor(Arc::new(TokioExecutor::current()))
//!         .build();
//!
//!     model
//!         .when(["a", "b"], |values| println!("a={:?} b={:?}", values[0], values[1]))
//!         .unwrap();
//!
//!     model.set([("a", 1), ("b", 2)]).unwrap();
//!     tokio::task::yield_now().await;
//! }
//! ```

use tokio::runtime::Handle;

use crate::task::{BoxedTask, Executor};

/// Posts tasks onto a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Use the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the current context.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime. Use
    /// [`try_current`](Self::try_current) to handle that case.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Use the runtime of the current context, if there is one.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn post_boxed(&self, task: BoxedTask) {
        // Detached: the join handle is not needed.
        drop(self.handle.spawn(async move { task() }));
    }
}
