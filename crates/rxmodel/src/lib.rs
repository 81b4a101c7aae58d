//! Reactive property models.
//!
//! This crate provides a small observation engine built around a [`Model`]:
//!
//! - **Properties**: named, dynamically typed [`Value`]s, created on first use
//! - **Raw listeners**: callbacks that see every write synchronously as
//!   `(new, old)`, in registration order
//! - **Combinators**: [`Model::when`] callbacks over several properties that
//!   run once per tick of changes, and only once every dependency is defined
//! - **Task queue**: the deferred "next tick" on which combinators flush
//!
//! # Example
//!
//! ```
//! use rxmodel::{Model, TaskQueue, Value, OPTIONAL};
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let queue = TaskQueue::new();
//! let model = Model::with_queue(&queue, [("first", "Ada")]);
//!
//! let greeting = Arc::new(Mutex::new(String::new()));
//! let out = greeting.clone();
//! let trigger = model
//!     .when(["first", "last"], move |values| {
//!         let first = values[0].as_str().unwrap_or_default();
//!         let last = values[1].as_str().unwrap_or("");
//!         *out.lock() = format!("{first} {last}").trim_end().to_string();
//!     })
//!     .unwrap();
//!
//! // "last" is still undefined: nothing happens.
//! queue.run_until_idle();
//! assert_eq!(*greeting.lock(), "");
//!
//! // Two writes in one burst produce one callback.
//! model.set([("first", Value::from("Grace")), ("last", OPTIONAL)]).unwrap();
//! queue.run_until_idle();
//! assert_eq!(*greeting.lock(), "Grace");
//!
//! model.cancel(&trigger).unwrap();
//! ```
//!
//! # Raw listener example
//!
//! ```
//! use rxmodel::{Model, TaskQueue};
//!
//! let model = Model::with_queue(&TaskQueue::new(), [("x", 1)]);
//! let id = model
//!     .on("x", |new, old| println!("x: {old:?} -> {new:?}"))
//!     .unwrap();
//!
//! model.set_one("x", 2).unwrap(); // prints immediately
//! model.off("x", id).unwrap();
//! ```

#[cfg(feature = "tokio")]
pub mod async_runtime;
mod config;
mod error;
pub mod logging;
mod model;
pub mod registry;
mod scheduler;
pub mod store;
pub mod task;
mod value;
pub mod when;

pub use config::ModelConfig;
pub use error::{ModelError, ModelResult};
pub use model::{Model, ModelBuilder, WeakModel};
pub use registry::{ListenerId, ListenerKind};
pub use scheduler::Scheduler;
pub use task::{Executor, TaskId, TaskQueue};
pub use value::{OPTIONAL, Value};
pub use when::{IntoPropertyList, Trigger};
