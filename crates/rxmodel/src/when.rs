//! The `when` combinator.
//!
//! `when` binds a callback to a list of properties. The callback receives the
//! current values of those properties as positional arguments and runs:
//!
//! - once right away, at registration, if every property is already defined,
//! - after that, once per tick in which one or more of the properties were
//!   written, no matter how many writes happened,
//! - only when every property is defined ([`Value::is_defined`]); the
//!   [`OPTIONAL`](crate::OPTIONAL) marker counts as defined.
//!
//! Values are read when the flush runs, not when the write happened, so the
//! callback always sees the latest snapshot.
//!
//! Internally a combinator is one trigger listener attached to every
//! dependency property under a single [`ListenerId`]. The trigger only asks
//! its own [`Scheduler`] for a flush; the flush does the reading and calling.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::error::ModelResult;
use crate::logging::span_names;
use crate::registry::{ListenerFn, ListenerId, ListenerKind};
use crate::scheduler::Scheduler;
use crate::store::PropertyStore;
use crate::task::Executor;
use crate::value::Value;

/// Conversion into an ordered list of property names.
///
/// Implemented for a single name and for lists of names, so `when("a", ..)`
/// and `when(["a", "b"], ..)` both work.
pub trait IntoPropertyList {
    fn into_property_list(self) -> Vec<String>;
}

impl IntoPropertyList for &str {
    fn into_property_list(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoPropertyList for String {
    fn into_property_list(self) -> Vec<String> {
        vec![self]
    }
}

impl<S: Into<String>> IntoPropertyList for Vec<S> {
    fn into_property_list(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<S: Into<String>, const N: usize> IntoPropertyList for [S; N] {
    fn into_property_list(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<S: AsRef<str>> IntoPropertyList for &[S] {
    fn into_property_list(self) -> Vec<String> {
        self.iter().map(|name| name.as_ref().to_owned()).collect()
    }
}

/// Handle to a registered combinator.
///
/// Pass it to [`Model::cancel`](crate::Model::cancel) to detach the
/// combinator from every property it depends on. Dropping the handle does
/// not cancel anything.
#[derive(Clone)]
pub struct Trigger {
    id: ListenerId,
    properties: Arc<[String]>,
    scheduler: Scheduler,
}

impl Trigger {
    /// The listener identity shared by every attachment of this combinator.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The dependency properties, in argument order.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Whether a flush is queued and has not run yet.
    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }
}

impl From<&Trigger> for ListenerId {
    fn from(trigger: &Trigger) -> Self {
        trigger.id
    }
}

impl From<Trigger> for ListenerId {
    fn from(trigger: Trigger) -> Self {
        trigger.id
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("properties", &self.properties)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Register a combinator on `store`.
///
/// The combinator holds the store weakly: once the store is gone, queued
/// flushes do nothing.
pub(crate) fn register<F>(
    store: &Arc<PropertyStore>,
    executor: Arc<dyn Executor>,
    properties: Vec<String>,
    callback: F,
) -> ModelResult<Trigger>
where
    F: Fn(&[Value]) + Send + Sync + 'static,
{
    for name in &properties {
        store.track(name)?;
    }

    let properties: Arc<[String]> = properties.into();
    let id_cell: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());

    let on_flush = {
        let store = Arc::downgrade(store);
        let properties = properties.clone();
        let id_cell = id_cell.clone();
        move || flush(&store, &properties, &id_cell, &callback)
    };
    let scheduler = Scheduler::new(executor, on_flush);

    let trigger_fn: ListenerFn = {
        let scheduler = scheduler.clone();
        Arc::new(move |_: &Value, _: &Value| {
            scheduler.request();
        })
    };

    let id = {
        let mut registry = store.registry().lock();
        let id = registry.insert(trigger_fn, ListenerKind::Trigger);
        for name in properties.iter() {
            registry.add(name, id);
        }
        id
    };
    let _ = id_cell.set(id);

    tracing::debug!(target: "rxmodel::when", ?id, properties = ?properties, "combinator registered");

    // Initialization call, outside the debounce.
    scheduler.run_now();

    Ok(Trigger {
        id,
        properties,
        scheduler,
    })
}

fn flush<F>(
    store: &Weak<PropertyStore>,
    properties: &[String],
    id_cell: &OnceLock<ListenerId>,
    callback: &F,
) where
    F: Fn(&[Value]),
{
    let _span = tracing::trace_span!(span_names::FLUSH).entered();

    let Some(store) = store.upgrade() else {
        tracing::trace!(target: "rxmodel::when", "model dropped, skipping flush");
        return;
    };

    if let Some(id) = id_cell.get() {
        if !store.registry().lock().contains(*id) {
            tracing::trace!(target: "rxmodel::when", ?id, "combinator cancelled, skipping flush");
            return;
        }
    }

    let values = store.read_all(properties);
    if let Some(missing) = values.iter().position(|value| !value.is_defined()) {
        tracing::trace!(
            target: "rxmodel::when",
            waiting_on = properties[missing].as_str(),
            "dependency undefined, not firing"
        );
        return;
    }

    // Release the store before running user code.
    drop(store);
    callback(&values);
}
