//! Per-property listener registry.
//!
//! Each property name owns an ordered list of listener identities. The
//! callbacks themselves live once in a [`SlotMap`], keyed by [`ListenerId`],
//! so a single listener can be attached to many properties and later removed
//! from all of them through that one identity. Combinator triggers rely on
//! this: one trigger, one id, one entry per dependency property.
//!
//! # Ordering
//!
//! Listeners on a property are notified in the order they were added.
//! Removing a listener keeps the relative order of the remaining ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};

use crate::value::Value;

new_key_type! {
    /// The identity of a registered listener.
    ///
    /// Returned by [`Model::on`](crate::Model::on) and carried by every
    /// [`Trigger`](crate::Trigger). Pass it to [`Model::off`](crate::Model::off)
    /// or [`Model::cancel`](crate::Model::cancel) to remove the listener.
    pub struct ListenerId;
}

/// A raw change callback, invoked as `callback(new_value, old_value)`.
pub type ListenerFn = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// What kind of callback a listener entry holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerKind {
    /// Registered through `on`; sees every write synchronously.
    Raw,
    /// The debounced trigger of a `when` combinator.
    Trigger,
}

struct ListenerEntry {
    callback: ListenerFn,
    kind: ListenerKind,
}

/// Callbacks taken out of a registry by a removal.
///
/// Dropping a callback may run arbitrary destructors that write back into
/// the model, so hold on to this until the registry lock is released.
#[must_use = "drop released callbacks after the registry lock is released"]
#[derive(Default)]
pub struct Released {
    callbacks: Vec<ListenerFn>,
}

impl Released {
    fn push(&mut self, entry: ListenerEntry) {
        self.callbacks.push(entry.callback);
    }

    /// Number of listener identities that were released.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for Released {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Released")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Ordered listener lists for every tracked property.
#[derive(Default)]
pub struct ListenerRegistry {
    /// Callback storage, one entry per identity.
    listeners: SlotMap<ListenerId, ListenerEntry>,
    /// Listener identities per property, in registration order.
    by_property: HashMap<String, Vec<ListenerId>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity for a callback without attaching it anywhere.
    pub fn insert(&mut self, callback: ListenerFn, kind: ListenerKind) -> ListenerId {
        self.listeners.insert(ListenerEntry { callback, kind })
    }

    /// Make sure `name` has a (possibly empty) listener list.
    pub fn ensure(&mut self, name: &str) {
        if !self.by_property.contains_key(name) {
            self.by_property.insert(name.to_owned(), Vec::new());
        }
    }

    /// Append `id` to the listener list of `name`.
    ///
    /// Returns `false` if `id` is not a live identity.
    pub fn add(&mut self, name: &str, id: ListenerId) -> bool {
        if !self.listeners.contains_key(id) {
            return false;
        }
        self.ensure(name);
        if let Some(list) = self.by_property.get_mut(name) {
            list.push(id);
        }
        tracing::debug!(target: "rxmodel::registry", property = name, ?id, "listener added");
        true
    }

    /// Remove every entry of `id` from the list of `name` only.
    ///
    /// Returns `None` if nothing was removed. An identity that ends up
    /// attached to no property is released and its callback returned.
    pub fn remove(&mut self, name: &str, id: ListenerId) -> Option<Released> {
        let list = self.by_property.get_mut(name)?;
        let before = list.len();
        list.retain(|entry| *entry != id);
        if list.len() == before {
            return None;
        }

        tracing::debug!(target: "rxmodel::registry", property = name, ?id, "listener removed");
        let mut released = Released::default();
        if !self.is_attached(id) {
            if let Some(entry) = self.listeners.remove(id) {
                released.push(entry);
            }
        }
        Some(released)
    }

    /// Remove `id` from every property and release it.
    ///
    /// Returns `None` if the identity was not live.
    pub fn remove_everywhere(&mut self, id: ListenerId) -> Option<Released> {
        for list in self.by_property.values_mut() {
            list.retain(|entry| *entry != id);
        }
        let entry = self.listeners.remove(id)?;
        tracing::debug!(target: "rxmodel::registry", ?id, "listener removed from all properties");

        let mut released = Released::default();
        released.push(entry);
        Some(released)
    }

    /// Remove every listener from every property. Property lists stay in place.
    pub fn clear(&mut self) -> Released {
        for list in self.by_property.values_mut() {
            list.clear();
        }
        let mut released = Released::default();
        for (_, entry) in self.listeners.drain() {
            released.push(entry);
        }
        released
    }

    /// The callbacks currently attached to `name`, in notification order.
    ///
    /// The returned snapshot is detached from the registry, so callbacks may
    /// add or remove listeners while it is being walked.
    pub fn snapshot(&self, name: &str) -> Vec<ListenerFn> {
        self.by_property
            .get(name)
            .map(|list| {
                list.iter()
                    .filter_map(|id| self.listeners.get(*id))
                    .map(|entry| entry.callback.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `id` is still a live identity.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(id)
    }

    /// The kind of a live listener.
    pub fn kind(&self, id: ListenerId) -> Option<ListenerKind> {
        self.listeners.get(id).map(|entry| entry.kind)
    }

    /// Whether `id` is attached to `name`.
    pub fn is_listening(&self, name: &str, id: ListenerId) -> bool {
        self.by_property
            .get(name)
            .is_some_and(|list| list.contains(&id))
    }

    /// Number of entries attached to `name`.
    pub fn count(&self, name: &str) -> usize {
        self.by_property.get(name).map_or(0, Vec::len)
    }

    /// Number of live listener identities.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn is_attached(&self, id: ListenerId) -> bool {
        self.by_property.values().any(|list| list.contains(&id))
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .field("properties", &self.by_property.len())
            .finish()
    }
}
