//! Property store for rxmodel.
//!
//! The store keeps the current [`Value`] of every tracked property and turns
//! each write into a change notification. Assignment is explicit: callers go
//! through [`PropertyStore::write`] (or the model's `set`), never through a
//! reference to the stored value, so every mutation is observed.
//!
//! A write stores the new value first and then calls every listener attached
//! to that property, in registration order, as `listener(new, old)`. Because
//! the value is already in place, a listener that reads the property back
//! sees the new value. No lock is held while listeners run, so they are free
//! to write other properties; those nested writes fan out immediately, inside
//! the outer write.
//!
//! # Tracking
//!
//! In the default permissive mode a property comes into existence the first
//! time it is read, written, or subscribed to, holding [`Value::Undefined`].
//! A strict store only knows the names it was told about through
//! [`PropertyStore::declare`] and rejects everything else with
//! [`ModelError::UnknownProperty`].

use std::collections::HashMap;
use std::fmt;

use parking_lot::{Mutex, RwLock};

use crate::error::{ModelError, ModelResult};
use crate::registry::ListenerRegistry;
use crate::value::Value;

#[derive(Default)]
struct Slots {
    /// Property names in creation order.
    order: Vec<String>,
    values: HashMap<String, Value>,
}

impl Slots {
    fn create(&mut self, name: &str) {
        if !self.values.contains_key(name) {
            self.order.push(name.to_owned());
            self.values.insert(name.to_owned(), Value::Undefined);
        }
    }
}

/// Current values of a model's properties plus their listeners.
pub struct PropertyStore {
    slots: RwLock<Slots>,
    registry: Mutex<ListenerRegistry>,
    strict: bool,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new(strict: bool) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            registry: Mutex::new(ListenerRegistry::new()),
            strict,
        }
    }

    /// Whether unknown names are rejected.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The listener registry backing this store.
    pub fn registry(&self) -> &Mutex<ListenerRegistry> {
        &self.registry
    }

    /// Declare a property, creating an undefined slot if it does not exist.
    ///
    /// This is the only way to introduce a name into a strict store.
    pub fn declare(&self, name: &str) {
        self.slots.write().create(name);
        self.registry.lock().ensure(name);
    }

    /// Make sure `name` is tracked, creating it unless the store is strict.
    pub fn track(&self, name: &str) -> ModelResult<()> {
        if self.contains(name) {
            return Ok(());
        }
        if self.strict {
            return Err(ModelError::UnknownProperty {
                name: name.to_owned(),
            });
        }
        self.declare(name);
        Ok(())
    }

    /// Whether `name` is tracked.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().values.contains_key(name)
    }

    /// Current value of `name`, or [`Value::Undefined`] if it was never set.
    ///
    /// Reading an unknown name in permissive mode starts tracking it.
    pub fn read(&self, name: &str) -> Value {
        if let Some(value) = self.slots.read().values.get(name) {
            return value.clone();
        }
        // Strict stores report undefined without tracking.
        let _ = self.track(name);
        Value::Undefined
    }

    /// Current values of several properties, in the given order.
    pub fn read_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<Value> {
        let slots = self.slots.read();
        names
            .iter()
            .map(|name| slots.values.get(name.as_ref()).cloned().unwrap_or_default())
            .collect()
    }

    /// Store `value` under `name` and notify that property's listeners.
    #[tracing::instrument(name = "rxmodel::write", skip(self, value), target = "rxmodel::store", level = "trace")]
    pub fn write(&self, name: &str, value: Value) -> ModelResult<()> {
        self.track(name)?;

        let old = {
            let mut slots = self.slots.write();
            slots.create(name);
            slots
                .values
                .insert(name.to_owned(), value.clone())
                .unwrap_or_default()
        };

        let listeners = self.registry.lock().snapshot(name);
        tracing::trace!(
            target: "rxmodel::store",
            property = name,
            kind = value.kind(),
            listener_count = listeners.len(),
            "property written"
        );

        for listener in listeners {
            listener(&value, &old);
        }
        Ok(())
    }

    /// Apply [`write`](Self::write) for every entry, in iteration order.
    ///
    /// Each entry gets its own synchronous fan-out. A strict store checks all
    /// names before writing any of them, so a rejected batch leaves the store
    /// untouched.
    pub fn write_many<I, K>(&self, values: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let values: Vec<(K, Value)> = values.into_iter().collect();
        if self.strict {
            if let Some((name, _)) = values.iter().find(|(name, _)| !self.contains(name.as_ref())) {
                return Err(ModelError::UnknownProperty {
                    name: name.as_ref().to_owned(),
                });
            }
        }
        for (name, value) in values {
            self.write(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Tracked property names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.slots.read().order.clone()
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut map = f.debug_map();
        for name in &slots.order {
            map.entry(name, &slots.values.get(name));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ListenerKind;
    use std::sync::Arc;

    fn listen<F>(store: &PropertyStore, name: &str, f: F)
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        store.track(name).unwrap();
        let mut registry = store.registry().lock();
        let id = registry.insert(Arc::new(f), ListenerKind::Raw);
        registry.add(name, id);
    }

    #[test]
    fn test_read_unknown_is_undefined() {
        let store = PropertyStore::new(false);
        assert_eq!(store.read("missing"), Value::Undefined);
        // Reading starts tracking.
        assert!(store.contains("missing"));
    }

    #[test]
    fn test_write_notifies_new_and_old() {
        let store = PropertyStore::new(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        listen(&store, "x", move |new, old| {
            seen_clone.lock().push((new.clone(), old.clone()));
        });

        store.write("x", Value::from(1)).unwrap();
        store.write("x", Value::from(2)).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                (Value::Int(1), Value::Undefined),
                (Value::Int(2), Value::Int(1)),
            ]
        );
    }

    #[test]
    fn test_listener_sees_stored_value() {
        let store = Arc::new(PropertyStore::new(false));
        let observed = Arc::new(Mutex::new(None));

        let store_clone = Arc::downgrade(&store);
        let observed_clone = observed.clone();
        listen(&store, "x", move |_, _| {
            if let Some(store) = store_clone.upgrade() {
                *observed_clone.lock() = Some(store.read("x"));
            }
        });

        store.write("x", Value::from("new")).unwrap();
        assert_eq!(*observed.lock(), Some(Value::from("new")));
    }

    #[test]
    fn test_listener_may_write_other_property() {
        let store = Arc::new(PropertyStore::new(false));

        let weak = Arc::downgrade(&store);
        listen(&store, "x", move |new, _| {
            if let (Some(store), Some(n)) = (weak.upgrade(), new.as_int()) {
                store.write("doubled", Value::from(n * 2)).unwrap();
            }
        });

        store.write("x", Value::from(21)).unwrap();
        assert_eq!(store.read("doubled"), Value::Int(42));
    }

    #[test]
    fn test_write_many_in_order() {
        let store = PropertyStore::new(false);
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["b", "a"] {
            let order = order.clone();
            listen(&store, name, move |_, _| order.lock().push(name));
        }

        store
            .write_many([("a", Value::from(1)), ("b", Value::from(2))])
            .unwrap();
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_names_in_creation_order() {
        let store = PropertyStore::new(false);
        store.write("z", Value::Null).unwrap();
        store.declare("a");
        store.write("z", Value::from(1)).unwrap();
        assert_eq!(store.names(), vec!["z".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let store = PropertyStore::new(true);
        store.declare("known");

        assert!(store.write("known", Value::from(1)).is_ok());
        assert_eq!(
            store.write("typo", Value::from(1)),
            Err(ModelError::UnknownProperty {
                name: "typo".to_string()
            })
        );
        assert_eq!(store.read("typo"), Value::Undefined);
        assert!(!store.contains("typo"));
    }

    #[test]
    fn test_strict_batch_is_all_or_nothing() {
        let store = PropertyStore::new(true);
        store.declare("a");

        let result = store.write_many([("a", Value::from(1)), ("b", Value::from(2))]);
        assert!(result.is_err());
        assert_eq!(store.read("a"), Value::Undefined);
    }
}
