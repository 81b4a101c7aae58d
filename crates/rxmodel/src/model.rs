//! The model facade.
//!
//! A [`Model`] is a bag of named, observable properties. It exposes the whole
//! public surface of the engine:
//!
//! - [`set`](Model::set) writes one or more properties,
//! - [`on`](Model::on) / [`off`](Model::off) attach and detach raw listeners
//!   that see every write synchronously as `(new, old)`,
//! - [`when`](Model::when) registers a debounced combinator over several
//!   properties and returns a [`Trigger`],
//! - [`cancel`](Model::cancel) removes a listener from every property.
//!
//! # Example
//!
//! ```
//! use rxmodel::{Model, TaskQueue, Value};
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let queue = TaskQueue::new();
//! let model = Model::with_queue(&queue, [("width", 2), ("height", 3)]);
//!
//! let area = Arc::new(Mutex::new(None));
//! let area_out = area.clone();
//! model
//!     .when(["width", "height"], move |values| {
//!         let w = values[0].as_int().unwrap_or_default();
//!         let h = values[1].as_int().unwrap_or_default();
//!         *area_out.lock() = Some(w * h);
//!     })
//!     .unwrap();
//!
//! // Both dependencies were already set: the callback ran on registration.
//! assert_eq!(*area.lock(), Some(6));
//!
//! model.set([("width", 4), ("height", 5)]).unwrap();
//! queue.run_until_idle();
//! assert_eq!(*area.lock(), Some(20));
//! ```
//!
//! # Writing back from callbacks
//!
//! Callbacks often write derived properties into their own model. Capture a
//! [`WeakModel`] rather than a [`Model`] clone to avoid a reference cycle
//! between the model and its own listeners.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::registry::{ListenerId, ListenerKind};
use crate::store::PropertyStore;
use crate::task::{Executor, TaskQueue};
use crate::value::Value;
use crate::when::{self, IntoPropertyList, Trigger};

struct ModelInner {
    store: Arc<PropertyStore>,
    executor: Arc<dyn Executor>,
    name: Option<String>,
}

impl Drop for ModelInner {
    fn drop(&mut self) {
        tracing::trace!(target: "rxmodel::model", name = ?self.name, "model dropped");
    }
}

/// A container of observable properties.
///
/// Cloning a `Model` yields another handle to the same properties.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

static_assertions::assert_impl_all!(Model: Send, Sync);
static_assertions::assert_impl_all!(WeakModel: Send, Sync);

impl Model {
    /// Create a permissive model on the global task queue, applying
    /// `defaults` as the initial `set`.
    pub fn new<I, K, V>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::builder().defaults(defaults).build()
    }

    /// Create a permissive model whose combinators flush on `queue`.
    pub fn with_queue<I, K, V>(queue: &TaskQueue, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::builder().queue(queue).defaults(defaults).build()
    }

    /// Start configuring a model.
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Create a model from a configuration and initial values.
    ///
    /// Every default name is declared, so strict models accept them.
    pub fn from_config(config: ModelConfig, defaults: Vec<(String, Value)>) -> Self {
        Self::assemble(config, Vec::new(), defaults)
    }

    fn assemble(config: ModelConfig, declared: Vec<String>, defaults: Vec<(String, Value)>) -> Self {
        let store = Arc::new(PropertyStore::new(config.strict));
        for name in declared.iter().chain(defaults.iter().map(|(name, _)| name)) {
            store.declare(name);
        }
        if let Err(error) = store.write_many(defaults) {
            tracing::error!(target: "rxmodel::model", %error, "failed to apply defaults");
        }

        tracing::debug!(
            target: "rxmodel::model",
            name = ?config.name,
            strict = config.strict,
            properties = store.names().len(),
            "model created"
        );

        Self {
            inner: Arc::new(ModelInner {
                store,
                executor: config.executor,
                name: config.name,
            }),
        }
    }

    /// The name given at construction, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Whether this model rejects unknown names.
    pub fn is_strict(&self) -> bool {
        self.inner.store.is_strict()
    }

    /// Write every entry, in iteration order.
    ///
    /// Each write notifies its raw listeners synchronously before the next
    /// entry is applied. Combinators depending on several of the written
    /// properties still fire only once, on the next tick.
    pub fn set<I, K, V>(&self, values: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.inner.store.write_many(
            values
                .into_iter()
                .map(|(name, value)| (name, Into::<Value>::into(value))),
        )
    }

    /// Write a single property.
    pub fn set_one(&self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.inner.store.write(name, value.into())
    }

    /// Current value of a property, [`Value::Undefined`] if never set.
    pub fn get(&self, name: &str) -> Value {
        self.inner.store.read(name)
    }

    /// Add `name` to the set of known properties without assigning it.
    ///
    /// This is how a strict model learns about properties that have no
    /// default.
    pub fn declare(&self, name: &str) {
        self.inner.store.declare(name);
    }

    /// Tracked property names, in creation order.
    pub fn property_names(&self) -> Vec<String> {
        self.inner.store.names()
    }

    /// Number of listener entries attached to `name`.
    ///
    /// A combinator counts once on each of its dependencies.
    pub fn listener_count(&self, name: &str) -> usize {
        self.inner.store.registry().lock().count(name)
    }

    /// Attach a raw listener, called synchronously as `listener(new, old)` on
    /// every write to `name`.
    ///
    /// Listeners on one property run in the order they were attached.
    pub fn on<F>(&self, name: &str, listener: F) -> ModelResult<ListenerId>
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.inner.store.track(name)?;
        let mut registry = self.inner.store.registry().lock();
        let id = registry.insert(Arc::new(listener), ListenerKind::Raw);
        registry.add(name, id);
        Ok(id)
    }

    /// Like [`on`](Self::on), passing `context` to every call.
    pub fn on_with_context<C, F>(&self, name: &str, context: Arc<C>, listener: F) -> ModelResult<ListenerId>
    where
        C: Send + Sync + 'static,
        F: Fn(&C, &Value, &Value) + Send + Sync + 'static,
    {
        self.on(name, move |new, old| listener(&*context, new, old))
    }

    /// Detach a listener (raw or combinator) from `name` only.
    ///
    /// Permissive models ignore ids that are not attached.
    pub fn off(&self, name: &str, listener: impl Into<ListenerId>) -> ModelResult<()> {
        let id = listener.into();
        self.inner.store.track(name)?;
        // The guard is gone before `released` drops, so listener destructors
        // may write back into this model.
        let released = self.inner.store.registry().lock().remove(name, id);
        if released.is_none() && self.is_strict() {
            return Err(ModelError::UnknownListener { id });
        }
        drop(released);
        Ok(())
    }

    /// Register a combinator over `properties`.
    ///
    /// `callback` receives the current values of `properties`, in order. It
    /// runs right away if they are all defined, then once per tick in which
    /// any of them was written, and never while any of them is undefined.
    pub fn when<P, F>(&self, properties: P, callback: F) -> ModelResult<Trigger>
    where
        P: IntoPropertyList,
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        when::register(
            &self.inner.store,
            self.inner.executor.clone(),
            properties.into_property_list(),
            callback,
        )
    }

    /// Like [`when`](Self::when), passing `context` to every call.
    pub fn when_with_context<P, C, F>(&self, properties: P, context: Arc<C>, callback: F) -> ModelResult<Trigger>
    where
        P: IntoPropertyList,
        C: Send + Sync + 'static,
        F: Fn(&C, &[Value]) + Send + Sync + 'static,
    {
        self.when(properties, move |values| callback(&*context, values))
    }

    /// Detach a listener from every property it is attached to.
    ///
    /// Takes effect immediately: no later write reaches it, and a flush that
    /// was already queued for a cancelled combinator does nothing.
    pub fn cancel(&self, handle: impl Into<ListenerId>) -> ModelResult<()> {
        let id = handle.into();
        let released = self.inner.store.registry().lock().remove_everywhere(id);
        match released {
            Some(released) => {
                tracing::debug!(target: "rxmodel::model", ?id, "listener cancelled");
                drop(released);
            }
            None if self.is_strict() => return Err(ModelError::UnknownListener { id }),
            None => {}
        }
        Ok(())
    }

    /// Detach every listener and combinator from every property.
    ///
    /// Property values are kept.
    pub fn unobserve(&self) {
        let released = {
            let mut registry = self.inner.store.registry().lock();
            tracing::debug!(target: "rxmodel::model", listeners = registry.len(), "unobserving model");
            registry.clear()
        };
        drop(released);
    }

    /// A handle that does not keep the model alive.
    pub fn downgrade(&self) -> WeakModel {
        WeakModel {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.name)
            .field("properties", &*self.inner.store)
            .finish()
    }
}

/// A non-owning handle to a [`Model`].
#[derive(Clone)]
pub struct WeakModel {
    inner: Weak<ModelInner>,
}

impl WeakModel {
    /// Get a strong handle, if the model is still alive.
    pub fn upgrade(&self) -> Option<Model> {
        self.inner.upgrade().map(|inner| Model { inner })
    }

    /// [`Model::set`] through the weak handle.
    pub fn set<I, K, V>(&self, values: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.upgrade().ok_or(ModelError::ModelDropped)?.set(values)
    }

    /// [`Model::set_one`] through the weak handle.
    pub fn set_one(&self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.upgrade().ok_or(ModelError::ModelDropped)?.set_one(name, value)
    }
}

impl fmt::Debug for WeakModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakModel")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Builder for creating models with custom configuration.
///
/// ```
/// use rxmodel::{Model, ModelError, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let model = Model::builder()
///     .name("viewport")
///     .strict(true)
///     .queue(&queue)
///     .defaults([("x", 0), ("y", 0)])
///     .build();
///
/// assert!(model.set([("x", 10)]).is_ok());
/// assert!(matches!(
///     model.set([("z", 1)]),
///     Err(ModelError::UnknownProperty { .. })
/// ));
/// ```
#[derive(Debug, Default)]
pub struct ModelBuilder {
    config: ModelConfig,
    declared: Vec<String>,
    defaults: Vec<(String, Value)>,
}

impl ModelBuilder {
    /// Set the name used in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Reject unknown properties and listener ids.
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// Flush combinators on `queue`.
    pub fn queue(mut self, queue: &TaskQueue) -> Self {
        self.config.executor = Arc::new(queue.clone());
        self
    }

    /// Flush combinators on a custom executor.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.config.executor = executor;
        self
    }

    /// Append initial values. Order is preserved.
    pub fn defaults<I, K, V>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in defaults {
            self.defaults.push((name.into(), value.into()));
        }
        self
    }

    /// Declare a property without a default (useful for strict models).
    ///
    /// Declared names are created before any default is written, and a
    /// default given for the same name is kept.
    pub fn declare(mut self, name: impl Into<String>) -> Self {
        self.declared.push(name.into());
        self
    }

    /// Create the model.
    pub fn build(self) -> Model {
        Model::assemble(self.config, self.declared, self.defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_defaults_are_applied() {
        let queue = TaskQueue::new();
        let model = Model::with_queue(&queue, [("x", 1), ("y", 2)]);
        assert_eq!(model.get("x"), Value::Int(1));
        assert_eq!(model.get("y"), Value::Int(2));
        assert_eq!(model.property_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_declared_property_is_undefined() {
        let queue = TaskQueue::new();
        let model = Model::builder().queue(&queue).declare("later").build();
        assert_eq!(model.get("later"), Value::Undefined);
        assert_eq!(model.property_names(), vec!["later"]);
    }

    #[test]
    fn test_on_creates_property_slot() {
        let model = Model::with_queue(&TaskQueue::new(), Vec::<(String, Value)>::new());
        model.on("fresh", |_, _| {}).unwrap();
        assert_eq!(model.property_names(), vec!["fresh"]);
        assert_eq!(model.listener_count("fresh"), 1);
    }

    #[test]
    fn test_off_unknown_is_noop_when_permissive() {
        let model = Model::with_queue(&TaskQueue::new(), [("a", 1)]);
        let id = model.on("a", |_, _| {}).unwrap();
        model.cancel(id).unwrap();
        assert!(model.off("a", id).is_ok());
        assert!(model.cancel(id).is_ok());
    }

    #[test]
    fn test_on_with_context() {
        struct Counter {
            hits: Mutex<u32>,
        }

        let model = Model::with_queue(&TaskQueue::new(), Vec::<(String, Value)>::new());
        let counter = Arc::new(Counter { hits: Mutex::new(0) });
        model
            .on_with_context("x", counter.clone(), |ctx, _, _| *ctx.hits.lock() += 1)
            .unwrap();

        model.set_one("x", 1).unwrap();
        model.set_one("x", 2).unwrap();
        assert_eq!(*counter.hits.lock(), 2);
    }

    #[test]
    fn test_weak_model_does_not_keep_alive() {
        let model = Model::with_queue(&TaskQueue::new(), [("a", 1)]);
        let weak = model.downgrade();
        assert!(weak.set_one("a", 2).is_ok());
        assert_eq!(model.get("a"), Value::Int(2));

        drop(model);
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.set_one("a", 3), Err(ModelError::ModelDropped));
    }

    #[test]
    fn test_declare_keeps_default_in_either_order() {
        let queue = TaskQueue::new();
        let after = Model::builder()
            .strict(true)
            .queue(&queue)
            .defaults([("a", 1)])
            .declare("a")
            .build();
        assert_eq!(after.get("a"), Value::Int(1));

        let before = Model::builder()
            .strict(true)
            .queue(&queue)
            .declare("a")
            .defaults([("a", 1)])
            .build();
        assert_eq!(before.get("a"), Value::Int(1));
        assert_eq!(before.property_names(), vec!["a"]);
    }

    struct Cleanup(WeakModel);

    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = self.0.set_one("status", "closed");
        }
    }

    fn guarded_listener(model: &Model) -> ListenerId {
        let guard = Cleanup(model.downgrade());
        model
            .on("a", move |_: &Value, _: &Value| {
                let _guard = &guard;
            })
            .unwrap()
    }

    #[test]
    fn test_listener_drop_may_write_back_on_cancel() {
        let model = Model::with_queue(&TaskQueue::new(), [("a", 1)]);
        let id = guarded_listener(&model);

        model.cancel(id).unwrap();
        assert_eq!(model.get("status"), Value::from("closed"));
    }

    #[test]
    fn test_listener_drop_may_write_back_on_off() {
        let model = Model::with_queue(&TaskQueue::new(), [("a", 1)]);
        let id = guarded_listener(&model);

        model.off("a", id).unwrap();
        assert_eq!(model.get("status"), Value::from("closed"));
    }

    #[test]
    fn test_listener_drop_may_write_back_on_unobserve() {
        let model = Model::with_queue(&TaskQueue::new(), [("a", 1)]);
        guarded_listener(&model);

        model.unobserve();
        assert_eq!(model.get("status"), Value::from("closed"));
    }

    #[test]
    fn test_default_model_flushes_on_global_queue() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let out = calls.clone();
        let model = Model::new([("left", 1)]);
        model
            .when(["left", "right"], move |values| out.lock().push(values.to_vec()))
            .unwrap();

        model.set([("left", 2), ("right", 3)]).unwrap();
        TaskQueue::global().run_until_idle();
        assert_eq!(*calls.lock(), vec![vec![Value::Int(2), Value::Int(3)]]);

        let empty = Model::default();
        assert!(!empty.is_strict());
        assert!(empty.property_names().is_empty());
    }

    #[test]
    fn test_unobserve_keeps_values() {
        let queue = TaskQueue::new();
        let model = Model::with_queue(&queue, [("a", 1)]);
        model.on("a", |_, _| {}).unwrap();
        model.when(["a"], |_| {}).unwrap();
        assert_eq!(model.listener_count("a"), 2);

        model.unobserve();
        assert_eq!(model.listener_count("a"), 0);
        assert_eq!(model.get("a"), Value::Int(1));
    }
}
