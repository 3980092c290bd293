//! Store Implementation
//!
//! A Store is the reactive wrapper around one plain instance. All access to
//! the instance's fields goes through it.
//!
//! # How Stores Work
//!
//! 1. When a field is read while a recording frame is active, the store
//!    appends (store, field) to that frame, whether the field is stored or
//!    derived.
//!
//! 2. Derived fields are evaluated by calling their accessor with this same
//!    store, so the accessor's own reads route back through it.
//!
//! 3. When a field is written, the new value is stored and every listener
//!    of that field runs before `set` returns. There is no equality check:
//!    assigning an unchanged value still notifies.
//!
//! # Memory Layout
//!
//! Each store consists of:
//! - A unique ID
//! - The stored fields, in declaration order
//! - A shared handle to its type's derived-field table
//! - Its own subscription table and derived-field upkeep

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::context::{untracked, ReactiveContext};
use super::dependency::{Dependency, FieldName};
use super::derived::{self, Accessor, DerivedFields, Upkeep};
use super::listener::Listener;
use super::registry::Subscriptions;
use crate::error::{Error, Result};

/// Unique identifier for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

pub(crate) struct StoreInner {
    id: StoreId,
    type_name: &'static str,
    fields: RefCell<IndexMap<FieldName, Value>>,
    derived: Rc<DerivedFields>,
    subscriptions: Subscriptions,
    /// Upkeep listeners for derived fields, installed on first tracked read.
    upkeep: RefCell<HashMap<FieldName, Rc<Upkeep>>>,
}

/// A reactive handle to one wrapped instance.
///
/// Cloning a `Store` creates a new handle to the **same** instance: both
/// handles read the same fields and share listeners.
///
/// # Example
///
/// ```rust,ignore
/// let store = observe::<Counter>().create_default()?;
///
/// let cancel = track({
///     let store = store.clone();
///     move || println!("count = {}", store.get("count").unwrap())
/// });
///
/// store.set("count", 5)?; // prints "count = 5"
/// cancel.cancel();
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub(crate) fn new(
        type_name: &'static str,
        fields: IndexMap<FieldName, Value>,
        derived: Rc<DerivedFields>,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                id: StoreId::next(),
                type_name,
                fields: RefCell::new(fields),
                derived,
                subscriptions: Subscriptions::default(),
                upkeep: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<StoreInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn subscriptions(&self) -> &Subscriptions {
        &self.inner.subscriptions
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Name of the plain type this store wraps.
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Read a field.
    ///
    /// If called while a recording frame is active, this also records the
    /// field as a dependency of the running computation.
    pub fn get(&self, field: &str) -> Result<Value> {
        let (name, accessor) = self.lookup(field)?;

        if ReactiveContext::is_recording() {
            ReactiveContext::record(Dependency::new(self, name.clone()));
        }

        match accessor {
            Some(accessor) => derived::resolve(self, &name, &accessor),
            None => self.stored(&name),
        }
    }

    /// Read a field and deserialize it into `T`.
    pub fn get_as<T>(&self, field: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.get(field)?;
        serde_json::from_value(value).map_err(|e| Error::conversion(field, e))
    }

    /// Read a field without recording a dependency.
    ///
    /// Derived fields read this way never install upkeep.
    pub fn get_untracked(&self, field: &str) -> Result<Value> {
        untracked(|| self.get(field))
    }

    /// Assign a stored field and notify its listeners.
    ///
    /// This will synchronously re-run every dependent computation.
    pub fn set<T>(&self, field: &str, value: T) -> Result<()>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(value).map_err(|e| Error::conversion(field, e))?;

        let name = {
            let mut fields = self.inner.fields.borrow_mut();
            match fields.get_full_mut(field) {
                Some((_, name, slot)) => {
                    *slot = value;
                    name.clone()
                }
                None if self.inner.derived.contains(field) => {
                    return Err(Error::ReadOnlyField(field.to_owned()));
                }
                None => return Err(Error::UnknownField(field.to_owned())),
            }
        };

        self.inner.subscriptions.emit(&name);
        Ok(())
    }

    /// Update a stored field using a function of its current value.
    ///
    /// The current value is read untracked.
    pub fn update<T, F>(&self, field: &str, f: F) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> T,
    {
        let current = self.get_untracked(field)?;
        let current = serde_json::from_value(current).map_err(|e| Error::conversion(field, e))?;
        self.set(field, f(current))
    }

    /// Check whether `field` is computed by an accessor.
    ///
    /// A stored field of the same name takes precedence.
    pub fn is_derived(&self, field: &str) -> bool {
        !self.inner.fields.borrow().contains_key(field) && self.inner.derived.contains(field)
    }

    /// Names of all stored fields, in declaration order.
    pub fn stored_fields(&self) -> Vec<String> {
        self.inner
            .fields
            .borrow()
            .keys()
            .map(|name| name.to_string())
            .collect()
    }

    /// Register `listener` for writes to `field`.
    ///
    /// Subscribing the same listener twice makes it run twice per write.
    pub fn subscribe(&self, field: &str, listener: &Listener) -> Result<()> {
        let (name, _) = self.lookup(field)?;
        self.inner.subscriptions.subscribe(name, listener.clone());
        Ok(())
    }

    /// Remove every subscription of `listener` to `field`.
    ///
    /// Unknown listeners or fields are ignored.
    pub fn unsubscribe(&self, field: &str, listener: &Listener) {
        self.inner.subscriptions.unsubscribe(field, listener);
    }

    /// Number of subscription entries for `field`.
    pub fn subscriber_count(&self, field: &str) -> usize {
        self.inner.subscriptions.count(field)
    }

    /// Create a weak handle that does not keep the instance alive.
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: self.downgrade_inner(),
        }
    }

    /// Resolve a name to its interned form and, for derived fields, its accessor.
    fn lookup(&self, field: &str) -> Result<(FieldName, Option<Accessor>)> {
        if let Some((name, _)) = self.inner.fields.borrow().get_key_value(field) {
            return Ok((name.clone(), None));
        }
        match self.inner.derived.accessor(field) {
            Some((name, accessor)) => Ok((name.clone(), Some(accessor.clone()))),
            None => Err(Error::UnknownField(field.to_owned())),
        }
    }

    fn stored(&self, name: &str) -> Result<Value> {
        self.inner
            .fields
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownField(name.to_owned()))
    }

    pub(crate) fn has_upkeep(&self, name: &str) -> bool {
        self.inner.upkeep.borrow().contains_key(name)
    }

    pub(crate) fn insert_upkeep(&self, name: FieldName, upkeep: Rc<Upkeep>) {
        self.inner.upkeep.borrow_mut().insert(name, upkeep);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("type", &self.inner.type_name)
            .field("fields", &*self.inner.fields.borrow())
            .finish()
    }
}

/// A non-owning handle to a [`Store`].
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    /// Get the store back, if it is still alive.
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(Store::from_inner)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
