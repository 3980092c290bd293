//! Derived Fields
//!
//! A derived field is computed from other fields by an accessor instead of
//! being stored. Each wrapped type declares its accessors once, in a
//! [`DerivedFields`] table shared by all of its instances.
//!
//! # How Derived Fields Stay Live
//!
//! 1. The first time a derived field is read while a recording frame is
//!    active, its accessor runs once in a fresh recording frame. An upkeep
//!    listener is subscribed to every dependency found, and that set is
//!    kept.
//!
//! 2. When any of those dependencies is written, the upkeep listener runs
//!    the accessor again, again recording.
//!
//! 3. If the new dependency set differs from the kept one, the listener
//!    moves its subscriptions from the old set to the new one. Sets are
//!    compared without regard to order, so a branch that reads the same
//!    fields in a different order causes no churn.
//!
//! 4. Finally the derived field itself is emitted, so anything that read
//!    the derived field re-runs.
//!
//! This keeps branching accessors correct: a field read only on some paths
//! is a live dependency exactly while the path that reads it is taken.
//!
//! # Evaluation
//!
//! The value returned to the reader is computed with recording suspended.
//! The reader depends on the derived field, not on its inputs; the inputs
//! reach it through the upkeep listener's emit.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::context::{untracked, with_recording, ReactiveContext};
use super::dependency::{same_dependencies, Dependency, FieldName};
use super::listener::Listener;
use super::registry::{subscribe_all, unsubscribe_all};
use super::store::{Store, StoreInner};
use crate::error::{Error, Result};

/// Accessor computing a derived field from the store it is read on.
pub type Accessor = Rc<dyn Fn(&Store) -> Result<Value>>;

/// Table of derived fields for one wrapped type.
///
/// Defining a name that already exists replaces its accessor, so a type can
/// start from a base type's table and override individual fields.
#[derive(Clone, Default)]
pub struct DerivedFields {
    accessors: IndexMap<FieldName, Accessor>,
}

impl DerivedFields {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or override) a derived field.
    ///
    /// The accessor's result is serialized into the field's value.
    pub fn define<T, F>(&mut self, name: &str, accessor: F) -> &mut Self
    where
        T: Serialize,
        F: Fn(&Store) -> Result<T> + 'static,
    {
        let field = name.to_owned();
        let accessor: Accessor = Rc::new(move |store: &Store| {
            let value = accessor(store)?;
            serde_json::to_value(value).map_err(|e| Error::conversion(&field, e))
        });
        self.accessors.insert(Rc::from(name), accessor);
        self
    }

    /// Check whether `name` has an accessor.
    pub fn contains(&self, name: &str) -> bool {
        self.accessors.contains_key(name)
    }

    /// Names of all derived fields, in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.accessors.keys().map(|name| &**name)
    }

    /// Number of derived fields.
    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    pub(crate) fn accessor(&self, name: &str) -> Option<(&FieldName, &Accessor)> {
        self.accessors.get_key_value(name)
    }
}

impl fmt::Debug for DerivedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Read a derived field of `store`.
///
/// Installs upkeep for the field if a recording is active and none exists yet.
pub(crate) fn resolve(store: &Store, field: &FieldName, accessor: &Accessor) -> Result<Value> {
    if ReactiveContext::is_recording() && !store.has_upkeep(field) {
        install(store, field, accessor);
    }
    untracked(|| accessor(store))
}

fn install(store: &Store, field: &FieldName, accessor: &Accessor) {
    // Errors surface through the value evaluation that follows.
    let (_, dependencies) = with_recording(|| accessor(store));

    tracing::debug!(
        store = %store.id(),
        field = &**field,
        dependencies = dependencies.len(),
        "installing derived field upkeep"
    );

    let upkeep = Rc::new_cyclic(|this: &Weak<Upkeep>| {
        let this = this.clone();
        Upkeep {
            store: store.downgrade_inner(),
            field: field.clone(),
            accessor: accessor.clone(),
            dependencies: RefCell::new(dependencies),
            listener: Listener::new(move || {
                if let Some(upkeep) = this.upgrade() {
                    upkeep.recompute();
                }
            }),
        }
    });

    store.insert_upkeep(field.clone(), upkeep.clone());
    subscribe_all(&upkeep.dependencies.borrow(), &upkeep.listener);
}

/// Recompute-and-compare listener of one derived field.
///
/// Owned by the store it belongs to; its listener only holds it weakly.
/// Dropping it with the owner removes its subscriptions from other stores.
pub(crate) struct Upkeep {
    store: Weak<StoreInner>,
    field: FieldName,
    accessor: Accessor,
    dependencies: RefCell<Vec<Dependency>>,
    listener: Listener,
}

impl Upkeep {
    fn recompute(&self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let store = Store::from_inner(inner);

        let (result, fresh) = with_recording(|| (self.accessor)(&store));
        if let Err(error) = &result {
            tracing::debug!(field = &*self.field, %error, "derived field accessor failed");
        }

        let unchanged = same_dependencies(&self.dependencies.borrow(), &fresh);
        if !unchanged {
            tracing::debug!(
                store = %store.id(),
                field = &*self.field,
                old = ?self.dependencies.borrow(),
                new = ?fresh,
                "resubscribing derived field"
            );
            let stale = self.dependencies.replace(Vec::new());
            unsubscribe_all(&stale, &self.listener);
            subscribe_all(&fresh, &self.listener);
            *self.dependencies.borrow_mut() = fresh;
        }

        store.subscriptions().emit(&self.field);
    }
}

impl Drop for Upkeep {
    fn drop(&mut self) {
        // The owning store is already gone, so only other stores are reached.
        unsubscribe_all(self.dependencies.get_mut(), &self.listener);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
