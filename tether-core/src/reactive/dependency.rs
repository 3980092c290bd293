//! Dependencies and dependency-set reconciliation.
//!
//! A [`Dependency`] names one field of one store. Recording passes produce
//! lists of them; derived-field upkeep compares consecutive lists to decide
//! whether its subscriptions need to move.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use indexmap::IndexSet;

use super::store::{Store, StoreId, StoreInner};

/// Interned field name.
pub type FieldName = Rc<str>;

/// A (store, field) pair read during a recording pass.
///
/// The store is held weakly: a dependency never keeps a store alive.
/// Equality and hashing use the store's identity and the field name only.
#[derive(Clone)]
pub struct Dependency {
    store: Weak<StoreInner>,
    store_id: StoreId,
    field: FieldName,
}

impl Dependency {
    pub(crate) fn new(store: &Store, field: FieldName) -> Self {
        Self {
            store: store.downgrade_inner(),
            store_id: store.id(),
            field,
        }
    }

    /// Identity of the store this dependency refers to.
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// Name of the field that was read.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub(crate) fn field_name(&self) -> &FieldName {
        &self.field
    }

    /// The store, if it is still alive.
    pub fn store(&self) -> Option<Store> {
        self.store.upgrade().map(Store::from_inner)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.store_id == other.store_id && self.field == other.field
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.store_id.hash(state);
        self.field.hash(state);
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.store_id, self.field)
    }
}

/// Drop repeated dependencies, keeping the first occurrence of each.
pub fn dedup(dependencies: Vec<Dependency>) -> Vec<Dependency> {
    dependencies
        .into_iter()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Order-independent equality of two dependency sets.
pub fn same_dependencies(a: &[Dependency], b: &[Dependency]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let b: HashSet<&Dependency> = b.iter().collect();
    a.iter().all(|dep| b.contains(dep))
}
