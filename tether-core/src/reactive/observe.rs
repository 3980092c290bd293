//! Observing plain types.
//!
//! [`observe`] turns a plain, serializable type into a factory of reactive
//! [`Store`]s. The type's derived fields are collected once, when the
//! factory is built, and shared by every instance it creates.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::dependency::FieldName;
use super::derived::DerivedFields;
use super::store::Store;
use crate::error::{Error, Result};

/// A plain data type that can be wrapped in a [`Store`].
///
/// Stored fields are whatever the type serializes to; they must form a map
/// of named fields (a struct with named fields, or a map). Derived fields
/// are declared by overriding [`Observable::derived`].
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize, Default)]
/// struct Totals {
///     prop1: i64,
///     prop2: i64,
/// }
///
/// impl Observable for Totals {
///     fn derived(fields: &mut DerivedFields) {
///         fields.define("sum", |store| {
///             Ok(store.get_as::<i64>("prop1")? + store.get_as::<i64>("prop2")?)
///         });
///     }
/// }
/// ```
pub trait Observable: Serialize + 'static {
    /// Declare the type's derived fields.
    ///
    /// To build on another type's fields, call its `derived` first and then
    /// redefine the names to override.
    fn derived(_fields: &mut DerivedFields) {}
}

/// Factory of stores for the observable type `T`.
pub struct Observed<T> {
    derived: Rc<DerivedFields>,
    _marker: PhantomData<fn() -> T>,
}

/// Build a store factory for `T`.
pub fn observe<T: Observable>() -> Observed<T> {
    let mut derived = DerivedFields::new();
    T::derived(&mut derived);
    Observed {
        derived: Rc::new(derived),
        _marker: PhantomData,
    }
}

impl<T: Observable> Observed<T> {
    /// Layer additional derived fields over the type's own.
    ///
    /// Names defined here override the type's accessors of the same name.
    /// Stores created before the call keep the table they were created with.
    pub fn extend<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut DerivedFields),
    {
        f(Rc::make_mut(&mut self.derived));
        self
    }

    /// Wrap a fresh plain instance.
    ///
    /// Each call produces an independent store with its own identity and
    /// listeners.
    pub fn create(&self, plain: T) -> Result<Store> {
        let type_name = std::any::type_name::<T>();

        let fields = match serde_json::to_value(&plain)? {
            Value::Object(map) => map
                .into_iter()
                .map(|(name, value)| (FieldName::from(name), value))
                .collect::<IndexMap<_, _>>(),
            _ => return Err(Error::NotAStruct { type_name }),
        };

        let store = Store::new(type_name, fields, Rc::clone(&self.derived));
        tracing::trace!(store = %store.id(), type_name, "observed new instance");
        Ok(store)
    }

    /// Names of the derived fields every instance will have.
    pub fn derived_fields(&self) -> impl Iterator<Item = &str> {
        self.derived.names()
    }
}

impl<T: Observable + Default> Observed<T> {
    /// Wrap a default-constructed instance.
    pub fn create_default(&self) -> Result<Store> {
        self.create(T::default())
    }
}

impl<T> Clone for Observed<T> {
    fn clone(&self) -> Self {
        Self {
            derived: Rc::clone(&self.derived),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Observed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("type", &std::any::type_name::<T>())
            .field("derived", &self.derived)
            .finish()
    }
}
