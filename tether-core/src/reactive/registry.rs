//! Subscription Registry
//!
//! Every store owns one [`Subscriptions`] table mapping its field names to
//! ordered listener lists. Because the table lives inside the store, it is
//! freed together with the store and never keeps the store alive.
//!
//! # Notification
//!
//! `emit` copies the listener list before invoking anything. Listeners may
//! therefore subscribe, unsubscribe, read and write freely while being
//! notified; changes take effect from the next emit on.

use std::cell::RefCell;
use std::collections::HashMap;

use smallvec::SmallVec;

use super::dependency::{Dependency, FieldName};
use super::listener::Listener;

type ListenerList = SmallVec<[Listener; 4]>;

/// Per-store table of field listeners.
#[derive(Default)]
pub(crate) struct Subscriptions {
    table: RefCell<HashMap<FieldName, ListenerList>>,
}

impl Subscriptions {
    /// Append `listener` to the field's list. Duplicates are kept.
    pub fn subscribe(&self, field: FieldName, listener: Listener) {
        self.table
            .borrow_mut()
            .entry(field)
            .or_default()
            .push(listener);
    }

    /// Remove every entry of `listener` from the field's list.
    pub fn unsubscribe(&self, field: &str, listener: &Listener) {
        let mut table = self.table.borrow_mut();
        if let Some(listeners) = table.get_mut(field) {
            listeners.retain(|l| l != listener);
            if listeners.is_empty() {
                table.remove(field);
            }
        }
    }

    /// Invoke the field's listeners in subscription order.
    pub fn emit(&self, field: &str) {
        let listeners = match self.table.borrow().get(field) {
            Some(listeners) => listeners.clone(),
            None => return,
        };

        tracing::trace!(field, listeners = listeners.len(), "notifying listeners");

        for listener in &listeners {
            listener.notify();
        }
    }

    /// Number of subscription entries for the field.
    pub fn count(&self, field: &str) -> usize {
        self.table.borrow().get(field).map_or(0, |l| l.len())
    }
}

/// Subscribe `listener` to every dependency whose store is still alive.
pub(crate) fn subscribe_all(dependencies: &[Dependency], listener: &Listener) {
    for dependency in dependencies {
        if let Some(store) = dependency.store() {
            store
                .subscriptions()
                .subscribe(dependency.field_name().clone(), listener.clone());
        }
    }
}

/// Unsubscribe `listener` from every dependency whose store is still alive.
pub(crate) fn unsubscribe_all(dependencies: &[Dependency], listener: &Listener) {
    for dependency in dependencies {
        if let Some(store) = dependency.store() {
            store
                .subscriptions()
                .unsubscribe(dependency.field(), listener);
        }
    }
}
