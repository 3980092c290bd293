//! Reactive Stores
//!
//! This module implements automatic dependency tracking for plain data:
//! stores, derived fields, and tracked functions.
//!
//! # Concepts
//!
//! ## Stores
//!
//! A Store wraps one instance of a plain serializable type. Every field read
//! goes through the store, so when a read happens while a tracked function
//! runs, the store records the (store, field) pair as a dependency of that
//! function. Every field write notifies the listeners of that field.
//!
//! ## Derived Fields
//!
//! A derived field is computed from other fields by an accessor declared on
//! the type. Once a derived field has been read by a tracked function, it
//! keeps its own subscriptions to its inputs up to date and notifies its
//! readers when any of them changes, even when the inputs it reads depend
//! on branches.
//!
//! ## Tracked Functions
//!
//! [`track`] runs a function once and subscribes it to every field it read.
//! Writing any of those fields re-runs it synchronously, before the write
//! returns. The returned [`Cancel`] removes the subscriptions.
//!
//! # Implementation Notes
//!
//! Dependency discovery uses a thread-local stack of recording frames (see
//! [`ReactiveContext`]). Subscriptions live in a table owned by each store,
//! and everything that refers to a store from outside holds it weakly, so a
//! dropped store takes its listeners with it.
//!
//! Everything here is single-threaded: stores and listeners are `Rc`-based
//! and notification happens on the caller's stack.

mod context;
mod dependency;
mod derived;
mod listener;
mod observe;
mod registry;
mod store;
mod track;

pub use context::{untracked, with_recording, ReactiveContext};
pub use dependency::{dedup, same_dependencies, Dependency, FieldName};
pub use derived::{Accessor, DerivedFields};
pub use listener::{Listener, ListenerId};
pub use observe::{observe, Observable, Observed};
pub use store::{Store, StoreId, WeakStore};
pub use track::{notify, track, Cancel, CancelGuard};
