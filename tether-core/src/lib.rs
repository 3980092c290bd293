//! Tether Core
//!
//! This crate provides automatic dependency tracking for reactive stores.
//! It implements:
//!
//! - Reactive wrappers around plain serializable types
//! - Derived fields that keep their own dependencies current
//! - Tracked functions that re-run when the fields they read are written
//!
//! Writes propagate synchronously: by the time `set` returns, every
//! dependent function has re-run.
//!
//! # Architecture
//!
//! - `reactive`: stores, derived fields, dependency tracking and the
//!   subscription registry
//! - `error`: error types for store construction and field access
//!
//! # Example
//!
//! ```rust
//! use serde::Serialize;
//! use tether_core::reactive::{observe, track, DerivedFields, Observable};
//!
//! #[derive(Serialize, Default)]
//! struct Totals {
//!     prop1: i64,
//!     prop2: i64,
//! }
//!
//! impl Observable for Totals {
//!     fn derived(fields: &mut DerivedFields) {
//!         fields.define("sum", |store| {
//!             Ok(store.get_as::<i64>("prop1")? + store.get_as::<i64>("prop2")?)
//!         });
//!     }
//! }
//!
//! # fn main() -> tether_core::Result<()> {
//! let store = observe::<Totals>().create_default()?;
//!
//! // Runs once now, and again after every write that changes `sum`'s inputs.
//! let cancel = track({
//!     let store = store.clone();
//!     move || println!("sum = {}", store.get("sum").unwrap())
//! });
//!
//! store.set("prop1", 20)?; // prints "sum = 20"
//! cancel.cancel();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod reactive;

pub use error::{Error, Result};
