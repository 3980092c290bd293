//! Tracked Functions
//!
//! [`track`] runs a function once, records every store field it reads, and
//! re-runs it whenever one of those fields is written.
//!
//! # How Tracking Works
//!
//! 1. The function runs immediately inside a recording frame.
//!
//! 2. The function (or, with [`notify`], a separate callback) is subscribed
//!    to every field that was read.
//!
//! 3. The returned [`Cancel`] removes those subscriptions.
//!
//! The dependency set is fixed at registration. Re-runs triggered by writes
//! are not recorded, so a tracked function that reads different fields on
//! later runs keeps its original subscriptions. Derived fields do follow
//! their inputs, through their own upkeep.
//!
//! # Use Cases
//!
//! - Re-rendering a view when the store fields it displays change
//! - Logging state changes
//! - Keeping an external copy of some fields in sync

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::context::with_recording;
use super::dependency::Dependency;
use super::listener::Listener;
use super::registry::{subscribe_all, unsubscribe_all};

/// Run `f` once and re-run it whenever a field it read is written.
///
/// # Example
///
/// ```rust,ignore
/// let cancel = track({
///     let store = store.clone();
///     move || println!("Count is: {}", store.get("count").unwrap())
/// });
///
/// store.set("count", 5)?; // Prints: "Count is: 5"
/// cancel.cancel();
/// ```
pub fn track<F>(f: F) -> Cancel
where
    F: Fn() + 'static,
{
    let listener = Listener::new(f);
    let subscribed = listener.clone();
    subscribe_reads(move || listener.notify(), subscribed)
}

/// Run `f` once and call `callback` whenever a field `f` read is written.
///
/// `f` itself never runs again. This is the shape a view binding wants:
/// `f` renders, `callback` schedules the next render.
pub fn notify<F, C>(f: F, callback: C) -> Cancel
where
    F: FnOnce(),
    C: Fn() + 'static,
{
    subscribe_reads(f, Listener::new(callback))
}

fn subscribe_reads<F: FnOnce()>(f: F, listener: Listener) -> Cancel {
    let ((), dependencies) = with_recording(f);
    subscribe_all(&dependencies, &listener);

    tracing::debug!(
        listener = %listener.id(),
        dependencies = dependencies.len(),
        "tracking function"
    );

    Cancel {
        inner: Rc::new(CancelInner {
            listener,
            dependencies: RefCell::new(dependencies),
            cancelled: Cell::new(false),
        }),
    }
}

struct CancelInner {
    listener: Listener,
    dependencies: RefCell<Vec<Dependency>>,
    cancelled: Cell<bool>,
}

/// Handle that removes the subscriptions made by [`track`] or [`notify`].
///
/// Dropping a `Cancel` does **not** unsubscribe; call [`Cancel::cancel`],
/// or convert it with [`Cancel::into_guard`] to cancel on drop.
/// Clones refer to the same registration.
#[derive(Clone)]
#[must_use = "the tracked function stays subscribed until `cancel` is called"]
pub struct Cancel {
    inner: Rc<CancelInner>,
}

impl Cancel {
    /// Unsubscribe from every recorded dependency.
    ///
    /// Calling this more than once is a no-op. A notification already in
    /// progress still finishes with the listeners it started with.
    pub fn cancel(&self) {
        if self.inner.cancelled.replace(true) {
            return;
        }
        let dependencies = self.inner.dependencies.take();
        unsubscribe_all(&dependencies, &self.inner.listener);

        tracing::debug!(listener = %self.inner.listener.id(), "cancelled tracking");
    }

    /// Check whether [`Cancel::cancel`] has run.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Dependencies recorded at registration; empty once cancelled.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.inner.dependencies.borrow().clone()
    }

    /// Convert into a guard that cancels when dropped.
    pub fn into_guard(self) -> CancelGuard {
        CancelGuard {
            cancel: self,
            armed: true,
        }
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("listener", &self.inner.listener.id())
            .field("dependencies", &self.inner.dependencies.borrow())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels its registration when dropped.
///
/// Tie one to the lifetime of whatever owns the tracked function, such as
/// a mounted view.
#[derive(Debug)]
pub struct CancelGuard {
    cancel: Cancel,
    armed: bool,
}

impl CancelGuard {
    /// Detach the guard, leaving the registration active.
    pub fn into_inner(mut self) -> Cancel {
        self.armed = false;
        self.cancel.clone()
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cancel.cancel();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
