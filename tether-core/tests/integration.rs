//! Integration Tests for Reactive Stores
//!
//! These tests verify that stores, derived fields, and tracked functions
//! work together correctly.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use serde::Serialize;
use serde_json::json;

use tether_core::reactive::{
    observe, track, Cancel, DerivedFields, Listener, Observable, ReactiveContext, Store,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Rc<Cell<usize>>) {
    count.set(count.get() + 1);
}

#[derive(Serialize)]
struct SimpleStore {
    prop1: String,
    prop2: i64,
}

impl Default for SimpleStore {
    fn default() -> Self {
        Self {
            prop1: "QwertY".to_owned(),
            prop2: 12,
        }
    }
}

impl Observable for SimpleStore {}

#[derive(Serialize)]
struct StoreWithSum {
    prop1: i64,
    prop2: i64,
}

impl Default for StoreWithSum {
    fn default() -> Self {
        Self {
            prop1: 11,
            prop2: 12,
        }
    }
}

impl Observable for StoreWithSum {
    fn derived(fields: &mut DerivedFields) {
        fields.define("sum", |store| {
            Ok(store.get_as::<i64>("prop1")? + store.get_as::<i64>("prop2")?)
        });
    }
}

#[derive(Serialize)]
struct ConditionalStore {
    prop1: i64,
    prop2: i64,
    prop3: i64,
}

impl Default for ConditionalStore {
    fn default() -> Self {
        Self {
            prop1: 1,
            prop2: 12,
            prop3: 13,
        }
    }
}

impl Observable for ConditionalStore {
    fn derived(fields: &mut DerivedFields) {
        fields.define("conditional_sum", |store| {
            let prop1: i64 = store.get_as("prop1")?;
            let prop2: i64 = store.get_as("prop2")?;
            if prop1 <= 5 {
                return Ok(prop1 + prop2);
            }
            Ok(prop1 + prop2 + store.get_as::<i64>("prop3")?)
        });
    }
}

/// Track a function that reads `fields` from `store` and counts its runs.
fn track_reads(store: &Store, fields: &'static [&'static str]) -> (Rc<Cell<usize>>, Cancel) {
    let count = counter();
    let cancel = track({
        let store = store.clone();
        let count = count.clone();
        move || {
            for field in fields {
                store.get(field).unwrap();
            }
            bump(&count);
        }
    });
    (count, cancel)
}

/// A store behaves like the plain value it wraps.
#[test]
fn store_behaves_like_plain_object() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    assert_eq!(store.get("prop1").unwrap(), json!("QwertY"));

    store.set("prop1", "test0").unwrap();
    assert_eq!(store.get("prop1").unwrap(), json!("test0"));
}

/// A tracked function re-runs when the field it read changes.
#[test]
fn rerun_when_dependency_changes() {
    init_tracing();
    let store = observe::<SimpleStore>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["prop1"]);

    store.set("prop1", "test1").unwrap();
    assert_eq!(count.get(), 2);

    cancel.cancel();
}

/// A tracked function re-runs when any of its dependencies change.
#[test]
fn rerun_when_any_dependency_changes() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["prop1", "prop2"]);

    store.set("prop1", "test1").unwrap();
    assert_eq!(count.get(), 2);
    store.set("prop2", 77).unwrap();
    assert_eq!(count.get(), 3);

    cancel.cancel();
}

/// Writes to fields that were never read do not re-run the function.
#[test]
fn no_rerun_for_unread_fields() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["prop1"]);

    store.set("prop2", 99).unwrap();
    assert_eq!(count.get(), 1);

    cancel.cancel();
}

/// Assigning an unchanged value still re-runs dependents.
#[test]
fn unchanged_value_still_notifies() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["prop2"]);

    store.set("prop2", 12).unwrap();
    store.set("prop2", 12).unwrap();
    assert_eq!(count.get(), 3);

    cancel.cancel();
}

/// Two registrations on overlapping fields fire independently.
#[test]
fn multiple_subscribers() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let (first, cancel_first) = track_reads(&store, &["prop1"]);
    let (second, cancel_second) = track_reads(&store, &["prop1", "prop2"]);

    store.set("prop1", "___").unwrap();
    assert_eq!(first.get(), 2);
    assert_eq!(second.get(), 2);

    store.set("prop2", 73).unwrap();
    assert_eq!(first.get(), 2);
    assert_eq!(second.get(), 3);

    cancel_first.cancel();
    cancel_second.cancel();
}

/// One function can depend on fields of several stores.
#[test]
fn multiple_stores() {
    let stores = observe::<SimpleStore>();
    let first = stores.create_default().unwrap();
    let second = stores.create_default().unwrap();
    let count = counter();

    let cancel = track({
        let first = first.clone();
        let second = second.clone();
        let count = count.clone();
        move || {
            first.get("prop2").unwrap();
            second.get("prop2").unwrap();
            bump(&count);
        }
    });

    first.set("prop2", 11).unwrap();
    second.set("prop2", 12).unwrap();
    assert_eq!(count.get(), 3);

    cancel.cancel();
}

/// Instances of the same type never notify each other's listeners.
#[test]
fn instances_are_isolated() {
    let stores = observe::<SimpleStore>();
    let watched = stores.create_default().unwrap();
    let other = stores.create_default().unwrap();
    let (count, cancel) = track_reads(&watched, &["prop1"]);

    other.set("prop1", "elsewhere").unwrap();
    assert_eq!(count.get(), 1);

    cancel.cancel();
}

/// After cancelling, writes no longer re-run the function.
#[test]
fn no_rerun_after_cancel() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["prop1"]);

    store.set("prop1", "beforeCancel").unwrap();
    assert_eq!(count.get(), 2);

    cancel.cancel();

    store.set("prop1", "afterCancel").unwrap();
    assert_eq!(count.get(), 2);

    // Second cancel is a no-op.
    cancel.cancel();
}

/// A tracked read of a derived field follows the field's inputs.
#[test]
fn derived_field_dependencies() {
    init_tracing();
    let store = observe::<StoreWithSum>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["sum"]);
    assert_eq!(count.get(), 1);

    store.set("prop1", 20).unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(store.get("sum").unwrap(), json!(32));

    store.set("prop2", 1).unwrap();
    assert_eq!(count.get(), 3);
    assert_eq!(store.get("sum").unwrap(), json!(21));

    cancel.cancel();
}

/// A derived field starts and stops tracking inputs as its branches change.
#[test]
fn derived_field_dynamic_dependencies() {
    init_tracing();
    let store = observe::<ConditionalStore>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["conditional_sum"]);

    store.set("prop2", 20).unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(store.get("conditional_sum").unwrap(), json!(1 + 20));

    // Below the threshold `prop3` is not read.
    store.set("prop3", 50).unwrap();
    assert_eq!(count.get(), 2);
    store.set("prop3", 13).unwrap();

    store.set("prop1", 5).unwrap();
    assert_eq!(count.get(), 3);
    assert_eq!(store.get("conditional_sum").unwrap(), json!(5 + 20));

    store.set("prop1", 10).unwrap();
    assert_eq!(count.get(), 4);
    assert_eq!(store.get("conditional_sum").unwrap(), json!(10 + 20 + 13));

    store.set("prop3", 30).unwrap();
    assert_eq!(count.get(), 5);
    assert_eq!(store.get("conditional_sum").unwrap(), json!(10 + 20 + 30));

    cancel.cancel();
}

/// Reading the same inputs in a different order does not move subscriptions.
#[test]
fn reordered_inputs_cause_no_resubscription() {
    #[derive(Serialize, Default)]
    struct Flippable {
        flip: bool,
        a: i64,
        b: i64,
    }

    impl Observable for Flippable {
        fn derived(fields: &mut DerivedFields) {
            fields.define("total", |store| {
                let (first, second) = if store.get_as::<bool>("flip")? {
                    ("b", "a")
                } else {
                    ("a", "b")
                };
                Ok(store.get_as::<i64>(first)? + store.get_as::<i64>(second)?)
            });
        }
    }

    let store = observe::<Flippable>().create_default().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    // The upkeep of `total` subscribes to `a` before the direct reader does.
    let via_total = track({
        let store = store.clone();
        let log = log.clone();
        move || {
            store.get("total").unwrap();
            log.borrow_mut().push("total");
        }
    });
    let direct = track({
        let store = store.clone();
        let log = log.clone();
        move || {
            store.get("a").unwrap();
            log.borrow_mut().push("direct");
        }
    });

    store.set("flip", true).unwrap();
    log.borrow_mut().clear();

    // Resubscribing would have moved the upkeep behind the direct reader.
    store.set("a", 1).unwrap();
    assert_eq!(*log.borrow(), vec!["total", "direct"]);

    via_total.cancel();
    direct.cancel();
}

/// Cascading writes complete depth-first before the next sibling listener.
#[test]
fn cascades_are_depth_first() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let writer = {
        let store = store.downgrade();
        let log = log.clone();
        Listener::new(move || {
            log.borrow_mut().push("writer:start");
            if let Some(store) = store.upgrade() {
                store.set("prop2", 1).unwrap();
            }
            log.borrow_mut().push("writer:end");
        })
    };
    let downstream = {
        let log = log.clone();
        Listener::new(move || log.borrow_mut().push("downstream"))
    };
    let sibling = {
        let log = log.clone();
        Listener::new(move || log.borrow_mut().push("sibling"))
    };

    store.subscribe("prop1", &writer).unwrap();
    store.subscribe("prop1", &sibling).unwrap();
    store.subscribe("prop2", &downstream).unwrap();

    store.set("prop1", "go").unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["writer:start", "downstream", "writer:end", "sibling"]
    );
}

/// A panicking listener aborts the write and the remaining listeners.
#[test]
fn listener_panic_propagates_to_writer() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let later = counter();

    let failing = Listener::new(|| panic!("listener failed"));
    let after = {
        let later = later.clone();
        Listener::new(move || bump(&later))
    };
    store.subscribe("prop1", &failing).unwrap();
    store.subscribe("prop1", &after).unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| store.set("prop1", "boom")));
    assert!(result.is_err());
    assert_eq!(later.get(), 0);

    // The write itself landed before notification started.
    assert_eq!(store.get("prop1").unwrap(), json!("boom"));
}

/// A panic inside a tracked function leaves no recording frame behind.
#[test]
fn panicking_tracked_function_leaves_context_clean() {
    let store = observe::<SimpleStore>().create_default().unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _cancel = track({
            let store = store.clone();
            move || {
                store.get("prop1").unwrap();
                panic!("render failed");
            }
        });
    }));

    assert!(result.is_err());
    assert_eq!(ReactiveContext::depth(), 0);
    assert!(!ReactiveContext::is_recording());
}

/// Cancelling mid-notification does not skip the in-flight call.
#[test]
fn cancel_during_notification() {
    let store = observe::<SimpleStore>().create_default().unwrap();
    let pending: Rc<RefCell<Option<Cancel>>> = Rc::new(RefCell::new(None));

    // Subscribed ahead of the tracked function.
    let canceller = {
        let pending = pending.clone();
        Listener::new(move || {
            if let Some(cancel) = pending.borrow().as_ref() {
                cancel.cancel();
            }
        })
    };
    store.subscribe("prop1", &canceller).unwrap();

    let (count, cancel) = track_reads(&store, &["prop1"]);
    *pending.borrow_mut() = Some(cancel.clone());

    store.set("prop1", "x").unwrap();
    assert!(cancel.is_cancelled());
    assert_eq!(count.get(), 2);

    store.set("prop1", "y").unwrap();
    assert_eq!(count.get(), 2);
}

/// Dropping a store does not leave it reachable through other stores.
#[derive(Serialize)]
struct Doubling {
    x: i64,
}

impl Default for Doubling {
    fn default() -> Self {
        Self { x: 1 }
    }
}

impl Observable for Doubling {
    fn derived(fields: &mut DerivedFields) {
        fields
            .define("double", |store| Ok(store.get_as::<i64>("x")? * 2))
            .define("quad", |store| Ok(store.get_as::<i64>("double")? * 2));
    }
}

/// A derived field built on another derived field cascades to its readers.
#[test]
fn derived_field_reading_derived_field() {
    init_tracing();
    let store = observe::<Doubling>().create_default().unwrap();
    let (count, cancel) = track_reads(&store, &["quad"]);
    assert_eq!(count.get(), 1);
    assert_eq!(store.get("quad").unwrap(), json!(4));

    // Each level keeps one upkeep listener on the level below.
    assert_eq!(store.subscriber_count("x"), 1);
    assert_eq!(store.subscriber_count("double"), 1);
    assert_eq!(store.subscriber_count("quad"), 1);

    store.set("x", 3).unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(store.get("quad").unwrap(), json!(12));

    assert_eq!(store.subscriber_count("x"), 1);
    assert_eq!(store.subscriber_count("double"), 1);

    cancel.cancel();
    assert_eq!(store.subscriber_count("quad"), 0);
}

#[test]
fn dropped_store_is_released() {
    #[derive(Serialize, Default)]
    struct Mirror {
        seed: i64,
    }

    impl Observable for Mirror {}

    let source = observe::<SimpleStore>().create_default().unwrap();
    let mirror = {
        let source = source.downgrade();
        observe::<Mirror>()
            .extend(move |fields| {
                fields.define("copied", move |_| match source.upgrade() {
                    Some(source) => source.get_as::<i64>("prop2"),
                    None => Ok(0),
                });
            })
            .create_default()
            .unwrap()
    };
    let weak = mirror.downgrade();

    let cancel = track({
        let mirror = mirror.downgrade();
        move || {
            if let Some(mirror) = mirror.upgrade() {
                mirror.get("copied").unwrap();
            }
        }
    });
    assert_eq!(source.subscriber_count("prop2"), 1);

    drop(mirror);
    assert!(weak.upgrade().is_none());
    assert_eq!(source.subscriber_count("prop2"), 0);

    source.set("prop2", 3).unwrap();
    cancel.cancel();
}
