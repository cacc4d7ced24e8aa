use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use intfbus::{
    EXTENSIBLE_INTERFACE_IID, INTERFACE_IID, InterfaceType, UsageError, declare_interface,
    hooks::ref_monitor::RefTally, implement_interfaces, prelude::*,
};

trait Greeter: Interface {
    fn greet(&self) -> &'static str;
}
declare_interface!(dyn Greeter = "tests.Greeter");

trait Counter: Interface {
    fn count(&self) -> usize;
}
declare_interface!(dyn Counter = "tests.Counter");

struct Droppable {
    drops: Arc<AtomicUsize>,
}

impl Interface for Droppable {
    fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
}

impl Drop for Droppable {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

struct English;

impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}

impl Counter for English {
    fn count(&self) -> usize {
        1
    }
}

implement_interfaces!(English => dyn Greeter, dyn Counter);

#[test]
fn test_destroyed_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let tally = Arc::new(RefTally::default());
    let object = Ref::new_monitored(
        Droppable {
            drops: drops.clone(),
        },
        tally.clone(),
    );
    let root = object.query::<dyn Interface>().unwrap();
    let copy = root.clone();
    drop(object);
    drop(root);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(copy.ref_count(), 1);
    drop(copy);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(tally.refs(), 3);
    assert_eq!(tally.unrefs(), 3);
    assert!(tally.is_balanced());
}

#[test]
fn test_manual_counting() {
    let drops = Arc::new(AtomicUsize::new(0));
    let object = Ref::new(Droppable {
        drops: drops.clone(),
    });
    let released = object.release();

    // SAFETY: The object is never destroyed before the final `adopt` handle
    // is dropped.
    unsafe {
        assert_eq!(released.ref_count(), 0);
        released.add_ref();
        released.add_ref();
        assert_eq!(released.ref_count(), 2);
        released.unref_no_delete();
        assert_eq!(released.ref_count(), 1);
        assert_eq!(released.get().drops.load(Ordering::SeqCst), 0);

        let owned = released.retain();
        assert_eq!(owned.ref_count(), 2);
        released.unref();
        assert_eq!(owned.ref_count(), 1);
        drop(owned);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unref_no_delete_to_zero_keeps_object() {
    let drops = Arc::new(AtomicUsize::new(0));
    let tally = Arc::new(RefTally::default());
    let released = Ref::new_monitored(
        Droppable {
            drops: drops.clone(),
        },
        tally.clone(),
    )
    .release();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    // SAFETY: Decrements that find a zero count fail without touching the
    // object, which stays alive until the adopted handle is dropped.
    unsafe {
        assert_eq!(
            released.try_unref(),
            Err(UsageError::RefCountUnderflow {
                object: released.object_id(),
                op: intfbus::RefOp::Unref,
            })
        );
        assert!(released.try_unref_no_delete().is_err());
        released.add_ref();
        drop(released.adopt());
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(tally.underflows(), 2);
}

#[test]
fn test_cast_leaves_count_unchanged() {
    let object = Ref::new(English);
    assert_eq!(object.ref_count(), 1);

    // SAFETY: `object` keeps the object alive while the view is in use.
    let greeter = unsafe { object.cast::<dyn Greeter>() }.unwrap();
    assert_eq!(greeter.greet(), "hello");
    assert_eq!(object.ref_count(), 1);
    assert_eq!(greeter.object_id(), object.object_id());

    let kept = greeter.to_ref();
    assert_eq!(object.ref_count(), 2);
    drop(kept);

    assert!(object.supports(<dyn Greeter>::IID));
    assert!(object.supports(INTERFACE_IID));
    assert!(!object.supports(EXTENSIBLE_INTERFACE_IID));
    assert_eq!(object.ref_count(), 1);
}

#[test]
fn test_lookup_order_and_failure() {
    let object = Ref::new(English);
    let counter = object.query::<dyn Counter>().unwrap();
    assert_eq!(counter.count(), 1);
    assert!(Ref::ptr_eq(&counter, &object));
    assert!(object.query::<dyn ExtensibleInterface>().is_none());
    assert!(object.query::<Bus>().is_none());
    assert_eq!(object.ref_count(), 2);

    let root: Ref<dyn Interface> = object.into_interface().ok().unwrap();
    let object = match root.into_interface::<Bus>() {
        Ok(_) => panic!("not a bus"),
        Err(root) => root,
    };
    assert_eq!(object.ref_count(), 2);
}

#[test]
fn test_primary_interface() {
    let plain = Ref::new(English);
    assert_eq!(plain.primary().unwrap().greet(), "hello");

    let extensible = Ref::new_ex(English);
    assert_eq!(extensible.primary().unwrap().greet(), "hello");
    assert_eq!(extensible.greet(), "hello");
    assert!(extensible.supports(EXTENSIBLE_INTERFACE_IID));
    assert_eq!(extensible.ref_count(), 1);
}

struct Impostor;

static ENGLISH: English = English;

impl Interface for Impostor {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        request.provide::<dyn Greeter>(&ENGLISH);
    }
}

#[test]
#[should_panic(expected = "does not belong to it")]
fn test_foreign_view_is_rejected() {
    let object = Ref::new(Impostor);
    let _ = object.query::<dyn Greeter>();
}

#[test]
fn test_foreign_view_only_checked_when_requested() {
    let object = Ref::new(Impostor);
    assert!(object.query::<dyn Counter>().is_none());
    assert!(object.supports(INTERFACE_IID));
}
