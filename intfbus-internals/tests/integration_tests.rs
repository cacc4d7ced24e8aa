//! Integration tests for the intfbus-internals crate.
//!
//! ## Lifecycle
//! - `test_destructor_runs_once`: the value is dropped exactly once, on the
//!   owning decrement that reaches zero
//! - `test_underflow_is_reported`: decrements below zero fail without
//!   touching the object
//! - `test_monitor_balance`: refs and unrefs seen by a monitor balance out at
//!   destruction
//!
//! ## Queries
//! - `test_handler_views`: a handler answering several identifiers
//! - `test_forwarding_cycle_terminates`: two objects forwarding to each other
//! - `test_forwarding_finds_target`: a lookup answered by a forwarding target

use core::{any::Any, ptr::NonNull};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use intfbus_internals::{
    InterfaceId, ObjectHandler, ObjectId, Query, RawObject, RawObjectPtr, RawObjectRef,
    RefMonitor, RefOp, SharedMonitor,
};
use unsize::CoerceUnsize;

const ALPHA: InterfaceId = InterfaceId::from_name("test.Alpha");
const BETA: InterfaceId = InterfaceId::from_name("test.Beta");
const GAMMA: InterfaceId = InterfaceId::from_name("test.Gamma");

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Inert;

impl<T> ObjectHandler<T> for Inert {
    fn query(_value: &T, _this: RawObjectRef<'_>, _query: &mut Query) -> bool {
        false
    }
}

#[derive(Default)]
struct Tally {
    refs: AtomicUsize,
    unrefs: AtomicUsize,
    no_delete: AtomicUsize,
}

impl RefMonitor for Tally {
    fn on_ref_op(&self, _object: ObjectId, _count_before: usize, op: RefOp) {
        let counter = match op {
            RefOp::Ref => &self.refs,
            RefOp::Unref => &self.unrefs,
            RefOp::UnrefNoDelete => &self.no_delete,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn share(tally: &Arc<Tally>) -> SharedMonitor {
    triomphe::Arc::new(tally.clone()).unsize(unsize::Coercion!(to dyn RefMonitor))
}

#[test]
fn test_destructor_runs_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let object = RawObject::new::<DropCounter, Inert>(DropCounter(drops.clone()), None);
    let second = object.clone();
    let third = second.as_ref().retain();
    assert_eq!(object.as_ref().ref_count(), 3);

    drop(object);
    drop(second);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(third);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_underflow_is_reported() {
    let drops = Arc::new(AtomicUsize::new(0));
    let object = RawObject::new::<DropCounter, Inert>(DropCounter(drops.clone()), None);
    let id = object.as_ref().id();
    let ptr: RawObjectPtr = object.release_no_delete().unwrap();

    // SAFETY: No-delete decrements never destroy the object.
    let object = unsafe { ptr.as_ref() };
    // SAFETY: The decrement fails, so nothing is consumed.
    let error = unsafe { object.release_no_delete() }.unwrap_err();
    assert_eq!(error.object(), id);
    assert_eq!(error.op(), RefOp::UnrefNoDelete);
    // SAFETY: Same as above.
    let error = unsafe { object.release() }.unwrap_err();
    assert_eq!(error.op(), RefOp::Unref);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    // SAFETY: We take over the count added by `retain` below.
    let owner = unsafe { RawObject::from_ptr(object.retain().into_ptr()) };
    drop(owner);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_monitor_balance() {
    let tally = Arc::new(Tally::default());
    let drops = Arc::new(AtomicUsize::new(0));
    let object =
        RawObject::new::<DropCounter, Inert>(DropCounter(drops.clone()), Some(share(&tally)));

    let clones: Vec<RawObject> = (0..5).map(|_| object.clone()).collect();
    let ptr = clones[0].clone().release_no_delete().unwrap();
    assert_eq!(ptr.id(), object.as_ref().id());
    drop(clones);
    drop(object);

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    let refs = tally.refs.load(Ordering::SeqCst);
    let unrefs = tally.unrefs.load(Ordering::SeqCst);
    let no_delete = tally.no_delete.load(Ordering::SeqCst);
    assert_eq!(refs, 7);
    assert_eq!(no_delete, 1);
    assert_eq!(refs, unrefs + no_delete);
}

struct Pair {
    first: u32,
    second: u64,
}

struct PairHandler;

impl ObjectHandler<Pair> for PairHandler {
    fn query(value: &Pair, this: RawObjectRef<'_>, query: &mut Query) -> bool {
        // SAFETY: Both views are fields of the value stored in `this`.
        (unsafe { query.fulfill::<u32>(ALPHA, this, &value.first) })
            // SAFETY: Same as above.
            || unsafe { query.fulfill::<u64>(BETA, this, &value.second) }
    }
}

fn lookup<I: 'static>(
    object: RawObjectRef<'_>,
    iid: InterfaceId,
) -> Option<(RawObject, NonNull<I>)> {
    let mut slot: Option<NonNull<I>> = None;
    // SAFETY: `slot` outlives the query and is only read after it is gone.
    let mut query = unsafe { Query::with_slot(iid, NonNull::from(&mut slot as &mut dyn Any)) };
    object.query(&mut query);
    let found = query.into_found()?;
    Some((found, slot?))
}

#[test]
fn test_handler_views() {
    let object = RawObject::new::<Pair, PairHandler>(
        Pair {
            first: 3,
            second: 4,
        },
        None,
    );

    let (owner, view) = lookup::<u32>(object.as_ref(), ALPHA).unwrap();
    // SAFETY: `owner` keeps the object alive.
    assert_eq!(unsafe { *view.as_ref() }, 3);
    assert_eq!(object.as_ref().ref_count(), 2);
    drop(owner);

    let (_owner, view) = lookup::<u64>(object.as_ref(), BETA).unwrap();
    // SAFETY: `_owner` keeps the object alive.
    assert_eq!(unsafe { *view.as_ref() }, 4);

    assert!(lookup::<u32>(object.as_ref(), GAMMA).is_none());
    assert!(lookup::<u64>(object.as_ref(), ALPHA).is_none());
}

/// A node answering one identifier and forwarding everything else.
struct Node {
    answers: InterfaceId,
    peer: spin::RwLock<Option<RawObjectPtr>>,
}

struct NodeHandler;

impl ObjectHandler<Node> for NodeHandler {
    fn query(value: &Node, this: RawObjectRef<'_>, query: &mut Query) -> bool {
        // SAFETY: The view is the value stored in `this`.
        if unsafe { query.fulfill::<Node>(value.answers, this, value) } {
            return true;
        }
        query.visit(this.id());
        let peer = *value.peer.read();
        match peer {
            // SAFETY: The tests keep both nodes alive while querying.
            Some(peer) => query.forward(unsafe { peer.as_ref() }),
            None => false,
        }
    }
}

fn node(answers: InterfaceId) -> RawObject {
    RawObject::new::<Node, NodeHandler>(
        Node {
            answers,
            peer: spin::RwLock::new(None),
        },
        None,
    )
}

fn link(a: &RawObject, b: &RawObject) {
    // SAFETY: Both objects hold `Node` values.
    let (node_a, node_b) = unsafe {
        (
            a.as_ref().value_downcast_unchecked::<Node>(),
            b.as_ref().value_downcast_unchecked::<Node>(),
        )
    };
    *node_a.peer.write() = Some(b.as_ptr());
    *node_b.peer.write() = Some(a.as_ptr());
}

#[test]
fn test_forwarding_cycle_terminates() {
    let a = node(ALPHA);
    let b = node(BETA);
    link(&a, &b);

    let mut query = Query::new(GAMMA);
    assert!(!a.as_ref().query(&mut query));
    assert!(query.is_visited(a.as_ref().id()));
    assert!(query.is_visited(b.as_ref().id()));
    assert_eq!(a.as_ref().ref_count(), 1);
    assert_eq!(b.as_ref().ref_count(), 1);
}

#[test]
fn test_forwarding_finds_target() {
    let a = node(ALPHA);
    let b = node(BETA);
    link(&a, &b);

    let (owner, view) = lookup::<Node>(a.as_ref(), BETA).unwrap();
    assert_eq!(owner.as_ref().id(), b.as_ref().id());
    // SAFETY: `owner` keeps the node alive.
    assert_eq!(unsafe { view.as_ref() }.answers, BETA);
    assert_eq!(b.as_ref().ref_count(), 2);
    drop(owner);
    assert_eq!(b.as_ref().ref_count(), 1);
}
