//! Reference-count monitors.
//!
//! A monitor observes every reference-count operation on an object: the
//! object's identity, the count right before the operation, and whether it was
//! a [`RefOp::Ref`], [`RefOp::Unref`] or [`RefOp::UnrefNoDelete`]. Monitors
//! are meant for tests and diagnostics and cannot change the outcome of an
//! operation.
//!
//! A monitor can be attached to a single object with [`Ref::set_monitor`] or
//! [`Ref::new_monitored`], or installed for every new object with
//! [`register_ref_monitor`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use intfbus::{hooks::ref_monitor::RefTally, prelude::*};
//!
//! struct Sensor;
//! impl Interface for Sensor {
//!     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
//! }
//!
//! let tally = Arc::new(RefTally::default());
//! let sensor = Ref::new_monitored(Sensor, tally.clone());
//! let copy = sensor.clone();
//! drop(copy);
//! drop(sensor);
//!
//! assert_eq!(tally.refs(), 2);
//! assert_eq!(tally.unrefs(), 2);
//! assert!(tally.is_balanced());
//! ```
//!
//! [`Ref::set_monitor`]: crate::Ref::set_monitor
//! [`Ref::new_monitored`]: crate::Ref::new_monitored

use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

pub use intfbus_internals::{ObjectId, RefMonitor, RefOp, SharedMonitor};
use unsize::CoerceUnsize;

use crate::hooks::hook_lock::HookLock;

static DEFAULT_MONITOR: HookLock<SharedMonitor> = HookLock::new();

/// Wraps a monitor so it can be shared between objects.
pub fn share<M: RefMonitor>(monitor: M) -> SharedMonitor {
    triomphe::Arc::new(monitor).unsize(unsize::Coercion!(to dyn RefMonitor))
}

/// Installs `monitor` on every object created from now on.
///
/// Objects that already exist keep their monitor. The previously registered
/// monitor, if any, is returned.
///
/// # Examples
///
/// ```
/// use intfbus::hooks::ref_monitor::{MonitorFn, register_ref_monitor, unregister_ref_monitor};
///
/// register_ref_monitor(MonitorFn(|object, count_before, op| {
///     println!("{op} on {object} at {count_before}");
/// }));
/// unregister_ref_monitor();
/// ```
pub fn register_ref_monitor<M: RefMonitor>(monitor: M) -> Option<SharedMonitor> {
    DEFAULT_MONITOR.replace(Some(share(monitor)))
}

/// Stops installing a monitor on new objects, returning the registered one.
pub fn unregister_ref_monitor() -> Option<SharedMonitor> {
    DEFAULT_MONITOR.replace(None)
}

/// The monitor to install on a new object.
pub(crate) fn creation_monitor() -> Option<SharedMonitor> {
    DEFAULT_MONITOR.load()
}

/// A [`RefMonitor`] calling a closure.
#[derive(Clone, Copy)]
pub struct MonitorFn<F>(pub F);

impl<F> RefMonitor for MonitorFn<F>
where
    F: Fn(ObjectId, usize, RefOp) + Send + Sync + 'static,
{
    #[inline]
    fn on_ref_op(&self, object: ObjectId, count_before: usize, op: RefOp) {
        (self.0)(object, count_before, op);
    }
}

impl<F> fmt::Debug for MonitorFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MonitorFn")
    }
}

/// A [`RefMonitor`] counting operations by kind.
///
/// Share it through an `Arc` to read the counters back. Counters from every
/// object the tally is attached to are summed.
#[derive(Debug, Default)]
pub struct RefTally {
    refs: AtomicUsize,
    unrefs: AtomicUsize,
    unrefs_no_delete: AtomicUsize,
    underflows: AtomicUsize,
}

impl RefTally {
    /// Number of increments.
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    /// Number of owning decrements.
    pub fn unrefs(&self) -> usize {
        self.unrefs.load(Ordering::SeqCst)
    }

    /// Number of decrements that could not destroy the object.
    pub fn unrefs_no_delete(&self) -> usize {
        self.unrefs_no_delete.load(Ordering::SeqCst)
    }

    /// Number of decrements attempted on a count of zero.
    pub fn underflows(&self) -> usize {
        self.underflows.load(Ordering::SeqCst)
    }

    /// Whether every increment has been matched by a decrement.
    pub fn is_balanced(&self) -> bool {
        self.refs() == self.unrefs() + self.unrefs_no_delete()
    }
}

impl RefMonitor for RefTally {
    fn on_ref_op(&self, _object: ObjectId, count_before: usize, op: RefOp) {
        let counter = match op {
            _ if op != RefOp::Ref && count_before == 0 => &self.underflows,
            RefOp::Ref => &self.refs,
            RefOp::Unref => &self.unrefs,
            RefOp::UnrefNoDelete => &self.unrefs_no_delete,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}
