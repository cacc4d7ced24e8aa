//! The intrusive reference count.

use core::{
    fmt,
    sync::atomic::{self, AtomicUsize, Ordering},
};

use crate::monitor::{ObjectId, RefOp, SharedMonitor};

/// Counts above this are treated as a leak of references and abort the
/// operation, mirroring the limit used by the standard library `Arc`.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Error returned when a decrement is attempted on a count that is already
/// zero.
///
/// This always indicates a bookkeeping bug in the caller: some reference was
/// released twice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RefCountError {
    /// The object whose count was already zero.
    object: ObjectId,
    /// The decrement that was attempted.
    op: RefOp,
}

impl RefCountError {
    /// The object whose count was already zero.
    #[must_use]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// The decrement that was attempted.
    #[must_use]
    pub fn op(&self) -> RefOp {
        self.op
    }
}

impl fmt::Display for RefCountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on object {} whose reference count is already zero",
            self.op, self.object
        )
    }
}

impl core::error::Error for RefCountError {}

/// Atomic reference count with an optional monitor.
pub(crate) struct RefCount {
    /// The number of outstanding owning references.
    count: AtomicUsize,
    /// Observer told about every operation.
    ///
    /// The monitor is cloned out of the lock before an operation and called
    /// after it, so it never runs with the lock held and never touches the
    /// object after the count has been released.
    monitor: spin::RwLock<Option<SharedMonitor>>,
}

impl RefCount {
    /// Creates a count of zero.
    pub(crate) fn new(monitor: Option<SharedMonitor>) -> Self {
        Self {
            count: AtomicUsize::new(0),
            monitor: spin::RwLock::new(monitor),
        }
    }

    /// Returns a snapshot of the count.
    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Replaces the monitor.
    pub(crate) fn set_monitor(&self, monitor: Option<SharedMonitor>) {
        let previous = core::mem::replace(&mut *self.monitor.write(), monitor);
        // The previous monitor may run arbitrary code in its destructor.
        core::mem::drop(previous);
    }

    /// Clones the current monitor out of the lock.
    #[inline]
    fn monitor(&self) -> Option<SharedMonitor> {
        self.monitor.read().clone()
    }

    /// Increments the count.
    pub(crate) fn increment(&self, object: ObjectId) {
        let monitor = self.monitor();
        let before = self.count.fetch_add(1, Ordering::Relaxed);
        if before >= MAX_REFCOUNT {
            panic!("reference count of object {object} overflowed");
        }
        if let Some(monitor) = monitor {
            monitor.on_ref_op(object, before, RefOp::Ref);
        }
    }

    /// Increments the count unless it is zero.
    ///
    /// Returns `false` without changing anything when the count is zero. An
    /// object at zero is either being destroyed or is held only by untracked
    /// pointers, and must not be revived by a weak link.
    pub(crate) fn try_increment(&self, object: ObjectId) -> bool {
        let monitor = self.monitor();
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current >= MAX_REFCOUNT {
                panic!("reference count of object {object} overflowed");
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        if let Some(monitor) = monitor {
            monitor.on_ref_op(object, current, RefOp::Ref);
        }
        true
    }

    /// Decrements the count, refusing to go below zero.
    ///
    /// Returns `Ok(true)` when this call took the count from one to zero. In
    /// that case an acquire fence has been issued, so the caller may go on to
    /// destroy the object.
    pub(crate) fn decrement(&self, object: ObjectId, op: RefOp) -> Result<bool, RefCountError> {
        let monitor = self.monitor();
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                if let Some(monitor) = monitor {
                    monitor.on_ref_op(object, 0, op);
                }
                return Err(RefCountError { object, op });
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        if let Some(monitor) = monitor {
            monitor.on_ref_op(object, current, op);
        }
        if current == 1 {
            atomic::fence(Ordering::Acquire);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{sync::Arc, vec::Vec};

    use unsize::CoerceUnsize;

    use super::*;
    use crate::monitor::RefMonitor;

    #[derive(Default)]
    struct Log(spin::RwLock<Vec<(usize, RefOp)>>);

    impl RefMonitor for Log {
        fn on_ref_op(&self, _object: ObjectId, count_before: usize, op: RefOp) {
            self.0.write().push((count_before, op));
        }
    }

    fn shared(log: &Arc<Log>) -> SharedMonitor {
        triomphe::Arc::new(log.clone()).unsize(unsize::Coercion!(to dyn RefMonitor))
    }

    #[test]
    fn test_increment_and_decrement() {
        let id = ObjectId::from_addr(0x10);
        let count = RefCount::new(None);
        assert_eq!(count.get(), 0);

        count.increment(id);
        count.increment(id);
        assert_eq!(count.get(), 2);

        assert_eq!(count.decrement(id, RefOp::UnrefNoDelete), Ok(false));
        assert_eq!(count.decrement(id, RefOp::Unref), Ok(true));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_decrement_at_zero_fails() {
        let id = ObjectId::from_addr(0x20);
        let count = RefCount::new(None);
        let error = count.decrement(id, RefOp::Unref).unwrap_err();
        assert_eq!(error.object(), id);
        assert_eq!(error.op(), RefOp::Unref);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_try_increment_from_zero() {
        let id = ObjectId::from_addr(0x30);
        let count = RefCount::new(None);
        assert!(!count.try_increment(id));
        count.increment(id);
        assert!(count.try_increment(id));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_monitor_sees_count_before() {
        let id = ObjectId::from_addr(0x40);
        let log = Arc::new(Log::default());
        let count = RefCount::new(Some(shared(&log)));

        count.increment(id);
        count.increment(id);
        count.decrement(id, RefOp::UnrefNoDelete).unwrap();
        count.decrement(id, RefOp::Unref).unwrap();
        let _ = count.decrement(id, RefOp::Unref);

        assert_eq!(
            *log.0.read(),
            [
                (0, RefOp::Ref),
                (1, RefOp::Ref),
                (2, RefOp::UnrefNoDelete),
                (1, RefOp::Unref),
                (0, RefOp::Unref),
            ]
        );

        count.set_monitor(None);
        count.increment(id);
        assert_eq!(log.0.read().len(), 5);
    }
}
