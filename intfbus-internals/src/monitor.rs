//! Reference-count monitoring.
//!
//! Every object can carry a [`RefMonitor`] which is told about each
//! reference-count operation before it takes effect. Monitors exist for
//! diagnostics and tests; they cannot influence the operation.

use alloc::sync::Arc;
use core::fmt;

/// Identity of a reference-counted object.
///
/// This is the address of the object header, so it is unique among live
/// objects and stable for the lifetime of an object. It may be reused after
/// the object has been destroyed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Creates an id from an object address.
    pub(crate) const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the address this id was derived from.
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({:#x})", self.0)
    }
}

/// Kind of reference-count operation reported to a [`RefMonitor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefOp {
    /// The count is incremented.
    Ref,
    /// The count is decremented, destroying the object when it reaches zero.
    Unref,
    /// The count is decremented without ever destroying the object.
    UnrefNoDelete,
}

impl fmt::Display for RefOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefOp::Ref => "ref",
            RefOp::Unref => "unref",
            RefOp::UnrefNoDelete => "unref-no-delete",
        })
    }
}

/// Observer of reference-count operations.
pub trait RefMonitor: 'static + Send + Sync {
    /// Called for every operation on a monitored object.
    ///
    /// `count_before` is the count observed immediately before the operation.
    /// For a decrement that fails because the count is already zero, the
    /// monitor is still called with `count_before == 0`.
    ///
    /// Monitors may be called while locks internal to the object model are
    /// held. They must not take or release references, or look up
    /// interfaces.
    fn on_ref_op(&self, object: ObjectId, count_before: usize, op: RefOp);
}

impl<M: RefMonitor + ?Sized> RefMonitor for Arc<M> {
    fn on_ref_op(&self, object: ObjectId, count_before: usize, op: RefOp) {
        (**self).on_ref_op(object, count_before, op);
    }
}

/// A monitor shared between objects.
pub type SharedMonitor = triomphe::Arc<dyn RefMonitor>;
