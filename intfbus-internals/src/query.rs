//! State of a single interface lookup.
//!
//! A [`Query`] travels from the object the lookup started on through every
//! object and bus it is forwarded to. It carries the requested identifier, the
//! typed slot that receives the resulting view, the set of objects already
//! visited (which breaks cycles between buses) and, once resolved, an owning
//! reference to the object that answered.
//!
//! A handler can also [halt](Query::halt) the lookup when it finds that the
//! object model is being misused. A halted query forwards nowhere and ends
//! without an answer.

use core::{any::Any, ptr::NonNull};

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use crate::{
    iid::InterfaceId,
    monitor::ObjectId,
    object::{RawObject, RawObjectRef},
};

/// Why a lookup was halted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Halt {
    /// The lookup started on an object that has reached the end of its life.
    Finished(ObjectId),
    /// The lookup reached a bus that has been torn down.
    Cleared(ObjectId),
}

/// An in-flight interface lookup.
pub struct Query {
    /// The requested interface.
    iid: InterfaceId,
    /// Destination for the view pointer, an `Option<NonNull<I>>` behind
    /// `dyn Any`.
    ///
    /// # Safety
    ///
    /// When present, the pointer is valid for writes and not aliased for the
    /// lifetime of the query, as promised to [`Query::with_slot`].
    slot: Option<NonNull<dyn Any>>,
    /// Objects that have already been asked.
    visited: HashSet<ObjectId, FxBuildHasher>,
    /// The object that answered, with one unit of count taken on its behalf.
    found: Option<RawObject>,
    /// Set by the first handler that halts the lookup.
    halted: Option<Halt>,
}

impl Query {
    /// Creates a query that only asks whether some object answers to `iid`.
    ///
    /// Any view offered for `iid` is accepted, whatever its type.
    #[must_use]
    pub fn new(iid: InterfaceId) -> Self {
        Self {
            iid,
            slot: None,
            visited: HashSet::with_hasher(FxBuildHasher),
            found: None,
            halted: None,
        }
    }

    /// Creates a query whose resulting view is written to `slot`.
    ///
    /// `slot` must point to an `Option<NonNull<I>>` for the view type `I`
    /// the caller expects. Views of any other type are refused, even if they
    /// are offered under the requested identifier.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `slot` is valid for reads and writes, and
    /// not accessed by anything else, for as long as the query exists.
    #[must_use]
    pub unsafe fn with_slot(iid: InterfaceId, slot: NonNull<dyn Any>) -> Self {
        Self {
            slot: Some(slot),
            ..Self::new(iid)
        }
    }

    /// The requested interface.
    #[inline]
    pub fn iid(&self) -> InterfaceId {
        self.iid
    }

    /// Whether some object has answered.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.found.is_some()
    }

    /// Marks `object` as visited.
    ///
    /// Returns `false` if it had already been visited.
    #[inline]
    pub fn visit(&mut self, object: ObjectId) -> bool {
        self.visited.insert(object)
    }

    /// Whether `object` has been visited.
    #[inline]
    pub fn is_visited(&self, object: ObjectId) -> bool {
        self.visited.contains(&object)
    }

    /// Whether the query is still at the object the lookup started on.
    ///
    /// True until a handler marks an object as visited, which handlers do
    /// before forwarding.
    #[inline]
    pub fn is_origin(&self) -> bool {
        self.visited.is_empty()
    }

    /// Stops the lookup. Only the first reason is kept.
    ///
    /// Has no effect on a query that is already resolved.
    pub fn halt(&mut self, reason: Halt) {
        if self.found.is_none() && self.halted.is_none() {
            self.halted = Some(reason);
        }
    }

    /// Why the lookup was halted, if it was.
    #[inline]
    pub fn halted(&self) -> Option<Halt> {
        self.halted
    }

    /// Forwards the query to `target` unless it has already been visited or
    /// the lookup was halted.
    pub fn forward(&mut self, target: RawObjectRef<'_>) -> bool {
        if self.halted.is_some() || self.is_visited(target.id()) {
            return false;
        }
        target.query(self)
    }

    /// Offers `view`, an implementation of interface `iid` living inside
    /// `this`, as the answer to the query.
    ///
    /// Returns `true` if the query is resolved afterwards. An offer is
    /// ignored when the query is already resolved, when `iid` is not the
    /// requested identifier or when the view type does not match the slot.
    /// On success the count of `this` is incremented on behalf of the caller
    /// of the lookup.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `view` points into the value stored in
    /// `this`, so that it stays valid for as long as `this` is alive.
    pub unsafe fn fulfill<I: ?Sized + 'static>(
        &mut self,
        iid: InterfaceId,
        this: RawObjectRef<'_>,
        view: &I,
    ) -> bool {
        if self.found.is_some() {
            return true;
        }
        if self.halted.is_some() || !iid.equals(self.iid) {
            return false;
        }
        if let Some(mut slot) = self.slot {
            // SAFETY: The slot is valid and unaliased for the lifetime of the
            // query, as guaranteed to `with_slot`.
            let slot: &mut dyn Any = unsafe { slot.as_mut() };
            let Some(slot) = slot.downcast_mut::<Option<NonNull<I>>>() else {
                return false;
            };
            *slot = Some(NonNull::from(view));
        }
        self.found = Some(this.retain());
        true
    }

    /// Consumes the query and returns the object that answered.
    #[must_use]
    pub fn into_found(self) -> Option<RawObject> {
        self.found
    }

    /// Consumes the query and returns the object that answered, or why the
    /// lookup was halted.
    ///
    /// # Errors
    ///
    /// The reason given to [`Query::halt`].
    pub fn into_outcome(self) -> Result<Option<RawObject>, Halt> {
        match self.halted {
            Some(reason) => Err(reason),
            None => Ok(self.found),
        }
    }
}

impl core::fmt::Debug for Query {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Query")
            .field("iid", &self.iid)
            .field("typed", &self.slot.is_some())
            .field("visited", &self.visited.len())
            .field("found", &self.found)
            .field("halted", &self.halted)
            .finish()
    }
}
