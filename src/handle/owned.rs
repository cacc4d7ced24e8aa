//! The owning handle.

use core::{any::Any, fmt, ops::Deref, ptr::NonNull};

use intfbus_internals::{
    InterfaceId, ObjectHandler, ObjectId, Query, RawObject, RawObjectRef, RefMonitor,
    SharedMonitor,
};

use crate::{
    error::{OrViolated, UsageError},
    extensible::Extensible,
    handle::{Borrowed, Released, WeakRef},
    handlers::{ExtensibleHandler, InterfaceHandler},
    hooks::ref_monitor,
    interface::{Interface, InterfaceType},
};

/// An owning handle to a reference-counted object.
///
/// A `Ref<I>` contributes one to the count of the object it points into for
/// as long as it exists. Cloning increments the count, dropping decrements
/// it, and the object is destroyed when the last owning reference goes away.
/// A handle that may be empty is written `Option<Ref<I>>`.
///
/// `I` is the view the handle dereferences to: a concrete type for handles
/// returned by [`Ref::new`], or an interface such as `dyn MyTrait` for handles
/// returned by [`Ref::query`].
pub struct Ref<I: ?Sized + 'static> {
    /// The unit of count owned by this handle.
    object: RawObject,
    /// Points into the value of `object`.
    view: NonNull<I>,
}

// SAFETY: Every object value implements `Interface`, which requires
// `Send + Sync`, and the count is atomic. The view is only shared if `I` is.
unsafe impl<I: ?Sized + Send + Sync> Send for Ref<I> {}

// SAFETY: See the `Send` implementation.
unsafe impl<I: ?Sized + Send + Sync> Sync for Ref<I> {}

impl<T: Interface> Ref<T> {
    /// Creates a reference-counted object holding `value`.
    ///
    /// The object answers to the interfaces listed by
    /// [`Interface::provide`], then to the root interface. It cannot be
    /// connected to a bus; use [`Ref::new_ex`] for that.
    ///
    /// # Examples
    ///
    /// ```
    /// use intfbus::prelude::*;
    ///
    /// struct Counter;
    /// impl Interface for Counter {
    ///     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
    /// }
    ///
    /// let counter = Ref::new(Counter);
    /// assert_eq!(counter.ref_count(), 1);
    /// assert!(counter.supports(intfbus::INTERFACE_IID));
    /// ```
    pub fn new(value: T) -> Self {
        Self::with_handler::<InterfaceHandler>(value, ref_monitor::creation_monitor())
    }

    /// Creates a reference-counted object whose count is observed by
    /// `monitor` from the first reference on.
    pub fn new_monitored<M: RefMonitor>(value: T, monitor: M) -> Self {
        Self::with_handler::<InterfaceHandler>(value, Some(ref_monitor::share(monitor)))
    }

    /// Creates the object with the handler `H` deciding how it answers
    /// lookups.
    pub(crate) fn with_handler<H: ObjectHandler<T>>(
        value: T,
        monitor: Option<SharedMonitor>,
    ) -> Self {
        let object = RawObject::new::<T, H>(value, monitor);
        // SAFETY: The object was just created holding a `T`.
        let value: &T = unsafe { object.as_ref().value_downcast_unchecked::<T>() };
        let view = NonNull::from(value);
        Self { object, view }
    }
}

impl<T: Interface> Ref<Extensible<T>> {
    /// Creates a reference-counted object holding `value` that can be
    /// connected to a [`Bus`](crate::Bus).
    ///
    /// Lookups the object cannot answer itself are forwarded to the bus
    /// hosting it.
    pub fn new_ex(value: T) -> Self {
        Ref::with_handler::<ExtensibleHandler>(
            Extensible::new(value),
            ref_monitor::creation_monitor(),
        )
    }
}

impl<I: ?Sized + 'static> Ref<I> {
    /// Assembles a handle from its parts.
    ///
    /// # Safety
    ///
    /// `view` must point into the value of `object`.
    pub(crate) unsafe fn from_parts(object: RawObject, view: NonNull<I>) -> Self {
        Self { object, view }
    }

    /// Borrows the underlying object.
    pub(crate) fn raw(&self) -> RawObjectRef<'_> {
        self.object.as_ref()
    }

    /// Creates a link to the same view that does not own a count.
    pub(crate) fn downgrade(&self) -> WeakRef<I> {
        // SAFETY: The view points into the value of the object.
        unsafe { WeakRef::from_parts(self.object.as_ptr(), self.view) }
    }

    /// The identity of the object this handle points into.
    pub fn object_id(&self) -> ObjectId {
        self.raw().id()
    }

    /// A snapshot of the object's reference count.
    pub fn ref_count(&self) -> usize {
        self.raw().ref_count()
    }

    /// The name of the type of the object's value.
    pub fn type_name(&self) -> &'static str {
        self.raw().type_name()
    }

    /// Returns a raw pointer to the view.
    pub fn as_ptr(&self) -> *const I {
        self.view.as_ptr()
    }

    /// Whether two handles point into the same object, regardless of the
    /// views they hold.
    pub fn ptr_eq<J: ?Sized>(this: &Self, other: &Ref<J>) -> bool {
        this.object_id() == other.object_id()
    }

    /// Looks up the interface `J`, starting from this object.
    ///
    /// Extensible objects forward lookups they cannot answer to the bus
    /// hosting them. The returned handle owns a new reference.
    ///
    /// # Panics
    ///
    /// Panics where [`Ref::try_query`] returns an error.
    #[track_caller]
    pub fn query<J: ?Sized + InterfaceType>(&self) -> Option<Ref<J>> {
        self.try_query::<J>().or_violated()
    }

    /// See [`Ref::query`].
    ///
    /// # Errors
    ///
    /// * [`UsageError::Finished`] if this object has finished.
    /// * [`UsageError::BusCleared`] if the lookup reaches a bus that has been
    ///   torn down. A torn down bus still answers lookups of its own root
    ///   interfaces.
    pub fn try_query<J: ?Sized + InterfaceType>(&self) -> Result<Option<Ref<J>>, UsageError> {
        lookup::<J>(self.raw())
    }

    /// Looks up the interface `J`, consuming this handle.
    ///
    /// On failure the handle is returned unchanged.
    ///
    /// # Panics
    ///
    /// Panics where [`Ref::try_query`] returns an error.
    #[track_caller]
    pub fn into_interface<J: ?Sized + InterfaceType>(self) -> Result<Ref<J>, Self> {
        match self.query::<J>() {
            Some(found) => Ok(found),
            None => Err(self),
        }
    }

    /// Whether a lookup for `iid` starting from this object succeeds.
    ///
    /// The lookup leaves every reference count as it was.
    ///
    /// # Panics
    ///
    /// Panics where [`Ref::try_query`] returns an error.
    #[track_caller]
    pub fn supports(&self, iid: InterfaceId) -> bool {
        let mut query = Query::new(iid);
        self.raw().query(&mut query);
        match query.into_outcome().or_violated() {
            Some(found) => {
                found.release_no_delete().or_violated();
                true
            }
            None => false,
        }
    }

    /// Looks up the interface `J` and returns a view that owns no reference.
    ///
    /// The reference taken by the lookup is given back without destroying
    /// anything, so the count of the object that answered is unchanged.
    ///
    /// # Safety
    ///
    /// The returned view is only valid while something else keeps the object
    /// that answered alive. When the lookup stays within this object, `self`
    /// does. When it is answered through a bus by another object, the caller
    /// must make sure that object is not disconnected and released while the
    /// view is in use. Convert the view with [`Borrowed::to_ref`] to keep it.
    ///
    /// # Panics
    ///
    /// Panics where [`Ref::try_query`] returns an error.
    #[track_caller]
    pub unsafe fn cast<J: ?Sized + InterfaceType>(&self) -> Option<Borrowed<'_, J>> {
        let found = self.query::<J>()?;
        let view = found.view;
        let object = found.object.release_no_delete().or_violated();
        // SAFETY: The view points into the value of `object`, and the caller
        // guarantees the object outlives the borrow.
        Some(unsafe { Borrowed::from_parts(object, view) })
    }

    /// Gives up ownership without destroying the object.
    ///
    /// The count is decremented but the object is never destroyed by this
    /// call, even when the count reaches zero. The returned [`Released`]
    /// must be managed by hand from here on.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero, which means a reference has been
    /// released twice.
    pub fn release(self) -> Released<I> {
        let view = self.view;
        let object = self.object.release_no_delete().or_violated();
        // SAFETY: The view points into the value of `object`.
        unsafe { Released::from_parts(object, view) }
    }

    /// Observes every reference-count operation on the object with
    /// `monitor`, replacing any previous monitor.
    pub fn set_monitor<M: RefMonitor>(&self, monitor: M) {
        self.raw().set_monitor(Some(ref_monitor::share(monitor)));
    }

    /// Removes the object's monitor.
    pub fn clear_monitor(&self) {
        self.raw().set_monitor(None);
    }
}

/// Looks up the interface `J` starting from `object`.
fn lookup<J: ?Sized + InterfaceType>(
    object: RawObjectRef<'_>,
) -> Result<Option<Ref<J>>, UsageError> {
    let mut slot: Option<NonNull<J>> = None;
    let outcome = {
        // SAFETY: `slot` outlives the query and is only read once the query
        // has been consumed.
        let mut query =
            unsafe { Query::with_slot(J::IID, NonNull::from(&mut slot as &mut dyn Any)) };
        object.query(&mut query);
        query.into_outcome()
    };
    let (Some(found), Some(view)) = (outcome?, slot) else {
        return Ok(None);
    };
    // SAFETY: The view was offered by `found`, which checked that it lies
    // within its value.
    Ok(Some(unsafe { Ref::from_parts(found, view) }))
}

impl<I: ?Sized + 'static> Clone for Ref<I> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            view: self.view,
        }
    }
}

impl<I: ?Sized + 'static> Deref for Ref<I> {
    type Target = I;

    fn deref(&self) -> &I {
        // SAFETY: The view points into the value of the object, which this
        // handle keeps alive.
        unsafe { self.view.as_ref() }
    }
}

impl<I: ?Sized + 'static> fmt::Debug for Ref<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("object", &self.object_id())
            .field("type", &self.type_name())
            .field("count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::{hooks::ref_monitor::RefTally, interface::Request};

    struct Plain;

    impl Interface for Plain {
        fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
    }

    #[test]
    fn test_ref_send_sync() {
        static_assertions::assert_impl_all!(Ref<Plain>: Send, Sync, Clone);
        static_assertions::assert_impl_all!(Ref<dyn Interface>: Send, Sync, Clone);
        static_assertions::assert_not_impl_any!(Ref<core::cell::Cell<u8>>: Send, Sync);
    }

    #[test]
    fn test_ref_size() {
        assert_eq!(
            core::mem::size_of::<Option<Ref<Plain>>>(),
            2 * core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_clone_drop_balance() {
        let tally = Arc::new(RefTally::default());
        let object = Ref::new_monitored(Plain, tally.clone());
        let copies: alloc::vec::Vec<_> = (0..3).map(|_| object.clone()).collect();
        assert_eq!(object.ref_count(), 4);
        drop(copies);
        assert_eq!(object.ref_count(), 1);
        drop(object);
        assert_eq!(tally.refs(), 4);
        assert!(tally.is_balanced());
    }

    #[test]
    fn test_root_lookup() {
        let object = Ref::new(Plain);
        let root = object.query::<dyn Interface>().unwrap();
        assert!(Ref::ptr_eq(&root, &object));
        assert_eq!(object.ref_count(), 2);
        assert!(object.supports(crate::INTERFACE_IID));
        assert!(!object.supports(crate::EXTENSIBLE_INTERFACE_IID));
        assert_eq!(object.ref_count(), 2);
    }
}
