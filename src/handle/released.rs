//! Objects whose reference is managed by hand.

use core::{fmt, ptr::NonNull};

use intfbus_internals::{ObjectId, RawObject, RawObjectPtr, RawObjectRef};

use crate::{
    error::{OrViolated, UsageError},
    handle::Ref,
};

/// An object whose reference count is managed by hand.
///
/// Obtained from [`Ref::release`]. It is a plain address: copying it, or
/// dropping it, does nothing to the object. Every operation that touches the
/// object is `unsafe`, since nothing guarantees it is still alive.
///
/// # Examples
///
/// ```
/// use intfbus::prelude::*;
///
/// struct Token;
/// impl Interface for Token {
///     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
/// }
///
/// let released = Ref::new(Token).release();
/// // SAFETY: Releasing never destroys the object.
/// unsafe {
///     assert_eq!(released.ref_count(), 0);
///     released.add_ref();
///     assert_eq!(released.ref_count(), 1);
///     // Hand the reference back to a handle, which destroys the object
///     // when dropped.
///     drop(released.adopt());
/// }
/// ```
pub struct Released<I: ?Sized + 'static> {
    /// The object the view points into.
    object: RawObjectPtr,
    /// Points into the value of `object`.
    view: NonNull<I>,
}

// SAFETY: `Released` is an address; using it is `unsafe` and requires the
// same guarantees as a `Ref<I>`.
unsafe impl<I: ?Sized + Send + Sync> Send for Released<I> {}

// SAFETY: See the `Send` implementation.
unsafe impl<I: ?Sized + Send + Sync> Sync for Released<I> {}

impl<I: ?Sized + 'static> Released<I> {
    /// # Safety
    ///
    /// `view` must point into the value of `object`.
    pub(crate) unsafe fn from_parts(object: RawObjectPtr, view: NonNull<I>) -> Self {
        Self { object, view }
    }

    /// # Safety
    ///
    /// The object must be alive for `'a`.
    unsafe fn raw<'a>(&self) -> RawObjectRef<'a> {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.object.as_ref() }
    }

    /// The identity of the object.
    pub fn object_id(&self) -> ObjectId {
        self.object.id()
    }

    /// Returns a raw pointer to the view.
    pub fn as_ptr(&self) -> *const I {
        self.view.as_ptr()
    }

    /// A snapshot of the object's reference count.
    ///
    /// # Safety
    ///
    /// The object must be alive.
    pub unsafe fn ref_count(&self) -> usize {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.raw() }.ref_count()
    }

    /// Borrows the view.
    ///
    /// # Safety
    ///
    /// The object must stay alive for `'a`.
    pub unsafe fn get<'a>(&self) -> &'a I {
        // SAFETY: The view points into the object, which the caller keeps
        // alive for 'a.
        unsafe { self.view.as_ref() }
    }

    /// Increments the count. The caller owns the new unit.
    ///
    /// # Safety
    ///
    /// The object must be alive.
    pub unsafe fn add_ref(&self) {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.raw() }.add_ref();
    }

    /// Decrements the count, destroying the object when it reaches zero.
    ///
    /// # Safety
    ///
    /// The object must be alive and the caller must own one unit of its
    /// count, which is consumed. The object must not be used afterwards
    /// unless other references are known to keep it alive.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero.
    pub unsafe fn unref(&self) {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.try_unref() }.or_violated();
    }

    /// Like [`Released::unref`], reporting an underflow as an error.
    ///
    /// # Safety
    ///
    /// Same as [`Released::unref`].
    pub unsafe fn try_unref(&self) -> Result<(), UsageError> {
        // SAFETY: The object is alive as guaranteed by the caller.
        let object = unsafe { self.raw() };
        // SAFETY: The caller owns one unit of the count and will not use the
        // object afterwards.
        unsafe { object.release() }?;
        Ok(())
    }

    /// Decrements the count without ever destroying the object.
    ///
    /// # Safety
    ///
    /// The object must be alive and the caller must own one unit of its
    /// count, which is consumed.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero.
    pub unsafe fn unref_no_delete(&self) {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.try_unref_no_delete() }.or_violated();
    }

    /// Like [`Released::unref_no_delete`], reporting an underflow as an
    /// error.
    ///
    /// # Safety
    ///
    /// Same as [`Released::unref_no_delete`].
    pub unsafe fn try_unref_no_delete(&self) -> Result<(), UsageError> {
        // SAFETY: The object is alive as guaranteed by the caller.
        let object = unsafe { self.raw() };
        // SAFETY: The caller owns one unit of the count.
        unsafe { object.release_no_delete() }?;
        Ok(())
    }

    /// Takes a new reference and wraps it in a handle.
    ///
    /// # Safety
    ///
    /// The object must be alive.
    pub unsafe fn retain(self) -> Ref<I> {
        // SAFETY: Guaranteed by the caller.
        let object = unsafe { self.raw() }.retain();
        // SAFETY: The view points into the value of `object`.
        unsafe { Ref::from_parts(object, self.view) }
    }

    /// Wraps a reference the caller already owns in a handle, without
    /// incrementing the count.
    ///
    /// # Safety
    ///
    /// The object must be alive and the caller must own one unit of its
    /// count, which is transferred to the handle.
    pub unsafe fn adopt(self) -> Ref<I> {
        // SAFETY: Guaranteed by the caller.
        let object = unsafe { RawObject::from_ptr(self.object) };
        // SAFETY: The view points into the value of `object`.
        unsafe { Ref::from_parts(object, self.view) }
    }
}

impl<I: ?Sized + 'static> Clone for Released<I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: ?Sized + 'static> Copy for Released<I> {}

impl<I: ?Sized + 'static> fmt::Debug for Released<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Released").field(&self.object_id()).finish()
    }
}
