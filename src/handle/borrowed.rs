//! Views that own no reference.

use core::{fmt, marker::PhantomData, ops::Deref, ptr::NonNull};

use intfbus_internals::{ObjectId, RawObjectPtr, RawObjectRef};

use crate::handle::Ref;

/// A view of an object that owns no reference, as returned by
/// [`Ref::cast`].
///
/// The object is kept alive by some other reference; see the safety contract
/// of [`Ref::cast`].
pub struct Borrowed<'a, I: ?Sized + 'static> {
    /// The object the view points into.
    object: RawObjectPtr,
    /// Points into the value of `object`.
    view: NonNull<I>,
    /// Behaves like a `&'a I`.
    _marker: PhantomData<&'a I>,
}

// SAFETY: A `Borrowed` behaves like a shared reference to `I`, and the
// object's count is atomic.
unsafe impl<I: ?Sized + Send + Sync> Send for Borrowed<'_, I> {}

// SAFETY: See the `Send` implementation.
unsafe impl<I: ?Sized + Send + Sync> Sync for Borrowed<'_, I> {}

impl<'a, I: ?Sized + 'static> Borrowed<'a, I> {
    /// # Safety
    ///
    /// `view` must point into the value of `object`, and the object must stay
    /// alive for `'a`.
    pub(crate) unsafe fn from_parts(object: RawObjectPtr, view: NonNull<I>) -> Self {
        Self {
            object,
            view,
            _marker: PhantomData,
        }
    }

    fn raw(&self) -> RawObjectRef<'a> {
        // SAFETY: The object is alive for 'a, as guaranteed on creation.
        unsafe { self.object.as_ref() }
    }

    /// The identity of the object.
    pub fn object_id(&self) -> ObjectId {
        self.object.id()
    }

    /// A snapshot of the object's reference count.
    pub fn ref_count(&self) -> usize {
        self.raw().ref_count()
    }

    /// Takes a new owning reference to the same view.
    pub fn to_ref(&self) -> Ref<I> {
        let object = self.raw().retain();
        // SAFETY: The view points into the value of `object`.
        unsafe { Ref::from_parts(object, self.view) }
    }
}

impl<I: ?Sized + 'static> Clone for Borrowed<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: ?Sized + 'static> Copy for Borrowed<'_, I> {}

impl<'a, I: ?Sized + 'static> Deref for Borrowed<'a, I> {
    type Target = I;

    fn deref(&self) -> &I {
        // SAFETY: The object is alive for 'a and the view points into it.
        unsafe { self.view.as_ref() }
    }
}

impl<I: ?Sized + 'static> fmt::Debug for Borrowed<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Borrowed")
            .field("object", &self.object_id())
            .field("count", &self.ref_count())
            .finish()
    }
}
