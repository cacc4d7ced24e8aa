//! Non-owning back-references between objects.

use core::ptr::NonNull;

use intfbus_internals::{ObjectId, RawObjectPtr};

use crate::handle::Ref;

/// A non-owning link to a view.
///
/// Used for back-references that must not keep their target alive: the bus
/// hosting an extensible object, and sibling buses. Whoever stores one is
/// responsible for dropping it before the target is destroyed.
pub(crate) struct WeakRef<T: ?Sized + 'static> {
    /// The object the view points into.
    object: RawObjectPtr,
    /// Points into the value of `object`.
    view: NonNull<T>,
}

// SAFETY: A `WeakRef` is an address, and dereferencing it is `unsafe`.
unsafe impl<T: ?Sized + Send + Sync> Send for WeakRef<T> {}

// SAFETY: See the `Send` implementation.
unsafe impl<T: ?Sized + Send + Sync> Sync for WeakRef<T> {}

impl<T: ?Sized + 'static> WeakRef<T> {
    /// # Safety
    ///
    /// `view` must point into the value of `object`.
    pub(crate) unsafe fn from_parts(object: RawObjectPtr, view: NonNull<T>) -> Self {
        Self { object, view }
    }

    pub(crate) fn object_id(&self) -> ObjectId {
        self.object.id()
    }

    /// Takes an owning reference, unless the count has already reached zero.
    ///
    /// # Safety
    ///
    /// The object must not have been deallocated.
    pub(crate) unsafe fn upgrade(&self) -> Option<Ref<T>> {
        // SAFETY: Guaranteed by the caller.
        let object = unsafe { self.object.as_ref() }.try_retain()?;
        // SAFETY: The view points into the value of `object`.
        Some(unsafe { Ref::from_parts(object, self.view) })
    }

    /// Borrows the view without taking a reference.
    ///
    /// # Safety
    ///
    /// The object must stay allocated for `'a`.
    pub(crate) unsafe fn get<'a>(&self) -> &'a T {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.view.as_ref() }
    }
}

impl<T: ?Sized + 'static> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized + 'static> Copy for WeakRef<T> {}
