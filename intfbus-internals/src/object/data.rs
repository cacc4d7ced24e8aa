//! This module encapsulates the fields of the [`ObjectData`]. Since this is the
//! only place they are visible, the [`ObjectVtable`] of an object is guaranteed
//! to always be in sync with the type of the value stored next to it: they are
//! paired at creation and nothing can change either afterwards.

use core::ptr::NonNull;

use crate::{
    handlers::ObjectHandler,
    monitor::SharedMonitor,
    object::{count::RefCount, raw::RawObjectRef, vtable::ObjectVtable},
    util::{CastTo, Erased},
};

/// Type-erased object storage with vtable-based dispatch.
///
/// `#[repr(C)]` keeps the header fields in front of the value at offsets that
/// do not depend on `T`, so they can be reached through an
/// `ObjectData<Erased>` pointer.
#[repr(C)]
pub(super) struct ObjectData<T: 'static> {
    /// Reference to the vtable of this object
    vtable: &'static ObjectVtable,
    /// The intrusive reference count
    count: RefCount,
    /// The value of this object
    value: T,
}

impl<T: 'static> ObjectData<T> {
    /// Creates a new [`ObjectData`] with a count of zero.
    pub(super) fn new<H: ObjectHandler<T>>(value: T, monitor: Option<SharedMonitor>) -> Self {
        Self {
            vtable: ObjectVtable::new::<T, H>(),
            count: RefCount::new(monitor),
            value,
        }
    }
}

impl<'a> RawObjectRef<'a> {
    /// Returns a reference to the [`ObjectVtable`] of the [`ObjectData`]
    /// instance.
    pub(super) fn vtable(self) -> &'static ObjectVtable {
        let ptr = self.as_ptr();
        // SAFETY: We don't know the actual inner value type, but we do know
        // that it points to an instance of `ObjectData<T>` for some specific
        // `T`. Since `ObjectData<T>` is `#[repr(C)]`, the fields in front of
        // the value can be accessed.
        //
        // No reference to the `ObjectData` itself is created, since that would
        // still be undefined behavior without the right type.
        let vtable_ptr: *const &'static ObjectVtable = unsafe { &raw const (*ptr).vtable };

        // SAFETY: Dereferencing the pointer and getting out the
        // `&'static ObjectVtable` is valid for the same reasons.
        unsafe { *vtable_ptr }
    }

    /// Returns the reference count of the object.
    pub(super) fn count(self) -> &'a RefCount {
        let ptr = self.as_ptr();
        // SAFETY: Same as in `vtable`: the count is in front of the value of
        // a `#[repr(C)]` struct.
        let count_ptr: *const RefCount = unsafe { &raw const (*ptr).count };

        // SAFETY: The existence of the `RawObjectRef<'a>` implies that the
        // object is alive and readable for 'a. `RefCount` only uses interior
        // mutability, so shared access is sound.
        unsafe { &*count_ptr }
    }

    /// Accesses the value of the [`ObjectData`] instance as a reference to the
    /// specified type.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the type `T` matches the actual value type
    /// stored in the [`ObjectData`].
    pub unsafe fn value_downcast_unchecked<T: 'static>(self) -> &'a T {
        let ptr: NonNull<ObjectData<Erased>> = self.as_non_null();
        let ptr: NonNull<ObjectData<T>> = ptr.cast::<<ObjectData<T> as CastTo>::Target>();

        // SAFETY: The type matches as guaranteed by our caller, and the
        // object is alive and readable for 'a.
        let data: &'a ObjectData<T> = unsafe { ptr.as_ref() };
        &data.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_data_field_offsets() {
        use core::mem::{offset_of, size_of};

        fn check<T: 'static>() {
            // Header fields must not move with the value type
            assert_eq!(offset_of!(ObjectData<T>, vtable), 0);
            assert_eq!(
                offset_of!(ObjectData<T>, count),
                size_of::<&'static ObjectVtable>()
            );
            assert!(
                offset_of!(ObjectData<T>, value)
                    >= size_of::<&'static ObjectVtable>() + size_of::<RefCount>()
            );
        }

        #[repr(align(64))]
        struct CacheLine {
            _value: u8,
        }

        check::<()>();
        check::<u8>();
        check::<[u64; 4]>();
        check::<CacheLine>();
        check::<Erased>();
    }
}
