//! Vtable for type-erased object operations.
//!
//! The fields of [`ObjectVtable`] are private to this module, and vtables are
//! only created as `&'static` references by [`ObjectVtable::new`], which pairs
//! the function pointers with a specific value type `T` and handler `H` at
//! compile time. Together with the field encapsulation in the data module this
//! guarantees that the vtable of an object always matches its value.

use alloc::boxed::Box;
use core::{any::TypeId, ptr::NonNull};

use crate::{
    handlers::ObjectHandler,
    object::{data::ObjectData, raw::RawObjectRef},
    query::Query,
    util::Erased,
};

/// Vtable for type-erased object operations.
///
/// # Safety Invariant
///
/// The fields `drop` and `query` point to the functions defined below,
/// instantiated with the value type `T` and handler type `H` that were used to
/// create this [`ObjectVtable`].
pub(crate) struct ObjectVtable {
    /// Gets the [`TypeId`] of the value type.
    type_id: fn() -> TypeId,
    /// Gets the name of the value type.
    type_name: fn() -> &'static str,
    /// Gets the [`TypeId`] of the handler.
    handler_type_id: fn() -> TypeId,
    /// Drops the [`Box<ObjectData<T>>`] instance pointed to by this pointer.
    drop: unsafe fn(NonNull<ObjectData<Erased>>),
    /// Resolves a query using the handler.
    query: unsafe fn(RawObjectRef<'_>, &mut Query) -> bool,
}

impl ObjectVtable {
    /// Creates a new [`ObjectVtable`] for the value type `T` and the handler
    /// type `H`.
    pub(super) const fn new<T: 'static, H: ObjectHandler<T>>() -> &'static Self {
        const {
            &Self {
                type_id: TypeId::of::<T>,
                type_name: core::any::type_name::<T>,
                handler_type_id: TypeId::of::<H>,
                drop: drop::<T>,
                query: query::<T, H>,
            }
        }
    }

    /// Gets the [`TypeId`] of the value type.
    #[inline]
    pub(super) fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Gets the name of the value type.
    #[inline]
    pub(super) fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Gets the [`TypeId`] of the handler.
    #[inline]
    pub(super) fn handler_type_id(&self) -> TypeId {
        (self.handler_type_id)()
    }

    /// Drops the `Box<ObjectData<T>>` instance pointed to by this pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer comes from [`Box<ObjectData<T>>`] via [`Box::into_raw`]
    /// 2. This [`ObjectVtable`] is the vtable of the object.
    /// 3. The object has not been dropped before, and nobody will use the
    ///    pointer after calling this method.
    #[inline]
    pub(super) unsafe fn drop(&self, ptr: NonNull<ObjectData<Erased>>) {
        // SAFETY: `self.drop` points to `drop::<T>` below, whose requirements
        // are guaranteed by the caller.
        unsafe { (self.drop)(ptr) }
    }

    /// Resolves `query` using the [`H::query`] function used when creating
    /// this [`ObjectVtable`].
    ///
    /// [`H::query`]: ObjectHandler::query
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`ObjectVtable`] is the vtable of the object behind `ptr`.
    #[inline]
    pub(super) unsafe fn query(&self, ptr: RawObjectRef<'_>, query: &mut Query) -> bool {
        // SAFETY: `self.query` points to `query::<T, H>` below, whose
        // requirement is guaranteed by the caller.
        unsafe { (self.query)(ptr, query) }
    }
}

/// Drops the [`Box<ObjectData<T>>`] instance pointed to by this pointer.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer comes from [`Box<ObjectData<T>>`] via [`Box::into_raw`]
/// 2. The value type `T` matches the actual value type stored in the
///    [`ObjectData`]
/// 3. The object has not been dropped before, and nobody will use the
///    pointer after calling this function.
unsafe fn drop<T: 'static>(ptr: NonNull<ObjectData<Erased>>) {
    let ptr: NonNull<ObjectData<T>> = ptr.cast();
    let ptr = ptr.as_ptr();
    // SAFETY: The pointer has the correct type and came from `Box::into_raw`,
    // both guaranteed by our caller.
    let boxed = unsafe { Box::from_raw(ptr) };
    core::mem::drop(boxed);
}

/// Resolves a query through the handler `H`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `T` matches the actual value type stored in the [`ObjectData`]
unsafe fn query<T: 'static, H: ObjectHandler<T>>(
    ptr: RawObjectRef<'_>,
    query: &mut Query,
) -> bool {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: &T = unsafe { ptr.value_downcast_unchecked::<T>() };
    H::query(value, ptr, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl ObjectHandler<u32> for Silent {
        fn query(_value: &u32, _this: RawObjectRef<'_>, _query: &mut Query) -> bool {
            false
        }
    }

    #[test]
    fn test_vtable_is_shared_per_instantiation() {
        let a = ObjectVtable::new::<u32, Silent>();
        let b = ObjectVtable::new::<u32, Silent>();
        assert_eq!(a.type_id(), TypeId::of::<u32>());
        assert_eq!(a.handler_type_id(), TypeId::of::<Silent>());
        assert_eq!(a.type_name(), "u32");
        assert_eq!(a.type_id(), b.type_id());
    }
}
