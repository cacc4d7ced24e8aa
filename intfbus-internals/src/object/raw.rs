//! Type-erased object pointer types.
//!
//! This module encapsulates the `ptr` field of [`RawObject`],
//! [`RawObjectRef`] and [`RawObjectPtr`], ensuring it is only visible within
//! this module. This guarantees the safety invariant: **the pointer always
//! comes from `Box<ObjectData<T>>` via `Box::into_raw`**.
//!
//! # Ownership
//!
//! - [`RawObject`] owns one unit of the object's reference count. Cloning it
//!   increments the count; dropping it decrements the count and destroys the
//!   object when the count reaches zero.
//! - [`RawObjectRef`] borrows an object for a lifetime without touching the
//!   count.
//! - [`RawObjectPtr`] is an untracked address. It says nothing about whether
//!   the object is alive; every way of using it is `unsafe`.

use alloc::boxed::Box;
use core::{any::TypeId, ptr::NonNull};

use crate::{
    handlers::ObjectHandler,
    monitor::{ObjectId, RefOp, SharedMonitor},
    object::{count::RefCountError, data::ObjectData},
    query::Query,
    util::Erased,
};

/// An owning pointer to a reference-counted object.
///
/// The pointer is guaranteed to point to an initialized `ObjectData<T>` for
/// some `T`, though it is not known which. It contributes one to the object's
/// reference count for as long as it exists.
#[repr(transparent)]
pub struct RawObject {
    /// Pointer to the inner object data
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was created from a `Box<ObjectData<T>>` for some `T`
    ///    using `Box::into_raw`.
    /// 2. This struct accounts for one unit of the object's reference count,
    ///    so the object is alive.
    ptr: NonNull<ObjectData<Erased>>,
}

impl RawObject {
    /// Allocates a new object holding `value`, dispatching queries through the
    /// handler `H`.
    ///
    /// The object starts at a count of zero and is immediately adopted by the
    /// returned [`RawObject`], so `monitor` (if any) sees a first
    /// [`RefOp::Ref`] with a count of zero.
    pub fn new<T, H>(value: T, monitor: Option<SharedMonitor>) -> Self
    where
        T: 'static,
        H: ObjectHandler<T>,
    {
        let data: Box<ObjectData<T>> = Box::new(ObjectData::new::<H>(value, monitor));
        let ptr: *mut ObjectData<T> = Box::into_raw(data);
        let ptr: *mut ObjectData<Erased> = ptr.cast::<ObjectData<Erased>>();

        // SAFETY: `Box::into_raw` never returns a null pointer.
        let ptr: NonNull<ObjectData<Erased>> = unsafe { NonNull::new_unchecked(ptr) };

        let untracked = RawObjectPtr { ptr };
        // SAFETY: We just allocated the object and nothing else can have
        // freed it.
        let object = unsafe { untracked.as_ref() };
        object.add_ref();

        // SAFETY:
        // 1. The pointer was just created by `Box::into_raw`.
        // 2. We just incremented the count on behalf of this struct.
        Self { ptr }
    }

    /// Returns a borrowed reference to the object.
    #[inline]
    pub fn as_ref(&self) -> RawObjectRef<'_> {
        RawObjectRef {
            ptr: self.ptr,
            _marker: core::marker::PhantomData,
        }
    }

    /// Returns the untracked address of the object.
    #[inline]
    pub fn as_ptr(&self) -> RawObjectPtr {
        RawObjectPtr { ptr: self.ptr }
    }

    /// Consumes the [`RawObject`] without decrementing the count.
    ///
    /// The unit of count owned by `self` is leaked to the caller, who becomes
    /// responsible for releasing it, typically through
    /// [`RawObject::from_ptr`].
    #[inline]
    pub fn into_ptr(self) -> RawObjectPtr {
        let ptr = self.ptr;
        core::mem::forget(self);
        RawObjectPtr { ptr }
    }

    /// Takes ownership of one unit of the count of the object at `ptr`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The object at `ptr` is alive.
    /// 2. The caller owns one unit of its count, which is transferred to the
    ///    returned [`RawObject`].
    #[inline]
    pub unsafe fn from_ptr(ptr: RawObjectPtr) -> Self {
        // SAFETY:
        // 1. `RawObjectPtr` always carries a pointer from `Box::into_raw`.
        // 2. Guaranteed by the caller.
        Self { ptr: ptr.ptr }
    }

    /// Gives up the unit of count owned by `self` without ever destroying the
    /// object, and returns its untracked address.
    ///
    /// If the count reaches zero the object stays allocated; whoever holds the
    /// address is then responsible for eventually releasing it.
    pub fn release_no_delete(self) -> Result<RawObjectPtr, RefCountError> {
        let ptr = self.into_ptr();
        // SAFETY: The object is alive because we owned a count until this
        // point, and `into_ptr` passed that count on to us.
        let object = unsafe { ptr.as_ref() };
        // SAFETY: We own one unit of the count, and the object is not
        // destroyed by a no-delete decrement.
        unsafe { object.release_no_delete() }?;
        Ok(ptr)
    }
}

impl Clone for RawObject {
    #[inline]
    fn clone(&self) -> Self {
        self.as_ref().retain()
    }
}

impl Drop for RawObject {
    fn drop(&mut self) {
        let object = self.as_ref();
        // SAFETY: This struct owns one unit of the count and is not used
        // again after this point.
        if let Err(error) = unsafe { object.release() } {
            panic!("{error}");
        }
    }
}

impl core::fmt::Debug for RawObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.as_ref().fmt(f)
    }
}

/// A lifetime-bound pointer to a reference-counted object.
///
/// The object is guaranteed to stay alive for `'a`. The count is not touched
/// by creating or dropping this type.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct RawObjectRef<'a> {
    /// Pointer to the inner object data
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was created from a `Box<ObjectData<T>>` for some `T`
    ///    using `Box::into_raw`.
    /// 2. The object is alive for `'a`.
    ptr: NonNull<ObjectData<Erased>>,
    /// Marker to tell the compiler that we should
    /// behave the same as a `&'a ObjectData<Erased>`
    _marker: core::marker::PhantomData<&'a ObjectData<Erased>>,
}

impl<'a> RawObjectRef<'a> {
    /// Returns a raw pointer to the object data.
    #[inline]
    pub(super) fn as_ptr(self) -> *const ObjectData<Erased> {
        self.ptr.as_ptr()
    }

    /// Returns the object data pointer.
    #[inline]
    pub(super) fn as_non_null(self) -> NonNull<ObjectData<Erased>> {
        self.ptr
    }

    /// Returns the untracked address of the object.
    #[inline]
    pub fn to_ptr(self) -> RawObjectPtr {
        RawObjectPtr { ptr: self.ptr }
    }

    /// Returns the identity of the object.
    #[inline]
    pub fn id(self) -> ObjectId {
        self.to_ptr().id()
    }

    /// Returns the [`TypeId`] of the value stored in the object.
    #[inline]
    pub fn type_id(self) -> TypeId {
        self.vtable().type_id()
    }

    /// Returns the name of the type of the value stored in the object.
    #[inline]
    pub fn type_name(self) -> &'static str {
        self.vtable().type_name()
    }

    /// Returns the [`TypeId`] of the handler the object was created with.
    #[inline]
    pub fn handler_type_id(self) -> TypeId {
        self.vtable().handler_type_id()
    }

    /// Returns a snapshot of the reference count.
    #[inline]
    pub fn ref_count(self) -> usize {
        self.count().get()
    }

    /// Increments the reference count.
    ///
    /// The increment is not tied to any owner, so the caller is expected to
    /// balance it later. Failing to do so leaks the object, which is safe.
    #[inline]
    pub fn add_ref(self) {
        self.count().increment(self.id());
    }

    /// Increments the reference count and returns an owner for the new unit.
    #[inline]
    pub fn retain(self) -> RawObject {
        self.add_ref();
        // SAFETY:
        // 1. The pointer comes from a `RawObjectRef`, which always carries a
        //    pointer from `Box::into_raw`.
        // 2. We just incremented the count on behalf of the new owner.
        RawObject { ptr: self.ptr }
    }

    /// Increments the reference count unless it is already zero.
    ///
    /// This is how weak links are upgraded: an object whose count has reached
    /// zero is about to be destroyed (or is held only by untracked pointers)
    /// and is never revived.
    #[inline]
    pub fn try_retain(self) -> Option<RawObject> {
        if self.count().try_increment(self.id()) {
            // SAFETY:
            // 1. The pointer comes from a `RawObjectRef`.
            // 2. The count was just incremented on behalf of the new owner.
            Some(RawObject { ptr: self.ptr })
        } else {
            None
        }
    }

    /// Decrements the reference count, destroying the object when the count
    /// reaches zero.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The caller owns one unit of the count, which is consumed by this
    ///    call.
    /// 2. The object is not accessed through this reference (or any copy of
    ///    it) after the call, since it may have been destroyed.
    pub unsafe fn release(self) -> Result<(), RefCountError> {
        let reached_zero = self.count().decrement(self.id(), RefOp::Unref)?;
        if reached_zero {
            let vtable = self.vtable();
            // SAFETY:
            // 1. The pointer comes from `Box::into_raw`, as guaranteed by the
            //    invariants of this type.
            // 2. The vtable was read from the object itself.
            // 3. The count just went from one to zero, so no other owner
            //    exists, and our caller will not use the pointer again.
            unsafe { vtable.drop(self.ptr) };
        }
        Ok(())
    }

    /// Decrements the reference count without ever destroying the object.
    ///
    /// # Safety
    ///
    /// The caller must ensure that it owns one unit of the count, which is
    /// consumed by this call.
    pub unsafe fn release_no_delete(self) -> Result<(), RefCountError> {
        self.count()
            .decrement(self.id(), RefOp::UnrefNoDelete)
            .map(|_| ())
    }

    /// Replaces the reference-count monitor of the object.
    #[inline]
    pub fn set_monitor(self, monitor: Option<SharedMonitor>) {
        self.count().set_monitor(monitor);
    }

    /// Resolves `query` using the handler of the object.
    #[inline]
    pub fn query(self, query: &mut Query) -> bool {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable was read from the object itself.
        unsafe { vtable.query(self, query) }
    }
}

impl core::fmt::Debug for RawObjectRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.id())
            .field("type", &self.type_name())
            .field("count", &self.ref_count())
            .finish()
    }
}

/// The untracked address of a reference-counted object.
///
/// Holding a [`RawObjectPtr`] does not keep the object alive. It is used for
/// links that must not own the object (weak links, released references) and
/// for comparing identities.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct RawObjectPtr {
    /// Pointer to the inner object data
    ///
    /// # Safety
    ///
    /// The pointer was created from a `Box<ObjectData<T>>` for some `T` using
    /// `Box::into_raw`. The object may have been destroyed since.
    ptr: NonNull<ObjectData<Erased>>,
}

// SAFETY: A `RawObjectPtr` is only an address. All access through it is
// `unsafe` and requires the caller to justify liveness and thread safety.
unsafe impl Send for RawObjectPtr {}

// SAFETY: See the `Send` implementation.
unsafe impl Sync for RawObjectPtr {}

impl RawObjectPtr {
    /// Returns the identity of the object.
    #[inline]
    pub fn id(self) -> ObjectId {
        ObjectId::from_addr(self.ptr.as_ptr().addr())
    }

    /// Borrows the object for `'a`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the object is alive for `'a`.
    #[inline]
    pub unsafe fn as_ref<'a>(self) -> RawObjectRef<'a> {
        RawObjectRef {
            ptr: self.ptr,
            _marker: core::marker::PhantomData,
        }
    }
}

impl core::fmt::Debug for RawObjectPtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("RawObjectPtr").field(&self.id()).finish()
    }
}
