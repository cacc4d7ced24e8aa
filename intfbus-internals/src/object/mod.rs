//! Module containing the reference-counted object storage.
//!
//! An object is a heap allocation holding a `#[repr(C)]` header (vtable and
//! reference count) followed by the value. The count is intrusive: it lives
//! inside the allocation and every owning pointer contributes exactly one to
//! it. The object destroys itself when an owning decrement takes the count
//! from one to zero.

mod count;
mod data;
mod raw;
mod vtable;

pub use self::{
    count::RefCountError,
    raw::{RawObject, RawObjectPtr, RawObjectRef},
};
