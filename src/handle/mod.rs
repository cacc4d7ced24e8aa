//! Handles to reference-counted objects.
//!
//! - [`Ref`] owns one unit of an object's reference count.
//! - [`Borrowed`] is a view obtained from [`Ref::cast`] that owns nothing.
//! - [`Released`] is what remains after [`Ref::release`]: the address of an
//!   object whose reference is now managed by hand.
//!
//! Every handle points at a *view*: the object's value itself or one of the
//! interfaces it answers to. Two handles with different view types can refer
//! to the same object; [`Ref::ptr_eq`] compares object identity.

mod borrowed;
mod owned;
mod released;
mod weak;

pub use self::{borrowed::Borrowed, owned::Ref, released::Released};
pub(crate) use self::weak::WeakRef;
