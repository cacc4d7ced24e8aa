//! Handlers decide how an object answers interface queries.
//!
//! A handler is a zero-sized type chosen when the object is created. Its
//! [`ObjectHandler::query`] function is stored in the object's vtable next to
//! the destructor, so lookups on a type-erased object dispatch to the right
//! code for the concrete value.

use crate::{object::RawObjectRef, query::Query};

/// Resolves interface queries for objects holding a value of type `T`.
///
/// The runtime crate provides handlers for plain interfaces, extensible
/// interfaces and buses. Each fixes the order in which local views, root
/// identifiers and forwarding targets are consulted.
pub trait ObjectHandler<T>: 'static {
    /// Tries to resolve `query` against `value`, which is stored in `this`.
    ///
    /// Returns `true` when the query was fulfilled, either locally or by a
    /// forwarding target.
    fn query(value: &T, this: RawObjectRef<'_>, query: &mut Query) -> bool;
}
