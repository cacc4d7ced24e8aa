#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`intfbus`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased object storage and the
//! unsafe operations behind the [`intfbus`] component model. Users should
//! depend on [`intfbus`]; no semantic versioning guarantees are provided here.
//!
//! # Architecture
//!
//! - **[`object`]**: reference-counted, type-erased objects
//!   - [`RawObject`]: owning pointer contributing one unit of count
//!   - [`RawObjectRef`]: lifetime-bound borrow that leaves the count alone
//!   - [`RawObjectPtr`]: untracked address for weak and released links
//!   - `ObjectData`: `#[repr(C)]` header (vtable, count) followed by the value
//!   - `ObjectVtable`: destructor and query dispatch for the concrete value
//! - **[`query`]**: the state carried by one interface lookup
//! - **[`handlers`]**: the [`ObjectHandler`] trait that decides how an object
//!   answers a [`Query`]
//! - **[`iid`]**: the name-derived [`InterfaceId`]
//! - **[`monitor`]**: [`ObjectId`], [`RefOp`] and the [`RefMonitor`] hook
//!
//! # Safety Strategy
//!
//! Type erasure turns `ObjectData<T>` into `ObjectData<Erased>`. It stays sound
//! because the fields of the data and vtable types are private to their
//! modules: a vtable is created together with the value it describes and can
//! never be swapped, and the `#[repr(C)]` header can be read without knowing
//! `T`.
//!
//! The reference count is intrusive and atomic. Decrements never go below
//! zero; the destructor runs only after the owning decrement that took the
//! count from one to zero, and with no lock held.
//!
//! [`intfbus`]: https://docs.rs/intfbus/latest/intfbus/

extern crate alloc;

pub mod handlers;
pub mod iid;
pub mod monitor;
pub mod object;
pub mod query;
mod util;

pub use self::{
    handlers::ObjectHandler,
    iid::InterfaceId,
    monitor::{ObjectId, RefMonitor, RefOp, SharedMonitor},
    object::{RawObject, RawObjectPtr, RawObjectRef, RefCountError},
    query::{Halt, Query},
};
