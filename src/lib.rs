#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Reference-counted objects, interface lookup and hierarchical buses.
//!
//! ## Overview
//!
//! This crate provides a small component object model. Components are
//! reference-counted objects that answer to *interfaces*: capability contracts
//! identified by a hash of their name. Given any handle to an object you can
//! ask for another interface, and get back an owning handle to it if the
//! object supports it.
//!
//! Components are assembled at runtime on *buses*. A bus hosts extensible
//! components and other buses, and a lookup that a component cannot answer
//! itself is forwarded to the bus hosting it, which searches everything
//! connected to it. Components find each other this way without knowing
//! about each other.
//!
//! ## Quick Example
//!
//! ```
//! use intfbus::{declare_interface, prelude::*};
//!
//! trait Logger: Interface {
//!     fn log(&self, message: &str) -> usize;
//! }
//! declare_interface!(dyn Logger = "9D0A7D0E-0E55-4C5C-9A59-2E8C4C3F1D61");
//!
//! struct StdoutLogger;
//! impl Logger for StdoutLogger {
//!     fn log(&self, message: &str) -> usize {
//!         message.len()
//!     }
//! }
//! impl Interface for StdoutLogger {
//!     fn provide<'a>(&'a self, request: &mut Request<'a>) {
//!         request.provide::<dyn Logger>(self);
//!     }
//! }
//!
//! struct Worker;
//! impl Interface for Worker {
//!     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
//! }
//!
//! let bus = Bus::new(0);
//! let worker = Ref::new_ex(Worker);
//! assert!(bus.connect(Ref::new_ex(StdoutLogger)));
//! assert!(bus.connect(worker.clone()));
//!
//! // The worker does not implement `Logger`, but its bus knows who does.
//! let logger = worker.query::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("hello"), 5);
//! ```
//!
//! ## Core Concepts
//!
//! - [`Ref<I>`] is an owning handle. It keeps one unit of the object's
//!   reference count, and dereferences to the view `I` of the object.
//! - [`Interface`] is implemented by every object value. Its
//!   [`provide`](Interface::provide) method lists the interfaces the object
//!   answers to.
//! - [`InterfaceType`] gives an interface its [`InterfaceId`]. Declare it
//!   with [`declare_interface!`].
//! - [`Ref::new_ex`] creates an [`ExtensibleInterface`]: an object that can
//!   be hosted by a [`Bus`] and forwards lookups to it.
//! - [`Bus`] hosts extensible objects, higher-level buses, and links to
//!   same-level buses.
//!
//! ## Manual reference counting
//!
//! [`Ref::release`] gives up the handle without destroying the object,
//! producing a [`Released`] address whose count is managed by hand. This is
//! the escape hatch for handing objects across boundaries that cannot carry a
//! `Ref`. [`Ref::set_monitor`] and the process-wide
//! [`hooks::register_ref_monitor`] observe every count operation, which is
//! how leaks and double releases are tracked down.
//!
//! ## Contract violations
//!
//! Misuse, such as releasing a reference twice or mutating a bus that is
//! being torn down, is reported as a [`UsageError`] by the `try_` variants of
//! the affected operations, and panics in the others.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

mod bus;
mod error;
mod extensible;
mod handle;
mod handlers;
pub mod hooks;
mod interface;
mod multi;
pub mod prelude;

pub use intfbus_internals::{InterfaceId, ObjectId, RefOp};

pub use self::{
    bus::{Bus, BusStatus, FINISH_PASSES},
    error::UsageError,
    extensible::{BusLink, Extensible, ExtensibleInterface},
    handle::{Borrowed, Ref, Released},
    interface::{
        BUS_IID, EXTENSIBLE_INTERFACE_IID, INTERFACE_IID, Interface, InterfaceType, Request,
    },
    multi::MultiInterface,
};
