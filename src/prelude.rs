//! Commonly used items for convenient importing.
//!
//! ```
//! use intfbus::prelude::*;
//!
//! struct Nothing;
//! impl Interface for Nothing {
//!     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
//! }
//!
//! let bus = Bus::new(0);
//! assert!(bus.connect(Ref::new_ex(Nothing)));
//! ```

pub use crate::{
    Bus, Extensible, ExtensibleInterface, Interface, InterfaceType, MultiInterface, Ref, Request,
    declare_interface, implement_interfaces,
};
