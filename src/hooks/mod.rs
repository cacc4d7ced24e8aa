//! Process-wide hooks.
//!
//! The only hook is the default [reference-count monitor], which is installed
//! on every object created while it is registered. Registration is cheap to
//! read and safe to change at any time; objects keep the monitor they were
//! created with.
//!
//! [reference-count monitor]: ref_monitor::RefMonitor

mod hook_lock;
pub mod ref_monitor;

pub use self::ref_monitor::{register_ref_monitor, unregister_ref_monitor};
