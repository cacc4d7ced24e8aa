#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Tracing diagnostics for intfbus reference counts.
//!
//! Bus structure changes are already logged by `intfbus` itself. This crate
//! adds a [`RefMonitor`] that turns every reference-count operation into a
//! tracing event, which is usually how leaks and double releases are found.
//!
//! # Quick Start
//!
//! ```
//! use intfbus::prelude::*;
//!
//! // Every object created from now on is monitored.
//! intfbus_tracing::install();
//!
//! let bus = Bus::new(0);
//! drop(bus);
//! ```
//!
//! Events are emitted with the target `intfbus::refs`, so they can be
//! filtered separately from the rest of the crate's logging.
//!
//! # Environment Variables
//!
//! - `INTFBUS_TRACING` - Comma-separated options:
//!   - `drops` - Only log operations that take a count to zero
//!   - `verbose` - Log at `DEBUG` level instead of `TRACE`

use std::sync::OnceLock;

use intfbus::{
    ObjectId, RefOp,
    hooks::{
        self,
        ref_monitor::{RefMonitor, SharedMonitor},
    },
};

/// The target of every event emitted by [`TracingMonitor`].
pub const TARGET: &str = "intfbus::refs";

/// A reference-count monitor that logs through `tracing`.
///
/// # Examples
///
/// ```
/// use intfbus::prelude::*;
/// use intfbus_tracing::TracingMonitor;
///
/// struct Token;
/// impl Interface for Token {
///     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
/// }
///
/// let monitor = TracingMonitor {
///     drops_only: true,
///     verbose: false,
/// };
/// let token = Ref::new_monitored(Token, monitor);
/// drop(token);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct TracingMonitor {
    /// Whether to only log the operations that take a count to zero.
    pub drops_only: bool,
    /// Whether to log at `DEBUG` level instead of `TRACE`.
    pub verbose: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct IntfbusTracingEnvOptions {
    drops_only: bool,
    verbose: bool,
}

impl IntfbusTracingEnvOptions {
    fn get() -> &'static Self {
        static INTFBUS_TRACING_FLAGS: OnceLock<IntfbusTracingEnvOptions> = OnceLock::new();

        INTFBUS_TRACING_FLAGS.get_or_init(|| match std::env::var_os("INTFBUS_TRACING") {
            Some(var) => Self::parse(&var.to_string_lossy()),
            None => Self::default(),
        })
    }

    fn parse(var: &str) -> Self {
        let mut options = Self::default();
        for v in var.split(',').map(str::trim) {
            if v.eq_ignore_ascii_case("drops") {
                options.drops_only = true;
            } else if v.eq_ignore_ascii_case("verbose") {
                options.verbose = true;
            }
        }
        options
    }
}

impl TracingMonitor {
    /// Creates a monitor configured by the `INTFBUS_TRACING` environment
    /// variable.
    pub fn new() -> Self {
        let env_options = IntfbusTracingEnvOptions::get();
        Self {
            drops_only: env_options.drops_only,
            verbose: env_options.verbose,
        }
    }
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl RefMonitor for TracingMonitor {
    fn on_ref_op(&self, object: ObjectId, count_before: usize, op: RefOp) {
        if op != RefOp::Ref && count_before == 0 {
            tracing::warn!(target: TARGET, %object, %op, "reference count underflow");
            return;
        }
        let count_after = match op {
            RefOp::Ref => count_before + 1,
            RefOp::Unref | RefOp::UnrefNoDelete => count_before - 1,
        };
        if self.drops_only && count_after != 0 {
            return;
        }
        if self.verbose {
            tracing::debug!(
                target: TARGET,
                %object,
                %op,
                count_before,
                count_after,
                "reference count changed"
            );
        } else {
            tracing::trace!(
                target: TARGET,
                %object,
                %op,
                count_before,
                count_after,
                "reference count changed"
            );
        }
    }
}

/// Registers a [`TracingMonitor`] as the default monitor of new objects.
///
/// Returns the monitor that was registered before.
pub fn install() -> Option<SharedMonitor> {
    hooks::register_ref_monitor(TracingMonitor::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        assert_eq!(
            IntfbusTracingEnvOptions::parse(""),
            IntfbusTracingEnvOptions::default()
        );
        assert_eq!(
            IntfbusTracingEnvOptions::parse("drops"),
            IntfbusTracingEnvOptions {
                drops_only: true,
                verbose: false,
            }
        );
        assert_eq!(
            IntfbusTracingEnvOptions::parse("Verbose, DROPS,unknown"),
            IntfbusTracingEnvOptions {
                drops_only: true,
                verbose: true,
            }
        );
    }
}
