//! Hierarchical interface buses.
//!
//! A [`Bus`] is itself an extensible object. It owns the interfaces connected
//! to it (its *slots*) and the higher-level buses connected to it (its
//! *subordinates*), and keeps non-owning links to buses of its own level (its
//! *siblings*). A lookup that reaches a bus searches, in order:
//!
//! 1. the bus itself,
//! 2. its slots, in connection order,
//! 3. its siblings,
//! 4. its subordinates, by increasing level.
//!
//! Every object is searched at most once per lookup, so sibling cycles are
//! harmless.
//!
//! Levels only ever increase along owning edges. A bus never owns a bus of
//! its own level or of a lower one, which keeps the ownership graph acyclic.

mod connect;
mod lookup;
mod teardown;

use alloc::vec::Vec;
use core::fmt;

use indexmap::IndexMap;
use intfbus_internals::{InterfaceId, ObjectId};
use rustc_hash::FxBuildHasher;

use crate::{
    error::UsageError,
    extensible::{BusLink, ExtensibleInterface, sealed},
    handle::{Ref, WeakRef},
    hooks::ref_monitor,
    interface::{BUS_IID, Interface, InterfaceType, Request},
};

/// The number of passes of the finish wave of a teardown.
///
/// Slots connected with a priority below this are finished in pass
/// `priority`. Slots with a larger priority are released without being
/// finished.
pub const FINISH_PASSES: u32 = 3;

/// The lifecycle of a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BusStatus {
    /// The bus accepts connections and answers lookups.
    Active,
    /// The bus is being torn down.
    Clearing,
    /// The bus has been torn down. Lookups for anything but its root
    /// interfaces fail.
    Cleared,
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusStatus::Active => "active",
            BusStatus::Clearing => "clearing",
            BusStatus::Cleared => "cleared",
        })
    }
}

/// An interface hosted by a bus.
struct Slot {
    /// Finish pass of the interface.
    priority: u32,
    interface: Ref<dyn ExtensibleInterface>,
}

/// The mutable part of a bus.
struct BusState {
    status: BusStatus,
    /// In connection order.
    slots: Vec<Slot>,
    /// Sorted by level; equal levels keep their connection order.
    subordinates: Vec<Ref<Bus>>,
    /// Buses of the same level, in link order.
    ///
    /// Every bus in this map is active and links back to this one. Links are
    /// created and removed in pairs under the sibling link lock, and a bus
    /// leaves every map before it stops being active, so the entries stay
    /// allocated while they are present.
    siblings: IndexMap<ObjectId, WeakRef<Bus>, FxBuildHasher>,
}

impl BusState {
    fn new() -> Self {
        Self {
            status: BusStatus::Active,
            slots: Vec::new(),
            subordinates: Vec::new(),
            siblings: IndexMap::default(),
        }
    }

    /// Fails unless the bus accepts structural changes.
    fn ensure_active(&self, bus: ObjectId) -> Result<(), UsageError> {
        match self.status {
            BusStatus::Active => Ok(()),
            BusStatus::Clearing => Err(UsageError::BusClearing { bus }),
            BusStatus::Cleared => Err(UsageError::BusCleared { bus }),
        }
    }
}

/// A level-ordered container of extensible interfaces.
///
/// Create one with [`Bus::new`]. Buses are always handled through
/// [`Ref<Bus>`], and are torn down either explicitly with
/// [`Bus::finish`] or when the last reference is dropped.
///
/// # Examples
///
/// ```
/// use intfbus::{declare_interface, prelude::*};
///
/// trait Clock: Interface {
///     fn now(&self) -> u64;
/// }
/// declare_interface!(dyn Clock = "example.Clock");
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         42
///     }
/// }
/// impl Interface for FixedClock {
///     fn provide<'a>(&'a self, request: &mut Request<'a>) {
///         request.provide::<dyn Clock>(self);
///     }
/// }
///
/// let root = Bus::new(0);
/// let services = Bus::new(1);
/// assert!(root.connect(services.clone()));
/// assert!(services.connect(Ref::new_ex(FixedClock)));
///
/// let clock = root.query::<dyn Clock>().unwrap();
/// assert_eq!(clock.now(), 42);
/// ```
pub struct Bus {
    level: i32,
    /// Link to the object holding this bus, set right after creation.
    this: spin::Once<WeakRef<Bus>>,
    state: spin::Mutex<BusState>,
}

impl InterfaceType for Bus {
    const IID: InterfaceId = BUS_IID;
}

impl Bus {
    /// Creates an empty, active bus at `level`.
    pub fn new(level: i32) -> Ref<Bus> {
        let bus = Ref::with_handler::<lookup::BusHandler>(
            Bus {
                level,
                this: spin::Once::new(),
                state: spin::Mutex::new(BusState::new()),
            },
            ref_monitor::creation_monitor(),
        );
        bus.this.call_once(|| bus.downgrade());
        tracing::debug!(bus = %bus.object_id(), level, "created bus");
        bus
    }

    /// The link to the object holding this bus.
    fn this(&self) -> WeakRef<Bus> {
        match self.this.get() {
            Some(this) => *this,
            None => unreachable!("bus used before it was created"),
        }
    }

    /// The identity of the object holding this bus.
    pub fn object_id(&self) -> ObjectId {
        self.this().object_id()
    }

    /// The level of the bus, fixed at creation.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// The current lifecycle state.
    pub fn status(&self) -> BusStatus {
        self.state.lock().status
    }

    /// The number of interfaces connected to this bus.
    pub fn total_interfaces(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// The number of higher-level buses connected to this bus.
    pub fn total_buses(&self) -> usize {
        self.state.lock().subordinates.len()
    }

    /// The number of same-level buses linked to this bus.
    pub fn total_siblings(&self) -> usize {
        self.state.lock().siblings.len()
    }

    /// Tears the bus down.
    ///
    /// Sibling links are removed first. The connected interfaces are then
    /// finished in [`FINISH_PASSES`] passes by increasing priority, in reverse
    /// connection order within a pass, and released. Subordinate buses are
    /// finished and released last, highest level first. Calling this again
    /// does nothing.
    ///
    /// Afterwards the bus only answers lookups of its root interfaces; see
    /// [`Ref::try_query`].
    pub fn finish(&self) {
        self.reset();
    }

    /// Whether the bus is being or has been torn down.
    pub fn finished(&self) -> bool {
        self.status() != BusStatus::Active
    }

    /// Fails once the bus has been torn down.
    fn ensure_not_cleared(&self) -> Result<(), UsageError> {
        match self.status() {
            BusStatus::Cleared => Err(UsageError::BusCleared {
                bus: self.object_id(),
            }),
            BusStatus::Active | BusStatus::Clearing => Ok(()),
        }
    }
}

impl Interface for Bus {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        request
            .provide::<Bus>(self)
            .provide::<dyn ExtensibleInterface>(self);
    }
}

impl sealed::Sealed for Bus {
    /// Buses are never hosted; connecting a bus to another one makes it a
    /// subordinate or a sibling instead. Only checks that the bus is active.
    fn set_bus(&self, link: Option<BusLink>) -> Result<(), UsageError> {
        if link.is_some() && self.finished() {
            return Err(UsageError::Finished);
        }
        Ok(())
    }
}

impl ExtensibleInterface for Bus {
    fn host_bus(&self) -> Option<Ref<Bus>> {
        None
    }

    fn finish(&self) {
        Bus::finish(self);
    }

    fn finished(&self) -> bool {
        Bus::finished(self)
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Bus")
            .field("id", &self.object_id())
            .field("level", &self.level)
            .field("status", &state.status)
            .field("interfaces", &state.slots.len())
            .field("buses", &state.subordinates.len())
            .field("siblings", &state.siblings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_bus_send_sync() {
        static_assertions::assert_impl_all!(Bus: Send, Sync);
        static_assertions::assert_impl_all!(Ref<Bus>: Send, Sync);
        static_assertions::assert_impl_all!(BusStatus: Send, Sync, Copy);
    }

    #[test]
    fn test_new_bus() {
        let bus = Bus::new(7);
        assert_eq!(bus.level(), 7);
        assert_eq!(bus.status(), BusStatus::Active);
        assert_eq!(bus.ref_count(), 1);
        assert_eq!(bus.total_interfaces(), 0);
        assert_eq!(bus.total_buses(), 0);
        assert_eq!(bus.total_siblings(), 0);
        assert!(bus.host_bus().is_none());
        assert!(bus.supports(BUS_IID));
        assert!(bus.supports(crate::EXTENSIBLE_INTERFACE_IID));
        assert!(bus.supports(crate::INTERFACE_IID));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BusStatus::Active.to_string(), "active");
        assert_eq!(BusStatus::Clearing.to_string(), "clearing");
        assert_eq!(BusStatus::Cleared.to_string(), "cleared");
    }
}
