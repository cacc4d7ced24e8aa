//! Lookups through a bus.

use alloc::vec::Vec;

use hashbrown::HashSet;
use intfbus_internals::{Halt, ObjectHandler, ObjectId, Query, RawObjectRef};
use rustc_hash::FxBuildHasher;

use crate::{
    bus::{Bus, BusStatus},
    error::{OrViolated, UsageError},
    extensible::ExtensibleInterface,
    handle::Ref,
    handlers::answer_locally,
};

/// Handler of buses: the bus itself, then everything connected to it.
///
/// A torn down bus still answers its root interfaces. Any other lookup that
/// reaches it is halted.
pub(super) struct BusHandler;

impl ObjectHandler<Bus> for BusHandler {
    fn query(bus: &Bus, this: RawObjectRef<'_>, query: &mut Query) -> bool {
        if answer_locally(bus, this, query) {
            return true;
        }
        let Some(connected) = bus.connected() else {
            query.halt(Halt::Cleared(this.id()));
            return false;
        };
        query.visit(this.id());
        for slot in &connected.slots {
            if query.forward(slot.raw()) {
                return true;
            }
        }
        connected
            .siblings
            .iter()
            .chain(&connected.subordinates)
            .any(|other| query.forward(other.raw()))
    }
}

/// Owning references to everything connected to a bus at one point in time.
struct Connected {
    slots: Vec<Ref<dyn ExtensibleInterface>>,
    siblings: Vec<Ref<Bus>>,
    subordinates: Vec<Ref<Bus>>,
}

impl Bus {
    /// Takes references to everything connected, so the lookup can proceed
    /// without holding the bus lock. `None` once the bus is torn down.
    fn connected(&self) -> Option<Connected> {
        let state = self.state.lock();
        if state.status == BusStatus::Cleared {
            return None;
        }
        Some(Connected {
            slots: state
                .slots
                .iter()
                .map(|slot| slot.interface.clone())
                .collect(),
            siblings: state
                .siblings
                .values()
                // SAFETY: Siblings stay allocated while they are in the set,
                // and leaving it takes the lock we are holding.
                .filter_map(|sibling| unsafe { sibling.upgrade() })
                .collect(),
            subordinates: state.subordinates.clone(),
        })
    }

    /// Finds the closest bus of `level`, starting from this one.
    ///
    /// This bus is returned if it has the requested level. Otherwise the
    /// subordinates are searched depth first by increasing level, then the
    /// siblings. Buses that have been torn down are skipped.
    ///
    /// # Panics
    ///
    /// Panics if this bus has been torn down.
    pub fn find_first_bus_by_level(&self, level: i32) -> Option<Ref<Bus>> {
        self.try_find_first_bus_by_level(level).or_violated()
    }

    /// See [`Bus::find_first_bus_by_level`].
    ///
    /// # Errors
    ///
    /// [`UsageError::BusCleared`] if this bus has been torn down.
    pub fn try_find_first_bus_by_level(
        &self,
        level: i32,
    ) -> Result<Option<Ref<Bus>>, UsageError> {
        self.ensure_not_cleared()?;
        let mut visited = HashSet::with_hasher(FxBuildHasher);
        Ok(self.find_by_level(level, &mut visited))
    }

    fn find_by_level(
        &self,
        level: i32,
        visited: &mut HashSet<ObjectId, FxBuildHasher>,
    ) -> Option<Ref<Bus>> {
        if level < self.level || !visited.insert(self.object_id()) {
            return None;
        }
        if level == self.level {
            // SAFETY: `self` is borrowed from the object the link points to.
            return unsafe { self.this().upgrade() };
        }
        let connected = self.connected()?;
        connected
            .subordinates
            .iter()
            .chain(&connected.siblings)
            .filter(|other| other.status() != BusStatus::Cleared)
            .find_map(|other| other.find_by_level(level, visited))
    }
}
