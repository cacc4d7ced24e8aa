//! Structural changes: connecting, disconnecting and sibling links.

use core::cmp::Ordering;

use crate::{
    bus::{Bus, BusStatus, Slot},
    error::{OrViolated, UsageError},
    extensible::{BusLink, ExtensibleInterface, sealed::Sealed},
    handle::Ref,
};

/// Serializes sibling link changes across all buses.
///
/// A link spans two buses, so it is changed under this lock and then under
/// each bus lock in turn, never two bus locks at once.
static SIBLING_LINKS: spin::Mutex<()> = spin::Mutex::new(());

impl Bus {
    /// Connects `candidate` with the default priority 0.
    ///
    /// See [`Bus::try_connect`].
    ///
    /// # Panics
    ///
    /// Panics where [`Bus::try_connect`] returns an error.
    pub fn connect<I: ?Sized + 'static>(&self, candidate: Ref<I>) -> bool {
        self.try_connect(candidate, 0).or_violated()
    }

    /// Connects `candidate`, finishing it in pass `priority` of a teardown.
    ///
    /// # Panics
    ///
    /// Panics where [`Bus::try_connect`] returns an error.
    pub fn connect_with_priority<I: ?Sized + 'static>(
        &self,
        candidate: Ref<I>,
        priority: u32,
    ) -> bool {
        self.try_connect(candidate, priority).or_violated()
    }

    /// Connects `candidate` to this bus, taking over the reference.
    ///
    /// * A bus of a higher level becomes a subordinate. `priority` is
    ///   ignored.
    /// * A bus of the same level becomes a sibling, provided the caller
    ///   keeps another reference to it: siblings do not own each other.
    /// * Any other extensible interface is hosted in a slot.
    ///
    /// Returns `false`, and drops the reference, when the candidate is this
    /// bus, is not extensible, is a bus of a lower level, is a sibling with no
    /// other owner, or is already connected.
    ///
    /// # Errors
    ///
    /// * [`UsageError::BusClearing`] or [`UsageError::BusCleared`] unless the
    ///   bus is active.
    /// * [`UsageError::AlreadyHosted`] if another bus hosts the candidate.
    /// * [`UsageError::Finished`] if the candidate has finished.
    pub fn try_connect<I: ?Sized + 'static>(
        &self,
        candidate: Ref<I>,
        priority: u32,
    ) -> Result<bool, UsageError> {
        self.state.lock().ensure_active(self.object_id())?;
        if candidate.object_id() == self.object_id() {
            return Ok(false);
        }
        let found = candidate.try_query::<dyn ExtensibleInterface>()?;
        drop(candidate);
        let Some(candidate) = found else {
            return Ok(false);
        };
        // A hosted interface forwards the lookup to its bus; only an answer
        // from the candidate itself makes it a bus.
        if let Some(bus) = candidate.try_query::<Bus>()?
            && Ref::ptr_eq(&bus, &candidate)
        {
            drop(candidate);
            return self.connect_bus(bus);
        }
        self.connect_interface(candidate, priority)
    }

    fn connect_bus(&self, bus: Ref<Bus>) -> Result<bool, UsageError> {
        if bus.finished() {
            return Err(UsageError::Finished);
        }
        match bus.level().cmp(&self.level) {
            Ordering::Greater => {
                let mut state = self.state.lock();
                state.ensure_active(self.object_id())?;
                if state.subordinates.iter().any(|sub| Ref::ptr_eq(sub, &bus)) {
                    return Ok(false);
                }
                let level = bus.level();
                let at = state.subordinates.partition_point(|sub| sub.level() <= level);
                let id = bus.object_id();
                state.subordinates.insert(at, bus);
                drop(state);
                tracing::debug!(bus = %self.object_id(), subordinate = %id, level, "connected bus");
                Ok(true)
            }
            Ordering::Equal => {
                if bus.ref_count() == 1 {
                    return Ok(false);
                }
                self.link_sibling(&bus)
            }
            Ordering::Less => Ok(false),
        }
    }

    fn connect_interface(
        &self,
        candidate: Ref<dyn ExtensibleInterface>,
        priority: u32,
    ) -> Result<bool, UsageError> {
        let link = BusLink(self.this());
        let mut state = self.state.lock();
        state.ensure_active(self.object_id())?;
        if state
            .slots
            .iter()
            .any(|slot| Ref::ptr_eq(&slot.interface, &candidate))
        {
            return Ok(false);
        }
        candidate.set_bus(Some(link))?;
        let id = candidate.object_id();
        let type_name = candidate.type_name();
        state.slots.push(Slot {
            priority,
            interface: candidate,
        });
        drop(state);
        tracing::debug!(
            bus = %self.object_id(),
            interface = %id,
            type_name,
            priority,
            "connected interface"
        );
        Ok(true)
    }

    /// Disconnects `target`, an interface, subordinate or sibling of this
    /// bus.
    ///
    /// # Panics
    ///
    /// Panics unless the bus is active.
    pub fn disconnect<I: ?Sized + 'static>(&self, target: &Ref<I>) -> bool {
        self.try_disconnect(target).or_violated()
    }

    /// Disconnects `target`, an interface, subordinate or sibling of this
    /// bus.
    ///
    /// A disconnected interface is detached from the bus but not finished.
    /// The bus drops its reference, so the target is destroyed here unless
    /// someone else holds one. Returns `false` if `target` was not connected.
    ///
    /// # Errors
    ///
    /// [`UsageError::BusClearing`] or [`UsageError::BusCleared`] unless the
    /// bus is active.
    pub fn try_disconnect<I: ?Sized + 'static>(
        &self,
        target: &Ref<I>,
    ) -> Result<bool, UsageError> {
        let id = target.object_id();
        let mut state = self.state.lock();
        state.ensure_active(self.object_id())?;

        if let Some(at) = state
            .slots
            .iter()
            .position(|slot| slot.interface.object_id() == id)
        {
            let slot = state.slots.remove(at);
            drop(state);
            slot.interface.set_bus(None)?;
            tracing::debug!(bus = %self.object_id(), interface = %id, "disconnected interface");
            return Ok(true);
        }

        if let Some(at) = state
            .subordinates
            .iter()
            .position(|sub| sub.object_id() == id)
        {
            let bus = state.subordinates.remove(at);
            drop(state);
            tracing::debug!(bus = %self.object_id(), subordinate = %id, "disconnected bus");
            drop(bus);
            return Ok(true);
        }

        let is_sibling = state.siblings.contains_key(&id);
        drop(state);
        if !is_sibling {
            return Ok(false);
        }
        match target.try_query::<Bus>()? {
            Some(bus) if Ref::ptr_eq(&bus, target) => self.unlink_sibling(&bus),
            _ => Ok(false),
        }
    }

    /// Links `other` as a sibling of this bus, and this bus as a sibling of
    /// `other`.
    ///
    /// Siblings do not own each other. Returns `false` if the buses are
    /// already linked, have different levels, are the same bus, or if `other`
    /// is not active.
    ///
    /// # Panics
    ///
    /// Panics unless this bus is active.
    pub fn add_sibling_bus(&self, other: &Ref<Bus>) -> bool {
        self.try_add_sibling_bus(other).or_violated()
    }

    /// See [`Bus::add_sibling_bus`].
    ///
    /// # Errors
    ///
    /// [`UsageError::BusClearing`] or [`UsageError::BusCleared`] unless this
    /// bus is active.
    pub fn try_add_sibling_bus(&self, other: &Ref<Bus>) -> Result<bool, UsageError> {
        if other.level() != self.level || other.object_id() == self.object_id() {
            self.state.lock().ensure_active(self.object_id())?;
            return Ok(false);
        }
        self.link_sibling(other)
    }

    /// Removes the sibling link between this bus and `other`, on both sides.
    ///
    /// Returns `false` if the buses were not linked.
    ///
    /// # Panics
    ///
    /// Panics unless this bus is active.
    pub fn remove_sibling_bus(&self, other: &Ref<Bus>) -> bool {
        self.try_remove_sibling_bus(other).or_violated()
    }

    /// See [`Bus::remove_sibling_bus`].
    ///
    /// # Errors
    ///
    /// [`UsageError::BusClearing`] or [`UsageError::BusCleared`] unless this
    /// bus is active.
    pub fn try_remove_sibling_bus(&self, other: &Ref<Bus>) -> Result<bool, UsageError> {
        self.unlink_sibling(other)
    }

    fn link_sibling(&self, other: &Ref<Bus>) -> Result<bool, UsageError> {
        let _links = SIBLING_LINKS.lock();
        let id = self.object_id();
        let other_id = other.object_id();
        {
            let state = self.state.lock();
            state.ensure_active(id)?;
            if state.siblings.contains_key(&other_id) {
                return Ok(false);
            }
        }
        {
            let mut theirs = other.state.lock();
            if theirs.status != BusStatus::Active {
                return Ok(false);
            }
            theirs.siblings.insert(id, self.this());
        }
        // The status cannot have changed: leaving the active state takes the
        // link lock.
        self.state.lock().siblings.insert(other_id, other.downgrade());
        tracing::debug!(bus = %id, sibling = %other_id, "linked sibling");
        Ok(true)
    }

    fn unlink_sibling(&self, other: &Bus) -> Result<bool, UsageError> {
        let _links = SIBLING_LINKS.lock();
        let id = self.object_id();
        let other_id = other.object_id();
        let removed = {
            let mut state = self.state.lock();
            state.ensure_active(id)?;
            state.siblings.shift_remove(&other_id).is_some()
        };
        if removed {
            other.state.lock().siblings.shift_remove(&id);
            tracing::debug!(bus = %id, sibling = %other_id, "unlinked sibling");
        }
        Ok(removed)
    }

    /// Removes this bus from the sibling set of every sibling, and empties
    /// its own. Returns `false` if the bus was no longer active.
    pub(super) fn leave_siblings(&self) -> bool {
        let _links = SIBLING_LINKS.lock();
        let id = self.object_id();
        let siblings = {
            let mut state = self.state.lock();
            if state.status != BusStatus::Active {
                return false;
            }
            state.status = BusStatus::Clearing;
            core::mem::take(&mut state.siblings)
        };
        for (sibling_id, sibling) in &siblings {
            // SAFETY: Siblings leave each other's sets under the link lock,
            // which we hold, before they are torn down.
            let sibling = unsafe { sibling.get() };
            sibling.state.lock().siblings.shift_remove(&id);
            tracing::debug!(bus = %id, sibling = %sibling_id, "unlinked sibling");
        }
        true
    }
}
