//! Staged teardown.

use alloc::vec::Vec;

use crate::{
    bus::{Bus, BusStatus, FINISH_PASSES},
    extensible::{ExtensibleInterface, sealed::Sealed},
    handle::Ref,
};

impl Bus {
    /// Runs the teardown, once.
    pub(super) fn reset(&self) {
        if !self.leave_siblings() {
            return;
        }
        let id = self.object_id();
        tracing::debug!(bus = %id, level = self.level, "tearing down bus");

        let slots: Vec<(u32, Ref<dyn ExtensibleInterface>)> = self
            .state
            .lock()
            .slots
            .iter()
            .map(|slot| (slot.priority, slot.interface.clone()))
            .collect();
        for pass in 0..FINISH_PASSES {
            for (priority, interface) in slots.iter().rev() {
                if *priority == pass {
                    tracing::trace!(
                        bus = %id,
                        pass,
                        interface = %interface.object_id(),
                        "finishing interface"
                    );
                    interface.finish();
                }
            }
        }
        drop(slots);

        let slots = core::mem::take(&mut self.state.lock().slots);
        for slot in &slots {
            // Detaching cannot fail.
            let _ = slot.interface.set_bus(None);
        }
        drop(slots);

        let subordinates = core::mem::take(&mut self.state.lock().subordinates);
        for bus in subordinates.into_iter().rev() {
            bus.finish();
        }

        self.state.lock().status = BusStatus::Cleared;
        tracing::debug!(bus = %id, "bus torn down");
    }
}

#[cfg(test)]
mod tests {
    use alloc::{sync::Arc, vec::Vec};

    use crate::{
        bus::{Bus, BusStatus},
        extensible::{ExtensibleInterface, sealed::Sealed},
        handle::Ref,
        interface::{Interface, Request},
    };

    struct Recorder {
        name: &'static str,
        log: Arc<spin::Mutex<Vec<&'static str>>>,
    }

    impl Interface for Recorder {
        fn provide<'a>(&'a self, _request: &mut Request<'a>) {}

        fn on_finish(&self) {
            self.log.lock().push(self.name);
        }
    }

    #[test]
    fn test_finish_wave_order() {
        let log = Arc::new(spin::Mutex::new(Vec::new()));
        let bus = Bus::new(0);
        for (name, priority) in [("a", 0), ("b", 1), ("c", 0), ("d", 2), ("e", 9)] {
            let recorder = Ref::new_ex(Recorder {
                name,
                log: log.clone(),
            });
            assert!(bus.connect_with_priority(recorder, priority));
        }
        bus.finish();
        assert_eq!(*log.lock(), ["c", "a", "b", "d"]);
        assert_eq!(bus.status(), BusStatus::Cleared);
        assert_eq!(bus.total_interfaces(), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let bus = Bus::new(0);
        let service = Ref::new_ex(Recorder {
            name: "service",
            log: Arc::default(),
        });
        assert!(bus.connect(service.clone()));
        bus.finish();
        bus.finish();
        assert!(service.finished());
        assert!(service.host_bus().is_none());
        assert_eq!(service.ref_count(), 1);
        assert_eq!(*service.log.lock(), ["service"]);
    }

    #[test]
    fn test_subordinates_finished_last() {
        let log = Arc::new(spin::Mutex::new(Vec::new()));
        let root = Bus::new(0);
        let sub = Bus::new(1);
        assert!(sub.connect(Ref::new_ex(Recorder {
            name: "inner",
            log: log.clone(),
        })));
        assert!(root.connect(sub.clone()));
        assert!(root.connect(Ref::new_ex(Recorder {
            name: "outer",
            log: log.clone(),
        })));
        drop(root);
        assert_eq!(*log.lock(), ["outer", "inner"]);
        assert_eq!(sub.status(), BusStatus::Cleared);
        assert_eq!(sub.ref_count(), 1);
    }
}
