//! Bus-aware interfaces.
//!
//! An extensible object can be hosted by at most one [`Bus`] at a time.
//! Lookups it cannot answer itself are forwarded to that bus, which searches
//! everything connected to it. Hosting is a non-owning back-reference: the bus
//! owns the object, never the other way around.
//!
//! Extensible objects also have an explicit end of life. [`finish`] runs the
//! object's [`on_finish`] cleanup once, detaches it from its bus and marks it
//! finished for good. Looking up interfaces from a finished object is a
//! contract violation. A bus finishes everything it hosts when it is torn
//! down.
//!
//! [`finish`]: ExtensibleInterface::finish
//! [`on_finish`]: Interface::on_finish

use core::{
    fmt,
    ops::Deref,
    sync::atomic::{AtomicBool, Ordering},
};

use intfbus_internals::{InterfaceId, ObjectId};

use crate::{
    bus::Bus,
    error::UsageError,
    handle::{Ref, WeakRef},
    interface::{EXTENSIBLE_INTERFACE_IID, Interface, InterfaceType, Request},
};

pub(crate) mod sealed {
    use super::BusLink;
    use crate::error::UsageError;

    pub trait Sealed {
        /// Attaches the object to the bus behind `link`, or detaches it with
        /// `None`.
        ///
        /// Attaching fails with [`UsageError::AlreadyHosted`] while another
        /// bus hosts the object, and with [`UsageError::Finished`] once the
        /// object has finished. Detaching always succeeds. Only buses call
        /// this, while they add or remove the object's slot.
        fn set_bus(&self, link: Option<BusLink>) -> Result<(), UsageError>;
    }
}

/// An interface that can be hosted by a [`Bus`].
///
/// Implemented by [`Extensible`] (see [`Ref::new_ex`]) and by [`Bus`] itself.
/// The host link is managed by buses alone, through
/// [`Bus::connect`] and [`Bus::disconnect`]:
///
/// ```compile_fail
/// use intfbus::prelude::*;
///
/// struct Quiet;
///
/// impl Interface for Quiet {
///     fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
/// }
///
/// let bus = Bus::new(0);
/// let quiet = Ref::new_ex(Quiet);
/// bus.connect(quiet.clone());
/// quiet.set_bus(None);
/// ```
pub trait ExtensibleInterface: Interface + sealed::Sealed {
    /// The bus currently hosting the object.
    fn host_bus(&self) -> Option<Ref<Bus>>;

    /// Finishes the object.
    ///
    /// The first call runs the cleanup hook and detaches the object from its
    /// bus; later calls do nothing.
    fn finish(&self);

    /// Whether [`finish`](ExtensibleInterface::finish) has been called.
    fn finished(&self) -> bool;
}

impl InterfaceType for dyn ExtensibleInterface {
    const IID: InterfaceId = EXTENSIBLE_INTERFACE_IID;
}

/// A non-owning link to the bus that hosts an object.
#[derive(Clone, Copy)]
pub struct BusLink(pub(crate) WeakRef<Bus>);

impl BusLink {
    /// The identity of the bus.
    pub fn bus_id(&self) -> ObjectId {
        self.0.object_id()
    }
}

impl fmt::Debug for BusLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BusLink").field(&self.bus_id()).finish()
    }
}

/// Adapter that makes any [`Interface`] bus-aware.
///
/// Created by [`Ref::new_ex`]. Dereferences to the wrapped value.
pub struct Extensible<T> {
    /// The hosting bus.
    ///
    /// Only the hosting bus sets or clears the link, and it always clears it
    /// before letting go of the object, so the bus is allocated while the
    /// link is present.
    host: spin::Mutex<Option<WeakRef<Bus>>>,
    finished: AtomicBool,
    inner: T,
}

impl<T> Extensible<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self {
            host: spin::Mutex::new(None),
            finished: AtomicBool::new(false),
            inner,
        }
    }

    /// The wrapped value.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> Deref for Extensible<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Interface> Interface for Extensible<T> {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        self.inner.provide(request);
        request.provide::<dyn ExtensibleInterface>(self);
    }

    fn on_finish(&self) {
        self.inner.on_finish();
    }
}

impl<T: Interface> sealed::Sealed for Extensible<T> {
    fn set_bus(&self, link: Option<BusLink>) -> Result<(), UsageError> {
        let mut host = self.host.lock();
        let Some(BusLink(bus)) = link else {
            *host = None;
            return Ok(());
        };
        if self.finished() {
            return Err(UsageError::Finished);
        }
        if let Some(current) = *host
            && current.object_id() != bus.object_id()
        {
            return Err(UsageError::AlreadyHosted {
                current: current.object_id(),
            });
        }
        *host = Some(bus);
        Ok(())
    }
}

impl<T: Interface> ExtensibleInterface for Extensible<T> {
    fn host_bus(&self) -> Option<Ref<Bus>> {
        let host = self.host.lock();
        let bus = (*host)?;
        // SAFETY: The bus clears this link, which needs the lock we are
        // holding, before it can be deallocated.
        unsafe { bus.upgrade() }
    }

    fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.on_finish();
        *self.host.lock() = None;
    }

    fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl<T: fmt::Debug> fmt::Debug for Extensible<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensible")
            .field("inner", &self.inner)
            .field("hosted", &self.host.lock().is_some())
            .field("finished", &self.finished.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use core::sync::atomic::AtomicUsize;

    use super::{sealed::Sealed, *};

    #[derive(Default)]
    struct Service {
        cleanups: AtomicUsize,
    }

    impl Interface for Service {
        fn provide<'a>(&'a self, _request: &mut Request<'a>) {}

        fn on_finish(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_finish_is_idempotent() {
        let service = Ref::new_ex(Service::default());
        assert!(!service.finished());
        service.finish();
        service.finish();
        service.finish();
        assert!(service.finished());
        assert_eq!(service.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hosting_rules() {
        let first = Bus::new(0);
        let second = Bus::new(0);
        let service = Ref::new_ex(Service::default());

        assert!(first.connect(service.clone()));
        assert!(Ref::ptr_eq(&service.host_bus().unwrap(), &first));
        assert_eq!(
            second.try_connect(service.clone(), 0),
            Err(UsageError::AlreadyHosted {
                current: first.object_id()
            })
        );
        assert_eq!(second.total_interfaces(), 0);

        first.disconnect(&service);
        assert!(service.host_bus().is_none());
        assert!(second.connect(service.clone()));
        assert!(Ref::ptr_eq(&service.host_bus().unwrap(), &second));
    }

    #[test]
    fn test_finished_refuses_hosting() {
        let bus = Bus::new(0);
        let service = Ref::new_ex(Service::default());
        service.finish();
        assert_eq!(
            bus.try_connect(service.clone(), 0),
            Err(UsageError::Finished)
        );
        assert_eq!(bus.total_interfaces(), 0);
        assert_eq!(service.ref_count(), 1);
    }

    #[test]
    fn test_slot_stays_with_one_bus() {
        let first = Bus::new(0);
        let second = Bus::new(0);
        let service = Ref::new_ex(Service::default());
        assert!(first.connect(service.clone()));

        let link = BusLink(second.downgrade());
        assert_eq!(
            service.set_bus(Some(link)),
            Err(UsageError::AlreadyHosted {
                current: first.object_id()
            })
        );
        assert!(Ref::ptr_eq(&service.host_bus().unwrap(), &first));
        assert_eq!(first.total_interfaces(), 1);
        assert_eq!(second.total_interfaces(), 0);
    }

    #[derive(Debug)]
    struct Label(&'static str);

    #[test]
    fn test_debug_without_interface() {
        let wrapped = Extensible::new(Label("plain"));
        assert_eq!(
            format!("{wrapped:?}"),
            r#"Extensible { inner: Label("plain"), hosted: false, finished: false }"#
        );
        wrapped.finished.store(true, Ordering::Release);
        assert!(format!("{wrapped:?}").ends_with("finished: true }"));
    }

    #[test]
    fn test_extensible_is_send_sync() {
        static_assertions::assert_impl_all!(Ref<Extensible<Service>>: Send, Sync);
        static_assertions::assert_impl_all!(Ref<dyn ExtensibleInterface>: Send, Sync);
        static_assertions::assert_impl_all!(BusLink: Send, Sync, Copy);
    }
}
