//! Interfaces and interface lookup.
//!
//! An *interface* is a capability contract identified by an [`InterfaceId`].
//! In Rust an interface is usually a trait, and the type implementing
//! [`InterfaceType`] is the trait object `dyn Trait`. An object answers a
//! lookup by offering *views* of itself: references to its value (or a field
//! of it) typed as the requested interface.
//!
//! Every object additionally answers to the root interface, `dyn Interface`.

use core::marker::PhantomData;

use intfbus_internals::{InterfaceId, Query, RawObjectRef};

use crate::error::{UsageError, violated};

/// Identifier of the root interface every object answers to.
pub const INTERFACE_IID: InterfaceId =
    InterfaceId::from_name("B4FF784E-2DDA-4CA2-BC84-4AAD35FCAAF3");

/// Identifier of the root interface of bus-aware objects.
pub const EXTENSIBLE_INTERFACE_IID: InterfaceId =
    InterfaceId::from_name("632B176F-E7B9-4557-9657-15DB3AC94FBC");

/// Identifier of [`Bus`](crate::Bus).
pub const BUS_IID: InterfaceId =
    InterfaceId::from_name("B7914714-4159-48C6-BFF3-A21C6F0BB1CA");

/// A type that can be looked up through an interface query.
///
/// Use [`declare_interface!`](crate::declare_interface) rather than
/// implementing this by hand.
pub trait InterfaceType: 'static {
    /// The identifier this type is looked up by.
    const IID: InterfaceId;
}

/// The root capability contract.
///
/// Implementors list the interfaces they answer to in [`provide`]; the root
/// interface itself is added automatically after them.
///
/// # Examples
///
/// ```
/// use intfbus::{declare_interface, prelude::*};
///
/// trait Greeter: Interface {
///     fn greet(&self) -> &'static str;
/// }
/// declare_interface!(dyn Greeter = "example.Greeter");
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> &'static str {
///         "hello"
///     }
/// }
///
/// impl Interface for English {
///     fn provide<'a>(&'a self, request: &mut Request<'a>) {
///         request.provide::<dyn Greeter>(self);
///     }
/// }
///
/// let object: Ref<dyn Interface> = Ref::new(English).into_interface().ok().unwrap();
/// let greeter = object.query::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
///
/// [`provide`]: Interface::provide
pub trait Interface: Send + Sync + 'static {
    /// Offers the views of `self` that answer interface lookups, in order of
    /// preference.
    fn provide<'a>(&'a self, request: &mut Request<'a>);

    /// Cleanup run the first time an extensible object is finished.
    ///
    /// Only objects created with [`Ref::new_ex`](crate::Ref::new_ex) are ever
    /// finished, either explicitly or by the teardown of the bus hosting
    /// them.
    fn on_finish(&self) {}
}

impl InterfaceType for dyn Interface {
    const IID: InterfaceId = INTERFACE_IID;
}

/// A pending interface lookup, as seen by [`Interface::provide`].
///
/// Views must be borrowed from the value itself: the lifetime `'a` ties them
/// to the borrow of `self`, and the address of every offered view is checked
/// against the bounds of the value.
pub struct Request<'a> {
    /// The lookup being answered.
    query: &'a mut Query,
    /// The object holding the value.
    this: RawObjectRef<'a>,
    /// Address of the value.
    start: usize,
    /// Size of the value.
    len: usize,
    /// Keeps `'a` invariant so views cannot be borrowed for less.
    _invariant: PhantomData<fn(&'a ()) -> &'a ()>,
}

impl<'a> Request<'a> {
    /// Starts answering `query` with `value`, the value stored in `this`.
    pub(crate) fn new<T>(query: &'a mut Query, this: RawObjectRef<'a>, value: &'a T) -> Self {
        Self {
            query,
            this,
            start: (value as *const T).addr(),
            len: core::mem::size_of::<T>(),
            _invariant: PhantomData,
        }
    }

    /// The identifier being looked up.
    pub fn iid(&self) -> InterfaceId {
        self.query.iid()
    }

    /// Whether an earlier view already answered the lookup.
    pub fn is_resolved(&self) -> bool {
        self.query.is_resolved()
    }

    /// Offers `view` as implementation of the interface `I`.
    ///
    /// The first view matching the requested identifier wins; later offers
    /// are ignored.
    ///
    /// # Panics
    ///
    /// Panics if `view` does not lie inside the value answering the lookup,
    /// for example a reference to another object or to a `static`.
    pub fn provide<I: ?Sized + InterfaceType>(&mut self, view: &'a I) -> &mut Self {
        if self.query.is_resolved() || !I::IID.equals(self.query.iid()) {
            return self;
        }

        let addr = (view as *const I).addr();
        let size = core::mem::size_of_val(view);
        let inside = addr >= self.start && addr - self.start + size <= self.len;
        if !inside {
            violated(UsageError::ForeignView {
                object: self.this.id(),
            });
        }

        // SAFETY: `view` was just checked to lie within the value stored in
        // `self.this`.
        unsafe { self.query.fulfill::<I>(I::IID, self.this, view) };
        self
    }
}

impl core::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Request")
            .field("iid", &self.query.iid())
            .field("object", &self.this.id())
            .field("resolved", &self.query.is_resolved())
            .finish()
    }
}
