//! Types answering to several interfaces, one of which is primary.

use crate::{
    extensible::Extensible,
    handle::Ref,
    interface::{Interface, InterfaceType},
};

/// An object type that answers to several interfaces.
///
/// Usually implemented by [`implement_interfaces!`](crate::implement_interfaces).
pub trait MultiInterface: Interface {
    /// The interface the object is first looked up as.
    type Primary: ?Sized + InterfaceType;
}

impl<T: MultiInterface> MultiInterface for Extensible<T> {
    type Primary = T::Primary;
}

impl<I: ?Sized + MultiInterface> Ref<I> {
    /// Looks up the primary interface of the object.
    pub fn primary(&self) -> Option<Ref<I::Primary>> {
        self.query::<I::Primary>()
    }
}
