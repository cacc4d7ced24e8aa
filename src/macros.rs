/// Declares the identifier an interface is looked up by.
///
/// The identifier is the hash of `name`, computed at compile time. Two
/// interfaces declared with the same name are indistinguishable, so names
/// should be globally unique: a UUID or a reverse domain name works well.
///
/// # Examples
///
/// ```
/// use intfbus::{InterfaceId, InterfaceType, declare_interface, prelude::*};
///
/// trait Storage: Interface {
///     fn capacity(&self) -> usize;
/// }
/// declare_interface!(dyn Storage = "com.example.Storage");
///
/// assert_eq!(
///     <dyn Storage as InterfaceType>::IID,
///     InterfaceId::from_name("com.example.Storage")
/// );
/// ```
#[macro_export]
macro_rules! declare_interface {
    ($ty:ty = $name:expr $(,)?) => {
        impl $crate::InterfaceType for $ty {
            const IID: $crate::InterfaceId = $crate::InterfaceId::from_name($name);
        }
    };
}

/// Implements [`Interface`] for a type answering to several interfaces.
///
/// The type answers to the listed interfaces in order, then to the root
/// interface. The first listed interface becomes its
/// [`MultiInterface::Primary`], reachable through [`Ref::primary`].
///
/// Types that need an [`Interface::on_finish`] hook implement [`Interface`]
/// by hand instead.
///
/// [`Interface`]: crate::Interface
/// [`Interface::on_finish`]: crate::Interface::on_finish
/// [`MultiInterface::Primary`]: crate::MultiInterface::Primary
/// [`Ref::primary`]: crate::Ref::primary
///
/// # Examples
///
/// ```
/// use intfbus::{declare_interface, implement_interfaces, prelude::*};
///
/// trait Reader: Interface {
///     fn read(&self) -> u8;
/// }
/// trait Writer: Interface {
///     fn write(&self, byte: u8);
/// }
/// declare_interface!(dyn Reader = "example.Reader");
/// declare_interface!(dyn Writer = "example.Writer");
///
/// struct Port;
/// impl Reader for Port {
///     fn read(&self) -> u8 {
///         7
///     }
/// }
/// impl Writer for Port {
///     fn write(&self, _byte: u8) {}
/// }
/// implement_interfaces!(Port => dyn Reader, dyn Writer);
///
/// let port = Ref::new(Port);
/// assert_eq!(port.primary().unwrap().read(), 7);
/// assert!(port.query::<dyn Writer>().is_some());
/// ```
#[macro_export]
macro_rules! implement_interfaces {
    ($ty:ty => $first:ty $(, $rest:ty)* $(,)?) => {
        impl $crate::Interface for $ty {
            fn provide<'a>(&'a self, request: &mut $crate::Request<'a>) {
                request
                    .provide::<$first>(self)
                    $(.provide::<$rest>(self))*;
            }
        }

        impl $crate::MultiInterface for $ty {
            type Primary = $first;
        }
    };
}
