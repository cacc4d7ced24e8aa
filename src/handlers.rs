//! The lookup order of each kind of object.

use intfbus_internals::{Halt, ObjectHandler, Query, RawObjectRef};

use crate::{
    extensible::{Extensible, ExtensibleInterface},
    interface::{Interface, Request},
};

/// Answers from the views `value` provides, then the root interface.
pub(crate) fn answer_locally<T: Interface>(
    value: &T,
    this: RawObjectRef<'_>,
    query: &mut Query,
) -> bool {
    let mut request = Request::new(query, this, value);
    value.provide(&mut request);
    request.provide::<dyn Interface>(value);
    request.is_resolved()
}

/// Handler of plain objects: local views only.
pub(crate) struct InterfaceHandler;

impl<T: Interface> ObjectHandler<T> for InterfaceHandler {
    fn query(value: &T, this: RawObjectRef<'_>, query: &mut Query) -> bool {
        answer_locally(value, this, query)
    }
}

/// Handler of extensible objects: local views, then the hosting bus.
///
/// A finished object answers nothing. A lookup that starts on one is halted,
/// one forwarded to it passes it by.
pub(crate) struct ExtensibleHandler;

impl<T: Interface> ObjectHandler<Extensible<T>> for ExtensibleHandler {
    fn query(value: &Extensible<T>, this: RawObjectRef<'_>, query: &mut Query) -> bool {
        if value.finished() {
            if query.is_origin() {
                query.halt(Halt::Finished(this.id()));
            }
            return false;
        }
        if answer_locally(value, this, query) {
            return true;
        }
        query.visit(this.id());
        match value.host_bus() {
            Some(bus) => query.forward(bus.raw()),
            None => false,
        }
    }
}
