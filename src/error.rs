//! Contract violations.
//!
//! Misuse of the object model (releasing a reference twice, hosting an
//! interface on two buses, mutating a bus that is being torn down) is a bug in
//! the caller, never a condition to retry. Operations that can detect such a
//! bug come in two flavors: a `try_` method returning [`UsageError`], and a
//! plain method that panics with the same message.
//!
//! Expected negative outcomes (an interface that is not found, a connection
//! that is refused by the level rules) are not errors; they are reported as
//! `false` or `None`.

use intfbus_internals::{Halt, ObjectId, RefCountError, RefOp};

/// A violation of the object model's usage contract.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// A reference was released while the count was already zero.
    #[error("{op} on object {object} whose reference count is already zero")]
    RefCountUnderflow {
        /// The object whose count was already zero.
        object: ObjectId,
        /// The attempted decrement.
        op: RefOp,
    },
    /// An interface was attached to a bus while another bus still hosts it.
    #[error("interface is already hosted by bus {current}")]
    AlreadyHosted {
        /// The bus currently hosting the interface.
        current: ObjectId,
    },
    /// A finished interface was attached to a bus or looked up from.
    #[error("interface has finished and can no longer be used")]
    Finished,
    /// A bus was structurally modified while it was being torn down.
    #[error("bus {bus} is being torn down")]
    BusClearing {
        /// The bus being torn down.
        bus: ObjectId,
    },
    /// A bus was used after it was torn down, or a lookup reached it.
    #[error("bus {bus} has been torn down")]
    BusCleared {
        /// The torn down bus.
        bus: ObjectId,
    },
    /// An interface view was offered that does not live inside the object
    /// offering it.
    #[error("interface view offered by {object} does not belong to it")]
    ForeignView {
        /// The object that offered the view.
        object: ObjectId,
    },
}

impl From<RefCountError> for UsageError {
    fn from(error: RefCountError) -> Self {
        UsageError::RefCountUnderflow {
            object: error.object(),
            op: error.op(),
        }
    }
}

impl From<Halt> for UsageError {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Finished(_) => UsageError::Finished,
            Halt::Cleared(bus) => UsageError::BusCleared { bus },
        }
    }
}

/// Reports a contract violation and panics.
#[cold]
#[track_caller]
pub(crate) fn violated(error: UsageError) -> ! {
    tracing::error!(%error, "intfbus contract violation");
    panic!("{error}")
}

/// Extension for turning detected contract violations into panics.
pub(crate) trait OrViolated<T> {
    /// Returns the value, or panics with the violation.
    fn or_violated(self) -> T;
}

impl<T, E: Into<UsageError>> OrViolated<T> for Result<T, E> {
    #[inline]
    #[track_caller]
    fn or_violated(self) -> T {
        match self {
            Ok(value) => value,
            Err(error) => violated(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_messages() {
        let error = UsageError::Finished;
        assert_eq!(
            error.to_string(),
            "interface has finished and can no longer be used"
        );
    }

    #[test]
    fn test_usage_error_is_send_sync() {
        static_assertions::assert_impl_all!(UsageError: Send, Sync, Copy, core::error::Error);
    }

    #[test]
    #[should_panic(expected = "has been torn down")]
    fn test_or_violated_panics() {
        let bus = crate::Bus::new(0);
        let result: Result<(), UsageError> = Err(UsageError::BusCleared {
            bus: bus.object_id(),
        });
        result.or_violated();
    }
}
