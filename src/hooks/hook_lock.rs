#[cfg(feature = "std")]
use std::sync as impl_;

#[cfg(not(feature = "std"))]
use spin as impl_;

/// A process-wide slot holding at most one hook.
///
/// Reads vastly outnumber writes: every object creation reads the slot, while
/// hooks are registered once at startup. Readers clone the hook out of the
/// lock so it is never invoked with the lock held.
#[repr(transparent)]
pub(crate) struct HookLock<T: 'static + Send + Sync + Clone>(impl_::RwLock<Option<T>>);

impl<T: 'static + Send + Sync + Clone> HookLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(impl_::RwLock::new(None))
    }

    /// Returns a clone of the current hook.
    #[inline]
    pub(crate) fn load(&'static self) -> Option<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        #[cfg(feature = "std")]
        let guard = self
            .0
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        guard.clone()
    }

    /// Installs `hook`, returning the one it replaces.
    #[inline]
    pub(crate) fn replace(&'static self, hook: Option<T>) -> Option<T> {
        #[cfg(not(feature = "std"))]
        let mut guard = self.0.write();

        #[cfg(feature = "std")]
        let mut guard = self
            .0
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        core::mem::replace(&mut *guard, hook)
    }
}
