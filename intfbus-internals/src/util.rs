//! Internal utility types and traits.

/// Helper trait to force explicit turbofish syntax on pointer casts.
///
/// The associated type `Target` is always equal to `Self`, but the compiler
/// cannot infer it, so calls like `ptr.cast::<ObjectData<T>>()` must name the
/// target type explicitly.
pub(crate) trait CastTo: 'static {
    /// Target type of the cast. Always equal to `Self`.
    type Target: 'static;
}

impl<T: 'static> CastTo for T {
    type Target = T;
}

/// Marker type used in place of the value type of a type-erased object.
///
/// `ObjectData<Erased>` is an object whose concrete value type is unknown in
/// the current scope. Only the fields in front of the value may be accessed
/// through such a pointer.
pub(crate) struct Erased;
