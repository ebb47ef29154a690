//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (e.g. a normalized licence plate). To "modify" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Plate(String);
///
/// impl ValueObject for Plate {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
