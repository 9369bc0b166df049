//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two `Amount`s of
/// the same wei are the same amount, whichever account they came from. To
/// "modify" one, produce a new value (`checked_add`, `checked_sub`).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
