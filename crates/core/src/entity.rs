//! Stored records addressed by an integer id.

/// A record whose identity survives edits to its fields.
pub trait Entity {
    /// Store-assigned identifier; ordering follows assignment order.
    type Id: Copy + Ord + core::fmt::Display + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
