//! Component identifiers.

/// Identifier of a simulation component, assigned when its context is created.
///
/// Id 0 always belongs to the root context of the simulation.
pub type Id = u32;
