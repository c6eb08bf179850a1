//! Simulation configuration.

use serde::{Deserialize, Serialize};

/// Settings of a [`Simulation`](crate::Simulation) instance.
///
/// All fields are optional when deserializing, missing ones take their [default](Self::default) values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Seed of the simulation-wide random number generator.
    pub seed: u64,
    /// Validate the index and handle bookkeeping after every structural change and panic on the first
    /// violation. Enabled by default in debug builds.
    pub check_invariants: bool,
    /// Number of events and nodes to reserve space for upfront.
    pub initial_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            check_invariants: cfg!(debug_assertions),
            initial_capacity: 0,
        }
    }
}

impl SimulationConfig {
    /// Returns the default configuration with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
