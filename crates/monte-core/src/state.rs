use serde::{Deserialize, Serialize};

use crate::values::{Conditions, ValueMap};

/// One Monte Carlo state: control conditions, the configuration being
/// simulated and the properties the kernel caches for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State<C> {
    /// Macroscopic conditions for the run.
    pub conditions: Conditions,
    /// Microscopic degrees of freedom, mutated only by the kernel.
    pub configuration: C,
    /// Derived properties recomputed by the kernel while stepping.
    #[serde(default)]
    pub properties: ValueMap,
}

impl<C> State<C> {
    /// Creates a state with empty properties.
    pub fn new(configuration: C, conditions: Conditions) -> Self {
        Self {
            conditions,
            configuration,
            properties: ValueMap::default(),
        }
    }
}
