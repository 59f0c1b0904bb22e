#![deny(missing_docs)]
#![doc = "Core traits and data types for the Monte Carlo run-management engine."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod provenance;
pub mod rng;
mod state;
pub mod values;

pub use errors::{ErrorInfo, MonteError};
pub use provenance::{FormatVersion, RunProvenance};
pub use rng::{derive_substream_seed, RandomEngine, RngHandle};
pub use state::State;
pub use values::{Conditions, ValueMap};

/// Progress reported by one elementary kernel step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Number of elementary steps taken (normally 1).
    pub steps: u64,
    /// Simulated time elapsed during the step; zero for non-kinetic kernels.
    pub time_increment: f64,
}

impl StepOutcome {
    /// A single step without simulated time.
    pub const fn single() -> Self {
        Self {
            steps: 1,
            time_increment: 0.0,
        }
    }

    /// A single step that advanced simulated time by `dt`.
    pub const fn timed(dt: f64) -> Self {
        Self {
            steps: 1,
            time_increment: dt,
        }
    }
}

/// Contract for the stochastic kernel that mutates a [`State`].
///
/// The kernel owns move proposal and acceptance; run management only asks it
/// to advance by exactly one elementary step at a time.
pub trait StochasticKernel<C> {
    /// Prepares the kernel for a new state (caches, property evaluation) and
    /// returns the number of steps that make up one pass.
    fn prepare(&mut self, state: &mut State<C>) -> Result<u64, MonteError>;

    /// Advances the state by one elementary step.
    fn step<E: RandomEngine>(
        &mut self,
        state: &mut State<C>,
        engine: &mut E,
    ) -> Result<StepOutcome, MonteError>;
}
