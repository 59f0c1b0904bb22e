//! Provenance recorded with the artefacts of a run series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Layout version of the files a series writes. A reader accepts files with
/// its own major version and a minor version no newer than its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormatVersion {
    /// Bumped when existing fields change meaning or disappear.
    pub major: u32,
    /// Bumped when fields are added.
    pub minor: u32,
}

impl FormatVersion {
    /// Version written by this build.
    pub const CURRENT: Self = Self::new(1, 0);

    /// Creates a version descriptor.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// True when a reader at `self` understands files written at `stored`.
    pub fn can_read(&self, stored: &FormatVersion) -> bool {
        self.major == stored.major && self.minor >= stored.minor
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Inputs that determine the contents of a run series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProvenance {
    /// Hex SHA-256 of the run configuration.
    pub config_hash: String,
    /// Master seed of the series.
    pub master_seed: u64,
    /// Whether every state ran on its own seed substream.
    pub reseed_each_state: bool,
    /// Generator strategy, `incremental` or `fixed`.
    pub generator_kind: String,
    /// Number of states in the series.
    pub n_states: usize,
    /// RFC 3339 time the record was made.
    pub created_at: String,
    /// Versions of the crates that produced the series.
    #[serde(default)]
    pub crate_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// True when both records come from the same configuration and seeding,
    /// so their runs may be combined or one resumed from the other.
    pub fn same_inputs(&self, other: &RunProvenance) -> bool {
        self.config_hash == other.config_hash
            && self.master_seed == other.master_seed
            && self.reseed_each_state == other.reseed_each_state
            && self.n_states == other.n_states
    }
}
