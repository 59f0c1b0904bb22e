use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use monte_core::errors::ErrorInfo;
use monte_core::{FormatVersion, MonteError, RunProvenance};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{GeneratorConfig, RunConfig};
use crate::json::{read_json, write_json};
use crate::status::timestamp;

/// SHA-256 of the canonical JSON encoding of a run configuration, hex encoded.
pub fn config_hash(config: &RunConfig) -> Result<String, MonteError> {
    let bytes = serde_json::to_vec(config).map_err(|err| {
        MonteError::Serde(ErrorInfo::new("config-hash", err.to_string()))
    })?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// Provenance of a series run from `config`, stamped now.
pub fn provenance(config: &RunConfig) -> Result<RunProvenance, MonteError> {
    let (generator_kind, n_states) = match &config.generator {
        GeneratorConfig::Incremental(params) => ("incremental", params.n_states),
        GeneratorConfig::Fixed { conditions, .. } => ("fixed", conditions.len()),
    };
    let mut crate_versions = BTreeMap::new();
    crate_versions.insert("monte-run".to_string(), env!("CARGO_PKG_VERSION").to_string());
    Ok(RunProvenance {
        config_hash: config_hash(config)?,
        master_seed: config.seed_policy.master_seed,
        reseed_each_state: config.seed_policy.reseed_each_state,
        generator_kind: generator_kind.to_string(),
        n_states,
        created_at: timestamp(),
        crate_versions,
    })
}

/// Description of a run series written next to its completed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesManifest {
    /// Layout version of the series files.
    pub format_version: FormatVersion,
    /// Configuration used for the series.
    pub config: RunConfig,
    /// Config hash, seeding and generator shape.
    pub provenance: RunProvenance,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Number of states completed when the manifest was written.
    pub n_completed_runs: usize,
    /// Completed runs file, when one is written.
    pub completed_runs_file: Option<PathBuf>,
}

impl SeriesManifest {
    /// Builds a manifest for `config`.
    pub fn new(config: &RunConfig, n_completed_runs: usize) -> Result<Self, MonteError> {
        Ok(Self {
            format_version: FormatVersion::CURRENT,
            config: config.clone(),
            provenance: provenance(config)?,
            seed_label: config.seed_policy.label.clone(),
            n_completed_runs,
            completed_runs_file: config
                .completed_runs
                .output_dir
                .as_ref()
                .map(|dir| dir.join("completed_runs.json")),
        })
    }

    /// Fails unless a series described by this manifest can be resumed with
    /// `config`: same file layout major version, configuration and seeding.
    pub fn check_resume(&self, config: &RunConfig) -> Result<(), MonteError> {
        if !FormatVersion::CURRENT.can_read(&self.format_version) {
            return Err(MonteError::Generator(
                ErrorInfo::new("unreadable-series", "series files use an unsupported layout version")
                    .with_context(
                        "format_version",
                        format!("{}.{}", self.format_version.major, self.format_version.minor),
                    ),
            ));
        }
        let current = provenance(config)?;
        if !self.provenance.same_inputs(&current) {
            return Err(MonteError::Generator(
                ErrorInfo::new("config-changed", "series was started from different inputs")
                    .with_context("stored_hash", self.provenance.config_hash.clone())
                    .with_context("config_hash", current.config_hash)
                    .with_hint("start a new output directory or restore the original configuration"),
            ));
        }
        Ok(())
    }

    /// Writes the manifest as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<(), MonteError> {
        write_json(path, self)
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, MonteError> {
        read_json(path)
    }
}
