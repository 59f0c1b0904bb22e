use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::debug;
use monte_core::{Conditions, MonteError};
use serde::{Deserialize, Serialize};

use crate::completion::CompletionCheckResult;
use crate::config::StatusLogConfig;
use crate::json::{read_json, write_json};
use crate::sample::SampleTag;

/// Snapshot written to a fixture's status file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// RFC 3339 wall-clock time of the write.
    pub timestamp: String,
    /// Fixture label.
    pub fixture_label: String,
    /// Index of the state being run.
    pub state_index: usize,
    /// Conditions of the state.
    pub conditions: Conditions,
    /// Step, pass and time counters.
    pub counters: SampleTag,
    /// Latest completion check.
    pub completion: CompletionCheckResult,
}

/// Rewrites a JSON status file at most once per `log_frequency` seconds.
#[derive(Debug, Clone)]
pub struct StatusLog {
    path: PathBuf,
    interval: Duration,
    last_write: Option<Instant>,
}

impl StatusLog {
    /// Creates a status log; a zero interval writes on every request.
    pub fn new(path: impl Into<PathBuf>, log_frequency: f64) -> Result<Self, MonteError> {
        let interval = Duration::try_from_secs_f64(log_frequency).map_err(|err| {
            MonteError::config(
                "invalid-log-frequency",
                "log_frequency must be a non-negative number of seconds",
                "status_log.log_frequency",
            )
            .with_context("reason", err.to_string())
        })?;
        Ok(Self {
            path: path.into(),
            interval,
            last_write: None,
        })
    }

    /// Builds a status log from fixture settings; `None` when no path is set.
    pub fn from_config(config: &StatusLogConfig) -> Result<Option<Self>, MonteError> {
        config
            .path
            .as_ref()
            .map(|path| Self::new(path, config.log_frequency))
            .transpose()
    }

    /// Status file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when nothing was written yet or the interval has elapsed.
    pub fn due(&self) -> bool {
        self.last_write
            .map_or(true, |last| last.elapsed() >= self.interval)
    }

    /// Forgets the last write so the next request is due immediately.
    pub fn reset(&mut self) {
        self.last_write = None;
    }

    /// Writes `entry`, replacing the previous contents.
    pub fn write(&mut self, entry: &StatusEntry) -> Result<(), MonteError> {
        write_json(&self.path, entry)?;
        self.last_write = Some(Instant::now());
        debug!(
            "status for fixture '{}' state {} written to {}",
            entry.fixture_label,
            entry.state_index,
            self.path.display()
        );
        Ok(())
    }

    /// Reads the latest entry back.
    pub fn read(&self) -> Result<StatusEntry, MonteError> {
        read_json(&self.path)
    }
}

/// Current wall-clock time in RFC 3339 form.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339()
}
