use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use log::debug;
use monte_core::{Conditions, MonteError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionCheckResult, CompletionCriterion};
use crate::config::ResultsOutputConfig;
use crate::json::{read_json, write_json};
use crate::sample::{Sample, SampleSet, SampleTag};

/// Everything one fixture accumulated for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results<C> {
    /// Label of the fixture that produced the results.
    pub fixture_label: String,
    /// Index of the state in the series.
    pub state_index: usize,
    /// Conditions of the state.
    pub conditions: Conditions,
    /// Samples by function name.
    pub data: SampleSet,
    /// Configurations stored with each sample, if requested.
    #[serde(default = "Vec::new")]
    pub trajectory: Vec<C>,
    /// Final completion check.
    pub completion: CompletionCheckResult,
    /// Counters when the run stopped.
    pub final_counters: SampleTag,
    /// Wall-clock seconds spent on the state.
    pub elapsed_clocktime: f64,
    /// Analysis function values.
    #[serde(default)]
    pub analysis: IndexMap<String, Vec<f64>>,
}

impl<C> Results<C> {
    /// Per-component means of every sampled function; empty for functions
    /// that were never sampled.
    pub fn means(&self) -> IndexMap<String, Vec<f64>> {
        self.data
            .samples
            .iter()
            .map(|(name, sample)| {
                if sample.is_empty() {
                    return (name.clone(), Vec::new());
                }
                let n = sample.len() as f64;
                let means = (0..sample.n_components())
                    .map(|idx| sample.values.iter().map(|value| value[idx]).sum::<f64>() / n)
                    .collect();
                (name.clone(), means)
            })
            .collect()
    }
}

/// Destination for finalized results.
pub trait ResultsSink<C>: Send {
    /// Persists the results of one (state, fixture) pair.
    fn write(&mut self, results: &Results<C>) -> Result<(), MonteError>;
}

/// Drops everything; used for equilibration fixtures.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl<C> ResultsSink<C> for DiscardSink {
    fn write(&mut self, _results: &Results<C>) -> Result<(), MonteError> {
        Ok(())
    }
}

/// Keeps results in memory behind a shared handle.
///
/// Clones share storage, so a caller can keep one clone and read what the
/// fixture wrote.
#[derive(Debug)]
pub struct MemorySink<C> {
    stored: Arc<Mutex<Vec<Results<C>>>>,
}

impl<C> Clone for MemorySink<C> {
    fn clone(&self) -> Self {
        Self {
            stored: Arc::clone(&self.stored),
        }
    }
}

impl<C> Default for MemorySink<C> {
    fn default() -> Self {
        Self {
            stored: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<C: Clone> MemorySink<C> {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything written so far.
    pub fn results(&self) -> Vec<Results<C>> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of results written so far.
    pub fn len(&self) -> usize {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// True before the first write.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Clone + Send> ResultsSink<C> for MemorySink<C> {
    fn write(&mut self, results: &Results<C>) -> Result<(), MonteError> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(results.clone());
        Ok(())
    }
}

/// One line of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Index of the state in the series.
    pub state_index: usize,
    /// Conditions of the state.
    pub conditions: Conditions,
    /// Samples taken.
    pub n_samples: u64,
    /// Deciding completion rule.
    pub criterion: CompletionCriterion,
    /// Per-component means by function name.
    pub means: IndexMap<String, Vec<f64>>,
    /// Analysis values.
    pub analysis: IndexMap<String, Vec<f64>>,
}

/// Writes results as JSON under an output directory:
/// `run.<state>/results.json`, optional `run.<state>/trajectory.json`, and a
/// cumulative `summary.json`.
#[derive(Debug, Clone)]
pub struct JsonResultsSink<C> {
    output_dir: PathBuf,
    write_trajectory: bool,
    write_observations: bool,
    _configuration: PhantomData<fn() -> C>,
}

impl<C> JsonResultsSink<C> {
    /// Creates a sink writing below `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, write_trajectory: bool, write_observations: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            write_trajectory,
            write_observations,
            _configuration: PhantomData,
        }
    }

    /// Builds a sink from fixture output settings; `None` when no directory is set.
    pub fn from_config(config: &ResultsOutputConfig) -> Option<Self> {
        config
            .output_dir
            .as_ref()
            .map(|dir| Self::new(dir, config.write_trajectory, config.write_observations))
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding the files of one state.
    pub fn run_dir(&self, state_index: usize) -> PathBuf {
        self.output_dir.join(format!("run.{state_index}"))
    }

    /// Path of the cumulative summary.
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("summary.json")
    }

    /// Reads the summary written so far (empty when none exists).
    pub fn read_summary(&self) -> Result<Vec<SummaryEntry>, MonteError> {
        let path = self.summary_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }
}

impl<C: DeserializeOwned> JsonResultsSink<C> {
    /// Reads back the results of one state.
    pub fn read(&self, state_index: usize) -> Result<Results<C>, MonteError> {
        let run_dir = self.run_dir(state_index);
        let mut results: Results<C> = read_json(&run_dir.join("results.json"))?;
        let trajectory_path = run_dir.join("trajectory.json");
        if trajectory_path.exists() {
            results.trajectory = read_json(&trajectory_path)?;
        }
        Ok(results)
    }
}

#[derive(Serialize)]
struct StoredResults<'a, C> {
    fixture_label: &'a str,
    state_index: usize,
    conditions: &'a Conditions,
    data: &'a SampleSet,
    trajectory: &'a [C],
    completion: &'a CompletionCheckResult,
    final_counters: SampleTag,
    elapsed_clocktime: f64,
    analysis: &'a IndexMap<String, Vec<f64>>,
}

impl<C: Serialize> ResultsSink<C> for JsonResultsSink<C> {
    fn write(&mut self, results: &Results<C>) -> Result<(), MonteError> {
        let run_dir = self.run_dir(results.state_index);
        let empty = SampleSet {
            samples: results
                .data
                .samples
                .iter()
                .map(|(name, sample)| (name.clone(), Sample::new(sample.component_names.clone())))
                .collect(),
            tags: Vec::new(),
        };
        let stored: StoredResults<'_, C> = StoredResults {
            fixture_label: &results.fixture_label,
            state_index: results.state_index,
            conditions: &results.conditions,
            data: if self.write_observations { &results.data } else { &empty },
            trajectory: &[],
            completion: &results.completion,
            final_counters: results.final_counters,
            elapsed_clocktime: results.elapsed_clocktime,
            analysis: &results.analysis,
        };
        write_json(&run_dir.join("results.json"), &stored)?;
        if self.write_trajectory {
            write_json(&run_dir.join("trajectory.json"), &results.trajectory)?;
        }

        let mut summary = self.read_summary()?;
        summary.retain(|entry| entry.state_index != results.state_index);
        summary.push(SummaryEntry {
            state_index: results.state_index,
            conditions: results.conditions.clone(),
            n_samples: results.completion.n_samples,
            criterion: results.completion.criterion,
            means: results.means(),
            analysis: results.analysis.clone(),
        });
        summary.sort_by_key(|entry| entry.state_index);
        write_json(&self.summary_path(), &summary)?;
        debug!(
            "wrote results for fixture '{}' state {} to {}",
            results.fixture_label,
            results.state_index,
            run_dir.display()
        );
        Ok(())
    }
}
