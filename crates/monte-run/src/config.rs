use std::fs;
use std::path::{Path, PathBuf};

use monte_core::errors::ErrorInfo;
use monte_core::{Conditions, MonteError};
use serde::{Deserialize, Serialize};

/// Counter that drives sampling for a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SampleMode {
    /// Sample on elementary step counts.
    ByStep,
    /// Sample on pass counts (one pass = `steps_per_pass` steps).
    #[default]
    ByPass,
    /// Sample on simulated time.
    ByTime,
}

/// Spacing of sample triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SampleMethod {
    /// `begin + (period / samples_per_period) * n`.
    #[default]
    Linear,
    /// `begin + period ^ ((n + shift) / samples_per_period)`.
    Log,
}

/// Sampling cadence and the functions sampled at each trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Counter that decides when a sample is due.
    #[serde(default)]
    pub sample_mode: SampleMode,
    /// Linear or logarithmic spacing.
    #[serde(default)]
    pub sample_method: SampleMethod,
    /// Counter value of the first trigger.
    #[serde(default)]
    pub begin: f64,
    /// Trigger period (log base for logarithmic spacing).
    #[serde(default = "default_period")]
    pub period: f64,
    /// Number of samples per period.
    #[serde(default = "default_samples_per_period")]
    pub samples_per_period: f64,
    /// Exponent shift for logarithmic spacing.
    #[serde(default)]
    pub shift: f64,
    /// Ordered names of the sampling functions to call.
    #[serde(default)]
    pub sampler_names: Vec<String>,
    /// Store a copy of the configuration with every sample.
    #[serde(default)]
    pub do_sample_trajectory: bool,
}

fn default_period() -> f64 {
    1.0
}

fn default_samples_per_period() -> f64 {
    1.0
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            sample_mode: SampleMode::default(),
            sample_method: SampleMethod::default(),
            begin: 0.0,
            period: default_period(),
            samples_per_period: default_samples_per_period(),
            shift: 0.0,
            sampler_names: Vec::new(),
            do_sample_trajectory: false,
        }
    }
}

impl SamplingParams {
    /// Checks the cadence parameters, reporting the offending field under `prefix`.
    pub fn validate(&self, prefix: &str) -> Result<(), MonteError> {
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(MonteError::config(
                "invalid-period",
                "period must be a positive finite number",
                format!("{prefix}.period"),
            ));
        }
        if self.sample_method == SampleMethod::Log && self.period <= 1.0 {
            return Err(MonteError::config(
                "invalid-period",
                "logarithmic sampling needs period > 1",
                format!("{prefix}.period"),
            ));
        }
        if !(self.samples_per_period.is_finite() && self.samples_per_period > 0.0) {
            return Err(MonteError::config(
                "invalid-samples-per-period",
                "samples_per_period must be a positive finite number",
                format!("{prefix}.samples_per_period"),
            ));
        }
        if !self.begin.is_finite() || !self.shift.is_finite() {
            return Err(MonteError::config(
                "invalid-begin",
                "begin and shift must be finite",
                format!("{prefix}.begin"),
            ));
        }
        Ok(())
    }
}

/// Hard bounds on run length. `count` bounds refer to the number of samples
/// taken, `sample` bounds to the step or pass counter selected by the
/// sample mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CutoffParams {
    /// Minimum number of samples.
    #[serde(default)]
    pub min_count: Option<u64>,
    /// Maximum number of samples.
    #[serde(default)]
    pub max_count: Option<u64>,
    /// Minimum step or pass count.
    #[serde(default)]
    pub min_sample: Option<u64>,
    /// Maximum step or pass count.
    #[serde(default)]
    pub max_sample: Option<u64>,
    /// Minimum simulated time.
    #[serde(default)]
    pub min_time: Option<f64>,
    /// Maximum simulated time.
    #[serde(default)]
    pub max_time: Option<f64>,
    /// Minimum wall-clock seconds.
    #[serde(default)]
    pub min_clocktime: Option<f64>,
    /// Maximum wall-clock seconds.
    #[serde(default)]
    pub max_clocktime: Option<f64>,
}

impl CutoffParams {
    /// True when any maximum is configured.
    pub fn has_maximum(&self) -> bool {
        self.max_count.is_some()
            || self.max_sample.is_some()
            || self.max_time.is_some()
            || self.max_clocktime.is_some()
    }
}

/// Requested precision for one sampler, or one of its components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionTarget {
    /// Sampling function name.
    pub sampler: String,
    /// Component index; when neither index nor name is given every component is targeted.
    #[serde(default)]
    pub component: Option<usize>,
    /// Component name, resolved against the sampler's component names.
    #[serde(default)]
    pub component_name: Option<String>,
    /// Absolute half-width target.
    #[serde(default)]
    pub abs: Option<f64>,
    /// Half-width target relative to `|mean|`.
    #[serde(default)]
    pub rel: Option<f64>,
}

impl PrecisionTarget {
    /// Absolute precision on every component of `sampler`.
    pub fn abs(sampler: impl Into<String>, precision: f64) -> Self {
        Self {
            sampler: sampler.into(),
            component: None,
            component_name: None,
            abs: Some(precision),
            rel: None,
        }
    }

    /// Restricts the target to one component index.
    pub fn at_component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    /// Restricts the target to one named component.
    pub fn at_component_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = Some(name.into());
        self
    }

    /// Adds a relative precision requirement.
    pub fn with_rel(mut self, rel: f64) -> Self {
        self.rel = Some(rel);
        self
    }
}

/// Completion check configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCheckParams {
    /// Hard cutoffs.
    #[serde(default)]
    pub cutoff: CutoffParams,
    /// Precision targets, all of which must hold for convergence.
    #[serde(default)]
    pub requested_precision: Vec<PrecisionTarget>,
    /// Confidence level of the reported interval.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Number of samples before the first precision evaluation.
    #[serde(default = "default_check_begin")]
    pub check_begin: u64,
    /// Number of new samples between precision evaluations.
    #[serde(default = "default_check_frequency")]
    pub check_frequency: u64,
}

fn default_confidence() -> f64 {
    0.95
}

fn default_check_begin() -> u64 {
    10
}

fn default_check_frequency() -> u64 {
    1
}

impl Default for CompletionCheckParams {
    fn default() -> Self {
        Self {
            cutoff: CutoffParams::default(),
            requested_precision: Vec::new(),
            confidence: default_confidence(),
            check_begin: default_check_begin(),
            check_frequency: default_check_frequency(),
        }
    }
}

/// Where and how a fixture persists its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsOutputConfig {
    /// Output directory; results are kept in memory only when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Write sampled configurations.
    #[serde(default)]
    pub write_trajectory: bool,
    /// Write the individual observations, not only the summary.
    #[serde(default = "default_true")]
    pub write_observations: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ResultsOutputConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            write_trajectory: false,
            write_observations: true,
        }
    }
}

/// Wall-clock cadence of the status log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLogConfig {
    /// Status file path; logging is disabled when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Seconds between writes.
    #[serde(default = "default_log_frequency")]
    pub log_frequency: f64,
}

fn default_log_frequency() -> f64 {
    600.0
}

impl Default for StatusLogConfig {
    fn default() -> Self {
        Self {
            path: None,
            log_frequency: default_log_frequency(),
        }
    }
}

/// Everything needed to build one sampling fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Unique fixture label.
    pub label: String,
    /// Sampling cadence.
    #[serde(default)]
    pub sampling: SamplingParams,
    /// Completion criteria.
    #[serde(default)]
    pub completion: CompletionCheckParams,
    /// Results persistence.
    #[serde(default)]
    pub results: ResultsOutputConfig,
    /// Status log cadence.
    #[serde(default)]
    pub status_log: StatusLogConfig,
    /// Analysis functions evaluated when results are finalized.
    #[serde(default)]
    pub analysis_names: Vec<String>,
}

impl FixtureSpec {
    /// Creates a fixture spec with default sampling and completion settings.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sampling: SamplingParams::default(),
            completion: CompletionCheckParams::default(),
            results: ResultsOutputConfig::default(),
            status_log: StatusLogConfig::default(),
            analysis_names: Vec::new(),
        }
    }
}

/// Linear path through conditions space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalParams {
    /// Conditions of the first state.
    pub initial_conditions: Conditions,
    /// Change applied per state.
    #[serde(default)]
    pub conditions_increment: Conditions,
    /// Number of states, including the first.
    pub n_states: usize,
    /// Start each state from the final configuration of the previous one.
    #[serde(default = "default_true")]
    pub dependent_runs: bool,
}

/// Which state generator to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GeneratorConfig {
    /// Linear increments from an initial set of conditions.
    Incremental(IncrementalParams),
    /// Explicit list of conditions.
    Fixed {
        /// Conditions of each state, in run order.
        conditions: Vec<Conditions>,
        /// Start each state from the final configuration of the previous one.
        #[serde(default)]
        dependent_runs: bool,
    },
}

/// Retention and persistence of completed run records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDataOutputParams {
    /// Keep every initial configuration.
    #[serde(default)]
    pub save_all_initial_states: bool,
    /// Keep every final configuration.
    #[serde(default)]
    pub save_all_final_states: bool,
    /// Keep the last final configuration (needed for restarts and dependent runs).
    #[serde(default = "default_true")]
    pub save_last_final_state: bool,
    /// Directory for `completed_runs.json`; nothing is written when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for RunDataOutputParams {
    fn default() -> Self {
        Self {
            save_all_initial_states: false,
            save_all_final_states: false,
            save_last_final_state: true,
            output_dir: None,
        }
    }
}

/// How completion of several fixtures ends a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationPolicy {
    /// Stop as soon as any fixture is complete.
    #[default]
    Any,
    /// Stop when every fixture is complete; finished fixtures stop sampling.
    All,
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the series.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Reseed the engine from a per-state substream before each state.
    #[serde(default)]
    pub reseed_each_state: bool,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            reseed_each_state: false,
            label: None,
        }
    }
}

/// YAML-configurable description of a full run series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// State generator.
    pub generator: GeneratorConfig,
    /// Main sampling fixtures.
    #[serde(default)]
    pub fixtures: Vec<FixtureSpec>,
    /// Fixtures run once before the first state (results discarded).
    #[serde(default)]
    pub before_first_run: Vec<FixtureSpec>,
    /// Fixtures run before every state (results discarded).
    #[serde(default)]
    pub before_each_run: Vec<FixtureSpec>,
    /// Multi-fixture termination policy.
    #[serde(default)]
    pub termination: TerminationPolicy,
    /// Seeding.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Completed-run bookkeeping.
    #[serde(default)]
    pub completed_runs: RunDataOutputParams,
}

impl RunConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MonteError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            MonteError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Reads and parses a YAML file.
    pub fn load(path: &Path) -> Result<Self, MonteError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            MonteError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Serializes to YAML.
    pub fn to_yaml_string(&self) -> Result<String, MonteError> {
        serde_yaml::to_string(self).map_err(|err| {
            MonteError::Serde(ErrorInfo::new("config-serialize", err.to_string()))
        })
    }
}
