use std::fmt;
use std::time::Instant;

use indexmap::IndexMap;
use log::{debug, warn};
use monte_core::errors::ErrorInfo;
use monte_core::{Conditions, MonteError, State, StepOutcome};

use crate::completion::{CheckInput, CompletionCheck, CompletionCheckResult};
use crate::config::FixtureSpec;
use crate::functions::{FunctionRegistry, ResultsAnalysisFunction};
use crate::results::{Results, ResultsSink};
use crate::scheduler::SamplingScheduler;
use crate::status::{timestamp, StatusEntry, StatusLog};

/// One independently configured sampling and completion setup attached to a run.
///
/// Owns a [`SamplingScheduler`], a [`CompletionCheck`], a results sink, an
/// optional [`StatusLog`] and the analysis functions evaluated on finalize.
pub struct SamplingFixture<C> {
    spec: FixtureSpec,
    scheduler: SamplingScheduler<C>,
    completion: CompletionCheck,
    sink: Box<dyn ResultsSink<C>>,
    status: Option<StatusLog>,
    analyses: Vec<ResultsAnalysisFunction>,
    frozen: bool,
    state_index: usize,
    conditions: Conditions,
    started: Instant,
}

impl<C: Clone> SamplingFixture<C> {
    /// Validates `spec` against the registry and builds the fixture.
    ///
    /// Every sampler, precision target and analysis name must resolve; errors
    /// point at `fixtures.<label>.<field>`.
    pub fn new(
        spec: FixtureSpec,
        registry: &FunctionRegistry<C>,
        sink: Box<dyn ResultsSink<C>>,
    ) -> Result<Self, MonteError> {
        if spec.label.is_empty() {
            return Err(MonteError::config(
                "empty-fixture-label",
                "fixture labels must be non-empty",
                "fixtures.label",
            ));
        }
        let prefix = format!("fixtures.{}", spec.label);
        let scheduler = SamplingScheduler::new(
            spec.sampling.clone(),
            registry,
            &format!("{prefix}.sampling"),
        )?;
        let completion = CompletionCheck::new(
            spec.completion.clone(),
            scheduler.data(),
            &format!("{prefix}.completion"),
        )?;
        let mut analyses = Vec::with_capacity(spec.analysis_names.len());
        for (idx, name) in spec.analysis_names.iter().enumerate() {
            let function = registry.analysis(name).ok_or_else(|| {
                MonteError::config(
                    "unknown-analysis",
                    "analysis function is not registered",
                    format!("{prefix}.analysis_names[{idx}]"),
                )
                .with_context("analysis", name.clone())
            })?;
            debug!("{prefix}.analysis_names[{idx}]: '{}' ({})", function.name(), function.description());
            analyses.push(function.clone());
        }
        let status = StatusLog::from_config(&spec.status_log)
            .map_err(|err| err.with_context("fixture", spec.label.clone()))?;
        if !spec.completion.cutoff.has_maximum() && completion.n_targets() == 0 {
            warn!(
                "fixture '{}' has neither a maximum cutoff nor a precision target and only stops with other fixtures",
                spec.label
            );
        }
        Ok(Self {
            spec,
            scheduler,
            completion,
            sink,
            status,
            analyses,
            frozen: false,
            state_index: 0,
            conditions: Conditions::default(),
            started: Instant::now(),
        })
    }

    /// Prepares for a new state: clears samples, counters, the cached
    /// completion result and the frozen flag.
    pub fn reset(&mut self, state_index: usize, conditions: &Conditions, steps_per_pass: u64) {
        self.scheduler.reset(steps_per_pass);
        self.completion.reset();
        if let Some(status) = &mut self.status {
            status.reset();
        }
        self.frozen = false;
        self.state_index = state_index;
        self.conditions = conditions.clone();
        self.started = Instant::now();
    }

    /// Records one kernel step and samples if a trigger is due. Frozen
    /// fixtures ignore the step.
    pub fn advance(&mut self, state: &State<C>, outcome: StepOutcome) -> Result<(), MonteError> {
        if self.frozen {
            return Ok(());
        }
        self.scheduler.advance(outcome.steps);
        self.scheduler.advance_time(outcome.time_increment);
        if self.scheduler.due() {
            self.scheduler
                .sample(state)
                .map_err(|err| err.with_context("fixture", self.spec.label.clone()))?;
        }
        Ok(())
    }

    /// Runs the completion check and, when due, rewrites the status log.
    /// Returns whether the fixture is complete.
    pub fn check(&mut self) -> Result<bool, MonteError> {
        let clocktime = self.started.elapsed().as_secs_f64();
        let complete = self
            .completion
            .check(CheckInput {
                data: self.scheduler.data(),
                count: self.scheduler.count(),
                time: self.scheduler.time(),
                clocktime,
            })
            .is_complete;
        if self.status.as_ref().map_or(false, StatusLog::due) {
            self.write_status()?;
        }
        Ok(complete)
    }

    fn write_status(&mut self) -> Result<(), MonteError> {
        let entry = StatusEntry {
            timestamp: timestamp(),
            fixture_label: self.spec.label.clone(),
            state_index: self.state_index,
            conditions: self.conditions.clone(),
            counters: self.scheduler.tag(),
            completion: self.completion.result().clone(),
        };
        match &mut self.status {
            Some(status) => status.write(&entry),
            None => Ok(()),
        }
    }

    /// Collects the results of the current state, evaluates analysis
    /// functions and hands the results to the sink.
    pub fn finalize(&mut self) -> Result<Results<C>, MonteError> {
        if self.status.is_some() {
            self.write_status()?;
        }
        let final_counters = self.scheduler.tag();
        let (data, trajectory) = self.scheduler.take_data();
        let mut analysis = IndexMap::with_capacity(self.analyses.len());
        for function in &self.analyses {
            let value = function.evaluate(&data);
            if value.len() != function.n_components() {
                return Err(MonteError::Sampling(
                    ErrorInfo::new(
                        "analysis-length-mismatch",
                        "analysis function returned the wrong number of components",
                    )
                    .with_context("analysis", function.name().to_string())
                    .with_context("expected", function.n_components().to_string())
                    .with_context("actual", value.len().to_string()),
                ));
            }
            analysis.insert(function.name().to_string(), value);
        }
        let results = Results {
            fixture_label: self.spec.label.clone(),
            state_index: self.state_index,
            conditions: self.conditions.clone(),
            data,
            trajectory,
            completion: self.completion.result().clone(),
            final_counters,
            elapsed_clocktime: self.started.elapsed().as_secs_f64(),
            analysis,
        };
        self.sink.write(&results)?;
        debug!(
            "fixture '{}' finalized state {} with {} samples ({:?})",
            results.fixture_label,
            results.state_index,
            results.completion.n_samples,
            results.completion.criterion
        );
        Ok(results)
    }
}

impl<C> SamplingFixture<C> {
    /// Fixture label.
    pub fn label(&self) -> &str {
        &self.spec.label
    }

    /// Configuration the fixture was built from.
    pub fn spec(&self) -> &FixtureSpec {
        &self.spec
    }

    /// Sampling scheduler.
    pub fn scheduler(&self) -> &SamplingScheduler<C> {
        &self.scheduler
    }

    /// Latest completion result.
    pub fn completion(&self) -> &CompletionCheckResult {
        self.completion.result()
    }

    /// True once the fixture stopped sampling for the current state.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stops sampling until the next [`reset`](Self::reset).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl<C> fmt::Debug for SamplingFixture<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplingFixture")
            .field("label", &self.spec.label)
            .field("state_index", &self.state_index)
            .field("n_samples", &self.scheduler.n_samples())
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}
