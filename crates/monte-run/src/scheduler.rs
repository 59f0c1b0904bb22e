use std::fmt;

use log::debug;
use monte_core::errors::ErrorInfo;
use monte_core::{MonteError, State};

use crate::config::{SampleMethod, SampleMode, SamplingParams};
use crate::functions::{FunctionRegistry, StateSamplingFunction};
use crate::sample::{Sample, SampleSet, SampleTag};

/// Counter value at which sample `n` becomes due.
///
/// Step and pass modes round to the nearest integer; time mode keeps the real
/// value. The result is non-decreasing in `n` for valid parameters.
pub fn trigger(params: &SamplingParams, n: u64) -> f64 {
    let n = n as f64;
    let raw = match params.sample_method {
        SampleMethod::Linear => params.begin + (params.period / params.samples_per_period) * n,
        SampleMethod::Log => {
            params.begin + params.period.powf((n + params.shift) / params.samples_per_period)
        }
    };
    match params.sample_mode {
        SampleMode::ByStep | SampleMode::ByPass => raw.round(),
        SampleMode::ByTime => raw,
    }
}

/// Tracks run progress and takes samples when the trigger formula says so.
pub struct SamplingScheduler<C> {
    params: SamplingParams,
    samplers: Vec<StateSamplingFunction<C>>,
    steps_per_pass: u64,
    step_count: u64,
    time: f64,
    next_index: u64,
    data: SampleSet,
    trajectory: Vec<C>,
}

impl<C: Clone> SamplingScheduler<C> {
    /// Resolves `params.sampler_names` against the registry.
    ///
    /// `field_prefix` is used to report the offending field path.
    pub fn new(
        params: SamplingParams,
        registry: &FunctionRegistry<C>,
        field_prefix: &str,
    ) -> Result<Self, MonteError> {
        params.validate(field_prefix)?;
        let mut samplers = Vec::with_capacity(params.sampler_names.len());
        for (idx, name) in params.sampler_names.iter().enumerate() {
            let field = format!("{field_prefix}.sampler_names[{idx}]");
            let function = registry.sampler(name).ok_or_else(|| {
                MonteError::config("unknown-sampler", "sampling function is not registered", field.clone())
                    .with_context("sampler", name.clone())
            })?;
            if samplers
                .iter()
                .any(|existing: &StateSamplingFunction<C>| existing.name() == name)
            {
                return Err(MonteError::config(
                    "duplicate-sampler",
                    "sampling function listed twice",
                    field,
                ));
            }
            debug!("{field}: '{}' ({})", function.name(), function.description());
            samplers.push(function.clone());
        }
        let mut scheduler = Self {
            params,
            samplers,
            steps_per_pass: 1,
            step_count: 0,
            time: 0.0,
            next_index: 0,
            data: SampleSet::default(),
            trajectory: Vec::new(),
        };
        scheduler.reset(1);
        Ok(scheduler)
    }

    /// Clears counters and samples before a new state.
    pub fn reset(&mut self, steps_per_pass: u64) {
        self.steps_per_pass = steps_per_pass.max(1);
        self.step_count = 0;
        self.time = 0.0;
        self.next_index = 0;
        self.trajectory.clear();
        self.data = SampleSet::default();
        for function in &self.samplers {
            self.data.samples.insert(
                function.name().to_string(),
                Sample::new(function.component_names().to_vec()),
            );
        }
    }

    /// Records kernel progress. Never samples.
    pub fn advance(&mut self, steps_taken: u64) {
        self.step_count += steps_taken;
    }

    /// Records simulated time.
    pub fn advance_time(&mut self, dt: f64) {
        self.time += dt;
    }

    /// True when the counter for the sample mode has reached the next trigger.
    pub fn due(&self) -> bool {
        let target = trigger(&self.params, self.next_index);
        match self.params.sample_mode {
            SampleMode::ByStep => self.step_count as f64 >= target,
            SampleMode::ByPass => self.pass_count() as f64 >= target,
            SampleMode::ByTime => self.time >= target,
        }
    }

    /// Calls every sampling function once and appends the observations.
    ///
    /// # Panics
    ///
    /// Panics when called while [`due`](Self::due) is false.
    pub fn sample(&mut self, state: &State<C>) -> Result<(), MonteError> {
        assert!(self.due(), "sample() called before the next trigger");
        let index = self.next_index;
        let mut observed = Vec::with_capacity(self.samplers.len());
        for function in &self.samplers {
            let value = function.evaluate(state);
            if value.len() != function.n_components() {
                return Err(MonteError::Sampling(
                    ErrorInfo::new(
                        "sample-length-mismatch",
                        "sampling function returned the wrong number of components",
                    )
                    .with_context("sampler", function.name().to_string())
                    .with_context("sample_index", index.to_string())
                    .with_context("expected", function.n_components().to_string())
                    .with_context("actual", value.len().to_string()),
                ));
            }
            if let Some(component) = value.iter().position(|v| !v.is_finite()) {
                return Err(MonteError::Sampling(
                    ErrorInfo::new("non-finite-sample", "sampling function produced a non-finite value")
                        .with_context("sampler", function.name().to_string())
                        .with_context("sample_index", index.to_string())
                        .with_context("component", component.to_string()),
                ));
            }
            observed.push(value);
        }
        for (function, value) in self.samplers.iter().zip(observed) {
            if let Some(sample) = self.data.samples.get_mut(function.name()) {
                sample.push(value);
            }
        }
        self.data.tags.push(self.tag());
        if self.params.do_sample_trajectory {
            self.trajectory.push(state.configuration.clone());
        }
        self.next_index += 1;
        Ok(())
    }
}

impl<C> SamplingScheduler<C> {
    /// Sampling parameters.
    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Total elementary steps since the last reset.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Completed passes since the last reset.
    pub fn pass_count(&self) -> u64 {
        self.step_count / self.steps_per_pass
    }

    /// Simulated time since the last reset.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Steps per pass for the current state.
    pub fn steps_per_pass(&self) -> u64 {
        self.steps_per_pass
    }

    /// Counter selected by the sample mode (steps or passes).
    pub fn count(&self) -> u64 {
        match self.params.sample_mode {
            SampleMode::ByStep => self.step_count,
            SampleMode::ByPass | SampleMode::ByTime => self.pass_count(),
        }
    }

    /// Current counters.
    pub fn tag(&self) -> SampleTag {
        SampleTag {
            step: self.step_count,
            pass: self.pass_count(),
            time: self.time,
        }
    }

    /// Number of samples taken since the last reset.
    pub fn n_samples(&self) -> u64 {
        self.next_index
    }

    /// Counter value of the next trigger.
    pub fn next_trigger(&self) -> f64 {
        trigger(&self.params, self.next_index)
    }

    /// Samples collected so far.
    pub fn data(&self) -> &SampleSet {
        &self.data
    }

    /// Configurations stored with each sample.
    pub fn trajectory(&self) -> &[C] {
        &self.trajectory
    }

    /// Moves the samples and trajectory out, leaving the scheduler empty.
    pub(crate) fn take_data(&mut self) -> (SampleSet, Vec<C>) {
        (
            std::mem::take(&mut self.data),
            std::mem::take(&mut self.trajectory),
        )
    }
}

impl<C> fmt::Debug for SamplingScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplingScheduler")
            .field("params", &self.params)
            .field(
                "samplers",
                &self.samplers.iter().map(StateSamplingFunction::name).collect::<Vec<_>>(),
            )
            .field("steps_per_pass", &self.steps_per_pass)
            .field("step_count", &self.step_count)
            .field("time", &self.time)
            .field("next_index", &self.next_index)
            .field("n_samples", &self.data.n_samples())
            .finish_non_exhaustive()
    }
}
