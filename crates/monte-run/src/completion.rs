use log::debug;
use monte_core::MonteError;
use serde::{Deserialize, Serialize};

use crate::config::{CompletionCheckParams, PrecisionTarget};
use crate::sample::SampleSet;
use crate::statistics::iid_statistics;

/// Which rule decided the latest completion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionCriterion {
    /// A configured minimum is not met yet.
    MinPending,
    /// A configured maximum was reached.
    MaxCutoff,
    /// Every precision target is satisfied.
    PrecisionSatisfied,
    /// Nothing decided completion.
    #[default]
    #[serde(rename = "none")]
    NotConverged,
}

/// Convergence diagnostics for one `(sampler, component)` target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionDiagnostic {
    /// Sampling function name.
    pub sampler: String,
    /// Component index.
    pub component: usize,
    /// Component name.
    pub component_name: String,
    /// Sample mean.
    #[serde(with = "crate::json::float_token")]
    pub mean: f64,
    /// Confidence-interval half-width.
    #[serde(with = "crate::json::float_token")]
    pub half_width: f64,
    /// Requested absolute precision.
    pub requested_abs: Option<f64>,
    /// Requested relative precision.
    pub requested_rel: Option<f64>,
    /// Whether the half-width meets every requested precision.
    pub within_precision: bool,
}

/// Outcome of a completion check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompletionCheckResult {
    /// Whether the fixture has finished.
    pub is_complete: bool,
    /// Deciding rule.
    pub criterion: CompletionCriterion,
    /// Diagnostics from the latest precision evaluation.
    pub diagnostics: Vec<PrecisionDiagnostic>,
    /// Samples taken at the time of the check.
    pub n_samples: u64,
    /// Step or pass count at the time of the check.
    pub count: u64,
    /// Simulated time at the time of the check.
    pub time: f64,
    /// Wall-clock seconds at the time of the check.
    pub clocktime: f64,
    /// Samples taken at the latest precision evaluation.
    pub n_samples_at_last_precision_check: Option<u64>,
}

/// Progress snapshot handed to [`CompletionCheck::check`].
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    /// Samples collected so far.
    pub data: &'a SampleSet,
    /// Step or pass count selected by the sample mode.
    pub count: u64,
    /// Simulated time.
    pub time: f64,
    /// Wall-clock seconds since the run started.
    pub clocktime: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct ResolvedTarget {
    sampler: String,
    component: usize,
    component_name: String,
    abs: Option<f64>,
    rel: Option<f64>,
}

/// Cutoff and precision based termination check for one fixture.
#[derive(Debug, Clone)]
pub struct CompletionCheck {
    params: CompletionCheckParams,
    targets: Vec<ResolvedTarget>,
    last_precision_check: Option<u64>,
    precision_complete: bool,
    result: CompletionCheckResult,
}

impl CompletionCheck {
    /// Validates `params` against the functions sampled into `schema`.
    ///
    /// Only functions present in `schema` can carry precision targets, since
    /// nothing else is ever observed.
    pub fn new(
        params: CompletionCheckParams,
        schema: &SampleSet,
        field_prefix: &str,
    ) -> Result<Self, MonteError> {
        if !(params.confidence > 0.0 && params.confidence < 1.0) {
            return Err(MonteError::config(
                "invalid-confidence",
                "confidence must lie strictly between 0 and 1",
                format!("{field_prefix}.confidence"),
            ));
        }
        if params.check_frequency == 0 {
            return Err(MonteError::config(
                "invalid-check-frequency",
                "check_frequency must be at least 1",
                format!("{field_prefix}.check_frequency"),
            ));
        }
        let mut targets = Vec::new();
        for (idx, target) in params.requested_precision.iter().enumerate() {
            let prefix = format!("{field_prefix}.requested_precision[{idx}]");
            targets.extend(resolve_target(target, schema, &prefix)?);
        }
        Ok(Self {
            params,
            targets,
            last_precision_check: None,
            precision_complete: false,
            result: CompletionCheckResult::default(),
        })
    }

    /// Parameters in use.
    pub fn params(&self) -> &CompletionCheckParams {
        &self.params
    }

    /// Latest result.
    pub fn result(&self) -> &CompletionCheckResult {
        &self.result
    }

    /// Number of resolved `(sampler, component)` precision targets.
    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Forgets every previous evaluation before a new state.
    pub fn reset(&mut self) {
        self.last_precision_check = None;
        self.precision_complete = false;
        self.result = CompletionCheckResult::default();
    }

    /// Evaluates completion. Cutoffs are checked on every call; precision is
    /// re-evaluated only once `check_begin` samples exist and at least
    /// `check_frequency` new samples arrived since the previous evaluation.
    pub fn check(&mut self, input: CheckInput<'_>) -> &CompletionCheckResult {
        let n_samples = input.data.n_samples() as u64;
        self.result.n_samples = n_samples;
        self.result.count = input.count;
        self.result.time = input.time;
        self.result.clocktime = input.clocktime;

        if self.minimums_pending(n_samples, &input) {
            self.result.is_complete = false;
            self.result.criterion = CompletionCriterion::MinPending;
            return &self.result;
        }
        if self.maximum_reached(n_samples, &input) {
            self.result.is_complete = true;
            self.result.criterion = CompletionCriterion::MaxCutoff;
            return &self.result;
        }

        let precision_due = n_samples >= self.params.check_begin
            && self
                .last_precision_check
                .map_or(true, |last| n_samples - last >= self.params.check_frequency);
        if precision_due {
            self.evaluate_precision(input.data, n_samples);
        }

        self.result.is_complete = self.precision_complete;
        self.result.criterion = if self.precision_complete {
            CompletionCriterion::PrecisionSatisfied
        } else {
            CompletionCriterion::NotConverged
        };
        &self.result
    }

    fn minimums_pending(&self, n_samples: u64, input: &CheckInput<'_>) -> bool {
        let cutoff = &self.params.cutoff;
        cutoff.min_count.map_or(false, |min| n_samples < min)
            || cutoff.min_sample.map_or(false, |min| input.count < min)
            || cutoff.min_time.map_or(false, |min| input.time < min)
            || cutoff.min_clocktime.map_or(false, |min| input.clocktime < min)
    }

    fn maximum_reached(&self, n_samples: u64, input: &CheckInput<'_>) -> bool {
        let cutoff = &self.params.cutoff;
        cutoff.max_count.map_or(false, |max| n_samples >= max)
            || cutoff.max_sample.map_or(false, |max| input.count >= max)
            || cutoff.max_time.map_or(false, |max| input.time >= max)
            || cutoff.max_clocktime.map_or(false, |max| input.clocktime >= max)
    }

    fn evaluate_precision(&mut self, data: &SampleSet, n_samples: u64) {
        let mut diagnostics = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let series = data
                .get(&target.sampler)
                .map(|sample| sample.component(target.component))
                .unwrap_or_default();
            let stats = iid_statistics(&series, self.params.confidence);
            let abs_ok = target.abs.map_or(true, |abs| stats.half_width <= abs);
            let rel_ok = target
                .rel
                .map_or(true, |rel| stats.half_width <= rel * stats.mean.abs());
            diagnostics.push(PrecisionDiagnostic {
                sampler: target.sampler.clone(),
                component: target.component,
                component_name: target.component_name.clone(),
                mean: stats.mean,
                half_width: stats.half_width,
                requested_abs: target.abs,
                requested_rel: target.rel,
                within_precision: abs_ok && rel_ok,
            });
        }
        self.precision_complete =
            !diagnostics.is_empty() && diagnostics.iter().all(|diag| diag.within_precision);
        debug!(
            "precision check at {n_samples} samples: {}/{} targets converged",
            diagnostics.iter().filter(|diag| diag.within_precision).count(),
            diagnostics.len()
        );
        self.result.diagnostics = diagnostics;
        self.result.n_samples_at_last_precision_check = Some(n_samples);
        self.last_precision_check = Some(n_samples);
    }
}

fn resolve_target(
    target: &PrecisionTarget,
    schema: &SampleSet,
    prefix: &str,
) -> Result<Vec<ResolvedTarget>, MonteError> {
    let sample = schema.get(&target.sampler).ok_or_else(|| {
        MonteError::config(
            "unknown-precision-sampler",
            "precision requested for a function that is not sampled",
            format!("{prefix}.sampler"),
        )
        .with_context("sampler", target.sampler.clone())
    })?;
    for (value, name) in [(target.abs, "abs"), (target.rel, "rel")] {
        if let Some(value) = value {
            if !(value.is_finite() && value > 0.0) {
                return Err(MonteError::config(
                    "invalid-precision",
                    "requested precision must be a positive finite number",
                    format!("{prefix}.{name}"),
                ));
            }
        }
    }
    if target.abs.is_none() && target.rel.is_none() {
        return Err(MonteError::config(
            "missing-precision",
            "precision target needs `abs` or `rel`",
            prefix.to_string(),
        ));
    }

    let components: Vec<usize> = match (target.component, &target.component_name) {
        (Some(_), Some(_)) => {
            return Err(MonteError::config(
                "ambiguous-component",
                "give either `component` or `component_name`, not both",
                format!("{prefix}.component"),
            ));
        }
        (Some(index), None) => {
            if index >= sample.n_components() {
                return Err(MonteError::config(
                    "component-out-of-range",
                    "component index exceeds the sampler output length",
                    format!("{prefix}.component"),
                )
                .with_context("n_components", sample.n_components().to_string()));
            }
            vec![index]
        }
        (None, Some(name)) => {
            let index = sample.component_index(name).ok_or_else(|| {
                MonteError::config(
                    "unknown-component",
                    "component name not declared by the sampler",
                    format!("{prefix}.component_name"),
                )
                .with_context("component_name", name.clone())
            })?;
            vec![index]
        }
        (None, None) => (0..sample.n_components()).collect(),
    };

    Ok(components
        .into_iter()
        .map(|component| ResolvedTarget {
            sampler: target.sampler.clone(),
            component,
            component_name: sample.component_names[component].clone(),
            abs: target.abs,
            rel: target.rel,
        })
        .collect())
}
