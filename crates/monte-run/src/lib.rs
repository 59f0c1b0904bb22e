#![deny(missing_docs)]

//! Run management for Monte Carlo simulations: state generation, sampling
//! schedules, completion checks and results persistence.
//!
//! A [`RunManager`] steps a [`monte_core::StochasticKernel`] through the
//! states produced by a [`StateGenerator`]. Each attached
//! [`SamplingFixture`] samples on its own schedule and decides completion
//! from cutoffs and requested precision.

/// Completion checks combining cutoffs and requested precision.
pub mod completion;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Sampling fixtures tying a scheduler, completion check and sink together.
pub mod fixture;
/// Sampling and analysis function registry.
pub mod functions;
/// State generators and completed-run records.
pub mod generator;
mod json;
/// Series manifest serialization helpers.
pub mod manifest;
/// Run manager driving states to completion.
pub mod manager;
/// Results and results sinks.
pub mod results;
/// Sample containers.
pub mod sample;
/// Trigger formulas and the sampling scheduler.
pub mod scheduler;
/// Confidence intervals and summary statistics.
pub mod statistics;
/// Wall-clock paced status files.
pub mod status;

pub use completion::{CheckInput, CompletionCheck, CompletionCheckResult, CompletionCriterion};
pub use config::{
    CompletionCheckParams, CutoffParams, FixtureSpec, GeneratorConfig, IncrementalParams,
    PrecisionTarget, ResultsOutputConfig, RunConfig, RunDataOutputParams, SampleMethod,
    SampleMode, SamplingParams, SeedPolicy, StatusLogConfig, TerminationPolicy,
};
pub use fixture::SamplingFixture;
pub use functions::{FunctionRegistry, ResultsAnalysisFunction, StateSamplingFunction};
pub use generator::{ConditionsSequence, RunData, StateGenerator};
pub use manifest::SeriesManifest;
pub use manager::{RunManager, SeriesSummary};
pub use results::{DiscardSink, JsonResultsSink, MemorySink, Results, ResultsSink, SummaryEntry};
pub use sample::{Sample, SampleSet, SampleTag};
pub use scheduler::{trigger, SamplingScheduler};
