use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use monte_core::errors::ErrorInfo;
use monte_core::{MonteError, State};

use crate::sample::SampleSet;

type SamplingFn<C> = dyn Fn(&State<C>) -> Vec<f64> + Send + Sync;
type AnalysisFn = dyn Fn(&SampleSet) -> Vec<f64> + Send + Sync;

/// Named observable extractor: a pure mapping from a state to a fixed-length vector.
pub struct StateSamplingFunction<C> {
    name: String,
    description: String,
    component_names: Vec<String>,
    function: Arc<SamplingFn<C>>,
}

impl<C> StateSamplingFunction<C> {
    /// Creates a sampling function whose components are named `"0"`, `"1"`, ...
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        n_components: usize,
        function: F,
    ) -> Self
    where
        F: Fn(&State<C>) -> Vec<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            component_names: (0..n_components).map(|idx| idx.to_string()).collect(),
            function: Arc::new(function),
        }
    }

    /// Replaces the default component names.
    pub fn with_component_names(mut self, names: Vec<String>) -> Self {
        self.component_names = names;
        self
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared output length.
    pub fn n_components(&self) -> usize {
        self.component_names.len()
    }

    /// Component names, one per output entry.
    pub fn component_names(&self) -> &[String] {
        &self.component_names
    }

    /// Evaluates the function.
    pub fn evaluate(&self, state: &State<C>) -> Vec<f64> {
        (self.function)(state)
    }
}

impl<C> Clone for StateSamplingFunction<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            component_names: self.component_names.clone(),
            function: Arc::clone(&self.function),
        }
    }
}

impl<C> fmt::Debug for StateSamplingFunction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSamplingFunction")
            .field("name", &self.name)
            .field("component_names", &self.component_names)
            .finish_non_exhaustive()
    }
}

/// Named function evaluated over the samples of a finished run.
#[derive(Clone)]
pub struct ResultsAnalysisFunction {
    name: String,
    description: String,
    n_components: usize,
    function: Arc<AnalysisFn>,
}

impl ResultsAnalysisFunction {
    /// Creates an analysis function with a fixed output length.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        n_components: usize,
        function: F,
    ) -> Self
    where
        F: Fn(&SampleSet) -> Vec<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            n_components,
            function: Arc::new(function),
        }
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared output length.
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Evaluates the function.
    pub fn evaluate(&self, samples: &SampleSet) -> Vec<f64> {
        (self.function)(samples)
    }
}

impl fmt::Debug for ResultsAnalysisFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultsAnalysisFunction")
            .field("name", &self.name)
            .field("n_components", &self.n_components)
            .finish_non_exhaustive()
    }
}

/// Ordered name-keyed registry of sampling and analysis functions.
///
/// Built once per run and shared by every fixture through an `Arc`.
pub struct FunctionRegistry<C> {
    samplers: IndexMap<String, StateSamplingFunction<C>>,
    analyses: IndexMap<String, ResultsAnalysisFunction>,
}

impl<C> Default for FunctionRegistry<C> {
    fn default() -> Self {
        Self {
            samplers: IndexMap::new(),
            analyses: IndexMap::new(),
        }
    }
}

impl<C> FunctionRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sampling function, rejecting duplicates and empty outputs.
    pub fn register_sampler(&mut self, function: StateSamplingFunction<C>) -> Result<(), MonteError> {
        check_registration(function.name(), function.n_components(), self.contains(function.name()))?;
        self.samplers.insert(function.name.clone(), function);
        Ok(())
    }

    /// Registers an analysis function, rejecting duplicates and empty outputs.
    pub fn register_analysis(&mut self, function: ResultsAnalysisFunction) -> Result<(), MonteError> {
        check_registration(function.name(), function.n_components(), self.contains(function.name()))?;
        self.analyses.insert(function.name.clone(), function);
        Ok(())
    }

    /// Builder-style [`register_sampler`](Self::register_sampler).
    pub fn with_sampler(mut self, function: StateSamplingFunction<C>) -> Result<Self, MonteError> {
        self.register_sampler(function)?;
        Ok(self)
    }

    /// Builder-style [`register_analysis`](Self::register_analysis).
    pub fn with_analysis(mut self, function: ResultsAnalysisFunction) -> Result<Self, MonteError> {
        self.register_analysis(function)?;
        Ok(self)
    }

    /// Looks up a sampling function.
    pub fn sampler(&self, name: &str) -> Option<&StateSamplingFunction<C>> {
        self.samplers.get(name)
    }

    /// Looks up an analysis function.
    pub fn analysis(&self, name: &str) -> Option<&ResultsAnalysisFunction> {
        self.analyses.get(name)
    }

    /// Sampling function names in registration order.
    pub fn sampler_names(&self) -> impl Iterator<Item = &str> {
        self.samplers.keys().map(String::as_str)
    }

    /// True when the name is taken by either kind of function.
    pub fn contains(&self, name: &str) -> bool {
        self.samplers.contains_key(name) || self.analyses.contains_key(name)
    }
}

fn check_registration(name: &str, n_components: usize, taken: bool) -> Result<(), MonteError> {
    if name.is_empty() {
        return Err(MonteError::Config(ErrorInfo::new(
            "empty-function-name",
            "function names must be non-empty",
        )));
    }
    if taken {
        return Err(MonteError::Config(
            ErrorInfo::new("duplicate-function", "function name already registered")
                .with_context("name", name.to_string()),
        ));
    }
    if n_components == 0 {
        return Err(MonteError::Config(
            ErrorInfo::new("empty-function-output", "functions must declare at least one component")
                .with_context("name", name.to_string()),
        ));
    }
    Ok(())
}
