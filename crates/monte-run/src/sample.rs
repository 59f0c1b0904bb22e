use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Counter values at the moment a sample was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SampleTag {
    /// Total elementary steps.
    pub step: u64,
    /// Completed passes.
    pub pass: u64,
    /// Simulated time.
    pub time: f64,
}

/// Append-only observations of one sampling function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Names of the vector components.
    pub component_names: Vec<String>,
    /// Observations ordered by sample index.
    pub values: Vec<Vec<f64>>,
}

impl Sample {
    /// Creates an empty sample for vectors with the given component names.
    pub fn new(component_names: Vec<String>) -> Self {
        Self {
            component_names,
            values: Vec::new(),
        }
    }

    /// Vector length of every observation.
    pub fn n_components(&self) -> usize {
        self.component_names.len()
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True before the first observation.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends an observation. The caller guarantees the length.
    pub(crate) fn push(&mut self, value: Vec<f64>) {
        debug_assert_eq!(value.len(), self.n_components());
        self.values.push(value);
    }

    /// Returns the series of one component.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.values.iter().map(|value| value[index]).collect()
    }

    /// Index of a named component.
    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.component_names.iter().position(|candidate| candidate == name)
    }
}

/// Samples of every function sampled by one fixture, with shared tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SampleSet {
    /// Observations keyed by sampling function name, in sampling order.
    pub samples: IndexMap<String, Sample>,
    /// Counter values for each sample index.
    pub tags: Vec<SampleTag>,
}

impl SampleSet {
    /// Number of samples taken.
    pub fn n_samples(&self) -> usize {
        self.tags.len()
    }

    /// Observations of one function.
    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.samples.get(name)
    }
}
