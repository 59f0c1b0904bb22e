use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info};
use monte_core::errors::ErrorInfo;
use monte_core::{Conditions, MonteError, State};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionCriterion;
use crate::config::{GeneratorConfig, IncrementalParams, RunConfig, RunDataOutputParams};
use crate::json::{read_json, write_json};

type DependentConditionFn<C> = dyn Fn(&State<C>) -> Vec<f64> + Send + Sync;
type StateModifierFn<C> = dyn Fn(&mut State<C>) -> Result<(), MonteError> + Send + Sync;

/// Record of one completed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunData<C> {
    /// Index of the state in the series.
    pub state_index: usize,
    /// Conditions the state was run at.
    pub conditions: Conditions,
    /// True when the state started from a previous state's final configuration.
    pub dependent: bool,
    /// Configuration at the start of the run, when retained.
    pub initial_configuration: Option<C>,
    /// Configuration at the end of the run, when retained.
    pub final_configuration: Option<C>,
    /// Deciding completion rule per fixture label.
    #[serde(default)]
    pub completion: IndexMap<String, CompletionCriterion>,
}

/// Ordered sequence of conditions visited by a series.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionsSequence {
    /// `initial + i * increment` for `i` in `0..n_states`.
    Incremental {
        /// Conditions of state 0.
        initial: Conditions,
        /// Change per state.
        increment: Conditions,
        /// Number of states.
        n_states: usize,
    },
    /// Explicit list of conditions.
    Fixed(Vec<Conditions>),
}

impl ConditionsSequence {
    /// Number of states in the sequence.
    pub fn n_states(&self) -> usize {
        match self {
            ConditionsSequence::Incremental { n_states, .. } => *n_states,
            ConditionsSequence::Fixed(conditions) => conditions.len(),
        }
    }

    /// Conditions of state `index`.
    pub fn conditions_at(&self, index: usize) -> Result<Conditions, MonteError> {
        match self {
            ConditionsSequence::Incremental {
                initial, increment, ..
            } => initial.incremented(increment, index),
            ConditionsSequence::Fixed(conditions) => conditions.get(index).cloned().ok_or_else(|| {
                MonteError::Generator(
                    ErrorInfo::new("state-out-of-range", "no conditions for the requested state")
                        .with_context("state_index", index.to_string()),
                )
            }),
        }
    }
}

#[derive(Serialize)]
struct CompletedRunsRef<'a, C> {
    completed_runs: &'a [RunData<C>],
}

#[derive(Deserialize)]
struct CompletedRunsFile<C> {
    completed_runs: Vec<RunData<C>>,
}

/// Produces the states of a series and keeps the record of completed runs.
///
/// Each call to [`next_state`](Self::next_state) assembles state `i`, where
/// `i` is the number of runs appended so far:
///
/// 1. conditions from the sequence (linear increment or fixed list);
/// 2. configuration: the final configuration of run `i - 1` with dependent
///    runs, otherwise the initial configuration;
/// 3. dependent conditions, evaluated on the assembled state in registration
///    order, overwrite their fields;
/// 4. state modifiers, in registration order.
pub struct StateGenerator<C> {
    sequence: ConditionsSequence,
    initial_configuration: C,
    dependent_runs: bool,
    output: RunDataOutputParams,
    dependent_conditions: Vec<(String, Arc<DependentConditionFn<C>>)>,
    modifiers: Vec<(String, Arc<StateModifierFn<C>>)>,
    completed: Vec<RunData<C>>,
}

impl<C: Clone> StateGenerator<C> {
    /// Linear path through conditions space.
    pub fn incremental(params: IncrementalParams, initial_configuration: C) -> Result<Self, MonteError> {
        if let Some(field) = params
            .initial_conditions
            .first_mismatch(&params.conditions_increment)
        {
            return Err(MonteError::Generator(
                ErrorInfo::new(
                    "increment-mismatch",
                    "increment names a field absent from (or shaped unlike) the initial conditions",
                )
                .with_context("field", format!("conditions_increment.{field}")),
            ));
        }
        Ok(Self::with_sequence(
            ConditionsSequence::Incremental {
                initial: params.initial_conditions,
                increment: params.conditions_increment,
                n_states: params.n_states,
            },
            params.dependent_runs,
            initial_configuration,
        ))
    }

    /// Explicit list of conditions.
    pub fn fixed(conditions: Vec<Conditions>, dependent_runs: bool, initial_configuration: C) -> Self {
        Self::with_sequence(
            ConditionsSequence::Fixed(conditions),
            dependent_runs,
            initial_configuration,
        )
    }

    /// Builds the generator selected by `config`.
    pub fn from_config(config: &GeneratorConfig, initial_configuration: C) -> Result<Self, MonteError> {
        match config {
            GeneratorConfig::Incremental(params) => Self::incremental(params.clone(), initial_configuration),
            GeneratorConfig::Fixed {
                conditions,
                dependent_runs,
            } => Ok(Self::fixed(conditions.clone(), *dependent_runs, initial_configuration)),
        }
    }

    /// Builds the generator of a full run configuration, with the
    /// completed-run retention and output directory it names.
    pub fn from_run_config(config: &RunConfig, initial_configuration: C) -> Result<Self, MonteError> {
        Ok(Self::from_config(&config.generator, initial_configuration)?.with_output(config.completed_runs.clone()))
    }

    fn with_sequence(sequence: ConditionsSequence, dependent_runs: bool, initial_configuration: C) -> Self {
        Self {
            sequence,
            initial_configuration,
            dependent_runs,
            output: RunDataOutputParams::default(),
            dependent_conditions: Vec::new(),
            modifiers: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Sets retention of initial and final configurations.
    pub fn with_output(mut self, output: RunDataOutputParams) -> Self {
        self.output = output;
        self
    }

    /// Registers a function whose value overwrites condition `name` on every
    /// generated state. Single-element outputs are stored as scalars unless
    /// the field already is a vector.
    pub fn with_dependent_condition<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&State<C>) -> Vec<f64> + Send + Sync + 'static,
    {
        self.dependent_conditions.push((name.into(), Arc::new(function)));
        self
    }

    /// Registers a modifier applied last to every generated state.
    pub fn with_modifier<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut State<C>) -> Result<(), MonteError> + Send + Sync + 'static,
    {
        self.modifiers.push((name.into(), Arc::new(function)));
        self
    }

    /// Assembles the next state, or `None` once the sequence is exhausted.
    pub fn next_state(&self) -> Result<Option<State<C>>, MonteError> {
        let index = self.completed.len();
        if index >= self.sequence.n_states() {
            return Ok(None);
        }
        let conditions = self.sequence.conditions_at(index)?;
        let configuration = self.seed_configuration(index)?;
        let mut state = State::new(configuration, conditions);

        for (name, function) in &self.dependent_conditions {
            let value = function(&state);
            let result = if value.len() == 1 && state.conditions.vector(name).is_none() {
                state.conditions.insert_scalar(name.clone(), value[0])
            } else {
                state.conditions.insert_vector(name.clone(), value)
            };
            result.map_err(|err| {
                err.with_context("dependent_condition", name.clone())
                    .with_context("state_index", index.to_string())
            })?;
        }
        for (name, modifier) in &self.modifiers {
            modifier(&mut state).map_err(|err| {
                err.with_context("modifier", name.clone())
                    .with_context("state_index", index.to_string())
            })?;
        }
        debug!("generated state {index} of {}", self.sequence.n_states());
        Ok(Some(state))
    }

    fn seed_configuration(&self, index: usize) -> Result<C, MonteError> {
        if !self.dependent_runs || index == 0 {
            return Ok(self.initial_configuration.clone());
        }
        self.completed
            .last()
            .and_then(|previous| previous.final_configuration.clone())
            .ok_or_else(|| {
                MonteError::Generator(
                    ErrorInfo::new(
                        "missing-final-configuration",
                        "dependent run needs the final configuration of the previous state",
                    )
                    .with_context("state_index", index.to_string())
                    .with_hint("enable save_last_final_state"),
                )
            })
    }

    /// Records a completed run, applying the configured retention rules.
    pub fn append(&mut self, mut run_data: RunData<C>) -> Result<(), MonteError> {
        let expected = self.completed.len();
        if run_data.state_index != expected {
            return Err(MonteError::Generator(
                ErrorInfo::new("out-of-order-run", "runs must be appended in state order")
                    .with_context("expected", expected.to_string())
                    .with_context("state_index", run_data.state_index.to_string()),
            ));
        }
        if !self.output.save_all_initial_states {
            run_data.initial_configuration = None;
        }
        if !self.output.save_all_final_states {
            if let Some(previous) = self.completed.last_mut() {
                previous.final_configuration = None;
            }
            if !self.output.save_last_final_state {
                run_data.final_configuration = None;
            }
        }
        self.completed.push(run_data);
        Ok(())
    }
}

impl<C> StateGenerator<C> {
    /// True once every state of the sequence has been appended.
    pub fn is_complete(&self) -> bool {
        self.completed.len() >= self.sequence.n_states()
    }

    /// Number of completed runs.
    pub fn n_completed_runs(&self) -> usize {
        self.completed.len()
    }

    /// Completed runs in state order.
    pub fn completed_runs(&self) -> &[RunData<C>] {
        &self.completed
    }

    /// Total number of states.
    pub fn n_states(&self) -> usize {
        self.sequence.n_states()
    }

    /// Whether states are seeded from the previous final configuration.
    pub fn dependent_runs(&self) -> bool {
        self.dependent_runs
    }

    /// Conditions sequence.
    pub fn sequence(&self) -> &ConditionsSequence {
        &self.sequence
    }

    /// Retention settings.
    pub fn output(&self) -> &RunDataOutputParams {
        &self.output
    }

    /// Path of the completed-runs file below `dir`.
    pub fn completed_runs_path(dir: &Path) -> PathBuf {
        dir.join("completed_runs.json")
    }
}

impl<C: Serialize> StateGenerator<C> {
    /// Writes `completed_runs.json` below `dir`.
    pub fn write_completed_runs(&self, dir: &Path) -> Result<(), MonteError> {
        let path = Self::completed_runs_path(dir);
        write_json(
            &path,
            &CompletedRunsRef {
                completed_runs: &self.completed,
            },
        )?;
        debug!("wrote {} completed runs to {}", self.completed.len(), path.display());
        Ok(())
    }
}

impl<C: DeserializeOwned> StateGenerator<C> {
    /// Replaces the completed runs with those stored below `dir`, so a series
    /// restarts after the last finished state. Returns the number loaded;
    /// zero when no file exists.
    pub fn read_completed_runs(&mut self, dir: &Path) -> Result<usize, MonteError> {
        let path = Self::completed_runs_path(dir);
        if !path.exists() {
            return Ok(0);
        }
        let file: CompletedRunsFile<C> = read_json(&path)?;
        for (index, run) in file.completed_runs.iter().enumerate() {
            let mismatch = || {
                MonteError::Generator(
                    ErrorInfo::new(
                        "completed-run-mismatch",
                        "stored run does not match the conditions sequence",
                    )
                    .with_context("path", path.display().to_string())
                    .with_context("state_index", index.to_string()),
                )
            };
            if run.state_index != index || index >= self.sequence.n_states() {
                return Err(mismatch());
            }
            // Dependent conditions legitimately differ from the sequence.
            let expected = self.sequence.conditions_at(index)?;
            let overwritten = |name: &str| self.dependent_conditions.iter().any(|(dep, _)| dep == name);
            let scalars_match = expected
                .scalars
                .iter()
                .filter(|(name, _)| !overwritten(name))
                .all(|(name, value)| run.conditions.scalar(name) == Some(*value));
            let vectors_match = expected
                .vectors
                .iter()
                .filter(|(name, _)| !overwritten(name))
                .all(|(name, value)| run.conditions.vector(name) == Some(value.as_slice()));
            if !(scalars_match && vectors_match) {
                return Err(mismatch());
            }
        }
        self.completed = file.completed_runs;
        info!(
            "restarting after {} completed runs from {}",
            self.completed.len(),
            path.display()
        );
        Ok(self.completed.len())
    }
}

impl<C> fmt::Debug for StateGenerator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateGenerator")
            .field("sequence", &self.sequence)
            .field("dependent_runs", &self.dependent_runs)
            .field("output", &self.output)
            .field(
                "dependent_conditions",
                &self.dependent_conditions.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field(
                "modifiers",
                &self.modifiers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("n_completed_runs", &self.completed.len())
            .finish()
    }
}
