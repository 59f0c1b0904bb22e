use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{info, warn};
use monte_core::{MonteError, RandomEngine, State, StochasticKernel};
use serde::{Deserialize, Serialize};

use crate::config::{FixtureSpec, RunConfig, SeedPolicy, TerminationPolicy};
use crate::determinism::{equilibration_seed, state_seed};
use crate::fixture::SamplingFixture;
use crate::functions::FunctionRegistry;
use crate::generator::{RunData, StateGenerator};
use crate::results::{DiscardSink, JsonResultsSink, Results, ResultsSink};

/// Outcome of [`RunManager::run_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary<C> {
    /// States run by this call.
    pub n_states_run: usize,
    /// States skipped because they were already completed.
    pub n_states_skipped: usize,
    /// Every completed run known to the generator, in state order.
    pub completed_runs: Vec<RunData<C>>,
}

/// Drives a stochastic kernel through states, sampling and checking
/// completion with every attached fixture.
pub struct RunManager<C, E> {
    engine: E,
    registry: Arc<FunctionRegistry<C>>,
    fixtures: Vec<SamplingFixture<C>>,
    before_first_run: Vec<SamplingFixture<C>>,
    before_each_run: Vec<SamplingFixture<C>>,
    termination: TerminationPolicy,
    seed_policy: SeedPolicy,
    first_run_done: bool,
}

impl<C, E> RunManager<C, E>
where
    C: Clone + Serialize + 'static,
    E: RandomEngine,
{
    /// Creates a manager without fixtures.
    pub fn new(engine: E, registry: Arc<FunctionRegistry<C>>) -> Self {
        Self {
            engine,
            registry,
            fixtures: Vec::new(),
            before_first_run: Vec::new(),
            before_each_run: Vec::new(),
            termination: TerminationPolicy::default(),
            seed_policy: SeedPolicy::default(),
            first_run_done: false,
        }
    }

    /// Builds a manager with every fixture of `config`. Fixtures with an
    /// output directory write JSON results; the others keep nothing beyond
    /// what [`run_state`](Self::run_state) returns. Two fixtures may not share
    /// an output directory.
    pub fn from_config(
        config: &RunConfig,
        engine: E,
        registry: Arc<FunctionRegistry<C>>,
    ) -> Result<Self, MonteError> {
        let mut manager = Self::new(engine, registry)
            .with_termination(config.termination)
            .with_seed_policy(config.seed_policy.clone());
        let mut output_dirs: Vec<&Path> = Vec::new();
        for spec in &config.fixtures {
            if let Some(dir) = spec.results.output_dir.as_deref() {
                if output_dirs.contains(&dir) {
                    return Err(MonteError::config(
                        "shared-output-dir",
                        "fixtures must write results to distinct output directories",
                        format!("fixtures.{}.results.output_dir", spec.label),
                    )
                    .with_context("output_dir", dir.display().to_string()));
                }
                output_dirs.push(dir);
            }
        }
        for spec in &config.fixtures {
            let sink: Box<dyn ResultsSink<C>> = match JsonResultsSink::<C>::from_config(&spec.results) {
                Some(sink) => Box::new(sink),
                None => Box::new(DiscardSink),
            };
            manager.add_fixture(spec.clone(), sink)?;
        }
        for spec in &config.before_first_run {
            manager.add_before_first_run(spec.clone())?;
        }
        for spec in &config.before_each_run {
            manager.add_before_each_run(spec.clone())?;
        }
        Ok(manager)
    }

    /// Sets the multi-fixture termination policy.
    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    /// Sets the seeding policy.
    pub fn with_seed_policy(mut self, seed_policy: SeedPolicy) -> Self {
        self.seed_policy = seed_policy;
        self
    }

    /// Attaches a main fixture writing to `sink`.
    pub fn add_fixture(&mut self, spec: FixtureSpec, sink: Box<dyn ResultsSink<C>>) -> Result<(), MonteError> {
        ensure_unique_label(&self.fixtures, &spec.label)?;
        let fixture = SamplingFixture::new(spec, &self.registry, sink)?;
        self.fixtures.push(fixture);
        Ok(())
    }

    /// Builder-style [`add_fixture`](Self::add_fixture).
    pub fn with_fixture(mut self, spec: FixtureSpec, sink: Box<dyn ResultsSink<C>>) -> Result<Self, MonteError> {
        self.add_fixture(spec, sink)?;
        Ok(self)
    }

    /// Attaches an equilibration fixture run once before the first state.
    pub fn add_before_first_run(&mut self, spec: FixtureSpec) -> Result<(), MonteError> {
        ensure_unique_label(&self.before_first_run, &spec.label)?;
        let fixture = SamplingFixture::new(spec, &self.registry, Box::new(DiscardSink))?;
        self.before_first_run.push(fixture);
        Ok(())
    }

    /// Attaches an equilibration fixture run before every state.
    pub fn add_before_each_run(&mut self, spec: FixtureSpec) -> Result<(), MonteError> {
        ensure_unique_label(&self.before_each_run, &spec.label)?;
        let fixture = SamplingFixture::new(spec, &self.registry, Box::new(DiscardSink))?;
        self.before_each_run.push(fixture);
        Ok(())
    }

    /// Main fixtures in attachment order.
    pub fn fixtures(&self) -> &[SamplingFixture<C>] {
        &self.fixtures
    }

    /// Random engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Termination policy in use.
    pub fn termination(&self) -> TerminationPolicy {
        self.termination
    }

    /// Runs one state to completion and returns the results of every main
    /// fixture. Errors carry the state index in their context.
    pub fn run_state<K: StochasticKernel<C>>(
        &mut self,
        state_index: usize,
        state: &mut State<C>,
        kernel: &mut K,
    ) -> Result<Vec<Results<C>>, MonteError> {
        self.run_state_inner(state_index, state, kernel)
            .map_err(|err| err.with_context("state_index", state_index.to_string()))
    }

    fn run_state_inner<K: StochasticKernel<C>>(
        &mut self,
        state_index: usize,
        state: &mut State<C>,
        kernel: &mut K,
    ) -> Result<Vec<Results<C>>, MonteError> {
        let master_seed = self.seed_policy.master_seed;
        let reseed = self.seed_policy.reseed_each_state;
        let steps_per_pass = kernel.prepare(state)?;

        let equilibrate_first = !self.first_run_done && !self.before_first_run.is_empty();
        if reseed && (equilibrate_first || !self.before_each_run.is_empty()) {
            self.engine.reseed(equilibration_seed(master_seed, state_index));
        }
        if equilibrate_first {
            info!("state {state_index}: equilibrating before the first run");
            run_fixtures(
                &mut self.before_first_run,
                self.termination,
                &mut self.engine,
                kernel,
                state,
                state_index,
                steps_per_pass,
            )?;
            for fixture in &mut self.before_first_run {
                fixture.finalize()?;
            }
        }
        self.first_run_done = true;
        if !self.before_each_run.is_empty() {
            info!("state {state_index}: equilibrating");
            run_fixtures(
                &mut self.before_each_run,
                self.termination,
                &mut self.engine,
                kernel,
                state,
                state_index,
                steps_per_pass,
            )?;
            for fixture in &mut self.before_each_run {
                fixture.finalize()?;
            }
        }

        if reseed {
            self.engine.reseed(state_seed(master_seed, state_index));
        }
        run_fixtures(
            &mut self.fixtures,
            self.termination,
            &mut self.engine,
            kernel,
            state,
            state_index,
            steps_per_pass,
        )?;
        let mut results = Vec::with_capacity(self.fixtures.len());
        for fixture in &mut self.fixtures {
            results.push(fixture.finalize()?);
        }
        Ok(results)
    }

    /// Runs every remaining state of `generator`, recording each completed
    /// run and persisting the record when the generator has an output
    /// directory. States already completed (e.g. read back with
    /// [`StateGenerator::read_completed_runs`]) are skipped.
    pub fn run_series<K: StochasticKernel<C>>(
        &mut self,
        generator: &mut StateGenerator<C>,
        kernel: &mut K,
    ) -> Result<SeriesSummary<C>, MonteError> {
        let n_states_skipped = generator.n_completed_runs();
        if n_states_skipped > 0 {
            info!("skipping {n_states_skipped} completed states");
        }
        let mut n_states_run = 0;
        while let Some(mut state) = generator.next_state()? {
            let state_index = generator.n_completed_runs();
            info!(
                "state {state_index}/{}: starting at {:?}",
                generator.n_states(),
                state.conditions
            );
            let initial_configuration = state.configuration.clone();
            let results = self.run_state(state_index, &mut state, kernel)?;
            let completion: IndexMap<_, _> = results
                .iter()
                .map(|result| (result.fixture_label.clone(), result.completion.criterion))
                .collect();
            info!("state {state_index}: finished ({completion:?})");
            let dependent = generator.dependent_runs() && state_index > 0;
            generator.append(RunData {
                state_index,
                conditions: state.conditions,
                dependent,
                initial_configuration: Some(initial_configuration),
                final_configuration: Some(state.configuration),
                completion,
            })?;
            if let Some(dir) = generator.output().output_dir.clone() {
                generator.write_completed_runs(&dir)?;
            }
            n_states_run += 1;
        }
        info!(
            "series finished: {n_states_run} states run, {n_states_skipped} skipped"
        );
        Ok(SeriesSummary {
            n_states_run,
            n_states_skipped,
            completed_runs: generator.completed_runs().to_vec(),
        })
    }
}

fn ensure_unique_label<C>(fixtures: &[SamplingFixture<C>], label: &str) -> Result<(), MonteError> {
    if fixtures.iter().any(|fixture| fixture.label() == label) {
        return Err(MonteError::config(
            "duplicate-fixture-label",
            "fixture labels must be unique",
            format!("fixtures.{label}"),
        ));
    }
    Ok(())
}

/// Steps the kernel until `policy` says the fixtures are done.
///
/// Completion is checked once before the first step, so fixtures whose
/// cutoffs are already met never step the kernel.
fn run_fixtures<C, E, K>(
    fixtures: &mut [SamplingFixture<C>],
    policy: TerminationPolicy,
    engine: &mut E,
    kernel: &mut K,
    state: &mut State<C>,
    state_index: usize,
    steps_per_pass: u64,
) -> Result<(), MonteError>
where
    C: Clone,
    E: RandomEngine,
    K: StochasticKernel<C>,
{
    if fixtures.is_empty() {
        warn!("state {state_index}: no sampling fixtures attached, run completes immediately");
        return Ok(());
    }
    for fixture in fixtures.iter_mut() {
        fixture.reset(state_index, &state.conditions, steps_per_pass);
    }
    let mut done = check_fixtures(fixtures, policy)?;
    while !done {
        let outcome = kernel.step(state, engine)?;
        for fixture in fixtures.iter_mut() {
            fixture.advance(state, outcome)?;
        }
        done = check_fixtures(fixtures, policy)?;
    }
    Ok(())
}

fn check_fixtures<C: Clone>(
    fixtures: &mut [SamplingFixture<C>],
    policy: TerminationPolicy,
) -> Result<bool, MonteError> {
    let mut any = false;
    let mut all = true;
    for fixture in fixtures.iter_mut() {
        if fixture.is_frozen() {
            any = true;
            continue;
        }
        let complete = fixture.check()?;
        any |= complete;
        all &= complete;
        if complete && policy == TerminationPolicy::All {
            fixture.freeze();
        }
    }
    Ok(match policy {
        TerminationPolicy::Any => any,
        TerminationPolicy::All => all,
    })
}

impl<C, E: fmt::Debug> fmt::Debug for RunManager<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunManager")
            .field("engine", &self.engine)
            .field("fixtures", &self.fixtures)
            .field("before_first_run", &self.before_first_run)
            .field("before_each_run", &self.before_each_run)
            .field("termination", &self.termination)
            .field("seed_policy", &self.seed_policy)
            .finish_non_exhaustive()
    }
}
