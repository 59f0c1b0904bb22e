mod common;

use std::sync::{Arc, Mutex};

use monte_core::{MonteError, RngHandle, State, StochasticKernel};
use monte_run::{
    CutoffParams, FixtureSpec, IncrementalParams, MemorySink, RunDataOutputParams, RunManager,
    StateGenerator,
};

use common::{ordered_chain, registry, temperature, IsingChain, Spins};

fn sweep(dependent_runs: bool) -> IncrementalParams {
    IncrementalParams {
        initial_conditions: temperature(2.0),
        conditions_increment: temperature(0.5),
        n_states: 4,
        dependent_runs,
    }
}

fn fixed_length_fixture() -> FixtureSpec {
    let mut spec = FixtureSpec::new("thermo");
    spec.sampling.sampler_names = vec!["energy".to_string()];
    spec.completion.cutoff = CutoffParams {
        max_count: Some(25),
        ..CutoffParams::default()
    };
    spec
}

/// Records the configuration each state starts from.
struct Recording {
    inner: IsingChain,
    starts: Arc<Mutex<Vec<Spins>>>,
}

impl StochasticKernel<Spins> for Recording {
    fn prepare(&mut self, state: &mut State<Spins>) -> Result<u64, MonteError> {
        self.starts.lock().unwrap().push(state.configuration.clone());
        self.inner.prepare(state)
    }

    fn step<E: monte_core::RandomEngine>(
        &mut self,
        state: &mut State<Spins>,
        engine: &mut E,
    ) -> Result<monte_core::StepOutcome, MonteError> {
        self.inner.step(state, engine)
    }
}

#[test]
fn dependent_states_start_from_the_previous_final_configuration() {
    let output = RunDataOutputParams {
        save_all_initial_states: true,
        save_all_final_states: true,
        ..RunDataOutputParams::default()
    };
    let mut generator = StateGenerator::incremental(sweep(true), ordered_chain(16))
        .unwrap()
        .with_output(output);
    let sink = MemorySink::<Spins>::new();
    let mut manager = RunManager::new(RngHandle::from_seed(11), registry())
        .with_fixture(fixed_length_fixture(), Box::new(sink.clone()))
        .unwrap();
    let starts = Arc::new(Mutex::new(Vec::new()));
    let mut kernel = Recording {
        inner: IsingChain::default(),
        starts: Arc::clone(&starts),
    };

    let summary = manager.run_series(&mut generator, &mut kernel).unwrap();
    assert_eq!(summary.n_states_run, 4);
    assert_eq!(summary.n_states_skipped, 0);

    let runs = &summary.completed_runs;
    let starts = starts.lock().unwrap();
    assert_eq!(starts[0], ordered_chain(16));
    for i in 1..runs.len() {
        assert!(runs[i].dependent);
        assert_eq!(runs[i].initial_configuration, runs[i - 1].final_configuration);
        assert_eq!(Some(&starts[i]), runs[i - 1].final_configuration.as_ref());
    }
    assert!(!runs[0].dependent);
    assert_eq!(sink.len(), 4);
}

#[test]
fn independent_states_all_start_from_the_initial_configuration() {
    let mut generator = StateGenerator::incremental(sweep(false), ordered_chain(16)).unwrap();
    let mut manager = RunManager::new(RngHandle::from_seed(11), registry())
        .with_fixture(fixed_length_fixture(), Box::new(MemorySink::<Spins>::new()))
        .unwrap();
    let starts = Arc::new(Mutex::new(Vec::new()));
    let mut kernel = Recording {
        inner: IsingChain::default(),
        starts: Arc::clone(&starts),
    };
    manager.run_series(&mut generator, &mut kernel).unwrap();
    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 4);
    assert!(starts.iter().all(|start| *start == ordered_chain(16)));
}

#[test]
fn dependent_runs_fail_when_the_final_configuration_was_dropped() {
    let output = RunDataOutputParams {
        save_last_final_state: false,
        ..RunDataOutputParams::default()
    };
    let mut generator = StateGenerator::incremental(sweep(true), ordered_chain(8))
        .unwrap()
        .with_output(output);
    let mut manager = RunManager::new(RngHandle::from_seed(3), registry())
        .with_fixture(fixed_length_fixture(), Box::new(MemorySink::<Spins>::new()))
        .unwrap();
    let err = manager
        .run_series(&mut generator, &mut IsingChain::default())
        .unwrap_err();
    assert_eq!(err.info().code, "missing-final-configuration");
    assert_eq!(generator.n_completed_runs(), 1);
}

#[test]
fn dependent_conditions_see_the_seeded_state_and_modifiers_run_last() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let dep_calls = Arc::clone(&calls);
    let mod_calls = Arc::clone(&calls);
    let mut generator = StateGenerator::incremental(sweep(true), ordered_chain(4))
        .unwrap()
        .with_dependent_condition("magnetization", move |state: &State<Spins>| {
            // Runs after the increment and after configuration seeding.
            dep_calls
                .lock()
                .unwrap()
                .push(format!("dependent T={}", state.conditions.scalar("temperature").unwrap()));
            vec![common::magnetization(&state.configuration)]
        })
        .with_modifier("double_temperature", move |state: &mut State<Spins>| {
            let t = state.conditions.scalar("temperature").unwrap();
            mod_calls.lock().unwrap().push(format!(
                "modifier m={}",
                state.conditions.scalar("magnetization").unwrap()
            ));
            state.conditions.insert_scalar("temperature", 2.0 * t)
        });

    let first = generator.next_state().unwrap().unwrap();
    assert_eq!(first.conditions.scalar("magnetization"), Some(1.0));
    assert_eq!(first.conditions.scalar("temperature"), Some(4.0));

    generator
        .append(monte_run::RunData {
            state_index: 0,
            conditions: first.conditions.clone(),
            dependent: false,
            initial_configuration: None,
            final_configuration: Some(vec![1, -1, -1, -1]),
            completion: Default::default(),
        })
        .unwrap();
    let second = generator.next_state().unwrap().unwrap();
    assert_eq!(second.conditions.scalar("magnetization"), Some(-0.5));
    assert_eq!(second.conditions.scalar("temperature"), Some(5.0));

    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![
            "dependent T=2".to_string(),
            "modifier m=1".to_string(),
            "dependent T=2.5".to_string(),
            "modifier m=-0.5".to_string(),
        ]
    );
}
