mod common;

use monte_core::RngHandle;
use monte_run::{
    CompletionCriterion, CutoffParams, FixtureSpec, MemorySink, RunManager, SampleMode,
    TerminationPolicy,
};
use monte_core::State;

use common::{ordered_chain, registry, temperature, IdleKernel, Spins};

fn by_step(label: &str, max_count: u64) -> FixtureSpec {
    let mut spec = FixtureSpec::new(label);
    spec.sampling.sample_mode = SampleMode::ByStep;
    spec.sampling.begin = 1.0;
    spec.sampling.sampler_names = vec!["energy".to_string()];
    spec.completion.cutoff = CutoffParams {
        max_count: Some(max_count),
        ..CutoffParams::default()
    };
    spec
}

fn manager(policy: TerminationPolicy, sink: &MemorySink<Spins>) -> RunManager<Spins, RngHandle> {
    RunManager::new(RngHandle::from_seed(5), registry())
        .with_termination(policy)
        .with_fixture(by_step("short", 10), Box::new(sink.clone()))
        .unwrap()
        .with_fixture(by_step("long", 30), Box::new(sink.clone()))
        .unwrap()
}

#[test]
fn any_policy_stops_with_the_first_complete_fixture() {
    let sink = MemorySink::<Spins>::new();
    let mut manager = manager(TerminationPolicy::Any, &sink);
    let mut kernel = IdleKernel::new(4);
    let mut state = State::new(ordered_chain(4), temperature(1.0));
    let results = manager.run_state(0, &mut state, &mut kernel).unwrap();

    assert_eq!(kernel.steps, 10);
    assert_eq!(results[0].completion.criterion, CompletionCriterion::MaxCutoff);
    assert_eq!(results[0].completion.n_samples, 10);
    assert_eq!(results[1].completion.n_samples, 10);
    assert!(!results[1].completion.is_complete);
    assert_eq!(sink.len(), 2);
}

#[test]
fn all_policy_freezes_finished_fixtures() {
    let sink = MemorySink::<Spins>::new();
    let mut manager = manager(TerminationPolicy::All, &sink);
    let mut kernel = IdleKernel::new(4);
    let mut state = State::new(ordered_chain(4), temperature(1.0));
    let results = manager.run_state(0, &mut state, &mut kernel).unwrap();

    assert_eq!(kernel.steps, 30);
    assert_eq!(results[0].completion.n_samples, 10);
    assert_eq!(results[0].final_counters.step, 10);
    assert_eq!(results[1].completion.n_samples, 30);
    assert!(results.iter().all(|result| result.completion.is_complete));
    assert!(manager.fixtures().iter().all(|fixture| fixture.is_frozen()));
}

#[test]
fn no_fixtures_completes_without_stepping() {
    let mut manager: RunManager<Spins, RngHandle> = RunManager::new(RngHandle::from_seed(5), registry());
    let mut kernel = IdleKernel::new(4);
    let mut state = State::new(ordered_chain(4), temperature(1.0));
    let results = manager.run_state(0, &mut state, &mut kernel).unwrap();
    assert!(results.is_empty());
    assert_eq!(kernel.steps, 0);
}

#[test]
fn fixtures_complete_before_stepping_when_cutoffs_are_met() {
    let sink = MemorySink::<Spins>::new();
    let mut manager = RunManager::new(RngHandle::from_seed(5), registry())
        .with_fixture(by_step("empty", 0), Box::new(sink.clone()))
        .unwrap();
    let mut kernel = IdleKernel::new(4);
    let mut state = State::new(ordered_chain(4), temperature(1.0));
    let results = manager.run_state(0, &mut state, &mut kernel).unwrap();
    assert_eq!(kernel.steps, 0);
    assert_eq!(results[0].completion.criterion, CompletionCriterion::MaxCutoff);
}

#[test]
fn equilibration_fixtures_step_first_and_keep_nothing() {
    let sink = MemorySink::<Spins>::new();
    let mut equilibrate = FixtureSpec::new("equilibrate");
    equilibrate.sampling.sample_mode = SampleMode::ByStep;
    equilibrate.completion.cutoff.max_sample = Some(7);
    let mut manager = RunManager::new(RngHandle::from_seed(5), registry())
        .with_fixture(by_step("main", 5), Box::new(sink.clone()))
        .unwrap();
    manager.add_before_each_run(equilibrate).unwrap();

    let mut kernel = IdleKernel::new(4);
    let mut state = State::new(ordered_chain(4), temperature(1.0));
    manager.run_state(0, &mut state, &mut kernel).unwrap();
    assert_eq!(kernel.steps, 12);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.results()[0].final_counters.step, 5);
}
