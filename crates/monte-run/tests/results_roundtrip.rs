mod common;

use monte_core::{RngHandle, State};
use monte_run::completion::PrecisionDiagnostic;
use monte_run::{
    CompletionCriterion, CutoffParams, FixtureSpec, JsonResultsSink, MemorySink, PrecisionTarget,
    Results, ResultsOutputConfig, ResultsSink, RunData, RunManager, SeriesSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use common::{ordered_chain, registry, temperature, IsingChain, Spins};

fn fixture(dir: &std::path::Path, write_observations: bool) -> FixtureSpec {
    let mut spec = FixtureSpec::new("thermo");
    spec.sampling.sampler_names = vec!["energy".to_string(), "magnetization".to_string()];
    spec.sampling.do_sample_trajectory = true;
    spec.completion.cutoff = CutoffParams {
        min_count: Some(20),
        max_count: Some(60),
        ..CutoffParams::default()
    };
    spec.completion.requested_precision = vec![PrecisionTarget::abs("energy", 0.5)];
    spec.results = ResultsOutputConfig {
        output_dir: Some(dir.to_path_buf()),
        write_trajectory: true,
        write_observations,
    };
    spec.analysis_names = vec!["energy_variance".to_string()];
    spec
}

#[test]
fn results_read_back_equal_what_was_written() {
    let dir = tempfile::tempdir().unwrap();
    let spec = fixture(dir.path(), true);
    let sink = JsonResultsSink::<Spins>::from_config(&spec.results).unwrap();
    let mut manager = RunManager::new(RngHandle::from_seed(9), registry())
        .with_fixture(spec, Box::new(sink.clone()))
        .unwrap();

    let mut kernel = IsingChain::default();
    let mut written = Vec::new();
    for (index, t) in [1.0, 2.0].into_iter().enumerate() {
        let mut state = State::new(ordered_chain(10), temperature(t));
        written.extend(manager.run_state(index, &mut state, &mut kernel).unwrap());
    }

    for result in &written {
        let read = sink.read(result.state_index).unwrap();
        assert_eq!(&read, result);
        assert_eq!(read.trajectory.len(), read.data.n_samples());
        assert_eq!(read.analysis["energy_variance"].len(), 1);
    }

    let summary = sink.read_summary().unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[1].state_index, 1);
    assert_eq!(summary[0].means, written[0].means());
    assert!(summary
        .iter()
        .all(|entry| entry.criterion != CompletionCriterion::MinPending));
    assert!(dir.path().join("run.0").join("trajectory.json").exists());
}

#[test]
fn observations_can_be_left_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = JsonResultsSink::<Spins>::new(dir.path(), false, false);
    let spec = fixture(dir.path(), false);
    let mut manager = RunManager::new(RngHandle::from_seed(9), registry())
        .with_fixture(spec, Box::new(monte_run::DiscardSink))
        .unwrap();
    let mut state = State::new(ordered_chain(10), temperature(1.0));
    let results = manager
        .run_state(0, &mut state, &mut IsingChain::default())
        .unwrap();
    sink.write(&results[0]).unwrap();

    let read = sink.read(0).unwrap();
    assert!(read.data.get("energy").unwrap().is_empty());
    assert_eq!(read.data.n_samples(), 0);
    assert!(read.trajectory.is_empty());
    assert_eq!(read.completion, results[0].completion);
    assert!(!dir.path().join("run.0").join("trajectory.json").exists());
    assert_eq!(sink.read_summary().unwrap()[0].means, results[0].means());
}

#[test]
fn non_finite_diagnostics_survive_json() {
    let diagnostic = PrecisionDiagnostic {
        sampler: "energy".to_string(),
        component: 0,
        component_name: "0".to_string(),
        mean: 1.25,
        half_width: f64::INFINITY,
        requested_abs: Some(0.1),
        requested_rel: None,
        within_precision: false,
    };
    let json = serde_json::to_string(&diagnostic).unwrap();
    assert!(json.contains("\"inf\""));
    let back: PrecisionDiagnostic = serde_json::from_str(&json).unwrap();
    assert_eq!(back, diagnostic);

    let nan = PrecisionDiagnostic {
        mean: f64::NAN,
        ..diagnostic
    };
    let back: PrecisionDiagnostic = serde_json::from_str(&serde_json::to_string(&nan).unwrap()).unwrap();
    assert!(back.mean.is_nan());
}

/// Configuration type without a `Default` impl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Lattice {
    spins: Vec<i8>,
}

#[test]
fn records_without_configurations_read_back_for_any_configuration_type() {
    let conditions = serde_json::to_value(temperature(1.0)).unwrap();
    let run: RunData<Lattice> = serde_json::from_value(json!({
        "state_index": 0,
        "conditions": conditions,
        "dependent": false,
    }))
    .unwrap();
    assert_eq!(run.initial_configuration, None);
    assert_eq!(run.final_configuration, None);
    assert!(run.completion.is_empty());

    let summary: SeriesSummary<Lattice> = serde_json::from_value(json!({
        "n_states_run": 1,
        "n_states_skipped": 0,
        "completed_runs": [serde_json::to_value(&run).unwrap()],
    }))
    .unwrap();
    assert_eq!(summary.completed_runs, vec![run]);
}

#[test]
fn results_without_a_trajectory_read_back_for_any_configuration_type() {
    let mut spec = FixtureSpec::new("thermo");
    spec.sampling.sampler_names = vec!["energy".to_string()];
    spec.completion.cutoff.max_count = Some(5);
    let sink = MemorySink::<Spins>::new();
    let mut manager = RunManager::new(RngHandle::from_seed(3), registry())
        .with_fixture(spec, Box::new(sink.clone()))
        .unwrap();
    let mut state = State::new(ordered_chain(6), temperature(1.0));
    manager
        .run_state(0, &mut state, &mut IsingChain::default())
        .unwrap();

    let mut value = serde_json::to_value(&sink.results()[0]).unwrap();
    value.as_object_mut().unwrap().remove("trajectory");
    let read: Results<Lattice> = serde_json::from_value(value).unwrap();
    assert!(read.trajectory.is_empty());
    assert_eq!(read.completion.n_samples, 5);
}
