mod common;

use monte_core::State;
use monte_run::{trigger, SampleMethod, SampleMode, SamplingParams, SamplingScheduler};
use proptest::prelude::*;

use common::{ordered_chain, registry, temperature};

fn linear(mode: SampleMode, begin: f64, period: f64, samples_per_period: f64) -> SamplingParams {
    SamplingParams {
        sample_mode: mode,
        sample_method: SampleMethod::Linear,
        begin,
        period,
        samples_per_period,
        ..SamplingParams::default()
    }
}

fn log(mode: SampleMode, begin: f64, period: f64, samples_per_period: f64, shift: f64) -> SamplingParams {
    SamplingParams {
        sample_mode: mode,
        sample_method: SampleMethod::Log,
        begin,
        period,
        samples_per_period,
        shift,
        ..SamplingParams::default()
    }
}

#[test]
fn unit_linear_trigger_is_the_sample_index() {
    let params = linear(SampleMode::ByPass, 0.0, 1.0, 1.0);
    for n in 0..50 {
        assert_eq!(trigger(&params, n), n as f64);
    }
}

#[test]
fn base_two_log_trigger_doubles() {
    let params = log(SampleMode::ByStep, 0.0, 2.0, 1.0, 0.0);
    for n in 0..20u32 {
        assert_eq!(trigger(&params, n as u64), 2f64.powi(n as i32));
    }
}

#[test]
fn count_modes_round_and_time_mode_does_not() {
    let by_pass = linear(SampleMode::ByPass, 0.0, 1.0, 3.0);
    let rounded: Vec<f64> = (0..7).map(|n| trigger(&by_pass, n)).collect();
    assert_eq!(rounded, vec![0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0]);

    let by_time = linear(SampleMode::ByTime, 0.5, 1.0, 4.0);
    assert_eq!(trigger(&by_time, 1), 0.75);
    assert_eq!(trigger(&by_time, 3), 1.25);
}

#[test]
fn log_shift_offsets_the_exponent() {
    let params = log(SampleMode::ByTime, 1.0, 10.0, 2.0, 2.0);
    assert!((trigger(&params, 0) - 11.0).abs() < 1e-12);
    assert!((trigger(&params, 2) - 101.0).abs() < 1e-9);
}

#[test]
fn log_sampling_rejects_period_not_above_one() {
    let params = log(SampleMode::ByStep, 0.0, 1.0, 1.0, 0.0);
    let err = params.validate("fixtures.main.sampling").unwrap_err();
    assert_eq!(err.info().code, "invalid-period");
    assert_eq!(
        err.info().context.get("field").map(String::as_str),
        Some("fixtures.main.sampling.period")
    );
}

#[test]
fn scheduler_samples_on_the_linear_grid() {
    let registry = registry();
    let mut params = linear(SampleMode::ByStep, 4.0, 3.0, 1.0);
    params.sampler_names = vec!["energy".to_string()];
    params.do_sample_trajectory = true;
    let mut scheduler = SamplingScheduler::new(params, &registry, "sampling").unwrap();
    scheduler.reset(10);
    let state = State::new(ordered_chain(10), temperature(1.0));

    for _ in 0..20 {
        scheduler.advance(1);
        if scheduler.due() {
            scheduler.sample(&state).unwrap();
        }
    }

    let steps: Vec<u64> = scheduler.data().tags.iter().map(|tag| tag.step).collect();
    assert_eq!(steps, vec![4, 7, 10, 13, 16, 19]);
    assert_eq!(scheduler.n_samples(), 6);
    assert_eq!(scheduler.trajectory().len(), 6);
    assert_eq!(scheduler.pass_count(), 2);
    assert_eq!(scheduler.data().get("energy").unwrap().values[0], vec![-10.0]);
}

#[test]
fn pass_mode_counts_whole_passes() {
    let registry = registry();
    let mut params = linear(SampleMode::ByPass, 1.0, 1.0, 1.0);
    params.sampler_names = vec!["magnetization".to_string()];
    let mut scheduler = SamplingScheduler::new(params, &registry, "sampling").unwrap();
    scheduler.reset(5);
    let state = State::new(ordered_chain(5), temperature(1.0));

    for _ in 0..25 {
        scheduler.advance(1);
        if scheduler.due() {
            scheduler.sample(&state).unwrap();
        }
    }

    let passes: Vec<u64> = scheduler.data().tags.iter().map(|tag| tag.pass).collect();
    assert_eq!(passes, vec![1, 2, 3, 4, 5]);
    assert!(scheduler.trajectory().is_empty());
}

#[test]
fn unknown_sampler_reports_its_field() {
    let registry = registry();
    let mut params = SamplingParams::default();
    params.sampler_names = vec!["energy".to_string(), "entropy".to_string()];
    let err = SamplingScheduler::new(params, &registry, "fixtures.main.sampling").unwrap_err();
    assert_eq!(err.info().code, "unknown-sampler");
    assert_eq!(
        err.info().context.get("field").map(String::as_str),
        Some("fixtures.main.sampling.sampler_names[1]")
    );
}

#[test]
fn scheduler_debug_lists_samplers_and_counters() {
    let registry = registry();
    let mut params = linear(SampleMode::ByStep, 0.0, 1.0, 1.0);
    params.sampler_names = vec!["energy".to_string(), "magnetization".to_string()];
    let mut scheduler = SamplingScheduler::new(params, &registry, "sampling").unwrap();
    scheduler.reset(4);
    scheduler.advance(3);
    let rendered = format!("{scheduler:?}");
    assert!(rendered.starts_with("SamplingScheduler"));
    assert!(rendered.contains("[\"energy\", \"magnetization\"]"));
    assert!(rendered.contains("step_count: 3"));
    assert!(rendered.contains("steps_per_pass: 4"));
}

#[test]
#[should_panic(expected = "before the next trigger")]
fn sampling_before_trigger_panics() {
    let registry = registry();
    let params = linear(SampleMode::ByStep, 5.0, 1.0, 1.0);
    let mut scheduler = SamplingScheduler::new(params, &registry, "sampling").unwrap();
    let state = State::new(ordered_chain(4), temperature(1.0));
    let _ = scheduler.sample(&state);
}

proptest! {
    #[test]
    fn linear_triggers_never_decrease(
        begin in 0.0f64..1e4,
        period in 1e-3f64..1e3,
        samples_per_period in 1e-3f64..1e3,
        n in 0u64..100_000,
    ) {
        for mode in [SampleMode::ByStep, SampleMode::ByPass, SampleMode::ByTime] {
            let params = linear(mode, begin, period, samples_per_period);
            prop_assert!(trigger(&params, n + 1) >= trigger(&params, n));
        }
    }

    #[test]
    fn log_triggers_never_decrease(
        begin in 0.0f64..1e3,
        period in 1.0001f64..10.0,
        samples_per_period in 1.0f64..50.0,
        shift in -5.0f64..5.0,
        n in 0u64..200,
    ) {
        for mode in [SampleMode::ByStep, SampleMode::ByPass, SampleMode::ByTime] {
            let params = log(mode, begin, period, samples_per_period, shift);
            prop_assert!(trigger(&params, n + 1) >= trigger(&params, n));
        }
    }
}
