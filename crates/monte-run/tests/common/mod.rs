#![allow(dead_code)]

use std::sync::Arc;

use monte_core::errors::ErrorInfo;
use monte_core::{Conditions, MonteError, RandomEngine, State, StepOutcome, StochasticKernel};
use monte_run::statistics::covariance;
use monte_run::{FunctionRegistry, ResultsAnalysisFunction, StateSamplingFunction};

pub type Spins = Vec<i8>;

/// Periodic Ising chain with unit coupling, Metropolis single-spin flips.
#[derive(Debug, Default)]
pub struct IsingChain {
    pub prepared: usize,
}

impl StochasticKernel<Spins> for IsingChain {
    fn prepare(&mut self, state: &mut State<Spins>) -> Result<u64, MonteError> {
        if state.configuration.is_empty() {
            return Err(MonteError::Kernel(ErrorInfo::new("empty-chain", "no spins")));
        }
        self.prepared += 1;
        state
            .properties
            .insert_scalar("energy", energy(&state.configuration))?;
        Ok(state.configuration.len() as u64)
    }

    fn step<E: RandomEngine>(
        &mut self,
        state: &mut State<Spins>,
        engine: &mut E,
    ) -> Result<StepOutcome, MonteError> {
        let temperature = state.conditions.scalar("temperature").ok_or_else(|| {
            MonteError::Kernel(ErrorInfo::new("missing-temperature", "temperature not set"))
        })?;
        let spins = &mut state.configuration;
        let n = spins.len();
        let site = engine.index(n);
        let neighbours = spins[(site + n - 1) % n] as f64 + spins[(site + 1) % n] as f64;
        let delta = 2.0 * spins[site] as f64 * neighbours;
        if delta <= 0.0 || engine.uniform() < (-delta / temperature).exp() {
            spins[site] = -spins[site];
            let updated = state.properties.scalar("energy").unwrap_or(0.0) + delta;
            state.properties.insert_scalar("energy", updated)?;
        }
        Ok(StepOutcome::single())
    }
}

/// Kernel that never changes the configuration and advances time by `dt`.
#[derive(Debug)]
pub struct IdleKernel {
    pub steps_per_pass: u64,
    pub dt: f64,
    pub steps: u64,
}

impl IdleKernel {
    pub fn new(steps_per_pass: u64) -> Self {
        Self {
            steps_per_pass,
            dt: 0.0,
            steps: 0,
        }
    }
}

impl StochasticKernel<Spins> for IdleKernel {
    fn prepare(&mut self, _state: &mut State<Spins>) -> Result<u64, MonteError> {
        Ok(self.steps_per_pass)
    }

    fn step<E: RandomEngine>(
        &mut self,
        _state: &mut State<Spins>,
        _engine: &mut E,
    ) -> Result<StepOutcome, MonteError> {
        self.steps += 1;
        Ok(StepOutcome::timed(self.dt))
    }
}

pub fn energy(spins: &[i8]) -> f64 {
    let n = spins.len();
    -(0..n)
        .map(|i| spins[i] as f64 * spins[(i + 1) % n] as f64)
        .sum::<f64>()
}

pub fn magnetization(spins: &[i8]) -> f64 {
    spins.iter().map(|&s| s as f64).sum::<f64>() / spins.len() as f64
}

pub fn temperature(value: f64) -> Conditions {
    Conditions::new().with_scalar("temperature", value).unwrap()
}

pub fn ordered_chain(n: usize) -> Spins {
    vec![1; n]
}

pub fn registry() -> Arc<FunctionRegistry<Spins>> {
    let registry = FunctionRegistry::new()
        .with_sampler(
            StateSamplingFunction::new("energy", "chain energy", 1, |state: &State<Spins>| {
                vec![energy(&state.configuration)]
            }),
        )
        .unwrap()
        .with_sampler(
            StateSamplingFunction::new(
                "magnetization",
                "mean spin and its absolute value",
                2,
                |state: &State<Spins>| {
                    let m = magnetization(&state.configuration);
                    vec![m, m.abs()]
                },
            )
            .with_component_names(vec!["m".to_string(), "abs_m".to_string()]),
        )
        .unwrap()
        .with_sampler(StateSamplingFunction::new(
            "temperature",
            "temperature condition",
            1,
            |state: &State<Spins>| vec![state.conditions.scalar("temperature").unwrap_or(f64::NAN)],
        ))
        .unwrap()
        .with_analysis(ResultsAnalysisFunction::new(
            "energy_variance",
            "population variance of the energy",
            1,
            |samples| {
                let series = samples
                    .get("energy")
                    .map(|sample| sample.component(0))
                    .unwrap_or_default();
                vec![covariance(&series, &series)]
            },
        ))
        .unwrap();
    Arc::new(registry)
}

pub fn init_logging() {
    let _ = simplelog::SimpleLogger::init(simplelog::LevelFilter::Debug, simplelog::Config::default());
}
