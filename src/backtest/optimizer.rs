//! Genetic parameter search.
//!
//! Evolves a population of strategy parameter sets over the same games.
//! Each generation keeps its elites unchanged, picks parents by tournament,
//! and breeds the rest with single-point crossover and resampling mutation.
//! Fitness is `Statistics::metric` (lower is better) and is memoised per
//! parameter set, so an individual is only simulated once.

use anyhow::{Context, Result};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::runner::Simulator;
use super::sweep::apply;
use crate::config::{OptimizerConfig, SimulationConfig};
use crate::strategy::martingale::{Martingale, StrategyConfig, BASE_BET, PAYOUT, WAIT_NUM};
use crate::types::{CrashError, GameResult};

/// Size of the leaderboard kept across generations.
pub const TOP_RESULTS: usize = 5;

/// Share of the log-range the payout space samples over.
const PAYOUT_LOG_SCALE: f64 = 0.99;

// ---------------------------------------------------------------------------
// Search space
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchSpace {
    /// Uniform over `[min, max]`.
    Continuous { min: f64, max: f64 },
    /// Uniform over the integers in `[min, max]`.
    Integer { min: i64, max: i64 },
    /// Log-uniform cash-out target, denser near `min`.
    Payout { min: f64, max: f64 },
    /// One of a fixed set of values.
    Choice { values: Vec<f64> },
}

impl SearchSpace {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            SearchSpace::Continuous { min, max } => rng.gen_range(*min..=*max),
            SearchSpace::Integer { min, max } => rng.gen_range(*min..=*max) as f64,
            SearchSpace::Payout { min, max } => {
                let u: f64 = rng.gen();
                let span = PAYOUT_LOG_SCALE * (max.ln() - min.ln());
                (u * span + PAYOUT_LOG_SCALE * min.ln()).exp().clamp(*min, *max)
            }
            SearchSpace::Choice { values } => values.choose(rng).copied().unwrap_or_default(),
        }
    }

    /// Snap a sampled value to the precision the search works at.
    fn round(&self, value: f64) -> f64 {
        match self {
            SearchSpace::Continuous { .. } | SearchSpace::Payout { .. } => {
                (value * 100.0).round() / 100.0
            }
            _ => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchParam {
    pub key: String,
    pub space: SearchSpace,
}

impl SearchParam {
    pub fn new(key: &str, space: SearchSpace) -> Result<Self, CrashError> {
        if ![BASE_BET, PAYOUT, WAIT_NUM].contains(&key) {
            return Err(CrashError::InvalidRange(format!("unknown parameter `{key}`")));
        }
        let bounded = |min: f64, max: f64| {
            if !(min.is_finite() && max.is_finite()) {
                Err(CrashError::InvalidRange(format!("{key}: bounds must be finite")))
            } else if min > max {
                Err(CrashError::InvalidRange(format!("{key}: min {min} exceeds max {max}")))
            } else {
                Ok(())
            }
        };
        match &space {
            SearchSpace::Continuous { min, max } => bounded(*min, *max)?,
            SearchSpace::Integer { min, max } => bounded(*min as f64, *max as f64)?,
            SearchSpace::Payout { min, max } => {
                bounded(*min, *max)?;
                if *min <= 0.0 {
                    return Err(CrashError::InvalidRange(format!(
                        "{key}: payout space needs a positive min"
                    )));
                }
            }
            SearchSpace::Choice { values } => {
                if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
                    return Err(CrashError::InvalidRange(format!(
                        "{key}: choices must be a non-empty list of numbers"
                    )));
                }
            }
        }
        Ok(Self {
            key: key.to_string(),
            space,
        })
    }
}

impl FromStr for SearchParam {
    type Err = CrashError;

    /// Parse `key:kind:values`, e.g. `payout:payout:1.5,10`,
    /// `waitNum:integer:0,8` or `baseBet:choice:100,200,500`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(key), Some(kind), Some(values)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CrashError::InvalidRange(format!(
                "expected key:kind:values, got `{s}`"
            )));
        };
        let key = key.trim();

        let numbers: Vec<f64> = values
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| CrashError::InvalidRange(format!("{key}: {e}")))?;

        let space = match (kind.trim(), numbers.as_slice()) {
            ("continuous", [min, max]) => SearchSpace::Continuous { min: *min, max: *max },
            ("integer", [min, max]) => SearchSpace::Integer {
                min: min.round() as i64,
                max: max.round() as i64,
            },
            ("payout", [min, max]) => SearchSpace::Payout { min: *min, max: *max },
            ("choice", _) => SearchSpace::Choice {
                values: numbers.clone(),
            },
            ("continuous" | "integer" | "payout", _) => {
                return Err(CrashError::InvalidRange(format!(
                    "{key}: expected two values min,max"
                )));
            }
            (other, _) => {
                return Err(CrashError::InvalidRange(format!(
                    "{key}: unknown space `{other}`"
                )));
            }
        };
        Self::new(key, space)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedParams {
    /// 1-based, best first.
    pub rank: usize,
    pub params: Vec<(String, f64)>,
    pub metric: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub best_metric: f64,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    /// Simulations run so far, across all generations.
    pub simulations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizeReport {
    pub best_params: Vec<(String, f64)>,
    pub best_metric: f64,
    /// Distinct parameter sets with the lowest metric, best first.
    pub top: Vec<RankedParams>,
    pub generations: Vec<GenerationSummary>,
    pub simulations: usize,
}

struct Leaderboard {
    seen: HashSet<ParamKey>,
    entries: Vec<RankedParams>,
}

impl Leaderboard {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    fn offer(&mut self, key: ParamKey, params: Vec<(String, f64)>, metric: f64) {
        if !metric.is_finite() || !self.seen.insert(key) {
            return;
        }
        self.entries.push(RankedParams {
            rank: 0,
            params,
            metric,
        });
        self.entries.sort_by(|a, b| a.metric.total_cmp(&b.metric));
        self.entries.truncate(TOP_RESULTS);
    }

    fn into_ranked(self) -> Vec<RankedParams> {
        self.entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| RankedParams { rank: i + 1, ..entry })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Parameter values in `SearchParam` order.
type Individual = Vec<f64>;

/// Hashable identity of an individual.
type ParamKey = Vec<u64>;

fn key_of(individual: &[f64]) -> ParamKey {
    individual.iter().map(|v| v.to_bits()).collect()
}

pub struct Optimizer {
    sim_config: SimulationConfig,
    base: StrategyConfig,
    params: Vec<SearchParam>,
    settings: OptimizerConfig,
    games: Arc<[GameResult]>,
    rng: StdRng,
    evaluated: HashMap<ParamKey, f64>,
    simulations: usize,
}

impl Optimizer {
    pub fn new(
        sim_config: SimulationConfig,
        base: StrategyConfig,
        params: Vec<SearchParam>,
        settings: OptimizerConfig,
        games: Arc<[GameResult]>,
    ) -> Result<Self, CrashError> {
        settings.validate()?;
        if params.is_empty() {
            return Err(CrashError::InvalidConfig("no parameters to optimize".into()));
        }
        let mut keys = HashSet::new();
        if let Some(dup) = params.iter().find(|p| !keys.insert(p.key.as_str())) {
            return Err(CrashError::InvalidConfig(format!(
                "parameter `{}` given twice",
                dup.key
            )));
        }

        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            sim_config,
            base,
            params,
            settings,
            games,
            rng,
            evaluated: HashMap::new(),
            simulations: 0,
        })
    }

    /// Simulations actually run (memoised parameter sets excluded).
    pub fn simulations(&self) -> usize {
        self.simulations
    }

    fn named(&self, individual: &[f64]) -> Vec<(String, f64)> {
        self.params
            .iter()
            .zip(individual)
            .map(|(p, v)| (p.key.clone(), *v))
            .collect()
    }

    fn sample_individual(&mut self) -> Individual {
        self.params
            .iter()
            .map(|p| p.space.sample(&mut self.rng))
            .collect()
    }

    /// Round every individual in place and return its metric, simulating
    /// only parameter sets not seen before. Failed runs score infinity.
    async fn evaluate(&mut self, population: &mut [Individual]) -> Result<Vec<f64>> {
        for individual in population.iter_mut() {
            for (value, param) in individual.iter_mut().zip(&self.params) {
                *value = param.space.round(*value);
            }
        }

        let mut queued = HashSet::new();
        let mut handles = Vec::new();
        for individual in population.iter() {
            let key = key_of(individual);
            if self.evaluated.contains_key(&key) || !queued.insert(key.clone()) {
                continue;
            }

            let params = self.named(individual);
            let config = match apply(&self.base, &params) {
                Ok(cfg) => cfg,
                Err(e) => {
                    debug!(?params, error = %e, "Invalid individual");
                    self.evaluated.insert(key, f64::INFINITY);
                    continue;
                }
            };

            let sim = Simulator::new(self.sim_config.clone());
            let games = Arc::clone(&self.games);
            handles.push(tokio::task::spawn_blocking(move || {
                let mut strategy = Martingale::new(config);
                (key, params, sim.run(&mut strategy, &games))
            }));
        }

        self.simulations += handles.len();
        for joined in join_all(handles).await {
            let (key, params, result) = joined.context("Optimizer task panicked")?;
            let metric = match result {
                Ok(run) => run.statistics.metric(),
                Err(e) => {
                    warn!(?params, error = %e, "Individual failed");
                    f64::INFINITY
                }
            };
            self.evaluated.insert(key, metric);
        }

        Ok(population
            .iter()
            .map(|ind| {
                self.evaluated
                    .get(&key_of(ind))
                    .copied()
                    .unwrap_or(f64::INFINITY)
            })
            .collect())
    }

    fn tournament(
        &mut self,
        population: &[Individual],
        fitness: &[f64],
        count: usize,
    ) -> Vec<Individual> {
        let size = self.settings.tournament_size.min(population.len());
        (0..count)
            .map(|_| {
                let winner = index::sample(&mut self.rng, population.len(), size)
                    .into_iter()
                    .min_by(|&a, &b| fitness[a].total_cmp(&fitness[b]))
                    .unwrap_or(0);
                population[winner].clone()
            })
            .collect()
    }

    fn crossover(&mut self, a: &[f64], b: &[f64], rate: f64) -> (Individual, Individual) {
        if a.len() < 2 || self.rng.gen::<f64>() >= rate {
            return (a.to_vec(), b.to_vec());
        }
        let point = self.rng.gen_range(1..a.len());
        let first = a[..point].iter().chain(&b[point..]).copied().collect();
        let second = b[..point].iter().chain(&a[point..]).copied().collect();
        (first, second)
    }

    fn mutate(&mut self, individual: &mut Individual, rate: f64) {
        for (value, param) in individual.iter_mut().zip(&self.params) {
            if self.rng.gen::<f64>() < rate {
                *value = param.space.sample(&mut self.rng);
            }
        }
    }

    fn next_generation(
        &mut self,
        population: &[Individual],
        fitness: &[f64],
        mutation_rate: f64,
        crossover_rate: f64,
    ) -> Vec<Individual> {
        let size = population.len();
        let mut order: Vec<usize> = (0..size).collect();
        order.sort_by(|&a, &b| fitness[a].total_cmp(&fitness[b]));

        let elite = self.settings.elite_size.min(size);
        let mut next: Vec<Individual> = order[..elite]
            .iter()
            .map(|&i| population[i].clone())
            .collect();

        let parents = self.tournament(population, fitness, size - elite);
        while next.len() < size {
            let (Some(a), Some(b)) = (
                parents.choose(&mut self.rng).cloned(),
                parents.choose(&mut self.rng).cloned(),
            ) else {
                break;
            };
            let (mut first, mut second) = self.crossover(&a, &b, crossover_rate);
            self.mutate(&mut first, mutation_rate);
            self.mutate(&mut second, mutation_rate);
            next.push(first);
            if next.len() < size {
                next.push(second);
            }
        }
        next
    }

    fn record(&self, board: &mut Leaderboard, population: &[Individual], fitness: &[f64]) {
        for (individual, metric) in population.iter().zip(fitness) {
            board.offer(key_of(individual), self.named(individual), *metric);
        }
    }

    /// Evolve for the configured number of generations.
    pub async fn run(&mut self) -> Result<OptimizeReport> {
        let generations = self.settings.generations;
        info!(
            params = self.params.len(),
            population = self.settings.population_size,
            generations,
            games = self.games.len(),
            "Starting optimizer"
        );

        let mut population: Vec<Individual> = (0..self.settings.population_size)
            .map(|_| self.sample_individual())
            .collect();
        let mut board = Leaderboard::new();
        let mut summaries = Vec::with_capacity(generations);

        for generation in 0..generations {
            let progress = generation as f64 / generations as f64;
            let s = &self.settings;
            let mutation_rate =
                s.max_mutation_rate - progress * (s.max_mutation_rate - s.min_mutation_rate);
            let crossover_rate =
                s.min_crossover_rate + progress * (s.max_crossover_rate - s.min_crossover_rate);

            let fitness = self.evaluate(&mut population).await?;
            self.record(&mut board, &population, &fitness);

            let best_metric = fitness.iter().copied().fold(f64::INFINITY, f64::min);
            debug!(generation, best_metric, simulations = self.simulations, "Generation evaluated");
            summaries.push(GenerationSummary {
                generation,
                best_metric,
                mutation_rate,
                crossover_rate,
                simulations: self.simulations,
            });

            population = self.next_generation(&population, &fitness, mutation_rate, crossover_rate);
        }

        let fitness = self.evaluate(&mut population).await?;
        self.record(&mut board, &population, &fitness);

        let best = (0..population.len())
            .min_by(|&a, &b| fitness[a].total_cmp(&fitness[b]))
            .unwrap_or(0);
        let report = OptimizeReport {
            best_params: population.get(best).map(|ind| self.named(ind)).unwrap_or_default(),
            best_metric: fitness.get(best).copied().unwrap_or(f64::INFINITY),
            top: board.into_ranked(),
            generations: summaries,
            simulations: self.simulations,
        };

        info!(
            best_metric = report.best_metric,
            best = ?report.best_params,
            simulations = report.simulations,
            "Optimizer complete"
        );
        Ok(report)
    }
}

/// Build an optimizer over `games` and run it to completion.
pub async fn run_optimizer(
    sim_config: &SimulationConfig,
    base: &StrategyConfig,
    params: Vec<SearchParam>,
    settings: &OptimizerConfig,
    games: Arc<[GameResult]>,
) -> Result<OptimizeReport> {
    let mut optimizer = Optimizer::new(
        sim_config.clone(),
        base.clone(),
        params,
        settings.clone(),
        games,
    )?;
    optimizer.run().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
