//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Strategy parameters are declared as descriptors (`type`, `label`,
//! `value`) keyed by parameter name; only `value` feeds the strategy.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::engine::history::DEFAULT_HISTORY_SIZE;
use crate::strategy::martingale::StrategyConfig;
use crate::types::CrashError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    /// Strategy parameters by name (`baseBet`, `payout`, `waitNum`).
    pub strategy: BTreeMap<String, ParamDescriptor>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulationConfig {
    /// Starting balance in minor units.
    pub initial_balance: i64,
    /// Seed of the game hash chain (64 hex chars).
    pub seed_hash: String,
    pub num_games: usize,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Keep the strategy's log output in the run report.
    #[serde(default)]
    pub capture_logs: bool,
    #[serde(default = "default_uname")]
    pub uname: String,
}

fn default_history_size() -> usize {
    DEFAULT_HISTORY_SIZE
}

fn default_uname() -> String {
    "Player".to_string()
}

/// Genetic search settings (`[optimizer]`, every key optional).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OptimizerConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Best individuals copied unchanged into the next generation.
    pub elite_size: usize,
    pub tournament_size: usize,
    /// Mutation decays linearly from max to min over the generations.
    pub max_mutation_rate: f64,
    pub min_mutation_rate: f64,
    /// Crossover grows linearly from min to max over the generations.
    pub max_crossover_rate: f64,
    pub min_crossover_rate: f64,
    /// Fixed RNG seed for reproducible searches.
    pub rng_seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 30,
            elite_size: 5,
            tournament_size: 5,
            max_mutation_rate: 0.9,
            min_mutation_rate: 0.1,
            max_crossover_rate: 0.9,
            min_crossover_rate: 0.1,
            rng_seed: None,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), CrashError> {
        if self.population_size < 2 {
            return Err(CrashError::InvalidConfig(
                "`population_size` must be at least 2".into(),
            ));
        }
        if self.elite_size >= self.population_size {
            return Err(CrashError::InvalidConfig(format!(
                "`elite_size` ({}) must be below `population_size` ({})",
                self.elite_size, self.population_size
            )));
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return Err(CrashError::InvalidConfig(format!(
                "`tournament_size` must be between 1 and {}",
                self.population_size
            )));
        }
        let rates = [
            self.max_mutation_rate,
            self.min_mutation_rate,
            self.max_crossover_rate,
            self.min_crossover_rate,
        ];
        if rates.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(CrashError::InvalidConfig("rates must lie in [0, 1]".into()));
        }
        Ok(())
    }
}

/// A single script parameter as presented to a configuration UI.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ParamDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub value: f64,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Build the typed strategy configuration from the descriptor table.
    pub fn strategy_config(&self) -> Result<StrategyConfig> {
        let values: BTreeMap<String, f64> = self
            .strategy
            .iter()
            .map(|(k, d)| (k.clone(), d.value))
            .collect();
        StrategyConfig::from_values(&values).context("Invalid [strategy] parameters")
    }
}
