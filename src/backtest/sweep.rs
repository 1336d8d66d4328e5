//! Grid parameter sweep.
//!
//! Expands `key:min,max,step` ranges into every combination, simulates the
//! martingale strategy under each one over the same games, and ranks the
//! runs by `Statistics::metric` (lowest first).

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::runner::Simulator;
use crate::config::SimulationConfig;
use crate::strategy::martingale::{Martingale, StrategyConfig, BASE_BET, PAYOUT, WAIT_NUM};
use crate::types::{CrashError, GameResult};

/// Slack for float accumulation when deciding whether `max` is reached.
const RANGE_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ParamRange {
    pub key: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(key: &str, min: f64, max: f64, step: f64) -> Result<Self, CrashError> {
        if ![BASE_BET, PAYOUT, WAIT_NUM].contains(&key) {
            return Err(CrashError::InvalidRange(format!("unknown parameter `{key}`")));
        }
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(CrashError::InvalidRange(format!("{key}: bounds must be finite")));
        }
        if step <= 0.0 {
            return Err(CrashError::InvalidRange(format!("{key}: step must be positive")));
        }
        if min > max {
            return Err(CrashError::InvalidRange(format!("{key}: min {min} exceeds max {max}")));
        }
        Ok(Self {
            key: key.to_string(),
            min,
            max,
            step,
        })
    }

    /// `min, min + step, ...` up to and including `max`.
    pub fn values(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step + RANGE_EPSILON).floor() as usize;
        (0..=count).map(|i| self.min + i as f64 * self.step).collect()
    }
}

impl FromStr for ParamRange {
    type Err = CrashError;

    /// Parse `key:min,max,step`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, bounds) = s
            .split_once(':')
            .ok_or_else(|| CrashError::InvalidRange(format!("expected key:min,max,step, got `{s}`")))?;

        let parts: Vec<f64> = bounds
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| CrashError::InvalidRange(format!("{key}: {e}")))?;

        match parts.as_slice() {
            [min, max, step] => Self::new(key.trim(), *min, *max, *step),
            _ => Err(CrashError::InvalidRange(format!(
                "{key}: expected three values min,max,step"
            ))),
        }
    }
}

/// Cartesian product of all ranges, first range varying slowest.
pub fn combinations(ranges: &[ParamRange]) -> Vec<Vec<(String, f64)>> {
    let mut combos: Vec<Vec<(String, f64)>> = vec![Vec::new()];
    for range in ranges {
        let values = range.values();
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |&v| {
                    let mut combo = prefix.clone();
                    combo.push((range.key.clone(), v));
                    combo
                })
            })
            .collect();
    }
    combos
}

// ---------------------------------------------------------------------------
// Sweep results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub params: Vec<(String, f64)>,
    pub config: StrategyConfig,
    pub metric: f64,
    pub final_balance: i64,
    pub profit: i64,
    pub games: usize,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedCombination {
    pub params: Vec<(String, f64)>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SweepReport {
    /// Ranked best (lowest metric) first.
    pub outcomes: Vec<SweepOutcome>,
    pub skipped: Vec<SkippedCombination>,
}

impl SweepReport {
    pub fn best(&self) -> Option<&SweepOutcome> {
        self.outcomes.first()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub(super) fn apply(base: &StrategyConfig, params: &[(String, f64)]) -> Result<StrategyConfig, CrashError> {
    params
        .iter()
        .try_fold(base.clone(), |cfg, (key, value)| cfg.with_value(key, *value))
}

/// Simulate every combination on the blocking pool and rank the results.
pub async fn run_sweep(
    sim_config: &SimulationConfig,
    base: &StrategyConfig,
    ranges: &[ParamRange],
    games: Arc<[GameResult]>,
) -> Result<SweepReport> {
    let combos = combinations(ranges);
    info!(combinations = combos.len(), games = games.len(), "Starting sweep");

    let mut report = SweepReport::default();
    let mut handles = Vec::new();

    for params in combos {
        let config = match apply(base, &params) {
            Ok(cfg) => cfg,
            Err(e) => {
                debug!(?params, error = %e, "Skipping invalid combination");
                report.skipped.push(SkippedCombination {
                    params,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let sim = Simulator::new(sim_config.clone());
        let games = Arc::clone(&games);
        handles.push(tokio::task::spawn_blocking(move || {
            let mut strategy = Martingale::new(config.clone());
            let result = sim.run(&mut strategy, &games);
            (params, config, result)
        }));
    }

    for joined in join_all(handles).await {
        let (params, config, result) = joined.context("Sweep task panicked")?;
        match result {
            Ok(run) => report.outcomes.push(SweepOutcome {
                params,
                config,
                metric: run.statistics.metric(),
                final_balance: run.final_balance,
                profit: run.statistics.profit,
                games: run.games,
                stop_reason: run.stop_reason,
            }),
            Err(e) => {
                warn!(?params, error = %e, "Combination failed");
                report.skipped.push(SkippedCombination {
                    params,
                    reason: e.to_string(),
                });
            }
        }
    }

    report.outcomes.sort_by(|a, b| {
        a.metric
            .partial_cmp(&b.metric)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(best) = report.best() {
        info!(
            metric = best.metric,
            profit = best.profit,
            config = %best.config,
            skipped = report.skipped.len(),
            "Sweep complete"
        );
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
