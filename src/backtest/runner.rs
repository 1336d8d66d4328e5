//! Offline simulation runner.
//!
//! Replays a list of generated games through a strategy running on the
//! simulated engine: `GameStarting` → resolve → `GameEnded` → statistics,
//! until the games run out or the player can no longer bet.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::games::generate_games;
use super::statistics::Statistics;
use crate::config::SimulationConfig;
use crate::engine::simulated::SimulatedEngine;
use crate::engine::Engine;
use crate::strategy::{GameEvent, Strategy};
use crate::types::{CrashError, GameResult, UserInfo, MIN_BET};

// ---------------------------------------------------------------------------
// Simulation results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub strategy: String,
    /// Games actually played through before the run ended.
    pub games: usize,
    pub final_balance: i64,
    pub user: UserInfo,
    pub statistics: Statistics,
    /// Captured strategy log lines (empty unless `capture_logs`).
    pub logs: Vec<String>,
    /// Why the run ended early, if it did.
    pub stop_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Generate the configured number of games from the configured seed.
    pub fn generate(&self) -> Result<Vec<GameResult>, CrashError> {
        generate_games(&self.config.seed_hash, self.config.num_games)
    }

    /// Run `strategy` over `games` on a fresh engine.
    ///
    /// A bet the balance cannot cover ends the run (the player is broke);
    /// any other strategy or engine error aborts it.
    pub fn run(
        &self,
        strategy: &mut dyn Strategy,
        games: &[GameResult],
    ) -> Result<SimulationReport, CrashError> {
        let started_at = Utc::now();
        let user = UserInfo::new(&self.config.uname, self.config.initial_balance);
        let mut engine =
            SimulatedEngine::new(user, self.config.history_size, self.config.capture_logs);
        let mut statistics = Statistics::new(self.config.initial_balance);
        let mut played = 0usize;

        info!(
            strategy = strategy.name(),
            games = games.len(),
            balance = self.config.initial_balance,
            "Simulation starting"
        );

        strategy.on_load(&mut engine)?;

        for (index, game) in games.iter().enumerate() {
            if engine.balance() < MIN_BET as i64 {
                engine.stop("balance below minimum bet");
                break;
            }

            match strategy.handle(GameEvent::GameStarting, &mut engine) {
                Ok(()) => {}
                Err(CrashError::InsufficientBalance { needed, available }) => {
                    warn!(needed, available, game = index + 1, "Cannot cover next bet");
                    engine.stop(&format!("insufficient balance: need {needed}, have {available}"));
                    break;
                }
                Err(e) => return Err(e),
            }

            engine.resolve_game(index as u64 + 1, &game.hash, game.bust);
            strategy.handle(GameEvent::GameEnded, &mut engine)?;
            statistics.update_from(engine.history());
            played += 1;

            if engine.is_stopping() {
                break;
            }
        }

        let report = SimulationReport {
            run_id: Uuid::new_v4(),
            started_at,
            strategy: strategy.name().to_string(),
            games: played,
            final_balance: engine.balance(),
            user: engine.user().clone(),
            statistics,
            logs: engine.take_logs(),
            stop_reason: engine.stop_reason().map(str::to_string),
        };

        info!(
            run_id = %report.run_id,
            games = report.games,
            final_balance = report.final_balance,
            profit = report.statistics.profit,
            stop_reason = ?report.stop_reason,
            "Simulation complete"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
