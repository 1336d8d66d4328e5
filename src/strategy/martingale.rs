//! Martingale strategy with a wait filter.
//!
//! Sits out until `wait_num` consecutive rounds have busted below the
//! target payout, then bets every round. A loss scales the bet by the
//! recovery factor `payout / (payout - 1)`; a win resets it to the base bet.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::Strategy;
use crate::engine::Engine;
use crate::types::{CrashError, MIN_BET, MIN_PAYOUT};

pub const BASE_BET: &str = "baseBet";
pub const PAYOUT: &str = "payout";
pub const WAIT_NUM: &str = "waitNum";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Bet after a win or before any bet, in minor units.
    pub base_bet: u64,
    /// Auto cash-out target, at least `MIN_PAYOUT`.
    pub payout: f64,
    /// Consecutive sub-payout busts required before betting.
    pub wait_num: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            base_bet: 100,
            payout: 2.0,
            wait_num: 3,
        }
    }
}

impl StrategyConfig {
    pub fn new(base_bet: u64, payout: f64, wait_num: u32) -> Result<Self, CrashError> {
        let config = Self {
            base_bet,
            payout,
            wait_num,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from a name → value table (`baseBet`, `payout`, `waitNum`).
    pub fn from_values(values: &BTreeMap<String, f64>) -> Result<Self, CrashError> {
        let get = |key: &str| {
            values
                .get(key)
                .copied()
                .ok_or_else(|| CrashError::InvalidConfig(format!("missing parameter `{key}`")))
        };

        let mut config = Self::default();
        config.set(BASE_BET, get(BASE_BET)?)?;
        config.set(PAYOUT, get(PAYOUT)?)?;
        config.set(WAIT_NUM, get(WAIT_NUM)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Copy of this config with one parameter replaced.
    pub fn with_value(&self, key: &str, value: f64) -> Result<Self, CrashError> {
        let mut config = self.clone();
        config.set(key, value)?;
        config.validate()?;
        Ok(config)
    }

    fn set(&mut self, key: &str, value: f64) -> Result<(), CrashError> {
        if !value.is_finite() || value < 0.0 {
            return Err(CrashError::InvalidConfig(format!(
                "`{key}` must be a non-negative number, got {value}"
            )));
        }
        match key {
            BASE_BET => self.base_bet = value.round() as u64,
            PAYOUT => self.payout = value,
            WAIT_NUM => self.wait_num = value.round() as u32,
            other => {
                return Err(CrashError::InvalidConfig(format!("unknown parameter `{other}`")));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CrashError> {
        if self.base_bet == 0 {
            return Err(CrashError::InvalidConfig("`baseBet` must be positive".into()));
        }
        if !self.payout.is_finite() || self.payout < MIN_PAYOUT {
            return Err(CrashError::InvalidConfig(format!(
                "`payout` must be at least {MIN_PAYOUT}, got {}",
                self.payout
            )));
        }
        Ok(())
    }

    /// Multiplier applied to the bet after a loss.
    pub fn recovery_factor(&self) -> f64 {
        self.payout / (self.payout - 1.0)
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{BASE_BET}: {}, {PAYOUT}: {}, {WAIT_NUM}: {}",
            self.base_bet, self.payout, self.wait_num
        )
    }
}

/// Round a bet to the nearest `MIN_BET`, never below `MIN_BET`.
pub fn round_to_min_unit(amount: f64) -> u64 {
    let unit = MIN_BET as f64;
    let rounded = (amount / unit).round() * unit;
    rounded.max(unit) as u64
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MartingaleState {
    /// Unrounded bet size in minor units.
    pub curr_bet: f64,
    /// Consecutive rounds that busted below the payout.
    pub since: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Betting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    Base,
    Recovery,
}

pub struct Martingale {
    config: StrategyConfig,
    state: MartingaleState,
}

impl Martingale {
    pub fn new(config: StrategyConfig) -> Self {
        let state = MartingaleState {
            curr_bet: config.base_bet as f64,
            since: 0,
        };
        Self { config, state }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> MartingaleState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        if self.state.since >= self.config.wait_num {
            Phase::Betting
        } else {
            Phase::Waiting
        }
    }

    pub fn sizing(&self) -> Sizing {
        if self.state.curr_bet == self.config.base_bet as f64 {
            Sizing::Base
        } else {
            Sizing::Recovery
        }
    }

    /// The wager the next `GameStarting` would place.
    pub fn next_wager(&self) -> u64 {
        round_to_min_unit(self.state.curr_bet)
    }
}

impl Strategy for Martingale {
    fn name(&self) -> &str {
        "martingale"
    }

    fn on_load(&mut self, engine: &mut dyn Engine) -> Result<(), CrashError> {
        engine.log(&self.config.to_string());
        Ok(())
    }

    fn on_game_starting(&mut self, engine: &mut dyn Engine) -> Result<(), CrashError> {
        if self.phase() == Phase::Waiting {
            return Ok(());
        }
        let wager = self.next_wager();
        debug!(wager, payout = self.config.payout, since = self.state.since, "Placing bet");
        engine.bet(wager, self.config.payout)
    }

    fn on_game_ended(&mut self, engine: &mut dyn Engine) -> Result<(), CrashError> {
        let last = engine.history().first().ok_or(CrashError::EmptyHistory)?;

        if last.bust < self.config.payout {
            self.state.since += 1;
        } else {
            self.state.since = 0;
        }

        if !last.played() {
            return Ok(());
        }

        if last.won() {
            self.state.curr_bet = self.config.base_bet as f64;
            debug!(wager = ?last.wager, curr_bet = self.state.curr_bet, "Won, bet reset");
        } else {
            self.state.curr_bet *= self.config.recovery_factor();
            debug!(wager = ?last.wager, curr_bet = self.state.curr_bet, "Lost, bet scaled up");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::history::History;
    use crate::engine::MockEngine;
    use crate::types::RoundRecord;
    use mockall::predicate::eq;

    fn round(bust: f64, wager: Option<u64>, cashed_at: Option<f64>) -> RoundRecord {
        RoundRecord {
            game_id: 1,
            hash: "h".into(),
            bust,
            wager,
            cashed_at,
        }
    }

    fn engine_with(last: RoundRecord) -> MockEngine {
        let mut history = History::default();
        history.push(last);
        let mut engine = MockEngine::new();
        engine.expect_history().return_const(history);
        engine
    }

    fn strategy(base_bet: u64, payout: f64, wait_num: u32) -> Martingale {
        Martingale::new(StrategyConfig::new(base_bet, payout, wait_num).unwrap())
    }

    // -- rounding --

    #[test]
    fn test_round_to_min_unit() {
        assert_eq!(round_to_min_unit(0.0), 100);
        assert_eq!(round_to_min_unit(49.0), 100);
        assert_eq!(round_to_min_unit(149.0), 100);
        assert_eq!(round_to_min_unit(150.0), 200);
        assert_eq!(round_to_min_unit(333.33), 300);
        assert_eq!(round_to_min_unit(1033.0), 1000);
    }

    #[test]
    fn test_round_to_min_unit_floor_and_multiple() {
        let mut x = 0.0;
        while x < 5_000.0 {
            let r = round_to_min_unit(x);
            assert!(r >= 100);
            assert_eq!(r % 100, 0);
            x += 37.3;
        }
    }

    // -- configuration --

    #[test]
    fn test_config_rejects_bad_payout() {
        assert!(StrategyConfig::new(100, 1.0, 0).is_err());
        assert!(StrategyConfig::new(100, 0.5, 0).is_err());
        assert!(StrategyConfig::new(100, 1.005, 0).is_err());
        assert!(StrategyConfig::new(100, MIN_PAYOUT, 0).is_ok());
        assert!(StrategyConfig::new(100, f64::INFINITY, 0).is_err());
        assert!(StrategyConfig::new(0, 2.0, 0).is_err());
    }

    #[test]
    fn test_config_from_values() {
        let values: BTreeMap<String, f64> = [(BASE_BET, 200.0), (PAYOUT, 1.5), (WAIT_NUM, 4.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let cfg = StrategyConfig::from_values(&values).unwrap();
        assert_eq!(cfg, StrategyConfig { base_bet: 200, payout: 1.5, wait_num: 4 });
    }

    #[test]
    fn test_config_missing_value() {
        let values: BTreeMap<String, f64> = [(BASE_BET.to_string(), 100.0)].into_iter().collect();
        let err = StrategyConfig::from_values(&values).unwrap_err();
        assert!(err.to_string().contains("payout"));
    }

    #[test]
    fn test_with_value() {
        let cfg = StrategyConfig::default().with_value(PAYOUT, 3.0).unwrap();
        assert_eq!(cfg.payout, 3.0);
        assert!(StrategyConfig::default().with_value("bogus", 1.0).is_err());
        assert!(StrategyConfig::default().with_value(PAYOUT, 1.0).is_err());
    }

    #[test]
    fn test_recovery_factor() {
        assert_eq!(StrategyConfig::default().recovery_factor(), 2.0);
        let cfg = StrategyConfig::new(100, 3.0, 0).unwrap();
        assert!((cfg.recovery_factor() - 1.5).abs() < 1e-12);
    }

    // -- GAME_STARTING --

    #[test]
    fn test_no_bet_while_waiting() {
        let mut s = strategy(100, 2.0, 3);
        let mut engine = MockEngine::new();
        engine.expect_bet().never();

        s.on_game_starting(&mut engine).unwrap();
        assert_eq!(s.phase(), Phase::Waiting);
    }

    #[test]
    fn test_bets_immediately_without_wait() {
        let mut s = strategy(100, 2.0, 0);
        let mut engine = MockEngine::new();
        engine
            .expect_bet()
            .with(eq(100), eq(2.0))
            .times(1)
            .returning(|_, _| Ok(()));

        s.on_game_starting(&mut engine).unwrap();
    }

    #[test]
    fn test_bet_error_propagates() {
        let mut s = strategy(100, 2.0, 0);
        let mut engine = MockEngine::new();
        engine
            .expect_bet()
            .returning(|_, _| Err(CrashError::BetRejected("closed".into())));

        let err = s.on_game_starting(&mut engine).unwrap_err();
        assert_eq!(err, CrashError::BetRejected("closed".into()));
    }

    #[test]
    fn test_on_load_logs_config() {
        let mut s = strategy(100, 2.0, 3);
        let mut engine = MockEngine::new();
        engine
            .expect_log()
            .withf(|msg| msg == "baseBet: 100, payout: 2, waitNum: 3")
            .times(1)
            .return_const(());

        s.on_load(&mut engine).unwrap();
    }

    // -- GAME_ENDED --

    #[test]
    fn test_streak_increments_below_payout() {
        let mut s = strategy(100, 2.0, 3);
        let mut engine = engine_with(round(1.5, None, None));

        s.on_game_ended(&mut engine).unwrap();
        s.on_game_ended(&mut engine).unwrap();
        assert_eq!(s.state().since, 2);
    }

    #[test]
    fn test_streak_resets_at_or_above_payout() {
        let mut s = strategy(100, 2.0, 3);
        let mut low = engine_with(round(1.2, None, None));
        for _ in 0..4 {
            s.on_game_ended(&mut low).unwrap();
        }
        assert_eq!(s.state().since, 4);

        let mut high = engine_with(round(2.0, None, None));
        s.on_game_ended(&mut high).unwrap();
        assert_eq!(s.state().since, 0);
    }

    #[test]
    fn test_no_wager_leaves_bet_unchanged() {
        let mut s = strategy(100, 2.0, 0);
        let mut lose = engine_with(round(1.1, Some(100), None));
        s.on_game_ended(&mut lose).unwrap();
        assert_eq!(s.state().curr_bet, 200.0);

        let mut skipped = engine_with(round(1.1, None, None));
        s.on_game_ended(&mut skipped).unwrap();
        assert_eq!(s.state().curr_bet, 200.0);

        let mut zero = engine_with(round(1.1, Some(0), None));
        s.on_game_ended(&mut zero).unwrap();
        assert_eq!(s.state().curr_bet, 200.0);
    }

    #[test]
    fn test_loss_compounds_recovery_factor() {
        let mut s = strategy(100, 3.0, 0);
        let mut engine = engine_with(round(1.1, Some(100), None));

        s.on_game_ended(&mut engine).unwrap();
        assert!((s.state().curr_bet - 150.0).abs() < 1e-9);
        s.on_game_ended(&mut engine).unwrap();
        assert!((s.state().curr_bet - 225.0).abs() < 1e-9);
        assert_eq!(s.sizing(), Sizing::Recovery);
        assert_eq!(s.next_wager(), 200);
    }

    #[test]
    fn test_win_resets_to_base() {
        let mut s = strategy(100, 2.0, 0);
        let mut lose = engine_with(round(1.1, Some(100), None));
        for _ in 0..3 {
            s.on_game_ended(&mut lose).unwrap();
        }
        assert_eq!(s.state().curr_bet, 800.0);

        let mut win = engine_with(round(2.5, Some(800), Some(2.0)));
        s.on_game_ended(&mut win).unwrap();
        assert_eq!(s.state().curr_bet, 100.0);
        assert_eq!(s.sizing(), Sizing::Base);
    }

    #[test]
    fn test_zero_cash_out_counts_as_loss() {
        let mut s = strategy(100, 2.0, 0);
        let mut engine = engine_with(round(1.1, Some(100), Some(0.0)));

        s.on_game_ended(&mut engine).unwrap();
        assert_eq!(s.state().curr_bet, 200.0);
    }

    #[test]
    fn test_empty_history_is_an_error() {
        let mut s = strategy(100, 2.0, 0);
        let mut engine = MockEngine::new();
        engine.expect_history().return_const(History::default());

        assert_eq!(s.on_game_ended(&mut engine), Err(CrashError::EmptyHistory));
        assert_eq!(s.state().since, 0);
    }

    // -- scenarios --

    #[test]
    fn test_wait_then_bet_then_lose() {
        let mut s = strategy(100, 2.0, 3);

        let mut low = engine_with(round(1.5, None, None));
        for _ in 0..3 {
            let mut idle = MockEngine::new();
            idle.expect_bet().never();
            s.on_game_starting(&mut idle).unwrap();
            s.on_game_ended(&mut low).unwrap();
        }
        assert_eq!(s.state().since, 3);
        assert_eq!(s.phase(), Phase::Betting);

        let mut betting = MockEngine::new();
        betting
            .expect_bet()
            .with(eq(100), eq(2.0))
            .times(1)
            .returning(|_, _| Ok(()));
        s.on_game_starting(&mut betting).unwrap();

        let mut lost = engine_with(round(1.5, Some(100), None));
        s.on_game_ended(&mut lost).unwrap();
        assert_eq!(s.state().curr_bet, 200.0);
        assert_eq!(s.state().since, 4);
    }

    #[test]
    fn test_win_resets_streak_and_bet() {
        let mut s = strategy(100, 2.0, 3);
        let mut low = engine_with(round(1.5, None, None));
        for _ in 0..3 {
            s.on_game_ended(&mut low).unwrap();
        }
        let mut lost = engine_with(round(1.5, Some(100), None));
        s.on_game_ended(&mut lost).unwrap();
        assert_eq!(s.state().curr_bet, 200.0);

        let mut won = engine_with(round(3.0, Some(200), Some(2.0)));
        s.on_game_ended(&mut won).unwrap();
        assert_eq!(s.state().since, 0);
        assert_eq!(s.state().curr_bet, 100.0);
        assert_eq!(s.phase(), Phase::Waiting);
    }
}
