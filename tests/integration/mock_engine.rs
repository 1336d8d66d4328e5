//! Scripted host engine for integration testing.
//!
//! Records every bet the strategy places and lets the test decide how each
//! round ends. All state is in-memory.

use crashsim::engine::history::History;
use crashsim::engine::Engine;
use crashsim::strategy::martingale::{Martingale, Phase, StrategyConfig};
use crashsim::strategy::{GameEvent, Strategy};
use crashsim::types::{CrashError, QueuedBet, RoundRecord};

/// A host that settles bets exactly as told by the test.
pub struct ScriptedEngine {
    history: History,
    pending: Option<QueuedBet>,
    bets: Vec<QueuedBet>,
    logs: Vec<String>,
    next_id: u64,
    /// If set, `bet` fails with this error.
    force_error: Option<CrashError>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            history: History::default(),
            pending: None,
            bets: Vec::new(),
            logs: Vec::new(),
            next_id: 1,
            force_error: None,
        }
    }

    pub fn set_error(&mut self, err: CrashError) {
        self.force_error = Some(err);
    }

    pub fn bets(&self) -> &[QueuedBet] {
        &self.bets
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// End the round at `bust`; a pending bet wins iff `bust >= payout`.
    pub fn end_round(&mut self, bust: f64) {
        let (wager, cashed_at) = match self.pending.take() {
            Some(bet) if bust >= bet.payout => (Some(bet.wager), Some(bet.payout)),
            Some(bet) => (Some(bet.wager), None),
            None => (None, None),
        };
        self.history.push(RoundRecord {
            game_id: self.next_id,
            hash: format!("scripted-{}", self.next_id),
            bust,
            wager,
            cashed_at,
        });
        self.next_id += 1;
    }
}

impl Engine for ScriptedEngine {
    fn bet(&mut self, wager: u64, payout: f64) -> Result<(), CrashError> {
        if let Some(err) = &self.force_error {
            return Err(err.clone());
        }
        let bet = QueuedBet { wager, payout };
        self.pending = Some(bet);
        self.bets.push(bet);
        Ok(())
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }
}

/// Drive one full round through the strategy.
fn play(strategy: &mut Martingale, engine: &mut ScriptedEngine, bust: f64) {
    strategy.handle(GameEvent::GameStarting, engine).unwrap();
    engine.end_round(bust);
    strategy.handle(GameEvent::GameEnded, engine).unwrap();
}

#[test]
fn test_wait_bet_lose_win_cycle() {
    let mut engine = ScriptedEngine::new();
    let mut strategy = Martingale::new(StrategyConfig::new(100, 2.0, 3).unwrap());
    strategy.on_load(&mut engine).unwrap();
    assert_eq!(engine.logs(), ["baseBet: 100, payout: 2, waitNum: 3".to_string()]);

    for bust in [1.2, 1.5, 1.9] {
        play(&mut strategy, &mut engine, bust);
    }
    assert!(engine.bets().is_empty());
    assert_eq!(strategy.phase(), Phase::Betting);

    // lose twice, then win
    play(&mut strategy, &mut engine, 1.5);
    play(&mut strategy, &mut engine, 1.01);
    play(&mut strategy, &mut engine, 7.0);

    let wagers: Vec<u64> = engine.bets().iter().map(|b| b.wager).collect();
    assert_eq!(wagers, vec![100, 200, 400]);
    assert!(engine.bets().iter().all(|b| b.payout == 2.0));
    assert_eq!(strategy.state().curr_bet, 100.0);
    assert_eq!(strategy.phase(), Phase::Waiting);
}

#[test]
fn test_high_bust_without_bet_resets_wait() {
    let mut engine = ScriptedEngine::new();
    let mut strategy = Martingale::new(StrategyConfig::new(100, 2.0, 2).unwrap());

    play(&mut strategy, &mut engine, 1.5);
    play(&mut strategy, &mut engine, 2.5);
    play(&mut strategy, &mut engine, 1.5);

    assert_eq!(strategy.state().since, 1);
    assert!(engine.bets().is_empty());
}

#[test]
fn test_fractional_recovery_is_rounded_at_bet_time() {
    let mut engine = ScriptedEngine::new();
    let mut strategy = Martingale::new(StrategyConfig::new(100, 3.0, 0).unwrap());

    for _ in 0..3 {
        play(&mut strategy, &mut engine, 1.0);
    }
    play(&mut strategy, &mut engine, 1.0);

    // 100, 150, 225, 337.5 -> rounded to 100, 200, 200, 300
    let wagers: Vec<u64> = engine.bets().iter().map(|b| b.wager).collect();
    assert_eq!(wagers, vec![100, 200, 200, 300]);
}

#[test]
fn test_host_bet_failure_surfaces() {
    let mut engine = ScriptedEngine::new();
    engine.set_error(CrashError::BetRejected("maintenance".into()));
    let mut strategy = Martingale::new(StrategyConfig::new(100, 2.0, 0).unwrap());

    let err = strategy.handle(GameEvent::GameStarting, &mut engine).unwrap_err();
    assert_eq!(err, CrashError::BetRejected("maintenance".into()));
}

#[test]
fn test_game_ended_before_any_round() {
    let mut engine = ScriptedEngine::new();
    let mut strategy = Martingale::new(StrategyConfig::default());

    let err = strategy.handle(GameEvent::GameEnded, &mut engine).unwrap_err();
    assert_eq!(err, CrashError::EmptyHistory);
}
