//! Simulated host engine.
//!
//! Holds a single bet slot for the upcoming round, the player account and
//! the round history. Games are resolved by the backtest runner through
//! `resolve_game`; strategies only see the `Engine` trait.

use tracing::{debug, info};

use super::history::History;
use super::Engine;
use crate::types::{CrashError, QueuedBet, RoundRecord, UserInfo, MIN_BET, MIN_PAYOUT};

pub struct SimulatedEngine {
    user: UserInfo,
    next: Option<QueuedBet>,
    stopping: bool,
    stop_reason: Option<String>,
    history: History,
    capture_logs: bool,
    logs: Vec<String>,
}

impl SimulatedEngine {
    pub fn new(user: UserInfo, history_size: usize, capture_logs: bool) -> Self {
        Self {
            user,
            next: None,
            stopping: false,
            stop_reason: None,
            history: History::new(history_size),
            capture_logs,
            logs: Vec::new(),
        }
    }

    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    pub fn balance(&self) -> i64 {
        self.user.balance
    }

    pub fn current_bet(&self) -> Option<QueuedBet> {
        self.next
    }

    pub fn is_bet_queued(&self) -> bool {
        self.next.is_some()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Stop accepting bets and drop any queued one.
    pub fn stop(&mut self, reason: &str) {
        if self.stopping {
            return;
        }
        info!(reason, balance = self.user.balance, "Engine stopping");
        self.stopping = true;
        self.stop_reason = Some(reason.to_string());
        self.next = None;
    }

    /// Captured log lines, in emission order.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    /// End the current round at `bust`, settle the queued bet and append
    /// the round to history. Returns the recorded round.
    pub fn resolve_game(&mut self, game_id: u64, hash: &str, bust: f64) -> RoundRecord {
        let (wager, cashed_at) = match self.next.take() {
            Some(bet) => {
                // `bet` only queues wagers covered by the balance
                let stake = i64::try_from(bet.wager).unwrap_or(i64::MAX);
                self.user.bets += 1;
                self.user.wagered = self.user.wagered.saturating_add(bet.wager);
                self.user.balance = self.user.balance.saturating_sub(stake);

                if bust >= bet.payout {
                    let credit = (bet.wager as f64 * bet.payout).floor() as i64;
                    self.user.balance = self.user.balance.saturating_add(credit);
                    self.user.profit = self.user.profit.saturating_add(credit.saturating_sub(stake));
                    (Some(bet.wager), Some(bet.payout))
                } else {
                    self.user.profit = self.user.profit.saturating_sub(stake);
                    (Some(bet.wager), None)
                }
            }
            None => (None, None),
        };

        let round = RoundRecord {
            game_id,
            hash: hash.to_string(),
            bust,
            wager,
            cashed_at,
        };
        debug!(%round, balance = self.user.balance, "Game resolved");
        self.history.push(round.clone());
        round
    }
}

impl Engine for SimulatedEngine {
    fn bet(&mut self, wager: u64, payout: f64) -> Result<(), CrashError> {
        if self.stopping {
            return Err(CrashError::BetRejected("engine is stopping".into()));
        }
        if self.next.is_some() {
            return Err(CrashError::BetRejected("a bet is already queued".into()));
        }
        if wager == 0 {
            return Err(CrashError::InvalidBet {
                wager,
                payout,
                reason: format!("wager must be a positive multiple of {MIN_BET}"),
            });
        }
        let covered = i64::try_from(wager).is_ok_and(|w| w <= self.user.balance);
        if !covered {
            return Err(CrashError::InsufficientBalance {
                needed: wager,
                available: self.user.balance,
            });
        }
        if wager % MIN_BET != 0 {
            return Err(CrashError::InvalidBet {
                wager,
                payout,
                reason: format!("wager must be a positive multiple of {MIN_BET}"),
            });
        }
        if !payout.is_finite() || payout < MIN_PAYOUT {
            return Err(CrashError::InvalidBet {
                wager,
                payout,
                reason: format!("payout must be at least {MIN_PAYOUT}"),
            });
        }

        let payout = (payout * 100.0).round() / 100.0;
        debug!(wager, payout, "Bet queued");
        self.next = Some(QueuedBet { wager, payout });
        Ok(())
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn log(&mut self, message: &str) {
        debug!(target: "crashsim::script", "{message}");
        if self.capture_logs {
            self.logs.push(format!("LOG: {message}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
