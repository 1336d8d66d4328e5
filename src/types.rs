//! Shared types for CRASHSIM.
//!
//! Round records, queued bets, and the player account form the data model
//! exchanged between the engine, the strategy, and the backtest harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest wager the host accepts, in minor units.
pub const MIN_BET: u64 = 100;

/// Lowest auto cash-out the host accepts.
pub const MIN_PAYOUT: f64 = 1.01;

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// A completed round as recorded in the engine history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based game number within a run.
    pub game_id: u64,
    pub hash: String,
    /// Multiplier at which the round ended.
    pub bust: f64,
    /// Our wager this round, if we had one.
    pub wager: Option<u64>,
    /// Multiplier we cashed out at. `None` if we lost or didn't play.
    pub cashed_at: Option<f64>,
}

impl RoundRecord {
    /// Whether we had a non-zero wager in this round.
    pub fn played(&self) -> bool {
        self.wager.is_some_and(|w| w > 0)
    }

    pub fn won(&self) -> bool {
        self.played() && self.cashed_at.is_some_and(|c| c > 0.0)
    }
}

impl fmt::Display for RoundRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.wager, self.cashed_at) {
            (Some(w), Some(c)) => write!(f, "#{} bust {:.2}x | bet {} cashed @ {:.2}x", self.game_id, self.bust, w, c),
            (Some(w), None) => write!(f, "#{} bust {:.2}x | bet {} lost", self.game_id, self.bust, w),
            (None, _) => write!(f, "#{} bust {:.2}x | skipped", self.game_id, self.bust),
        }
    }
}

/// A generated game outcome, before any bets are resolved against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub hash: String,
    pub bust: f64,
}

/// The bet sitting in the engine's slot for the upcoming round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueuedBet {
    pub wager: u64,
    /// Auto cash-out multiplier, rounded to two decimals.
    pub payout: f64,
}

// ---------------------------------------------------------------------------
// Player account
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uname: String,
    pub balance: i64,
    pub wagered: u64,
    pub profit: i64,
    pub bets: u64,
}

impl UserInfo {
    pub fn new(uname: &str, balance: i64) -> Self {
        Self {
            uname: uname.to_string(),
            balance,
            wagered: 0,
            profit: 0,
            bets: 0,
        }
    }
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (balance: {} | wagered: {} | profit: {} | bets: {})",
            self.uname, self.balance, self.wagered, self.profit, self.bets
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for CRASHSIM.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CrashError {
    #[error("Round history is empty")]
    EmptyHistory,

    #[error("Bet rejected: {0}")]
    BetRejected(String),

    #[error("Invalid bet of {wager} at {payout}x: {reason}")]
    InvalidBet {
        wager: u64,
        payout: f64,
        reason: String,
    },

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: i64 },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Invalid game hash: {0}")]
    InvalidHash(String),

    #[error("Invalid sweep range: {0}")]
    InvalidRange(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
