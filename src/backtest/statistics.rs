//! Run statistics.
//!
//! Accumulates balance extremes, win/loss streaks, bet sizes and an
//! estimated wall-clock duration from every resolved round.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::history::History;
use crate::types::RoundRecord;

/// Multiplier growth rate per millisecond of a running round.
const GROWTH_PER_MS: f64 = 0.00006;

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Estimated time the rounds took to run.
    pub duration_ms: f64,
    pub starting_balance: i64,
    pub balance: i64,
    pub balance_ath: i64,
    pub balance_atl: i64,
    pub games_total: u64,
    pub games_played: u64,
    pub games_skipped: u64,
    pub games_won: u64,
    pub games_lost: u64,
    pub profit: i64,
    pub lowest_bet: Option<u64>,
    pub highest_bet: Option<u64>,
    pub longest_win_streak: u64,
    pub longest_streak_gain: i64,
    pub longest_lose_streak: u64,
    pub longest_streak_cost: i64,
    pub profit_per_hour: f64,
    pub profit_ath: i64,
    pub profit_atl: i64,
    pub total_wagered: u64,
    pub total_won: i64,
    pub total_lost: i64,
    #[serde(skip)]
    win_streak: u64,
    #[serde(skip)]
    lose_streak: u64,
    #[serde(skip)]
    streak_gain: i64,
    #[serde(skip)]
    streak_cost: i64,
}

impl Statistics {
    pub fn new(starting_balance: i64) -> Self {
        Self {
            duration_ms: 0.0,
            starting_balance,
            balance: starting_balance,
            balance_ath: starting_balance,
            balance_atl: starting_balance,
            games_total: 0,
            games_played: 0,
            games_skipped: 0,
            games_won: 0,
            games_lost: 0,
            profit: 0,
            lowest_bet: None,
            highest_bet: None,
            longest_win_streak: 0,
            longest_streak_gain: 0,
            longest_lose_streak: 0,
            longest_streak_cost: 0,
            profit_per_hour: 0.0,
            profit_ath: 0,
            profit_atl: 0,
            total_wagered: 0,
            total_won: 0,
            total_lost: 0,
            win_streak: 0,
            lose_streak: 0,
            streak_gain: 0,
            streak_cost: 0,
        }
    }

    /// Account for the newest round in `history`. No-op when empty.
    pub fn update_from(&mut self, history: &History) {
        if let Some(round) = history.first() {
            self.update(round);
        }
    }

    /// Account for one resolved round.
    pub fn update(&mut self, round: &RoundRecord) {
        self.games_total += 1;
        if round.bust > 1.0 {
            self.duration_ms += round.bust.ln() / GROWTH_PER_MS;
        }

        let wager = match round.wager {
            Some(w) if w > 0 => w,
            _ => {
                self.games_skipped += 1;
                self.refresh_rate();
                return;
            }
        };

        self.games_played += 1;
        self.total_wagered = self.total_wagered.saturating_add(wager);
        self.lowest_bet = Some(self.lowest_bet.map_or(wager, |b| b.min(wager)));
        self.highest_bet = Some(self.highest_bet.map_or(wager, |b| b.max(wager)));

        match round.cashed_at.filter(|c| *c > 0.0) {
            Some(cashed_at) => {
                let returned = (wager as f64 * cashed_at).floor() as i64;
                let gain = returned - wager as i64;
                self.games_won += 1;
                self.total_won += returned;
                self.balance += gain;

                self.lose_streak = 0;
                self.streak_cost = 0;
                self.win_streak += 1;
                self.streak_gain += gain;
                if self.win_streak > self.longest_win_streak {
                    self.longest_win_streak = self.win_streak;
                    self.longest_streak_gain = self.streak_gain;
                }
            }
            None => {
                self.games_lost += 1;
                self.total_lost += wager as i64;
                self.balance -= wager as i64;

                self.win_streak = 0;
                self.streak_gain = 0;
                self.lose_streak += 1;
                self.streak_cost += wager as i64;
                if self.lose_streak > self.longest_lose_streak {
                    self.longest_lose_streak = self.lose_streak;
                    self.longest_streak_cost = self.streak_cost;
                }
            }
        }

        self.balance_ath = self.balance_ath.max(self.balance);
        self.balance_atl = self.balance_atl.min(self.balance);

        self.profit = self.balance - self.starting_balance;
        self.profit_ath = self.profit_ath.max(self.profit);
        self.profit_atl = self.profit_atl.min(self.profit);

        self.refresh_rate();
    }

    fn refresh_rate(&mut self) {
        self.profit_per_hour = if self.duration_ms > 0.0 {
            self.profit as f64 / (self.duration_ms / MS_PER_HOUR)
        } else {
            0.0
        };
    }

    /// Risk-adjusted score of the run. Lower is better.
    ///
    /// `-(profit / sqrt(total_wagered * games_played))`, or 0 when nothing
    /// was wagered.
    pub fn metric(&self) -> f64 {
        if self.games_played == 0 || self.total_wagered == 0 {
            return 0.0;
        }
        let scale = (self.total_wagered as f64 * self.games_played as f64).sqrt();
        -(self.profit as f64 / scale)
    }

    /// Named numeric view of every statistic, in display order.
    pub fn rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("starting_balance", self.starting_balance as f64),
            ("balance", self.balance as f64),
            ("balance_ath", self.balance_ath as f64),
            ("balance_atl", self.balance_atl as f64),
            ("games_total", self.games_total as f64),
            ("games_played", self.games_played as f64),
            ("games_skipped", self.games_skipped as f64),
            ("games_won", self.games_won as f64),
            ("games_lost", self.games_lost as f64),
            ("profit", self.profit as f64),
            ("lowest_bet", self.lowest_bet.unwrap_or(0) as f64),
            ("highest_bet", self.highest_bet.unwrap_or(0) as f64),
            ("longest_win_streak", self.longest_win_streak as f64),
            ("longest_streak_gain", self.longest_streak_gain as f64),
            ("longest_lose_streak", self.longest_lose_streak as f64),
            ("longest_streak_cost", self.longest_streak_cost as f64),
            ("profit_per_hour", self.profit_per_hour),
            ("profit_ath", self.profit_ath as f64),
            ("profit_atl", self.profit_atl as f64),
            ("total_wagered", self.total_wagered as f64),
            ("total_won", self.total_won as f64),
            ("total_lost", self.total_lost as f64),
            ("duration_ms", self.duration_ms),
        ]
    }

    /// Field-wise mean over several runs. Empty input yields no rows.
    pub fn average(runs: &[Statistics]) -> Vec<(&'static str, f64)> {
        let Some(first) = runs.first() else {
            return Vec::new();
        };

        let mut sums = first.rows();
        for run in &runs[1..] {
            for (sum, (_, value)) in sums.iter_mut().zip(run.rows()) {
                sum.1 += value;
            }
        }

        let n = runs.len() as f64;
        sums.into_iter().map(|(name, total)| (name, total / n)).collect()
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.rows() {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
