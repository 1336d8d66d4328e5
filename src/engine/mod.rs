//! Host engine: the contract a strategy calls into.
//!
//! Defines the `Engine` trait (bet placement, round history, log sink) and
//! provides an in-memory simulated implementation for offline runs.

pub mod history;
pub mod simulated;

use crate::types::CrashError;
use history::History;

/// The host a strategy runs inside.
///
/// The host invokes the strategy's lifecycle hooks strictly one after the
/// other; implementations need no interior locking.
#[cfg_attr(test, mockall::automock)]
pub trait Engine {
    /// Queue a wager (minor units) with an auto cash-out at `payout`.
    fn bet(&mut self, wager: u64, payout: f64) -> Result<(), CrashError>;

    /// Completed rounds, newest first via `History::first`.
    fn history(&self) -> &History;

    /// Diagnostic output sink.
    fn log(&mut self, message: &str);
}
