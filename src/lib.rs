//! CRASHSIM: martingale crash-game strategy and offline simulator
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod strategy;
pub mod backtest;
