//! Backtesting harness: game generation, simulation, statistics, sweeps
//! and the genetic parameter search.

pub mod games;
pub mod optimizer;
pub mod runner;
pub mod statistics;
pub mod sweep;
