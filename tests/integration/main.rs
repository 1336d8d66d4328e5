//! Integration tests: strategy against a scripted host, and full
//! simulations over generated games.

mod mock_engine;
mod simulation;
