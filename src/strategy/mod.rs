//! Strategy seam: lifecycle hooks a host engine drives.
//!
//! A strategy is loaded once, then receives `GameStarting` / `GameEnded`
//! strictly alternately for every round.

pub mod martingale;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::Engine;
use crate::types::CrashError;

/// Round lifecycle events emitted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Betting window for the next round is open.
    GameStarting,
    /// The round busted and has been appended to history.
    GameEnded,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::GameStarting => write!(f, "GAME_STARTING"),
            GameEvent::GameEnded => write!(f, "GAME_ENDED"),
        }
    }
}

/// A betting strategy run by a host engine.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Called once before the first round.
    fn on_load(&mut self, _engine: &mut dyn Engine) -> Result<(), CrashError> {
        Ok(())
    }

    fn on_game_starting(&mut self, engine: &mut dyn Engine) -> Result<(), CrashError>;

    fn on_game_ended(&mut self, engine: &mut dyn Engine) -> Result<(), CrashError>;

    /// Route a lifecycle event to its hook.
    fn handle(&mut self, event: GameEvent, engine: &mut dyn Engine) -> Result<(), CrashError> {
        match event {
            GameEvent::GameStarting => self.on_game_starting(engine),
            GameEvent::GameEnded => self.on_game_ended(engine),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;

    #[derive(Default)]
    struct Recorder {
        events: Vec<GameEvent>,
    }

    impl Strategy for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_game_starting(&mut self, _engine: &mut dyn Engine) -> Result<(), CrashError> {
            self.events.push(GameEvent::GameStarting);
            Ok(())
        }

        fn on_game_ended(&mut self, _engine: &mut dyn Engine) -> Result<(), CrashError> {
            self.events.push(GameEvent::GameEnded);
            Ok(())
        }
    }

    #[test]
    fn test_handle_dispatches_to_hooks() {
        let mut engine = MockEngine::new();
        let mut strategy = Recorder::default();

        strategy.handle(GameEvent::GameStarting, &mut engine).unwrap();
        strategy.handle(GameEvent::GameEnded, &mut engine).unwrap();
        strategy.handle(GameEvent::GameStarting, &mut engine).unwrap();

        assert_eq!(
            strategy.events,
            vec![GameEvent::GameStarting, GameEvent::GameEnded, GameEvent::GameStarting]
        );
    }

    #[test]
    fn test_event_names() {
        assert_eq!(GameEvent::GameStarting.to_string(), "GAME_STARTING");
        assert_eq!(GameEvent::GameEnded.to_string(), "GAME_ENDED");
    }
}
