//! Training example types for AlphaZero self-play
//!
//! Defines the data structures for storing training examples during self-play.

use serde::{Deserialize, Serialize};

use crate::Player;

/// One training example: (s, π, z) in AlphaZero notation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Canonical state, encoded by the game.
    pub state_encoding: Vec<u8>,

    /// Player to move when the position was searched.
    pub recorded_player: Player,

    /// Search-improved policy π over the full action space (sums to 1).
    pub policy_target: Vec<f32>,

    /// Game outcome from `recorded_player`'s perspective.
    pub value_target: f32,
}

/// Move record before we know the final outcome.
/// Converted to TrainingExample when the game ends.
#[derive(Clone, Debug)]
pub struct PendingMove {
    pub state_encoding: Vec<u8>,
    pub player: Player,
    pub policy: Vec<f32>,
}

impl PendingMove {
    /// Resolve the value target once the game has ended.
    ///
    /// `outcome` is the terminal result seen by `terminal_player`, the player
    /// to move in the final position.
    pub fn resolve(self, outcome: f32, terminal_player: Player) -> TrainingExample {
        let value_target = if self.player == terminal_player {
            outcome
        } else {
            -outcome
        };
        TrainingExample {
            state_encoding: self.state_encoding,
            recorded_player: self.player,
            policy_target: self.policy,
            value_target,
        }
    }
}

/// All examples of one self-play game, in generation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub examples: Vec<TrainingExample>,

    /// Terminal result from `terminal_player`'s perspective (nonzero).
    pub outcome: f32,

    /// Player to move in the terminal position.
    pub terminal_player: Player,

    /// Turns played (examples before symmetry augmentation).
    pub turns: usize,

    /// True if the turn guard stopped the game and forced `outcome`.
    pub truncated: bool,
}

impl Episode {
    /// Backfill every pending move with the terminal outcome.
    pub fn from_pending(
        moves: Vec<PendingMove>,
        outcome: f32,
        terminal_player: Player,
        turns: usize,
        truncated: bool,
    ) -> Self {
        let examples = moves
            .into_iter()
            .map(|m| m.resolve(outcome, terminal_player))
            .collect();
        Self {
            examples,
            outcome,
            terminal_player,
            turns,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}
