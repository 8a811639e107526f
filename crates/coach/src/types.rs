//! Core types shared by the self-play pipeline

use serde::{Deserialize, Serialize};

/// Discrete action identifier (0..action_size-1)
pub type ActionId = usize;

/// Player identity as seen by the training loop.
///
/// Serialized as its sign (+1 / -1).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Player {
    First,
    Second,
}

impl Player {
    pub fn sign(self) -> i8 {
        match self {
            Player::First => 1,
            Player::Second => -1,
        }
    }

    pub fn from_sign(sign: i8) -> Option<Player> {
        match sign {
            1 => Some(Player::First),
            -1 => Some(Player::Second),
            _ => None,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }
}

impl From<Player> for i8 {
    fn from(player: Player) -> i8 {
        player.sign()
    }
}

impl TryFrom<i8> for Player {
    type Error = String;

    fn try_from(sign: i8) -> Result<Self, Self::Error> {
        Player::from_sign(sign).ok_or_else(|| format!("player sign must be +1 or -1, got {sign}"))
    }
}

/// Binary temperature flag passed to the search procedure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Temperature {
    /// tau = 1: distribution proportional to search visits
    Explore,
    /// tau -> 0: one-hot on the most visited action
    Greedy,
}

impl Temperature {
    /// `Explore` while `turn < threshold`, `Greedy` afterwards. Turns count from 1.
    pub fn for_turn(turn: usize, threshold: usize) -> Self {
        if turn < threshold {
            Temperature::Explore
        } else {
            Temperature::Greedy
        }
    }
}
