//! Head-to-head matches between two decision policies

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{DecisionPolicy, Game, Player};

#[cfg(feature = "profiling")]
use crate::profiling::PROF;
#[cfg(feature = "profiling")]
use std::sync::atomic::Ordering;

/// Results of a series of games between policy A and policy B.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTally {
    pub a_wins: usize,
    pub b_wins: usize,
    pub draws: usize,
}

impl MatchTally {
    /// Games that ended with a winner.
    pub fn decisive(&self) -> usize {
        self.a_wins + self.b_wins
    }

    pub fn games(&self) -> usize {
        self.a_wins + self.b_wins + self.draws
    }

    /// Count one game; `result` is seen from A's side.
    fn record(&mut self, result: f32) {
        if result >= 1.0 {
            self.a_wins += 1;
        } else if result <= -1.0 {
            self.b_wins += 1;
        } else {
            self.draws += 1;
        }
    }
}

/// Plays a fixed number of games between two policies.
pub trait MatchRunner<G: Game> {
    fn play_matches(
        &mut self,
        game: &G,
        a: &mut dyn DecisionPolicy<G>,
        b: &mut dyn DecisionPolicy<G>,
        count: usize,
    ) -> MatchTally;
}

/// Alternating-seat match runner: A moves first in the first half of the
/// games, B in the rest. Policies always see the canonical position.
#[derive(Clone, Debug)]
pub struct Arena {
    /// Games still running after this many turns are scored as draws.
    pub max_turns: Option<usize>,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            max_turns: Some(1_000),
        }
    }
}

impl Arena {
    /// Play one game. Returns the result from `first`'s side: 1 win, -1 loss,
    /// anything else a draw.
    ///
    /// A policy that picks an invalid action forfeits the game.
    pub fn play_game<G: Game>(
        &self,
        game: &G,
        first: &mut dyn DecisionPolicy<G>,
        second: &mut dyn DecisionPolicy<G>,
    ) -> f32 {
        #[cfg(feature = "profiling")]
        PROF.arena_games.fetch_add(1, Ordering::Relaxed);

        let mut state = game.initial_state();
        let mut player = Player::First;
        let mut turn = 0usize;

        loop {
            turn += 1;
            let canonical = game.canonical_view(&state, player);
            let action = match player {
                Player::First => first.decide(&canonical),
                Player::Second => second.decide(&canonical),
            };

            let valid = game.valid_actions(&canonical, Player::First);
            if !valid.get(action).copied().unwrap_or(false) {
                error!("Action {action} is not valid for {player:?}; forfeiting the game");
                return match player {
                    Player::First => -1.0,
                    Player::Second => 1.0,
                };
            }

            (state, player) = game.apply_action(&state, player, action);

            let r = game.terminal_outcome(&state, Player::First);
            if r != 0.0 {
                debug!("Arena game over after {turn} turns, result {r}");
                return r;
            }
            if self.max_turns.is_some_and(|max| turn >= max) {
                debug!("Arena game reached the turn limit of {turn}");
                return game.draw_value();
            }
        }
    }
}

impl<G: Game> MatchRunner<G> for Arena {
    fn play_matches(
        &mut self,
        game: &G,
        a: &mut dyn DecisionPolicy<G>,
        b: &mut dyn DecisionPolicy<G>,
        count: usize,
    ) -> MatchTally {
        let half = count / 2;
        let mut tally = MatchTally::default();

        for _ in 0..half {
            tally.record(self.play_game(game, &mut *a, &mut *b));
        }
        for _ in half..count {
            tally.record(-self.play_game(game, &mut *b, &mut *a));
        }
        tally
    }
}
