//! Self-play episode generation

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Episode, PendingMove};
use crate::{sample_action, Game, MctsConfig, Player, SearchFactory, SearchPolicy, Temperature};

#[cfg(feature = "profiling")]
use crate::profiling::PROF;
#[cfg(feature = "profiling")]
use std::sync::atomic::Ordering;

/// Configuration for self-play games.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPlayConfig {
    /// Turns (counted from 1) below this play with `Temperature::Explore`.
    pub temp_threshold: usize,

    /// Turn guard. A game still running after this many turns is stopped and
    /// scored with the game's draw value. `None` disables the guard.
    pub max_turns: Option<usize>,

    /// Search settings for self-play (root noise on).
    pub mcts: MctsConfig,

    /// Log every position at info level.
    pub verbose: bool,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            temp_threshold: 30,
            max_turns: Some(1_000),
            mcts: MctsConfig::default(),
            verbose: false,
        }
    }
}

/// Play one full self-play game and return its labeled examples.
///
/// A fresh search is built from `factory`, so nothing carries over from
/// earlier episodes. Every turn contributes one example per symmetry of the
/// canonical position; value targets are backfilled when the game ends.
pub fn run_episode<G, F>(
    game: &G,
    factory: &F,
    config: &SelfPlayConfig,
    rng: &mut impl Rng,
) -> Episode
where
    G: Game,
    F: SearchFactory<G>,
{
    let mut search = factory.new_search();
    let mut state = game.initial_state();
    let mut player = Player::First;
    let mut moves: Vec<PendingMove> = Vec::new();
    let mut turn = 0usize;

    let episode = loop {
        turn += 1;
        let canonical = game.canonical_view(&state, player);

        if config.verbose {
            info!("Turn #{turn}\n{}", game.render(&canonical));
        } else if turn % 10 == 0 {
            debug!("Turn #{turn}");
        }

        let temperature = Temperature::for_turn(turn, config.temp_threshold);
        let pi = search.action_distribution(&canonical, temperature, rng);

        for (sym_state, sym_pi) in game.symmetries(&canonical, &pi) {
            moves.push(PendingMove {
                state_encoding: game.encode(&sym_state),
                player,
                policy: sym_pi,
            });
        }

        // Sampled even at Greedy; pi is one-hot then.
        let action = sample_action(&pi, rng);
        (state, player) = game.apply_action(&state, player, action);

        let r = game.terminal_outcome(&state, player);
        if r != 0.0 {
            debug!("Game over after {turn} turns, r = {r}");
            break Episode::from_pending(moves, r, player, turn, false);
        }

        if config.max_turns.is_some_and(|max| turn >= max) {
            warn!("Episode reached the turn limit of {turn}; scoring it as a draw");
            break Episode::from_pending(moves, game.draw_value(), player, turn, true);
        }
    };

    #[cfg(feature = "profiling")]
    {
        PROF.episodes.fetch_add(1, Ordering::Relaxed);
        PROF.turns.fetch_add(turn as u64, Ordering::Relaxed);
        PROF.examples.fetch_add(episode.len() as u64, Ordering::Relaxed);
        if episode.truncated {
            PROF.truncated_episodes.fetch_add(1, Ordering::Relaxed);
        }
    }

    episode
}
