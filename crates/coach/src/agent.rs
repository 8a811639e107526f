//! Search and decision APIs used by self-play and the arena

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{ActionId, Game, Player, Temperature};

/// Anything that turns a (canonical) position into an action distribution:
/// tree search guided by a model, uniform play, scripted play in tests.
pub trait SearchPolicy<G: Game> {
    /// Probability vector of length `game.action_size()`.
    ///
    /// Requirement:
    /// - Must only put mass on actions valid for the player to move.
    /// - With `Temperature::Greedy` the result is one-hot.
    fn action_distribution(
        &mut self,
        state: &G::State,
        temperature: Temperature,
        rng: &mut impl Rng,
    ) -> Vec<f32>;
}

/// Builds fresh searches. Self-play takes a factory rather than a search so
/// that no search tree survives from one episode into the next.
pub trait SearchFactory<G: Game>: Sync {
    type Search: SearchPolicy<G>;

    fn new_search(&self) -> Self::Search;
}

/// Deterministic move choice used when two models are compared.
pub trait DecisionPolicy<G: Game> {
    fn decide(&mut self, state: &G::State) -> ActionId;
}

/// Search that spreads probability uniformly over valid actions.
#[derive(Clone, Debug)]
pub struct UniformSearch<G> {
    game: G,
}

impl<G: Game> UniformSearch<G> {
    pub fn new(game: G) -> Self {
        Self { game }
    }
}

impl<G: Game> SearchPolicy<G> for UniformSearch<G> {
    fn action_distribution(
        &mut self,
        state: &G::State,
        temperature: Temperature,
        _rng: &mut impl Rng,
    ) -> Vec<f32> {
        let valid = self.game.valid_actions(state, Player::First);
        let count = valid.iter().filter(|&&v| v).count();
        assert!(count > 0, "No valid actions available for search");

        match temperature {
            Temperature::Explore => valid
                .iter()
                .map(|&v| if v { 1.0 / count as f32 } else { 0.0 })
                .collect(),
            Temperature::Greedy => {
                let mut pi = vec![0.0; valid.len()];
                if let Some(first) = valid.iter().position(|&v| v) {
                    pi[first] = 1.0;
                }
                pi
            }
        }
    }
}

impl<G: Game> SearchFactory<G> for UniformSearch<G> {
    type Search = UniformSearch<G>;

    fn new_search(&self) -> Self::Search {
        self.clone()
    }
}

/// Plays the most probable action of a temperature-0 search, building a fresh
/// search for every decision.
pub struct GreedyPolicy<F> {
    factory: F,
    rng: StdRng,
}

impl<F> GreedyPolicy<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            rng: StdRng::seed_from_u64(0),
        }
    }
}

impl<G: Game, F: SearchFactory<G>> DecisionPolicy<G> for GreedyPolicy<F> {
    fn decide(&mut self, state: &G::State) -> ActionId {
        let mut search = self.factory.new_search();
        let pi = search.action_distribution(state, Temperature::Greedy, &mut self.rng);
        argmax(&pi)
    }
}

/// Index of the largest probability; the first one wins ties.
pub fn argmax(pi: &[f32]) -> ActionId {
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, &p) in pi.iter().enumerate() {
        if p > best {
            best = p;
            best_idx = i;
        }
    }
    best_idx
}

/// Sample an action index according to `pi`.
pub fn sample_action(pi: &[f32], rng: &mut impl Rng) -> ActionId {
    let total: f32 = pi.iter().sum();
    let r: f32 = rng.random::<f32>() * total;
    let mut cumsum = 0.0;
    for (i, &p) in pi.iter().enumerate() {
        cumsum += p;
        if p > 0.0 && r < cumsum {
            return i;
        }
    }
    // Rounding left r at the top of the range: fall back to last non-zero
    pi.iter()
        .enumerate()
        .rev()
        .find(|(_, &p)| p > 0.0)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KInARow;

    #[test]
    fn test_uniform_search_only_valid_actions() {
        let game = KInARow::tic_tac_toe();
        let (state, _) = game.apply_action(&game.initial_state(), Player::First, 4);
        let mut search = UniformSearch::new(game.clone());
        let mut rng = StdRng::seed_from_u64(42);

        let pi = search.action_distribution(&state, Temperature::Explore, &mut rng);
        assert_eq!(pi.len(), 9);
        assert_eq!(pi[4], 0.0);
        assert!((pi.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let greedy = search.action_distribution(&state, Temperature::Greedy, &mut rng);
        assert_eq!(greedy[0], 1.0);
    }

    #[test]
    fn test_greedy_policy_is_deterministic() {
        let game = KInARow::tic_tac_toe();
        let mut policy = GreedyPolicy::new(UniformSearch::new(game.clone()));
        let state = game.initial_state();
        let a = DecisionPolicy::<KInARow>::decide(&mut policy, &state);
        let b = DecisionPolicy::<KInARow>::decide(&mut policy, &state);
        assert_eq!(a, b);
    }

    #[test]
    fn test_argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
        assert_eq!(argmax(&[0.0, 0.0, 1.0]), 2);
    }

    #[test]
    fn test_sample_action_never_picks_zero_mass() {
        let mut rng = StdRng::seed_from_u64(7);
        let pi = [0.0, 0.25, 0.0, 0.75];
        let mut hits = [0usize; 4];
        for _ in 0..1000 {
            hits[sample_action(&pi, &mut rng)] += 1;
        }
        assert_eq!(hits[0], 0);
        assert_eq!(hits[2], 0);
        assert!(hits[3] > hits[1]);
    }

    #[test]
    fn test_sample_action_one_hot() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(sample_action(&[0.0, 0.0, 1.0], &mut rng), 2);
        }
    }
}
