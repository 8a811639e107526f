//! AlphaZero-style MCTS over canonical positions
//!
//! This module provides:
//! - `MctsConfig` for search configuration
//! - `Mcts`, a PUCT search whose tree lives for one episode
//! - `MctsFactory`, which hands out fresh (empty) searches
//! - Supporting types: `Node`, `ChildEdge`, `MctsTree`
//!
//! Every node stores a canonical state, so `Player::First` is always the
//! player to move at a node and values are kept from that player's side.

use std::collections::HashMap;

use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::{
    argmax, ActionId, Game, Player, PolicyValueNet, SearchFactory, SearchPolicy, Temperature,
};

#[cfg(feature = "profiling")]
use crate::profiling::{Timer, PROF};
#[cfg(feature = "profiling")]
use std::sync::atomic::Ordering;

/// Configuration for AlphaZero-style MCTS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Number of simulations per root move.
    pub num_simulations: u32,

    /// PUCT exploration constant.
    pub cpuct: f32,

    /// Dirichlet concentration parameter alpha for root noise.
    /// Only used if > 0.0.
    pub root_dirichlet_alpha: f32,

    /// Root Dirichlet noise epsilon (fraction of noise vs prior).
    pub root_dirichlet_eps: f32,

    /// Maximum search depth in playouts (safety bound).
    pub max_depth: u32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 25,
            cpuct: 2.0,
            root_dirichlet_alpha: 0.3,
            root_dirichlet_eps: 0.25,
            max_depth: 200,
        }
    }
}

impl MctsConfig {
    /// Same search with root noise switched off, for evaluation games.
    pub fn without_noise(&self) -> Self {
        Self {
            root_dirichlet_eps: 0.0,
            ..self.clone()
        }
    }

    fn noise_enabled(&self) -> bool {
        self.root_dirichlet_alpha > 0.0 && self.root_dirichlet_eps > 0.0
    }
}

/// Index into MCTS node arena.
pub type NodeIdx = u32;

/// Edge statistics for an action from a given node.
#[derive(Clone, Debug)]
pub struct ChildEdge {
    pub action_id: ActionId,
    pub prior: f32,             // P(s, a)
    pub visit_count: u32,       // N(s, a)
    pub value_sum: f32,         // W(s, a), from the parent's side
    pub child: Option<NodeIdx>, // None until first expansion along this edge
    pub flips: bool,            // the player to move changes across this edge
}

/// Node in the MCTS tree.
#[derive(Clone, Debug)]
pub struct Node<S> {
    pub state: S,
    pub is_terminal: bool,

    /// Terminal outcome, or the model's estimate, for the player to move.
    pub value: f32,

    /// Edges for all legal actions at this node.
    pub children: Vec<ChildEdge>,

    /// Cumulative visit count at this node (sum over children)
    pub visit_count: u32,
}

/// Node arena plus a transposition index keyed by encoded state.
#[derive(Clone, Debug)]
pub struct MctsTree<S> {
    pub nodes: Vec<Node<S>>,
    index: HashMap<Vec<u8>, NodeIdx>,
}

impl<S> Default for MctsTree<S> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Path step during tree traversal for backup.
#[derive(Clone, Debug)]
struct PathStep {
    node_idx: NodeIdx,
    child_idx: usize,
}

/// PUCT search guided by a policy/value model.
///
/// Statistics are shared between the moves of one game; build a new search
/// (see `MctsFactory`) for every episode.
pub struct Mcts<'a, G: Game, N> {
    game: &'a G,
    net: &'a N,
    config: MctsConfig,
    tree: MctsTree<G::State>,
}

impl<'a, G: Game, N: PolicyValueNet> Mcts<'a, G, N> {
    pub fn new(game: &'a G, net: &'a N, config: MctsConfig) -> Self {
        Self {
            game,
            net,
            config,
            tree: MctsTree::default(),
        }
    }

    /// Number of distinct positions expanded so far.
    pub fn tree_size(&self) -> usize {
        self.tree.nodes.len()
    }

    /// Look up `state` in the tree, creating and evaluating it if needed.
    /// Returns the node and whether it was just created.
    fn node_for(&mut self, state: G::State) -> (NodeIdx, bool) {
        let key = self.game.encode(&state);
        if let Some(&idx) = self.tree.index.get(&key) {
            return (idx, false);
        }

        #[cfg(feature = "profiling")]
        PROF.nodes_created.fetch_add(1, Ordering::Relaxed);

        let outcome = self.game.terminal_outcome(&state, Player::First);
        let node = if outcome != 0.0 {
            Node {
                state,
                is_terminal: true,
                value: outcome,
                children: Vec::new(),
                visit_count: 0,
            }
        } else {
            let (policy, value) = {
                #[cfg(feature = "profiling")]
                let _t = Timer::new(&PROF.time_net_eval_ns);
                #[cfg(feature = "profiling")]
                PROF.net_evals.fetch_add(1, Ordering::Relaxed);
                self.net.predict(&key)
            };
            let valid = self.game.valid_actions(&state, Player::First);
            Node {
                state,
                is_terminal: false,
                value,
                children: masked_priors(&policy, &valid),
                visit_count: 0,
            }
        };

        let idx = self.tree.nodes.len() as NodeIdx;
        self.tree.nodes.push(node);
        self.tree.index.insert(key, idx);
        (idx, true)
    }

    /// Run one MCTS simulation from root.
    fn simulate(&mut self, root_idx: NodeIdx) {
        #[cfg(feature = "profiling")]
        PROF.simulations.fetch_add(1, Ordering::Relaxed);

        let mut path: Vec<PathStep> = Vec::new();
        let mut current_idx = root_idx;

        // Selection: descend with PUCT until a new or terminal node
        let leaf_value = loop {
            let node = &self.tree.nodes[current_idx as usize];
            if node.is_terminal
                || node.children.is_empty()
                || path.len() >= self.config.max_depth as usize
            {
                break node.value;
            }

            let child_idx = select_child(node, self.config.cpuct);
            let edge = &node.children[child_idx];
            let (action, existing) = (edge.action_id, edge.child);
            path.push(PathStep {
                node_idx: current_idx,
                child_idx,
            });

            if let Some(next_idx) = existing {
                current_idx = next_idx;
                continue;
            }

            // Expansion
            let parent_state = self.tree.nodes[current_idx as usize].state.clone();
            let (next_state, next_player) =
                self.game.apply_action(&parent_state, Player::First, action);
            let canonical = self.game.canonical_view(&next_state, next_player);
            let (next_idx, created) = self.node_for(canonical);

            let edge = &mut self.tree.nodes[current_idx as usize].children[child_idx];
            edge.child = Some(next_idx);
            edge.flips = next_player != Player::First;
            current_idx = next_idx;

            if created {
                break self.tree.nodes[next_idx as usize].value;
            }
        };

        backup(&mut self.tree, &path, leaf_value);
    }
}

impl<G: Game, N: PolicyValueNet> SearchPolicy<G> for Mcts<'_, G, N> {
    /// `state` must already be canonical.
    fn action_distribution(
        &mut self,
        state: &G::State,
        temperature: Temperature,
        rng: &mut impl Rng,
    ) -> Vec<f32> {
        #[cfg(feature = "profiling")]
        let _t = Timer::new(&PROF.time_search_ns);
        #[cfg(feature = "profiling")]
        PROF.searches.fetch_add(1, Ordering::Relaxed);

        let (root_idx, _) = self.node_for(state.clone());
        let root = root_idx as usize;
        assert!(
            !self.tree.nodes[root].children.is_empty(),
            "search called on a position with no valid actions"
        );

        // Noise only applies to this call; the stored priors are restored after.
        let saved_priors = if self.config.noise_enabled() {
            let children = &mut self.tree.nodes[root].children;
            let saved: Vec<f32> = children.iter().map(|e| e.prior).collect();
            add_dirichlet_noise(
                children,
                self.config.root_dirichlet_alpha,
                self.config.root_dirichlet_eps,
                rng,
            );
            Some(saved)
        } else {
            None
        };

        for _ in 0..self.config.num_simulations {
            self.simulate(root_idx);
        }

        let root_node = &mut self.tree.nodes[root];
        if let Some(saved) = saved_priors {
            for (edge, prior) in root_node.children.iter_mut().zip(saved) {
                edge.prior = prior;
            }
        }

        let mut counts = vec![0.0f32; self.game.action_size()];
        for edge in &root_node.children {
            counts[edge.action_id] = edge.visit_count as f32;
        }
        if root_node.visit_count == 0 {
            for edge in &root_node.children {
                counts[edge.action_id] = edge.prior;
            }
        }

        apply_temperature(&counts, temperature)
    }
}

/// Hands out searches that share a game and a model but never a tree.
pub struct MctsFactory<'a, G, N> {
    game: &'a G,
    net: &'a N,
    config: MctsConfig,
}

impl<'a, G, N> MctsFactory<'a, G, N> {
    pub fn new(game: &'a G, net: &'a N, config: MctsConfig) -> Self {
        Self { game, net, config }
    }
}

impl<'a, G: Game, N: PolicyValueNet + Sync> SearchFactory<G> for MctsFactory<'a, G, N> {
    type Search = Mcts<'a, G, N>;

    fn new_search(&self) -> Self::Search {
        Mcts::new(self.game, self.net, self.config.clone())
    }
}

/// Priors over the valid actions, renormalized. Falls back to uniform when the
/// model puts no mass on any valid action.
fn masked_priors(policy: &[f32], valid: &[bool]) -> Vec<ChildEdge> {
    let mut edges: Vec<ChildEdge> = valid
        .iter()
        .enumerate()
        .filter(|(_, &ok)| ok)
        .map(|(a, _)| ChildEdge {
            action_id: a,
            prior: policy.get(a).copied().unwrap_or(0.0).max(0.0),
            visit_count: 0,
            value_sum: 0.0,
            child: None,
            flips: false,
        })
        .collect();

    let total: f32 = edges.iter().map(|e| e.prior).sum();
    if total > 0.0 {
        for edge in &mut edges {
            edge.prior /= total;
        }
    } else if !edges.is_empty() {
        debug!("All valid moves were masked, using uniform priors");
        let uniform = 1.0 / edges.len() as f32;
        for edge in &mut edges {
            edge.prior = uniform;
        }
    }
    edges
}

/// PUCT selection: choose child with highest Q + U score.
fn select_child<S>(node: &Node<S>, cpuct: f32) -> usize {
    let mut best_idx = 0;
    let mut best_score = f32::NEG_INFINITY;

    let parent_n = node.visit_count.max(1) as f32;

    for (i, edge) in node.children.iter().enumerate() {
        let q = if edge.visit_count > 0 {
            edge.value_sum / edge.visit_count as f32
        } else {
            0.0
        };

        let u = cpuct * edge.prior * (parent_n.sqrt() / (1.0 + edge.visit_count as f32));

        let score = q + u;
        if score > best_score {
            best_score = score;
            best_idx = i;
        }
    }
    best_idx
}

/// Backup a leaf value along the path, negating it wherever the mover changes.
fn backup<S>(tree: &mut MctsTree<S>, path: &[PathStep], leaf_value: f32) {
    let mut value = leaf_value;

    for step in path.iter().rev() {
        let node = &mut tree.nodes[step.node_idx as usize];
        let edge = &mut node.children[step.child_idx];

        if edge.flips {
            value = -value;
        }
        edge.visit_count += 1;
        edge.value_sum += value;
        node.visit_count += 1;
    }
}

/// Turn root visit counts into a policy.
fn apply_temperature(counts: &[f32], temperature: Temperature) -> Vec<f32> {
    let mut pi = vec![0.0f32; counts.len()];
    match temperature {
        Temperature::Greedy => {
            pi[argmax(counts)] = 1.0;
        }
        Temperature::Explore => {
            let sum: f32 = counts.iter().sum();
            if sum > 0.0 {
                for (p, &c) in pi.iter_mut().zip(counts) {
                    *p = c / sum;
                }
            }
        }
    }
    pi
}

/// Add Dirichlet noise to root priors for exploration.
/// Uses gamma sampling method: sample x_i ~ Gamma(alpha, 1), normalize to get Dir(alpha).
fn add_dirichlet_noise(edges: &mut [ChildEdge], alpha: f32, eps: f32, rng: &mut impl Rng) {
    if edges.is_empty() || alpha <= 0.0 {
        return;
    }

    let gamma = match Gamma::new(alpha as f64, 1.0) {
        Ok(g) => g,
        Err(_) => return,
    };

    let noise: Vec<f64> = (0..edges.len()).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = noise.iter().sum();
    if sum <= 0.0 {
        return;
    }

    // P'(s,a) = (1-eps)*P(s,a) + eps*eta_a
    for (edge, &eta) in edges.iter_mut().zip(noise.iter()) {
        edge.prior = (1.0 - eps) * edge.prior + eps * (eta / sum) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KInARow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Fixed priors and value, for testing search logic independently of training.
    struct DummyNet {
        priors: Vec<f32>,
        value: f32,
    }

    impl DummyNet {
        fn uniform(action_size: usize, value: f32) -> Self {
            Self {
                priors: vec![1.0 / action_size as f32; action_size],
                value,
            }
        }
    }

    impl PolicyValueNet for DummyNet {
        fn predict(&self, _state: &[u8]) -> (Vec<f32>, f32) {
            (self.priors.clone(), self.value)
        }
    }

    fn quiet(num_simulations: u32) -> MctsConfig {
        MctsConfig {
            num_simulations,
            ..MctsConfig::default().without_noise()
        }
    }

    /// X on 0 and 1, O on 3 and 4, X to move.
    fn x_can_win(game: &KInARow) -> zerocoach_engine::Board {
        let mut state = game.initial_state();
        let mut player = Player::First;
        for action in [0, 3, 1, 4] {
            (state, player) = game.apply_action(&state, player, action);
        }
        assert_eq!(player, Player::First);
        state
    }

    #[test]
    fn test_mcts_config_default() {
        let config = MctsConfig::default();
        assert_eq!(config.num_simulations, 25);
        assert_eq!(config.cpuct, 2.0);
        assert!(config.noise_enabled());
        assert!(!config.without_noise().noise_enabled());
    }

    #[test]
    fn test_masked_priors_renormalize() {
        let edges = masked_priors(&[0.5, 0.25, 0.25], &[false, true, true]);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].action_id, 1);
        assert!((edges[0].prior - 0.5).abs() < 1e-6);
        assert!((edges[1].prior - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_masked_priors_uniform_fallback() {
        let edges = masked_priors(&[1.0, 0.0, 0.0, 0.0], &[false, true, true, true]);
        for edge in &edges {
            assert!((edge.prior - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_apply_temperature() {
        let counts = [0.0, 30.0, 10.0, 0.0];
        assert_eq!(
            apply_temperature(&counts, Temperature::Greedy),
            vec![0.0, 1.0, 0.0, 0.0]
        );
        let pi = apply_temperature(&counts, Temperature::Explore);
        assert!((pi[1] - 0.75).abs() < 1e-6);
        assert!((pi[2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_dirichlet_noise_keeps_distribution() {
        let mut edges = masked_priors(&[0.25; 4], &[true; 4]);
        let mut rng = StdRng::seed_from_u64(42);
        add_dirichlet_noise(&mut edges, 0.3, 0.25, &mut rng);
        let total: f32 = edges.iter().map(|e| e.prior).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(edges.iter().any(|e| (e.prior - 0.25).abs() > 1e-6));
    }

    #[test]
    fn test_search_only_valid_actions() {
        let game = KInARow::tic_tac_toe();
        let net = DummyNet::uniform(9, 0.0);
        let (state, _) = game.apply_action(&game.initial_state(), Player::First, 4);
        let view = game.canonical_view(&state, Player::Second);

        let mut search = Mcts::new(&game, &net, MctsConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        let pi = search.action_distribution(&view, Temperature::Explore, &mut rng);

        assert_eq!(pi.len(), 9);
        assert_eq!(pi[4], 0.0);
        assert!((pi.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_search_finds_immediate_win() {
        let game = KInARow::tic_tac_toe();
        let net = DummyNet::uniform(9, 0.0);
        let state = x_can_win(&game);

        let mut search = Mcts::new(&game, &net, quiet(200));
        let mut rng = StdRng::seed_from_u64(42);
        let pi = search.action_distribution(&state, Temperature::Greedy, &mut rng);
        assert_eq!(argmax(&pi), 2);
        assert_eq!(pi.iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_search_blocks_opponent_win() {
        let game = KInARow::tic_tac_toe();
        let net = DummyNet::uniform(9, 0.0);
        // X on 0 and 1, O on 4; O to move must take 2
        let mut state = game.initial_state();
        let mut player = Player::First;
        for action in [0, 4, 1] {
            (state, player) = game.apply_action(&state, player, action);
        }
        let view = game.canonical_view(&state, player);

        let mut search = Mcts::new(&game, &net, quiet(400));
        let mut rng = StdRng::seed_from_u64(7);
        let pi = search.action_distribution(&view, Temperature::Greedy, &mut rng);
        assert_eq!(argmax(&pi), 2);
    }

    #[test]
    fn test_zero_simulations_fall_back_to_priors() {
        let game = KInARow::tic_tac_toe();
        let mut priors = vec![0.0; 9];
        priors[6] = 0.9;
        priors[7] = 0.1;
        let net = DummyNet { priors, value: 0.0 };

        let mut search = Mcts::new(&game, &net, quiet(0));
        let mut rng = StdRng::seed_from_u64(0);
        let state = game.initial_state();
        let pi = search.action_distribution(&state, Temperature::Explore, &mut rng);
        assert!((pi[6] - 0.9).abs() < 1e-6);
        let greedy = search.action_distribution(&state, Temperature::Greedy, &mut rng);
        assert_eq!(argmax(&greedy), 6);
    }

    #[test]
    fn test_factory_builds_fresh_trees() {
        let game = KInARow::tic_tac_toe();
        let net = DummyNet::uniform(9, 0.0);
        let factory = MctsFactory::new(&game, &net, quiet(10));
        let mut rng = StdRng::seed_from_u64(1);

        let mut first = factory.new_search();
        first.action_distribution(&game.initial_state(), Temperature::Explore, &mut rng);
        assert!(first.tree_size() > 1);

        let second = factory.new_search();
        assert_eq!(second.tree_size(), 0);
    }

    #[test]
    fn test_search_determinism() {
        let game = KInARow::tic_tac_toe();
        let net = DummyNet::uniform(9, 0.1);
        let run = || {
            let mut search = Mcts::new(&game, &net, MctsConfig::default());
            let mut rng = StdRng::seed_from_u64(42);
            search.action_distribution(&game.initial_state(), Temperature::Explore, &mut rng)
        };
        assert_eq!(run(), run());
    }
}
