//! Game interface consumed by the training loop, and the k-in-a-row adapter

use zerocoach_engine::{self as engine, Board, DimensionError, Outcome};

use crate::{ActionId, Player};

/// Terminal value reported for a drawn game: nonzero so that it ends the
/// episode, small enough to carry almost no training signal.
pub const DRAW_VALUE: f32 = 1e-4;

/// Two-player, perfect-information game with alternating (or engine-chosen) turns.
pub trait Game: Clone + Send + Sync {
    type State: Clone + Send + Sync + std::fmt::Debug;

    /// Number of discrete actions; every policy vector has this length.
    fn action_size(&self) -> usize;

    /// Starting position. `Player::First` moves first.
    fn initial_state(&self) -> Self::State;

    /// Position seen from `player`'s side, so that search and model never
    /// special-case player identity.
    fn canonical_view(&self, state: &Self::State, player: Player) -> Self::State;

    /// Mask over actions legal for `player`.
    fn valid_actions(&self, state: &Self::State, player: Player) -> Vec<bool>;

    /// Symmetry-equivalent (state, policy) pairs, including the identity.
    fn symmetries(&self, state: &Self::State, policy: &[f32]) -> Vec<(Self::State, Vec<f32>)>;

    /// Apply `action` for `player`, returning the new state and the player to move.
    ///
    /// # Panics
    /// Implementations may panic when `action` is not valid for `player`.
    fn apply_action(
        &self,
        state: &Self::State,
        player: Player,
        action: ActionId,
    ) -> (Self::State, Player);

    /// 0 while the game is running; otherwise the result from `player`'s
    /// perspective: 1 win, -1 loss, any other nonzero value a draw.
    fn terminal_outcome(&self, state: &Self::State, player: Player) -> f32;

    /// Outcome forced on games cut off by a turn limit.
    fn draw_value(&self) -> f32 {
        DRAW_VALUE
    }

    /// Opaque byte encoding stored in training examples.
    fn encode(&self, state: &Self::State) -> Vec<u8>;

    /// Human-readable rendering for verbose logs.
    fn render(&self, state: &Self::State) -> String {
        format!("{state:?}")
    }
}

/// True for a win or a loss, false for a draw or an ongoing game.
pub fn is_decisive(outcome: f32) -> bool {
    outcome >= 1.0 || outcome <= -1.0
}

/// k-in-a-row on a square board, backed by `zerocoach_engine`.
#[derive(Clone, Debug)]
pub struct KInARow {
    size: u8,
    win_len: u8,
}

impl KInARow {
    pub fn new(size: u8, win_len: u8) -> Result<Self, DimensionError> {
        engine::check_dimensions(size, win_len)?;
        Ok(Self { size, win_len })
    }

    pub fn tic_tac_toe() -> Self {
        Self {
            size: 3,
            win_len: 3,
        }
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn win_len(&self) -> u8 {
        self.win_len
    }
}

impl Game for KInARow {
    type State = Board;

    fn action_size(&self) -> usize {
        self.size as usize * self.size as usize
    }

    fn initial_state(&self) -> Board {
        engine::new_board(self.size, self.win_len)
    }

    fn canonical_view(&self, state: &Board, player: Player) -> Board {
        engine::canonical(state, player.sign())
    }

    fn valid_actions(&self, state: &Board, _player: Player) -> Vec<bool> {
        engine::legal_moves(state)
    }

    fn symmetries(&self, state: &Board, policy: &[f32]) -> Vec<(Board, Vec<f32>)> {
        engine::symmetries(state, policy)
    }

    fn apply_action(&self, state: &Board, player: Player, action: ActionId) -> (Board, Player) {
        let next = engine::apply_move(state, player.sign(), action)
            .unwrap_or_else(|e| panic!("search produced an invalid action {action}: {e}"));
        (next, player.opponent())
    }

    fn terminal_outcome(&self, state: &Board, player: Player) -> f32 {
        match engine::outcome(state) {
            Outcome::Ongoing => 0.0,
            Outcome::Won(side) if side == player.sign() => 1.0,
            Outcome::Won(_) => -1.0,
            Outcome::Draw => DRAW_VALUE,
        }
    }

    fn encode(&self, state: &Board) -> Vec<u8> {
        engine::encode(state)
    }

    fn render(&self, state: &Board) -> String {
        let n = state.size as usize;
        let mut out = String::with_capacity(n * (n + 1));
        for row in 0..n {
            for col in 0..n {
                out.push(match state.cell(row, col) {
                    engine::FIRST => 'X',
                    engine::SECOND => 'O',
                    _ => '.',
                });
            }
            if row + 1 < n {
                out.push('\n');
            }
        }
        out
    }
}
