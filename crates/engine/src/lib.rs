//! k-in-a-row Game Engine
//!
//! A Markov game state engine for m,n,k games on a square board (3x3 with k=3 is
//! tic-tac-toe), designed for self-play training.
//! Core object is a single `Board` (plain data). No logic baked into methods;
//! pure functions operate on it.

// =============================================================================
// Section 1: Basic types and constants
// =============================================================================

/// Side to move, as a sign: `FIRST` (+1) or `SECOND` (-1).
pub type Side = i8;

/// Cell contents: 0 for empty, otherwise the `Side` that occupies it.
pub type Cell = i8;

pub const FIRST: Side = 1;
pub const SECOND: Side = -1;
pub const EMPTY: Cell = 0;

pub const MIN_SIZE: u8 = 3;
pub const MAX_SIZE: u8 = 9;

/// Number of dihedral transforms of a square (4 rotations x optional mirror).
pub const NUM_SYMMETRIES: usize = 8;

// =============================================================================
// Section 2: Board
// =============================================================================

/// Complete game state. Whose turn it is lives outside the board, the same way
/// the training loop tracks the current player.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Board {
    /// Side length of the square board
    pub size: u8,

    /// Stones in a row needed to win
    pub win_len: u8,

    /// Row-major cells, len == size * size
    pub cells: Vec<Cell>,
}

impl Board {
    /// Number of cells, which is also the size of the action space.
    pub fn area(&self) -> usize {
        self.size as usize * self.size as usize
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.cells[row * self.size as usize + col]
    }
}

/// Terminal status of a board
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Ongoing,
    Won(Side),
    Draw,
}

// =============================================================================
// Section 3: State transitions and rules as pure functions
// =============================================================================

/// Error types for apply_move
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MoveError {
    OutOfBounds(usize),
    Occupied(usize),
    GameOver,
    InvalidSide(Side),
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveError::OutOfBounds(a) => write!(f, "action {a} is outside the board"),
            MoveError::Occupied(a) => write!(f, "cell {a} is already occupied"),
            MoveError::GameOver => write!(f, "game is already over"),
            MoveError::InvalidSide(s) => write!(f, "invalid side {s}"),
        }
    }
}

impl std::error::Error for MoveError {}

/// Unsupported board dimensions
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DimensionError {
    Size(u8),
    WinLen { size: u8, win_len: u8 },
}

impl std::fmt::Display for DimensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DimensionError::Size(size) => {
                write!(f, "board size {size} is outside {MIN_SIZE}..={MAX_SIZE}")
            }
            DimensionError::WinLen { size, win_len } => {
                write!(f, "win length {win_len} is outside 3..={size}")
            }
        }
    }
}

impl std::error::Error for DimensionError {}

/// Check that `new_board(size, win_len)` is supported.
pub fn check_dimensions(size: u8, win_len: u8) -> Result<(), DimensionError> {
    if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
        return Err(DimensionError::Size(size));
    }
    if win_len < 3 || win_len > size {
        return Err(DimensionError::WinLen { size, win_len });
    }
    Ok(())
}

/// Create an empty board. Panics on dimensions rejected by `check_dimensions`.
pub fn new_board(size: u8, win_len: u8) -> Board {
    if let Err(e) = check_dimensions(size, win_len) {
        panic!("{e}");
    }

    Board {
        size,
        win_len,
        cells: vec![EMPTY; size as usize * size as usize],
    }
}

/// Mask over cells: true where a stone may be placed.
/// Empty once the game is over.
pub fn legal_moves(board: &Board) -> Vec<bool> {
    if outcome(board) != Outcome::Ongoing {
        return vec![false; board.area()];
    }
    board.cells.iter().map(|&c| c == EMPTY).collect()
}

/// Place a stone for `side` at `action` (row-major cell index).
pub fn apply_move(board: &Board, side: Side, action: usize) -> Result<Board, MoveError> {
    if side != FIRST && side != SECOND {
        return Err(MoveError::InvalidSide(side));
    }
    if action >= board.area() {
        return Err(MoveError::OutOfBounds(action));
    }
    if board.cells[action] != EMPTY {
        return Err(MoveError::Occupied(action));
    }
    if outcome(board) != Outcome::Ongoing {
        return Err(MoveError::GameOver);
    }

    let mut next = board.clone();
    next.cells[action] = side;
    Ok(next)
}

/// Side with `win_len` stones in a line, if any.
pub fn winner(board: &Board) -> Option<Side> {
    let n = board.size as i32;
    let k = board.win_len as i32;
    // right, down, down-right, down-left
    const DIRS: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

    for row in 0..n {
        for col in 0..n {
            let side = board.cell(row as usize, col as usize);
            if side == EMPTY {
                continue;
            }
            for (dr, dc) in DIRS {
                let end_r = row + dr * (k - 1);
                let end_c = col + dc * (k - 1);
                if end_r < 0 || end_r >= n || end_c < 0 || end_c >= n {
                    continue;
                }
                let line = (1..k).all(|step| {
                    board.cell((row + dr * step) as usize, (col + dc * step) as usize) == side
                });
                if line {
                    return Some(side);
                }
            }
        }
    }
    None
}

/// Terminal status: a line wins, a full board without a line is a draw.
pub fn outcome(board: &Board) -> Outcome {
    if let Some(side) = winner(board) {
        return Outcome::Won(side);
    }
    if board.cells.iter().all(|&c| c != EMPTY) {
        return Outcome::Draw;
    }
    Outcome::Ongoing
}

/// Board from `side`'s perspective: own stones become `FIRST`.
pub fn canonical(board: &Board, side: Side) -> Board {
    Board {
        size: board.size,
        win_len: board.win_len,
        cells: board.cells.iter().map(|&c| c * side).collect(),
    }
}

// =============================================================================
// Section 4: Symmetries and encoding
// =============================================================================

/// Map a cell index through dihedral transform `t` (0..NUM_SYMMETRIES).
/// Transforms 0..4 rotate clockwise `t` times; 4..8 additionally mirror columns.
pub fn transform_index(size: u8, t: usize, index: usize) -> usize {
    let n = size as usize;
    let (mut r, mut c) = (index / n, index % n);
    for _ in 0..(t % 4) {
        let (nr, nc) = (c, n - 1 - r);
        r = nr;
        c = nc;
    }
    if t >= 4 {
        c = n - 1 - c;
    }
    r * n + c
}

/// All 8 symmetric (board, policy) pairs; the identity comes first.
///
/// `policy` must have one entry per cell.
pub fn symmetries(board: &Board, policy: &[f32]) -> Vec<(Board, Vec<f32>)> {
    assert_eq!(policy.len(), board.area(), "policy length must match board area");

    (0..NUM_SYMMETRIES)
        .map(|t| {
            let mut cells = vec![EMPTY; board.area()];
            let mut pi = vec![0.0f32; board.area()];
            for i in 0..board.area() {
                let j = transform_index(board.size, t, i);
                cells[j] = board.cells[i];
                pi[j] = policy[i];
            }
            (
                Board {
                    size: board.size,
                    win_len: board.win_len,
                    cells,
                },
                pi,
            )
        })
        .collect()
}

/// Compact byte encoding: one byte per cell (0 empty, 1 first, 2 second).
pub fn encode(board: &Board) -> Vec<u8> {
    board
        .cells
        .iter()
        .map(|&c| match c {
            FIRST => 1,
            SECOND => 2,
            _ => 0,
        })
        .collect()
}

/// Inverse of `encode`; None if the byte length or contents do not fit.
pub fn decode(size: u8, win_len: u8, bytes: &[u8]) -> Option<Board> {
    if bytes.len() != size as usize * size as usize {
        return None;
    }
    let cells = bytes
        .iter()
        .map(|&b| match b {
            0 => Some(EMPTY),
            1 => Some(FIRST),
            2 => Some(SECOND),
            _ => None,
        })
        .collect::<Option<Vec<Cell>>>()?;
    Some(Board {
        size,
        win_len,
        cells,
    })
}
