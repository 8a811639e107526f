//! Shared display utilities for rendering boards and policies in the terminal

use zerocoach_engine::{Board, FIRST, SECOND};

// ANSI codes
pub const RED: &str = "\x1b[91m";
pub const BLUE: &str = "\x1b[94m";
pub const GREEN: &str = "\x1b[92m";
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

/// Colorized stone for a cell value.
pub fn display_cell(cell: i8) -> String {
    match cell {
        FIRST => format!("{RED}X{RESET}"),
        SECOND => format!("{BLUE}O{RESET}"),
        _ => format!("{DIM}.{RESET}"),
    }
}

/// Board with row and column labels.
pub fn display_board(board: &Board) -> String {
    let n = board.size as usize;
    let mut out = String::from("   ");
    for col in 0..n {
        out.push_str(&format!("{col} "));
    }
    out.push('\n');
    for row in 0..n {
        out.push_str(&format!("{row:>2} "));
        for col in 0..n {
            out.push_str(&display_cell(board.cell(row, col)));
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

/// Policy laid out on the board, in percent. Occupied cells show the stone;
/// the most likely move is highlighted.
pub fn display_policy(board: &Board, policy: &[f32]) -> String {
    let n = board.size as usize;
    let best = policy
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i);

    let mut out = String::new();
    for row in 0..n {
        for col in 0..n {
            let index = row * n + col;
            let cell = board.cell(row, col);
            if cell != 0 {
                out.push_str(&format!("  {}  ", display_cell(cell)));
                continue;
            }
            let pct = policy.get(index).copied().unwrap_or(0.0) * 100.0;
            if Some(index) == best {
                out.push_str(&format!("{BOLD}{GREEN}{pct:>4.0}%{RESET}"));
            } else {
                out.push_str(&format!("{pct:>4.0}%"));
            }
        }
        out.push('\n');
    }
    out
}
