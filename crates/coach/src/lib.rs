//! Self-play training core
//!
//! This crate provides:
//! - Collaborator interfaces: `Game`, `SearchPolicy`/`SearchFactory`,
//!   `DecisionPolicy`, `PolicyValueNet`/`TrainableModel`, `MatchRunner`
//! - Reference collaborators: `KInARow` game adapter, PUCT `Mcts`, `TabularNet`, `Arena`
//! - The AlphaZero pipeline: episode generation, bounded example history,
//!   resumable checkpoints, promotion gate and the training loop (`Trainer`)

mod agent;
pub mod alphazero;
mod error;
mod game;
mod mcts;
mod model;
#[cfg(feature = "profiling")]
pub mod profiling;
mod types;

pub use agent::*;
pub use alphazero::*;
pub use error::*;
pub use game::*;
pub use mcts::{Mcts, MctsConfig, MctsFactory};
pub use model::*;
pub use types::*;
