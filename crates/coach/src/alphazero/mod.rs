//! AlphaZero self-play training pipeline
//!
//! This module provides:
//! - `run_episode` and `SelfPlayConfig` for self-play games
//! - `IterationBuffer` and `HistoryWindow` for training examples
//! - `CheckpointManager` for resumable, mirrored persistence
//! - `Arena` and `PromotionGate` for evaluating trained models
//! - `Trainer` and `TrainerConfig` for running the training loop

pub mod arena;
pub mod buffer;
pub mod checkpoint;
pub mod episode;
pub mod examples;
pub mod gate;
pub mod training;

pub use arena::{Arena, MatchRunner, MatchTally};
pub use buffer::{HistoryWindow, IterationBuffer};
pub use checkpoint::{
    history_file_name, model_file_name, read_history, read_history_file, read_partial,
    CheckpointConfig, CheckpointManager, MissingHistoryPolicy, PartialKey, PartialRecord,
    BEST_MODEL_FILE, HISTORY_FORMAT_VERSION, PARTIAL_DIR,
};
pub use episode::{run_episode, SelfPlayConfig};
pub use examples::{Episode, PendingMove, TrainingExample};
pub use gate::{accepts, GateMode, GateOutcome, PromotionGate};
pub use training::{IterationReport, LoadSpec, RunSummary, Trainer, TrainerConfig};
