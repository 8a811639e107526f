//! AlphaZero-style self-play training for k-in-a-row games
//!
//! This crate re-exports the engine and training-core crates for convenience.

pub mod display;

pub use zerocoach_core as coach;
pub use zerocoach_engine::*;
