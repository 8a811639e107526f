//! Promotion gate: train a candidate and decide whether it replaces the incumbent

use log::info;
use serde::{Deserialize, Serialize};

use super::{CheckpointManager, MatchRunner, MatchTally, TrainingExample};
use crate::{CoachError, Game, GreedyPolicy, MctsConfig, MctsFactory, TrainStats, TrainableModel};

#[cfg(feature = "profiling")]
use crate::profiling::{Timer, PROF};
#[cfg(feature = "profiling")]
use std::sync::atomic::Ordering;

/// How a freshly trained model is promoted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GateMode {
    /// Always keep the trained model.
    Ungated,
    /// Keep it only if it beats the pre-training snapshot often enough.
    Arena { games: usize, update_threshold: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GateOutcome {
    pub accepted: bool,
    /// `a` is the incumbent, `b` the candidate. `None` in ungated mode.
    pub tally: Option<MatchTally>,
    pub train: TrainStats,
}

/// Acceptance law: at least one decisive game, and the candidate's share of
/// decisive games reaches `update_threshold`. Draws count for neither side.
pub fn accepts(tally: &MatchTally, update_threshold: f32) -> bool {
    let decisive = tally.decisive();
    decisive > 0 && tally.b_wins as f32 / decisive as f32 >= update_threshold
}

pub struct PromotionGate<R> {
    pub mode: GateMode,
    /// Search used by both sides of evaluation games.
    pub arena_mcts: MctsConfig,
    runner: R,
}

impl<R> PromotionGate<R> {
    pub fn new(mode: GateMode, arena_mcts: MctsConfig, runner: R) -> Self {
        Self {
            mode,
            arena_mcts,
            runner,
        }
    }

    /// Train `model` on `examples` and decide whether to keep the result.
    ///
    /// Accepted models are saved as checkpoint `iteration` and as the best
    /// model. A rejected (or failed) training step leaves `model` exactly as
    /// it was before the call.
    pub fn train_and_gate<G, M>(
        &mut self,
        game: &G,
        model: &mut M,
        examples: &[TrainingExample],
        iteration: usize,
        checkpoints: &CheckpointManager,
    ) -> Result<GateOutcome, CoachError>
    where
        G: Game,
        M: TrainableModel,
        R: MatchRunner<G>,
    {
        match self.mode.clone() {
            GateMode::Ungated => {
                let train = train(model, examples)?;
                info!("Saving checkpoint {iteration}");
                checkpoints.save_model(model, iteration)?;
                checkpoints.save_best(model)?;
                Ok(GateOutcome {
                    accepted: true,
                    tally: None,
                    train,
                })
            }
            GateMode::Arena {
                games,
                update_threshold,
            } => {
                // Captured before any training call
                let snapshot = model.clone();
                let train = match train(model, examples) {
                    Ok(stats) => stats,
                    Err(e) => {
                        *model = snapshot;
                        return Err(e);
                    }
                };

                info!("Pitting against previous version");
                let tally = {
                    #[cfg(feature = "profiling")]
                    let _t = Timer::new(&PROF.time_arena_ns);

                    let mut incumbent =
                        GreedyPolicy::new(MctsFactory::new(game, &snapshot, self.arena_mcts.clone()));
                    let mut candidate =
                        GreedyPolicy::new(MctsFactory::new(game, &*model, self.arena_mcts.clone()));
                    self.runner
                        .play_matches(game, &mut incumbent, &mut candidate, games)
                };
                info!(
                    "NEW/PREV WINS : {} / {} ; DRAWS : {}",
                    tally.b_wins, tally.a_wins, tally.draws
                );

                let accepted = accepts(&tally, update_threshold);
                if accepted {
                    info!("Accepting new model");
                    checkpoints.save_model(model, iteration)?;
                    checkpoints.save_best(model)?;
                } else {
                    info!("Rejecting new model");
                    *model = snapshot;
                }
                Ok(GateOutcome {
                    accepted,
                    tally: Some(tally),
                    train,
                })
            }
        }
    }
}

fn train<M: TrainableModel>(
    model: &mut M,
    examples: &[TrainingExample],
) -> Result<TrainStats, CoachError> {
    #[cfg(feature = "profiling")]
    let _t = Timer::new(&PROF.time_training_ns);
    #[cfg(feature = "profiling")]
    PROF.train_calls.fetch_add(1, Ordering::Relaxed);

    let stats = model.train(examples)?;
    info!(
        "Trained on {} examples: policy loss {:.4}, value loss {:.4}",
        stats.examples, stats.policy_loss, stats.value_loss
    );
    Ok(stats)
}
