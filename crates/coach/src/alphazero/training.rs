//! AlphaZero training loop
//!
//! This module provides:
//! - `TrainerConfig` and `LoadSpec` for configuration and resumption
//! - `Trainer`, which runs iterations of parallel self-play, history
//!   bookkeeping, checkpointing and gated training
//! - `IterationReport` / `RunSummary` describing what happened

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    history_file_name, model_file_name, run_episode, Arena, CheckpointConfig, CheckpointManager,
    Episode, GateMode, GateOutcome, HistoryWindow, IterationBuffer, MatchRunner,
    MissingHistoryPolicy, PromotionGate, SelfPlayConfig, BEST_MODEL_FILE,
};
use crate::{CoachError, ConfigError, Game, MctsConfig, MctsFactory, TrainableModel};

#[cfg(feature = "profiling")]
use crate::profiling::{log_summary, Timer, PROF};

/// Configuration for the training loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Last iteration to run (inclusive)
    pub num_iters: usize,

    /// Self-play games per iteration
    pub num_eps: usize,

    /// Share of decisive arena games the candidate must win
    pub update_threshold: f32,

    /// Capacity of one iteration's example buffer
    pub max_queue_len: usize,

    /// Evaluation games per iteration; 0 trains without gating
    pub arena_games: usize,

    /// Iterations kept in the training history
    pub history_depth: usize,

    /// First iteration to run (counts from 1)
    pub starting_iteration: usize,

    /// Seed of the orchestrator RNG
    pub seed: u64,

    /// Self-play worker threads; 0 lets rayon decide
    pub workers: usize,

    pub self_play: SelfPlayConfig,

    /// Search used in evaluation games
    pub arena_mcts: MctsConfig,

    pub checkpoint: CheckpointConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_iters: 10,
            num_eps: 100,
            update_threshold: 0.6,
            max_queue_len: 200_000,
            arena_games: 20,
            history_depth: 100,
            starting_iteration: 1,
            seed: 0,
            workers: 0,
            self_play: SelfPlayConfig::default(),
            arena_mcts: MctsConfig::default().without_noise(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("num_eps", self.num_eps),
            ("max_queue_len", self.max_queue_len),
            ("history_depth", self.history_depth),
            ("starting_iteration", self.starting_iteration),
            ("checkpoint.save_frequency", self.checkpoint.save_frequency),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    requirement: "at least 1",
                });
            }
        }
        if !(0.0..=1.0).contains(&self.update_threshold) {
            return Err(ConfigError::Invalid {
                field: "update_threshold",
                requirement: "within [0, 1]",
            });
        }
        Ok(())
    }

    pub fn gate_mode(&self) -> GateMode {
        if self.arena_games == 0 {
            GateMode::Ungated
        } else {
            GateMode::Arena {
                games: self.arena_games,
                update_threshold: self.update_threshold,
            }
        }
    }
}

/// Which snapshot to resume from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadSpec {
    /// Folder holding the snapshot; defaults to the checkpoint directory.
    pub folder: Option<PathBuf>,

    /// Iteration of the model and history files to load.
    pub iteration: usize,

    /// Load `best.model.json` instead of the iteration's model.
    pub use_best: bool,
}

/// What one iteration did.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,

    /// Episodes in this iteration's buffer, resumed ones included
    pub episodes: usize,

    /// Episodes restored from a partial record instead of played
    pub resumed_episodes: usize,

    /// Episodes stopped by the turn guard
    pub truncated_episodes: usize,

    /// Examples added to the history this iteration
    pub examples: usize,

    /// Iterations in the history window after this one
    pub history_len: usize,

    /// Examples trained on
    pub history_examples: usize,

    pub gate: GateOutcome,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<IterationReport>,
}

impl RunSummary {
    pub fn accepted(&self) -> usize {
        self.reports.iter().filter(|r| r.gate.accepted).count()
    }

    pub fn rejected(&self) -> usize {
        self.reports.len() - self.accepted()
    }

    pub fn episodes(&self) -> usize {
        self.reports.iter().map(|r| r.episodes).sum()
    }
}

/// Trainer state for running the AlphaZero training loop.
pub struct Trainer<G: Game, M: TrainableModel, R = Arena> {
    pub config: TrainerConfig,
    game: G,
    model: M,
    gate: PromotionGate<R>,
    checkpoints: CheckpointManager,
    history: HistoryWindow,

    /// Reuse a loaded history instead of playing iteration 1
    skip_first_self_play: bool,

    rng: StdRng,
    pool: rayon::ThreadPool,
}

impl<G: Game, M: TrainableModel> Trainer<G, M, Arena> {
    pub fn new(config: TrainerConfig, game: G, model: M) -> Result<Self, CoachError> {
        let arena = Arena {
            max_turns: config.self_play.max_turns,
        };
        Self::with_runner(config, game, model, arena)
    }
}

impl<G, M, R> Trainer<G, M, R>
where
    G: Game,
    M: TrainableModel,
    R: MatchRunner<G>,
{
    /// Create a trainer that evaluates candidates with `runner`.
    pub fn with_runner(
        config: TrainerConfig,
        game: G,
        model: M,
        runner: R,
    ) -> Result<Self, CoachError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()?;
        let gate = PromotionGate::new(config.gate_mode(), config.arena_mcts.clone(), runner);

        Ok(Self {
            checkpoints: CheckpointManager::from_config(&config.checkpoint),
            history: HistoryWindow::new(config.history_depth),
            rng: StdRng::seed_from_u64(config.seed),
            skip_first_self_play: false,
            config,
            game,
            model,
            gate,
            pool,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Load a model snapshot and the history generated by it.
    ///
    /// A missing model is an error. A missing history is resolved through
    /// `config.checkpoint.missing_history`; `confirm` is only called for
    /// `MissingHistoryPolicy::Prompt` and returns whether to continue.
    pub fn load(
        &mut self,
        spec: &LoadSpec,
        confirm: impl FnOnce(&Path) -> bool,
    ) -> Result<(), CoachError> {
        let folder = spec
            .folder
            .clone()
            .unwrap_or_else(|| self.config.checkpoint.dir.clone());

        let model_file = if spec.use_best {
            BEST_MODEL_FILE.to_string()
        } else {
            model_file_name(spec.iteration)
        };
        info!("Loading checkpoint {}", folder.join(&model_file).display());
        self.checkpoints
            .load_model(&mut self.model, &folder, &model_file)?;

        info!("Loading training history from file...");
        match self.checkpoints.load_history_from(&folder, spec.iteration)? {
            Some(mut window) => {
                window.set_depth(self.config.history_depth);
                // Progress of an iteration the history already holds is stale
                if let Some(last) = window.last_iteration() {
                    let removed = self.checkpoints.clear_partials_through(last)?;
                    if removed > 0 {
                        info!("Discarded {removed} partial records of committed iterations");
                    }
                }
                self.history = window;
                self.skip_first_self_play = true;
                info!("Loading done!");
            }
            None => {
                let path = folder.join(history_file_name(spec.iteration));
                let proceed = match self.config.checkpoint.missing_history {
                    MissingHistoryPolicy::Abort => false,
                    MissingHistoryPolicy::ContinueEmpty => true,
                    MissingHistoryPolicy::Prompt => confirm(&path),
                };
                if !proceed {
                    return Err(CoachError::MissingHistory { path });
                }
                warn!("Continuing with an empty training history");
            }
        }
        Ok(())
    }

    /// Run iterations `starting_iteration..=num_iters`.
    pub fn run(&mut self) -> Result<RunSummary, CoachError> {
        let first = self.config.starting_iteration;
        let last = self.config.num_iters;
        if first > last {
            warn!("Starting iteration {first} is past num_iters {last}; nothing to do");
        }

        let mut summary = RunSummary::default();
        for iteration in first..=last {
            summary.reports.push(self.run_iteration(iteration)?);
        }

        info!(
            "Finished {} iterations: {} accepted, {} rejected",
            summary.reports.len(),
            summary.accepted(),
            summary.rejected()
        );

        #[cfg(feature = "profiling")]
        log_summary();

        Ok(summary)
    }

    /// One iteration: self-play (unless reusing a loaded history), history
    /// update and checkpoint, then training behind the promotion gate.
    pub fn run_iteration(&mut self, iteration: usize) -> Result<IterationReport, CoachError> {
        info!("Starting Iter #{iteration} ...");

        let mut episodes = 0;
        let mut resumed_episodes = 0;
        let mut truncated_episodes = 0;
        let mut examples = 0;

        let committed = self.history.is_committed(iteration);
        let reuse_loaded = self.skip_first_self_play && iteration == 1;
        if committed {
            info!("Iteration {iteration} is already in the training history; skipping self-play");
        } else if reuse_loaded {
            info!("Reusing the loaded training history for iteration {iteration}");
        } else {
            let (generated, resumed) = self.generate(iteration)?;
            episodes = generated.len();
            resumed_episodes = resumed;
            truncated_episodes = generated.iter().filter(|e| e.truncated).count();

            let mut buffer = IterationBuffer::new(self.config.max_queue_len);
            for episode in generated {
                buffer.append_episode(episode);
            }
            examples = buffer.len();
            self.history.commit(iteration, buffer);
        }
        self.history.trim();

        // Generated with the model of the previous iteration
        self.checkpoints.save_history(&self.history, iteration - 1)?;
        // The history now holds this iteration, so its partial records must go
        self.checkpoints.clear_partials(iteration)?;

        let mut train_examples = self.history.flatten();
        train_examples.shuffle(&mut self.rng);

        let gate = self.gate.train_and_gate(
            &self.game,
            &mut self.model,
            &train_examples,
            iteration,
            &self.checkpoints,
        )?;

        Ok(IterationReport {
            iteration,
            episodes,
            resumed_episodes,
            truncated_episodes,
            examples,
            history_len: self.history.len(),
            history_examples: train_examples.len(),
            gate,
        })
    }

    /// Play the iteration's episodes, resuming from the best partial record.
    /// Returns all episodes in order and how many were resumed.
    fn generate(&mut self, iteration: usize) -> Result<(Vec<Episode>, usize), CoachError> {
        #[cfg(feature = "profiling")]
        let _t = Timer::new(&PROF.time_self_play_ns);

        let num_eps = self.config.num_eps;
        let save_frequency = self.config.checkpoint.save_frequency;

        let mut episodes = match self.checkpoints.latest_partial(iteration, num_eps) {
            Some(record) => {
                info!(
                    "Resuming iteration {iteration} from {} saved episodes",
                    record.completed_episodes
                );
                record.episodes
            }
            None => Vec::new(),
        };
        let resumed = episodes.len();

        let bar = progress_bar(num_eps, resumed);
        while episodes.len() < num_eps {
            let done = episodes.len();
            // Chunks end on multiples of save_frequency
            let chunk_end = ((done / save_frequency + 1) * save_frequency).min(num_eps);
            let seeds: Vec<u64> = (done..chunk_end).map(|_| self.rng.next_u64()).collect();

            let game = &self.game;
            let config = &self.config.self_play;
            let factory = MctsFactory::new(game, &self.model, config.mcts.clone());
            let chunk: Vec<Episode> = self.pool.install(|| {
                seeds
                    .par_iter()
                    .map(|&seed| {
                        let mut rng = StdRng::seed_from_u64(seed);
                        let start = Instant::now();
                        let episode = run_episode(game, &factory, config, &mut rng);
                        debug!(
                            "Game done in {}ms ({} turns)",
                            start.elapsed().as_millis(),
                            episode.turns
                        );
                        bar.inc(1);
                        episode
                    })
                    .collect()
            });

            episodes.extend(chunk);
            self.checkpoints.save_partial(iteration, &episodes)?;
        }
        bar.finish_and_clear();

        Ok((episodes, resumed))
    }
}

fn progress_bar(len: usize, done: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("Self Play [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_position(done as u64);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphazero::{read_partial, MatchTally, TrainingExample, PARTIAL_DIR};
    use crate::{DecisionPolicy, KInARow, TabularNet};

    /// Reports a fixed tally without playing.
    struct FixedRunner(MatchTally);

    impl<G: Game> MatchRunner<G> for FixedRunner {
        fn play_matches(
            &mut self,
            _game: &G,
            _a: &mut dyn DecisionPolicy<G>,
            _b: &mut dyn DecisionPolicy<G>,
            _count: usize,
        ) -> MatchTally {
            self.0
        }
    }

    fn config(dir: &Path) -> TrainerConfig {
        TrainerConfig {
            num_iters: 1,
            num_eps: 4,
            arena_games: 0,
            workers: 2,
            seed: 42,
            self_play: SelfPlayConfig {
                mcts: MctsConfig {
                    num_simulations: 8,
                    ..MctsConfig::default()
                },
                ..SelfPlayConfig::default()
            },
            arena_mcts: MctsConfig {
                num_simulations: 8,
                ..MctsConfig::default().without_noise()
            },
            checkpoint: CheckpointConfig {
                dir: dir.to_path_buf(),
                save_frequency: 2,
                ..CheckpointConfig::default()
            },
            ..TrainerConfig::default()
        }
    }

    fn model() -> TabularNet {
        TabularNet::new(9, 0.5, 1)
    }

    fn trainer(config: TrainerConfig) -> Trainer<KInARow, TabularNet> {
        Trainer::new(config, KInARow::tic_tac_toe(), model()).unwrap()
    }

    #[test]
    fn test_validate_rejects_zero_and_out_of_range() {
        assert!(TrainerConfig::default().validate().is_ok());

        let zero_eps = TrainerConfig {
            num_eps: 0,
            ..TrainerConfig::default()
        };
        assert!(matches!(
            zero_eps.validate(),
            Err(ConfigError::Invalid {
                field: "num_eps",
                ..
            })
        ));

        let mut zero_freq = TrainerConfig::default();
        zero_freq.checkpoint.save_frequency = 0;
        assert!(zero_freq.validate().is_err());

        let high = TrainerConfig {
            update_threshold: 1.5,
            ..TrainerConfig::default()
        };
        assert!(high.validate().is_err());

        let nan = TrainerConfig {
            update_threshold: f32::NAN,
            ..TrainerConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "num_eps": 7, "self_play": { "temp_threshold": 5 }, "checkpoint": { "missing_history": "continue_empty" } }"#,
        )
        .unwrap();

        let config = TrainerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.num_eps, 7);
        assert_eq!(config.self_play.temp_threshold, 5);
        assert_eq!(config.self_play.max_turns, Some(1_000));
        assert_eq!(
            config.checkpoint.missing_history,
            MissingHistoryPolicy::ContinueEmpty
        );
        assert_eq!(config.history_depth, 100);

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            TrainerConfig::from_json_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_gate_mode_from_arena_games() {
        let mut config = TrainerConfig::default();
        assert_eq!(
            config.gate_mode(),
            GateMode::Arena {
                games: 20,
                update_threshold: 0.6
            }
        );
        config.arena_games = 0;
        assert_eq!(config.gate_mode(), GateMode::Ungated);
    }

    #[test]
    fn test_iteration_commits_history_and_clears_partials() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(config(dir.path()));

        let report = trainer.run_iteration(1).unwrap();
        assert_eq!(report.episodes, 4);
        assert_eq!(report.resumed_episodes, 0);
        assert!(report.gate.accepted);
        assert_eq!(trainer.history().len(), 1);
        assert_eq!(report.examples, trainer.history().num_examples());
        assert_eq!(report.history_examples, report.examples);

        // tagged with the previous iteration
        let checkpoints = trainer.checkpoints();
        assert_eq!(checkpoints.load_history(0).unwrap().unwrap(), *trainer.history());
        assert!(checkpoints.model_path(1).is_file());
        assert!(checkpoints.partial_index().is_empty());
    }

    #[test]
    fn test_resume_generates_only_missing_episodes() {
        let dir = tempfile::tempdir().unwrap();

        // Three episodes of iteration 1 survived a crash
        let mut first = trainer(config(dir.path()));
        let (played, _) = first.generate(1).unwrap();
        let manager = CheckpointManager::new(dir.path(), None);
        manager.clear_partials(1).unwrap();
        manager.save_partial(1, &played[..3]).unwrap();

        let mut resumed = trainer(config(dir.path()));
        let (episodes, count) = resumed.generate(1).unwrap();
        assert_eq!(count, 3);
        assert_eq!(episodes.len(), 4);
        assert_eq!(&episodes[..3], &played[..3]);

        // the final partial holds every episode exactly once
        let last = read_partial(&dir.path().join(PARTIAL_DIR).join("iter_1_eps_4.json")).unwrap();
        assert_eq!(last.episodes, episodes);
    }

    #[test]
    fn test_only_newest_partial_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(TrainerConfig {
            num_eps: 5,
            ..config(dir.path())
        });

        trainer.generate(1).unwrap();
        let counts: Vec<usize> = trainer
            .checkpoints()
            .partial_index()
            .iter()
            .map(|(key, _)| key.completed_episodes)
            .collect();
        // saved after 2, 4 and 5 episodes; each save replaces the previous one
        assert_eq!(counts, vec![5]);
    }

    #[test]
    fn test_committed_iteration_is_not_replayed_after_crash() {
        let dir = tempfile::tempdir().unwrap();
        let base = TrainerConfig {
            num_eps: 2,
            ..config(dir.path())
        };

        // Iteration 2 reached the history save, then the process died before
        // its partial records were removed.
        let mut crashed = trainer(base.clone());
        crashed.run_iteration(1).unwrap();
        let (played, _) = crashed.generate(2).unwrap();
        let mut buffer = IterationBuffer::new(base.max_queue_len);
        for episode in played {
            buffer.append_episode(episode);
        }
        crashed.history.commit(2, buffer);
        crashed.checkpoints.save_history(&crashed.history, 1).unwrap();
        assert!(!crashed.checkpoints().partial_index().is_empty());

        let mut resumed = trainer(TrainerConfig {
            starting_iteration: 2,
            num_iters: 2,
            ..base
        });
        resumed
            .load(
                &LoadSpec {
                    iteration: 1,
                    use_best: true,
                    ..LoadSpec::default()
                },
                |_| false,
            )
            .unwrap();
        assert!(resumed.checkpoints().partial_index().is_empty());
        assert_eq!(resumed.history().len(), 2);

        let summary = resumed.run().unwrap();
        let report = &summary.reports[0];
        assert_eq!(report.iteration, 2);
        assert_eq!(report.episodes, 0);
        assert_eq!(report.resumed_episodes, 0);
        assert_eq!(resumed.history().len(), 2);
        assert_eq!(resumed.history(), crashed.history());
    }

    #[test]
    fn test_resume_mid_iteration_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let base = TrainerConfig {
            num_iters: 2,
            ..config(dir.path())
        };

        // Iteration 1 completed; iteration 2 stopped after two of four episodes.
        let mut crashed = trainer(base.clone());
        crashed.run_iteration(1).unwrap();
        let (played, _) = crashed.generate(2).unwrap();
        crashed.checkpoints.clear_partials(2).unwrap();
        crashed.checkpoints.save_partial(2, &played[..2]).unwrap();

        let mut resumed = trainer(TrainerConfig {
            starting_iteration: 2,
            ..base
        });
        resumed
            .load(
                &LoadSpec {
                    iteration: 0,
                    use_best: true,
                    ..LoadSpec::default()
                },
                |_| false,
            )
            .unwrap();
        assert_eq!(resumed.history().last_iteration(), Some(1));
        assert_eq!(resumed.checkpoints().partial_index().len(), 1);

        let summary = resumed.run().unwrap();
        let report = &summary.reports[0];
        assert_eq!(report.iteration, 2);
        assert_eq!(report.episodes, 4);
        assert_eq!(report.resumed_episodes, 2);
        assert_eq!(resumed.history().len(), 2);
        assert_eq!(resumed.history().last_iteration(), Some(2));

        // the resumed episodes lead the committed buffer
        let newest = resumed.history().iterations().last().unwrap();
        let restored: Vec<TrainingExample> = played[..2]
            .iter()
            .flat_map(|e| e.examples.iter().cloned())
            .collect();
        let head: Vec<TrainingExample> = newest.iter().take(restored.len()).cloned().collect();
        assert_eq!(head, restored);

        assert!(resumed.checkpoints().history_path(1).is_file());
        assert!(resumed.checkpoints().partial_index().is_empty());
    }

    #[test]
    fn test_same_seed_same_self_play() {
        let a_dir = tempfile::tempdir().unwrap();
        let b_dir = tempfile::tempdir().unwrap();
        let (a, _) = trainer(config(a_dir.path())).generate(1).unwrap();
        let (b, _) = trainer(TrainerConfig {
            workers: 1,
            ..config(b_dir.path())
        })
        .generate(1)
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_history_window_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(TrainerConfig {
            num_iters: 3,
            num_eps: 2,
            history_depth: 2,
            ..config(dir.path())
        });

        let summary = trainer.run().unwrap();
        assert_eq!(summary.reports.len(), 3);
        assert_eq!(summary.episodes(), 6);
        assert_eq!(trainer.history().len(), 2);
        assert_eq!(summary.reports[2].history_len, 2);
        for tag in 0..3 {
            assert!(trainer.checkpoints().history_path(tag).is_file());
        }
    }

    #[test]
    fn test_rejected_iteration_keeps_weights() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            arena_games: 20,
            ..config(dir.path())
        };
        let runner = FixedRunner(MatchTally {
            a_wins: 9,
            b_wins: 9,
            draws: 2,
        });
        let mut trainer =
            Trainer::with_runner(config, KInARow::tic_tac_toe(), model(), runner).unwrap();

        let report = trainer.run_iteration(1).unwrap();
        assert!(!report.gate.accepted);
        assert_eq!(trainer.model(), &model());
        assert!(!trainer.checkpoints().model_path(1).exists());
        // the history is committed regardless of the gate
        assert!(trainer.checkpoints().history_path(0).is_file());
    }

    #[test]
    fn test_load_skips_first_self_play() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = trainer(TrainerConfig {
            num_iters: 2,
            num_eps: 2,
            ..config(dir.path())
        });
        source.run().unwrap();

        let mut resumed = trainer(config(dir.path()));
        resumed
            .load(
                &LoadSpec {
                    iteration: 1,
                    ..LoadSpec::default()
                },
                |_| panic!("history exists"),
            )
            .unwrap();
        // checkpoint 1 is a trained model, and tag 1 holds both iterations
        assert_ne!(resumed.model(), &model());
        assert_eq!(resumed.history().len(), 2);
        assert_eq!(resumed.history(), source.history());

        let report = resumed.run_iteration(1).unwrap();
        assert_eq!(report.episodes, 0);
        assert_eq!(resumed.history().len(), 2);
    }

    #[test]
    fn test_missing_history_policies() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), None);
        manager.save_best(&model()).unwrap();
        let spec = LoadSpec {
            use_best: true,
            iteration: 5,
            ..LoadSpec::default()
        };

        let mut abort = trainer(config(dir.path()));
        let err = abort.load(&spec, |_| true).unwrap_err();
        assert!(matches!(err, CoachError::MissingHistory { .. }));

        let mut prompt_config = config(dir.path());
        prompt_config.checkpoint.missing_history = MissingHistoryPolicy::Prompt;
        let mut declined = trainer(prompt_config.clone());
        assert!(declined.load(&spec, |_| false).is_err());

        let mut asked = None;
        let mut accepted = trainer(prompt_config);
        accepted
            .load(&spec, |path| {
                asked = Some(path.to_path_buf());
                true
            })
            .unwrap();
        assert_eq!(asked, Some(dir.path().join("checkpoint_5.examples.json")));
        assert!(accepted.history().is_empty());

        let mut empty_config = config(dir.path());
        empty_config.checkpoint.missing_history = MissingHistoryPolicy::ContinueEmpty;
        assert!(trainer(empty_config).load(&spec, |_| false).is_ok());
    }

    #[test]
    fn test_missing_model_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(config(dir.path()));
        let err = trainer
            .load(
                &LoadSpec {
                    iteration: 3,
                    ..LoadSpec::default()
                },
                |_| true,
            )
            .unwrap_err();
        assert!(matches!(err, CoachError::Checkpoint(_)));
    }
}
