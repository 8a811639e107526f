//! AlphaZero training CLI for k-in-a-row games
//!
//! This binary runs the self-play training loop, optionally resuming from a
//! saved checkpoint.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dialoguer::Confirm;
use log::info;

use zerocoach::coach::{KInARow, LoadSpec, MissingHistoryPolicy, TabularNet, Trainer, TrainerConfig};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MissingHistory {
    Abort,
    Continue,
    Prompt,
}

impl From<MissingHistory> for MissingHistoryPolicy {
    fn from(value: MissingHistory) -> Self {
        match value {
            MissingHistory::Abort => MissingHistoryPolicy::Abort,
            MissingHistory::Continue => MissingHistoryPolicy::ContinueEmpty,
            MissingHistory::Prompt => MissingHistoryPolicy::Prompt,
        }
    }
}

/// AlphaZero self-play training
#[derive(Parser, Debug)]
#[command(name = "zerocoach")]
#[command(about = "Self-play training loop with resumable checkpoints", long_about = None)]
struct Args {
    /// JSON trainer config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Board side length
    #[arg(long, default_value_t = 3)]
    board_size: u8,

    /// Stones in a row needed to win
    #[arg(long, default_value_t = 3)]
    win_len: u8,

    /// Learning rate of the tabular model
    #[arg(long, default_value_t = 0.5)]
    learning_rate: f32,

    /// Passes over the examples per training call
    #[arg(long, default_value_t = 1)]
    epochs: usize,

    /// Last training iteration
    #[arg(long)]
    num_iters: Option<usize>,

    /// Self-play games per iteration
    #[arg(long)]
    num_eps: Option<usize>,

    /// MCTS simulations per move
    #[arg(long)]
    mcts_sims: Option<u32>,

    /// Evaluation games per iteration (0 disables gating)
    #[arg(long)]
    arena_games: Option<usize>,

    /// Directory for checkpoints
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Mirror every checkpoint write here
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Self-play worker threads (0 = all cores)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// First iteration to run
    #[arg(long)]
    starting_iteration: Option<usize>,

    /// Resume from this iteration's model and history
    #[arg(long)]
    load_iteration: Option<usize>,

    /// Load the best model instead of the --load-iteration one; the history
    /// still comes from --load-iteration
    #[arg(long, requires = "load_iteration")]
    load_best: bool,

    /// Folder to resume from (defaults to the checkpoint directory)
    #[arg(long, requires = "load_iteration")]
    load_folder: Option<PathBuf>,

    /// What to do when the history to resume from is missing
    #[arg(long, value_enum)]
    missing_history: Option<MissingHistory>,
}

impl Args {
    fn trainer_config(&self) -> Result<TrainerConfig> {
        let mut config = match &self.config {
            Some(path) => TrainerConfig::from_json_file(path)?,
            None => TrainerConfig::default(),
        };

        if let Some(v) = self.num_iters {
            config.num_iters = v;
        }
        if let Some(v) = self.num_eps {
            config.num_eps = v;
        }
        if let Some(v) = self.mcts_sims {
            config.self_play.mcts.num_simulations = v;
            config.arena_mcts.num_simulations = v;
        }
        if let Some(v) = self.starting_iteration {
            config.starting_iteration = v;
        }
        if let Some(v) = self.arena_games {
            config.arena_games = v;
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint.dir = dir.clone();
        }
        if let Some(dir) = &self.backup_dir {
            config.checkpoint.backup_dir = Some(dir.clone());
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.missing_history {
            config.checkpoint.missing_history = v.into();
        }
        Ok(config)
    }
}

fn confirm_missing_history(path: &Path) -> bool {
    Confirm::new()
        .with_prompt(format!(
            "No training history at {}. Continue with an empty history?",
            path.display()
        ))
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let game = KInARow::new(args.board_size, args.win_len).context("unsupported board")?;

    let config = args.trainer_config()?;
    info!("Training configuration:");
    info!("  Iterations: {}..={}", config.starting_iteration, config.num_iters);
    info!("  Episodes per iteration: {}", config.num_eps);
    info!("  MCTS simulations: {}", config.self_play.mcts.num_simulations);
    info!("  Arena games: {}", config.arena_games);
    info!("  Checkpoint directory: {}", config.checkpoint.dir.display());
    if let Some(backup) = &config.checkpoint.backup_dir {
        info!("  Backup directory: {}", backup.display());
    }

    let model = TabularNet::new(
        args.board_size as usize * args.board_size as usize,
        args.learning_rate,
        args.epochs,
    );
    let mut trainer = Trainer::new(config, game, model).context("invalid configuration")?;

    if let Some(iteration) = args.load_iteration {
        let spec = LoadSpec {
            folder: args.load_folder.clone(),
            iteration,
            use_best: args.load_best,
        };
        trainer
            .load(&spec, confirm_missing_history)
            .context("could not resume from checkpoint")?;
    }

    let summary = trainer.run()?;
    info!(
        "Training complete: {} episodes, {} models accepted",
        summary.episodes(),
        summary.accepted()
    );
    Ok(())
}
