//! Inspection tool for a checkpoint directory
//!
//! Lists the saved histories and partial self-play records, and shows what a
//! saved model and its search think of a position.
//!
//! Usage: cargo run --bin inspect -- --dir ./checkpoints --model best.model.json --moves 4,0

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::SeedableRng;

use zerocoach::coach::{
    read_history_file, CheckpointManager, Game, KInARow, Mcts, MctsConfig, Player, PolicyValueNet,
    SearchPolicy, TabularNet, Temperature, TrainingExample, BEST_MODEL_FILE,
};
use zerocoach::display::{display_board, display_policy, BOLD, RESET};

#[derive(Parser, Debug)]
#[command(name = "inspect")]
#[command(about = "Inspect checkpoints, network predictions and MCTS behavior", long_about = None)]
struct Args {
    /// Checkpoint directory
    #[arg(long, default_value = "./checkpoints")]
    dir: PathBuf,

    /// Model file inside the directory
    #[arg(long, default_value = BEST_MODEL_FILE)]
    model: String,

    #[arg(long, default_value_t = 3)]
    board_size: u8,

    #[arg(long, default_value_t = 3)]
    win_len: u8,

    /// Comma-separated cells played from the empty board
    #[arg(long, value_delimiter = ',')]
    moves: Vec<usize>,

    /// Number of MCTS simulations
    #[arg(long, default_value_t = 200)]
    mcts_sims: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Counts of won, lost and drawn value targets.
fn value_breakdown<'a>(examples: impl Iterator<Item = &'a TrainingExample>) -> (usize, usize, usize) {
    let mut counts = (0, 0, 0);
    for e in examples {
        if e.value_target >= 1.0 {
            counts.0 += 1;
        } else if e.value_target <= -1.0 {
            counts.1 += 1;
        } else {
            counts.2 += 1;
        }
    }
    counts
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let manager = CheckpointManager::new(&args.dir, None);

    println!("{BOLD}=== HISTORY CHECKPOINTS ==={RESET}");
    let mut histories: Vec<PathBuf> = fs::read_dir(&args.dir)
        .with_context(|| format!("could not read {}", args.dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("checkpoint_") && n.ends_with(".examples.json"))
        })
        .collect();
    histories.sort();
    if histories.is_empty() {
        println!("  none");
    }
    for path in histories {
        match read_history_file(&path) {
            Ok((tag, window)) => {
                let last = window
                    .last_iteration()
                    .map_or_else(|| "-".to_string(), |i| i.to_string());
                println!(
                    "  tag {tag:>4}: {} iterations, {} examples (depth {}, last committed {last})",
                    window.len(),
                    window.num_examples(),
                    window.depth()
                );
                for (i, buffer) in window.iterations().enumerate() {
                    let (wins, losses, draws) = value_breakdown(buffer.iter());
                    println!(
                        "    [{i:>3}] {:>7} examples  +1: {wins:>6}  -1: {losses:>6}  draw: {draws:>6}",
                        buffer.len()
                    );
                }
            }
            Err(e) => println!("  {}: unreadable ({e})", path.display()),
        }
    }

    println!("\n{BOLD}=== PARTIAL RECORDS ==={RESET}");
    let partials = manager.partial_index();
    if partials.is_empty() {
        println!("  none");
    }
    for (key, path) in partials {
        println!(
            "  iteration {:>4}: {:>5} episodes  {}",
            key.iteration,
            key.completed_episodes,
            path.display()
        );
    }

    let game = KInARow::new(args.board_size, args.win_len).context("unsupported board")?;
    let mut net = TabularNet::new(game.action_size(), 0.5, 1);
    let loaded = manager
        .load_model(&mut net, &args.dir, &args.model)
        .context("could not load model")?;
    println!("\n{BOLD}=== MODEL ==={RESET}");
    println!("  {} ({} positions)", loaded.display(), net.len());

    let mut state = game.initial_state();
    let mut player = Player::First;
    for &action in &args.moves {
        let canonical = game.canonical_view(&state, player);
        let valid = game.valid_actions(&canonical, Player::First);
        if !valid.get(action).copied().unwrap_or(false) {
            bail!("move {action} is not legal here");
        }
        (state, player) = game.apply_action(&state, player, action);
    }
    println!("\n{}", display_board(&state));
    println!("{player:?} to move");

    let canonical = game.canonical_view(&state, player);
    let (policy, value) = net.predict(&game.encode(&canonical));
    println!("\n{BOLD}=== RAW NETWORK OUTPUTS ==={RESET}");
    println!("Value: {value:.4}");
    println!("{}", display_policy(&state, &policy));

    let config = MctsConfig {
        num_simulations: args.mcts_sims,
        ..MctsConfig::default().without_noise()
    };
    let mut mcts = Mcts::new(&game, &net, config);
    let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);
    let visits = mcts.action_distribution(&canonical, Temperature::Explore, &mut rng);
    println!("{BOLD}=== MCTS SEARCH ({} simulations) ==={RESET}", args.mcts_sims);
    println!("{}", display_policy(&state, &visits));

    Ok(())
}
