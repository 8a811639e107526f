//! Profiling counters for the training loop.
//!
//! This module provides:
//! - Global counters for self-play, search, persistence and evaluation events
//! - Time accumulators for the phases of an iteration
//! - RAII-style scoped timers
//! - `log_summary` to report everything at the end of a run
//!
//! All functionality is gated behind the `profiling` feature flag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::info;

/// Global counters for profiling metrics.
pub struct Counters {
    // Event counters
    pub episodes: AtomicU64,
    pub turns: AtomicU64,
    pub examples: AtomicU64,
    pub truncated_episodes: AtomicU64,
    pub searches: AtomicU64,
    pub simulations: AtomicU64,
    pub nodes_created: AtomicU64,
    pub net_evals: AtomicU64,
    pub partial_saves: AtomicU64,
    pub history_saves: AtomicU64,
    pub model_saves: AtomicU64,
    pub train_calls: AtomicU64,
    pub arena_games: AtomicU64,

    // Time accumulators (in nanoseconds)
    pub time_self_play_ns: AtomicU64,
    pub time_search_ns: AtomicU64,
    pub time_net_eval_ns: AtomicU64,
    pub time_checkpoint_ns: AtomicU64,
    pub time_training_ns: AtomicU64,
    pub time_arena_ns: AtomicU64,
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            episodes: AtomicU64::new(0),
            turns: AtomicU64::new(0),
            examples: AtomicU64::new(0),
            truncated_episodes: AtomicU64::new(0),
            searches: AtomicU64::new(0),
            simulations: AtomicU64::new(0),
            nodes_created: AtomicU64::new(0),
            net_evals: AtomicU64::new(0),
            partial_saves: AtomicU64::new(0),
            history_saves: AtomicU64::new(0),
            model_saves: AtomicU64::new(0),
            train_calls: AtomicU64::new(0),
            arena_games: AtomicU64::new(0),

            time_self_play_ns: AtomicU64::new(0),
            time_search_ns: AtomicU64::new(0),
            time_net_eval_ns: AtomicU64::new(0),
            time_checkpoint_ns: AtomicU64::new(0),
            time_training_ns: AtomicU64::new(0),
            time_arena_ns: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 19] {
        [
            &self.episodes,
            &self.turns,
            &self.examples,
            &self.truncated_episodes,
            &self.searches,
            &self.simulations,
            &self.nodes_created,
            &self.net_evals,
            &self.partial_saves,
            &self.history_saves,
            &self.model_saves,
            &self.train_calls,
            &self.arena_games,
            &self.time_self_play_ns,
            &self.time_search_ns,
            &self.time_net_eval_ns,
            &self.time_checkpoint_ns,
            &self.time_training_ns,
            &self.time_arena_ns,
        ]
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

/// Global profiling counters instance.
pub static PROF: Counters = Counters::new();

/// Scoped timer that adds the elapsed time to `dest` on drop.
///
/// ```ignore
/// let _t = Timer::new(&PROF.time_self_play_ns);
/// ```
pub struct Timer {
    start: Instant,
    dest: &'static AtomicU64,
}

impl Timer {
    #[inline]
    pub fn new(dest: &'static AtomicU64) -> Self {
        Self {
            start: Instant::now(),
            dest,
        }
    }
}

impl Drop for Timer {
    #[inline]
    fn drop(&mut self) {
        let elapsed_ns = self.start.elapsed().as_nanos() as u64;
        self.dest.fetch_add(elapsed_ns, Ordering::Relaxed);
    }
}

/// Log a human-readable summary of counters and timings at info level.
pub fn log_summary() {
    let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
    let secs = |ns: u64| ns as f64 / 1_000_000_000.0;

    let episodes = load(&PROF.episodes);
    let turns = load(&PROF.turns);
    let searches = load(&PROF.searches);
    let simulations = load(&PROF.simulations);
    let self_play_ns = load(&PROF.time_self_play_ns);
    let search_ns = load(&PROF.time_search_ns);

    info!("=== Profiling Summary ===");
    info!("Episodes:            {:>12}", episodes);
    info!("Turns:               {:>12}", turns);
    info!("Examples:            {:>12}", load(&PROF.examples));
    info!("Truncated episodes:  {:>12}", load(&PROF.truncated_episodes));
    info!("Searches:            {:>12}", searches);
    info!("Simulations:         {:>12}", simulations);
    info!("Nodes created:       {:>12}", load(&PROF.nodes_created));
    info!("Net evaluations:     {:>12}", load(&PROF.net_evals));
    info!("Partial saves:       {:>12}", load(&PROF.partial_saves));
    info!("History saves:       {:>12}", load(&PROF.history_saves));
    info!("Model saves:         {:>12}", load(&PROF.model_saves));
    info!("Train calls:         {:>12}", load(&PROF.train_calls));
    info!("Arena games:         {:>12}", load(&PROF.arena_games));

    info!("Self-play:   {:>10.3} s", secs(self_play_ns));
    info!("Search:      {:>10.3} s", secs(search_ns));
    info!("Net eval:    {:>10.3} s", secs(load(&PROF.time_net_eval_ns)));
    info!("Checkpoint:  {:>10.3} s", secs(load(&PROF.time_checkpoint_ns)));
    info!("Training:    {:>10.3} s", secs(load(&PROF.time_training_ns)));
    info!("Arena:       {:>10.3} s", secs(load(&PROF.time_arena_ns)));

    if episodes > 0 {
        info!("Turns/episode:       {:>10.2}", turns as f64 / episodes as f64);
    }
    if self_play_ns > 0 && episodes > 0 {
        info!("Episodes/sec:        {:>10.2}", episodes as f64 / secs(self_play_ns));
    }
    if searches > 0 {
        info!("Simulations/search:  {:>10.2}", simulations as f64 / searches as f64);
    }
    if search_ns > 0 && simulations > 0 {
        info!("Simulations/sec:     {:>10.0}", simulations as f64 / secs(search_ns));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_accumulates() {
        static SLOT: AtomicU64 = AtomicU64::new(0);
        {
            let _t = Timer::new(&SLOT);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(SLOT.load(Ordering::Relaxed) >= 1_000_000);
    }

    #[test]
    fn test_reset_clears_local_counters() {
        let counters = Counters::new();
        counters.episodes.fetch_add(3, Ordering::Relaxed);
        counters.time_arena_ns.fetch_add(10, Ordering::Relaxed);
        counters.reset();
        assert_eq!(counters.episodes.load(Ordering::Relaxed), 0);
        assert_eq!(counters.time_arena_ns.load(Ordering::Relaxed), 0);
    }
}
