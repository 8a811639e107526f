//! Benchmark for self-play episode generation
//!
//! Measures run_episode with a uniform search (pure game overhead) and with
//! PUCT search over DummyNet (search overhead without network cost).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;

use zerocoach_core::{
    run_episode, Game, KInARow, MctsConfig, MctsFactory, PolicyValueNet, SelfPlayConfig,
    UniformSearch,
};

/// Dummy network that returns uniform policy and zero value.
struct DummyNet {
    action_size: usize,
}

impl PolicyValueNet for DummyNet {
    fn predict(&self, _state: &[u8]) -> (Vec<f32>, f32) {
        (vec![1.0 / self.action_size as f32; self.action_size], 0.0)
    }
}

fn bench_uniform_episode(c: &mut Criterion) {
    let game = KInARow::new(5, 4).expect("5x5 board with k=4 is supported");
    let factory = UniformSearch::new(game.clone());
    let config = SelfPlayConfig::default();
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    c.bench_function("episode_uniform_5x5", |b| {
        b.iter(|| black_box(run_episode(&game, &factory, &config, &mut rng)))
    });
}

fn bench_mcts_episode(c: &mut Criterion) {
    let mut group = c.benchmark_group("episode_mcts_3x3");
    let game = KInARow::tic_tac_toe();
    let net = DummyNet {
        action_size: game.action_size(),
    };

    for num_sims in [10, 25, 50] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_sims),
            &num_sims,
            |b, &num_sims| {
                let mcts = MctsConfig {
                    num_simulations: num_sims,
                    ..MctsConfig::default()
                };
                let factory = MctsFactory::new(&game, &net, mcts);
                let config = SelfPlayConfig::default();
                let mut rng = rand::rngs::StdRng::seed_from_u64(42);

                b.iter(|| black_box(run_episode(&game, &factory, &config, &mut rng)))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_uniform_episode, bench_mcts_episode);
criterion_main!(benches);
