mod common;

use ai_2048_core::engine::{self as GameEngine, Board};
use ai_2048_core::expectimax::{Expectimax, ExpectimaxConfig};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn warm() { GameEngine::new(); }

fn bench_seq_branch_and_move(c: &mut Criterion) {
    warm();
    let boards = common::corpus(4242, 64);
    let cfg = ExpectimaxConfig { depth_cap: Some(5), ..Default::default() };
    let mut ex = Expectimax::with_config(cfg);

    c.bench_function("expectimax_seq/branch_evals", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                let branches = ex.branch_evals(bd);
                for be in branches { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        })
    });

    c.bench_function("expectimax_seq/best_move", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards {
                let m = ex.best_move(bd);
                acc ^= m.map(|mv| mv.index() as u64).unwrap_or(0);
            }
            black_box(acc)
        })
    });

    let mut uncached = Expectimax::with_config(ExpectimaxConfig {
        depth_cap: Some(5),
        cache_enabled: false,
        ..Default::default()
    });
    c.bench_function("expectimax_seq/best_move_no_cache", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards[..16] {
                acc ^= uncached.best_move(bd).map(|mv| mv.index() as u64).unwrap_or(0);
            }
            black_box(acc)
        })
    });
}

fn bench_seq_e2e(c: &mut Criterion) {
    warm();
    let cfg = ExpectimaxConfig { depth_cap: Some(5), ..Default::default() };
    let mut ex = Expectimax::with_config(cfg);
    c.bench_function("e2e_seq/64_moves", |bch| {
        bch.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            let mut b = common::with_random_tile(common::with_random_tile(Board::EMPTY, &mut rng), &mut rng);
            let mut steps = 0;
            while steps < 64 {
                let Some(dir) = ex.get_next_move(b) else { break };
                b = common::with_random_tile(b.shift(dir), &mut rng);
                steps += 1;
            }
            black_box((b.raw(), steps))
        })
    });
}

criterion_group!(expectimax_seq, bench_seq_branch_and_move, bench_seq_e2e);
criterion_main!(expectimax_seq);
