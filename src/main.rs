use std::path::PathBuf;
use std::time::{Duration, Instant};

use ai_2048_core::engine::{self as GameEngine, Board, Move};
use ai_2048_core::expectimax::{Expectimax, ExpectimaxConfig};
use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "selfplay", about = "Play 2048 games with the expectimax engine")]
struct Args {
    /// Number of games to play (in parallel)
    #[arg(long, default_value_t = 1)]
    games: u64,

    /// Base seed; game `i` uses `seed + i`
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// TOML file with engine settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-move time budget in milliseconds (overrides the config file)
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Hard cap on search depth (overrides the config file)
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Disable the transposition cache
    #[arg(long)]
    no_cache: bool,

    /// Stop each game after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Print the board after every move (single game only)
    #[arg(long)]
    verbose: bool,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy)]
struct GameSummary {
    seed: u64,
    moves: u64,
    score: f64,
    highest_tile: u32,
    elapsed: Duration,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = build_config(&args)?;
    GameEngine::new();
    info!("engine settings: {cfg:?}");

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} games | {msg}")?
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let verbose = args.verbose && args.games == 1;
    let summaries: Vec<GameSummary> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let summary = play_game(&cfg, args.seed.wrapping_add(i), args.steps, verbose);
            pb.inc(1);
            pb.set_message(format!("last score {:.0}", summary.score));
            summary
        })
        .collect();
    pb.finish_and_clear();

    for s in &summaries {
        println!(
            "seed {} | moves {} | score {:.0} | highest tile {} | moves/sec {:.1}",
            s.seed,
            s.moves,
            s.score,
            s.highest_tile,
            s.moves as f64 / s.elapsed.as_secs_f64().max(1e-6),
        );
    }
    if summaries.len() > 1 {
        let mean = summaries.iter().map(|s| s.score).sum::<f64>() / summaries.len() as f64;
        let best = summaries.iter().map(|s| s.highest_tile).max().unwrap_or(0);
        println!("games {} | mean score {:.0} | best tile {}", summaries.len(), mean, best);
    }
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<ExpectimaxConfig> {
    let mut cfg = match &args.config {
        Some(path) => ExpectimaxConfig::from_path(path)
            .with_context(|| format!("loading engine config from {}", path.display()))?,
        None => ExpectimaxConfig::default(),
    };
    if args.time_limit_ms.is_some() {
        cfg.time_limit_ms = args.time_limit_ms;
    }
    if args.depth_cap.is_some() {
        cfg.depth_cap = args.depth_cap;
    }
    if args.no_cache {
        cfg.cache_enabled = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Plays one game as the engine's collaborator: asks for a direction,
/// applies it and spawns the next tile.
fn play_game(cfg: &ExpectimaxConfig, seed: u64, steps: Option<u64>, verbose: bool) -> GameSummary {
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut policy = Expectimax::with_config(cfg.clone());
    let mut board = spawn_tile(spawn_tile(Board::EMPTY, &mut rng), &mut rng);
    let mut moves = 0u64;
    while let Some(dir) = policy.best_move(board) {
        board = apply_move(board, dir, &mut rng);
        moves += 1;
        if verbose {
            println!("{dir}\n{board}");
        }
        if steps.is_some_and(|limit| moves >= limit) {
            break;
        }
    }
    info!("game {seed} finished after {moves} moves (highest rank {})", board.max_rank());
    GameSummary {
        seed,
        moves,
        score: board.score(),
        highest_tile: 1 << board.max_rank(),
        elapsed: start.elapsed(),
    }
}

fn apply_move<R: Rng + ?Sized>(board: Board, dir: Move, rng: &mut R) -> Board {
    let moved = board.shift(dir);
    if moved != board { spawn_tile(moved, rng) } else { board }
}

/// Insert a 2 (90%) or 4 (10%) into a uniformly chosen empty cell.
fn spawn_tile<R: Rng + ?Sized>(board: Board, rng: &mut R) -> Board {
    let empty = board.count_empty();
    if empty == 0 {
        return board;
    }
    let mut index = rng.gen_range(0..empty);
    let mut tmp = board.raw();
    let mut tile: u64 = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
    loop {
        while (tmp & 0xf) != 0 {
            tmp >>= 4;
            tile <<= 4;
        }
        if index == 0 {
            break;
        }
        index -= 1;
        tmp >>= 4;
        tile <<= 4;
    }
    Board::from_raw(board.raw() | tile)
}
