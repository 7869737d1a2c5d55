//! Line-oriented move worker.
//!
//! Reads one JSON request per line on stdin and answers with one JSON line
//! on stdout. Boards travel either packed (`"board"`, the engine's `u64`
//! layout, bit-exact) or as a tile list (`"tiles"`):
//!
//! ```text
//! {"id": 1, "board": 4353, "time_limit_ms": 50}
//! {"id": 2, "tiles": [{"row": 0, "col": 0, "value": 2}]}
//! ```
//!
//! Requests are answered in order, one at a time; a host that wants
//! parallelism runs several workers.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use ai_2048_core::engine::{self as GameEngine, Board, Move, Tile, TileError};
use ai_2048_core::expectimax::{Expectimax, ExpectimaxConfig};
use anyhow::Context;
use clap::Parser;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser)]
#[command(name = "ai2048-worker", about = "Answer 2048 best-move requests over stdin/stdout")]
struct Args {
    /// TOML file with engine settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default per-request time budget in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Request {
    id: u64,
    #[serde(flatten)]
    position: Position,
    time_limit_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Position {
    Packed { board: u64 },
    Tiles { tiles: Vec<Tile> },
}

impl Position {
    fn to_board(&self) -> Result<Board, TileError> {
        match self {
            Position::Packed { board } => Ok(Board::from_raw(*board)),
            Position::Tiles { tiles } => Board::try_from_tiles(tiles),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response {
    Move {
        id: u64,
        direction: Option<Move>,
        nodes: u64,
        elapsed_ms: u64,
        timed_out: bool,
    },
    Error {
        id: Option<u64>,
        error: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => ExpectimaxConfig::from_path(path)
            .with_context(|| format!("loading engine config from {}", path.display()))?,
        None => ExpectimaxConfig::default(),
    };
    if args.time_limit_ms.is_some() {
        cfg.time_limit_ms = args.time_limit_ms;
    }
    GameEngine::new();
    let mut policy = Expectimax::with_config(cfg);

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&mut policy, &line);
        serde_json::to_writer(&mut stdout, &response)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_line(policy: &mut Expectimax, line: &str) -> Response {
    let req: Request = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            warn!("rejecting request: {e}");
            return Response::Error { id: None, error: e.to_string() };
        }
    };
    let board = match req.position.to_board() {
        Ok(board) => board,
        Err(e) => {
            warn!("rejecting request {}: {e}", req.id);
            return Response::Error { id: Some(req.id), error: e.to_string() };
        }
    };
    let time_limit = req.time_limit_ms.or(policy.config().time_limit_ms).map(Duration::from_millis);
    let direction = policy.best_move_within(board, time_limit);
    let stats = policy.last_stats();
    debug!("request {} board {:?} -> {:?}", req.id, board, direction);
    Response::Move {
        id: req.id,
        direction,
        nodes: stats.nodes,
        elapsed_ms: stats.elapsed.as_millis() as u64,
        timed_out: stats.timed_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(line: &str) -> serde_json::Value {
        let mut policy = Expectimax::new();
        serde_json::to_value(handle_line(&mut policy, line)).unwrap()
    }

    #[test]
    fn packed_and_tile_requests_agree() {
        // single 2-tile in the bottom-right corner
        let packed = answer(r#"{"id": 1, "board": 1152921504606846976, "time_limit_ms": 0}"#);
        let tiles = answer(r#"{"id": 2, "tiles": [{"row": 3, "col": 3, "value": 2}], "time_limit_ms": 0}"#);
        assert_eq!(packed["direction"], "left");
        assert_eq!(tiles["direction"], "left");
        assert_eq!(tiles["id"], 2);
    }

    #[test]
    fn terminal_board_answers_null() {
        let v = answer(r#"{"id": 7, "board": 0}"#);
        assert_eq!(v["id"], 7);
        assert!(v["direction"].is_null());
    }

    #[test]
    fn off_board_tile_reports_error() {
        let v = answer(r#"{"id": 3, "tiles": [{"row": 9, "col": 0, "value": 2}], "time_limit_ms": 0}"#);
        assert_eq!(v["id"], 3);
        assert!(v["error"].as_str().is_some_and(|e| e.contains("row 9")));
        assert!(v.get("direction").is_none());
    }

    #[test]
    fn malformed_request_reports_error() {
        let v = answer("{not json");
        assert!(v["id"].is_null());
        assert!(v["error"].is_string());
    }
}
