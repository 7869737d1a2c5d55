//! Expectimax move selection for 2048.
//!
//! - [`Expectimax`]: the time-bounded single-threaded driver. Every call
//!   builds its own search state and transposition cache.
//! - [`best_moves`]: answers many independent boards in parallel, one
//!   isolated search per board. Only the lookup tables are shared.
//!
//! Notes
//! - The engine's lookup and heuristic tables are initialized lazily; the
//!   constructors warm them for you. It's still fine to call `engine::new()`.
//! - Search is deterministic for a fixed board when no time limit is set.
//!
//! Quick start
//! ```
//! use ai_2048_core::engine::{Board, Move};
//! use ai_2048_core::expectimax::Expectimax;
//!
//! // Two 2-tiles in the top row.
//! let b0 = Board::from_raw(0x0011);
//! let mut ex = Expectimax::new();
//! let m = ex.best_move(b0);
//! assert!(m.is_some());
//! assert_eq!(ex.last_stats().depth_limit, 3);
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{self, Board, Move};

mod batch;
pub(crate) mod heuristic;
mod search;

pub use batch::best_moves;
pub use heuristic::evaluate;
pub use search::Expectimax;

/// Configurable knobs for Expectimax.
///
/// - `prob_cutoff`: stop expanding chance nodes whose cumulative probability falls below this.
/// - `min_depth`: floor of the dynamic depth limit.
/// - `depth_cap`: optional hard cap on the dynamic depth limit.
/// - `cache_enabled`: enable/disable the transposition cache. A cached score is
///   reused whichever probability path reaches the board, so cached and
///   uncached searches agree exactly only when `prob_cutoff = 0`.
/// - `cache_depth_limit`: chance nodes deeper than this are neither looked up nor stored.
/// - `time_limit_ms`: default wall-clock budget per move (`None` = unbounded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectimaxConfig {
    pub prob_cutoff: f32,
    pub min_depth: u32,
    pub depth_cap: Option<u32>,
    pub cache_enabled: bool,
    pub cache_depth_limit: u32,
    pub time_limit_ms: Option<u64>,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            prob_cutoff: 1e-4,
            min_depth: 3,
            depth_cap: None,
            cache_enabled: true,
            cache_depth_limit: 15,
            time_limit_ms: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ExpectimaxConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// ```
    /// use ai_2048_core::expectimax::ExpectimaxConfig;
    /// let cfg = ExpectimaxConfig::from_toml_str("time_limit_ms = 50\ncache_enabled = false").unwrap();
    /// assert_eq!(cfg.time_limit_ms, Some(50));
    /// assert!(!cfg.cache_enabled);
    /// assert_eq!(cfg.min_depth, 3);
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.prob_cutoff) {
            return Err(ConfigError::Invalid {
                field: "prob_cutoff",
                reason: format!("{} is outside [0, 1]", self.prob_cutoff),
            });
        }
        if self.min_depth == 0 {
            return Err(ConfigError::Invalid { field: "min_depth", reason: "must be at least 1".into() });
        }
        if self.depth_cap == Some(0) {
            return Err(ConfigError::Invalid { field: "depth_cap", reason: "must be at least 1".into() });
        }
        Ok(())
    }

    #[inline]
    pub fn time_limit(&self) -> Option<Duration> { self.time_limit_ms.map(Duration::from_millis) }
}

/// Root score for one direction.
///
/// - `ev` is the expected value for taking `dir` (0 when illegal or not reached before the deadline).
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Search stats for a single driver call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchStats {
    /// Move and chance nodes entered, cache hits included.
    pub nodes: u64,
    pub cache_hits: u64,
    /// Deepest move depth at which a chance node was scored statically.
    pub max_depth: u32,
    pub depth_limit: u32,
    /// True if the deadline cut the search short.
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// One-shot convenience: best move for `board` with default settings.
///
/// Returns `None` for an empty board or when no direction changes the board.
///
/// ```
/// use ai_2048_core::engine::{Board, Move};
/// use ai_2048_core::expectimax;
/// // Only a 2-tile in the bottom-right corner: left and up are the only moves.
/// let b = Board::from_raw(0x1000_0000_0000_0000);
/// let m = expectimax::best_move(b, Some(0));
/// assert_eq!(m, Some(Move::Left));
/// ```
pub fn best_move(board: Board, time_limit_ms: Option<u64>) -> Option<Move> {
    Expectimax::new().best_move_within(board, time_limit_ms.map(Duration::from_millis))
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_tables() {
    // Safe to call multiple times.
    engine::new();
}
