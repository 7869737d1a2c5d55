//! ai-2048-core: table-driven Expectimax move selection for 2048
//!
//! This crate provides:
//! - A packed `Board` (16 nibbles in a `u64`) with a table-driven move executor
//!   and a codec from sparse tile lists (`engine` module)
//! - A time-bounded Expectimax driver returning the best direction for a
//!   position, plus a parallel batch driver (`expectimax` module)
//!
//! The surrounding application owns the game: it keeps the tiles, asks for a
//! direction, applies it and spawns the next tile itself.
//!
//! Quick start:
//! ```
//! use ai_2048_core::engine::{self as GameEngine, Board, Move, Tile};
//! use ai_2048_core::expectimax::Expectimax;
//!
//! // Optional: build the lookup tables now rather than on first use
//! GameEngine::new();
//!
//! let board = Board::from_tiles(&[
//!     Tile { row: 0, col: 0, value: 2 },
//!     Tile { row: 0, col: 1, value: 2 },
//! ]);
//! assert_eq!(board.shift(Move::Left), Board::from_tiles(&[Tile { row: 0, col: 0, value: 4 }]));
//!
//! let mut policy = Expectimax::new();
//! let dir = policy.best_move(board);
//! assert!(dir.is_some());
//! ```
//!
pub mod engine;
pub mod expectimax;
