//! Packed 4x4 board, move directions and the table-driven move executor.
//!
//! Layout: 16 nibbles in a `u64`, nibble `i` (bits `4*i..4*i+4`) holds cell
//! `row = i / 4, col = i % 4`. A nibble is `0` for an empty cell or the rank
//! `r` of a tile worth `2^r`. Row `r` is the 16-bit slice at bit offset
//! `16 * r`; within a row, column `c` sits at bit offset `4 * c`, so "left"
//! means "towards the low nibble".
//!
//! This layout is the wire contract for anything that ships boards across a
//! process boundary: keep it bit-exact.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod codec;
mod tables;

pub use codec::{rank_of, Tile, TileError};
pub use tables::new;
pub(crate) use tables::{line_tables, Line, LINE_TABLE_SIZE};

/// Highest representable rank (tile value 32768).
pub const MAX_RANK: u8 = 15;

const ROW_MASK: u64 = 0xFFFF;
const COL_MASK: u64 = 0x000F_000F_000F_000F;

/// A direction to move/merge tiles.
///
/// The discriminants are the executor indices: `Up = 0, Down = 1, Left = 2,
/// Right = 3`. Search order and the table layout both depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Move {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Move {
    /// Search order. Earlier entries win ties.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Priority used when search produced no improving move.
    pub const FALLBACK: [Move; 4] = [Move::Down, Move::Left, Move::Right, Move::Up];

    #[inline]
    pub fn index(self) -> u8 { self as u8 }

    pub fn from_index(index: u8) -> Option<Move> {
        match index {
            0 => Some(Move::Up),
            1 => Some(Move::Down),
            2 => Some(Move::Left),
            3 => Some(Move::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown direction `{0}` (expected up, down, left or right)")]
pub struct ParseMoveError(String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Move::Up),
            "down" => Ok(Move::Down),
            "left" => Ok(Move::Left),
            "right" => Ok(Move::Right),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

pub type BoardRaw = u64;

/// Packed 4x4 2048 board as 16 4-bit nibbles in a `u64`.
///
/// Immutable value type: every transform returns a new `Board`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Return the board resulting from sliding/merging tiles in `dir`.
    ///
    /// A no-op move returns a board equal to `self`; compare boards to detect it.
    ///
    /// ```
    /// use ai_2048_core::engine::{Board, Move};
    /// // Row 0 holds ranks [1, 1, 0, 0] (two 2-tiles).
    /// let b = Board::from_raw(0x0011);
    /// assert_eq!(b.shift(Move::Left), Board::from_raw(0x0002));
    /// assert_eq!(b.shift(Move::Up), b);
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self { execute(self, dir) }

    /// True if no direction changes the board.
    #[inline]
    pub fn is_terminal(self) -> bool { Move::ALL.iter().all(|&dir| self.shift(dir) == self) }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { 16 - count_non_empty(self.0) }

    /// Number of distinct non-empty ranks on the board.
    pub fn count_distinct(self) -> u32 {
        let mut bitset = 0u32;
        let mut board = self.0;
        while board != 0 {
            bitset |= 1 << (board & 0xf);
            board >>= 4;
        }
        // bit 0 is the empty rank
        (bitset >> 1).count_ones()
    }

    /// Rank stored at `(row, col)`; `0` for empty.
    #[inline]
    pub fn rank_at(self, row: usize, col: usize) -> u8 {
        debug_assert!(row < 4 && col < 4);
        ((self.0 >> (4 * (row * 4 + col))) & 0xf) as u8
    }

    /// Highest rank on the board (`0` on an empty board).
    pub fn max_rank(self) -> u8 { (0..16).map(|idx| ((self.0 >> (4 * idx)) & 0xf) as u8).max().unwrap_or(0) }

    /// In-game score implied by the tiles on the board, assuming every tile
    /// was built from 2-tiles. Search never reads it.
    pub fn score(self) -> f64 {
        let score_table = &line_tables().score;
        (0..4).fold(0., |acc, row_idx| acc + get_line_entry(score_table, extract_line(self.0, row_idx)))
    }

    /// Ranks in cell order (`row * 4 + col`).
    pub fn ranks(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = ((self.0 >> (4 * idx)) & 0xf) as u8;
        }
        out
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranks = self.ranks();
        for (row_idx, row) in ranks.chunks(4).enumerate() {
            if row_idx > 0 {
                writeln!(f, "{}", "-".repeat(31))?;
            }
            let cells: Vec<String> = row.iter().map(|&rank| format_rank(rank)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

/// Slide/merge tiles in `direction` by XOR-ing the precomputed per-line deltas.
///
/// Horizontal moves index the row tables with each 16-bit row. Vertical moves
/// index the column tables with the rows of the transposed board; those
/// entries are already spread into column positions, so they land directly on
/// the untransposed board.
pub fn execute(board: Board, direction: Move) -> Board {
    let t = line_tables();
    let raw = board.0;
    let res = match direction {
        Move::Left => shift_rows(raw, &t.row_left),
        Move::Right => shift_rows(raw, &t.row_right),
        Move::Up => shift_cols(raw, &t.col_up),
        Move::Down => shift_cols(raw, &t.col_down),
    };
    Board(res)
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// The 16-bit pattern of row `line_idx` (0 = top row).
#[inline(always)]
pub(crate) fn extract_line(board: BoardRaw, line_idx: u32) -> u16 {
    ((board >> (16 * line_idx)) & ROW_MASK) as u16
}

/// Spread a row pattern into column positions: nibble `k` moves to bit `16 * k`.
#[inline]
pub(crate) fn unpack_col(line: u16) -> u64 {
    let tmp = line as u64;
    (tmp | (tmp << 12) | (tmp << 24) | (tmp << 36)) & COL_MASK
}

#[inline(always)]
pub(crate) fn get_line_entry<T: Copy>(table: &[T], idx: u16) -> T {
    debug_assert_eq!(table.len(), LINE_TABLE_SIZE);
    // SAFETY: every table holds LINE_TABLE_SIZE = u16::MAX + 1 entries.
    unsafe { *table.get_unchecked(idx as usize) }
}

#[inline(always)]
fn shift_rows(board: BoardRaw, table: &[u16]) -> BoardRaw {
    (0..4).fold(board, |acc, row_idx| {
        let delta = get_line_entry(table, extract_line(board, row_idx)) as u64;
        acc ^ (delta << (16 * row_idx))
    })
}

#[inline(always)]
fn shift_cols(board: BoardRaw, table: &[u64]) -> BoardRaw {
    let transposed = transpose(board);
    (0..4).fold(board, |acc, col_idx| {
        let delta = get_line_entry(table, extract_line(transposed, col_idx));
        acc ^ (delta << (4 * col_idx))
    })
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(board: BoardRaw) -> u32 {
    let mut board_copy = board;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones()
}

fn format_rank(rank: u8) -> String {
    match rank {
        0 => " ".repeat(7),
        r => format!("{:^7}", 1u32 << r),
    }
}
