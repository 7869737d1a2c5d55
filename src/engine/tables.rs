use std::sync::OnceLock;

use log::debug;

use super::{unpack_col, MAX_RANK};
use crate::expectimax::heuristic::line_heuristic;

/// Precomputed lookup tables for all possible 4-tile lines (16-bit packed).
///
/// Sliding/merging a row or column depends only on its 4 nibbles, so every
/// move is four table lookups and four XORs at runtime.
///
/// Layout:
/// - `row_left/right[i]`: 16-bit XOR delta realizing the slide for row `i`.
/// - `col_up/down[i]`: 64-bit XOR delta for column pattern `i`, already spread
///   into column positions (nibble `k` at bit `16 * k`).
/// - `heur[i]`: static heuristic contribution of the line.
/// - `score[i]`: merge points implied by the line.
///
/// Built once behind a `OnceLock`, read-only afterwards and shared by every
/// search.
pub(crate) struct Tables {
    pub(crate) row_left: Box<[u16]>,
    pub(crate) row_right: Box<[u16]>,
    pub(crate) col_up: Box<[u64]>,
    pub(crate) col_down: Box<[u64]>,
    pub(crate) heur: Box<[f64]>,
    pub(crate) score: Box<[f64]>,
}

/// Four ranks of one row or column, index 0 being the cell a "left"/"up" move slides towards.
pub(crate) type Line = [u8; 4];

pub(crate) const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Build the lookup tables now instead of on the first move. Safe to call multiple times.
pub fn new() {
    let _ = line_tables();
}

#[inline(always)]
pub(crate) fn line_tables() -> &'static Tables {
    TABLES.get_or_init(create_tables)
}

fn create_tables() -> Tables {
    // Allocate on the heap to keep stack frames small during init.
    let mut row_left = vec![0u16; LINE_TABLE_SIZE];
    let mut row_right = vec![0u16; LINE_TABLE_SIZE];
    let mut col_up = vec![0u64; LINE_TABLE_SIZE];
    let mut col_down = vec![0u64; LINE_TABLE_SIZE];
    let mut heur = vec![0f64; LINE_TABLE_SIZE];
    let mut score = vec![0f64; LINE_TABLE_SIZE];

    for idx in 0..LINE_TABLE_SIZE {
        let row = idx as u16;
        let line = unpack_line(row);
        score[idx] = line_score(&line);
        heur[idx] = line_heuristic(&line);

        let result = pack_line(&slide_left(line));
        let rev_row = reverse_line(row);
        let rev_result = reverse_line(result);

        row_left[idx] = row ^ result;
        row_right[rev_row as usize] = rev_row ^ rev_result;
        col_up[idx] = unpack_col(row) ^ unpack_col(result);
        col_down[rev_row as usize] = unpack_col(rev_row) ^ unpack_col(rev_result);
    }
    debug!("built move and heuristic tables ({} lines)", LINE_TABLE_SIZE);

    Tables {
        row_left: row_left.into_boxed_slice(),
        row_right: row_right.into_boxed_slice(),
        col_up: col_up.into_boxed_slice(),
        col_down: col_down.into_boxed_slice(),
        heur: heur.into_boxed_slice(),
        score: score.into_boxed_slice(),
    }
}

#[inline]
pub(crate) fn unpack_line(row: u16) -> Line {
    [(row & 0xf) as u8, ((row >> 4) & 0xf) as u8, ((row >> 8) & 0xf) as u8, ((row >> 12) & 0xf) as u8]
}

#[inline]
pub(crate) fn pack_line(line: &Line) -> u16 {
    (line[0] as u16) | (line[1] as u16) << 4 | (line[2] as u16) << 8 | (line[3] as u16) << 12
}

/// Reverse nibble order, turning a "right" line into a "left" one.
#[inline]
pub(crate) fn reverse_line(row: u16) -> u16 {
    (row >> 12) | ((row >> 4) & 0x00F0) | ((row << 4) & 0x0F00) | (row << 12)
}

/// Slide towards index 0, merging each equal pair once with left-to-right priority.
///
/// Merged ranks saturate at [`MAX_RANK`].
pub(crate) fn slide_left(mut line: Line) -> Line {
    let mut i = 0;
    while i < 3 {
        let Some(j) = (i + 1..4).find(|&j| line[j] != 0) else { break };
        if line[i] == 0 {
            line[i] = line[j];
            line[j] = 0;
            // slot i may still merge with the next tile
            continue;
        }
        if line[i] == line[j] {
            if line[i] < MAX_RANK {
                line[i] += 1;
            }
            line[j] = 0;
        }
        i += 1;
    }
    line
}

// Credit to Nneonneo
fn line_score(line: &Line) -> f64 {
    line.iter()
        .filter(|&&rank| rank >= 2)
        // the score is the total sum of the tile and all intermediate merged tiles
        .map(|&rank| (rank as f64 - 1.0) * (1u32 << rank) as f64)
        .sum()
}
