//! Conversion between a sparse tile list and the packed board.

use serde::{Deserialize, Serialize};

use super::{Board, MAX_RANK};

/// One occupied cell as the surrounding application models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub row: u8,
    pub col: u8,
    /// Face value, a power of two `>= 2`.
    pub value: u32,
}

/// A tile list that does not describe a 4x4 board.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileError {
    #[error("tile at row {row}, col {col} is off the 4x4 board")]
    OutOfRange { row: u8, col: u8 },
}

/// `log2(value)` truncated, saturating at [`MAX_RANK`]. Values below 2 map to empty.
#[inline]
pub fn rank_of(value: u32) -> u8 {
    value.checked_ilog2().map_or(0, |rank| rank.min(MAX_RANK as u32) as u8)
}

impl Board {
    /// Pack a tile list. Later tiles overwrite earlier ones at the same cell.
    ///
    /// Values above 32768 collapse to rank 15.
    ///
    /// ```
    /// use ai_2048_core::engine::{Board, Tile};
    /// let b = Board::from_tiles(&[
    ///     Tile { row: 0, col: 0, value: 2 },
    ///     Tile { row: 3, col: 3, value: 2048 },
    /// ]);
    /// assert_eq!(b.raw(), 0xb000_0000_0000_0001);
    /// ```
    pub fn from_tiles<'a, I>(tiles: I) -> Board
    where
        I: IntoIterator<Item = &'a Tile>,
    {
        let raw = tiles.into_iter().fold(0u64, |raw, tile| {
            debug_assert!(tile.row < 4 && tile.col < 4, "tile out of range: {tile:?}");
            let shift = 4 * ((tile.row as u32 & 3) * 4 + (tile.col as u32 & 3));
            (raw & !(0xf << shift)) | ((rank_of(tile.value) as u64) << shift)
        });
        Board::from_raw(raw)
    }

    /// Like [`Board::from_tiles`], but rejects coordinates outside the board
    /// instead of wrapping them.
    ///
    /// ```
    /// use ai_2048_core::engine::{Board, Tile, TileError};
    /// let bad = [Tile { row: 4, col: 0, value: 2 }];
    /// assert_eq!(Board::try_from_tiles(&bad), Err(TileError::OutOfRange { row: 4, col: 0 }));
    /// ```
    pub fn try_from_tiles<'a, I>(tiles: I) -> Result<Board, TileError>
    where
        I: IntoIterator<Item = &'a Tile>,
    {
        let tiles: Vec<&Tile> = tiles.into_iter().collect();
        if let Some(tile) = tiles.iter().find(|tile| tile.row >= 4 || tile.col >= 4) {
            return Err(TileError::OutOfRange { row: tile.row, col: tile.col });
        }
        Ok(Board::from_tiles(tiles))
    }

    /// Non-empty cells in row-major order.
    pub fn tiles(self) -> Vec<Tile> {
        self.ranks()
            .iter()
            .enumerate()
            .filter(|(_, &rank)| rank != 0)
            .map(|(idx, &rank)| Tile { row: (idx / 4) as u8, col: (idx % 4) as u8, value: 1 << rank })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_packs_row_major() {
        let b = Board::from_tiles(&[
            Tile { row: 0, col: 1, value: 4 },
            Tile { row: 2, col: 0, value: 8 },
        ]);
        assert_eq!(b.rank_at(0, 1), 2);
        assert_eq!(b.rank_at(2, 0), 3);
        assert_eq!(b.count_empty(), 14);
    }

    #[test]
    fn last_write_wins() {
        let b = Board::from_tiles(&[
            Tile { row: 1, col: 1, value: 1024 },
            Tile { row: 1, col: 1, value: 2 },
        ]);
        assert_eq!(b.rank_at(1, 1), 1);
    }

    #[test]
    fn off_board_tiles_are_rejected() {
        let ok = [Tile { row: 3, col: 3, value: 4 }];
        assert_eq!(Board::try_from_tiles(&ok), Ok(Board::from_tiles(&ok)));
        let bad_row = [Tile { row: 0, col: 0, value: 2 }, Tile { row: 9, col: 0, value: 2 }];
        assert_eq!(Board::try_from_tiles(&bad_row), Err(TileError::OutOfRange { row: 9, col: 0 }));
        let bad_col = [Tile { row: 1, col: 4, value: 2 }];
        assert_eq!(Board::try_from_tiles(&bad_col), Err(TileError::OutOfRange { row: 1, col: 4 }));
    }

    #[test]
    fn oversized_values_saturate() {
        assert_eq!(rank_of(32768), 15);
        assert_eq!(rank_of(65536), 15);
        assert_eq!(rank_of(u32::MAX), 15);
        assert_eq!(rank_of(0), 0);
        assert_eq!(rank_of(1), 0);
        // truncated, not rounded
        assert_eq!(rank_of(6), 2);
    }

    #[test]
    fn tiles_list_occupied_cells() {
        let input = vec![
            Tile { row: 0, col: 3, value: 2 },
            Tile { row: 1, col: 0, value: 16 },
            Tile { row: 3, col: 2, value: 32768 },
        ];
        let b = Board::from_tiles(&input);
        assert_eq!(b.tiles(), input);
        assert!(Board::EMPTY.tiles().is_empty());
    }
}
