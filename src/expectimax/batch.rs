use rayon::prelude::*;

use crate::engine::{Board, Move};

use super::{warm_tables, Expectimax, ExpectimaxConfig};

/// Best move for each board, computed in parallel on the rayon pool.
///
/// Each board is an independent request with its own search state and
/// transposition cache; results come back in input order.
///
/// ```
/// use ai_2048_core::engine::{Board, Move};
/// use ai_2048_core::expectimax::{best_moves, ExpectimaxConfig};
/// let boards = [Board::EMPTY, Board::from_raw(0x1000_0000_0000_0000)];
/// let cfg = ExpectimaxConfig { time_limit_ms: Some(0), ..Default::default() };
/// assert_eq!(best_moves(&boards, &cfg), vec![None, Some(Move::Left)]);
/// ```
pub fn best_moves(boards: &[Board], cfg: &ExpectimaxConfig) -> Vec<Option<Move>> {
    warm_tables();
    boards
        .par_iter()
        .map_init(|| Expectimax::with_config(cfg.clone()), |policy, &board| policy.best_move(board))
        .collect()
}
