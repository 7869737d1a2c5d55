use crate::engine::{self, get_line_entry, line_tables, Board, Line};

/// Static evaluation of a board: the row heuristic summed over the four rows
/// and the four columns.
///
/// ```
/// use ai_2048_core::engine::Board;
/// use ai_2048_core::expectimax::evaluate;
/// // An empty board scores 8 lines x (200000 + 4 x 270).
/// assert_eq!(evaluate(Board::EMPTY), 8.0 * 201_080.0);
/// ```
#[inline]
pub fn evaluate(board: Board) -> f64 {
    let scores = &line_tables().heur;
    let transpose_board = engine::transpose(board.raw());
    (0..4).fold(0., |score, line_idx| {
        let row_score = get_line_entry(scores, engine::extract_line(board.raw(), line_idx));
        let col_score = get_line_entry(scores, engine::extract_line(transpose_board, line_idx));
        score + row_score + col_score
    })
}

// Credit to Nneonneo for heuristic structure
pub(crate) fn line_heuristic(line: &Line) -> f64 {
    const LOST_PENALTY: f64 = 200_000.0;
    LOST_PENALTY + calc_empty(line) + calc_merges(line) - calc_monotonicity(line) - calc_sum(line)
}

fn calc_sum(line: &Line) -> f64 {
    const SUM_POWER: f64 = 3.5;
    const SUM_WEIGHT: f64 = 11.0;
    line.iter().map(|&rank| (rank as f64).powf(SUM_POWER)).sum::<f64>() * SUM_WEIGHT
}

fn calc_empty(line: &Line) -> f64 {
    const EMPTY_WEIGHT: f64 = 270.0;
    line.iter().filter(|&&rank| rank == 0).count() as f64 * EMPTY_WEIGHT
}

/// Runs of equal tiles, ignoring gaps. A run of length `L` adds `L`.
fn calc_merges(line: &Line) -> f64 {
    const MERGES_WEIGHT: f64 = 700.0;
    let mut prev = 0;
    let mut counter = 0.;
    let mut merges = 0.;
    for &rank in line.iter().filter(|&&rank| rank != 0) {
        if prev == rank {
            counter += 1.;
        } else if counter > 0. {
            merges += 1. + counter;
            counter = 0.;
        }
        prev = rank;
    }
    if counter > 0. {
        merges += 1. + counter;
    }
    merges * MERGES_WEIGHT
}

fn calc_monotonicity(line: &Line) -> f64 {
    const MONOTONICITY_POWER: f64 = 4.0;
    const MONOTONICITY_WEIGHT: f64 = 47.0;
    let mut monotonicity_left = 0.;
    let mut monotonicity_right = 0.;
    for i in 1..4 {
        let tile1 = (line[i - 1] as f64).powf(MONOTONICITY_POWER);
        let tile2 = (line[i] as f64).powf(MONOTONICITY_POWER);
        if line[i - 1] > line[i] {
            monotonicity_left += tile1 - tile2;
        } else {
            monotonicity_right += tile2 - tile1;
        }
    }
    monotonicity_left.min(monotonicity_right) * MONOTONICITY_WEIGHT
}
