use ai_2048_core::engine::{Board, Move};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Insert a 2 (90%) or 4 (10%) into a random empty cell.
pub fn with_random_tile(board: Board, rng: &mut StdRng) -> Board {
    let empty: Vec<usize> = (0..16).filter(|&idx| (board.raw() >> (4 * idx)) & 0xf == 0).collect();
    if empty.is_empty() {
        return board;
    }
    let idx = empty[rng.gen_range(0..empty.len())];
    let rank: u64 = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
    Board::from_raw(board.raw() | (rank << (4 * idx)))
}

/// Deterministic boards of increasing density.
pub fn corpus(seed: u64, len: usize) -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut boards = Vec::with_capacity(len + 1);
    let mut b = with_random_tile(with_random_tile(Board::EMPTY, &mut rng), &mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..len {
        let dir = seq[i % seq.len()];
        let nb = b.shift(dir);
        if nb != b { b = with_random_tile(nb, &mut rng); }
        boards.push(b);
    }
    boards
}
