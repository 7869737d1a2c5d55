use std::collections::HashMap;
use std::time::{Duration, Instant};

use ahash::RandomState;
use log::{debug, trace};

use crate::engine::{Board, Move};

use super::heuristic::evaluate;
use super::{warm_tables, BranchEval, ExpectimaxConfig, SearchStats};

/// Breaks exact ties at the root in favour of earlier directions, and ranks
/// any searched move above a no-op.
const ROOT_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy)]
struct TranspositionEntry { score: f64, depth: u32 }

/// State for one driver call: transposition cache, depth bookkeeping,
/// counters and the deadline. Dropped when the call returns.
struct SearchState<'a> {
    cfg: &'a ExpectimaxConfig,
    cache: HashMap<Board, TranspositionEntry, RandomState>,
    cur_depth: u32,
    max_depth: u32,
    depth_limit: u32,
    nodes: u64,
    cache_hits: u64,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<'a> SearchState<'a> {
    fn new(cfg: &'a ExpectimaxConfig, depth_limit: u32, deadline: Option<Instant>) -> Self {
        Self {
            cfg,
            cache: HashMap::with_hasher(RandomState::new()),
            cur_depth: 0,
            max_depth: 0,
            depth_limit,
            nodes: 0,
            cache_hits: 0,
            deadline,
            timed_out: false,
        }
    }

    /// Sticky: once the deadline has passed the clock is not read again.
    #[inline]
    fn deadline_passed(&mut self) -> bool {
        if !self.timed_out {
            if let Some(deadline) = self.deadline {
                self.timed_out = Instant::now() >= deadline;
            }
        }
        self.timed_out
    }

    /// Agent turn: best chance-node score over the directions that change the board.
    fn score_move_node(&mut self, board: Board, cum_prob: f32) -> f64 {
        self.nodes += 1;
        self.cur_depth += 1;
        let mut best_score = 0.0;
        for &direction in &Move::ALL {
            let new_board = board.shift(direction);
            if new_board != board {
                let score = self.score_chance_node(new_board, cum_prob);
                if score > best_score {
                    best_score = score;
                }
            }
        }
        self.cur_depth -= 1;
        best_score
    }

    /// Tile-spawn turn: probability-weighted average over every empty cell
    /// receiving a 2 (0.9) or a 4 (0.1).
    fn score_chance_node(&mut self, board: Board, cum_prob: f32) -> f64 {
        self.nodes += 1;
        if self.deadline_passed() || cum_prob < self.cfg.prob_cutoff || self.cur_depth >= self.depth_limit {
            self.max_depth = self.max_depth.max(self.cur_depth);
            return evaluate(board);
        }

        let cacheable = self.cfg.cache_enabled && self.cur_depth <= self.cfg.cache_depth_limit;
        if cacheable {
            if let Some(entry) = self.cache.get(&board) {
                // an entry from a shallower position searched at least as far ahead
                if entry.depth <= self.cur_depth {
                    self.cache_hits += 1;
                    return entry.score;
                }
            }
        }

        let num_empty_tiles = board.count_empty();
        if num_empty_tiles == 0 {
            return evaluate(board);
        }
        let base_prob = cum_prob / num_empty_tiles as f32;
        let mut score = 0.0;
        let mut tmp = board.raw();
        let mut insert_tile: u64 = 1;
        while insert_tile != 0 {
            if (tmp & 0xf) == 0 {
                let board2 = Board::from_raw(board.raw() | insert_tile);
                score += self.score_move_node(board2, base_prob * 0.9) * 0.9;
                let board4 = Board::from_raw(board.raw() | (insert_tile << 1));
                score += self.score_move_node(board4, base_prob * 0.1) * 0.1;
            }
            tmp >>= 4;
            insert_tile <<= 4;
        }
        score /= num_empty_tiles as f64;

        if cacheable {
            self.cache.insert(board, TranspositionEntry { score, depth: self.cur_depth });
        }
        score
    }

    fn into_stats(self, elapsed: Duration) -> SearchStats {
        SearchStats {
            nodes: self.nodes,
            cache_hits: self.cache_hits,
            max_depth: self.max_depth,
            depth_limit: self.depth_limit,
            timed_out: self.timed_out,
            elapsed,
        }
    }
}

/// Single-threaded, time-bounded Expectimax driver.
///
/// Holds configuration and the stats of the last call; the search state
/// itself is rebuilt for every call, so one value can serve any number of
/// sequential requests.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_tables();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Same as [`Self::best_move`], under the name the game loop uses.
    #[inline]
    pub fn get_next_move(&mut self, board: Board) -> Option<Move> { self.best_move(board) }

    /// Best move under the configured time limit.
    ///
    /// Example
    /// ```
    /// use ai_2048_core::engine::{Board, Move};
    /// use ai_2048_core::expectimax::Expectimax;
    /// let mut ex = Expectimax::new();
    /// // A 2 and a 4 side by side in the top-left corner.
    /// let b = Board::from_raw(0x0021);
    /// assert!(ex.best_move(b).is_some());
    /// assert_eq!(ex.best_move(Board::EMPTY), None);
    /// ```
    #[inline]
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let time_limit = self.cfg.time_limit();
        self.best_move_within(board, time_limit)
    }

    /// Best move with an explicit time budget (`None` = unbounded).
    ///
    /// Scores the directions in order up, down, left, right and keeps the
    /// first strict maximum. If nothing beat zero (deadline hit before any
    /// search, or a blocked board) the first legal move in the order down,
    /// left, right, up is returned. `None` means the board is empty or no
    /// direction changes it.
    pub fn best_move_within(&mut self, board: Board, time_limit: Option<Duration>) -> Option<Move> {
        if board == Board::EMPTY {
            self.stats = SearchStats::default();
            return None;
        }
        let branches = self.search_root(board, time_limit);
        let mut best_score = 0.0;
        let mut best_move = None;
        for branch in &branches {
            if branch.ev > best_score {
                best_score = branch.ev;
                best_move = Some(branch.dir);
            }
        }
        let chosen = best_move.or_else(|| Move::FALLBACK.into_iter().find(|&dir| board.shift(dir) != board));
        debug!(
            "move {:?} score {:.1} | depth limit {} reached {} | nodes {} cache hits {} | {:?}{}",
            chosen,
            best_score,
            self.stats.depth_limit,
            self.stats.max_depth,
            self.stats.nodes,
            self.stats.cache_hits,
            self.stats.elapsed,
            if self.stats.timed_out { " (deadline hit)" } else { "" },
        );
        chosen
    }

    /// Root score per direction (no normalization), under the configured time limit.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    ///
    /// Example
    /// ```
    /// use ai_2048_core::engine::Board;
    /// use ai_2048_core::expectimax::Expectimax;
    /// let mut ex = Expectimax::new();
    /// let branches = ex.branch_evals(Board::from_raw(0x0011));
    /// assert_eq!(branches.len(), 4);
    /// assert!(!branches[0].legal); // up is a no-op for a top-row board
    /// assert!(branches[1].legal && branches[1].ev > 0.0);
    /// ```
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let time_limit = self.cfg.time_limit();
        self.search_root(board, time_limit)
    }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::best_move_within`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    /// More distinct ranks on the board means a wider tree, so search shallower.
    #[inline]
    fn compute_depth(&self, board: Board) -> u32 {
        let dyn_depth = board.count_distinct().saturating_sub(2).max(self.cfg.min_depth);
        match self.cfg.depth_cap { Some(cap) => dyn_depth.min(cap), None => dyn_depth }
    }

    fn search_root(&mut self, board: Board, time_limit: Option<Duration>) -> [BranchEval; 4] {
        let start = Instant::now();
        let depth_limit = self.compute_depth(board);
        let mut state = SearchState::new(&self.cfg, depth_limit, time_limit.map(|limit| start + limit));
        let mut out = Move::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: false });
        for branch in out.iter_mut() {
            let new_board = board.shift(branch.dir);
            branch.legal = new_board != board;
            // directions after the deadline keep ev = 0
            if !branch.legal || state.deadline_passed() {
                continue;
            }
            branch.ev = state.score_chance_node(new_board, 1.0) + ROOT_EPSILON;
            trace!("root {} -> {:.3}", branch.dir, branch.ev);
        }
        self.stats = state.into_stats(start.elapsed());
        out
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Tile;

    fn board_from_rows(rows: [[u8; 4]; 4]) -> Board {
        let tiles: Vec<Tile> = rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| {
                row.iter().enumerate().filter(|(_, &rank)| rank != 0).map(move |(c, &rank)| Tile {
                    row: r as u8,
                    col: c as u8,
                    value: 1 << rank,
                })
            })
            .collect();
        Board::from_tiles(&tiles)
    }

    #[test]
    fn empty_board_has_no_move() {
        let mut ex = Expectimax::new();
        assert_eq!(ex.best_move(Board::EMPTY), None);
        assert_eq!(ex.last_stats(), SearchStats::default());
    }

    #[test]
    fn blocked_board_has_no_move() {
        let stuck = board_from_rows([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 1]]);
        let mut ex = Expectimax::new();
        assert_eq!(ex.best_move(stuck), None);
        assert!(ex.branch_evals(stuck).iter().all(|b| !b.legal && b.ev == 0.0));
    }

    #[test]
    fn depth_limit_tracks_distinct_ranks() {
        let ex = Expectimax::new();
        assert_eq!(ex.compute_depth(Board::from_raw(0x1)), 3);
        assert_eq!(ex.compute_depth(Board::from_raw(0x4321)), 3);
        assert_eq!(ex.compute_depth(Board::from_raw(0x0765_4321)), 5);
        let capped = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(4), ..Default::default() });
        assert_eq!(capped.compute_depth(Board::from_raw(0x0000_9876_5432_1000)), 4);
    }

    #[test]
    fn zero_budget_uses_fallback_order() {
        let mut ex = Expectimax::new();
        // A lone tile in the middle can go anywhere; down comes first.
        let b = board_from_rows([[0; 4], [0, 1, 0, 0], [0; 4], [0; 4]]);
        assert_eq!(ex.best_move_within(b, Some(Duration::ZERO)), Some(Move::Down));
        assert!(ex.last_stats().timed_out);
        // Top-left tile: only down and right are legal.
        let b = board_from_rows([[1, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(ex.best_move_within(b, Some(Duration::ZERO)), Some(Move::Down));
        // Bottom-left tile: up and right; right precedes up in the fallback order.
        let b = board_from_rows([[0; 4], [0; 4], [0; 4], [1, 0, 0, 0]]);
        assert_eq!(ex.best_move_within(b, Some(Duration::ZERO)), Some(Move::Right));
    }

    #[test]
    fn single_legal_move_is_returned_at_any_budget() {
        // Column 0 empty, no equal neighbours anywhere: only left changes the board.
        let b = board_from_rows([[0, 1, 2, 3], [0, 2, 3, 1], [0, 3, 1, 2], [0, 1, 2, 3]]);
        let legal: Vec<Move> = Move::ALL.into_iter().filter(|&d| b.shift(d) != b).collect();
        assert_eq!(legal, vec![Move::Left]);

        let mut ex = Expectimax::new();
        for budget in [Some(Duration::ZERO), Some(Duration::from_millis(5)), None] {
            assert_eq!(ex.best_move_within(b, budget), Some(Move::Left));
        }
    }

    #[test]
    fn cache_records_hits_and_can_be_disabled() {
        let b = board_from_rows([[1, 1, 2, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]]);
        let mut cached = Expectimax::new();
        cached.best_move(b);
        assert!(cached.last_stats().cache_hits > 0);

        let mut uncached = Expectimax::with_config(ExpectimaxConfig { cache_enabled: false, ..Default::default() });
        uncached.best_move(b);
        assert_eq!(uncached.last_stats().cache_hits, 0);
        assert!(uncached.last_stats().nodes > cached.last_stats().nodes);
    }

    #[test]
    fn search_depth_is_bounded_by_limit() {
        let b = board_from_rows([[1, 2, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]]);
        let mut ex = Expectimax::new();
        ex.best_move(b);
        let stats = ex.last_stats();
        assert_eq!(stats.depth_limit, 3);
        assert!(stats.max_depth <= stats.depth_limit);
        assert!(!stats.timed_out);
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
    }

    #[test]
    fn deadline_keeps_branches_scored_before_it() {
        // Bottom-left 2 and 4: up and right are legal. Up alone outlasts the budget.
        let b = board_from_rows([[0; 4], [0; 4], [0; 4], [1, 2, 0, 0]]);
        let cfg = ExpectimaxConfig {
            prob_cutoff: 0.0,
            min_depth: 8,
            time_limit_ms: Some(30),
            ..Default::default()
        };
        let mut ex = Expectimax::with_config(cfg);
        let branches = ex.branch_evals(b);
        assert!(ex.last_stats().timed_out);
        assert!(branches[0].legal && branches[0].ev > 0.0);
        assert!(!branches[1].legal && !branches[2].legal);
        assert!(branches[3].legal);
        assert_eq!(branches[3].ev, 0.0);
        assert_eq!(ex.best_move(b), Some(Move::Up));
    }

    #[test]
    fn branch_evals_agree_with_best_move() {
        let b = board_from_rows([[1, 1, 2, 3], [0, 0, 1, 2], [0, 0, 0, 1], [0, 0, 0, 0]]);
        let mut ex = Expectimax::new();
        let branches = ex.branch_evals(b);
        let best = ex.best_move(b).unwrap();
        let max = branches.iter().filter(|br| br.legal).map(|br| br.ev).fold(f64::MIN, f64::max);
        let first_max = branches.iter().find(|br| br.legal && br.ev == max).unwrap();
        assert_eq!(first_max.dir, best);
    }
}
