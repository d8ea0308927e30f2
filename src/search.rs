//! The search: iterative deepening over a negamax alpha-beta with a
//! transposition table, null-move / futility / multi-cut pruning, late
//! move reductions, null-window re-searches, killer ordering, and a
//! capture-resolving quiescence extension at the horizon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::board::evaluation::{
    is_mate_score, piece_value, CHECKMATE_SCORE, INFINITY, QUEEN_SCORE,
};
use crate::board::Board;
use crate::chessmove::Move;
use crate::errors::EngineError;
use crate::movepicker::{MovePicker, Stage};
use crate::piece::{Colour, PieceType};
use crate::searchinfo::{EngineSettings, SearchSettings, SearchStats};
use crate::transpositiontable::{Bound, TranspositionTable, MAIN_TABLE_SIZE, QSEARCH_TABLE_SIZE};
use crate::util::MAX_ENGINE_DEPTH;

/// The outcome of one `engine` invocation.
#[derive(Clone, Copy, Debug)]
pub struct SearchReport {
    /// The chosen move; the null move when the position was already
    /// decided (checkmate, stalemate, or a repetition draw).
    pub best_move: Move,
    /// Score from White's point of view, in centipawns.
    pub score: i32,
    /// The deepest fully completed iteration.
    pub depth: u32,
}

pub struct Engine {
    main_tt: TranspositionTable,
    q_tt: TranspositionTable,
    killers: Box<[[Option<Move>; 2]; MAX_ENGINE_DEPTH]>,
    pub stats: SearchStats,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_table_sizes(MAIN_TABLE_SIZE, QSEARCH_TABLE_SIZE)
    }

    /// An engine with custom transposition-table sizes; tests use small
    /// tables to keep allocation cheap.
    pub fn with_table_sizes(main: usize, qsearch: usize) -> Self {
        Self {
            main_tt: TranspositionTable::new(main),
            q_tt: TranspositionTable::new(qsearch),
            killers: Box::new([[None; 2]; MAX_ENGINE_DEPTH]),
            stats: SearchStats::default(),
        }
    }

    pub fn reset_tables(&mut self) {
        self.main_tt.reset();
        self.q_tt.reset();
    }

    /// Runs an iteratively deepened search and returns the best move of
    /// the last fully completed depth. `stop` may be flipped from
    /// another thread at any time; the search winds down promptly and
    /// the freshest completed result is returned.
    ///
    /// The caller must ask for the side that is actually to move;
    /// anything else is an error rather than a silently reconciled
    /// request.
    pub fn do_engine(
        &mut self,
        board: &mut Board,
        settings: &EngineSettings,
        stop: &AtomicBool,
    ) -> Result<SearchReport, EngineError> {
        if settings.side != board.turn() {
            return Err(EngineError::SideMismatch {
                requested: settings.side,
                actual: board.turn(),
            });
        }
        if !settings.use_time && settings.depth as usize > MAX_ENGINE_DEPTH {
            return Err(EngineError::DepthOutOfRange(settings.depth));
        }

        self.stats = SearchStats::default();
        *self.killers = [[None; 2]; MAX_ENGINE_DEPTH];

        let (best, completed) = self.iterative_deepening(board, settings, stop);

        if !best.is_null() {
            if !board.is_legal(best) {
                return Err(EngineError::IllegalEngineMove(best.to_string()));
            }
            if settings.do_move {
                board.apply_move(best);
            }
        }

        // negamax maximises for the mover; flip so the report is
        // white-positive either way
        let score = if settings.side == Colour::White { best.score } else { -best.score };
        Ok(SearchReport { best_move: best, score, depth: completed })
    }

    fn iterative_deepening(
        &mut self,
        board: &mut Board,
        settings: &EngineSettings,
        stop: &AtomicBool,
    ) -> (Move, u32) {
        let start = Instant::now();
        // leave headroom for the next (likely most expensive) iteration
        let budget = settings.time * 7 / 10;

        let mut best = Move::NULL;
        let mut score = 0;
        let mut completed = 0;
        let mut depth = 1u32;

        loop {
            let conf = settings.search;
            let (alpha, beta) = if conf.aspiration_window {
                (score - conf.aspiration_window_size, score + conf.aspiration_window_size)
            } else {
                (-INFINITY, INFINITY)
            };

            let mut current = Move::NULL;
            score =
                self.negamax(board, depth as i32, 0, alpha, beta, conf, stop, Some(&mut current));
            if conf.aspiration_window && (score <= alpha || score >= beta) {
                score = self.negamax(
                    board,
                    depth as i32,
                    0,
                    -INFINITY,
                    INFINITY,
                    conf,
                    stop,
                    Some(&mut current),
                );
            }
            current.score = score;

            if !stop.load(Ordering::Relaxed) {
                best = current;
                completed = depth;
            }
            depth += 1;

            let mate_found = is_mate_score(best.score);
            let dead_position = best.is_null() && best.score == 0;
            let keep_going = if settings.use_time {
                start.elapsed() < budget
            } else {
                depth <= settings.depth
            };
            if !keep_going || stop.load(Ordering::Relaxed) || mate_found || dead_position {
                break;
            }
        }
        (best, completed)
    }

    #[allow(clippy::too_many_arguments, clippy::too_many_lines, clippy::cast_possible_wrap)]
    fn negamax(
        &mut self,
        board: &mut Board,
        depth: i32,
        ply: usize,
        mut alpha: i32,
        beta: i32,
        mut conf: SearchSettings,
        stop: &AtomicBool,
        mut root_move: Option<&mut Move>,
    ) -> i32 {
        let at_root = root_move.is_some();
        if stop.load(Ordering::Relaxed) && !at_root {
            return 0;
        }
        board.invalidate_caches();
        self.stats.nodes += 1;

        if board.is_draw_by_repetition() {
            self.stats.draws_detected += 1;
            if let Some(r) = root_move.as_mut() {
                **r = Move::NULL;
            }
            return 0;
        }

        if depth <= 0 || ply >= MAX_ENGINE_DEPTH {
            return self.quiescence(board, ply, 0, alpha, beta, conf, stop);
        }
        self.stats.normal_nodes += 1;

        let key = board.zobrist_key();
        self.main_tt.prefetch(key);

        conf.expected_cut_node = !conf.expected_cut_node && !conf.on_pv;

        board.ensure_check_pin_masks();
        let in_check = board.in_check();

        let probe = self.main_tt.probe(key, depth, alpha, beta);
        let tt_move = probe.hint.filter(|&m| board.is_legal(m));
        if let Some(tt_score) = probe.score {
            if let Some(m) = tt_move {
                self.stats.main_tt_hits += 1;
                if let Some(r) = root_move.as_mut() {
                    **r = m;
                }
                return tt_score;
            }
        }

        // a quiet node hopelessly below alpha near the horizon drops
        // straight into quiescence
        if !conf.on_pv && !in_check {
            if conf.futility_prune
                && depth == 1
                && board.score_board() < alpha - conf.futility_cutoff
            {
                self.stats.futility_cutoffs += 1;
                return self.quiescence(board, ply, 0, alpha, beta, conf, stop);
            }
            if conf.extended_futility_prune
                && depth == 2
                && board.score_board() < alpha - conf.extended_futility_cutoff
            {
                self.stats.extended_futility_cutoffs += 1;
                return self.quiescence(board, ply, 0, alpha, beta, conf, stop);
            }
        }

        let snapshot = board.snapshot();

        if conf.null_move_prune && !conf.on_pv && !in_check {
            let mut child = conf;
            child.null_move_prune = false;
            board.apply_null_move();
            let null_score = -self.negamax(
                board,
                depth - conf.null_move_depth,
                ply + 1,
                -beta,
                -beta + 1,
                child,
                stop,
                None,
            );
            board.restore(&snapshot);
            if null_score >= beta {
                self.stats.null_move_cutoffs += 1;
                return beta;
            }
        }

        let mut picker = MovePicker::new(&conf, board);
        board.generate_moves(&mut picker.buckets);
        if let Some(m) = tt_move {
            picker.buckets.best.push(m);
        }
        if conf.use_killer_moves {
            for killer in self.killers[ply].iter().flatten() {
                picker.buckets.killer.push(*killer);
            }
        }

        // probe the first few moves at reduced depth with a null window;
        // enough fail-highs and the node is abandoned as a cut node
        if conf.multi_cut_prune && !conf.on_pv && !in_check && conf.expected_cut_node {
            let mut child = conf;
            child.multi_cut_prune = false;
            let mut cutoffs = 0;
            let mut tried = 0;
            while tried < conf.multi_cut_moves {
                let Some(m) = picker.next(board) else { break };
                tried += 1;
                board.apply_move(m);
                let probe_score = -self.negamax(
                    board,
                    depth - conf.multi_cut_depth,
                    ply + 1,
                    -beta,
                    -beta + 1,
                    child,
                    stop,
                    None,
                );
                board.restore(&snapshot);
                if probe_score >= beta {
                    cutoffs += 1;
                    if cutoffs >= conf.multi_cut_threshold {
                        self.stats.multi_cut_cutoffs += 1;
                        return beta;
                    }
                }
            }
            picker.reset();
        }

        let mut best_score = -CHECKMATE_SCORE + ply as i32;
        let mut best_move = Move::NULL;
        let mut bound = Bound::Upper;
        let mut num_moves = 0u32;
        let mut search_beta = beta;
        let mut do_null_window = false;

        let can_reduce = conf.late_move_reduction && !conf.on_pv && !in_check;

        while let Some(m) = picker.next(board) {
            num_moves += 1;
            if picker.last_stage() == Stage::Killer {
                self.stats.killer_moves_tried += 1;
            }

            // late moves below a PV-candidate get a shallower look
            let mut search_depth = depth - 1;
            if can_reduce && bound != Bound::Exact {
                if num_moves > conf.num_late_moves_div {
                    search_depth = depth / conf.late_move_div;
                    self.stats.late_move_reductions += 1;
                } else if num_moves > conf.num_late_moves_sub {
                    search_depth = depth - conf.late_move_sub;
                    self.stats.late_move_reductions += 1;
                }
            }

            board.apply_move(m);
            let mut score = -self.negamax(
                board,
                search_depth,
                ply + 1,
                -search_beta,
                -alpha,
                conf,
                stop,
                None,
            );
            if do_null_window && score > alpha && score < beta && search_depth > 0 {
                // the null window failed high: this move might beat the
                // PV after all, so it earns a full-window search
                self.stats.null_window_researches += 1;
                score =
                    -self.negamax(board, search_depth, ply + 1, -beta, -alpha, conf, stop, None);
            }
            board.restore(&snapshot);

            if score > best_score {
                best_score = score;
                best_move = m;
            }
            if !at_root {
                conf.on_pv = false;
            }
            if best_score > alpha {
                alpha = best_score;
                bound = Bound::Exact;
                do_null_window = conf.null_window_search;
            }
            if alpha >= beta {
                bound = Bound::Lower;
                if conf.use_killer_moves && !m.is_capture() {
                    self.insert_killer(ply, m);
                }
                break;
            }
            if do_null_window {
                search_beta = alpha + 1;
            }
        }

        if num_moves == 0 && !in_check {
            // stalemate; mate is already covered by the initial score
            best_move = Move::NULL;
            best_score = 0;
            self.stats.draws_detected += 1;
            if best_score > alpha {
                bound = Bound::Exact;
            }
        }

        best_move.score = best_score;
        if let Some(r) = root_move.as_mut() {
            **r = best_move;
        }

        if stop.load(Ordering::Relaxed) {
            // a cancelled node's result is garbage; keep it out of the table
            return 0;
        }
        self.main_tt.insert(key, depth, best_move, bound);
        best_score
    }

    #[allow(clippy::too_many_arguments, clippy::cast_possible_wrap)]
    fn quiescence(
        &mut self,
        board: &mut Board,
        ply: usize,
        qdepth: i32,
        mut alpha: i32,
        beta: i32,
        conf: SearchSettings,
        stop: &AtomicBool,
    ) -> i32 {
        if stop.load(Ordering::Relaxed) {
            return 0;
        }
        board.invalidate_caches();
        self.stats.nodes += 1;
        self.stats.quiescence_nodes += 1;

        let stand_pat = board.score_board();
        if ply >= MAX_ENGINE_DEPTH || qdepth >= conf.quiescence_depth_limit {
            return stand_pat;
        }
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
        // no single capture recovers a whole queen's deficit
        if stand_pat < alpha - QUEEN_SCORE {
            return alpha;
        }

        let key = board.zobrist_key();
        self.q_tt.prefetch(key);
        board.ensure_check_pin_masks();
        let in_check = board.in_check();

        let probe = self.q_tt.probe(key, 0, alpha, beta);
        let tt_move = probe.hint.filter(|&m| board.is_legal(m));
        if let Some(tt_score) = probe.score {
            if tt_move.is_some() {
                self.stats.q_tt_hits += 1;
                return tt_score;
            }
        }

        let mut picker = MovePicker::new(&conf, board);
        if in_check {
            // a checked position is anything but quiet: search every evasion
            board.generate_moves(&mut picker.buckets);
        } else {
            board.generate_captures(&mut picker.buckets);
        }
        if let Some(m) = tt_move {
            if is_good_for_quiescence(m, in_check) {
                picker.buckets.best.push(m);
            }
        }

        let snapshot = board.snapshot();
        let mut best_score = stand_pat;
        let mut best_move = Move::NULL;
        let mut bound = Bound::Upper;
        let mut did_move = false;

        while let Some(m) = picker.next(board) {
            if !is_good_for_quiescence(m, in_check) {
                // buckets are ordered, every later move is quieter still
                break;
            }
            if conf.do_delta_pruning && !in_check && !m.flags.is_promotion() {
                if let Some(victim) = m.capture {
                    if stand_pat + piece_value(victim.piece_type()) + conf.delta_pruning_margin
                        <= alpha
                    {
                        continue;
                    }
                }
            }

            board.apply_move(m);
            did_move = true;
            let score = -self.quiescence(board, ply + 1, qdepth + 1, -beta, -alpha, conf, stop);
            board.restore(&snapshot);

            if score > best_score {
                best_score = score;
            }
            if best_score > alpha {
                alpha = best_score;
                bound = Bound::Exact;
                best_move = m;
            }
            if alpha >= beta {
                bound = Bound::Lower;
                break;
            }
        }

        if in_check && !did_move {
            // every evasion was searched and none exists
            return -CHECKMATE_SCORE + ply as i32;
        }

        if stop.load(Ordering::Relaxed) {
            return 0;
        }
        if did_move {
            best_move.score = best_score;
            self.q_tt.insert(key, 0, best_move, bound);
        }
        best_score
    }

    fn insert_killer(&mut self, ply: usize, m: Move) {
        let slot = &mut self.killers[ply];
        if slot[0] != Some(m) {
            slot[1] = slot[0];
            slot[0] = Some(m);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Moves worth resolving past the horizon: non-pawn captures and
/// promotions, or anything at all while in check.
fn is_good_for_quiescence(m: Move, in_check: bool) -> bool {
    in_check
        || m.flags.is_promotion()
        || m.capture.map_or(false, |c| c.piece_type() != PieceType::Pawn)
}

mod tests {
    #![allow(unused_imports)]
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::Engine;
    use crate::board::evaluation::is_mate_score;
    use crate::board::Board;
    use crate::errors::EngineError;
    use crate::piece::Colour;
    use crate::searchinfo::EngineSettings;

    fn test_engine() -> Engine {
        Engine::with_table_sizes(65_003, 9973)
    }

    fn search(fen: &str, depth: u32) -> super::SearchReport {
        let mut board = Board::from_fen(fen).unwrap();
        let mut engine = test_engine();
        let settings = EngineSettings { depth, side: board.turn(), ..Default::default() };
        let stop = AtomicBool::new(false);
        engine.do_engine(&mut board, &settings, &stop).unwrap()
    }

    #[test]
    fn finds_mate_in_one() {
        // Qh8 and Qb7 both mate on the spot
        let report = search("k7/8/1K6/8/8/8/8/7Q w - - 0 1", 2);
        assert!(is_mate_score(report.score), "score was {}", report.score);
        let text = report.best_move.to_string();
        assert!(text == "h1h8" || text == "h1b7", "engine played {text}");
    }

    #[test]
    fn avoids_the_stalemate_trap() {
        // Qe4 would stalemate the cornered king; Qh1 mates instead
        let report = search("8/8/8/8/7Q/1K6/8/k7 w - - 0 1", 4);
        assert_ne!(report.best_move.to_string(), "h4e4");
        assert!(is_mate_score(report.score), "score was {}", report.score);
        assert_eq!(report.best_move.to_string(), "h4h1");
    }

    #[test]
    fn mated_root_returns_the_null_move() {
        // fool's mate has been delivered; white has no move
        let report = search("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3", 3);
        assert!(report.best_move.is_null());
        assert!(report.score < 0);
        assert!(is_mate_score(report.score));
    }

    #[test]
    fn stalemated_root_returns_the_null_move_with_zero_score() {
        let report = search("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3);
        assert!(report.best_move.is_null());
        assert_eq!(report.score, 0);
    }

    #[test]
    fn side_mismatch_is_rejected() {
        let mut board = Board::default();
        let mut engine = test_engine();
        let settings =
            EngineSettings { depth: 2, side: Colour::Black, ..Default::default() };
        let stop = AtomicBool::new(false);
        let err = engine.do_engine(&mut board, &settings, &stop).unwrap_err();
        assert!(matches!(err, EngineError::SideMismatch { .. }));
    }

    #[test]
    fn search_leaves_the_position_untouched_without_do_move() {
        let mut board = Board::default();
        let fen_before = board.to_fen();
        let mut engine = test_engine();
        let settings = EngineSettings { depth: 3, side: Colour::White, ..Default::default() };
        let stop = AtomicBool::new(false);
        engine.do_engine(&mut board, &settings, &stop).unwrap();
        assert_eq!(board.to_fen(), fen_before);
    }

    #[test]
    fn do_move_applies_the_chosen_move() {
        let mut board = Board::default();
        let mut engine = test_engine();
        let settings = EngineSettings {
            depth: 3,
            side: Colour::White,
            do_move: true,
            ..Default::default()
        };
        let stop = AtomicBool::new(false);
        let report = engine.do_engine(&mut board, &settings, &stop).unwrap();
        assert_eq!(board.turn(), Colour::Black);
        assert!(!report.best_move.is_null());
        board.check_validity().unwrap();
    }

    #[test]
    fn grabs_a_hanging_queen() {
        // white to move, the black queen hangs on d5
        let report = search("k7/8/8/3q4/8/8/3R4/K7 w - - 0 1", 4);
        assert_eq!(report.best_move.to_string(), "d2d5");
        assert!(report.score > 300);
    }

    #[test]
    fn pre_cancelled_search_completes_no_iteration() {
        let mut board = Board::default();
        let mut engine = test_engine();
        let settings = EngineSettings { depth: 2, side: Colour::White, ..Default::default() };
        let stop = AtomicBool::new(true);
        let report = engine.do_engine(&mut board, &settings, &stop).unwrap();
        assert_eq!(report.depth, 0);
        assert!(report.best_move.is_null());
    }

    #[test]
    fn black_scores_are_reported_white_relative() {
        // black is a queen up and to move; the report must be negative
        let report = search("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNB1KBNR b KQkq - 0 1", 3);
        assert!(report.score < -300, "score was {}", report.score);
    }

    #[test]
    fn repetition_draw_scores_zero_at_the_root() {
        let mut board = Board::default();
        for _ in 0..2 {
            for text in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                let m = board.parse_move(text).unwrap();
                board.apply_move(m);
            }
        }
        let mut engine = test_engine();
        let settings = EngineSettings { depth: 3, side: Colour::White, ..Default::default() };
        let stop = AtomicBool::new(false);
        let report = engine.do_engine(&mut board, &settings, &stop).unwrap();
        assert!(report.best_move.is_null());
        assert_eq!(report.score, 0);
    }
}
