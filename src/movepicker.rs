//! Staged move ordering. Moves are handed out bucket by bucket — the
//! transposition-table hint, then promotions/castles/passed-pawn
//! pushes, then captures, then killers, then everything else — sorting
//! lazily so nodes that cut off early never pay for a full sort.

use arrayvec::ArrayVec;

use crate::board::movegen::MoveBuckets;
use crate::board::Board;
use crate::chessmove::Move;
use crate::searchinfo::SearchSettings;
use crate::squareset::SquareSet;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Stage {
    Best,
    ProbablyGood,
    Attack,
    Killer,
    Normal,
    Done,
}

pub struct MovePicker {
    pub buckets: MoveBuckets,
    stage: Stage,
    index: usize,
    /// Captures landing here are tried before every other capture.
    recapture_square: SquareSet,
    recapture_done: bool,
    last_stage: Stage,
}

impl MovePicker {
    pub fn new(settings: &SearchSettings, board: &Board) -> Self {
        let recapture_square = if settings.search_recapture_first {
            board.last_capture_to()
        } else {
            SquareSet::EMPTY
        };
        Self {
            buckets: MoveBuckets::new(),
            stage: Stage::Best,
            index: 0,
            recapture_square,
            recapture_done: false,
            last_stage: Stage::Best,
        }
    }

    /// The bucket the most recently yielded move came from.
    pub fn last_stage(&self) -> Stage {
        self.last_stage
    }

    /// Rewinds to the first move without regenerating anything; used
    /// after a probing pass (multi-cut) over the same move set.
    pub fn reset(&mut self) {
        self.stage = Stage::Best;
        self.index = 0;
        self.recapture_done = false;
    }

    fn is_already_tried(&self, m: Move) -> bool {
        self.buckets.best.first() == Some(&m)
            || (self.stage > Stage::Killer && self.buckets.killer.contains(&m))
    }

    /// The next move to try, or `None` when every bucket is exhausted.
    /// Killer moves are vetted for legality here: a killer recorded at
    /// this ply in a sibling branch need not be legal in this position.
    pub fn next(&mut self, board: &mut Board) -> Option<Move> {
        let m = self.next_inner(board);
        if m.is_some() {
            self.last_stage = self.stage;
        }
        m
    }

    fn next_inner(&mut self, board: &mut Board) -> Option<Move> {
        loop {
            match self.stage {
                Stage::Best => {
                    if self.index < self.buckets.best.len() {
                        let m = self.buckets.best[self.index];
                        self.index += 1;
                        return Some(m);
                    }
                    self.stage = Stage::ProbablyGood;
                    self.index = 0;
                }
                Stage::ProbablyGood => {
                    if let Some(m) = Self::take_highest(&mut self.buckets.probably_good, self.index)
                    {
                        self.index += 1;
                        if self.is_already_tried(m) {
                            continue;
                        }
                        return Some(m);
                    }
                    self.stage = Stage::Attack;
                    self.index = 0;
                }
                Stage::Attack => {
                    if !self.recapture_done {
                        self.recapture_done = true;
                        if self.recapture_square.non_empty() {
                            if let Some(pos) = self.buckets.attack[self.index..]
                                .iter()
                                .position(|m| m.to == self.recapture_square)
                            {
                                self.buckets.attack.swap(self.index, self.index + pos);
                                let m = self.buckets.attack[self.index];
                                self.index += 1;
                                if !self.is_already_tried(m) {
                                    return Some(m);
                                }
                            }
                        }
                        continue;
                    }
                    if let Some(m) = Self::take_highest(&mut self.buckets.attack, self.index) {
                        self.index += 1;
                        if self.is_already_tried(m) {
                            continue;
                        }
                        return Some(m);
                    }
                    self.stage = Stage::Killer;
                    self.index = 0;
                }
                Stage::Killer => {
                    if self.index < self.buckets.killer.len() {
                        let m = self.buckets.killer[self.index];
                        self.index += 1;
                        if self.buckets.best.first() == Some(&m)
                            || self.buckets.probably_good.contains(&m)
                            || !board.is_legal(m)
                        {
                            continue;
                        }
                        return Some(m);
                    }
                    self.stage = Stage::Normal;
                    self.index = 0;
                }
                Stage::Normal => {
                    if let Some(&m) = self.buckets.normal.get(self.index) {
                        self.index += 1;
                        if self.is_already_tried(m) {
                            continue;
                        }
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    fn take_highest<const CAP: usize>(
        bucket: &mut ArrayVec<Move, CAP>,
        from: usize,
    ) -> Option<Move> {
        let remaining = &bucket[from..];
        if remaining.is_empty() {
            return None;
        }
        let mut best = 0;
        for (offset, m) in remaining.iter().enumerate() {
            if m.score > remaining[best].score {
                best = offset;
            }
        }
        bucket.swap(from, from + best);
        Some(bucket[from])
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::MovePicker;
    use crate::board::Board;
    use crate::chessmove::Move;
    use crate::piece::PieceType;
    use crate::searchinfo::SearchSettings;

    fn drain(board: &mut Board, settings: &SearchSettings) -> Vec<Move> {
        let mut picker = MovePicker::new(settings, board);
        board.generate_moves(&mut picker.buckets);
        let mut out = Vec::new();
        while let Some(m) = picker.next(board) {
            out.push(m);
        }
        out
    }

    #[test]
    fn yields_every_legal_move_exactly_once() {
        let mut board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let settings = SearchSettings::default();
        let yielded = drain(&mut board, &settings);
        let mut reference = board.legal_moves();
        assert_eq!(yielded.len(), reference.len());
        for m in &yielded {
            assert!(reference.contains(m), "{m} yielded but not legal");
            reference.retain(|r| r != m);
        }
        assert!(reference.is_empty());
    }

    #[test]
    fn best_bucket_comes_first_and_is_not_repeated() {
        let mut board = Board::default();
        let settings = SearchSettings::default();
        let hint = board.parse_move("e2e4").unwrap();

        let mut picker = MovePicker::new(&settings, &mut board);
        board.generate_moves(&mut picker.buckets);
        picker.buckets.best.push(hint);

        let first = picker.next(&mut board).unwrap();
        assert_eq!(first, hint);

        let mut rest = Vec::new();
        while let Some(m) = picker.next(&mut board) {
            rest.push(m);
        }
        assert_eq!(rest.len(), 19);
        assert!(!rest.contains(&hint));
    }

    #[test]
    fn illegal_killers_are_skipped() {
        let mut board = Board::default();
        let settings = SearchSettings::default();
        // a killer from some other ply: white queen to h5 is not legal here
        let bogus = Move::new(
            crate::squareset::SquareSet::from_square("d1".parse().unwrap()),
            crate::squareset::SquareSet::from_square("h5".parse().unwrap()),
            crate::piece::Piece::WQ,
        );
        let mut picker = MovePicker::new(&settings, &mut board);
        board.generate_moves(&mut picker.buckets);
        picker.buckets.killer.push(bogus);
        let mut yielded = Vec::new();
        while let Some(m) = picker.next(&mut board) {
            yielded.push(m);
        }
        assert_eq!(yielded.len(), 20);
        assert!(!yielded.contains(&bogus));
    }

    #[test]
    fn captures_sort_by_victim_value() {
        // white queen can take a rook or a pawn; the rook capture must come first
        let mut board = Board::from_fen("k2r4/8/8/8/3Q2p1/8/8/K7 w - - 0 1").unwrap();
        let settings = SearchSettings::default();
        let yielded = drain(&mut board, &settings);
        let captures: Vec<_> = yielded.iter().filter(|m| m.is_capture()).collect();
        assert!(captures.len() >= 2);
        assert_eq!(captures[0].capture.map(|p| p.piece_type()), Some(PieceType::Rook));
    }
}
