//! A fixed-size, single-probe cache of searched positions. Entries are
//! 16 bytes and the table is allocated once at engine construction, so
//! probing never allocates and the slot for a key never moves.

use crate::chessmove::{Move, TinyMove};

/// Close to fifteen million slots for the main search; prime, so the
/// modulo spreads keys evenly.
pub const MAIN_TABLE_SIZE: usize = 15_485_863;
/// The quiescence search gets its own, much smaller table.
pub const QSEARCH_TABLE_SIZE: usize = 1_000_003;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Bound {
    /// A PV node: the score is exact.
    Exact,
    /// A beta cutoff happened: the true score is at least this.
    Lower,
    /// No move raised alpha: the true score is at most this.
    Upper,
}

#[derive(Clone, Copy)]
#[repr(C)]
struct Entry {
    key: u64,
    mov: TinyMove,
    score: i16,
    kind: Bound,
    depth: i8,
}

const _ENTRY_SIZE: () = assert!(std::mem::size_of::<Entry>() == 16);

impl Entry {
    /// An unreachable key and a depth below every real search depth, so
    /// fresh slots never match and always lose replacement fights.
    const VACANT: Self =
        Self { key: u64::MAX, mov: TinyMove::NULL, score: 0, kind: Bound::Lower, depth: -1 };
}

/// What a probe found: a move worth trying first, and a score that can
/// be returned outright when the stored bound settles this node.
#[derive(Clone, Copy, Debug, Default)]
pub struct Probe {
    pub hint: Option<Move>,
    pub score: Option<i32>,
}

pub struct TranspositionTable {
    entries: Vec<Entry>,
}

impl TranspositionTable {
    pub fn new(size: usize) -> Self {
        assert!(size > 0);
        Self { entries: vec![Entry::VACANT; size] }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn slot(&self, key: u64) -> usize {
        (key % self.entries.len() as u64) as usize
    }

    pub fn probe(&self, key: u64, depth: i32, alpha: i32, beta: i32) -> Probe {
        let entry = self.entries[self.slot(key)];
        if entry.key != key {
            return Probe::default();
        }
        let hint = entry.mov.unpack();
        let mut score = None;
        if i32::from(entry.depth) >= depth {
            let stored = i32::from(entry.score);
            score = match entry.kind {
                Bound::Exact => Some(stored),
                Bound::Lower if stored >= beta => Some(beta),
                Bound::Upper if stored <= alpha => Some(alpha),
                _ => None,
            };
        }
        Probe { hint, score }
    }

    /// Depth-preferred replacement: a slot only ever gives way to an
    /// equally deep or deeper search of some position.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, key: u64, depth: i32, m: Move, kind: Bound) {
        debug_assert!((0..=i32::from(i8::MAX)).contains(&depth));
        let slot = self.slot(key);
        let entry = &mut self.entries[slot];
        if i32::from(entry.depth) <= depth {
            *entry = Entry {
                key,
                mov: TinyMove::pack(m),
                score: m.score.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16,
                kind,
                depth: depth as i8,
            };
        }
    }

    /// Pulls the slot for `key` toward the cache ahead of the probe
    /// that is about to happen.
    pub fn prefetch(&self, key: u64) {
        #[cfg(target_arch = "x86_64")]
        // SAFETY: the pointer is in bounds, and prefetching cannot
        // observably go wrong anyway.
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            let entry = &self.entries[self.slot(key)];
            _mm_prefetch(std::ptr::from_ref::<Entry>(entry).cast::<i8>(), _MM_HINT_T0);
        }
    }

    pub fn reset(&mut self) {
        self.entries.fill(Entry::VACANT);
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::{Bound, TranspositionTable};
    use crate::board::Board;
    use crate::chessmove::Move;

    fn sample_move(score: i32) -> Move {
        let mut board = Board::default();
        let mut m = board.parse_move("e2e4").unwrap();
        m.score = score;
        m
    }

    #[test]
    fn probe_misses_on_fresh_table() {
        let tt = TranspositionTable::new(1021);
        let probe = tt.probe(0xABCD, 1, -100, 100);
        assert!(probe.hint.is_none());
        assert!(probe.score.is_none());
    }

    #[test]
    fn exact_entries_are_definitive_at_sufficient_depth() {
        let mut tt = TranspositionTable::new(1021);
        let m = sample_move(42);
        tt.insert(0xABCD, 5, m, Bound::Exact);

        let probe = tt.probe(0xABCD, 5, -100, 100);
        assert_eq!(probe.hint, Some(sample_move(0)));
        assert_eq!(probe.score, Some(42));

        // deeper requests only get the hint
        let probe = tt.probe(0xABCD, 6, -100, 100);
        assert!(probe.hint.is_some());
        assert!(probe.score.is_none());
    }

    #[test]
    fn bounds_respect_the_window() {
        let mut tt = TranspositionTable::new(1021);
        let m = sample_move(80);
        tt.insert(1, 3, m, Bound::Lower);
        // lower bound of 80 fails high against beta = 50
        assert_eq!(tt.probe(1, 3, -100, 50).score, Some(50));
        // but proves nothing against beta = 200
        assert!(tt.probe(1, 3, -100, 200).score.is_none());

        let m = sample_move(-80);
        tt.insert(2, 3, m, Bound::Upper);
        assert_eq!(tt.probe(2, 3, -50, 100).score, Some(-50));
        assert!(tt.probe(2, 3, -200, 100).score.is_none());
    }

    #[test]
    fn shallower_results_never_evict_deeper_ones() {
        let mut tt = TranspositionTable::new(1021);
        tt.insert(7, 9, sample_move(10), Bound::Exact);
        tt.insert(7, 3, sample_move(99), Bound::Exact);
        assert_eq!(tt.probe(7, 9, -1000, 1000).score, Some(10));

        tt.reset();
        assert!(tt.probe(7, 0, -1000, 1000).hint.is_none());
    }
}
