use std::fmt::{self, Display};
use std::str::FromStr;

/// The deepest ply the engine will ever visit. Quiescence shares this
/// bound, so the repetition ring and killer tables are sized from it.
pub const MAX_ENGINE_DEPTH: usize = 64;

/// Number of prior Zobrist keys retained for repetition detection.
/// Must comfortably exceed the fifty-move horizon so the scanned
/// window never wraps onto itself.
pub const REPETITION_RING: usize = 256;

/// An index 0..63 identifying a board square, a1 = 0, h8 = 63.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Square(u8);

static SQUARE_NAMES: [&str; 64] = [
    "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1", "a2", "b2", "c2", "d2", "e2", "f2", "g2", "h2",
    "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3", "a4", "b4", "c4", "d4", "e4", "f4", "g4", "h4",
    "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5", "a6", "b6", "c6", "d6", "e6", "f6", "g6", "h6",
    "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7", "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8",
];

impl Square {
    pub const A1: Self = Self(0);
    pub const B1: Self = Self(1);
    pub const C1: Self = Self(2);
    pub const D1: Self = Self(3);
    pub const E1: Self = Self(4);
    pub const F1: Self = Self(5);
    pub const G1: Self = Self(6);
    pub const H1: Self = Self(7);
    pub const E2: Self = Self(12);
    pub const E4: Self = Self(28);
    pub const D5: Self = Self(35);
    pub const A8: Self = Self(56);
    pub const B8: Self = Self(57);
    pub const C8: Self = Self(58);
    pub const D8: Self = Self(59);
    pub const E8: Self = Self(60);
    pub const F8: Self = Self(61);
    pub const G8: Self = Self(62);
    pub const H8: Self = Self(63);

    pub const fn new(inner: u8) -> Self {
        debug_assert!(inner < 64);
        Self(inner)
    }

    pub const fn from_rank_file(rank: u8, file: u8) -> Self {
        debug_assert!(rank < 8 && file < 8);
        Self(rank * 8 + file)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The file that this square is on.
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// The rank that this square is on.
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    pub const fn flip_rank(self) -> Self {
        Self(self.0 ^ 0b111_000)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..64).map(Self::new)
    }

    pub fn name(self) -> &'static str {
        SQUARE_NAMES[self.index()]
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Square {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SQUARE_NAMES
            .iter()
            .position(|&name| name == s)
            .and_then(|index| -> Option<u8> { index.try_into().ok() })
            .map(Self::new)
            .ok_or("invalid square name")
    }
}

mod tests {
    #[test]
    fn square_names_round_trip() {
        use super::Square;
        for sq in Square::all() {
            assert_eq!(sq.name().parse::<Square>().unwrap(), sq);
        }
    }

    #[test]
    fn square_flipping() {
        use super::Square;
        assert_eq!(Square::A1.flip_rank(), Square::A8);
        assert_eq!(Square::H8.flip_rank(), Square::H1);
        assert_eq!(Square::E2.flip_rank().rank(), 6);
    }
}
