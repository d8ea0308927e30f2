use std::fmt::{self, Debug, Display, Formatter};

use crate::piece::{Piece, PieceType};
use crate::squareset::SquareSet;
use crate::util::Square;

/// Move annotations, nine bits so the whole set packs into a `TinyMove`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MoveFlags(u16);

impl MoveFlags {
    pub const NONE: Self = Self(0);
    pub const CASTLE_WK: Self = Self(1 << 0);
    pub const CASTLE_WQ: Self = Self(1 << 1);
    pub const CASTLE_BK: Self = Self(1 << 2);
    pub const CASTLE_BQ: Self = Self(1 << 3);
    pub const EN_PASSANT: Self = Self(1 << 4);
    pub const PROMO_B: Self = Self(1 << 5);
    pub const PROMO_N: Self = Self(1 << 6);
    pub const PROMO_R: Self = Self(1 << 7);
    pub const PROMO_Q: Self = Self(1 << 8);

    const CASTLE_MASK: u16 = 0b1111;
    const PROMO_MASK: u16 = 0b1_1110_0000;
    const ALL_MASK: u16 = 0b1_1111_1111;

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::ALL_MASK)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_castle(self) -> bool {
        (self.0 & Self::CASTLE_MASK) != 0
    }

    pub const fn is_en_passant(self) -> bool {
        (self.0 & Self::EN_PASSANT.0) != 0
    }

    pub const fn is_promotion(self) -> bool {
        (self.0 & Self::PROMO_MASK) != 0
    }

    pub fn promotion_type(self) -> Option<PieceType> {
        if self.contains(Self::PROMO_Q) {
            Some(PieceType::Queen)
        } else if self.contains(Self::PROMO_N) {
            Some(PieceType::Knight)
        } else if self.contains(Self::PROMO_R) {
            Some(PieceType::Rook)
        } else if self.contains(Self::PROMO_B) {
            Some(PieceType::Bishop)
        } else {
            None
        }
    }

    pub const fn promotion_flag(piece_type: PieceType) -> Self {
        match piece_type {
            PieceType::Queen => Self::PROMO_Q,
            PieceType::Knight => Self::PROMO_N,
            PieceType::Rook => Self::PROMO_R,
            _ => Self::PROMO_B,
        }
    }

}

impl Debug for MoveFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MoveFlags({:#011b})", self.0)
    }
}

/// A move: single-bit source and destination sets, the moving piece, the
/// captured piece if any, flag bits, and the ordering score the search
/// sorts on. Equality ignores the score.
#[derive(Clone, Copy)]
pub struct Move {
    pub from: SquareSet,
    pub to: SquareSet,
    pub piece: Piece,
    pub capture: Option<Piece>,
    pub flags: MoveFlags,
    pub score: i32,
}

impl Move {
    /// The all-zero sentinel handed back when a search terminates with no
    /// legal move (checkmate or stalemate at the root).
    pub const NULL: Self = Self {
        from: SquareSet::EMPTY,
        to: SquareSet::EMPTY,
        piece: Piece::WP,
        capture: None,
        flags: MoveFlags::NONE,
        score: 0,
    };

    pub const fn new(from: SquareSet, to: SquareSet, piece: Piece) -> Self {
        Self { from, to, piece, capture: None, flags: MoveFlags::NONE, score: 0 }
    }

    pub const fn is_null(self) -> bool {
        self.from.is_empty() && self.to.is_empty()
    }

    pub fn from_square(self) -> Square {
        self.from.first()
    }

    pub fn to_square(self) -> Square {
        self.to.first()
    }

    pub const fn is_capture(self) -> bool {
        self.capture.is_some()
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        // the ordering score is search bookkeeping, not move identity
        self.from == other.from
            && self.to == other.to
            && self.piece == other.piece
            && self.capture == other.capture
            && self.flags == other.flags
    }
}

impl Eq for Move {}

impl Display for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "0000");
        }
        write!(f, "{}{}", self.from_square(), self.to_square())?;
        if let Some(promo) = self.flags.promotion_type() {
            write!(f, "{}", promo.promo_char().unwrap_or('?'))?;
        }
        Ok(())
    }
}

impl Debug for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}{}, flags {:?}, score {})",
            self,
            self.piece,
            self.capture.map(|c| format!(" x{c}")).unwrap_or_default(),
            self.flags,
            self.score
        )
    }
}

/// A move packed into 32 bits for transposition-table entries:
/// 6 source-square bits, 6 destination bits, 4 each for the moving and
/// captured pieces, 9 flag bits.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TinyMove(u32);

const FROM_SHIFT: u32 = 0;
const TO_SHIFT: u32 = 6;
const PIECE_SHIFT: u32 = 12;
const CAPTURE_SHIFT: u32 = 16;
const FLAGS_SHIFT: u32 = 20;

const SQ_MASK: u32 = 0x3F;
const PIECE_MASK: u32 = 0xF;
const FLAGS_MASK: u32 = 0x1FF;

/// The piece nibble has 12 legal values; this one marks "no piece".
const NO_PIECE: u32 = 12;

impl TinyMove {
    pub const NULL: Self = Self(NO_PIECE << PIECE_SHIFT);

    pub fn pack(m: Move) -> Self {
        if m.is_null() {
            return Self::NULL;
        }
        let from = m.from_square().index() as u32;
        let to = m.to_square().index() as u32;
        let piece = m.piece.inner() as u32;
        let capture = m.capture.map_or(NO_PIECE, |c| u32::from(c.inner()));
        let flags = u32::from(m.flags.bits());
        Self(
            (from << FROM_SHIFT)
                | (to << TO_SHIFT)
                | (piece << PIECE_SHIFT)
                | (capture << CAPTURE_SHIFT)
                | (flags << FLAGS_SHIFT),
        )
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn unpack(self) -> Option<Move> {
        let piece = Piece::from_index(((self.0 >> PIECE_SHIFT) & PIECE_MASK) as u8)?;
        let from = Square::new(((self.0 >> FROM_SHIFT) & SQ_MASK) as u8);
        let to = Square::new(((self.0 >> TO_SHIFT) & SQ_MASK) as u8);
        let capture = Piece::from_index(((self.0 >> CAPTURE_SHIFT) & PIECE_MASK) as u8);
        let flags = MoveFlags::from_bits(((self.0 >> FLAGS_SHIFT) & FLAGS_MASK) as u16);
        Some(Move {
            from: SquareSet::from_square(from),
            to: SquareSet::from_square(to),
            piece,
            capture,
            flags,
            score: 0,
        })
    }

    pub const fn inner(self) -> u32 {
        self.0
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::{Move, MoveFlags, TinyMove};
    use crate::piece::{Piece, PieceType};
    use crate::squareset::SquareSet;
    use crate::util::Square;

    #[test]
    fn flags_classify() {
        assert!(MoveFlags::CASTLE_BQ.is_castle());
        assert!(!MoveFlags::EN_PASSANT.is_castle());
        assert!(MoveFlags::EN_PASSANT.is_en_passant());
        assert!(MoveFlags::PROMO_N.is_promotion());
        assert_eq!(MoveFlags::PROMO_N.promotion_type(), Some(PieceType::Knight));
        assert_eq!(MoveFlags::promotion_flag(PieceType::Queen), MoveFlags::PROMO_Q);
    }

    #[test]
    fn display_is_coordinate_notation() {
        let m = Move::new(
            SquareSet::from_square(Square::E2),
            SquareSet::from_square(Square::E4),
            Piece::WP,
        );
        assert_eq!(m.to_string(), "e2e4");

        let mut promo = Move::new(
            SquareSet::from_square(Square::from_rank_file(6, 0)),
            SquareSet::from_square(Square::from_rank_file(7, 0)),
            Piece::WP,
        );
        promo.flags = MoveFlags::PROMO_Q;
        assert_eq!(promo.to_string(), "a7a8q");
    }

    #[test]
    fn equality_ignores_score() {
        let mut a = Move::new(
            SquareSet::from_square(Square::E2),
            SquareSet::from_square(Square::E4),
            Piece::WP,
        );
        let mut b = a;
        a.score = 100;
        b.score = -100;
        assert_eq!(a, b);
    }

    #[test]
    fn tiny_move_round_trip() {
        let mut m = Move::new(
            SquareSet::from_square(Square::D5),
            SquareSet::from_square(Square::from_rank_file(5, 2)),
            Piece::WP,
        );
        m.capture = Some(Piece::BP);
        m.flags = MoveFlags::EN_PASSANT;
        let packed = TinyMove::pack(m);
        assert_eq!(packed.unpack(), Some(m));

        let castle = Move {
            from: SquareSet::from_square(Square::E1),
            to: SquareSet::from_square(Square::G1),
            piece: Piece::WK,
            capture: None,
            flags: MoveFlags::CASTLE_WK,
            score: 0,
        };
        assert_eq!(TinyMove::pack(castle).unpack(), Some(castle));

        assert_eq!(TinyMove::pack(Move::NULL), TinyMove::NULL);
        assert_eq!(TinyMove::NULL.unpack(), None);
    }

    #[test]
    fn tiny_move_round_trips_every_generated_move() {
        for fen in [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "8/8/8/1Pp5/8/8/8/K2k4 w - c6 0 1",
        ] {
            let mut board = crate::board::Board::from_fen(fen).unwrap();
            for m in board.legal_moves() {
                assert_eq!(TinyMove::pack(m).unpack(), Some(m), "round-trip failed for {m}");
            }
        }
    }
}
