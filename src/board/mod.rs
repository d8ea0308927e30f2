pub mod evaluation;
pub mod movegen;

use std::fmt::{self, Debug, Display, Formatter};

use crate::chessmove::{Move, MoveFlags};
use crate::errors::{FenParseError, MoveParseError, PositionValidityError};
use crate::piece::{Colour, Piece, PieceType};
use crate::squareset::SquareSet;
use crate::util::{Square, REPETITION_RING};
use crate::zobrist;

use self::evaluation::piece_value;
use self::movegen::{CheckPinMasks, MoveBuckets};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub const WKCA: u8 = 0b0001;
pub const WQCA: u8 = 0b0010;
pub const BKCA: u8 = 0b0100;
pub const BQCA: u8 = 0b1000;
pub const ALL_CASTLING: u8 = 0b1111;

/// Reversible-ply horizon after which the position is scored as drawn.
const DRAW_PLY_HORIZON: usize = 50;

/// For each square, the castling rights that survive a move touching it.
/// A move leaving a king or rook start square cancels the owner's bits;
/// a move landing on a rook start square cancels the victim's bit.
static CASTLE_RIGHTS_MASKS: [u8; 64] = {
    let mut masks = [ALL_CASTLING; 64];
    masks[Square::A1.index()] = ALL_CASTLING & !WQCA;
    masks[Square::E1.index()] = ALL_CASTLING & !(WKCA | WQCA);
    masks[Square::H1.index()] = ALL_CASTLING & !WKCA;
    masks[Square::A8.index()] = ALL_CASTLING & !BQCA;
    masks[Square::E8.index()] = ALL_CASTLING & !(BKCA | BQCA);
    masks[Square::H8.index()] = ALL_CASTLING & !BKCA;
    masks
};

/// A copy of every mutable field the search needs to restore after
/// descending into a move. Taking a snapshot before `apply_move` and
/// restoring it afterwards is the whole undo story.
#[derive(Clone, Copy)]
pub struct Snapshot {
    pieces: [SquareSet; 12],
    white: SquareSet,
    black: SquareSet,
    all: SquareSet,
    turn: Colour,
    castle_rights: u8,
    ep_square: SquareSet,
    ply: usize,
    last_irreversible_ply: usize,
    key: u64,
    material: i32,
    counts: [u8; 12],
    last_capture_to: SquareSet,
}

#[derive(Clone)]
pub struct Board {
    pieces: [SquareSet; 12],
    white: SquareSet,
    black: SquareSet,
    all: SquareSet,
    turn: Colour,
    castle_rights: u8,
    /// The en-passant target as a one-bit set, empty if none.
    ep_square: SquareSet,
    ply: usize,
    last_irreversible_ply: usize,
    key: u64,
    key_ring: [u64; REPETITION_RING],
    /// White material minus black material, kings included (they cancel).
    material: i32,
    counts: [u8; 12],
    /// Where the opponent's most recent capture landed, for recapture-first
    /// move ordering. Empty if their last move was not a capture.
    last_capture_to: SquareSet,

    // lazily recomputed caches, invalidated by every mutation
    pub(crate) masks: CheckPinMasks,
    pub(crate) masks_valid: bool,
    pub(crate) illegal_king_squares: SquareSet,
    pub(crate) legal_castles: u8,
    pub(crate) king_danger_valid: bool,
}

impl Board {
    pub fn new() -> Self {
        Self {
            pieces: [SquareSet::EMPTY; 12],
            white: SquareSet::EMPTY,
            black: SquareSet::EMPTY,
            all: SquareSet::EMPTY,
            turn: Colour::White,
            castle_rights: 0,
            ep_square: SquareSet::EMPTY,
            ply: 0,
            last_irreversible_ply: 0,
            key: 0,
            key_ring: [0; REPETITION_RING],
            material: 0,
            counts: [0; 12],
            last_capture_to: SquareSet::EMPTY,
            masks: CheckPinMasks::EMPTY,
            masks_valid: false,
            illegal_king_squares: SquareSet::EMPTY,
            legal_castles: 0,
            king_danger_valid: false,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenParseError> {
        let mut board = Self::new();
        board.set_from_fen(fen)?;
        Ok(board)
    }

    pub fn set_startpos(&mut self) {
        self.set_from_fen(STARTING_FEN)
            .expect("the starting FEN is hardcoded and must parse");
    }

    pub const fn turn(&self) -> Colour {
        self.turn
    }

    pub const fn zobrist_key(&self) -> u64 {
        self.key
    }

    pub const fn ep_square(&self) -> SquareSet {
        self.ep_square
    }

    pub const fn castle_rights(&self) -> u8 {
        self.castle_rights
    }

    pub const fn occupied(&self) -> SquareSet {
        self.all
    }

    pub const fn last_capture_to(&self) -> SquareSet {
        self.last_capture_to
    }

    pub fn piece_set(&self, piece: Piece) -> SquareSet {
        self.pieces[piece]
    }

    pub fn colour_set(&self, colour: Colour) -> SquareSet {
        match colour {
            Colour::White => self.white,
            Colour::Black => self.black,
        }
    }

    pub fn piece_count(&self, piece: Piece) -> u8 {
        self.counts[piece]
    }

    pub fn piece_at(&self, pos: SquareSet) -> Option<Piece> {
        let range = if self.white.intersects(pos) {
            0..6
        } else if self.black.intersects(pos) {
            6..12
        } else {
            return None;
        };
        for index in range {
            let piece = Piece::from_index(index).unwrap();
            if self.pieces[piece].intersects(pos) {
                return Some(piece);
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // FEN

    pub fn set_from_fen(&mut self, fen: &str) -> Result<(), FenParseError> {
        if !fen.is_ascii() {
            return Err(FenParseError::NotAscii);
        }
        let mut fields = fen.split_whitespace();

        let board_part = fields.next().ok_or(FenParseError::BadRankCount(0))?;
        let side_part = fields.next().ok_or(FenParseError::MissingSide)?;
        let castling_part = fields.next().ok_or(FenParseError::MissingCastling)?;
        let ep_part = fields.next();
        let halfmove_part = fields.next();
        let fullmove_part = fields.next();

        let mut fresh = Self::new();

        let ranks: Vec<&str> = board_part.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenParseError::BadRankCount(ranks.len()));
        }
        for (row, rank_part) in ranks.iter().enumerate() {
            let rank = 7 - row as u8;
            let mut file = 0u8;
            for c in rank_part.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip == 0 || skip > 8 {
                        return Err(FenParseError::UnexpectedCharacter(c));
                    }
                    file += skip as u8;
                } else {
                    let piece =
                        Piece::from_char(c).ok_or(FenParseError::UnexpectedCharacter(c))?;
                    if file >= 8 {
                        return Err(FenParseError::BadSquaresInRank);
                    }
                    let sq = SquareSet::from_square(Square::from_rank_file(rank, file));
                    fresh.pieces[piece] |= sq;
                    file += 1;
                }
                if file > 8 {
                    return Err(FenParseError::BadSquaresInRank);
                }
            }
            if file != 8 {
                return Err(FenParseError::BadSquaresInRank);
            }
        }

        fresh.turn = match side_part {
            "w" => Colour::White,
            "b" => Colour::Black,
            other => return Err(FenParseError::InvalidSide(other.to_string())),
        };

        if castling_part != "-" {
            for c in castling_part.chars() {
                fresh.castle_rights |= match c {
                    'K' => WKCA,
                    'Q' => WQCA,
                    'k' => BKCA,
                    'q' => BQCA,
                    _ => return Err(FenParseError::InvalidCastling(castling_part.to_string())),
                };
            }
        }

        if let Some(ep) = ep_part {
            if ep != "-" {
                let sq: Square = ep
                    .parse()
                    .map_err(|_| FenParseError::InvalidEnPassant(ep.to_string()))?;
                fresh.ep_square = SquareSet::from_square(sq);
            }
        }

        let halfmove = match halfmove_part {
            None | Some("-") => 0,
            Some(text) => text
                .parse::<usize>()
                .map_err(|_| FenParseError::InvalidHalfmoveClock(text.to_string()))?,
        };
        let fullmove = match fullmove_part {
            None | Some("-") => 1,
            Some(text) => text
                .parse::<usize>()
                .map_err(|_| FenParseError::InvalidFullmoveNumber(text.to_string()))?
                .max(1),
        };

        fresh.ply = 2 * (fullmove - 1) + usize::from(fresh.turn == Colour::Black);
        fresh.last_irreversible_ply = fresh.ply.saturating_sub(halfmove);

        fresh.rebuild_derived_state()?;
        *self = fresh;
        Ok(())
    }

    /// Recomputes aggregates, counters, material, and the Zobrist key
    /// from the piece sets, and validates the structural invariants.
    fn rebuild_derived_state(&mut self) -> Result<(), FenParseError> {
        self.white = SquareSet::EMPTY;
        self.black = SquareSet::EMPTY;
        self.material = 0;
        self.counts = [0; 12];
        for piece in Piece::all() {
            let set = self.pieces[piece];
            match piece.colour() {
                Colour::White => {
                    self.white |= set;
                    self.material += piece_value(piece.piece_type()) * set.count() as i32;
                }
                Colour::Black => {
                    self.black |= set;
                    self.material -= piece_value(piece.piece_type()) * set.count() as i32;
                }
            }
            self.counts[piece] = set.count() as u8;
        }
        self.all = self.white | self.black;

        for colour in [Colour::White, Colour::Black] {
            let king = Piece::new(colour, PieceType::King);
            if self.counts[king] != 1 {
                return Err(FenParseError::BadKingCount(colour));
            }
            let pawn = Piece::new(colour, PieceType::Pawn);
            if self.counts[pawn] > 8 {
                return Err(FenParseError::TooManyPawns(colour));
            }
            if self.colour_set(colour).count() > 16 {
                return Err(FenParseError::TooManyPieces(colour));
            }
        }

        self.key = self.generate_key();
        self.key_ring = [0; REPETITION_RING];
        self.key_ring[self.ply % REPETITION_RING] = self.key;
        self.last_capture_to = SquareSet::EMPTY;
        self.invalidate_caches();
        Ok(())
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empties = 0;
            for file in 0..8 {
                let sq = SquareSet::from_square(Square::from_rank_file(rank, file));
                match self.piece_at(sq) {
                    Some(piece) => {
                        if empties > 0 {
                            fen.push(char::from(b'0' + empties));
                            empties = 0;
                        }
                        fen.push(piece.char());
                    }
                    None => empties += 1,
                }
            }
            if empties > 0 {
                fen.push(char::from(b'0' + empties));
            }
            if rank > 0 {
                fen.push('/');
            }
        }
        fen.push(' ');
        fen.push(if self.turn == Colour::White { 'w' } else { 'b' });
        fen.push(' ');
        if self.castle_rights == 0 {
            fen.push('-');
        } else {
            if self.castle_rights & WKCA != 0 {
                fen.push('K');
            }
            if self.castle_rights & WQCA != 0 {
                fen.push('Q');
            }
            if self.castle_rights & BKCA != 0 {
                fen.push('k');
            }
            if self.castle_rights & BQCA != 0 {
                fen.push('q');
            }
        }
        fen.push(' ');
        if self.ep_square.is_empty() {
            fen.push('-');
        } else {
            fen.push_str(self.ep_square.first().name());
        }
        let halfmove = self.ply - self.last_irreversible_ply;
        let fullmove = self.ply / 2 + 1;
        fen.push_str(&format!(" {halfmove} {fullmove}"));
        fen
    }

    // ------------------------------------------------------------------
    // hashing

    /// The position key built from scratch; must always agree with the
    /// incrementally maintained one.
    pub fn generate_key(&self) -> u64 {
        let mut key = 0;
        for piece in Piece::all() {
            for sq in self.pieces[piece] {
                zobrist::hash_piece(&mut key, piece, sq);
            }
        }
        if self.turn == Colour::Black {
            zobrist::hash_side(&mut key);
        }
        zobrist::hash_castling(&mut key, self.castle_rights);
        if self.ep_square.non_empty() {
            zobrist::hash_ep(&mut key, self.ep_square.first());
        }
        key
    }

    // ------------------------------------------------------------------
    // mutation

    fn add_piece(&mut self, piece: Piece, pos: SquareSet) {
        debug_assert_eq!(pos.count(), 1);
        self.pieces[piece] ^= pos;
        match piece.colour() {
            Colour::White => {
                self.white ^= pos;
                self.material += piece_value(piece.piece_type());
            }
            Colour::Black => {
                self.black ^= pos;
                self.material -= piece_value(piece.piece_type());
            }
        }
        self.counts[piece] += 1;
        zobrist::hash_piece(&mut self.key, piece, pos.first());
    }

    fn remove_piece(&mut self, piece: Piece, pos: SquareSet) {
        debug_assert_eq!(pos.count(), 1);
        debug_assert!(self.pieces[piece].intersects(pos));
        self.pieces[piece] ^= pos;
        match piece.colour() {
            Colour::White => {
                self.white ^= pos;
                self.material -= piece_value(piece.piece_type());
            }
            Colour::Black => {
                self.black ^= pos;
                self.material += piece_value(piece.piece_type());
            }
        }
        self.counts[piece] -= 1;
        zobrist::hash_piece(&mut self.key, piece, pos.first());
    }

    fn move_piece(&mut self, piece: Piece, from: SquareSet, to: SquareSet) {
        debug_assert!(self.pieces[piece].intersects(from));
        let both = from | to;
        self.pieces[piece] ^= both;
        match piece.colour() {
            Colour::White => self.white ^= both,
            Colour::Black => self.black ^= both,
        }
        zobrist::hash_piece(&mut self.key, piece, from.first());
        zobrist::hash_piece(&mut self.key, piece, to.first());
    }

    /// Mutates the position by a move that is legal in it.
    pub fn apply_move(&mut self, m: Move) {
        debug_assert!(!m.is_null());
        let side = self.turn;
        debug_assert_eq!(m.piece.colour(), side);

        if self.ep_square.non_empty() {
            zobrist::hash_ep(&mut self.key, self.ep_square.first());
        }
        zobrist::hash_castling(&mut self.key, self.castle_rights);

        let mut irreversible = m.is_capture() || m.piece.piece_type() == PieceType::Pawn;
        self.ep_square = SquareSet::EMPTY;
        self.last_capture_to = SquareSet::EMPTY;

        if m.flags.is_castle() {
            self.apply_castle(m.flags);
            irreversible = true;
        } else if m.flags.is_en_passant() {
            let victim_pos = if side.is_white() { m.to.south_one() } else { m.to.north_one() };
            self.remove_piece(Piece::new(side.flip(), PieceType::Pawn), victim_pos);
            self.move_piece(m.piece, m.from, m.to);
            self.last_capture_to = m.to;
        } else {
            if let Some(captured) = m.capture {
                self.remove_piece(captured, m.to);
                self.last_capture_to = m.to;
            }
            if let Some(promo) = m.flags.promotion_type() {
                self.remove_piece(m.piece, m.from);
                self.add_piece(Piece::new(side, promo), m.to);
            } else {
                self.move_piece(m.piece, m.from, m.to);
                if m.piece.piece_type() == PieceType::Pawn {
                    let double = if side.is_white() {
                        m.from.north_one().north_one()
                    } else {
                        m.from.south_one().south_one()
                    };
                    if m.to == double {
                        self.ep_square =
                            if side.is_white() { m.from.north_one() } else { m.from.south_one() };
                    }
                }
            }
        }

        let old_rights = self.castle_rights;
        self.castle_rights &= CASTLE_RIGHTS_MASKS[m.from_square().index()];
        self.castle_rights &= CASTLE_RIGHTS_MASKS[m.to_square().index()];
        irreversible |= self.castle_rights != old_rights;

        zobrist::hash_castling(&mut self.key, self.castle_rights);
        if self.ep_square.non_empty() {
            zobrist::hash_ep(&mut self.key, self.ep_square.first());
        }

        self.all = self.white | self.black;
        self.turn = side.flip();
        zobrist::hash_side(&mut self.key);

        self.ply += 1;
        if irreversible {
            self.last_irreversible_ply = self.ply;
        }
        self.key_ring[self.ply % REPETITION_RING] = self.key;
        self.invalidate_caches();

        #[cfg(debug_assertions)]
        self.check_validity().unwrap();
    }

    fn apply_castle(&mut self, flags: MoveFlags) {
        let (king, rook, k_from, k_to, r_from, r_to) = if flags.contains(MoveFlags::CASTLE_WK) {
            (Piece::WK, Piece::WR, Square::E1, Square::G1, Square::H1, Square::F1)
        } else if flags.contains(MoveFlags::CASTLE_WQ) {
            (Piece::WK, Piece::WR, Square::E1, Square::C1, Square::A1, Square::D1)
        } else if flags.contains(MoveFlags::CASTLE_BK) {
            (Piece::BK, Piece::BR, Square::E8, Square::G8, Square::H8, Square::F8)
        } else {
            (Piece::BK, Piece::BR, Square::E8, Square::C8, Square::A8, Square::D8)
        };
        self.move_piece(king, SquareSet::from_square(k_from), SquareSet::from_square(k_to));
        self.move_piece(rook, SquareSet::from_square(r_from), SquareSet::from_square(r_to));
    }

    /// Passes the turn: flips the mover, clears the en-passant target,
    /// and keeps the hash and ply bookkeeping consistent.
    pub fn apply_null_move(&mut self) {
        if self.ep_square.non_empty() {
            zobrist::hash_ep(&mut self.key, self.ep_square.first());
            self.ep_square = SquareSet::EMPTY;
        }
        self.turn = self.turn.flip();
        zobrist::hash_side(&mut self.key);
        self.last_capture_to = SquareSet::EMPTY;
        self.ply += 1;
        self.key_ring[self.ply % REPETITION_RING] = self.key;
        self.invalidate_caches();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pieces: self.pieces,
            white: self.white,
            black: self.black,
            all: self.all,
            turn: self.turn,
            castle_rights: self.castle_rights,
            ep_square: self.ep_square,
            ply: self.ply,
            last_irreversible_ply: self.last_irreversible_ply,
            key: self.key,
            material: self.material,
            counts: self.counts,
            last_capture_to: self.last_capture_to,
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.pieces = snapshot.pieces;
        self.white = snapshot.white;
        self.black = snapshot.black;
        self.all = snapshot.all;
        self.turn = snapshot.turn;
        self.castle_rights = snapshot.castle_rights;
        self.ep_square = snapshot.ep_square;
        self.ply = snapshot.ply;
        self.last_irreversible_ply = snapshot.last_irreversible_ply;
        self.key = snapshot.key;
        self.material = snapshot.material;
        self.counts = snapshot.counts;
        self.last_capture_to = snapshot.last_capture_to;
        self.invalidate_caches();
    }

    pub fn invalidate_caches(&mut self) {
        self.masks_valid = false;
        self.king_danger_valid = false;
    }

    // ------------------------------------------------------------------
    // draw detection

    /// True when the current key has already appeared at least twice in
    /// the reversible segment of the game, or when the reversible
    /// segment itself has outgrown the draw horizon.
    pub fn is_draw_by_repetition(&self) -> bool {
        let reversible = self.ply - self.last_irreversible_ply;
        if reversible >= DRAW_PLY_HORIZON {
            return true;
        }
        let mut seen = 0;
        for p in self.last_irreversible_ply..self.ply {
            if self.key_ring[p % REPETITION_RING] == self.key {
                seen += 1;
                if seen >= 2 {
                    return true;
                }
            }
        }
        false
    }

    /// With no queens, rooks, or pawns left the game is nearly always
    /// drawn; the evaluator scales its score down through this.
    pub fn is_material_drawish(&self) -> bool {
        (self.pieces[Piece::WQ]
            | self.pieces[Piece::BQ]
            | self.pieces[Piece::WR]
            | self.pieces[Piece::BR]
            | self.pieces[Piece::WP]
            | self.pieces[Piece::BP])
            .is_empty()
    }

    // ------------------------------------------------------------------
    // validation

    #[allow(clippy::too_many_lines)]
    pub fn check_validity(&self) -> Result<(), PositionValidityError> {
        if self.white.intersects(self.black) {
            return Err("white and black occupy a common square".to_string());
        }
        if self.all != self.white | self.black {
            return Err("aggregate set does not match the union of the sides".to_string());
        }
        let mut seen = SquareSet::EMPTY;
        let mut white = SquareSet::EMPTY;
        let mut black = SquareSet::EMPTY;
        let mut material = 0;
        for piece in Piece::all() {
            let set = self.pieces[piece];
            if seen.intersects(set) {
                return Err(format!("piece set for {piece} overlaps another piece"));
            }
            seen |= set;
            match piece.colour() {
                Colour::White => {
                    white |= set;
                    material += piece_value(piece.piece_type()) * set.count() as i32;
                }
                Colour::Black => {
                    black |= set;
                    material -= piece_value(piece.piece_type()) * set.count() as i32;
                }
            }
            if self.counts[piece] != set.count() as u8 {
                return Err(format!(
                    "count cache for {piece} is {} but the set holds {}",
                    self.counts[piece],
                    set.count()
                ));
            }
        }
        if white != self.white || black != self.black {
            return Err("side aggregates do not match the piece sets".to_string());
        }
        if material != self.material {
            return Err(format!(
                "material cache is {} but recomputation gives {material}",
                self.material
            ));
        }
        for colour in [Colour::White, Colour::Black] {
            if self.counts[Piece::new(colour, PieceType::King)] != 1 {
                return Err(format!("{colour} does not have exactly one king"));
            }
            if self.counts[Piece::new(colour, PieceType::Pawn)] > 8 {
                return Err(format!("{colour} has more than eight pawns"));
            }
            if self.colour_set(colour).count() > 16 {
                return Err(format!("{colour} has more than sixteen pieces"));
            }
        }
        if self.generate_key() != self.key {
            return Err(format!(
                "zobrist key is {:#x} but recomputation gives {:#x}",
                self.key,
                self.generate_key()
            ));
        }
        if self.ply < self.last_irreversible_ply {
            return Err("irreversible-move ply is in the future".to_string());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // move parsing

    /// Parses coordinate notation (`e2e4`, `a7a8q`; castles as king
    /// moves `e1g1` etc.) against the legal moves of this position.
    pub fn parse_move(&mut self, text: &str) -> Result<Move, MoveParseError> {
        let len = text.len();
        if !text.is_ascii() || !(4..=5).contains(&len) {
            return Err(MoveParseError::InvalidLength(len));
        }
        let from: Square = text[0..2]
            .parse()
            .map_err(|_| MoveParseError::InvalidSquare(text[0..2].to_string()))?;
        let to: Square = text[2..4]
            .parse()
            .map_err(|_| MoveParseError::InvalidSquare(text[2..4].to_string()))?;
        let promo = match text.chars().nth(4) {
            None => None,
            Some(c @ ('q' | 'r' | 'b' | 'n')) => Some(c),
            Some(c) => return Err(MoveParseError::InvalidPromotionPiece(c)),
        };
        if self.piece_at(SquareSet::from_square(from)).is_none() {
            return Err(MoveParseError::EmptyFromSquare(from.to_string()));
        }

        self.legal_moves()
            .into_iter()
            .find(|m| {
                m.from_square() == from
                    && m.to_square() == to
                    && promo == m.flags.promotion_type().and_then(PieceType::promo_char)
            })
            .ok_or_else(|| MoveParseError::IllegalMove(text.to_string()))
    }

    /// All legal moves, flattened out of the ordering buckets. A
    /// convenience for callers outside the search.
    pub fn legal_moves(&mut self) -> Vec<Move> {
        let mut buckets = MoveBuckets::new();
        self.generate_moves(&mut buckets);
        buckets.flatten()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::from_fen(STARTING_FEN).expect("the starting FEN is hardcoded and must parse")
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                let sq = SquareSet::from_square(Square::from_rank_file(rank, file));
                match self.piece_at(sq) {
                    Some(piece) => write!(f, "{} ", piece.char())?,
                    None => write!(f, ". ")?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")?;
        writeln!(f, "side: {}", if self.turn == Colour::White { 'w' } else { 'b' })?;
        Ok(())
    }
}

impl Debug for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")?;
        writeln!(f, "castling: {:04b}", self.castle_rights)?;
        if self.ep_square.non_empty() {
            writeln!(f, "ep-square: {}", self.ep_square.first())?;
        }
        writeln!(f, "ply: {} (irreversible at {})", self.ply, self.last_irreversible_ply)?;
        writeln!(f, "hash: {:016x}", self.key)
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::{Board, STARTING_FEN};
    use crate::chessmove::{Move, MoveFlags};
    use crate::piece::{Colour, Piece};
    use crate::squareset::SquareSet;
    use crate::util::Square;

    #[test]
    fn startpos_is_valid() {
        let board = Board::default();
        board.check_validity().unwrap();
        assert_eq!(board.turn(), Colour::White);
        assert_eq!(board.occupied().count(), 32);
        assert_eq!(board.piece_set(Piece::WP).count(), 8);
    }

    #[test]
    fn fen_round_trip() {
        for fen in [
            STARTING_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        ] {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.to_fen(), fen, "round-trip failed for {fen}");
        }
    }

    #[test]
    fn fen_rejects_garbage() {
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNX w KQkq -").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 w - -").is_err());
        assert!(Board::from_fen("k7/8/8/8/8/8/8/K7 x - -").is_err());
        assert!(Board::from_fen("k7/8/8/8/8/8/8/K7 w KQxq -").is_err());
        assert!(Board::from_fen("k7/9/8/8/8/8/8/K7 w - -").is_err());
    }

    #[test]
    fn apply_and_restore_is_identity() {
        let mut board = Board::default();
        let before = board.snapshot();
        let key_before = board.zobrist_key();
        let fen_before = board.to_fen();
        for m in board.legal_moves() {
            board.apply_move(m);
            assert_ne!(board.zobrist_key(), key_before, "key unchanged by {m}");
            board.check_validity().unwrap();
            board.restore(&before);
            board.check_validity().unwrap();
            assert_eq!(board.to_fen(), fen_before, "restore failed after {m}");
            assert_eq!(board.zobrist_key(), key_before);
        }
    }

    #[test]
    fn zobrist_matches_recomputation_along_a_game() {
        let mut board = Board::default();
        for text in ["e2e4", "c7c5", "g1f3", "d7d6", "f1b5", "c8d7", "e1g1"] {
            let m = board.parse_move(text).unwrap();
            board.apply_move(m);
            assert_eq!(board.zobrist_key(), board.generate_key(), "mismatch after {text}");
        }
    }

    #[test]
    fn double_push_sets_ep_square() {
        let mut board = Board::default();
        let m = board.parse_move("e2e4").unwrap();
        board.apply_move(m);
        assert_eq!(board.ep_square(), SquareSet::from_square(Square::new(20)));
        let m = board.parse_move("g8f6").unwrap();
        board.apply_move(m);
        assert!(board.ep_square().is_empty());
    }

    #[test]
    fn castling_rights_cancellation() {
        let mut board =
            Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let snapshot = board.snapshot();

        // moving the h1 rook cancels only white kingside
        let m = board.parse_move("h1g1").unwrap();
        board.apply_move(m);
        assert_eq!(board.castle_rights(), super::WQCA | super::BKCA | super::BQCA);
        board.restore(&snapshot);

        // moving the king cancels both white bits
        let m = board.parse_move("e1d1").unwrap();
        board.apply_move(m);
        assert_eq!(board.castle_rights(), super::BKCA | super::BQCA);
        board.restore(&snapshot);

        // capturing the enemy a8 rook cancels black queenside, and
        // vacating a1 costs white's own queenside bit too
        let m = board.parse_move("a1a8").unwrap();
        board.apply_move(m);
        assert_eq!(board.castle_rights(), super::WKCA | super::BKCA);
    }

    #[test]
    fn threefold_repetition_is_detected() {
        let mut board = Board::default();
        for _ in 0..2 {
            for text in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                let m = board.parse_move(text).unwrap();
                board.apply_move(m);
            }
        }
        assert!(board.is_draw_by_repetition());
    }

    #[test]
    fn single_repetition_is_not_a_draw() {
        let mut board = Board::default();
        for text in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let m = board.parse_move(text).unwrap();
            board.apply_move(m);
        }
        assert!(!board.is_draw_by_repetition());
    }

    #[test]
    fn null_move_round_trips_the_key() {
        let mut board =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
        let snapshot = board.snapshot();
        let key = board.zobrist_key();
        board.apply_null_move();
        assert_ne!(board.zobrist_key(), key);
        assert!(board.ep_square().is_empty());
        assert_eq!(board.zobrist_key(), board.generate_key());
        board.restore(&snapshot);
        assert_eq!(board.zobrist_key(), key);
    }
}
