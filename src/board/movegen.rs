//! Legal move generation. A single pass over the rays from the king
//! produces the check and pin masks; every piece's reachable squares are
//! then intersected with the masks that apply to it, so no make/unmake
//! legality filtering is ever needed.

use arrayvec::ArrayVec;

use super::Board;
use crate::chessmove::{Move, MoveFlags};
use crate::lookups::{cast_ray_to_blocker, front_span, ray, Direction};
use crate::piece::{Colour, Piece, PieceType};
use crate::squareset::SquareSet;
use crate::util::Square;

pub const MAX_POSITION_MOVES: usize = 256;
const MAX_CAPTURES: usize = 128;
const MAX_PROBABLY_GOOD: usize = 16;

const CASTLE_SCORE: i32 = -10;

/// Victim-major capture ordering: a pawn taking a queen scores above a
/// queen taking a queen, and any capture of a bigger victim beats any
/// capture of a smaller one.
pub const fn mvv_lva_score(attacker: PieceType, victim: PieceType) -> i32 {
    victim.index() as i32 * 10 + 5 - attacker.index() as i32
}

/// Ordering score for the four promotion pieces: queen first, then
/// knight (the only piece whose moves a queen cannot make), then rook,
/// then bishop.
const fn promotion_order_score(piece_type: PieceType) -> i32 {
    match piece_type {
        PieceType::Queen => 40,
        PieceType::Knight => 30,
        PieceType::Rook => 20,
        _ => 10,
    }
}

/// The caches produced by casting rays outward from the king.
#[derive(Clone, Copy, Debug)]
pub struct CheckPinMasks {
    /// Squares a non-king piece may move onto to resolve check; the full
    /// board when not in check.
    pub check: SquareSet,
    /// Squares of straight-line pins to the king.
    pub hv_pin: SquareSet,
    /// Squares of diagonal pins to the king.
    pub diag_pin: SquareSet,
    /// Rank lines holding both en-passant pawns between a rook/queen and
    /// the king, where capturing en passant would expose the king.
    pub double_horizontal_pin: SquareSet,
    /// The square directly behind the king on each checking ray.
    pub king_xray: SquareSet,
    pub checkers: u32,
}

impl CheckPinMasks {
    pub const EMPTY: Self = Self {
        check: SquareSet::FULL,
        hv_pin: SquareSet::EMPTY,
        diag_pin: SquareSet::EMPTY,
        double_horizontal_pin: SquareSet::EMPTY,
        king_xray: SquareSet::EMPTY,
        checkers: 0,
    };
}

/// The per-node move store: one fixed-capacity bucket per ordering
/// class. `best` and `killer` are seeded by the search, the generator
/// fills the other three.
pub struct MoveBuckets {
    pub best: ArrayVec<Move, 1>,
    pub probably_good: ArrayVec<Move, MAX_PROBABLY_GOOD>,
    pub attack: ArrayVec<Move, MAX_CAPTURES>,
    pub killer: ArrayVec<Move, 2>,
    pub normal: ArrayVec<Move, MAX_POSITION_MOVES>,
}

impl MoveBuckets {
    pub fn new() -> Self {
        Self {
            best: ArrayVec::new(),
            probably_good: ArrayVec::new(),
            attack: ArrayVec::new(),
            killer: ArrayVec::new(),
            normal: ArrayVec::new(),
        }
    }

    fn push_probably_good(&mut self, m: Move) {
        // a full bucket only happens in freak multi-promotion positions;
        // the overflow is still searched, just unprioritised
        if self.probably_good.try_push(m).is_err() {
            self.normal.push(m);
        }
    }

    /// The generated moves as a flat list, for callers that don't go
    /// through the ordering iterator.
    pub fn flatten(&self) -> Vec<Move> {
        self.probably_good
            .iter()
            .chain(self.attack.iter())
            .chain(self.normal.iter())
            .copied()
            .collect()
    }
}

impl Default for MoveBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    fn own_set<const W: bool>(&self) -> SquareSet {
        self.colour_set(if W { Colour::White } else { Colour::Black })
    }

    fn enemy_set<const W: bool>(&self) -> SquareSet {
        self.colour_set(if W { Colour::Black } else { Colour::White })
    }

    fn own_piece<const W: bool>(piece_type: PieceType) -> Piece {
        Piece::new(if W { Colour::White } else { Colour::Black }, piece_type)
    }

    fn enemy_piece<const W: bool>(piece_type: PieceType) -> Piece {
        Piece::new(if W { Colour::Black } else { Colour::White }, piece_type)
    }

    pub fn in_check(&mut self) -> bool {
        self.ensure_check_pin_masks();
        self.masks.checkers > 0
    }

    // ------------------------------------------------------------------
    // check and pin masks

    pub fn ensure_check_pin_masks(&mut self) {
        if self.masks_valid {
            return;
        }
        match self.turn() {
            Colour::White => self.compute_check_pin_masks::<true>(),
            Colour::Black => self.compute_check_pin_masks::<false>(),
        }
        self.masks_valid = true;
    }

    fn compute_check_pin_masks<const W: bool>(&mut self) {
        let king = self.piece_set(Self::own_piece::<W>(PieceType::King));
        let mut masks = CheckPinMasks { check: SquareSet::EMPTY, ..CheckPinMasks::EMPTY };

        // knight and pawn checks are not ray-shaped: the checker's own
        // square is the only resolution square besides moving the king
        masks.check = king.knight_targets() & self.piece_set(Self::enemy_piece::<W>(PieceType::Knight));
        let pawn_check = if W {
            (king.north_east_one() | king.north_west_one())
                & self.piece_set(Self::enemy_piece::<W>(PieceType::Pawn))
        } else {
            (king.south_east_one() | king.south_west_one())
                & self.piece_set(Self::enemy_piece::<W>(PieceType::Pawn))
        };
        masks.check |= pawn_check;
        // a knight and a pawn can never both check, so one increment covers both
        masks.checkers += u32::from(masks.check.non_empty());

        let king_sq = king.first();
        for dir in Direction::ALL {
            self.ray_masks_in_direction::<W>(dir, king_sq, king, &mut masks);
        }

        if masks.check.is_empty() {
            masks.check = SquareSet::FULL;
        }
        self.masks = masks;
    }

    /// Walks one ray from the king and classifies it by the number of
    /// pieces standing between the king and the nearest enemy slider of
    /// the matching kind: 1 is a check, 2 is a pin, 3 on a rank is the
    /// en-passant double pin.
    fn ray_masks_in_direction<const W: bool>(
        &self,
        dir: Direction,
        king_sq: Square,
        king: SquareSet,
        masks: &mut CheckPinMasks,
    ) {
        let is_hv = matches!(
            dir,
            Direction::North | Direction::East | Direction::South | Direction::West
        );
        let enemy_sliders = self.piece_set(Self::enemy_piece::<W>(PieceType::Queen))
            | self.piece_set(Self::enemy_piece::<W>(if is_hv {
                PieceType::Rook
            } else {
                PieceType::Bishop
            }));

        let full_ray = ray(king_sq, dir);
        let sliders_in_ray = full_ray & enemy_sliders;
        let nearest = if dir.is_ascending() {
            sliders_in_ray.isolate_lsb()
        } else {
            sliders_in_ray.isolate_msb()
        };
        if nearest.is_empty() {
            return;
        }
        // the ray from king to slider, slider included
        let to_slider = full_ray ^ ray(nearest.first(), dir);

        match (to_slider & self.occupied()).count() {
            1 => {
                masks.check |= to_slider;
                masks.checkers += 1;
                // the king may not retreat along the checking line
                masks.king_xray |= match dir {
                    Direction::North => king.south_one(),
                    Direction::East => king.west_one(),
                    Direction::South => king.north_one(),
                    Direction::West => king.east_one(),
                    Direction::NorthEast => king.south_west_one(),
                    Direction::NorthWest => king.south_east_one(),
                    Direction::SouthEast => king.north_west_one(),
                    Direction::SouthWest => king.north_east_one(),
                };
            }
            2 => {
                if is_hv {
                    masks.hv_pin |= to_slider;
                } else {
                    masks.diag_pin |= to_slider;
                }
            }
            3 => {
                if matches!(dir, Direction::East | Direction::West) {
                    masks.double_horizontal_pin |= to_slider;
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // per-piece reachable squares, legality included

    fn pawn_moves<const W: bool>(&self, pos: SquareSet) -> SquareSet {
        let mut ep = self.ep_square();
        if ep.non_empty() {
            // taking en passant vacates the captured pawn's square too,
            // so a diagonal pin through it or the shared rank pin makes
            // the capture illegal
            let victim = if W { ep.south_one() } else { ep.north_one() };
            let pinned_victim = victim.intersects(self.masks.diag_pin);
            let double_pinned = pos.intersects(self.masks.double_horizontal_pin);
            if pinned_victim || double_pinned {
                ep = SquareSet::EMPTY;
            }
        }

        let hv_constraint =
            if pos.intersects(self.masks.hv_pin) { self.masks.hv_pin } else { SquareSet::FULL };
        let diag_constraint =
            if pos.intersects(self.masks.diag_pin) { self.masks.diag_pin } else { SquareSet::FULL };

        let pushes;
        let attacks;
        if W {
            let mut p = (pos - self.masks.diag_pin).north_one() & hv_constraint & !self.occupied();
            if pos.intersects(SquareSet::RANK_2) {
                p |= p.north_one() & !self.occupied();
            }
            pushes = p;
            let sources = pos - self.masks.hv_pin;
            attacks = (sources.north_west_one() | sources.north_east_one())
                & diag_constraint
                & (self.enemy_set::<W>() | ep);
        } else {
            let mut p = (pos - self.masks.diag_pin).south_one() & hv_constraint & !self.occupied();
            if pos.intersects(SquareSet::RANK_7) {
                p |= p.south_one() & !self.occupied();
            }
            pushes = p;
            let sources = pos - self.masks.hv_pin;
            attacks = (sources.south_west_one() | sources.south_east_one())
                & diag_constraint
                & (self.enemy_set::<W>() | ep);
        }
        (pushes | attacks) & self.masks.check
    }

    fn knight_moves<const W: bool>(&self, pos: SquareSet) -> SquareSet {
        // a pinned knight can never stay on its pin line
        let movable = pos - (self.masks.hv_pin | self.masks.diag_pin);
        movable.knight_targets() & !self.own_set::<W>() & self.masks.check
    }

    fn bishop_moves<const W: bool>(&self, pos: SquareSet) -> SquareSet {
        if pos.intersects(self.masks.hv_pin) {
            return SquareSet::EMPTY;
        }
        let sq = pos.first();
        let mut moves = cast_ray_to_blocker(sq, Direction::NorthEast, self.occupied())
            | cast_ray_to_blocker(sq, Direction::NorthWest, self.occupied())
            | cast_ray_to_blocker(sq, Direction::SouthEast, self.occupied())
            | cast_ray_to_blocker(sq, Direction::SouthWest, self.occupied());
        if pos.intersects(self.masks.diag_pin) {
            moves &= self.masks.diag_pin;
        }
        moves & self.masks.check & !self.own_set::<W>()
    }

    fn rook_moves<const W: bool>(&self, pos: SquareSet) -> SquareSet {
        if pos.intersects(self.masks.diag_pin) {
            return SquareSet::EMPTY;
        }
        let sq = pos.first();
        let mut moves = cast_ray_to_blocker(sq, Direction::North, self.occupied())
            | cast_ray_to_blocker(sq, Direction::East, self.occupied())
            | cast_ray_to_blocker(sq, Direction::South, self.occupied())
            | cast_ray_to_blocker(sq, Direction::West, self.occupied());
        if pos.intersects(self.masks.hv_pin) {
            moves &= self.masks.hv_pin;
        }
        moves & self.masks.check & !self.own_set::<W>()
    }

    fn queen_moves<const W: bool>(&self, pos: SquareSet) -> SquareSet {
        // a queen on a pin line keeps exactly the matching half of her moves
        let mut moves = SquareSet::EMPTY;
        if !pos.intersects(self.masks.hv_pin) {
            let sq = pos.first();
            let mut diag = cast_ray_to_blocker(sq, Direction::NorthEast, self.occupied())
                | cast_ray_to_blocker(sq, Direction::NorthWest, self.occupied())
                | cast_ray_to_blocker(sq, Direction::SouthEast, self.occupied())
                | cast_ray_to_blocker(sq, Direction::SouthWest, self.occupied());
            if pos.intersects(self.masks.diag_pin) {
                diag &= self.masks.diag_pin;
            }
            moves |= diag;
        }
        if !pos.intersects(self.masks.diag_pin) {
            let sq = pos.first();
            let mut hv = cast_ray_to_blocker(sq, Direction::North, self.occupied())
                | cast_ray_to_blocker(sq, Direction::East, self.occupied())
                | cast_ray_to_blocker(sq, Direction::South, self.occupied())
                | cast_ray_to_blocker(sq, Direction::West, self.occupied());
            if pos.intersects(self.masks.hv_pin) {
                hv &= self.masks.hv_pin;
            }
            moves |= hv;
        }
        moves & self.masks.check & !self.own_set::<W>()
    }

    fn king_moves<const W: bool>(&mut self, pos: SquareSet) -> SquareSet {
        self.ensure_king_danger::<W>();
        pos.king_ring() & !self.illegal_king_squares
    }

    // ------------------------------------------------------------------
    // enemy attack map and castling legality

    /// Squares attacked by the given side's pawns, knights, and king,
    /// independent of occupancy.
    fn jumper_seen_squares<const W: bool>(&self) -> SquareSet {
        let pawns = self.piece_set(Self::own_piece::<W>(PieceType::Pawn));
        let knights = self.piece_set(Self::own_piece::<W>(PieceType::Knight));
        let king = self.piece_set(Self::own_piece::<W>(PieceType::King));
        let pawn_seen = if W {
            pawns.north_east_one() | pawns.north_west_one()
        } else {
            pawns.south_east_one() | pawns.south_west_one()
        };
        pawn_seen | knights.knight_targets() | king.king_ring()
    }

    /// Squares attacked by the given side's sliders, with every piece on
    /// the board as a blocker.
    fn slider_seen_squares<const W: bool>(&self) -> SquareSet {
        let mut seen = SquareSet::EMPTY;
        let rooks = self.piece_set(Self::own_piece::<W>(PieceType::Rook))
            | self.piece_set(Self::own_piece::<W>(PieceType::Queen));
        for sq in rooks {
            for dir in Direction::HORIZONTAL_VERTICAL {
                seen |= cast_ray_to_blocker(sq, dir, self.occupied());
            }
        }
        let bishops = self.piece_set(Self::own_piece::<W>(PieceType::Bishop))
            | self.piece_set(Self::own_piece::<W>(PieceType::Queen));
        for sq in bishops {
            for dir in Direction::DIAGONAL {
                seen |= cast_ray_to_blocker(sq, dir, self.occupied());
            }
        }
        seen
    }

    /// Fills the cached illegal-king-destination mask and the
    /// legal-castles mask. Requires the check and pin masks.
    fn ensure_king_danger<const W: bool>(&mut self) {
        if self.king_danger_valid {
            return;
        }
        debug_assert!(self.masks_valid);

        let in_check = self.masks.checkers > 0;
        // the squares between a checking slider and the king stay
        // covered, except that capturing the checker itself is fine
        let mut illegal =
            if in_check { self.masks.check - self.enemy_set::<W>() } else { SquareSet::EMPTY };
        illegal |= self.own_set::<W>();
        illegal |= self.masks.king_xray;
        illegal |= if W {
            self.jumper_seen_squares::<false>() | self.slider_seen_squares::<false>()
        } else {
            self.jumper_seen_squares::<true>() | self.slider_seen_squares::<true>()
        };
        self.illegal_king_squares = illegal;

        // castling wants the king's path unattacked and the space clear
        let blocked = illegal | self.occupied();
        let king = self.piece_set(Self::own_piece::<W>(PieceType::King));
        let mut castles = 0u8;
        if W {
            let king_path = king.east_one() | SquareSet::from_square(Square::G1);
            if !in_check
                && self.castle_rights() & super::WKCA != 0
                && (king_path & blocked).is_empty()
            {
                castles |= super::WKCA;
            }
            let king_path = king.west_one() | SquareSet::from_square(Square::C1);
            if !in_check
                && self.castle_rights() & super::WQCA != 0
                && (king_path & blocked).is_empty()
                && !self.occupied().contains_square(Square::B1)
            {
                castles |= super::WQCA;
            }
        } else {
            let king_path = king.east_one() | SquareSet::from_square(Square::G8);
            if !in_check
                && self.castle_rights() & super::BKCA != 0
                && (king_path & blocked).is_empty()
            {
                castles |= super::BKCA;
            }
            let king_path = king.west_one() | SquareSet::from_square(Square::C8);
            if !in_check
                && self.castle_rights() & super::BQCA != 0
                && (king_path & blocked).is_empty()
                && !self.occupied().contains_square(Square::B8)
            {
                castles |= super::BQCA;
            }
        }
        self.legal_castles = castles;
        self.king_danger_valid = true;
    }

    // ------------------------------------------------------------------
    // generation

    /// Generates every legal move into the buckets.
    pub fn generate_moves(&mut self, buckets: &mut MoveBuckets) {
        match self.turn() {
            Colour::White => self.generate::<true, false>(buckets),
            Colour::Black => self.generate::<false, false>(buckets),
        }
    }

    /// Generates captures only, except that in check the full set of
    /// evasions is produced so mates are never misdiagnosed.
    pub fn generate_captures(&mut self, buckets: &mut MoveBuckets) {
        match self.turn() {
            Colour::White => self.generate::<true, true>(buckets),
            Colour::Black => self.generate::<false, true>(buckets),
        }
    }

    fn generate<const W: bool, const CAPTURES_ONLY: bool>(&mut self, buckets: &mut MoveBuckets) {
        self.ensure_check_pin_masks();
        let caps_only = CAPTURES_ONLY && self.masks.checkers == 0;

        // in double check only the king can move
        if self.masks.checkers < 2 {
            self.generate_pawn_moves::<W>(buckets, caps_only);
            for piece_type in
                [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen]
            {
                self.generate_piece_moves::<W>(piece_type, buckets, caps_only);
            }
        }
        self.generate_king_moves::<W>(buckets, caps_only);
    }

    fn capture_at<const W: bool>(&self, to: SquareSet) -> Piece {
        let victim = self.piece_at(to);
        debug_assert!(victim.is_some(), "capture target is empty");
        debug_assert!(victim.map_or(false, |v| v.colour().is_white() != W));
        victim.unwrap_or(Self::enemy_piece::<W>(PieceType::Pawn))
    }

    fn generate_pawn_moves<const W: bool>(&mut self, buckets: &mut MoveBuckets, caps_only: bool) {
        let piece = Self::own_piece::<W>(PieceType::Pawn);
        let enemy_pawns = self.piece_set(Self::enemy_piece::<W>(PieceType::Pawn));
        let promo_rank = if W { SquareSet::RANK_7 } else { SquareSet::RANK_2 };

        for from_sq in self.piece_set(piece) {
            let from = SquareSet::from_square(from_sq);
            let mask = self.pawn_moves::<W>(from);
            if mask.is_empty() {
                continue;
            }
            let promoting = from.intersects(promo_rank);

            let ep_capture = mask & self.ep_square();
            if ep_capture.non_empty() {
                let mut m = Move::new(from, ep_capture, piece);
                m.capture = Some(Self::enemy_piece::<W>(PieceType::Pawn));
                m.flags = MoveFlags::EN_PASSANT;
                m.score = mvv_lva_score(PieceType::Pawn, PieceType::Pawn);
                buckets.attack.push(m);
            }

            for to_sq in mask & self.enemy_set::<W>() {
                let to = SquareSet::from_square(to_sq);
                let victim = self.capture_at::<W>(to);
                if promoting {
                    for promo in
                        [PieceType::Queen, PieceType::Knight, PieceType::Rook, PieceType::Bishop]
                    {
                        let mut m = Move::new(from, to, piece);
                        m.capture = Some(victim);
                        m.flags = MoveFlags::promotion_flag(promo);
                        m.score = mvv_lva_score(PieceType::Pawn, victim.piece_type())
                            + promotion_order_score(promo);
                        buckets.attack.push(m);
                    }
                } else {
                    let mut m = Move::new(from, to, piece);
                    m.capture = Some(victim);
                    m.score = mvv_lva_score(PieceType::Pawn, victim.piece_type());
                    buckets.attack.push(m);
                }
            }

            if caps_only {
                continue;
            }

            for to_sq in mask - self.enemy_set::<W>() - self.ep_square() {
                let to = SquareSet::from_square(to_sq);
                if promoting {
                    for promo in
                        [PieceType::Queen, PieceType::Knight, PieceType::Rook, PieceType::Bishop]
                    {
                        let mut m = Move::new(from, to, piece);
                        m.flags = MoveFlags::promotion_flag(promo);
                        m.score = promotion_order_score(promo);
                        buckets.push_probably_good(m);
                    }
                } else {
                    let m = Move::new(from, to, piece);
                    if (front_span::<W>(from_sq) & enemy_pawns).is_empty() {
                        // a passed pawn's push is worth trying early
                        buckets.push_probably_good(m);
                    } else {
                        buckets.normal.push(m);
                    }
                }
            }
        }
    }

    fn generate_piece_moves<const W: bool>(
        &mut self,
        piece_type: PieceType,
        buckets: &mut MoveBuckets,
        caps_only: bool,
    ) {
        let piece = Self::own_piece::<W>(piece_type);
        for from_sq in self.piece_set(piece) {
            let from = SquareSet::from_square(from_sq);
            let mask = match piece_type {
                PieceType::Knight => self.knight_moves::<W>(from),
                PieceType::Bishop => self.bishop_moves::<W>(from),
                PieceType::Rook => self.rook_moves::<W>(from),
                _ => self.queen_moves::<W>(from),
            };
            for to_sq in mask & self.enemy_set::<W>() {
                let to = SquareSet::from_square(to_sq);
                let victim = self.capture_at::<W>(to);
                let mut m = Move::new(from, to, piece);
                m.capture = Some(victim);
                m.score = mvv_lva_score(piece_type, victim.piece_type());
                buckets.attack.push(m);
            }
            if !caps_only {
                for to_sq in mask - self.enemy_set::<W>() {
                    buckets.normal.push(Move::new(from, SquareSet::from_square(to_sq), piece));
                }
            }
        }
    }

    fn generate_king_moves<const W: bool>(&mut self, buckets: &mut MoveBuckets, caps_only: bool) {
        let piece = Self::own_piece::<W>(PieceType::King);
        let from = self.piece_set(piece);
        let mask = self.king_moves::<W>(from);

        for to_sq in mask & self.enemy_set::<W>() {
            let to = SquareSet::from_square(to_sq);
            let victim = self.capture_at::<W>(to);
            let mut m = Move::new(from, to, piece);
            m.capture = Some(victim);
            m.score = mvv_lva_score(PieceType::King, victim.piece_type());
            buckets.attack.push(m);
        }
        if caps_only {
            return;
        }
        for to_sq in mask - self.enemy_set::<W>() {
            buckets.normal.push(Move::new(from, SquareSet::from_square(to_sq), piece));
        }

        let (kingside, queenside, k_land, q_land) = if W {
            (super::WKCA, super::WQCA, Square::G1, Square::C1)
        } else {
            (super::BKCA, super::BQCA, Square::G8, Square::C8)
        };
        if self.legal_castles & kingside != 0 {
            let mut m = Move::new(from, SquareSet::from_square(k_land), piece);
            m.flags = if W { MoveFlags::CASTLE_WK } else { MoveFlags::CASTLE_BK };
            m.score = CASTLE_SCORE;
            buckets.push_probably_good(m);
        }
        if self.legal_castles & queenside != 0 {
            let mut m = Move::new(from, SquareSet::from_square(q_land), piece);
            m.flags = if W { MoveFlags::CASTLE_WQ } else { MoveFlags::CASTLE_BQ };
            m.score = CASTLE_SCORE;
            buckets.push_probably_good(m);
        }
    }

    // ------------------------------------------------------------------
    // single-move legality

    /// Whether `m` could be generated in the current position. Used to
    /// vet transposition-table hints and killer moves before they are
    /// tried, and caller-supplied moves before they are applied.
    pub fn is_legal(&mut self, m: Move) -> bool {
        match self.turn() {
            Colour::White => self.is_legal_for::<true>(m),
            Colour::Black => self.is_legal_for::<false>(m),
        }
    }

    fn is_legal_for<const W: bool>(&mut self, m: Move) -> bool {
        if m.is_null() || m.piece.colour().is_white() != W {
            return false;
        }
        if !self.piece_set(m.piece).intersects(m.from) {
            return false;
        }
        self.ensure_check_pin_masks();

        if m.flags.is_castle() {
            self.ensure_king_danger::<W>();
            return self.legal_castles & (m.flags.bits() as u8 & super::ALL_CASTLING) != 0;
        }

        if m.flags.is_en_passant() {
            if m.to != self.ep_square() {
                return false;
            }
        } else {
            match m.capture {
                Some(victim) => {
                    if !self.piece_set(victim).intersects(m.to) {
                        return false;
                    }
                }
                None => {
                    if self.occupied().intersects(m.to) {
                        return false;
                    }
                }
            }
        }

        // a promotion flag must mean a pawn on the last rank, and a
        // pawn reaching the last rank must promote
        let promo_rank = if W { SquareSet::RANK_7 } else { SquareSet::RANK_2 };
        if m.piece.piece_type() == PieceType::Pawn
            && m.from.intersects(promo_rank) != m.flags.is_promotion()
        {
            return false;
        }

        if self.masks.checkers >= 2 && m.piece.piece_type() != PieceType::King {
            return false;
        }

        let mask = match m.piece.piece_type() {
            PieceType::Pawn => self.pawn_moves::<W>(m.from),
            PieceType::Knight => self.knight_moves::<W>(m.from),
            PieceType::Bishop => self.bishop_moves::<W>(m.from),
            PieceType::Rook => self.rook_moves::<W>(m.from),
            PieceType::Queen => self.queen_moves::<W>(m.from),
            PieceType::King => self.king_moves::<W>(m.from),
        };
        mask.intersects(m.to)
    }

    // ------------------------------------------------------------------
    // mobility

    /// The number of squares the side to move can legally put a piece
    /// on, castles included. Feeds the evaluator's mobility term.
    pub fn legal_destination_count(&mut self) -> i32 {
        match self.turn() {
            Colour::White => self.destination_count::<true>(),
            Colour::Black => self.destination_count::<false>(),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn destination_count<const W: bool>(&mut self) -> i32 {
        self.ensure_check_pin_masks();
        let king = self.piece_set(Self::own_piece::<W>(PieceType::King));
        let mut count = self.king_moves::<W>(king).count() + self.legal_castles.count_ones();
        if self.masks.checkers < 2 {
            for sq in self.piece_set(Self::own_piece::<W>(PieceType::Pawn)) {
                count += self.pawn_moves::<W>(SquareSet::from_square(sq)).count();
            }
            for sq in self.piece_set(Self::own_piece::<W>(PieceType::Knight)) {
                count += self.knight_moves::<W>(SquareSet::from_square(sq)).count();
            }
            for sq in self.piece_set(Self::own_piece::<W>(PieceType::Bishop)) {
                count += self.bishop_moves::<W>(SquareSet::from_square(sq)).count();
            }
            for sq in self.piece_set(Self::own_piece::<W>(PieceType::Rook)) {
                count += self.rook_moves::<W>(SquareSet::from_square(sq)).count();
            }
            for sq in self.piece_set(Self::own_piece::<W>(PieceType::Queen)) {
                count += self.queen_moves::<W>(SquareSet::from_square(sq)).count();
            }
        }
        count as i32
    }

    /// Every square the opposing side attacks, for the evaluator's
    /// king-safety term.
    pub(crate) fn seen_by(&self, colour: Colour) -> SquareSet {
        match colour {
            Colour::White => self.jumper_seen_squares::<true>() | self.slider_seen_squares::<true>(),
            Colour::Black => {
                self.jumper_seen_squares::<false>() | self.slider_seen_squares::<false>()
            }
        }
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::MoveBuckets;
    use crate::board::Board;
    use crate::chessmove::MoveFlags;
    use crate::piece::{Piece, PieceType};
    use crate::squareset::SquareSet;
    use crate::util::Square;

    #[test]
    fn twenty_moves_from_the_start() {
        let mut board = Board::default();
        assert_eq!(board.legal_moves().len(), 20);
    }

    #[test]
    fn castling_positions() {
        // both castles available
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let moves = board.legal_moves();
        assert_eq!(moves.len(), 26);
        assert_eq!(moves.iter().filter(|m| m.flags.is_castle()).count(), 2);

        // no kingside rook, no kingside castle
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K3 w Qkq - 0 1").unwrap();
        let castles: Vec<_> =
            board.legal_moves().into_iter().filter(|m| m.flags.is_castle()).collect();
        assert_eq!(castles.len(), 1);
        assert!(castles[0].flags.contains(MoveFlags::CASTLE_WQ));

        // a bishop eyeing f1 kills the kingside castle but not the queenside
        let mut board = Board::from_fen("r3k2r/8/8/8/8/7b/8/R3K2R w KQkq - 0 1").unwrap();
        let castles: Vec<_> =
            board.legal_moves().into_iter().filter(|m| m.flags.is_castle()).collect();
        assert_eq!(castles.len(), 1);
        assert!(castles[0].flags.contains(MoveFlags::CASTLE_WQ));
    }

    #[test]
    fn en_passant_on_a_shared_rank_pin_is_illegal() {
        let mut board = Board::from_fen("8/8/8/KPp4r/8/8/8/5k2 w - c6 0 1").unwrap();
        let moves = board.legal_moves();
        assert!(
            !moves.iter().any(|m| m.flags.is_en_passant()),
            "bxc6 e.p. must not be generated: it exposes the king on the fifth rank"
        );
    }

    #[test]
    fn en_passant_is_generated_when_safe() {
        let mut board = Board::from_fen("8/8/8/1Pp5/8/8/8/K2k4 w - c6 0 1").unwrap();
        let moves = board.legal_moves();
        assert!(moves.iter().any(|m| m.flags.is_en_passant()));
    }

    #[test]
    fn promotion_enumeration_and_ordering() {
        let mut board = Board::from_fen("8/P7/8/8/8/8/8/k6K w - - 0 1").unwrap();
        let mut buckets = MoveBuckets::new();
        board.generate_moves(&mut buckets);
        let promos: Vec<_> =
            buckets.probably_good.iter().filter(|m| m.flags.is_promotion()).collect();
        assert_eq!(promos.len(), 4);
        let best = promos.iter().max_by_key(|m| m.score).unwrap();
        assert_eq!(best.flags.promotion_type(), Some(PieceType::Queen));
        let mut scores: Vec<_> = promos
            .iter()
            .map(|m| (m.score, m.flags.promotion_type().unwrap()))
            .collect();
        scores.sort_by_key(|(score, _)| -score);
        let order: Vec<_> = scores.into_iter().map(|(_, pt)| pt).collect();
        assert_eq!(
            order,
            [PieceType::Queen, PieceType::Knight, PieceType::Rook, PieceType::Bishop]
        );
    }

    #[test]
    fn double_check_allows_only_king_moves() {
        // knight on f3 and rook on e2 both give check
        let mut board = Board::from_fen("4k3/8/8/8/8/5n2/4r3/4K3 w - - 0 1").unwrap();
        let moves = board.legal_moves();
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.piece == Piece::WK));
    }

    #[test]
    fn pinned_pieces_stay_on_their_lines() {
        // the d2 rook is pinned to the d1 king by the d8 rook; it may
        // slide along the d-file but never leave it
        let mut board = Board::from_fen("3r3k/8/8/8/8/8/3R4/3K4 w - - 0 1").unwrap();
        let moves = board.legal_moves();
        for m in moves.iter().filter(|m| m.piece == Piece::WR) {
            assert_eq!(m.to_square().file(), 3, "pinned rook left the file: {m}");
        }
        // and a pinned knight cannot move at all
        let mut board = Board::from_fen("3r3k/8/8/8/8/8/3N4/3K4 w - - 0 1").unwrap();
        assert!(board.legal_moves().iter().all(|m| m.piece != Piece::WN));
    }

    #[test]
    fn check_evasions_block_capture_or_flee() {
        // rook checks along the e-file: block on e2/e3, capture on e7, or step aside
        let mut board = Board::from_fen("4r2k/8/8/8/8/8/1B6/R3K3 w Q - 0 1").unwrap();
        let moves = board.legal_moves();
        assert!(moves.iter().all(|m| {
            m.piece == Piece::WK
                || m.to_square().file() == 4
        }));
        assert!(!moves.iter().any(|m| m.flags.is_castle()), "castling out of check is illegal");
    }

    #[test]
    fn mobility_counts_are_sane() {
        let mut board = Board::default();
        assert_eq!(board.legal_destination_count(), 20);
    }
}
