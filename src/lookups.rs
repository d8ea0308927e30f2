//! Precomputed tables: directional rays for slider movement and the
//! front-span masks used for passed-pawn detection.

use crate::cfor;
use crate::squareset::SquareSet;
use crate::util::Square;

/// The eight ray directions, in the order the tables are indexed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    pub const COUNT: usize = 8;

    pub const ALL: [Self; 8] = [
        Self::North,
        Self::East,
        Self::South,
        Self::West,
        Self::NorthEast,
        Self::NorthWest,
        Self::SouthEast,
        Self::SouthWest,
    ];

    pub const HORIZONTAL_VERTICAL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    pub const DIAGONAL: [Self; 4] =
        [Self::NorthEast, Self::NorthWest, Self::SouthEast, Self::SouthWest];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the direction increases square indices, which decides if
    /// the nearest blocker along a ray is the lowest or the highest bit.
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::North | Self::East | Self::NorthEast | Self::NorthWest)
    }
}

const TOP: u64 = 0xFF00_0000_0000_0000;
const BOTTOM: u64 = 0x0000_0000_0000_00FF;
const LEFT: u64 = 0x0101_0101_0101_0101;
const RIGHT: u64 = 0x8080_8080_8080_8080;

const fn shift_north(bb: u64) -> u64 {
    (bb & !TOP) << 8
}
const fn shift_south(bb: u64) -> u64 {
    (bb & !BOTTOM) >> 8
}
const fn shift_east(bb: u64) -> u64 {
    (bb & !RIGHT) << 1
}
const fn shift_west(bb: u64) -> u64 {
    (bb & !LEFT) >> 1
}

const fn shift_once(bb: u64, dir: Direction) -> u64 {
    match dir {
        Direction::North => shift_north(bb),
        Direction::East => shift_east(bb),
        Direction::South => shift_south(bb),
        Direction::West => shift_west(bb),
        Direction::NorthEast => shift_east(shift_north(bb)),
        Direction::NorthWest => shift_west(shift_north(bb)),
        Direction::SouthEast => shift_east(shift_south(bb)),
        Direction::SouthWest => shift_west(shift_south(bb)),
    }
}

const fn ray_from(sq: usize, dir: Direction) -> u64 {
    let mut ray = 0u64;
    let mut step = shift_once(1 << sq, dir);
    while step != 0 {
        ray |= step;
        step = shift_once(step, dir);
    }
    ray
}

const fn init_rays() -> [[u64; 64]; Direction::COUNT] {
    let mut rays = [[0u64; 64]; Direction::COUNT];
    cfor!(let mut d = 0; d < Direction::COUNT; d += 1; {
        cfor!(let mut sq = 0; sq < 64; sq += 1; {
            rays[d][sq] = ray_from(sq, Direction::ALL[d]);
        });
    });
    rays
}

/// For each direction and square: every square strictly beyond the
/// origin out to the board edge, the origin excluded.
static RAYS: [[u64; 64]; Direction::COUNT] = init_rays();

pub fn ray(sq: Square, dir: Direction) -> SquareSet {
    SquareSet::from_inner(RAYS[dir.index()][sq.index()])
}

/// The ray from `sq` in `dir`, trimmed at (and including) the first bit
/// of `blockers` it meets. With no blocker in the way the full ray is
/// returned.
pub fn cast_ray_to_blocker(sq: Square, dir: Direction, blockers: SquareSet) -> SquareSet {
    let ray = SquareSet::from_inner(RAYS[dir.index()][sq.index()]);
    let in_the_way = ray & blockers;
    let nearest =
        if dir.is_ascending() { in_the_way.isolate_lsb() } else { in_the_way.isolate_msb() };
    if nearest.is_empty() {
        ray
    } else {
        // everything beyond the blocker is the blocker's own ray
        ray ^ SquareSet::from_inner(RAYS[dir.index()][nearest.first().index()])
    }
}

const fn init_front_spans() -> ([u64; 64], [u64; 64]) {
    let mut white = [0u64; 64];
    let mut black = [0u64; 64];
    cfor!(let mut sq = 0; sq < 64; sq += 1; {
        let pos = 1u64 << sq;
        let lane = pos | shift_east(pos) | shift_west(pos);
        let mut up = shift_north(lane);
        while up != 0 {
            white[sq] |= up;
            up = shift_north(up);
        }
        let mut down = shift_south(lane);
        while down != 0 {
            black[sq] |= down;
            down = shift_south(down);
        }
    });
    (white, black)
}

static WHITE_FRONT_SPANS: [u64; 64] = init_front_spans().0;
static BLACK_FRONT_SPANS: [u64; 64] = init_front_spans().1;

/// Every square a pawn of the given side must clear of enemy pawns to
/// count as passed: its own file and both adjacent files, ahead of it.
pub fn front_span<const IS_WHITE: bool>(sq: Square) -> SquareSet {
    if IS_WHITE {
        SquareSet::from_inner(WHITE_FRONT_SPANS[sq.index()])
    } else {
        SquareSet::from_inner(BLACK_FRONT_SPANS[sq.index()])
    }
}

pub fn file_set(file: u8) -> SquareSet {
    SquareSet::FILE_A << file
}

mod tests {
    #![allow(unused_imports)]
    use super::{cast_ray_to_blocker, front_span, ray, Direction};
    use crate::squareset::SquareSet;
    use crate::util::Square;

    #[test]
    fn rays_exclude_origin_and_reach_the_edge() {
        let r = ray(Square::new(0), Direction::North);
        assert_eq!(r.count(), 7);
        assert!(!r.contains_square(Square::A1));
        assert!(r.contains_square(Square::A8));

        let r = ray(Square::new(0), Direction::NorthEast);
        assert_eq!(r.count(), 7);
        assert!(r.contains_square(Square::H8));

        assert_eq!(ray(Square::H1, Direction::East), SquareSet::EMPTY);
        assert_eq!(ray(Square::A8, Direction::North), SquareSet::EMPTY);
    }

    #[test]
    fn blocker_trims_ray_inclusively() {
        // rook on a1, blocker on a5: a2, a3, a4, a5
        let blockers = SquareSet::from_square(Square::from_rank_file(4, 0));
        let hit = cast_ray_to_blocker(Square::A1, Direction::North, blockers);
        assert_eq!(hit.count(), 4);
        assert!(hit.contains_square(Square::from_rank_file(4, 0)));
        assert!(!hit.contains_square(Square::from_rank_file(5, 0)));
    }

    #[test]
    fn blocker_in_descending_direction_uses_nearest() {
        // rook on h8 looking west, blockers on a8 and e8: stop at e8
        let blockers =
            SquareSet::from_square(Square::A8) | SquareSet::from_square(Square::E8);
        let hit = cast_ray_to_blocker(Square::H8, Direction::West, blockers);
        assert_eq!(hit.count(), 3);
        assert!(hit.contains_square(Square::E8));
        assert!(!hit.contains_square(Square::D8));
    }

    #[test]
    fn front_spans_cover_adjacent_files() {
        let span = front_span::<true>(Square::E4);
        assert!(span.contains_square(Square::from_rank_file(4, 3)));
        assert!(span.contains_square(Square::from_rank_file(6, 5)));
        assert!(!span.contains_square(Square::E4));
        assert!(!span.contains_square(Square::from_rank_file(2, 4)));
        let span = front_span::<false>(Square::E4);
        assert!(span.contains_square(Square::from_rank_file(1, 4)));
        assert!(!span.contains_square(Square::from_rank_file(4, 4)));
    }
}
