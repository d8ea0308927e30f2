//! Position fingerprinting. Every feature of a position (piece on a
//! square, en-passant target, castling right, side to move) owns a fixed
//! 64-bit key, and a position's hash is the XOR of the keys of its
//! features, so a move updates the hash in O(1).

use crate::cfor;
use crate::piece::Piece;
use crate::util::Square;

const SEED: u128 = 0x246C_CB2D_3B40_2853_9918_0A6D_BC3A_F444;

/// Feature rows: one per piece, plus a thirteenth shared by the
/// en-passant squares and the side-to-move/castling terms.
const ROWS: usize = 13;
/// Columns 0..64 are squares; column 65 holds the per-row specials
/// (castling bits in rows 0..4, side to move in row 12).
const COLS: usize = 66;

const EXTRAS_ROW: usize = 12;
const SPECIAL_COL: usize = 65;

#[allow(clippy::cast_possible_truncation)]
const fn xorshift(state: u128) -> (u64, u128) {
    let mut x = state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    let out = (x as u64) ^ ((x >> 64) as u64);
    (out, x)
}

const fn init_keys() -> [[u64; COLS]; ROWS] {
    let mut keys = [[0u64; COLS]; ROWS];
    let mut state = SEED;
    cfor!(let mut row = 0; row < ROWS; row += 1; {
        cfor!(let mut col = 0; col < COLS; col += 1; {
            let key;
            (key, state) = xorshift(state);
            keys[row][col] = key;
        });
    });
    keys
}

static KEYS: [[u64; COLS]; ROWS] = init_keys();

pub fn hash_piece(key: &mut u64, piece: Piece, sq: Square) {
    *key ^= KEYS[piece.index()][sq.index()];
}

pub fn hash_ep(key: &mut u64, sq: Square) {
    *key ^= KEYS[EXTRAS_ROW][sq.index()];
}

pub fn hash_side(key: &mut u64) {
    *key ^= KEYS[EXTRAS_ROW][SPECIAL_COL];
}

/// XORs the term of every set bit of a 4-bit castling-rights mask, so
/// hashing a mask out and the updated mask back in leaves exactly the
/// changed bits' terms applied.
pub fn hash_castling(key: &mut u64, rights: u8) {
    debug_assert!(rights <= 0b1111);
    let mut bits = rights;
    while bits != 0 {
        let bit = bits.trailing_zeros() as usize;
        *key ^= KEYS[bit][SPECIAL_COL];
        bits &= bits - 1;
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::{hash_castling, KEYS};

    #[test]
    fn all_keys_distinct() {
        let mut flat: Vec<u64> = KEYS.iter().flatten().copied().collect();
        let before = flat.len();
        flat.sort_unstable();
        flat.dedup();
        assert_eq!(flat.len(), before);
    }

    #[test]
    fn castling_hash_is_per_bit() {
        let mut all = 0u64;
        hash_castling(&mut all, 0b1111);
        let mut bit_by_bit = 0u64;
        for bit in 0..4 {
            hash_castling(&mut bit_by_bit, 1 << bit);
        }
        assert_eq!(all, bit_by_bit);

        // out and back in cancels
        let mut key = 0xDEAD_BEEF_u64;
        hash_castling(&mut key, 0b1010);
        hash_castling(&mut key, 0b1010);
        assert_eq!(key, 0xDEAD_BEEF_u64);
    }
}
