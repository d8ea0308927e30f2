//! Perft: exhaustive legal-move-sequence counting. The reference
//! counts are the canonical correctness oracle for the move generator;
//! a single missing or extra move anywhere in the tree shows up as a
//! wrong total.

use anyhow::bail;

use crate::board::Board;
use crate::chessmove::Move;

pub fn perft(board: &mut Board, depth: u32) -> u64 {
    #[cfg(debug_assertions)]
    board.check_validity().unwrap();

    if depth == 0 {
        return 1;
    }
    let moves = board.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }

    let snapshot = board.snapshot();
    let mut count = 0;
    for m in moves {
        board.apply_move(m);
        count += perft(board, depth - 1);
        board.restore(&snapshot);
    }
    count
}

/// Per-root-move subtotals, in generation order (which groups moves of
/// the same piece together).
pub fn perft_divided(board: &mut Board, depth: u32) -> Vec<(Move, u64)> {
    let moves = board.legal_moves();
    let snapshot = board.snapshot();
    let mut out = Vec::with_capacity(moves.len());
    for m in moves {
        board.apply_move(m);
        let nodes = if depth > 1 { perft(board, depth - 1) } else { 1 };
        board.restore(&snapshot);
        out.push((m, nodes));
    }
    out
}

/// Prints the divided counts, blank-line separated per origin square,
/// and returns the total.
pub fn perft_expanded(board: &mut Board, depth: u32) -> u64 {
    let divided = perft_divided(board, depth);
    let mut total = 0;
    let mut last_from = None;
    for (m, nodes) in divided {
        if last_from.is_some() && last_from != Some(m.from_square()) {
            println!();
        }
        last_from = Some(m.from_square());
        println!("{m}: {nodes}");
        total += nodes;
    }
    println!("\ntotal: {total}");
    total
}

struct ReferencePosition {
    fen: &'static str,
    counts: &'static [u64],
}

/// Standard perft positions with well-known node counts.
static REFERENCE_SUITE: &[ReferencePosition] = &[
    ReferencePosition {
        fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        counts: &[20, 400, 8_902, 197_281, 4_865_609],
    },
    ReferencePosition {
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        counts: &[48, 2_039, 97_862, 4_085_603],
    },
    ReferencePosition {
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        counts: &[14, 191, 2_812, 43_238, 674_624],
    },
    ReferencePosition {
        fen: "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        counts: &[6, 264, 9_467, 422_333],
    },
    ReferencePosition {
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        counts: &[44, 1_486, 62_379, 2_103_487],
    },
    ReferencePosition {
        fen: "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        counts: &[46, 2_079, 89_890, 3_894_594],
    },
];

/// Runs the full reference suite, failing on the first wrong count.
pub fn gamut() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    const NODES_LIMIT: u64 = 500_000;
    #[cfg(not(debug_assertions))]
    const NODES_LIMIT: u64 = 60_000_000;

    for position in REFERENCE_SUITE {
        let mut board = Board::from_fen(position.fen)?;
        for (i, &expected) in position.counts.iter().enumerate() {
            let depth = i as u32 + 1;
            if expected > NODES_LIMIT {
                println!("skipping fen {}, depth {depth}", position.fen);
                continue;
            }
            let got = perft(&mut board, depth);
            if got == expected {
                println!("PASS: fen {}, depth {depth}", position.fen);
            } else {
                bail!(
                    "FAIL: fen {}, depth {depth}: expected {expected}, got {got}",
                    position.fen
                );
            }
        }
    }
    Ok(())
}

mod tests {
    #![allow(unused_imports)]
    use super::{perft, perft_divided};
    use crate::board::Board;

    #[test]
    fn perft_start_position() {
        let mut board = Board::default();
        assert_eq!(perft(&mut board, 1), 20);
        assert_eq!(perft(&mut board, 2), 400);
        assert_eq!(perft(&mut board, 3), 8_902);
        assert_eq!(perft(&mut board, 4), 197_281);
        // depth 5 is 4,865,609 nodes; the full suite covers it in release
    }

    #[test]
    fn perft_kiwipete() {
        let mut board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        assert_eq!(perft(&mut board, 1), 48, "got moves: {:?}", {
            board.legal_moves().iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        });
        assert_eq!(perft(&mut board, 2), 2_039);
        assert_eq!(perft(&mut board, 3), 97_862);
    }

    #[test]
    fn perft_pins_and_promotions() {
        let mut board = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&mut board, 1), 14);
        assert_eq!(perft(&mut board, 2), 191);
        assert_eq!(perft(&mut board, 3), 2_812);
        assert_eq!(perft(&mut board, 4), 43_238);

        let mut board =
            Board::from_fen("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1")
                .unwrap();
        assert_eq!(perft(&mut board, 1), 6);
        assert_eq!(perft(&mut board, 2), 264);
        assert_eq!(perft(&mut board, 3), 9_467);
    }

    #[test]
    fn perft_promotion_and_check_tangle() {
        let mut board =
            Board::from_fen("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8").unwrap();
        assert_eq!(perft(&mut board, 1), 44);
        assert_eq!(perft(&mut board, 2), 1_486);
        assert_eq!(perft(&mut board, 3), 62_379);
    }

    #[test]
    fn divided_counts_sum_to_the_total() {
        let mut board = Board::default();
        let divided = perft_divided(&mut board, 3);
        assert_eq!(divided.len(), 20);
        let sum: u64 = divided.iter().map(|(_, n)| n).sum();
        assert_eq!(sum, perft(&mut board, 3));
    }
}
