//! The interactive command loop: a thin layer of token parsing between
//! stdin and the engine. Bad input is reported and the loop carries on.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::board::evaluation::{is_mate_score, CHECKMATE_SCORE, PAWN_SCORE};
use crate::board::Board;
use crate::perft;
use crate::piece::Colour;
use crate::search::Engine;
use crate::searchinfo::EngineSettings;
use crate::squareset::SquareSet;
use crate::util::MAX_ENGINE_DEPTH;

pub fn main_loop(start_fen: Option<&str>) -> Result<()> {
    let mut board = match start_fen {
        Some(fen) => Board::from_fen(fen).context("invalid --fen argument")?,
        None => Board::default(),
    };
    let mut engine = Engine::new();
    let mut history = vec![board.clone()];

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!(">> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            return Ok(());
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else { continue };

        match command {
            "quit" | "exit" => return Ok(()),
            "move" => match parse_and_apply_move(&mut board, &tokens[1..]) {
                Ok(()) => {}
                Err(message) => println!("{message}"),
            },
            "reset" => match do_reset(&mut board, &mut engine, &tokens[1..]) {
                Ok(()) => {}
                Err(message) => println!("{message}"),
            },
            "perft" => do_perft(&mut board, &tokens[1..]),
            "engine" | "search" => match parse_engine_settings(&tokens[1..]) {
                Ok(settings) => do_engine(&mut board, &mut engine, &settings),
                Err(message) => println!("{message}"),
            },
            "score" => {
                let relative = board.score_board();
                let white_pov =
                    if board.turn() == Colour::White { relative } else { -relative };
                println!("Score: {}", f64::from(white_pov) / f64::from(PAWN_SCORE));
            }
            "print" => do_print(&mut board, &tokens[1..]),
            "undo" => {
                if history.len() > 1 {
                    history.pop();
                    board = history.last().unwrap().clone();
                } else {
                    println!("Nothing to undo");
                }
            }
            _ => println!("Invalid input"),
        }

        if history.last().map_or(true, |prev| prev.to_fen() != board.to_fen()) {
            history.push(board.clone());
        }
    }
}

fn parse_and_apply_move(board: &mut Board, args: &[&str]) -> std::result::Result<(), String> {
    // accept both `move e2e4` and `move e2 e4 [q]`
    let text = match args {
        [one] => (*one).to_string(),
        [from, to] => format!("{from}{to}"),
        [from, to, promo] => format!("{from}{to}{promo}"),
        _ => return Err("usage: move <from><to>[promo]".to_string()),
    };
    let m = board.parse_move(&text).map_err(|e| e.to_string())?;
    board.apply_move(m);
    Ok(())
}

fn do_reset(
    board: &mut Board,
    engine: &mut Engine,
    args: &[&str],
) -> std::result::Result<(), String> {
    match args {
        [] => board.set_startpos(),
        ["tt" | "transtable"] => engine.reset_tables(),
        ["kiwipete"] => {
            *board = Board::from_fen(
                "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            )
            .expect("the kiwipete FEN is hardcoded and must parse");
        }
        ["fen", rest @ ..] if !rest.is_empty() => {
            let fen = rest.join(" ");
            board.set_from_fen(&fen).map_err(|e| e.to_string())?;
        }
        _ => return Err("usage: reset [kiwipete | tt | fen <FEN>]".to_string()),
    }
    Ok(())
}

fn do_perft(board: &mut Board, args: &[&str]) {
    let mut depth = None;
    let mut expanded = false;
    for &arg in args {
        if let Ok(d) = arg.parse::<u32>() {
            depth = Some(d);
        } else if arg == "expand" {
            expanded = true;
        } else {
            println!("usage: perft <depth> [expand]");
            return;
        }
    }
    let Some(depth @ 1..=9) = depth else {
        println!("usage: perft <depth 1-9> [expand]");
        return;
    };

    let start = std::time::Instant::now();
    let nodes = if expanded {
        perft::perft_expanded(board, depth)
    } else {
        perft::perft(board, depth)
    };
    let elapsed = start.elapsed();
    let knps = nodes / (elapsed.as_millis().max(1) as u64);
    println!("Time              : {} ms", elapsed.as_millis());
    println!("Positions searched: {nodes}");
    println!("Knps              : {knps}");
}

fn parse_engine_settings(args: &[&str]) -> std::result::Result<EngineSettings, String> {
    let mut settings = EngineSettings { print_stats: true, ..Default::default() };
    let mut mode_given = false;
    let mut side_given = false;
    let mut amount = None;

    for &arg in args {
        if let Ok(n) = arg.parse::<u64>() {
            amount = Some(n);
        } else {
            match arg {
                "depth" => {
                    settings.use_time = false;
                    mode_given = true;
                }
                "time" => {
                    settings.use_time = true;
                    mode_given = true;
                }
                "white" => {
                    settings.side = Colour::White;
                    side_given = true;
                }
                "black" => {
                    settings.side = Colour::Black;
                    side_given = true;
                }
                "move" => settings.do_move = true,
                flag => {
                    if !settings.search.apply_flag(flag) {
                        return Err(format!("unknown engine option \"{flag}\""));
                    }
                }
            }
        }
    }

    let Some(amount) = amount else {
        return Err("engine needs a depth or a time budget in ms".to_string());
    };
    if !mode_given {
        return Err("specify `depth` or `time`".to_string());
    }
    if !side_given {
        return Err("specify `white` or `black`".to_string());
    }
    if settings.use_time {
        settings.time = Duration::from_millis(amount);
    } else {
        if amount == 0 || amount > MAX_ENGINE_DEPTH as u64 {
            return Err(format!("depth must be 1-{MAX_ENGINE_DEPTH}"));
        }
        settings.depth = amount as u32;
    }
    Ok(settings)
}

fn do_engine(board: &mut Board, engine: &mut Engine, settings: &EngineSettings) {
    let stop = Arc::new(AtomicBool::new(false));
    let done = Arc::new(AtomicBool::new(false));

    // the only job of this helper thread is to flip the cancellation
    // flag once the wall-clock budget is spent
    let timeout_thread = settings.use_time.then(|| {
        let stop = Arc::clone(&stop);
        let done = Arc::clone(&done);
        let slice = settings.time / 8;
        std::thread::spawn(move || {
            for _ in 0..12 {
                if done.load(Ordering::Relaxed) {
                    return;
                }
                std::thread::sleep(slice);
            }
            stop.store(true, Ordering::Relaxed);
        })
    });

    let start = std::time::Instant::now();
    let result = engine.do_engine(board, settings, &stop);
    done.store(true, Ordering::Relaxed);
    if let Some(handle) = timeout_thread {
        let _ = handle.join();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            println!("engine error: {e}");
            return;
        }
    };

    let elapsed = start.elapsed();
    println!("Best Move          : {}", report.best_move);
    println!("Score              : {}", describe_score(report.score));
    println!("Depth              : {}", report.depth);
    if settings.print_stats {
        let knps = engine.stats.nodes / (elapsed.as_millis().max(1) as u64);
        println!("Time               : {} ms", elapsed.as_millis());
        println!("Knps               : {knps}");
        println!("{}", engine.stats);
    }
}

/// Renders a white-relative score as pawns, or as distance to mate.
fn describe_score(score: i32) -> String {
    if is_mate_score(score) {
        let (side, magnitude) = if score > 0 { ("White", score) } else { ("Black", -score) };
        let mate_in = (CHECKMATE_SCORE - (magnitude - 1)) / 2;
        format!("{side} has mate in {mate_in}")
    } else {
        format!("{}", f64::from(score) / f64::from(PAWN_SCORE))
    }
}

fn do_print(board: &mut Board, args: &[&str]) {
    match args {
        [] => print!("{board}"),
        ["white"] => print!("{}", board.colour_set(Colour::White)),
        ["black"] => print!("{}", board.colour_set(Colour::Black)),
        ["legal", square] => {
            let Ok(sq) = square.parse::<crate::util::Square>() else {
                println!("usage: print legal <square>");
                return;
            };
            let from = SquareSet::from_square(sq);
            let mut targets = SquareSet::EMPTY;
            for m in board.legal_moves() {
                if m.from == from {
                    targets |= m.to;
                }
            }
            print!("{targets}");
        }
        _ => println!("usage: print [white | black | legal <square>]"),
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::{describe_score, parse_engine_settings};
    use crate::board::evaluation::CHECKMATE_SCORE;
    use crate::piece::Colour;

    #[test]
    fn engine_command_parsing() {
        let settings = parse_engine_settings(&["6", "depth", "white", "move"]).unwrap();
        assert_eq!(settings.depth, 6);
        assert!(!settings.use_time);
        assert_eq!(settings.side, Colour::White);
        assert!(settings.do_move);

        let settings = parse_engine_settings(&["2500", "time", "black"]).unwrap();
        assert!(settings.use_time);
        assert_eq!(settings.time.as_millis(), 2500);
        assert_eq!(settings.side, Colour::Black);

        let settings =
            parse_engine_settings(&["4", "depth", "white", "noprune", "nokiller"]).unwrap();
        assert!(!settings.search.null_move_prune);
        assert!(!settings.search.use_killer_moves);

        assert!(parse_engine_settings(&["depth", "white"]).is_err());
        assert!(parse_engine_settings(&["6", "white"]).is_err());
        assert!(parse_engine_settings(&["6", "depth"]).is_err());
        assert!(parse_engine_settings(&["6", "depth", "white", "bogus"]).is_err());
    }

    #[test]
    fn score_rendering() {
        assert_eq!(describe_score(150), "1.5");
        assert_eq!(describe_score(CHECKMATE_SCORE - 1), "White has mate in 1");
        assert_eq!(describe_score(-(CHECKMATE_SCORE - 1)), "Black has mate in 1");
        assert_eq!(describe_score(CHECKMATE_SCORE - 3), "White has mate in 2");
    }
}
