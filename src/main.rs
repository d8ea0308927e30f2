#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_const_for_fn, clippy::module_name_repetitions)]

//! Basalt, a bitboard chess engine written in Rust.

mod macros;

mod board;
mod chessmove;
mod cli;
mod errors;
mod lookups;
mod movepicker;
mod perft;
mod piece;
mod repl;
mod search;
mod searchinfo;
mod squareset;
mod transpositiontable;
mod util;
mod zobrist;

/// The name of the engine.
pub static NAME: &str = "Basalt";
/// The version of the engine.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let cli = <cli::Cli as clap::Parser>::parse();

    if cli.perfttest {
        return perft::gamut();
    }
    repl::main_loop(cli.fen.as_deref())
}
