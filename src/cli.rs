use clap::Parser;

#[derive(Parser)]
#[clap(author, version, about)]
pub struct Cli {
    /// Run the perft reference suite and exit
    #[clap(long)]
    pub perfttest: bool,
    /// Start the command loop from this position instead of the initial one
    #[clap(long, value_name = "FEN")]
    pub fen: Option<String>,
}
