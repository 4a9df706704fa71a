use anyhow::Result;
use clap::Parser;

use isonet::cli::{Cli, Commands};
use isonet::commands::{solve, table};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Solve(args) => solve(&cli, args),
        Commands::Table(args) => table(&cli, args),
    }
}
