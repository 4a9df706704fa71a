use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CSG over implicit solids: extract the boundary surface and integrals of
/// a blobtree expression.
#[derive(Parser)]
#[command(name = "isonet", version, about)]
pub struct Cli {
    /// Print progress details (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the solver on a scene description.
    Solve(SolveArgs),
    /// Inspect an arrangement lookup-table file.
    Table(TableArgs),
}

#[derive(Args)]
pub struct SolveArgs {
    /// Scene description (JSON).
    pub scene: PathBuf,

    /// Configuration file (JSON); defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the grid resolution.
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Override the lookup-table path.
    #[arg(long)]
    pub lut: Option<PathBuf>,

    /// Write the output surface as a Wavefront OBJ file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct TableArgs {
    /// Lookup-table file (MessagePack).
    pub table: PathBuf,
}
