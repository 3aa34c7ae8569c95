mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowsort", about = "Automated microfluidic specimen sorter")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sort loop
    Run(commands::run::RunArgs),
    /// Segment a saved frame against a saved background
    Segment(commands::segment::SegmentArgs),
    /// Print or save the default sort config
    Config(commands::config::ConfigArgs),
    /// Clear bubbles or flush the tubing, then leave the valves safe
    Maintain(commands::maintain::MaintainArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Segment(args) => commands::segment::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Maintain(args) => commands::maintain::run(args),
    }
}
