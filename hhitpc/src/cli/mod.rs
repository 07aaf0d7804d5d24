//! hhitpc CLI - persuasion-check patcher for Skyrim SE load orders

pub mod commands;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "hhitpc")]
#[command(version)]
#[command(about = "Patches dialog persuasion checks with explicit difficulty", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the hhitpc CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
