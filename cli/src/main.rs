use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::rton::RtonCommands;

#[derive(Parser)]
#[command(name = "rton-cli")]
#[command(about = "CLI for RTON files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// RTON Operations (Convert/Encrypt/Batch)
    #[command(subcommand)]
    Rton(RtonCommands),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rton(cmd) => commands::rton::handle(cmd)?,
    }
    Ok(())
}
