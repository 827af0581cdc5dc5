//! Prostream CLI - Command-line interface
//!
//! Provides command-line access to Prostream functionality.

mod commands;

use clap::Parser;
use prostream_core::tracing_setup::CliLogLevel;

#[derive(Parser)]
#[command(name = "prostream")]
#[command(about = "A media streaming gateway")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    prostream_core::tracing_setup::init_tracing(cli.log_level.as_tracing_level(), None)?;

    commands::handle_command(cli.command).await?;

    Ok(())
}
