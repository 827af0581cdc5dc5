//! CLI command implementations

use std::path::PathBuf;

use clap::Subcommand;
use prostream_core::config::ProstreamConfig;
use prostream_core::hls::{FfprobeProber, MediaProber};
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Root directory for session files
        #[arg(long)]
        sessions_dir: Option<PathBuf>,
    },
    /// Probe a media URL and print its tracks as JSON
    Probe {
        /// URL or path of the media file
        url: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve {
            host,
            port,
            sessions_dir,
        } => serve(host, port, sessions_dir).await,
        Commands::Probe { url } => probe(url).await,
    }
}

/// Start the HTTP server with env-derived config and CLI overrides
async fn serve(
    host: Option<String>,
    port: Option<u16>,
    sessions_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ProstreamConfig::from_env();
    if let Some(host) = host {
        config.server.bind_address = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(dir) = sessions_dir {
        config.hls.session_root = dir;
    }

    info!(
        "Serving sessions from {} on {}:{}",
        config.hls.session_root.display(),
        config.server.bind_address,
        config.server.port
    );
    prostream_web::run_server(config).await
}

/// Probe a source and print its elementary streams
async fn probe(url: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = ProstreamConfig::from_env();
    let prober = FfprobeProber::new(config.hls.ffprobe_path);

    let tracks = prober.probe(&url).await?;
    println!("{}", serde_json::to_string_pretty(&tracks)?);

    Ok(())
}
