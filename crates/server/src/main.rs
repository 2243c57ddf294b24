use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "Scout - MCP server discovery service", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scout.toml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// JSON seed file for the catalog (overrides the config file)
    #[arg(long, env = "SCOUT_SEED")]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout=info,tower_http=debug".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    tracing::info!("Starting Scout discovery service");

    // Load configuration
    let mut config = ServerConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.catalog.seed_file = Some(seed.display().to_string());
    }

    // Start API server
    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("Starting API server on {}", addr);

    api::serve(&addr, config).await?;

    Ok(())
}
