//! CLI for wspush: loads configuration, starts the WebSocket and push
//! listeners, and runs until ctrl-c.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use wspush::Server;
use wspush::config::{load_config, load_config_from};
use wspush::utils::logging;

#[derive(Parser)]
#[command(name = "wspush", version, about = "WebSocket push server")]
struct Args {
    /// Configuration file (defaults to config/default.* when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overriding log.level from the configuration
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = run_server(args).await {
        logging::init("error");
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_server(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    logging::init(args.log_level.as_deref().unwrap_or(&config.log.level));

    let mut handle = Server::new(config).start().await?;

    tokio::select! {
        _ = handle.wait() => {
            error!("Server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
    handle.shutdown().await;

    Ok(())
}
