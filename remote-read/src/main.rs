//! Remote Read HTTP Server binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use remote_read::server::{CliArgs, RemoteReadServer, ServerConfig};
use remote_read::storage::factory::create_storage;
use remote_read::{RemoteReadConfig, load_config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();

    let remote_read = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("No configuration file provided, using defaults");
            RemoteReadConfig::default()
        }
    };
    let config = ServerConfig::new(remote_read, &args);

    tracing::info!(
        "Creating storage with config: {:?}",
        config.remote_read.storage
    );
    let storage = create_storage(&config.remote_read.storage).unwrap_or_else(|e| {
        tracing::error!("Failed to create storage: {}", e);
        std::process::exit(1);
    });

    let server = RemoteReadServer::new(storage, config);
    if let Err(e) = server.run().await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}
