//! Command-line arguments and server configuration.

use clap::Parser;

use crate::config::RemoteReadConfig;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "remote-read")]
#[command(about = "Prometheus remote-read query endpoint")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "REMOTE_READ_CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on, overriding the configuration file
    #[arg(short, long, env = "REMOTE_READ_PORT")]
    pub port: Option<u16>,
}

/// Server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub remote_read: RemoteReadConfig,
}

impl ServerConfig {
    /// Combines the loaded configuration with command-line overrides.
    pub fn new(mut remote_read: RemoteReadConfig, args: &CliArgs) -> Self {
        if let Some(port) = args.port {
            remote_read.port = port;
        }
        Self { remote_read }
    }

    pub fn port(&self) -> u16 {
        self.remote_read.port
    }
}
