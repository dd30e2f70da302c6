//! HTTP server for the remote-read endpoint.

mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod middleware;

pub use config::{CliArgs, ServerConfig};
pub use error::ApiError;
pub use handlers::{AppState, PROTOBUF_CONTENT_TYPE};
pub use http::{RemoteReadServer, build_router};
pub use metrics::Metrics;
