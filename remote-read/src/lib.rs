//! Remote Read - the query path of a Prometheus remote-read endpoint.
//!
//! A remote-read request carries several independent sub-queries, each a time
//! range plus label matchers. This crate decodes the request, runs every
//! sub-query concurrently against a storage engine, and assembles one
//! response whose results line up with the request's queries.
//!
//! # Architecture
//!
//! - **codec**: snappy-compressed protobuf bodies, with a size ceiling checked
//!   on the declared, received and decompressed lengths.
//! - **executor**: runs one sub-query against a [`storage::Queryable`] and
//!   materializes every matched series.
//! - **fanout**: launches one task per sub-query, bounds concurrency and total
//!   time, and collects results by index.
//! - **server**: the `POST /api/v1/read` endpoint (feature `http-server`).
//!
//! The storage engine is a trait boundary. [`storage::InMemoryStorage`] is
//! provided for development and tests.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use remote_read::{FanOut, FanOutOptions, codec};
//! use remote_read::storage::InMemoryStorage;
//! use tokio_util::sync::CancellationToken;
//!
//! let fan_out = FanOut::new(Arc::new(InMemoryStorage::new()), FanOutOptions::default());
//! let request = codec::decode_read_request(&body, None, codec::DEFAULT_MAX_REQUEST_SIZE)?;
//! let outcome = fan_out.read(request, CancellationToken::new()).await?;
//! let response = codec::encode_read_response(&outcome.response)?;
//! ```

pub mod codec;
pub mod config;
mod error;
mod executor;
mod fanout;
mod materialize;
pub mod model;
pub mod proto;
#[cfg(feature = "http-server")]
pub mod server;
pub mod storage;
#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, RemoteReadConfig, load_config};
pub use error::{Error, Result};
pub use executor::execute_query;
pub use fanout::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_QUERY_TIMEOUT, FanOut, FanOutOptions, PartialFailureMode,
    ReadOutcome,
};
pub use materialize::{materialize_series, materialize_series_set};
