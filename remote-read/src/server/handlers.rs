//! HTTP route handlers for the remote-read server.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::{BytesRejection, FailedToBufferBody};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use super::metrics::{Metrics, ReadStatus};
use crate::codec::{decode_read_request, encode_read_response};
use crate::error::Error;
use crate::fanout::FanOut;

/// Content type of remote-read request and response bodies.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub fan_out: Arc<FanOut>,
    pub metrics: Arc<Metrics>,
    pub max_request_size: usize,
}

/// Handle POST /api/v1/read
///
/// The body is a snappy-compressed `ReadRequest`. The response is encoded in
/// full before anything is written, so a failure at any point produces a
/// clean error status instead of a truncated body.
pub async fn handle_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let result = read(&state, &headers, body).await;
    match &result {
        Ok(_) => state.metrics.record_read(ReadStatus::Success),
        Err(err) if err.is_client_error() => {
            tracing::warn!("Rejected remote read request: {}", err);
            state.metrics.record_read(ReadStatus::ClientError);
        }
        Err(err) => {
            tracing::error!("Remote read request failed: {}", err);
            state.metrics.record_read(ReadStatus::ServerError);
        }
    }

    let encoded = result?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE),
            (header::CONTENT_ENCODING, "snappy"),
        ],
        encoded,
    )
        .into_response())
}

async fn read(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Bytes, Error> {
    let limit = state.max_request_size;
    let declared_len = content_length(headers);
    let body = body.map_err(|rejection| match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            Error::PayloadTooLarge {
                size: declared_len.unwrap_or(limit + 1),
                limit,
            }
        }
        other => Error::MalformedPayload(format!("failed to read request body: {}", other)),
    })?;

    let request = decode_read_request(&body, declared_len, limit)?;
    let queries = request.queries.len();
    tracing::debug!("Remote read request with {} queries", queries);

    let metrics = &state.metrics;
    metrics.remote_read_queries_total.inc_by(queries as u64);

    let outcome = state.fan_out.read(request, CancellationToken::new()).await?;
    let encoded = encode_read_response(&outcome.response)?;

    metrics
        .remote_read_failed_queries_total
        .inc_by(outcome.failed_queries as u64);
    metrics
        .remote_read_series_total
        .inc_by(outcome.response.series_count() as u64);
    metrics
        .remote_read_samples_total
        .inc_by(outcome.response.sample_count() as u64);

    Ok(encoded)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Handle GET /-/ready
pub async fn handle_ready() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
