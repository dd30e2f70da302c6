//! Mapping of query path errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;
use crate::storage::StorageError;

/// Error response wrapper for converting [`Error`] to HTTP responses.
///
/// Bodies are plain text carrying the error message, as remote-read clients
/// expect.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::PayloadTooLarge { .. } | Error::MalformedPayload(_) | Error::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::QuerierAcquisition(e) | Error::StorageIteration(e) => match e {
                StorageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                StorageError::Storage(_) | StorageError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                StorageError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            },
            Error::Encoding(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Timeout(_) | Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.0.to_string()).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}
