//! Error types for the remote-read query path.

use std::time::Duration;

use crate::storage::StorageError;

/// Error type for remote-read operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The request body (declared, received, or decompressed) exceeds the
    /// configured ceiling.
    #[error("message size {size} exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The request body could not be decompressed or decoded.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A sub-query could not be converted into a storage query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The storage engine refused to hand out a querier for the time range.
    #[error("failed to acquire querier: {0}")]
    QuerierAcquisition(StorageError),

    /// The storage engine failed while streaming series or samples.
    #[error("failed to iterate series: {0}")]
    StorageIteration(StorageError),

    /// The response could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The request did not complete within the query timeout.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The request was cancelled before it completed.
    #[error("query cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::PayloadTooLarge { .. } | Error::MalformedPayload(_) | Error::InvalidQuery(_) => {
                true
            }
            Error::QuerierAcquisition(e) | Error::StorageIteration(e) => e.is_client_error(),
            Error::Encoding(_) | Error::Timeout(_) | Error::Cancelled | Error::Internal(_) => false,
        }
    }
}

impl Error {
    /// Wraps a querier acquisition failure; engine-side cancellation stays
    /// a cancellation.
    pub(crate) fn acquisition(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled => Error::Cancelled,
            err => Error::QuerierAcquisition(err),
        }
    }

    /// Wraps a series or sample iteration failure; engine-side cancellation
    /// stays a cancellation.
    pub(crate) fn iteration(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled => Error::Cancelled,
            err => Error::StorageIteration(err),
        }
    }
}

/// Result type alias for remote-read operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_codec_errors_as_client_errors() {
        // given
        let too_large = Error::PayloadTooLarge {
            size: 2048,
            limit: 1024,
        };
        let malformed = Error::MalformedPayload("bad snappy".to_string());

        // when/then
        assert!(too_large.is_client_error());
        assert!(malformed.is_client_error());
    }

    #[test]
    fn should_classify_storage_errors_by_kind() {
        // given
        let rejected = Error::QuerierAcquisition(StorageError::InvalidInput(
            "range too wide".to_string(),
        ));
        let failed = Error::StorageIteration(StorageError::Storage("disk gone".to_string()));

        // when/then
        assert!(rejected.is_client_error());
        assert!(!failed.is_client_error());
    }

    #[test]
    fn should_keep_engine_cancellation_as_cancelled() {
        // given/when
        let acquisition = Error::acquisition(StorageError::Cancelled);
        let iteration = Error::iteration(StorageError::Cancelled);
        let failure = Error::acquisition(StorageError::Internal("oom".to_string()));

        // then
        assert!(matches!(acquisition, Error::Cancelled));
        assert!(matches!(iteration, Error::Cancelled));
        assert!(matches!(
            failure,
            Error::QuerierAcquisition(StorageError::Internal(_))
        ));
    }

    #[test]
    fn should_render_size_in_message() {
        // given
        let err = Error::PayloadTooLarge {
            size: 2048,
            limit: 1024,
        };

        // when
        let message = err.to_string();

        // then
        assert_eq!(message, "message size 2048 exceeds limit of 1024 bytes");
    }
}
