//! Storage engine boundary consumed by the query path.
//!
//! The engine hands out a [`Querier`] scoped to a time range; the querier
//! selects series by matchers and returns them lazily as a [`SeriesSet`]. Each
//! [`Series`] streams its samples through a [`SampleIterator`]. Iteration
//! errors are reported through `next()`, which yields `Err` once and is not
//! polled again afterwards.

pub mod config;
pub mod factory;
pub mod in_memory;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::{Labels, Matcher, Sample};

pub use in_memory::InMemoryStorage;

/// Errors returned by a storage engine.
///
/// The variant tells the caller whether the failure is correctable by the
/// client (`InvalidInput`), is a server-side fault, or is no failure at all
/// because the request was cancelled (`Cancelled`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
    /// The request was cancelled while the engine was working on it.
    #[error("query cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, StorageError::InvalidInput(_))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Request-scoped context passed into every storage call.
///
/// Storage implementations should stop work once the context is cancelled.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
}

impl QueryContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the request is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Time bounds of a select call, in milliseconds (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectHints {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A storage engine that can be queried over a time range.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// Returns a querier scoped to `[start_ms, end_ms]`.
    async fn querier(
        &self,
        ctx: &QueryContext,
        start_ms: i64,
        end_ms: i64,
    ) -> StorageResult<Box<dyn Querier>>;
}

/// A time-bounded view of the storage engine.
#[async_trait]
pub trait Querier: Send + Sync {
    /// Selects all series matching every matcher.
    ///
    /// Failures surface while iterating the returned set.
    async fn select(
        &self,
        ctx: &QueryContext,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> Box<dyn SeriesSet>;
}

/// A finite, forward-only sequence of series.
#[async_trait]
pub trait SeriesSet: Send {
    async fn next(&mut self) -> StorageResult<Option<Series>>;
}

/// A finite, forward-only sequence of samples in timestamp order.
#[async_trait]
pub trait SampleIterator: Send {
    async fn next(&mut self) -> StorageResult<Option<Sample>>;
}

/// One series yielded by a [`SeriesSet`].
pub struct Series {
    pub labels: Labels,
    pub samples: Box<dyn SampleIterator>,
}

impl Series {
    pub fn new(labels: Labels, samples: impl SampleIterator + 'static) -> Self {
        Self {
            labels,
            samples: Box::new(samples),
        }
    }
}

impl std::fmt::Debug for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Series")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// A sample iterator over an owned vector.
#[derive(Debug, Default)]
pub struct VecSampleIterator {
    samples: std::vec::IntoIter<Sample>,
}

impl VecSampleIterator {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into_iter(),
        }
    }
}

#[async_trait]
impl SampleIterator for VecSampleIterator {
    async fn next(&mut self) -> StorageResult<Option<Sample>> {
        Ok(self.samples.next())
    }
}

/// A series set over owned series, optionally ending with an error.
#[derive(Debug, Default)]
pub struct VecSeriesSet {
    series: std::vec::IntoIter<Series>,
    terminal_error: Option<StorageError>,
}

impl VecSeriesSet {
    pub fn new(series: Vec<Series>) -> Self {
        Self {
            series: series.into_iter(),
            terminal_error: None,
        }
    }

    /// A series set that fails immediately.
    pub fn failed(err: StorageError) -> Self {
        Self {
            series: Vec::new().into_iter(),
            terminal_error: Some(err),
        }
    }

    /// Reports `err` after the last series has been yielded.
    pub fn with_terminal_error(mut self, err: StorageError) -> Self {
        self.terminal_error = Some(err);
        self
    }
}

#[async_trait]
impl SeriesSet for VecSeriesSet {
    async fn next(&mut self) -> StorageResult<Option<Series>> {
        match self.series.next() {
            Some(series) => Ok(Some(series)),
            None => match self.terminal_error.take() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }
}
