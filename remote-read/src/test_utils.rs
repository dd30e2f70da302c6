//! Fault-injecting storage used by unit tests.
//!
//! [`ScriptedStorage`] wraps an [`InMemoryStorage`] and applies a [`Fault`]
//! to every querier whose range starts at a given timestamp, which lets a test
//! target individual sub-queries of one request.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::model::{Labels, Matcher, Sample};
use crate::storage::{
    InMemoryStorage, QueryContext, Querier, Queryable, SampleIterator, SelectHints, Series,
    SeriesSet, StorageError, StorageResult,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct Fault {
    /// Sleep this long inside querier acquisition.
    pub delay: Option<Duration>,
    /// Fail querier acquisition with this error.
    pub acquire_error: Option<StorageError>,
    /// Fail each sample iterator after yielding this many samples.
    pub fail_after_samples: Option<usize>,
    /// Never complete querier acquisition, ignoring cancellation.
    pub hang: bool,
    /// Panic inside querier acquisition.
    pub panic: bool,
}

impl Fault {
    pub fn delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn acquire_error(err: StorageError) -> Self {
        Self {
            acquire_error: Some(err),
            ..Default::default()
        }
    }

    pub fn fail_after_samples(n: usize) -> Self {
        Self {
            fail_after_samples: Some(n),
            ..Default::default()
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn panic() -> Self {
        Self {
            panic: true,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    acquired: AtomicUsize,
}

/// Decrements the in-flight counter when a storage call finishes or is dropped.
struct InFlightGuard(Arc<Counters>);

impl InFlightGuard {
    fn enter(counters: &Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedStorage {
    inner: InMemoryStorage,
    faults: HashMap<i64, Fault>,
    counters: Arc<Counters>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `fault` to queriers whose range starts at `start_ms`.
    pub fn with_fault(mut self, start_ms: i64, fault: Fault) -> Self {
        self.faults.insert(start_ms, fault);
        self
    }

    pub fn append(&self, labels: Labels, samples: impl IntoIterator<Item = Sample>) {
        self.inner.append(labels, samples);
    }

    /// Storage calls currently running.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of storage calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of querier acquisitions attempted.
    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Queryable for ScriptedStorage {
    async fn querier(
        &self,
        ctx: &QueryContext,
        start_ms: i64,
        end_ms: i64,
    ) -> StorageResult<Box<dyn Querier>> {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard::enter(&self.counters);
        let fault = self.faults.get(&start_ms).cloned().unwrap_or_default();

        if let Some(delay) = fault.delay {
            tokio::time::sleep(delay).await;
        }
        if fault.panic {
            panic!("scripted storage panic for query starting at {}", start_ms);
        }
        if fault.hang {
            std::future::pending::<()>().await;
        }
        if let Some(err) = fault.acquire_error {
            return Err(err);
        }

        let inner = self.inner.querier(ctx, start_ms, end_ms).await?;
        Ok(Box::new(ScriptedQuerier {
            inner,
            fail_after_samples: fault.fail_after_samples,
        }))
    }
}

struct ScriptedQuerier {
    inner: Box<dyn Querier>,
    fail_after_samples: Option<usize>,
}

#[async_trait]
impl Querier for ScriptedQuerier {
    async fn select(
        &self,
        ctx: &QueryContext,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> Box<dyn SeriesSet> {
        let inner = self.inner.select(ctx, hints, matchers).await;
        match self.fail_after_samples {
            Some(limit) => Box::new(FailingSeriesSet { inner, limit }),
            None => inner,
        }
    }
}

struct FailingSeriesSet {
    inner: Box<dyn SeriesSet>,
    limit: usize,
}

#[async_trait]
impl SeriesSet for FailingSeriesSet {
    async fn next(&mut self) -> StorageResult<Option<Series>> {
        let limit = self.limit;
        Ok(self.inner.next().await?.map(|series| Series {
            labels: series.labels,
            samples: Box::new(FailingSampleIterator {
                inner: series.samples,
                remaining: limit,
            }),
        }))
    }
}

struct FailingSampleIterator {
    inner: Box<dyn SampleIterator>,
    remaining: usize,
}

#[async_trait]
impl SampleIterator for FailingSampleIterator {
    async fn next(&mut self) -> StorageResult<Option<Sample>> {
        if self.remaining == 0 {
            return Err(StorageError::Storage(
                "scripted sample iterator failure".to_string(),
            ));
        }
        self.remaining -= 1;
        self.inner.next().await
    }
}
