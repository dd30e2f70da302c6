//! In-memory [`Queryable`] implementation.
//!
//! Keeps every series in a sorted map behind a copy-on-write snapshot. Each
//! querier captures the snapshot current at acquisition time, so writes never
//! affect a query already in flight. Matching is a linear scan; this is meant
//! for tests and development, not as a storage engine.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{
    QueryContext, Querier, Queryable, SelectHints, Series, SeriesSet, StorageError, StorageResult,
    VecSampleIterator, VecSeriesSet,
};
use crate::model::{Labels, Matcher, Sample};

type SeriesMap = BTreeMap<Labels, Vec<Sample>>;

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    series: RwLock<Arc<SeriesMap>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends samples to a series, creating it if needed.
    ///
    /// Samples are kept in timestamp order; a sample at an existing
    /// timestamp replaces the stored value.
    pub fn append(&self, labels: Labels, samples: impl IntoIterator<Item = Sample>) {
        let mut guard = self.series.write().unwrap_or_else(|e| e.into_inner());
        let map = Arc::make_mut(&mut guard);
        let stored = map.entry(labels).or_default();
        for sample in samples {
            match stored.binary_search_by_key(&sample.timestamp_ms, |s| s.timestamp_ms) {
                Ok(i) => stored[i] = sample,
                Err(i) => stored.insert(i, sample),
            }
        }
    }

    /// Number of distinct series stored.
    pub fn series_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Arc<SeriesMap> {
        self.series
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Queryable for InMemoryStorage {
    async fn querier(
        &self,
        ctx: &QueryContext,
        start_ms: i64,
        end_ms: i64,
    ) -> StorageResult<Box<dyn Querier>> {
        if ctx.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        if start_ms > end_ms {
            return Err(StorageError::InvalidInput(format!(
                "invalid time range [{}, {}]",
                start_ms, end_ms
            )));
        }
        Ok(Box::new(InMemoryQuerier {
            snapshot: self.snapshot(),
            start_ms,
            end_ms,
        }))
    }
}

struct InMemoryQuerier {
    snapshot: Arc<SeriesMap>,
    start_ms: i64,
    end_ms: i64,
}

#[async_trait]
impl Querier for InMemoryQuerier {
    async fn select(
        &self,
        ctx: &QueryContext,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> Box<dyn SeriesSet> {
        if ctx.is_cancelled() {
            return Box::new(VecSeriesSet::failed(StorageError::Cancelled));
        }

        let start = self.start_ms.max(hints.start_ms);
        let end = self.end_ms.min(hints.end_ms);

        let series = self
            .snapshot
            .iter()
            .filter(|(labels, _)| matchers.iter().all(|m| m.matches_labels(labels)))
            .filter_map(|(labels, samples)| {
                let in_range: Vec<Sample> = samples
                    .iter()
                    .filter(|s| start <= s.timestamp_ms && s.timestamp_ms <= end)
                    .copied()
                    .collect();
                // series without samples in range are not part of the result
                if in_range.is_empty() {
                    None
                } else {
                    Some(Series::new(
                        labels.clone(),
                        VecSampleIterator::new(in_range),
                    ))
                }
            })
            .collect();

        Box::new(VecSeriesSet::new(series))
    }
}
