//! Execution of a single sub-query against the storage engine.

use crate::error::{Error, Result};
use crate::materialize::materialize_series_set;
use crate::model::SubQuery;
use crate::proto;
use crate::storage::{QueryContext, Queryable, SelectHints};

/// Runs one sub-query and materializes every matched series.
///
/// The storage calls are raced against the context's cancellation, so a
/// cancelled request stops waiting on storage even if the engine itself
/// ignores the context.
pub async fn execute_query(
    queryable: &dyn Queryable,
    ctx: &QueryContext,
    query: &SubQuery,
) -> Result<proto::QueryResult> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        result = run_query(queryable, ctx, query) => result,
    }
}

async fn run_query(
    queryable: &dyn Queryable,
    ctx: &QueryContext,
    query: &SubQuery,
) -> Result<proto::QueryResult> {
    let querier = queryable
        .querier(ctx, query.start_ms, query.end_ms)
        .await
        .map_err(Error::acquisition)?;

    let hints = SelectHints {
        start_ms: query.start_ms,
        end_ms: query.end_ms,
    };
    let series_set = querier.select(ctx, &hints, &query.matchers).await;
    materialize_series_set(series_set).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::model::{Labels, MatchType, Matcher, Sample};
    use crate::storage::{InMemoryStorage, StorageError};
    use crate::test_utils::{Fault, ScriptedStorage};

    fn up_query(start_ms: i64, end_ms: i64) -> SubQuery {
        let matchers = vec![Matcher::new(MatchType::Equal, "__name__", "up").unwrap()];
        SubQuery::new(start_ms, end_ms, matchers).unwrap()
    }

    #[tokio::test]
    async fn should_return_matching_series_within_range() {
        // given
        let storage = InMemoryStorage::new();
        storage.append(
            Labels::from_pairs([("__name__", "up")]),
            [Sample::new(10, 1.0), Sample::new(200, 1.0)],
        );
        storage.append(
            Labels::from_pairs([("__name__", "down")]),
            [Sample::new(10, 0.0)],
        );

        // when
        let result = execute_query(&storage, &QueryContext::default(), &up_query(0, 100))
            .await
            .unwrap();

        // then
        assert_eq!(result.timeseries.len(), 1);
        assert_eq!(result.timeseries[0].samples.len(), 1);
        assert_eq!(result.timeseries[0].samples[0].timestamp_ms, 10);
    }

    #[tokio::test]
    async fn should_return_empty_result_when_nothing_matches() {
        // given
        let storage = InMemoryStorage::new();

        // when
        let result = execute_query(&storage, &QueryContext::default(), &up_query(0, 100))
            .await
            .unwrap();

        // then
        assert!(result.timeseries.is_empty());
    }

    #[tokio::test]
    async fn should_wrap_querier_acquisition_failure() {
        // given
        let storage = ScriptedStorage::new().with_fault(
            0,
            Fault::acquire_error(StorageError::InvalidInput("range too wide".to_string())),
        );

        // when
        let result = execute_query(&storage, &QueryContext::default(), &up_query(0, 100)).await;

        // then
        match result {
            Err(Error::QuerierAcquisition(StorageError::InvalidInput(msg))) => {
                assert_eq!(msg, "range too wide")
            }
            other => panic!("expected acquisition error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_discard_partial_series_on_iteration_error() {
        // given
        let storage = ScriptedStorage::new().with_fault(0, Fault::fail_after_samples(1));
        storage.append(
            Labels::from_pairs([("__name__", "up")]),
            [Sample::new(10, 1.0), Sample::new(20, 1.0)],
        );

        // when
        let result = execute_query(&storage, &QueryContext::default(), &up_query(0, 100)).await;

        // then
        assert!(matches!(result, Err(Error::StorageIteration(_))));
    }

    #[tokio::test]
    async fn should_stop_waiting_on_hung_storage_when_cancelled() {
        // given
        let storage = ScriptedStorage::new().with_fault(0, Fault::hang());
        let cancel = CancellationToken::new();
        let ctx = QueryContext::new(cancel.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        // when
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            execute_query(&storage, &ctx, &up_query(0, 100)),
        )
        .await
        .expect("execution should stop after cancellation");

        // then
        canceller.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(storage.in_flight(), 0);
    }
}
