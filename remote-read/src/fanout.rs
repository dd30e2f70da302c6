//! Concurrent fan-out of read requests and response assembly.
//!
//! [`FanOut`] runs every sub-query of a [`ReadRequest`] on its own tokio task
//! and collects the results into a response whose slots line up with the
//! request's queries, whatever order the tasks finish in.
//!
//! # Synchronization
//!
//! Each task sends exactly one `(index, result)` message on a channel with
//! room for every task, so sends never block. The coordinator drains exactly
//! one message per launched task before it assembles anything; it owns the
//! slot array and is the only writer. A task that dies without reporting
//! closes its sender, which turns into an error instead of a hung drain.
//!
//! # Limits
//!
//! A per-request semaphore caps how many sub-queries touch storage at once,
//! independent of how many queries the client packs into one request. The
//! whole fan-out is bounded by the query timeout, after which outstanding
//! work is cancelled and the coordinator returns without waiting for it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::executor::execute_query;
use crate::model::SubQuery;
use crate::proto::{QueryResult, ReadRequest, ReadResponse};
use crate::storage::{QueryContext, Queryable};

/// Default number of sub-queries of one request allowed to run at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Default bound on the total time spent answering one request.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// What to do with completed sub-queries when a sibling fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailureMode {
    /// Any failing sub-query fails the whole request.
    #[default]
    AllOrNothing,
    /// Failed sub-queries yield empty results; the request fails only when
    /// every sub-query failed.
    BestEffort,
}

/// Tuning knobs for [`FanOut`].
#[derive(Debug, Clone)]
pub struct FanOutOptions {
    /// Maximum sub-queries of one request running at once. Zero is treated
    /// as one.
    pub max_concurrency: usize,
    /// Upper bound for a whole request; `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    pub partial_failure_mode: PartialFailureMode,
}

impl Default for FanOutOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            query_timeout: Some(DEFAULT_QUERY_TIMEOUT),
            partial_failure_mode: PartialFailureMode::default(),
        }
    }
}

/// The outcome of a successful read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub response: ReadResponse,
    /// Sub-queries whose slot was left empty because they failed. Always zero
    /// in [`PartialFailureMode::AllOrNothing`].
    pub failed_queries: usize,
}

/// Fans read requests out to a storage engine.
pub struct FanOut {
    queryable: Arc<dyn Queryable>,
    options: FanOutOptions,
}

impl FanOut {
    pub fn new(queryable: Arc<dyn Queryable>, options: FanOutOptions) -> Self {
        Self { queryable, options }
    }

    pub fn options(&self) -> &FanOutOptions {
        &self.options
    }

    /// Answers a read request.
    ///
    /// Every query is validated before any storage work starts. Storage work
    /// is cancelled when `cancel` fires, when the timeout expires, or when
    /// the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` if a query cannot be converted.
    /// - `Timeout` if the query timeout expires.
    /// - The error of the lowest-indexed failing sub-query, according to the
    ///   configured [`PartialFailureMode`].
    pub async fn read(
        &self,
        request: ReadRequest,
        cancel: CancellationToken,
    ) -> Result<ReadOutcome> {
        let queries = request
            .queries
            .into_iter()
            .map(SubQuery::try_from)
            .collect::<Result<Vec<_>>>()?;

        // a child token so finishing this request never cancels the caller's token
        let cancel = cancel.child_token();
        let _guard = cancel.clone().drop_guard();

        match self.options.query_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.fan_out(queries, &cancel)).await {
                    Ok(result) => result,
                    Err(_) => {
                        cancel.cancel();
                        tracing::warn!("Remote read timed out after {:?}", timeout);
                        Err(Error::Timeout(timeout))
                    }
                }
            }
            None => self.fan_out(queries, &cancel).await,
        }
    }

    async fn fan_out(
        &self,
        queries: Vec<SubQuery>,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        let total = queries.len();
        if total == 0 {
            return Ok(ReadOutcome {
                response: ReadResponse::default(),
                failed_queries: 0,
            });
        }

        let (tx, mut rx) = mpsc::channel::<(usize, Result<QueryResult>)>(total);
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));

        for (index, query) in queries.into_iter().enumerate() {
            let tx = tx.clone();
            let queryable = self.queryable.clone();
            let permits = permits.clone();
            let ctx = QueryContext::new(cancel.clone());
            tokio::spawn(async move {
                let result = run_worker(queryable.as_ref(), &permits, &ctx, &query).await;
                // the receiver is gone only after a timeout; nothing left to report to
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<QueryResult>> = (0..total).map(|_| None).collect();
        let mut failures: Vec<(usize, Error)> = Vec::new();
        for _ in 0..total {
            let Some((index, result)) = rx.recv().await else {
                return Err(Error::Internal(format!(
                    "sub-query worker exited without reporting ({} of {} reported)",
                    slots.iter().filter(|s| s.is_some()).count() + failures.len(),
                    total
                )));
            };
            match result {
                Ok(result) => slots[index] = Some(result),
                Err(err) => {
                    tracing::warn!("Remote read sub-query {} failed: {}", index, err);
                    failures.push((index, err));
                }
            }
        }

        // a cancelled request never succeeds, whatever the failure mode
        let cancelled = failures
            .iter()
            .any(|(_, err)| matches!(err, Error::Cancelled));
        if cancel.is_cancelled() || cancelled {
            return Err(Error::Cancelled);
        }

        self.assemble(slots, failures)
    }

    fn assemble(
        &self,
        slots: Vec<Option<QueryResult>>,
        mut failures: Vec<(usize, Error)>,
    ) -> Result<ReadOutcome> {
        let total = slots.len();
        failures.sort_by_key(|(index, _)| *index);
        let failed_queries = failures.len();

        let fail = match self.options.partial_failure_mode {
            PartialFailureMode::AllOrNothing => failed_queries > 0,
            PartialFailureMode::BestEffort => failed_queries == total,
        };
        if fail {
            if let Some((_, err)) = failures.into_iter().next() {
                return Err(err);
            }
        }

        let results = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_default())
            .collect();
        Ok(ReadOutcome {
            response: ReadResponse { results },
            failed_queries,
        })
    }
}

async fn run_worker(
    queryable: &dyn Queryable,
    permits: &Semaphore,
    ctx: &QueryContext,
    query: &SubQuery,
) -> Result<QueryResult> {
    let _permit = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(Error::Cancelled),
        permit = permits.acquire() => {
            permit.map_err(|_| Error::Internal("sub-query permits closed".to_string()))?
        }
    };
    execute_query(queryable, ctx, query).await
}
