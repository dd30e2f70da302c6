//! Conversion of streamed storage series into wire time series.
//!
//! Materialization is all-or-nothing: a series whose sample iterator fails is
//! dropped entirely together with the result it belonged to.

use crate::error::{Error, Result};
use crate::proto;
use crate::storage::{Series, SeriesSet};

/// Drains one series into a wire [`proto::TimeSeries`].
///
/// Samples keep the order the iterator yields them in.
pub async fn materialize_series(series: Series) -> Result<proto::TimeSeries> {
    let Series {
        labels,
        mut samples,
    } = series;

    let mut out = Vec::new();
    while let Some(sample) = samples.next().await.map_err(Error::iteration)? {
        out.push(proto::Sample::from(sample));
    }

    Ok(proto::TimeSeries {
        labels: labels.to_proto(),
        samples: out,
    })
}

/// Drains a whole series set into one query result.
///
/// Stops at the first failing series.
pub async fn materialize_series_set(
    mut series_set: Box<dyn SeriesSet>,
) -> Result<proto::QueryResult> {
    let mut timeseries = Vec::new();
    while let Some(series) = series_set.next().await.map_err(Error::iteration)? {
        timeseries.push(materialize_series(series).await?);
    }
    Ok(proto::QueryResult { timeseries })
}
