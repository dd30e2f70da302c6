//! Prometheus metrics for the remote-read server.

use axum::http::Method;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: u16,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            Method::PUT => HttpMethod::Put,
            Method::DELETE => HttpMethod::Delete,
            Method::PATCH => HttpMethod::Patch,
            Method::HEAD => HttpMethod::Head,
            Method::OPTIONS => HttpMethod::Options,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for HTTP request latency histogram (without status, since status is unknown at start).
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

/// How a remote-read request ended.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ReadStatus {
    Success,
    ClientError,
    ServerError,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReadLabels {
    pub outcome: ReadStatus,
}

/// Container for all Prometheus metrics.
///
/// Counters are registered without the `_total` suffix; the encoder adds it.
pub struct Metrics {
    registry: Registry,

    /// Counter of remote-read requests by outcome.
    pub remote_read_requests_total: Family<ReadLabels, Counter>,

    /// Counter of sub-queries dispatched to storage.
    pub remote_read_queries_total: Counter,

    /// Counter of sub-queries whose result was dropped because they failed.
    pub remote_read_failed_queries_total: Counter,

    /// Counter of series returned.
    pub remote_read_series_total: Counter,

    /// Counter of samples returned.
    pub remote_read_samples_total: Counter,

    /// Counter of HTTP requests.
    pub http_requests_total: Family<HttpLabelsWithStatus, Counter>,

    /// Histogram of HTTP request latency in seconds.
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,

    /// Gauge of currently in-flight requests.
    pub http_requests_in_flight: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let remote_read_requests_total = Family::<ReadLabels, Counter>::default();
        registry.register(
            "remote_read_requests",
            "Total number of remote read requests by outcome",
            remote_read_requests_total.clone(),
        );

        let remote_read_queries_total = Counter::default();
        registry.register(
            "remote_read_queries",
            "Total number of remote read sub-queries executed",
            remote_read_queries_total.clone(),
        );

        let remote_read_failed_queries_total = Counter::default();
        registry.register(
            "remote_read_failed_queries",
            "Total number of remote read sub-queries answered with an empty result after failing",
            remote_read_failed_queries_total.clone(),
        );

        let remote_read_series_total = Counter::default();
        registry.register(
            "remote_read_series",
            "Total number of series returned by remote read",
            remote_read_series_total.clone(),
        );

        let remote_read_samples_total = Counter::default();
        registry.register(
            "remote_read_samples",
            "Total number of samples returned by remote read",
            remote_read_samples_total.clone(),
        );

        // HTTP requests total counter
        let http_requests_total = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        // HTTP request duration histogram (buckets from 1ms to ~8s)
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            registry,
            remote_read_requests_total,
            remote_read_queries_total,
            remote_read_failed_queries_total,
            remote_read_series_total,
            remote_read_samples_total,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
        }
    }

    /// Records the outcome of one remote-read request.
    pub fn record_read(&self, outcome: ReadStatus) {
        self.remote_read_requests_total
            .get_or_create(&ReadLabels { outcome })
            .inc();
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}
