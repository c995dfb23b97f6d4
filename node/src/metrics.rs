//! # Prometheus Metrics
//!
//! Exposes operational metrics for the indexer. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use vault_indexer::rpc::{CallResult, ContractReader, FunctionCall};
use vault_indexer::IndexerResult;

/// Holds all Prometheus metric handles for the indexer.
#[derive(Clone)]
pub struct IndexerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Vaults successfully fetched, normalized and written.
    pub vaults_indexed_total: IntCounter,
    /// Failed requests, labelled by error kind.
    pub failures_total: IntCounterVec,
    /// Answered list queries, labelled by route.
    pub queries_total: IntCounterVec,
    /// Latency of `call_function` round trips to the RPC node.
    pub rpc_latency_seconds: Histogram,
}

impl IndexerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("vault_indexer".into()), None)?;

        let vaults_indexed_total = IntCounter::new(
            "vaults_indexed_total",
            "Total number of vault states written to the store",
        )?;
        registry.register(Box::new(vaults_indexed_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("failures_total", "Total number of failed requests by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let queries_total = IntCounterVec::new(
            Opts::new("queries_total", "Total number of list queries answered"),
            &["route"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let rpc_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rpc_latency_seconds",
                "Round-trip latency of view calls to the RPC node in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(rpc_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            vaults_indexed_total,
            failures_total,
            queries_total,
            rpc_latency_seconds,
        })
    }

    /// Count a failed request under its error kind.
    pub fn record_failure(&self, kind: &str) {
        self.failures_total.with_label_values(&[kind]).inc();
    }

    /// Count an answered list query.
    pub fn record_query(&self, route: &str) {
        self.queries_total.with_label_values(&[route]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<IndexerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Instrumented Reader
// ---------------------------------------------------------------------------

/// [`ContractReader`] wrapper that observes every call's latency.
pub struct InstrumentedReader<R> {
    inner: R,
    latency: Histogram,
}

impl<R> InstrumentedReader<R> {
    pub fn new(inner: R, metrics: &IndexerMetrics) -> Self {
        Self {
            inner,
            latency: metrics.rpc_latency_seconds.clone(),
        }
    }
}

#[async_trait]
impl<R: ContractReader> ContractReader for InstrumentedReader<R> {
    async fn call_function(&self, endpoint: &str, call: &FunctionCall) -> IndexerResult<CallResult> {
        let _timer = self.latency.start_timer();
        self.inner.call_function(endpoint, call).await
    }
}
