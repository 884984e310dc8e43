//! Per-query observability records and the injectable sink.
//!
//! Every pipeline stage also emits structured `tracing` events; the
//! sink is for callers that want the records programmatically
//! (metrics exporters, test assertions). Default sink is a no-op.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Strategy;
use crate::model::Source;

/// Structured record for one query through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTelemetry {
    pub query_id: String,
    pub query: String,
    /// Configured strategy for this query.
    pub strategy: Strategy,
    /// What actually ran: the strategy name, or `fallback` when the
    /// router's rules-based path produced the plan.
    pub strategy_actual: String,
    pub per_source_latency_ms: BTreeMap<Source, u64>,
    pub per_source_counts: BTreeMap<Source, usize>,
    pub fused_count: usize,
    pub reranked: bool,
    pub cache_hit: bool,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl QueryTelemetry {
    /// Fresh record for a query about to run.
    #[must_use]
    pub fn begin(query: &str, strategy: Strategy) -> Self {
        Self {
            query_id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            strategy,
            strategy_actual: strategy.to_string(),
            per_source_latency_ms: BTreeMap::new(),
            per_source_counts: BTreeMap::new(),
            fused_count: 0,
            reranked: false,
            cache_hit: false,
            elapsed_ms: 0,
            started_at: Utc::now(),
        }
    }

    /// Record a finished store call. Latency keeps the per-source
    /// maximum (calls within a batch run in parallel); counts
    /// accumulate.
    pub fn record_source(&mut self, source: Source, latency_ms: u64, count: usize) {
        let latency = self.per_source_latency_ms.entry(source).or_insert(0);
        *latency = (*latency).max(latency_ms);
        *self.per_source_counts.entry(source).or_insert(0) += count;
    }
}

/// Injectable telemetry sink. Implementations must not block.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, telemetry: &QueryTelemetry);
}

/// Default sink: drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _telemetry: &QueryTelemetry) {}
}

/// Buffering sink for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<QueryTelemetry>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the inner lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueryTelemetry> {
        self.records.lock().expect("telemetry lock poisoned").clone()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, telemetry: &QueryTelemetry) {
        self.records
            .lock()
            .expect("telemetry lock poisoned")
            .push(telemetry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_source_keeps_max_latency() {
        let mut t = QueryTelemetry::begin("물약", Strategy::Hop);
        t.record_source(Source::Keyword, 12, 3);
        t.record_source(Source::Keyword, 8, 2);
        assert_eq!(t.per_source_latency_ms[&Source::Keyword], 12);
        assert_eq!(t.per_source_counts[&Source::Keyword], 5);
    }

    #[test]
    fn test_memory_sink_buffers() {
        let sink = MemorySink::new();
        sink.record(&QueryTelemetry::begin("q", Strategy::Threshold));
        sink.record(&QueryTelemetry::begin("q2", Strategy::Threshold));
        assert_eq!(sink.snapshot().len(), 2);
    }

    #[test]
    fn test_telemetry_serializes_source_keys() {
        let mut t = QueryTelemetry::begin("q", Strategy::Hop);
        t.record_source(Source::Graph, 4, 1);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"graph\""));
    }
}
