//! Metrics collection for observability
//!
//! Prometheus counters for the stage workflow. Each [`Metrics`] owns its
//! registry, so several workflows (and tests) can coexist in one process.
//!
//! # Metrics
//!
//! - `batches_created_total` - Batches registered for the first time
//! - `batches_restocked_total` - Registrations that restocked an existing batch
//! - `stage_transitions_total{stage}` - Stage changes by destination
//! - `ledger_events_total` - Ledger entries appended
//! - `workflow_rejections_total{reason}` - Operations refused with an error

use crate::types::Stage;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Batches created
    pub batches_created: IntCounter,

    /// Batches restocked
    pub batches_restocked: IntCounter,

    /// Stage transitions by destination stage
    pub stage_transitions: IntCounterVec,

    /// Ledger entries appended
    pub events_total: IntCounter,

    /// Rejected operations by error kind
    pub rejections: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let batches_created =
            IntCounter::new("batches_created_total", "Batches registered for the first time")?;
        registry.register(Box::new(batches_created.clone()))?;

        let batches_restocked = IntCounter::new(
            "batches_restocked_total",
            "Registrations that restocked an existing batch",
        )?;
        registry.register(Box::new(batches_restocked.clone()))?;

        let stage_transitions = IntCounterVec::new(
            Opts::new("stage_transitions_total", "Stage changes by destination stage"),
            &["stage"],
        )?;
        registry.register(Box::new(stage_transitions.clone()))?;

        let events_total = IntCounter::new("ledger_events_total", "Ledger entries appended")?;
        registry.register(Box::new(events_total.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new("workflow_rejections_total", "Operations refused with an error"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            batches_created,
            batches_restocked,
            stage_transitions,
            events_total,
            rejections,
            registry,
        })
    }

    /// Record a first-time registration
    pub fn record_created(&self) {
        self.batches_created.inc();
        self.events_total.inc();
    }

    /// Record a restock
    pub fn record_restocked(&self) {
        self.batches_restocked.inc();
        self.events_total.inc();
    }

    /// Record a stage change
    pub fn record_transition(&self, stage: Stage) {
        self.stage_transitions
            .with_label_values(&[stage.as_str()])
            .inc();
        self.events_total.inc();
    }

    /// Record a standalone ledger append
    pub fn record_event_append(&self) {
        self.events_total.inc();
    }

    /// Record a refused operation
    pub fn record_rejection(&self, reason: &str) {
        self.rejections.with_label_values(&[reason]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("batches_created", &self.batches_created.get())
            .field("batches_restocked", &self.batches_restocked.get())
            .field("events_total", &self.events_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.batches_created.get(), 0);
        assert_eq!(metrics.events_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_created();

        assert_eq!(first.batches_created.get(), 1);
        assert_eq!(second.batches_created.get(), 0);
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition(Stage::Pharmacy);
        metrics.record_transition(Stage::Pharmacy);

        assert_eq!(
            metrics
                .stage_transitions
                .with_label_values(&["Pharmacy"])
                .get(),
            2
        );
        assert_eq!(metrics.events_total.get(), 2);
    }

    #[test]
    fn test_render() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection("not_found");

        let output = metrics.render().unwrap();
        assert!(output.contains("workflow_rejections_total"));
        assert!(output.contains("not_found"));
    }
}
