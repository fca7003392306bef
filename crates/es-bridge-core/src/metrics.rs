//! Metrics for the ES event bridge
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Metric names as constants for consistency
pub mod names {
    pub const EVENTS_RECEIVED: &str = "es_bridge_events_received_total";
    pub const EVENTS_SKIPPED: &str = "es_bridge_events_skipped_total";
    pub const DOCS_SUBMITTED: &str = "es_bridge_docs_submitted_total";
    pub const SUBMIT_FAILURES: &str = "es_bridge_submit_failures_total";
    pub const SUBMIT_LATENCY: &str = "es_bridge_submit_latency_seconds";
}

/// Labels for metrics
pub mod labels {
    pub const COMPONENT: &str = "component";
    pub const KIND: &str = "kind";
    pub const REASON: &str = "reason";
    pub const ERROR_TYPE: &str = "error_type";
}

/// Dispatch metrics
#[derive(Clone)]
pub struct DispatchMetrics {
    component: String,
}

impl DispatchMetrics {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Record an incoming event, known kind or not
    pub fn record_received(&self, kind: &str) {
        counter!(
            names::EVENTS_RECEIVED,
            labels::COMPONENT => self.component.clone(),
            labels::KIND => kind.to_string(),
        )
        .increment(1);
    }

    /// Record an event that produced nothing to persist
    pub fn record_skipped(&self, kind: &str, reason: &str) {
        counter!(
            names::EVENTS_SKIPPED,
            labels::COMPONENT => self.component.clone(),
            labels::KIND => kind.to_string(),
            labels::REASON => reason.to_string(),
        )
        .increment(1);
    }

    /// Record a document acknowledged by the sink
    pub fn record_submitted(&self, kind: &str) {
        counter!(
            names::DOCS_SUBMITTED,
            labels::COMPONENT => self.component.clone(),
            labels::KIND => kind.to_string(),
        )
        .increment(1);
    }

    /// Record a document the sink rejected
    pub fn record_failed(&self, kind: &str, error_type: &str) {
        counter!(
            names::SUBMIT_FAILURES,
            labels::COMPONENT => self.component.clone(),
            labels::KIND => kind.to_string(),
            labels::ERROR_TYPE => error_type.to_string(),
        )
        .increment(1);
    }

    /// Record submit latency
    pub fn record_submit_latency(&self, kind: &str, duration: Duration) {
        histogram!(
            names::SUBMIT_LATENCY,
            labels::COMPONENT => self.component.clone(),
            labels::KIND => kind.to_string(),
        )
        .record(duration.as_secs_f64());
    }
}

/// Timer guard for automatic latency recording
pub struct LatencyTimer<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> LatencyTimer<F>
where
    F: FnOnce(Duration),
{
    /// Start a new timer
    pub fn start(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Stop timer and record
    pub fn stop(mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if let Some(f) = self.on_drop.take() {
            f(elapsed);
        }
        elapsed
    }
}

impl<F> Drop for LatencyTimer<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}
