//! Observability metrics for the trigger engine.
//!
//! Metrics are exposed via the `metrics` crate facade.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tributary_flow_asset_events_total` | Counter | `origin` | Asset events recorded |
//! | `tributary_flow_markers_queued_total` | Counter | - | Fulfillment markers created |
//! | `tributary_flow_runs_triggered_total` | Counter | - | Runs created from satisfied dependencies |
//! | `tributary_flow_trigger_races_lost_total` | Counter | - | Run attempts skipped after losing the clear race |
//! | `tributary_flow_record_event_duration_seconds` | Histogram | - | End-to-end record_event latency |
//!
//! ## Integration
//!
//! To export to Prometheus:
//!
//! ```rust,ignore
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([0, 0, 0, 0], 9090))
//!     .install()
//!     .expect("failed to install Prometheus recorder");
//! ```

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Asset events recorded.
    pub const ASSET_EVENTS_TOTAL: &str = "tributary_flow_asset_events_total";
    /// Counter: Fulfillment markers created.
    pub const MARKERS_QUEUED_TOTAL: &str = "tributary_flow_markers_queued_total";
    /// Counter: Runs created from satisfied asset dependencies.
    pub const RUNS_TRIGGERED_TOTAL: &str = "tributary_flow_runs_triggered_total";
    /// Counter: Run attempts skipped after losing the clear race.
    pub const TRIGGER_RACES_LOST_TOTAL: &str = "tributary_flow_trigger_races_lost_total";
    /// Histogram: End-to-end `record_event` latency in seconds.
    pub const RECORD_EVENT_DURATION_SECONDS: &str =
        "tributary_flow_record_event_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Event origin (`api` or `task`).
    pub const ORIGIN: &str = "origin";
}

/// High-level interface for recording trigger metrics.
///
/// Cheap to clone and share across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerMetrics;

impl TriggerMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records one accepted asset event.
    pub fn record_event(&self, external: bool) {
        let origin = if external { "api" } else { "task" };
        counter!(
            names::ASSET_EVENTS_TOTAL,
            labels::ORIGIN => origin,
        )
        .increment(1);
    }

    /// Records fulfillment markers created by a commit.
    pub fn record_markers_queued(&self, count: u64) {
        if count > 0 {
            counter!(names::MARKERS_QUEUED_TOTAL).increment(count);
        }
    }

    /// Records runs created by a commit.
    pub fn record_runs_triggered(&self, count: u64) {
        if count > 0 {
            counter!(names::RUNS_TRIGGERED_TOTAL).increment(count);
        }
    }

    /// Records run attempts that lost the clear race.
    pub fn record_races_lost(&self, count: u64) {
        if count > 0 {
            counter!(names::TRIGGER_RACES_LOST_TOTAL).increment(count);
        }
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed
    /// duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

/// Creates a timing guard for `record_event` latency.
#[must_use]
pub fn time_record_event() -> TimingGuard<impl FnOnce(Duration)> {
    TimingGuard::new(|duration| {
        histogram!(names::RECORD_EVENT_DURATION_SECONDS).record(duration.as_secs_f64());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_record_without_an_installed_recorder() {
        let metrics = TriggerMetrics::new();
        metrics.record_event(true);
        metrics.record_event(false);
        metrics.record_markers_queued(2);
        metrics.record_runs_triggered(1);
        metrics.record_races_lost(1);
    }

    #[test]
    fn timing_guard_measures_duration() {
        let mut recorded = None;
        {
            let _guard = TimingGuard::new(|d| {
                recorded = Some(d);
            });
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(recorded.is_some_and(|d| d >= Duration::from_millis(10)));
    }
}
