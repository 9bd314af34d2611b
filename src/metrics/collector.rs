//! Metrics collection and registry.

use crate::lifecycle::{CaptureCoordinator, CaptureMode};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Point-in-time view of coordinator state for a metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub mode: CaptureMode,
    /// Mode changes performed.
    pub transitions: u64,
    pub frames_processed: u64,
    pub frames_failed: u64,
    /// Loop tickets ignored because their loop was cancelled.
    pub stale_ticks: u64,
    pub teardown_faults: u64,
    /// Total of the most recent detection, if any.
    pub last_total: Option<u64>,
}

impl MetricsSnapshot {
    /// Captures the coordinator's current mode and counters.
    pub fn from_coordinator(coordinator: &CaptureCoordinator) -> Self {
        let stats = coordinator.stats();
        Self {
            mode: coordinator.mode(),
            transitions: stats.transitions,
            frames_processed: stats.frames_processed,
            frames_failed: stats.frames_failed,
            stale_ticks: stats.stale_ticks,
            teardown_faults: stats.teardown_faults,
            last_total: stats.last_total,
        }
    }
}

/// Prometheus registry for lifecycle metrics.
pub struct MetricsRegistry {
    registry: Registry,
    capture_mode: IntGauge,
    transitions_total: IntCounter,
    frames_processed_total: IntCounter,
    frames_failed_total: IntCounter,
    stale_ticks_total: IntCounter,
    teardown_faults_total: IntCounter,
    last_total: IntGauge,
}

impl MetricsRegistry {
    /// Creates and registers all lifecycle metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let capture_mode = IntGauge::new(
            "coin_counter_capture_mode",
            "Active capture mode (0=idle, 1=camera, 2=still image)",
        )?;
        let transitions_total = IntCounter::new(
            "coin_counter_transitions_total",
            "Capture mode changes performed",
        )?;
        let frames_processed_total = IntCounter::new(
            "coin_counter_frames_processed_total",
            "Frames that produced a detection result",
        )?;
        let frames_failed_total = IntCounter::new(
            "coin_counter_frames_failed_total",
            "Frames skipped because reading or processing failed",
        )?;
        let stale_ticks_total = IntCounter::new(
            "coin_counter_stale_ticks_total",
            "Frame loop ticks ignored after their loop was cancelled",
        )?;
        let teardown_faults_total = IntCounter::new(
            "coin_counter_teardown_faults_total",
            "Resource releases that reported a failure",
        )?;
        let last_total = IntGauge::new(
            "coin_counter_last_total",
            "Face-value total of the most recent detection",
        )?;

        registry.register(Box::new(capture_mode.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(frames_processed_total.clone()))?;
        registry.register(Box::new(frames_failed_total.clone()))?;
        registry.register(Box::new(stale_ticks_total.clone()))?;
        registry.register(Box::new(teardown_faults_total.clone()))?;
        registry.register(Box::new(last_total.clone()))?;

        Ok(Self {
            registry,
            capture_mode,
            transitions_total,
            frames_processed_total,
            frames_failed_total,
            stale_ticks_total,
            teardown_faults_total,
            last_total,
        })
    }

    /// Updates all metrics from a snapshot. Counters only move forward.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.capture_mode.set(snapshot.mode.code());
        advance(&self.transitions_total, snapshot.transitions);
        advance(&self.frames_processed_total, snapshot.frames_processed);
        advance(&self.frames_failed_total, snapshot.frames_failed);
        advance(&self.stale_ticks_total, snapshot.stale_ticks);
        advance(&self.teardown_faults_total, snapshot.teardown_faults);
        if let Some(total) = snapshot.last_total {
            self.last_total.set(total as i64);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, observed: u64) {
    let current = counter.get();
    if observed > current {
        counter.inc_by(observed - current);
    }
}
