//! Prometheus metrics for the capture lifecycle.
//!
//! # Metrics Exposed
//!
//! - `coin_counter_capture_mode` - Active mode (0=idle, 1=camera, 2=still image)
//! - `coin_counter_transitions_total` - Mode changes performed
//! - `coin_counter_frames_processed_total` - Frames that produced a result
//! - `coin_counter_frames_failed_total` - Frames skipped after a failure
//! - `coin_counter_stale_ticks_total` - Loop ticks dropped after cancellation
//! - `coin_counter_teardown_faults_total` - Releases that reported a failure
//! - `coin_counter_last_total` - Face-value total of the latest detection
//!
//! The HTTP exporter (`/metrics`, `/status`, `/health`) needs the
//! `metrics` feature.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError, SharedMetrics};
