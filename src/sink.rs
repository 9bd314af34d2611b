//! Result sink: the display side of the pipeline.
//!
//! The coordinator pushes three kinds of notifications: detection results,
//! control state changes (which actions the UI may offer) and
//! human-readable status messages.

use crate::lifecycle::CaptureMode;
use crate::processing::DetectionResult;
use std::fmt;

/// Severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusLevel::Info => "info",
            StatusLevel::Success => "success",
            StatusLevel::Warning => "warning",
            StatusLevel::Danger => "danger",
        };
        f.write_str(label)
    }
}

/// A status line for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    /// Creates a message at `level`.
    pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Warning, text)
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Danger, text)
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

/// Which controls the UI may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub mode: CaptureMode,
    /// Raised while a transition is in progress.
    pub busy: bool,
}

impl ControlState {
    pub fn can_start_camera(&self) -> bool {
        !self.busy
    }

    pub fn can_load_image(&self) -> bool {
        !self.busy
    }

    pub fn can_stop(&self) -> bool {
        !self.busy && self.mode != CaptureMode::Idle
    }
}

/// Consumer of everything the coordinator publishes.
pub trait ResultSink {
    fn publish(&mut self, result: &DetectionResult);

    fn controls_changed(&mut self, controls: ControlState);

    fn status(&mut self, message: &StatusMessage);
}

/// Sink that writes everything to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn publish(&mut self, result: &DetectionResult) {
        tracing::info!(
            sequence = result.sequence(),
            total = result.total(),
            coins = result.coin_count(),
            "{}",
            result
        );
    }

    fn controls_changed(&mut self, controls: ControlState) {
        tracing::debug!(mode = %controls.mode, busy = controls.busy, "Controls updated");
    }

    fn status(&mut self, message: &StatusMessage) {
        match message.level {
            StatusLevel::Info | StatusLevel::Success => {
                tracing::info!(level = %message.level, "{}", message.text)
            }
            StatusLevel::Warning => tracing::warn!("{}", message.text),
            StatusLevel::Danger => tracing::error!("{}", message.text),
        }
    }
}
