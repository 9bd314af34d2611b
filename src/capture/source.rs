//! Media capture abstraction.
//!
//! A [`MediaSource`] hands out live [`MediaStream`]s. The stream owns the
//! device until [`MediaStream::stop_all_tracks`] is called; the lifecycle
//! guard is responsible for calling it exactly once.

use super::{CaptureConfig, Frame};
use thiserror::Error;

/// Errors that can occur while acquiring or reading a camera stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("permission to use the camera was denied")]
    PermissionDenied,
    #[error("camera device not found: {0}")]
    NotFound(String),
    #[error("camera could not be opened: {0}")]
    NotReadable(String),
    #[error("requested constraints cannot be satisfied: {0}")]
    Overconstrained(String),
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
    #[error("stream is stopped")]
    Stopped,
    #[error("failed to stop stream: {0}")]
    StopFailed(String),
}

impl DeviceError {
    /// Short machine-readable code for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            DeviceError::PermissionDenied => "PermissionDenied",
            DeviceError::NotFound(_) => "NotFound",
            DeviceError::NotReadable(_) => "NotReadable",
            DeviceError::Overconstrained(_) => "Overconstrained",
            DeviceError::ReadFailed(_) => "ReadFailed",
            DeviceError::Stopped => "Stopped",
            DeviceError::StopFailed(_) => "StopFailed",
        }
    }
}

/// An open camera stream.
pub trait MediaStream {
    /// Pulls the most recent frame.
    fn read_frame(&mut self) -> Result<Frame, DeviceError>;

    /// Stops every track of the stream. A stopped stream yields no frames.
    fn stop_all_tracks(&mut self) -> Result<(), DeviceError>;

    fn is_live(&self) -> bool;
}

/// Platform capability to open camera streams.
pub trait MediaSource {
    fn request_stream(
        &mut self,
        constraints: &CaptureConfig,
    ) -> Result<Box<dyn MediaStream>, DeviceError>;
}
