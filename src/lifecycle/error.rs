use crate::sink::StatusMessage;
use thiserror::Error;

/// Errors returned by mode transitions. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("vision runtime is not ready")]
    RuntimeNotReady,
    #[error("camera unavailable: {reason}")]
    DeviceUnavailable { reason: String },
    #[error("image could not be decoded: {reason}")]
    DecodeFailed { reason: String },
    #[error("frame processing failed: {reason}")]
    ProcessingError { reason: String },
}

impl CaptureError {
    /// The message shown to the user when this error ends a transition.
    pub fn status_message(&self) -> StatusMessage {
        let text = match self {
            CaptureError::RuntimeNotReady => {
                "The vision runtime is still loading. Try again once it is ready.".to_string()
            }
            CaptureError::DeviceUnavailable { reason } if reason == "PermissionDenied" => {
                "Camera access was denied. Allow camera access and try again.".to_string()
            }
            CaptureError::DeviceUnavailable { reason } => {
                format!("No usable camera ({reason}).")
            }
            CaptureError::DecodeFailed { reason } => {
                format!("The image could not be read: {reason}")
            }
            CaptureError::ProcessingError { reason } => {
                format!("Detection failed on this image: {reason}")
            }
        };
        StatusMessage::danger(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::StatusLevel;

    #[test]
    fn test_every_error_is_danger() {
        let errors = [
            CaptureError::RuntimeNotReady,
            CaptureError::DeviceUnavailable {
                reason: "NotFound".into(),
            },
            CaptureError::DecodeFailed {
                reason: "truncated".into(),
            },
            CaptureError::ProcessingError {
                reason: "bad frame".into(),
            },
        ];
        for error in errors {
            assert_eq!(error.status_message().level, StatusLevel::Danger);
        }
    }

    #[test]
    fn test_permission_denied_message() {
        let error = CaptureError::DeviceUnavailable {
            reason: "PermissionDenied".into(),
        };
        assert!(error.status_message().text.contains("denied"));
    }
}
