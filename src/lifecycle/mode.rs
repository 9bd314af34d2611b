use std::fmt;

/// The mutually exclusive operating state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureMode {
    #[default]
    Idle,
    Camera,
    StillImage,
}

impl CaptureMode {
    /// Numeric code used by the metrics gauge.
    pub fn code(self) -> i64 {
        match self {
            CaptureMode::Idle => 0,
            CaptureMode::Camera => 1,
            CaptureMode::StillImage => 2,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CaptureMode::Idle => "idle",
            CaptureMode::Camera => "camera",
            CaptureMode::StillImage => "still-image",
        };
        f.write_str(label)
    }
}
