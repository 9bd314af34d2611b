//! Capture and file configuration.
//!
//! The `[capture]` table doubles as the constraint set handed to a media
//! source when a camera stream is requested.

use crate::processing::{CoinConfig, ProcessingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    User,
    #[default]
    Environment,
}

/// Constraints requested from a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index.
    pub device_id: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Preferred camera orientation.
    pub facing: Facing,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            fps: 30,
            facing: Facing::Environment,
        }
    }
}

impl CaptureConfig {
    /// Largest accepted frame side, in pixels.
    pub const MAX_DIMENSION: u32 = 8192;

    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.width > Self::MAX_DIMENSION || self.height > Self::MAX_DIMENSION {
            return Err(ConfigError::DimensionsTooLarge {
                width: self.width,
                height: self.height,
                limit: Self::MAX_DIMENSION,
            });
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("frame dimensions {width}x{height} exceed {limit} pixels per side")]
    DimensionsTooLarge { width: u32, height: u32, limit: u32 },
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("blur kernel must be odd and non-zero, got {0}")]
    InvalidBlurKernel(u32),
    #[error("edge thresholds must satisfy 0 <= low <= high")]
    InvalidEdgeThresholds,
    #[error("radius range must satisfy 0 < min < max")]
    InvalidRadiusRange,
    #[error("pixels_per_mm and tolerance_mm must be positive")]
    InvalidScale,
    #[error("at least one denomination is required")]
    NoDenominations,
    #[error("denomination {0:?} is defined more than once")]
    DuplicateDenomination(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub coins: CoinConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Frames to pump in camera mode before stopping (0 runs until Ctrl-C).
    pub frame_count: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_count: 100,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.processing.validate()?;
        self.coins.validate()
    }
}
