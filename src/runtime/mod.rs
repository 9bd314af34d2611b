//! Vision runtime handle.
//!
//! The lifecycle core only talks to the vision library through the
//! [`VisionRuntime`] trait: native buffers are allocated and freed
//! explicitly, and every pipeline stage reads from one buffer and writes
//! into another. How the runtime itself is loaded is not visible here;
//! the [`loader`] produces a single readiness signal.

pub mod loader;
mod software;

pub use loader::{bring_up, bring_up_reporting};
pub use software::SoftwareRuntime;

use std::fmt;
use thiserror::Error;

/// Identifier of a buffer owned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Dimensions and channel count of a runtime buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferShape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl BufferShape {
    /// Four-channel 8-bit shape.
    pub fn rgba(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: 4,
        }
    }

    /// Single-channel 8-bit shape.
    pub fn gray(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: 1,
        }
    }

    /// Number of bytes a buffer of this shape holds.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0
    }
}

/// Colour conversions supported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColorConversion {
    RgbaToGray,
}

/// Hysteresis thresholds for edge extraction, applied to the Sobel
/// gradient magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeThresholds {
    pub low: f32,
    pub high: f32,
}

/// Acceptance window for circle candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleParams {
    pub min_radius: f32,
    pub max_radius: f32,
    /// Components with fewer edge pixels are treated as noise.
    pub min_edge_pixels: usize,
    /// Maximum relative difference between bounding-box width and height.
    pub squareness_tolerance: f32,
}

/// A detected circle, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Lifecycle state of a runtime instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Loaded but not yet verified.
    Initializing,
    /// Self-test passed; captures may start.
    Ready,
    /// The runtime gave up; no further work is possible.
    Aborted(String),
}

/// Errors reported by the vision runtime.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("vision runtime aborted: {0}")]
    Aborted(String),
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),
    #[error("invalid buffer shape {width}x{height}x{channels}")]
    InvalidShape { width: u32, height: u32, channels: u8 },
    #[error("pixel data is {actual} bytes, buffer expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("blur kernel must be odd and non-zero, got {0}")]
    InvalidKernel(u32),
    #[error("runtime internal error: {0}")]
    Internal(String),
}

/// Capability surface of the vision library.
///
/// Buffers returned by [`allocate_buffer`](Self::allocate_buffer) live
/// outside the Rust heap's ownership model and stay allocated until
/// [`free_buffer`](Self::free_buffer) is called for them.
pub trait VisionRuntime {
    /// Returns true once the runtime has produced its readiness signal.
    fn is_ready(&self) -> bool;

    fn allocate_buffer(&mut self, shape: BufferShape) -> Result<BufferId, RuntimeError>;

    fn free_buffer(&mut self, id: BufferId) -> Result<(), RuntimeError>;

    /// Copies pixel data into a buffer. The length must match its shape.
    fn upload(&mut self, id: BufferId, pixels: &[u8]) -> Result<(), RuntimeError>;

    fn convert_color(
        &mut self,
        src: BufferId,
        dst: BufferId,
        conversion: ColorConversion,
    ) -> Result<(), RuntimeError>;

    /// Box blur with an odd `kernel` size.
    fn blur(&mut self, src: BufferId, dst: BufferId, kernel: u32) -> Result<(), RuntimeError>;

    fn detect_edges(
        &mut self,
        src: BufferId,
        dst: BufferId,
        thresholds: EdgeThresholds,
    ) -> Result<(), RuntimeError>;

    fn detect_circles(
        &mut self,
        edges: BufferId,
        params: &CircleParams,
    ) -> Result<Vec<Circle>, RuntimeError>;
}
