//! Single-frame detection.

use super::{CoinConfig, DetectionResult, ProcessingConfig};
use crate::capture::Frame;
use crate::runtime::{BufferId, BufferShape, ColorConversion, RuntimeError, VisionRuntime};
use thiserror::Error;

/// Errors that abort processing of one frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessingError {
    #[error("malformed frame {width}x{height} with {bytes} bytes")]
    MalformedFrame { width: u32, height: u32, bytes: usize },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Buffers allocated for one call, freed in reverse order on drop.
struct BufferScope<'a> {
    runtime: &'a mut dyn VisionRuntime,
    live: Vec<BufferId>,
}

impl<'a> BufferScope<'a> {
    fn new(runtime: &'a mut dyn VisionRuntime) -> Self {
        Self {
            runtime,
            live: Vec::with_capacity(4),
        }
    }

    fn allocate(&mut self, shape: BufferShape) -> Result<BufferId, RuntimeError> {
        let id = self.runtime.allocate_buffer(shape)?;
        self.live.push(id);
        Ok(id)
    }

    fn runtime(&mut self) -> &mut dyn VisionRuntime {
        &mut *self.runtime
    }
}

impl Drop for BufferScope<'_> {
    fn drop(&mut self) {
        while let Some(id) = self.live.pop() {
            if let Err(e) = self.runtime.free_buffer(id) {
                tracing::warn!(%id, error = %e, "Failed to free runtime buffer");
            }
        }
    }
}

/// Runs the detection pipeline over one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameProcessor {
    processing: ProcessingConfig,
    coins: CoinConfig,
}

impl FrameProcessor {
    /// Creates a processor with the given detection and coin settings.
    pub fn new(processing: ProcessingConfig, coins: CoinConfig) -> Self {
        Self { processing, coins }
    }

    /// Returns the denomination table in use.
    pub fn coins(&self) -> &CoinConfig {
        &self.coins
    }

    /// Converts, blurs, extracts edges, finds circles and classifies them.
    ///
    /// Every runtime buffer allocated here is freed before returning,
    /// whether the pipeline succeeds, fails or panics.
    pub fn process_once(
        &self,
        runtime: &mut dyn VisionRuntime,
        frame: &Frame,
    ) -> Result<DetectionResult, ProcessingError> {
        if !frame.is_valid() {
            return Err(ProcessingError::MalformedFrame {
                width: frame.width(),
                height: frame.height(),
                bytes: frame.pixels().len(),
            });
        }

        let (width, height) = (frame.width(), frame.height());
        let mut scope = BufferScope::new(runtime);

        let rgba = scope.allocate(BufferShape::rgba(width, height))?;
        scope.runtime().upload(rgba, frame.pixels())?;

        let gray = scope.allocate(BufferShape::gray(width, height))?;
        scope
            .runtime()
            .convert_color(rgba, gray, ColorConversion::RgbaToGray)?;

        let blurred = scope.allocate(BufferShape::gray(width, height))?;
        scope
            .runtime()
            .blur(gray, blurred, self.processing.blur_kernel)?;

        let edges = scope.allocate(BufferShape::gray(width, height))?;
        scope
            .runtime()
            .detect_edges(blurred, edges, self.processing.edge_thresholds())?;

        let circles = scope
            .runtime()
            .detect_circles(edges, &self.processing.circle_params())?;
        drop(scope);

        let result = DetectionResult::from_circles(&circles, &self.coins, frame.sequence());
        tracing::debug!(
            sequence = frame.sequence(),
            circles = circles.len(),
            total = result.total(),
            "Frame processed"
        );
        Ok(result)
    }
}
