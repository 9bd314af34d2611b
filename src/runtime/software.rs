//! Pure-Rust implementation of the vision runtime.

use super::{
    BufferId, BufferShape, Circle, CircleParams, ColorConversion, EdgeThresholds, RuntimeError,
    RuntimeStatus, VisionRuntime,
};
use std::collections::HashMap;

struct Buffer {
    shape: BufferShape,
    data: Vec<u8>,
}

/// Vision runtime backed by a table of heap buffers.
///
/// Keeps allocation counters so callers can assert that every buffer
/// handed out was returned.
pub struct SoftwareRuntime {
    status: RuntimeStatus,
    buffers: HashMap<BufferId, Buffer>,
    next_id: u64,
    total_allocations: u64,
    total_frees: u64,
}

impl SoftwareRuntime {
    /// Creates a runtime in the `Initializing` state.
    pub fn new() -> Self {
        Self {
            status: RuntimeStatus::Initializing,
            buffers: HashMap::new(),
            next_id: 1,
            total_allocations: 0,
            total_frees: 0,
        }
    }

    /// Returns the current lifecycle status.
    pub fn status(&self) -> &RuntimeStatus {
        &self.status
    }

    /// Marks the runtime ready. Only the first call has any effect, and an
    /// aborted runtime never becomes ready.
    pub fn mark_ready(&mut self) -> bool {
        match self.status {
            RuntimeStatus::Initializing => {
                self.status = RuntimeStatus::Ready;
                tracing::info!("Vision runtime ready");
                true
            }
            RuntimeStatus::Ready => {
                tracing::debug!("Vision runtime already ready");
                false
            }
            RuntimeStatus::Aborted(_) => false,
        }
    }

    /// Puts the runtime into the terminal `Aborted` state.
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(%reason, "Vision runtime aborted");
        self.status = RuntimeStatus::Aborted(reason);
    }

    /// Buffers currently allocated and not yet freed.
    pub fn outstanding_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the number of buffers ever allocated.
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    /// Returns the number of buffers freed.
    pub fn total_frees(&self) -> u64 {
        self.total_frees
    }

    fn check_alive(&self) -> Result<(), RuntimeError> {
        match &self.status {
            RuntimeStatus::Aborted(reason) => Err(RuntimeError::Aborted(reason.clone())),
            _ => Ok(()),
        }
    }

    fn buffer(&self, id: BufferId) -> Result<&Buffer, RuntimeError> {
        self.buffers.get(&id).ok_or(RuntimeError::UnknownBuffer(id))
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer, RuntimeError> {
        self.buffers
            .get_mut(&id)
            .ok_or(RuntimeError::UnknownBuffer(id))
    }

    /// Reads a single-channel source and checks that `dst` has the same
    /// single-channel shape.
    fn gray_pair(&self, src: BufferId, dst: BufferId) -> Result<(&Buffer, BufferShape), RuntimeError> {
        let source = self.buffer(src)?;
        let target = self.buffer(dst)?.shape;
        if source.shape.channels != 1 {
            return Err(RuntimeError::UnsupportedFormat(format!(
                "expected 1 channel, got {}",
                source.shape.channels
            )));
        }
        if target != source.shape {
            return Err(RuntimeError::SizeMismatch {
                expected: source.shape.byte_len(),
                actual: target.byte_len(),
            });
        }
        Ok((source, target))
    }
}

impl Default for SoftwareRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionRuntime for SoftwareRuntime {
    fn is_ready(&self) -> bool {
        self.status == RuntimeStatus::Ready
    }

    fn allocate_buffer(&mut self, shape: BufferShape) -> Result<BufferId, RuntimeError> {
        self.check_alive()?;
        if shape.is_empty() {
            return Err(RuntimeError::InvalidShape {
                width: shape.width,
                height: shape.height,
                channels: shape.channels,
            });
        }

        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(
            id,
            Buffer {
                shape,
                data: vec![0u8; shape.byte_len()],
            },
        );
        self.total_allocations += 1;

        tracing::trace!(%id, ?shape, "Allocated runtime buffer");
        Ok(id)
    }

    fn free_buffer(&mut self, id: BufferId) -> Result<(), RuntimeError> {
        self.buffers
            .remove(&id)
            .ok_or(RuntimeError::UnknownBuffer(id))?;
        self.total_frees += 1;
        tracing::trace!(%id, "Freed runtime buffer");
        Ok(())
    }

    fn upload(&mut self, id: BufferId, pixels: &[u8]) -> Result<(), RuntimeError> {
        self.check_alive()?;
        let buffer = self.buffer_mut(id)?;
        if buffer.data.len() != pixels.len() {
            return Err(RuntimeError::SizeMismatch {
                expected: buffer.data.len(),
                actual: pixels.len(),
            });
        }
        buffer.data.copy_from_slice(pixels);
        Ok(())
    }

    fn convert_color(
        &mut self,
        src: BufferId,
        dst: BufferId,
        conversion: ColorConversion,
    ) -> Result<(), RuntimeError> {
        self.check_alive()?;
        let source = self.buffer(src)?;
        let target = self.buffer(dst)?.shape;

        let out = match conversion {
            ColorConversion::RgbaToGray => {
                if source.shape.channels != 4 || target.channels != 1 {
                    return Err(RuntimeError::UnsupportedFormat(format!(
                        "RGBA->gray needs 4->1 channels, got {}->{}",
                        source.shape.channels, target.channels
                    )));
                }
                if source.shape.width != target.width || source.shape.height != target.height {
                    return Err(RuntimeError::SizeMismatch {
                        expected: source.shape.byte_len() / 4,
                        actual: target.byte_len(),
                    });
                }
                rgba_to_gray(&source.data)
            }
        };

        self.buffer_mut(dst)?.data = out;
        Ok(())
    }

    fn blur(&mut self, src: BufferId, dst: BufferId, kernel: u32) -> Result<(), RuntimeError> {
        self.check_alive()?;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(RuntimeError::InvalidKernel(kernel));
        }
        let (source, shape) = self.gray_pair(src, dst)?;
        let out = box_blur(
            &source.data,
            shape.width as usize,
            shape.height as usize,
            (kernel / 2) as usize,
        );
        self.buffer_mut(dst)?.data = out;
        Ok(())
    }

    fn detect_edges(
        &mut self,
        src: BufferId,
        dst: BufferId,
        thresholds: EdgeThresholds,
    ) -> Result<(), RuntimeError> {
        self.check_alive()?;
        if thresholds.low > thresholds.high {
            return Err(RuntimeError::Internal(format!(
                "edge thresholds inverted: low {} > high {}",
                thresholds.low, thresholds.high
            )));
        }
        let (source, shape) = self.gray_pair(src, dst)?;
        let out = sobel_edges(
            &source.data,
            shape.width as usize,
            shape.height as usize,
            thresholds,
        );
        self.buffer_mut(dst)?.data = out;
        Ok(())
    }

    fn detect_circles(
        &mut self,
        edges: BufferId,
        params: &CircleParams,
    ) -> Result<Vec<Circle>, RuntimeError> {
        self.check_alive()?;
        let source = self.buffer(edges)?;
        if source.shape.channels != 1 {
            return Err(RuntimeError::UnsupportedFormat(format!(
                "circle detection needs an edge map, got {} channels",
                source.shape.channels
            )));
        }
        Ok(find_circles(
            &source.data,
            source.shape.width as usize,
            source.shape.height as usize,
            params,
        ))
    }
}

fn rgba_to_gray(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            // ITU-R BT.601 luma in 8.8 fixed point
            let luma = 77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32;
            (luma >> 8) as u8
        })
        .collect()
}

/// Separable box blur with clamped borders.
fn box_blur(data: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return data.to_vec();
    }
    let window = (2 * radius + 1) as u32;

    let mut horizontal = vec![0u8; data.len()];
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..width {
            let sum: u32 = (0..=2 * radius)
                .map(|k| {
                    let sx = (x + k).saturating_sub(radius).min(width - 1);
                    row[sx] as u32
                })
                .sum();
            horizontal[y * width + x] = (sum / window) as u8;
        }
    }

    let mut out = vec![0u8; data.len()];
    for y in 0..height {
        for x in 0..width {
            let sum: u32 = (0..=2 * radius)
                .map(|k| {
                    let sy = (y + k).saturating_sub(radius).min(height - 1);
                    horizontal[sy * width + x] as u32
                })
                .sum();
            out[y * width + x] = (sum / window) as u8;
        }
    }
    out
}

/// Sobel gradient magnitude (L1) followed by a single hysteresis pass:
/// strong pixels are kept, weak pixels only when touching a strong one.
fn sobel_edges(data: &[u8], width: usize, height: usize, thresholds: EdgeThresholds) -> Vec<u8> {
    let mut magnitude = vec![0f32; data.len()];
    if width >= 3 && height >= 3 {
        let at = |x: usize, y: usize| data[y * width + x] as f32;
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2.0 * at(x - 1, y)
                    - at(x - 1, y + 1);
                let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2.0 * at(x, y - 1)
                    - at(x + 1, y - 1);
                magnitude[y * width + x] = gx.abs() + gy.abs();
            }
        }
    }

    let mut out = vec![0u8; data.len()];
    for y in 0..height {
        for x in 0..width {
            let m = magnitude[y * width + x];
            if m >= thresholds.high {
                out[y * width + x] = 255;
            } else if m >= thresholds.low
                && neighbours(x, y, width, height)
                    .any(|(nx, ny)| magnitude[ny * width + nx] >= thresholds.high)
            {
                out[y * width + x] = 255;
            }
        }
    }
    out
}

fn neighbours(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> impl Iterator<Item = (usize, usize)> {
    (-1isize..=1)
        .flat_map(|dy| (-1isize..=1).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .filter_map(move |(dx, dy)| {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                None
            } else {
                Some((nx as usize, ny as usize))
            }
        })
}

/// Groups edge pixels into 8-connected components and keeps those whose
/// bounding box is square enough. The radius is the mean distance of the
/// component's pixels from the box centre, which stays centred on the
/// boundary however wide the edge band is.
fn find_circles(edges: &[u8], width: usize, height: usize, params: &CircleParams) -> Vec<Circle> {
    let mut visited = vec![false; edges.len()];
    let mut stack = Vec::new();
    let mut members = Vec::new();
    let mut circles = Vec::new();

    for start in 0..edges.len() {
        if edges[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        members.clear();

        let (mut min_x, mut max_x) = (usize::MAX, 0usize);
        let (mut min_y, mut max_y) = (usize::MAX, 0usize);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % width, idx / width);
            members.push((x, y));
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for (nx, ny) in neighbours(x, y, width, height) {
                let n = ny * width + nx;
                if edges[n] != 0 && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }

        if members.len() < params.min_edge_pixels {
            continue;
        }

        let box_w = (max_x - min_x + 1) as f32;
        let box_h = (max_y - min_y + 1) as f32;
        if (box_w - box_h).abs() / box_w.max(box_h) > params.squareness_tolerance {
            continue;
        }

        let cx = (min_x + max_x) as f32 / 2.0;
        let cy = (min_y + max_y) as f32 / 2.0;
        let radius = members
            .iter()
            .map(|&(x, y)| (x as f32 - cx).hypot(y as f32 - cy))
            .sum::<f32>()
            / members.len() as f32;
        if radius < params.min_radius || radius > params.max_radius {
            continue;
        }

        circles.push(Circle {
            x: cx,
            y: cy,
            radius,
        });
    }

    circles
}
