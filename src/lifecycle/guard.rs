//! Ownership of capture resources and the repeating frame loop.
//!
//! The guard holds at most one capture resource and at most one loop
//! registration. [`ResourceGuard::release_all`] is the only teardown path
//! and always runs every step: cancel loop, stop stream tracks, drop
//! bitmap.

use crate::capture::{Bitmap, CaptureConfig, DeviceError, MediaSource, MediaStream};
use std::fmt;
use thiserror::Error;

/// Identifier assigned by a scheduler to a repeating registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId(pub u64);

/// Display-refresh style scheduler that fires a callback every frame.
pub trait FrameScheduler {
    /// Registers a repeating callback delivering tickets for `generation`.
    fn schedule_repeating(&mut self, generation: u64) -> ScheduleId;

    /// Stops a registration. The scheduler may still deliver a ticket that
    /// was already in flight.
    fn cancel(&mut self, id: ScheduleId);
}

/// Cancellation token for the active frame loop.
///
/// Not `Clone`: exactly one handle exists per registration.
#[derive(Debug, PartialEq, Eq)]
pub struct LoopHandle {
    id: ScheduleId,
    generation: u64,
}

impl LoopHandle {
    /// Returns the scheduler id of the registration.
    pub fn id(&self) -> ScheduleId {
        self.id
    }

    /// Returns the loop generation this handle was created for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The resource currently held by the guard.
pub enum CaptureResource {
    None,
    Camera { stream: Box<dyn MediaStream> },
    Image { bitmap: Bitmap },
}

impl CaptureResource {
    /// Returns the resource discriminant.
    pub fn kind(&self) -> ResourceKind {
        match self {
            CaptureResource::None => ResourceKind::None,
            CaptureResource::Camera { .. } => ResourceKind::Camera,
            CaptureResource::Image { .. } => ResourceKind::Image,
        }
    }
}

impl fmt::Debug for CaptureResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureResource::None => f.write_str("None"),
            CaptureResource::Camera { stream } => f
                .debug_struct("Camera")
                .field("live", &stream.is_live())
                .finish(),
            CaptureResource::Image { bitmap } => {
                f.debug_struct("Image").field("bitmap", bitmap).finish()
            }
        }
    }
}

/// Discriminant of [`CaptureResource`], for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    None,
    Camera,
    Image,
}

/// Teardown steps that failed. Ownership was released regardless.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("teardown incomplete: {}", .faults.join("; "))]
pub struct TeardownError {
    pub faults: Vec<String>,
}

/// Enforces the at-most-one resource and at-most-one loop invariants.
pub struct ResourceGuard {
    scheduler: Box<dyn FrameScheduler>,
    resource: CaptureResource,
    frame_loop: Option<LoopHandle>,
}

impl ResourceGuard {
    /// Creates an empty guard registering loops with `scheduler`.
    pub fn new(scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            scheduler,
            resource: CaptureResource::None,
            frame_loop: None,
        }
    }

    /// Opens a camera stream and keeps it as the sole owned resource.
    pub fn acquire_camera(
        &mut self,
        source: &mut dyn MediaSource,
        constraints: &CaptureConfig,
    ) -> Result<(), DeviceError> {
        self.release_before_acquire();
        let stream = source.request_stream(constraints)?;
        self.resource = CaptureResource::Camera { stream };
        tracing::debug!("Guard holds camera stream");
        Ok(())
    }

    /// Keeps a decoded bitmap as the sole owned resource.
    pub fn acquire_image(&mut self, bitmap: Bitmap) {
        self.release_before_acquire();
        tracing::debug!(digest = %bitmap.short_digest(), "Guard holds still image");
        self.resource = CaptureResource::Image { bitmap };
    }

    /// Registers the repeating frame loop for `generation`, replacing any
    /// previous registration.
    pub fn register_loop(&mut self, generation: u64) {
        if let Some(previous) = self.frame_loop.take() {
            tracing::warn!(
                generation = previous.generation,
                "Replacing a live frame loop registration"
            );
            self.scheduler.cancel(previous.id);
        }
        let id = self.scheduler.schedule_repeating(generation);
        tracing::debug!(?id, generation, "Frame loop registered");
        self.frame_loop = Some(LoopHandle { id, generation });
    }

    /// Releases the loop and the resource, in that order.
    ///
    /// Every step runs even when an earlier one fails; ownership is cleared
    /// before any error is returned. Calling this on an empty guard is a
    /// no-op.
    pub fn release_all(&mut self) -> Result<(), TeardownError> {
        let mut faults = Vec::new();

        if let Some(handle) = self.frame_loop.take() {
            self.scheduler.cancel(handle.id);
            tracing::debug!(generation = handle.generation, "Frame loop cancelled");
        }

        match std::mem::replace(&mut self.resource, CaptureResource::None) {
            CaptureResource::Camera { mut stream } => {
                if let Err(e) = stream.stop_all_tracks() {
                    tracing::warn!(error = %e, "Failed to stop camera tracks");
                    faults.push(format!("stop tracks: {e}"));
                }
                tracing::debug!("Camera stream released");
            }
            CaptureResource::Image { bitmap } => {
                tracing::debug!(digest = %bitmap.short_digest(), "Still image released");
            }
            CaptureResource::None => {}
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { faults })
        }
    }

    fn release_before_acquire(&mut self) {
        if self.resource.kind() != ResourceKind::None || self.frame_loop.is_some() {
            tracing::warn!("Acquire on an occupied guard; releasing first");
            if let Err(e) = self.release_all() {
                tracing::warn!(error = %e, "Release before acquire was incomplete");
            }
        }
    }

    /// Returns which resource is held.
    pub fn resource_kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    /// Returns true while a frame loop is registered.
    pub fn has_loop(&self) -> bool {
        self.frame_loop.is_some()
    }

    /// Generation of the live frame loop, if any.
    pub fn loop_generation(&self) -> Option<u64> {
        self.frame_loop.as_ref().map(LoopHandle::generation)
    }

    /// Returns the camera stream, if one is held.
    pub fn stream_mut(&mut self) -> Option<&mut (dyn MediaStream + 'static)> {
        match &mut self.resource {
            CaptureResource::Camera { stream } => Some(stream.as_mut()),
            _ => None,
        }
    }

    /// Returns the still image, if one is held.
    pub fn bitmap(&self) -> Option<&Bitmap> {
        match &self.resource {
            CaptureResource::Image { bitmap } => Some(bitmap),
            _ => None,
        }
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_all() {
            tracing::warn!(error = %e, "Teardown on drop was incomplete");
        }
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("resource", &self.resource)
            .field("frame_loop", &self.frame_loop)
            .finish()
    }
}
