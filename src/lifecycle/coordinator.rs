//! Capture mode state machine.
//!
//! ```text
//! Idle --start_camera(ok)--> Camera
//! Idle --load_image(ok)-----> StillImage
//! Camera | StillImage --stop--> Idle
//! Camera --load_image--------> Idle --> StillImage
//! StillImage --start_camera--> Idle --> Camera
//! any --runtime not ready----> unchanged
//! acquisition failure -------> Idle
//! ```
//!
//! Every transition goes through `Idle`: the guard is emptied before the
//! next resource is acquired, so two resources never coexist.

use super::error::CaptureError;
use super::guard::{FrameScheduler, ResourceGuard, ResourceKind};
use super::mode::CaptureMode;
use super::pump::LoopTicket;
use crate::capture::{CaptureConfig, ImageDecoder, ImageSource, MediaSource};
use crate::processing::FrameProcessor;
use crate::runtime::VisionRuntime;
use crate::sink::{ControlState, ResultSink, StatusMessage};
use tracing::{debug, info, warn};

/// External collaborators the coordinator drives.
pub struct Collaborators {
    pub runtime: Box<dyn VisionRuntime>,
    pub media: Box<dyn MediaSource>,
    pub decoder: Box<dyn ImageDecoder>,
    pub scheduler: Box<dyn FrameScheduler>,
    pub sink: Box<dyn ResultSink>,
}

/// What happened to one frame-loop ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A result was published.
    Published,
    /// The frame failed; the loop keeps running.
    Skipped,
    /// The ticket belongs to a cancelled loop and was ignored.
    Stale,
}

/// Counters describing coordinator activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Mode changes actually performed.
    pub transitions: u64,
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub stale_ticks: u64,
    pub teardown_faults: u64,
    /// Total of the most recent published result.
    pub last_total: Option<u64>,
}

/// Owns the capture mode and everything that depends on it.
pub struct CaptureCoordinator {
    mode: CaptureMode,
    guard: ResourceGuard,
    runtime: Box<dyn VisionRuntime>,
    media: Box<dyn MediaSource>,
    decoder: Box<dyn ImageDecoder>,
    sink: Box<dyn ResultSink>,
    processor: FrameProcessor,
    constraints: CaptureConfig,
    generation: u64,
    still_sequence: u64,
    stats: CoordinatorStats,
}

impl CaptureCoordinator {
    /// Creates a coordinator in `Idle` that owns `collaborators`.
    pub fn new(
        collaborators: Collaborators,
        constraints: CaptureConfig,
        processor: FrameProcessor,
    ) -> Self {
        let Collaborators {
            runtime,
            media,
            decoder,
            scheduler,
            sink,
        } = collaborators;

        Self {
            mode: CaptureMode::Idle,
            guard: ResourceGuard::new(scheduler),
            runtime,
            media,
            decoder,
            sink,
            processor,
            constraints,
            generation: 0,
            still_sequence: 0,
            stats: CoordinatorStats::default(),
        }
    }

    /// Returns the active capture mode.
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Returns the guard holding the current resource and loop.
    pub fn guard(&self) -> &ResourceGuard {
        &self.guard
    }

    /// Returns a copy of the activity counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Control state between transitions; never busy.
    pub fn controls(&self) -> ControlState {
        ControlState {
            mode: self.mode,
            busy: false,
        }
    }

    /// Generation of the most recently started camera loop.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Releases everything and returns to `Idle`.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.request_mode(CaptureMode::Idle, None)
    }

    /// Opens the camera and registers the frame loop, restarting it if
    /// already running.
    pub fn start_camera(&mut self) -> Result<(), CaptureError> {
        self.request_mode(CaptureMode::Camera, None)
    }

    /// Decodes `source` and runs detection on it once.
    pub fn load_image(&mut self, source: impl Into<ImageSource>) -> Result<(), CaptureError> {
        self.request_mode(CaptureMode::StillImage, Some(source.into()))
    }

    /// Moves to `target`, releasing whatever the current mode holds first.
    ///
    /// `source` is only read for [`CaptureMode::StillImage`]. Requesting the
    /// current mode restarts it. On failure the mode is `Idle`, except for
    /// [`CaptureError::RuntimeNotReady`], which leaves everything as it was.
    pub fn request_mode(
        &mut self,
        target: CaptureMode,
        source: Option<ImageSource>,
    ) -> Result<(), CaptureError> {
        if target == CaptureMode::Idle
            && self.mode == CaptureMode::Idle
            && self.guard.resource_kind() == ResourceKind::None
            && !self.guard.has_loop()
        {
            debug!("Already idle");
            return Ok(());
        }

        if target != CaptureMode::Idle && !self.runtime.is_ready() {
            let err = CaptureError::RuntimeNotReady;
            warn!(mode = %self.mode, %target, "Capture requested before runtime is ready");
            self.sink.status(&err.status_message());
            return Err(err);
        }

        self.notify_controls(true);
        let outcome = match target {
            CaptureMode::Idle => {
                self.teardown();
                self.sink.status(&StatusMessage::info("Stopped"));
                Ok(())
            }
            CaptureMode::Camera => self.enter_camera(),
            CaptureMode::StillImage => self.enter_still_image(source),
        };

        if let Err(e) = &outcome {
            warn!(error = %e, %target, "Transition failed");
            self.sink.status(&e.status_message());
        }
        self.notify_controls(false);
        outcome
    }

    /// Handles one frame-loop ticket.
    ///
    /// Tickets from a cancelled loop generation are dropped without
    /// touching the stream. Processing failures are reported and the loop
    /// keeps running.
    pub fn on_frame(&mut self, ticket: LoopTicket) -> TickOutcome {
        if self.mode != CaptureMode::Camera
            || self.guard.loop_generation() != Some(ticket.generation())
        {
            self.stats.stale_ticks += 1;
            debug!(
                ticket = ticket.generation(),
                current = ?self.guard.loop_generation(),
                "Ignoring stale frame ticket"
            );
            return TickOutcome::Stale;
        }

        let read = match self.guard.stream_mut() {
            Some(stream) => stream.read_frame(),
            None => return TickOutcome::Stale,
        };
        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.frames_failed += 1;
                warn!(error = %e, "Camera frame unavailable");
                self.sink
                    .status(&StatusMessage::warning(format!("Frame skipped: {e}")));
                return TickOutcome::Skipped;
            }
        };

        match self.processor.process_once(self.runtime.as_mut(), &frame) {
            Ok(result) => {
                self.stats.frames_processed += 1;
                self.stats.last_total = Some(result.total());
                self.sink.publish(&result);
                TickOutcome::Published
            }
            Err(e) => {
                self.stats.frames_failed += 1;
                warn!(sequence = frame.sequence(), error = %e, "Frame processing failed");
                self.sink
                    .status(&StatusMessage::warning(format!("Frame skipped: {e}")));
                TickOutcome::Skipped
            }
        }
    }

    fn enter_camera(&mut self) -> Result<(), CaptureError> {
        self.teardown();
        self.sink
            .status(&StatusMessage::info("Requesting camera access"));

        if let Err(e) = self
            .guard
            .acquire_camera(self.media.as_mut(), &self.constraints)
        {
            warn!(error = %e, "Camera acquisition failed");
            return Err(CaptureError::DeviceUnavailable {
                reason: e.reason().to_string(),
            });
        }

        self.generation += 1;
        self.guard.register_loop(self.generation);
        self.set_mode(CaptureMode::Camera);
        self.sink.status(&StatusMessage::success("Camera started"));
        Ok(())
    }

    fn enter_still_image(&mut self, source: Option<ImageSource>) -> Result<(), CaptureError> {
        self.teardown();

        let source = source.ok_or_else(|| CaptureError::DecodeFailed {
            reason: "no image source supplied".to_string(),
        })?;
        self.sink.status(&StatusMessage::info("Loading image"));

        let bitmap = self
            .decoder
            .decode(&source)
            .map_err(|e| CaptureError::DecodeFailed {
                reason: e.to_string(),
            })?;

        self.still_sequence += 1;
        let frame = bitmap.to_frame(self.still_sequence);
        info!(
            digest = %bitmap.short_digest(),
            width = bitmap.width(),
            height = bitmap.height(),
            "Still image loaded"
        );
        self.guard.acquire_image(bitmap);
        self.set_mode(CaptureMode::StillImage);

        match self.processor.process_once(self.runtime.as_mut(), &frame) {
            Ok(result) => {
                self.stats.frames_processed += 1;
                self.stats.last_total = Some(result.total());
                self.sink.publish(&result);
                self.sink
                    .status(&StatusMessage::success(format!("Detected {result}")));
                Ok(())
            }
            Err(e) => {
                self.stats.frames_failed += 1;
                self.teardown();
                Err(CaptureError::ProcessingError {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Empties the guard and settles in `Idle`.
    fn teardown(&mut self) {
        if let Err(e) = self.guard.release_all() {
            self.stats.teardown_faults += 1;
            warn!(error = %e, "Teardown incomplete");
            self.sink
                .status(&StatusMessage::warning(format!("Cleanup incomplete: {e}")));
        }
        self.set_mode(CaptureMode::Idle);
    }

    fn set_mode(&mut self, mode: CaptureMode) {
        if self.mode == mode {
            return;
        }
        info!(from = %self.mode, to = %mode, "Capture mode changed");
        self.mode = mode;
        self.stats.transitions += 1;
    }

    fn notify_controls(&mut self, busy: bool) {
        self.sink.controls_changed(ControlState {
            mode: self.mode,
            busy,
        });
    }
}

impl std::fmt::Debug for CaptureCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureCoordinator")
            .field("mode", &self.mode)
            .field("guard", &self.guard)
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish()
    }
}
