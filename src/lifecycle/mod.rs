//! Capture mode lifecycle.
//!
//! The [`CaptureCoordinator`] decides which mode is active, the
//! [`ResourceGuard`] owns what that mode needs, and a [`FrameScheduler`]
//! drives the camera loop. Loop tickets carry a generation so that a tick
//! delivered after cancellation is recognised and dropped.

mod coordinator;
mod error;
mod guard;
mod mode;
mod pump;

pub use coordinator::{CaptureCoordinator, Collaborators, CoordinatorStats, TickOutcome};
pub use error::CaptureError;
pub use guard::{
    CaptureResource, FrameScheduler, LoopHandle, ResourceGuard, ResourceKind, ScheduleId,
    TeardownError,
};
pub use mode::CaptureMode;
pub use pump::{FramePump, LoopTicket};
