//! Coin Counter Library
//!
//! Captures frames from a camera or a still image, runs an edge/circle
//! detection pass through a vision runtime and publishes per-frame coin
//! counts.
//!
//! # Architecture
//!
//! ```text
//! intent ──► CaptureCoordinator ──► ResourceGuard (stream | bitmap, frame loop)
//!                 │
//!                 ├──► FrameProcessor ──► VisionRuntime
//!                 │
//!                 └──► ResultSink (results, controls, status)
//! ```
//!
//! # Design Principles
//!
//! - **One mode at a time**: `Idle`, `Camera` or `StillImage`, owned by a
//!   single coordinator instance
//! - **At most one resource**: every transition releases before it acquires
//! - **Balanced native buffers**: each frame frees what it allocated
//! - **Stale ticks are dropped**: loop tickets carry a generation
//!
//! # Example
//!
//! ```no_run
//! use coin_counter::{
//!     capture::{CaptureConfig, ImageFileDecoder, SyntheticCamera},
//!     lifecycle::{CaptureCoordinator, Collaborators, FramePump},
//!     processing::FrameProcessor,
//!     runtime::{bring_up, SoftwareRuntime},
//!     sink::TracingSink,
//! };
//!
//! let mut runtime = SoftwareRuntime::new();
//! bring_up(&mut runtime).unwrap();
//!
//! let pump = FramePump::new();
//! let mut coordinator = CaptureCoordinator::new(
//!     Collaborators {
//!         runtime: Box::new(runtime),
//!         media: Box::new(SyntheticCamera::yen_scene(1, 4.0)),
//!         decoder: Box::new(ImageFileDecoder::new()),
//!         scheduler: Box::new(pump.clone()),
//!         sink: Box::new(TracingSink),
//!     },
//!     CaptureConfig::default(),
//!     FrameProcessor::default(),
//! );
//!
//! coordinator.start_camera().unwrap();
//! for _ in 0..10 {
//!     pump.tick();
//!     for ticket in pump.drain() {
//!         coordinator.on_frame(ticket);
//!     }
//! }
//! coordinator.stop().unwrap();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod lifecycle;
pub mod metrics;
pub mod processing;
pub mod runtime;
pub mod sink;

// Re-export commonly used types at crate root
pub use capture::{CaptureConfig, FileConfig, Frame, ImageSource};
pub use lifecycle::{CaptureCoordinator, CaptureError, CaptureMode, TickOutcome};
pub use processing::{DetectionResult, FrameProcessor};
pub use runtime::{SoftwareRuntime, VisionRuntime};
pub use sink::{ResultSink, StatusMessage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
