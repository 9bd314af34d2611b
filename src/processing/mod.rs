//! Frame processing and coin classification.
//!
//! A frame goes through the vision runtime as
//! `RGBA → gray → blur → edges → circles`, and the circles are matched
//! against the configured coin table by diameter.

mod config;
mod processor;
mod result;

pub use config::{CoinConfig, Denomination, ProcessingConfig};
pub use processor::{FrameProcessor, ProcessingError};
pub use result::DetectionResult;
