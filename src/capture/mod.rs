//! Camera and still-image input.
//!
//! Both inputs end up as RGBA [`Frame`]s. Camera access goes through the
//! [`MediaSource`]/[`MediaStream`] pair, still images through an
//! [`ImageDecoder`].

mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;
mod source;
mod still;
mod synthetic;

pub use config::{CaptureConfig, ConfigError, Facing, FileConfig, OutputConfig};
#[cfg(feature = "camera")]
pub use device::NokhwaCamera;
pub use frame::{Frame, FRAME_CHANNELS};
pub use source::{DeviceError, MediaSource, MediaStream};
pub use still::{Bitmap, DecodeError, ImageDecoder, ImageFileDecoder, ImageSource};
pub use synthetic::{SyntheticCamera, SyntheticCoin};
