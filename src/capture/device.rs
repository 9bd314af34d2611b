//! Real camera backend via `nokhwa`.

use super::{CaptureConfig, DeviceError, Frame, MediaSource, MediaStream};
use nokhwa::{
    pixel_format::RgbAFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
    Camera as NokhwaDevice, NokhwaError,
};

/// Opens native camera devices by index.
#[derive(Debug, Default)]
pub struct NokhwaCamera;

impl NokhwaCamera {
    /// Creates a source for native camera devices.
    pub fn new() -> Self {
        Self
    }
}

/// Format closest to the requested size and frame rate. The device picks
/// the nearest mode it supports.
fn camera_format(constraints: &CaptureConfig) -> CameraFormat {
    CameraFormat::new(
        Resolution::new(constraints.width, constraints.height),
        FrameFormat::MJPEG,
        constraints.fps,
    )
}

fn open_error(err: NokhwaError) -> DeviceError {
    DeviceError::NotReadable(err.to_string())
}

impl MediaSource for NokhwaCamera {
    fn request_stream(
        &mut self,
        constraints: &CaptureConfig,
    ) -> Result<Box<dyn MediaStream>, DeviceError> {
        constraints
            .validate()
            .map_err(|e| DeviceError::Overconstrained(e.to_string()))?;

        // Devices are addressed by index only; facing cannot be selected.
        tracing::debug!(
            facing = ?constraints.facing,
            "Camera facing is not applied to indexed devices"
        );
        let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
            camera_format(constraints),
        ));
        let mut device = NokhwaDevice::new(CameraIndex::Index(constraints.device_id), format)
            .map_err(open_error)?;
        device.open_stream().map_err(open_error)?;

        let opened = device.camera_format();
        tracing::info!(
            device_id = constraints.device_id,
            width = opened.width(),
            height = opened.height(),
            fps = opened.frame_rate(),
            "Camera stream opened"
        );

        Ok(Box::new(NokhwaStream {
            device,
            sequence: 0,
            live: true,
        }))
    }
}

struct NokhwaStream {
    device: NokhwaDevice,
    sequence: u64,
    live: bool,
}

impl MediaStream for NokhwaStream {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        if !self.live {
            return Err(DeviceError::Stopped);
        }
        let buffer = self
            .device
            .frame()
            .map_err(|e| DeviceError::ReadFailed(e.to_string()))?;
        let image = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|e| DeviceError::ReadFailed(e.to_string()))?;

        let (width, height) = (image.width(), image.height());
        self.sequence += 1;
        Ok(Frame::new(image.into_raw(), width, height, self.sequence))
    }

    fn stop_all_tracks(&mut self) -> Result<(), DeviceError> {
        if !self.live {
            return Err(DeviceError::Stopped);
        }
        self.live = false;
        self.device
            .stop_stream()
            .map_err(|e| DeviceError::StopFailed(e.to_string()))
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
