//! Synthetic camera producing noisy frames with bright coin discs.

use super::{CaptureConfig, DeviceError, Frame, MediaSource, MediaStream, FRAME_CHANNELS};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

const BACKGROUND_LEVEL: i16 = 40;
const COIN_LEVEL: i16 = 200;

/// A disc drawn into every synthetic frame, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticCoin {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Camera stand-in for demos and tests.
///
/// Every stream it opens is seeded from the camera seed plus the number of
/// streams opened so far, so a restart produces a fresh but reproducible
/// noise sequence.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    seed: u64,
    coins: Vec<SyntheticCoin>,
    noise_amplitude: u8,
    deny_permission: bool,
    streams_opened: u64,
}

impl SyntheticCamera {
    /// Creates a camera with an empty scene.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            coins: Vec::new(),
            noise_amplitude: 6,
            deny_permission: false,
            streams_opened: 0,
        }
    }

    /// Three coins (500, 100 and 1 yen) laid out for a 640x480 frame.
    pub fn yen_scene(seed: u64, pixels_per_mm: f32) -> Self {
        let radius = |diameter_mm: f32| diameter_mm * pixels_per_mm / 2.0;
        Self::new(seed).with_coins(vec![
            SyntheticCoin {
                x: 150.0,
                y: 240.0,
                radius: radius(26.5),
            },
            SyntheticCoin {
                x: 320.0,
                y: 240.0,
                radius: radius(22.6),
            },
            SyntheticCoin {
                x: 490.0,
                y: 240.0,
                radius: radius(20.0),
            },
        ])
    }

    /// Replaces the coins drawn into each frame.
    pub fn with_coins(mut self, coins: Vec<SyntheticCoin>) -> Self {
        self.coins = coins;
        self
    }

    /// Sets the per-pixel noise amplitude.
    pub fn with_noise(mut self, amplitude: u8) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Makes every stream request fail as if the user refused access.
    pub fn denying_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Returns the number of streams opened so far.
    pub fn streams_opened(&self) -> u64 {
        self.streams_opened
    }
}

impl MediaSource for SyntheticCamera {
    fn request_stream(
        &mut self,
        constraints: &CaptureConfig,
    ) -> Result<Box<dyn MediaStream>, DeviceError> {
        if self.deny_permission {
            return Err(DeviceError::PermissionDenied);
        }
        constraints
            .validate()
            .map_err(|e| DeviceError::Overconstrained(e.to_string()))?;

        self.streams_opened += 1;
        tracing::info!(
            width = constraints.width,
            height = constraints.height,
            facing = ?constraints.facing,
            "Synthetic camera stream opened"
        );

        Ok(Box::new(SyntheticStream {
            rng: ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(self.streams_opened)),
            width: constraints.width,
            height: constraints.height,
            coins: self.coins.clone(),
            noise_amplitude: self.noise_amplitude,
            sequence: 0,
            live: true,
        }))
    }
}

struct SyntheticStream {
    rng: ChaCha8Rng,
    width: u32,
    height: u32,
    coins: Vec<SyntheticCoin>,
    noise_amplitude: u8,
    sequence: u64,
    live: bool,
}

impl SyntheticStream {
    fn noise(&mut self) -> i16 {
        if self.noise_amplitude == 0 {
            return 0;
        }
        let span = 2 * self.noise_amplitude as u32 + 1;
        (self.rng.next_u32() % span) as i16 - self.noise_amplitude as i16
    }

    fn base_level(&self, x: u32, y: u32) -> i16 {
        let inside = self.coins.iter().any(|coin| {
            let dx = x as f32 + 0.5 - coin.x;
            let dy = y as f32 + 0.5 - coin.y;
            dx * dx + dy * dy <= coin.radius * coin.radius
        });
        if inside {
            COIN_LEVEL
        } else {
            BACKGROUND_LEVEL
        }
    }
}

impl MediaStream for SyntheticStream {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        if !self.live {
            return Err(DeviceError::Stopped);
        }

        let mut pixels =
            Vec::with_capacity(self.width as usize * self.height as usize * FRAME_CHANNELS);
        for y in 0..self.height {
            for x in 0..self.width {
                let level = (self.base_level(x, y) + self.noise()).clamp(0, 255) as u8;
                pixels.extend_from_slice(&[level, level, level, 255]);
            }
        }

        self.sequence += 1;
        Ok(Frame::new(pixels, self.width, self.height, self.sequence))
    }

    fn stop_all_tracks(&mut self) -> Result<(), DeviceError> {
        if !self.live {
            return Err(DeviceError::Stopped);
        }
        self.live = false;
        tracing::info!(frames = self.sequence, "Synthetic camera stream stopped");
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
