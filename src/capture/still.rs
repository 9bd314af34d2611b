//! Still-image decoding.

use super::Frame;
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::fmt;
use std::io::{BufRead, Cursor, Seek};
use std::path::PathBuf;
use thiserror::Error;

/// Where a still image comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

/// Errors that can occur while decoding a still image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("failed to read image: {0}")]
    Io(String),
    #[error("unsupported or corrupt image: {0}")]
    Format(String),
    #[error("image exceeds {limit} pixels per side")]
    TooLarge { limit: u32 },
    #[error("pixel data does not match {width}x{height} RGBA")]
    InvalidPixels { width: u32, height: u32 },
}

/// A decoded RGBA8 image.
#[derive(Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    digest: blake3::Hash,
}

impl Bitmap {
    /// Wraps RGBA pixel data, checking it matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize * 4 {
            return Err(DecodeError::InvalidPixels { width, height });
        }
        let digest = blake3::hash(&pixels);
        Ok(Self {
            width,
            height,
            pixels,
            digest,
        })
    }

    /// Returns the image width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the image height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the RGBA pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// BLAKE3 digest of the pixel data.
    pub fn digest(&self) -> &blake3::Hash {
        &self.digest
    }

    /// First 8 bytes of the digest in hex, for log lines.
    pub fn short_digest(&self) -> String {
        let hex = self.digest.to_hex();
        hex.as_str()[..16].to_string()
    }

    /// Copies the bitmap into a frame.
    pub fn to_frame(&self, sequence: u64) -> Frame {
        Frame::new(self.pixels.clone(), self.width, self.height, sequence)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("digest", &self.short_digest())
            .finish()
    }
}

/// Platform capability to decode still images.
pub trait ImageDecoder {
    fn decode(&mut self, source: &ImageSource) -> Result<Bitmap, DecodeError>;
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageFileDecoder {
    max_dimension: u32,
}

impl ImageFileDecoder {
    pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

    /// Creates a decoder with the default size limit.
    pub fn new() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }

    /// Creates a decoder rejecting images wider or taller than `max_dimension`.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl Default for ImageFileDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFileDecoder {
    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }

    /// Decodes with the dimension limit applied before pixel data is read.
    fn read<R: BufRead + Seek>(
        &self,
        mut reader: ImageReader<R>,
    ) -> Result<DynamicImage, DecodeError> {
        reader.limits(self.limits());
        reader.decode().map_err(|e| match e {
            ImageError::IoError(io) => DecodeError::Io(io.to_string()),
            ImageError::Limits(_) => DecodeError::TooLarge {
                limit: self.max_dimension,
            },
            other => DecodeError::Format(other.to_string()),
        })
    }
}

impl ImageDecoder for ImageFileDecoder {
    fn decode(&mut self, source: &ImageSource) -> Result<Bitmap, DecodeError> {
        let io_error = |e: std::io::Error| DecodeError::Io(e.to_string());
        let decoded = match source {
            ImageSource::Path(path) => self.read(ImageReader::open(path).map_err(io_error)?)?,
            ImageSource::Bytes(bytes) => self.read(
                ImageReader::new(Cursor::new(bytes.as_slice()))
                    .with_guessed_format()
                    .map_err(io_error)?,
            )?,
        };

        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        let bitmap = Bitmap::from_rgba(width, height, rgba.into_raw())?;
        tracing::debug!(?source, ?bitmap, "Decoded still image");
        Ok(bitmap)
    }
}
