//! Detection pipeline and coin table configuration.

use crate::capture::ConfigError;
use crate::runtime::{CircleParams, EdgeThresholds};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tuning for the edge/circle pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Box blur kernel size (odd).
    pub blur_kernel: u32,
    /// Weak edge threshold on the Sobel magnitude.
    pub edge_low: f32,
    /// Strong edge threshold on the Sobel magnitude.
    pub edge_high: f32,
    /// Smallest circle radius accepted, in pixels.
    pub min_radius: f32,
    /// Largest circle radius accepted, in pixels.
    pub max_radius: f32,
    /// Edge components smaller than this are ignored.
    pub min_edge_pixels: usize,
    /// Allowed relative width/height mismatch of a circle's bounding box.
    pub squareness_tolerance: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            edge_low: 60.0,
            edge_high: 120.0,
            min_radius: 10.0,
            max_radius: 150.0,
            min_edge_pixels: 40,
            squareness_tolerance: 0.15,
        }
    }
}

impl ProcessingConfig {
    /// Validates kernel, thresholds and radius range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(ConfigError::InvalidBlurKernel(self.blur_kernel));
        }
        if self.edge_low < 0.0 || self.edge_low > self.edge_high {
            return Err(ConfigError::InvalidEdgeThresholds);
        }
        if self.min_radius <= 0.0 || self.min_radius >= self.max_radius {
            return Err(ConfigError::InvalidRadiusRange);
        }
        Ok(())
    }

    /// Returns the edge thresholds as runtime parameters.
    pub fn edge_thresholds(&self) -> EdgeThresholds {
        EdgeThresholds {
            low: self.edge_low,
            high: self.edge_high,
        }
    }

    /// Returns the circle search parameters.
    pub fn circle_params(&self) -> CircleParams {
        CircleParams {
            min_radius: self.min_radius,
            max_radius: self.max_radius,
            min_edge_pixels: self.min_edge_pixels,
            squareness_tolerance: self.squareness_tolerance,
        }
    }
}

/// A coin type the classifier can recognise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Denomination {
    /// Display label, also the key in detection results.
    pub label: String,
    /// Face value in the smallest currency unit.
    pub face_value: u32,
    /// Nominal coin diameter in millimetres.
    pub diameter_mm: f32,
}

impl Denomination {
    /// Creates a denomination.
    pub fn new(label: impl Into<String>, face_value: u32, diameter_mm: f32) -> Self {
        Self {
            label: label.into(),
            face_value,
            diameter_mm,
        }
    }
}

/// Maps detected circle sizes to denominations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinConfig {
    /// Image scale at the coin plane.
    pub pixels_per_mm: f32,
    /// Maximum diameter error accepted when matching a coin.
    pub tolerance_mm: f32,
    pub denominations: Vec<Denomination>,
}

impl Default for CoinConfig {
    fn default() -> Self {
        Self {
            pixels_per_mm: 4.0,
            tolerance_mm: 0.6,
            denominations: vec![
                Denomination::new("1", 1, 20.0),
                Denomination::new("5", 5, 22.0),
                Denomination::new("10", 10, 23.5),
                Denomination::new("50", 50, 21.0),
                Denomination::new("100", 100, 22.6),
                Denomination::new("500", 500, 26.5),
            ],
        }
    }
}

impl CoinConfig {
    /// Validates the scale and the denomination table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pixels_per_mm <= 0.0 || self.tolerance_mm <= 0.0 {
            return Err(ConfigError::InvalidScale);
        }
        if self.denominations.is_empty() {
            return Err(ConfigError::NoDenominations);
        }
        let mut seen = HashSet::new();
        for denomination in &self.denominations {
            if !seen.insert(denomination.label.as_str()) {
                return Err(ConfigError::DuplicateDenomination(
                    denomination.label.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the denomination whose diameter is closest to that of a
    /// circle with `radius_px`, if it lies within tolerance.
    pub fn classify(&self, radius_px: f32) -> Option<&Denomination> {
        let diameter_mm = 2.0 * radius_px / self.pixels_per_mm;
        self.denominations
            .iter()
            .map(|d| (d, (d.diameter_mm - diameter_mm).abs()))
            .filter(|&(_, error)| error <= self.tolerance_mm)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(d, _)| d)
    }
}
