//! Grain measurement on sediment photographs.
//!
//! Two pipelines produce a binary mask of grains, trace the outer contours of
//! the mask, fit an ellipse to each contour and keep the grains whose minor
//! axis (converted to millimetres) is below a configured maximum. Every run
//! also renders four diagnostic images: the mask, the traced contours, the
//! accepted ellipses and a size histogram.

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use shared::domain::Algorithm;
use thiserror::Error;

pub mod calibration;
pub mod color;
pub mod contours;
pub mod drawing;
pub mod ellipse;
pub mod encode;
pub mod histogram;
pub mod pipeline;

pub use calibration::millimetres_per_pixel;
pub use ellipse::{fit_ellipse, Ellipse};
pub use encode::{decode_image, encode_report, histogram_png, report_pngs};
pub use pipeline::{analyze, color_algorithm, contour_algorithm};

/// Contours with fewer points than this are never fitted.
pub const MIN_CONTOUR_POINTS: usize = 5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unable to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("unable to encode {what} as png: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("saturation factor must be a finite, non-negative number (got {0})")]
    InvalidSaturation(f64),
    #[error("calibration points coincide")]
    CoincidentPoints,
    #[error("calibration distance must be positive (got {0} mm)")]
    InvalidDistance(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Millimetres per pixel.
    pub calibration_factor: f64,
    /// Grains whose minor axis exceeds this length are discarded.
    pub max_length_mm: f64,
    pub histogram_bins: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            calibration_factor: 0.003_901_675_048_621_525_5,
            max_length_mm: 3.0,
            histogram_bins: 60,
        }
    }
}

/// One accepted grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grain {
    pub ellipse: Ellipse,
    pub length_mm: f64,
}

/// Output of a pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub algorithm: Algorithm,
    pub binary: GrayImage,
    pub contours: RgbImage,
    pub ellipses: RgbImage,
    pub histogram: RgbImage,
    pub grains: Vec<Grain>,
}

impl AnalysisReport {
    pub fn grain_count(&self) -> usize {
        self.grains.len()
    }

    /// Mean grain length in millimetres, 0 when no grain was accepted.
    pub fn average_length(&self) -> f64 {
        if self.grains.is_empty() {
            return 0.0;
        }
        self.grains.iter().map(|g| g.length_mm).sum::<f64>() / self.grains.len() as f64
    }

    pub fn lengths_mm(&self) -> Vec<f64> {
        self.grains.iter().map(|g| g.length_mm).collect()
    }
}

/// Convenience wrapper: decode, then run [`analyze`].
pub fn analyze_bytes(
    algorithm: Algorithm,
    bytes: &[u8],
    params: &AnalysisParams,
    saturation: f64,
) -> Result<AnalysisReport, AnalysisError> {
    let image: DynamicImage = decode_image(bytes)?;
    analyze(algorithm, &image, params, saturation)
}
