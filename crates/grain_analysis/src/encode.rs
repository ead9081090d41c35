use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use shared::protocol::ProcessResponse;

use crate::{AnalysisError, AnalysisReport};

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AnalysisError> {
    image::load_from_memory(bytes).map_err(AnalysisError::Decode)
}

pub fn png_bytes(image: &DynamicImage, what: &'static str) -> Result<Vec<u8>, AnalysisError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|source| AnalysisError::Encode { what, source })?;
    Ok(buf)
}

/// The four report images as PNG bytes, in response order.
pub fn report_pngs(report: &AnalysisReport) -> Result<[Vec<u8>; 4], AnalysisError> {
    Ok([
        png_bytes(&DynamicImage::ImageLuma8(report.binary.clone()), "binary image")?,
        png_bytes(&DynamicImage::ImageRgb8(report.contours.clone()), "contours image")?,
        png_bytes(&DynamicImage::ImageRgb8(report.ellipses.clone()), "ellipses image")?,
        png_bytes(&DynamicImage::ImageRgb8(report.histogram.clone()), "histogram image")?,
    ])
}

/// Size chart for lengths pooled from several analyses.
pub fn histogram_png(lengths_mm: &[f64], bins: usize) -> Result<Vec<u8>, AnalysisError> {
    let chart = crate::histogram::render(lengths_mm, bins);
    png_bytes(&DynamicImage::ImageRgb8(chart), "combined histogram")
}

/// Builds the wire payload for a finished analysis.
pub fn encode_report(report: &AnalysisReport) -> Result<ProcessResponse, AnalysisError> {
    let [binary, contours, ellipses, histogram] = report_pngs(report)?;
    Ok(ProcessResponse {
        average_length: report.average_length(),
        grain_count: report.grain_count() as u64,
        binary_image: STANDARD.encode(binary),
        contours_image: STANDARD.encode(contours),
        ellipses_image: STANDARD.encode(ellipses),
        histogram_image: STANDARD.encode(histogram),
    })
}
