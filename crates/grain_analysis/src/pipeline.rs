use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use shared::domain::Algorithm;
use tracing::debug;

use crate::{
    color::{grayscale, in_ranges, scale_saturation, threshold_inverse, to_hsv, CYAN_GRAINS, RED_GRAINS},
    contours::{draw_outlines, external_contours, Outline},
    ellipse::fit_ellipse,
    histogram, AnalysisError, AnalysisParams, AnalysisReport, Grain, MIN_CONTOUR_POINTS,
};

const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const COLOR_ELLIPSE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CONTOUR_ELLIPSE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LINE_THICKNESS: u32 = 2;
const THRESHOLD_LEVEL: u8 = 128;
/// Sigma a 5x5 Gaussian kernel gets when derived from its size.
const BLUR_SIGMA: f32 = 1.1;

/// Runs the pipeline for `algorithm`. `saturation` only affects the color pipeline.
pub fn analyze(
    algorithm: Algorithm,
    image: &DynamicImage,
    params: &AnalysisParams,
    saturation: f64,
) -> Result<AnalysisReport, AnalysisError> {
    match algorithm {
        Algorithm::ColorAlg => color_algorithm(image, params, saturation),
        Algorithm::ContourAlg => Ok(contour_algorithm(image, params)),
    }
}

/// Grains are dark on a light background.
pub fn contour_algorithm(image: &DynamicImage, params: &AnalysisParams) -> AnalysisReport {
    let rgb = image.to_rgb8();
    let blurred = gaussian_blur_f32(&grayscale(&rgb), BLUR_SIGMA);
    let binary = threshold_inverse(&blurred, THRESHOLD_LEVEL);
    let outlines = external_contours(&binary, MIN_CONTOUR_POINTS);

    let mut contours = rgb.clone();
    draw_outlines(&mut contours, &outlines, CONTOUR_COLOR, LINE_THICKNESS);

    let mut ellipses = rgb;
    let grains = measure(&outlines, params, &mut ellipses, CONTOUR_ELLIPSE_COLOR);

    finish(Algorithm::ContourAlg, binary, contours, ellipses, grains, params)
}

/// Grains are stained cyan or red; the stain is found in HSV space after
/// scaling saturation by `saturation`.
pub fn color_algorithm(
    image: &DynamicImage,
    params: &AnalysisParams,
    saturation: f64,
) -> Result<AnalysisReport, AnalysisError> {
    if !(saturation.is_finite() && saturation >= 0.0) {
        return Err(AnalysisError::InvalidSaturation(saturation));
    }

    let rgb = image.to_rgb8();
    let mut hsv = to_hsv(&rgb);
    scale_saturation(&mut hsv, saturation);
    let binary = in_ranges(&hsv, &[CYAN_GRAINS, RED_GRAINS]);

    // every blob is outlined, only those with enough points are measured
    let outlines = external_contours(&binary, 1);
    let mut contours = DynamicImage::ImageLuma8(binary.clone()).to_rgb8();
    draw_outlines(&mut contours, &outlines, CONTOUR_COLOR, LINE_THICKNESS);

    let measurable: Vec<Outline> = outlines
        .into_iter()
        .filter(|o| o.len() >= MIN_CONTOUR_POINTS)
        .collect();
    let mut ellipses = rgb;
    let grains = measure(&measurable, params, &mut ellipses, COLOR_ELLIPSE_COLOR);

    Ok(finish(Algorithm::ColorAlg, binary, contours, ellipses, grains, params))
}

/// Fits every outline, keeps grains short enough and draws them on `canvas`.
fn measure(
    outlines: &[Outline],
    params: &AnalysisParams,
    canvas: &mut RgbImage,
    color: Rgb<u8>,
) -> Vec<Grain> {
    let mut grains = Vec::new();
    for outline in outlines {
        let Some(ellipse) = fit_ellipse(&outline.as_f64()) else {
            continue;
        };
        let length_mm = ellipse.minor_axis() * params.calibration_factor;
        if length_mm <= params.max_length_mm {
            ellipse.draw(canvas, color, LINE_THICKNESS);
            grains.push(Grain { ellipse, length_mm });
        }
    }
    grains
}

fn finish(
    algorithm: Algorithm,
    binary: GrayImage,
    contours: RgbImage,
    ellipses: RgbImage,
    grains: Vec<Grain>,
    params: &AnalysisParams,
) -> AnalysisReport {
    let lengths: Vec<f64> = grains.iter().map(|g| g.length_mm).collect();
    let histogram = histogram::render(&lengths, params.histogram_bins);
    let report = AnalysisReport {
        algorithm,
        binary,
        contours,
        ellipses,
        histogram,
        grains,
    };
    debug!(
        %algorithm,
        grain_count = report.grain_count(),
        average_length = report.average_length(),
        "analysis finished"
    );
    report
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
