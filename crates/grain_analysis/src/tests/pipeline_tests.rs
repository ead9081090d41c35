use super::*;
use crate::{encode_report, histogram_png};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use imageproc::drawing::draw_filled_circle_mut;

fn dark_grains_on_light() -> DynamicImage {
    let mut canvas = RgbImage::from_pixel(220, 220, Rgb([245, 245, 240]));
    draw_filled_circle_mut(&mut canvas, (40, 40), 10, Rgb([30, 30, 30]));
    draw_filled_circle_mut(&mut canvas, (110, 60), 15, Rgb([40, 35, 30]));
    draw_filled_circle_mut(&mut canvas, (150, 160), 20, Rgb([20, 20, 25]));
    DynamicImage::ImageRgb8(canvas)
}

fn stained_grains_on_black() -> DynamicImage {
    let mut canvas = RgbImage::new(160, 120);
    draw_filled_circle_mut(&mut canvas, (40, 40), 12, Rgb([220, 40, 220]));
    draw_filled_circle_mut(&mut canvas, (110, 40), 8, Rgb([40, 220, 40]));
    draw_filled_circle_mut(&mut canvas, (80, 90), 10, Rgb([128, 128, 128]));
    DynamicImage::ImageRgb8(canvas)
}

#[test]
fn contour_pipeline_counts_dark_grains() {
    let image = dark_grains_on_light();
    let report = contour_algorithm(&image, &AnalysisParams::default());

    assert_eq!(report.algorithm, Algorithm::ContourAlg);
    assert_eq!(report.grain_count(), 3);
    assert_eq!(report.binary.dimensions(), (220, 220));
    assert_eq!(report.contours.dimensions(), (220, 220));
    assert_eq!(
        report.histogram.dimensions(),
        (histogram::WIDTH, histogram::HEIGHT)
    );

    let factor = AnalysisParams::default().calibration_factor;
    let expected = (21.0 + 31.0 + 41.0) / 3.0 * factor;
    assert!(
        (report.average_length() - expected).abs() < 2.0 * factor,
        "average {} expected about {}",
        report.average_length(),
        expected
    );
}

#[test]
fn contour_pipeline_drops_grains_over_max_length() {
    let params = AnalysisParams {
        max_length_mm: 0.1,
        ..AnalysisParams::default()
    };
    let report = contour_algorithm(&dark_grains_on_light(), &params);
    assert_eq!(report.grain_count(), 1);
    assert!(report.grains[0].length_mm <= 0.1);
}

#[test]
fn contour_pipeline_draws_on_a_copy_of_the_input() {
    let image = dark_grains_on_light();
    let report = contour_algorithm(&image, &AnalysisParams::default());
    assert!(report.contours.pixels().any(|p| *p == CONTOUR_COLOR));
    assert!(report.ellipses.pixels().any(|p| *p == CONTOUR_ELLIPSE_COLOR));
    assert!(!image.to_rgb8().pixels().any(|p| *p == CONTOUR_COLOR));
}

#[test]
fn color_pipeline_selects_stained_grains_only() {
    let report = color_algorithm(&stained_grains_on_black(), &AnalysisParams::default(), 1.0)
        .expect("analysis");
    assert_eq!(report.algorithm, Algorithm::ColorAlg);
    assert_eq!(report.grain_count(), 2);
    assert!(report.ellipses.pixels().any(|p| *p == COLOR_ELLIPSE_COLOR));
    // the gray disc is not part of the mask
    assert_eq!(report.binary.get_pixel(80, 90).0, [0]);
    assert_eq!(report.binary.get_pixel(40, 40).0, [255]);
}

#[test]
fn color_pipeline_with_zero_saturation_finds_nothing() {
    let report = color_algorithm(&stained_grains_on_black(), &AnalysisParams::default(), 0.0)
        .expect("analysis");
    assert_eq!(report.grain_count(), 0);
    assert_eq!(report.average_length(), 0.0);
}

#[test]
fn color_pipeline_rejects_negative_saturation() {
    let err = color_algorithm(&stained_grains_on_black(), &AnalysisParams::default(), -0.5)
        .expect_err("should fail");
    assert!(matches!(err, AnalysisError::InvalidSaturation(_)));
}

#[test]
fn analyze_dispatches_on_algorithm() {
    let image = stained_grains_on_black();
    let params = AnalysisParams::default();
    let report = analyze(Algorithm::ContourAlg, &image, &params, -1.0).expect("saturation unused");
    assert_eq!(report.algorithm, Algorithm::ContourAlg);
    assert!(analyze(Algorithm::ColorAlg, &image, &params, -1.0).is_err());
}

#[test]
fn encoded_report_carries_png_images() {
    let report = contour_algorithm(&dark_grains_on_light(), &AnalysisParams::default());
    let response = encode_report(&report).expect("encode");
    assert_eq!(response.grain_count, 3);
    assert_eq!(response.average_length, report.average_length());

    let binary = STANDARD.decode(&response.binary_image).expect("base64");
    assert!(binary.starts_with(b"\x89PNG"));
    let decoded = image::load_from_memory(&binary).expect("png");
    assert_eq!((decoded.width(), decoded.height()), (220, 220));

    let histogram = STANDARD.decode(&response.histogram_image).expect("base64");
    let decoded = image::load_from_memory(&histogram).expect("png");
    assert_eq!(decoded.width(), histogram::WIDTH);
}

#[test]
fn pooled_lengths_render_one_chart() {
    let first = contour_algorithm(&dark_grains_on_light(), &AnalysisParams::default());
    let mut pooled = first.lengths_mm();
    pooled.extend([0.05, 0.07]);

    let png = histogram_png(&pooled, 60).expect("encode");
    let decoded = image::load_from_memory(&png).expect("png");
    assert_eq!(
        (decoded.width(), decoded.height()),
        (histogram::WIDTH, histogram::HEIGHT)
    );
    assert!(histogram_png(&[], 60).is_ok());
}
