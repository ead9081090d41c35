//! Grain-size distribution chart: density histogram with a Gaussian KDE.

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};

use crate::drawing::draw_polyline;

pub const WIDTH: u32 = 1000;
pub const HEIGHT: u32 = 600;

const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 60;
const GRID_LINES: u32 = 5;
const KDE_SAMPLES: usize = 400;
/// KDE support extends this many bandwidths past the data.
const KDE_CUT: f64 = 3.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const AXES: Rgb<u8> = Rgb([0, 0, 0]);
// blue at 70% over white
const BAR_FILL: Rgb<u8> = Rgb([77, 77, 255]);
const BAR_EDGE: Rgb<u8> = Rgb([0, 0, 0]);
const KDE_LINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Equal-width bins over the data range, normalised to unit area.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub density: Vec<f64>,
}

impl Histogram {
    pub fn new(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for &v in values {
            // the last bin is closed on the right
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        let norm = values.len() as f64 * width;
        let density = counts.iter().map(|&c| c as f64 / norm).collect();
        Some(Self { edges, density })
    }

    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }
}

/// Gaussian kernel density estimate with Scott's bandwidth.
#[derive(Debug, Clone, PartialEq)]
pub struct Kde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl Kde {
    /// `None` for fewer than two samples or zero variance.
    pub fn new(samples: &[f64]) -> Option<Self> {
        let n = samples.len();
        if n < 2 {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let std = var.sqrt();
        if std <= 0.0 || !std.is_finite() {
            return None;
        }
        let bandwidth = std * (n as f64).powf(-0.2);
        Some(Self {
            samples: samples.to_vec(),
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn density(&self, x: f64) -> f64 {
        let h = self.bandwidth;
        let norm = 1.0 / (self.samples.len() as f64 * h * (2.0 * std::f64::consts::PI).sqrt());
        self.samples
            .iter()
            .map(|s| {
                let z = (x - s) / h;
                (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            * norm
    }

    pub fn support(&self) -> (f64, f64) {
        let lo = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lo - KDE_CUT * self.bandwidth, hi + KDE_CUT * self.bandwidth)
    }
}

struct PlotArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x_range: (f64, f64),
    y_max: f64,
}

impl PlotArea {
    fn x(&self, value: f64) -> f32 {
        let (lo, hi) = self.x_range;
        (self.left + (value - lo) / (hi - lo) * self.width) as f32
    }

    fn y(&self, value: f64) -> f32 {
        (self.top + self.height - value / self.y_max * self.height) as f32
    }
}

/// Renders the size distribution of `lengths_mm`. Empty input gives an empty
/// chart with axes and grid only.
pub fn render(lengths_mm: &[f64], bins: usize) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let histogram = Histogram::new(lengths_mm, bins);
    let kde = Kde::new(lengths_mm);

    let mut x_range = histogram.as_ref().map(Histogram::range).unwrap_or((0.0, 1.0));
    if let Some(kde) = &kde {
        let (lo, hi) = kde.support();
        x_range = (x_range.0.min(lo), x_range.1.max(hi));
    }
    let kde_curve: Vec<(f64, f64)> = kde
        .as_ref()
        .map(|kde| {
            let (lo, hi) = kde.support();
            (0..KDE_SAMPLES)
                .map(|i| {
                    let x = lo + (hi - lo) * i as f64 / (KDE_SAMPLES - 1) as f64;
                    (x, kde.density(x))
                })
                .collect()
        })
        .unwrap_or_default();

    let bar_max = histogram
        .as_ref()
        .map(|h| h.density.iter().copied().fold(0.0, f64::max))
        .unwrap_or(0.0);
    let kde_max = kde_curve.iter().map(|p| p.1).fold(0.0, f64::max);
    let y_max = bar_max.max(kde_max).max(f64::EPSILON) * 1.05;

    let area = PlotArea {
        left: MARGIN_LEFT as f64,
        top: MARGIN_TOP as f64,
        width: plot_w as f64,
        height: plot_h as f64,
        x_range,
        y_max,
    };

    draw_grid(&mut canvas, &area);

    if let Some(histogram) = &histogram {
        for (i, density) in histogram.density.iter().enumerate() {
            if *density <= 0.0 {
                continue;
            }
            let x0 = area.x(histogram.edges[i]).round() as i32;
            let x1 = area.x(histogram.edges[i + 1]).round() as i32;
            let y0 = area.y(*density).round() as i32;
            let y1 = area.y(0.0).round() as i32;
            let (w, h) = ((x1 - x0).max(1) as u32, (y1 - y0).max(1) as u32);
            let bar = Rect::at(x0, y0).of_size(w, h);
            draw_filled_rect_mut(&mut canvas, bar, BAR_FILL);
            draw_hollow_rect_mut(&mut canvas, bar, BAR_EDGE);
        }
    }

    if !kde_curve.is_empty() {
        let points: Vec<(f32, f32)> = kde_curve
            .iter()
            .map(|&(x, d)| (area.x(x), area.y(d)))
            .collect();
        draw_polyline(&mut canvas, &points, KDE_LINE);
        let shifted: Vec<(f32, f32)> = points.iter().map(|&(x, y)| (x, y - 1.0)).collect();
        draw_polyline(&mut canvas, &shifted, KDE_LINE);
    }

    draw_hollow_rect_mut(
        &mut canvas,
        Rect::at(MARGIN_LEFT as i32, MARGIN_TOP as i32).of_size(plot_w, plot_h),
        AXES,
    );
    canvas
}

fn draw_grid(canvas: &mut RgbImage, area: &PlotArea) {
    let (left, top) = (area.left as f32, area.top as f32);
    let (right, bottom) = (left + area.width as f32, top + area.height as f32);
    for i in 1..GRID_LINES {
        let t = i as f32 / GRID_LINES as f32;
        let x = left + t * area.width as f32;
        let y = top + t * area.height as f32;
        draw_line_segment_mut(canvas, (x, top), (x, bottom), GRID);
        draw_line_segment_mut(canvas, (left, y), (right, y), GRID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_density_integrates_to_one() {
        let values = [0.1, 0.12, 0.2, 0.2, 0.35, 0.4];
        let histogram = Histogram::new(&values, 6).expect("histogram");
        let width = histogram.edges[1] - histogram.edges[0];
        let area: f64 = histogram.density.iter().map(|d| d * width).sum();
        assert!((area - 1.0).abs() < 1e-9);
        // maximum falls in the last bin, not past it
        assert!(histogram.density[5] > 0.0);
    }

    #[test]
    fn constant_data_gets_unit_wide_range() {
        let histogram = Histogram::new(&[0.2, 0.2], 4).expect("histogram");
        let (lo, hi) = histogram.range();
        assert!((lo - -0.3).abs() < 1e-12);
        assert!((hi - 0.7).abs() < 1e-12);
        assert!(Kde::new(&[0.2, 0.2]).is_none());
    }

    #[test]
    fn kde_peaks_at_the_mode() {
        let kde = Kde::new(&[1.0, 1.1, 0.9, 1.0, 3.0]).expect("kde");
        assert!(kde.density(1.0) > kde.density(2.0));
        assert!(kde.density(1.0) > kde.density(3.0));
        assert!(kde.density(3.0) > kde.density(5.0));
    }

    #[test]
    fn renders_fixed_size_chart_even_without_data() {
        let empty = render(&[], 60);
        assert_eq!(empty.dimensions(), (WIDTH, HEIGHT));
        // the data area has no bar colour
        assert!(!empty.pixels().any(|p| *p == BAR_FILL));

        let chart = render(&[0.1, 0.15, 0.15, 0.2, 0.3], 60);
        assert!(chart.pixels().any(|p| *p == BAR_FILL));
        assert!(chart.pixels().any(|p| *p == KDE_LINE));
    }
}
