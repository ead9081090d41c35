//! Ellipse fitting from the area moments of a closed contour.
//!
//! The contour is treated as a simple polygon. Its area, centroid and second
//! central moments are integrated exactly with Green's theorem; the ellipse
//! with the same moments has semi-axes `2·sqrt(λ)` for the eigenvalues `λ` of
//! the normalised covariance.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::drawing::draw_closed_polyline;

/// Polygons with less area than this (in square pixels) are degenerate.
const MIN_AREA: f64 = 1e-6;

/// Geometric ellipse parameters in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub cx: f64,
    pub cy: f64,
    /// Semi-major axis length.
    pub a: f64,
    /// Semi-minor axis length.
    pub b: f64,
    /// Rotation of the major axis from +x, in radians.
    pub angle: f64,
}

impl Ellipse {
    pub fn is_valid(&self) -> bool {
        self.a > 0.0
            && self.b > 0.0
            && self.a.is_finite()
            && self.b.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.angle.is_finite()
    }

    /// Full length of the major axis.
    pub fn major_axis(&self) -> f64 {
        2.0 * self.a
    }

    /// Full length of the minor axis.
    pub fn minor_axis(&self) -> f64 {
        2.0 * self.b
    }

    /// `n` points evenly spaced in parameter angle along the outline.
    pub fn outline(&self, n: usize) -> Vec<(f32, f32)> {
        let (sin_t, cos_t) = self.angle.sin_cos();
        (0..n)
            .map(|i| {
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let (ex, ey) = (self.a * t.cos(), self.b * t.sin());
                let x = self.cx + ex * cos_t - ey * sin_t;
                let y = self.cy + ex * sin_t + ey * cos_t;
                (x as f32, y as f32)
            })
            .collect()
    }

    pub fn draw(&self, canvas: &mut RgbImage, color: Rgb<u8>, thickness: u32) {
        let segments = ((self.a + self.b) * 2.0).clamp(24.0, 360.0) as usize;
        draw_closed_polyline(canvas, &self.outline(segments), color, thickness);
    }
}

/// Fits an ellipse to a closed contour. Returns `None` for fewer than three
/// points or a contour that encloses no area.
pub fn fit_ellipse(points: &[[f64; 2]]) -> Option<Ellipse> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    // Shift to the vertex mean so the sums below stay well conditioned.
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n as f64;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n as f64;

    let (mut area2, mut sx, mut sy) = (0.0, 0.0, 0.0);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let (x0, y0) = (points[i][0] - mx, points[i][1] - my);
        let (x1, y1) = (points[(i + 1) % n][0] - mx, points[(i + 1) % n][1] - my);
        let cross = x0 * y1 - x1 * y0;
        area2 += cross;
        sx += (x0 + x1) * cross;
        sy += (y0 + y1) * cross;
        sxx += (x0 * x0 + x0 * x1 + x1 * x1) * cross;
        syy += (y0 * y0 + y0 * y1 + y1 * y1) * cross;
        sxy += (x0 * y1 + 2.0 * x0 * y0 + 2.0 * x1 * y1 + x1 * y0) * cross;
    }

    let area = area2 / 2.0;
    if area.abs() < MIN_AREA {
        return None;
    }

    // Orientation cancels: every integral and the area flip sign together.
    let cx = sx / (6.0 * area);
    let cy = sy / (6.0 * area);
    let mu20 = sxx / (12.0 * area) - cx * cx;
    let mu02 = syy / (12.0 * area) - cy * cy;
    let mu11 = sxy / (24.0 * area) - cx * cy;

    let mean = (mu20 + mu02) / 2.0;
    let spread = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
    let (l1, l2) = (mean + spread, mean - spread);
    if l2 <= 0.0 {
        return None;
    }

    let ellipse = Ellipse {
        cx: cx + mx,
        cy: cy + my,
        a: 2.0 * l1.sqrt(),
        b: 2.0 * l2.sqrt(),
        angle: 0.5 * (2.0 * mu11).atan2(mu20 - mu02),
    };
    ellipse.is_valid().then_some(ellipse)
}

#[cfg(test)]
#[path = "tests/ellipse_tests.rs"]
mod tests;
