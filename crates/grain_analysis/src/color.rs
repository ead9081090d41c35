//! Colour-space conversion and thresholding.
//!
//! HSV values follow the common 8-bit convention: hue in `[0, 180)` (degrees
//! halved), saturation and value in `[0, 255]`. The grain colour ranges below
//! are expressed in that convention.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Per-pixel HSV triple stored in an RGB buffer (`[h, s, v]`).
pub type HsvImage = RgbImage;

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Cyan-stained grains.
pub const CYAN_GRAINS: HsvRange = HsvRange::new([30, 100, 100], [85, 255, 255]);
/// Red-stained grains. The hue ceiling is above the hue domain on purpose: it
/// accepts everything from 130 up to the wrap-around.
pub const RED_GRAINS: HsvRange = HsvRange::new([130, 50, 50], [200, 255, 255]);

pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0;
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let mut h8 = (h / 2.0).round() as u16;
    if h8 >= 180 {
        h8 -= 180;
    }
    [h8 as u8, s.round() as u8, max as u8]
}

pub fn to_hsv(image: &RgbImage) -> HsvImage {
    let mut hsv = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(hsv.pixels_mut()) {
        *dst = Rgb(rgb_to_hsv(*src));
    }
    hsv
}

/// Scales the saturation channel in place, saturating at 255.
pub fn scale_saturation(hsv: &mut HsvImage, factor: f64) {
    for pixel in hsv.pixels_mut() {
        let scaled = (pixel.0[1] as f64 * factor).round();
        pixel.0[1] = scaled.clamp(0.0, 255.0) as u8;
    }
}

/// 255 where the pixel falls in any of `ranges`, 0 elsewhere.
pub fn in_ranges(hsv: &HsvImage, ranges: &[HsvRange]) -> GrayImage {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
        if ranges.iter().any(|range| range.contains(src.0)) {
            *dst = Luma([255]);
        }
    }
    mask
}

/// Luma with BT.601 weights, the weighting the threshold levels were tuned on.
pub fn grayscale(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        *dst = Luma([y.round().clamp(0.0, 255.0) as u8]);
    }
    gray
}

/// Dark pixels become foreground: `v > level` maps to 0, everything else to 255.
pub fn threshold_inverse(image: &GrayImage, level: u8) -> GrayImage {
    let mut binary = image.clone();
    for p in binary.pixels_mut() {
        *p = if p.0[0] > level { Luma([0]) } else { Luma([255]) };
    }
    binary
}
