use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

/// Draws a closed polyline. Thickness is emulated by repeating the outline
/// shifted by whole pixels.
pub fn draw_closed_polyline(
    canvas: &mut RgbImage,
    points: &[(f32, f32)],
    color: Rgb<u8>,
    thickness: u32,
) {
    if points.is_empty() {
        return;
    }
    let thickness = thickness.max(1);
    for dy in 0..thickness {
        for dx in 0..thickness {
            let (ox, oy) = (dx as f32, dy as f32);
            for i in 0..points.len() {
                let (x0, y0) = points[i];
                let (x1, y1) = points[(i + 1) % points.len()];
                draw_line_segment_mut(canvas, (x0 + ox, y0 + oy), (x1 + ox, y1 + oy), color);
            }
        }
    }
}

pub fn draw_polyline(canvas: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>) {
    for pair in points.windows(2) {
        draw_line_segment_mut(canvas, pair[0], pair[1], color);
    }
}
