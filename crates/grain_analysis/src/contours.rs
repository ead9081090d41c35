use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};

use crate::drawing::draw_closed_polyline;

/// Traced outer border of one foreground blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub points: Vec<(i32, i32)>,
}

impl Outline {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_f64(&self) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|&(x, y)| [x as f64, y as f64])
            .collect()
    }
}

/// Outer borders of the top-level blobs of a binary image (non-zero is
/// foreground). Borders of blobs nested inside holes are skipped, as are
/// borders with fewer than `min_points` points.
pub fn external_contours(binary: &GrayImage, min_points: usize) -> Vec<Outline> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(is_external)
        .filter(|c| c.points.len() >= min_points)
        .map(|c| Outline {
            points: c.points.iter().map(|p| (p.x, p.y)).collect(),
        })
        .collect()
}

fn is_external(contour: &Contour<i32>) -> bool {
    matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none()
}

pub fn draw_outlines(canvas: &mut RgbImage, outlines: &[Outline], color: Rgb<u8>, thickness: u32) {
    for outline in outlines {
        let points: Vec<(f32, f32)> = outline
            .points
            .iter()
            .map(|&(x, y)| (x as f32, y as f32))
            .collect();
        draw_closed_polyline(canvas, &points, color, thickness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    #[test]
    fn skips_blobs_nested_in_holes_and_tiny_specks() {
        let mut binary = GrayImage::new(80, 80);
        // ring: outer square with a hole, and a blob inside the hole
        draw_filled_rect_mut(&mut binary, Rect::at(10, 10).of_size(50, 50), Luma([255]));
        draw_filled_rect_mut(&mut binary, Rect::at(20, 20).of_size(30, 30), Luma([0]));
        draw_filled_rect_mut(&mut binary, Rect::at(30, 30).of_size(8, 8), Luma([255]));
        // single pixel speck
        binary.put_pixel(70, 70, Luma([255]));

        let all = external_contours(&binary, 1);
        assert_eq!(all.len(), 2, "ring and speck are top-level");

        let fitted = external_contours(&binary, 5);
        assert_eq!(fitted.len(), 1);
        assert!(fitted[0].points.contains(&(10, 10)));
    }
}
