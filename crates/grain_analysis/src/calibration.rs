use crate::AnalysisError;

/// Millimetres per pixel from two image points a known distance apart.
pub fn millimetres_per_pixel(
    from: (f64, f64),
    to: (f64, f64),
    distance_mm: f64,
) -> Result<f64, AnalysisError> {
    if !(distance_mm.is_finite() && distance_mm > 0.0) {
        return Err(AnalysisError::InvalidDistance(distance_mm));
    }
    let pixels = (from.0 - to.0).hypot(from.1 - to.1);
    if pixels == 0.0 {
        return Err(AnalysisError::CoincidentPoints);
    }
    Ok(distance_mm / pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divides_real_distance_by_pixel_distance() {
        let factor = millimetres_per_pixel((0.0, 0.0), (300.0, 400.0), 10.0).expect("factor");
        assert!((factor - 0.02).abs() < 1e-12);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(matches!(
            millimetres_per_pixel((5.0, 5.0), (5.0, 5.0), 1.0),
            Err(AnalysisError::CoincidentPoints)
        ));
        assert!(matches!(
            millimetres_per_pixel((0.0, 0.0), (1.0, 0.0), 0.0),
            Err(AnalysisError::InvalidDistance(_))
        ));
    }
}
