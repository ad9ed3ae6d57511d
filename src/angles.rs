// src/angles.rs
//
// Planar joint angle used by every metric.

/// Angle at vertex `b` between rays b→a and b→c, in degrees within [0, 180].
///
/// Coincident points are not rejected; `atan2(0, 0)` contributes 0.
pub fn angle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let radians = (c.1 - b.1).atan2(c.0 - b.0) - (a.1 - b.1).atan2(a.0 - b.0);
    let mut degrees = radians.to_degrees().abs();

    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }

    degrees
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_right_angle() {
        assert!(approx_eq(angle((1.0, 0.0), (0.0, 0.0), (0.0, 1.0)), 90.0));
    }

    #[test]
    fn test_straight_line() {
        assert!(approx_eq(angle((-1.0, 0.0), (0.0, 0.0), (1.0, 0.0)), 180.0));
    }

    #[test]
    fn test_reflex_angle_is_reflected() {
        // 270 degrees of raw bearing difference folds back to 90
        let a = angle((0.0, -1.0), (0.0, 0.0), (-1.0, 0.0));
        assert!(approx_eq(a, 90.0));
    }

    #[test]
    fn test_angle_is_symmetric() {
        let points = [
            ((0.3, 0.2), (0.5, 0.5), (0.9, 0.4)),
            ((-4.0, 1.0), (2.0, 2.0), (3.0, -7.0)),
            ((10.0, 10.0), (0.0, 0.0), (-10.0, 9.0)),
            ((0.1, 0.9), (0.4, 0.4), (0.41, 0.95)),
        ];
        for (a, b, c) in points {
            assert!(approx_eq(angle(a, b, c), angle(c, b, a)));
        }
    }

    #[test]
    fn test_coincident_points_do_not_panic() {
        let value = angle((1.0, 1.0), (1.0, 1.0), (1.0, 1.0));
        assert!(value.is_finite());
    }
}
