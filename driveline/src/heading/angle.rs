//! Compass angle arithmetic.
//!
//! Headings live on a circle, so every comparison has to handle the 0°/360°
//! wraparound (e.g., 350° to 10° is +20°, not -340°).

/// Normalize an angle to [0, 360).
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed rotation from `from` to `to`, in (-180, 180].
#[inline]
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    let mut delta = to - from;
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Absolute angular distance between two headings, in [0, 180].
#[inline]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    shortest_delta(a, b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_degrees() {
        assert!((normalize_degrees(0.0) - 0.0).abs() < 1e-9);
        assert!((normalize_degrees(360.0) - 0.0).abs() < 1e-9);
        assert!((normalize_degrees(-90.0) - 270.0).abs() < 1e-9);
        assert!((normalize_degrees(450.0) - 90.0).abs() < 1e-9);
        assert!((normalize_degrees(-450.0) - 270.0).abs() < 1e-9);
        assert!(normalize_degrees(-1e-15) < 360.0);
    }

    #[test]
    fn test_shortest_delta_wraparound() {
        assert!((shortest_delta(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((shortest_delta(10.0, 350.0) + 20.0).abs() < 1e-9);
        assert!((shortest_delta(90.0, 80.0) + 10.0).abs() < 1e-9);
        assert!((shortest_delta(0.0, 180.0) - 180.0).abs() < 1e-9);
        assert!((shortest_delta(180.0, 0.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_angular_distance() {
        assert!((angular_distance(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angular_distance(90.0, 270.0) - 180.0).abs() < 1e-9);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_delta_in_half_open_range(from in -720.0..720.0_f64, to in -720.0..720.0_f64) {
                let delta = shortest_delta(from, to);
                prop_assert!(delta > -180.0 && delta <= 180.0, "delta {}", delta);
                // Applying the delta lands on the target modulo 360
                let landed = normalize_degrees(from + delta);
                let target = normalize_degrees(to);
                prop_assert!(angular_distance(landed, target) < 1e-6);
            }

            #[test]
            fn prop_normalized_in_range(angle in -1.0e6..1.0e6_f64) {
                let n = normalize_degrees(angle);
                prop_assert!((0.0..360.0).contains(&n));
            }
        }
    }
}
