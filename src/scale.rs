//! Linear rescaling.

/// Linearly map `value` from the range `min1..=max1` onto the range `min2..=max2`.
///
/// This is `min2 + (max2 - min2) * (value - min1) / (max1 - min1)`, arranged so that
/// the endpoints map exactly: `map_scale(min1, ..) == min2` and `map_scale(max1, ..) == max2`.
///
/// Values inside the source range never land outside the target range; values outside
/// it extrapolate linearly. Either range may be descending.
///
/// A degenerate source range (`min1 == max1`) maps every value to `min2`.
pub fn map_scale(value: f64, min1: f64, max1: f64, min2: f64, max2: f64) -> f64 {
    if min1 == max1 {
        return min2;
    }
    let t = (value - min1) / (max1 - min1);
    if t == 0.0 {
        return min2;
    }
    if t == 1.0 {
        return max2;
    }
    let scaled = min2 + (max2 - min2) * t;
    if (0.0..=1.0).contains(&t) {
        let (low, high) = if min2 <= max2 {
            (min2, max2)
        } else {
            (max2, min2)
        };
        scaled.clamp(low, high)
    } else {
        scaled
    }
}

/// Values this close to a half are treated as exactly half when rounding.
const TIE_EPSILON: f64 = 1e-9;

/// Round to the nearest integer, sending exact halves to the even neighbour.
///
/// Values within a hair of a half count as a tie, so `1.4999999999999998` and `1.5`
/// round alike.
pub fn round_half_even(value: f64) -> i64 {
    let floor = value.floor();
    if (value - floor - 0.5).abs() <= TIE_EPSILON {
        let floor = floor as i64;
        if floor.rem_euclid(2) == 0 {
            floor
        } else {
            floor + 1
        }
    } else {
        value.round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_identity() {
        for value in 0..=10 {
            let value = value as f64;
            assert_eq!(map_scale(value, 0.0, 10.0, 0.0, 10.0), value);
        }
    }

    #[test]
    fn test_midpoint() {
        assert_relative_eq!(map_scale(5.0, 0.0, 10.0, 100.0, 200.0), 150.0);
        assert_relative_eq!(map_scale(1.0, 0.0, 3.0, 0.0, 30.0), 10.0);
    }

    #[test]
    fn test_descending_target() {
        assert_eq!(map_scale(0.0, 0.0, 4.0, 8.0, 0.0), 8.0);
        assert_eq!(map_scale(4.0, 0.0, 4.0, 8.0, 0.0), 0.0);
        assert_relative_eq!(map_scale(1.0, 0.0, 4.0, 8.0, 0.0), 6.0);
    }

    #[test]
    fn test_extrapolates() {
        assert_relative_eq!(map_scale(-1.0, 0.0, 3.0, 0.0, 3.0), -1.0);
        assert_relative_eq!(map_scale(4.0, 0.0, 3.0, 0.0, 6.0), 8.0);
    }

    #[test]
    fn test_degenerate_source() {
        assert_eq!(map_scale(7.0, 2.0, 2.0, -3.0, 5.0), -3.0);
    }

    #[test]
    fn test_awkward_endpoints_are_exact() {
        assert_eq!(map_scale(0.3, 0.1, 0.3, 0.1, 0.7), 0.7);
        assert_eq!(map_scale(0.1, 0.1, 0.3, 0.1, 0.7), 0.1);
    }

    #[test]
    fn test_round_half_even() {
        let cases = [
            (0.5, 0),
            (1.5, 2),
            (2.5, 2),
            (-0.5, 0),
            (-1.5, -2),
            (1.4999999999999998, 2),
            (1.3, 1),
            (1.7, 2),
            (-1.3, -1),
        ];
        for (value, expect) in cases {
            assert_eq!(round_half_even(value), expect, "value = {}", value);
        }
    }

    proptest! {
        #[test]
        fn test_in_range_maps_in_range(
            min1 in -1.0e6..1.0e6f64,
            span1 in 1.0e-3..1.0e6f64,
            t in 0.0..=1.0f64,
            min2 in -1.0e6..1.0e6f64,
            span2 in 0.0..1.0e6f64,
        ) {
            let max1 = min1 + span1;
            let max2 = min2 + span2;
            let value = (min1 + span1 * t).min(max1);
            let scaled = map_scale(value, min1, max1, min2, max2);
            prop_assert!(scaled >= min2 && scaled <= max2, "{} not in [{}, {}]", scaled, min2, max2);
        }

        #[test]
        fn test_endpoints_are_exact(
            min1 in -1.0e6..1.0e6f64,
            span1 in 1.0e-3..1.0e6f64,
            min2 in -1.0e6..1.0e6f64,
            max2 in -1.0e6..1.0e6f64,
        ) {
            let max1 = min1 + span1;
            prop_assume!(min1 != max1);
            prop_assert_eq!(map_scale(min1, min1, max1, min2, max2), min2);
            prop_assert_eq!(map_scale(max1, min1, max1, min2, max2), max2);
        }
    }
}
