//! Reduction of a difference map to a scalar, and the fuzzy quality class.
//!
//! Pooling uses an order-3 norm: high enough that a patch of clearly
//! visible error dominates acres of near-threshold noise, low enough that
//! a single outlier pixel cannot carry the whole score the way a maximum
//! would. The fuzzy class maps the score onto a continuous [0, 2] quality
//! axis for optimizers that need a smooth objective around the class
//! boundary.

use crate::consts::{FUZZY_M0, FUZZY_SCALER, FUZZY_WIDTH_DOWN, FUZZY_WIDTH_UP};
use crate::image::ImageF;

/// Order-p pooled norm of a difference map: `(sum(v^p) / n)^(1/p)`.
///
/// The reduction is sequential in row order so the result is independent
/// of thread count.
#[must_use]
pub fn pnorm(diffmap: &ImageF, p: f64) -> f64 {
    let n = diffmap.width() * diffmap.height();
    if n == 0 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for y in 0..diffmap.height() {
        for &v in diffmap.row(y) {
            sum += f64::from(v).powf(p);
        }
    }
    (sum / n as f64).powf(1.0 / p)
}

/// The engine's scalar score: the order-3 pooled norm of the map.
#[must_use]
pub fn score_from_diffmap(diffmap: &ImageF) -> f64 {
    pnorm(diffmap, 3.0)
}

/// Continuous quality class in [0, 2]: near 2 for a perfect match,
/// falling through the class boundary at score 1.0 toward 0 for clearly
/// different images.
///
/// Two logistics share the boundary value so the curve is continuous
/// there; the slopes are tuned for optimizer behavior, not for rater
/// probabilities.
#[must_use]
pub fn fuzzy_class(score: f64) -> f64 {
    if score < 1.0 {
        let val = FUZZY_M0 / (1.0 + ((score - 1.0) * FUZZY_WIDTH_DOWN).exp());
        // Stretch [1, 2] onto [scaler, 2].
        (val - 1.0) * (2.0 - FUZZY_SCALER) + FUZZY_SCALER
    } else {
        let val = FUZZY_M0 / (1.0 + ((score - 1.0) * FUZZY_WIDTH_UP).exp());
        val * FUZZY_SCALER
    }
}

/// The score whose [`fuzzy_class`] equals `seek`: the closed-form inverse
/// of the forward mapping on its valid domain `(0, fuzzy_class(0))`.
///
/// Out-of-domain requests clamp: anything at or above the perfect-match
/// class returns 0.0, and non-positive targets return infinity.
#[must_use]
pub fn fuzzy_inverse(seek: f64) -> f64 {
    if seek >= fuzzy_class(0.0) {
        return 0.0;
    }
    if seek <= 0.0 {
        return f64::INFINITY;
    }
    if seek > FUZZY_SCALER {
        let val = (seek - FUZZY_SCALER) / (2.0 - FUZZY_SCALER) + 1.0;
        1.0 + (FUZZY_M0 / val - 1.0).ln() / FUZZY_WIDTH_DOWN
    } else {
        1.0 + (FUZZY_M0 * FUZZY_SCALER / seek - 1.0).ln() / FUZZY_WIDTH_UP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pnorm_of_zero_map_is_zero() {
        let map = ImageF::new(64, 64);
        assert_eq!(pnorm(&map, 3.0), 0.0);
        assert_eq!(score_from_diffmap(&map), 0.0);
    }

    #[test]
    fn pnorm_of_constant_map_is_the_constant() {
        let map = ImageF::filled(32, 32, 0.75);
        assert!((pnorm(&map, 3.0) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn pooling_respects_dominance() {
        let mut a = ImageF::filled(16, 16, 0.3);
        let b = ImageF::filled(16, 16, 0.3);
        a.set(5, 5, 0.9);
        a.set(10, 2, 0.4);
        assert!(pnorm(&a, 3.0) >= pnorm(&b, 3.0));
    }

    #[test]
    fn single_outlier_does_not_dominate() {
        let mut spike = ImageF::new(64, 64);
        spike.set(10, 10, 8.0);
        let spread = ImageF::filled(64, 64, 0.5);
        // A lone bad pixel scores, but far below its own magnitude...
        let s = pnorm(&spike, 3.0);
        assert!(s > 0.0);
        assert!(s < 8.0 / 10.0);
        // ...and widespread moderate error is not ignored.
        assert!((pnorm(&spread, 3.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn class_is_monotonically_decreasing() {
        let mut prev = fuzzy_class(0.0);
        for i in 1..=40 {
            let cur = fuzzy_class(i as f64 * 0.1);
            assert!(cur < prev, "class must fall as the score grows");
            prev = cur;
        }
    }

    #[test]
    fn class_range_and_boundary() {
        assert!(fuzzy_class(0.0) > 1.9);
        assert!(fuzzy_class(0.0) <= 2.0);
        assert!((fuzzy_class(1.0) - FUZZY_SCALER).abs() < 1e-12);
        assert!(fuzzy_class(10.0) < 0.01);
        // Continuity across the boundary.
        let below = fuzzy_class(1.0 - 1e-9);
        let above = fuzzy_class(1.0 + 1e-9);
        assert!((below - above).abs() < 1e-6);
    }

    #[test]
    fn inverse_round_trips() {
        for &class in &[0.25, 0.5, FUZZY_SCALER, 1.0, 1.5, 1.9] {
            let score = fuzzy_inverse(class);
            let back = fuzzy_class(score);
            assert!(
                (back - class).abs() < 1e-9,
                "round trip at class {class}: score {score}, back {back}"
            );
        }
        for &score in &[0.1, 0.5, 1.0, 1.5, 2.0] {
            let class = fuzzy_class(score);
            let back = fuzzy_inverse(class);
            assert!(
                (back - score).abs() < 1e-9,
                "round trip at score {score}: class {class}, back {back}"
            );
        }
    }

    #[test]
    fn inverse_clamps_outside_domain() {
        assert_eq!(fuzzy_inverse(2.0), 0.0);
        assert_eq!(fuzzy_inverse(fuzzy_class(0.0)), 0.0);
        assert!(fuzzy_inverse(-0.5).is_infinite());
    }

    #[test]
    fn tool_thresholds_are_ordered() {
        let good = fuzzy_inverse(1.5);
        let bad = fuzzy_inverse(0.5);
        assert!(good > 0.0);
        assert!(bad > good);
    }
}
