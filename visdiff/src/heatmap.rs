//! False-color rendering of a difference map.
//!
//! The ramp walks black → blue → cyan → green at the "good" threshold,
//! yellow → red at the "bad" threshold, then through magenta and pastels
//! to white for the worst range, with a sqrt display gamma. Stateless and
//! pure: the same map and thresholds always render the same image.

use crate::image::ImageF;
use imgref::ImgVec;
use rgb::RGB8;

#[rustfmt::skip]
const RAMP: [[f64; 3]; 12] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0], // good threshold lands here
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 0.0], // bad threshold lands here
    [1.0, 0.0, 1.0],
    [0.5, 0.5, 1.0],
    [1.0, 0.5, 0.5],
    [1.0, 1.0, 0.5],
    [1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0], // repeated so the top of the range is solid
];

fn value_to_color(value: f64, good_threshold: f64, bad_threshold: f64) -> RGB8 {
    // Map [0, good] to the first 30% of the ramp, (good, bad] to the next
    // 15%, and everything above onto the remaining half.
    let pos = if value < good_threshold {
        (value / good_threshold) * 0.3
    } else if value < bad_threshold {
        0.3 + (value - good_threshold) / (bad_threshold - good_threshold) * 0.15
    } else {
        0.45 + (value - bad_threshold) / (bad_threshold * 12.0) * 0.5
    };

    let scaled = (pos * (RAMP.len() - 1) as f64).clamp(0.0, (RAMP.len() - 2) as f64);
    let ix = scaled as usize;
    let mix = scaled - ix as f64;

    let channel = |c: usize| {
        let v = mix * RAMP[ix + 1][c] + (1.0 - mix) * RAMP[ix][c];
        (255.0 * v.sqrt() + 0.5) as u8
    };
    RGB8::new(channel(0), channel(1), channel(2))
}

/// Renders a difference map as an 8-bit false-color image.
///
/// `good_threshold` and `bad_threshold` are in the same units as the map;
/// the tool derives them from [`crate::fuzzy_inverse`].
#[must_use]
pub fn render_heatmap(diffmap: &ImageF, good_threshold: f64, bad_threshold: f64) -> ImgVec<RGB8> {
    let width = diffmap.width();
    let height = diffmap.height();
    let mut pixels = Vec::with_capacity(width * height);

    for y in 0..height {
        for &v in diffmap.row(y) {
            pixels.push(value_to_color(f64::from(v), good_threshold, bad_threshold));
        }
    }

    ImgVec::new(pixels, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_black() {
        assert_eq!(value_to_color(0.0, 1.0, 2.0), RGB8::new(0, 0, 0));
    }

    #[test]
    fn good_threshold_is_green_dominant() {
        let c = value_to_color(1.0, 1.0, 2.0);
        assert_eq!(c.g, 255);
        assert_eq!(c.b, 0);
        assert!(c.r < c.g);
    }

    #[test]
    fn bad_threshold_is_red_dominant() {
        let c = value_to_color(2.0, 1.0, 2.0);
        assert_eq!(c.r, 255);
        assert_eq!(c.b, 0);
        assert!(c.g < c.r);
    }

    #[test]
    fn huge_values_saturate_to_white() {
        let c = value_to_color(1e6, 1.0, 2.0);
        assert_eq!(c, RGB8::new(255, 255, 255));
    }

    #[test]
    fn intermediate_values_are_colored() {
        // Spot checks between the anchors.
        let mid_good = value_to_color(0.5, 1.0, 2.0);
        assert!(mid_good.b > 0 || mid_good.g > 0);
        let between = value_to_color(1.5, 1.0, 2.0);
        assert!(between.r > 0 || between.g > 0);
    }

    #[test]
    fn renders_full_image() {
        let mut map = ImageF::new(16, 8);
        map.set(3, 2, 5.0);
        let img = render_heatmap(&map, 1.0, 2.0);
        assert_eq!(img.width(), 16);
        assert_eq!(img.height(), 8);
        assert_eq!(img[(0usize, 0usize)], RGB8::new(0, 0, 0));
        assert_ne!(img[(3usize, 2usize)], RGB8::new(0, 0, 0));
    }
}
