//! Visual masking: local activity raises the visibility threshold.
//!
//! Busy texture hides small errors; smooth areas hide nothing. From a
//! pyramid's HF/UHF planes an activity map is built, softened, eroded
//! toward nearby smooth regions, and mapped through saturating response
//! curves into per-pixel weights for the two error pathways the
//! calibration distinguishes: band (AC) error and low-frequency (DC)
//! error.

use crate::blur::gaussian_blur;
use crate::consts::{
    GLOBAL_SCALE, MASK_AC_MUL, MASK_AC_OFFSET, MASK_AC_SCALER, MASK_BIAS, MASK_COMBINE_MULS,
    MASK_DC_MUL, MASK_DC_OFFSET, MASK_DC_SCALER, MASK_MUL, MASK_RADIUS,
};
use crate::image::ImageF;
use crate::pyramid::Pyramid;
use rayon::prelude::*;

/// Per-pixel visibility weights derived from one source image.
///
/// Both planes are strictly positive and non-increasing in local contrast,
/// so dividing differences through them can never blow up and masking can
/// only ever attenuate.
#[derive(Debug, Clone)]
pub struct MaskImage {
    /// Weight applied to accumulated band (AC) error.
    pub ac: ImageF,
    /// Weight applied to low-frequency (DC) error.
    pub dc: ImageF,
}

impl MaskImage {
    #[must_use]
    pub fn width(&self) -> usize {
        self.ac.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.ac.height()
    }
}

/// Folds the HF and UHF planes into a single activity magnitude.
///
/// Only X and Y take part; blue carries no fine-detail band.
fn combine_channels(hf: &[ImageF; 2], uhf: &[ImageF; 2]) -> ImageF {
    let width = hf[0].width();
    let height = hf[0].height();
    let mut out = ImageF::new(width, height);

    out.par_rows_mut().for_each(|(y, row)| {
        let x_hf = hf[0].row(y);
        let x_uhf = uhf[0].row(y);
        let y_hf = hf[1].row(y);
        let y_uhf = uhf[1].row(y);
        for x in 0..width {
            let xdiff = (x_uhf[x] + x_hf[x]) * MASK_COMBINE_MULS[0];
            let ydiff = y_uhf[x] * MASK_COMBINE_MULS[1] + y_hf[x] * MASK_COMBINE_MULS[2];
            row[x] = (xdiff * xdiff + ydiff * ydiff).sqrt();
        }
    });

    out
}

/// Sqrt-shapes activity so its increments are perceptually uniform.
fn diff_precompute(activity: &mut ImageF) {
    let bias = MASK_MUL * MASK_BIAS;
    let sqrt_bias = bias.sqrt();
    activity.par_rows_mut().for_each(|(_, row)| {
        for v in row.iter_mut() {
            *v = (MASK_MUL * v.abs() + bias).sqrt() - sqrt_bias;
        }
    });
}

/// Keeps the three smallest of the values fed through it.
#[inline]
fn store_min3(v: f32, min: &mut [f32; 3]) {
    if v < min[2] {
        if v < min[0] {
            min[2] = min[1];
            min[1] = min[0];
            min[0] = v;
        } else if v < min[1] {
            min[2] = min[1];
            min[1] = v;
        } else {
            min[2] = v;
        }
    }
}

/// Soft erosion: pulls activity toward the smoothest nearby region, so a
/// smooth patch next to texture stays unmasked.
fn fuzzy_erosion(from: &ImageF) -> ImageF {
    const STEP: usize = 3;
    let width = from.width();
    let height = from.height();
    let mut out = ImageF::new(width, height);

    out.par_rows_mut().for_each(|(y, row_out)| {
        let row_c = from.row(y);
        let row_up = (y >= STEP).then(|| from.row(y - STEP));
        let row_dn = (y + STEP < height).then(|| from.row(y + STEP));

        for x in 0..width {
            let mut min = [row_c[x], 2.0 * row_c[x], 2.0 * row_c[x]];

            if x >= STEP {
                store_min3(row_c[x - STEP], &mut min);
                if let Some(r) = row_up {
                    store_min3(r[x - STEP], &mut min);
                }
                if let Some(r) = row_dn {
                    store_min3(r[x - STEP], &mut min);
                }
            }
            if x + STEP < width {
                store_min3(row_c[x + STEP], &mut min);
                if let Some(r) = row_up {
                    store_min3(r[x + STEP], &mut min);
                }
                if let Some(r) = row_dn {
                    store_min3(r[x + STEP], &mut min);
                }
            }
            if let Some(r) = row_up {
                store_min3(r[x], &mut min);
            }
            if let Some(r) = row_dn {
                store_min3(r[x], &mut min);
            }

            row_out[x] = 0.45 * min[0] + 0.3 * min[1] + 0.25 * min[2];
        }
    });

    out
}

/// AC response curve: positive, strictly decreasing in local contrast.
#[inline]
pub(crate) fn mask_ac(delta: f64) -> f64 {
    let c = MASK_AC_MUL / (MASK_AC_SCALER * delta + MASK_AC_OFFSET);
    let v = GLOBAL_SCALE * (1.0 + c);
    v * v
}

/// DC response curve, same shape with its own calibration.
#[inline]
pub(crate) fn mask_dc(delta: f64) -> f64 {
    let c = MASK_DC_MUL / (MASK_DC_SCALER * delta + MASK_DC_OFFSET);
    let v = GLOBAL_SCALE * (1.0 + c);
    v * v
}

/// Builds the masking image for one pyramid.
#[must_use]
pub fn compute_mask(pyramid: &Pyramid) -> MaskImage {
    let mut activity = combine_channels(&pyramid.hf, &pyramid.uhf);
    diff_precompute(&mut activity);
    let blurred = gaussian_blur(&activity, MASK_RADIUS);
    let eroded = fuzzy_erosion(&blurred);

    let width = eroded.width();
    let mut ac = ImageF::new(width, eroded.height());
    let mut dc = ImageF::new(width, eroded.height());

    ac.par_rows_mut()
        .zip(dc.par_rows_mut())
        .for_each(|((y, row_ac), (_, row_dc))| {
            let row_e = eroded.row(y);
            for x in 0..width {
                let delta = f64::from(row_e[x]);
                row_ac[x] = mask_ac(delta) as f32;
                row_dc[x] = mask_dc(delta) as f32;
            }
        });

    MaskImage { ac, dc }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image3F;
    use crate::pyramid::separate_frequencies;

    #[test]
    fn store_min3_keeps_order() {
        let mut min = [10.0f32, 20.0, 30.0];
        store_min3(5.0, &mut min);
        assert_eq!(min, [5.0, 10.0, 20.0]);
        store_min3(15.0, &mut min);
        assert_eq!(min, [5.0, 10.0, 15.0]);
        store_min3(100.0, &mut min);
        assert_eq!(min, [5.0, 10.0, 15.0]);
    }

    #[test]
    fn curves_are_positive_and_non_increasing() {
        let samples = [0.0, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0];
        for pair in samples.windows(2) {
            assert!(mask_ac(pair[0]) > 0.0);
            assert!(mask_dc(pair[0]) > 0.0);
            assert!(mask_ac(pair[1]) <= mask_ac(pair[0]));
            assert!(mask_dc(pair[1]) <= mask_dc(pair[0]));
        }
        assert!(mask_ac(1e9).is_finite());
        assert!(mask_ac(1e9) > 0.0);
    }

    #[test]
    fn erosion_flattens_spikes() {
        let mut img = ImageF::filled(16, 16, 1.0);
        img.set(8, 8, 10.0);
        let eroded = fuzzy_erosion(&img);
        // The spike collapses toward its smooth neighborhood...
        assert!(eroded.get(8, 8) < 2.0);
        // ...while uniform regions pass through unchanged.
        assert!((eroded.get(2, 12) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn textured_image_masks_harder_than_flat() {
        let flat = {
            let p = ImageF::filled(32, 32, 8.0);
            Image3F::from_planes(p.clone(), p.clone(), p)
        };
        let mut textured = flat.clone();
        for y in 0..32 {
            for x in 0..32 {
                let v = if (x + y) % 2 == 0 { 10.0 } else { 6.0 };
                textured.plane_mut(1).set(x, y, v);
            }
        }

        let mask_flat = compute_mask(&separate_frequencies(&flat));
        let mask_tex = compute_mask(&separate_frequencies(&textured));

        // More activity -> lower visibility weight in the busy interior.
        assert!(mask_tex.ac.get(16, 16) <= mask_flat.ac.get(16, 16));
        assert!(mask_tex.dc.get(16, 16) <= mask_flat.dc.get(16, 16));
    }
}
