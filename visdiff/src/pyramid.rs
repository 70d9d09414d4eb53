//! Multi-band frequency decomposition.
//!
//! An opsin-space image is split into four octave-spaced bands that
//! approximate the contrast sensitivity function: LF and MF carry all
//! three channels, HF and UHF only X and Y — blue-channel sensitivity to
//! the finest detail is negligible, so the model has no blue band there.

use crate::blur::gaussian_blur;
use crate::consts::{
    ADD_HF_RANGE, ADD_MF_RANGE, BMUL_LF_TO_VALS, MAXCLAMP_HF, MAXCLAMP_MUL, MAXCLAMP_UHF,
    MUL_Y_HF, MUL_Y_UHF, REMOVE_HF_RANGE, REMOVE_MF_RANGE, REMOVE_UHF_RANGE, SIGMA_HF, SIGMA_LF,
    SIGMA_UHF, SUPPRESS_S, SUPPRESS_XY, XMUL_LF_TO_VALS, YMUL_LF_TO_VALS, Y_TO_B_MUL_LF_TO_VALS,
};
use crate::image::{Image3F, ImageF};
use rayon::prelude::*;

/// Frequency decomposition of one opsin-space image.
///
/// Built once per source image and never mutated afterwards; a
/// [`crate::Comparator`] holds one for its reference and accepts
/// caller-built instances through its pyramid fast path.
#[derive(Debug, Clone)]
pub struct Pyramid {
    /// Ultra-high-frequency band, X and Y channels.
    pub uhf: [ImageF; 2],
    /// High-frequency band, X and Y channels.
    pub hf: [ImageF; 2],
    /// Mid-frequency band, all three channels.
    pub mf: Image3F,
    /// Low-frequency band in vals space, all three channels.
    pub lf: Image3F,
}

impl Pyramid {
    /// Decomposes an opsin-dynamics image into its frequency bands.
    #[must_use]
    pub fn new(xyb: &Image3F) -> Self {
        separate_frequencies(xyb)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.lf.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.lf.height()
    }
}

/// Zeroes a dead zone around zero and shifts the rest toward it.
#[inline]
fn remove_range_around_zero(v: f32, range: f32) -> f32 {
    if v > range {
        v - range
    } else if v < -range {
        v + range
    } else {
        0.0
    }
}

/// Doubles values inside the range and shifts the rest away from zero.
#[inline]
fn amplify_range_around_zero(v: f32, range: f32) -> f32 {
    if v > range {
        v + range
    } else if v < -range {
        v - range
    } else {
        v * 2.0
    }
}

/// Soft clamp: past the knee, magnitude grows with a reduced slope.
#[inline]
fn maximum_clamp(v: f32, knee: f32) -> f32 {
    let mul = MAXCLAMP_MUL as f32;
    if v >= knee {
        (v - knee) * mul + knee
    } else if v <= -knee {
        (v + knee) * mul - knee
    } else {
        v
    }
}

/// Converts the LF planes into the calibrated "vals" space where squared
/// differences are comparable across channels.
fn lf_to_vals(lf: &mut Image3F) {
    let width = lf.width();
    let xmul = XMUL_LF_TO_VALS as f32;
    let ymul = YMUL_LF_TO_VALS as f32;
    let bmul = BMUL_LF_TO_VALS as f32;
    let y_to_b = Y_TO_B_MUL_LF_TO_VALS as f32;

    let [px, py, pb] = lf.planes_mut();
    px.par_rows_mut()
        .zip(py.par_rows_mut())
        .zip(pb.par_rows_mut())
        .for_each(|(((_, row_x), (_, row_y)), (_, row_b))| {
            for x in 0..width {
                let vy = row_y[x];
                row_b[x] = (y_to_b * vy + row_b[x]) * bmul;
                row_x[x] *= xmul;
                row_y[x] = vy * ymul;
            }
        });
}

/// Strong luminance signal reduces sensitivity to red-green detail.
fn suppress_x_by_y(hf_y: &ImageF, hf_x: &mut ImageF) {
    let s = SUPPRESS_S as f32;
    let one_minus_s = 1.0 - s;
    let yw = SUPPRESS_XY as f32;

    hf_x.par_rows_mut().for_each(|(y, row_x)| {
        let row_y = hf_y.row(y);
        for (vx, &vy) in row_x.iter_mut().zip(row_y) {
            let scaler = (yw / (vy * vy + yw)) * one_minus_s + s;
            *vx *= scaler;
        }
    });
}

fn split_lf_mf(xyb: &Image3F, lf: &mut Image3F, mf: &mut Image3F) {
    let blurred: Vec<_> = (0..3usize)
        .into_par_iter()
        .map(|c| gaussian_blur(xyb.plane(c), SIGMA_LF as f32))
        .collect();

    for (c, low) in blurred.into_iter().enumerate() {
        let src = xyb.plane(c);
        mf.plane_mut(c).par_rows_mut().for_each(|(y, row)| {
            let row_src = src.row(y);
            let row_low = low.row(y);
            for x in 0..row.len() {
                row[x] = row_src[x] - row_low[x];
            }
        });
        *lf.plane_mut(c) = low;
    }

    lf_to_vals(lf);
}

fn split_mf_hf(mf: &mut Image3F, hf: &mut [ImageF; 2]) {
    for c in 0..2 {
        hf[c].copy_from(mf.plane(c));
        let low = gaussian_blur(mf.plane(c), SIGMA_HF as f32);

        let mf_plane = mf.plane_mut(c);
        mf_plane.copy_from(&low);
        hf[c].par_rows_mut().for_each(|(y, row_hf)| {
            let row_low = low.row(y);
            for (v, &l) in row_hf.iter_mut().zip(row_low) {
                *v -= l;
            }
        });

        // X keeps a dead zone; Y gets the near-zero range amplified.
        if c == 0 {
            let range = REMOVE_MF_RANGE as f32;
            mf_plane
                .par_rows_mut()
                .for_each(|(_, row)| row.iter_mut().for_each(|v| *v = remove_range_around_zero(*v, range)));
        } else {
            let range = ADD_MF_RANGE as f32;
            mf_plane
                .par_rows_mut()
                .for_each(|(_, row)| row.iter_mut().for_each(|v| *v = amplify_range_around_zero(*v, range)));
        }
    }

    // Blue stops here: its MF plane is the blurred residual, no HF band.
    let low_b = gaussian_blur(mf.plane(2), SIGMA_HF as f32);
    mf.plane_mut(2).copy_from(&low_b);

    let hf_y = hf[1].clone();
    suppress_x_by_y(&hf_y, &mut hf[0]);
}

fn split_hf_uhf(hf: &mut [ImageF; 2], uhf: &mut [ImageF; 2]) {
    for c in 0..2 {
        uhf[c].copy_from(&hf[c]);
        let low = gaussian_blur(&hf[c], SIGMA_UHF as f32);
        hf[c].copy_from(&low);

        let (hf_c, uhf_c) = (&mut hf[c], &mut uhf[c]);
        hf_c.par_rows_mut()
            .zip(uhf_c.par_rows_mut())
            .for_each(|((_, row_hf), (_, row_uhf))| {
                for x in 0..row_hf.len() {
                    if c == 0 {
                        let u = row_uhf[x] - row_hf[x];
                        row_hf[x] = remove_range_around_zero(row_hf[x], REMOVE_HF_RANGE as f32);
                        row_uhf[x] = remove_range_around_zero(u, REMOVE_UHF_RANGE as f32);
                    } else {
                        // The Y split subtracts the clamped HF value; the
                        // clamp has to land before the subtraction.
                        let h = maximum_clamp(row_hf[x], MAXCLAMP_HF as f32);
                        let u = maximum_clamp(row_uhf[x] - h, MAXCLAMP_UHF as f32);
                        row_uhf[x] = u * MUL_Y_UHF as f32;
                        row_hf[x] =
                            amplify_range_around_zero(h * MUL_Y_HF as f32, ADD_HF_RANGE as f32);
                    }
                }
            });
    }
}

/// Full frequency separation of an opsin-dynamics image.
#[must_use]
pub fn separate_frequencies(xyb: &Image3F) -> Pyramid {
    let width = xyb.width();
    let height = xyb.height();

    let mut lf = Image3F::new(width, height);
    let mut mf = Image3F::new(width, height);
    let mut hf = [ImageF::new(width, height), ImageF::new(width, height)];
    let mut uhf = [ImageF::new(width, height), ImageF::new(width, height)];

    split_lf_mf(xyb, &mut lf, &mut mf);
    split_mf_hf(&mut mf, &mut hf);
    split_hf_uhf(&mut hf, &mut uhf);

    Pyramid { uhf, hf, mf, lf }
}
