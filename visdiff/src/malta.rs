//! Malta filter: oriented line kernels over band differences.
//!
//! Sixteen line-shaped kernels at different orientations are summed and
//! squared, so a coherent edge-like error lights up the orientation it
//! follows instead of being averaged away. The full variant samples 9
//! pixels per line, the LF variant 5 sparser ones for the lower bands.

use crate::image::ImageF;
use rayon::prelude::*;

/// Window lookup at offset (dx, dy) from the center of a 9x9 patch.
macro_rules! at {
    ($w:expr, $dx:expr, $dy:expr) => {
        $w[((4 + $dy) * 9 + (4 + $dx)) as usize]
    };
}

/// Sum-and-square the 16 dense 9-sample line kernels.
#[rustfmt::skip]
fn malta_unit(w: &[f32; 81]) -> f32 {
    let mut out = 0.0f32;
    let mut line = |s: f32| out += s * s;

    // horizontal
    line(at!(w, -4, 0) + at!(w, -3, 0) + at!(w, -2, 0) + at!(w, -1, 0) + at!(w, 0, 0)
        + at!(w, 1, 0) + at!(w, 2, 0) + at!(w, 3, 0) + at!(w, 4, 0));
    // vertical
    line(at!(w, 0, -4) + at!(w, 0, -3) + at!(w, 0, -2) + at!(w, 0, -1) + at!(w, 0, 0)
        + at!(w, 0, 1) + at!(w, 0, 2) + at!(w, 0, 3) + at!(w, 0, 4));
    // main diagonal
    line(at!(w, -3, -3) + at!(w, -2, -2) + at!(w, -1, -1) + at!(w, 0, 0)
        + at!(w, 1, 1) + at!(w, 2, 2) + at!(w, 3, 3));
    // anti-diagonal
    line(at!(w, 3, -3) + at!(w, 2, -2) + at!(w, 1, -1) + at!(w, 0, 0)
        + at!(w, -1, 1) + at!(w, -2, 2) + at!(w, -3, 3));
    // near-vertical, drifting left
    line(at!(w, 1, -4) + at!(w, 1, -3) + at!(w, 1, -2) + at!(w, 0, -1) + at!(w, 0, 0)
        + at!(w, 0, 1) + at!(w, -1, 2) + at!(w, -1, 3) + at!(w, -1, 4));
    // near-vertical, drifting right
    line(at!(w, -1, -4) + at!(w, -1, -3) + at!(w, -1, -2) + at!(w, 0, -1) + at!(w, 0, 0)
        + at!(w, 0, 1) + at!(w, 1, 2) + at!(w, 1, 3) + at!(w, 1, 4));
    // near-horizontal, drifting down
    line(at!(w, -4, -1) + at!(w, -3, -1) + at!(w, -2, -1) + at!(w, -1, 0) + at!(w, 0, 0)
        + at!(w, 1, 0) + at!(w, 2, 1) + at!(w, 3, 1) + at!(w, 4, 1));
    // near-horizontal, drifting up
    line(at!(w, -4, 1) + at!(w, -3, 1) + at!(w, -2, 1) + at!(w, -1, 0) + at!(w, 0, 0)
        + at!(w, 1, 0) + at!(w, 2, -1) + at!(w, 3, -1) + at!(w, 4, -1));
    // steep 2:1 slopes
    line(at!(w, -2, -3) + at!(w, -1, -2) + at!(w, -1, -1) + at!(w, 0, 0)
        + at!(w, 1, 1) + at!(w, 1, 2) + at!(w, 2, 3));
    line(at!(w, 2, -3) + at!(w, 1, -2) + at!(w, 1, -1) + at!(w, 0, 0)
        + at!(w, -1, 1) + at!(w, -1, 2) + at!(w, -2, 3));
    // shallow 1:2 slopes
    line(at!(w, -3, -2) + at!(w, -2, -1) + at!(w, -1, -1) + at!(w, 0, 0)
        + at!(w, 1, 1) + at!(w, 2, 1) + at!(w, 3, 2));
    line(at!(w, 3, -2) + at!(w, 2, -1) + at!(w, 1, -1) + at!(w, 0, 0)
        + at!(w, -1, 1) + at!(w, -2, 1) + at!(w, -3, 2));
    // repeated drift kernels: doubling them weights coherent shallow
    // lines the way the rated data demanded
    line(at!(w, -4, 1) + at!(w, -3, 1) + at!(w, -2, 1) + at!(w, -1, 0) + at!(w, 0, 0)
        + at!(w, 1, 0) + at!(w, 2, -1) + at!(w, 3, -1) + at!(w, 4, -1));
    line(at!(w, -4, -1) + at!(w, -3, -1) + at!(w, -2, -1) + at!(w, -1, 0) + at!(w, 0, 0)
        + at!(w, 1, 0) + at!(w, 2, 1) + at!(w, 3, 1) + at!(w, 4, 1));
    line(at!(w, -1, -4) + at!(w, -1, -3) + at!(w, -1, -2) + at!(w, 0, -1) + at!(w, 0, 0)
        + at!(w, 0, 1) + at!(w, 1, 2) + at!(w, 1, 3) + at!(w, 1, 4));
    line(at!(w, 1, -4) + at!(w, 1, -3) + at!(w, 1, -2) + at!(w, 0, -1) + at!(w, 0, 0)
        + at!(w, 0, 1) + at!(w, -1, 2) + at!(w, -1, 3) + at!(w, -1, 4));

    out
}

/// Sum-and-square the 16 sparse 5-sample line kernels.
#[rustfmt::skip]
fn malta_unit_lf(w: &[f32; 81]) -> f32 {
    let mut out = 0.0f32;
    let mut line = |s: f32| out += s * s;

    line(at!(w, -4, 0) + at!(w, -2, 0) + at!(w, 0, 0) + at!(w, 2, 0) + at!(w, 4, 0));
    line(at!(w, 0, -4) + at!(w, 0, -2) + at!(w, 0, 0) + at!(w, 0, 2) + at!(w, 0, 4));
    line(at!(w, -3, -3) + at!(w, -2, -2) + at!(w, 0, 0) + at!(w, 2, 2) + at!(w, 3, 3));
    line(at!(w, 3, -3) + at!(w, 2, -2) + at!(w, 0, 0) + at!(w, -2, 2) + at!(w, -3, 3));
    line(at!(w, 1, -4) + at!(w, 1, -2) + at!(w, 0, 0) + at!(w, -1, 2) + at!(w, -1, 4));
    line(at!(w, -1, -4) + at!(w, -1, -2) + at!(w, 0, 0) + at!(w, 1, 2) + at!(w, 1, 4));
    line(at!(w, -4, -1) + at!(w, -2, -1) + at!(w, 0, 0) + at!(w, 2, 1) + at!(w, 4, 1));
    line(at!(w, -4, 1) + at!(w, -2, 1) + at!(w, 0, 0) + at!(w, 2, -1) + at!(w, 4, -1));
    line(at!(w, -2, -3) + at!(w, -1, -2) + at!(w, 0, 0) + at!(w, 1, 2) + at!(w, 2, 3));
    line(at!(w, 2, -3) + at!(w, 1, -2) + at!(w, 0, 0) + at!(w, -1, 2) + at!(w, -2, 3));
    line(at!(w, -3, -2) + at!(w, -2, -1) + at!(w, 0, 0) + at!(w, 2, 1) + at!(w, 3, 2));
    line(at!(w, 3, -2) + at!(w, 2, -1) + at!(w, 0, 0) + at!(w, -2, 1) + at!(w, -3, 2));
    line(at!(w, -4, 2) + at!(w, -2, 1) + at!(w, 0, 0) + at!(w, 2, -1) + at!(w, 4, -2));
    line(at!(w, -4, -2) + at!(w, -2, -1) + at!(w, 0, 0) + at!(w, 2, 1) + at!(w, 4, 2));
    line(at!(w, -2, -4) + at!(w, -1, -2) + at!(w, 0, 0) + at!(w, 1, 2) + at!(w, 2, 4));
    line(at!(w, 2, -4) + at!(w, 1, -2) + at!(w, 0, 0) + at!(w, -1, 2) + at!(w, -2, 4));

    out
}

/// Copies the 9x9 neighborhood of (x, y); outside the image it reads zero.
#[inline]
fn extract_window(data: &ImageF, x: usize, y: usize) -> [f32; 81] {
    let width = data.width();
    let height = data.height();
    let mut window = [0.0f32; 81];

    if x >= 4 && y >= 4 && x + 4 < width && y + 4 < height {
        for dy in 0..9 {
            let row = data.row(y + dy - 4);
            window[dy * 9..dy * 9 + 9].copy_from_slice(&row[x - 4..x + 5]);
        }
    } else {
        for dy in 0..9 {
            let sy = y as isize + dy as isize - 4;
            if sy < 0 || sy >= height as isize {
                continue;
            }
            let row = data.row(sy as usize);
            for dx in 0..9 {
                let sx = x as isize + dx as isize - 4;
                if sx >= 0 && sx < width as isize {
                    window[dy * 9 + dx] = row[sx as usize];
                }
            }
        }
    }

    window
}

const K_WEIGHT0: f64 = 0.5;
const LEN: f64 = 3.75;
const MULLI_FULL: f64 = 0.399_058_176_37;
const MULLI_LF: f64 = 0.611_612_573_796;

/// Oriented difference map for one band pair.
///
/// The signed band difference is scaled by a saturating factor anchored to
/// the reference magnitude, weighted asymmetrically — `weight * asymmetry`
/// where the distorted band carries more energy than the reference (newly
/// introduced detail), `weight / asymmetry` where it carries less — and
/// run through the Malta kernels. With `asymmetry == 1` the two weights
/// coincide and the map is an even function of the difference.
pub(crate) fn malta_diff_map(
    band0: &ImageF,
    band1: &ImageF,
    weight: f64,
    asymmetry: f64,
    norm1: f64,
    use_lf: bool,
) -> ImageF {
    let width = band0.width();
    let height = band0.height();

    let mulli = if use_lf { MULLI_LF } else { MULLI_FULL };
    let w_new = mulli * (K_WEIGHT0 * weight * asymmetry).sqrt() / (LEN * 2.0 + 1.0);
    let w_lost = mulli * (K_WEIGHT0 * weight / asymmetry).sqrt() / (LEN * 2.0 + 1.0);
    let norm_new = (w_new * norm1) as f32;
    let norm_lost = (w_lost * norm1) as f32;
    let norm1 = norm1 as f32;

    let mut scaled = ImageF::new(width, height);
    scaled.par_rows_mut().for_each(|(y, row_out)| {
        let row0 = band0.row(y);
        let row1 = band1.row(y);
        for x in 0..width {
            let v0 = row0[x];
            let v1 = row1[x];
            let norm2 = if v1.abs() > v0.abs() { norm_new } else { norm_lost };
            row_out[x] = norm2 / (norm1 + v0.abs()) * (v1 - v0);
        }
    });

    let mut out = ImageF::new(width, height);
    out.par_rows_mut().for_each(|(y, row_out)| {
        for (x, v) in row_out.iter_mut().enumerate() {
            let window = extract_window(&scaled, x, y);
            *v = if use_lf {
                malta_unit_lf(&window)
            } else {
                malta_unit(&window)
            };
        }
    });

    out
}
