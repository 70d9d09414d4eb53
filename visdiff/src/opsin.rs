//! Opsin dynamics: linear RGB to the X/Y/B opponent representation.
//!
//! The transform models retinal adaptation: a blurred copy of the image
//! sets the local sensitivity, the absorbance matrix mixes the channels,
//! and the gamma curve compresses the dynamic range the way photoreceptor
//! response saturates. X is the red-green opponent difference, Y the
//! luminance-like sum, B the blue pathway.

use crate::blur::gaussian_blur;
use crate::consts::{OPSIN_BIAS, OPSIN_MIX, OPSIN_SIGMA};
use crate::image::Image3F;
use rayon::prelude::*;

const K_INV_LOG2E: f32 = 1.0 / std::f32::consts::LOG2_E;

/// Floor for sensitivity denominators.
const MIN_VAL: f32 = 1e-4;

/// Fast log2 approximation: (2,2) rational polynomial on the mantissa with
/// range reduction to [2/3, 4/3]. L1 error is about 3.9e-6, small enough
/// that the score stays reproducible to float precision across platforms.
#[inline]
pub(crate) fn fast_log2f(x: f32) -> f32 {
    const P0: f32 = -1.850_383_3E-6;
    const P1: f32 = 1.428_716_047_008_375_5;
    const P2: f32 = 7.424_587_332_782_056_6E-1;
    const Q0: f32 = 9.903_281_427_759_071_9E-1;
    const Q1: f32 = 1.009_671_857_224_114_8;
    const Q2: f32 = 1.740_934_300_336_685_3E-1;

    let bits = x.to_bits() as i32;
    // Subtracting 2/3 in bit space splits exponent and mantissa so the
    // mantissa lands in [2/3, 4/3].
    let exp_bits = bits.wrapping_sub(0x3f2a_aaab_u32 as i32);
    let exp_shifted = exp_bits >> 23;
    let mantissa = f32::from_bits((bits - (exp_shifted << 23)) as u32);
    let exp_val = exp_shifted as f32;

    let m = mantissa - 1.0;
    let yp = (P2 * m + P1) * m + P0;
    let yq = (Q2 * m + Q1) * m + Q0;
    yp / yq + exp_val
}

/// Photoreceptor response curve over biased absorbance values.
#[inline]
pub(crate) fn gamma(v: f32) -> f32 {
    const K_RET_MUL: f32 = 19.245_013_259_874_995 * K_INV_LOG2E;
    const K_RET_ADD: f32 = -23.160_462_398_057_55;
    const K_BIAS: f32 = 9.971_063_576_929_914_5;

    let v = v.max(0.0);
    K_RET_MUL * fast_log2f(v + K_BIAS) + K_RET_ADD
}

#[inline]
fn absorbance(r: f32, g: f32, b: f32, mix: &[f32; 9], bias: &[f32; 3]) -> (f32, f32, f32) {
    (
        mix[0] * r + mix[1] * g + mix[2] * b + bias[0],
        mix[3] * r + mix[4] * g + mix[5] * b + bias[1],
        mix[6] * r + mix[7] * g + mix[8] * b + bias[2],
    )
}

/// Converts a linear-light RGB image into the opsin-dynamics X/Y/B planes.
///
/// `intensity_target` is the luminance in nits that a sample value of 1.0
/// represents; 80 matches typical SDR viewing.
#[must_use]
pub fn opsin_dynamics_image(rgb: &Image3F, intensity_target: f32) -> Image3F {
    let width = rgb.width();
    let height = rgb.height();

    let mix: [f32; 9] = std::array::from_fn(|i| OPSIN_MIX[i] as f32);
    let bias: [f32; 3] = std::array::from_fn(|i| OPSIN_BIAS[i] as f32);

    // Adaptation field: the sensitivity at a pixel follows its blurred
    // neighborhood, not the pixel itself.
    let blurred: Vec<_> = (0..3usize)
        .into_par_iter()
        .map(|c| gaussian_blur(rgb.plane(c), OPSIN_SIGMA as f32))
        .collect();

    let mut xyb = Image3F::new(width, height);
    let [out_x, out_y, out_b] = xyb.planes_mut();

    out_x
        .par_rows_mut()
        .zip(out_y.par_rows_mut())
        .zip(out_b.par_rows_mut())
        .for_each(|(((y, row_x), (_, row_y)), (_, row_b))| {
            let in_r = rgb.plane(0).row(y);
            let in_g = rgb.plane(1).row(y);
            let in_b = rgb.plane(2).row(y);
            let bl_r = blurred[0].row(y);
            let bl_g = blurred[1].row(y);
            let bl_b = blurred[2].row(y);

            for x in 0..width {
                let (pre0, pre1, pre2) = absorbance(
                    bl_r[x] * intensity_target,
                    bl_g[x] * intensity_target,
                    bl_b[x] * intensity_target,
                    &mix,
                    &bias,
                );
                let pre0 = pre0.max(bias[0]).max(MIN_VAL);
                let pre1 = pre1.max(bias[1]).max(MIN_VAL);
                let pre2 = pre2.max(bias[2]).max(MIN_VAL);

                let sens0 = (gamma(pre0) / pre0).max(MIN_VAL);
                let sens1 = (gamma(pre1) / pre1).max(MIN_VAL);
                let sens2 = (gamma(pre2) / pre2).max(MIN_VAL);

                let (cur0, cur1, cur2) = absorbance(
                    in_r[x] * intensity_target,
                    in_g[x] * intensity_target,
                    in_b[x] * intensity_target,
                    &mix,
                    &bias,
                );
                let cur0 = (cur0 * sens0).max(bias[0]);
                let cur1 = (cur1 * sens1).max(bias[1]);
                let cur2 = (cur2 * sens2).max(bias[2]);

                row_x[x] = cur0 - cur1;
                row_y[x] = cur0 + cur1;
                row_b[x] = cur2;
            }
        });

    xyb
}

/// sRGB transfer function, exact version used to fill the lookup table.
fn srgb_to_linear_exact(v: u8) -> f32 {
    let v = f32::from(v) / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

static SRGB_TO_LINEAR_LUT: std::sync::LazyLock<[f32; 256]> =
    std::sync::LazyLock::new(|| std::array::from_fn(|i| srgb_to_linear_exact(i as u8)));

/// Decodes an 8-bit sRGB sample to linear light.
///
/// Provided for boundary collaborators that feed the engine; the engine
/// itself only ever sees linear data.
#[inline]
#[must_use]
pub fn srgb_to_linear(v: u8) -> f32 {
    SRGB_TO_LINEAR_LUT[v as usize]
}
