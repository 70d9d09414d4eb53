//! Separable Gaussian blur.
//!
//! Frequency separation is built from Gaussian low-pass splits, so every
//! band boundary in the model is ultimately one of these blurs. The kernel
//! is even-symmetric and borders are handled by clamping with weight
//! renormalization, which keeps constant images constant and makes the
//! output a pure function of the input — required because the score is
//! used as an optimization target.
//!
//! Both passes run horizontally and write transposed, so the vertical pass
//! is just a second horizontal pass over the intermediate.

use crate::image::ImageF;
use wide::f32x8;

/// Computes an un-normalized 1D Gaussian kernel for `sigma`.
///
/// The radius is `max(1, 2.25 * sigma)`; interior pixels are scaled by the
/// full kernel weight, border pixels by the weight that actually fits.
fn compute_kernel(sigma: f32) -> Vec<f32> {
    const M: f32 = 2.25;
    let scaler = -1.0 / (2.0 * sigma * sigma);
    let radius = (M * sigma.abs()).max(1.0) as i32;
    (-radius..=radius)
        .map(|i| (scaler * (i * i) as f32).exp())
        .collect()
}

/// One separable pass: convolve rows of `input`, write the result
/// transposed into `output` (which must be `height x width`).
fn convolve_transpose(input: &ImageF, kernel: &[f32], output: &mut ImageF) {
    let width = input.width();
    let half = kernel.len() / 2;

    let full_weight: f32 = kernel.iter().sum();
    let scaled_kernel: Vec<f32> = kernel.iter().map(|&k| k / full_weight).collect();

    let border_lo = half.min(width);
    let border_hi = width.saturating_sub(half).max(border_lo);

    for x in 0..border_lo {
        convolve_border_column(input, kernel, x, output);
    }
    if border_hi > border_lo {
        convolve_interior(input, &scaled_kernel, border_lo, border_hi, half, output);
    }
    for x in border_hi..width {
        convolve_border_column(input, kernel, x, output);
    }
}

/// Interior columns: no bounds handling, 8 output pixels per SIMD step.
#[multiversion::multiversion(targets("x86_64+avx2+fma", "x86_64+sse4.2"))]
fn convolve_interior(
    input: &ImageF,
    scaled_kernel: &[f32],
    lo: usize,
    hi: usize,
    half: usize,
    output: &mut ImageF,
) {
    let height = input.height();
    let chunks = (hi - lo) / 8;

    for y in 0..height {
        let row = input.row(y);

        for c in 0..chunks {
            let x = lo + c * 8;
            let d = x - half;
            let mut sum = f32x8::splat(0.0);
            for (j, &k) in scaled_kernel.iter().enumerate() {
                let lane: [f32; 8] = row[d + j..d + j + 8].try_into().unwrap();
                sum += f32x8::from(lane) * f32x8::splat(k);
            }
            let vals: [f32; 8] = sum.into();
            for (i, &v) in vals.iter().enumerate() {
                output.set(y, x + i, v);
            }
        }

        for x in lo + chunks * 8..hi {
            let d = x - half;
            let sum: f32 = scaled_kernel
                .iter()
                .enumerate()
                .map(|(j, &k)| row[d + j] * k)
                .sum();
            output.set(y, x, sum);
        }
    }
}

/// Border columns: clamp the kernel to the image and renormalize by the
/// weight that survived.
fn convolve_border_column(input: &ImageF, kernel: &[f32], x: usize, output: &mut ImageF) {
    let width = input.width();
    let height = input.height();
    let half = kernel.len() / 2;

    let min_x = x.saturating_sub(half);
    let max_x = (x + half).min(width - 1);

    let mut weight = 0.0f32;
    for j in min_x..=max_x {
        weight += kernel[j + half - x];
    }
    let scale = 1.0 / weight;

    for y in 0..height {
        let row = input.row(y);
        let mut sum = 0.0f32;
        for j in min_x..=max_x {
            sum += row[j] * kernel[j + half - x];
        }
        output.set(y, x, sum * scale);
    }
}

/// Applies a 2D Gaussian blur and returns the result.
#[must_use]
pub fn gaussian_blur(input: &ImageF, sigma: f32) -> ImageF {
    if sigma <= 0.0 {
        return input.clone();
    }
    let kernel = compute_kernel(sigma);

    let mut transposed = ImageF::new(input.height(), input.width());
    convolve_transpose(input, &kernel, &mut transposed);

    let mut output = ImageF::new(input.width(), input.height());
    convolve_transpose(&transposed, &kernel, &mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_symmetric_and_peaked() {
        let kernel = compute_kernel(1.5);
        assert_eq!(kernel.len() % 2, 1);
        let center = kernel.len() / 2;
        for i in 0..center {
            assert_eq!(kernel[i], kernel[kernel.len() - 1 - i]);
            assert!(kernel[i] <= kernel[center]);
        }
    }

    #[test]
    fn constant_image_stays_constant() {
        let img = ImageF::filled(40, 24, 0.5);
        let blurred = gaussian_blur(&img, 3.0);
        for y in 0..24 {
            for x in 0..40 {
                assert!(
                    (blurred.get(x, y) - 0.5).abs() < 1e-4,
                    "drift at ({x},{y}): {}",
                    blurred.get(x, y)
                );
            }
        }
    }

    #[test]
    fn impulse_spreads_symmetrically() {
        let mut img = ImageF::new(33, 33);
        img.set(16, 16, 1.0);
        let blurred = gaussian_blur(&img, 2.0);

        assert!(blurred.get(16, 16) < 1.0);
        assert!(blurred.get(15, 16) > 0.0);
        let eps = 1e-6;
        assert!((blurred.get(15, 16) - blurred.get(17, 16)).abs() < eps);
        assert!((blurred.get(16, 15) - blurred.get(16, 17)).abs() < eps);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let mut img = ImageF::new(16, 16);
        img.set(3, 5, 2.0);
        let out = gaussian_blur(&img, 0.0);
        assert_eq!(out.get(3, 5), 2.0);
        assert_eq!(out.get(4, 5), 0.0);
    }
}
