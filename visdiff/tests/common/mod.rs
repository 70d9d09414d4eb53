//! Deterministic image generators shared by the integration tests.
//!
//! All randomness goes through a fixed-seed LCG so every platform and
//! every run sees identical inputs.

use visdiff::{Image3F, ImageF};

/// LCG pseudo-random number generator.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_f32(&mut self) -> f32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFFFF) as f32 / 65535.0
    }
}

/// Constant gray image in linear light.
pub fn gen_gray(width: usize, height: usize, value: f32) -> Image3F {
    let plane = ImageF::filled(width, height, value);
    Image3F::from_planes(plane.clone(), plane.clone(), plane)
}

/// Achromatic checkerboard alternating between `lo` and `hi`.
pub fn gen_checkerboard(width: usize, height: usize, lo: f32, hi: f32) -> Image3F {
    let mut img = Image3F::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = if (x + y) % 2 == 0 { lo } else { hi };
            for c in 0..3 {
                img.plane_mut(c).set(x, y, v);
            }
        }
    }
    img
}

/// Noise image with samples uniform in [base, base + amplitude].
pub fn gen_noise(width: usize, height: usize, base: f32, amplitude: f32, seed: u64) -> Image3F {
    let mut rng = Lcg::new(seed);
    let mut img = Image3F::new(width, height);
    for c in 0..3 {
        let plane = img.plane_mut(c);
        for y in 0..height {
            for x in 0..width {
                plane.set(x, y, base + amplitude * rng.next_f32());
            }
        }
    }
    img
}

/// Adds `delta` to every channel inside the given square patch.
pub fn add_patch(img: &mut Image3F, x0: usize, y0: usize, size: usize, delta: f32) {
    for c in 0..3 {
        let plane = img.plane_mut(c);
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                let v = plane.get(x, y);
                plane.set(x, y, v + delta);
            }
        }
    }
}

/// 3x3 box blur with edge clamping, applied per channel.
pub fn box_blur3(img: &Image3F) -> Image3F {
    let width = img.width();
    let height = img.height();
    let mut out = Image3F::new(width, height);
    for c in 0..3 {
        let src = img.plane(c);
        let dst = out.plane_mut(c);
        for y in 0..height {
            for x in 0..width {
                let mut sum = 0.0f32;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
                        let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
                        sum += src.get(sx, sy);
                    }
                }
                dst.set(x, y, sum / 9.0);
            }
        }
    }
    out
}

/// Unsharp image: the reflection of the blurred image through the
/// original, `2 * img - blur(img)`.
pub fn sharpen3(img: &Image3F) -> Image3F {
    let blurred = box_blur3(img);
    let mut out = Image3F::new(img.width(), img.height());
    for c in 0..3 {
        let src = img.plane(c);
        let low = blurred.plane(c);
        let dst = out.plane_mut(c);
        for y in 0..img.height() {
            for x in 0..img.width() {
                dst.set(x, y, 2.0 * src.get(x, y) - low.get(x, y));
            }
        }
    }
    out
}
