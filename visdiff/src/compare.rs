//! The comparator: reference-side state plus the band difference combiner.
//!
//! A `Comparator` is built once per reference image and then serves any
//! number of distorted candidates. Everything derivable from the reference
//! alone — opsin transform, pyramid, masking image, the half-resolution
//! child — is computed up front; a comparison only pays for the distorted
//! side. All retained state is immutable, so `&self` comparisons may run
//! concurrently without synchronization.

use crate::consts::{
    MALTA_NORM_HF, MALTA_NORM_MF, MALTA_NORM_UHF, MALTA_W_HF, MALTA_W_MF, MALTA_W_UHF,
    SUBSCALE_MIXING, SUBSCALE_WEIGHT, WMUL,
};
use crate::image::{add_to, Image3F, ImageF};
use crate::malta::malta_diff_map;
use crate::mask::{compute_mask, MaskImage};
use crate::opsin::opsin_dynamics_image;
use crate::pyramid::{separate_frequencies, Pyramid};
use crate::{Params, VisdiffError};
use rayon::prelude::*;

/// Smallest image the frequency split and Malta window support.
pub(crate) const MIN_SIZE: usize = 8;

/// Below this size the half-resolution analysis adds nothing.
const MIN_SIZE_FOR_SUBSCALE: usize = 15;

/// Stateful comparator owning one reference image's derived data.
#[derive(Debug)]
pub struct Comparator {
    width: usize,
    height: usize,
    params: Params,
    pyramid: Pyramid,
    mask: MaskImage,
    /// Half-resolution child for the multi-scale term. Single level: the
    /// child itself never recurses further.
    sub: Option<Box<Comparator>>,
}

impl Comparator {
    /// Builds a comparator from a linear-light reference image.
    ///
    /// # Errors
    /// Returns [`VisdiffError::ImageTooSmall`] below 8x8,
    /// [`VisdiffError::NonFiniteSample`] if the reference contains NaN or
    /// infinity, and [`VisdiffError::InvalidParams`] for a non-positive
    /// asymmetry or intensity target.
    pub fn new(reference: &Image3F, params: Params) -> Result<Self, VisdiffError> {
        params.validate()?;
        validate_image(reference)?;

        let sub = if reference.width() >= MIN_SIZE_FOR_SUBSCALE
            && reference.height() >= MIN_SIZE_FOR_SUBSCALE
        {
            let half = subsample_2x(reference);
            Some(Box::new(Self::build(&half, params.clone())))
        } else {
            None
        };

        let mut cmp = Self::build(reference, params);
        cmp.sub = sub;
        Ok(cmp)
    }

    fn build(reference: &Image3F, params: Params) -> Self {
        let xyb = opsin_dynamics_image(reference, params.intensity_target());
        let pyramid = separate_frequencies(&xyb);
        let mask = compute_mask(&pyramid);
        Self {
            width: reference.width(),
            height: reference.height(),
            params,
            pyramid,
            mask,
            sub: None,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Compares a linear-light distorted candidate against the reference.
    ///
    /// Returns the caller-owned difference map at source resolution,
    /// including the half-resolution term when the image is large enough.
    ///
    /// # Errors
    /// Fails on dimension mismatch or non-finite samples; no partial
    /// result is produced.
    pub fn compare(&self, distorted: &Image3F) -> Result<ImageF, VisdiffError> {
        self.check_dimensions(distorted.width(), distorted.height())?;
        validate_image(distorted)?;

        let xyb = opsin_dynamics_image(distorted, self.params.intensity_target());
        let mut diffmap = self.diffmap_of_pyramid(&separate_frequencies(&xyb));

        if let Some(sub) = &self.sub {
            let half = subsample_2x(distorted);
            let half_xyb = opsin_dynamics_image(&half, self.params.intensity_target());
            let half_map = sub.diffmap_of_pyramid(&separate_frequencies(&half_xyb));
            add_supersampled_2x(&half_map, SUBSCALE_WEIGHT, &mut diffmap);
        }

        Ok(diffmap)
    }

    /// Fast path for a candidate already in opsin-dynamics form.
    ///
    /// Single-resolution: the multi-scale term needs the pre-opsin image,
    /// which this entry point does not have.
    ///
    /// # Errors
    /// Fails on dimension mismatch or non-finite samples.
    pub fn compare_opsin(&self, xyb: &Image3F) -> Result<ImageF, VisdiffError> {
        self.check_dimensions(xyb.width(), xyb.height())?;
        validate_image(xyb)?;
        Ok(self.diffmap_of_pyramid(&separate_frequencies(xyb)))
    }

    /// Fast path for a candidate whose pyramid the caller already built.
    ///
    /// # Errors
    /// Fails on dimension mismatch.
    pub fn compare_pyramid(&self, pyramid: &Pyramid) -> Result<ImageF, VisdiffError> {
        self.check_dimensions(pyramid.width(), pyramid.height())?;
        Ok(self.diffmap_of_pyramid(pyramid))
    }

    fn check_dimensions(&self, width: usize, height: usize) -> Result<(), VisdiffError> {
        if width != self.width || height != self.height {
            return Err(VisdiffError::DimensionMismatch {
                reference: (self.width, self.height),
                distorted: (width, height),
            });
        }
        Ok(())
    }

    /// The band difference combiner: per-band errors, asymmetric
    /// weighting, masking, and the final per-pixel reduction.
    fn diffmap_of_pyramid(&self, p1: &Pyramid) -> ImageF {
        let p0 = &self.pyramid;
        let width = self.width;
        let height = self.height;
        let asym = f64::from(self.params.asymmetry());

        let mut ac = Image3F::new(width, height);
        let mut dc = Image3F::new(width, height);

        // Oriented band errors. UHF uses the dense kernels and the full
        // asymmetry; HF the sparse kernels at softened asymmetry; MF the
        // sparse kernels symmetrically.
        for c in 0..2 {
            add_to(
                ac.plane_mut(c),
                &malta_diff_map(&p0.uhf[c], &p1.uhf[c], MALTA_W_UHF[c], asym, MALTA_NORM_UHF[c], false),
            );
            add_to(
                ac.plane_mut(c),
                &malta_diff_map(&p0.hf[c], &p1.hf[c], MALTA_W_HF[c], asym.sqrt(), MALTA_NORM_HF[c], true),
            );
            add_to(
                ac.plane_mut(c),
                &malta_diff_map(p0.mf.plane(c), p1.mf.plane(c), MALTA_W_MF[c], 1.0, MALTA_NORM_MF[c], true),
            );
        }

        // Quadratic band errors: asymmetric on HF, symmetric on MF.
        for c in 0..2 {
            l2_diff_asymmetric(&p0.hf[c], &p1.hf[c], WMUL[c] as f32, self.params.asymmetry(), ac.plane_mut(c));
        }
        for c in 0..3 {
            l2_diff(p0.mf.plane(c), p1.mf.plane(c), WMUL[3 + c] as f32, ac.plane_mut(c));
        }

        // Low-frequency error goes to the DC pathway.
        for c in 0..3 {
            l2_diff(p0.lf.plane(c), p1.lf.plane(c), WMUL[6 + c] as f32, dc.plane_mut(c));
        }

        combine_to_diffmap(&self.mask, &dc, &ac)
    }
}

fn validate_image(image: &Image3F) -> Result<(), VisdiffError> {
    let (width, height) = (image.width(), image.height());
    if width < MIN_SIZE || height < MIN_SIZE {
        return Err(VisdiffError::ImageTooSmall { width, height });
    }
    if !image.all_finite() {
        return Err(VisdiffError::NonFiniteSample);
    }
    Ok(())
}

/// Symmetric squared difference, accumulated into `out`.
fn l2_diff(i0: &ImageF, i1: &ImageF, w: f32, out: &mut ImageF) {
    if w == 0.0 {
        return;
    }
    out.par_rows_mut().for_each(|(y, row)| {
        let r0 = i0.row(y);
        let r1 = i1.row(y);
        for x in 0..row.len() {
            let d = r0[x] - r1[x];
            row[x] += d * d * w;
        }
    });
}

/// Squared difference with the asymmetry split: samples where the
/// distorted band magnitude exceeds the reference's are weighted by
/// `w * asymmetry`, the rest by `w / asymmetry`. An even function of the
/// difference when `asymmetry == 1`.
fn l2_diff_asymmetric(i0: &ImageF, i1: &ImageF, w: f32, asymmetry: f32, out: &mut ImageF) {
    if w == 0.0 {
        return;
    }
    let w_new = w * asymmetry;
    let w_lost = w / asymmetry;
    out.par_rows_mut().for_each(|(y, row)| {
        let r0 = i0.row(y);
        let r1 = i1.row(y);
        for x in 0..row.len() {
            let v0 = r0[x];
            let v1 = r1[x];
            let d = v0 - v1;
            let w_sel = if v1.abs() > v0.abs() { w_new } else { w_lost };
            row[x] += d * d * w_sel;
        }
    });
}

/// Applies the masking weights and folds the channel planes into the final
/// per-pixel difference magnitude.
fn combine_to_diffmap(mask: &MaskImage, dc: &Image3F, ac: &Image3F) -> ImageF {
    let width = mask.width();
    let height = mask.height();
    let mut out = ImageF::new(width, height);

    out.par_rows_mut().for_each(|(y, row)| {
        let m_ac = mask.ac.row(y);
        let m_dc = mask.dc.row(y);
        let ac0 = ac.plane(0).row(y);
        let ac1 = ac.plane(1).row(y);
        let ac2 = ac.plane(2).row(y);
        let dc0 = dc.plane(0).row(y);
        let dc1 = dc.plane(1).row(y);
        let dc2 = dc.plane(2).row(y);
        for x in 0..width {
            let banded = (ac0[x] + ac1[x] + ac2[x]) * m_ac[x];
            let low = (dc0[x] + dc1[x] + dc2[x]) * m_dc[x];
            row[x] = (banded + low).sqrt();
        }
    });

    out
}

/// Downsamples by two with a 2x2 box average.
///
/// The kernel is even-symmetric, so repeated runs are bit-identical; odd
/// edges fold the missing samples onto the existing ones.
pub(crate) fn subsample_2x(input: &Image3F) -> Image3F {
    let in_w = input.width();
    let in_h = input.height();
    let out_w = in_w.div_ceil(2);
    let out_h = in_h.div_ceil(2);

    let mut out = Image3F::new(out_w, out_h);
    for c in 0..3 {
        let src = input.plane(c);
        out.plane_mut(c).par_rows_mut().for_each(|(oy, row)| {
            for (ox, v) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                let mut n = 0.0f32;
                for dy in 0..2 {
                    for dx in 0..2 {
                        let sx = ox * 2 + dx;
                        let sy = oy * 2 + dy;
                        if sx < in_w && sy < in_h {
                            sum += src.get(sx, sy);
                            n += 1.0;
                        }
                    }
                }
                *v = sum / n;
            }
        });
    }
    out
}

/// Blends a half-resolution difference map into the full-resolution one.
fn add_supersampled_2x(src: &ImageF, weight: f32, dst: &mut ImageF) {
    let blend = 1.0 - SUBSCALE_MIXING * weight;
    let src_w = src.width();
    let src_h = src.height();

    dst.par_rows_mut().for_each(|(y, row)| {
        let src_row = src.row((y / 2).min(src_h - 1));
        for (x, v) in row.iter_mut().enumerate() {
            *v = *v * blend + weight * src_row[(x / 2).min(src_w - 1)];
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: usize, height: usize) -> Image3F {
        let mut img = Image3F::new(width, height);
        for c in 0..3 {
            let plane = img.plane_mut(c);
            for y in 0..height {
                for x in 0..width {
                    plane.set(x, y, 0.2 + 0.5 * (x + y) as f32 / (width + height) as f32);
                }
            }
        }
        img
    }

    #[test]
    fn identical_images_give_zero_map() {
        let img = gradient_image(32, 32);
        let cmp = Comparator::new(&img, Params::default()).unwrap();
        let map = cmp.compare(&img).unwrap();
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(map.get(x, y), 0.0);
            }
        }
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let cmp = Comparator::new(&gradient_image(32, 32), Params::default()).unwrap();
        let err = cmp.compare(&gradient_image(16, 16)).unwrap_err();
        assert!(matches!(err, VisdiffError::DimensionMismatch { .. }));
    }

    #[test]
    fn tiny_reference_is_rejected() {
        let err = Comparator::new(&gradient_image(4, 4), Params::default()).unwrap_err();
        assert!(matches!(err, VisdiffError::ImageTooSmall { .. }));
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let mut img = gradient_image(16, 16);
        img.plane_mut(1).set(3, 3, f32::NAN);
        let err = Comparator::new(&img, Params::default()).unwrap_err();
        assert!(matches!(err, VisdiffError::NonFiniteSample));
    }

    #[test]
    fn small_images_have_no_subscale() {
        let cmp = Comparator::new(&gradient_image(10, 10), Params::default()).unwrap();
        assert!(cmp.sub.is_none());
        let cmp = Comparator::new(&gradient_image(32, 32), Params::default()).unwrap();
        assert!(cmp.sub.is_some());
    }

    #[test]
    fn subsample_halves_dimensions() {
        let img = gradient_image(33, 32);
        let half = subsample_2x(&img);
        assert_eq!(half.width(), 17);
        assert_eq!(half.height(), 16);
    }

    #[test]
    fn subsample_preserves_constants() {
        let mut img = Image3F::new(16, 16);
        for c in 0..3 {
            *img.plane_mut(c) = ImageF::filled(16, 16, 0.7);
        }
        let half = subsample_2x(&img);
        for y in 0..8 {
            for x in 0..8 {
                assert!((half.plane(0).get(x, y) - 0.7).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn supersampled_add_blends() {
        let src = ImageF::filled(4, 4, 1.0);
        let mut dst = ImageF::filled(8, 8, 2.0);
        add_supersampled_2x(&src, 0.5, &mut dst);
        // 2.0 * (1 - 0.3 * 0.5) + 0.5 * 1.0
        assert!((dst.get(0, 0) - 2.2).abs() < 1e-6);
    }

    #[test]
    fn l2_asymmetric_is_even_at_neutral() {
        let base = ImageF::filled(8, 8, 0.5);
        let hi = ImageF::filled(8, 8, 0.9);
        let lo = ImageF::filled(8, 8, 0.1);
        let mut out_hi = ImageF::new(8, 8);
        let mut out_lo = ImageF::new(8, 8);
        l2_diff_asymmetric(&base, &hi, 3.0, 1.0, &mut out_hi);
        l2_diff_asymmetric(&base, &lo, 3.0, 1.0, &mut out_lo);
        assert_eq!(out_hi.get(4, 4), out_lo.get(4, 4));

        let mut out_hi2 = ImageF::new(8, 8);
        let mut out_lo2 = ImageF::new(8, 8);
        l2_diff_asymmetric(&base, &hi, 3.0, 2.0, &mut out_hi2);
        l2_diff_asymmetric(&base, &lo, 3.0, 2.0, &mut out_lo2);
        assert!(out_hi2.get(4, 4) > out_lo2.get(4, 4));
    }
}
