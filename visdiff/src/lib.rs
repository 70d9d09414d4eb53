//! # visdiff
//!
//! Perceptually calibrated image comparison: given two same-size images in
//! linear light, visdiff produces a per-pixel map of how visible their
//! differences are to a human observer, and pools it into a single scalar
//! score.
//!
//! The model decomposes each image into octave-spaced frequency bands over
//! an opponent color representation, measures band differences through
//! oriented line kernels, attenuates them by content-derived visual
//! masking thresholds, and pools the result with an order-3 norm. Every
//! step is deterministic, so the score is usable as an optimization target
//! by an encoder's rate-distortion search.
//!
//! ## Score interpretation
//!
//! - below [`SCORE_GOOD`]: the images read as the same image
//! - between [`SCORE_GOOD`] and [`SCORE_BAD`]: a subtle difference may be
//!   noticeable
//! - above [`SCORE_BAD`]: the difference is plainly visible
//!
//! ## Example
//!
//! ```rust
//! use visdiff::{Comparator, Image3F, ImageF, Params, score_from_diffmap};
//!
//! // A 16x16 mid-gray reference in linear light.
//! let gray = ImageF::filled(16, 16, 0.5);
//! let reference = Image3F::from_planes(gray.clone(), gray.clone(), gray.clone());
//!
//! let comparator = Comparator::new(&reference, Params::default())?;
//! let diffmap = comparator.compare(&reference)?;
//! assert_eq!(score_from_diffmap(&diffmap), 0.0);
//! # Ok::<(), visdiff::VisdiffError>(())
//! ```
//!
//! Inputs must already be in the engine's linear color space; decoding
//! files and undoing transfer curves is the caller's job (the bundled CLI
//! does both, and [`srgb_to_linear`] helps with the common 8-bit case).

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Calibration constants keep their published digit layout.
#![allow(clippy::unreadable_literal)]
#![allow(clippy::inconsistent_digit_grouping)]
#![allow(clippy::excessive_precision)]
// Fused operations would change results; explicit flops preserve parity.
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]

mod blur;
mod compare;
mod consts;
mod heatmap;
mod image;
mod malta;
mod mask;
mod opsin;
mod pyramid;
mod score;

pub use compare::Comparator;
pub use heatmap::render_heatmap;
pub use image::{Image3F, ImageF};
pub use mask::MaskImage;
pub use opsin::{opsin_dynamics_image, srgb_to_linear};
pub use pyramid::{separate_frequencies, Pyramid};
pub use score::{fuzzy_class, fuzzy_inverse, pnorm, score_from_diffmap};

// Re-exported so heatmap consumers need no direct dependency.
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::RGB8;

/// Scores below this read as "same image".
pub const SCORE_GOOD: f64 = 1.0;

/// Scores above this read as "visibly different".
pub const SCORE_BAD: f64 = 2.0;

/// Error type for comparator construction and comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VisdiffError {
    /// Image is below the 8x8 minimum the frequency split supports.
    ImageTooSmall {
        /// Offending width.
        width: usize,
        /// Offending height.
        height: usize,
    },
    /// Reference and distorted dimensions disagree.
    DimensionMismatch {
        /// Reference (width, height).
        reference: (usize, usize),
        /// Distorted (width, height).
        distorted: (usize, usize),
    },
    /// An input sample was NaN or infinite.
    NonFiniteSample,
    /// A parameter was outside its valid range.
    InvalidParams(&'static str),
}

impl std::fmt::Display for VisdiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageTooSmall { width, height } => {
                write!(f, "image too small: {width}x{height} (minimum 8x8)")
            }
            Self::DimensionMismatch {
                reference: (rw, rh),
                distorted: (dw, dh),
            } => {
                write!(f, "dimension mismatch: reference {rw}x{rh}, distorted {dw}x{dh}")
            }
            Self::NonFiniteSample => write!(f, "input contains NaN or infinite samples"),
            Self::InvalidParams(what) => write!(f, "invalid parameter: {what}"),
        }
    }
}

impl std::error::Error for VisdiffError {}

/// Comparison parameters.
///
/// ```rust
/// use visdiff::Params;
///
/// let params = Params::default()
///     .with_asymmetry(0.8)           // the comparison tool's setting
///     .with_intensity_target(250.0); // HDR viewing conditions
/// ```
#[derive(Debug, Clone)]
pub struct Params {
    asymmetry: f32,
    intensity_target: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            asymmetry: 1.0,
            intensity_target: 80.0,
        }
    }
}

impl Params {
    /// Asymmetry factor: values above 1.0 penalize newly introduced
    /// high-frequency detail more than removed detail; 1.0 is neutral.
    #[must_use]
    pub fn with_asymmetry(mut self, asymmetry: f32) -> Self {
        self.asymmetry = asymmetry;
        self
    }

    /// Display luminance in nits that a sample value of 1.0 represents.
    #[must_use]
    pub fn with_intensity_target(mut self, intensity_target: f32) -> Self {
        self.intensity_target = intensity_target;
        self
    }

    #[must_use]
    pub fn asymmetry(&self) -> f32 {
        self.asymmetry
    }

    #[must_use]
    pub fn intensity_target(&self) -> f32 {
        self.intensity_target
    }

    pub(crate) fn validate(&self) -> Result<(), VisdiffError> {
        if !(self.asymmetry.is_finite() && self.asymmetry > 0.0) {
            return Err(VisdiffError::InvalidParams("asymmetry must be positive"));
        }
        if !(self.intensity_target.is_finite() && self.intensity_target > 0.0) {
            return Err(VisdiffError::InvalidParams(
                "intensity target must be positive",
            ));
        }
        Ok(())
    }
}

/// One-shot comparison: builds a throwaway [`Comparator`] and returns the
/// difference map.
///
/// # Errors
/// Propagates the comparator's precondition checks.
pub fn diffmap(
    reference: &Image3F,
    distorted: &Image3F,
    params: &Params,
) -> Result<ImageF, VisdiffError> {
    Comparator::new(reference, params.clone())?.compare(distorted)
}

/// One-shot comparison reduced to the scalar score.
///
/// # Errors
/// Propagates the comparator's precondition checks.
pub fn distance(
    reference: &Image3F,
    distorted: &Image3F,
    params: &Params,
) -> Result<f64, VisdiffError> {
    Ok(score_from_diffmap(&diffmap(reference, distorted, params)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_neutral() {
        let p = Params::default();
        assert_eq!(p.asymmetry(), 1.0);
        assert_eq!(p.intensity_target(), 80.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn bad_params_are_rejected() {
        assert!(Params::default().with_asymmetry(0.0).validate().is_err());
        assert!(Params::default().with_asymmetry(-1.0).validate().is_err());
        assert!(Params::default()
            .with_intensity_target(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn error_messages_name_the_problem() {
        let err = VisdiffError::DimensionMismatch {
            reference: (64, 48),
            distorted: (64, 50),
        };
        let msg = err.to_string();
        assert!(msg.contains("64x48"));
        assert!(msg.contains("64x50"));
    }

    #[test]
    fn distance_of_identical_images_is_zero() {
        let gray = ImageF::filled(16, 16, 0.5);
        let img = Image3F::from_planes(gray.clone(), gray.clone(), gray);
        assert_eq!(distance(&img, &img, &Params::default()).unwrap(), 0.0);
    }
}
