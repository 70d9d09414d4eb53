//! Calibration constants of the perceptual model.
//!
//! These values were fitted against human-rated image pairs; they are
//! normative and must not be rounded or "simplified". Grouped by the
//! pipeline stage that consumes them.

// ============================================================================
// Opsin dynamics
// ============================================================================

/// Absorbance mixing coefficients, row-major 3x3 matrix applied to
/// intensity-scaled linear RGB.
pub const OPSIN_MIX: [f64; 9] = [
    0.299_565_503_400_583_19,
    0.633_730_878_338_259_36,
    0.077_705_617_820_981_968,
    0.221_586_911_045_747_74,
    0.693_913_880_441_161_42,
    0.098_731_358_842_2,
    0.02,
    0.02,
    0.204_801_290_410_261_29,
];

/// Per-channel absorbance bias added after mixing.
pub const OPSIN_BIAS: [f64; 3] = [
    1.755_748_364_328_735_3,
    1.755_748_364_328_735_3,
    12.226_454_707_163_354,
];

/// Sigma of the adaptation-field blur feeding the sensitivity estimate.
pub const OPSIN_SIGMA: f64 = 1.2;

// ============================================================================
// Frequency separation
// ============================================================================

/// Sigma of the low-frequency split.
pub const SIGMA_LF: f64 = 7.155_933_394_43;
/// Sigma of the high-frequency split.
pub const SIGMA_HF: f64 = 3.224_899_012_62;
/// Sigma of the ultra-high-frequency split.
pub const SIGMA_UHF: f64 = 1.564_163_278_05;

/// Dead zone removed around zero in the MF X plane.
pub const REMOVE_MF_RANGE: f64 = 0.29;
/// Range amplified around zero in the MF Y plane.
pub const ADD_MF_RANGE: f64 = 0.1;
/// Dead zone removed around zero in the HF X plane.
pub const REMOVE_HF_RANGE: f64 = 1.5;
/// Range amplified around zero in the HF Y plane.
pub const ADD_HF_RANGE: f64 = 0.132;
/// Dead zone removed around zero in the UHF X plane.
pub const REMOVE_UHF_RANGE: f64 = 0.04;

/// Soft clamp knee for the HF Y plane.
pub const MAXCLAMP_HF: f64 = 28.469_180_692_2;
/// Soft clamp knee for the UHF Y plane.
pub const MAXCLAMP_UHF: f64 = 5.191_752_946_47;
/// Slope applied past a soft clamp knee.
pub const MAXCLAMP_MUL: f64 = 0.724_216_146;

/// Post-clamp multiplier for the HF Y plane.
pub const MUL_Y_HF: f64 = 2.155;
/// Post-clamp multiplier for the UHF Y plane.
pub const MUL_Y_UHF: f64 = 2.693_137_637_94;

/// LF-to-vals multipliers (X, Y, B) and the Y-into-B mixing term.
pub const XMUL_LF_TO_VALS: f64 = 33.832_837_186_260;
pub const YMUL_LF_TO_VALS: f64 = 14.458_268_100_570;
pub const BMUL_LF_TO_VALS: f64 = 49.879_846_514_40;
pub const Y_TO_B_MUL_LF_TO_VALS: f64 = -0.362_267_051_518;

/// Luminance suppression of the HF X plane.
pub const SUPPRESS_XY: f64 = 46.0;
pub const SUPPRESS_S: f64 = 0.653_020_556_257;

// ============================================================================
// Band difference weights
// ============================================================================

/// Malta weight / norm pairs per band, X channel then Y channel.
pub const MALTA_W_UHF: [f64; 2] = [173.5, 1.100_390_325_55];
pub const MALTA_NORM_UHF: [f64; 2] = [5.0, 71.780_027_516_9];
pub const MALTA_W_HF: [f64; 2] = [6_923.994_761_09, 18.723_741_438_7];
pub const MALTA_NORM_HF: [f64; 2] = [8_051.158_332_47, 4_498_534.452_32];
pub const MALTA_W_MF: [f64; 2] = [8_246.753_213_53, 37.081_987_039_9];
pub const MALTA_NORM_MF: [f64; 2] = [1_009_002.705_82, 130_262_059.556];

/// Quadratic weights: `[HF_X, HF_Y, HF_B, MF_X, MF_Y, MF_B, LF_X, LF_Y, LF_B]`.
/// HF_B is zero: there is no blue high-frequency band.
pub const WMUL: [f64; 9] = [
    400.0,
    1.508_157_031_18,
    0.0,
    2_150.0,
    10.619_543_323_9,
    16.217_604_315_2,
    29.235_379_799_4,
    0.844_626_970_982,
    0.703_646_627_719,
];

// ============================================================================
// Masking
// ============================================================================

/// Channel-combination multipliers for the masking activity plane.
pub const MASK_COMBINE_MULS: [f32; 3] = [2.5, 0.4, 0.4];
/// Multiplier and bias of the activity sqrt-shaping.
pub const MASK_MUL: f32 = 6.194_240_804_39;
pub const MASK_BIAS: f32 = 12.610_505_941_97;
/// Sigma of the activity blur.
pub const MASK_RADIUS: f32 = 2.7;

/// AC masking curve: `mul / (scaler * delta + offset)`.
pub const MASK_AC_OFFSET: f64 = 0.829_591_754_942;
pub const MASK_AC_SCALER: f64 = 0.451_936_922_203;
pub const MASK_AC_MUL: f64 = 2.548_594_479_3;

/// DC masking curve.
pub const MASK_DC_OFFSET: f64 = 0.200_255_785_22;
pub const MASK_DC_SCALER: f64 = 3.874_494_188_04;
pub const MASK_DC_MUL: f64 = 0.505_054_525_019;

/// Normalization of the good-quality threshold to the 80-nit viewing
/// condition: ln(80) / ln(255).
pub const INTENSITY_TARGET_NORMALIZATION: f64 = 0.790_799_17;

/// The raw model value that maps to "just noticeable".
pub const INTERNAL_GOOD_QUALITY_THRESHOLD: f64 = 17.83 * INTENSITY_TARGET_NORMALIZATION;

/// Global scale folded into the masking curves.
pub const GLOBAL_SCALE: f64 = 1.0 / INTERNAL_GOOD_QUALITY_THRESHOLD;

// ============================================================================
// Multi-scale merge
// ============================================================================

/// Weight of the half-resolution difference map.
pub const SUBSCALE_WEIGHT: f32 = 0.5;
/// Mixing heuristic: lower resolutions carry less independent error.
pub const SUBSCALE_MIXING: f32 = 0.3;

// ============================================================================
// Fuzzy classification
// ============================================================================

/// Logistic slope above the class boundary (score > 1).
pub const FUZZY_WIDTH_UP: f64 = 6.078_873_885_32;
/// Logistic slope below the class boundary (score < 1).
pub const FUZZY_WIDTH_DOWN: f64 = 5.507_935_143_84;
/// Peak of the logistic pair.
pub const FUZZY_M0: f64 = 2.0;
/// Class value at the boundary score of 1.0.
pub const FUZZY_SCALER: f64 = 0.610_831_984_6;
