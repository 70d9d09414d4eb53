//! visdiff CLI - perceptual comparison of two image files.
//!
//! Decodes both inputs, converts them to linear light, runs the
//! difference engine on an explicitly sized worker pool, and prints the
//! score. Optionally renders the difference map as a false-color heatmap.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use image::GenericImageView;
use visdiff::{
    fuzzy_inverse, pnorm, render_heatmap, score_from_diffmap, srgb_to_linear, Comparator,
    Image3F, Params,
};

/// Perceptual image difference
///
/// Compares two images of identical dimensions and prints a calibrated
/// difference score. Scores below 1.0 mean the images read as the same
/// image; above 2.0 the difference is plainly visible.
#[derive(Parser, Debug)]
#[command(name = "visdiff")]
#[command(version, about, long_about = None)]
#[command(after_help = "Images are converted to linear light before comparison. Files \
without an embedded profile are interpreted per --colorspace (sRGB by default).")]
struct Cli {
    /// Reference image (the original)
    #[arg(value_name = "REFERENCE")]
    reference: PathBuf,

    /// Distorted image (the candidate)
    #[arg(value_name = "DISTORTED")]
    distorted: PathBuf,

    /// Write a false-color heatmap of the difference map to this file
    #[arg(long, value_name = "FILE")]
    distmap: Option<PathBuf>,

    /// Assumed color space for files without an embedded profile
    #[arg(long, value_enum, default_value = "srgb")]
    colorspace: Colorspace,

    /// High-frequency asymmetry: above 1.0 penalizes introduced detail
    /// more than removed detail
    #[arg(long, default_value = "0.8", value_name = "FACTOR")]
    hf_asymmetry: f32,

    /// Display brightness in nits represented by a full-scale sample
    #[arg(long, default_value = "80.0", value_name = "NITS")]
    intensity_target: f32,

    /// Worker threads for the row-parallel stages
    #[arg(long, default_value = "4", value_name = "N")]
    threads: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Colorspace {
    /// Samples carry the sRGB transfer curve
    Srgb,
    /// Samples are already linear light
    Linear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("visdiff: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let reference = load_linear(&cli.reference, cli.colorspace)?;
    let distorted = load_linear(&cli.distorted, cli.colorspace)?;

    if reference.width() != distorted.width() || reference.height() != distorted.height() {
        return Err(format!(
            "dimension mismatch: '{}' is {}x{}, '{}' is {}x{}",
            cli.reference.display(),
            reference.width(),
            reference.height(),
            cli.distorted.display(),
            distorted.width(),
            distorted.height(),
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build()
        .map_err(|e| format!("failed to build thread pool: {e}"))?;

    let params = Params::default()
        .with_asymmetry(cli.hf_asymmetry)
        .with_intensity_target(cli.intensity_target);

    let diffmap = pool.install(|| {
        let comparator = Comparator::new(&reference, params)?;
        comparator.compare(&distorted)
    });
    let diffmap = diffmap.map_err(|e| e.to_string())?;

    let score = score_from_diffmap(&diffmap);
    println!("{score:.10}");
    println!("3-norm: {:.6}", pnorm(&diffmap, 3.0));

    if let Some(path) = &cli.distmap {
        let good = fuzzy_inverse(1.5);
        let bad = fuzzy_inverse(0.5);
        let heatmap = render_heatmap(&diffmap, good, bad);
        save_heatmap(&heatmap, path)?;
    }

    Ok(())
}

/// Decodes an image file into linear-light planes.
fn load_linear(path: &Path, colorspace: Colorspace) -> Result<Image3F, String> {
    let decoded =
        image::open(path).map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    let (width, height) = decoded.dimensions();
    let rgb = decoded.to_rgb8();

    let mut out = Image3F::new(width as usize, height as usize);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let v = match colorspace {
                Colorspace::Srgb => srgb_to_linear(pixel.0[c]),
                Colorspace::Linear => f32::from(pixel.0[c]) / 255.0,
            };
            out.plane_mut(c).set(x as usize, y as usize, v);
        }
    }
    Ok(out)
}

fn save_heatmap(heatmap: &visdiff::ImgVec<visdiff::RGB8>, path: &Path) -> Result<(), String> {
    let width = heatmap.width();
    let height = heatmap.height();
    let mut bytes = Vec::with_capacity(width * height * 3);
    for row in heatmap.rows() {
        for px in row {
            bytes.extend_from_slice(&[px.r, px.g, px.b]);
        }
    }
    image::save_buffer(
        path,
        &bytes,
        width as u32,
        height as u32,
        image::ColorType::Rgb8,
    )
    .map_err(|e| format!("failed to write '{}': {e}", path.display()))
}
