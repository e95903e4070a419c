//! Testing utilities: synthetic frames and FITS fixtures.

use std::path::Path;

use common::Buffer2;
use fitsio::FitsFile;
use fitsio::images::{ImageDescription, ImageType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frame::{Frame, FrameMetadata};
use crate::instrument::Instrument;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Synthetic pixels
// ============================================================================

pub fn flat(width: usize, height: usize, level: f32) -> Buffer2<f32> {
    Buffer2::new_filled(width, height, level)
}

/// Add zero-mean Gaussian noise (Box-Muller), reproducible by seed.
pub fn add_gaussian_noise(pixels: &mut Buffer2<f32>, sigma: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for p in pixels.iter_mut() {
        let u1: f32 = rng.random::<f32>().max(f32::MIN_POSITIVE);
        let u2: f32 = rng.random();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
        *p += sigma * z;
    }
}

/// Add `pattern[y % len]` to every pixel of row `y`.
pub fn add_row_pattern(pixels: &mut Buffer2<f32>, pattern: &[f32]) {
    for (y, row) in pixels.rows_mut().enumerate() {
        let offset = pattern[y % pattern.len()];
        row.iter_mut().for_each(|p| *p += offset);
    }
}

/// Add `pattern[x % len]` to every pixel of column `x`.
pub fn add_column_pattern(pixels: &mut Buffer2<f32>, pattern: &[f32]) {
    for row in pixels.rows_mut() {
        for (x, p) in row.iter_mut().enumerate() {
            *p += pattern[x % pattern.len()];
        }
    }
}

/// Random per-row offsets uniformly drawn from `[-amplitude, amplitude]`.
pub fn random_row_offsets(height: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..height)
        .map(|_| rng.random_range(-amplitude..=amplitude))
        .collect()
}

/// Add a circular Gaussian source.
pub fn add_star(pixels: &mut Buffer2<f32>, cx: f32, cy: f32, amplitude: f32, sigma: f32) {
    let reach = (sigma * 5.0).ceil() as isize;
    let (w, h) = (pixels.width() as isize, pixels.height() as isize);
    let (x0, y0) = (cx.round() as isize, cy.round() as isize);
    for y in (y0 - reach).max(0)..(y0 + reach + 1).min(h) {
        for x in (x0 - reach).max(0)..(x0 + reach + 1).min(w) {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let r2 = (dx * dx + dy * dy) / (2.0 * sigma * sigma);
            pixels[(x as usize, y as usize)] += amplitude * (-r2).exp();
        }
    }
}

pub fn synthetic_frame(instrument: Instrument, pixels: Buffer2<f32>) -> Frame {
    Frame::without_dq(pixels, FrameMetadata::new(instrument, "synthetic"))
}

// ============================================================================
// FITS fixtures
// ============================================================================

/// How a fixture file stores its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitsFixture {
    /// Write a `DQ` extension from the frame flags.
    pub with_dq: bool,
    /// Put the pixels in the primary HDU instead of a `SCI` extension.
    pub sci_in_primary: bool,
}

impl Default for FitsFixture {
    fn default() -> Self {
        Self {
            with_dq: true,
            sci_in_primary: false,
        }
    }
}

fn header_name(instrument: Instrument) -> (&'static str, &'static str) {
    match instrument {
        Instrument::NircamShort => ("NIRCAM", "NRCA1"),
        Instrument::NircamLong => ("NIRCAM", "NRCALONG"),
        Instrument::Miri => ("MIRI", "MIRIMAGE"),
    }
}

/// Write `frame` as a calibrated-product style FITS file.
pub fn write_fits(path: &Path, frame: &Frame, fixture: FitsFixture) {
    let (width, height) = (frame.width(), frame.height());
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &[height, width],
    };

    let mut fptr = if fixture.sci_in_primary {
        FitsFile::create(path)
            .with_custom_primary(&description)
            .open()
            .unwrap()
    } else {
        FitsFile::create(path).open().unwrap()
    };

    let primary = fptr.primary_hdu().unwrap();
    let (instrume, detector) = header_name(frame.metadata.instrument);
    primary
        .write_key(&mut fptr, "INSTRUME", instrume.to_string())
        .unwrap();
    primary
        .write_key(&mut fptr, "DETECTOR", detector.to_string())
        .unwrap();
    primary
        .write_key(&mut fptr, "SUBARRAY", frame.metadata.subarray.clone())
        .unwrap();
    primary
        .write_key(&mut fptr, "FILENAME", frame.metadata.exposure.clone())
        .unwrap();

    if fixture.sci_in_primary {
        primary
            .write_image(&mut fptr, frame.pixels.pixels())
            .unwrap();
    } else {
        let sci = fptr.create_image("SCI".to_string(), &description).unwrap();
        sci.write_image(&mut fptr, frame.pixels.pixels()).unwrap();
    }

    if fixture.with_dq {
        let dq_description = ImageDescription {
            data_type: ImageType::Long,
            dimensions: &[height, width],
        };
        let flags: Vec<i32> = frame.dq.iter().map(|&f| f as i32).collect();
        let dq = fptr.create_image("DQ".to_string(), &dq_description).unwrap();
        dq.write_image(&mut fptr, &flags).unwrap();
    }
}
