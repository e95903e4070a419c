//! Statistical source mask.
//!
//! Marks every pixel that must not contribute to background statistics:
//! pixels the calibration flagged or that carry no data, plus astronomical
//! sources found by sigma-clipped thresholding and grown by dilation.
//! The mask is built once per frame, before any correction, and is read-only
//! afterwards.

pub mod dilation;
pub mod labeling;


use common::{BitBuffer2, Buffer2};
use rayon::prelude::*;

use crate::config::DestripeParams;
use crate::statistics::{sigma_clipped_stats, ClippedStats};

pub use dilation::dilate_mask;
pub use labeling::remove_small_regions;

/// DQ bit: pixel must not be used.
pub const DO_NOT_USE: u32 = 1 << 0;
/// DQ bit: pixel is not on the science area.
pub const NON_SCIENCE: u32 = 1 << 9;
/// DQ bits that exclude a pixel from the background.
pub const EXCLUDED_DQ_BITS: u32 = DO_NOT_USE | NON_SCIENCE;

/// Below this many usable pixels the source statistics are not trusted.
pub const MIN_BACKGROUND_PIXELS: usize = 64;

/// Reference (non-illuminated) pixel border of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferenceBorder {
    /// Columns on each of the left and right edges.
    pub columns: usize,
    /// Rows on each of the top and bottom edges.
    pub rows: usize,
}

impl ReferenceBorder {
    pub const NONE: Self = Self {
        columns: 0,
        rows: 0,
    };

    #[inline]
    pub fn contains(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        x < self.columns
            || x + self.columns >= width
            || y < self.rows
            || y + self.rows >= height
    }
}

/// Whether a pixel value carries no usable signal.
///
/// Exact zero is the calibration pipeline's "no data" marker.
#[inline]
pub fn is_blank(value: f32) -> bool {
    !value.is_finite() || value == 0.0
}

/// Mask construction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskConfig {
    pub sigma: f32,
    pub max_iters: usize,
    /// Minimum 8-connected size of a source. Values below 2 keep every pixel.
    pub npixels: usize,
    /// Square dilation radius applied to sources.
    pub dilate_size: usize,
    pub border: ReferenceBorder,
}

impl MaskConfig {
    pub fn from_params(params: &DestripeParams, border: ReferenceBorder) -> Self {
        Self {
            sigma: params.sigma,
            max_iters: params.max_iters,
            npixels: params.npixels,
            dilate_size: params.dilate_size,
            border,
        }
    }
}

/// Pixels excluded from background statistics (`true` = excluded).
#[derive(Debug, Clone)]
pub struct SourceMask {
    bits: BitBuffer2,
    flagged_count: usize,
    background_stats: Option<ClippedStats>,
    low_confidence: bool,
}

impl SourceMask {
    /// A mask that excludes nothing.
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            bits: BitBuffer2::new_default(width, height),
            flagged_count: 0,
            background_stats: None,
            low_confidence: false,
        }
    }

    #[inline]
    pub fn bits(&self) -> &BitBuffer2 {
        &self.bits
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.bits.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.bits.height()
    }

    #[inline]
    pub fn is_masked(&self, x: usize, y: usize) -> bool {
        self.bits.get_xy(x, y)
    }

    /// Total number of excluded pixels.
    #[inline]
    pub fn masked_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Excluded pixels that came from flags, blanks or the reference border.
    #[inline]
    pub fn flagged_count(&self) -> usize {
        self.flagged_count
    }

    /// Excluded pixels that came from source detection (after dilation).
    #[inline]
    pub fn source_count(&self) -> usize {
        self.masked_count() - self.flagged_count
    }

    /// Clipped statistics of the unflagged pixels, if there were enough.
    #[inline]
    pub fn background_stats(&self) -> Option<ClippedStats> {
        self.background_stats
    }

    /// Too few usable pixels: no source detection was attempted.
    #[inline]
    pub fn low_confidence(&self) -> bool {
        self.low_confidence
    }
}

/// Pixels that are DQ-flagged, blank, or inside the reference border.
pub fn flagged_pixels(
    pixels: &Buffer2<f32>,
    dq: &Buffer2<u32>,
    border: ReferenceBorder,
) -> BitBuffer2 {
    assert_eq!(pixels.width(), dq.width(), "width mismatch");
    assert_eq!(pixels.height(), dq.height(), "height mismatch");

    let (width, height) = (pixels.width(), pixels.height());
    let mut flagged = BitBuffer2::new_default(width, height);
    if flagged.is_empty() {
        return flagged;
    }

    let words_per_row = flagged.words_per_row();
    flagged
        .words_mut()
        .par_chunks_mut(words_per_row)
        .enumerate()
        .for_each(|(y, row_words)| {
            let values = pixels.row(y);
            let flags = dq.row(y);
            for x in 0..width {
                if flags[x] & EXCLUDED_DQ_BITS != 0
                    || is_blank(values[x])
                    || border.contains(x, y, width, height)
                {
                    row_words[x / 64] |= 1u64 << (x % 64);
                }
            }
        });
    flagged
}

/// Build the source mask of a frame.
pub fn build_source_mask(
    pixels: &Buffer2<f32>,
    dq: &Buffer2<u32>,
    config: &MaskConfig,
) -> SourceMask {
    let flagged = flagged_pixels(pixels, dq, config.border);
    let flagged_count = flagged.count_ones();
    let (width, height) = (pixels.width(), pixels.height());

    let mut background: Vec<f32> = pixels
        .iter()
        .zip(flagged.iter())
        .filter_map(|(&v, excluded)| (!excluded).then_some(v))
        .collect();

    let usable = background.len();
    let stats = if usable >= MIN_BACKGROUND_PIXELS {
        sigma_clipped_stats(&mut background, config.sigma, config.max_iters)
    } else {
        None
    };
    let Some(stats) = stats else {
        tracing::warn!(
            usable,
            required = MIN_BACKGROUND_PIXELS,
            "Too few usable pixels for source detection, masking flagged pixels only"
        );
        return SourceMask {
            bits: flagged,
            flagged_count,
            background_stats: None,
            low_confidence: true,
        };
    };
    let threshold = stats.median + config.sigma * stats.std;

    let mut sources = BitBuffer2::new_default(width, height);
    let words_per_row = sources.words_per_row();
    sources
        .words_mut()
        .par_chunks_mut(words_per_row)
        .enumerate()
        .for_each(|(y, row_words)| {
            let flagged_row = flagged.row_words(y);
            for (x, &v) in pixels.row(y).iter().enumerate() {
                let bit = 1u64 << (x % 64);
                if flagged_row[x / 64] & bit == 0 && v > threshold {
                    row_words[x / 64] |= bit;
                }
            }
        });

    let regions = if config.npixels > 1 {
        remove_small_regions(&mut sources, config.npixels)
    } else {
        0
    };

    let mut bits = BitBuffer2::new_default(width, height);
    dilate_mask(&sources, config.dilate_size, &mut bits);
    bits.union_with(&flagged);

    tracing::debug!(
        median = stats.median,
        std = stats.std,
        threshold,
        regions,
        masked = bits.count_ones(),
        flagged = flagged_count,
        "Built source mask"
    );

    SourceMask {
        bits,
        flagged_count,
        background_stats: Some(stats),
        low_confidence: false,
    }
}
