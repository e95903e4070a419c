//! Row-stripe removal.
//!
//! Stripes are additive offsets shared by all pixels of a detector row. The
//! multi-scale method estimates them from the masked row-median profile: at
//! each kernel size the profile is median filtered, and whatever the filter
//! removes is treated as stripe noise at that scale. Scales run smallest
//! first, each on the residual left by the previous ones.


use common::{BitBuffer2, Buffer2};
use rayon::prelude::*;

use crate::config::{DestripeParams, DestripingMethod};
use crate::median_filter::{clamp_odd_size, median_filter_reflect};
use crate::statistics::{median_f32, median_f32_mut, sigma_clipped_stats};

/// With diffuse filtering, a scale's correction is smoothed by a median of
/// roughly `scale / DIFFUSE_KERNEL_DIVISOR` rows and the smooth part is kept
/// as background.
pub const DIFFUSE_KERNEL_DIVISOR: usize = 4;

/// Result of row-stripe removal on one region.
#[derive(Debug, Clone)]
pub struct StripeModel {
    /// Total subtracted offset per pixel.
    pub correction: Buffer2<f32>,
    /// Input minus correction.
    pub residual: Buffer2<f32>,
    /// Kernel sizes that were applied, in order.
    pub applied_scales: Vec<usize>,
    /// Kernel sizes that were skipped (too large or no usable rows).
    pub skipped_scales: Vec<usize>,
}

impl StripeModel {
    fn unchanged(pixels: &Buffer2<f32>) -> Self {
        Self {
            correction: Buffer2::new_default(pixels.width(), pixels.height()),
            residual: pixels.clone(),
            applied_scales: Vec::new(),
            skipped_scales: Vec::new(),
        }
    }

    /// Subtract `offsets[y]` from every pixel of row `y`.
    fn subtract_rows(&mut self, offsets: &[f32]) {
        debug_assert_eq!(offsets.len(), self.residual.height());
        self.residual
            .rows_mut()
            .zip(self.correction.rows_mut())
            .zip(offsets)
            .for_each(|((residual, correction), &offset)| {
                residual.iter_mut().for_each(|v| *v -= offset);
                correction.iter_mut().for_each(|c| *c += offset);
            });
    }
}

/// Remove row stripes with the configured method.
pub fn remove_stripes(
    pixels: &Buffer2<f32>,
    mask: &BitBuffer2,
    params: &DestripeParams,
) -> StripeModel {
    match params.destriping_method {
        DestripingMethod::MedianFilter => median_filter_destripe(
            pixels,
            mask,
            &params.median_filter_scales,
            params.filter_diffuse,
        ),
        DestripingMethod::RowMedian => {
            row_median_destripe(pixels, mask, params.sigma, params.max_iters)
        }
    }
}

// ============================================================================
// Row profile
// ============================================================================

/// Median of the unmasked finite pixels of each row, `None` if there are none.
pub fn masked_row_medians(pixels: &Buffer2<f32>, mask: &BitBuffer2) -> Vec<Option<f32>> {
    assert_eq!(pixels.width(), mask.width(), "mask width mismatch");
    assert_eq!(pixels.height(), mask.height(), "mask height mismatch");

    (0..pixels.height())
        .into_par_iter()
        .map_init(Vec::new, |scratch, y| {
            scratch.clear();
            scratch.extend(
                pixels
                    .row(y)
                    .iter()
                    .enumerate()
                    .filter(|&(x, v)| v.is_finite() && !mask.get_xy(x, y))
                    .map(|(_, &v)| v),
            );
            (!scratch.is_empty()).then(|| median_f32_mut(scratch))
        })
        .collect()
}

/// Fill rows without a value by linear interpolation between the nearest
/// valid rows, holding the end values constant. `None` if no row is valid.
pub fn fill_unusable_rows(profile: &[Option<f32>]) -> Option<Vec<f32>> {
    let valid: Vec<(usize, f32)> = profile
        .iter()
        .enumerate()
        .filter_map(|(y, v)| v.map(|v| (y, v)))
        .collect();
    let (&(first_y, first_v), &(last_y, last_v)) = (valid.first()?, valid.last()?);

    let mut filled = Vec::with_capacity(profile.len());
    let mut next = 0usize;
    for y in 0..profile.len() {
        if let Some(v) = profile[y] {
            filled.push(v);
            next += 1;
        } else if y < first_y {
            filled.push(first_v);
        } else if y > last_y {
            filled.push(last_v);
        } else {
            let (y0, v0) = valid[next - 1];
            let (y1, v1) = valid[next];
            let t = (y - y0) as f32 / (y1 - y0) as f32;
            filled.push(v0 + t * (v1 - v0));
        }
    }
    Some(filled)
}

// ============================================================================
// Multi-scale median filter
// ============================================================================

/// Per-row stripe estimate at one kernel size.
fn scale_correction(profile: &[f32], scale: usize, filter_diffuse: bool) -> Vec<f32> {
    let background = median_filter_reflect(profile, scale);
    let mut correction: Vec<f32> = profile
        .iter()
        .zip(&background)
        .map(|(p, b)| p - b)
        .collect();

    if filter_diffuse {
        let requested = ((scale / DIFFUSE_KERNEL_DIVISOR) | 1).max(3);
        let kernel = clamp_odd_size(requested, profile.len());
        let coherent = median_filter_reflect(&correction, kernel);
        correction
            .iter_mut()
            .zip(&coherent)
            .for_each(|(c, s)| *c -= s);
    }
    correction
}

/// Multi-scale masked median-filter destriping of one region.
///
/// `scales` are applied in the given order; callers pass them ascending.
/// A scale larger than the region's smaller dimension is skipped.
pub fn median_filter_destripe(
    pixels: &Buffer2<f32>,
    mask: &BitBuffer2,
    scales: &[usize],
    filter_diffuse: bool,
) -> StripeModel {
    let mut model = StripeModel::unchanged(pixels);
    let limit = pixels.width().min(pixels.height());

    for &scale in scales {
        if scale > limit {
            tracing::warn!(
                scale,
                width = pixels.width(),
                height = pixels.height(),
                "Median filter scale exceeds region size, skipping"
            );
            model.skipped_scales.push(scale);
            continue;
        }

        let Some(profile) = fill_unusable_rows(&masked_row_medians(&model.residual, mask)) else {
            tracing::warn!(scale, "No unmasked rows in region, skipping scale");
            model.skipped_scales.push(scale);
            continue;
        };

        let offsets = scale_correction(&profile, scale, filter_diffuse);
        model.subtract_rows(&offsets);
        model.applied_scales.push(scale);

        tracing::trace!(scale, "Applied median filter scale");
    }

    model
}

// ============================================================================
// Row median
// ============================================================================

/// Single-pass destriping: each row's sigma-clipped median, referenced to
/// the median over rows so the sky level is kept.
pub fn row_median_destripe(
    pixels: &Buffer2<f32>,
    mask: &BitBuffer2,
    sigma: f32,
    max_iters: usize,
) -> StripeModel {
    assert_eq!(pixels.width(), mask.width(), "mask width mismatch");
    assert_eq!(pixels.height(), mask.height(), "mask height mismatch");

    let medians: Vec<Option<f32>> = (0..pixels.height())
        .into_par_iter()
        .map_init(Vec::new, |scratch, y| {
            scratch.clear();
            scratch.extend(
                pixels
                    .row(y)
                    .iter()
                    .enumerate()
                    .filter(|&(x, v)| v.is_finite() && !mask.get_xy(x, y))
                    .map(|(_, &v)| v),
            );
            sigma_clipped_stats(scratch, sigma, max_iters).map(|s| s.median)
        })
        .collect();

    let mut model = StripeModel::unchanged(pixels);
    let valid: Vec<f32> = medians.iter().flatten().copied().collect();
    let Some(reference) = median_f32(&valid) else {
        tracing::warn!("No unmasked rows in region, row medians not applied");
        return model;
    };

    let offsets: Vec<f32> = medians
        .iter()
        .map(|m| m.map_or(0.0, |m| m - reference))
        .collect();
    model.subtract_rows(&offsets);
    model
}
