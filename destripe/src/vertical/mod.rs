//! Column-stripe removal.
//!
//! Column-parallel readout leaves a per-column bias that the row destriper
//! cannot see. Each column's robust level is measured on the unmasked
//! residual and its difference from the region's typical column level is
//! subtracted, so the sky level of the region is unchanged.


use common::{BitBuffer2, Buffer2};
use rayon::prelude::*;

use crate::config::WeightMethod;
use crate::statistics::{median_f32, sigma_clipped_stats};

/// Result of column-stripe removal on one region.
#[derive(Debug, Clone)]
pub struct VerticalModel {
    pub correction: Buffer2<f32>,
    pub residual: Buffer2<f32>,
    /// Subtracted offset per column (zero for fully masked columns).
    pub column_offsets: Vec<f32>,
}

/// Sigma-clipped level of every column, `None` where nothing is usable.
pub fn column_levels(
    pixels: &Buffer2<f32>,
    mask: &BitBuffer2,
    method: WeightMethod,
    sigma: f32,
    max_iters: usize,
) -> Vec<Option<f32>> {
    assert_eq!(pixels.width(), mask.width(), "mask width mismatch");
    assert_eq!(pixels.height(), mask.height(), "mask height mismatch");

    (0..pixels.width())
        .into_par_iter()
        .map_init(Vec::new, |scratch, x| {
            scratch.clear();
            scratch.extend((0..pixels.height()).filter_map(|y| {
                let v = pixels[(x, y)];
                (v.is_finite() && !mask.get_xy(x, y)).then_some(v)
            }));
            let stats = sigma_clipped_stats(scratch, sigma, max_iters)?;
            Some(match method {
                WeightMethod::Median => stats.median,
                WeightMethod::Rms => stats.mean,
            })
        })
        .collect()
}

/// Subtract each column's offset from the region's median column level.
pub fn remove_vertical_stripes(
    pixels: &Buffer2<f32>,
    mask: &BitBuffer2,
    method: WeightMethod,
    sigma: f32,
    max_iters: usize,
) -> VerticalModel {
    let levels = column_levels(pixels, mask, method, sigma, max_iters);
    let valid: Vec<f32> = levels.iter().flatten().copied().collect();

    let column_offsets: Vec<f32> = match median_f32(&valid) {
        Some(reference) => levels
            .iter()
            .map(|level| level.map_or(0.0, |l| l - reference))
            .collect(),
        None => {
            tracing::warn!("No unmasked columns in region, vertical correction not applied");
            vec![0.0; pixels.width()]
        }
    };

    let mut residual = pixels.clone();
    for row in residual.rows_mut() {
        for (v, &offset) in row.iter_mut().zip(&column_offsets) {
            *v -= offset;
        }
    }
    let mut correction = Buffer2::new_default(pixels.width(), pixels.height());
    for row in correction.rows_mut() {
        row.copy_from_slice(&column_offsets);
    }

    VerticalModel {
        correction,
        residual,
        column_offsets,
    }
}
