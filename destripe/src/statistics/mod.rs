//! Robust statistics: median and iterative sigma clipping.
//!
//! Clipping follows the usual astronomical convention: each pass centres on
//! the median, measures spread with the population standard deviation, and
//! rejects values further than `sigma` deviations from the centre. It stops
//! once a pass rejects nothing or the iteration limit is reached.


/// Median of `data`, reordering it in place (quickselect).
///
/// Even lengths average the two middle values.
#[inline]
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;

    let (left_part, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *median;
    if len & 1 == 1 {
        return upper;
    }
    let lower = left_part
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    (lower + upper) * 0.5
}

/// Median of a slice without touching it.
pub fn median_f32(data: &[f32]) -> Option<f32> {
    if data.is_empty() {
        return None;
    }
    let mut scratch = data.to_vec();
    Some(median_f32_mut(&mut scratch))
}

/// Mean and population standard deviation, accumulated in f64.
#[inline]
pub fn mean_std_f32(data: &[f32]) -> (f32, f32) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = data
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}

/// Summary of a sigma-clipped sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedStats {
    pub mean: f32,
    pub median: f32,
    pub std: f32,
    /// Number of values that survived clipping.
    pub count: usize,
}

/// Sigma-clipped mean, median and standard deviation.
///
/// `values` is used as scratch and reordered: survivors are compacted to the
/// front. Returns `None` for an empty sample.
pub fn sigma_clipped_stats(values: &mut [f32], sigma: f32, max_iters: usize) -> Option<ClippedStats> {
    if values.is_empty() {
        return None;
    }

    let mut len = values.len();
    for _ in 0..max_iters {
        let active = &mut values[..len];
        let (_, std) = mean_std_f32(active);
        let median = median_f32_mut(active);
        if std <= 0.0 {
            break;
        }

        let threshold = sigma * std;
        let mut write_idx = 0;
        for i in 0..len {
            if (values[i] - median).abs() <= threshold {
                values[write_idx] = values[i];
                write_idx += 1;
            }
        }

        if write_idx == len || write_idx == 0 {
            break;
        }
        len = write_idx;
    }

    let active = &mut values[..len];
    let (mean, std) = mean_std_f32(active);
    let median = median_f32_mut(active);
    Some(ClippedStats {
        mean,
        median,
        std,
        count: len,
    })
}

/// Sigma-clipped median of a slice, using `scratch` as working storage.
pub fn sigma_clipped_median(
    values: &[f32],
    scratch: &mut Vec<f32>,
    sigma: f32,
    max_iters: usize,
) -> Option<f32> {
    scratch.clear();
    scratch.extend_from_slice(values);
    sigma_clipped_stats(scratch, sigma, max_iters).map(|s| s.median)
}
