//! Amplifier-quadrant segmentation.
//!
//! Each readout amplifier adds its own stripe pattern, so full frames are
//! split into the amplifiers' column strips and destriped independently.


use std::ops::Range;

use common::{BitBuffer2, Buffer2};

use crate::instrument::InstrumentLayout;
use crate::statistics::{median_f32_mut, sigma_clipped_median};

/// Columns compared on each side of an amplifier boundary when levelling.
pub const LEVEL_OVERLAP: usize = 20;

/// Rectangular region of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quadrant {
    pub index: usize,
    pub columns: Range<usize>,
    pub rows: Range<usize>,
}

impl Quadrant {
    pub fn whole(width: usize, height: usize) -> Self {
        Self {
            index: 0,
            columns: 0..width,
            rows: 0..height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.columns.contains(&x) && self.rows.contains(&y)
    }

    /// Copy of this region of `buffer`.
    pub fn extract<T: Clone>(&self, buffer: &Buffer2<T>) -> Buffer2<T> {
        buffer.crop(self.columns.clone(), self.rows.clone())
    }

    pub fn extract_mask(&self, mask: &BitBuffer2) -> BitBuffer2 {
        mask.crop(
            self.columns.start,
            self.rows.start,
            self.width(),
            self.height(),
        )
    }

    /// Write `patch` (shaped like this region) back into `buffer`.
    pub fn insert<T: Clone>(&self, buffer: &mut Buffer2<T>, patch: &Buffer2<T>) {
        assert_eq!(patch.width(), self.width(), "patch width mismatch");
        assert_eq!(patch.height(), self.height(), "patch height mismatch");
        buffer.paste(patch, self.columns.start, self.rows.start);
    }
}

/// Split a `width x height` frame into independently destriped regions.
///
/// Falls back to a single region when segmentation is disabled or the shape
/// is not the layout's full frame. Regions are ordered left to right and
/// partition the frame exactly.
pub fn segment(
    width: usize,
    height: usize,
    layout: &InstrumentLayout,
    by_quadrant: bool,
) -> Vec<Quadrant> {
    if !by_quadrant || !layout.is_full_frame(width, height) || layout.amplifier_count() < 2 {
        return vec![Quadrant::whole(width, height)];
    }

    layout
        .amplifier_columns
        .windows(2)
        .enumerate()
        .map(|(index, bounds)| Quadrant {
            index,
            columns: bounds[0]..bounds[1],
            rows: 0..height,
        })
        .collect()
}

/// Median of the non-excluded pixels of `columns` in row `y`.
fn row_segment_median(
    pixels: &Buffer2<f32>,
    excluded: &BitBuffer2,
    y: usize,
    columns: Range<usize>,
    scratch: &mut Vec<f32>,
) -> Option<f32> {
    scratch.clear();
    let row = pixels.row(y);
    scratch.extend(
        columns
            .filter(|&x| !excluded.get_xy(x, y))
            .map(|x| row[x]),
    );
    (!scratch.is_empty()).then(|| median_f32_mut(scratch))
}

/// Match the levels of neighbouring regions across their shared boundary.
///
/// Region `i + 1` is shifted so the per-row medians of the last
/// [`LEVEL_OVERLAP`] columns of region `i` and its own first columns agree.
/// Excluded pixels are ignored when measuring but shifted with the rest of
/// their region. Returns the offset added to each region (the first is
/// always zero).
pub fn level_amplifiers(
    pixels: &mut Buffer2<f32>,
    excluded: &BitBuffer2,
    quadrants: &[Quadrant],
    sigma: f32,
    max_iters: usize,
) -> Vec<f32> {
    let mut offsets = vec![0.0f32; quadrants.len()];
    let mut scratch = Vec::new();
    let mut diffs = Vec::new();
    let mut clip_scratch = Vec::new();

    for i in 1..quadrants.len() {
        let (left, right) = (&quadrants[i - 1], &quadrants[i]);
        let boundary = right.columns.start;
        debug_assert_eq!(left.columns.end, boundary);

        let left_cols = boundary.saturating_sub(LEVEL_OVERLAP).max(left.columns.start)..boundary;
        let right_cols = boundary..(boundary + LEVEL_OVERLAP).min(right.columns.end);

        diffs.clear();
        for y in right.rows.clone() {
            let Some(l) = row_segment_median(pixels, excluded, y, left_cols.clone(), &mut scratch)
            else {
                continue;
            };
            let Some(r) = row_segment_median(pixels, excluded, y, right_cols.clone(), &mut scratch)
            else {
                continue;
            };
            diffs.push(l - r);
        }

        let Some(offset) = sigma_clipped_median(&diffs, &mut clip_scratch, sigma, max_iters) else {
            tracing::debug!(boundary, "No usable rows to level amplifier boundary");
            continue;
        };

        for y in right.rows.clone() {
            pixels.row_mut(y)[right.columns.clone()]
                .iter_mut()
                .for_each(|v| *v += offset);
        }
        offsets[i] = offset;
    }

    tracing::debug!(?offsets, "Levelled amplifiers");
    offsets
}
