//! Square morphological dilation of bit-packed masks.
//!
//! Separable: a horizontal pass smears set bits along each row, then a
//! vertical pass ORs each row with its neighbours within the radius. Both
//! passes work on whole `u64` words and run row-parallel.

use common::BitBuffer2;
use rayon::prelude::*;

/// Dilate `mask` by a `(2 * radius + 1)` square structuring element.
pub fn dilate_mask(mask: &BitBuffer2, radius: usize, output: &mut BitBuffer2) {
    assert_eq!(mask.width(), output.width(), "width mismatch");
    assert_eq!(mask.height(), output.height(), "height mismatch");

    if radius == 0 || mask.is_empty() {
        output.copy_from(mask);
        return;
    }

    let words_per_row = mask.words_per_row();
    let height = mask.height();
    let tail = mask.last_word_mask();

    // Horizontal pass into a scratch copy.
    let mut horizontal = mask.clone();
    horizontal
        .words_mut()
        .par_chunks_mut(words_per_row)
        .for_each(|row| {
            let mut scratch = vec![0u64; row.len()];
            dilate_row(row, radius, tail, &mut scratch);
        });

    // Vertical pass: OR of the horizontal rows within the radius.
    let src = horizontal.words();
    output
        .words_mut()
        .par_chunks_mut(words_per_row)
        .enumerate()
        .for_each(|(y, out_row)| {
            out_row.fill(0);
            let y_min = y.saturating_sub(radius);
            let y_max = (y + radius).min(height - 1);
            for sy in y_min..=y_max {
                let src_row = &src[sy * words_per_row..(sy + 1) * words_per_row];
                if src_row.iter().all(|&w| w == 0) {
                    continue;
                }
                for (dst, &word) in out_row.iter_mut().zip(src_row) {
                    *dst |= word;
                }
            }
        });
}

/// Dilate one packed row in place by `radius` bits on each side.
///
/// Doubles the covered distance per step, so a radius `r` costs
/// `O(words * log r)` regardless of how large `r` is relative to a word.
fn dilate_row(row: &mut [u64], radius: usize, tail: u64, scratch: &mut [u64]) {
    if row.iter().all(|&w| w == 0) {
        return;
    }

    let mut covered = 0usize;
    while covered < radius {
        let step = (covered + 1).min(radius - covered);

        shift_toward_high(row, step, scratch);
        let len = row.len();
        for (dst, &src) in row.iter_mut().zip(scratch.iter()) {
            *dst |= src;
        }
        // Bits pushed into the padding must not come back on the next shift.
        row[len - 1] &= tail;

        shift_toward_low(row, step, scratch);
        for (dst, &src) in row.iter_mut().zip(scratch.iter()) {
            *dst |= src;
        }

        covered += step;
    }
    let len = row.len();
    row[len - 1] &= tail;
}

/// `dst[x + n] = src[x]` across word boundaries.
#[inline]
fn shift_toward_high(src: &[u64], n: usize, dst: &mut [u64]) {
    let word_shift = n / 64;
    let bit_shift = (n % 64) as u32;
    for (i, out) in dst.iter_mut().enumerate() {
        let lo = i.checked_sub(word_shift).map_or(0, |j| src[j]);
        let carry = i
            .checked_sub(word_shift + 1)
            .map_or(0, |j| src[j]);
        *out = if bit_shift == 0 {
            lo
        } else {
            (lo << bit_shift) | (carry >> (64 - bit_shift))
        };
    }
}

/// `dst[x - n] = src[x]` across word boundaries.
#[inline]
fn shift_toward_low(src: &[u64], n: usize, dst: &mut [u64]) {
    let word_shift = n / 64;
    let bit_shift = (n % 64) as u32;
    for (i, out) in dst.iter_mut().enumerate() {
        let hi = src.get(i + word_shift).copied().unwrap_or(0);
        let carry = src.get(i + word_shift + 1).copied().unwrap_or(0);
        *out = if bit_shift == 0 {
            hi
        } else {
            (hi >> bit_shift) | (carry << (64 - bit_shift))
        };
    }
}
