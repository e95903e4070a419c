//! 1-D running median with reflective boundaries.
//!
//! Samples past either end are mirrored including the edge sample
//! (`d c b a | a b c d | d c b a`), so a constant profile filters to itself.

#[cfg(test)]
mod tests;

/// Map a possibly out-of-range index onto `0..len` by mirror reflection.
#[inline]
fn reflect_index(idx: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let period = 2 * len as isize;
    let m = idx.rem_euclid(period) as usize;
    if m < len { m } else { 2 * len - 1 - m }
}

/// Median filter `input` with an odd window of `size` samples.
///
/// Keeps a sorted copy of the window and updates it by binary search as the
/// window slides, one removal and one insertion per output sample.
pub fn median_filter_reflect(input: &[f32], size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "median filter size must be odd, got {size}");

    let len = input.len();
    if len == 0 || size == 1 {
        return input.to_vec();
    }

    let half = (size / 2) as isize;
    let sample = |i: isize| input[reflect_index(i, len)];

    let mut window: Vec<f32> = (-half..=half).map(sample).collect();
    window.sort_unstable_by(f32::total_cmp);

    let mut output = Vec::with_capacity(len);
    output.push(window[size / 2]);

    for i in 1..len as isize {
        let outgoing = sample(i - half - 1);
        let incoming = sample(i + half);

        let pos = window.partition_point(|v| v.total_cmp(&outgoing).is_lt());
        debug_assert!(window[pos].total_cmp(&outgoing).is_eq());
        window.remove(pos);

        let pos = window.partition_point(|v| v.total_cmp(&incoming).is_lt());
        window.insert(pos, incoming);

        output.push(window[size / 2]);
    }

    output
}

/// Largest odd window not exceeding `len`, or `requested` if it already fits.
#[inline]
pub fn clamp_odd_size(requested: usize, len: usize) -> usize {
    let cap = if len % 2 == 1 { len } else { len.saturating_sub(1) };
    requested.min(cap).max(1)
}
