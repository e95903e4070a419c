//! Bit-packed 2D buffer for boolean masks.
//!
//! Uses 1 bit per element instead of 1 byte. Every row starts on a fresh
//! `u64` word, so rows can be processed independently (and in parallel)
//! with plain slice splitting. Padding bits past `width` are always zero.

use std::ops::Index;

/// Number of bits per storage word.
const BITS_PER_WORD: usize = 64;

/// A 2D buffer storing boolean values packed as bits, row aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer2 {
    words: Vec<u64>,
    width: usize,
    height: usize,
    words_per_row: usize,
}

impl BitBuffer2 {
    /// Create a new bit buffer filled with the given value.
    pub fn new_filled(width: usize, height: usize, value: bool) -> Self {
        let words_per_row = width.div_ceil(BITS_PER_WORD);
        let mut buffer = Self {
            words: vec![0; words_per_row * height],
            width,
            height,
            words_per_row,
        };
        buffer.fill(value);
        buffer
    }

    /// Create a new bit buffer with all bits cleared.
    #[inline]
    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, false)
    }

    /// Create a bit buffer from row-major booleans.
    pub fn from_slice(width: usize, height: usize, data: &[bool]) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length {} does not match dimensions {}x{}",
            data.len(),
            width,
            height
        );

        let mut buffer = Self::new_default(width, height);
        for (i, &value) in data.iter().enumerate() {
            if value {
                buffer.set(i, true);
            }
        }
        buffer
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of bits (width * height).
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    #[inline]
    fn locate(&self, x: usize, y: usize) -> (usize, usize) {
        (y * self.words_per_row + x / BITS_PER_WORD, x % BITS_PER_WORD)
    }

    /// Get a bit value at the given row-major linear index.
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len());
        self.get_xy(idx % self.width, idx / self.width)
    }

    /// Set a bit value at the given row-major linear index.
    #[inline]
    pub fn set(&mut self, idx: usize, value: bool) {
        debug_assert!(idx < self.len());
        self.set_xy(idx % self.width, idx / self.width, value);
    }

    #[inline]
    pub fn get_xy(&self, x: usize, y: usize) -> bool {
        debug_assert!(x < self.width && y < self.height);
        let (word, bit) = self.locate(x, y);
        (self.words[word] >> bit) & 1 != 0
    }

    #[inline]
    pub fn set_xy(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        let (word, bit) = self.locate(x, y);
        if value {
            self.words[word] |= 1u64 << bit;
        } else {
            self.words[word] &= !(1u64 << bit);
        }
    }

    /// Fill all bits with the given value, keeping padding bits clear.
    pub fn fill(&mut self, value: bool) {
        if !value || self.words_per_row == 0 {
            self.words.fill(0);
            return;
        }
        let tail = self.last_word_mask();
        for row in self.words.chunks_exact_mut(self.words_per_row) {
            row.fill(!0u64);
            row[self.words_per_row - 1] = tail;
        }
    }

    /// Valid-bit mask for the last word of each row.
    #[inline]
    pub fn last_word_mask(&self) -> u64 {
        match self.width % BITS_PER_WORD {
            0 => !0u64,
            rem => (1u64 << rem) - 1,
        }
    }

    /// Packed words of row `y`, LSB first.
    #[inline]
    pub fn row_words(&self, y: usize) -> &[u64] {
        let start = y * self.words_per_row;
        &self.words[start..start + self.words_per_row]
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Mutable packed storage. Callers must keep padding bits clear.
    #[inline]
    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    /// In-place union with another mask of the same shape.
    pub fn union_with(&mut self, other: &Self) {
        assert_eq!(self.width, other.width, "width mismatch");
        assert_eq!(self.height, other.height, "height mismatch");
        for (dst, &src) in self.words.iter_mut().zip(&other.words) {
            *dst |= src;
        }
    }

    /// Copy contents from another BitBuffer2.
    #[inline]
    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.width, other.width, "width mismatch");
        assert_eq!(self.height, other.height, "height mismatch");
        self.words.copy_from_slice(&other.words);
    }

    /// Count the number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Copy the rectangle `x0..x0+width, y0..y0+height` into a new buffer.
    pub fn crop(&self, x0: usize, y0: usize, width: usize, height: usize) -> Self {
        assert!(
            x0 + width <= self.width && y0 + height <= self.height,
            "crop out of bounds"
        );
        let mut out = Self::new_default(width, height);
        for y in 0..height {
            for x in 0..width {
                if self.get_xy(x0 + x, y0 + y) {
                    out.set_xy(x, y, true);
                }
            }
        }
        out
    }

    /// Iterate over all bit values in row-major order.
    #[inline]
    pub fn iter(&self) -> BitIter<'_> {
        BitIter {
            buffer: self,
            idx: 0,
        }
    }
}

impl Index<usize> for BitBuffer2 {
    type Output = bool;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        if self.get(idx) { &true } else { &false }
    }
}

impl Index<(usize, usize)> for BitBuffer2 {
    type Output = bool;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        if self.get_xy(x, y) { &true } else { &false }
    }
}

/// Iterator over bit values.
pub struct BitIter<'a> {
    buffer: &'a BitBuffer2,
    idx: usize,
}

impl Iterator for BitIter<'_> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx < self.buffer.len() {
            let value = self.buffer.get(self.idx);
            self.idx += 1;
            Some(value)
        } else {
            None
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len() - self.idx;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BitIter<'_> {}
