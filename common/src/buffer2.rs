use std::ops::{Deref, DerefMut, Index, IndexMut, Range};
use std::slice;

/// Row-major 2D buffer. Element `(x, y)` lives at `y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer2<T> {
    pixels: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Buffer2<T> {
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            pixels,
            width,
            height,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &T {
        debug_assert!(x < self.width && y < self.height);
        &self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        debug_assert!(x < self.width && y < self.height);
        &mut self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.pixels
    }

    /// Row `y` as a slice of `width` elements.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        debug_assert!(y < self.height);
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        debug_assert!(y < self.height);
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }

    /// Iterate rows top to bottom.
    #[inline]
    pub fn rows(&self) -> slice::ChunksExact<'_, T> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    /// Iterate rows top to bottom, mutably.
    #[inline]
    pub fn rows_mut(&mut self) -> slice::ChunksExactMut<'_, T> {
        self.pixels.chunks_exact_mut(self.width.max(1))
    }

    /// Element-wise conversion into a buffer of the same shape.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Buffer2<U> {
        Buffer2 {
            pixels: self.pixels.iter().map(f).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Default + Clone> Buffer2<T> {
    pub fn new_default(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![T::default(); width * height],
            width,
            height,
        }
    }
}

impl<T: Clone> Buffer2<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self {
            pixels: vec![value; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }

    /// Copy the rectangle `columns x rows` into a new buffer.
    pub fn crop(&self, columns: Range<usize>, rows: Range<usize>) -> Self {
        assert!(
            columns.end <= self.width && rows.end <= self.height,
            "crop {columns:?} x {rows:?} out of bounds for {}x{}",
            self.width,
            self.height
        );
        let width = columns.len();
        let height = rows.len();
        let mut pixels = Vec::with_capacity(width * height);
        for y in rows {
            pixels.extend_from_slice(&self.row(y)[columns.clone()]);
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Write `patch` into this buffer with its top-left corner at `(x0, y0)`.
    pub fn paste(&mut self, patch: &Self, x0: usize, y0: usize) {
        assert!(
            x0 + patch.width <= self.width && y0 + patch.height <= self.height,
            "patch {}x{} at ({x0}, {y0}) out of bounds for {}x{}",
            patch.width,
            patch.height,
            self.width,
            self.height
        );
        for (py, src) in patch.rows().enumerate() {
            self.row_mut(y0 + py)[x0..x0 + patch.width].clone_from_slice(src);
        }
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.pixels[y * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.pixels[y * self.width + x]
    }
}

impl<T> Deref for Buffer2<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.pixels
    }
}

impl<T> DerefMut for Buffer2<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pixels
    }
}

impl<T> From<Buffer2<T>> for Vec<T> {
    #[inline]
    fn from(buffer: Buffer2<T>) -> Self {
        buffer.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_dimensions() {
        let buf = Buffer2::new(3, 2, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(buf.width(), 3);
        assert_eq!(buf.height(), 2);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    #[should_panic(expected = "pixels length must equal width * height")]
    fn test_new_panics_on_size_mismatch() {
        Buffer2::new(3, 2, vec![1, 2, 3]);
    }

    #[test]
    fn test_row_access() {
        // row 0 = [10, 20, 30], row 1 = [40, 50, 60]
        let mut buf = Buffer2::new(3, 2, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(buf.row(1), &[40, 50, 60]);
        buf.row_mut(0)[2] = 99;
        assert_eq!(buf[(2, 0)], 99);
        assert_eq!(buf.rows().count(), 2);
    }

    #[test]
    fn test_crop_and_paste_roundtrip() {
        let buf = Buffer2::new(4, 3, (0..12).collect::<Vec<i32>>());
        let patch = buf.crop(1..3, 1..3);
        assert_eq!(patch.width(), 2);
        assert_eq!(patch.height(), 2);
        assert_eq!(patch.pixels(), &[5, 6, 9, 10]);

        let mut target = Buffer2::new_filled(4, 3, 0);
        target.paste(&patch, 1, 1);
        assert_eq!(target[(1, 1)], 5);
        assert_eq!(target[(2, 2)], 10);
        assert_eq!(target[(0, 0)], 0);
        assert_eq!(target[(3, 2)], 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_crop_out_of_bounds() {
        let buf = Buffer2::new_filled(4, 4, 0u8);
        buf.crop(2..5, 0..4);
    }

    #[test]
    fn test_map_preserves_shape() {
        let buf = Buffer2::new(2, 2, vec![1u32, 2, 3, 4]);
        let mapped = buf.map(|&v| v as f32 * 0.5);
        assert_eq!(mapped.width(), 2);
        assert_eq!(mapped.pixels(), &[0.5, 1.0, 1.5, 2.0]);
    }
}
