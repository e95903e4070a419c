//! In-memory detector frame.

pub mod fits;

#[cfg(test)]
mod tests;

use common::Buffer2;

use crate::instrument::{Instrument, InstrumentLayout};
use crate::mask::{is_blank, ReferenceBorder};

/// Header metadata needed to destripe a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    pub instrument: Instrument,
    /// `DETECTOR` header value, e.g. `NRCA1`.
    pub detector: String,
    /// `SUBARRAY` header value, `FULL` for full-frame readouts.
    pub subarray: String,
    /// Exposure identifier, used in logs and reports.
    pub exposure: String,
}

impl FrameMetadata {
    pub fn new(instrument: Instrument, exposure: impl Into<String>) -> Self {
        Self {
            instrument,
            detector: String::new(),
            subarray: "FULL".to_string(),
            exposure: exposure.into(),
        }
    }

    #[inline]
    pub fn is_subarray(&self) -> bool {
        !self.subarray.trim().eq_ignore_ascii_case("FULL")
    }
}

/// Science pixels with their data-quality flags.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: Buffer2<f32>,
    pub dq: Buffer2<u32>,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(pixels: Buffer2<f32>, dq: Buffer2<u32>, metadata: FrameMetadata) -> Self {
        assert_eq!(pixels.width(), dq.width(), "DQ width must match pixels");
        assert_eq!(pixels.height(), dq.height(), "DQ height must match pixels");
        Self {
            pixels,
            dq,
            metadata,
        }
    }

    /// Frame with all DQ flags clear.
    pub fn without_dq(pixels: Buffer2<f32>, metadata: FrameMetadata) -> Self {
        let dq = Buffer2::new_default(pixels.width(), pixels.height());
        Self::new(pixels, dq, metadata)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    #[inline]
    pub fn layout(&self) -> &'static InstrumentLayout {
        self.metadata.instrument.layout()
    }

    /// Whether the frame covers the whole detector.
    #[inline]
    pub fn is_full_frame(&self) -> bool {
        !self.metadata.is_subarray() && self.layout().is_full_frame(self.width(), self.height())
    }

    /// Reference pixel border. Only full frames carry one.
    pub fn reference_border(&self) -> ReferenceBorder {
        if self.is_full_frame() {
            let layout = self.layout();
            ReferenceBorder {
                columns: layout.reference_columns,
                rows: layout.reference_rows,
            }
        } else {
            ReferenceBorder::NONE
        }
    }

    /// Pixels that keep their input value: blanks and the reference border.
    pub fn protected_pixels(&self) -> Buffer2<bool> {
        let border = self.reference_border();
        let (width, height) = (self.width(), self.height());
        let mut protected = Buffer2::new_default(width, height);
        for y in 0..height {
            let values = self.pixels.row(y);
            for (x, out) in protected.row_mut(y).iter_mut().enumerate() {
                *out = is_blank(values[x]) || border.contains(x, y, width, height);
            }
        }
        protected
    }
}
