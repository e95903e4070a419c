//! Instrument variants and their fixed readout geometry.
//!
//! Amplifier layout is a hardware constant per channel, so it lives in static
//! tables keyed by [`Instrument`] instead of being derived from the data.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Detector channel a frame was taken with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Instrument {
    /// NIRCam short-wavelength detectors (NRCA1-4, NRCB1-4).
    NircamShort,
    /// NIRCam long-wavelength detectors (NRCALONG, NRCBLONG).
    NircamLong,
    /// MIRI imager.
    Miri,
}

/// Readout geometry of one instrument channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentLayout {
    /// Full-frame size as (width, height).
    pub full_frame: (usize, usize),
    /// Column boundaries of the rectangular amplifier regions, left to right.
    /// Starts at 0 and ends at the full-frame width.
    pub amplifier_columns: &'static [usize],
    /// Reference (non-illuminated) columns on each side of a full frame.
    pub reference_columns: usize,
    /// Reference rows at the top and bottom of a full frame.
    pub reference_rows: usize,
}

/// NIRCam SCA: four 512-column output amplifiers, 4-pixel reference border.
pub const NIRCAM_LAYOUT: InstrumentLayout = InstrumentLayout {
    full_frame: (2048, 2048),
    amplifier_columns: &[0, 512, 1024, 1536, 2048],
    reference_columns: 4,
    reference_rows: 4,
};

/// MIRI imager. Its four amplifiers are interleaved column by column, so there
/// is a single rectangular region. Reference pixels are the outer 4 columns.
pub const MIRI_LAYOUT: InstrumentLayout = InstrumentLayout {
    full_frame: (1032, 1024),
    amplifier_columns: &[0, 1032],
    reference_columns: 4,
    reference_rows: 0,
};

impl InstrumentLayout {
    /// Whether a `width x height` frame covers the full detector.
    #[inline]
    pub fn is_full_frame(&self, width: usize, height: usize) -> bool {
        self.full_frame == (width, height)
    }

    /// Number of rectangular amplifier regions.
    #[inline]
    pub fn amplifier_count(&self) -> usize {
        self.amplifier_columns.len().saturating_sub(1)
    }
}

impl Instrument {
    #[inline]
    pub fn layout(self) -> &'static InstrumentLayout {
        match self {
            Instrument::NircamShort | Instrument::NircamLong => &NIRCAM_LAYOUT,
            Instrument::Miri => &MIRI_LAYOUT,
        }
    }

    /// Resolve the channel from the `INSTRUME` and `DETECTOR` header values.
    pub fn from_header(instrument: &str, detector: &str) -> Option<Self> {
        let instrument = instrument.trim().to_ascii_uppercase();
        let detector = detector.trim().to_ascii_uppercase();
        match instrument.as_str() {
            "NIRCAM" => {
                // Long-wave SCAs are reported either as NRCxLONG or NRCx5.
                if detector.ends_with("LONG") || detector.ends_with('5') {
                    Some(Instrument::NircamLong)
                } else {
                    Some(Instrument::NircamShort)
                }
            }
            "MIRI" => Some(Instrument::Miri),
            _ => None,
        }
    }
}
