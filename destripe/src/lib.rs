//! Destripe - stripe removal for near-infrared detector frames.
//!
//! Removes correlated readout noise from calibrated JWST NIRCam and MIRI
//! images:
//! - Row stripes, with a multi-scale median filter or a plain row median
//! - Column stripes, from per-column clipped statistics
//! - Amplifier offsets between full-frame readout regions
//!
//! Astronomical sources are masked before any statistic is taken, so only
//! the background drives the correction.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use destripe::{Config, Destriper, FrameJob};
//!
//! let config = Config::load("destripe.yaml".as_ref())?;
//! let destriper = Destriper::new(&config)?;
//! let report = destriper.run_batch(&[FrameJob::in_dir("jw01_nrca1_cal.fits", "out".as_ref())]);
//!
//! println!("{} processed, {} failed", report.processed, report.failed);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod frame;
pub mod instrument;
pub mod mask;
pub mod median_filter;
pub mod quadrant;
pub mod statistics;
pub mod stripes;
pub mod vertical;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{Config, ConfigError, DestripeParams, DestripingMethod, WeightMethod};

// ============================================================================
// Frames
// ============================================================================

pub use error::{Error, Result};
pub use frame::fits::{load_frame, write_corrected, HeaderValue};
pub use frame::{Frame, FrameMetadata};
pub use instrument::{Instrument, InstrumentLayout};

// ============================================================================
// Correction
// ============================================================================

pub use driver::{
    provenance_cards, BatchReport, CorrectionSummary, Destriper, FrameJob, FrameOutcome,
    FrameRecord, FrameStatus,
};
pub use mask::{build_source_mask, MaskConfig, SourceMask};
pub use quadrant::{level_amplifiers, segment, Quadrant};
pub use stripes::{remove_stripes, StripeModel};
pub use vertical::{remove_vertical_stripes, VerticalModel};
