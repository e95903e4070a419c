//! Run configuration.
//!
//! One [`DestripeParams`] record per instrument channel, loaded from YAML and
//! validated before any frame is touched. The whole [`Config`] is immutable
//! for the duration of a run and shared by reference across worker threads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::instrument::Instrument;

// ============================================================================
// Enums
// ============================================================================

/// Row-stripe estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DestripingMethod {
    /// Multi-scale masked median filter over the row profile.
    #[default]
    MedianFilter,
    /// Single pass: clipped median per row, referenced to the median of rows.
    RowMedian,
}

/// Per-column statistic used by the vertical corrector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WeightMethod {
    /// Sigma-clipped median.
    #[default]
    Median,
    /// Sigma-clipped mean.
    Rms,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("Invalid parameters for {instrument}: {reason}")]
    Invalid {
        instrument: Instrument,
        reason: String,
    },
}

// ============================================================================
// Parameters
// ============================================================================

/// Destriping parameters for one instrument channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestripeParams {
    // -- Segmentation --------------------------------------------------------
    /// Destripe each amplifier region independently.
    pub quadrants: bool,
    /// Match amplifier offsets across region boundaries before destriping.
    pub level_amplifiers: bool,

    // -- Row stripes ---------------------------------------------------------
    pub destriping_method: DestripingMethod,
    /// Median filter kernel sizes, strictly ascending and odd.
    pub median_filter_scales: Vec<usize>,
    /// Keep structure coherent over many rows in the background.
    pub filter_diffuse: bool,

    // -- Column stripes ------------------------------------------------------
    pub do_vertical_subtraction: bool,
    pub weight_method: WeightMethod,

    // -- Source mask ---------------------------------------------------------
    /// Clipping threshold in standard deviations.
    pub sigma: f32,
    /// Sigma-clipping iteration limit.
    pub max_iters: usize,
    /// Minimum connected pixels for a source detection.
    pub npixels: usize,
    /// Dilation radius applied to detected sources.
    pub dilate_size: usize,
}

impl Default for DestripeParams {
    fn default() -> Self {
        Self {
            quadrants: true,
            level_amplifiers: true,
            destriping_method: DestripingMethod::MedianFilter,
            median_filter_scales: vec![3, 7, 15, 31, 63, 127],
            filter_diffuse: false,
            do_vertical_subtraction: true,
            weight_method: WeightMethod::Median,
            sigma: 3.0,
            max_iters: 20,
            npixels: 3,
            dilate_size: 11,
        }
    }
}

impl DestripeParams {
    /// Check the parameter record, returning a human readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let scales = &self.median_filter_scales;
        if self.destriping_method == DestripingMethod::MedianFilter && scales.is_empty() {
            return Err("median_filter_scales must not be empty".to_string());
        }
        if let Some(&bad) = scales.iter().find(|&&s| s == 0 || s % 2 == 0) {
            return Err(format!("median filter scale {bad} must be odd and non-zero"));
        }
        if let Some(pair) = scales.windows(2).find(|w| w[0] >= w[1]) {
            return Err(format!(
                "median_filter_scales must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            ));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(format!("sigma must be positive, got {}", self.sigma));
        }
        if self.max_iters == 0 {
            return Err("max_iters must be at least 1".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Config
// ============================================================================

/// Authoritative configuration of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Recompute frames whose output already exists.
    pub overwrite: bool,
    pub nircam_short: DestripeParams,
    pub nircam_long: DestripeParams,
    pub miri: DestripeParams,
}

impl Config {
    /// Read and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML text. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use strum::IntoEnumIterator;

        for instrument in Instrument::iter() {
            self.params(instrument)
                .validate()
                .map_err(|reason| ConfigError::Invalid { instrument, reason })?;
        }
        Ok(())
    }

    #[inline]
    pub fn params(&self, instrument: Instrument) -> &DestripeParams {
        match instrument {
            Instrument::NircamShort => &self.nircam_short,
            Instrument::NircamLong => &self.nircam_long,
            Instrument::Miri => &self.miri,
        }
    }

    #[inline]
    pub fn params_mut(&mut self, instrument: Instrument) -> &mut DestripeParams {
        match instrument {
            Instrument::NircamShort => &mut self.nircam_short,
            Instrument::NircamLong => &mut self.nircam_long,
            Instrument::Miri => &mut self.miri,
        }
    }
}
