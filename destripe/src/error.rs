//! Error types for frame processing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while destriping a single frame.
///
/// Every variant is scoped to one frame: the batch driver records it and
/// moves on to the next frame.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read frame '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("Frame '{path}' is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to write frame '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error(
        "Output '{path}' does not fit the corrected pixels: expected {expected:?}, found {found:?}"
    )]
    OutputShape {
        path: PathBuf,
        expected: (usize, usize),
        found: Option<(usize, usize)>,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to publish output '{path}': {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// True for missing or corrupt input artifacts, false for output failures.
    pub fn is_input(&self) -> bool {
        matches!(self, Error::Read { .. } | Error::Malformed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
