//! FITS input and output for frames.
//!
//! Pixels are read from the `SCI` extension (falling back to the primary
//! image) and quality flags from the optional `DQ` extension. Output is a
//! copy of the input with the `SCI` pixels replaced, staged in a temporary
//! file next to the destination and renamed into place once complete.

use std::path::Path;

use common::Buffer2;
use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};

use super::{Frame, FrameMetadata};
use crate::error::{Error, Result};
use crate::instrument::Instrument;

/// Header value written as provenance.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Int(value as i64)
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        HeaderValue::Int(value as i64)
    }
}

impl From<f32> for HeaderValue {
    fn from(value: f32) -> Self {
        HeaderValue::Float(value as f64)
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

/// A header card: 8-character key and value.
pub type HeaderCard = (&'static str, HeaderValue);

fn read_key_optional<T: fitsio::headers::ReadsKey>(
    hdu: &FitsHdu,
    fptr: &mut FitsFile,
    key: &str,
) -> Option<T> {
    hdu.read_key(fptr, key).ok()
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::Malformed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Image extension holding the science pixels.
fn science_hdu(fptr: &mut FitsFile) -> std::result::Result<FitsHdu, fitsio::errors::Error> {
    match fptr.hdu("SCI") {
        Ok(hdu) => Ok(hdu),
        Err(_) => fptr.primary_hdu(),
    }
}

/// `(width, height)` of a 2-D image HDU.
fn image_shape(hdu: &FitsHdu) -> Option<(usize, usize)> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => Some((shape[1], shape[0])),
        _ => None,
    }
}

/// Load a frame and its metadata.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let read_err = |source| Error::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut fptr = FitsFile::open(path).map_err(read_err)?;
    let primary = fptr.primary_hdu().map_err(read_err)?;

    let instrume: String = read_key_optional(&primary, &mut fptr, "INSTRUME")
        .ok_or_else(|| malformed(path, "missing INSTRUME keyword"))?;
    let detector: String = read_key_optional(&primary, &mut fptr, "DETECTOR").unwrap_or_default();
    let instrument = Instrument::from_header(&instrume, &detector)
        .ok_or_else(|| malformed(path, format!("unsupported instrument '{}'", instrume.trim())))?;
    let subarray: String =
        read_key_optional(&primary, &mut fptr, "SUBARRAY").unwrap_or_else(|| "FULL".to_string());
    let exposure: String = read_key_optional(&primary, &mut fptr, "FILENAME").unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let sci = science_hdu(&mut fptr).map_err(read_err)?;
    let (width, height) =
        image_shape(&sci).ok_or_else(|| malformed(path, "science data is not a 2-D image"))?;
    let pixels: Vec<f32> = sci.read_image(&mut fptr).map_err(read_err)?;
    if pixels.len() != width * height {
        return Err(malformed(path, "science pixel count does not match its shape"));
    }

    let dq = match fptr.hdu("DQ") {
        Ok(hdu) => {
            if image_shape(&hdu) != Some((width, height)) {
                return Err(malformed(path, "DQ shape does not match science data"));
            }
            let flags: Vec<i64> = hdu.read_image(&mut fptr).map_err(read_err)?;
            Buffer2::new(width, height, flags.into_iter().map(|f| f as u32).collect())
        }
        Err(_) => Buffer2::new_default(width, height),
    };

    let metadata = FrameMetadata {
        instrument,
        detector: detector.trim().to_string(),
        subarray: subarray.trim().to_string(),
        exposure: exposure.trim().to_string(),
    };

    tracing::debug!(
        path = %path.display(),
        instrument = %instrument,
        width,
        height,
        subarray = %metadata.subarray,
        "Loaded frame"
    );

    Ok(Frame::new(Buffer2::new(width, height, pixels), dq, metadata))
}

/// Write `pixels` as the science data of a copy of `input` at `output`.
///
/// `cards` are added to the science header. `output` appears only once the
/// file is complete; on failure the staged copy is removed.
pub fn write_corrected(
    input: &Path,
    output: &Path,
    pixels: &Buffer2<f32>,
    cards: &[HeaderCard],
) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| Error::Io { path, source }
    };
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| Error::Write { path, source }
    };

    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let staged = tempfile::Builder::new()
        .prefix(".destripe-")
        .suffix(".fits")
        .tempfile_in(dir)
        .map_err(io_err(dir))?;
    std::fs::copy(input, staged.path()).map_err(io_err(staged.path()))?;

    {
        let mut fptr = FitsFile::edit(staged.path()).map_err(write_err(output))?;
        let sci = science_hdu(&mut fptr).map_err(write_err(output))?;
        let expected = (pixels.width(), pixels.height());
        let found = image_shape(&sci);
        if found != Some(expected) {
            return Err(Error::OutputShape {
                path: output.to_path_buf(),
                expected,
                found,
            });
        }
        sci.write_image(&mut fptr, pixels.pixels())
            .map_err(write_err(output))?;

        for (key, value) in cards {
            let written = match value {
                HeaderValue::Int(v) => sci.write_key(&mut fptr, key, *v),
                HeaderValue::Float(v) => sci.write_key(&mut fptr, key, *v),
                HeaderValue::Text(v) => sci.write_key(&mut fptr, key, v.clone()),
            };
            written.map_err(write_err(output))?;
        }
    }

    staged.persist(output).map_err(|e| Error::Publish {
        path: output.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
