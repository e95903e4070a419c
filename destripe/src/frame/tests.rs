use std::path::Path;

use fitsio::FitsFile;

use super::fits::{load_frame, write_corrected, HeaderValue};
use super::*;
use crate::error::Error;
use crate::testing::{flat, synthetic_frame, write_fits, FitsFixture};

fn ramp_frame(instrument: Instrument, width: usize, height: usize) -> Frame {
    let pixels: Vec<f32> = (0..width * height).map(|i| 10.0 + i as f32).collect();
    let mut frame = synthetic_frame(instrument, Buffer2::new(width, height, pixels));
    frame.metadata.exposure = "jw01345001001_02201_00001_nrca1".to_string();
    frame
}

// ---------------------------------------------------------------------------
// Frame model
// ---------------------------------------------------------------------------

#[test]
fn test_subarray_detection() {
    let mut metadata = FrameMetadata::new(Instrument::NircamShort, "exp");
    assert!(!metadata.is_subarray());
    metadata.subarray = "SUB640".to_string();
    assert!(metadata.is_subarray());
    metadata.subarray = " full ".to_string();
    assert!(!metadata.is_subarray());
}

#[test]
fn test_reference_border_only_on_full_frames() {
    let frame = synthetic_frame(Instrument::Miri, flat(1032, 1024, 1.0));
    assert!(frame.is_full_frame());
    assert_eq!(
        frame.reference_border(),
        ReferenceBorder {
            columns: 4,
            rows: 0
        }
    );

    let mut sub = synthetic_frame(Instrument::Miri, flat(1032, 1024, 1.0));
    sub.metadata.subarray = "BRIGHTSKY".to_string();
    assert_eq!(sub.reference_border(), ReferenceBorder::NONE);

    let small = synthetic_frame(Instrument::NircamShort, flat(64, 64, 1.0));
    assert_eq!(small.reference_border(), ReferenceBorder::NONE);
}

#[test]
fn test_protected_pixels_marks_blanks() {
    let mut pixels = flat(4, 3, 5.0);
    pixels[(1, 0)] = 0.0;
    pixels[(2, 2)] = f32::NAN;
    pixels[(3, 1)] = f32::INFINITY;
    let frame = synthetic_frame(Instrument::NircamLong, pixels);

    let protected = frame.protected_pixels();
    assert_eq!(protected.iter().filter(|&&p| p).count(), 3);
    assert!(protected[(1, 0)]);
    assert!(protected[(2, 2)]);
    assert!(protected[(3, 1)]);
}

#[test]
#[should_panic(expected = "DQ width must match pixels")]
fn test_frame_shape_mismatch_panics() {
    Frame::new(
        flat(4, 4, 0.0),
        Buffer2::new_default(3, 4),
        FrameMetadata::new(Instrument::Miri, "x"),
    );
}

// ---------------------------------------------------------------------------
// FITS input
// ---------------------------------------------------------------------------

#[test]
fn test_load_sci_and_dq_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame_cal.fits");

    let mut frame = ramp_frame(Instrument::NircamLong, 6, 5);
    frame.dq[(2, 3)] = 1;
    frame.dq[(4, 0)] = 512;
    write_fits(&path, &frame, FitsFixture::default());

    let loaded = load_frame(&path).unwrap();
    assert_eq!(loaded.width(), 6);
    assert_eq!(loaded.height(), 5);
    assert_eq!(loaded.pixels, frame.pixels);
    assert_eq!(loaded.dq, frame.dq);
    assert_eq!(loaded.metadata.instrument, Instrument::NircamLong);
    assert_eq!(loaded.metadata.detector, "NRCALONG");
    assert_eq!(loaded.metadata.exposure, frame.metadata.exposure);
    assert!(!loaded.metadata.is_subarray());
}

#[test]
fn test_load_primary_image_without_dq() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("primary.fits");

    let frame = ramp_frame(Instrument::Miri, 4, 3);
    write_fits(
        &path,
        &frame,
        FitsFixture {
            with_dq: false,
            sci_in_primary: true,
        },
    );

    let loaded = load_frame(&path).unwrap();
    assert_eq!(loaded.pixels, frame.pixels);
    assert!(loaded.dq.iter().all(|&f| f == 0));
    assert_eq!(loaded.metadata.instrument, Instrument::Miri);
}

#[test]
fn test_load_missing_file_is_input_error() {
    let err = load_frame(Path::new("/nonexistent/frame.fits")).unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
    assert!(err.is_input());
}

#[test]
fn test_load_unknown_instrument_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nirspec.fits");
    {
        let mut fptr = FitsFile::create(&path).open().unwrap();
        let primary = fptr.primary_hdu().unwrap();
        primary
            .write_key(&mut fptr, "INSTRUME", "NIRSPEC".to_string())
            .unwrap();
    }

    let err = load_frame(&path).unwrap_err();
    match err {
        Error::Malformed { reason, .. } => assert!(reason.contains("NIRSPEC"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// FITS output
// ---------------------------------------------------------------------------

#[test]
fn test_write_corrected_replaces_pixels_and_adds_cards() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.fits");
    let out_dir = dir.path().join("out");
    let output = out_dir.join("in.fits");

    let mut frame = ramp_frame(Instrument::NircamShort, 5, 4);
    frame.dq[(0, 0)] = 1;
    write_fits(&input, &frame, FitsFixture::default());

    let corrected = flat(5, 4, 42.0);
    let cards = vec![
        ("DSMETHOD", HeaderValue::from("median_filter")),
        ("DSSIGMA", HeaderValue::from(3.0f32)),
        ("DSVERT", HeaderValue::from(true)),
    ];
    write_corrected(&input, &output, &corrected, &cards).unwrap();

    let loaded = load_frame(&output).unwrap();
    assert_eq!(loaded.pixels, corrected);
    assert_eq!(loaded.dq, frame.dq);

    let mut fptr = FitsFile::open(&output).unwrap();
    let sci = fptr.hdu("SCI").unwrap();
    let method: String = sci.read_key(&mut fptr, "DSMETHOD").unwrap();
    let sigma: f64 = sci.read_key(&mut fptr, "DSSIGMA").unwrap();
    let vertical: i64 = sci.read_key(&mut fptr, "DSVERT").unwrap();
    assert_eq!(method, "median_filter");
    assert!((sigma - 3.0).abs() < 1e-9);
    assert_eq!(vertical, 1);

    // Input untouched, no staging files left behind.
    assert_eq!(load_frame(&input).unwrap().pixels, frame.pixels);
    let leftovers: Vec<_> = std::fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("in.fits")]);
}

#[test]
fn test_write_corrected_shape_mismatch_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.fits");
    let output = dir.path().join("out").join("in.fits");

    let frame = ramp_frame(Instrument::Miri, 5, 4);
    write_fits(&input, &frame, FitsFixture::default());

    let err = write_corrected(&input, &output, &flat(4, 4, 0.0), &[]).unwrap_err();
    match &err {
        Error::OutputShape {
            path,
            expected,
            found,
        } => {
            assert_eq!(path, &output);
            assert_eq!(*expected, (4, 4));
            assert_eq!(*found, Some((5, 4)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_input());
    assert!(!output.exists());
    assert_eq!(
        std::fs::read_dir(output.parent().unwrap()).unwrap().count(),
        0
    );
}
