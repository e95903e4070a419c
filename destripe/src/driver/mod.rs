//! Batch driver.
//!
//! Applies the full correction to every frame of a work list. Frames are
//! independent and run in parallel; within a frame every stage is sequential.
//! A frame whose output already exists is skipped unless the configuration
//! asks for overwriting, so re-running a batch only computes what is missing.


use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{Config, ConfigError, DestripeParams, DestripingMethod};
use crate::error::Result;
use crate::frame::fits::{load_frame, write_corrected, HeaderCard, HeaderValue};
use crate::frame::Frame;
use crate::instrument::Instrument;
use crate::mask::{build_source_mask, flagged_pixels, MaskConfig};
use crate::quadrant::{level_amplifiers, segment};
use crate::stripes::remove_stripes;
use crate::vertical::remove_vertical_stripes;

// ============================================================================
// Work items and results
// ============================================================================

/// One frame to process: where it comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl FrameJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Output under `out_dir` with the input's file name.
    pub fn in_dir(input: impl Into<PathBuf>, out_dir: &Path) -> Self {
        let input = input.into();
        let output = match input.file_name() {
            Some(name) => out_dir.join(name),
            None => out_dir.to_path_buf(),
        };
        Self { input, output }
    }
}

/// What was done to a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionSummary {
    pub exposure: String,
    pub instrument: Instrument,
    pub method: DestripingMethod,
    /// Number of independently corrected regions.
    pub quadrants: usize,
    /// Offset added to each region by amplifier levelling (empty if not run).
    pub amplifier_offsets: Vec<f32>,
    /// Median filter scales applied in every region.
    pub applied_scales: Vec<usize>,
    /// Median filter scales skipped in at least one region.
    pub skipped_scales: Vec<usize>,
    pub vertical: bool,
    /// Fraction of pixels excluded from background statistics.
    pub masked_fraction: f32,
    pub low_confidence: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameStatus {
    /// Output already existed and overwriting is off.
    Skipped,
    Processed(CorrectionSummary),
}

/// Per-frame line of a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(flatten)]
    pub outcome: FrameOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameOutcome {
    Skipped,
    Processed(CorrectionSummary),
    Failed {
        error: String,
        /// The input was missing or unreadable, as opposed to an output failure.
        input_error: bool,
    },
}

/// Outcome of a whole batch, in work-list order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub frames: Vec<FrameRecord>,
}

impl BatchReport {
    fn from_records(frames: Vec<FrameRecord>) -> Self {
        let mut report = BatchReport {
            frames,
            ..Default::default()
        };
        for record in &report.frames {
            match record.outcome {
                FrameOutcome::Skipped => report.skipped += 1,
                FrameOutcome::Processed(_) => report.processed += 1,
                FrameOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report
    }

    #[inline]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Destriper
// ============================================================================

/// Applies a fixed configuration to frames.
#[derive(Debug)]
pub struct Destriper<'a> {
    config: &'a Config,
    computed: AtomicUsize,
}

impl<'a> Destriper<'a> {
    /// Fails if `config` does not validate.
    pub fn new(config: &'a Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            computed: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        self.config
    }

    /// Number of frames corrected so far (skipped frames not counted).
    #[inline]
    pub fn computed_count(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Correct one frame file, or skip it if its output already exists.
    pub fn process_frame(&self, job: &FrameJob) -> Result<FrameStatus> {
        if !self.config.overwrite && job.output.exists() {
            tracing::info!(
                output = %job.output.display(),
                "Output exists, skipping"
            );
            return Ok(FrameStatus::Skipped);
        }

        let mut frame = load_frame(&job.input)?;
        let summary = self.destripe_frame(&mut frame);
        let params = self.config.params(frame.metadata.instrument);
        write_corrected(
            &job.input,
            &job.output,
            &frame.pixels,
            &provenance_cards(params, &summary),
        )?;

        tracing::info!(
            exposure = %summary.exposure,
            instrument = %summary.instrument,
            quadrants = summary.quadrants,
            masked_fraction = summary.masked_fraction,
            output = %job.output.display(),
            "Destriped frame"
        );
        Ok(FrameStatus::Processed(summary))
    }

    /// Correct a frame in memory.
    ///
    /// Order: amplifier levelling, source mask, then per region row stripes
    /// followed by column stripes. Blank and reference pixels keep their
    /// input values.
    pub fn destripe_frame(&self, frame: &mut Frame) -> CorrectionSummary {
        let params = self.config.params(frame.metadata.instrument);
        let (width, height) = (frame.width(), frame.height());
        let border = frame.reference_border();

        self.computed.fetch_add(1, Ordering::Relaxed);

        let original = frame.pixels.clone();
        let protected = frame.protected_pixels();

        let by_quadrant = params.quadrants && !frame.metadata.is_subarray();
        let quadrants = segment(width, height, frame.layout(), by_quadrant);

        let amplifier_offsets = if params.level_amplifiers && quadrants.len() > 1 {
            let excluded = flagged_pixels(&frame.pixels, &frame.dq, border);
            level_amplifiers(
                &mut frame.pixels,
                &excluded,
                &quadrants,
                params.sigma,
                params.max_iters,
            )
        } else {
            Vec::new()
        };

        let mask = build_source_mask(
            &frame.pixels,
            &frame.dq,
            &MaskConfig::from_params(params, border),
        );

        let mut applied_in_all: Option<Vec<usize>> = None;
        let mut skipped_scales: Vec<usize> = Vec::new();

        for quadrant in &quadrants {
            let pixels = quadrant.extract(&frame.pixels);
            let quadrant_mask = quadrant.extract_mask(mask.bits());

            let stripes = remove_stripes(&pixels, &quadrant_mask, params);
            let residual = if params.do_vertical_subtraction {
                remove_vertical_stripes(
                    &stripes.residual,
                    &quadrant_mask,
                    params.weight_method,
                    params.sigma,
                    params.max_iters,
                )
                .residual
            } else {
                stripes.residual
            };
            quadrant.insert(&mut frame.pixels, &residual);

            for &scale in &stripes.skipped_scales {
                if !skipped_scales.contains(&scale) {
                    skipped_scales.push(scale);
                }
            }
            applied_in_all = Some(match applied_in_all {
                None => stripes.applied_scales,
                Some(prev) => prev
                    .into_iter()
                    .filter(|s| stripes.applied_scales.contains(s))
                    .collect(),
            });

            tracing::debug!(
                quadrant = quadrant.index,
                applied = ?applied_in_all,
                "Corrected region"
            );
        }

        let applied_scales = applied_in_all.unwrap_or_default();
        for &scale in &params.median_filter_scales {
            if params.destriping_method == DestripingMethod::MedianFilter
                && !applied_scales.contains(&scale)
                && !skipped_scales.contains(&scale)
            {
                skipped_scales.push(scale);
            }
        }
        skipped_scales.sort_unstable();

        for ((value, &input), &keep) in frame
            .pixels
            .iter_mut()
            .zip(original.iter())
            .zip(protected.iter())
        {
            if keep {
                *value = input;
            }
        }

        let total = (width * height).max(1);
        CorrectionSummary {
            exposure: frame.metadata.exposure.clone(),
            instrument: frame.metadata.instrument,
            method: params.destriping_method,
            quadrants: quadrants.len(),
            amplifier_offsets,
            applied_scales,
            skipped_scales,
            vertical: params.do_vertical_subtraction,
            masked_fraction: mask.masked_count() as f32 / total as f32,
            low_confidence: mask.low_confidence(),
        }
    }

    /// Process every job, in parallel. Failures are recorded per frame and
    /// never stop the batch.
    pub fn run_batch(&self, jobs: &[FrameJob]) -> BatchReport {
        let records: Vec<FrameRecord> = jobs
            .par_iter()
            .map(|job| {
                let outcome = match self.process_frame(job) {
                    Ok(FrameStatus::Skipped) => FrameOutcome::Skipped,
                    Ok(FrameStatus::Processed(summary)) => FrameOutcome::Processed(summary),
                    Err(e) => {
                        tracing::error!(
                            input = %job.input.display(),
                            error = %e,
                            "Failed to destripe frame"
                        );
                        FrameOutcome::Failed {
                            error: e.to_string(),
                            input_error: e.is_input(),
                        }
                    }
                };
                FrameRecord {
                    input: job.input.clone(),
                    output: job.output.clone(),
                    outcome,
                }
            })
            .collect();

        let report = BatchReport::from_records(records);
        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "Batch finished"
        );
        report
    }
}

// ============================================================================
// Provenance
// ============================================================================

fn join_scales(scales: &[usize]) -> String {
    if scales.is_empty() {
        return "none".to_string();
    }
    scales
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Header cards recording how a frame was corrected.
pub fn provenance_cards(params: &DestripeParams, summary: &CorrectionSummary) -> Vec<HeaderCard> {
    vec![
        ("DSMETHOD", HeaderValue::from(summary.method.to_string())),
        ("DSSCALES", HeaderValue::from(join_scales(&summary.applied_scales))),
        ("DSSKIPSC", HeaderValue::from(join_scales(&summary.skipped_scales))),
        ("DSSIGMA", HeaderValue::from(params.sigma)),
        ("DSDILATE", HeaderValue::from(params.dilate_size)),
        ("DSNPIX", HeaderValue::from(params.npixels)),
        ("DSQUADS", HeaderValue::from(summary.quadrants)),
        ("DSVERT", HeaderValue::from(summary.vertical)),
        ("DSDIFFUS", HeaderValue::from(params.filter_diffuse)),
        ("DSWEIGHT", HeaderValue::from(params.weight_method.to_string())),
        ("DSLOWCNF", HeaderValue::from(summary.low_confidence)),
        ("DSVERSN", HeaderValue::from(env!("CARGO_PKG_VERSION"))),
    ]
}
