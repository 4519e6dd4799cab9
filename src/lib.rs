//! # wakeup: waking-up event detection from pupil and whisker recordings
//!
//! `wakeup` finds physiological "waking-up" transitions in multimodal
//! recordings (pupil size, calcium fluorescence, arteriole diameter, whisker
//! angle).  A transition is a sudden pupil dilation that is confirmed by a
//! surge of whisker activity; each confirmed event is cut out of every
//! modality as an aligned window and summarised as mean ± confidence
//! interval.
//!
//! ## Pipeline overview
//!
//! ```text
//! pupil_size.csv                          resampled_whiskerAngle.csv
//!   │                                       │
//!   ├─ preprocess::prepare_pupil()          └─ velocity::whisker_velocity()
//!   │    median/std → drop interpolation         derivative² → percentile
//!   │    → 1 s moving average → percentile           │
//!   │                                                │
//!   ├─ detector     sliding (baseline, event) mean-shift labels
//!   ├─ mask         ±1 accumulation → bridge gaps ≤ 10 s → blocks
//!   ├─ block_filter midline crossing, amplitude range
//!   ├─ refine       per-block onset scan (0.25 s steps)
//!   └─ whisker      ∫ velocity after / before > 1.5  ◄──┘
//!        │
//!        └─→ Detection { events, blocks }   (indices into the smoothed pupil)
//!              │
//!              └─ window   per-modality windows, mean, CI → CSV
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use wakeup::{process_folder, PipelineConfig};
//!
//! let cfg = PipelineConfig::default();
//! let report = process_folder(Path::new("data/mouse1"), Path::new("data/mouse1_results"), &cfg).unwrap();
//! println!("{} waking-up events", report.detection.events.len());
//! ```
//!
//! ## Running individual stages
//!
//! ```
//! use wakeup::detector::detect_sudden_changes;
//! use wakeup::mask::candidate_blocks;
//! use wakeup::block_filter::{filter_amplitude, filter_midline};
//!
//! // 40 Hz, low for 20 s, high afterwards.
//! let x: Vec<f64> = (0..2400).map(|i| if i < 800 { 0.1 } else { 0.9 }).collect();
//!
//! let changes = detect_sudden_changes(&x, 5, 200, 600, 3.0, 1).unwrap();
//! let blocks = candidate_blocks(&changes, x.len(), 800, 400, 200);
//! let blocks = filter_midline(&blocks, &x, 0.5);
//! let blocks = filter_amplitude(&blocks, &x, 0.5);
//! assert_eq!(blocks.len(), 1);
//! ```

pub mod block_filter;
pub mod config;
pub mod detector;
pub mod error;
pub mod io;
pub mod mask;
pub mod preprocess;
pub mod process;
pub mod refine;
pub mod signal;
pub mod velocity;
pub mod whisker;
pub mod window;

use log::{debug, info, warn};
use serde::Serialize;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `wakeup::Foo` without having to know the internal module layout.

// config / error / signal
pub use config::PipelineConfig;
pub use error::{DetectError, Result};
pub use signal::{time_index, trapezoid, Signal};

// preprocessing
pub use preprocess::{prepare_pupil, PreparedPupil};
pub use velocity::whisker_velocity;

// detection stages
pub use block_filter::{filter_amplitude, filter_midline};
pub use detector::{detect_sudden_changes, ChangeDetection, ChangeDirection};
pub use mask::{candidate_blocks, Block};
pub use refine::{refine_block, CandidateEventProperty, OnsetSelection, ScanParams};
pub use whisker::{activity_ratio, cross_validate, WhiskerCheck};

// export / orchestration
pub use io::{find_recording_folders, Recording};
pub use process::{process_folder, RunReport};
pub use window::{extract_windows, EventWindows, WindowSummary};

/// Terminal state of one candidate block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "fate", rename_all = "snake_case")]
pub enum BlockFate {
    /// The block never crosses [`PipelineConfig::midline`].
    DroppedAtMidline,
    /// The block spans no more than [`PipelineConfig::min_amplitude_range`].
    DroppedAtAmplitude,
    /// No scanned offset passed the refiner's retention rules.
    NoOnset,
    /// Refinement or whisker validation could not be evaluated.
    Skipped { onset: Option<usize>, reason: String },
    /// The whisker activity ratio did not exceed
    /// [`PipelineConfig::whisker_ratio`].
    RejectedByWhisker { onset: usize, ratio: f64 },
    /// A waking-up event.
    Validated { onset: usize, ratio: f64 },
}

/// One candidate block and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
    pub block: Block,
    #[serde(flatten)]
    pub fate: BlockFate,
}

/// Result of [`detect_events`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Sampling rate of the pupil signal the detection ran on (Hz).
    pub sampling_rate: usize,
    /// Detector steps labelled as a sudden change.
    pub n_changes: usize,
    /// Every candidate block in order, with its fate.
    pub blocks: Vec<BlockReport>,
    /// Validated event onsets, indices into the pupil signal.
    pub events: Vec<usize>,
}

impl Detection {
    /// Onsets that came out of the refiner, validated or not.
    pub fn refined(&self) -> Vec<usize> {
        self.blocks
            .iter()
            .filter_map(|r| match r.fate {
                BlockFate::Validated { onset, .. } | BlockFate::RejectedByWhisker { onset, .. } => {
                    Some(onset)
                }
                BlockFate::Skipped { onset, .. } => onset,
                _ => None,
            })
            .collect()
    }
}

/// Run the **waking-up event detection** on a preprocessed pupil signal.
///
/// This is the core of the crate.  It chains the detection stages in order
/// and never backtracks:
///
/// # Pipeline steps
///
/// 1. Label every detector step of the pupil as increase / decrease / none
///    ([`detect_sudden_changes`], windows of [`PipelineConfig::baseline_secs`]
///    and [`PipelineConfig::event_secs`]).
/// 2. Accumulate the labels into a mask, bridge gaps of at most
///    [`PipelineConfig::merge_gap_secs`] and extract blocks
///    ([`candidate_blocks`]).
/// 3. Drop blocks that do not cross the midline, then blocks with too small an
///    amplitude range.
/// 4. Refine one onset per surviving block ([`refine_block`]).
/// 5. Keep onsets followed by a whisker activity surge ([`cross_validate`]).
///
/// # Arguments
///
/// * `pupil`            – Smoothed, normalised pupil (roughly `[0, 1]`).
///   Its time axis is the reference for every returned index.
/// * `whisker_velocity` – Normalised whisker velocity on its own time axis
///   (see [`velocity::whisker_velocity`]).
/// * `cfg`              – Pipeline configuration.
///
/// # Errors
///
/// Structural problems abort the run: an empty signal, mismatched time and
/// value lengths, decreasing time stamps or an invalid configuration.
/// A block or event whose windows do not fit, or whose statistics are
/// degenerate, is logged and reported as [`BlockFate::Skipped`] instead.
/// Finding no events is not an error.
///
/// # Examples
///
/// ```
/// use wakeup::{detect_events, PipelineConfig, Signal};
///
/// let pupil = Signal::from_rate(vec![1.0; 4000], 40.0).unwrap();
/// let velocity = Signal::from_rate(vec![0.2; 4000], 40.0).unwrap();
/// let detection = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
/// assert!(detection.events.is_empty());
/// ```
pub fn detect_events(
    pupil: &Signal,
    whisker_velocity: &Signal,
    cfg: &PipelineConfig,
) -> Result<Detection> {
    cfg.validate()?;
    pupil.validate("pupil")?;
    whisker_velocity.validate("whisker velocity")?;

    let sr = pupil.sampling_rate()?;
    let whisker_sr = whisker_velocity.sampling_rate()?;
    let baseline = cfg.baseline_samples(sr);
    let event = cfg.event_samples(sr);

    // 1. Sudden changes.
    let changes = detect_sudden_changes(
        &pupil.values,
        cfg.change_padding,
        baseline,
        event,
        cfg.change_threshold_sd,
        cfg.change_step,
    )?;

    // 2. Mask, merge, blocks.
    let blocks = candidate_blocks(
        &changes,
        pupil.len(),
        baseline + event,
        cfg.merge_gap_samples(sr),
        cfg.boundary_backoff_samples(sr),
    );
    debug!(
        "{} sudden-change steps, {} candidate blocks @ {sr} Hz",
        changes.events.len(),
        blocks.len()
    );

    // 3. Midline and amplitude filters.
    let crossing = filter_midline(&blocks, &pupil.values, cfg.midline);
    let wide = filter_amplitude(&crossing, &pupil.values, cfg.min_amplitude_range);
    debug!("{} blocks cross the midline, {} pass the amplitude range", crossing.len(), wide.len());

    let params = ScanParams::from(cfg);
    let mut reports = Vec::with_capacity(blocks.len());
    let mut events = Vec::new();
    for block in blocks {
        let fate = if !crossing.contains(&block) {
            BlockFate::DroppedAtMidline
        } else if !wide.contains(&block) {
            BlockFate::DroppedAtAmplitude
        } else {
            // 4–5. Refine, then cross-validate.
            let fate = judge_block(&block, pupil, whisker_velocity, whisker_sr, &params, cfg)?;
            if let BlockFate::Validated { onset, .. } = fate {
                events.push(onset);
            }
            fate
        };
        reports.push(BlockReport { block, fate });
    }

    info!("{} waking-up events from {} candidate blocks", events.len(), reports.len());
    Ok(Detection {
        sampling_rate: sr,
        n_changes: changes.events.len(),
        blocks: reports,
        events,
    })
}

/// Refine and cross-validate one block that survived the filters.
///
/// Only structural errors propagate; local ones become [`BlockFate::Skipped`].
fn judge_block(
    block: &Block,
    pupil: &Signal,
    velocity: &Signal,
    whisker_sr: usize,
    params: &ScanParams,
    cfg: &PipelineConfig,
) -> Result<BlockFate> {
    let skip = |onset: Option<usize>, err: DetectError| -> Result<BlockFate> {
        if !err.is_local() {
            return Err(err);
        }
        warn!("block {}..{} skipped: {err}", block.start, block.end);
        Ok(BlockFate::Skipped { onset, reason: err.to_string() })
    };

    let onset = match refine_block(block, &pupil.values, &pupil.time, params) {
        Ok(Some(onset)) => onset,
        Ok(None) => return Ok(BlockFate::NoOnset),
        Err(err) => return skip(None, err),
    };

    let t = pupil.time[onset];
    match cross_validate(t, velocity, whisker_sr, cfg.baseline_secs, cfg.event_secs, cfg.whisker_ratio) {
        Ok(WhiskerCheck { ratio, confirmed: true }) => Ok(BlockFate::Validated { onset, ratio }),
        Ok(WhiskerCheck { ratio, confirmed: false }) => {
            debug!("onset {onset} at t = {t:.2} s rejected, whisker ratio {ratio:.3}");
            Ok(BlockFate::RejectedByWhisker { onset, ratio })
        }
        Err(err) => skip(Some(onset), err),
    }
}
