//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the detection pipeline,
//! the preprocessing in front of it and the window export behind it.  All
//! fields have defaults matching the values the analysis was tuned with.
use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};
use crate::refine::OnsetSelection;

/// Configuration for the full waking-up event pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use wakeup::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     baseline_secs: 10.0,   // longer baseline
///     whisker_ratio: 2.0,    // stricter whisker confirmation
///     ..PipelineConfig::default()
/// };
/// ```
///
/// A JSON file naming only some fields is also accepted; the rest keep their
/// defaults (see [`PipelineConfig::from_json`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Baseline window in seconds (`bsline_length`).
    ///
    /// Used by the sudden-change detector, the whisker cross-validator and
    /// the exported event windows.
    ///
    /// Default: `5.0` s.
    pub baseline_secs: f64,

    /// Event window in seconds (`event_length`).
    ///
    /// Default: `15.0` s.
    pub event_secs: f64,

    /// Samples repeated at each end of the signal before change detection.
    ///
    /// Default: `5`.
    pub change_padding: usize,

    /// Mean shift, in baseline standard deviations, that counts as a sudden
    /// change.
    ///
    /// Default: `3.0`.
    pub change_threshold_sd: f64,

    /// Stride of the change detector in samples.
    ///
    /// Default: `1`.
    pub change_step: usize,

    /// Runs of non-event samples at most this long are merged into the
    /// surrounding blocks.
    ///
    /// Default: `10.0` s.
    pub merge_gap_secs: f64,

    /// A block still open at the end of the signal has its start pulled back
    /// by this much (see [`find_blocks`](crate::mask::find_blocks)).
    ///
    /// Default: `5.0` s.
    pub boundary_backoff_secs: f64,

    /// Normalised level a block must cross to be kept.
    ///
    /// Default: `0.5`.
    pub midline: f64,

    /// Minimum `max − min` of the normalised pupil inside a block.
    ///
    /// Default: `0.5`.
    pub min_amplitude_range: f64,

    /// Onset scan stride inside a block.
    ///
    /// Default: `0.25` s.
    pub scan_step_secs: f64,

    /// Baseline preceding each scanned onset.
    ///
    /// Default: `5.0` s.
    pub scan_baseline_secs: f64,

    /// Event window following each scanned onset.
    ///
    /// Default: `15.0` s.
    pub scan_event_secs: f64,

    /// Only offsets whose pupil value is below this are scanned.
    ///
    /// Default: `0.5`.
    pub onset_ceiling: f64,

    /// A candidate needs `event_std > std_ratio · baseline_std`.
    ///
    /// Default: `3.0`.
    pub std_ratio: f64,

    /// A candidate needs `baseline_mean < baseline_cap`.
    ///
    /// Default: `0.5`.
    pub baseline_cap: f64,

    /// A candidate needs `event_mean − baseline_mean > min_delta`.
    ///
    /// Default: `0.2`.
    pub min_delta: f64,

    /// Which retained candidate becomes the onset.
    ///
    /// Default: [`OnsetSelection::MostDownward`].
    pub onset_selection: OnsetSelection,

    /// Integrated whisker activity after / before an event must exceed this.
    ///
    /// Default: `1.5`.
    pub whisker_ratio: f64,

    /// Quantile of the first differences below which a pupil sample counts
    /// as a blink-like drop.
    ///
    /// Default: `0.001`.
    pub drop_quantile: f64,

    /// Samples within this many seconds of a drop are interpolated.
    ///
    /// Default: `1.0` s.
    pub drop_window_secs: f64,

    /// Percent excluded at each end when min/max normalising.
    ///
    /// Default: `1.0` (1st to 99th percentile).
    pub percentile_clip: f64,

    /// Duration spanned by the whisker angle file, which carries no time
    /// column.
    ///
    /// Default: `900.0` s.
    pub whisker_duration_secs: f64,

    /// Pupil windows whose 80th percentile exceeds this (or 20th percentile
    /// is below its negative) are excluded from export.
    ///
    /// Default: `2.0`.
    pub pupil_exclude_threshold: f64,

    /// z value of the exported confidence interval.
    ///
    /// Default: `1.96` (95 %).
    pub ci_z: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            baseline_secs: 5.0,
            event_secs: 15.0,
            change_padding: 5,
            change_threshold_sd: 3.0,
            change_step: 1,
            merge_gap_secs: 10.0,
            boundary_backoff_secs: 5.0,
            midline: 0.5,
            min_amplitude_range: 0.5,
            scan_step_secs: 0.25,
            scan_baseline_secs: 5.0,
            scan_event_secs: 15.0,
            onset_ceiling: 0.5,
            std_ratio: 3.0,
            baseline_cap: 0.5,
            min_delta: 0.2,
            onset_selection: OnsetSelection::MostDownward,
            whisker_ratio: 1.5,
            drop_quantile: 0.001,
            drop_window_secs: 1.0,
            percentile_clip: 1.0,
            whisker_duration_secs: 900.0,
            pupil_exclude_threshold: 2.0,
            ci_z: 1.96,
        }
    }
}

impl PipelineConfig {
    /// Parse a (possibly partial) JSON configuration.
    ///
    /// ```
    /// use wakeup::PipelineConfig;
    /// let cfg = PipelineConfig::from_json(r#"{ "event_secs": 20.0 }"#).unwrap();
    /// assert_eq!(cfg.event_secs, 20.0);
    /// assert_eq!(cfg.baseline_secs, 5.0);
    /// ```
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Reject windows, steps and thresholds the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("baseline_secs", self.baseline_secs),
            ("event_secs", self.event_secs),
            ("scan_step_secs", self.scan_step_secs),
            ("scan_baseline_secs", self.scan_baseline_secs),
            ("scan_event_secs", self.scan_event_secs),
            ("whisker_duration_secs", self.whisker_duration_secs),
        ];
        for (name, v) in positive {
            if v.is_nan() || v <= 0.0 {
                return Err(DetectError::InvalidParameter(format!("{name} must be > 0, got {v}")));
            }
        }
        if self.change_step == 0 {
            return Err(DetectError::InvalidParameter("change_step must be >= 1".into()));
        }
        if !(0.0..50.0).contains(&self.percentile_clip) {
            return Err(DetectError::InvalidParameter(format!(
                "percentile_clip must be in [0, 50), got {}",
                self.percentile_clip
            )));
        }
        if !(0.0..=1.0).contains(&self.drop_quantile) {
            return Err(DetectError::InvalidParameter(format!(
                "drop_quantile must be in [0, 1], got {}",
                self.drop_quantile
            )));
        }
        Ok(())
    }

    /// Baseline window in samples at `sampling_rate` Hz.
    ///
    /// ```
    /// use wakeup::PipelineConfig;
    /// assert_eq!(PipelineConfig::default().baseline_samples(40), 200);
    /// ```
    pub fn baseline_samples(&self, sampling_rate: usize) -> usize {
        secs_to_samples(self.baseline_secs, sampling_rate)
    }

    /// Event window in samples at `sampling_rate` Hz.
    pub fn event_samples(&self, sampling_rate: usize) -> usize {
        secs_to_samples(self.event_secs, sampling_rate)
    }

    /// Largest gap, in samples, bridged by the mask merger.
    pub fn merge_gap_samples(&self, sampling_rate: usize) -> usize {
        secs_to_samples(self.merge_gap_secs, sampling_rate)
    }

    /// Start back-off, in samples, for a block open at the end of the signal.
    pub fn boundary_backoff_samples(&self, sampling_rate: usize) -> usize {
        secs_to_samples(self.boundary_backoff_secs, sampling_rate)
    }
}

/// `round(secs · sampling_rate)`, clamped at zero.
pub fn secs_to_samples(secs: f64, sampling_rate: usize) -> usize {
    (secs * sampling_rate as f64).round().max(0.0) as usize
}
