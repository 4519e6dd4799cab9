//! Event refiner: pick the onset sample inside one candidate block.
//!
//! Every `scan_step` seconds inside the block, at offsets whose pupil value
//! is below the onset ceiling, the refiner measures
//!
//! ```text
//!        abs − baseline        abs            abs + event/3        abs + event
//!   ... |──── baseline ────|──── downward ────|──────────────────────|
//!                          |────────────────── event ────────────────|
//! ```
//!
//! and keeps offsets where the event window is much noisier than the
//! baseline, the baseline is low, and the event mean rises clearly above it.
//! The winner is chosen on the summed negative first differences of the
//! downward window (see [`OnsetSelection`]).
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{DetectError, Result};
use crate::mask::Block;
use crate::signal::{checked_window, mean_std, mean_step};

/// How the winning candidate is chosen from the retained ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetSelection {
    /// Most negative `downward_magnitude`.  Ties go to the earliest offset.
    #[default]
    MostDownward,
    /// Highest `downward_magnitude` value, i.e. the candidate whose downward
    /// window falls the least.  Ties go to the earliest offset.
    ///
    /// This is what the plotter.py analysis computed (`max` over the
    /// non-positive sums), kept for reproducing its results.
    LeastDownward,
}

/// Onset scan parameters, in seconds and normalised units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    pub step_secs: f64,
    pub baseline_secs: f64,
    pub event_secs: f64,
    pub onset_ceiling: f64,
    pub std_ratio: f64,
    pub baseline_cap: f64,
    pub min_delta: f64,
    pub selection: OnsetSelection,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ScanParams {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            step_secs: cfg.scan_step_secs,
            baseline_secs: cfg.scan_baseline_secs,
            event_secs: cfg.scan_event_secs,
            onset_ceiling: cfg.onset_ceiling,
            std_ratio: cfg.std_ratio,
            baseline_cap: cfg.baseline_cap,
            min_delta: cfg.min_delta,
            selection: cfg.onset_selection,
        }
    }
}

/// Scan windows converted to samples for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindows {
    pub step: usize,
    pub baseline: usize,
    pub event: usize,
}

impl ScanWindows {
    /// Convert `params` using the mean time step inside `block`
    /// (`floor(secs / Δt)`).
    pub fn for_block(block: &Block, time: &[f64], params: &ScanParams) -> Result<Self> {
        let end = block.end.min(time.len());
        let dt = mean_step(&time[block.start.min(end)..end])?;
        if dt.is_nan() || dt <= 0.0 {
            return Err(DetectError::DegenerateSignal(format!(
                "block {}..{} has mean time step {dt}",
                block.start, block.end
            )));
        }
        let w = Self {
            step: (params.step_secs / dt) as usize,
            baseline: (params.baseline_secs / dt) as usize,
            event: (params.event_secs / dt) as usize,
        };
        if w.step == 0 || w.baseline == 0 || w.event == 0 {
            return Err(DetectError::DegenerateSignal(format!(
                "scan windows collapse to zero samples at Δt = {dt} ({w:?})"
            )));
        }
        Ok(w)
    }
}

/// Statistics of one scanned onset offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateEventProperty {
    /// Offset from the block start, in samples.
    pub offset: usize,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub event_mean: f64,
    pub event_std: f64,
    /// Negative first differences in the first third of the event window.
    pub downward_moves: usize,
    /// Sum of those negative differences (`<= 0`).
    pub downward_magnitude: f64,
}

impl CandidateEventProperty {
    /// The three retention rules.
    pub fn passes(&self, params: &ScanParams) -> bool {
        self.event_std > params.std_ratio * self.baseline_std
            && self.baseline_mean < params.baseline_cap
            && self.event_mean - self.baseline_mean > params.min_delta
    }
}

/// Measure every scanned offset of `block`.
///
/// Offsets whose baseline would start before sample 0 or whose event window
/// would run past the end of `signal` are skipped.
pub fn candidate_properties(
    block: &Block,
    signal: &[f64],
    time: &[f64],
    params: &ScanParams,
) -> Result<Vec<CandidateEventProperty>> {
    if signal.len() != time.len() {
        return Err(DetectError::LengthMismatch { time: time.len(), values: signal.len() });
    }
    let w = ScanWindows::for_block(block, time, params)?;
    let segment = block.segment(signal);
    let n = signal.len() as i64;

    let mut out = Vec::new();
    for offset in (0..segment.len()).step_by(w.step) {
        let value = segment[offset];
        if value.is_nan() || value >= params.onset_ceiling {
            continue;
        }
        let abs = (block.start + offset) as i64;
        let baseline = match checked_window(abs - w.baseline as i64, abs, signal.len()) {
            Ok(r) => r,
            Err(e) => {
                debug!("offset {offset} of block {}..{}: {e}", block.start, block.end);
                continue;
            }
        };
        if abs + w.event as i64 > n {
            continue;
        }
        let event = abs as usize..abs as usize + w.event;
        let downward = abs as usize..abs as usize + w.event / 3;

        let (baseline_mean, baseline_std) = mean_std(&signal[baseline]);
        let (event_mean, event_std) = mean_std(&signal[event]);
        let (downward_moves, downward_magnitude) = signal[downward]
            .windows(2)
            .map(|p| p[1] - p[0])
            .filter(|&d| d < 0.0)
            .fold((0, 0.0), |(c, s), d| (c + 1, s + d));

        out.push(CandidateEventProperty {
            offset,
            baseline_mean,
            baseline_std,
            event_mean,
            event_std,
            downward_moves,
            downward_magnitude,
        });
    }
    Ok(out)
}

/// Pick the winner among the candidates that pass the retention rules.
pub fn select_onset<'a>(
    candidates: &'a [CandidateEventProperty],
    params: &ScanParams,
) -> Option<&'a CandidateEventProperty> {
    let better = |a: f64, b: f64| match params.selection {
        OnsetSelection::LeastDownward => a > b,
        OnsetSelection::MostDownward => a < b,
    };
    candidates
        .iter()
        .filter(|c| c.passes(params))
        .fold(None, |best: Option<&CandidateEventProperty>, c| match best {
            Some(b) if !better(c.downward_magnitude, b.downward_magnitude) => Some(b),
            _ => Some(c),
        })
}

/// Absolute onset index for `block`, or `None` if no candidate passes.
pub fn refine_block(
    block: &Block,
    signal: &[f64],
    time: &[f64],
    params: &ScanParams,
) -> Result<Option<usize>> {
    let candidates = candidate_properties(block, signal, time, params)?;
    let winner = select_onset(&candidates, params);
    debug!(
        "block {}..{}: {} scanned, {} retained, onset {:?}",
        block.start,
        block.end,
        candidates.len(),
        candidates.iter().filter(|c| c.passes(params)).count(),
        winner.map(|c| block.start + c.offset),
    );
    Ok(winner.map(|c| block.start + c.offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(offset: usize, downward_magnitude: f64) -> CandidateEventProperty {
        CandidateEventProperty {
            offset,
            baseline_mean: 0.1,
            baseline_std: 0.01,
            event_mean: 0.8,
            event_std: 0.3,
            downward_moves: 1,
            downward_magnitude,
        }
    }

    #[test]
    fn retention_rules() {
        let p = ScanParams::default();
        assert!(candidate(0, 0.0).passes(&p));
        let noisy_baseline = CandidateEventProperty { baseline_std: 0.2, ..candidate(0, 0.0) };
        assert!(!noisy_baseline.passes(&p));
        let high_baseline = CandidateEventProperty { baseline_mean: 0.55, ..candidate(0, 0.0) };
        assert!(!high_baseline.passes(&p));
        let small_rise = CandidateEventProperty { event_mean: 0.25, ..candidate(0, 0.0) };
        assert!(!small_rise.passes(&p));
    }

    #[test]
    fn selection_modes_and_ties() {
        let cands = [candidate(0, -0.5), candidate(10, -0.1), candidate(20, -0.1), candidate(30, -0.9)];
        let most = ScanParams::default();
        assert_eq!(most.selection, OnsetSelection::MostDownward);
        assert_eq!(select_onset(&cands, &most).map(|c| c.offset), Some(30));
        let least = ScanParams { selection: OnsetSelection::LeastDownward, ..most };
        assert_eq!(select_onset(&cands, &least).map(|c| c.offset), Some(10));
        assert!(select_onset(&[], &least).is_none());
        let tied = [candidate(0, -0.4), candidate(10, -0.4)];
        assert_eq!(select_onset(&tied, &most).map(|c| c.offset), Some(0));
    }

    #[test]
    fn deeper_dip_wins_by_default() {
        // 10 Hz, low at 0.1 with a shallow dip at 150 and a deep one at 200,
        // rising to 0.9 at 250.  Scan stride 2, downward window ~50 samples.
        let signal: Vec<f64> = (0..400)
            .map(|i| match i {
                150..=154 => 0.05,
                200..=204 => 0.0,
                250.. => 0.9,
                _ => 0.1,
            })
            .collect();
        let time: Vec<f64> = (0..400).map(|i| i as f64 / 10.0).collect();
        let block = Block::new(0, 399);

        let most = ScanParams::default();
        let cands = candidate_properties(&block, &signal, &time, &most).unwrap();
        let shallow = cands.iter().find(|c| c.offset == 146).unwrap();
        let deep = cands.iter().find(|c| c.offset == 152).unwrap();
        assert!(shallow.passes(&most) && deep.passes(&most));
        assert!(deep.downward_magnitude < shallow.downward_magnitude);

        // First offset whose downward window holds the 0.1 -> 0.0 drop.
        assert_eq!(refine_block(&block, &signal, &time, &most).unwrap(), Some(152));
        // The first offset past the shallow drop whose window is flat.
        let least = ScanParams { selection: OnsetSelection::LeastDownward, ..most };
        assert_eq!(refine_block(&block, &signal, &time, &least).unwrap(), Some(150));
    }

    #[test]
    fn scan_windows_at_40hz() {
        let time: Vec<f64> = (0..1000).map(|i| i as f64 / 40.0).collect();
        let w = ScanWindows::for_block(&Block::new(100, 900), &time, &ScanParams::default()).unwrap();
        assert!(w.step == 10 || w.step == 9);
        assert!(w.baseline == 200 || w.baseline == 199);
        assert!(w.event == 600 || w.event == 599);
    }

    #[test]
    fn tiny_block_is_insufficient() {
        let time = [0.0, 0.1, 0.2];
        let err = ScanWindows::for_block(&Block::new(1, 2), &time, &ScanParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::InsufficientData { .. }));
    }

    #[test]
    fn offsets_respect_signal_bounds() {
        // 10 Hz, low everywhere: every offset is scanned but windows must fit.
        let signal = vec![0.1; 400];
        let time: Vec<f64> = (0..400).map(|i| i as f64 / 10.0).collect();
        let cands = candidate_properties(&Block::new(0, 399), &signal, &time, &ScanParams::default()).unwrap();
        assert!(!cands.is_empty());
        for c in &cands {
            assert!(c.offset >= 49, "baseline reaches before 0 at {}", c.offset);
            assert!(c.offset + 149 <= 400, "event window runs past the end at {}", c.offset);
        }
    }
}
