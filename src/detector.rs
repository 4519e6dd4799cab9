//! Sudden-change detector.
//!
//! Slides an adjacent (baseline, event) window pair over the signal and
//! labels each step by comparing the event-window mean against the baseline
//! mean ± `threshold` baseline standard deviations:
//!
//! ```text
//!   i          i + baseline        i + baseline + event
//!   |── baseline ──|───── event ─────|
//!   Δ = mean(event) − mean(baseline)
//!   Δ >  k·σ_baseline  → Increase
//!   Δ < −k·σ_baseline  → Decrease
//! ```
//!
//! A zero baseline standard deviation is not guarded: any non-zero Δ then
//! counts as a change, and Δ = 0 never does.
use serde::Serialize;

use crate::error::{DetectError, Result};
use crate::signal::mean_std;

/// Classification of one detector step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    None,
    Increase,
    Decrease,
}

/// Output of [`detect_sudden_changes`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeDetection {
    /// One label per step, in step order.
    pub labels: Vec<ChangeDirection>,
    /// `(position, direction)` for every step that is not `None`.
    ///
    /// Positions are in padded-signal coordinates: position `i` covers
    /// original samples starting at `i − padding`.
    pub events: Vec<(usize, ChangeDirection)>,
    /// Stride between consecutive labels, in samples.
    pub step: usize,
}

/// Number of steps evaluated for a signal of `padded_len` samples:
/// `ceil((padded_len − baseline − event) / step)`, or zero if the windows
/// do not fit.
pub fn step_count(padded_len: usize, baseline_window: usize, event_window: usize, step: usize) -> usize {
    padded_len
        .saturating_sub(baseline_window + event_window)
        .div_ceil(step)
}

/// Pad `x` by repeating its first and last value `padding` times.
pub fn edge_pad(x: &[f64], padding: usize) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (x.first(), x.last()) else {
        return vec![];
    };
    let mut out = Vec::with_capacity(x.len() + 2 * padding);
    out.extend(std::iter::repeat(first).take(padding));
    out.extend_from_slice(x);
    out.extend(std::iter::repeat(last).take(padding));
    out
}

/// Label every step of `signal` as no change, increase or decrease.
///
/// Steps start at `0, step, 2·step, …` while
/// `i < padded_len − baseline_window − event_window`.
pub fn detect_sudden_changes(
    signal: &[f64],
    padding: usize,
    baseline_window: usize,
    event_window: usize,
    threshold: f64,
    step: usize,
) -> Result<ChangeDetection> {
    if signal.is_empty() {
        return Err(DetectError::EmptySignal { what: "change detector input" });
    }
    if step == 0 {
        return Err(DetectError::InvalidParameter("detector step must be >= 1".into()));
    }
    if baseline_window == 0 || event_window == 0 {
        return Err(DetectError::InvalidParameter(format!(
            "detector windows must be non-empty (baseline={baseline_window}, event={event_window})"
        )));
    }

    let x = edge_pad(signal, padding);
    let n_steps = step_count(x.len(), baseline_window, event_window, step);

    let mut labels = Vec::with_capacity(n_steps);
    let mut events = Vec::new();
    for k in 0..n_steps {
        let i = k * step;
        let (base_mean, base_std) = mean_std(&x[i..i + baseline_window]);
        let split = i + baseline_window;
        let (event_mean, _) = mean_std(&x[split..split + event_window]);
        let delta = event_mean - base_mean;

        let label = if delta > base_std * threshold {
            ChangeDirection::Increase
        } else if delta < -base_std * threshold {
            ChangeDirection::Decrease
        } else {
            ChangeDirection::None
        };
        if label != ChangeDirection::None {
            events.push((i, label));
        }
        labels.push(label);
    }

    Ok(ChangeDetection { labels, events, step })
}
