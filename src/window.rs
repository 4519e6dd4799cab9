//! Event-centred windowing and summary statistics.
//!
//! Cuts `[idx − baseline, idx + event)` out of one modality around every
//! event time, optionally expresses each window in percent change from its
//! own baseline mean, and summarises the stack as mean ± `z · SEM`.
use log::warn;
use ndarray::{Array1, Array2, Axis};

use crate::config::secs_to_samples;
use crate::error::{DetectError, Result};
use crate::preprocess::percentile;
use crate::signal::{checked_window, time_index, Signal};

/// Windows of one modality, one row per event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWindows {
    /// Seconds relative to the event onset, `[W]`.
    pub time: Array1<f64>,
    /// `[E, W]`.
    pub windows: Array2<f64>,
    /// Caller's event ids for each row of `windows`.
    pub events: Vec<usize>,
}

impl EventWindows {
    #[inline]
    pub fn n_events(&self) -> usize {
        self.windows.nrows()
    }

    /// Keep only the rows whose event id is in `keep`.
    pub fn select(&self, keep: &[usize]) -> Self {
        let rows: Vec<usize> = (0..self.events.len())
            .filter(|&r| keep.contains(&self.events[r]))
            .collect();
        Self {
            time: self.time.clone(),
            windows: self.windows.select(Axis(0), &rows),
            events: rows.iter().map(|&r| self.events[r]).collect(),
        }
    }
}

/// Mean and confidence band over the events of one modality.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub time: Array1<f64>,
    pub mean: Array1<f64>,
    pub ci_lower: Array1<f64>,
    pub ci_upper: Array1<f64>,
}

/// Extract one window per `(id, event_time)`.
///
/// The aligned index is [`time_index`] of the event time; the window spans
/// `sampling_rate · baseline_secs` samples before it and
/// `sampling_rate · event_secs` from it.  Windows that do not fit in
/// `signal`, or whose baseline mean is zero when `normalize` is set, are
/// skipped with a warning.
///
/// With `normalize`, every window becomes `100 · (w − b̄) / b̄` where `b̄` is
/// the mean of its baseline part.
pub fn extract_windows(
    signal: &Signal,
    events: &[(usize, f64)],
    sampling_rate: usize,
    baseline_secs: f64,
    event_secs: f64,
    normalize: bool,
) -> Result<EventWindows> {
    signal.validate("windowed")?;
    let bs = secs_to_samples(baseline_secs, sampling_rate);
    let es = secs_to_samples(event_secs, sampling_rate);
    let width = bs + es;
    if width == 0 {
        return Err(DetectError::InvalidParameter("event window has zero samples".into()));
    }

    let mut rows = Vec::with_capacity(events.len() * width);
    let mut kept = Vec::with_capacity(events.len());
    for &(id, t) in events {
        let idx = time_index(&signal.time, t) as i64;
        let range = match checked_window(idx - bs as i64, idx + es as i64, signal.len()) {
            Ok(r) => r,
            Err(e) => {
                warn!("event {id} at t = {t:.2} s has no full window: {e}");
                continue;
            }
        };
        let w = &signal.values[range];
        if normalize {
            let b = w[..bs].iter().sum::<f64>() / bs as f64;
            if b == 0.0 || !b.is_finite() {
                warn!("event {id} at t = {t:.2} s has baseline mean {b}, skipped");
                continue;
            }
            rows.extend(w.iter().map(|v| 100.0 * (v - b) / b));
        } else {
            rows.extend_from_slice(w);
        }
        kept.push(id);
    }

    // Relative time axis taken from the head of the modality's own clock.
    let head = checked_window(0, width as i64, signal.len())?;
    let time = Array1::from_iter(signal.time[head].iter().map(|t| t - baseline_secs));
    let windows = Array2::from_shape_vec((kept.len(), width), rows)
        .map_err(|e| DetectError::InvalidParameter(e.to_string()))?;
    Ok(EventWindows { time, windows, events: kept })
}

/// Event ids whose window stays within `±threshold` at the 80th/20th
/// percentiles.
pub fn stable_events(windows: &EventWindows, threshold: f64) -> Vec<usize> {
    windows
        .windows
        .outer_iter()
        .zip(&windows.events)
        .filter(|(row, _)| {
            let row = row.to_vec();
            percentile(&row, 80.0) <= threshold && percentile(&row, 20.0) >= -threshold
        })
        .map(|(_, &id)| id)
        .collect()
}

/// Column mean and `z · SEM` band (`ddof = 1`).
///
/// Returns `None` without windows.  A single window has an undefined band
/// (`NaN`).
pub fn summarize(windows: &EventWindows, z: f64) -> Option<WindowSummary> {
    let n = windows.n_events();
    let mean = windows.windows.mean_axis(Axis(0))?;
    let half = if n > 1 {
        windows.windows.std_axis(Axis(0), 1.0) / (n as f64).sqrt() * z
    } else {
        Array1::from_elem(mean.len(), f64::NAN)
    };
    Some(WindowSummary {
        time: windows.time.clone(),
        ci_lower: &mean - &half,
        ci_upper: &mean + &half,
        mean,
    })
}
