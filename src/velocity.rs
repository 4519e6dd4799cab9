//! Whisker angular velocity.
//!
//! The whisker trace is an angle; activity is measured as the squared
//! derivative, percentile-normalised onto roughly [0, 1].
use crate::error::{DetectError, Result};
use crate::preprocess::normalize_percentile;
use crate::signal::Signal;

/// Finite-difference derivative `Δvalue / Δtime` after a stable sort by time.
///
/// Returns `n − 1` values; `result[i]` belongs to the interval starting at the
/// `i`-th earliest sample.
pub fn derivative(values: &[f64], time: &[f64]) -> Result<Vec<f64>> {
    if values.len() != time.len() {
        return Err(DetectError::LengthMismatch { time: time.len(), values: values.len() });
    }
    if values.len() < 2 {
        return Err(DetectError::InsufficientData { start: 0, end: 2, len: values.len() });
    }
    let mut order: Vec<usize> = (0..time.len()).collect();
    order.sort_by(|&a, &b| time[a].total_cmp(&time[b]));

    order
        .windows(2)
        .map(|w| {
            let dt = time[w[1]] - time[w[0]];
            if dt == 0.0 {
                return Err(DetectError::DegenerateSignal(format!(
                    "duplicate time stamp {} in derivative",
                    time[w[0]]
                )));
            }
            Ok((values[w[1]] - values[w[0]]) / dt)
        })
        .collect()
}

/// Normalised whisker velocity from a whisker angle signal.
///
/// `normalize_percentile(derivative(angle)², clip)`, on the time axis of
/// the interval starts (`time[..n − 1]`).
pub fn whisker_velocity(angle: &Signal, clip: f64) -> Result<Signal> {
    angle.validate("whisker")?;
    let d = derivative(&angle.values, &angle.time)?;
    let power: Vec<f64> = d.iter().map(|v| v * v).collect();
    let values = normalize_percentile(&power, clip)?;
    let time = angle.time[..angle.len() - 1].to_vec();
    Ok(Signal { time, values })
}
