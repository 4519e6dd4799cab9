//! Pupil signal preprocessing.
//!
//! `normalize_median_std`     `(x − median) / std` (sample std, ddof = 1)
//! `interpolate_sudden_drops` blink-like drops and their ±1 s surroundings
//!                            are replaced by linear interpolation
//! `moving_average`           "valid" box-car smoothing, length `n − w + 1`
//! `normalize_percentile`     `(x − P1) / (P99 − P1)`, roughly onto [0, 1]
//!
//! [`prepare_pupil`] chains them in the order the detector expects.
use log::debug;

use crate::config::PipelineConfig;
use crate::error::{DetectError, Result};
use crate::signal::{checked_window, time_index, Signal};

/// Percentile `q` (0–100) with linear interpolation between order statistics.
///
/// Matches the default `numpy.percentile` definition.  `x` must not be empty.
pub fn percentile(x: &[f64], q: f64) -> f64 {
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let pos = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Median-centre and scale by the sample standard deviation, in place.
/// Returns `(median, std)`; a constant or single-sample input is left as is.
pub fn normalize_median_std(x: &mut [f64]) -> (f64, f64) {
    let n = x.len();
    if n < 2 {
        return (x.first().copied().unwrap_or(f64::NAN), 0.0);
    }
    let median = percentile(x, 50.0);
    let mean = x.iter().sum::<f64>() / n as f64;
    let var = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std > 0.0 {
        x.iter_mut().for_each(|v| *v = (*v - median) / std);
    }
    (median, std)
}

/// Rescale so the `clip`-th and `(100 − clip)`-th percentiles map to 0 and 1.
///
/// Values beyond those percentiles fall slightly outside [0, 1].
pub fn normalize_percentile(x: &[f64], clip: f64) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Err(DetectError::EmptySignal { what: "normalisation input" });
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let lo = percentile_sorted(&sorted, clip);
    let hi = percentile_sorted(&sorted, 100.0 - clip);
    let span = hi - lo;
    if span.is_nan() || span <= 0.0 {
        return Err(DetectError::DegenerateSignal(format!(
            "percentile span {span} between P{clip} and P{}",
            100.0 - clip
        )));
    }
    Ok(x.iter().map(|&v| (v - lo) / span).collect())
}

/// "Valid" moving average with a box of `window` samples.
///
/// `window == 0` returns the input unchanged.
pub fn moving_average(x: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Ok(x.to_vec());
    }
    if window > x.len() {
        return Err(DetectError::InsufficientData {
            start: 0,
            end: window as i64,
            len: x.len(),
        });
    }
    let inv = 1.0 / window as f64;
    Ok(x.windows(window).map(|w| w.iter().sum::<f64>() * inv).collect())
}

/// Replace blink-like drops with linear interpolation.
///
/// A drop is a sample whose first difference falls below the `quantile`
/// of all first differences.  Every sample within `window_secs` of a drop
/// is re-estimated from the nearest untouched samples on each side; at the
/// edges the nearest untouched value is held.  Returns the cleaned signal
/// and the number of samples replaced.
pub fn interpolate_sudden_drops(
    signal: &Signal,
    quantile: f64,
    window_secs: f64,
) -> Result<(Signal, usize)> {
    signal.validate("pupil")?;
    let n = signal.len();
    if n < 2 {
        return Ok((signal.clone(), 0));
    }
    let v = &signal.values;
    let t = &signal.time;

    let diffs: Vec<f64> = v.windows(2).map(|w| w[1] - w[0]).collect();
    let threshold = percentile(&diffs, quantile * 100.0);

    let mut replace = vec![false; n];
    for (i, &d) in diffs.iter().enumerate() {
        if d < threshold {
            // diffs[i] is the change arriving at sample i + 1.
            let centre = t[i + 1];
            let lo = time_index(t, centre - window_secs);
            let hi = t.partition_point(|&x| x <= centre + window_secs);
            replace[lo..hi].iter_mut().for_each(|r| *r = true);
        }
    }

    let n_replaced = replace.iter().filter(|&&r| r).count();
    if n_replaced == 0 {
        return Ok((signal.clone(), 0));
    }
    if n_replaced == n {
        return Err(DetectError::DegenerateSignal(
            "every pupil sample lies next to a sudden drop".into(),
        ));
    }

    let mut out = v.clone();
    let mut i = 0;
    while i < n {
        if !replace[i] {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < n && replace[i] {
            i += 1;
        }
        let left = run_start.checked_sub(1);
        let right = (i < n).then_some(i);
        for j in run_start..i {
            out[j] = match (left, right) {
                (Some(l), Some(r)) => {
                    let frac = (t[j] - t[l]) / (t[r] - t[l]);
                    v[l] + (v[r] - v[l]) * frac
                }
                (Some(l), None) => v[l],
                (None, Some(r)) => v[r],
                (None, None) => v[j],
            };
        }
    }

    Ok((Signal { time: t.clone(), values: out }, n_replaced))
}

/// Time axis of a "valid" moving average with a box of `sampling_rate`
/// samples: `time[h − 1 ..]`, `h = sampling_rate / 2`, truncated to `len`.
pub fn smoothed_time(time: &[f64], sampling_rate: usize, len: usize) -> Result<Vec<f64>> {
    if sampling_rate < 2 {
        return Err(DetectError::InvalidParameter(format!(
            "smoothing needs a sampling rate of at least 2 Hz, got {sampling_rate}"
        )));
    }
    let start = sampling_rate / 2 - 1;
    let range = checked_window(start as i64, (start + len) as i64, time.len())?;
    Ok(time[range].to_vec())
}

/// Pupil signal ready for event detection.
#[derive(Debug, Clone)]
pub struct PreparedPupil {
    /// Smoothed, percentile-normalised pupil on its own (shortened) time axis.
    /// Event indices refer to this signal.
    pub smoothed: Signal,
    /// Raw pupil, percentile-normalised, on the original time axis.
    pub normalized: Signal,
    /// Sampling rate of the raw pupil recording (Hz).
    pub sampling_rate: usize,
    /// Samples replaced by drop interpolation.
    pub n_interpolated: usize,
}

/// Run the full pupil preprocessing chain.
///
/// 1. Median/std normalisation.
/// 2. Drop interpolation ([`PipelineConfig::drop_quantile`],
///    [`PipelineConfig::drop_window_secs`]).
/// 3. Moving average over one second (`sampling_rate` samples).
/// 4. Percentile normalisation ([`PipelineConfig::percentile_clip`]).
pub fn prepare_pupil(raw: &Signal, cfg: &PipelineConfig) -> Result<PreparedPupil> {
    raw.validate("pupil")?;
    let sampling_rate = raw.sampling_rate()?;

    let mut z = raw.clone();
    let (median, std) = normalize_median_std(&mut z.values);
    debug!("pupil median={median:.4} std={std:.4} @ {sampling_rate} Hz");

    let (clean, n_interpolated) =
        interpolate_sudden_drops(&z, cfg.drop_quantile, cfg.drop_window_secs)?;
    debug!("interpolated {n_interpolated} pupil samples around sudden drops");

    let smoothed = moving_average(&clean.values, sampling_rate)?;
    let smoothed = normalize_percentile(&smoothed, cfg.percentile_clip)?;
    let time = smoothed_time(&clean.time, sampling_rate, smoothed.len())?;

    let normalized = Signal {
        time: raw.time.clone(),
        values: normalize_percentile(&z.values, cfg.percentile_clip)?,
    };

    Ok(PreparedPupil {
        smoothed: Signal { time, values: smoothed },
        normalized,
        sampling_rate,
        n_interpolated,
    })
}
