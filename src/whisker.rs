//! Whisker cross-validation of refined pupil events.
//!
//! A pupil event is confirmed when the whisker velocity integrated over the
//! event window following it exceeds the integral over the baseline window
//! preceding it by the configured ratio:
//!
//! ```text
//!   ratio = ∫ v dt over [t_e, t_e + event)  /  ∫ v dt over [t_e − baseline, t_e)
//! ```
//!
//! Integrals are trapezoidal and are not divided by window length, so with
//! the default 5 s / 15 s windows a flat velocity trace gives a ratio of
//! about 3.  A zero baseline integral is reported as
//! [`DetectError::DegenerateSignal`] rather than producing `inf`/`NaN`.
use crate::config::secs_to_samples;
use crate::error::{DetectError, Result};
use crate::signal::{checked_window, time_index, trapezoid, Signal};

/// Whisker activity ratio around `event_time`.
///
/// The aligned whisker index is the number of velocity samples strictly
/// earlier than `event_time`; windows are `sampling_rate · secs` samples.
pub fn activity_ratio(
    event_time: f64,
    velocity: &Signal,
    sampling_rate: usize,
    baseline_secs: f64,
    event_secs: f64,
) -> Result<f64> {
    let n = velocity.len();
    let idx = time_index(&velocity.time, event_time) as i64;
    let bs = secs_to_samples(baseline_secs, sampling_rate) as i64;
    let es = secs_to_samples(event_secs, sampling_rate) as i64;

    let before = checked_window(idx - bs, idx, n)?;
    let after = checked_window(idx, idx + es, n)?;

    let baseline = trapezoid(&velocity.values[before.clone()], &velocity.time[before]);
    let event = trapezoid(&velocity.values[after.clone()], &velocity.time[after]);

    if baseline == 0.0 {
        return Err(DetectError::DegenerateSignal(format!(
            "zero whisker baseline integral before t = {event_time:.3} s"
        )));
    }
    let ratio = event / baseline;
    if !ratio.is_finite() {
        return Err(DetectError::DegenerateSignal(format!(
            "whisker activity ratio {ratio} at t = {event_time:.3} s"
        )));
    }
    Ok(ratio)
}

/// Verdict of the whisker check on one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiskerCheck {
    pub ratio: f64,
    /// `ratio > min_ratio`.
    pub confirmed: bool,
}

/// Cross-validate the pupil event at `event_time` against whisker activity.
///
/// Window or degenerate-signal errors from [`activity_ratio`] are returned
/// as is; the caller decides whether to skip the event.
pub fn cross_validate(
    event_time: f64,
    velocity: &Signal,
    sampling_rate: usize,
    baseline_secs: f64,
    event_secs: f64,
    min_ratio: f64,
) -> Result<WhiskerCheck> {
    let ratio = activity_ratio(event_time, velocity, sampling_rate, baseline_secs, event_secs)?;
    Ok(WhiskerCheck { ratio, confirmed: ratio > min_ratio })
}
