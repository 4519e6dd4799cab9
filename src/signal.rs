//! Time series container and the time-alignment helpers shared by every stage.
//!
//! The pupil time axis is the reference index space.  Other modalities are
//! looked up with [`time_index`], which returns the number of samples strictly
//! earlier than the query time.
use crate::error::{DetectError, Result};

/// One modality: sample times (seconds, non-decreasing) and values.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub time: Vec<f64>,
    pub values: Vec<f64>,
}

impl Signal {
    /// Build a signal, rejecting empty input, mismatched lengths and
    /// decreasing time stamps.
    pub fn new(time: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        let s = Self { time, values };
        s.validate("signal")?;
        Ok(s)
    }

    /// Uniformly sampled signal starting at `t = 0`.
    pub fn from_rate(values: Vec<f64>, sampling_rate: f64) -> Result<Self> {
        let time = (0..values.len()).map(|i| i as f64 / sampling_rate).collect();
        Self::new(time, values)
    }

    /// Check the structural invariants, naming the modality in errors.
    pub fn validate(&self, what: &'static str) -> Result<()> {
        if self.values.is_empty() {
            return Err(DetectError::EmptySignal { what });
        }
        if self.time.len() != self.values.len() {
            return Err(DetectError::LengthMismatch {
                time: self.time.len(),
                values: self.values.len(),
            });
        }
        if let Some(i) = self.time.windows(2).position(|w| w[1] < w[0]) {
            return Err(DetectError::NonMonotonicTime { index: i + 1 });
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `round(1 / mean(Δt))` in Hz.
    pub fn sampling_rate(&self) -> Result<usize> {
        sampling_rate(&self.time)
    }
}

/// Mean sample spacing of `time`.
pub fn mean_step(time: &[f64]) -> Result<f64> {
    if time.len() < 2 {
        return Err(DetectError::InsufficientData {
            start: 0,
            end: 2,
            len: time.len(),
        });
    }
    // mean(diff(t)) telescopes to the span over n − 1 intervals.
    Ok((time[time.len() - 1] - time[0]) / (time.len() - 1) as f64)
}

/// Sampling rate `round(1 / mean(Δt))`.
pub fn sampling_rate(time: &[f64]) -> Result<usize> {
    let dt = mean_step(time)?;
    if !dt.is_finite() || dt <= 0.0 {
        return Err(DetectError::DegenerateSignal(format!(
            "mean time step is {dt}, cannot derive a sampling rate"
        )));
    }
    let rate = (1.0 / dt).round();
    if rate < 1.0 {
        return Err(DetectError::DegenerateSignal(format!(
            "sampling rate rounds to {rate} Hz"
        )));
    }
    Ok(rate as usize)
}

/// Number of entries of the sorted `time` strictly less than `t`.
///
/// Identical to counting `time < t`, computed by binary search.
///
/// ```
/// use wakeup::signal::time_index;
/// let t = [0.0, 0.5, 1.0, 1.0, 1.5];
/// assert_eq!(time_index(&t, 1.0), 2);
/// assert_eq!(time_index(&t, -1.0), 0);
/// assert_eq!(time_index(&t, 9.0), 5);
/// ```
#[inline]
pub fn time_index(time: &[f64], t: f64) -> usize {
    time.partition_point(|&x| x < t)
}

/// Trapezoidal integral of `y` over sample positions `x`.
///
/// Fewer than two samples integrate to zero.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yy, xx)| 0.5 * (yy[0] + yy[1]) * (xx[1] - xx[0]))
        .sum()
}

/// Resolve the half-open window `[start, end)` against a signal of length
/// `len`, failing if it reaches outside.
pub fn checked_window(start: i64, end: i64, len: usize) -> Result<std::ops::Range<usize>> {
    if start < 0 || end < start || end > len as i64 {
        return Err(DetectError::InsufficientData { start, end, len });
    }
    Ok(start as usize..end as usize)
}

/// Population mean and standard deviation (ddof = 0).
///
/// An empty slice yields `(NaN, NaN)`.
pub fn mean_std(x: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_structural_problems() {
        assert!(matches!(
            Signal::new(vec![], vec![]),
            Err(DetectError::EmptySignal { .. })
        ));
        assert!(matches!(
            Signal::new(vec![0.0, 1.0], vec![1.0]),
            Err(DetectError::LengthMismatch { time: 2, values: 1 })
        ));
        assert!(matches!(
            Signal::new(vec![0.0, 2.0, 1.0], vec![1.0; 3]),
            Err(DetectError::NonMonotonicTime { index: 2 })
        ));
    }

    #[test]
    fn sampling_rate_rounds() {
        let s = Signal::from_rate(vec![0.0; 401], 40.0).unwrap();
        assert_eq!(s.sampling_rate().unwrap(), 40);
        let jitter: Vec<f64> = (0..100).map(|i| i as f64 * 0.0333).collect();
        assert_eq!(sampling_rate(&jitter).unwrap(), 30);
    }

    #[test]
    fn sampling_rate_needs_two_samples() {
        assert!(sampling_rate(&[1.0]).is_err());
        assert!(sampling_rate(&[1.0, 1.0]).is_err());
    }

    #[test]
    fn time_index_counts_strictly_earlier() {
        let t: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        for q in [-0.05, 0.0, 0.05, 0.3, 0.35, 0.9, 1.5] {
            let count = t.iter().filter(|&&x| x < q).count();
            assert_eq!(time_index(&t, q), count, "q={q}");
        }
    }

    #[test]
    fn trapezoid_of_line() {
        let x: Vec<f64> = (0..=10).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&v| 2.0 * v).collect();
        assert_abs_diff_eq!(trapezoid(&y, &x), 1.0, epsilon = 1e-12);
        assert_eq!(trapezoid(&[3.0], &[0.0]), 0.0);
    }

    #[test]
    fn checked_window_bounds() {
        assert_eq!(checked_window(2, 5, 5).unwrap(), 2..5);
        assert!(checked_window(-1, 5, 10).is_err());
        assert!(checked_window(8, 11, 10).is_err());
    }

    #[test]
    fn mean_std_population() {
        let (m, s) = mean_std(&[1.0, 3.0]);
        assert_abs_diff_eq!(m, 2.0);
        assert_abs_diff_eq!(s, 1.0);
    }
}
