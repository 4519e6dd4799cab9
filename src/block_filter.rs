//! Block filter: midline crossing and amplitude range.
//!
//! Both thresholds live on the normalised pupil scale (roughly [0, 1]).
//! A block survives only if its segment crosses the midline at least once
//! and spans more than the minimum range.
use crate::mask::Block;

/// `true` if `segment` changes side of `midline` at least once.
///
/// Both "above" (`> midline`) and "below" (`< midline`) indicators are
/// checked for a change, so touching the midline exactly also counts.
pub fn crosses_midline(segment: &[f64], midline: f64) -> bool {
    segment.windows(2).any(|w| {
        (w[0] > midline) != (w[1] > midline) || (w[0] < midline) != (w[1] < midline)
    })
}

/// `max − min` of `segment`; zero for an empty segment.
pub fn amplitude_range(segment: &[f64]) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }
    let (lo, hi) = segment
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    hi - lo
}

/// Keep blocks whose segment of `signal` crosses `midline`.
pub fn filter_midline(blocks: &[Block], signal: &[f64], midline: f64) -> Vec<Block> {
    blocks
        .iter()
        .copied()
        .filter(|b| crosses_midline(b.segment(signal), midline))
        .collect()
}

/// Keep blocks whose segment of `signal` spans more than `min_range`.
pub fn filter_amplitude(blocks: &[Block], signal: &[f64], min_range: f64) -> Vec<Block> {
    blocks
        .iter()
        .copied()
        .filter(|b| amplitude_range(b.segment(signal)) > min_range)
        .collect()
}
