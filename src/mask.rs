//! Mask builder and merger.
//!
//! Turns detector events into candidate [`Block`]s:
//!
//! 1. [`event_mask`]   every flagged step adds ±1 over the
//!                     `baseline + event` samples it spans; samples whose
//!                     sum exceeds 0.5 are `true`.
//! 2. [`bridge_gaps`]  runs of `false` no longer than the merge gap are
//!                     flipped to `true`, including leading and trailing
//!                     runs.
//! 3. [`find_blocks`]  maximal `true` runs become blocks.
use serde::Serialize;

use crate::detector::{ChangeDetection, ChangeDirection};

/// One merged candidate region of the pupil signal.
///
/// `start` is the first sample of the run and `end` its last sample.  The
/// stages downstream examine `start..end`, i.e. the last sample of the run is
/// not part of the examined segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Index range examined by the filters and the refiner.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Examined segment of `signal`, clipped to its length.
    pub fn segment<'a>(&self, signal: &'a [f64]) -> &'a [f64] {
        let end = self.end.min(signal.len());
        &signal[self.start.min(end)..end]
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }
}

/// Boolean mask of samples covered by more increase than decrease windows.
///
/// Step `k` of `detection` starts at sample `k · step` and spans `window`
/// samples (clipped at `len`).
pub fn event_mask(detection: &ChangeDetection, len: usize, window: usize) -> Vec<bool> {
    // Difference array: +w at the start, −w one past the end.
    let mut diff = vec![0_i64; len + 1];
    for (k, &label) in detection.labels.iter().enumerate() {
        let weight = match label {
            ChangeDirection::Increase => 1,
            ChangeDirection::Decrease => -1,
            ChangeDirection::None => continue,
        };
        let start = k * detection.step;
        if start >= len {
            continue;
        }
        let end = (start + window).min(len);
        diff[start] += weight;
        diff[end] -= weight;
    }

    let mut acc = 0_i64;
    diff[..len]
        .iter()
        .map(|&d| {
            acc += d;
            acc as f64 > 0.5
        })
        .collect()
}

/// Flip every run of `false` of length `<= max_gap` to `true`.
///
/// Runs touching either end of the mask are bridged by the same rule.
pub fn bridge_gaps(mask: &[bool], max_gap: usize) -> Vec<bool> {
    let mut out = mask.to_vec();
    let mut run_start = None;
    for i in 0..=mask.len() {
        let is_false = i < mask.len() && !mask[i];
        match (is_false, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if i - s <= max_gap {
                    out[s..i].iter_mut().for_each(|v| *v = true);
                }
                run_start = None;
            }
            _ => {}
        }
    }
    out
}

/// Maximal runs of `true` as blocks, in order.
///
/// A run still open at the end of the mask gets
/// `start' = min(start, |start − backoff|)` and ends at the last sample.
/// For `start >= backoff` this pulls the start back by `backoff` samples.
pub fn find_blocks(mask: &[bool], backoff: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut open: Option<usize> = None;
    for (i, &m) in mask.iter().enumerate() {
        match (m, open) {
            (true, None) => open = Some(i),
            (false, Some(s)) => {
                blocks.push(Block::new(s, i - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(s) = open {
        let start = s.min(s.abs_diff(backoff));
        blocks.push(Block::new(start, mask.len() - 1));
    }
    blocks
}

/// Full mask stage: event mask, gap bridging and block extraction.
pub fn candidate_blocks(
    detection: &ChangeDetection,
    len: usize,
    window: usize,
    max_gap: usize,
    backoff: usize,
) -> Vec<Block> {
    let mask = event_mask(detection, len, window);
    let merged = bridge_gaps(&mask, max_gap);
    find_blocks(&merged, backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(labels: Vec<ChangeDirection>, step: usize) -> ChangeDetection {
        let events = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l != ChangeDirection::None)
            .map(|(k, &l)| (k * step, l))
            .collect();
        ChangeDetection { labels, events, step }
    }

    #[test]
    fn mask_accumulates_and_thresholds() {
        use ChangeDirection::*;
        let d = detection(vec![Increase, None, Decrease, None, Increase], 1);
        let m = event_mask(&d, 8, 3);
        // sums: [1,1,0,-1,0,1,1,0]
        assert_eq!(m, vec![true, true, false, false, false, true, true, false]);
    }

    #[test]
    fn mask_clips_at_signal_end() {
        use ChangeDirection::*;
        let d = detection(vec![None, None, Increase], 2);
        let m = event_mask(&d, 6, 10);
        assert_eq!(m, vec![false, false, false, false, true, true]);
    }

    #[test]
    fn bridges_short_gaps_only() {
        let m = [true, false, false, true, false, false, false, false, true];
        let b = bridge_gaps(&m, 2);
        assert_eq!(b, vec![true, true, true, true, false, false, false, false, true]);
    }

    #[test]
    fn bridges_leading_and_trailing_runs() {
        let m = [false, true, true, false, false];
        assert_eq!(bridge_gaps(&m, 2), vec![true; 5]);
        assert_eq!(bridge_gaps(&m, 0), m.to_vec());
    }

    #[test]
    fn blocks_have_inclusive_last_sample() {
        let m = [false, true, true, false, true, false];
        assert_eq!(find_blocks(&m, 0), vec![Block::new(1, 2), Block::new(4, 4)]);
    }

    #[test]
    fn open_block_start_is_pulled_back() {
        let mut m = vec![false; 20];
        m[12..].iter_mut().for_each(|v| *v = true);
        // start 12, backoff 5 → min(12, 7) = 7
        assert_eq!(find_blocks(&m, 5), vec![Block::new(7, 19)]);
        // start 12, backoff 20 → min(12, 8) = 8
        assert_eq!(find_blocks(&m, 20), vec![Block::new(8, 19)]);
        // start 12, backoff 30 → min(12, 18) = 12
        assert_eq!(find_blocks(&m, 30), vec![Block::new(12, 19)]);
    }

    #[test]
    fn segment_excludes_last_sample() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let b = Block::new(1, 3);
        assert_eq!(b.segment(&x), &[1.0, 2.0]);
        assert!(b.contains(2));
        assert!(!b.contains(3));
    }

    #[test]
    fn merging_is_idempotent() {
        let mut m = vec![false; 300];
        for r in [10..40, 45..60, 120..130, 200..290] {
            m[r].iter_mut().for_each(|v| *v = true);
        }
        let once = bridge_gaps(&m, 20);
        let twice = bridge_gaps(&once, 20);
        assert_eq!(find_blocks(&once, 0), find_blocks(&twice, 0));
        assert_eq!(find_blocks(&once, 0), vec![Block::new(0, 59), Block::new(120, 129), Block::new(200, 299)]);
    }
}
