//! Error taxonomy for the detection core.
//!
//! Structural errors (`EmptySignal`, `LengthMismatch`, `NonMonotonicTime`,
//! `InvalidParameter`) abort a whole detection run.  `InsufficientData` and
//! `DegenerateSignal` are raised for a single block or event and are recorded
//! in that block's [`BlockFate`](crate::BlockFate) instead.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("{what} signal is empty")]
    EmptySignal { what: &'static str },

    #[error("time has {time} samples but values has {values}")]
    LengthMismatch { time: usize, values: usize },

    #[error("time decreases at sample {index}")]
    NonMonotonicTime { index: usize },

    /// A window reaches before sample 0 or past the end of the signal.
    #[error("window [{start}, {end}) does not fit in {len} samples")]
    InsufficientData { start: i64, end: i64, len: usize },

    #[error("degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl DetectError {
    /// `true` for errors that only invalidate one block or event.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            DetectError::InsufficientData { .. } | DetectError::DegenerateSignal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
