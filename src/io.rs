//! CSV I/O for recording folders.
//!
//! Reader: the four per-recording CSV files.
//!
//! | file                          | layout                                 |
//! |-------------------------------|----------------------------------------|
//! | `pupil_size.csv`              | header + (time, value)                 |
//! | `calcium.csv`                 | header + (time, value)                 |
//! | `arteriole_diameter.csv`      | header + (time, value)                 |
//! | `resampled_whiskerAngle.csv`  | no header, one angle column            |
//!
//! Writer: `<modality>_mean.csv` and `<modality>_windows.csv` per modality,
//! `detection.json` per run.
use anyhow::{bail, Context, Result};
use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::signal::Signal;
use crate::window::{EventWindows, WindowSummary};

pub const PUPIL_FILE: &str = "pupil_size.csv";
pub const CALCIUM_FILE: &str = "calcium.csv";
pub const ARTERIOLE_FILE: &str = "arteriole_diameter.csv";
pub const WHISKER_FILE: &str = "resampled_whiskerAngle.csv";

// ── Readers ───────────────────────────────────────────────────────────────────

fn parse_field(field: Option<&str>) -> Option<f64> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

/// Read a headed two-column (time, value) CSV.
///
/// Column names are ignored.  Rows with an empty or non-numeric field are
/// dropped.
pub fn read_two_column_csv(path: &Path) -> Result<Signal> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut time = Vec::new();
    let mut values = Vec::new();
    let mut dropped = 0usize;
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("{}: bad record {}", path.display(), i + 1))?;
        if record.len() < 2 {
            bail!("{}: row {} has {} column(s), expected 2", path.display(), i + 1, record.len());
        }
        match (parse_field(record.get(0)), parse_field(record.get(1))) {
            (Some(t), Some(v)) => {
                time.push(t);
                values.push(v);
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("{}: dropped {dropped} incomplete rows", path.display());
    }
    let signal = Signal::new(time, values).with_context(|| format!("invalid signal in {}", path.display()))?;
    Ok(signal)
}

/// Read the header-less whisker angle CSV.
///
/// The file carries no time column; the `n` samples are spread evenly over
/// `[0, duration_secs]`.
pub fn read_whisker_csv(path: &Path, duration_secs: f64) -> Result<Signal> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut values = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("{}: bad record {}", path.display(), i + 1))?;
        if let Some(v) = parse_field(record.get(0)) {
            values.push(v);
        }
    }
    let n = values.len();
    if n < 2 {
        bail!("{}: need at least 2 whisker samples, found {n}", path.display());
    }
    let step = duration_secs / (n - 1) as f64;
    let time = (0..n).map(|i| i as f64 * step).collect();
    let signal = Signal::new(time, values).with_context(|| format!("invalid signal in {}", path.display()))?;
    Ok(signal)
}

/// The four modalities of one recording folder.
#[derive(Debug, Clone)]
pub struct Recording {
    pub pupil: Signal,
    pub calcium: Signal,
    pub arteriole: Signal,
    /// Whisker angle (not yet differentiated).
    pub whisker_angle: Signal,
}

impl Recording {
    pub fn load(folder: &Path, cfg: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            pupil: read_two_column_csv(&folder.join(PUPIL_FILE))?,
            calcium: read_two_column_csv(&folder.join(CALCIUM_FILE))?,
            arteriole: read_two_column_csv(&folder.join(ARTERIOLE_FILE))?,
            whisker_angle: read_whisker_csv(&folder.join(WHISKER_FILE), cfg.whisker_duration_secs)?,
        })
    }
}

/// Every directory under `root` (inclusive) that holds at least one CSV file,
/// sorted.
pub fn find_recording_folders(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let root_str = root
        .to_str()
        .with_context(|| format!("non UTF-8 path {}", root.display()))?;
    let pattern = format!("{}/**/*.csv", glob::Pattern::escape(root_str));

    let mut folders = BTreeSet::new();
    for entry in glob::glob(&pattern).context("bad glob pattern")? {
        let path = entry?;
        if let Some(parent) = path.parent() {
            folders.insert(parent.to_path_buf());
        }
    }
    Ok(folders.into_iter().collect())
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// Write mean and confidence band: `Time (s)`, `<label>`, `CI lower`,
/// `CI upper`.
pub fn write_mean_csv(summary: &WindowSummary, label: &str, path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    w.write_record(["Time (s)", label, "CI lower", "CI upper"])?;
    for i in 0..summary.time.len() {
        w.write_record(&[
            summary.time[i].to_string(),
            summary.mean[i].to_string(),
            summary.ci_lower[i].to_string(),
            summary.ci_upper[i].to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write every window as a column: `Time (s)`, `Event <id>`, ….
pub fn write_windows_csv(windows: &EventWindows, path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let header: Vec<String> = std::iter::once("Time (s)".to_string())
        .chain(windows.events.iter().map(|id| format!("Event {id}")))
        .collect();
    w.write_record(&header)?;
    for (i, t) in windows.time.iter().enumerate() {
        let row: Vec<String> = std::iter::once(t.to_string())
            .chain(windows.windows.column(i).iter().map(|v| v.to_string()))
            .collect();
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

/// Pretty-printed JSON.
pub fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
