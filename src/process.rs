//! Per-folder orchestration: ingest → preprocess → detect → export.
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::io::{write_json, write_mean_csv, write_windows_csv, Recording};
use crate::preprocess::prepare_pupil;
use crate::signal::Signal;
use crate::velocity::whisker_velocity;
use crate::window::{extract_windows, stable_events, summarize, EventWindows};
use crate::{detect_events, Detection};

/// Everything a run produced, also written to `detection.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub config: PipelineConfig,
    /// Sampling rate per modality (Hz).
    pub sampling_rates: BTreeMap<&'static str, usize>,
    /// Pupil samples replaced by drop interpolation.
    pub n_interpolated: usize,
    pub detection: Detection,
    /// Time of each validated event on the smoothed pupil clock (s).
    pub event_times: Vec<f64>,
    /// Validated events that survived the pupil stability check and were
    /// exported.
    pub exported: Vec<usize>,
}

/// One exported modality: file stem, mean column label, baseline-normalised.
struct Export<'a> {
    name: &'static str,
    label: &'static str,
    signal: &'a Signal,
    normalize: bool,
}

/// Process one recording folder and write its results into `results_dir`.
pub fn process_folder(data_dir: &Path, results_dir: &Path, cfg: &PipelineConfig) -> Result<RunReport> {
    cfg.validate()?;
    info!("processing {}", data_dir.display());

    // ── 1. Ingest ────────────────────────────────────────────────────────────
    let rec = Recording::load(data_dir, cfg)?;

    // ── 2. Preprocess ────────────────────────────────────────────────────────
    let pupil = prepare_pupil(&rec.pupil, cfg).context("pupil preprocessing")?;
    let velocity = whisker_velocity(&rec.whisker_angle, cfg.percentile_clip).context("whisker velocity")?;

    // ── 3. Detect ────────────────────────────────────────────────────────────
    let detection = detect_events(&pupil.smoothed, &velocity, cfg).context("event detection")?;
    let events: Vec<(usize, f64)> = detection
        .events
        .iter()
        .map(|&e| (e, pupil.smoothed.time[e]))
        .collect();

    // ── 4. Export windows ────────────────────────────────────────────────────
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("failed to create {}", results_dir.display()))?;

    let exports = [
        Export { name: "pupil", label: "Pupil size", signal: &pupil.normalized, normalize: false },
        Export { name: "calcium", label: "Calcium", signal: &rec.calcium, normalize: true },
        Export { name: "arteriole", label: "Arteriole diameter", signal: &rec.arteriole, normalize: true },
        Export { name: "whisker", label: "Whisker velocity", signal: &velocity, normalize: true },
    ];

    let mut sampling_rates = BTreeMap::new();
    let mut exported: Option<Vec<usize>> = None;
    for ex in &exports {
        let sr = ex.signal.sampling_rate().with_context(|| format!("{} sampling rate", ex.name))?;
        sampling_rates.insert(ex.name, sr);

        let windows = extract_windows(ex.signal, &events, sr, cfg.baseline_secs, cfg.event_secs, ex.normalize)
            .with_context(|| format!("{} windows", ex.name))?;

        // The pupil comes first and decides which events every modality keeps.
        let keep = match exported.take() {
            Some(keep) => keep,
            None => {
                let keep = stable_events(&windows, cfg.pupil_exclude_threshold);
                if keep.len() < windows.n_events() {
                    info!("{} events excluded by the pupil stability check", windows.n_events() - keep.len());
                }
                keep
            }
        };
        let windows = windows.select(&keep);
        exported = Some(keep);
        write_modality(&windows, ex, cfg.ci_z, results_dir)?;
    }

    let report = RunReport {
        data_dir: data_dir.to_path_buf(),
        results_dir: results_dir.to_path_buf(),
        config: cfg.clone(),
        sampling_rates,
        n_interpolated: pupil.n_interpolated,
        event_times: events.iter().map(|&(_, t)| t).collect(),
        exported: exported.unwrap_or_default(),
        detection,
    };
    write_json(&report, &results_dir.join("detection.json"))?;
    info!(
        "{}: {} events detected, {} exported → {}",
        data_dir.display(),
        report.detection.events.len(),
        report.exported.len(),
        results_dir.display()
    );
    Ok(report)
}

fn write_modality(windows: &EventWindows, ex: &Export<'_>, ci_z: f64, results_dir: &Path) -> Result<()> {
    let Some(summary) = summarize(windows, ci_z) else {
        warn!("no {} windows to export", ex.name);
        return Ok(());
    };
    write_mean_csv(&summary, ex.label, &results_dir.join(format!("{}_mean.csv", ex.name)))?;
    write_windows_csv(windows, &results_dir.join(format!("{}_windows.csv", ex.name)))?;
    Ok(())
}

/// `<parent>/<name>_results` next to `data_dir`.
pub fn default_results_dir(data_dir: &Path) -> PathBuf {
    let name = data_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".into());
    data_dir.with_file_name(format!("{name}_results"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_dir_is_a_sibling() {
        assert_eq!(
            default_results_dir(Path::new("/data/mouse1")),
            PathBuf::from("/data/mouse1_results")
        );
    }
}
