//! Detect waking-up events in one recording folder.
//!
//! ```text
//! wakeup data/mouse1 --results out/mouse1 --event-secs 20
//! RUST_LOG=debug wakeup data/mouse1 --config tuned.json
//! ```
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use wakeup::{process::default_results_dir, process_folder, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "wakeup", about = "Waking-up event detection for one recording folder")]
struct Args {
    /// Folder holding pupil_size.csv, calcium.csv, arteriole_diameter.csv
    /// and resampled_whiskerAngle.csv
    folder: PathBuf,

    /// Output folder (default: <folder>_results next to the input)
    #[arg(long)]
    results: Option<PathBuf>,

    /// JSON file overriding any PipelineConfig field
    #[arg(long)]
    config: Option<PathBuf>,

    /// Baseline window in seconds (overrides the config file)
    #[arg(long)]
    baseline_secs: Option<f64>,

    /// Event window in seconds (overrides the config file)
    #[arg(long)]
    event_secs: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // ── 1. Configuration ───────────────────────────────────────────────────
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PipelineConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(v) = args.baseline_secs {
        cfg.baseline_secs = v;
    }
    if let Some(v) = args.event_secs {
        cfg.event_secs = v;
    }

    // ── 2. Run ─────────────────────────────────────────────────────────────
    let results = args.results.unwrap_or_else(|| default_results_dir(&args.folder));
    let report = process_folder(&args.folder, &results, &cfg)?;

    // ── 3. Summary ─────────────────────────────────────────────────────────
    println!(
        "{} candidate blocks, {} refined, {} validated, {} exported",
        report.detection.blocks.len(),
        report.detection.refined().len(),
        report.detection.events.len(),
        report.exported.len()
    );
    for (&e, t) in report.detection.events.iter().zip(&report.event_times) {
        println!("  event @ sample {e:>7}  t = {t:8.2} s");
    }
    println!("Written → {}", results.display());

    Ok(())
}
