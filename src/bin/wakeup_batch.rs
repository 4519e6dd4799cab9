//! Detect waking-up events in many recording folders, in parallel.
//!
//! Each folder is processed independently; a failing folder is logged and
//! the rest of the batch carries on.
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use rayon::prelude::*;
use std::path::PathBuf;
use wakeup::{find_recording_folders, process::default_results_dir, process_folder, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "wakeup_batch", about = "Waking-up event detection over many recording folders")]
struct Args {
    /// Process every folder below this root that contains CSV files
    #[arg(long, conflicts_with = "folders")]
    root: Option<PathBuf>,

    /// Explicit list of recording folders
    #[arg(long, num_args = 1..)]
    folders: Vec<PathBuf>,

    /// JSON file overriding any PipelineConfig field
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PipelineConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    let folders = match &args.root {
        Some(root) => find_recording_folders(root)?,
        None => args.folders.clone(),
    };
    if folders.is_empty() {
        bail!("no recording folders given (use --root or --folders)");
    }
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("building thread pool")?;
    }
    info!("processing {} folders", folders.len());

    let outcomes: Vec<(PathBuf, Result<usize>)> = folders
        .par_iter()
        .map(|folder| {
            let results = default_results_dir(folder);
            let outcome = process_folder(folder, &results, &cfg).map(|r| r.detection.events.len());
            if let Err(e) = &outcome {
                error!("{}: {e:#}", folder.display());
            }
            (folder.clone(), outcome)
        })
        .collect();

    let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
    for (folder, outcome) in &outcomes {
        match outcome {
            Ok(n) => println!("{:<60} {n} events", folder.display()),
            Err(_) => println!("{:<60} FAILED", folder.display()),
        }
    }
    println!("{} ok, {failed} failed", outcomes.len() - failed);

    Ok(())
}
