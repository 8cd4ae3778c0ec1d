use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use serde_json::json;

use pitch_motion_rs::replay::load_session;
use pitch_motion_rs::{ClassifiedEvent, ConfigStore, GestureEngine, JsonFileStore, ThresholdConfig};

#[derive(Parser, Debug)]
#[command(about = "Replay recorded orientation sessions through the gesture engine")]
struct Args {
    /// Path to a session log (.json, .jsonl, optionally .gz)
    #[arg(long, conflicts_with = "session_dir")]
    log: Option<PathBuf>,

    /// Directory of session logs to batch replay
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// Threshold store to load instead of the defaults
    #[arg(long)]
    store: Option<PathBuf>,

    /// Write the final engine snapshot here (single log only)
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Skip rest-zone learning; the first sample becomes the base
    #[arg(long, default_value_t = false)]
    no_learn: bool,

    /// Override the global cooldown between events
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Override the pattern acceptance confidence
    #[arg(long)]
    acceptance: Option<f64>,
}

fn is_session_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    [".json", ".jsonl", ".json.gz", ".jsonl.gz"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

fn effective_config(args: &Args) -> ThresholdConfig {
    let mut config = match &args.store {
        Some(path) => ConfigStore::new(JsonFileStore::new(path)).load(),
        None => ThresholdConfig::default(),
    };
    if args.no_learn {
        config.calibration.learn_on_activate = false;
    }
    if let Some(ms) = args.cooldown_ms {
        config.timing.cooldown_ms = ms;
    }
    if let Some(acceptance) = args.acceptance {
        config.patterns.acceptance = acceptance;
    }
    config
}

fn run_once(path: &Path, args: &Args, config: &ThresholdConfig) -> anyhow::Result<serde_json::Value> {
    let samples =
        load_session(path).with_context(|| format!("loading session {}", path.display()))?;

    let mut engine = GestureEngine::new(config.clone());
    engine.activate();
    let mut events: Vec<ClassifiedEvent> = Vec::new();
    engine.run(&samples, &mut events);

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for event in &events {
        *counts.entry(event.kind.label().to_string()).or_default() += 1;
    }
    let duration_s = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => 0.0,
    };

    let diag = engine.diagnostics();
    if let Some(out) = &args.diagnostics {
        diag.save(out)
            .with_context(|| format!("writing diagnostics to {}", out.display()))?;
    }
    info!(
        "{}: {} samples, {} events",
        path.display(),
        samples.len(),
        events.len()
    );

    Ok(json!({
        "log": path.display().to_string(),
        "samples": samples.len(),
        "duration_s": duration_s,
        "frames_processed": diag.frames_processed,
        "frames_dropped": diag.frames_dropped,
        "zone": diag.zone,
        "counts": counts,
        "events": events,
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = effective_config(&args);

    let mut results = Vec::new();
    if let Some(dir) = args.session_dir.clone() {
        if args.diagnostics.is_some() {
            warn!("--diagnostics is ignored in batch mode");
        }
        let batch_args = Args {
            diagnostics: None,
            ..args
        };
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("reading {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_session_file(p))
            .collect();
        paths.sort();
        for path in paths {
            match run_once(&path, &batch_args, &config) {
                Ok(report) => results.push(report),
                Err(e) => results.push(json!({
                    "log": path.display().to_string(),
                    "error": format!("{e:#}"),
                })),
            }
        }
    } else if let Some(log) = &args.log {
        results.push(run_once(log, &args, &config)?);
    } else {
        anyhow::bail!("Provide --log or --session-dir");
    }

    let report = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "results": results,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
