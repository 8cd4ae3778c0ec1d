use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam::channel;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::thread;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use pitch_motion_rs::synth::DemoGesture;
use pitch_motion_rs::{
    ClassifiedEvent, ConfigStore, GestureEngine, JsonFileStore, OrientationSample,
};

#[derive(Parser, Debug)]
#[command(name = "pitch_motion")]
#[command(about = "Motion-gesture tagging for live match commentary", long_about = None)]
struct Args {
    /// Threshold store (JSON key/value file)
    #[arg(long, global = true, default_value = "pitch_motion_store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a synthetic gesture through a fresh engine as fast as possible
    Simulate {
        #[arg(value_enum)]
        gesture: Gesture,

        /// Native sensor rate of the synthetic stream
        #[arg(long, default_value = "60")]
        rate: f64,

        /// Print events as JSON instead of one line per event
        #[arg(long)]
        json: bool,

        /// Write an engine snapshot here after the run
        #[arg(long)]
        diagnostics: Option<PathBuf>,
    },
    /// Stream a synthetic gesture in real time, the way a sensor callback would
    Live {
        #[arg(value_enum)]
        gesture: Gesture,

        #[arg(long, default_value = "60")]
        rate: f64,
    },
    /// Inspect or edit the persisted thresholds
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective thresholds (persisted values merged over defaults)
    Show,
    /// Remove persisted thresholds so the defaults apply again
    Reset,
    /// Set one field by dotted path, e.g. `pass.min_deg 30`
    Set { path: String, value: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Gesture {
    Circle,
    FigureEight,
    Zigzag,
    Shake,
    Flick,
    Inverted,
}

impl From<Gesture> for DemoGesture {
    fn from(g: Gesture) -> Self {
        match g {
            Gesture::Circle => DemoGesture::Circle,
            Gesture::FigureEight => DemoGesture::FigureEight,
            Gesture::Zigzag => DemoGesture::Zigzag,
            Gesture::Shake => DemoGesture::Shake,
            Gesture::Flick => DemoGesture::Flick,
            Gesture::Inverted => DemoGesture::Inverted,
        }
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn print_event(event: &ClassifiedEvent) {
    println!(
        "[{}] {:>8.3}s  {:<12} {:.2}  {}",
        ts_now(),
        event.timestamp,
        event.kind.label(),
        event.confidence,
        event.description
    );
}

fn open_store(path: &Path) -> ConfigStore<JsonFileStore> {
    ConfigStore::new(JsonFileStore::new(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Simulate {
            gesture,
            rate,
            json,
            diagnostics,
        } => simulate(&args.store, gesture.into(), rate, json, diagnostics),
        Command::Live { gesture, rate } => live(&args.store, gesture.into(), rate).await,
        Command::Config { action } => config(&args.store, action),
    }
}

fn simulate(
    store_path: &Path,
    gesture: DemoGesture,
    rate: f64,
    json: bool,
    diagnostics: Option<PathBuf>,
) -> Result<()> {
    if !(rate.is_finite() && rate > 0.0) {
        bail!("--rate must be a positive number, got {rate}");
    }
    let store = open_store(store_path);
    let mut engine = GestureEngine::new(store.load());
    engine.activate();

    let samples = gesture.session(rate);
    let mut events: Vec<ClassifiedEvent> = Vec::new();
    engine.run(&samples, &mut events);

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        println!(
            "[{}] Simulating {:?} at {:.0} Hz ({} samples)",
            ts_now(),
            gesture,
            rate,
            samples.len()
        );
        for event in &events {
            print_event(event);
        }
        println!("[{}] {} event(s)", ts_now(), events.len());
    }

    if let Some(path) = diagnostics {
        engine
            .diagnostics()
            .save(&path)
            .with_context(|| format!("writing diagnostics to {}", path.display()))?;
        info!("Diagnostics written to {}", path.display());
    }
    Ok(())
}

/// Paces a prepared session onto the channel at its native rate.
async fn sensor_loop(tx: mpsc::Sender<OrientationSample>, samples: Vec<OrientationSample>, rate: f64) {
    let mut tick = interval(Duration::from_secs_f64(1.0 / rate));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for sample in samples {
        tick.tick().await;
        if tx.send(sample).await.is_err() {
            debug!("Sample receiver closed, stopping sensor loop");
            return;
        }
    }
}

async fn live(store_path: &Path, gesture: DemoGesture, rate: f64) -> Result<()> {
    if !(rate.is_finite() && rate > 0.0) {
        bail!("--rate must be a positive number, got {rate}");
    }
    let store = open_store(store_path);
    let mut engine = GestureEngine::new(store.load());

    let (sample_tx, mut sample_rx) = mpsc::channel::<OrientationSample>(256);
    let (event_tx, event_rx) = channel::bounded::<ClassifiedEvent>(64);

    let _sensor_handle = tokio::spawn(sensor_loop(sample_tx, gesture.session(rate), rate));
    let printer = thread::spawn(move || {
        let mut count = 0usize;
        for event in event_rx {
            print_event(&event);
            count += 1;
        }
        count
    });

    println!("[{}] Hold the device still while the rest zone is learned...", ts_now());
    engine.activate();

    let mut sink = event_tx;
    let mut was_learning = engine.is_learning();
    while let Some(sample) = sample_rx.recv().await {
        engine.process_into(&sample, &mut sink);
        if was_learning && !engine.is_learning() {
            match engine.current_zone() {
                Some(zone) => println!(
                    "[{}] Rest zone learned: beta {:.1}±{:.1}°, gamma {:.1}±{:.1}°",
                    ts_now(),
                    zone.center_beta,
                    zone.radius_beta,
                    zone.center_gamma,
                    zone.radius_gamma
                ),
                None => println!("[{}] Learning ended without a zone", ts_now()),
            }
            was_learning = false;
        }
    }
    drop(sink);

    let delivered = printer
        .join()
        .map_err(|_| anyhow::anyhow!("event printer thread panicked"))?;
    let diag = engine.diagnostics();
    println!(
        "[{}] Stream ended: {} frames seen, {} processed, {} event(s)",
        ts_now(),
        diag.frames_seen,
        diag.frames_processed,
        delivered
    );
    Ok(())
}

fn config(store_path: &Path, action: ConfigAction) -> Result<()> {
    let mut store = open_store(store_path);
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&store.load())?);
        }
        ConfigAction::Reset => {
            store
                .reset()
                .with_context(|| format!("resetting {}", store_path.display()))?;
            println!("[{}] Thresholds reset to defaults", ts_now());
        }
        ConfigAction::Set { path, value } => {
            let mut current = store.load();
            current
                .set_path(&path, &value)
                .with_context(|| format!("setting {path}"))?;
            store
                .save(&current)
                .with_context(|| format!("saving {}", store_path.display()))?;
            println!("[{}] {} = {}", ts_now(), path, value);
        }
    }
    Ok(())
}
