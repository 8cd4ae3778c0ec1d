//! Motion-gesture recognition for hands-free match event tagging.
//!
//! A [`GestureEngine`] consumes device-orientation samples (front/back tilt
//! `beta`, left/right tilt `gamma`, optional heading `alpha`) and emits
//! [`ClassifiedEvent`]s: single-moment gestures such as a forward flick
//! (`PASS`) or holding the device upside down (`VOICE_TAG`), and path-shaped
//! gestures such as circles, figure-eights, zigzags and shakes.
//!
//! ```no_run
//! use pitch_motion_rs::{GestureEngine, OrientationSample, ThresholdConfig};
//!
//! let mut engine = GestureEngine::new(ThresholdConfig::default());
//! engine.activate();
//! # let samples: Vec<OrientationSample> = Vec::new();
//! for sample in &samples {
//!     if let Some(event) = engine.process(sample) {
//!         println!("{} ({:.2})", event.kind, event.confidence);
//!     }
//! }
//! ```

pub mod arbiter;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod filters;
pub mod lockout;
pub mod pattern;
pub mod replay;
pub mod sampling;
pub mod sink;
pub mod store;
pub mod synth;
pub mod types;

pub use calibration::JitterZone;
pub use config::ThresholdConfig;
pub use diagnostics::EngineDiagnostics;
pub use engine::GestureEngine;
pub use error::{EngineError, Result};
pub use sink::{EventSink, FnSink};
pub use store::{ConfigStore, JsonFileStore, KeyValueStore, MemoryStore};
pub use types::{ClassifiedEvent, EventKind, EventSource, OrientationSample};
