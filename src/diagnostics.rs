use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::calibration::JitterZone;
use crate::types::EventKind;

/// Read-only view of the engine for live debugging displays.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EngineDiagnostics {
    /// Wall-clock time the snapshot was taken.
    pub timestamp: f64,
    pub active: bool,
    // Calibration
    pub learning: bool,
    pub learning_progress: f64,
    pub zone: Option<JitterZone>,
    pub has_base: bool,
    // Latest smoothed angles
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    // Detection state
    pub pattern_window_len: usize,
    pub cooldown_remaining_ms: f64,
    pub last_event: Option<EventKind>,
    // Counters
    pub frames_seen: u64,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub events_emitted: u64,
}

impl EngineDiagnostics {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            active: false,
            learning: false,
            learning_progress: 0.0,
            zone: None,
            has_base: false,
            beta: None,
            gamma: None,
            alpha: None,
            pattern_window_len: 0,
            cooldown_remaining_ms: 0.0,
            last_event: None,
            frames_seen: 0,
            frames_processed: 0,
            frames_dropped: 0,
            events_emitted: 0,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for EngineDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
