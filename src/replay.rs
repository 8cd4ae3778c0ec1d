use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::OrientationSample;

/// Recorded session in object form.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SessionLog {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub native_rate_hz: Option<f64>,
    pub samples: Vec<OrientationSample>,
}

/// Load a recorded session from `.json`, `.jsonl` or either of those gzipped.
///
/// Accepted layouts: a bare array of samples, a [`SessionLog`] object, or one
/// sample object per line.
pub fn load_session(path: &Path) -> Result<Vec<OrientationSample>> {
    let file = File::open(path)?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    let samples = parse_session(&text)?;
    debug!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

pub fn parse_session(text: &str) -> Result<Vec<OrientationSample>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidLog("session is empty".to_string()));
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    if let Ok(log) = serde_json::from_str::<SessionLog>(trimmed) {
        return Ok(log.samples);
    }
    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<OrientationSample>(line)
                .map_err(|e| EngineError::InvalidLog(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}
