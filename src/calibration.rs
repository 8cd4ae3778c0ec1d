use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;

/// Per-axis tolerance region around the learned neutral orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JitterZone {
    pub center_beta: f64,
    pub center_gamma: f64,
    pub radius_beta: f64,
    pub radius_gamma: f64,
}

impl JitterZone {
    pub fn contains(&self, beta: f64, gamma: f64) -> bool {
        (beta - self.center_beta).abs() <= self.radius_beta
            && (gamma - self.center_gamma).abs() <= self.radius_gamma
    }
}

/// Result of feeding one sample to an in-flight learning session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LearningOutcome {
    /// No learning session running.
    Idle,
    Collecting { progress: f64 },
    Completed(JitterZone),
    /// Too few samples; the previous zone was restored.
    Aborted { samples: usize },
}

#[derive(Clone, Debug, Default)]
struct LearningSession {
    started_at: Option<f64>,
    last_seen: Option<f64>,
    samples: Vec<(f64, f64)>,
    /// Zone that was active before this session, restored on abort.
    previous_zone: Option<JitterZone>,
}

/// Learns the neutral orientation and gates jitter against it.
pub struct BaselineCalibrator {
    config: CalibrationConfig,
    zone: Option<JitterZone>,
    learning: Option<LearningSession>,
}

impl BaselineCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            zone: None,
            learning: None,
        }
    }

    pub fn set_config(&mut self, config: CalibrationConfig) {
        self.config = config;
    }

    /// Begin (or restart) learning. The current zone is invalidated until the
    /// session completes; an aborted session restores it.
    pub fn start_learning(&mut self) {
        let previous_zone = match self.learning.take() {
            Some(session) => session.previous_zone,
            None => self.zone.take(),
        };
        self.zone = None;
        self.learning = Some(LearningSession {
            previous_zone,
            samples: Vec::with_capacity(64),
            ..Default::default()
        });
        debug!("Baseline learning started");
    }

    /// Stop learning without producing a zone; the previous zone comes back.
    pub fn cancel_learning(&mut self) {
        if let Some(session) = self.learning.take() {
            self.zone = session.previous_zone;
            debug!("Baseline learning cancelled");
        }
    }

    pub fn is_learning(&self) -> bool {
        self.learning.is_some()
    }

    /// Fraction of the learning window elapsed, 0 when idle or before the first sample.
    pub fn learning_progress(&self) -> f64 {
        let Some(session) = &self.learning else {
            return 0.0;
        };
        match (session.started_at, session.last_seen) {
            (Some(start), Some(last)) => self.progress_between(start, last),
            _ => 0.0,
        }
    }

    fn progress_between(&self, start: f64, now: f64) -> f64 {
        if self.config.duration_ms == 0 {
            return 1.0;
        }
        let duration = self.config.duration_ms as f64 / 1000.0;
        ((now - start) / duration).clamp(0.0, 1.0)
    }

    /// Feed one sample. Completes the session once the learning window has elapsed.
    pub fn observe(&mut self, beta: f64, gamma: f64, timestamp: f64) -> LearningOutcome {
        let Some(session) = self.learning.as_mut() else {
            return LearningOutcome::Idle;
        };
        let start = *session.started_at.get_or_insert(timestamp);
        session.last_seen = Some(timestamp);
        session.samples.push((beta, gamma));
        let collected = session.samples.len();

        let progress = self.progress_between(start, timestamp);
        if progress >= 1.0 {
            match self.finish_learning() {
                Some(zone) => LearningOutcome::Completed(zone),
                None => LearningOutcome::Aborted { samples: collected },
            }
        } else {
            LearningOutcome::Collecting { progress }
        }
    }

    /// Close the current session and compute the zone from what was collected.
    ///
    /// Returns `None` (and restores the previous zone) when fewer than
    /// `min_samples` were collected or no session was running.
    pub fn finish_learning(&mut self) -> Option<JitterZone> {
        let session = self.learning.take()?;
        match compute_zone(&session.samples, &self.config) {
            Some(zone) => {
                info!(
                    "Jitter zone learned from {} samples: center=({:.1}, {:.1}) radius=({:.1}, {:.1})",
                    session.samples.len(),
                    zone.center_beta,
                    zone.center_gamma,
                    zone.radius_beta,
                    zone.radius_gamma
                );
                self.zone = Some(zone);
                Some(zone)
            }
            None => {
                warn!(
                    "Baseline learning aborted: {} samples, need {}",
                    session.samples.len(),
                    self.config.min_samples
                );
                self.zone = session.previous_zone;
                None
            }
        }
    }

    /// True when the sample counts as intentional motion. Fails open: with no
    /// zone learned every sample is outside.
    pub fn is_outside(&self, beta: f64, gamma: f64) -> bool {
        match &self.zone {
            Some(zone) => !zone.contains(beta, gamma),
            None => true,
        }
    }

    pub fn current_zone(&self) -> Option<JitterZone> {
        self.zone
    }

    /// Install a zone learned elsewhere (e.g. restored from a previous session).
    pub fn install_zone(&mut self, zone: JitterZone) {
        self.learning = None;
        self.zone = Some(zone);
    }

    pub fn clear_zone(&mut self) {
        self.zone = None;
    }
}

/// Mean as centre, margin-scaled population standard deviation as radius.
fn compute_zone(samples: &[(f64, f64)], config: &CalibrationConfig) -> Option<JitterZone> {
    if samples.len() < config.min_samples.max(1) {
        return None;
    }
    let n = samples.len() as f64;
    let (sum_b, sum_g) = samples
        .iter()
        .fold((0.0, 0.0), |acc, &(b, g)| (acc.0 + b, acc.1 + g));
    let mean_b = sum_b / n;
    let mean_g = sum_g / n;

    let (var_b, var_g) = samples.iter().fold((0.0, 0.0), |acc, &(b, g)| {
        (acc.0 + (b - mean_b).powi(2), acc.1 + (g - mean_g).powi(2))
    });
    let std_b = (var_b / n).sqrt();
    let std_g = (var_g / n).sqrt();

    Some(JitterZone {
        center_beta: mean_b,
        center_gamma: mean_g,
        radius_beta: (std_b * config.margin).max(config.min_radius_deg),
        radius_gamma: (std_g * config.margin).max(config.min_radius_deg),
    })
}
