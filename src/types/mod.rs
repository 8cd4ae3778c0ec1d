use serde::{Deserialize, Serialize};

/// One raw orientation reading as delivered by the host sensor callback.
///
/// Angles are in degrees: `beta` is front/back tilt (-180..180), `gamma` is
/// left/right tilt (-90..90), `alpha` is compass heading (0..360) and may be
/// missing. `timestamp` is monotonic seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    #[serde(default)]
    pub alpha: Option<f64>,
    pub beta: f64,
    pub gamma: f64,
    pub timestamp: f64,
}

impl OrientationSample {
    pub fn new(beta: f64, gamma: f64, timestamp: f64) -> Self {
        Self {
            alpha: None,
            beta,
            gamma,
            timestamp,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.beta.is_finite()
            && self.gamma.is_finite()
            && self.timestamp.is_finite()
            && self.alpha.map_or(true, f64::is_finite)
    }
}

/// Smoothed sample fed to the instantaneous classifier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GestureSample {
    pub beta: f64,
    pub gamma: f64,
    pub alpha: Option<f64>,
    pub timestamp: f64,
    /// Low-pass filtered unit tilt vector, used for stillness checks.
    pub tilt: [f64; 3],
}

impl GestureSample {
    pub fn new(beta: f64, gamma: f64, timestamp: f64) -> Self {
        Self {
            beta,
            gamma,
            alpha: None,
            timestamp,
            tilt: tilt_vector(beta, gamma),
        }
    }

    /// Angle in degrees between this sample's tilt vector and another's.
    pub fn tilt_angle_to(&self, other: &GestureSample) -> f64 {
        let dot: f64 = self
            .tilt
            .iter()
            .zip(other.tilt.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norms = norm(&self.tilt) * norm(&other.tilt);
        if norms <= f64::EPSILON {
            return 0.0;
        }
        (dot / norms).clamp(-1.0, 1.0).acos().to_degrees()
    }
}

/// Unit vector of the screen normal for a device tilted by `beta`/`gamma` degrees.
pub fn tilt_vector(beta: f64, gamma: f64) -> [f64; 3] {
    let (sb, cb) = beta.to_radians().sin_cos();
    let (sg, cg) = gamma.to_radians().sin_cos();
    [cb * sg, sb, cb * cg]
}

fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// One entry of the pattern window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternPoint {
    pub beta: f64,
    pub gamma: f64,
    pub timestamp: f64,
    /// Angular speed in degrees per second relative to the previous point.
    pub velocity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Pass,
    Shot,
    Tackle,
    Foul,
    Corner,
    Offside,
    Substitution,
    VoiceTag,
    Circular,
    #[serde(rename = "FIGURE_8")]
    Figure8,
    Zigzag,
    Shake,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Pass => "PASS",
            EventKind::Shot => "SHOT",
            EventKind::Tackle => "TACKLE",
            EventKind::Foul => "FOUL",
            EventKind::Corner => "CORNER",
            EventKind::Offside => "OFFSIDE",
            EventKind::Substitution => "SUBSTITUTION",
            EventKind::VoiceTag => "VOICE_TAG",
            EventKind::Circular => "CIRCULAR",
            EventKind::Figure8 => "FIGURE_8",
            EventKind::Zigzag => "ZIGZAG",
            EventKind::Shake => "SHAKE",
        }
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            EventKind::Circular | EventKind::Figure8 | EventKind::Zigzag | EventKind::Shake
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Instant,
    Pattern,
}

/// Event handed to the caller. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub confidence: f64,
    pub timestamp: f64,
    pub source: EventSource,
    pub description: String,
    /// `(beta, gamma)` path that produced a pattern match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_path: Option<Vec<(f64, f64)>>,
}
