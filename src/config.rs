// config.rs - Every tunable the engine reads.
//
// One group per gesture plus the pattern, timing, calibration, filter and
// sampling groups. All values are empirically chosen defaults, not physical
// constants. The detection loop only reads this; the calibration surface
// replaces it wholesale.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{EngineError, Result};

// ─── Instantaneous rule groups ───────────────────────────────────────────────

/// Directional tilt relative to the base sample.
///
/// The primary-axis delta must land in `[min_deg, max_deg]` while the other
/// axis stays within `cross_max_deg`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiltThresholds {
    pub enabled: bool,
    pub min_deg: f64,
    pub max_deg: f64,
    pub cross_max_deg: f64,
    pub hold_frames: u32,
}

impl TiltThresholds {
    fn flick() -> Self {
        Self {
            enabled: true,
            min_deg: 40.0,
            max_deg: 85.0,
            cross_max_deg: 25.0,
            hold_frames: 3,
        }
    }

    fn lateral() -> Self {
        Self {
            enabled: true,
            min_deg: 35.0,
            max_deg: 80.0,
            cross_max_deg: 20.0,
            hold_frames: 4,
        }
    }
}

impl Default for TiltThresholds {
    fn default() -> Self {
        Self::flick()
    }
}

/// Diagonal tilt: both axis deltas inside `[min_deg, max_deg]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagonalThresholds {
    pub enabled: bool,
    pub min_deg: f64,
    pub max_deg: f64,
    pub hold_frames: u32,
}

impl Default for DiagonalThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_deg: 25.0,
            max_deg: 60.0,
            hold_frames: 4,
        }
    }
}

/// Large simultaneous deviation on both axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakeThresholds {
    pub enabled: bool,
    pub min_beta_deg: f64,
    pub min_gamma_deg: f64,
    pub hold_frames: u32,
}

impl Default for ShakeThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_beta_deg: 65.0,
            min_gamma_deg: 65.0,
            hold_frames: 3,
        }
    }
}

/// Device lying flat and still (absolute angles).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldFlatThresholds {
    pub enabled: bool,
    pub max_abs_deg: f64,
    /// Largest frame-to-frame tilt change still counted as "held".
    pub still_max_deg: f64,
    pub hold_frames: u32,
}

impl Default for HoldFlatThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            max_abs_deg: 10.0,
            still_max_deg: 2.0,
            hold_frames: 8,
        }
    }
}

/// Device held upside down (absolute beta).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvertedThresholds {
    pub enabled: bool,
    pub min_abs_beta_deg: f64,
    pub hold_frames: u32,
}

impl Default for InvertedThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_abs_beta_deg: 150.0,
            hold_frames: 5,
        }
    }
}

// ─── Pattern groups ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircularThresholds {
    pub enabled: bool,
    /// `1 - coefficient of variation` of the radii must exceed this.
    pub min_consistency: f64,
    /// Swept angle as a fraction of a full revolution.
    pub min_coverage: f64,
    pub min_radius_deg: f64,
    pub max_confidence: f64,
}

impl Default for CircularThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_consistency: 0.6,
            min_coverage: 0.5,
            min_radius_deg: 15.0,
            max_confidence: 0.99,
        }
    }
}

/// Two opposite-handed loops with separated centres.
///
/// While this matcher is enabled, an accepted circle is held back for up to
/// `hold_ms` in case a second loop follows. It is released early once the
/// path slows below `settle_velocity_deg_s`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureEightThresholds {
    pub enabled: bool,
    pub min_separation_deg: f64,
    /// 0 emits circles immediately.
    pub hold_ms: u64,
    pub settle_velocity_deg_s: f64,
}

impl Default for FigureEightThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_separation_deg: 20.0,
            hold_ms: 2000,
            settle_velocity_deg_s: 40.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZigzagThresholds {
    pub enabled: bool,
    pub min_extrema: u32,
    /// Smallest swing between consecutive counted extrema.
    pub min_amplitude_deg: f64,
    /// Largest range on the other axis, as a fraction of the swing axis range.
    pub max_cross_ratio: f64,
    pub base_confidence: f64,
    pub confidence_per_extremum: f64,
    pub max_confidence: f64,
}

impl Default for ZigzagThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_extrema: 3,
            min_amplitude_deg: 8.0,
            max_cross_ratio: 0.5,
            base_confidence: 0.5,
            confidence_per_extremum: 0.1,
            max_confidence: 0.95,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakePatternThresholds {
    pub enabled: bool,
    pub min_velocity_deg_s: f64,
    pub min_fast_samples: u32,
    /// Direction reversals needed between consecutive fast steps.
    pub min_reversals: u32,
    pub base_confidence: f64,
    pub confidence_per_sample: f64,
    pub max_confidence: f64,
}

impl Default for ShakePatternThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_velocity_deg_s: 80.0,
            min_fast_samples: 4,
            min_reversals: 2,
            base_confidence: 0.5,
            confidence_per_sample: 0.1,
            max_confidence: 0.95,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub window_ms: u64,
    pub min_samples: usize,
    /// Best matcher confidence must exceed this to emit.
    pub acceptance: f64,
    /// Instant rules hold off while the newest `sweep_min_points` points all
    /// move faster than this. A sweep of 0 points never holds them off.
    pub sweep_velocity_deg_s: f64,
    pub sweep_min_points: usize,
    pub circular: CircularThresholds,
    pub figure_eight: FigureEightThresholds,
    pub zigzag: ZigzagThresholds,
    pub shake: ShakePatternThresholds,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window_ms: 2000,
            min_samples: 10,
            acceptance: 0.7,
            sweep_velocity_deg_s: 60.0,
            sweep_min_points: 2,
            circular: CircularThresholds::default(),
            figure_eight: FigureEightThresholds::default(),
            zigzag: ZigzagThresholds::default(),
            shake: ShakePatternThresholds::default(),
        }
    }
}

// ─── Engine groups ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Global lockout after any emitted event.
    pub cooldown_ms: u64,
    /// After this long the last kind may fire again even without re-arming.
    pub clear_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 800,
            clear_ms: 1500,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub learn_on_activate: bool,
    pub duration_ms: u64,
    pub min_samples: usize,
    /// Standard deviation multiplier for the zone radius.
    pub margin: f64,
    pub min_radius_deg: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            learn_on_activate: true,
            duration_ms: 2000,
            min_samples: 5,
            margin: 1.5,
            min_radius_deg: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    pub process_noise: f64,
    pub measurement_noise: f64,
    /// Low-pass factor for the tilt vector used in stillness checks.
    pub tilt_alpha: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            process_noise: 0.008,
            measurement_noise: 0.25,
            tilt_alpha: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Processing rate; 0 disables the elapsed-time gate.
    pub target_hz: f64,
    /// Only every Nth callback is considered.
    pub frame_divisor: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target_hz: 15.0,
            frame_divisor: 1,
        }
    }
}

// ─── Top-level ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub pass: TiltThresholds,
    pub shot: TiltThresholds,
    pub tackle: TiltThresholds,
    pub offside: TiltThresholds,
    pub corner: DiagonalThresholds,
    pub foul: ShakeThresholds,
    pub substitution: HoldFlatThresholds,
    pub voice_tag: InvertedThresholds,
    pub patterns: PatternConfig,
    pub timing: TimingConfig,
    pub calibration: CalibrationConfig,
    pub filter: FilterConfig,
    pub sampling: SamplingConfig,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pass: TiltThresholds::flick(),
            shot: TiltThresholds::flick(),
            tackle: TiltThresholds::lateral(),
            offside: TiltThresholds::lateral(),
            corner: DiagonalThresholds::default(),
            foul: ShakeThresholds::default(),
            substitution: HoldFlatThresholds::default(),
            voice_tag: InvertedThresholds::default(),
            patterns: PatternConfig::default(),
            timing: TimingConfig::default(),
            calibration: CalibrationConfig::default(),
            filter: FilterConfig::default(),
            sampling: SamplingConfig::default(),
        }
    }
}

impl ThresholdConfig {
    /// Parse persisted JSON and merge it over the defaults key by key.
    ///
    /// Unparseable input yields the defaults.
    pub fn from_persisted_json(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(persisted) => Self::merged_over_defaults(&persisted),
            Err(e) => {
                warn!("Persisted threshold config is not valid JSON ({e}), using defaults");
                Self::default()
            }
        }
    }

    pub fn merged_over_defaults(persisted: &Value) -> Self {
        let defaults = Self::default();
        let mut merged = match serde_json::to_value(&defaults) {
            Ok(v) => v,
            Err(_) => return defaults,
        };
        merge_value(&mut merged, persisted, "");
        match serde_json::from_value(merged) {
            Ok(config) => config,
            Err(e) => {
                warn!("Merged threshold config failed to deserialize ({e}), using defaults");
                defaults
            }
        }
    }

    /// Disable every instantaneous rule and every pattern matcher.
    pub fn all_disabled() -> Self {
        let mut config = Self::default();
        config.pass.enabled = false;
        config.shot.enabled = false;
        config.tackle.enabled = false;
        config.offside.enabled = false;
        config.corner.enabled = false;
        config.foul.enabled = false;
        config.substitution.enabled = false;
        config.voice_tag.enabled = false;
        config.patterns.circular.enabled = false;
        config.patterns.figure_eight.enabled = false;
        config.patterns.zigzag.enabled = false;
        config.patterns.shake.enabled = false;
        config
    }

    /// Set one leaf by dotted path (`"pass.min_deg"`), coercing the textual value
    /// to the type of the existing field.
    pub fn set_path(&mut self, path: &str, raw_value: &str) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        let mut node = &mut tree;
        for segment in path.split('.') {
            node = node.get_mut(segment).ok_or_else(|| {
                EngineError::InvalidConfig(format!("unknown config field '{path}'"))
            })?;
        }
        if node.is_object() {
            return Err(EngineError::InvalidConfig(format!(
                "'{path}' is a group, not a field"
            )));
        }
        let overlay = Value::String(raw_value.to_string());
        *node = coerce_leaf(node, &overlay).ok_or_else(|| {
            EngineError::InvalidConfig(format!("cannot use '{raw_value}' for '{path}'"))
        })?;
        *self = serde_json::from_value(tree)?;
        Ok(())
    }
}

/// Overlay `persisted` onto `base`, keeping only keys that exist in `base`.
fn merge_value(base: &mut Value, persisted: &Value, path: &str) {
    match (base, persisted) {
        (Value::Object(base_map), Value::Object(persisted_map)) => {
            merge_object(base_map, persisted_map, path);
        }
        (base_leaf, persisted_leaf) => {
            if base_leaf.is_object() {
                warn!("Persisted config '{path}' is not a group, keeping defaults");
                return;
            }
            match coerce_leaf(base_leaf, persisted_leaf) {
                Some(v) => *base_leaf = v,
                None => warn!(
                    "Persisted config '{path}' has incompatible value {persisted_leaf}, keeping default"
                ),
            }
        }
    }
}

fn merge_object(base: &mut Map<String, Value>, persisted: &Map<String, Value>, path: &str) {
    for (key, value) in persisted {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match base.get_mut(key) {
            Some(slot) => merge_value(slot, value, &child_path),
            None => log::debug!("Ignoring unknown persisted config key '{child_path}'"),
        }
    }
}

/// Convert `overlay` to the JSON kind of `default`, if possible.
fn coerce_leaf(default: &Value, overlay: &Value) -> Option<Value> {
    match default {
        Value::Bool(_) => match overlay {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            _ => None,
        },
        Value::Number(d) => {
            let f = match overlay {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            if !f.is_finite() {
                return None;
            }
            if d.is_u64() {
                if f < 0.0 || f.fract() != 0.0 {
                    return None;
                }
                Some(Value::Number(Number::from(f as u64)))
            } else if d.is_i64() {
                if f.fract() != 0.0 {
                    return None;
                }
                Some(Value::Number(Number::from(f as i64)))
            } else {
                Number::from_f64(f).map(Value::Number)
            }
        }
        Value::String(_) => match overlay {
            Value::String(s) => Some(Value::String(s.clone())),
            _ => None,
        },
        _ => None,
    }
}
