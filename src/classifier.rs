use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{ThresholdConfig, TiltThresholds};
use crate::lockout::Lockout;
use crate::types::{EventKind, GestureSample};

/// Single-moment gesture rules, declared in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureRule {
    VoiceTag,
    Foul,
    Corner,
    Pass,
    Shot,
    Tackle,
    Offside,
    Substitution,
}

pub const RULE_COUNT: usize = 8;

impl GestureRule {
    /// The first rule to reach its hold count in a frame wins.
    pub const EVALUATION_ORDER: [GestureRule; RULE_COUNT] = [
        GestureRule::VoiceTag,
        GestureRule::Foul,
        GestureRule::Corner,
        GestureRule::Pass,
        GestureRule::Shot,
        GestureRule::Tackle,
        GestureRule::Offside,
        GestureRule::Substitution,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn kind(self) -> EventKind {
        match self {
            GestureRule::VoiceTag => EventKind::VoiceTag,
            GestureRule::Foul => EventKind::Foul,
            GestureRule::Corner => EventKind::Corner,
            GestureRule::Pass => EventKind::Pass,
            GestureRule::Shot => EventKind::Shot,
            GestureRule::Tackle => EventKind::Tackle,
            GestureRule::Offside => EventKind::Offside,
            GestureRule::Substitution => EventKind::Substitution,
        }
    }

    pub fn confidence(self) -> f64 {
        match self {
            GestureRule::VoiceTag | GestureRule::Substitution => 0.95,
            GestureRule::Foul => 0.93,
            GestureRule::Pass | GestureRule::Shot => 0.92,
            GestureRule::Corner | GestureRule::Tackle | GestureRule::Offside => 0.9,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GestureRule::VoiceTag => "Voice tag (device held upside down)",
            GestureRule::Foul => "Foul (sharp two-axis jolt)",
            GestureRule::Corner => "Corner (diagonal tilt)",
            GestureRule::Pass => "Pass (forward flick)",
            GestureRule::Shot => "Shot (backward flick)",
            GestureRule::Tackle => "Tackle (tilt left)",
            GestureRule::Offside => "Offside (tilt right)",
            GestureRule::Substitution => "Substitution (held flat)",
        }
    }

    pub fn enabled(self, cfg: &ThresholdConfig) -> bool {
        match self {
            GestureRule::VoiceTag => cfg.voice_tag.enabled,
            GestureRule::Foul => cfg.foul.enabled,
            GestureRule::Corner => cfg.corner.enabled,
            GestureRule::Pass => cfg.pass.enabled,
            GestureRule::Shot => cfg.shot.enabled,
            GestureRule::Tackle => cfg.tackle.enabled,
            GestureRule::Offside => cfg.offside.enabled,
            GestureRule::Substitution => cfg.substitution.enabled,
        }
    }

    /// Consecutive matching frames required before the rule is accepted.
    pub fn hold_frames(self, cfg: &ThresholdConfig) -> u32 {
        let frames = match self {
            GestureRule::VoiceTag => cfg.voice_tag.hold_frames,
            GestureRule::Foul => cfg.foul.hold_frames,
            GestureRule::Corner => cfg.corner.hold_frames,
            GestureRule::Pass => cfg.pass.hold_frames,
            GestureRule::Shot => cfg.shot.hold_frames,
            GestureRule::Tackle => cfg.tackle.hold_frames,
            GestureRule::Offside => cfg.offside.hold_frames,
            GestureRule::Substitution => cfg.substitution.hold_frames,
        };
        frames.max(1)
    }

    /// Pure predicate over the current sample, the base sample and (for
    /// stillness) the previous sample.
    pub fn matches(
        self,
        current: &GestureSample,
        base: &GestureSample,
        previous: Option<&GestureSample>,
        cfg: &ThresholdConfig,
    ) -> bool {
        let d_beta = angle_delta(current.beta, base.beta);
        let d_gamma = current.gamma - base.gamma;

        match self {
            // Absolute: upside down is unambiguous whatever the baseline.
            GestureRule::VoiceTag => current.beta.abs() >= cfg.voice_tag.min_abs_beta_deg,
            GestureRule::Foul => {
                d_beta.abs() >= cfg.foul.min_beta_deg && d_gamma.abs() >= cfg.foul.min_gamma_deg
            }
            GestureRule::Corner => {
                let c = &cfg.corner;
                in_range(d_beta.abs(), c.min_deg, c.max_deg)
                    && in_range(d_gamma.abs(), c.min_deg, c.max_deg)
            }
            GestureRule::Pass => directional(d_beta, d_gamma, &cfg.pass),
            GestureRule::Shot => directional(-d_beta, d_gamma, &cfg.shot),
            GestureRule::Tackle => directional(-d_gamma, d_beta, &cfg.tackle),
            GestureRule::Offside => directional(d_gamma, d_beta, &cfg.offside),
            GestureRule::Substitution => {
                let s = &cfg.substitution;
                let flat = current.beta.abs() <= s.max_abs_deg && current.gamma.abs() <= s.max_abs_deg;
                let still = previous.is_some_and(|p| current.tilt_angle_to(p) <= s.still_max_deg);
                flat && still
            }
        }
    }
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

fn directional(primary: f64, cross: f64, t: &TiltThresholds) -> bool {
    in_range(primary, t.min_deg, t.max_deg) && cross.abs() <= t.cross_max_deg
}

/// Signed difference `a - b` folded into [-180, 180).
pub fn angle_delta(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

/// A rule that cleared its hold count this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InstantMatch {
    pub rule: GestureRule,
    pub kind: EventKind,
    pub confidence: f64,
    pub timestamp: f64,
    pub frames_held: u32,
}

/// Hysteresis state machine for every rule, run against a frozen base sample.
#[derive(Clone, Debug, Default)]
pub struct InstantClassifier {
    base: Option<GestureSample>,
    previous: Option<GestureSample>,
    counters: [u32; RULE_COUNT],
}

impl InstantClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_base(&mut self, base: GestureSample) {
        self.base = Some(base);
        self.reset_counters();
    }

    pub fn base(&self) -> Option<&GestureSample> {
        self.base.as_ref()
    }

    pub fn clear_base(&mut self) {
        self.base = None;
    }

    pub fn reset_counters(&mut self) {
        self.counters = [0; RULE_COUNT];
    }

    /// Clear counters, base and stillness history.
    pub fn reset(&mut self) {
        self.reset_counters();
        self.base = None;
        self.previous = None;
    }

    pub fn counter(&self, rule: GestureRule) -> u32 {
        self.counters[rule.index()]
    }

    /// Run every enabled rule for one frame.
    ///
    /// Returns the first rule whose hold count is satisfied and which the
    /// lockout permits. Without a base sample nothing is evaluated.
    pub fn evaluate(
        &mut self,
        sample: &GestureSample,
        cfg: &ThresholdConfig,
        lockout: &mut Lockout,
    ) -> Option<InstantMatch> {
        let previous = self.previous.replace(*sample);
        let base = self.base?;
        let now = sample.timestamp;
        let last_kind = lockout.last_kind();

        for rule in GestureRule::EVALUATION_ORDER {
            let idx = rule.index();
            if !rule.enabled(cfg) {
                self.counters[idx] = 0;
                continue;
            }

            if !rule.matches(sample, &base, previous.as_ref(), cfg) {
                self.counters[idx] = 0;
                if last_kind == Some(rule.kind()) {
                    lockout.rearm(rule.kind());
                }
                continue;
            }

            self.counters[idx] = self.counters[idx].saturating_add(1);
            let held = self.counters[idx];
            if held >= rule.hold_frames(cfg) {
                if lockout.permits(rule.kind(), now, &cfg.timing) {
                    self.reset_counters();
                    return Some(InstantMatch {
                        rule,
                        kind: rule.kind(),
                        confidence: rule.confidence(),
                        timestamp: now,
                        frames_held: held,
                    });
                }
                debug!("{:?} held {} frames but lockout is active", rule, held);
            }
        }
        None
    }

    /// Frame spent inside the jitter zone: counters drop, the last fired kind re-arms.
    pub fn rest_frame(&mut self, sample: &GestureSample, lockout: &mut Lockout) {
        self.previous = Some(*sample);
        self.reset_counters();
        if let Some(kind) = lockout.last_kind() {
            lockout.rearm(kind);
        }
    }

    /// Frame on which instantaneous evaluation is suppressed (cooldown, or a
    /// pattern took the frame). Nothing accumulates, but the last fired kind may
    /// re-arm if its predicate no longer matches.
    pub fn suppressed_frame(
        &mut self,
        sample: &GestureSample,
        cfg: &ThresholdConfig,
        lockout: &mut Lockout,
    ) {
        let previous = self.previous.replace(*sample);
        self.reset_counters();
        let (Some(base), Some(kind)) = (self.base, lockout.last_kind()) else {
            return;
        };
        if let Some(rule) = GestureRule::EVALUATION_ORDER
            .into_iter()
            .find(|r| r.kind() == kind)
        {
            if !rule.matches(sample, &base, previous.as_ref(), cfg) {
                lockout.rearm(kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn only(rule: GestureRule) -> ThresholdConfig {
        let mut cfg = ThresholdConfig::all_disabled();
        match rule {
            GestureRule::VoiceTag => cfg.voice_tag.enabled = true,
            GestureRule::Foul => cfg.foul.enabled = true,
            GestureRule::Corner => cfg.corner.enabled = true,
            GestureRule::Pass => cfg.pass.enabled = true,
            GestureRule::Shot => cfg.shot.enabled = true,
            GestureRule::Tackle => cfg.tackle.enabled = true,
            GestureRule::Offside => cfg.offside.enabled = true,
            GestureRule::Substitution => cfg.substitution.enabled = true,
        }
        cfg
    }

    fn classifier_at_rest() -> InstantClassifier {
        let mut c = InstantClassifier::new();
        c.set_base(GestureSample::new(0.0, 0.0, 0.0));
        c
    }

    fn frame(beta: f64, gamma: f64, i: usize) -> GestureSample {
        GestureSample::new(beta, gamma, 1.0 + i as f64 / 15.0)
    }

    #[test]
    fn test_no_base_means_no_evaluation() {
        let mut c = InstantClassifier::new();
        let mut lockout = Lockout::new();
        let cfg = ThresholdConfig::default();
        for i in 0..10 {
            assert!(c.evaluate(&frame(180.0, 0.0, i), &cfg, &mut lockout).is_none());
        }
        assert_eq!(c.counter(GestureRule::VoiceTag), 0);
    }

    #[test]
    fn test_hold_minus_one_frames_never_fires() {
        let cfg = only(GestureRule::Pass);
        let hold = cfg.pass.hold_frames as usize;
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();

        for i in 0..hold - 1 {
            assert!(c.evaluate(&frame(50.0, 0.0, i), &cfg, &mut lockout).is_none());
        }
        for i in hold - 1..hold + 10 {
            assert!(c.evaluate(&frame(2.0, 0.0, i), &cfg, &mut lockout).is_none());
        }
        assert_eq!(c.counter(GestureRule::Pass), 0);
    }

    #[test]
    fn test_exactly_hold_frames_fires_once() {
        let cfg = only(GestureRule::Pass);
        let hold = cfg.pass.hold_frames as usize;
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();

        let mut fired = Vec::new();
        for i in 0..hold {
            if let Some(m) = c.evaluate(&frame(50.0, 0.0, i), &cfg, &mut lockout) {
                lockout.engage(m.kind, m.timestamp, &cfg.timing);
                fired.push((i, m));
            }
        }
        for i in hold..hold + 5 {
            if let Some(m) = c.evaluate(&frame(2.0, 0.0, i), &cfg, &mut lockout) {
                fired.push((i, m));
            }
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, hold - 1);
        assert_eq!(fired[0].1.kind, EventKind::Pass);
        assert_eq!(fired[0].1.frames_held, hold as u32);
        assert_abs_diff_eq!(fired[0].1.confidence, 0.92);
    }

    #[test]
    fn test_interrupted_match_restarts_count() {
        let cfg = only(GestureRule::Pass);
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();
        assert!(c.evaluate(&frame(50.0, 0.0, 0), &cfg, &mut lockout).is_none());
        assert!(c.evaluate(&frame(50.0, 0.0, 1), &cfg, &mut lockout).is_none());
        assert!(c.evaluate(&frame(10.0, 0.0, 2), &cfg, &mut lockout).is_none());
        assert!(c.evaluate(&frame(50.0, 0.0, 3), &cfg, &mut lockout).is_none());
        assert!(c.evaluate(&frame(50.0, 0.0, 4), &cfg, &mut lockout).is_none());
        assert!(c.evaluate(&frame(50.0, 0.0, 5), &cfg, &mut lockout).is_some());
    }

    #[test]
    fn test_cooldown_blocks_other_rules() {
        let mut cfg = ThresholdConfig::all_disabled();
        cfg.pass.enabled = true;
        cfg.tackle.enabled = true;
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();

        let mut fire_time = None;
        for i in 0..3 {
            if let Some(m) = c.evaluate(&frame(50.0, 0.0, i), &cfg, &mut lockout) {
                lockout.engage(m.kind, m.timestamp, &cfg.timing);
                fire_time = Some(m.timestamp);
            }
        }
        let t = fire_time.expect("pass fired");
        let cooldown = cfg.timing.cooldown_ms as f64 / 1000.0;

        for i in 3..40 {
            let sample = frame(0.0, -50.0, i);
            if let Some(m) = c.evaluate(&sample, &cfg, &mut lockout) {
                assert!(m.timestamp >= t + cooldown, "fired during cooldown at {}", m.timestamp);
                assert_eq!(m.kind, EventKind::Tackle);
                return;
            }
        }
        panic!("tackle never fired after cooldown");
    }

    #[test]
    fn test_same_rule_held_does_not_refire_until_clear_timeout() {
        let cfg = only(GestureRule::Pass);
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();
        let mut fires = Vec::new();

        // 1.2 s of continuous forward tilt at 15 Hz.
        for i in 0..18 {
            let sample = frame(50.0, 0.0, i);
            if lockout.is_cooling_down(sample.timestamp) {
                c.suppressed_frame(&sample, &cfg, &mut lockout);
                continue;
            }
            if let Some(m) = c.evaluate(&sample, &cfg, &mut lockout) {
                lockout.engage(m.kind, m.timestamp, &cfg.timing);
                fires.push(m.timestamp);
            }
        }
        assert_eq!(fires.len(), 1);
    }

    #[test]
    fn test_release_rearms_same_rule() {
        let cfg = only(GestureRule::Pass);
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();
        let mut fires = 0;

        let script: Vec<f64> = std::iter::repeat(50.0)
            .take(3)
            .chain(std::iter::repeat(0.0).take(12))
            .chain(std::iter::repeat(50.0).take(3))
            .collect();
        for (i, beta) in script.into_iter().enumerate() {
            let sample = frame(beta, 0.0, i);
            if lockout.is_cooling_down(sample.timestamp) {
                c.suppressed_frame(&sample, &cfg, &mut lockout);
                continue;
            }
            if let Some(m) = c.evaluate(&sample, &cfg, &mut lockout) {
                lockout.engage(m.kind, m.timestamp, &cfg.timing);
                fires += 1;
            }
        }
        assert_eq!(fires, 2);
    }

    #[test]
    fn test_evaluation_order_breaks_ties() {
        // A large two-axis deviation is both a foul and (with widened bounds) a corner.
        let mut cfg = ThresholdConfig::all_disabled();
        cfg.foul.enabled = true;
        cfg.corner.enabled = true;
        cfg.corner.max_deg = 90.0;
        cfg.corner.hold_frames = cfg.foul.hold_frames;
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();
        let mut result = None;
        for i in 0..cfg.foul.hold_frames as usize {
            result = c.evaluate(&frame(70.0, 70.0, i), &cfg, &mut lockout);
        }
        assert_eq!(result.map(|m| m.kind), Some(EventKind::Foul));
    }

    #[test]
    fn test_voice_tag_ignores_baseline() {
        let cfg = only(GestureRule::VoiceTag);
        let base = GestureSample::new(170.0, 0.0, 0.0);
        let current = GestureSample::new(-175.0, 0.0, 0.1);
        assert!(GestureRule::VoiceTag.matches(&current, &base, None, &cfg));
    }

    #[test]
    fn test_directional_predicates() {
        let cfg = ThresholdConfig::default();
        let base = GestureSample::new(45.0, 0.0, 0.0);
        let fwd = GestureSample::new(90.0, 5.0, 0.1);
        let back = GestureSample::new(0.0, -5.0, 0.1);
        let left = GestureSample::new(45.0, -40.0, 0.1);
        let right = GestureSample::new(45.0, 40.0, 0.1);
        assert!(GestureRule::Pass.matches(&fwd, &base, None, &cfg));
        assert!(!GestureRule::Shot.matches(&fwd, &base, None, &cfg));
        assert!(GestureRule::Shot.matches(&back, &base, None, &cfg));
        assert!(GestureRule::Tackle.matches(&left, &base, None, &cfg));
        assert!(GestureRule::Offside.matches(&right, &base, None, &cfg));
        assert!(!GestureRule::Offside.matches(&left, &base, None, &cfg));
    }

    #[test]
    fn test_pass_respects_upper_bound_and_cross_axis() {
        let cfg = ThresholdConfig::default();
        let base = GestureSample::new(0.0, 0.0, 0.0);
        assert!(!GestureRule::Pass.matches(&GestureSample::new(90.0, 0.0, 0.1), &base, None, &cfg));
        assert!(!GestureRule::Pass.matches(&GestureSample::new(50.0, 30.0, 0.1), &base, None, &cfg));
        assert!(GestureRule::Pass.matches(&GestureSample::new(40.0, 0.0, 0.1), &base, None, &cfg));
    }

    #[test]
    fn test_substitution_needs_flat_and_still() {
        let cfg = ThresholdConfig::default();
        let base = GestureSample::new(45.0, 0.0, 0.0);
        let prev = GestureSample::new(1.0, 1.0, 0.0);
        let flat = GestureSample::new(1.5, 0.5, 0.1);
        let moving = GestureSample::new(8.0, -8.0, 0.1);
        assert!(GestureRule::Substitution.matches(&flat, &base, Some(&prev), &cfg));
        assert!(!GestureRule::Substitution.matches(&flat, &base, None, &cfg));
        assert!(!GestureRule::Substitution.matches(&moving, &base, Some(&prev), &cfg));
    }

    #[test]
    fn test_disabled_rule_never_matches() {
        let mut cfg = ThresholdConfig::all_disabled();
        cfg.pass.min_deg = 0.0;
        cfg.pass.hold_frames = 1;
        let mut c = classifier_at_rest();
        let mut lockout = Lockout::new();
        for i in 0..20 {
            assert!(c.evaluate(&frame(50.0, 0.0, i), &cfg, &mut lockout).is_none());
        }
    }

    #[test]
    fn test_angle_delta_wraps() {
        assert_abs_diff_eq!(angle_delta(-170.0, 170.0), 20.0);
        assert_abs_diff_eq!(angle_delta(170.0, -170.0), -20.0);
        assert_abs_diff_eq!(angle_delta(40.0, 0.0), 40.0);
    }
}
