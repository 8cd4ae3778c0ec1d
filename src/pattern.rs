// pattern.rs - Shape-based gesture matching over a rolling time window
//
// The detector owns the only multi-sample history in the engine. Points are
// pruned by timestamp on every push, so the matchers never see anything older
// than `patterns.window_ms`. Each matcher is a pure function of the window
// contents and its threshold group.
//
// A circle and the first loop of a figure-eight look the same until the second
// loop starts, so while the figure-eight matcher is enabled an accepted circle
// is held rather than emitted. A second loop turning the other way beside it
// upgrades the held circle to a figure-eight; otherwise the circle is released
// once the path settles or `figure_eight.hold_ms` runs out.

use std::collections::VecDeque;
use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::classifier::angle_delta;
use crate::config::{
    CircularThresholds, FigureEightThresholds, PatternConfig, ShakePatternThresholds,
    TimingConfig, ZigzagThresholds,
};
use crate::lockout::Lockout;
use crate::types::{EventKind, PatternPoint};

/// Each half of a figure-eight needs at least this many points to fit a circle.
const MIN_HALF_POINTS: usize = 4;

/// Result of fitting the window (or part of it) to a circle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircleFit {
    pub center_beta: f64,
    pub center_gamma: f64,
    pub mean_radius: f64,
    /// `1 - coefficient of variation` of the radii, floored at 0.
    pub consistency: f64,
    /// Swept angle as a fraction of a full revolution (may exceed 1).
    pub coverage: f64,
    /// Signed net rotation in revolutions, positive from beta towards gamma.
    pub turn: f64,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PatternMetrics {
    Circle(CircleFit),
    FigureEight {
        first: CircleFit,
        second: CircleFit,
        separation_deg: f64,
    },
    Zigzag {
        extrema: u32,
    },
    Shake {
        fast_samples: u32,
        reversals: u32,
    },
}

/// Matcher output with the path that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternMatch {
    pub kind: EventKind,
    pub confidence: f64,
    pub timestamp: f64,
    pub metrics: PatternMetrics,
    pub path: Vec<(f64, f64)>,
}

impl PatternMatch {
    pub fn describe(&self) -> String {
        match &self.metrics {
            PatternMetrics::Circle(fit) => format!("Circular motion (r={:.1}°)", fit.mean_radius),
            PatternMetrics::FigureEight { separation_deg, .. } => {
                format!("Figure-eight (lobes {:.1}° apart)", separation_deg)
            }
            PatternMetrics::Zigzag { extrema } => format!("Zigzag ({} direction changes)", extrema),
            PatternMetrics::Shake { fast_samples, .. } => {
                format!("Shake ({} fast samples)", fast_samples)
            }
        }
    }
}

/// An accepted circle waiting to see whether a second loop follows.
#[derive(Clone, Debug)]
struct HeldLoop {
    best: PatternMatch,
    fit: CircleFit,
    first_seen: f64,
    last_seen: f64,
}

pub struct PatternDetector {
    window: VecDeque<PatternPoint>,
    /// Last pushed angles, kept across `clear` so velocity stays continuous.
    last: Option<(f64, f64, f64)>,
    held: Option<HeldLoop>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(64),
            last: None,
            held: None,
        }
    }

    /// Append a smoothed sample and evict everything older than `window_ms`.
    ///
    /// Velocity is the angular distance to the previous sample over the actual
    /// elapsed time; a zero or negative gap gives velocity 0.
    pub fn push(&mut self, beta: f64, gamma: f64, timestamp: f64, window_ms: u64) {
        let velocity = match self.last {
            Some((pb, pg, pt)) if timestamp > pt => {
                let db = angle_delta(beta, pb);
                let dg = gamma - pg;
                (db * db + dg * dg).sqrt() / (timestamp - pt)
            }
            _ => 0.0,
        };
        self.last = Some((beta, gamma, timestamp));
        self.window.push_back(PatternPoint {
            beta,
            gamma,
            timestamp,
            velocity,
        });
        self.evict(timestamp, window_ms);
    }

    fn evict(&mut self, now: f64, window_ms: u64) {
        let window = window_ms as f64 / 1000.0;
        while let Some(front) = self.window.front() {
            if now - front.timestamp > window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &PatternPoint> {
        self.window.iter()
    }

    /// Drop the window and any held circle. Velocity continuity is kept.
    pub fn clear(&mut self) {
        self.window.clear();
        self.held = None;
    }

    pub fn reset(&mut self) {
        self.clear();
        self.last = None;
    }

    /// A circle is being held back in case it turns into a figure-eight.
    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    /// The newest `min_points` points all move faster than `min_velocity`.
    pub fn is_sweeping(&self, min_velocity: f64, min_points: usize) -> bool {
        min_points > 0
            && self.window.len() >= min_points
            && self
                .window
                .iter()
                .rev()
                .take(min_points)
                .all(|p| p.velocity > min_velocity)
    }

    /// Run every enabled matcher and return the best one above the acceptance
    /// threshold whose kind the lockout permits.
    ///
    /// Returns `None` while a circle is held; check [`is_holding`](Self::is_holding).
    pub fn evaluate(
        &mut self,
        cfg: &PatternConfig,
        timing: &TimingConfig,
        lockout: &Lockout,
        now: f64,
    ) -> Option<PatternMatch> {
        let best = self.best_match(cfg, timing, lockout, now);
        let holds_circles = cfg.figure_eight.enabled && cfg.figure_eight.hold_ms > 0;
        if !holds_circles {
            self.held = None;
            return best;
        }
        let hold = cfg.figure_eight.hold_ms as f64 / 1000.0;

        match best {
            Some(found) if found.kind == EventKind::Circular => {
                let fit = match &found.metrics {
                    PatternMetrics::Circle(fit) => *fit,
                    _ => return Some(found),
                };
                let held = match self.held.take() {
                    Some(mut held) => {
                        if found.confidence >= held.best.confidence {
                            held.best = found;
                            held.fit = fit;
                        }
                        held.last_seen = now;
                        held
                    }
                    None => {
                        debug!("holding circle ({:.3}) for a possible second loop", found.confidence);
                        HeldLoop {
                            best: found,
                            fit,
                            first_seen: now,
                            last_seen: now,
                        }
                    }
                };
                if now - held.first_seen >= hold {
                    return Some(release(held, now));
                }
                self.held = Some(held);
                None
            }
            Some(found) => {
                self.held = None;
                Some(found)
            }
            None => {
                let held = self.held.take()?;
                let settled = self.window.len() >= 2
                    && self
                        .window
                        .iter()
                        .rev()
                        .take(2)
                        .all(|p| p.velocity < cfg.figure_eight.settle_velocity_deg_s);
                if settled || now - held.first_seen >= hold {
                    return Some(release(held, now));
                }
                self.held = Some(held);
                None
            }
        }
    }

    fn best_match(
        &mut self,
        cfg: &PatternConfig,
        timing: &TimingConfig,
        lockout: &Lockout,
        now: f64,
    ) -> Option<PatternMatch> {
        if self.window.len() < cfg.min_samples.max(1) {
            return None;
        }
        let held = self.held.as_ref().map(|h| (h.fit, h.last_seen));
        let points = self.window.make_contiguous();

        let mut candidates: Vec<(EventKind, f64, PatternMetrics)> = Vec::with_capacity(5);
        if cfg.circular.enabled {
            if let Some(fit) = match_circle(points, &cfg.circular) {
                candidates.push((EventKind::Circular, fit.confidence, PatternMetrics::Circle(fit)));
            }
        }
        if cfg.figure_eight.enabled {
            if let Some((conf, metrics)) =
                match_figure_eight(points, &cfg.circular, &cfg.figure_eight)
            {
                candidates.push((EventKind::Figure8, conf, metrics));
            }
            if let Some((first, since)) = held {
                // Only the path after the held loop was last seen can be the second loop.
                let split = points.partition_point(|p| p.timestamp <= since);
                let min_tail = MIN_HALF_POINTS.max(cfg.min_samples / 2);
                if points.len() - split >= min_tail {
                    if let Some((conf, metrics)) = match_second_loop(
                        first,
                        &points[split..],
                        &cfg.circular,
                        &cfg.figure_eight,
                    ) {
                        candidates.push((EventKind::Figure8, conf, metrics));
                    }
                }
            }
        }
        if cfg.zigzag.enabled {
            if let Some((conf, extrema)) = match_zigzag(points, &cfg.zigzag) {
                candidates.push((EventKind::Zigzag, conf, PatternMetrics::Zigzag { extrema }));
            }
        }
        if cfg.shake.enabled {
            if let Some((conf, fast_samples, reversals)) = match_shake(points, &cfg.shake) {
                candidates.push((
                    EventKind::Shake,
                    conf,
                    PatternMetrics::Shake {
                        fast_samples,
                        reversals,
                    },
                ));
            }
        }

        for (kind, conf, _) in &candidates {
            debug!("pattern {} scored {:.3} over {} points", kind, conf, points.len());
        }

        let (kind, confidence, metrics) = candidates
            .into_iter()
            .filter(|(kind, _, _)| lockout.permits(*kind, now, timing))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        if confidence <= cfg.acceptance {
            return None;
        }

        Some(PatternMatch {
            kind,
            confidence,
            timestamp: now,
            metrics,
            path: points.iter().map(|p| (p.beta, p.gamma)).collect(),
        })
    }
}

fn release(held: HeldLoop, now: f64) -> PatternMatch {
    debug!("releasing held circle after {:.2}s", now - held.first_seen);
    PatternMatch {
        timestamp: now,
        ..held.best
    }
}

// ─── Matchers ────────────────────────────────────────────────────────────────

/// Circle fit around the centroid. `None` unless radius, consistency and
/// coverage all clear their thresholds.
pub fn match_circle(points: &[PatternPoint], cfg: &CircularThresholds) -> Option<CircleFit> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len() as f64;
    let center_beta = points.iter().map(|p| p.beta).sum::<f64>() / n;
    let center_gamma = points.iter().map(|p| p.gamma).sum::<f64>() / n;

    let radii: Vec<f64> = points
        .iter()
        .map(|p| (p.beta - center_beta).hypot(p.gamma - center_gamma))
        .collect();
    let mean_radius = radii.iter().sum::<f64>() / n;
    if mean_radius < cfg.min_radius_deg || mean_radius <= f64::EPSILON {
        return None;
    }
    let variance = radii.iter().map(|r| (r - mean_radius).powi(2)).sum::<f64>() / n;
    let consistency = (1.0 - variance.sqrt() / mean_radius).max(0.0);

    let mut swept = 0.0;
    let mut net = 0.0;
    let mut prev_angle: Option<f64> = None;
    for p in points {
        let angle = (p.gamma - center_gamma).atan2(p.beta - center_beta);
        if let Some(prev) = prev_angle {
            let step = wrap_pi(angle - prev);
            swept += step.abs();
            net += step;
        }
        prev_angle = Some(angle);
    }
    let coverage = swept / (2.0 * PI);

    if consistency <= cfg.min_consistency || coverage < cfg.min_coverage {
        return None;
    }

    Some(CircleFit {
        center_beta,
        center_gamma,
        mean_radius,
        consistency,
        coverage,
        turn: net / (2.0 * PI),
        confidence: (consistency * coverage.min(1.0)).min(cfg.max_confidence),
    })
}

fn wrap_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Two circles, one per half of the window, turning opposite ways with well
/// separated centres.
pub fn match_figure_eight(
    points: &[PatternPoint],
    circle: &CircularThresholds,
    cfg: &FigureEightThresholds,
) -> Option<(f64, PatternMetrics)> {
    let mid = points.len() / 2;
    if mid < MIN_HALF_POINTS || points.len() - mid < MIN_HALF_POINTS {
        return None;
    }
    let first = match_circle(&points[..mid], circle)?;
    let second = match_circle(&points[mid..], circle)?;
    pair_loops(first, second, cfg)
}

/// Fit `tail` as the loop following an already accepted `first` loop.
fn match_second_loop(
    first: CircleFit,
    tail: &[PatternPoint],
    circle: &CircularThresholds,
    cfg: &FigureEightThresholds,
) -> Option<(f64, PatternMetrics)> {
    let second = match_circle(tail, circle)?;
    pair_loops(first, second, cfg)
}

fn pair_loops(
    first: CircleFit,
    second: CircleFit,
    cfg: &FigureEightThresholds,
) -> Option<(f64, PatternMetrics)> {
    if first.turn * second.turn >= 0.0 {
        return None;
    }
    let separation_deg =
        (first.center_beta - second.center_beta).hypot(first.center_gamma - second.center_gamma);
    if separation_deg <= cfg.min_separation_deg {
        return None;
    }
    let confidence = (first.confidence + second.confidence) / 2.0;
    Some((
        confidence,
        PatternMetrics::FigureEight {
            first,
            second,
            separation_deg,
        },
    ))
}

/// Direction changes along the axis with the larger range. Paths that also
/// spread widely on the other axis (loops, diagonals) are not zigzags.
pub fn match_zigzag(points: &[PatternPoint], cfg: &ZigzagThresholds) -> Option<(f64, u32)> {
    let beta_range = span(points.iter().map(|p| p.beta));
    let gamma_range = span(points.iter().map(|p| p.gamma));
    let (main, cross, on_gamma) = if gamma_range >= beta_range {
        (gamma_range, beta_range, true)
    } else {
        (beta_range, gamma_range, false)
    };
    if main <= 0.0 || cross > cfg.max_cross_ratio * main {
        return None;
    }
    let extrema = if on_gamma {
        count_extrema(points.iter().map(|p| p.gamma), cfg.min_amplitude_deg)
    } else {
        count_extrema(points.iter().map(|p| p.beta), cfg.min_amplitude_deg)
    };
    if extrema < cfg.min_extrema {
        return None;
    }
    let confidence = (cfg.base_confidence + cfg.confidence_per_extremum * extrema as f64)
        .min(cfg.max_confidence);
    Some((confidence, extrema))
}

fn span(values: impl Iterator<Item = f64>) -> f64 {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    (hi - lo).max(0.0)
}

/// Three-point peak/valley count. An extremum only counts if it is at least
/// `min_amplitude` away from the previously counted one (or the first value).
fn count_extrema(series: impl Iterator<Item = f64>, min_amplitude: f64) -> u32 {
    let values: Vec<f64> = series.collect();
    if values.len() < 3 {
        return 0;
    }
    let mut reference = values[0];
    let mut count = 0;
    for w in values.windows(3) {
        let (a, b, c) = (w[0], w[1], w[2]);
        let peak = b > a && b >= c;
        let valley = b < a && b <= c;
        if (peak || valley) && (b - reference).abs() >= min_amplitude {
            count += 1;
            reference = b;
        }
    }
    count
}

/// Fast samples anywhere in the window, moving back and forth.
///
/// Returns `(confidence, fast samples, reversals)`. A reversal is a pair of
/// consecutive fast steps pointing in opposing directions, so one quick swing
/// to a new pose never counts as a shake.
pub fn match_shake(
    points: &[PatternPoint],
    cfg: &ShakePatternThresholds,
) -> Option<(f64, u32, u32)> {
    let fast = points
        .iter()
        .filter(|p| p.velocity > cfg.min_velocity_deg_s)
        .count() as u32;
    if fast < cfg.min_fast_samples {
        return None;
    }

    let steps: Vec<(f64, f64)> = points
        .windows(2)
        .filter(|w| w[1].velocity > cfg.min_velocity_deg_s)
        .map(|w| (angle_delta(w[1].beta, w[0].beta), w[1].gamma - w[0].gamma))
        .collect();
    let reversals = steps
        .windows(2)
        .filter(|s| s[0].0 * s[1].0 + s[0].1 * s[1].1 < 0.0)
        .count() as u32;
    if reversals < cfg.min_reversals {
        return None;
    }

    let confidence =
        (cfg.base_confidence + cfg.confidence_per_sample * fast as f64).min(cfg.max_confidence);
    Some((confidence, fast, reversals))
}
