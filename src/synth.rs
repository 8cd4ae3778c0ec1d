// synth.rs - Deterministic orientation trajectories
//
// Stand-in for a real sensor stream: replays the gesture families the engine
// recognises at a chosen native rate, so scenarios can run without a device.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::OrientationSample;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Beta,
    Gamma,
}

/// Appends trajectory segments one after another on a shared clock.
///
/// Every segment is expressed relative to the rest orientation, which starts
/// at `(0, 0)` and can be moved with [`SessionBuilder::rest_at`].
#[derive(Clone, Debug)]
pub struct SessionBuilder {
    rate_hz: f64,
    next_ts: f64,
    rest: (f64, f64),
    jitter_deg: f64,
    frame: u64,
    samples: Vec<OrientationSample>,
}

impl SessionBuilder {
    pub fn new(rate_hz: f64) -> Self {
        Self {
            rate_hz: rate_hz.max(1.0),
            next_ts: 0.0,
            rest: (0.0, 0.0),
            jitter_deg: 0.0,
            frame: 0,
            samples: Vec::new(),
        }
    }

    pub fn starting_at(mut self, timestamp: f64) -> Self {
        self.next_ts = timestamp;
        self
    }

    /// Add hand tremor of roughly `amplitude` degrees to every later sample.
    pub fn jitter(mut self, amplitude: f64) -> Self {
        self.jitter_deg = amplitude.abs();
        self
    }

    pub fn rest_at(mut self, beta: f64, gamma: f64) -> Self {
        self.rest = (beta, gamma);
        self
    }

    fn frames(&self, secs: f64) -> usize {
        (secs * self.rate_hz).round().max(0.0) as usize
    }

    fn emit(&mut self, beta: f64, gamma: f64) {
        let k = self.frame as f64;
        let (jb, jg) = if self.jitter_deg > 0.0 {
            (
                self.jitter_deg * (k * 1.7).sin() * (k * 0.31).cos(),
                self.jitter_deg * (k * 2.3).cos() * (k * 0.53).sin(),
            )
        } else {
            (0.0, 0.0)
        };
        self.samples.push(OrientationSample {
            alpha: Some(wrap_heading(90.0 + 0.5 * k.sin())),
            beta: wrap_beta(beta + jb),
            gamma: (gamma + jg).clamp(-90.0, 90.0),
            timestamp: self.next_ts,
        });
        self.frame += 1;
        self.next_ts += 1.0 / self.rate_hz;
    }

    /// Hold the rest orientation.
    pub fn still(self, secs: f64) -> Self {
        self.offset(0.0, 0.0, secs)
    }

    /// Hold an absolute orientation.
    pub fn hold(mut self, beta: f64, gamma: f64, secs: f64) -> Self {
        for _ in 0..self.frames(secs) {
            self.emit(beta, gamma);
        }
        self
    }

    /// Hold a deviation from rest.
    pub fn offset(self, d_beta: f64, d_gamma: f64, secs: f64) -> Self {
        let (b, g) = self.rest;
        self.hold(b + d_beta, g + d_gamma, secs)
    }

    /// Circle around rest. Positive `turns` go counter-clockwise in (beta, gamma).
    pub fn circle(mut self, radius: f64, period_secs: f64, turns: f64) -> Self {
        let (rb, rg) = self.rest;
        let n = self.frames(period_secs * turns.abs());
        let dir = turns.signum();
        for i in 0..n {
            let t = i as f64 / self.rate_hz;
            let theta = dir * 2.0 * PI * t / period_secs;
            self.emit(rb + radius * theta.cos(), rg + radius * theta.sin());
        }
        self
    }

    /// Two loops side by side on the gamma axis, traced in opposite directions.
    ///
    /// Both loops start and end at rest, so the path crosses itself there.
    pub fn figure_eight(mut self, radius: f64, period_secs: f64) -> Self {
        let (rb, rg) = self.rest;
        let per_loop = self.frames(period_secs / 2.0);
        for i in 0..per_loop {
            let theta = PI + 2.0 * PI * i as f64 / per_loop as f64;
            self.emit(rb + radius * theta.sin(), rg - radius - radius * theta.cos());
        }
        for i in 0..per_loop {
            let phi = 2.0 * PI * i as f64 / per_loop as f64;
            self.emit(rb - radius * phi.sin(), rg + radius - radius * phi.cos());
        }
        self
    }

    /// Sinusoidal swing on one axis.
    pub fn zigzag(mut self, axis: Axis, amplitude: f64, cycles: f64, secs: f64) -> Self {
        let (rb, rg) = self.rest;
        for i in 0..self.frames(secs) {
            let t = i as f64 / self.rate_hz;
            let swing = amplitude * (2.0 * PI * cycles * t / secs).sin();
            match axis {
                Axis::Beta => self.emit(rb + swing, rg),
                Axis::Gamma => self.emit(rb, rg + swing),
            }
        }
        self
    }

    /// Fast back-and-forth on the beta axis.
    pub fn shake(self, amplitude: f64, hz: f64, secs: f64) -> Self {
        let cycles = hz * secs;
        self.zigzag(Axis::Beta, amplitude, cycles, secs)
    }

    /// Device turned upside down.
    pub fn inverted(self, secs: f64) -> Self {
        let g = self.rest.1;
        self.hold(179.0, g, secs)
    }

    pub fn build(self) -> Vec<OrientationSample> {
        self.samples
    }
}

fn wrap_beta(beta: f64) -> f64 {
    (beta + 180.0).rem_euclid(360.0) - 180.0
}

fn wrap_heading(alpha: f64) -> f64 {
    alpha.rem_euclid(360.0)
}

/// Ready-made demo gestures, each preceded by a still calibration phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemoGesture {
    Circle,
    FigureEight,
    Zigzag,
    Shake,
    Flick,
    Inverted,
}

impl DemoGesture {
    pub const ALL: [DemoGesture; 6] = [
        DemoGesture::Circle,
        DemoGesture::FigureEight,
        DemoGesture::Zigzag,
        DemoGesture::Shake,
        DemoGesture::Flick,
        DemoGesture::Inverted,
    ];

    pub fn session(self, rate_hz: f64) -> Vec<OrientationSample> {
        let builder = SessionBuilder::new(rate_hz)
            .rest_at(35.0, 0.0)
            .jitter(0.8)
            .still(2.5);
        let builder = match self {
            DemoGesture::Circle => builder.circle(40.0, 2.0, 1.5),
            DemoGesture::FigureEight => builder.figure_eight(40.0, 3.0),
            DemoGesture::Zigzag => builder.zigzag(Axis::Gamma, 40.0, 2.0, 3.0),
            DemoGesture::Shake => builder.shake(60.0, 2.0, 1.0),
            DemoGesture::Flick => builder.offset(60.0, 0.0, 1.5),
            DemoGesture::Inverted => builder.inverted(1.5),
        };
        builder.still(1.5).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_timestamps_follow_rate() {
        let samples = SessionBuilder::new(20.0).starting_at(5.0).still(1.0).build();
        assert_eq!(samples.len(), 20);
        assert_abs_diff_eq!(samples[0].timestamp, 5.0);
        assert_abs_diff_eq!(samples[19].timestamp, 5.95, epsilon = 1e-9);
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_circle_keeps_radius() {
        let samples = SessionBuilder::new(30.0)
            .rest_at(10.0, -5.0)
            .circle(20.0, 2.0, 1.0)
            .build();
        assert_eq!(samples.len(), 60);
        for s in &samples {
            let r = (s.beta - 10.0).hypot(s.gamma + 5.0);
            assert_abs_diff_eq!(r, 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_still_holds_the_rest_orientation() {
        let samples = SessionBuilder::new(15.0).rest_at(35.0, -8.0).still(1.0).build();
        assert_eq!(samples.len(), 15);
        for s in &samples {
            assert_abs_diff_eq!(s.beta, 35.0, epsilon = 1e-9);
            assert_abs_diff_eq!(s.gamma, -8.0, epsilon = 1e-9);
        }

        let moved = SessionBuilder::new(15.0)
            .rest_at(35.0, -8.0)
            .offset(20.0, 0.0, 0.5)
            .still(0.5)
            .build();
        let last = moved.last().expect("samples");
        assert_abs_diff_eq!(last.beta, 35.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.gamma, -8.0, epsilon = 1e-9);
    }

    /// Signed area of a closed polyline in (beta, gamma); the sign gives the turn.
    fn turn_of(samples: &[OrientationSample]) -> f64 {
        samples
            .iter()
            .zip(samples.iter().cycle().skip(1))
            .map(|(a, b)| a.beta * b.gamma - b.beta * a.gamma)
            .sum::<f64>()
    }

    #[test]
    fn test_figure_eight_loops_turn_opposite_ways() {
        let samples = SessionBuilder::new(30.0).figure_eight(20.0, 2.0).build();
        let half = samples.len() / 2;
        let first = turn_of(&samples[..half]);
        let second = turn_of(&samples[half..]);
        assert!(first * second < 0.0, "loops turn {first} and {second}");

        let start = samples[0];
        let crossing = samples[half];
        assert_abs_diff_eq!(start.beta, crossing.beta, epsilon = 1e-9);
        assert_abs_diff_eq!(start.gamma, crossing.gamma, epsilon = 1e-9);
    }

    #[test]
    fn test_figure_eight_loops_are_separated() {
        let samples = SessionBuilder::new(30.0).figure_eight(20.0, 2.0).build();
        let half = samples.len() / 2;
        let mean = |s: &[OrientationSample]| s.iter().map(|p| p.gamma).sum::<f64>() / s.len() as f64;
        assert!(mean(&samples[..half]) < -15.0);
        assert!(mean(&samples[half..]) > 15.0);
    }

    #[test]
    fn test_inverted_wraps_beta() {
        let samples = SessionBuilder::new(15.0).jitter(3.0).inverted(1.0).build();
        assert!(samples.iter().all(|s| (-180.0..180.0).contains(&s.beta)));
        assert!(samples.iter().all(|s| s.beta.abs() > 170.0));
    }

    #[test]
    fn test_every_demo_is_non_empty() {
        for demo in DemoGesture::ALL {
            let session = demo.session(60.0);
            assert!(session.len() > 200, "{demo:?}");
            assert!(session.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
        }
    }
}
