use serde::{Deserialize, Serialize};

/// Initial error covariance for a freshly seeded filter.
const INITIAL_COVARIANCE: f64 = 1.0;

/// Snapshot of a scalar filter's internals, for diagnostics.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Kalman1DState {
    pub estimate: f64,
    pub error_covariance: f64,
    pub gain: f64,
}

/// Scalar random-walk Kalman filter.
///
/// One instance per tracked axis. Each `update` runs
/// `p += q; k = p / (p + r); x += k * (z - x); p *= 1 - k`.
#[derive(Clone, Debug)]
pub struct Kalman1D {
    q: f64,
    r: f64,
    p: f64,
    x: f64,
    k: f64,
    initialized: bool,
}

impl Kalman1D {
    /// Filter that seeds its estimate with the first measurement it sees.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            q: process_noise,
            r: measurement_noise,
            p: INITIAL_COVARIANCE,
            x: 0.0,
            k: 0.0,
            initialized: false,
        }
    }

    /// Filter with an explicit prior estimate and covariance.
    pub fn with_state(
        initial_estimate: f64,
        initial_covariance: f64,
        process_noise: f64,
        measurement_noise: f64,
    ) -> Self {
        Self {
            q: process_noise,
            r: measurement_noise,
            p: initial_covariance,
            x: initial_estimate,
            k: 0.0,
            initialized: true,
        }
    }

    pub fn update(&mut self, measurement: f64) -> f64 {
        if !self.initialized {
            self.x = measurement;
            self.initialized = true;
            return self.x;
        }

        self.p += self.q;
        self.k = self.p / (self.p + self.r);
        self.x += self.k * (measurement - self.x);
        self.p *= 1.0 - self.k;
        self.x
    }

    pub fn set_noise(&mut self, process_noise: f64, measurement_noise: f64) {
        self.q = process_noise;
        self.r = measurement_noise;
    }

    pub fn reset(&mut self) {
        self.p = INITIAL_COVARIANCE;
        self.x = 0.0;
        self.k = 0.0;
        self.initialized = false;
    }

    pub fn estimate(&self) -> f64 {
        self.x
    }

    pub fn error_covariance(&self) -> f64 {
        self.p
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> Kalman1DState {
        Kalman1DState {
            estimate: self.x,
            error_covariance: self.p,
            gain: self.k,
        }
    }
}

/// Kalman filter over an angle that may wrap.
///
/// Raw readings are moved onto the branch nearest the current estimate before
/// the update, so a reading of -179° after an estimate of 179° is treated as
/// 181°. The output is folded back into the axis range.
#[derive(Clone, Debug)]
pub struct AngleFilter {
    kalman: Kalman1D,
    /// Full period of the axis (360 for beta/alpha), `None` for non-wrapping axes.
    period: Option<f64>,
    /// Lower bound of the output range when wrapping.
    range_start: f64,
    enabled: bool,
    last_output: Option<f64>,
}

impl AngleFilter {
    /// Non-wrapping axis (gamma).
    pub fn linear(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            kalman: Kalman1D::new(process_noise, measurement_noise),
            period: None,
            range_start: 0.0,
            enabled: true,
            last_output: None,
        }
    }

    /// Axis wrapping over `[range_start, range_start + 360)`.
    pub fn circular(process_noise: f64, measurement_noise: f64, range_start: f64) -> Self {
        Self {
            kalman: Kalman1D::new(process_noise, measurement_noise),
            period: Some(360.0),
            range_start,
            enabled: true,
            last_output: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.kalman.reset();
        }
        self.enabled = enabled;
    }

    pub fn set_noise(&mut self, process_noise: f64, measurement_noise: f64) {
        self.kalman.set_noise(process_noise, measurement_noise);
    }

    pub fn update(&mut self, raw_degrees: f64) -> f64 {
        let output = if !self.enabled {
            raw_degrees
        } else {
            match self.period {
                None => self.kalman.update(raw_degrees),
                Some(period) => {
                    let measurement = if self.kalman.is_initialized() {
                        unwrap_near(raw_degrees, self.kalman.estimate(), period)
                    } else {
                        raw_degrees
                    };
                    let estimate = self.kalman.update(measurement);
                    // Keep the internal estimate bounded so long sessions do not drift
                    // across many periods.
                    let folded = wrap_into(estimate, self.range_start, period);
                    if (folded - estimate).abs() > f64::EPSILON {
                        let p = self.kalman.error_covariance();
                        let (q, r) = (self.kalman.q, self.kalman.r);
                        self.kalman = Kalman1D::with_state(folded, p, q, r);
                    }
                    folded
                }
            }
        };
        self.last_output = Some(output);
        output
    }

    pub fn last_output(&self) -> Option<f64> {
        self.last_output
    }

    pub fn reset(&mut self) {
        self.kalman.reset();
        self.last_output = None;
    }

    pub fn kalman(&self) -> &Kalman1D {
        &self.kalman
    }
}

/// Shift `value` by whole periods so it lies within half a period of `reference`.
fn unwrap_near(value: f64, reference: f64, period: f64) -> f64 {
    let turns = ((reference - value) / period).round();
    value + turns * period
}

fn wrap_into(value: f64, start: f64, period: f64) -> f64 {
    (value - start).rem_euclid(period) + start
}
