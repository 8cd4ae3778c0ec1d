/// First-order low-pass filter over a three-component vector.
///
/// The first input passes through unchanged and seeds the filter.
#[derive(Clone, Debug)]
pub struct LowPassFilter {
    alpha: f64,
    last_output: [f64; 3],
    initialized: bool,
}

impl LowPassFilter {
    pub fn new(cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        let dt = 1.0 / sample_rate_hz;
        let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz);
        let alpha = dt / (rc + dt);
        Self::with_alpha(alpha)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            last_output: [0.0; 3],
            initialized: false,
        }
    }

    pub fn update(&mut self, input: [f64; 3]) -> [f64; 3] {
        if !self.initialized {
            self.last_output = input;
            self.initialized = true;
            return input;
        }
        for (out, value) in self.last_output.iter_mut().zip(input.iter()) {
            *out = *out * (1.0 - self.alpha) + value * self.alpha;
        }
        self.last_output
    }

    pub fn reset(&mut self) {
        self.last_output = [0.0; 3];
        self.initialized = false;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
