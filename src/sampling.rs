use crate::config::SamplingConfig;

/// Fraction of the nominal period that must elapse before the next frame is
/// admitted. Leaves room for callback jitter on hosts running near the target rate.
const MIN_PERIOD_FRACTION: f64 = 0.8;

/// Downsamples the host callback stream to the processing rate.
///
/// A frame passes when the callback counter hits the divisor and enough time has
/// passed since the last admitted frame, so the effective rate stays close to
/// `target_hz` whatever the host's native rate is.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    seen: u64,
    admitted: u64,
    last_admitted: Option<f64>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, timestamp: f64, cfg: &SamplingConfig) -> bool {
        self.seen += 1;
        let divisor = cfg.frame_divisor.max(1) as u64;
        if self.seen % divisor != 0 {
            return false;
        }
        if let Some(last) = self.last_admitted {
            if cfg.target_hz > 0.0 && timestamp - last < MIN_PERIOD_FRACTION / cfg.target_hz {
                return false;
            }
        }
        self.last_admitted = Some(timestamp);
        self.admitted += 1;
        true
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(native_hz: f64, seconds: f64, cfg: &SamplingConfig) -> u64 {
        let mut limiter = RateLimiter::new();
        let frames = (native_hz * seconds) as usize;
        (0..frames)
            .filter(|&i| limiter.admit(i as f64 / native_hz, cfg))
            .count() as u64
    }

    #[test]
    fn test_60hz_host_downsampled_to_15hz() {
        let admitted = run(60.0, 2.0, &SamplingConfig::default());
        assert!((29..=31).contains(&admitted), "admitted {admitted}");
    }

    #[test]
    fn test_slow_host_keeps_every_frame() {
        let admitted = run(10.0, 2.0, &SamplingConfig::default());
        assert_eq!(admitted, 20);
    }

    #[test]
    fn test_frame_divisor_without_time_gate() {
        let cfg = SamplingConfig {
            target_hz: 0.0,
            frame_divisor: 4,
        };
        let admitted = run(60.0, 1.0, &cfg);
        assert_eq!(admitted, 15);
    }

    #[test]
    fn test_counters_and_reset() {
        let cfg = SamplingConfig::default();
        let mut limiter = RateLimiter::new();
        assert!(limiter.admit(0.0, &cfg));
        assert!(!limiter.admit(0.01, &cfg));
        assert_eq!(limiter.seen(), 2);
        assert_eq!(limiter.admitted(), 1);
        limiter.reset();
        assert!(limiter.admit(0.02, &cfg));
    }
}
