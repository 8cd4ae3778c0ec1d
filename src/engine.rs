// engine.rs - Gesture recognition pipeline for Pitch Motion
//
// Everything in this module is independent of:
//   - the sensor source (browser callback, recorded log, synthetic trajectory)
//   - the UI, toasts and haptics
//   - where configuration is persisted
//
// Orientation samples go in, classified events come out. All mutable state
// (filters, baseline, hysteresis counters, pattern window, cooldown) lives in
// one `GestureEngine` and is only touched from `process`, so a host just has
// to avoid calling it reentrantly.

use log::{debug, info, warn};

use crate::arbiter::arbitrate;
use crate::calibration::{BaselineCalibrator, JitterZone, LearningOutcome};
use crate::classifier::InstantClassifier;
use crate::config::ThresholdConfig;
use crate::diagnostics::{current_timestamp, EngineDiagnostics};
use crate::error::Result;
use crate::filters::{AngleFilter, LowPassFilter};
use crate::lockout::Lockout;
use crate::pattern::PatternDetector;
use crate::sampling::RateLimiter;
use crate::sink::EventSink;
use crate::store::{ConfigStore, KeyValueStore};
use crate::types::{
    tilt_vector, ClassifiedEvent, EventKind, EventSource, GestureSample, OrientationSample,
};

// ─── Smoothing stage ─────────────────────────────────────────────────────────

struct Smoother {
    beta: AngleFilter,
    gamma: AngleFilter,
    alpha: AngleFilter,
    tilt: LowPassFilter,
}

impl Smoother {
    fn new(config: &ThresholdConfig) -> Self {
        let f = &config.filter;
        let mut smoother = Self {
            beta: AngleFilter::circular(f.process_noise, f.measurement_noise, -180.0),
            gamma: AngleFilter::linear(f.process_noise, f.measurement_noise),
            alpha: AngleFilter::circular(f.process_noise, f.measurement_noise, 0.0),
            tilt: LowPassFilter::with_alpha(f.tilt_alpha),
        };
        smoother.apply(config);
        smoother
    }

    fn apply(&mut self, config: &ThresholdConfig) {
        let f = &config.filter;
        for filter in [&mut self.beta, &mut self.gamma, &mut self.alpha] {
            filter.set_noise(f.process_noise, f.measurement_noise);
            filter.set_enabled(f.enabled);
        }
        self.tilt = LowPassFilter::with_alpha(f.tilt_alpha);
    }

    fn update(&mut self, raw: &OrientationSample) -> GestureSample {
        let beta = self.beta.update(raw.beta);
        let gamma = self.gamma.update(raw.gamma);
        let alpha = raw.alpha.map(|a| self.alpha.update(a));
        let tilt = self.tilt.update(tilt_vector(beta, gamma));
        GestureSample {
            beta,
            gamma,
            alpha,
            timestamp: raw.timestamp,
            tilt,
        }
    }

    fn reset(&mut self) {
        self.beta.reset();
        self.gamma.reset();
        self.alpha.reset();
        self.tilt.reset();
    }
}

// ─── The engine ──────────────────────────────────────────────────────────────

pub struct GestureEngine {
    config: ThresholdConfig,
    active: bool,

    // Signal path
    limiter: RateLimiter,
    smoother: Smoother,

    // Detection
    calibrator: BaselineCalibrator,
    classifier: InstantClassifier,
    patterns: PatternDetector,
    lockout: Lockout,

    // Bookkeeping
    last_ts: Option<f64>,
    latest: Option<GestureSample>,
    last_event: Option<EventKind>,
    frames_dropped: u64,
    events_emitted: u64,
}

impl GestureEngine {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            smoother: Smoother::new(&config),
            calibrator: BaselineCalibrator::new(config.calibration.clone()),
            limiter: RateLimiter::new(),
            classifier: InstantClassifier::new(),
            patterns: PatternDetector::new(),
            lockout: Lockout::new(),
            active: false,
            last_ts: None,
            latest: None,
            last_event: None,
            frames_dropped: 0,
            events_emitted: 0,
            config,
        }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Replace the configuration wholesale. Partial matches are dropped; the
    /// baseline, zone and cooldown survive.
    pub fn set_config(&mut self, config: ThresholdConfig) {
        self.smoother.apply(&config);
        self.calibrator.set_config(config.calibration.clone());
        self.classifier.reset_counters();
        self.config = config;
    }

    // ── Configuration control ────────────────────────────────────────────

    pub fn load_config<S: KeyValueStore>(&mut self, store: &ConfigStore<S>) {
        self.set_config(store.load());
    }

    pub fn save_config<S: KeyValueStore>(&self, store: &mut ConfigStore<S>) -> Result<()> {
        store.save(&self.config)
    }

    pub fn reset_config<S: KeyValueStore>(&mut self, store: &mut ConfigStore<S>) -> Result<()> {
        let defaults = store.reset()?;
        self.set_config(defaults);
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Start detecting from a clean slate. Learns a new zone first when
    /// `calibration.learn_on_activate` is set.
    pub fn activate(&mut self) {
        self.reset_detection();
        self.active = true;
        info!("Gesture detection active");
        if self.config.calibration.learn_on_activate {
            self.start_learning();
        }
    }

    /// Pause detection. Learning in flight is cancelled; the zone is kept.
    pub fn deactivate(&mut self) {
        self.calibrator.cancel_learning();
        self.reset_detection();
        self.active = false;
        info!("Gesture detection paused");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn reset_detection(&mut self) {
        self.classifier.reset();
        self.patterns.reset();
        self.lockout.reset();
        self.limiter.reset();
        self.smoother.reset();
        self.last_ts = None;
        self.latest = None;
    }

    /// Drop everything, including the learned zone.
    pub fn reset(&mut self) {
        self.calibrator = BaselineCalibrator::new(self.config.calibration.clone());
        self.reset_detection();
        self.active = false;
        self.last_event = None;
        self.frames_dropped = 0;
        self.events_emitted = 0;
    }

    // ── Calibration control ──────────────────────────────────────────────

    pub fn start_learning(&mut self) {
        self.calibrator.start_learning();
        self.classifier.reset();
        self.patterns.clear();
    }

    pub fn cancel_learning(&mut self) {
        self.calibrator.cancel_learning();
        self.classifier.clear_base();
    }

    pub fn is_learning(&self) -> bool {
        self.calibrator.is_learning()
    }

    pub fn learning_progress(&self) -> f64 {
        self.calibrator.learning_progress()
    }

    pub fn current_zone(&self) -> Option<JitterZone> {
        self.calibrator.current_zone()
    }

    /// Restore a zone from an earlier session. The base is re-captured from its
    /// centre on the next frame.
    pub fn install_zone(&mut self, zone: JitterZone) {
        self.calibrator.install_zone(zone);
        self.classifier.clear_base();
    }

    // ── Processing ───────────────────────────────────────────────────────

    /// Feed one raw sample. Returns the event emitted on this frame, if any.
    pub fn process(&mut self, raw: &OrientationSample) -> Option<ClassifiedEvent> {
        if !self.active && !self.calibrator.is_learning() {
            return None;
        }

        if !raw.is_finite() {
            self.frames_dropped += 1;
            debug!("Dropped non-finite sample at {}", raw.timestamp);
            return None;
        }
        if let Some(last) = self.last_ts {
            if raw.timestamp <= last {
                self.frames_dropped += 1;
                debug!("Dropped out-of-order sample {} <= {}", raw.timestamp, last);
                return None;
            }
        }
        if !self.limiter.admit(raw.timestamp, &self.config.sampling) {
            return None;
        }
        self.last_ts = Some(raw.timestamp);

        let sample = self.smoother.update(raw);
        self.latest = Some(sample);
        let now = sample.timestamp;

        if self.calibrator.is_learning() {
            self.feed_learning(&sample);
            return None;
        }
        if !self.active {
            return None;
        }

        self.patterns
            .push(sample.beta, sample.gamma, now, self.config.patterns.window_ms);

        if self.classifier.base().is_none() {
            let base = match self.calibrator.current_zone() {
                Some(zone) => zone_base(&zone, now),
                None => sample,
            };
            debug!("Base captured at ({:.1}, {:.1})", base.beta, base.gamma);
            self.classifier.set_base(base);
            self.classifier.rest_frame(&sample, &mut self.lockout);
            return None;
        }

        if self.lockout.is_cooling_down(now) {
            self.classifier
                .suppressed_frame(&sample, &self.config, &mut self.lockout);
            return None;
        }

        let acceptance = self.config.patterns.acceptance;
        let pattern = self
            .patterns
            .evaluate(&self.config.patterns, &self.config.timing, &self.lockout, now);

        // Held circles and fast sweeps suppress the instant rules.
        let holding = self.patterns.is_holding();
        let sweeping = self.patterns.is_sweeping(
            self.config.patterns.sweep_velocity_deg_s,
            self.config.patterns.sweep_min_points,
        );
        let instant = if pattern.is_some() || holding {
            self.classifier
                .suppressed_frame(&sample, &self.config, &mut self.lockout);
            None
        } else if !self.calibrator.is_outside(sample.beta, sample.gamma) {
            self.classifier.rest_frame(&sample, &mut self.lockout);
            None
        } else if sweeping {
            self.classifier
                .suppressed_frame(&sample, &self.config, &mut self.lockout);
            None
        } else {
            self.classifier
                .evaluate(&sample, &self.config, &mut self.lockout)
        };
        if holding {
            return None;
        }

        let event = arbitrate(instant, pattern, acceptance)?;
        self.lockout
            .engage(event.kind, event.timestamp, &self.config.timing);
        if event.source == EventSource::Pattern {
            self.patterns.clear();
        }
        self.classifier.reset_counters();
        self.last_event = Some(event.kind);
        self.events_emitted += 1;
        info!(
            "{} ({:.2}) at {:.3}s: {}",
            event.kind, event.confidence, event.timestamp, event.description
        );
        Some(event)
    }

    /// Like [`process`](Self::process), delivering the event to `sink`.
    pub fn process_into<K: EventSink + ?Sized>(
        &mut self,
        raw: &OrientationSample,
        sink: &mut K,
    ) -> bool {
        match self.process(raw) {
            Some(event) => {
                sink.deliver(event);
                true
            }
            None => false,
        }
    }

    /// Feed a whole recorded or synthetic session. Returns the number of events.
    pub fn run<'a, I, K>(&mut self, samples: I, sink: &mut K) -> usize
    where
        I: IntoIterator<Item = &'a OrientationSample>,
        K: EventSink + ?Sized,
    {
        samples
            .into_iter()
            .filter(|s| self.process_into(s, sink))
            .count()
    }

    fn feed_learning(&mut self, sample: &GestureSample) {
        match self
            .calibrator
            .observe(sample.beta, sample.gamma, sample.timestamp)
        {
            LearningOutcome::Completed(zone) => {
                self.classifier.set_base(zone_base(&zone, sample.timestamp));
                self.patterns.clear();
            }
            LearningOutcome::Aborted { samples } => {
                warn!("Learning kept the previous zone after {samples} samples");
                self.classifier.clear_base();
            }
            LearningOutcome::Collecting { .. } | LearningOutcome::Idle => {}
        }
    }

    // ── Diagnostics ──────────────────────────────────────────────────────

    pub fn latest_sample(&self) -> Option<&GestureSample> {
        self.latest.as_ref()
    }

    pub fn pattern_window_len(&self) -> usize {
        self.patterns.len()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        let now = self.last_ts.unwrap_or(0.0);
        EngineDiagnostics {
            timestamp: current_timestamp(),
            active: self.active,
            learning: self.calibrator.is_learning(),
            learning_progress: self.calibrator.learning_progress(),
            zone: self.calibrator.current_zone(),
            has_base: self.classifier.base().is_some(),
            beta: self.latest.map(|s| s.beta),
            gamma: self.latest.map(|s| s.gamma),
            alpha: self.latest.and_then(|s| s.alpha),
            pattern_window_len: self.patterns.len(),
            cooldown_remaining_ms: self.lockout.remaining_ms(now),
            last_event: self.last_event,
            frames_seen: self.limiter.seen(),
            frames_processed: self.limiter.admitted(),
            frames_dropped: self.frames_dropped,
            events_emitted: self.events_emitted,
        }
    }
}

fn zone_base(zone: &JitterZone, timestamp: f64) -> GestureSample {
    GestureSample::new(zone.center_beta, zone.center_gamma, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::classifier::GestureRule;
    use crate::synth::{Axis, DemoGesture, SessionBuilder};
    use approx::assert_abs_diff_eq;

    const RATE: f64 = 15.0;

    fn unfiltered() -> ThresholdConfig {
        let mut cfg = ThresholdConfig::default();
        cfg.filter.enabled = false;
        cfg
    }

    fn sample(i: usize, beta: f64, gamma: f64) -> OrientationSample {
        OrientationSample::new(beta, gamma, i as f64 / RATE)
    }

    #[test]
    fn test_inactive_engine_ignores_samples() {
        let mut engine = GestureEngine::new(unfiltered());
        for i in 0..30 {
            assert!(engine.process(&sample(i, 60.0, 0.0)).is_none());
        }
        assert_eq!(engine.diagnostics().frames_seen, 0);
    }

    #[test]
    fn test_forward_flick_after_learning_emits_one_pass() {
        let mut engine = GestureEngine::new(unfiltered());
        engine.activate();
        assert!(engine.is_learning());

        for i in 0..=30 {
            assert!(engine.process(&sample(i, 0.0, 0.0)).is_none());
        }
        assert!(!engine.is_learning());
        let zone = engine.current_zone().expect("zone learned");
        assert_abs_diff_eq!(zone.center_beta, 0.0);
        assert_abs_diff_eq!(zone.radius_beta, 5.0);

        let mut emitted = Vec::new();
        for i in 31..35 {
            if let Some(event) = engine.process(&sample(i, 40.0, 0.0)) {
                emitted.push((i, event));
            }
        }
        assert_eq!(emitted.len(), 1, "{emitted:?}");
        let (frame, event) = &emitted[0];
        assert_eq!(*frame, 33);
        assert_eq!(event.kind, EventKind::Pass);
        assert_eq!(event.source, EventSource::Instant);
        assert!((0.9..=0.95).contains(&event.confidence));
    }

    #[test]
    fn test_beta_zigzag_emits_one_zigzag() {
        let mut cfg = ThresholdConfig::all_disabled();
        cfg.patterns.zigzag.enabled = true;
        cfg.calibration.learn_on_activate = false;
        cfg.filter.enabled = false;
        let mut engine = GestureEngine::new(cfg);
        engine.activate();

        let mut events = Vec::new();
        for i in 0..30 {
            let t = i as f64 / RATE;
            let beta = 30.0 * (2.0 * std::f64::consts::PI * 3.0 * t).sin();
            engine.process_into(&OrientationSample::new(beta, 0.0, t), &mut events);
        }
        assert_eq!(events.len(), 1, "{events:?}");
        assert_eq!(events[0].kind, EventKind::Zigzag);
        assert_eq!(events[0].source, EventSource::Pattern);
        assert_abs_diff_eq!(events[0].confidence, 0.8, epsilon = 1e-9);
        assert!(events.iter().all(|e| e.source != EventSource::Instant));
    }

    #[test]
    fn test_circle_emits_circular_with_path() {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        let mut engine = GestureEngine::new(cfg);
        engine.activate();

        let session = SessionBuilder::new(RATE)
            .rest_at(40.0, 0.0)
            .circle(20.0, 1.8, 1.1)
            .still(1.0)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        engine.run(&session, &mut events);

        assert_eq!(events.len(), 1, "{events:?}");
        assert_eq!(events[0].kind, EventKind::Circular);
        assert!(events[0].confidence > 0.7);
        assert!(events[0].description.starts_with("Circular motion"));
        assert!(events[0].supporting_path.as_ref().is_some_and(|p| p.len() >= 10));
    }

    #[test]
    fn test_cooldown_blocks_second_gesture() {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        cfg.patterns = ThresholdConfig::all_disabled().patterns;
        let mut engine = GestureEngine::new(cfg.clone());
        engine.activate();

        // Capture frame, then a forward flick, then an immediate left tilt.
        let session = SessionBuilder::new(RATE)
            .still(0.2)
            .offset(50.0, 0.0, 0.3)
            .offset(0.0, -50.0, 1.5)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        engine.run(&session, &mut events);

        assert_eq!(events.len(), 2, "{events:?}");
        assert_eq!(events[0].kind, EventKind::Pass);
        assert_eq!(events[1].kind, EventKind::Tackle);
        let gap = events[1].timestamp - events[0].timestamp;
        assert!(gap >= cfg.timing.cooldown_ms as f64 / 1000.0 - 1e-9, "gap {gap}");
    }

    #[test]
    fn test_jitter_inside_zone_never_fires() {
        let mut engine = GestureEngine::new(ThresholdConfig::default());
        engine.activate();
        let session = SessionBuilder::new(60.0)
            .rest_at(30.0, 5.0)
            .jitter(1.5)
            .still(8.0)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        assert_eq!(engine.run(&session, &mut events), 0);
        let zone = engine.current_zone().expect("zone");
        assert!((zone.center_beta - 30.0).abs() < 2.0);
    }

    #[test]
    fn test_drops_invalid_and_out_of_order_samples() {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        let mut engine = GestureEngine::new(cfg);
        engine.activate();
        engine.process(&sample(10, 0.0, 0.0));
        engine.process(&OrientationSample::new(f64::NAN, 0.0, 1.0));
        engine.process(&sample(5, 0.0, 0.0));
        engine.process(&sample(10, 0.0, 0.0));
        let diag = engine.diagnostics();
        assert_eq!(diag.frames_dropped, 3);
        assert_eq!(diag.frames_processed, 1);
    }

    #[test]
    fn test_missing_alpha_is_tolerated() {
        let mut engine = GestureEngine::new(ThresholdConfig::default());
        engine.activate();
        engine.process(&OrientationSample::new(10.0, 0.0, 0.0));
        engine.process(&OrientationSample::new(10.0, 0.0, 0.1).with_alpha(359.0));
        let diag = engine.diagnostics();
        assert!(diag.alpha.is_some());
        assert!(diag.learning);
    }

    #[test]
    fn test_aborted_learning_restores_installed_zone() {
        let mut engine = GestureEngine::new(unfiltered());
        let zone = JitterZone {
            center_beta: 20.0,
            center_gamma: 0.0,
            radius_beta: 6.0,
            radius_gamma: 6.0,
        };
        engine.install_zone(zone);
        engine.start_learning();
        assert_eq!(engine.current_zone(), None);

        engine.process(&sample(0, 0.0, 0.0));
        engine.process(&OrientationSample::new(0.0, 0.0, 2.5));
        assert!(!engine.is_learning());
        assert_eq!(engine.current_zone(), Some(zone));
    }

    #[test]
    fn test_deactivate_clears_window_and_keeps_zone() {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        let mut engine = GestureEngine::new(cfg);
        let zone = JitterZone {
            center_beta: 0.0,
            center_gamma: 0.0,
            radius_beta: 5.0,
            radius_gamma: 5.0,
        };
        engine.install_zone(zone);
        engine.activate();
        for i in 0..8 {
            engine.process(&sample(i, 2.0 * i as f64, 0.0));
        }
        assert!(engine.pattern_window_len() > 0);

        engine.deactivate();
        let diag = engine.diagnostics();
        assert!(!diag.active);
        assert_eq!(diag.pattern_window_len, 0);
        assert!(!diag.has_base);
        assert_eq!(diag.zone, Some(zone));
    }

    #[test]
    fn test_installed_zone_becomes_base() {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        let mut engine = GestureEngine::new(cfg);
        engine.install_zone(JitterZone {
            center_beta: 45.0,
            center_gamma: 0.0,
            radius_beta: 5.0,
            radius_gamma: 5.0,
        });
        engine.activate();

        let session = SessionBuilder::new(RATE)
            .rest_at(45.0, 0.0)
            .still(0.2)
            .offset(-45.0, 0.0, 0.5)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        engine.run(&session, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Shot);
    }

    #[test]
    fn test_disabled_rules_stay_silent() {
        let mut cfg = ThresholdConfig::all_disabled();
        cfg.calibration.learn_on_activate = false;
        cfg.filter.enabled = false;
        let mut engine = GestureEngine::new(cfg);
        engine.activate();
        let session = SessionBuilder::new(RATE)
            .still(0.5)
            .offset(60.0, 0.0, 1.0)
            .zigzag(Axis::Gamma, 40.0, 3.0, 2.0)
            .inverted(1.0)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        assert_eq!(engine.run(&session, &mut events), 0);
    }

    #[test]
    fn test_figure_eight_emits_one_figure_eight() {
        let mut engine = GestureEngine::new(ThresholdConfig::default());
        engine.activate();
        let session = SessionBuilder::new(60.0)
            .rest_at(35.0, 0.0)
            .jitter(0.8)
            .still(2.5)
            .figure_eight(40.0, 3.0)
            .still(1.5)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        engine.run(&session, &mut events);

        assert_eq!(events.len(), 1, "{events:?}");
        assert_eq!(events[0].kind, EventKind::Figure8);
        assert_eq!(events[0].source, EventSource::Pattern);
        assert!(events[0].description.starts_with("Figure-eight"));
    }

    #[test]
    fn test_every_demo_emits_its_gesture() {
        for demo in DemoGesture::ALL {
            let expected = match demo {
                DemoGesture::Circle => EventKind::Circular,
                DemoGesture::FigureEight => EventKind::Figure8,
                DemoGesture::Zigzag => EventKind::Zigzag,
                DemoGesture::Shake => EventKind::Shake,
                DemoGesture::Flick => EventKind::Pass,
                DemoGesture::Inverted => EventKind::VoiceTag,
            };
            let mut engine = GestureEngine::new(ThresholdConfig::default());
            engine.activate();
            let mut events: Vec<ClassifiedEvent> = Vec::new();
            engine.run(&demo.session(60.0), &mut events);
            let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
            assert_eq!(kinds, vec![expected], "{demo:?}");
        }
    }

    #[test]
    fn test_filtered_flick_fires_after_filter_lag() {
        let mut engine = GestureEngine::new(ThresholdConfig::default());
        engine.activate();
        let session = SessionBuilder::new(60.0)
            .rest_at(35.0, 0.0)
            .jitter(0.8)
            .still(2.5)
            .offset(60.0, 0.0, 1.5)
            .still(1.5)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        engine.run(&session, &mut events);

        assert_eq!(events.len(), 1, "{events:?}");
        assert_eq!(events[0].kind, EventKind::Pass);
        // Flick starts at 2.5s; smoothing plus the hold delay it by well under a second.
        assert!((2.5..3.5).contains(&events[0].timestamp), "{}", events[0].timestamp);
    }

    fn partial_pass(engine: &mut GestureEngine) {
        engine.process(&sample(0, 0.0, 0.0));
        engine.process(&sample(1, 40.0, 0.0));
        engine.process(&sample(2, 40.0, 0.0));
        assert_eq!(engine.classifier.counter(GestureRule::Pass), 2);
    }

    fn zoned_engine() -> GestureEngine {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        let mut engine = GestureEngine::new(cfg);
        engine.install_zone(JitterZone {
            center_beta: 0.0,
            center_gamma: 0.0,
            radius_beta: 5.0,
            radius_gamma: 5.0,
        });
        engine.activate();
        engine
    }

    #[test]
    fn test_start_learning_clears_partial_counters() {
        let mut engine = zoned_engine();
        partial_pass(&mut engine);

        engine.start_learning();
        assert!(engine.is_learning());
        for rule in GestureRule::EVALUATION_ORDER {
            assert_eq!(engine.classifier.counter(rule), 0, "{rule:?}");
        }
    }

    #[test]
    fn test_reactivation_starts_with_clean_counters() {
        let mut engine = zoned_engine();
        partial_pass(&mut engine);

        engine.deactivate();
        engine.activate();
        for rule in GestureRule::EVALUATION_ORDER {
            assert_eq!(engine.classifier.counter(rule), 0, "{rule:?}");
        }

        // Base capture, then the full hold again.
        let mut fired = Vec::new();
        for i in 3..7 {
            if let Some(event) = engine.process(&sample(i, 40.0, 0.0)) {
                fired.push((i, event.kind));
            }
        }
        assert_eq!(fired, vec![(6, EventKind::Pass)]);
    }

    #[test]
    fn test_held_circle_blocks_instant_rules() {
        let mut cfg = unfiltered();
        cfg.calibration.learn_on_activate = false;
        let mut engine = GestureEngine::new(cfg);
        engine.activate();
        let session = SessionBuilder::new(RATE)
            .rest_at(40.0, 0.0)
            .circle(20.0, 1.2, 1.0)
            .build();
        let mut events: Vec<ClassifiedEvent> = Vec::new();
        engine.run(&session, &mut events);
        assert!(events.is_empty(), "{events:?}");
        assert!(engine.patterns.is_holding());
    }

    #[test]
    fn test_config_round_trip_through_store() {
        let mut store = ConfigStore::new(MemoryStore::new());
        let mut cfg = ThresholdConfig::default();
        cfg.timing.cooldown_ms = 650;
        let mut engine = GestureEngine::new(cfg.clone());
        engine.save_config(&mut store).unwrap();

        let mut other = GestureEngine::new(ThresholdConfig::default());
        other.load_config(&store);
        assert_eq!(other.config(), &cfg);

        other.reset_config(&mut store).unwrap();
        assert_eq!(other.config(), &ThresholdConfig::default());
    }
}
