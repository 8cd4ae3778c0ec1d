use crate::config::TimingConfig;
use crate::types::EventKind;

#[derive(Clone, Copy, Debug, PartialEq)]
struct LastFire {
    kind: EventKind,
    at: f64,
    /// Set once the kind's own predicate stopped matching after it fired.
    rearmed: bool,
}

/// Cooldown shared by the classifier and the pattern detector, plus the
/// same-kind debounce.
#[derive(Clone, Debug, Default)]
pub struct Lockout {
    until: Option<f64>,
    last: Option<LastFire>,
}

impl Lockout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cooling_down(&self, now: f64) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Milliseconds left on the cooldown, 0 when idle.
    pub fn remaining_ms(&self, now: f64) -> f64 {
        self.until
            .map(|until| ((until - now) * 1000.0).max(0.0))
            .unwrap_or(0.0)
    }

    /// Whether `kind` may fire at `now`.
    pub fn permits(&self, kind: EventKind, now: f64, timing: &TimingConfig) -> bool {
        if self.is_cooling_down(now) {
            return false;
        }
        match self.last {
            Some(last) if last.kind == kind && !last.rearmed => {
                now - last.at >= timing.clear_ms as f64 / 1000.0
            }
            _ => true,
        }
    }

    /// Record an emitted event and start the cooldown.
    pub fn engage(&mut self, kind: EventKind, now: f64, timing: &TimingConfig) {
        self.until = Some(now + timing.cooldown_ms as f64 / 1000.0);
        self.last = Some(LastFire {
            kind,
            at: now,
            rearmed: false,
        });
    }

    /// The last fired kind's predicate failed; it may fire again once the cooldown ends.
    pub fn rearm(&mut self, kind: EventKind) {
        if let Some(last) = self.last.as_mut() {
            if last.kind == kind {
                last.rearmed = true;
            }
        }
    }

    pub fn last_kind(&self) -> Option<EventKind> {
        self.last.map(|l| l.kind)
    }

    pub fn reset(&mut self) {
        self.until = None;
        self.last = None;
    }
}
