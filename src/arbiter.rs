use crate::classifier::InstantMatch;
use crate::pattern::PatternMatch;
use crate::types::{ClassifiedEvent, EventSource};

/// Merge one cycle's candidates into at most one event.
///
/// A pattern above `acceptance` wins over any instantaneous match; otherwise an
/// instantaneous match that cleared its hold count is used.
pub fn arbitrate(
    instant: Option<InstantMatch>,
    pattern: Option<PatternMatch>,
    acceptance: f64,
) -> Option<ClassifiedEvent> {
    if let Some(p) = pattern.filter(|p| p.confidence > acceptance) {
        let description = p.describe();
        return Some(ClassifiedEvent {
            kind: p.kind,
            confidence: p.confidence.clamp(0.0, 1.0),
            timestamp: p.timestamp,
            source: EventSource::Pattern,
            description,
            supporting_path: Some(p.path),
        });
    }

    instant.map(|m| ClassifiedEvent {
        kind: m.kind,
        confidence: m.confidence,
        timestamp: m.timestamp,
        source: EventSource::Instant,
        description: m.rule.description().to_string(),
        supporting_path: None,
    })
}
