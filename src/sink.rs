use crossbeam::channel::{Sender, TrySendError};
use log::warn;

use crate::types::ClassifiedEvent;

/// Receives emitted events, once each, in emission order.
pub trait EventSink {
    fn deliver(&mut self, event: ClassifiedEvent);
}

impl EventSink for Vec<ClassifiedEvent> {
    fn deliver(&mut self, event: ClassifiedEvent) {
        self.push(event);
    }
}

/// Adapter for closures.
pub struct FnSink<F>(pub F);

impl<F: FnMut(ClassifiedEvent)> EventSink for FnSink<F> {
    fn deliver(&mut self, event: ClassifiedEvent) {
        (self.0)(event)
    }
}

/// Non-blocking hand-off to another thread. A full or closed channel drops
/// the event.
impl EventSink for Sender<ClassifiedEvent> {
    fn deliver(&mut self, event: ClassifiedEvent) {
        match self.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(e)) => warn!("Event channel full, dropped {}", e.kind),
            Err(TrySendError::Disconnected(e)) => {
                warn!("Event channel closed, dropped {}", e.kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, EventSource};
    use crossbeam::channel::bounded;

    fn event(kind: EventKind) -> ClassifiedEvent {
        ClassifiedEvent {
            kind,
            confidence: 0.9,
            timestamp: 1.0,
            source: EventSource::Instant,
            description: kind.label().to_string(),
            supporting_path: None,
        }
    }

    #[test]
    fn test_vec_sink_keeps_order() {
        let mut sink: Vec<ClassifiedEvent> = Vec::new();
        sink.deliver(event(EventKind::Pass));
        sink.deliver(event(EventKind::Shot));
        let kinds: Vec<EventKind> = sink.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Pass, EventKind::Shot]);
    }

    #[test]
    fn test_fn_sink_calls_closure() {
        let mut count = 0;
        {
            let mut sink = FnSink(|_e: ClassifiedEvent| count += 1);
            sink.deliver(event(EventKind::Foul));
            sink.deliver(event(EventKind::Foul));
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut tx, rx) = bounded(1);
        tx.deliver(event(EventKind::Corner));
        tx.deliver(event(EventKind::Offside));
        assert_eq!(rx.try_recv().map(|e| e.kind).ok(), Some(EventKind::Corner));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_disconnect() {
        let (mut tx, rx) = bounded::<ClassifiedEvent>(4);
        drop(rx);
        tx.deliver(event(EventKind::Shake));
    }
}
