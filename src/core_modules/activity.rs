// THEORY:
// The `activity` module provides the generic exponential-decay accumulator
// used to evaluate activity within a temporal neighbourhood. It is the
// single-scalar cousin of the per-entry activity bookkeeping inside the
// tracker: every event bumps the accumulator by one after decaying it by the
// elapsed time, and the enriched sample is emitted downstream.

use crate::core_modules::event::{ActivityEvent, Event};

/// Evaluates the stream's activity with an exponential decay of the given
/// lifespan (in timestamp units).
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    lifespan: f64,
    activity: f64,
    last_timestamp: i64,
}

impl ActivityMonitor {
    pub fn new(lifespan: f64) -> Self {
        Self {
            lifespan,
            activity: 0.0,
            last_timestamp: 0,
        }
    }

    /// Folds one event into the accumulator and emits the enriched sample.
    pub fn process(&mut self, event: Event) -> ActivityEvent {
        self.activity *= (-((event.timestamp - self.last_timestamp) as f64) / self.lifespan).exp();
        self.activity += 1.0;
        self.last_timestamp = event.timestamp;
        ActivityEvent {
            x: event.x,
            y: event.y,
            timestamp: event.timestamp,
            activity: self.activity,
        }
    }

    /// The accumulator value after the last processed event.
    pub fn activity(&self) -> f64 {
        self.activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn each_event_adds_one_after_decaying() {
        let mut monitor = ActivityMonitor::new(100.0);

        let first = monitor.process(Event { x: 5, y: 6, timestamp: 0 });
        assert!((first.activity - 1.0).abs() < TOLERANCE);
        assert_eq!((first.x, first.y), (5, 6));

        // One lifespan later the first contribution has decayed to 1/e.
        let second = monitor.process(Event { x: 5, y: 6, timestamp: 100 });
        let expected = (-1.0f64).exp() + 1.0;
        assert!((second.activity - expected).abs() < TOLERANCE);
    }

    #[test]
    fn simultaneous_events_stack_without_decay() {
        let mut monitor = ActivityMonitor::new(50.0);
        monitor.process(Event { x: 0, y: 0, timestamp: 10 });
        monitor.process(Event { x: 0, y: 0, timestamp: 10 });
        let sample = monitor.process(Event { x: 0, y: 0, timestamp: 10 });
        assert!((sample.activity - 3.0).abs() < TOLERANCE);
    }
}
