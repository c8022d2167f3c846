// THEORY:
// The `event` module defines the fundamental unit of data flowing through the
// entire engine. Event-based sensors do not produce frames; they produce a
// sparse, asynchronous stream of per-pixel change notifications. Every layer
// of this crate (filters, activity monitoring, blob tracking) consumes these
// one at a time, which is what allows the system to operate in a single pass
// with no buffering and no second look at past data.

/// A single change notification from an event-based vision sensor.
/// Timestamps are expected to be non-decreasing across the stream; no layer
/// validates this (see `BlobTracker::process` for the consequences).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The column of the pixel that fired.
    pub x: u16,
    /// The row of the pixel that fired.
    pub y: u16,
    /// Monotonic sensor time, in the sensor's native units (typically µs).
    pub timestamp: i64,
}

/// An event enriched with the current value of an exponential-decay activity
/// accumulator, as produced by `ActivityMonitor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityEvent {
    pub x: u16,
    pub y: u16,
    pub timestamp: i64,
    /// The accumulator value after this event was folded in.
    pub activity: f64,
}
