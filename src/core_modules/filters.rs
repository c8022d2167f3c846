// THEORY:
// The `filters` module is the stream-conditioning layer that sits between the
// raw sensor output and the tracker. Every filter follows the same contract:
// consume one event, optionally emit zero or one transformed events
// downstream (`Option<Event>`). They hold at most a grid of timestamps as
// state, so the whole layer stays single-pass and allocation-free per event.

use crate::core_modules::event::Event;

/// Inverts the y coordinate for a sensor of the given height. Useful for
/// sensors whose row order is flipped relative to the scene. Always emits.
#[derive(Debug, Clone, Copy)]
pub struct MirrorY {
    height: u16,
}

impl MirrorY {
    pub fn new(height: u16) -> Self {
        Self { height }
    }

    pub fn process(&self, mut event: Event) -> Event {
        event.y = self.height - 1 - event.y;
        event
    }
}

/// Shifts the x coordinate by a signed offset, dropping events pushed
/// outside `[0, width)`.
#[derive(Debug, Clone, Copy)]
pub struct ShiftX {
    width: u16,
    shift: i32,
}

impl ShiftX {
    pub fn new(width: u16, shift: i32) -> Self {
        Self { width, shift }
    }

    pub fn process(&self, mut event: Event) -> Option<Event> {
        let shifted = i32::from(event.x) + self.shift;
        if shifted >= 0 && shifted < i32::from(self.width) {
            event.x = shifted as u16;
            Some(event)
        } else {
            None
        }
    }
}

/// Shifts the y coordinate by a signed offset, dropping events pushed
/// outside `[0, height)`.
#[derive(Debug, Clone, Copy)]
pub struct ShiftY {
    height: u16,
    shift: i32,
}

impl ShiftY {
    pub fn new(height: u16, shift: i32) -> Self {
        Self { height, shift }
    }

    pub fn process(&self, mut event: Event) -> Option<Event> {
        let shifted = i32::from(event.y) + self.shift;
        if shifted >= 0 && shifted < i32::from(self.height) {
            event.y = shifted as u16;
            Some(event)
        } else {
            None
        }
    }
}

/// Propagates only the events within the specified rectangular window.
#[derive(Debug, Clone, Copy)]
pub struct SelectRectangle {
    left: u16,
    bottom: u16,
    width: u16,
    height: u16,
}

impl SelectRectangle {
    pub fn new(left: u16, bottom: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }

    pub fn process(&self, event: Event) -> Option<Event> {
        if event.x >= self.left
            && event.x < self.left + self.width
            && event.y >= self.bottom
            && event.y < self.bottom + self.height
        {
            Some(event)
        } else {
            None
        }
    }
}

/// Propagates only events that are not isolated spatially or in time.
///
/// Keeps one expiry timestamp per pixel. An event passes when at least one of
/// its 4-neighbours fired recently enough that its stored expiry is still
/// ahead of the event's own timestamp.
#[derive(Debug, Clone)]
pub struct MaskIsolated {
    width: u16,
    height: u16,
    decay: i64,
    timestamps: Vec<i64>,
}

impl MaskIsolated {
    pub fn new(width: u16, height: u16, decay: i64) -> Self {
        Self {
            width,
            height,
            decay,
            timestamps: vec![0; usize::from(width) * usize::from(height)],
        }
    }

    pub fn process(&mut self, event: Event) -> Option<Event> {
        let width = usize::from(self.width);
        let index = usize::from(event.x) + usize::from(event.y) * width;
        self.timestamps[index] = event.timestamp + self.decay;
        let supported = (event.x > 0 && self.timestamps[index - 1] > event.timestamp)
            || (event.x < self.width - 1 && self.timestamps[index + 1] > event.timestamp)
            || (event.y > 0 && self.timestamps[index - width] > event.timestamp)
            || (event.y < self.height - 1 && self.timestamps[index + width] > event.timestamp);
        if supported { Some(event) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(x: u16, y: u16, timestamp: i64) -> Event {
        Event { x, y, timestamp }
    }

    #[test]
    fn mirror_y_inverts_the_row() {
        let mirror = MirrorY::new(240);
        assert_eq!(mirror.process(event(10, 0, 0)).y, 239);
        assert_eq!(mirror.process(event(10, 239, 0)).y, 0);
        assert_eq!(mirror.process(event(10, 120, 0)).y, 119);
    }

    #[test]
    fn shift_x_moves_and_drops() {
        let shift = ShiftX::new(304, 10);
        assert_eq!(shift.process(event(200, 0, 0)).map(|e| e.x), Some(210));
        // 300 + 10 lands outside the sensor.
        assert_eq!(shift.process(event(300, 0, 0)), None);
    }

    #[test]
    fn shift_y_handles_negative_offsets() {
        let shift = ShiftY::new(240, -5);
        assert_eq!(shift.process(event(0, 100, 0)).map(|e| e.y), Some(95));
        assert_eq!(shift.process(event(0, 3, 0)), None);
    }

    #[test]
    fn select_rectangle_bounds_are_half_open() {
        let select = SelectRectangle::new(10, 20, 30, 40);
        assert!(select.process(event(10, 20, 0)).is_some());
        assert!(select.process(event(39, 59, 0)).is_some());
        assert!(select.process(event(40, 30, 0)).is_none());
        assert!(select.process(event(20, 60, 0)).is_none());
        assert!(select.process(event(9, 30, 0)).is_none());
    }

    #[test]
    fn mask_isolated_requires_a_recent_neighbour() {
        let mut mask = MaskIsolated::new(304, 240, 10);
        // A lone event has no active neighbours.
        assert!(mask.process(event(200, 200, 0)).is_none());
        // Two rows away is not a 4-neighbour.
        assert!(mask.process(event(200, 202, 1)).is_none());
        // The neighbours' support expired (0+10 and 1+10 are both <= 20).
        assert!(mask.process(event(200, 201, 20)).is_none());
        // Fresh pair: the second event arrives while the first still counts.
        assert!(mask.process(event(100, 100, 40)).is_none());
        assert!(mask.process(event(100, 101, 41)).is_some());
    }

    #[test]
    fn mask_isolated_handles_the_sensor_border() {
        let mut mask = MaskIsolated::new(16, 16, 10);
        assert!(mask.process(event(0, 0, 0)).is_none());
        assert!(mask.process(event(15, 15, 1)).is_none());
        assert!(mask.process(event(1, 0, 2)).is_some());
    }
}
