/// Number of marker slots kept.
pub const MARKER_SLOTS: usize = 15;

/// Predicted cursors captured before a write, and the cursors actually
/// observed after the following display flip.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DebugMarker {
    pub predicted_play_cursor: i64,
    pub predicted_write_cursor: i64,
    pub expected_frame_boundary: i64,

    /// Filled after the flip; `None` until then.
    pub actual: Option<ObservedCursors>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ObservedCursors {
    pub play_cursor: i64,
    pub write_cursor: i64,
}

impl DebugMarker {
    /// How far the real play cursor landed from the predicted frame boundary.
    pub fn boundary_error(&self) -> Option<i64> {
        self.actual
            .map(|a| a.play_cursor - self.expected_frame_boundary)
    }

    /// Play cursor movement between the capture and the flip.
    pub fn drift(&self) -> Option<i64> {
        self.actual
            .map(|a| a.play_cursor - self.predicted_play_cursor)
    }
}

/// Fixed ring of [`DebugMarker`]s; the oldest slot is overwritten first.
///
/// Purely observational: nothing here feeds back into cursor math.
#[derive(Debug, Clone)]
pub struct MarkerRing {
    slots: [DebugMarker; MARKER_SLOTS],
    next: usize,
    len: usize,
    pending: Option<usize>,
}

impl MarkerRing {
    pub fn new() -> Self {
        Self {
            slots: [DebugMarker::default(); MARKER_SLOTS],
            next: 0,
            len: 0,
            pending: None,
        }
    }

    /// Stores a prediction in the oldest slot and returns the slot index.
    pub fn capture(
        &mut self,
        play_cursor: i64,
        write_cursor: i64,
        expected_frame_boundary: i64,
    ) -> usize {
        let slot = self.next;
        self.slots[slot] = DebugMarker {
            predicted_play_cursor: play_cursor,
            predicted_write_cursor: write_cursor,
            expected_frame_boundary,
            actual: None,
        };
        self.next = (self.next + 1) % MARKER_SLOTS;
        self.len = (self.len + 1).min(MARKER_SLOTS);
        self.pending = Some(slot);
        slot
    }

    /// Completes the most recent capture. Returns false if none is pending.
    pub fn record_actual(&mut self, play_cursor: i64, write_cursor: i64) -> bool {
        let Some(slot) = self.pending.take() else {
            return false;
        };
        self.slots[slot].actual = Some(ObservedCursors {
            play_cursor,
            write_cursor,
        });
        true
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Markers from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &DebugMarker> + '_ {
        let start = (self.next + MARKER_SLOTS - self.len) % MARKER_SLOTS;
        (0..self.len).map(move |i| &self.slots[(start + i) % MARKER_SLOTS])
    }

    pub fn latest(&self) -> Option<&DebugMarker> {
        (self.len > 0).then(|| &self.slots[(self.next + MARKER_SLOTS - 1) % MARKER_SLOTS])
    }
}

impl Default for MarkerRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_then_actual_fills_same_slot() {
        let mut ring = MarkerRing::new();
        let slot = ring.capture(100, 900, 1_700);
        assert_eq!(slot, 0);
        assert!(ring.has_pending());

        assert!(ring.record_actual(1_650, 2_500));
        let m = ring.latest().unwrap();
        assert_eq!(m.drift(), Some(1_550));
        assert_eq!(m.boundary_error(), Some(-50));
        assert!(!ring.has_pending());
    }

    #[test]
    fn actual_without_capture_is_ignored() {
        let mut ring = MarkerRing::new();
        assert!(!ring.record_actual(1, 2));
        assert!(ring.is_empty());
    }

    #[test]
    fn oldest_slot_is_overwritten() {
        let mut ring = MarkerRing::new();
        for i in 0..(MARKER_SLOTS as i64 + 3) {
            ring.capture(i, i, i);
        }
        assert_eq!(ring.len(), MARKER_SLOTS);

        let plays: Vec<i64> = ring.iter().map(|m| m.predicted_play_cursor).collect();
        assert_eq!(plays.first(), Some(&3));
        assert_eq!(plays.last(), Some(&(MARKER_SLOTS as i64 + 2)));
        assert!(plays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn new_capture_replaces_unfinished_one() {
        let mut ring = MarkerRing::new();
        ring.capture(1, 1, 1);
        ring.capture(2, 2, 2);
        ring.record_actual(5, 5);

        let markers: Vec<_> = ring.iter().collect();
        assert_eq!(markers[0].actual, None);
        assert!(markers[1].actual.is_some());
    }
}
