//! Adaptive target frame rate.
//!
//! The controller watches per-frame durations and walks a fixed ladder of
//! target rates: down when too many frames miss their deadline, up when the
//! machine has clear headroom. Rate changes are returned to the caller, which
//! forwards them to the frame sink and the audio clock.

mod controller;
mod ladder;

pub use controller::{AdaptiveRateController, AdaptiveState, ChangeReason, RateChange};
pub use ladder::FpsLadder;

/// Lowest target rate the controller will ever select.
pub const MIN_FPS: u32 = 30;

/// Number of recent frame times kept for the median.
pub const SAMPLE_RING_LEN: usize = 10;

/// Whether a frame overran its target by more than `tolerance_seconds`.
///
/// Pure: the same inputs always classify the same way.
pub fn is_missed(frame_seconds: f64, target_seconds: f64, tolerance_seconds: f64) -> bool {
    frame_seconds > target_seconds + tolerance_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_absorbs_small_overruns() {
        let target = 1.0 / 60.0;
        assert!(!is_missed(target + 0.002, target, 0.003));
        assert!(is_missed(target + 0.004, target, 0.003));
    }

    #[test]
    fn classification_is_idempotent() {
        let target = 1.0 / 60.0;
        for ms in [10.0, 16.0, 19.0, 19.7, 25.0, 40.0] {
            let t = ms / 1000.0;
            assert_eq!(is_missed(t, target, 0.003), is_missed(t, target, 0.003));
        }
    }
}
