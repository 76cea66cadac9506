use crate::rate::is_missed;

/// Frame-time aggregate over the process lifetime.
///
/// Accumulates monotonically; only [`FrameStats::new`] or `Default` starts over.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub count: u64,
    pub missed: u64,
    pub min_seconds: f64,
    pub max_seconds: f64,
    total_seconds: f64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            missed: 0,
            min_seconds: f64::INFINITY,
            max_seconds: 0.0,
            total_seconds: 0.0,
        }
    }

    /// Records one frame and returns whether it was a miss.
    pub fn record(
        &mut self,
        frame_seconds: f64,
        target_seconds: f64,
        tolerance_seconds: f64,
    ) -> bool {
        self.count += 1;
        self.total_seconds += frame_seconds;
        self.min_seconds = self.min_seconds.min(frame_seconds);
        self.max_seconds = self.max_seconds.max(frame_seconds);

        let missed = is_missed(frame_seconds, target_seconds, tolerance_seconds);
        if missed {
            self.missed += 1;
        }
        missed
    }

    pub fn avg_seconds(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_seconds / self.count as f64
        }
    }

    /// `None` until a frame has been recorded.
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min_seconds)
    }

    pub fn miss_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.missed as f64 / self.count as f64
        }
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for the audio path. Failures are absorbed locally and land here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioStats {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub frames_written: u64,
    pub partial_writes: u64,
    pub underruns: u64,
    pub rejected_writes: u64,
    pub failed_writes: u64,
    pub query_failures: u64,
    pub low_latency_ticks: u64,
    pub high_latency_ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn empty_stats() {
        let s = FrameStats::new();
        assert_eq!(s.count, 0);
        assert_eq!(s.min(), None);
        assert_eq!(s.avg_seconds(), 0.0);
        assert_eq!(s.miss_ratio(), 0.0);
    }

    #[test]
    fn record_tracks_extremes_and_average() {
        let mut s = FrameStats::new();
        let target = 1.0 / 60.0;
        s.record(0.010, target, 0.003);
        s.record(0.030, target, 0.003);
        s.record(0.020, target, 0.003);

        assert_eq!(s.count, 3);
        assert_eq!(s.min(), Some(0.010));
        assert_eq!(s.max_seconds, 0.030);
        assert_abs_diff_eq!(s.avg_seconds(), 0.020, epsilon = 1e-12);
        assert_eq!(s.missed, 2);
    }

    #[test]
    fn record_reports_miss() {
        let mut s = FrameStats::new();
        assert!(!s.record(0.016, 1.0 / 60.0, 0.003));
        assert!(s.record(0.025, 1.0 / 60.0, 0.003));
        assert_relative_eq!(s.miss_ratio(), 0.5);
    }
}
