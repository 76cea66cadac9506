//! Read-only diagnostics for the frame loop.
//!
//! Frame-time aggregates, audio path counters, and a ring of predicted vs.
//! observed audio cursors. Nothing in this module influences pacing or
//! cursor math.

mod markers;
mod stats;

pub use markers::{DebugMarker, MarkerRing, ObservedCursors, MARKER_SLOTS};
pub use stats::{AudioStats, FrameStats};

/// Snapshot handed to telemetry consumers and the periodic log line.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySummary {
    pub target_fps: u32,
    pub frames: FrameStats,
    pub audio: AudioStats,
    /// Most recent completed marker's boundary error, in samples.
    pub last_boundary_error: Option<i64>,
}

impl TelemetrySummary {
    pub fn log(&self) {
        let f = &self.frames;
        log::info!(
            "{} fps target | frames {} missed {} ({:.1}%) | min {:.2} avg {:.2} max {:.2} ms",
            self.target_fps,
            f.count,
            f.missed,
            f.miss_ratio() * 100.0,
            f.min().unwrap_or(0.0) * 1000.0,
            f.avg_seconds() * 1000.0,
            f.max_seconds * 1000.0,
        );

        let a = &self.audio;
        log::info!(
            "audio | frames {} | ticks {} skipped {} | low/high latency {}/{} | \
             underruns {} rejected {} failed {} query failures {}",
            a.frames_written,
            a.ticks,
            a.skipped_ticks,
            a.low_latency_ticks,
            a.high_latency_ticks,
            a.underruns,
            a.rejected_writes,
            a.failed_writes,
            a.query_failures,
        );

        if let Some(err) = self.last_boundary_error {
            log::debug!("audio flip boundary error: {err} samples");
        }
    }
}
