use std::time::{Duration, Instant};

use crate::config::PacingConfig;

/// Timestamps of one paced frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTiming {
    /// Monotonic frame counter.
    pub frame_index: u64,

    pub frame_start: Instant,

    /// When simulation, rendering and audio submission finished.
    pub work_end: Instant,

    /// When pacing released the frame.
    pub frame_end: Instant,
}

impl FrameTiming {
    pub fn work_seconds(&self) -> f64 {
        self.work_end
            .saturating_duration_since(self.frame_start)
            .as_secs_f64()
    }

    pub fn sleep_seconds(&self) -> f64 {
        self.frame_end
            .saturating_duration_since(self.work_end)
            .as_secs_f64()
    }

    pub fn total_seconds(&self) -> f64 {
        self.frame_end
            .saturating_duration_since(self.frame_start)
            .as_secs_f64()
    }
}

/// Result of [`FrameClock::sleep_until_target`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitOutcome {
    /// The target was reached by waiting.
    OnTime,
    /// The frame had already exceeded the target when pacing began.
    Late,
}

/// Frame clock pacing the loop toward a target frame duration.
///
/// Waiting is two-phase: cooperative sleeps in `coarse_sleep` steps while
/// more than `spin_threshold` remains, then a busy poll of the wall clock
/// up to the deadline. OS sleep granularity cannot hit sub-millisecond
/// boundaries, and audio sync depends on consistent frame edges.
///
/// The spin is bounded: after `max_spin` of continuous spinning each poll
/// yields to the scheduler instead of burning the core.
#[derive(Debug, Clone)]
pub struct FrameClock {
    coarse_sleep: Duration,
    spin_threshold: Duration,
    max_spin: Duration,

    frame_start: Instant,
    work_end: Option<Instant>,
    frame_index: u64,
    last: Option<FrameTiming>,
}

/// Upper clamp for the delta handed to simulation code.
///
/// Prevents simulation explosions after debugger pauses or long stalls.
pub const DT_MAX: f64 = 0.25;

impl FrameClock {
    pub fn new(pacing: &PacingConfig) -> Self {
        Self {
            coarse_sleep: millis(pacing.coarse_sleep_ms),
            spin_threshold: millis(pacing.spin_threshold_ms),
            max_spin: millis(pacing.max_spin_ms),
            frame_start: Instant::now(),
            work_end: None,
            frame_index: 0,
            last: None,
        }
    }

    /// Starts a frame and returns its index.
    pub fn begin(&mut self) -> u64 {
        self.frame_start = Instant::now();
        self.work_end = None;
        self.frame_index
    }

    /// Records the end of the frame's work and returns the elapsed work time.
    pub fn mark_work_done(&mut self) -> Duration {
        let now = Instant::now();
        self.work_end = Some(now);
        now.saturating_duration_since(self.frame_start)
    }

    /// Time since [`begin`](Self::begin).
    pub fn elapsed(&self) -> Duration {
        self.frame_start.elapsed()
    }

    /// Blocks until `target` has elapsed since [`begin`](Self::begin).
    pub fn sleep_until_target(&self, target: Duration) -> WaitOutcome {
        let deadline = self.frame_start + target;
        let mut now = Instant::now();

        if now >= deadline {
            return WaitOutcome::Late;
        }

        while deadline.saturating_duration_since(now) > self.spin_threshold {
            std::thread::sleep(self.coarse_sleep);
            now = Instant::now();
        }

        let spin_start = now;
        while now < deadline {
            if now.saturating_duration_since(spin_start) > self.max_spin {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
            now = Instant::now();
        }

        WaitOutcome::OnTime
    }

    /// Closes the frame and derives its work/sleep split.
    pub fn end(&mut self) -> FrameTiming {
        let frame_end = Instant::now();
        let timing = FrameTiming {
            frame_index: self.frame_index,
            frame_start: self.frame_start,
            work_end: self.work_end.unwrap_or(frame_end),
            frame_end,
        };

        self.last = Some(timing);
        self.frame_index = self.frame_index.wrapping_add(1);
        timing
    }

    /// Timing of the most recently closed frame.
    pub fn last(&self) -> Option<&FrameTiming> {
        self.last.as_ref()
    }

    /// Duration of the previous frame clamped to `[0, DT_MAX]`, for simulation.
    pub fn last_dt(&self) -> f64 {
        self.last
            .map(|t| t.total_seconds().min(DT_MAX))
            .unwrap_or(0.0)
    }

    /// Rebases the clock after a display reset or resume.
    ///
    /// The previous frame's timing is dropped so the next `last_dt` does not
    /// include the stall.
    pub fn reset(&mut self) {
        self.frame_start = Instant::now();
        self.work_end = None;
        self.last = None;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(&PacingConfig::default())
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}
