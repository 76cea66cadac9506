use crate::config::AdaptiveConfig;

use super::ladder::FpsLadder;
use super::{is_missed, SAMPLE_RING_LEN};

/// Why the controller changed rate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChangeReason {
    /// Sustained good frames with a median well under the target.
    QuickRecovery,
    /// A full window with a miss rate under the recover threshold.
    Headroom,
    /// A full window with a miss rate over the miss threshold.
    Overloaded,
}

/// A target rate transition, to be forwarded to the frame sink and audio clock.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RateChange {
    pub from: u32,
    pub to: u32,
    pub reason: ChangeReason,
}

impl RateChange {
    pub fn is_step_up(&self) -> bool {
        self.to > self.from
    }

    pub fn target_seconds_per_frame(&self) -> f64 {
        1.0 / self.to as f64
    }
}

/// Counters and recent history of the adaptive controller.
///
/// `frames_sampled` and `frames_missed` describe the current window only and
/// are cleared together on every rate change.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveState {
    pub target_fps: u32,
    pub target_seconds_per_frame: f64,

    pub frames_sampled: u32,
    pub frames_missed: u32,
    pub frames_since_last_change: u32,
    pub consecutive_good_frames: u32,

    /// Recent frame times in seconds; slot `recent_next` is overwritten next.
    pub recent: [f64; SAMPLE_RING_LEN],
    pub recent_next: usize,
    /// Number of meaningful entries in `recent`, at most `SAMPLE_RING_LEN`.
    pub recent_valid: usize,
}

impl AdaptiveState {
    fn new(target_fps: u32, frames_since_last_change: u32) -> Self {
        Self {
            target_fps,
            target_seconds_per_frame: 1.0 / target_fps as f64,
            frames_sampled: 0,
            frames_missed: 0,
            frames_since_last_change,
            consecutive_good_frames: 0,
            recent: [0.0; SAMPLE_RING_LEN],
            recent_next: 0,
            recent_valid: 0,
        }
    }

    fn push_sample(&mut self, frame_seconds: f64) {
        self.recent[self.recent_next] = frame_seconds;
        self.recent_next = (self.recent_next + 1) % SAMPLE_RING_LEN;
        self.recent_valid = (self.recent_valid + 1).min(SAMPLE_RING_LEN);
    }

    /// Median of the valid recent samples (upper median for even counts).
    pub fn median_recent(&self) -> Option<f64> {
        if self.recent_valid == 0 {
            return None;
        }

        let mut buf = [0.0f64; SAMPLE_RING_LEN];
        for (i, slot) in buf.iter_mut().take(self.recent_valid).enumerate() {
            let idx = (self.recent_next + SAMPLE_RING_LEN - 1 - i) % SAMPLE_RING_LEN;
            *slot = self.recent[idx];
        }

        let valid = &mut buf[..self.recent_valid];
        valid.sort_unstable_by(f64::total_cmp);
        Some(valid[valid.len() / 2])
    }

    /// Fraction of missed frames in the current window.
    pub fn miss_rate(&self) -> f64 {
        if self.frames_sampled == 0 {
            0.0
        } else {
            self.frames_missed as f64 / self.frames_sampled as f64
        }
    }

    fn clear_window(&mut self) {
        self.frames_sampled = 0;
        self.frames_missed = 0;
    }

    fn clear_all(&mut self) {
        self.clear_window();
        self.frames_since_last_change = 0;
        self.consecutive_good_frames = 0;
        self.recent_valid = 0;
    }
}

/// Hysteresis state machine choosing a target rate from an [`FpsLadder`].
///
/// Each call to [`update`](Self::update) consumes one frame time. Two paths
/// can raise the rate: a quick-recovery check over the recent median, and a
/// time-based window whose length is `sample_window_seconds` at the current
/// rate. Only the window can lower it. `cooldown_frames` separates any two
/// windowed changes.
#[derive(Debug, Clone)]
pub struct AdaptiveRateController {
    ladder: FpsLadder,
    state: AdaptiveState,

    enabled: bool,
    sample_window_seconds: f64,
    miss_threshold: f64,
    recover_threshold: f64,
    cooldown_frames: u32,
    tolerance_seconds: f64,
    quick_good_frames: u32,
    quick_settle_frames: u32,
    quick_ratio: f64,
}

impl AdaptiveRateController {
    /// Creates a controller.
    ///
    /// `platform_max_fps` overrides the configured maximum when the platform
    /// reports one. The controller starts settled: the cooldown is already
    /// satisfied, so the first full window may act.
    pub fn new(config: &AdaptiveConfig, platform_max_fps: Option<u32>) -> Self {
        let ladder = FpsLadder::new(
            config.ladder.clone(),
            platform_max_fps.unwrap_or(config.platform_max_fps),
        );
        let initial = ladder.clamp(config.initial_fps);

        Self {
            state: AdaptiveState::new(initial, config.cooldown_frames),
            ladder,
            enabled: config.enabled,
            sample_window_seconds: config.sample_window_seconds,
            miss_threshold: config.miss_threshold,
            recover_threshold: config.recover_threshold,
            cooldown_frames: config.cooldown_frames,
            tolerance_seconds: config.miss_tolerance_ms / 1000.0,
            quick_good_frames: config.quick_recovery_good_frames,
            quick_settle_frames: config.quick_recovery_settle_frames,
            quick_ratio: config.quick_recovery_ratio,
        }
    }

    pub fn state(&self) -> &AdaptiveState {
        &self.state
    }

    pub fn ladder(&self) -> &FpsLadder {
        &self.ladder
    }

    pub fn target_fps(&self) -> u32 {
        self.state.target_fps
    }

    pub fn target_seconds_per_frame(&self) -> f64 {
        self.state.target_seconds_per_frame
    }

    pub fn tolerance_seconds(&self) -> f64 {
        self.tolerance_seconds
    }

    /// Samples needed before the window may decide, at the current rate.
    pub fn required_samples(&self) -> u32 {
        let n = (self.sample_window_seconds * self.state.target_fps as f64).ceil();
        (n as u32).max(1)
    }

    /// Feeds one frame time and returns the rate change it caused, if any.
    pub fn update(&mut self, frame_seconds: f64) -> Option<RateChange> {
        let missed = self.record(frame_seconds);
        if missed {
            log::debug!(
                "missed frame: {:.2} ms against {:.2} ms target",
                frame_seconds * 1000.0,
                self.state.target_seconds_per_frame * 1000.0
            );
        }

        if !self.enabled {
            if self.state.frames_sampled >= self.required_samples() {
                self.state.clear_window();
            }
            return None;
        }

        if let Some(change) = self.quick_recovery() {
            return Some(change);
        }

        self.windowed_check()
    }

    /// Clears counters and recent history while keeping the current rate.
    ///
    /// The cooldown restarts from zero.
    pub fn reset_counters(&mut self) {
        self.state.clear_all();
    }

    fn record(&mut self, frame_seconds: f64) -> bool {
        let s = &mut self.state;
        s.push_sample(frame_seconds);
        s.frames_sampled = s.frames_sampled.saturating_add(1);
        s.frames_since_last_change = s.frames_since_last_change.saturating_add(1);

        let missed = is_missed(
            frame_seconds,
            s.target_seconds_per_frame,
            self.tolerance_seconds,
        );
        if missed {
            s.frames_missed = s.frames_missed.saturating_add(1);
            s.consecutive_good_frames = 0;
        } else {
            s.consecutive_good_frames = s.consecutive_good_frames.saturating_add(1);
        }
        missed
    }

    fn quick_recovery(&mut self) -> Option<RateChange> {
        let s = &self.state;
        if s.consecutive_good_frames < self.quick_good_frames
            || s.frames_since_last_change < self.quick_settle_frames
        {
            return None;
        }

        let up = self.ladder.step_up(s.target_fps)?;
        let median = s.median_recent()?;
        if median < self.quick_ratio * s.target_seconds_per_frame {
            return Some(self.change_to(up, ChangeReason::QuickRecovery));
        }
        None
    }

    fn windowed_check(&mut self) -> Option<RateChange> {
        let s = &self.state;
        if s.frames_sampled < self.required_samples() {
            return None;
        }

        // A full window inside the cooldown cannot act; drop it so the first
        // decision afterwards sees only recent frames.
        if s.frames_since_last_change < self.cooldown_frames {
            self.state.clear_window();
            return None;
        }

        let miss_rate = s.miss_rate();
        let fps = s.target_fps;

        if miss_rate < self.recover_threshold {
            if let Some(up) = self.ladder.step_up(fps) {
                return Some(self.change_to(up, ChangeReason::Headroom));
            }
        } else if miss_rate > self.miss_threshold {
            if let Some(down) = self.ladder.step_down(fps) {
                return Some(self.change_to(down, ChangeReason::Overloaded));
            }
        }

        // Rolling window: start over rather than averaging forever.
        log::trace!("rate window closed at {fps} fps, miss rate {miss_rate:.3}");
        self.state.clear_window();
        None
    }

    fn change_to(&mut self, fps: u32, reason: ChangeReason) -> RateChange {
        let from = self.state.target_fps;
        let miss_rate = self.state.miss_rate();

        self.state.target_fps = fps;
        self.state.target_seconds_per_frame = 1.0 / fps as f64;
        self.state.clear_all();

        log::info!("target rate {from} -> {fps} fps ({reason:?}, window miss rate {miss_rate:.3})");

        RateChange {
            from,
            to: fps,
            reason,
        }
    }
}
