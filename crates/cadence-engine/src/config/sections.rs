use serde::{Deserialize, Serialize};

/// Hybrid sleep/spin pacing parameters for [`FrameClock`](crate::time::FrameClock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Granularity of one cooperative OS sleep.
    pub coarse_sleep_ms: f64,

    /// Remaining time below which the clock stops sleeping and spins.
    pub spin_threshold_ms: f64,

    /// Upper bound on non-yielding spin per frame; past it each poll yields.
    pub max_spin_ms: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            coarse_sleep_ms: 1.0,
            spin_threshold_ms: 3.0,
            max_spin_ms: 5.0,
        }
    }
}

/// Adaptive frame rate controller tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// When false, frames are still classified but the rate never changes.
    pub enabled: bool,

    /// Ascending target rates the controller may pick from.
    pub ladder: Vec<u32>,

    pub initial_fps: u32,

    /// Used when the frame sink does not report a maximum.
    pub platform_max_fps: u32,

    /// Wall-clock span of one decision window.
    pub sample_window_seconds: f64,

    /// Miss rate above which the rate steps down.
    pub miss_threshold: f64,

    /// Miss rate below which the rate steps up.
    pub recover_threshold: f64,

    /// Minimum frames between two rate changes.
    pub cooldown_frames: u32,

    /// Slack over the target frame time before a frame counts as missed.
    pub miss_tolerance_ms: f64,

    pub quick_recovery_good_frames: u32,
    pub quick_recovery_settle_frames: u32,

    /// Median frame time must be below this fraction of the target.
    pub quick_recovery_ratio: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ladder: vec![30, 45, 60, 90, 120],
            initial_fps: 60,
            platform_max_fps: 120,
            sample_window_seconds: 0.5,
            miss_threshold: 0.10,
            recover_threshold: 0.02,
            cooldown_frames: 180,
            miss_tolerance_ms: 3.0,
            quick_recovery_good_frames: 30,
            quick_recovery_settle_frames: 90,
            quick_recovery_ratio: 0.8,
        }
    }
}

/// Audio clock and backend stream parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub samples_per_second: u32,

    /// Fixed simulation rate; independent of the adaptive render rate.
    pub game_update_hz: u32,

    /// Render frames of audio kept queued ahead of the play cursor.
    pub latency_frames: u32,

    /// Safety margin as a fraction of one simulation frame of samples.
    pub safety_fraction: f64,

    /// Largest number of frames the producer can fill in one call.
    pub producer_capacity_frames: u32,

    /// Capture predicted vs. actual cursor markers.
    pub debug_markers: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            samples_per_second: 48_000,
            game_update_hz: 30,
            latency_frames: 3,
            safety_fraction: 1.0 / 3.0,
            producer_capacity_frames: 48_000,
            debug_markers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Seconds between logged summaries; 0 disables the summary.
    pub summary_interval_seconds: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            summary_interval_seconds: 5.0,
        }
    }
}

/// What happens to adaptive counters when the loop is re-entered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// Keep accumulated counters and the sample ring.
    Persist,
    /// Clear counters and the sample ring, keep the current rate.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub on_display_reset: ResetPolicy,
    pub on_code_reload: ResetPolicy,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            on_display_reset: ResetPolicy::Reset,
            on_code_reload: ResetPolicy::Persist,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `env_logger` filter string, e.g. "info,cadence_engine::audio=debug".
    pub env_filter: Option<String>,
}
