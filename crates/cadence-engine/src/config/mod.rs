//! Engine configuration.
//!
//! Every section has working defaults, so an empty TOML document is a valid
//! configuration. Values are checked by [`EngineConfig::validate`] before the
//! frame loop is built.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rate::MIN_FPS;

mod sections;

pub use sections::{
    AdaptiveConfig, AudioConfig, LoggingSection, PacingConfig, ResetConfig, ResetPolicy,
    TelemetryConfig,
};

/// Top-level configuration for a [`FrameLoop`](crate::core::FrameLoop).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pacing: PacingConfig,
    pub adaptive: AdaptiveConfig,
    pub audio: AudioConfig,
    pub telemetry: TelemetryConfig,
    pub reset: ResetConfig,
    pub logging: LoggingSection,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text).context("failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in config file {}", path.display()))
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.adaptive;

        if a.ladder.is_empty() {
            return Err(ConfigError::invalid("adaptive.ladder", "must not be empty"));
        }
        if a.ladder.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::invalid(
                "adaptive.ladder",
                "must be strictly ascending",
            ));
        }
        if a.ladder[0] < MIN_FPS {
            return Err(ConfigError::invalid(
                "adaptive.ladder",
                format!("entries must be at least {MIN_FPS}"),
            ));
        }
        if !a.ladder.contains(&a.initial_fps) {
            return Err(ConfigError::invalid(
                "adaptive.initial_fps",
                format!("{} is not a ladder entry", a.initial_fps),
            ));
        }
        if a.platform_max_fps < MIN_FPS {
            return Err(ConfigError::invalid(
                "adaptive.platform_max_fps",
                format!("must be at least {MIN_FPS}"),
            ));
        }
        if !(a.sample_window_seconds > 0.0) {
            return Err(ConfigError::invalid(
                "adaptive.sample_window_seconds",
                "must be positive",
            ));
        }
        for (field, v) in [
            ("adaptive.miss_threshold", a.miss_threshold),
            ("adaptive.recover_threshold", a.recover_threshold),
            ("adaptive.quick_recovery_ratio", a.quick_recovery_ratio),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::invalid(field, "must be within [0, 1]"));
            }
        }
        if a.recover_threshold >= a.miss_threshold {
            return Err(ConfigError::invalid(
                "adaptive.recover_threshold",
                "must be below miss_threshold",
            ));
        }
        if a.miss_tolerance_ms < 0.0 {
            return Err(ConfigError::invalid(
                "adaptive.miss_tolerance_ms",
                "must not be negative",
            ));
        }

        let au = &self.audio;
        if au.samples_per_second == 0 {
            return Err(ConfigError::invalid(
                "audio.samples_per_second",
                "must be positive",
            ));
        }
        if au.game_update_hz == 0 {
            return Err(ConfigError::invalid("audio.game_update_hz", "must be positive"));
        }
        if au.game_update_hz > au.samples_per_second {
            return Err(ConfigError::invalid(
                "audio.game_update_hz",
                "must not exceed samples_per_second",
            ));
        }
        if !(0.0..1.0).contains(&au.safety_fraction) {
            return Err(ConfigError::invalid(
                "audio.safety_fraction",
                "must be within [0, 1)",
            ));
        }
        if au.latency_frames == 0 {
            return Err(ConfigError::invalid("audio.latency_frames", "must be positive"));
        }
        if au.producer_capacity_frames == 0 {
            return Err(ConfigError::invalid(
                "audio.producer_capacity_frames",
                "must be positive",
            ));
        }

        let p = &self.pacing;
        if p.coarse_sleep_ms <= 0.0 || p.spin_threshold_ms < 0.0 || p.max_spin_ms < 0.0 {
            return Err(ConfigError::invalid(
                "pacing",
                "durations must be non-negative and coarse_sleep_ms positive",
            ));
        }

        if self.telemetry.summary_interval_seconds < 0.0 {
            return Err(ConfigError::invalid(
                "telemetry.summary_interval_seconds",
                "must not be negative",
            ));
        }

        Ok(())
    }

    /// Logger settings derived from the `[logging]` section.
    pub fn logging_config(&self) -> crate::logging::LoggingConfig {
        crate::logging::LoggingConfig {
            env_filter: self.logging.env_filter.clone(),
            ..Default::default()
        }
    }
}
