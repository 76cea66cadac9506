use thiserror::Error;

/// Failures reported by audio backends.
///
/// None of these escape `AudioClock::tick`; they are absorbed on the audio
/// path and counted in telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The backend could not be opened; the session runs muted.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Playback caught up with the write cursor.
    #[error("audio ring buffer underrun")]
    Underrun,

    /// The backend is transiently busy and accepted nothing.
    #[error("audio write rejected: device busy")]
    WriteRejected,

    /// Delay/avail introspection is not available right now.
    #[error("audio cursor query failed: {0}")]
    QueryFailure(String),

    /// The negotiated ring buffer differs from the requested one.
    #[error("audio buffer mismatch: requested {requested} frames, got {actual}")]
    ConfigMismatch { requested: u32, actual: u32 },

    /// Any other backend-specific failure.
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl AudioError {
    /// Whether a single recover-and-retry is worth attempting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AudioError::Underrun | AudioError::WriteRejected)
    }
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
