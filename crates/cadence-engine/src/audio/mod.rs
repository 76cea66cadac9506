//! Audio output kept in step with the frame loop.
//!
//! [`AudioClock`] owns one [`AudioBackend`] and decides, each frame, how many
//! frames to hand it so that playback neither starves nor drifts. Backends:
//!
//! - [`SimulatedBackend`]: software ring buffer, scriptable for tests.
//! - [`NullBackend`]: silent stand-in for a device that failed to open.
//! - `CpalBackend` (feature `cpal`): host default output device.

mod backend;
mod clock;
#[cfg(feature = "cpal")]
mod cpal;
mod null;
mod producer;
mod simulated;

pub use backend::{
    AudioBackend, NegotiatedStream, StreamRequest, BITS_PER_SAMPLE, BYTES_PER_FRAME, CHANNELS,
};
pub use clock::{AudioClock, AudioClockState, LatencyMode, TickReport, WritePlan};
#[cfg(feature = "cpal")]
pub use self::cpal::CpalBackend;
pub use null::NullBackend;
pub use producer::{AudioProducer, SilenceProducer, SineProducer};
pub use simulated::SimulatedBackend;
