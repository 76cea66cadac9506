use crate::error::AudioError;

/// Interleaved 16-bit stereo.
pub const CHANNELS: usize = 2;
pub const BITS_PER_SAMPLE: u16 = 16;
/// Bytes per interleaved frame.
pub const BYTES_PER_FRAME: u32 = (CHANNELS as u32) * (BITS_PER_SAMPLE as u32 / 8);

/// Stream parameters asked of a backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StreamRequest {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Requested ring buffer capacity, in frames.
    pub buffer_frames: u32,
}

/// Stream parameters a backend actually granted.
///
/// These, not the request, drive all subsequent cursor math.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NegotiatedStream {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_frames: u32,
}

impl From<&StreamRequest> for NegotiatedStream {
    fn from(req: &StreamRequest) -> Self {
        Self {
            sample_rate: req.sample_rate,
            channels: req.channels,
            buffer_frames: req.buffer_frames,
        }
    }
}

/// A platform audio output with a fixed-capacity ring buffer.
///
/// All counts are in frames (one sample per channel). Implementations are
/// owned exclusively by one [`AudioClock`](super::AudioClock) and driven
/// from the frame loop thread.
pub trait AudioBackend {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    fn open(&mut self) -> Result<(), AudioError>;

    /// Configures the stream; the returned parameters may differ from `request`.
    fn negotiate(&mut self, request: &StreamRequest) -> Result<NegotiatedStream, AudioError>;

    fn close(&mut self);

    /// Frames queued for playback and not yet audible.
    fn query_delay(&mut self) -> Result<u32, AudioError>;

    /// Free space in the ring buffer.
    fn query_avail(&mut self) -> Result<u32, AudioError>;

    /// Queues interleaved samples; returns the number of frames accepted,
    /// which may be fewer than offered.
    fn write(&mut self, samples: &[i16]) -> Result<u32, AudioError>;

    /// Backend-specific recovery (re-prepare, reset) after `error`.
    fn recover(&mut self, error: &AudioError) -> Result<(), AudioError>;
}
