use crate::error::AudioError;

use super::backend::{AudioBackend, NegotiatedStream, StreamRequest};

/// Backend with no device behind it.
///
/// Reports no free space, so an [`AudioClock`](super::AudioClock) driving it
/// writes nothing each tick. Stands in for any device that failed to open.
#[derive(Debug, Default, Clone)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn negotiate(&mut self, request: &StreamRequest) -> Result<NegotiatedStream, AudioError> {
        Ok(NegotiatedStream::from(request))
    }

    fn close(&mut self) {}

    fn query_delay(&mut self) -> Result<u32, AudioError> {
        Ok(0)
    }

    fn query_avail(&mut self) -> Result<u32, AudioError> {
        Ok(0)
    }

    fn write(&mut self, _samples: &[i16]) -> Result<u32, AudioError> {
        Ok(0)
    }

    fn recover(&mut self, _error: &AudioError) -> Result<(), AudioError> {
        Ok(())
    }
}
