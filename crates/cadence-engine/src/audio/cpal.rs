use std::collections::VecDeque;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use parking_lot::Mutex;

use crate::error::AudioError;

use super::backend::{AudioBackend, NegotiatedStream, StreamRequest, CHANNELS};

/// Ring shared between the frame loop (writer) and the device callback (reader).
struct Shared {
    ring: VecDeque<i16>,
    capacity_frames: u32,
    /// Set once the first samples arrive; an empty ring before that is not an underrun.
    primed: bool,
    underrun: bool,
}

impl Shared {
    fn queued_frames(&self) -> u32 {
        (self.ring.len() / CHANNELS) as u32
    }
}

/// Host default output device through `cpal`.
///
/// `cpal` pulls samples from a callback, so this backend keeps its own
/// interleaved ring that the callback drains. Delay is the ring's fill
/// level; the device's internal period is not visible and not counted.
pub struct CpalBackend {
    device: Option<cpal::Device>,
    stream: Option<cpal::Stream>,
    shared: Arc<Mutex<Shared>>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            device: None,
            stream: None,
            shared: Arc::new(Mutex::new(Shared {
                ring: VecDeque::new(),
                capacity_frames: 0,
                primed: false,
                underrun: false,
            })),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&mut self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("no default output device".into()))?;

        if let Ok(name) = device.name() {
            log::debug!("cpal output device: {name}");
        }
        self.device = Some(device);
        Ok(())
    }

    fn negotiate(&mut self, request: &StreamRequest) -> Result<NegotiatedStream, AudioError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| AudioError::Backend("negotiate before open".into()))?;

        let default = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
        let format = default.sample_format();

        let capacity_frames = request.buffer_frames.max(1).next_power_of_two();
        {
            let mut s = self.shared.lock();
            s.ring = VecDeque::with_capacity(capacity_frames as usize * CHANNELS);
            s.capacity_frames = capacity_frames;
            s.primed = false;
            s.underrun = false;
        }

        let wanted = cpal::StreamConfig {
            channels: CHANNELS as u16,
            sample_rate: cpal::SampleRate(request.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (stream, sample_rate) = match build_stream(device, &wanted, format, &self.shared) {
            Ok(stream) => (stream, request.sample_rate),
            Err(err) => {
                log::debug!(
                    "cpal rejected {} Hz ({err}); using device default rate",
                    request.sample_rate
                );
                let fallback = cpal::StreamConfig {
                    sample_rate: default.sample_rate(),
                    ..wanted
                };
                let stream = build_stream(device, &fallback, format, &self.shared)?;
                (stream, fallback.sample_rate.0)
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::Backend(format!("failed to start stream: {e}")))?;
        self.stream = Some(stream);

        Ok(NegotiatedStream {
            sample_rate,
            channels: CHANNELS as u16,
            buffer_frames: capacity_frames,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("cpal pause on close failed: {e}");
            }
        }
        self.device = None;
        self.shared.lock().ring.clear();
    }

    fn query_delay(&mut self) -> Result<u32, AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::QueryFailure("stream not running".into()));
        }
        Ok(self.shared.lock().queued_frames())
    }

    fn query_avail(&mut self) -> Result<u32, AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::QueryFailure("stream not running".into()));
        }
        let s = self.shared.lock();
        Ok(s.capacity_frames.saturating_sub(s.queued_frames()))
    }

    fn write(&mut self, samples: &[i16]) -> Result<u32, AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::Backend("write on closed stream".into()));
        }

        let mut s = self.shared.lock();
        if s.underrun {
            return Err(AudioError::Underrun);
        }

        let free = s.capacity_frames.saturating_sub(s.queued_frames());
        let frames = ((samples.len() / CHANNELS) as u32).min(free);
        s.ring
            .extend(samples[..frames as usize * CHANNELS].iter().copied());
        if frames > 0 {
            s.primed = true;
        }
        Ok(frames)
    }

    fn recover(&mut self, _error: &AudioError) -> Result<(), AudioError> {
        let mut s = self.shared.lock();
        s.underrun = false;
        s.primed = false;
        Ok(())
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: cpal::SampleFormat,
    shared: &Arc<Mutex<Shared>>,
) -> Result<cpal::Stream, AudioError> {
    let stream = match format {
        cpal::SampleFormat::F32 => build_typed::<f32>(device, config, shared),
        cpal::SampleFormat::I16 => build_typed::<i16>(device, config, shared),
        cpal::SampleFormat::U16 => build_typed::<u16>(device, config, shared),
        other => {
            return Err(AudioError::DeviceUnavailable(format!(
                "unsupported sample format {other}"
            )));
        }
    }
    .map_err(|e| AudioError::Backend(e.to_string()))?;

    Ok(stream)
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: &Arc<Mutex<Shared>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<i16>,
{
    let shared = Arc::clone(shared);
    let channels = config.channels as usize;

    device.build_output_stream(
        config,
        move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut s = shared.lock();
            for frame in out.chunks_mut(channels) {
                let (l, r) = match (s.ring.pop_front(), s.ring.pop_front()) {
                    (Some(l), Some(r)) => (l, r),
                    _ => {
                        if s.primed {
                            s.underrun = true;
                        }
                        (0, 0)
                    }
                };
                for (i, sample) in frame.iter_mut().enumerate() {
                    let v = if i % 2 == 0 { l } else { r };
                    *sample = T::from_sample_(v);
                }
            }
        },
        |err| log::error!("cpal stream error: {err}"),
        None,
    )
}

