use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::telemetry::{AudioStats, MarkerRing};

use super::backend::{
    AudioBackend, NegotiatedStream, StreamRequest, BITS_PER_SAMPLE, BYTES_PER_FRAME, CHANNELS,
};
use super::null::NullBackend;
use super::producer::AudioProducer;

/// Whether this tick can line audio up with the next display flip.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LatencyMode {
    /// The safe write cursor is ahead of the flip: sample-accurate sync.
    Low,
    /// Best effort: avoid underrun, no sync guarantee.
    High,
}

/// Cursor model state. Owned by the frame loop through [`AudioClock`].
///
/// Invariants: `running_sample_index` never decreases, and
/// `safety_sample_count < latency_sample_count`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AudioClockState {
    pub samples_per_second: u32,
    pub bytes_per_sample: u32,
    /// Frames the backend has accepted since the stream opened.
    pub running_sample_index: u64,
    pub latency_sample_count: u32,
    pub safety_sample_count: u32,
    /// Fixed simulation rate; not the adaptive render rate.
    pub game_update_hz: u32,
    pub samples_per_frame: u32,
    /// Negotiated ring buffer capacity in frames.
    pub buffer_capacity: u32,
}

/// Every intermediate value of one tick's cursor computation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WritePlan {
    pub play_cursor: i64,
    pub write_cursor: i64,
    /// Predicted play position at the next display flip.
    pub expected_frame_boundary: i64,
    pub safe_write_cursor: i64,
    pub mode: LatencyMode,
    pub target_cursor: i64,
    pub samples_to_write: u32,
}

impl AudioClockState {
    /// Computes what to write given the backend's reported `delay` and `avail`.
    ///
    /// Both are clamped to the negotiated capacity. With
    /// `force_high_latency` the low-latency path is never taken; used when
    /// the cursor queries failed and the inputs are stale.
    pub fn plan(
        &self,
        delay_frames: u32,
        avail_frames: u32,
        producer_capacity: u32,
        force_high_latency: bool,
    ) -> WritePlan {
        let spf = self.samples_per_frame as i64;
        let safety = self.safety_sample_count as i64;

        let write_cursor = self.running_sample_index as i64;
        let play_cursor = write_cursor - delay_frames.min(self.buffer_capacity) as i64;
        let expected_frame_boundary = play_cursor + spf;
        let safe_write_cursor = write_cursor + safety;

        let low_latency = !force_high_latency && safe_write_cursor < expected_frame_boundary;
        let (mode, target_cursor) = if low_latency {
            (LatencyMode::Low, expected_frame_boundary + spf)
        } else {
            (LatencyMode::High, write_cursor + spf + safety)
        };

        let upper = avail_frames
            .min(self.buffer_capacity)
            .min(producer_capacity) as i64;
        let samples_to_write = (target_cursor - write_cursor).clamp(0, upper) as u32;

        WritePlan {
            play_cursor,
            write_cursor,
            expected_frame_boundary,
            safe_write_cursor,
            mode,
            target_cursor,
            samples_to_write,
        }
    }

    pub fn latency_seconds(&self) -> f64 {
        self.latency_sample_count as f64 / self.samples_per_second as f64
    }
}

/// Outcome of one [`AudioClock::tick`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub plan: WritePlan,
    /// Frames handed to the backend; zero when the tick was skipped.
    pub requested: u32,
    /// Frames the backend accepted; `running_sample_index` advanced by this.
    pub written: u32,
}

impl TickReport {
    pub fn skipped(&self) -> bool {
        self.requested == 0
    }
}

/// Keeps a backend ring buffer fed so playback neither underruns nor drifts.
///
/// Each tick reads the backend's queued delay and free space, decides how
/// far ahead of the play cursor to write, asks the producer for exactly that
/// many frames and pushes them. The running sample index advances only by
/// what the backend accepted, so partial writes never cause drift.
///
/// Audio failures never escape: a device that fails to open is replaced by
/// [`NullBackend`] and the session runs muted.
pub struct AudioClock {
    backend: Box<dyn AudioBackend>,
    device_available: bool,

    state: AudioClockState,
    latency_frames: u32,
    safety_fraction: f64,
    producer_capacity: u32,
    render_fps: u32,

    last_delay: u32,
    last_avail: u32,
    queries_failing: bool,

    scratch: Vec<i16>,
    markers: Option<MarkerRing>,
    stats: AudioStats,
}

impl AudioClock {
    /// Opens `backend` and sizes the cursor model for `render_fps`.
    pub fn new(backend: Box<dyn AudioBackend>, config: &AudioConfig, render_fps: u32) -> Self {
        let render_fps = render_fps.max(1);
        let samples_per_frame = config.samples_per_second / config.game_update_hz.max(1);
        let latency = latency_samples(config.latency_frames, config.samples_per_second, render_fps);

        let request = StreamRequest {
            sample_rate: config.samples_per_second,
            channels: CHANNELS as u16,
            bits_per_sample: BITS_PER_SAMPLE,
            buffer_frames: latency + 2 * samples_per_frame,
        };

        let mut backend = backend;
        let (negotiated, device_available) = match open_stream(backend.as_mut(), &request) {
            Ok(n) => {
                log::info!(
                    "audio backend `{}` open: {} Hz, {} frame ring",
                    backend.name(),
                    n.sample_rate,
                    n.buffer_frames
                );
                (n, true)
            }
            Err(err) => {
                log::warn!("{err}; audio muted for this session");
                backend = Box::new(NullBackend::new());
                (NegotiatedStream::from(&request), false)
            }
        };

        let mut clock = Self {
            backend,
            device_available,
            state: AudioClockState {
                samples_per_second: negotiated.sample_rate,
                bytes_per_sample: BYTES_PER_FRAME,
                running_sample_index: 0,
                latency_sample_count: 0,
                safety_sample_count: 0,
                game_update_hz: config.game_update_hz.max(1),
                samples_per_frame,
                buffer_capacity: negotiated.buffer_frames,
            },
            latency_frames: config.latency_frames,
            safety_fraction: config.safety_fraction,
            producer_capacity: config.producer_capacity_frames,
            render_fps,
            last_delay: 0,
            last_avail: 0,
            queries_failing: false,
            scratch: Vec::new(),
            markers: config.debug_markers.then(MarkerRing::new),
            stats: AudioStats::default(),
        };
        clock.derive_constants();
        clock
    }

    pub fn state(&self) -> &AudioClockState {
        &self.state
    }

    pub fn stats(&self) -> &AudioStats {
        &self.stats
    }

    pub fn markers(&self) -> Option<&MarkerRing> {
        self.markers.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// False when the configured device failed and output is muted.
    pub fn device_available(&self) -> bool {
        self.device_available
    }

    pub fn render_fps(&self) -> u32 {
        self.render_fps
    }

    /// Re-derives per-frame constants after a target rate change.
    pub fn set_render_fps(&mut self, fps: u32) {
        self.render_fps = fps.max(1);
        self.derive_constants();
        log::debug!(
            "audio constants for {} fps: {} samples/frame, safety {}, latency {}",
            self.render_fps,
            self.state.samples_per_frame,
            self.state.safety_sample_count,
            self.state.latency_sample_count
        );
    }

    fn derive_constants(&mut self) {
        let s = &mut self.state;
        s.samples_per_frame = s.samples_per_second / s.game_update_hz;
        s.safety_sample_count = (s.samples_per_frame as f64 * self.safety_fraction) as u32;

        let latency = latency_samples(self.latency_frames, s.samples_per_second, self.render_fps);
        s.latency_sample_count = latency
            .min(s.buffer_capacity)
            .max(s.safety_sample_count + 1);
    }

    /// Runs one tick: plan, produce, push, advance.
    pub fn tick(&mut self, producer: &mut dyn AudioProducer) -> TickReport {
        self.stats.ticks += 1;

        let (delay, avail, stale) = self.query_cursors();
        let plan = self.state.plan(delay, avail, self.producer_capacity, stale);

        match plan.mode {
            LatencyMode::Low => self.stats.low_latency_ticks += 1,
            LatencyMode::High => self.stats.high_latency_ticks += 1,
        }
        log::trace!("audio plan {plan:?}");

        if plan.samples_to_write == 0 {
            self.stats.skipped_ticks += 1;
            log::debug!("audio tick skipped: buffer full enough (avail {avail})");
            return TickReport {
                plan,
                requested: 0,
                written: 0,
            };
        }

        if let Some(markers) = self.markers.as_mut() {
            markers.capture(plan.play_cursor, plan.write_cursor, plan.expected_frame_boundary);
        }

        let requested = plan.samples_to_write;
        let len = requested as usize * CHANNELS;
        self.scratch.resize(len, 0);
        producer.fill(&mut self.scratch[..len], self.state.samples_per_second);

        let written =
            write_with_recovery(self.backend.as_mut(), &self.scratch[..len], &mut self.stats);
        if written < requested {
            self.stats.partial_writes += 1;
        }

        self.state.running_sample_index += written as u64;
        self.stats.frames_written += written as u64;

        TickReport {
            plan,
            requested,
            written,
        }
    }

    /// Records the cursors observed right after a display flip into the
    /// marker captured by the last writing tick.
    pub fn mark_flip(&mut self) {
        let Some(markers) = self.markers.as_mut() else {
            return;
        };
        if !markers.has_pending() {
            return;
        }

        match self.backend.query_delay() {
            Ok(delay) => {
                let write = self.state.running_sample_index as i64;
                let play = write - delay.min(self.state.buffer_capacity) as i64;
                markers.record_actual(play, write);
            }
            Err(err) => log::trace!("flip marker dropped: {err}"),
        }
    }

    fn query_cursors(&mut self) -> (u32, u32, bool) {
        let delay = self.backend.query_delay();
        let avail = self.backend.query_avail();

        match (delay, avail) {
            (Ok(d), Ok(a)) => {
                if self.queries_failing {
                    log::info!("audio cursor queries recovered");
                    self.queries_failing = false;
                }
                self.last_delay = d;
                self.last_avail = a;
                (d, a, false)
            }
            (d, a) => {
                self.stats.query_failures += 1;
                if !self.queries_failing {
                    if let Some(err) = d.as_ref().err().or(a.as_ref().err()) {
                        log::warn!("{err}; using last known cursors");
                    }
                    self.queries_failing = true;
                }
                (
                    d.unwrap_or(self.last_delay),
                    a.unwrap_or(self.last_avail),
                    true,
                )
            }
        }
    }
}

impl Drop for AudioClock {
    fn drop(&mut self) {
        self.backend.close();
    }
}

fn latency_samples(latency_frames: u32, samples_per_second: u32, render_fps: u32) -> u32 {
    (latency_frames as u64 * samples_per_second as u64 / render_fps.max(1) as u64) as u32
}

fn open_stream(
    backend: &mut dyn AudioBackend,
    request: &StreamRequest,
) -> Result<NegotiatedStream, AudioError> {
    backend.open().map_err(unavailable)?;

    let negotiated = match backend.negotiate(request) {
        Ok(n) => n,
        Err(err) => {
            backend.close();
            return Err(unavailable(err));
        }
    };

    if negotiated.channels != request.channels
        || negotiated.buffer_frames == 0
        || negotiated.sample_rate == 0
    {
        backend.close();
        return Err(AudioError::DeviceUnavailable(format!(
            "`{}` negotiated an unusable stream: {negotiated:?}",
            backend.name()
        )));
    }

    if negotiated.buffer_frames != request.buffer_frames {
        let mismatch = AudioError::ConfigMismatch {
            requested: request.buffer_frames,
            actual: negotiated.buffer_frames,
        };
        log::warn!("{mismatch}; adopting the backend's size");
    }
    if negotiated.sample_rate != request.sample_rate {
        log::warn!(
            "audio rate {} Hz requested, backend runs at {} Hz",
            request.sample_rate,
            negotiated.sample_rate
        );
    }

    Ok(negotiated)
}

fn unavailable(err: AudioError) -> AudioError {
    match err {
        AudioError::DeviceUnavailable(_) => err,
        other => AudioError::DeviceUnavailable(other.to_string()),
    }
}

/// Pushes `samples`, with one recover-and-retry for recoverable failures.
///
/// Returns frames accepted; failures count as zero.
fn write_with_recovery(
    backend: &mut dyn AudioBackend,
    samples: &[i16],
    stats: &mut AudioStats,
) -> u32 {
    let offered = (samples.len() / CHANNELS) as u32;

    let err = match backend.write(samples) {
        Ok(n) => return n.min(offered),
        Err(err) => err,
    };

    match err {
        AudioError::Underrun => stats.underruns += 1,
        AudioError::WriteRejected => stats.rejected_writes += 1,
        _ => {}
    }

    if !err.is_recoverable() {
        log::warn!("audio write failed: {err}");
        stats.failed_writes += 1;
        return 0;
    }

    if let Err(recover_err) = backend.recover(&err) {
        log::warn!("audio recovery after `{err}` failed: {recover_err}");
        stats.failed_writes += 1;
        return 0;
    }

    match backend.write(samples) {
        Ok(n) => {
            log::debug!("audio write recovered after {err}");
            n.min(offered)
        }
        Err(retry_err) => {
            log::warn!(
                "audio write failed again after recovery: {retry_err}; writing silence this tick"
            );
            stats.failed_writes += 1;
            0
        }
    }
}
