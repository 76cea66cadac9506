use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::AudioError;

use super::backend::{AudioBackend, NegotiatedStream, StreamRequest, CHANNELS};

/// How the simulated device consumes queued frames.
#[derive(Debug, Clone, Copy)]
enum Drain {
    /// At the negotiated sample rate against the wall clock.
    RealTime { last: Option<Instant>, carry: f64 },
    /// Only through [`SimulatedBackend::advance`].
    Manual,
}

#[derive(Debug)]
struct SimState {
    drain: Drain,
    period_frames: u32,

    open: bool,
    sample_rate: u32,
    capacity: u32,
    queued: u32,
    underrun_pending: bool,

    accept_limit: Option<u32>,
    write_errors: VecDeque<AudioError>,
    fail_queries: bool,
    fail_open: bool,
    fail_recover: bool,

    recover_calls: u32,
    write_calls: u32,
    total_accepted: u64,
}

impl SimState {
    fn consume(&mut self, frames: u32) {
        if frames > self.queued && self.queued > 0 {
            self.underrun_pending = true;
        }
        self.queued = self.queued.saturating_sub(frames);
    }

    fn drain_realtime(&mut self) {
        if !self.open {
            return;
        }
        let Drain::RealTime { last, carry } = &mut self.drain else {
            return;
        };

        let now = Instant::now();
        let Some(prev) = last.replace(now) else {
            return;
        };

        let elapsed = now.saturating_duration_since(prev).as_secs_f64();
        let exact = elapsed * self.sample_rate as f64 + *carry;
        let whole = exact.floor();
        *carry = exact - whole;

        let frames = whole.min(u32::MAX as f64) as u32;
        self.consume(frames);
    }
}

/// Software ring buffer standing in for a hardware device.
///
/// Clones share the same device, so a test or demo can keep a handle for
/// scripting (draining, accept limits, injected failures) after the backend
/// itself has been boxed into an [`AudioClock`](super::AudioClock).
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    shared: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    /// Device that plays back at the negotiated rate in wall-clock time.
    pub fn realtime() -> Self {
        Self::with_drain(Drain::RealTime {
            last: None,
            carry: 0.0,
        })
    }

    /// Device that only plays when told to via [`advance`](Self::advance).
    pub fn manual() -> Self {
        Self::with_drain(Drain::Manual)
    }

    fn with_drain(drain: Drain) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SimState {
                drain,
                period_frames: 1,
                open: false,
                sample_rate: 0,
                capacity: 0,
                queued: 0,
                underrun_pending: false,
                accept_limit: None,
                write_errors: VecDeque::new(),
                fail_queries: false,
                fail_open: false,
                fail_recover: false,
                recover_calls: 0,
                write_calls: 0,
                total_accepted: 0,
            })),
        }
    }

    /// Rounds negotiated capacities up to a multiple of `frames`.
    pub fn with_period(self, frames: u32) -> Self {
        self.shared.lock().period_frames = frames.max(1);
        self
    }

    /// Plays `frames` frames; running dry flags an underrun for the next write.
    pub fn advance(&self, frames: u32) {
        self.shared.lock().consume(frames);
    }

    /// Caps frames accepted per write call.
    pub fn set_accept_limit(&self, limit: Option<u32>) {
        self.shared.lock().accept_limit = limit;
    }

    /// Queues an error returned by the next write call.
    pub fn push_write_error(&self, error: AudioError) {
        self.shared.lock().write_errors.push_back(error);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.shared.lock().fail_queries = fail;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.lock().fail_open = fail;
    }

    pub fn set_fail_recover(&self, fail: bool) {
        self.shared.lock().fail_recover = fail;
    }

    pub fn queued(&self) -> u32 {
        self.shared.lock().queued
    }

    pub fn capacity(&self) -> u32 {
        self.shared.lock().capacity
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    pub fn recover_calls(&self) -> u32 {
        self.shared.lock().recover_calls
    }

    pub fn write_calls(&self) -> u32 {
        self.shared.lock().write_calls
    }

    pub fn total_accepted(&self) -> u64 {
        self.shared.lock().total_accepted
    }
}

impl AudioBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(&mut self) -> Result<(), AudioError> {
        let mut s = self.shared.lock();
        if s.fail_open {
            return Err(AudioError::DeviceUnavailable(
                "simulated device refused to open".into(),
            ));
        }
        s.open = true;
        Ok(())
    }

    fn negotiate(&mut self, request: &StreamRequest) -> Result<NegotiatedStream, AudioError> {
        let mut s = self.shared.lock();
        if !s.open {
            return Err(AudioError::Backend("negotiate before open".into()));
        }

        let period = s.period_frames;
        let capacity = request.buffer_frames.max(1).div_ceil(period) * period;

        s.sample_rate = request.sample_rate;
        s.capacity = capacity;
        s.queued = 0;

        Ok(NegotiatedStream {
            sample_rate: request.sample_rate,
            channels: CHANNELS as u16,
            buffer_frames: capacity,
        })
    }

    fn close(&mut self) {
        let mut s = self.shared.lock();
        s.open = false;
        s.queued = 0;
    }

    fn query_delay(&mut self) -> Result<u32, AudioError> {
        let mut s = self.shared.lock();
        if s.fail_queries {
            return Err(AudioError::QueryFailure("simulated delay query failure".into()));
        }
        s.drain_realtime();
        Ok(s.queued)
    }

    fn query_avail(&mut self) -> Result<u32, AudioError> {
        let mut s = self.shared.lock();
        if s.fail_queries {
            return Err(AudioError::QueryFailure("simulated avail query failure".into()));
        }
        s.drain_realtime();
        Ok(s.capacity - s.queued)
    }

    fn write(&mut self, samples: &[i16]) -> Result<u32, AudioError> {
        let mut s = self.shared.lock();
        s.write_calls += 1;

        if !s.open {
            return Err(AudioError::Backend("write on closed device".into()));
        }
        if let Some(err) = s.write_errors.pop_front() {
            return Err(err);
        }

        s.drain_realtime();
        if s.underrun_pending {
            return Err(AudioError::Underrun);
        }

        let offered = (samples.len() / CHANNELS) as u32;
        let mut accepted = offered.min(s.capacity - s.queued);
        if let Some(limit) = s.accept_limit {
            accepted = accepted.min(limit);
        }

        s.queued += accepted;
        s.total_accepted += accepted as u64;
        Ok(accepted)
    }

    fn recover(&mut self, _error: &AudioError) -> Result<(), AudioError> {
        let mut s = self.shared.lock();
        s.recover_calls += 1;
        if s.fail_recover {
            return Err(AudioError::Backend("simulated recovery failure".into()));
        }
        s.underrun_pending = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(buffer_frames: u32) -> StreamRequest {
        StreamRequest {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 16,
            buffer_frames,
        }
    }

    fn opened(period: u32, buffer_frames: u32) -> SimulatedBackend {
        let mut b = SimulatedBackend::manual().with_period(period);
        b.open().unwrap();
        b.negotiate(&request(buffer_frames)).unwrap();
        b
    }

    #[test]
    fn negotiate_rounds_to_period() {
        let mut b = SimulatedBackend::manual().with_period(1024);
        b.open().unwrap();
        let n = b.negotiate(&request(5_600)).unwrap();
        assert_eq!(n.buffer_frames, 6_144);
        assert_eq!(b.capacity(), 6_144);
    }

    #[test]
    fn negotiate_requires_open() {
        let mut b = SimulatedBackend::manual();
        assert!(b.negotiate(&request(1_000)).is_err());
    }

    #[test]
    fn write_fills_until_capacity() {
        let mut b = opened(1, 100);
        assert_eq!(b.write(&[0; 2 * 80]).unwrap(), 80);
        assert_eq!(b.write(&[0; 2 * 80]).unwrap(), 20);
        assert_eq!(b.query_avail().unwrap(), 0);
        assert_eq!(b.query_delay().unwrap(), 100);
    }

    #[test]
    fn advance_frees_space() {
        let mut b = opened(1, 100);
        b.write(&[0; 2 * 100]).unwrap();
        b.advance(30);
        assert_eq!(b.query_delay().unwrap(), 70);
        assert_eq!(b.query_avail().unwrap(), 30);
    }

    #[test]
    fn running_dry_reports_underrun_until_recovered() {
        let mut b = opened(1, 100);
        b.write(&[0; 2 * 10]).unwrap();
        b.advance(50);

        assert_eq!(b.write(&[0; 2 * 10]), Err(AudioError::Underrun));
        b.recover(&AudioError::Underrun).unwrap();
        assert_eq!(b.write(&[0; 2 * 10]).unwrap(), 10);
        assert_eq!(b.recover_calls(), 1);
    }

    #[test]
    fn accept_limit_caps_writes() {
        let mut b = opened(1, 1_000);
        b.set_accept_limit(Some(500));
        assert_eq!(b.write(&[0; 2 * 800]).unwrap(), 500);
        assert_eq!(b.total_accepted(), 500);
    }

    #[test]
    fn injected_errors_are_returned_once() {
        let mut b = opened(1, 100);
        b.push_write_error(AudioError::WriteRejected);
        assert_eq!(b.write(&[0; 4]), Err(AudioError::WriteRejected));
        assert_eq!(b.write(&[0; 4]).unwrap(), 2);
    }

    #[test]
    fn clones_share_the_device() {
        let b = opened(1, 100);
        let mut boxed: Box<dyn AudioBackend> = Box::new(b.clone());
        boxed.write(&[0; 2 * 40]).unwrap();
        assert_eq!(b.queued(), 40);
    }

    #[test]
    fn realtime_device_drains() {
        let mut b = SimulatedBackend::realtime();
        b.open().unwrap();
        b.negotiate(&request(48_000)).unwrap();
        b.write(&vec![0; 2 * 48_000]).unwrap();
        b.query_delay().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        let delay = b.query_delay().unwrap();
        // At least 20 ms worth played.
        assert!(delay <= 48_000 - 960, "delay {delay}");
    }
}
