use std::f64::consts::TAU;

use super::backend::CHANNELS;

/// Source of PCM for the audio clock, typically game logic.
///
/// Called synchronously, exactly once per tick that writes anything.
pub trait AudioProducer {
    /// Fills `out` with interleaved 16-bit stereo; `out.len() / 2` frames.
    fn fill(&mut self, out: &mut [i16], sample_rate: u32);
}

impl<F> AudioProducer for F
where
    F: FnMut(&mut [i16], u32),
{
    fn fill(&mut self, out: &mut [i16], sample_rate: u32) {
        self(out, sample_rate)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilenceProducer;

impl AudioProducer for SilenceProducer {
    fn fill(&mut self, out: &mut [i16], _sample_rate: u32) {
        out.fill(0);
    }
}

/// Continuous sine tone; phase carries across calls so chunks join seamlessly.
#[derive(Debug, Clone)]
pub struct SineProducer {
    pub frequency: f64,
    /// Peak amplitude.
    pub volume: i16,
    phase: f64,
}

impl SineProducer {
    pub fn new(frequency: f64, volume: i16) -> Self {
        Self {
            frequency,
            volume,
            phase: 0.0,
        }
    }
}

impl AudioProducer for SineProducer {
    fn fill(&mut self, out: &mut [i16], sample_rate: u32) {
        let step = TAU * self.frequency / sample_rate.max(1) as f64;
        for frame in out.chunks_exact_mut(CHANNELS) {
            let v = (self.phase.sin() * self.volume as f64) as i16;
            frame.fill(v);
            self.phase = (self.phase + step) % TAU;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_zeroes_buffer() {
        let mut buf = vec![7i16; 8];
        SilenceProducer.fill(&mut buf, 48_000);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn sine_is_bounded_and_stereo() {
        let mut p = SineProducer::new(440.0, 3_000);
        let mut buf = vec![0i16; 2 * 480];
        p.fill(&mut buf, 48_000);

        assert!(buf.iter().all(|s| s.abs() <= 3_000));
        assert!(buf.chunks_exact(2).all(|f| f[0] == f[1]));
        assert!(buf.iter().any(|&s| s != 0));
    }

    #[test]
    fn sine_phase_continues_across_calls() {
        let mut whole = SineProducer::new(1_000.0, 10_000);
        let mut split = whole.clone();

        let mut a = vec![0i16; 200];
        whole.fill(&mut a, 48_000);

        let mut b = vec![0i16; 200];
        split.fill(&mut b[..100], 48_000);
        split.fill(&mut b[100..], 48_000);

        assert_eq!(a, b);
    }

    #[test]
    fn closures_are_producers() {
        let mut calls = 0;
        let mut p = |out: &mut [i16], _rate: u32| {
            calls += 1;
            out.fill(1);
        };
        let mut buf = [0i16; 4];
        AudioProducer::fill(&mut p, &mut buf, 44_100);
        assert_eq!(buf, [1; 4]);
        assert_eq!(calls, 1);
    }
}
