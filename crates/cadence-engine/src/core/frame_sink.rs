/// Presentation side of the frame loop: vsync, swap interval, display flip.
///
/// The windowing layer implements this; the loop only tells it the current
/// target rate and when to flip.
pub trait FrameSink {
    /// Invoked at startup and whenever the adaptive controller changes rate.
    fn set_target_fps(&mut self, fps: u32);

    /// Highest rate the display can present, if known.
    fn max_fps(&self) -> Option<u32> {
        None
    }

    /// Presents the frame. Called after pacing, before audio flip markers.
    fn flip(&mut self) {}
}

/// Sink with no display behind it.
#[derive(Debug, Default, Clone)]
pub struct HeadlessSink {
    target_fps: u32,
    max_fps: Option<u32>,
    flips: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `max_fps` as the display maximum.
    pub fn with_max_fps(max_fps: u32) -> Self {
        Self {
            max_fps: Some(max_fps),
            ..Self::default()
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn flips(&self) -> u64 {
        self.flips
    }
}

impl FrameSink for HeadlessSink {
    fn set_target_fps(&mut self, fps: u32) {
        self.target_fps = fps;
    }

    fn max_fps(&self) -> Option<u32> {
        self.max_fps
    }

    fn flip(&mut self) {
        self.flips += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_sink_records_rate_and_flips() {
        let mut sink = HeadlessSink::new();
        assert_eq!(sink.max_fps(), None);

        sink.set_target_fps(45);
        sink.flip();
        sink.flip();
        assert_eq!(sink.target_fps(), 45);
        assert_eq!(sink.flips(), 2);
    }

    #[test]
    fn headless_sink_reports_configured_maximum() {
        let sink = HeadlessSink::with_max_fps(90);
        assert_eq!(sink.max_fps(), Some(90));
        assert_eq!(sink.flips(), 0);
    }
}
