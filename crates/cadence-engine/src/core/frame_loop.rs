use std::time::{Duration, Instant};

use crate::audio::{AudioBackend, AudioClock, AudioProducer};
use crate::config::{EngineConfig, ResetConfig, ResetPolicy};
use crate::rate::{AdaptiveRateController, RateChange};
use crate::telemetry::{FrameStats, TelemetrySummary};
use crate::time::{FrameClock, FrameTiming};

use super::app::{App, AppControl};
use super::ctx::FrameCtx;
use super::frame_sink::FrameSink;

/// Owns all per-session pacing and audio state and runs one frame at a time.
///
/// Order within a frame:
/// `begin` → app → audio tick → `mark_work_done` → pace → flip →
/// flip marker → `end` → stats → rate controller → propagate rate change.
pub struct FrameLoop {
    clock: FrameClock,
    controller: AdaptiveRateController,
    audio: AudioClock,
    frames: FrameStats,
    sink: Box<dyn FrameSink>,

    reset: ResetConfig,
    game_update_hz: u32,
    summary_interval: Option<Duration>,
    last_summary: Instant,
}

impl FrameLoop {
    /// Builds the loop. Never fails: an audio device that cannot be opened
    /// leaves the session muted.
    pub fn new(
        config: &EngineConfig,
        backend: Box<dyn AudioBackend>,
        mut sink: Box<dyn FrameSink>,
    ) -> Self {
        let controller = AdaptiveRateController::new(&config.adaptive, sink.max_fps());
        let fps = controller.target_fps();
        sink.set_target_fps(fps);

        let audio = AudioClock::new(backend, &config.audio, fps);

        let interval = config.telemetry.summary_interval_seconds;
        let summary_interval = (interval > 0.0).then(|| Duration::from_secs_f64(interval));

        log::info!(
            "frame loop ready: {fps} fps target (ladder {:?}), audio via `{}` \
             with {:.1} ms latency",
            controller.ladder().steps(),
            audio.backend_name(),
            audio.state().latency_seconds() * 1000.0
        );

        Self {
            clock: FrameClock::new(&config.pacing),
            controller,
            audio,
            frames: FrameStats::new(),
            sink,
            reset: config.reset.clone(),
            game_update_hz: config.audio.game_update_hz,
            summary_interval,
            last_summary: Instant::now(),
        }
    }

    /// Runs frames until the app asks to exit, then returns the final summary.
    pub fn run<A: App>(
        &mut self,
        app: &mut A,
        producer: &mut dyn AudioProducer,
    ) -> TelemetrySummary {
        while self.frame(app, producer) == AppControl::Continue {}

        let summary = self.summary();
        summary.log();
        summary
    }

    /// Runs exactly one frame.
    pub fn frame<A: App>(&mut self, app: &mut A, producer: &mut dyn AudioProducer) -> AppControl {
        let frame_index = self.clock.begin();
        let mut ctx = FrameCtx {
            frame_index,
            dt: self.clock.last_dt(),
            target_fps: self.controller.target_fps(),
            game_update_hz: self.game_update_hz,
        };
        let control = app.on_frame(&mut ctx);

        self.audio.tick(producer);

        self.clock.mark_work_done();
        let target = Duration::from_secs_f64(self.controller.target_seconds_per_frame());
        self.clock.sleep_until_target(target);

        self.sink.flip();
        self.audio.mark_flip();

        let timing = self.clock.end();
        if let Some(change) = self.finish_frame(&timing) {
            app.on_rate_change(&change);
        }

        self.maybe_log_summary();
        control
    }

    fn finish_frame(&mut self, timing: &FrameTiming) -> Option<RateChange> {
        let frame_seconds = timing.total_seconds();
        self.frames.record(
            frame_seconds,
            self.controller.target_seconds_per_frame(),
            self.controller.tolerance_seconds(),
        );

        let change = self.controller.update(frame_seconds)?;
        self.sink.set_target_fps(change.to);
        self.audio.set_render_fps(change.to);
        Some(change)
    }

    fn maybe_log_summary(&mut self) {
        let Some(interval) = self.summary_interval else {
            return;
        };
        if self.last_summary.elapsed() >= interval {
            self.summary().log();
            self.last_summary = Instant::now();
        }
    }

    /// The display was reset (resize, mode change, resume).
    pub fn on_display_reset(&mut self) {
        self.apply_reset_policy("display reset", self.reset.on_display_reset);
    }

    /// Game code was reloaded in place.
    pub fn on_code_reload(&mut self) {
        self.apply_reset_policy("code reload", self.reset.on_code_reload);
    }

    fn apply_reset_policy(&mut self, event: &str, policy: ResetPolicy) {
        match policy {
            ResetPolicy::Reset => {
                log::info!(
                    "{event}: adaptive counters reset, keeping {} fps",
                    self.controller.target_fps()
                );
                self.controller.reset_counters();
                self.clock.reset();
            }
            ResetPolicy::Persist => log::debug!("{event}: adaptive counters kept"),
        }
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            target_fps: self.controller.target_fps(),
            frames: self.frames.clone(),
            audio: self.audio.stats().clone(),
            last_boundary_error: self
                .audio
                .markers()
                .and_then(|m| m.iter().filter_map(|d| d.boundary_error()).last()),
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn controller(&self) -> &AdaptiveRateController {
        &self.controller
    }

    pub fn audio(&self) -> &AudioClock {
        &self.audio
    }

    pub fn frame_stats(&self) -> &FrameStats {
        &self.frames
    }

    pub fn sink(&self) -> &dyn FrameSink {
        self.sink.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::audio::{SilenceProducer, SimulatedBackend};
    use crate::core::HeadlessSink;

    /// Sink that shares what it was told with the test.
    #[derive(Clone, Default)]
    struct SharedSink {
        log: Rc<RefCell<SinkLog>>,
        max: Option<u32>,
    }

    #[derive(Default)]
    struct SinkLog {
        rates: Vec<u32>,
        flips: u32,
    }

    impl FrameSink for SharedSink {
        fn set_target_fps(&mut self, fps: u32) {
            self.log.borrow_mut().rates.push(fps);
        }

        fn max_fps(&self) -> Option<u32> {
            self.max
        }

        fn flip(&mut self) {
            self.log.borrow_mut().flips += 1;
        }
    }

    /// App that busy-works `work` per frame and exits after `frames`.
    struct Workload {
        work: Duration,
        frames: u64,
        seen: Vec<FrameCtx>,
        changes: Vec<RateChange>,
    }

    impl Workload {
        fn new(work_ms: u64, frames: u64) -> Self {
            Self {
                work: Duration::from_millis(work_ms),
                frames,
                seen: Vec::new(),
                changes: Vec::new(),
            }
        }
    }

    impl App for Workload {
        fn on_frame(&mut self, ctx: &mut FrameCtx) -> AppControl {
            self.seen.push(*ctx);
            if !self.work.is_zero() {
                std::thread::sleep(self.work);
            }
            if ctx.frame_index + 1 >= self.frames {
                AppControl::Exit
            } else {
                AppControl::Continue
            }
        }

        fn on_rate_change(&mut self, change: &RateChange) {
            self.changes.push(*change);
        }
    }

    fn fast_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.adaptive.sample_window_seconds = 0.1;
        cfg.adaptive.initial_fps = 120;
        cfg.telemetry.summary_interval_seconds = 0.0;
        cfg
    }

    fn build(cfg: &EngineConfig, sink: SharedSink) -> (FrameLoop, SimulatedBackend) {
        let sim = SimulatedBackend::manual();
        let fl = FrameLoop::new(cfg, Box::new(sim.clone()), Box::new(sink));
        (fl, sim)
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn initial_rate_reaches_sink() {
        let sink = SharedSink::default();
        let (fl, _) = build(&fast_config(), sink.clone());

        assert_eq!(fl.controller().target_fps(), 120);
        assert_eq!(sink.log.borrow().rates, vec![120]);
        assert_eq!(fl.audio().render_fps(), 120);
    }

    #[test]
    fn sink_maximum_caps_initial_rate() {
        let sink = SharedSink {
            max: Some(60),
            ..SharedSink::default()
        };
        let (fl, _) = build(&fast_config(), sink.clone());

        assert_eq!(fl.controller().target_fps(), 60);
        assert_eq!(fl.controller().ladder().max_fps(), 60);
        assert_eq!(sink.log.borrow().rates, vec![60]);
    }

    // ── frame order ───────────────────────────────────────────────────────

    #[test]
    fn one_frame_ticks_audio_and_flips_once() {
        let sink = SharedSink::default();
        let (mut fl, sim) = build(&fast_config(), sink.clone());
        let mut app = Workload::new(0, 10);

        let started = Instant::now();
        assert_eq!(fl.frame(&mut app, &mut SilenceProducer), AppControl::Continue);

        assert!(started.elapsed() >= Duration::from_secs_f64(1.0 / 120.0));
        assert_eq!(fl.audio().stats().ticks, 1);
        assert_eq!(sink.log.borrow().flips, 1);
        assert_eq!(fl.frame_stats().count, 1);
        assert_eq!(fl.clock().frame_index(), 1);
        assert!(sim.queued() > 0);

        let marker = fl.audio().markers().unwrap().latest().unwrap();
        assert!(marker.actual.is_some());
    }

    #[test]
    fn run_stops_when_app_exits() {
        let (mut fl, _) = build(&fast_config(), SharedSink::default());
        let mut app = Workload::new(0, 4);

        let summary = fl.run(&mut app, &mut SilenceProducer);
        assert_eq!(app.seen.len(), 4);
        assert_eq!(summary.frames.count, 4);
        assert_eq!(summary.audio.ticks, 4);
        assert_eq!(summary.target_fps, fl.controller().target_fps());
    }

    #[test]
    fn ctx_reports_fixed_update_rate_and_indices() {
        let (mut fl, _) = build(&fast_config(), SharedSink::default());
        let mut app = Workload::new(0, 3);
        fl.run(&mut app, &mut SilenceProducer);

        let indices: Vec<u64> = app.seen.iter().map(|c| c.frame_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(app.seen.iter().all(|c| c.game_update_hz == 30));
        assert_eq!(app.seen[0].dt, 0.0);
        assert!(app.seen[1].dt > 0.0);

        let ctx = app.seen[0];
        assert_eq!(ctx.target_fps, 120);
        assert_relative_eq!(ctx.update_dt(), 1.0 / 30.0);
        assert_relative_eq!(ctx.target_seconds_per_frame(), 1.0 / 120.0);
    }

    // ── telemetry ─────────────────────────────────────────────────────────

    #[test]
    fn summary_is_logged_on_interval() {
        let mut cfg = fast_config();
        cfg.telemetry.summary_interval_seconds = 0.001;
        let (mut fl, _) = build(&cfg, SharedSink::default());
        assert_eq!(fl.summary_interval, Some(Duration::from_millis(1)));

        let mut app = Workload::new(0, 100);
        let mut stamps = vec![fl.last_summary];
        for _ in 0..3 {
            // Each frame lasts 8 ms at 120 fps, past the 1 ms interval.
            fl.frame(&mut app, &mut SilenceProducer);
            stamps.push(fl.last_summary);
        }
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn summary_disabled_with_zero_interval() {
        let (mut fl, _) = build(&fast_config(), SharedSink::default());
        assert_eq!(fl.summary_interval, None);

        let before = fl.last_summary;
        let mut app = Workload::new(0, 100);
        fl.frame(&mut app, &mut SilenceProducer);
        assert_eq!(fl.last_summary, before);
    }

    // ── rate changes ──────────────────────────────────────────────────────

    #[test]
    fn overload_steps_down_and_propagates() {
        let sink = SharedSink::default();
        let (mut fl, _) = build(&fast_config(), sink.clone());
        let spf = fl.audio().state().samples_per_frame;

        // 120 fps with a 0.1 s window needs 12 samples; each frame takes 15 ms.
        // The cooldown holds 90 fps for the remaining frames.
        let mut app = Workload::new(15, 14);
        fl.run(&mut app, &mut SilenceProducer);

        assert_eq!(fl.controller().target_fps(), 90);
        assert_eq!(sink.log.borrow().rates, vec![120, 90]);
        assert_eq!(fl.audio().render_fps(), 90);
        assert_eq!(fl.audio().state().samples_per_frame, spf);
        assert_eq!(app.changes.len(), 1);
        assert!(!app.changes[0].is_step_up());
    }

    #[test]
    fn disabled_controller_keeps_rate() {
        let mut cfg = fast_config();
        cfg.adaptive.enabled = false;
        let sink = SharedSink::default();
        let (mut fl, _) = build(&cfg, sink.clone());

        let mut app = Workload::new(15, 14);
        fl.run(&mut app, &mut SilenceProducer);

        assert_eq!(fl.controller().target_fps(), 120);
        assert_eq!(sink.log.borrow().rates, vec![120]);
        assert_eq!(fl.frame_stats().missed, 14);
    }

    // ── reset policy ──────────────────────────────────────────────────────

    #[test]
    fn display_reset_clears_counters_by_default() {
        let (mut fl, _) = build(&fast_config(), SharedSink::default());
        let mut app = Workload::new(0, 100);
        for _ in 0..3 {
            fl.frame(&mut app, &mut SilenceProducer);
        }
        assert_eq!(fl.controller().state().frames_sampled, 3);

        fl.on_display_reset();
        let s = fl.controller().state();
        assert_eq!(s.frames_sampled, 0);
        assert_eq!(s.frames_since_last_change, 0);
        assert_eq!(s.recent_valid, 0);
        assert_eq!(s.target_fps, 120);
        assert!(fl.clock().last().is_none());
        assert_eq!(fl.frame_stats().count, 3);
    }

    #[test]
    fn code_reload_keeps_counters_by_default() {
        let (mut fl, _) = build(&fast_config(), SharedSink::default());
        let mut app = Workload::new(0, 100);
        for _ in 0..3 {
            fl.frame(&mut app, &mut SilenceProducer);
        }
        let before = fl.controller().state().clone();

        fl.on_code_reload();
        assert_eq!(fl.controller().state(), &before);
    }

    #[test]
    fn reset_policy_is_configurable() {
        let mut cfg = fast_config();
        cfg.reset.on_display_reset = ResetPolicy::Persist;
        cfg.reset.on_code_reload = ResetPolicy::Reset;
        let (mut fl, _) = build(&cfg, SharedSink::default());
        let mut app = Workload::new(0, 100);
        fl.frame(&mut app, &mut SilenceProducer);

        fl.on_display_reset();
        assert_eq!(fl.controller().state().frames_sampled, 1);
        fl.on_code_reload();
        assert_eq!(fl.controller().state().frames_sampled, 0);
    }

    // ── audio failure ─────────────────────────────────────────────────────

    #[test]
    fn muted_session_still_paces() {
        let sim = SimulatedBackend::manual();
        sim.set_fail_open(true);
        let sink = Box::new(HeadlessSink::with_max_fps(60));
        let mut fl = FrameLoop::new(&fast_config(), Box::new(sim), sink);
        let mut app = Workload::new(0, 3);

        let summary = fl.run(&mut app, &mut SilenceProducer);
        assert!(!fl.audio().device_available());
        assert_eq!(fl.sink().max_fps(), Some(60));
        assert_eq!(summary.target_fps, 60);
        assert_eq!(summary.frames.count, 3);
        assert_eq!(summary.audio.frames_written, 0);
        assert_eq!(summary.audio.skipped_ticks, 3);
    }
}
