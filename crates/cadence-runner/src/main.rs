use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use cadence_engine::audio::{AudioBackend, SineProducer};
use cadence_engine::config::EngineConfig;
use cadence_engine::core::{App, AppControl, FrameCtx, FrameLoop, HeadlessSink};
use cadence_engine::logging::init_logging;
use cadence_engine::rate::RateChange;

const DEFAULT_RUN_SECONDS: u64 = 10;

/// Refresh ceiling reported by the headless display.
const DISPLAY_MAX_FPS: u32 = 120;

/// Alternates light and heavy phases so the adaptive controller has
/// something to react to.
struct SyntheticLoad {
    light: Duration,
    heavy: Duration,
    phase_frames: u64,
}

impl App for SyntheticLoad {
    fn on_frame(&mut self, ctx: &mut FrameCtx) -> AppControl {
        let heavy = (ctx.frame_index / self.phase_frames) % 2 == 1;
        std::thread::sleep(if heavy { self.heavy } else { self.light });
        AppControl::Continue
    }

    fn on_rate_change(&mut self, change: &RateChange) {
        log::info!("workload now paced at {} fps", change.to);
    }
}

fn backend() -> Box<dyn AudioBackend> {
    #[cfg(feature = "cpal")]
    {
        Box::new(cadence_engine::audio::CpalBackend::new())
    }
    #[cfg(not(feature = "cpal"))]
    {
        Box::new(cadence_engine::audio::SimulatedBackend::realtime())
    }
}

fn main() -> Result<()> {
    // Usage: cadence-runner [config.toml] [seconds]
    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    let seconds = match args.next() {
        Some(s) => s
            .parse::<u64>()
            .with_context(|| format!("invalid run length `{s}`"))?,
        None => DEFAULT_RUN_SECONDS,
    };

    init_logging(config.logging_config());

    let sink = Box::new(HeadlessSink::with_max_fps(DISPLAY_MAX_FPS));
    let mut frame_loop = FrameLoop::new(&config, backend(), sink);
    let mut app = SyntheticLoad {
        light: Duration::from_millis(2),
        heavy: Duration::from_millis(20),
        phase_frames: 300,
    };
    let mut tone = SineProducer::new(440.0, 3_000);

    let run_for = Duration::from_secs(seconds);
    let started = Instant::now();
    let mut reset_done = false;

    while started.elapsed() < run_for {
        if frame_loop.frame(&mut app, &mut tone) == AppControl::Exit {
            break;
        }
        if !reset_done && started.elapsed() >= run_for / 2 {
            frame_loop.on_display_reset();
            reset_done = true;
        }
    }

    frame_loop.summary().log();
    Ok(())
}
