//! Core engine-facing contracts.
//!
//! Defines the interface between the frame loop and higher layers (game
//! code, windowing, tools), and the [`FrameLoop`] context object that owns
//! every piece of per-session pacing and audio state.

mod app;
mod ctx;
mod frame_loop;
mod frame_sink;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
pub use frame_loop::FrameLoop;
pub use frame_sink::{FrameSink, HeadlessSink};
