//! Cadence engine crate.
//!
//! Frame pacing, adaptive target frame rate and audio ring-buffer cursor
//! synchronization for a single-threaded game loop. Windowing, input and
//! rendering live in higher layers and talk to this crate through
//! [`core::App`] and [`core::FrameSink`].

pub mod audio;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod rate;
pub mod telemetry;
pub mod time;
