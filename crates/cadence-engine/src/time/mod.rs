//! Time subsystem.
//!
//! Provides frame pacing without coupling to the windowing layer.
//! Intended usage, once per loop iteration:
//! `begin()` → work → `mark_work_done()` → `sleep_until_target()` → `end()`

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTiming, WaitOutcome, DT_MAX};
