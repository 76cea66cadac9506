use crate::rate::RateChange;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
pub trait App {
    /// Called once per frame, before audio is produced for that frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx) -> AppControl;

    /// Called after the target rate changed, once the sink and audio clock
    /// have been updated.
    fn on_rate_change(&mut self, change: &RateChange) {
        let _ = change;
    }
}
