/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameCtx {
    pub frame_index: u64,

    /// Previous frame's duration clamped to [`DT_MAX`](crate::time::DT_MAX).
    pub dt: f64,

    /// Current adaptive render rate.
    pub target_fps: u32,

    /// Fixed simulation rate; does not follow `target_fps`.
    pub game_update_hz: u32,
}

impl FrameCtx {
    /// Fixed simulation step in seconds.
    pub fn update_dt(&self) -> f64 {
        1.0 / self.game_update_hz.max(1) as f64
    }

    pub fn target_seconds_per_frame(&self) -> f64 {
        1.0 / self.target_fps.max(1) as f64
    }
}
