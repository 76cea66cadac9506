use super::MIN_FPS;

/// Ordered set of discrete target rates, bounded by the platform maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpsLadder {
    steps: Vec<u32>,
    max_fps: u32,
}

impl FpsLadder {
    /// Builds a ladder; `steps` are sorted and deduplicated.
    pub fn new(mut steps: Vec<u32>, platform_max_fps: u32) -> Self {
        steps.sort_unstable();
        steps.dedup();
        Self {
            steps,
            max_fps: platform_max_fps.max(MIN_FPS),
        }
    }

    pub fn steps(&self) -> &[u32] {
        &self.steps
    }

    pub fn max_fps(&self) -> u32 {
        self.max_fps
    }

    /// Bounds an arbitrary rate to `[MIN_FPS, max_fps]`.
    pub fn clamp(&self, fps: u32) -> u32 {
        fps.clamp(MIN_FPS, self.max_fps)
    }

    /// Next rate above `current`, clamped to the platform maximum.
    ///
    /// `None` when already at the maximum or the top of the ladder.
    pub fn step_up(&self, current: u32) -> Option<u32> {
        let next = self.steps.iter().copied().find(|&s| s > current)?;
        let next = next.min(self.max_fps);
        (next > current).then_some(next)
    }

    /// Next rate below `current`, never below [`MIN_FPS`].
    pub fn step_down(&self, current: u32) -> Option<u32> {
        let next = self
            .steps
            .iter()
            .rev()
            .copied()
            .find(|&s| s < current)
            .unwrap_or(MIN_FPS)
            .max(MIN_FPS);
        (next < current).then_some(next)
    }
}

impl Default for FpsLadder {
    fn default() -> Self {
        Self::new(vec![30, 45, 60, 90, 120], 120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── step_up ───────────────────────────────────────────────────────────

    #[test]
    fn step_up_walks_the_ladder() {
        let l = FpsLadder::default();
        assert_eq!(l.step_up(30), Some(45));
        assert_eq!(l.step_up(60), Some(90));
        assert_eq!(l.step_up(120), None);
    }

    #[test]
    fn step_up_clamps_to_platform_max() {
        let l = FpsLadder::new(vec![30, 45, 60, 90, 120], 75);
        assert_eq!(l.step_up(60), Some(75));
        assert_eq!(l.step_up(75), None);
    }

    #[test]
    fn step_up_from_off_ladder_rate() {
        let l = FpsLadder::default();
        assert_eq!(l.step_up(50), Some(60));
    }

    // ── step_down ─────────────────────────────────────────────────────────

    #[test]
    fn step_down_walks_the_ladder() {
        let l = FpsLadder::default();
        assert_eq!(l.step_down(120), Some(90));
        assert_eq!(l.step_down(60), Some(45));
        assert_eq!(l.step_down(45), Some(30));
    }

    #[test]
    fn step_down_stops_at_floor() {
        let l = FpsLadder::default();
        assert_eq!(l.step_down(30), None);
    }

    #[test]
    fn step_down_from_clamped_rate() {
        let l = FpsLadder::new(vec![30, 45, 60, 90, 120], 75);
        assert_eq!(l.step_down(75), Some(60));
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn platform_max_never_below_floor() {
        let l = FpsLadder::new(vec![30, 60], 10);
        assert_eq!(l.max_fps(), MIN_FPS);
        assert_eq!(l.clamp(60), MIN_FPS);
    }

    #[test]
    fn steps_are_sorted() {
        let l = FpsLadder::new(vec![60, 30, 45, 60], 120);
        assert_eq!(l.steps(), &[30, 45, 60]);
    }
}
