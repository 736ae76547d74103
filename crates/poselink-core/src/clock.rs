//! Frame clock shared by the receive path and smoothing

use std::time::{Duration, Instant};

/// Largest step a single tick may report
pub const MAX_FRAME_STEP: Duration = Duration::from_millis(100);

/// Monotonic frame clock producing per-tick deltas.
/// INVARIANT: deltas are never negative and never exceed `max_step`
pub struct FrameClock {
    /// Accumulated (clamped) time
    elapsed: Duration,
    /// Last update instant
    last_update: Instant,
    /// Clamp for a single step
    max_step: Duration,
}

impl FrameClock {
    /// Create a new clock starting at zero
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        FrameClock {
            elapsed: Duration::ZERO,
            last_update: now,
            max_step: MAX_FRAME_STEP,
        }
    }

    pub fn with_max_step(mut self, max_step: Duration) -> Self {
        self.max_step = max_step;
        self
    }

    /// Advance to the current instant and return the frame delta
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    /// Advance to `now` and return the frame delta
    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let raw = now.saturating_duration_since(self.last_update);

        // Clamp to prevent large jumps (e.g., after system sleep)
        let dt = raw.min(self.max_step);

        self.elapsed = self.elapsed.saturating_add(dt);
        if now > self.last_update {
            self.last_update = now;
        }
        dt
    }

    /// Total clamped time since creation
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reports_delta() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);

        let dt = clock.tick_at(start + Duration::from_millis(16));
        assert_eq!(dt, Duration::from_millis(16));
        assert_eq!(clock.elapsed(), Duration::from_millis(16));
    }

    #[test]
    fn test_large_jump_is_clamped() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);

        let dt = clock.tick_at(start + Duration::from_secs(30));
        assert_eq!(dt, MAX_FRAME_STEP);
    }

    #[test]
    fn test_backwards_instant_yields_zero() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut clock = FrameClock::starting_at(start);

        let dt = clock.tick_at(start - Duration::from_millis(500));
        assert_eq!(dt, Duration::ZERO);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
