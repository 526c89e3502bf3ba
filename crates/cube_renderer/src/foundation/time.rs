//! Time management utilities

use std::time::Instant;

/// Wall clock for the render loop: elapsed seconds since start plus a frame counter
pub struct FrameClock {
    start: Instant,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Start a new clock
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_count: 0,
        }
    }

    /// Advance to the next frame and return its 1-based number
    pub fn tick(&mut self) -> u64 {
        self.frame_count += 1;
        self.frame_count
    }

    /// Seconds elapsed since the clock started
    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Number of frames ticked so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Restart from zero
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.frame_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.frame_count(), 2);
        clock.reset();
        assert_eq!(clock.frame_count(), 0);
        assert!(clock.elapsed_seconds() >= 0.0);
    }
}
