//! Clocks and frame pacing.
//!
//! Two notions of time flow through Reframe:
//! - **Media time**: a position in the recording, driven by seeks and playback.
//! - **Animation time**: a monotonic clock that drives UI micro-animations
//!   (cursor click squish). Preview reads it from the wall clock; export
//!   advances a [`VirtualClock`] by exactly one frame per rendered frame so
//!   the animation is reproducible.

use std::time::{Duration, Instant};

/// A monotonic source of seconds for animation state.
pub trait Clock {
    /// Seconds elapsed since the clock's epoch. Never decreases.
    fn now_secs(&self) -> f64;
}

/// Wall-clock time anchored to the moment a preview session started.
#[derive(Debug, Clone)]
pub struct SessionClock {
    epoch: Instant,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Clock for SessionClock {
    fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Frame-counting clock for non-real-time rendering.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    fps: u32,
    frame: u64,
}

impl VirtualClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frame: 0,
        }
    }

    /// Advance by one frame.
    pub fn tick(&mut self) {
        self.frame += 1;
    }

    /// Number of frames elapsed.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Duration of one frame in seconds.
    pub fn frame_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }
}

impl Clock for VirtualClock {
    fn now_secs(&self) -> f64 {
        self.frame as f64 / self.fps as f64
    }
}

/// Tick period for display-refresh driven loops.
#[derive(Debug, Clone, Copy)]
pub struct RateController {
    target_interval_ns: u64,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
        }
    }

    /// Target interval between ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.target_interval_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_clock_is_monotonic() {
        let clock = SessionClock::start();
        let a = clock.now_secs();
        let b = clock.now_secs();
        assert!(b >= a);
        assert!(a < 1.0);
    }

    #[test]
    fn test_virtual_clock_advances_one_frame_per_tick() {
        let mut clock = VirtualClock::new(60);
        assert_eq!(clock.now_secs(), 0.0);
        for _ in 0..30 {
            clock.tick();
        }
        assert_eq!(clock.frame(), 30);
        assert!((clock.now_secs() - 0.5).abs() < 1e-12);
        assert!((clock.frame_secs() - 1.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_rate_controller_interval() {
        assert_eq!(RateController::new(60).interval(), Duration::from_nanos(16_666_666));
        assert_eq!(RateController::new(0).interval(), Duration::from_secs(1));
    }
}
