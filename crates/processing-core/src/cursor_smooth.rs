//! Cursor position smoothing for the rendered overlay.
//!
//! Raw telemetry is noisy and lags the picture by about a frame. The smoother
//! looks slightly ahead of the requested instant and averages the samples
//! around it, weighting each by its closeness in time.

use reframe_project_model::camera::Point2D;
use reframe_project_model::cursor::{nearest_sample, samples_between, CursorSample};

/// Reference frame rate the smoothing window is expressed in.
const SMOOTHING_FPS: f64 = 30.0;

/// Inverse-time-distance weighted cursor lookup.
#[derive(Debug, Clone, Copy)]
pub struct CursorSmoother {
    smoothness: f64,
    playback_speed: f64,
}

impl CursorSmoother {
    /// `smoothness` in `[0, 10]`; `playback_speed` is the active speed
    /// multiplier. Faster playback narrows the window.
    pub fn new(smoothness: f64, playback_speed: f64) -> Self {
        Self {
            smoothness: smoothness.clamp(0.0, 10.0),
            playback_speed: if playback_speed.is_finite() && playback_speed > 0.0 {
                playback_speed
            } else {
                1.0
            },
        }
    }

    /// Lookahead applied to the requested instant.
    pub fn lookahead_secs() -> f64 {
        1.0 / SMOOTHING_FPS
    }

    /// Full width of the averaging window in seconds. Never below two
    /// reference frames.
    pub fn window_secs(&self) -> f64 {
        (self.smoothness - self.playback_speed * 2.0).max(2.0) / SMOOTHING_FPS
    }

    /// Smoothed position at `time`, or `None` without samples.
    ///
    /// `samples` must be ordered by timestamp.
    pub fn position_at(&self, samples: &[CursorSample], time: f64) -> Option<Point2D> {
        if samples.is_empty() || !time.is_finite() {
            return samples.first().map(CursorSample::position);
        }

        let target = time + Self::lookahead_secs();
        let half = self.window_secs() / 2.0;
        let window = samples_between(samples, target - half, target + half);

        if window.is_empty() {
            return nearest_sample(samples, target).map(CursorSample::position);
        }

        let (mut sum_x, mut sum_y, mut sum_w) = (0.0, 0.0, 0.0);
        for sample in window {
            let weight = 1.0 / ((sample.timestamp - target).abs() + 0.1);
            sum_x += sample.x * weight;
            sum_y += sample.y * weight;
            sum_w += weight;
        }
        Some(Point2D::new(sum_x / sum_w, sum_y / sum_w))
    }
}

impl Default for CursorSmoother {
    fn default() -> Self {
        Self::new(5.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jittery() -> Vec<CursorSample> {
        (0..60)
            .map(|i| {
                let jitter = if i % 2 == 0 { 4.0 } else { -4.0 };
                CursorSample::moved(i as f64 / 60.0, 500.0 + jitter, 300.0 - jitter)
            })
            .collect()
    }

    #[test]
    fn test_window_shrinks_with_speed_but_has_floor() {
        let slow = CursorSmoother::new(10.0, 0.5);
        let fast = CursorSmoother::new(10.0, 2.0);
        assert!((slow.window_secs() - 9.0 / 30.0).abs() < 1e-12);
        assert!((fast.window_secs() - 6.0 / 30.0).abs() < 1e-12);

        let floor = CursorSmoother::new(0.0, 1.0);
        assert!((floor.window_secs() - 2.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average_reduces_jitter() {
        let samples = jittery();
        let smoother = CursorSmoother::new(10.0, 0.5);
        let p = smoother.position_at(&samples, 0.5).unwrap();
        assert!((p.x - 500.0).abs() < 4.0);
        assert!((p.y - 300.0).abs() < 4.0);
    }

    #[test]
    fn test_falls_back_to_nearest_sample() {
        let samples = vec![
            CursorSample::moved(0.0, 10.0, 10.0),
            CursorSample::moved(5.0, 90.0, 90.0),
        ];
        let smoother = CursorSmoother::default();
        let p = smoother.position_at(&samples, 4.0).unwrap();
        assert_eq!(p, Point2D::new(90.0, 90.0));
        let p = smoother.position_at(&samples, 100.0).unwrap();
        assert_eq!(p, Point2D::new(90.0, 90.0));
    }

    #[test]
    fn test_single_sample_in_window_is_exact() {
        let samples = vec![CursorSample::moved(1.0, 42.0, 24.0)];
        let p = CursorSmoother::default().position_at(&samples, 1.0).unwrap();
        assert!((p.x - 42.0).abs() < 1e-9);
        assert!((p.y - 24.0).abs() < 1e-9);
        assert!(CursorSmoother::default().position_at(&[], 1.0).is_none());
    }
}
