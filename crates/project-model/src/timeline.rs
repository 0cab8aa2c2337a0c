//! Zoom keyframes, the trimmed segment, and keyframe interpolation.
//!
//! Each keyframe describes the camera state reached at its `time`. The camera
//! eases toward a keyframe over a fixed [`TRANSITION_WINDOW_SECS`] window that
//! ends at the keyframe's time, and holds the last reached target afterwards.

use serde::{Deserialize, Serialize};

use crate::camera::CameraState;

/// Length of the transition window preceding every keyframe, in seconds.
pub const TRANSITION_WINDOW_SECS: f64 = 1.0;

/// Two keyframes closer than this are considered to share a timestamp.
pub const TIME_EPSILON: f64 = 1e-6;

/// Easing curve applied across a transition window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    Linear,
    #[default]
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Apply the easing function. Input is clamped to `[0, 1]`.
    pub fn apply(self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Easing::Linear => x,
            Easing::EaseOut => 1.0 - (1.0 - x).powi(3),
            Easing::EaseInOut => {
                if x < 0.5 {
                    4.0 * x * x * x
                } else {
                    1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// A target camera state reached at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomKeyframe {
    /// Arrival time in source seconds.
    pub time: f64,
    /// Authored transition duration in seconds. Informational: interpolation
    /// always uses the fixed transition window.
    pub duration: f64,
    pub zoom_factor: f64,
    pub position_x: f64,
    pub position_y: f64,
    #[serde(default)]
    pub easing: Easing,
}

impl ZoomKeyframe {
    pub fn new(time: f64, zoom_factor: f64, position_x: f64, position_y: f64) -> Self {
        Self {
            time,
            duration: 0.3,
            zoom_factor,
            position_x,
            position_y,
            easing: Easing::EaseOut,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// The camera state this keyframe targets.
    pub fn camera(&self) -> CameraState {
        CameraState::new(self.zoom_factor, self.position_x, self.position_y)
    }

    /// Check value ranges: finite time, `duration >= 0`, `zoom >= 1`,
    /// positions in `[0, 1]`.
    pub fn validate(&self) -> Result<(), SegmentError> {
        let invalid = |message: String| Err(SegmentError::InvalidKeyframe { message });
        if !self.time.is_finite() || self.time < 0.0 {
            return invalid(format!("time must be a non-negative number, got {}", self.time));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return invalid(format!("duration must be >= 0, got {}", self.duration));
        }
        if !self.zoom_factor.is_finite() || self.zoom_factor < 1.0 {
            return invalid(format!("zoom factor must be >= 1, got {}", self.zoom_factor));
        }
        for (axis, value) in [("x", self.position_x), ("y", self.position_y)] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("position {axis} must be in [0, 1], got {value}"));
            }
        }
        Ok(())
    }
}

/// Resolve the camera state at `time` from keyframes ordered by time.
///
/// Total: empty input or a non-finite `time` yields [`CameraState::IDENTITY`].
/// When the previous keyframe lies within the transition window of the next
/// one, the transition continues from the in-flight state at the previous
/// keyframe's arrival instead of restarting, so densely packed keyframes
/// never jump.
pub fn interpolate(time: f64, keyframes: &[ZoomKeyframe]) -> CameraState {
    if keyframes.is_empty() || !time.is_finite() {
        return CameraState::IDENTITY;
    }

    let idx = keyframes.partition_point(|k| k.time <= time);
    let prev = idx.checked_sub(1).map(|i| &keyframes[i]);
    let next = keyframes.get(idx);

    if let Some(next) = next {
        let window_start = next.time - TRANSITION_WINDOW_SECS;
        if time >= window_start {
            let progress = ((time - window_start) / TRANSITION_WINDOW_SECS).clamp(0.0, 1.0);
            let eased = next.easing.apply(progress);
            let target = next.camera();

            return match prev {
                Some(prev) if next.time - prev.time <= TRANSITION_WINDOW_SECS => {
                    // Re-normalize the remaining part of the curve so it starts
                    // exactly at prev's target when `time == prev.time`.
                    let departed = next
                        .easing
                        .apply((prev.time - window_start) / TRANSITION_WINDOW_SECS);
                    let remaining = 1.0 - departed;
                    let carry = if remaining > TIME_EPSILON {
                        ((1.0 - eased) / remaining).clamp(0.0, 1.0)
                    } else {
                        // The curve has flattened out before prev; ease across
                        // the short gap itself instead.
                        let local = (time - prev.time) / (next.time - prev.time);
                        1.0 - next.easing.apply(local)
                    };
                    CameraState::lerp(&target, &prev.camera(), carry)
                }
                _ => CameraState::lerp(&CameraState::IDENTITY, &target, eased),
            };
        }
    }

    match prev {
        Some(prev) => prev.camera(),
        None => CameraState::IDENTITY,
    }
}

/// The trimmed sub-range of a recording plus its zoom keyframes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSegment {
    pub trim_start: f64,
    pub trim_end: f64,
    #[serde(default)]
    pub keyframes: Vec<ZoomKeyframe>,
}

impl VideoSegment {
    /// Create an empty segment, rejecting an invalid trim range.
    pub fn new(trim_start: f64, trim_end: f64) -> Result<Self, SegmentError> {
        check_trim(trim_start, trim_end)?;
        Ok(Self {
            trim_start,
            trim_end,
            keyframes: Vec::new(),
        })
    }

    /// Length of the trim window in seconds.
    pub fn duration(&self) -> f64 {
        self.trim_end - self.trim_start
    }

    /// Whether `time` lies in `[trim_start, trim_end]`.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.trim_start && time <= self.trim_end
    }

    /// Full consistency check, used when loading persisted segments.
    ///
    /// Keyframes outside the trim window are tolerated; they are never reached
    /// by playback or export.
    pub fn validate(&self, source_duration: f64) -> Result<(), SegmentError> {
        check_trim(self.trim_start, self.trim_end)?;
        if source_duration.is_finite() && self.trim_end > source_duration + TIME_EPSILON {
            return Err(SegmentError::TrimExceedsSource {
                trim_end: self.trim_end,
                source_duration,
            });
        }
        for keyframe in &self.keyframes {
            keyframe.validate()?;
        }
        if let Some(pair) = self
            .keyframes
            .windows(2)
            .find(|w| w[1].time - w[0].time < TIME_EPSILON)
        {
            return Err(SegmentError::UnorderedKeyframes {
                time: pair[1].time,
            });
        }
        Ok(())
    }

    /// Insert a keyframe in time order and return its index.
    ///
    /// A keyframe already at the same timestamp is replaced.
    pub fn add_keyframe(&mut self, keyframe: ZoomKeyframe) -> Result<usize, SegmentError> {
        keyframe.validate()?;
        self.check_in_range(keyframe.time)?;
        Ok(self.insert_sorted(keyframe))
    }

    /// Remove and return the keyframe at `index`.
    pub fn remove_keyframe(&mut self, index: usize) -> Result<ZoomKeyframe, SegmentError> {
        if index >= self.keyframes.len() {
            return Err(SegmentError::IndexOutOfRange {
                index,
                len: self.keyframes.len(),
            });
        }
        Ok(self.keyframes.remove(index))
    }

    /// Move the keyframe at `index` to `new_time`, keeping the list ordered.
    /// Returns the keyframe's new index.
    pub fn move_keyframe(&mut self, index: usize, new_time: f64) -> Result<usize, SegmentError> {
        let Some(existing) = self.keyframes.get(index) else {
            return Err(SegmentError::IndexOutOfRange {
                index,
                len: self.keyframes.len(),
            });
        };
        let moved = ZoomKeyframe {
            time: new_time,
            ..*existing
        };
        moved.validate()?;
        self.check_in_range(new_time)?;

        self.keyframes.remove(index);
        Ok(self.insert_sorted(moved))
    }

    /// Change the trim window. Existing keyframes are kept even if they now
    /// fall outside it.
    pub fn set_trim(&mut self, trim_start: f64, trim_end: f64) -> Result<(), SegmentError> {
        check_trim(trim_start, trim_end)?;
        self.trim_start = trim_start;
        self.trim_end = trim_end;
        Ok(())
    }

    /// Replace all keyframes, e.g. with auto-zoom output. Keyframes are
    /// sorted and same-time duplicates collapse to the later entry.
    pub fn replace_keyframes(&mut self, keyframes: Vec<ZoomKeyframe>) -> Result<(), SegmentError> {
        for keyframe in &keyframes {
            keyframe.validate()?;
        }
        self.keyframes.clear();
        for keyframe in keyframes {
            self.insert_sorted(keyframe);
        }
        Ok(())
    }

    /// Camera state at `time`, clamped to the trim window.
    pub fn camera_at(&self, time: f64) -> CameraState {
        let time = if time.is_finite() {
            time.clamp(self.trim_start, self.trim_end)
        } else {
            self.trim_start
        };
        interpolate(time, &self.keyframes)
    }

    fn check_in_range(&self, time: f64) -> Result<(), SegmentError> {
        if self.contains(time) {
            Ok(())
        } else {
            Err(SegmentError::KeyframeOutOfRange {
                time,
                trim_start: self.trim_start,
                trim_end: self.trim_end,
            })
        }
    }

    fn insert_sorted(&mut self, keyframe: ZoomKeyframe) -> usize {
        if let Some(i) = self
            .keyframes
            .iter()
            .position(|k| (k.time - keyframe.time).abs() < TIME_EPSILON)
        {
            self.keyframes[i] = keyframe;
            return i;
        }
        let idx = self.keyframes.partition_point(|k| k.time < keyframe.time);
        self.keyframes.insert(idx, keyframe);
        idx
    }
}

fn check_trim(trim_start: f64, trim_end: f64) -> Result<(), SegmentError> {
    if !trim_start.is_finite() || !trim_end.is_finite() || trim_start < 0.0 || trim_end <= trim_start
    {
        return Err(SegmentError::InvalidTrim {
            trim_start,
            trim_end,
        });
    }
    Ok(())
}

/// Rejected segment edits.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    #[error("invalid trim range [{trim_start}, {trim_end}]: need 0 <= start < end")]
    InvalidTrim { trim_start: f64, trim_end: f64 },

    #[error("trim end {trim_end}s exceeds source duration {source_duration}s")]
    TrimExceedsSource {
        trim_end: f64,
        source_duration: f64,
    },

    #[error("invalid keyframe: {message}")]
    InvalidKeyframe { message: String },

    #[error("keyframe at {time}s is outside trim range [{trim_start}, {trim_end}]")]
    KeyframeOutOfRange {
        time: f64,
        trim_start: f64,
        trim_end: f64,
    },

    #[error("keyframes are not strictly ordered at {time}s")]
    UnorderedKeyframes { time: f64 },

    #[error("keyframe index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn scenario() -> VideoSegment {
        let mut segment = VideoSegment::new(0.0, 10.0).unwrap();
        segment
            .add_keyframe(ZoomKeyframe::new(5.0, 2.0, 0.5, 0.5).with_duration(0.5))
            .unwrap();
        segment
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::EaseOut, Easing::EaseInOut] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(-3.0), 0.0);
            assert_eq!(easing.apply(7.0), 1.0);
        }
        assert!(approx(Easing::EaseInOut.apply(0.5), 0.5));
        assert!(approx(Easing::EaseOut.apply(0.5), 0.875));
    }

    #[test]
    fn test_easing_serializes_camel_case() {
        let json = serde_json::to_string(&Easing::EaseInOut).unwrap();
        assert_eq!(json, "\"easeInOut\"");
    }

    #[test]
    fn test_scenario_before_window_is_identity() {
        let segment = scenario();
        assert_eq!(segment.camera_at(4.0), CameraState::IDENTITY);
        assert_eq!(segment.camera_at(1.0), CameraState::IDENTITY);
    }

    #[test]
    fn test_scenario_mid_transition_is_partially_eased() {
        let cam = scenario().camera_at(4.7);
        assert!(cam.zoom_factor > 1.0 && cam.zoom_factor < 2.0);
        assert!(approx(cam.zoom_factor, 1.0 + Easing::EaseOut.apply(0.7)));
        assert!(approx(cam.position_x, 0.5));
    }

    #[test]
    fn test_scenario_arrival_and_hold_are_exact() {
        let segment = scenario();
        assert_eq!(segment.camera_at(5.0), CameraState::new(2.0, 0.5, 0.5));
        assert_eq!(segment.camera_at(8.0), CameraState::new(2.0, 0.5, 0.5));
    }

    #[test]
    fn test_empty_and_nan_are_identity() {
        assert_eq!(interpolate(3.0, &[]), CameraState::IDENTITY);
        let keyframes = [ZoomKeyframe::new(1.0, 2.0, 0.2, 0.8)];
        assert_eq!(interpolate(f64::NAN, &keyframes), CameraState::IDENTITY);
    }

    #[test]
    fn test_chained_keyframes_start_from_previous_target() {
        let keyframes = [
            ZoomKeyframe::new(2.0, 2.0, 0.2, 0.2),
            ZoomKeyframe::new(2.5, 3.0, 0.8, 0.8),
        ];
        let at_prev = interpolate(2.0, &keyframes);
        assert_eq!(at_prev, keyframes[0].camera());

        let mid = interpolate(2.25, &keyframes);
        assert!(mid.zoom_factor > 2.0 && mid.zoom_factor < 3.0);
        assert!(mid.position_x > 0.2 && mid.position_x < 0.8);

        assert_eq!(interpolate(2.5, &keyframes), keyframes[1].camera());
    }

    #[test]
    fn test_near_coincident_keyframes_ease_across_the_gap() {
        let keyframes = [
            ZoomKeyframe::new(2.0, 2.0, 0.5, 0.5),
            ZoomKeyframe::new(2.00005, 3.0, 0.5, 0.5),
        ];
        // Arrival at the first keyframe is its own target, not the next one.
        assert_eq!(interpolate(2.0, &keyframes), keyframes[0].camera());

        let mid = interpolate(2.000025, &keyframes);
        assert!(mid.zoom_factor > 2.0 && mid.zoom_factor < 3.0);
        assert!(interpolate(2.00001, &keyframes).zoom_factor < mid.zoom_factor);
        assert_eq!(interpolate(2.00005, &keyframes), keyframes[1].camera());
    }

    #[test]
    fn test_distant_keyframes_restart_from_identity() {
        let keyframes = [
            ZoomKeyframe::new(1.0, 2.0, 0.2, 0.2),
            ZoomKeyframe::new(5.0, 3.0, 0.8, 0.8).with_easing(Easing::Linear),
        ];
        assert_eq!(interpolate(3.0, &keyframes), keyframes[0].camera());
        let half = interpolate(4.5, &keyframes);
        assert!(approx(half.zoom_factor, 2.0));
        assert!(approx(half.position_x, 0.65));
    }

    #[test]
    fn test_add_keyframe_keeps_order_and_replaces_same_time() {
        let mut segment = VideoSegment::new(0.0, 10.0).unwrap();
        segment.add_keyframe(ZoomKeyframe::new(6.0, 2.0, 0.5, 0.5)).unwrap();
        segment.add_keyframe(ZoomKeyframe::new(2.0, 1.5, 0.5, 0.5)).unwrap();
        let idx = segment.add_keyframe(ZoomKeyframe::new(4.0, 1.0, 0.5, 0.5)).unwrap();
        assert_eq!(idx, 1);

        let replaced = segment.add_keyframe(ZoomKeyframe::new(6.0, 3.0, 0.1, 0.1)).unwrap();
        assert_eq!(replaced, 2);
        assert_eq!(segment.keyframes.len(), 3);
        assert_eq!(segment.keyframes[2].zoom_factor, 3.0);
        assert!(segment.validate(10.0).is_ok());
    }

    #[test]
    fn test_edits_reject_invalid_input() {
        let mut segment = VideoSegment::new(1.0, 5.0).unwrap();
        assert!(matches!(
            segment.add_keyframe(ZoomKeyframe::new(6.0, 2.0, 0.5, 0.5)),
            Err(SegmentError::KeyframeOutOfRange { .. })
        ));
        assert!(matches!(
            segment.add_keyframe(ZoomKeyframe::new(2.0, 0.5, 0.5, 0.5)),
            Err(SegmentError::InvalidKeyframe { .. })
        ));
        assert!(matches!(
            segment.add_keyframe(ZoomKeyframe::new(2.0, 2.0, 1.5, 0.5)),
            Err(SegmentError::InvalidKeyframe { .. })
        ));
        assert!(matches!(
            segment.remove_keyframe(0),
            Err(SegmentError::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert!(segment.set_trim(3.0, 3.0).is_err());
        assert!(VideoSegment::new(-1.0, 2.0).is_err());
        assert!(VideoSegment::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_move_keyframe_resorts() {
        let mut segment = VideoSegment::new(0.0, 10.0).unwrap();
        segment.add_keyframe(ZoomKeyframe::new(2.0, 2.0, 0.5, 0.5)).unwrap();
        segment.add_keyframe(ZoomKeyframe::new(4.0, 3.0, 0.5, 0.5)).unwrap();

        let idx = segment.move_keyframe(0, 8.0).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(segment.keyframes[0].time, 4.0);
        assert_eq!(segment.keyframes[1].zoom_factor, 2.0);
        assert!(segment.move_keyframe(0, 11.0).is_err());
        assert_eq!(segment.keyframes.len(), 2);
    }

    #[test]
    fn test_validate_checks_source_duration() {
        let segment = VideoSegment::new(0.0, 12.0).unwrap();
        assert!(matches!(
            segment.validate(10.0),
            Err(SegmentError::TrimExceedsSource { .. })
        ));
        assert!(segment.validate(12.0).is_ok());
    }

    #[test]
    fn test_camera_at_clamps_to_trim() {
        let mut segment = VideoSegment::new(2.0, 6.0).unwrap();
        segment.add_keyframe(ZoomKeyframe::new(2.0, 2.0, 0.3, 0.3)).unwrap();
        assert_eq!(segment.camera_at(-50.0), CameraState::new(2.0, 0.3, 0.3));
        assert_eq!(segment.camera_at(f64::NAN), CameraState::new(2.0, 0.3, 0.3));
    }

    #[test]
    fn test_replace_keyframes_sorts_and_dedupes() {
        let mut segment = VideoSegment::new(0.0, 10.0).unwrap();
        segment
            .replace_keyframes(vec![
                ZoomKeyframe::new(3.0, 2.0, 0.5, 0.5),
                ZoomKeyframe::new(1.0, 1.0, 0.5, 0.5),
                ZoomKeyframe::new(3.0, 2.5, 0.5, 0.5),
            ])
            .unwrap();
        assert_eq!(segment.keyframes.len(), 2);
        assert_eq!(segment.keyframes[0].time, 1.0);
        assert_eq!(segment.keyframes[1].zoom_factor, 2.5);
    }

    #[test]
    fn test_segment_serialization() {
        let segment = scenario();
        let json = serde_json::to_string(&segment).unwrap();
        assert!(json.contains("\"easing\":\"easeOut\""));
        let parsed: VideoSegment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, segment);
    }
}
