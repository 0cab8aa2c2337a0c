//! Cursor telemetry recorded alongside the screen capture.
//!
//! Samples are stored in append-only JSONL (one sample per line) and are
//! read-only once the recording stops. Coordinates are in source pixels.

use serde::{Deserialize, Serialize};

/// A single recorded pointer sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorSample {
    /// X coordinate in source pixels.
    pub x: f64,
    /// Y coordinate in source pixels.
    pub y: f64,
    /// Seconds since recording start.
    #[serde(rename = "t")]
    pub timestamp: f64,
    /// Whether a button press was observed at this sample.
    #[serde(default)]
    pub clicked: bool,
}

impl CursorSample {
    /// A plain movement sample.
    pub fn moved(timestamp: f64, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            timestamp,
            clicked: false,
        }
    }

    /// A sample carrying a click.
    pub fn click(timestamp: f64, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            timestamp,
            clicked: true,
        }
    }

    pub fn position(&self) -> crate::camera::Point2D {
        crate::camera::Point2D::new(self.x, self.y)
    }
}

/// Samples with `start <= timestamp <= end`.
///
/// `samples` must be ordered by timestamp.
pub fn samples_between(samples: &[CursorSample], start: f64, end: f64) -> &[CursorSample] {
    let lo = samples.partition_point(|s| s.timestamp < start);
    let hi = samples.partition_point(|s| s.timestamp <= end);
    if lo >= hi {
        &[]
    } else {
        &samples[lo..hi]
    }
}

/// The sample closest in time to `timestamp`. Ties resolve to the earlier one.
pub fn nearest_sample(samples: &[CursorSample], timestamp: f64) -> Option<&CursorSample> {
    let idx = samples.partition_point(|s| s.timestamp < timestamp);
    let after = samples.get(idx);
    let before = idx.checked_sub(1).and_then(|i| samples.get(i));
    match (before, after) {
        (Some(b), Some(a)) => {
            if (timestamp - b.timestamp) <= (a.timestamp - timestamp) {
                Some(b)
            } else {
                Some(a)
            }
        }
        (Some(b), None) => Some(b),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// Whether the samples are ordered by non-decreasing timestamp.
pub fn is_time_ordered(samples: &[CursorSample]) -> bool {
    samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Parse samples from JSONL content (one JSON object per line).
///
/// Blank lines and `#` comment lines are skipped.
pub fn parse_samples(jsonl: &str) -> Result<Vec<CursorSample>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize samples to JSONL format.
pub fn serialize_samples(samples: &[CursorSample]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for sample in samples {
        output.push_str(&serde_json::to_string(sample)?);
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Vec<CursorSample> {
        vec![
            CursorSample::moved(0.0, 10.0, 10.0),
            CursorSample::moved(0.5, 20.0, 10.0),
            CursorSample::click(1.0, 30.0, 10.0),
            CursorSample::moved(1.5, 40.0, 10.0),
        ]
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let samples = track();
        let jsonl = serialize_samples(&samples).unwrap();
        assert_eq!(jsonl.lines().count(), 4);
        assert_eq!(parse_samples(&jsonl).unwrap(), samples);
    }

    #[test]
    fn test_parse_skips_comments_and_defaults_clicked() {
        let jsonl = "# {\"schema_version\":\"1.0\"}\n\n{\"x\":5.0,\"y\":6.0,\"t\":0.25}\n";
        let parsed = parse_samples(jsonl).unwrap();
        assert_eq!(parsed, vec![CursorSample::moved(0.25, 5.0, 6.0)]);
    }

    #[test]
    fn test_samples_between_is_inclusive() {
        let samples = track();
        let window = samples_between(&samples, 0.5, 1.0);
        assert_eq!(window.len(), 2);
        assert!(window[1].clicked);
        assert!(samples_between(&samples, 3.0, 4.0).is_empty());
        assert!(samples_between(&samples, 1.0, 0.0).is_empty());
    }

    #[test]
    fn test_nearest_sample_clamps_to_ends() {
        let samples = track();
        assert_eq!(nearest_sample(&samples, -5.0).unwrap().timestamp, 0.0);
        assert_eq!(nearest_sample(&samples, 99.0).unwrap().timestamp, 1.5);
        assert_eq!(nearest_sample(&samples, 0.9).unwrap().timestamp, 1.0);
        assert!(nearest_sample(&[], 1.0).is_none());
    }

    #[test]
    fn test_time_ordering_check() {
        let mut samples = track();
        assert!(is_time_ordered(&samples));
        samples.swap(0, 3);
        assert!(!is_time_ordered(&samples));
    }
}
