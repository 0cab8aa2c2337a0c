//! Auto-zoom: synthesize zoom keyframes from click telemetry.
//!
//! # Algorithm
//!
//! 1. **Extract** clicks inside the trim window, skipping a short warm-up.
//! 2. **Group** click bursts into their first click.
//! 3. **De-duplicate** spatially: keep a click only if it is far enough from
//!    every click kept before it; cap the total.
//! 4. **Score** a zoom factor per click from cursor activity around it, then
//!    step it down until nearby cursor motion stays comfortably in view.
//! 5. **Emit** zoom-out / zoom-in keyframe pairs and a final zoom-out, with
//!    hold keyframes parking a zoomed camera across gaps longer than the
//!    interpolation window.
//!
//! Pure and total: degenerate input yields an empty keyframe list.

use std::borrow::Cow;

use reframe_project_model::camera::{FrameSize, Point2D};
use reframe_project_model::cursor::{samples_between, CursorSample};
use reframe_project_model::timeline::{
    Easing, VideoSegment, ZoomKeyframe, TIME_EPSILON, TRANSITION_WINDOW_SECS,
};
use serde::{Deserialize, Serialize};

/// Bumped whenever a default or the scoring formula changes.
pub const AUTO_ZOOM_CONFIG_VERSION: u32 = 2;

/// Every tunable of the auto-zoom heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoZoomConfig {
    pub version: u32,

    /// Clicks earlier than `trim_start + warmup_secs` are ignored.
    pub warmup_secs: f64,
    /// Clicks within this many seconds of a burst's first click join it.
    pub click_group_secs: f64,
    /// Minimum distance between kept candidates (source px).
    pub min_distance: f64,
    pub max_zooms: usize,

    /// Half-width of the activity analysis window around a click.
    pub analysis_window_secs: f64,

    pub min_zoom_factor: f64,
    /// Base zoom before boosts and damping.
    pub max_zoom_factor: f64,
    /// Upper bound reachable through boosts.
    pub zoom_ceiling: f64,

    /// Activity (px/s) at which the hover score reaches zero.
    pub hover_activity_scale: f64,
    /// Hover score above which the hover boost kicks in.
    pub hover_threshold: f64,
    /// Maximum relative hover boost.
    pub hover_max_boost: f64,

    /// Clicks per second that earn the full click-intensity boost.
    pub click_intensity_saturation: f64,

    pub pause_sample_count: usize,
    pub pause_min_span_secs: f64,
    pub pause_max_activity: f64,
    pub pause_multiplier: f64,

    pub double_click_secs: f64,
    pub double_click_multiplier: f64,

    pub intentional_min_speed: f64,
    pub intentional_max_reversal_rate: f64,
    pub intentional_damping: f64,
    pub erratic_damping: f64,

    /// Fraction of each frame dimension treated as the edge zone.
    pub edge_buffer: f64,
    /// Activity (px/s) at which the activity reduction saturates.
    pub activity_threshold: f64,
    /// Share of the span above the floor removed at saturated activity.
    pub activity_blend: f64,

    /// Padding kept between any nearby sample and the viewport edge, in
    /// on-screen pixels at the chosen zoom.
    pub safety_margin_px: f64,
    pub safety_step: f64,
    /// Pull of the viewport center toward the screen center, in `[0, 1]`.
    pub center_bias: f64,

    pub min_time_for_zoom_out: f64,
    pub zoom_out_lead_secs: f64,
    pub zoom_in_lead_secs: f64,
    pub transition_secs: f64,
    /// Delay after the last click before the final zoom-out; also the
    /// minimum remaining segment length for it to be emitted.
    pub final_zoom_out_delay_secs: f64,
}

impl Default for AutoZoomConfig {
    fn default() -> Self {
        Self {
            version: AUTO_ZOOM_CONFIG_VERSION,
            warmup_secs: 1.0,
            click_group_secs: 0.5,
            min_distance: 150.0,
            max_zooms: 15,
            analysis_window_secs: 1.5,
            min_zoom_factor: 1.3,
            max_zoom_factor: 3.2,
            zoom_ceiling: 3.8,
            hover_activity_scale: 100.0,
            hover_threshold: 0.7,
            hover_max_boost: 0.15,
            click_intensity_saturation: 2.0,
            pause_sample_count: 5,
            pause_min_span_secs: 1.2,
            pause_max_activity: 10.0,
            pause_multiplier: 1.4,
            double_click_secs: 0.3,
            double_click_multiplier: 1.5,
            intentional_min_speed: 400.0,
            intentional_max_reversal_rate: 0.3,
            intentional_damping: 0.9,
            erratic_damping: 0.7,
            edge_buffer: 0.15,
            activity_threshold: 600.0,
            activity_blend: 0.6,
            safety_margin_px: 250.0,
            safety_step: 0.05,
            center_bias: 0.45,
            min_time_for_zoom_out: 0.8,
            zoom_out_lead_secs: 0.5,
            zoom_in_lead_secs: 0.2,
            transition_secs: 0.3,
            final_zoom_out_delay_secs: 1.0,
        }
    }
}

/// Cursor behavior measured around a candidate click.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ActivitySignals {
    /// Path length over elapsed time (px/s).
    pub activity: f64,
    /// Stillness in `[0, 1]`.
    pub hover: f64,
    /// Clicks per second.
    pub click_intensity: f64,
    pub dramatic_pause: bool,
    pub intentional: bool,
    pub double_click: bool,
}

/// A click kept for zooming, with its scored framing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomCandidate {
    pub time: f64,
    pub point: Point2D,
    pub signals: ActivitySignals,
    /// Zoom factor after scoring and the safety clamp.
    pub zoom_factor: f64,
    /// Normalized crop position matching the compositor's transform.
    pub position_x: f64,
    pub position_y: f64,
}

/// The auto-zoom generator.
#[derive(Debug, Clone, Default)]
pub struct AutoZoomGenerator {
    config: AutoZoomConfig,
}

impl AutoZoomGenerator {
    pub fn new(config: AutoZoomConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AutoZoomConfig {
        &self.config
    }

    /// Generate keyframes for `segment`, ordered by time.
    pub fn generate(
        &self,
        segment: &VideoSegment,
        samples: &[CursorSample],
        frame: FrameSize,
    ) -> Vec<ZoomKeyframe> {
        self.generate_with_candidates(segment, samples, frame).0
    }

    /// Generate keyframes and return the scored candidates behind them.
    pub fn generate_with_candidates(
        &self,
        segment: &VideoSegment,
        samples: &[CursorSample],
        frame: FrameSize,
    ) -> (Vec<ZoomKeyframe>, Vec<ZoomCandidate>) {
        let span = segment.duration();
        if frame.is_empty() || span.is_nan() || span <= 0.0 {
            return (vec![], vec![]);
        }
        let samples = ordered_finite(samples);

        let clicks = self.extract_clicks(segment, &samples);
        let grouped = self.group_clicks(&clicks);
        let kept = self.dedupe_spatially(&grouped);

        let candidates: Vec<ZoomCandidate> = kept
            .iter()
            .map(|click| self.score_candidate(click, &samples, frame))
            .collect();

        let keyframes = self.emit_keyframes(segment, &candidates);
        tracing::debug!(
            clicks = clicks.len(),
            groups = grouped.len(),
            candidates = candidates.len(),
            keyframes = keyframes.len(),
            "Auto-zoom analysis complete"
        );
        (keyframes, candidates)
    }

    /// Clicks inside `[trim_start + warmup, trim_end]`.
    pub fn extract_clicks(
        &self,
        segment: &VideoSegment,
        samples: &[CursorSample],
    ) -> Vec<CursorSample> {
        let start = segment.trim_start + self.config.warmup_secs;
        samples
            .iter()
            .filter(|s| s.clicked && s.timestamp >= start && s.timestamp <= segment.trim_end)
            .copied()
            .collect()
    }

    /// Collapse each burst of clicks into its first click. A click joins the
    /// current burst when it lies within the grouping interval of the burst's
    /// first click, so a steady click train still splits into bursts.
    pub fn group_clicks(&self, clicks: &[CursorSample]) -> Vec<CursorSample> {
        let mut groups: Vec<CursorSample> = vec![];
        for click in clicks {
            match groups.last() {
                Some(first) if click.timestamp - first.timestamp <= self.config.click_group_secs => {}
                _ => groups.push(*click),
            }
        }
        groups
    }

    /// Greedy, order-preserving spatial de-duplication.
    pub fn dedupe_spatially(&self, clicks: &[CursorSample]) -> Vec<CursorSample> {
        let mut kept: Vec<CursorSample> = vec![];
        for click in clicks {
            if kept.len() >= self.config.max_zooms {
                break;
            }
            let point = click.position();
            if kept
                .iter()
                .all(|k| k.position().distance_to(&point) >= self.config.min_distance)
            {
                kept.push(*click);
            }
        }
        kept
    }

    /// Measure cursor behavior in the analysis window around `click`.
    pub fn measure(&self, click: &CursorSample, samples: &[CursorSample]) -> ActivitySignals {
        let cfg = &self.config;
        let half = cfg.analysis_window_secs;
        let window = samples_between(samples, click.timestamp - half, click.timestamp + half);

        let activity = path_speed(window);
        let hover = (1.0 - activity / cfg.hover_activity_scale).max(0.0);

        let clicks_in_window = window.iter().filter(|s| s.clicked).count();
        let click_intensity = clicks_in_window as f64 / (2.0 * half).max(f64::EPSILON);

        let dramatic_pause = {
            let upto = samples.partition_point(|s| s.timestamp <= click.timestamp);
            let n = cfg.pause_sample_count;
            if n >= 2 && upto >= n {
                let recent = &samples[upto - n..upto];
                let span = recent[n - 1].timestamp - recent[0].timestamp;
                span >= cfg.pause_min_span_secs && path_speed(recent) < cfg.pause_max_activity
            } else {
                false
            }
        };

        let intentional = activity >= cfg.intentional_min_speed
            && reversal_rate(window) < cfg.intentional_max_reversal_rate;

        let double_click = window
            .iter()
            .filter(|s| s.clicked)
            .collect::<Vec<_>>()
            .windows(2)
            .any(|w| w[1].timestamp - w[0].timestamp < cfg.double_click_secs);

        ActivitySignals {
            activity,
            hover,
            click_intensity,
            dramatic_pause,
            intentional,
            double_click,
        }
    }

    /// Combine signals into a zoom factor before the safety clamp.
    pub fn score(&self, signals: &ActivitySignals, point: Point2D, frame: FrameSize) -> f64 {
        let cfg = &self.config;
        let floor = cfg.min_zoom_factor;
        let mut zoom = cfg.max_zoom_factor;

        if signals.dramatic_pause {
            zoom *= cfg.pause_multiplier;
        }

        let intensity = (signals.click_intensity / cfg.click_intensity_saturation).min(1.0);
        zoom += (cfg.zoom_ceiling - cfg.max_zoom_factor).max(0.0) * intensity;

        if signals.double_click {
            zoom *= cfg.double_click_multiplier;
        }

        if signals.hover > cfg.hover_threshold {
            let above = (signals.hover - cfg.hover_threshold) / (1.0 - cfg.hover_threshold);
            zoom *= 1.0 + cfg.hover_max_boost * above.clamp(0.0, 1.0);
        }

        zoom *= if signals.intentional {
            cfg.intentional_damping
        } else {
            cfg.erratic_damping
        };

        let edge = edge_proximity(point, frame, cfg.edge_buffer);
        zoom = floor + (zoom - floor) * (1.0 - edge).powf(1.5);

        let busy = (signals.activity / cfg.activity_threshold).min(1.0).powf(1.5);
        zoom -= (zoom - floor) * cfg.activity_blend * busy;

        zoom.clamp(floor, cfg.zoom_ceiling.max(floor))
    }

    /// Visible source-pixel rectangle `(left, top, width, height)` when
    /// zooming toward `point`, with the center pulled toward the screen
    /// center and the rectangle kept inside the frame.
    pub fn viewport(&self, point: Point2D, zoom: f64, frame: FrameSize) -> (f64, f64, f64, f64) {
        let (w, h) = (frame.width as f64, frame.height as f64);
        let (vw, vh) = (w / zoom, h / zoom);
        let bias = self.config.center_bias.clamp(0.0, 1.0);
        let cx = bias * (w / 2.0) + (1.0 - bias) * point.x;
        let cy = bias * (h / 2.0) + (1.0 - bias) * point.y;
        let left = (cx - vw / 2.0).clamp(0.0, (w - vw).max(0.0));
        let top = (cy - vh / 2.0).clamp(0.0, (h - vh).max(0.0));
        (left, top, vw, vh)
    }

    /// Whether every sample stays inside the viewport minus the safety
    /// margin at `zoom`.
    pub fn is_safe(
        &self,
        point: Point2D,
        zoom: f64,
        nearby: &[CursorSample],
        frame: FrameSize,
    ) -> bool {
        let (left, top, vw, vh) = self.viewport(point, zoom, frame);
        let margin = self.config.safety_margin_px / zoom;
        nearby.iter().all(|s| {
            s.x >= left + margin
                && s.x <= left + vw - margin
                && s.y >= top + margin
                && s.y <= top + vh - margin
        })
    }

    /// Largest zoom at or below `scored`, in safety steps, that keeps nearby
    /// samples in view. Falls back to the floor.
    pub fn clamp_for_safety(
        &self,
        point: Point2D,
        scored: f64,
        nearby: &[CursorSample],
        frame: FrameSize,
    ) -> f64 {
        let floor = self.config.min_zoom_factor;
        let step = self.config.safety_step.max(1e-3);
        let steps = ((scored - floor) / step + 1e-9).floor().max(0.0) as usize;
        (0..=steps)
            .map(|i| (scored - i as f64 * step).max(floor))
            .find(|&zoom| self.is_safe(point, zoom, nearby, frame))
            .unwrap_or(floor)
    }

    fn score_candidate(
        &self,
        click: &CursorSample,
        samples: &[CursorSample],
        frame: FrameSize,
    ) -> ZoomCandidate {
        let point = click.position();
        let signals = self.measure(click, samples);
        let scored = self.score(&signals, point, frame);

        let half = self.config.analysis_window_secs;
        let nearby = samples_between(samples, click.timestamp - half, click.timestamp + half);
        let zoom_factor = self.clamp_for_safety(point, scored, nearby, frame);

        let (left, top, vw, vh) = self.viewport(point, zoom_factor, frame);
        let normalize = |offset: f64, full: f64, visible: f64| {
            let overflow = full - visible;
            if overflow > f64::EPSILON {
                (offset / overflow).clamp(0.0, 1.0)
            } else {
                0.5
            }
        };

        ZoomCandidate {
            time: click.timestamp,
            point,
            signals,
            zoom_factor,
            position_x: normalize(left, frame.width as f64, vw),
            position_y: normalize(top, frame.height as f64, vh),
        }
    }

    fn emit_keyframes(
        &self,
        segment: &VideoSegment,
        candidates: &[ZoomCandidate],
    ) -> Vec<ZoomKeyframe> {
        let cfg = &self.config;
        let mut keyframes = vec![];

        for (i, candidate) in candidates.iter().enumerate() {
            if let Some(prev) = i.checked_sub(1).map(|j| &candidates[j]) {
                let far = prev.point.distance_to(&candidate.point) > cfg.min_distance;
                let late = candidate.time - prev.time >= cfg.min_time_for_zoom_out;
                if far && late {
                    keyframes.push(
                        ZoomKeyframe::new(
                            candidate.time - cfg.zoom_out_lead_secs,
                            1.0,
                            prev.position_x,
                            prev.position_y,
                        )
                        .with_duration(cfg.transition_secs)
                        .with_easing(Easing::EaseInOut),
                    );
                }
            }

            keyframes.push(
                ZoomKeyframe::new(
                    candidate.time - cfg.zoom_in_lead_secs,
                    candidate.zoom_factor,
                    candidate.position_x,
                    candidate.position_y,
                )
                .with_duration(cfg.transition_secs)
                .with_easing(Easing::EaseOut),
            );
        }

        if let Some(last) = candidates.last() {
            if segment.trim_end - last.time >= cfg.final_zoom_out_delay_secs {
                keyframes.push(
                    ZoomKeyframe::new(
                        last.time + cfg.final_zoom_out_delay_secs,
                        1.0,
                        last.position_x,
                        last.position_y,
                    )
                    .with_duration(cfg.transition_secs)
                    .with_easing(Easing::EaseInOut),
                );
            }
        }

        for keyframe in &mut keyframes {
            keyframe.time = keyframe.time.max(segment.trim_start);
        }
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut deduped: Vec<ZoomKeyframe> = Vec::with_capacity(keyframes.len());
        for keyframe in keyframes {
            match deduped.last_mut() {
                Some(last) if (keyframe.time - last.time).abs() < TIME_EPSILON => *last = keyframe,
                _ => deduped.push(keyframe),
            }
        }
        self.bridge_holds(deduped)
    }

    /// Park a zoomed camera until the next transition begins.
    ///
    /// Interpolation only continues from the previous keyframe when it lies
    /// within one transition window; past that the next transition starts
    /// from identity and the camera would snap out. Gaps behind a zoomed
    /// keyframe get evenly spaced copies of it, the last one
    /// `transition_secs` before the next keyframe.
    fn bridge_holds(&self, keyframes: Vec<ZoomKeyframe>) -> Vec<ZoomKeyframe> {
        let max_step = TRANSITION_WINDOW_SECS * HOLD_SPACING;
        let lead = self.config.transition_secs.clamp(MIN_HOLD_LEAD_SECS, max_step);

        let mut bridged = Vec::with_capacity(keyframes.len());
        let mut iter = keyframes.into_iter().peekable();
        while let Some(current) = iter.next() {
            bridged.push(current);
            let Some(next) = iter.peek() else {
                break;
            };
            if current.zoom_factor <= 1.0 || next.time - current.time <= TRANSITION_WINDOW_SECS {
                continue;
            }
            let span = next.time - lead - current.time;
            let steps = (span / max_step - TIME_EPSILON).ceil().max(1.0) as usize;
            bridged.extend((1..=steps).map(|i| ZoomKeyframe {
                time: current.time + span * i as f64 / steps as f64,
                ..current
            }));
        }
        bridged
    }
}

/// Hold keyframes sit at most this fraction of the transition window apart.
const HOLD_SPACING: f64 = 0.9;

const MIN_HOLD_LEAD_SECS: f64 = 1.0 / 60.0;

/// Samples with finite fields, ordered by timestamp.
fn ordered_finite(samples: &[CursorSample]) -> Cow<'_, [CursorSample]> {
    let clean = samples
        .iter()
        .all(|s| s.x.is_finite() && s.y.is_finite() && s.timestamp.is_finite());
    let ordered = samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp);
    if clean && ordered {
        return Cow::Borrowed(samples);
    }
    let mut owned: Vec<CursorSample> = samples
        .iter()
        .filter(|s| s.x.is_finite() && s.y.is_finite() && s.timestamp.is_finite())
        .copied()
        .collect();
    owned.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    Cow::Owned(owned)
}

/// Path length over elapsed time (px/s); zero for fewer than two samples.
fn path_speed(samples: &[CursorSample]) -> f64 {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return 0.0;
    };
    let elapsed = last.timestamp - first.timestamp;
    if elapsed <= 0.0 {
        return 0.0;
    }
    let length: f64 = samples
        .windows(2)
        .map(|w| w[0].position().distance_to(&w[1].position()))
        .sum();
    length / elapsed
}

/// Share of consecutive movement pairs that turn by more than 90 degrees.
fn reversal_rate(samples: &[CursorSample]) -> f64 {
    let moves: Vec<(f64, f64)> = samples
        .windows(2)
        .map(|w| (w[1].x - w[0].x, w[1].y - w[0].y))
        .filter(|(dx, dy)| dx.abs() > f64::EPSILON || dy.abs() > f64::EPSILON)
        .collect();
    if moves.len() < 2 {
        return 0.0;
    }
    let reversals = moves
        .windows(2)
        .filter(|w| w[0].0 * w[1].0 + w[0].1 * w[1].1 < 0.0)
        .count();
    reversals as f64 / (moves.len() - 1) as f64
}

/// How deep `point` sits inside the edge zone: 0 outside it, 1 on the edge.
fn edge_proximity(point: Point2D, frame: FrameSize, buffer: f64) -> f64 {
    let axis = |value: f64, size: f64| {
        let zone = size * buffer;
        if zone <= 0.0 {
            return 0.0;
        }
        let distance = value.min(size - value).max(0.0);
        (1.0 - distance / zone).clamp(0.0, 1.0)
    };
    axis(point.x, frame.width as f64).max(axis(point.y, frame.height as f64))
}
