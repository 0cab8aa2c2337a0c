//! Frame compositor: background, rounded content window, zoom, and cursor.
//!
//! A [`Compositor`] is owned by one preview or export session. The only state
//! it carries between calls is the cursor click animation, which runs on the
//! session's [`Clock`] rather than on media time.

use image::RgbaImage;
use reframe_common::clock::Clock;
use reframe_common::{ReframeError, ReframeResult};
use reframe_processing_core::CursorSmoother;
use reframe_project_model::background::BackgroundConfig;
use reframe_project_model::camera::{CameraState, FrameSize};
use reframe_project_model::cursor::{is_time_ordered, samples_between, CursorSample};
use reframe_project_model::timeline::VideoSegment;
use resvg::tiny_skia::{Pixmap, Transform};

use crate::raster::{self, Rect, ARROW_HEIGHT};
use crate::source::DecodedFrame;

/// Pointer glyph height in source pixels at cursor scale 1.
const CURSOR_SOURCE_PX: f64 = 24.0;

/// Clicks older than this, relative to the composited instant, are not
/// treated as newly observed.
const CLICK_OBSERVE_WINDOW_SECS: f64 = 0.1;

/// How the caller treats a missing decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// Interactive preview: a frame that is not decoded yet skips the draw.
    Preview,
    /// Export: the frame must be present.
    Exact,
}

/// Inputs that stay fixed for a whole preview or export session.
#[derive(Debug, Clone)]
pub struct Session {
    segment: VideoSegment,
    background: BackgroundConfig,
    cursor: Vec<CursorSample>,
    output: FrameSize,
    playback_speed: f64,
}

impl Session {
    /// Validate and bundle session inputs. Cursor samples must be ordered by
    /// time; the segment must have a valid trim window and keyframes.
    pub fn new(
        segment: VideoSegment,
        background: BackgroundConfig,
        cursor: Vec<CursorSample>,
        output: FrameSize,
        playback_speed: f64,
    ) -> ReframeResult<Self> {
        segment.validate(f64::INFINITY)?;
        if output.is_empty() {
            return Err(ReframeError::input(format!(
                "output size {}x{} is empty",
                output.width, output.height
            )));
        }
        if !(playback_speed.is_finite() && playback_speed > 0.0) {
            return Err(ReframeError::input(format!(
                "playback speed must be positive, got {playback_speed}"
            )));
        }
        if !is_time_ordered(&cursor) {
            return Err(ReframeError::input("cursor samples are not ordered by time"));
        }
        Ok(Self {
            segment,
            background,
            cursor,
            output,
            playback_speed,
        })
    }

    pub fn segment(&self) -> &VideoSegment {
        &self.segment
    }

    pub fn background(&self) -> &BackgroundConfig {
        &self.background
    }

    pub fn cursor(&self) -> &[CursorSample] {
        &self.cursor
    }

    pub fn output(&self) -> FrameSize {
        self.output
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }
}

/// One frame's worth of compositor input.
#[derive(Debug, Clone, Copy)]
pub struct CompositionRequest<'a> {
    session: &'a Session,
    frame: Option<&'a DecodedFrame>,
    time: f64,
    mode: CompositeMode,
}

impl<'a> CompositionRequest<'a> {
    /// Build a request. `time` outside the trim window is clamped later;
    /// `Exact` mode requires a frame.
    pub fn new(
        session: &'a Session,
        frame: Option<&'a DecodedFrame>,
        time: f64,
        mode: CompositeMode,
    ) -> ReframeResult<Self> {
        if time.is_nan() {
            return Err(ReframeError::input("composite time is NaN"));
        }
        if let Some(frame) = frame {
            if frame.size().is_empty() {
                return Err(ReframeError::input("decoded frame has no pixels"));
            }
        }
        if mode == CompositeMode::Exact && frame.is_none() {
            return Err(ReframeError::render(format!(
                "exact composite at {time:.3}s requires a decoded frame"
            )));
        }
        Ok(Self {
            session,
            frame,
            time,
            mode,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }
}

/// Where the cursor glyph was drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPlacement {
    pub x: f64,
    pub y: f64,
    /// Effective scale: cursor scale x zoom x click animation.
    pub scale: f64,
}

/// A composited output frame.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub frame: RgbaImage,
    /// The media time actually rendered, after clamping to the trim window.
    pub time: f64,
    pub camera: CameraState,
    /// Content window in output pixels.
    pub content: Rect,
    pub cursor: Option<CursorPlacement>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClickPhase {
    Idle,
    Squish { started: f64 },
}

/// Two-phase click animation: a short ease-in squish followed by a damped
/// spring release.
#[derive(Debug, Clone)]
pub struct ClickAnimation {
    phase: ClickPhase,
    last_click: Option<f64>,
}

impl ClickAnimation {
    pub const SQUISH_SECS: f64 = 0.1;
    pub const RELEASE_SECS: f64 = 0.6;
    pub const SQUISHED_SCALE: f64 = 0.75;

    pub fn new() -> Self {
        Self {
            phase: ClickPhase::Idle,
            last_click: None,
        }
    }

    /// Forget the running animation and every click seen so far.
    pub fn reset(&mut self) {
        self.phase = ClickPhase::Idle;
        self.last_click = None;
    }

    /// Start the animation if `click_time` is a click not seen before.
    pub fn observe(&mut self, click_time: Option<f64>, now: f64) {
        let Some(click) = click_time else {
            return;
        };
        if self.last_click.map_or(true, |seen| (seen - click).abs() > f64::EPSILON) {
            self.last_click = Some(click);
            self.phase = ClickPhase::Squish { started: now };
        }
    }

    /// Current glyph scale multiplier. Returns to idle once finished.
    pub fn scale(&mut self, now: f64) -> f64 {
        let ClickPhase::Squish { started } = self.phase else {
            return 1.0;
        };
        let elapsed = (now - started).max(0.0);
        if elapsed < Self::SQUISH_SECS {
            let p = elapsed / Self::SQUISH_SECS;
            return 1.0 - (1.0 - Self::SQUISHED_SCALE) * p * p * p;
        }
        let release = elapsed - Self::SQUISH_SECS;
        if release < Self::RELEASE_SECS {
            let p = release / Self::RELEASE_SECS;
            let amplitude = 1.0 - Self::SQUISHED_SCALE;
            return 1.0 - amplitude * (-6.0 * p).exp() * (3.0 * std::f64::consts::PI * p).cos();
        }
        self.phase = ClickPhase::Idle;
        1.0
    }

    pub fn is_active(&self) -> bool {
        self.phase != ClickPhase::Idle
    }
}

impl Default for ClickAnimation {
    fn default() -> Self {
        Self::new()
    }
}

/// Session-scoped compositor.
#[derive(Debug, Default)]
pub struct Compositor {
    click: ClickAnimation,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the click animation. Call before any non-sequential run, such as
    /// the start of an export.
    pub fn reset(&mut self) {
        self.click.reset();
    }

    pub fn click_animation(&self) -> &ClickAnimation {
        &self.click
    }

    /// Composite one frame.
    ///
    /// Returns `Ok(None)` when a preview request has no decoded frame yet; the
    /// next tick retries.
    pub fn composite(
        &mut self,
        request: &CompositionRequest<'_>,
        clock: &dyn Clock,
    ) -> ReframeResult<Option<CompositionResult>> {
        let Some(frame) = request.frame else {
            tracing::trace!(time = request.time, "Frame not decoded yet, skipping composite");
            return Ok(None);
        };
        let session = request.session;
        let segment = &session.segment;
        let background = &session.background;

        let time = request.time.clamp(segment.trim_start, segment.trim_end);
        let camera = segment.camera_at(time);

        let out = session.output;
        let mut surface = Pixmap::new(out.width, out.height).ok_or_else(|| {
            ReframeError::render(format!("cannot allocate a {}x{} surface", out.width, out.height))
        })?;
        raster::fill_background(&mut surface, background.style.fill());

        let source_size = frame.size();
        let scale = background.scale_fraction();
        let (avail_w, avail_h) = (out.width as f64 * scale, out.height as f64 * scale);
        let bounds = Rect::new(
            (out.width as f64 - avail_w) / 2.0,
            (out.height as f64 - avail_h) / 2.0,
            avail_w,
            avail_h,
        );
        let content = Rect::fit_centered(bounds, source_size.aspect());
        let radius = background.effective_corner_radius();

        raster::draw_shadow(&mut surface, &content, radius, background.effective_shadow());

        let (sx, sy) = (
            source_size.width as f64 / content.w,
            source_size.height as f64 / content.h,
        );
        let source = raster::image_to_pixmap(&frame.image)
            .ok_or_else(|| ReframeError::render("decoded frame cannot be rasterized"))?;
        raster::draw_clipped(
            &mut surface,
            &source,
            &content,
            radius,
            content_transform(&camera, &content, (sx, sy)),
        );

        let cursor = self.draw_cursor(&mut surface, session, time, &camera, &content, (sx, sy), clock);
        let frame = raster::pixmap_to_image(&surface)
            .ok_or_else(|| ReframeError::render("composited surface cannot be exported"))?;

        Ok(Some(CompositionResult {
            frame,
            time,
            camera,
            content,
            cursor,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_cursor(
        &mut self,
        surface: &mut Pixmap,
        session: &Session,
        time: f64,
        camera: &CameraState,
        content: &Rect,
        source_per_px: (f64, f64),
        clock: &dyn Clock,
    ) -> Option<CursorPlacement> {
        let background = &session.background;
        let samples = session.cursor();
        let smoother = CursorSmoother::new(
            background.effective_cursor_smoothness(),
            session.playback_speed,
        );
        let position = smoother.position_at(samples, time)?;

        let now = clock.now_secs();
        let recent_click = samples_between(samples, time - CLICK_OBSERVE_WINDOW_SECS, time)
            .iter()
            .rev()
            .find(|s| s.clicked)
            .map(|s| s.timestamp);
        self.click.observe(recent_click, now);
        let click_scale = self.click.scale(now);

        let (lx, ly) = (position.x / source_per_px.0, position.y / source_per_px.1);
        let (zx, zy) = camera.project(content.w, content.h, lx, ly);
        let (x, y) = (content.x + zx, content.y + zy);
        if !content.contains(x, y) {
            return None;
        }

        let scale = background.effective_cursor_scale() * camera.zoom_factor * click_scale;
        let size = CURSOR_SOURCE_PX / source_per_px.1 * scale;
        raster::draw_arrow_cursor(surface, x, y, size.max(ARROW_HEIGHT * 0.25));
        Some(CursorPlacement { x, y, scale })
    }
}

/// Source pixels to output pixels: fit into `content`, then apply the camera
/// zoom anchored at its crop offset.
fn content_transform(camera: &CameraState, content: &Rect, source_per_px: (f64, f64)) -> Transform {
    let (ox, oy) = camera.content_offset(content.w, content.h);
    let zoom = camera.zoom_factor;
    Transform::from_row(
        (zoom / source_per_px.0) as f32,
        0.0,
        0.0,
        (zoom / source_per_px.1) as f32,
        (content.x + ox) as f32,
        (content.y + oy) as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use reframe_common::clock::VirtualClock;
    use reframe_project_model::background::BackgroundStyle;
    use reframe_project_model::timeline::ZoomKeyframe;

    fn checker(width: u32, height: u32) -> DecodedFrame {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([20, 60, 200, 255])
            }
        });
        DecodedFrame::new(0.0, image)
    }

    fn session(keyframes: Vec<ZoomKeyframe>, cursor: Vec<CursorSample>) -> Session {
        let mut segment = VideoSegment::new(0.0, 10.0).unwrap();
        segment.replace_keyframes(keyframes).unwrap();
        let background = BackgroundConfig {
            shadow: None,
            style: BackgroundStyle::Solid,
            ..Default::default()
        };
        Session::new(segment, background, cursor, FrameSize::new(160, 90), 1.0).unwrap()
    }

    #[test]
    fn test_preview_without_frame_is_skipped() {
        let session = session(vec![], vec![]);
        let request = CompositionRequest::new(&session, None, 1.0, CompositeMode::Preview).unwrap();
        let result = Compositor::new().composite(&request, &VirtualClock::new(60)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_exact_requires_frame() {
        let session = session(vec![], vec![]);
        let err = CompositionRequest::new(&session, None, 1.0, CompositeMode::Exact).unwrap_err();
        assert!(matches!(err, ReframeError::Render { .. }));
        assert!(CompositionRequest::new(&session, None, f64::NAN, CompositeMode::Preview).is_err());
    }

    #[test]
    fn test_session_rejects_unordered_cursor() {
        let segment = VideoSegment::new(0.0, 1.0).unwrap();
        let cursor = vec![CursorSample::moved(1.0, 0.0, 0.0), CursorSample::moved(0.5, 0.0, 0.0)];
        let err = Session::new(segment, BackgroundConfig::default(), cursor, FrameSize::new(4, 4), 1.0)
            .unwrap_err();
        assert!(matches!(err, ReframeError::Input { .. }));
    }

    #[test]
    fn test_content_rect_is_scaled_and_centered() {
        let session = session(vec![], vec![]);
        let frame = checker(320, 180);
        let request = CompositionRequest::new(&session, Some(&frame), 1.0, CompositeMode::Exact).unwrap();
        let result = Compositor::new()
            .composite(&request, &VirtualClock::new(60))
            .unwrap()
            .unwrap();

        assert!((result.content.w - 144.0).abs() < 1e-9);
        assert!((result.content.h - 81.0).abs() < 1e-9);
        assert!((result.content.x - 8.0).abs() < 1e-9);
        // Background shows in the margin.
        assert_eq!(result.frame.get_pixel(1, 1).0, [0x1a, 0x1a, 0x1a, 255]);
        assert_ne!(result.frame.get_pixel(80, 45).0, [0x1a, 0x1a, 0x1a, 255]);
    }

    #[test]
    fn test_time_is_clamped_to_trim() {
        let session = session(vec![ZoomKeyframe::new(5.0, 2.0, 0.5, 0.5)], vec![]);
        let frame = checker(160, 90);
        let request = CompositionRequest::new(&session, Some(&frame), 99.0, CompositeMode::Exact).unwrap();
        let result = Compositor::new()
            .composite(&request, &VirtualClock::new(60))
            .unwrap()
            .unwrap();
        assert_eq!(result.time, 10.0);
        assert_eq!(result.camera, CameraState::new(2.0, 0.5, 0.5));
    }

    #[test]
    fn test_cursor_follows_zoom_transform() {
        let cursor: Vec<_> = (0..300)
            .map(|i| CursorSample::moved(i as f64 / 30.0, 40.0, 22.5))
            .collect();
        let session = session(vec![ZoomKeyframe::new(1.0, 2.0, 0.0, 0.0)], cursor);
        let frame = checker(160, 90);
        let request = CompositionRequest::new(&session, Some(&frame), 3.0, CompositeMode::Exact).unwrap();
        let result = Compositor::new()
            .composite(&request, &VirtualClock::new(60))
            .unwrap()
            .unwrap();

        let placement = result.cursor.unwrap();
        // A quarter of the source at zoom 2 anchored top-left lands at the
        // content's center.
        assert!((placement.x - (result.content.x + result.content.w / 2.0)).abs() < 1e-6);
        assert!((placement.y - (result.content.y + result.content.h / 2.0)).abs() < 1e-6);
        assert!((placement.scale - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_animation_phases() {
        let mut click = ClickAnimation::new();
        click.observe(Some(1.0), 10.0);
        assert!(click.is_active());
        assert_eq!(click.scale(10.0), 1.0);
        assert!((click.scale(10.05) - (1.0 - 0.25 * 0.125)).abs() < 1e-9);
        assert!((click.scale(10.1) - 0.75).abs() < 1e-9);
        let mid_release = click.scale(10.4);
        assert!(mid_release > 0.75 && mid_release < 1.1);
        assert_eq!(click.scale(10.8), 1.0);
        assert!(!click.is_active());

        // Same click is not observed twice.
        click.observe(Some(1.0), 11.0);
        assert!(!click.is_active());
        click.reset();
        click.observe(Some(1.0), 11.0);
        assert!(click.is_active());
    }

    #[test]
    fn test_click_animation_runs_on_session_clock() {
        let cursor = vec![
            CursorSample::moved(0.0, 80.0, 45.0),
            CursorSample::click(2.0, 80.0, 45.0),
            CursorSample::moved(2.05, 80.0, 45.0),
        ];
        let session = session(vec![], cursor);
        let frame = checker(160, 90);
        let mut compositor = Compositor::new();
        let mut clock = VirtualClock::new(60);

        let request = CompositionRequest::new(&session, Some(&frame), 2.0, CompositeMode::Exact).unwrap();
        let first = compositor.composite(&request, &clock).unwrap().unwrap();
        assert_eq!(first.cursor.unwrap().scale, 1.0);
        assert!(compositor.click_animation().is_active());

        for _ in 0..6 {
            clock.tick();
        }
        // Media time stays put; the squish still advances on the clock.
        let squished = compositor.composite(&request, &clock).unwrap().unwrap();
        assert!((squished.cursor.unwrap().scale - 0.75).abs() < 1e-9);
    }
}
