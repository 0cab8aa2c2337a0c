#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use reframe_common::{ReframeError, ReframeResult};
use reframe_project_model::{BackgroundConfig, BackgroundStyle, CursorSample, FrameSize, VideoSegment, ZoomKeyframe};
use reframe_render_engine::{
    CompositionResult, DecodeSource, DecodedFrame, EncodeSink, EncoderConfig, ExportJob,
    ExportProgress, PreviewSurface, ProgressCallback, ReadyState, SeekAck,
};

pub const SOURCE: FrameSize = FrameSize {
    width: 64,
    height: 36,
};

/// Deterministic test picture that changes every 1/60s.
pub fn pattern(size: FrameSize, t: f64) -> RgbaImage {
    let shift = (t * 60.0).round() as u32;
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        Rgba([
            ((x * 4 + shift) % 256) as u8,
            ((y * 7) % 256) as u8,
            ((x + y + shift * 3) % 256) as u8,
            255,
        ])
    })
}

/// Scriptable in-memory decode source.
pub struct FakeSource {
    pub size: FrameSize,
    pub duration: f64,
    pub position: f64,
    pub playing: bool,
    pub frame_ready: bool,
    frame: Option<DecodedFrame>,
    /// Every seek that resolved, in order.
    pub seeks: Vec<f64>,
    /// Seeks at or after this time never resolve.
    pub stall_from: Option<f64>,
    /// Seeks at or after this time fail.
    pub fail_from: Option<f64>,
    /// Seeks at or after this time land back at zero.
    pub loop_after: Option<f64>,
    /// The source reports ended once positioned at or past this time.
    pub end_at: Option<f64>,
    /// While playing, `is_playing` turns false after this many checks.
    play_checks: Option<AtomicU64>,
}

impl FakeSource {
    pub fn new(duration: f64) -> Self {
        Self {
            size: SOURCE,
            duration,
            position: 0.0,
            playing: false,
            frame_ready: true,
            frame: None,
            seeks: Vec::new(),
            stall_from: None,
            fail_from: None,
            loop_after: None,
            end_at: None,
            play_checks: None,
        }
    }

    /// Playing at `position` with a decoded frame, pausing after `ticks`
    /// playback checks.
    pub fn playing_at(duration: f64, position: f64, ticks: u64) -> Self {
        let mut source = Self::new(duration);
        source.position = position;
        source.playing = true;
        source.frame = Some(DecodedFrame::new(position, pattern(SOURCE, position)));
        source.play_checks = Some(AtomicU64::new(ticks));
        source
    }
}

#[async_trait]
impl DecodeSource for FakeSource {
    fn size(&self) -> FrameSize {
        self.size
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn ready_state(&self) -> ReadyState {
        if self.current_frame().is_some() {
            ReadyState::CurrentFrame
        } else {
            ReadyState::Metadata
        }
    }

    fn is_playing(&self) -> bool {
        if !self.playing {
            return false;
        }
        match &self.play_checks {
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
            None => true,
        }
    }

    fn has_ended(&self) -> bool {
        self.end_at.is_some_and(|end| self.position >= end)
    }

    fn current_frame(&self) -> Option<DecodedFrame> {
        if !self.frame_ready {
            return None;
        }
        self.frame.clone().filter(|f| f.timestamp == self.position)
    }

    async fn seek(&mut self, time: f64) -> ReframeResult<SeekAck> {
        if self.stall_from.is_some_and(|s| time >= s) {
            std::future::pending::<()>().await;
        }
        if self.fail_from.is_some_and(|f| time >= f) {
            return Err(ReframeError::decode(format!("corrupt packet at {time:.3}s")));
        }
        tokio::task::yield_now().await;

        let landed = match self.loop_after {
            Some(l) if time >= l => 0.0,
            _ => time.clamp(0.0, self.duration),
        };
        self.position = landed;
        self.frame = Some(DecodedFrame::new(landed, pattern(self.size, landed)));
        self.seeks.push(time);
        Ok(SeekAck {
            requested: time,
            landed,
        })
    }

    async fn play(&mut self) -> ReframeResult<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }
}

/// Encode sink that keeps every frame in memory.
#[derive(Default)]
pub struct FakeSink {
    pub config: Option<EncoderConfig>,
    pub frames: Vec<RgbaImage>,
    pub finished: bool,
    pub aborted: bool,
    pub unavailable: bool,
}

#[async_trait]
impl EncodeSink for FakeSink {
    async fn configure(&mut self, config: &EncoderConfig) -> ReframeResult<()> {
        if self.unavailable {
            return Err(ReframeError::encoder_unavailable(format!(
                "no {} encoder",
                config.codec.encoder()
            )));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    async fn submit(&mut self, frame: &RgbaImage) -> ReframeResult<()> {
        tokio::task::yield_now().await;
        self.frames.push(frame.clone());
        Ok(())
    }

    async fn finish(&mut self) -> ReframeResult<PathBuf> {
        self.finished = true;
        self.config
            .as_ref()
            .map(|c| c.output.clone())
            .ok_or_else(|| ReframeError::encode("not configured"))
    }

    async fn abort(&mut self) {
        self.aborted = true;
        self.frames.clear();
    }
}

/// Preview target that counts presented frames.
#[derive(Default)]
pub struct FakeSurface {
    pub presented: Vec<f64>,
}

impl PreviewSurface for FakeSurface {
    fn size(&self) -> FrameSize {
        SOURCE
    }

    fn present(&mut self, result: &CompositionResult) -> ReframeResult<()> {
        self.presented.push(result.time);
        Ok(())
    }
}

pub fn segment(trim_end: f64) -> VideoSegment {
    let mut segment = VideoSegment::new(0.0, trim_end).unwrap();
    if trim_end >= 1.5 {
        segment
            .add_keyframe(ZoomKeyframe::new(1.5, 2.0, 0.3, 0.6))
            .unwrap();
    }
    segment
}

pub fn background() -> BackgroundConfig {
    BackgroundConfig {
        scale: 80.0,
        corner_radius: 6.0,
        shadow: Some(4.0),
        style: BackgroundStyle::GradientA,
        cursor_scale: Some(1.5),
        cursor_smoothness: None,
    }
}

/// Cursor drifting right at 30Hz with a single click at 0.5s.
pub fn cursor(until: f64) -> Vec<CursorSample> {
    let count = (until * 30.0) as usize;
    (0..=count)
        .map(|i| {
            let t = i as f64 / 30.0;
            let x = 10.0 + t * 8.0;
            if i == 15 {
                CursorSample::click(t, x, 18.0)
            } else {
                CursorSample::moved(t, x, 18.0)
            }
        })
        .collect()
}

pub fn job(trim_end: f64) -> ExportJob {
    ExportJob {
        segment: segment(trim_end),
        background: background(),
        cursor: cursor(trim_end),
        output_path: PathBuf::from("/tmp/reframe-test-export.mp4"),
    }
}

/// Progress callback recording every report.
pub fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ExportProgress>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let callback: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));
    (callback, log)
}
