//! Collaborator contracts for the decode source, the encoder sink, and the
//! preview surface.
//!
//! The compositor and export pipeline only talk to these traits. The ffmpeg
//! implementations live in [`crate::ffmpeg`]; tests drive the pipeline with
//! in-memory fakes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use reframe_common::ReframeResult;
use reframe_project_model::camera::FrameSize;
use reframe_project_model::project::VideoCodec;

use crate::compositor::CompositionResult;

/// A decoded source frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Presentation timestamp of the frame in source seconds.
    pub timestamp: f64,
    pub image: Arc<RgbaImage>,
}

impl DecodedFrame {
    pub fn new(timestamp: f64, image: RgbaImage) -> Self {
        Self {
            timestamp,
            image: Arc::new(image),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }
}

/// Completion of a seek: the position the source actually landed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekAck {
    pub requested: f64,
    pub landed: f64,
}

/// How much of the current position the source has decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Nothing decoded yet.
    Empty,
    /// Size and duration are known.
    Metadata,
    /// The frame at the current position is available.
    CurrentFrame,
}

/// A seekable, playable video source.
#[async_trait]
pub trait DecodeSource: Send {
    /// Decoded frame dimensions.
    fn size(&self) -> FrameSize;

    /// Media duration in seconds.
    fn duration(&self) -> f64;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    fn ready_state(&self) -> ReadyState;

    fn is_playing(&self) -> bool;

    /// True once playback ran off the end of the media.
    fn has_ended(&self) -> bool;

    /// Frame at the current position, if it is decoded. Never blocks.
    fn current_frame(&self) -> Option<DecodedFrame>;

    /// Move to `time` and resolve once the frame there is decoded.
    async fn seek(&mut self, time: f64) -> ReframeResult<SeekAck>;

    async fn play(&mut self) -> ReframeResult<()>;

    fn pause(&mut self);
}

/// Parameters the sink is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub size: FrameSize,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub codec: VideoCodec,
    pub output: PathBuf,
}

/// Consumes composited frames and produces the output file.
#[async_trait]
pub trait EncodeSink: Send {
    /// Check codec support and open the output. Must fail with
    /// `EncoderUnavailable` before any frame is accepted when the codec is
    /// missing.
    async fn configure(&mut self, config: &EncoderConfig) -> ReframeResult<()>;

    /// Queue one frame. Resolves only once the sink has room for it, so a
    /// slow encoder throttles the producer.
    async fn submit(&mut self, frame: &RgbaImage) -> ReframeResult<()>;

    /// Flush and close the output.
    async fn finish(&mut self) -> ReframeResult<PathBuf>;

    /// Tear down without producing output and delete any partial file.
    async fn abort(&mut self);
}

/// A visible preview target.
pub trait PreviewSurface: Send {
    fn size(&self) -> FrameSize;

    fn present(&mut self, result: &CompositionResult) -> ReframeResult<()>;
}
