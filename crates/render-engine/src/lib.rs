//! Reframe Render Engine
//!
//! Turns a decoded recording plus editing decisions (trim, zoom keyframes,
//! background, cursor telemetry) into composited frames, both for the live
//! preview and for frame-exact export.
//!
//! # Pipeline Architecture
//!
//! ```text
//! DecodeSource ──seek/ack──┐
//!                          ├── Compositor ── background fill
//! VideoSegment ────────────┤        │        shadow + rounded clip
//! BackgroundConfig ────────┤        │        zoomed content
//! CursorSample[] ──────────┘        │        cursor + click animation
//!                                   ▼
//!              PlaybackDriver ──► PreviewSurface      (preview, wall clock)
//!              ExportPipeline ──► EncodeSink ──► file  (export, virtual clock)
//! ```

pub mod compositor;
pub mod export;
pub mod ffmpeg;
pub mod playback;
pub mod raster;
pub mod source;

pub use compositor::{
    ClickAnimation, CompositeMode, CompositionRequest, CompositionResult, Compositor,
    CursorPlacement, Session,
};
pub use export::*;
pub use ffmpeg::{probe_media, FfmpegSink, FfmpegSource, MediaInfo};
pub use playback::{PlaybackDriver, PlaybackStats, PlaybackStop, DEFAULT_REFRESH_HZ};
pub use source::{
    DecodeSource, DecodedFrame, EncodeSink, EncoderConfig, PreviewSurface, ReadyState, SeekAck,
};
