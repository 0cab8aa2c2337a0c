//! Export pipeline: a sequential, frame-exact render of the trim window.
//!
//! Each virtual frame seeks the decode source, waits for the seek to land,
//! composites in exact mode, and hands the frame to the encode sink, which
//! may hold the loop back until it has room.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reframe_common::clock::VirtualClock;
use reframe_common::{ReframeError, ReframeResult};
use reframe_project_model::background::BackgroundConfig;
use reframe_project_model::camera::FrameSize;
use reframe_project_model::cursor::CursorSample;
use reframe_project_model::project::{ExportQuality, ExportSettings, VideoCodec};
use reframe_project_model::timeline::{VideoSegment, TIME_EPSILON};
use serde::Serialize;
pub use tokio_util::sync::CancellationToken;

use crate::compositor::{CompositeMode, CompositionRequest, Compositor, Session};
use crate::source::{DecodeSource, EncodeSink, EncoderConfig, SeekAck};

/// Virtual output frame rate.
pub const EXPORT_FPS: u32 = 60;

/// Upper bound for putting the decode source back after an export.
const RESTORE_SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// What to render.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub segment: VideoSegment,
    pub background: BackgroundConfig,
    pub cursor: Vec<CursorSample>,

    /// Output file path.
    pub output_path: PathBuf,
}

/// How to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub quality: ExportQuality,
    /// Playback speed multiplier in `[0.5, 2.0]`.
    pub speed: f64,
    pub codec: VideoCodec,
    /// Fail a seek that has not landed after this long. `None` waits forever.
    pub seek_timeout: Option<Duration>,
}

impl ExportOptions {
    pub const MIN_SPEED: f64 = 0.5;
    pub const MAX_SPEED: f64 = 2.0;

    pub fn validate(&self) -> ReframeResult<()> {
        if !(Self::MIN_SPEED..=Self::MAX_SPEED).contains(&self.speed) {
            return Err(ReframeError::input(format!(
                "export speed must be within {}..={}, got {}",
                Self::MIN_SPEED,
                Self::MAX_SPEED,
                self.speed
            )));
        }
        if self.seek_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ReframeError::input("seek timeout must be non-zero"));
        }
        Ok(())
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

impl From<&ExportSettings> for ExportOptions {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            quality: settings.quality,
            speed: settings.speed,
            codec: settings.codec,
            seek_timeout: None,
        }
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone, Serialize)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    #[default]
    Idle,
    Priming,
    Exporting,
    Finalizing,
    Complete,
    Failed,
}

impl ExportStage {
    /// Whether an export currently holds the pipeline.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExportStage::Priming | ExportStage::Exporting | ExportStage::Finalizing
        )
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub output: PathBuf,
    pub frames: u64,
    pub size: FrameSize,
    pub elapsed_secs: f64,
}

/// Flags a decode source that jumped back to the start on its own.
///
/// Fires when the observed position fraction drops from above 90% to the
/// very beginning between two consecutive observations.
#[derive(Debug, Default)]
pub struct LoopBackDetector {
    last: f64,
}

impl LoopBackDetector {
    const HIGH: f64 = 0.9;
    const LOW: f64 = 0.01;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, fraction: f64) -> bool {
        let looped = self.last > Self::HIGH && fraction <= Self::LOW;
        self.last = fraction;
        looped
    }
}

/// Deterministic output file name: `reframe-YYYYMMDD-HHMMSS-<tag>.<ext>`.
pub fn output_file_name(at: DateTime<Utc>, codec: VideoCodec) -> String {
    format!(
        "reframe-{}-{}.{}",
        at.format("%Y%m%d-%H%M%S"),
        codec.tag(),
        codec.extension()
    )
}

/// Number of virtual frames for a trim window at `speed`.
pub fn total_frames(duration_secs: f64, speed: f64) -> u64 {
    ((duration_secs * EXPORT_FPS as f64 / speed).ceil() as u64).max(1)
}

/// Source time of virtual frame `k`.
pub fn frame_source_time(trim_start: f64, k: u64, speed: f64) -> f64 {
    trim_start + k as f64 * speed / EXPORT_FPS as f64
}

/// Guards the single active export and tracks its stage.
#[derive(Debug, Default)]
pub struct ExportPipeline {
    stage: Mutex<ExportStage>,
}

impl ExportPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> ExportStage {
        *self.stage.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.stage().is_active()
    }

    fn set_stage(&self, stage: ExportStage) {
        let mut current = self.stage.lock().unwrap_or_else(|e| e.into_inner());
        tracing::info!(from = ?*current, to = ?stage, "Export stage");
        *current = stage;
    }

    fn begin(&self) -> ReframeResult<()> {
        let mut current = self.stage.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_active() {
            return Err(ReframeError::ExportBusy);
        }
        tracing::info!(from = ?*current, to = ?ExportStage::Priming, "Export stage");
        *current = ExportStage::Priming;
        Ok(())
    }

    /// Render `job` through `sink`.
    ///
    /// Always ends in `Complete` or `Failed`. On failure the sink is aborted,
    /// which discards partial output. Either way the source is put back at
    /// the position and play state it had before the export.
    pub async fn export<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        job: ExportJob,
        options: &ExportOptions,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> ReframeResult<ExportOutcome>
    where
        S: DecodeSource + ?Sized,
        K: EncodeSink + ?Sized,
    {
        self.begin()?;
        tracing::info!(
            output = %job.output_path.display(),
            quality = options.quality.as_str(),
            codec = options.codec.tag(),
            speed = options.speed,
            "Starting export"
        );

        let saved = (source.current_time(), source.is_playing());
        source.pause();

        let mut reporter = Reporter::new(progress);
        let result = self.run(source, sink, job, options, cancel, &mut reporter).await;

        if result.is_err() {
            sink.abort().await;
        }
        restore_source(source, saved).await;

        match result {
            Ok(outcome) => {
                self.set_stage(ExportStage::Complete);
                reporter.report(1.0, outcome.frames, outcome.frames, ExportStage::Complete);
                tracing::info!(
                    output = %outcome.output.display(),
                    frames = outcome.frames,
                    elapsed_secs = outcome.elapsed_secs,
                    "Export complete"
                );
                Ok(outcome)
            }
            Err(err) => {
                reporter.stop();
                self.set_stage(ExportStage::Failed);
                match &err {
                    ReframeError::Cancelled => tracing::warn!("Export cancelled"),
                    err => tracing::error!(error = %err, retryable = err.is_retryable(), "Export failed"),
                }
                Err(err)
            }
        }
    }

    async fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        job: ExportJob,
        options: &ExportOptions,
        cancel: &CancellationToken,
        reporter: &mut Reporter,
    ) -> ReframeResult<ExportOutcome>
    where
        S: DecodeSource + ?Sized,
        K: EncodeSink + ?Sized,
    {
        options.validate()?;
        job.segment.validate(source.duration())?;
        let source_size = source.size();
        if source_size.is_empty() {
            return Err(ReframeError::decode("decode source has no video dimensions"));
        }

        let preset = options.quality.preset();
        let output_size = preset.output_size(source_size);
        let session = Session::new(
            job.segment,
            job.background,
            job.cursor,
            output_size,
            options.speed,
        )?;
        let (trim_start, trim_end) = (session.segment().trim_start, session.segment().trim_end);
        let total = total_frames(trim_end - trim_start, options.speed);
        reporter.report(0.0, 0, total, ExportStage::Priming);

        sink.configure(&EncoderConfig {
            size: output_size,
            fps: EXPORT_FPS,
            bitrate_kbps: preset.video_bitrate_kbps,
            codec: options.codec,
            output: job.output_path,
        })
        .await?;

        let mut compositor = Compositor::new();
        compositor.reset();
        let mut clock = VirtualClock::new(EXPORT_FPS);
        seek_and_wait(source, trim_start, options.seek_timeout, cancel).await?;

        self.set_stage(ExportStage::Exporting);
        tracing::info!(
            total_frames = total,
            width = output_size.width,
            height = output_size.height,
            "Rendering frames"
        );

        let started = Instant::now();
        let mut loop_back = LoopBackDetector::new();
        let mut frames = 0u64;
        for k in 0..=total {
            if cancel.is_cancelled() {
                return Err(ReframeError::Cancelled);
            }
            let t = frame_source_time(trim_start, k, options.speed);
            if t >= trim_end - TIME_EPSILON {
                break;
            }
            reporter.report_timed(k, total, started);

            let ack = seek_and_wait(source, t, options.seek_timeout, cancel).await?;
            if source.has_ended() {
                tracing::info!(time = t, "Decode source reported end of media");
                break;
            }
            if loop_back.observe((ack.landed - trim_start) / (trim_end - trim_start)) {
                tracing::warn!(
                    requested = ack.requested,
                    landed = ack.landed,
                    "Decode source looped back to the start, stopping export"
                );
                break;
            }

            let frame = source
                .current_frame()
                .ok_or_else(|| ReframeError::decode(format!("no frame decoded at {t:.3}s after seek")))?;
            let request = CompositionRequest::new(&session, Some(&frame), t, CompositeMode::Exact)?;
            let result = compositor
                .composite(&request, &clock)?
                .ok_or_else(|| ReframeError::render(format!("compositor skipped frame at {t:.3}s")))?;

            cancellable(cancel, sink.submit(&result.frame)).await?;
            clock.tick();
            frames += 1;
        }

        if frames == 0 {
            return Err(ReframeError::decode(
                "decode source ended before the first frame",
            ));
        }

        self.set_stage(ExportStage::Finalizing);
        reporter.report(1.0, frames, total, ExportStage::Finalizing);
        let output = cancellable(cancel, sink.finish()).await?;

        Ok(ExportOutcome {
            output,
            frames,
            size: output_size,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = ReframeResult<T>>,
) -> ReframeResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReframeError::Cancelled),
        result = fut => result,
    }
}

async fn seek_and_wait<S: DecodeSource + ?Sized>(
    source: &mut S,
    time: f64,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> ReframeResult<SeekAck> {
    let seek = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, source.seek(time)).await {
                Ok(result) => result,
                Err(_) => Err(ReframeError::decode_stall(format!(
                    "seek to {time:.3}s did not land within {:.1}s",
                    limit.as_secs_f64()
                ))),
            },
            None => source.seek(time).await,
        }
    };
    cancellable(cancel, seek).await
}

async fn restore_source<S: DecodeSource + ?Sized>(source: &mut S, (time, playing): (f64, bool)) {
    match tokio::time::timeout(RESTORE_SEEK_TIMEOUT, source.seek(time)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, time, "Failed to restore source position"),
        Err(_) => tracing::warn!(time, "Timed out restoring source position"),
    }
    if playing {
        if let Err(err) = source.play().await {
            tracing::warn!(error = %err, "Failed to resume source playback");
        }
    }
}

/// Emits non-decreasing progress and goes silent once stopped.
struct Reporter {
    callback: Option<ProgressCallback>,
    last: f64,
    stopped: bool,
}

impl Reporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: 0.0,
            stopped: false,
        }
    }

    fn report(&mut self, progress: f64, frames: u64, total: u64, stage: ExportStage) {
        self.emit(progress, frames, total, 0.0, stage);
    }

    fn report_timed(&mut self, frames: u64, total: u64, started: Instant) {
        let progress = frames as f64 / total.max(1) as f64;
        let elapsed = started.elapsed().as_secs_f64();
        let eta_secs = if progress > 0.0 {
            (elapsed / progress) - elapsed
        } else {
            0.0
        }
        .max(0.0);
        self.emit(progress, frames, total, eta_secs, ExportStage::Exporting);
    }

    fn emit(&mut self, progress: f64, frames: u64, total: u64, eta_secs: f64, stage: ExportStage) {
        if self.stopped {
            return;
        }
        let progress = progress.clamp(0.0, 1.0).max(self.last);
        self.last = progress;
        if let Some(cb) = &self.callback {
            cb(ExportProgress {
                progress,
                frames_rendered: frames,
                total_frames: total,
                eta_secs,
                stage,
            });
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
