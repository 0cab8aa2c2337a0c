//! `ffmpeg`-backed decode source and encode sink.
//!
//! Both talk to the system `ffmpeg`/`ffprobe` binaries over pipes. Frames
//! cross the pipe as raw RGBA so no codec crate is linked into the process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use image::RgbaImage;
use reframe_common::{ReframeError, ReframeResult};
use reframe_project_model::camera::FrameSize;
use reframe_project_model::project::VideoCodec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::source::{DecodeSource, DecodedFrame, EncodeSink, EncoderConfig, ReadyState, SeekAck};

/// Media properties reported by `ffprobe`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub size: FrameSize,
    pub duration_secs: f64,
}

/// Probe dimensions and duration of the first video stream.
pub async fn probe_media(path: &Path) -> ReframeResult<MediaInfo> {
    if !path.exists() {
        return Err(ReframeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| ReframeError::decode(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ReframeError::decode(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ReframeError::decode(format!("ffprobe reported no video stream in {}", path.display()))
    })
}

fn parse_probe_output(raw: &str) -> Option<MediaInfo> {
    let (mut width, mut height, mut duration) = (None, None, None);
    for line in raw.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "duration" => duration = value.parse::<f64>().ok(),
            _ => {}
        }
    }
    let size = FrameSize::new(width?, height?);
    let duration_secs = duration.filter(|d| d.is_finite() && *d > 0.0)?;
    if size.is_empty() {
        return None;
    }
    Some(MediaInfo {
        size,
        duration_secs,
    })
}

/// Check whether the host `ffmpeg` has the named encoder.
pub async fn encoder_available(encoder: &str) -> bool {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            encoder_list_contains(&String::from_utf8_lossy(&output.stdout), encoder)
        }
        _ => false,
    }
}

fn encoder_list_contains(listing: &str, encoder: &str) -> bool {
    listing.lines().any(|line| {
        let mut parts = line.split_whitespace();
        let flags = parts.next().unwrap_or_default();
        flags.len() == 6 && parts.next() == Some(encoder)
    })
}

/// Frame rate of the preview stream decoded while playing.
pub const PREVIEW_STREAM_FPS: u32 = 30;

/// Half an export frame: a sought frame only matches the position it landed on.
const SEEK_MATCH_SECS: f64 = 0.5 / 60.0;

/// How far a streamed frame may be from the playback clock and still show.
const STREAM_TOLERANCE_SECS: f64 = 0.25;

/// Decode source backed by `ffmpeg`.
///
/// Seeks extract exactly one frame. While playing, a real-time `ffmpeg`
/// stream publishes frames in the background; preview ticks show the latest
/// one near the playback clock and skip while the stream warms up.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    info: MediaInfo,
    position: f64,
    playing_since: Option<(Instant, f64)>,
    frame: Option<DecodedFrame>,
    stream: Option<FrameStream>,
    ended: bool,
}

/// Background reader of a playing `ffmpeg` stream. Dropping it stops the
/// reader, which kills the child process.
#[derive(Debug)]
struct FrameStream {
    latest: watch::Receiver<Option<DecodedFrame>>,
    task: JoinHandle<()>,
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl FfmpegSource {
    pub async fn open(path: impl Into<PathBuf>) -> ReframeResult<Self> {
        let path = path.into();
        let info = probe_media(&path).await?;
        tracing::debug!(
            path = %path.display(),
            width = info.size.width,
            height = info.size.height,
            duration = info.duration_secs,
            "Opened decode source"
        );
        Ok(Self {
            path,
            info,
            position: 0.0,
            playing_since: None,
            frame: None,
            stream: None,
            ended: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> MediaInfo {
        self.info
    }

    async fn decode_at(&self, time: f64) -> ReframeResult<Option<RgbaImage>> {
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{time:.6}"), "-i"])
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReframeError::decode(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ReframeError::decode(format!(
                "ffmpeg could not decode {} at {time:.3}s: {}",
                self.path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }

        let FrameSize { width, height } = self.info.size;
        let expected = width as usize * height as usize * 4;
        if output.stdout.len() != expected {
            return Err(ReframeError::decode(format!(
                "decoded frame is {} bytes, expected {expected} for {width}x{height}",
                output.stdout.len()
            )));
        }
        Ok(RgbaImage::from_raw(width, height, output.stdout))
    }

    /// Start a real-time decode from `from`. Best effort: on failure preview
    /// falls back to sought frames only.
    fn start_stream(&mut self, from: f64) {
        self.stream = None;
        let spawned = Command::new("ffmpeg")
            .args(preview_stream_args(&self.path, from))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to start preview stream");
                return;
            }
        };
        let Some(stdout) = child.stdout.take() else {
            tracing::warn!("Preview stream has no stdout");
            return;
        };

        let (tx, latest) = watch::channel(None);
        let size = self.info.size;
        let task = tokio::spawn(async move {
            let _child = child;
            let frames = publish_frames(stdout, size, from, PREVIEW_STREAM_FPS, tx).await;
            tracing::trace!(frames, "Preview stream closed");
        });
        self.stream = Some(FrameStream { latest, task });
    }
}

/// Command line for a real-time raw RGBA stream starting at `from`.
pub fn preview_stream_args(path: &Path, from: f64) -> Vec<String> {
    let mut args: Vec<String> = ["-v", "error", "-re", "-ss"].map(String::from).to_vec();
    args.push(format!("{from:.6}"));
    args.push("-i".to_string());
    args.push(path.to_string_lossy().into_owned());
    args.extend(
        ["-f", "rawvideo", "-pix_fmt", "rgba", "-r"]
            .map(String::from)
            .into_iter()
            .chain([PREVIEW_STREAM_FPS.to_string(), "-".to_string()]),
    );
    args
}

/// Read whole raw RGBA frames from `reader` and publish each as the latest
/// frame, stamped `from + index / fps`. Returns the number of frames read.
async fn publish_frames<R: AsyncRead + Unpin>(
    mut reader: R,
    size: FrameSize,
    from: f64,
    fps: u32,
    tx: watch::Sender<Option<DecodedFrame>>,
) -> u64 {
    let frame_len = size.width as usize * size.height as usize * 4;
    let mut index = 0u64;
    while frame_len > 0 {
        let mut buf = vec![0u8; frame_len];
        if reader.read_exact(&mut buf).await.is_err() {
            break;
        }
        let Some(image) = RgbaImage::from_raw(size.width, size.height, buf) else {
            break;
        };
        let timestamp = from + index as f64 / fps.max(1) as f64;
        index += 1;
        if tx.send(Some(DecodedFrame::new(timestamp, image))).is_err() {
            break;
        }
    }
    index
}

/// The frame to show at `now`: a streamed frame near the clock, else the
/// sought frame if it sits exactly at `now`.
fn pick_frame(
    streamed: Option<DecodedFrame>,
    sought: Option<&DecodedFrame>,
    now: f64,
) -> Option<DecodedFrame> {
    streamed
        .filter(|f| (f.timestamp - now).abs() <= STREAM_TOLERANCE_SECS)
        .or_else(|| {
            sought
                .filter(|f| (f.timestamp - now).abs() <= SEEK_MATCH_SECS)
                .cloned()
        })
}

#[async_trait]
impl DecodeSource for FfmpegSource {
    fn size(&self) -> FrameSize {
        self.info.size
    }

    fn duration(&self) -> f64 {
        self.info.duration_secs
    }

    fn current_time(&self) -> f64 {
        match self.playing_since {
            Some((since, from)) => (from + since.elapsed().as_secs_f64()).min(self.info.duration_secs),
            None => self.position,
        }
    }

    fn ready_state(&self) -> ReadyState {
        if self.current_frame().is_some() {
            ReadyState::CurrentFrame
        } else {
            ReadyState::Metadata
        }
    }

    fn is_playing(&self) -> bool {
        self.playing_since.is_some() && !self.has_ended()
    }

    fn has_ended(&self) -> bool {
        self.ended || (self.playing_since.is_some() && self.current_time() >= self.info.duration_secs)
    }

    fn current_frame(&self) -> Option<DecodedFrame> {
        let streamed = self
            .stream
            .as_ref()
            .and_then(|stream| stream.latest.borrow().clone());
        pick_frame(streamed, self.frame.as_ref(), self.current_time())
    }

    async fn seek(&mut self, time: f64) -> ReframeResult<SeekAck> {
        let target = time.clamp(0.0, self.info.duration_secs);
        match self.decode_at(target).await? {
            Some(image) => {
                self.frame = Some(DecodedFrame::new(target, image));
                self.position = target;
                self.ended = false;
            }
            None => {
                // Past the last decodable frame.
                self.position = self.info.duration_secs;
                self.ended = true;
            }
        }
        if self.playing_since.is_some() {
            self.playing_since = Some((Instant::now(), self.position));
            self.start_stream(self.position);
        }
        Ok(SeekAck {
            requested: time,
            landed: self.position,
        })
    }

    async fn play(&mut self) -> ReframeResult<()> {
        if self.ended {
            self.position = 0.0;
            self.ended = false;
        }
        self.playing_since = Some((Instant::now(), self.position));
        self.start_stream(self.position);
        Ok(())
    }

    fn pause(&mut self) {
        self.position = self.current_time();
        self.playing_since = None;
        self.stream = None;
    }
}

/// Build the encoder command line for raw RGBA frames on stdin.
pub fn encoder_args(config: &EncoderConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend([
        "-s".to_string(),
        format!("{}x{}", config.size.width, config.size.height),
        "-r".to_string(),
        config.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        config.codec.encoder().to_string(),
        "-b:v".to_string(),
        format!("{}k", config.bitrate_kbps),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-g".to_string(),
        config.fps.to_string(),
    ]);

    match config.codec {
        VideoCodec::H264 | VideoCodec::H265 => {
            args.extend(["-preset", "medium", "-movflags", "+faststart"].map(String::from));
        }
        VideoCodec::Vp9 => {
            args.extend(["-deadline", "good", "-row-mt", "1"].map(String::from));
        }
    }

    args.push(config.output.to_string_lossy().into_owned());
    args
}

/// Encode sink that pipes raw frames into an `ffmpeg` process.
///
/// Writes go straight to the child's stdin, so a slow encoder blocks
/// [`EncodeSink::submit`] on the full pipe.
#[derive(Debug, Default)]
pub struct FfmpegSink {
    config: Option<EncoderConfig>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frames: u64,
}

impl FfmpegSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    async fn collect_stderr(&mut self) -> String {
        match self.stderr_task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        }
    }
}

#[async_trait]
impl EncodeSink for FfmpegSink {
    async fn configure(&mut self, config: &EncoderConfig) -> ReframeResult<()> {
        let encoder = config.codec.encoder();
        if !encoder_available(encoder).await {
            return Err(ReframeError::encoder_unavailable(format!(
                "ffmpeg encoder '{encoder}' is not available on this host"
            )));
        }
        if let Some(parent) = config.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = encoder_args(config);
        tracing::debug!(args = ?args, "Spawning ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReframeError::encoder_unavailable(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReframeError::encode("Failed to capture ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReframeError::encode("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        self.stderr_task = Some(tokio::spawn(async move {
            let mut out = String::new();
            if let Err(err) = stderr.read_to_string(&mut out).await {
                return format!("<failed to read ffmpeg stderr: {err}>");
            }
            out
        }));
        self.stdin = Some(stdin);
        self.child = Some(child);
        self.config = Some(config.clone());
        self.frames = 0;
        Ok(())
    }

    async fn submit(&mut self, frame: &RgbaImage) -> ReframeResult<()> {
        let (Some(config), Some(stdin)) = (self.config.as_ref(), self.stdin.as_mut()) else {
            return Err(ReframeError::encode("encoder is not configured"));
        };
        if frame.dimensions() != (config.size.width, config.size.height) {
            return Err(ReframeError::encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                config.size.width,
                config.size.height
            )));
        }
        if let Err(err) = stdin.write_all(frame.as_raw()).await {
            let stderr = self.collect_stderr().await;
            return Err(ReframeError::encode(format!(
                "ffmpeg stopped accepting frames: {err}: {}",
                stderr.trim()
            )));
        }
        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> ReframeResult<PathBuf> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| ReframeError::encode("encoder is not configured"))?;
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReframeError::encode("encoder process already finished"))?;
        let status = child.wait().await?;
        let stderr = self.collect_stderr().await;

        if !status.success() {
            let _ = tokio::fs::remove_file(&config.output).await;
            return Err(ReframeError::encode(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }
        tracing::info!(
            output = %config.output.display(),
            frames = self.frames,
            "Encoder finished"
        );
        Ok(config.output)
    }

    async fn abort(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                tracing::debug!(error = %err, "ffmpeg already exited");
            }
            let _ = child.wait().await;
        }
        self.collect_stderr().await;
        if let Some(config) = self.config.take() {
            match tokio::fs::remove_file(&config.output).await {
                Ok(()) => tracing::warn!(
                    output = %config.output.display(),
                    "Removed partial export"
                ),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => tracing::warn!(
                    output = %config.output.display(),
                    error = %err,
                    "Failed to remove partial export"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let raw = "width=1920\nheight=1080\nduration=12.480000\n";
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.size, FrameSize::new(1920, 1080));
        assert!((info.duration_secs - 12.48).abs() < 1e-9);

        assert!(parse_probe_output("width=1920\nheight=1080\nduration=N/A\n").is_none());
        assert!(parse_probe_output("duration=3.0\n").is_none());
    }

    #[test]
    fn test_encoder_list_contains() {
        let listing = "Encoders:\n V..... = Video\n ------\n V....D libx264              libx264 H.264 / AVC\n V....D libvpx-vp9           libvpx VP9\n A....D aac                  AAC\n";
        assert!(encoder_list_contains(listing, "libx264"));
        assert!(encoder_list_contains(listing, "libvpx-vp9"));
        assert!(!encoder_list_contains(listing, "libx265"));
        assert!(!encoder_list_contains(listing, "Video"));
    }

    #[test]
    fn test_encoder_args() {
        let config = EncoderConfig {
            size: FrameSize::new(1280, 720),
            fps: 60,
            bitrate_kbps: 6000,
            codec: VideoCodec::H264,
            output: PathBuf::from("/tmp/out.mp4"),
        };
        let args = encoder_args(&config);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 1280x720 -r 60 -i -"));
        assert!(joined.contains("-c:v libx264 -b:v 6000k"));
        assert!(joined.contains("+faststart"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));

        let vp9 = encoder_args(&EncoderConfig {
            codec: VideoCodec::Vp9,
            output: PathBuf::from("/tmp/out.webm"),
            ..config
        });
        assert!(vp9.iter().any(|a| a == "libvpx-vp9"));
        assert!(!vp9.iter().any(|a| a == "+faststart"));
    }

    #[test]
    fn test_preview_stream_args() {
        let args = preview_stream_args(Path::new("/tmp/in.mp4"), 2.5);
        let joined = args.join(" ");
        assert!(joined.starts_with("-v error -re -ss 2.500000 -i /tmp/in.mp4"));
        assert!(joined.ends_with("-f rawvideo -pix_fmt rgba -r 30 -"));
    }

    #[tokio::test]
    async fn test_publish_frames_stamps_stream_position() {
        let size = FrameSize::new(2, 2);
        let mut raw = vec![10u8; 16];
        raw.extend(vec![20u8; 16]);
        // A trailing partial frame is dropped.
        raw.extend(vec![30u8; 5]);

        let (tx, rx) = watch::channel(None);
        let frames = publish_frames(raw.as_slice(), size, 4.0, 30, tx).await;
        assert_eq!(frames, 2);

        let latest = rx.borrow().clone().unwrap();
        assert!((latest.timestamp - (4.0 + 1.0 / 30.0)).abs() < 1e-12);
        assert_eq!(latest.image.get_pixel(1, 1).0, [20, 20, 20, 20]);
    }

    #[test]
    fn test_pick_frame_prefers_stream_near_clock() {
        let frame = |t: f64| DecodedFrame::new(t, RgbaImage::new(1, 1));
        let sought = frame(3.0);

        // Streamed frame a few ticks behind the clock still shows.
        let picked = pick_frame(Some(frame(3.1)), Some(&sought), 3.2).unwrap();
        assert_eq!(picked.timestamp, 3.1);

        // Stale stream falls back to an exact sought frame.
        let picked = pick_frame(Some(frame(1.0)), Some(&sought), 3.0).unwrap();
        assert_eq!(picked.timestamp, 3.0);

        // Sought frames only match their own position.
        assert!(pick_frame(None, Some(&sought), 3.1).is_none());
        assert!(pick_frame(None, None, 3.0).is_none());
    }
}
