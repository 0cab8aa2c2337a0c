//! Project metadata, export settings, and on-disk storage.
//!
//! A project ties together the source recording, its cursor telemetry, the
//! edited segment, and export configuration. Layout on disk:
//!
//! ```text
//! <root>/<id>/meta/project.json
//! <root>/<id>/meta/cursor.jsonl
//! <root>/<id>/sources/<media file>
//! <root>/<id>/exports/
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use reframe_common::ReframeError;
use serde::{Deserialize, Serialize};

use crate::background::BackgroundConfig;
use crate::camera::FrameSize;
use crate::cursor::{self, CursorSample};
use crate::timeline::{SegmentError, VideoSegment};

pub const PROJECT_VERSION: &str = "1.0";

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Schema version.
    pub version: String,

    /// Unique project identifier; also the directory name.
    pub id: String,

    /// Human-readable project name.
    pub name: String,

    /// Creation timestamp (RFC 3339).
    pub created_at: String,

    /// Last modified timestamp (RFC 3339).
    pub modified_at: String,

    /// The recorded screen capture.
    pub source: SourceMedia,

    /// Trim window and zoom keyframes.
    pub segment: VideoSegment,

    /// Compositing style.
    #[serde(default)]
    pub background: BackgroundConfig,

    /// Export configuration.
    #[serde(default)]
    pub export: ExportSettings,
}

/// Reference to the source recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMedia {
    /// Path relative to the project directory.
    pub path: String,

    /// Frame dimensions in pixels.
    pub width: u32,
    pub height: u32,

    /// Duration in seconds.
    pub duration_secs: f64,
}

impl SourceMedia {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Persisted export preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub quality: ExportQuality,
    /// Playback speed multiplier in `[0.5, 2.0]`.
    pub speed: f64,
    pub codec: VideoCodec,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            quality: ExportQuality::High,
            speed: 1.0,
            codec: VideoCodec::H264,
        }
    }
}

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Original,
    #[default]
    High,
    Medium,
    Small,
}

/// Concrete encoding limits for a quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    /// Bounding box for the output; `None` keeps the source size.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub video_bitrate_kbps: u32,
}

impl ExportQuality {
    pub fn preset(self) -> QualityPreset {
        let (max, video_bitrate_kbps) = match self {
            ExportQuality::Original => (None, 20_000),
            ExportQuality::High => (Some((1920, 1080)), 12_000),
            ExportQuality::Medium => (Some((1280, 720)), 6_000),
            ExportQuality::Small => (Some((854, 480)), 2_500),
        };
        QualityPreset {
            max_width: max.map(|(w, _)| w),
            max_height: max.map(|(_, h)| h),
            video_bitrate_kbps,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportQuality::Original => "original",
            ExportQuality::High => "high",
            ExportQuality::Medium => "medium",
            ExportQuality::Small => "small",
        }
    }
}

impl QualityPreset {
    /// Output dimensions for a source: aspect-preserving, never upscaled,
    /// even on both axes.
    pub fn output_size(&self, source: FrameSize) -> FrameSize {
        let max = FrameSize::new(
            self.max_width.unwrap_or(source.width),
            self.max_height.unwrap_or(source.height),
        );
        source.fit_within(max)
    }
}

impl FromStr for ExportQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(ExportQuality::Original),
            "high" => Ok(ExportQuality::High),
            "medium" => Ok(ExportQuality::Medium),
            "small" => Ok(ExportQuality::Small),
            other => Err(format!(
                "unknown quality '{other}' (expected original, high, medium, small)"
            )),
        }
    }
}

/// Output video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Vp9,
}

impl VideoCodec {
    /// Short tag used in output file names.
    pub fn tag(self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Vp9 => "vp9",
        }
    }

    /// Container file extension.
    pub fn extension(self) -> &'static str {
        match self {
            VideoCodec::H264 | VideoCodec::H265 => "mp4",
            VideoCodec::Vp9 => "webm",
        }
    }

    /// ffmpeg encoder name.
    pub fn encoder(self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
        }
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => Ok(VideoCodec::H264),
            "h265" | "hevc" => Ok(VideoCodec::H265),
            "vp9" => Ok(VideoCodec::Vp9),
            other => Err(format!("unknown codec '{other}' (expected h264, h265, vp9)")),
        }
    }
}

impl Project {
    /// Create a new project spanning the whole source.
    pub fn new(name: impl Into<String>, source: SourceMedia) -> Result<Self, ProjectError> {
        let segment = VideoSegment::new(0.0, source.duration_secs)?;
        let now = chrono::Utc::now().to_rfc3339();
        Ok(Self {
            version: PROJECT_VERSION.to_string(),
            id: generate_id(),
            name: name.into(),
            created_at: now.clone(),
            modified_at: now,
            source,
            segment,
            background: BackgroundConfig::default(),
            export: ExportSettings::default(),
        })
    }

    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    /// Project metadata.
    pub project: Project,

    /// Recorded cursor telemetry, ordered by timestamp.
    pub cursor: Vec<CursorSample>,
}

impl LoadedProject {
    /// Load a project from its directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        let project_path = root.join("meta").join("project.json");
        let cursor_path = root.join("meta").join("cursor.jsonl");

        let project_json = read_file(&project_path)?;
        let project: Project =
            serde_json::from_str(&project_json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;

        let cursor = if cursor_path.exists() {
            let jsonl = read_file(&cursor_path)?;
            let mut samples =
                cursor::parse_samples(&jsonl).map_err(|e| ProjectError::ParseError {
                    path: cursor_path,
                    source: e,
                })?;
            if !cursor::is_time_ordered(&samples) {
                samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            }
            samples
        } else {
            Vec::new()
        };

        Ok(Self {
            root,
            project,
            cursor,
        })
    }

    /// Save project metadata. Cursor telemetry is written once at creation.
    pub fn save(&self) -> Result<(), ProjectError> {
        let meta_dir = self.root.join("meta");
        create_dir(&meta_dir)?;

        let project_path = meta_dir.join("project.json");
        let project_json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        write_file(&project_path, project_json)
    }

    /// Absolute path to the source media.
    pub fn media_path(&self) -> PathBuf {
        self.root.join(&self.project.source.path)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Check that referenced files exist and the segment fits the source.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        if !self.media_path().exists() {
            errors.push(format!("Source media missing: {}", self.project.source.path));
        }

        if !self.root.join("meta").join("cursor.jsonl").exists() {
            errors.push("Cursor file missing: meta/cursor.jsonl".to_string());
        }

        if let Err(e) = self
            .project
            .segment
            .validate(self.project.source.duration_secs)
        {
            errors.push(format!("Segment invalid: {e}"));
        }

        errors
    }
}

/// Projects stored under a root directory, one subdirectory per id.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Create a project: copies the media file into `sources/` and writes
    /// the cursor telemetry.
    ///
    /// `source.path` is read as the media file's current location and
    /// rewritten to the project-relative copy.
    pub fn create(
        &self,
        name: impl Into<String>,
        mut source: SourceMedia,
        cursor: Vec<CursorSample>,
    ) -> Result<LoadedProject, ProjectError> {
        let media = PathBuf::from(&source.path);
        let file_name = media
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ProjectError::ValidationError {
                message: format!("media path has no file name: {}", media.display()),
            })?;

        source.path = format!("sources/{file_name}");
        let project = Project::new(name, source)?;
        let root = self.project_dir(&project.id);

        for subdir in ["sources", "meta", "exports"] {
            create_dir(&root.join(subdir))?;
        }

        let target = root.join(&project.source.path);
        std::fs::copy(&media, &target).map_err(|e| ProjectError::IoError {
            path: media.clone(),
            source: e,
        })?;

        let cursor_path = root.join("meta").join("cursor.jsonl");
        let jsonl = cursor::serialize_samples(&cursor).map_err(|e| ProjectError::ParseError {
            path: cursor_path.clone(),
            source: e,
        })?;
        write_file(&cursor_path, jsonl)?;

        let loaded = LoadedProject {
            root,
            project,
            cursor,
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// Load a project by id.
    pub fn load(&self, id: &str) -> Result<LoadedProject, ProjectError> {
        let dir = self.project_dir(id);
        if !dir.join("meta").join("project.json").exists() {
            return Err(ProjectError::NotFound { id: id.to_string() });
        }
        LoadedProject::load(dir)
    }

    /// Save a project, bumping its modification time.
    pub fn save(&self, loaded: &mut LoadedProject) -> Result<(), ProjectError> {
        loaded.project.touch();
        loaded.save()
    }

    /// All readable projects, oldest first. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<Project>, ProjectError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| ProjectError::IoError {
            path: self.root.clone(),
            source: e,
        })?;

        let mut projects: Vec<Project> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| LoadedProject::load(entry.path()).ok())
            .map(|loaded| loaded.project)
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },

    #[error("Project not found: {id}")]
    NotFound { id: String },
}

impl From<SegmentError> for ProjectError {
    fn from(e: SegmentError) -> Self {
        ProjectError::ValidationError {
            message: e.to_string(),
        }
    }
}

impl From<ProjectError> for ReframeError {
    fn from(e: ProjectError) -> Self {
        ReframeError::project(e.to_string())
    }
}

impl From<SegmentError> for ReframeError {
    fn from(e: SegmentError) -> Self {
        ReframeError::input(e.to_string())
    }
}

fn read_file(path: &Path) -> Result<String, ProjectError> {
    std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, contents: String) -> Result<(), ProjectError> {
    std::fs::write(path, contents).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn create_dir(path: &Path) -> Result<(), ProjectError> {
    std::fs::create_dir_all(path).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Time-ordered project id: `<yyyymmdd>-<hhmmss>-<pid><seq>`.
fn generate_id() -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let now = chrono::Utc::now();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-{:04x}{:04x}{:06x}",
        now.format("%Y%m%d-%H%M%S"),
        std::process::id() & 0xFFFF,
        seq & 0xFFFF,
        now.timestamp_subsec_micros()
    )
}
