//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where projects are stored, one subdirectory per project id.
    pub projects_dir: PathBuf,

    /// Default export parameters.
    pub export: ExportDefaults,

    /// Optional JSON file holding a tuned auto-zoom heuristic profile.
    pub auto_zoom_profile: Option<PathBuf>,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Quality preset name (`original`, `high`, `medium`, `small`).
    pub quality: String,

    /// Playback speed multiplier.
    pub speed: f64,

    /// Default video codec (`h264`, `h265`, `vp9`).
    pub video_codec: String,

    /// Per-seek timeout in seconds. `None` waits indefinitely.
    pub seek_timeout_secs: Option<f64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reframe=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            projects_dir: dirs_default_projects(),
            export: ExportDefaults::default(),
            auto_zoom_profile: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            quality: "high".to_string(),
            speed: 1.0,
            video_codec: "h264".to_string(),
            seek_timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match Self::from_json(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Parse a config document. Missing fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reframe").join("config.json")
}

/// Default projects directory.
fn dirs_default_projects() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("reframe").join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = AppConfig::from_json(r#"{"export":{"speed":1.5}}"#).unwrap();
        assert!((config.export.speed - 1.5).abs() < 1e-9);
        assert_eq!(config.export.quality, "high");
        assert_eq!(config.export.video_codec, "h264");
        assert!(config.export.seek_timeout_secs.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_roundtrip_keeps_profile_path() {
        let config = AppConfig {
            auto_zoom_profile: Some(PathBuf::from("/tmp/zoom.json")),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed = AppConfig::from_json(&json).unwrap();
        assert_eq!(parsed.auto_zoom_profile, config.auto_zoom_profile);
    }
}
