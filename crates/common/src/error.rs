//! Error types shared across Reframe crates.

use std::path::PathBuf;

/// Top-level error type for Reframe operations.
#[derive(Debug, thiserror::Error)]
pub enum ReframeError {
    /// Malformed editing input, rejected before it reaches the compositor.
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// A seek on the decode source never resolved.
    #[error("Decode stalled: {message}")]
    DecodeStall { message: String, retryable: bool },

    #[error("Decode error: {message}")]
    Decode { message: String },

    /// No supported codec on the host.
    #[error("Encoder unavailable: {message}")]
    EncoderUnavailable { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("An export is already in progress")]
    ExportBusy,

    #[error("Export cancelled")]
    Cancelled,

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReframeError.
pub type ReframeResult<T> = Result<T, ReframeError>;

impl ReframeError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn decode_stall(msg: impl Into<String>) -> Self {
        Self::DecodeStall {
            message: msg.into(),
            retryable: true,
        }
    }

    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DecodeStall {
                retryable: true,
                ..
            }
        )
    }
}
