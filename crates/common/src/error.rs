//! Error types shared across Dolly crates.

use std::path::PathBuf;

/// Top-level error type for Dolly operations.
#[derive(Debug, thiserror::Error)]
pub enum DollyError {
    /// The capture encoder failed to start or exited non-zero while recording.
    #[error("Capture error: {message}{}", stderr_suffix(.stderr))]
    Capture {
        message: String,
        stderr: Option<String>,
    },

    /// The export encoder failed to start or exited non-zero.
    #[error("Encode error: {message}{}", stderr_suffix(.stderr))]
    Encode {
        message: String,
        stderr: Option<String>,
    },

    /// A custom cursor SVG could not be turned into a shape.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Stop was requested before the capture source delivered a single frame.
    #[error("Degenerate capture: {message}")]
    DegenerateCapture { message: String },

    #[error("Operation aborted")]
    Aborted,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using DollyError.
pub type DollyResult<T> = Result<T, DollyError>;

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!(": {text}"),
        _ => String::new(),
    }
}

impl DollyError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
            stderr: None,
        }
    }

    pub fn capture_failed(msg: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
            stderr: Some(stderr.into()),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
            stderr: None,
        }
    }

    pub fn encode_failed(msg: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
            stderr: Some(stderr.into()),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn degenerate_capture(msg: impl Into<String>) -> Self {
        Self::DegenerateCapture {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    /// Captured encoder diagnostics, if this error carries any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Capture { stderr, .. } | Self::Encode { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
