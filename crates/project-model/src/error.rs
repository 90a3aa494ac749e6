//! Persistence errors for recording files.

use std::path::PathBuf;

use dolly_common::DollyError;

/// Errors that can occur when reading or writing recording files.
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

    #[error("Invalid recording data: {message}")]
    ValidationError { message: String },
}

impl ProjectError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

impl From<ProjectError> for DollyError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::IoError { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                DollyError::FileNotFound { path }
            }
            other => DollyError::project(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_file_not_found() {
        let err = ProjectError::IoError {
            path: PathBuf::from("/nope/cursor-keyframes.json"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        match DollyError::from(err) {
            DollyError::FileNotFound { path } => {
                assert!(path.ends_with("cursor-keyframes.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_maps_to_project_error() {
        let err: DollyError = ProjectError::validation("fps must be at least 1").into();
        assert!(matches!(err, DollyError::Project { .. }));
        assert!(err.to_string().contains("fps must be at least 1"));
    }
}
