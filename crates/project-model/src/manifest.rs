//! Recording manifest (`manifest.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;
use crate::json::{read_json, write_json};
use crate::keyframe::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Complete,
    Incomplete,
}

/// Outcome of one capture session. Written for failed sessions too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingManifest {
    pub name: String,
    pub started_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,

    pub status: RecordingStatus,

    /// Raw capture file name, relative to the recording directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_video: Option<String>,

    pub duration_ms: f64,
    pub frames_written: u64,
    pub fps: u32,
    pub viewport: Viewport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordingManifest {
    pub fn new(
        name: impl Into<String>,
        started_at: impl Into<String>,
        fps: u32,
        viewport: Viewport,
    ) -> Self {
        Self {
            name: name.into(),
            started_at: started_at.into(),
            completed_at: None,
            status: RecordingStatus::Incomplete,
            raw_video: None,
            duration_ms: 0.0,
            frames_written: 0,
            fps,
            viewport,
            error: None,
        }
    }

    /// Mark the session as finished successfully.
    pub fn complete(mut self, raw_video: impl Into<String>, duration_ms: f64, frames: u64) -> Self {
        self.status = RecordingStatus::Complete;
        self.completed_at = Some(chrono::Utc::now().to_rfc3339());
        self.raw_video = Some(raw_video.into());
        self.duration_ms = duration_ms;
        self.frames_written = frames;
        self.error = None;
        self
    }

    /// Mark the session as failed, keeping whatever was recorded.
    pub fn incomplete(mut self, error: impl Into<String>, duration_ms: f64, frames: u64) -> Self {
        self.status = RecordingStatus::Incomplete;
        self.completed_at = Some(chrono::Utc::now().to_rfc3339());
        self.duration_ms = duration_ms;
        self.frames_written = frames;
        self.error = Some(error.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == RecordingStatus::Complete
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        read_json(path.as_ref())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        write_json(path.as_ref(), self)
    }
}
