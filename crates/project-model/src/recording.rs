//! On-disk layout of a recording session.
//!
//! ```text
//! <recording>/
//!   raw.mp4                 constant-fps capture
//!   cursor-keyframes.json   pointer timeline
//!   post-production.json    editable cursor/audio settings
//!   manifest.json           session outcome
//!   output.mp4              default export target
//! ```

use std::path::{Path, PathBuf};

use crate::error::ProjectError;
use crate::keyframe::KeyframeTimeline;
use crate::manifest::RecordingManifest;
use crate::post_production::PostProductionConfig;

pub const RAW_VIDEO_FILE: &str = "raw.mp4";
pub const KEYFRAMES_FILE: &str = "cursor-keyframes.json";
pub const POST_PRODUCTION_FILE: &str = "post-production.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const OUTPUT_FILE: &str = "output.mp4";

/// Paths inside one recording directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDir {
    root: PathBuf,
}

impl RecordingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let dir = Self::new(root);
        std::fs::create_dir_all(&dir.root).map_err(|e| ProjectError::IoError {
            path: dir.root.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name, used as the recording name.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string())
    }

    pub fn raw_video_path(&self) -> PathBuf {
        self.root.join(RAW_VIDEO_FILE)
    }

    pub fn keyframes_path(&self) -> PathBuf {
        self.root.join(KEYFRAMES_FILE)
    }

    pub fn post_production_path(&self) -> PathBuf {
        self.root.join(POST_PRODUCTION_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(OUTPUT_FILE)
    }

    pub fn load_timeline(&self) -> Result<KeyframeTimeline, ProjectError> {
        KeyframeTimeline::load(self.keyframes_path())
    }

    pub fn save_timeline(&self, timeline: &KeyframeTimeline) -> Result<(), ProjectError> {
        timeline.save(self.keyframes_path())
    }

    /// Settings file, or defaults when the recording has none yet.
    pub fn load_post_production(&self) -> Result<PostProductionConfig, ProjectError> {
        PostProductionConfig::load_or_default(self.post_production_path())
    }

    pub fn save_post_production(&self, config: &PostProductionConfig) -> Result<(), ProjectError> {
        config.save(self.post_production_path())
    }

    /// Manifest, if the session wrote one.
    pub fn load_manifest(&self) -> Result<Option<RecordingManifest>, ProjectError> {
        let path = self.manifest_path();
        if path.exists() {
            RecordingManifest::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn save_manifest(&self, manifest: &RecordingManifest) -> Result<(), ProjectError> {
        manifest.save(self.manifest_path())
    }

    /// Report files an export needs that are missing.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];
        if !self.raw_video_path().exists() {
            errors.push(format!("Raw capture missing: {RAW_VIDEO_FILE}"));
        }
        if !self.keyframes_path().exists() {
            errors.push(format!("Keyframe file missing: {KEYFRAMES_FILE}"));
        }
        errors
    }
}

/// A recording with its persisted files loaded.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    pub dir: RecordingDir,
    pub timeline: KeyframeTimeline,
    pub post_production: PostProductionConfig,
    pub manifest: Option<RecordingManifest>,
}

impl LoadedRecording {
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let dir = RecordingDir::new(root);
        let timeline = dir.load_timeline()?;
        let post_production = dir.load_post_production()?;
        let manifest = dir.load_manifest()?;
        Ok(Self {
            dir,
            timeline,
            post_production,
            manifest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::{KeyframeRecorder, Viewport};

    #[test]
    fn test_layout_paths() {
        let dir = RecordingDir::new("/tmp/recordings/demo");
        assert_eq!(dir.name(), "demo");
        assert!(dir.raw_video_path().ends_with("raw.mp4"));
        assert!(dir.keyframes_path().ends_with("cursor-keyframes.json"));
        assert!(dir.output_path().ends_with("output.mp4"));
    }

    #[test]
    fn test_create_save_and_load() {
        let root = std::env::temp_dir().join("dolly_test_recording_dir");
        let _ = std::fs::remove_dir_all(&root);

        let dir = RecordingDir::create(&root).unwrap();
        let mut recorder = KeyframeRecorder::new(30, Viewport::new(1280, 720), "t0");
        recorder.record_click(5.0, 5.0, 250.0, "a", 0);
        dir.save_timeline(&recorder.finish(1000.0)).unwrap();

        let missing = dir.validate_sources();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("Raw capture missing"));

        let loaded = LoadedRecording::load(&root).unwrap();
        assert_eq!(loaded.timeline.click_count(), 1);
        assert_eq!(loaded.post_production, PostProductionConfig::default());
        assert!(loaded.manifest.is_none());

        std::fs::remove_dir_all(&root).ok();
    }
}
