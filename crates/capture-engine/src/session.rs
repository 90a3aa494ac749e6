//! Recording session management.
//!
//! A session owns one recording directory. It runs the screencast recorder,
//! stamps cursor keyframes from the same clock, and on stop persists the
//! keyframe timeline, a default post-production config and the manifest.
//! Failed captures still persist what was recorded, tagged incomplete.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dolly_common::clock::{Clock, RecordingClock};
use dolly_common::config::AppConfig;
use dolly_common::error::{DollyError, DollyResult};
use dolly_project_model::{
    KeyframeRecorder, KeyframeTimeline, PostProductionConfig, RecordingDir, RecordingManifest,
    Viewport, RAW_VIDEO_FILE,
};

use crate::encoder::EncoderCommand;
use crate::recorder::{CaptureStats, RecorderOptions, ScreencastRecorder};
use crate::source::FrameSource;

/// How the raw capture is encoded.
#[derive(Debug, Clone)]
pub enum EncoderProfile {
    /// The fixed ffmpeg capture profile, with an optional binary override.
    Ffmpeg { binary: Option<PathBuf> },
    /// A custom program. The output path is appended as the last argument.
    Custom(EncoderCommand),
}

impl EncoderProfile {
    fn command(&self, fps: u32, output: &Path) -> EncoderCommand {
        match self {
            Self::Ffmpeg { binary } => EncoderCommand::default_capture(binary.as_deref(), fps, output),
            Self::Custom(command) => {
                let mut command = command.clone();
                command.args.push(output.to_string_lossy().into_owned());
                command
            }
        }
    }
}

/// Configuration for starting a new recording session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Recording name; also the directory name.
    pub name: String,

    /// Directory the recording directory is created in.
    pub output_dir: PathBuf,

    pub fps: u32,

    /// Page viewport the cursor coordinates refer to.
    pub viewport: Viewport,

    /// Frames buffered ahead of the encoder.
    pub channel_capacity: usize,

    pub encoder: EncoderProfile,
}

impl SessionConfig {
    /// Session defaults from the application config.
    pub fn from_app_config(name: impl Into<String>, config: &AppConfig) -> Self {
        Self {
            name: name.into(),
            output_dir: config.recordings_dir.clone(),
            fps: config.recording.fps,
            viewport: Viewport::new(
                config.recording.viewport_width,
                config.recording.viewport_height,
            ),
            channel_capacity: config.recording.channel_capacity,
            encoder: EncoderProfile::Ffmpeg {
                binary: config.ffmpeg_path.clone(),
            },
        }
    }
}

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created but not started.
    Idle,
    /// Recording in progress.
    Recording,
    /// Recording stopped, directory finalized.
    Stopped,
    /// Capture failed or was aborted.
    Error,
}

/// Cloneable handle for appending cursor keyframes during a recording.
///
/// Timestamps come from the recording clock, so keyframes line up with the
/// raw video's frame slots.
#[derive(Clone)]
pub struct KeyframeSink {
    recorder: Arc<Mutex<Option<KeyframeRecorder>>>,
    clock: Arc<dyn Clock>,
}

impl KeyframeSink {
    fn new(recorder: KeyframeRecorder, clock: Arc<dyn Clock>) -> Self {
        Self {
            recorder: Arc::new(Mutex::new(Some(recorder))),
            clock,
        }
    }

    /// Record the pointer moving to (x, y). Returns the timestamp used.
    pub fn record_move(&self, x: f64, y: f64, action_id: &str, step_index: u32) -> f64 {
        let t = self.clock.elapsed_ms();
        self.with_recorder(|r| r.record_move(x, y, t, action_id, step_index));
        t
    }

    /// Record a click at (x, y). Returns the timestamp used.
    pub fn record_click(&self, x: f64, y: f64, action_id: &str, step_index: u32) -> f64 {
        let t = self.clock.elapsed_ms();
        self.with_recorder(|r| r.record_click(x, y, t, action_id, step_index));
        t
    }

    pub fn len(&self) -> usize {
        let guard = self.recorder.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map_or(0, KeyframeRecorder::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_recorder(&self, f: impl FnOnce(&mut KeyframeRecorder)) {
        let mut guard = self.recorder.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(recorder) => f(recorder),
            None => tracing::debug!("Keyframe recorded after the session ended; ignored"),
        }
    }

    fn seal(&self, duration_ms: f64) -> Option<KeyframeTimeline> {
        let mut guard = self.recorder.lock().unwrap_or_else(|e| e.into_inner());
        guard.take().map(|r| r.finish(duration_ms))
    }
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub dir: RecordingDir,
    pub stats: CaptureStats,
    pub keyframes: usize,
}

/// A recording session coordinating the screencast and the keyframe timeline.
pub struct RecordingSession {
    config: SessionConfig,
    state: SessionState,
    dir: Option<RecordingDir>,
    clock: Option<Arc<dyn Clock>>,
    recorder: Option<ScreencastRecorder>,
    keyframes: Option<KeyframeSink>,
    manifest: Option<RecordingManifest>,
}

impl RecordingSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            dir: None,
            clock: None,
            recorder: None,
            keyframes: None,
            manifest: None,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Recording directory, once started.
    pub fn dir(&self) -> Option<&RecordingDir> {
        self.dir.as_ref()
    }

    /// Start recording with a monotonic clock anchored to now.
    pub async fn start(&mut self, source: Box<dyn FrameSource>) -> DollyResult<KeyframeSink> {
        self.start_with_clock(source, Arc::new(RecordingClock::start()))
            .await
    }

    /// Start recording against `clock`, whose epoch is the recording start.
    pub async fn start_with_clock(
        &mut self,
        source: Box<dyn FrameSource>,
        clock: Arc<dyn Clock>,
    ) -> DollyResult<KeyframeSink> {
        if self.state != SessionState::Idle {
            return Err(DollyError::capture("Session already started"));
        }

        tracing::info!(name = %self.config.name, fps = self.config.fps, "Starting recording session");

        let dir = RecordingDir::create(self.config.output_dir.join(&self.config.name))?;
        let started_at = clock.epoch_wall();
        let mut manifest = RecordingManifest::new(
            dir.name(),
            started_at.clone(),
            self.config.fps,
            self.config.viewport,
        );
        manifest.raw_video = Some(RAW_VIDEO_FILE.to_string());

        let options = RecorderOptions {
            fps: self.config.fps,
            channel_capacity: self.config.channel_capacity,
            encoder: self
                .config
                .encoder
                .command(self.config.fps, &dir.raw_video_path()),
        };

        let recorder = match ScreencastRecorder::start(source, Arc::clone(&clock), options).await {
            Ok(recorder) => recorder,
            Err(e) => {
                self.state = SessionState::Error;
                let failed = manifest.incomplete(e.to_string(), 0.0, 0);
                if let Err(save_err) = dir.save_manifest(&failed) {
                    tracing::warn!(error = %save_err, "Failed to write manifest");
                }
                return Err(e);
            }
        };

        let sink = KeyframeSink::new(
            KeyframeRecorder::new(self.config.fps, self.config.viewport, started_at),
            Arc::clone(&clock),
        );

        tracing::info!(dir = %dir.root().display(), epoch_wall = %clock.epoch_wall(), "Recording clock started");

        self.dir = Some(dir);
        self.clock = Some(clock);
        self.recorder = Some(recorder);
        self.keyframes = Some(sink.clone());
        self.manifest = Some(manifest);
        self.state = SessionState::Recording;
        Ok(sink)
    }

    /// Stop recording and finalize the recording directory.
    ///
    /// On a capture failure the timeline and an incomplete manifest are
    /// still written before the error is returned.
    pub async fn stop(&mut self) -> DollyResult<RecordingSummary> {
        if self.state != SessionState::Recording {
            return Err(DollyError::capture("Session not recording"));
        }
        let mut recorder = self
            .recorder
            .take()
            .ok_or_else(|| DollyError::capture("Session not recording"))?;

        tracing::info!("Stopping recording session");
        let result = recorder.stop().await;
        self.finalize(result)
    }

    /// Abort recording. The partial timeline is kept, tagged incomplete.
    pub async fn abort(&mut self) -> DollyResult<()> {
        if self.state != SessionState::Recording {
            return Ok(());
        }
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort().await?;
        }
        match self.finalize(Err(DollyError::Aborted)) {
            Err(DollyError::Aborted) => Ok(()),
            Err(e) => Err(e),
            Ok(_) => Ok(()),
        }
    }

    fn finalize(&mut self, result: DollyResult<CaptureStats>) -> DollyResult<RecordingSummary> {
        let (Some(dir), Some(manifest)) = (self.dir.clone(), self.manifest.take()) else {
            return Err(DollyError::capture("Session has no recording directory"));
        };
        let elapsed = self.clock.as_ref().map_or(0.0, |c| c.elapsed_ms());
        let duration_ms = match &result {
            Ok(stats) => stats.duration_ms,
            Err(_) => elapsed,
        };

        let timeline = self
            .keyframes
            .take()
            .and_then(|sink| sink.seal(duration_ms));
        let keyframes = timeline.as_ref().map_or(0, KeyframeTimeline::len);
        if let Some(timeline) = &timeline {
            dir.save_timeline(timeline)?;
        }
        if !dir.post_production_path().exists() {
            dir.save_post_production(&PostProductionConfig::default())?;
        }

        match result {
            Ok(stats) => {
                dir.save_manifest(&manifest.complete(
                    RAW_VIDEO_FILE,
                    stats.duration_ms,
                    stats.frames_written,
                ))?;
                self.state = SessionState::Stopped;
                tracing::info!(
                    dir = %dir.root().display(),
                    frames = stats.frames_written,
                    keyframes,
                    "Recording session finalized"
                );
                Ok(RecordingSummary {
                    dir,
                    stats,
                    keyframes,
                })
            }
            Err(e) => {
                self.state = SessionState::Error;
                let failed = manifest.incomplete(e.to_string(), duration_ms, 0);
                if let Err(save_err) = dir.save_manifest(&failed) {
                    tracing::warn!(error = %save_err, "Failed to write manifest");
                }
                tracing::warn!(error = %e, keyframes, "Recording session ended incomplete");
                Err(e)
            }
        }
    }
}
