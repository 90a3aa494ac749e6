//! Export planning and job management.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dolly_common::config::{AppConfig, CompositorKind};
use dolly_common::ffmpeg::resolve_ffmpeg_binary;
use dolly_common::{DollyError, DollyResult};
use dolly_cursor::{resolve_shape, CursorStyle, DEFAULT_CLICK_WINDOW_MS};
use dolly_project_model::{AudioSettings, KeyframeTimeline, LoadedRecording, PostProductionConfig};
use tokio_util::sync::CancellationToken;

use crate::compositor::{backend_for, CompositorBackend, CursorScene};
use crate::encoder::{run_encoder, EncoderInvocation};
use crate::filter_graph::{build_click_audio_filters, passthrough_video, FilterGraph, AUDIO_OUT, VIDEO_OUT};
use crate::overlay::{total_frames, OverlayFrames};

const BUNDLED_CLICK: &[u8] = include_bytes!("../assets/click.wav");
const BUNDLED_CLICK_FILE: &str = "dolly-click.wav";

/// Progress callback for export rendering. Advisory only.
pub type ProgressCallback = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    pub stage: ExportStage,

    /// Frames done so far.
    pub frame: u64,

    pub total_frames: u64,

    /// Current progress [0.0, 1.0].
    pub progress: f64,
}

impl ExportProgress {
    pub fn new(stage: ExportStage, frame: u64, total_frames: u64) -> Self {
        let progress = match stage {
            ExportStage::Complete => 1.0,
            _ if total_frames == 0 => 0.0,
            _ => (frame as f64 / total_frames as f64).clamp(0.0, 1.0),
        };
        Self {
            stage,
            frame,
            total_frames,
            progress,
        }
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    /// Cursor frames are being rendered and streamed.
    Rendering,
    /// Encoder-reported progress for exports without an overlay stream.
    Encoding,
    Complete,
}

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub raw_video: PathBuf,
    pub timeline: KeyframeTimeline,
    pub config: PostProductionConfig,
    pub output_path: PathBuf,
    pub fps: u32,
    pub ffmpeg: PathBuf,
    pub click_window_ms: f64,
    pub progress_interval_frames: u64,
}

impl ExportJob {
    /// Job at the timeline's frame rate with the default encoder.
    pub fn new(
        raw_video: impl Into<PathBuf>,
        timeline: KeyframeTimeline,
        config: PostProductionConfig,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            raw_video: raw_video.into(),
            fps: timeline.fps,
            timeline,
            config,
            output_path: output_path.into(),
            ffmpeg: resolve_ffmpeg_binary(None),
            click_window_ms: DEFAULT_CLICK_WINDOW_MS,
            progress_interval_frames: 30,
        }
    }
}

/// What the export does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Plain re-encode: no cursor stage, no audio track.
    Passthrough,
    Composite { cursor: bool, audio: bool },
}

/// A planned export.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub mode: ExportMode,
    pub args: Vec<String>,
    pub filter_graph: FilterGraph,
    pub overlay: Option<OverlayFrames>,
    pub total_frames: u64,
    pub click_sound: Option<PathBuf>,
}

/// Click sound for `audio`: the custom file when set, else the bundled
/// sound. `None` when the file cannot be used.
pub fn resolve_click_sound(audio: &AudioSettings) -> Option<PathBuf> {
    if let Some(custom) = &audio.custom_sound_path {
        if custom.is_file() {
            return Some(custom.clone());
        }
        tracing::warn!(path = %custom.display(), "Custom click sound not found; skipping click audio");
        return None;
    }
    match bundled_click_sound() {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "Bundled click sound unavailable; skipping click audio");
            None
        }
    }
}

fn bundled_click_sound() -> DollyResult<PathBuf> {
    let path = std::env::temp_dir().join(BUNDLED_CLICK_FILE);
    let needs_write = match std::fs::read(&path) {
        Ok(existing) => existing != BUNDLED_CLICK,
        Err(_) => true,
    };
    if needs_write {
        std::fs::write(&path, BUNDLED_CLICK).map_err(|e| {
            DollyError::encode(format!(
                "Failed to materialize click sound {}: {e}",
                path.display()
            ))
        })?;
    }
    Ok(path)
}

fn video_codec_args(fps: u32) -> Vec<String> {
    let fps = fps.to_string();
    ["-c:v", "libx264", "-preset", "medium", "-crf", "18", "-pix_fmt", "yuv420p", "-r", &fps]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn audio_codec_args() -> Vec<String> {
    ["-c:a", "aac", "-b:a", "128k"].iter().map(|s| s.to_string()).collect()
}

fn base_args(raw_video: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:1".into(),
        "-i".into(),
        raw_video.to_string_lossy().into_owned(),
    ]
}

/// Build the encoder arguments for `job`.
///
/// Writes intermediate files (cursor sprite, bundled click sound) but does
/// not run the encoder.
pub fn plan_export(job: &ExportJob, backend: &dyn CompositorBackend) -> DollyResult<ExportPlan> {
    if !job.raw_video.is_file() {
        return Err(DollyError::FileNotFound {
            path: job.raw_video.clone(),
        });
    }
    if job.output_path == job.raw_video {
        return Err(DollyError::config("Export output must not overwrite the raw capture"));
    }
    job.config.validate()?;

    let fps = job.fps.max(1);
    let timeline = &job.timeline;
    let frames = total_frames(timeline.duration_ms, fps);
    let cursor_enabled = job.config.cursor.enabled && !timeline.is_empty();
    let clicks: Vec<_> = timeline.click_keyframes().collect();

    let click_sound = if job.config.audio.click_sound_enabled && !clicks.is_empty() {
        resolve_click_sound(&job.config.audio)
    } else {
        None
    };

    let mut args = base_args(&job.raw_video);

    if !cursor_enabled && click_sound.is_none() {
        args.extend(video_codec_args(fps));
        args.push("-an".into());
        args.push(job.output_path.to_string_lossy().into_owned());
        tracing::info!(frames, "Export plan built: passthrough");
        return Ok(ExportPlan {
            mode: ExportMode::Passthrough,
            args,
            filter_graph: FilterGraph::new(),
            overlay: None,
            total_frames: frames,
            click_sound: None,
        });
    }

    let mut graph = FilterGraph::new();
    let mut overlay = None;
    let mut stage_output_args = Vec::new();

    if cursor_enabled {
        let shape = resolve_shape(&job.config.cursor)?;
        let style = CursorStyle::from_settings(&job.config.cursor)?;
        let work_dir = job
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let scene = CursorScene {
            shape: &shape,
            style: &style,
            keyframes: &timeline.keyframes,
            viewport: timeline.viewport,
            fps,
            duration_ms: timeline.duration_ms,
            click_window_ms: job.click_window_ms,
            work_dir,
        };
        let stage = backend.video_stage(&scene)?;
        args.extend(stage.input_args);
        graph.extend(stage.filters);
        stage_output_args = stage.output_args;
        overlay = stage.overlay;
    } else {
        graph.push(passthrough_video());
    }

    if let Some(sound) = &click_sound {
        let audio_input = if cursor_enabled { 2 } else { 1 };
        args.push("-i".into());
        args.push(sound.to_string_lossy().into_owned());
        graph.extend(build_click_audio_filters(
            &clicks,
            audio_input,
            job.config.audio.volume(),
            timeline.duration_ms.max(0.0) / 1000.0,
        ));
    }

    args.push("-filter_complex".into());
    args.push(graph.render());
    args.push("-map".into());
    args.push(VIDEO_OUT.into());
    if click_sound.is_some() {
        args.push("-map".into());
        args.push(AUDIO_OUT.into());
    }
    args.extend(video_codec_args(fps));
    if click_sound.is_some() {
        args.extend(audio_codec_args());
    } else {
        args.push("-an".into());
    }
    args.extend(stage_output_args);
    args.push(job.output_path.to_string_lossy().into_owned());

    let mode = ExportMode::Composite {
        cursor: cursor_enabled,
        audio: click_sound.is_some(),
    };
    tracing::info!(
        backend = backend.name(),
        ?mode,
        frames,
        keyframes = timeline.len(),
        clicks = clicks.len(),
        filter_len = graph.render().len(),
        "Export plan built"
    );

    Ok(ExportPlan {
        mode,
        args,
        filter_graph: graph,
        overlay,
        total_frames: frames,
        click_sound,
    })
}

/// Composite the cursor and click audio onto the raw capture.
///
/// The raw capture and timeline are never modified. On failure any partial
/// output is left on disk.
pub async fn post_produce(
    job: ExportJob,
    backend: &dyn CompositorBackend,
    cancel: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
) -> DollyResult<PathBuf> {
    tracing::info!(
        raw = %job.raw_video.display(),
        output = %job.output_path.display(),
        backend = backend.name(),
        "Starting export"
    );

    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let plan = plan_export(&job, backend)?;
    if let Some(cb) = &progress {
        cb(ExportProgress::new(ExportStage::Preparing, 0, plan.total_frames));
    }

    let cancel = cancel.unwrap_or_default();
    if cancel.is_cancelled() {
        return Err(DollyError::Aborted);
    }

    let total = plan.total_frames;
    run_encoder(
        EncoderInvocation {
            program: job.ffmpeg.clone(),
            args: plan.args,
            overlay: plan.overlay,
            total_frames: total,
            progress_interval_frames: job.progress_interval_frames,
        },
        cancel,
        progress.clone(),
    )
    .await?;

    if let Some(cb) = &progress {
        cb(ExportProgress::new(ExportStage::Complete, total, total));
    }
    tracing::info!(output = %job.output_path.display(), "Export complete");
    Ok(job.output_path)
}

/// Options for [`export_recording`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Defaults to the recording's `output.mp4`.
    pub output: Option<PathBuf>,
    pub backend: CompositorKind,
    /// Defaults to the timeline's frame rate.
    pub fps: Option<u32>,
    /// Explicit encoder binary; resolved from the environment when unset.
    pub ffmpeg: Option<PathBuf>,
    pub click_window_ms: f64,
    pub progress_interval_frames: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output: None,
            backend: CompositorKind::default(),
            fps: None,
            ffmpeg: None,
            click_window_ms: DEFAULT_CLICK_WINDOW_MS,
            progress_interval_frames: 30,
        }
    }
}

impl ExportOptions {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            output: None,
            backend: config.export.backend,
            fps: None,
            ffmpeg: config.ffmpeg_path.clone(),
            click_window_ms: config.export.click_window_ms,
            progress_interval_frames: config.export.progress_interval_frames,
        }
    }
}

/// Export a recording directory using its keyframes and post-production config.
pub async fn export_recording(
    dir: impl Into<PathBuf>,
    options: &ExportOptions,
    cancel: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
) -> DollyResult<PathBuf> {
    let recording = LoadedRecording::load(dir)?;
    let raw_video = recording.dir.raw_video_path();
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| recording.dir.output_path());

    let mut job = ExportJob::new(raw_video, recording.timeline, recording.post_production, output);
    if let Some(fps) = options.fps {
        job.fps = fps;
    }
    job.ffmpeg = resolve_ffmpeg_binary(options.ffmpeg.as_deref());
    job.click_window_ms = options.click_window_ms;
    job.progress_interval_frames = options.progress_interval_frames;

    let backend = backend_for(options.backend);
    post_produce(job, backend.as_ref(), cancel, progress).await
}
