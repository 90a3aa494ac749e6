//! Overlay-frame compositor: every output frame of the cursor layer is
//! rendered with the shared cursor renderer and streamed to the encoder as
//! a PNG sequence.

use std::sync::Arc;

use dolly_common::DollyResult;
use dolly_cursor::{
    render_cursor_frame, CursorRenderConfig, CursorShape, CursorStyle, PixmapPathBuilder,
    PixmapSurface,
};
use dolly_project_model::{CursorKeyframe, Viewport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::compositor::{CompositorBackend, CursorScene, VideoStage};
use crate::filter_graph::VIDEO_OUT;

/// Frames covering `duration_ms` at `fps`, rounded up.
pub fn total_frames(duration_ms: f64, fps: u32) -> u64 {
    (duration_ms.max(0.0) / 1000.0 * fps.max(1) as f64).ceil() as u64
}

/// Time of output frame `index` in milliseconds.
pub fn frame_time_ms(index: u64, fps: u32) -> f64 {
    index as f64 * (1000.0 / fps.max(1) as f64)
}

/// Owned inputs for rendering the cursor layer frame by frame.
#[derive(Debug, Clone)]
pub struct OverlayFrames {
    pub shape: CursorShape,
    pub style: CursorStyle,
    pub keyframes: Arc<[CursorKeyframe]>,
    pub viewport: Viewport,
    pub fps: u32,
    pub click_window_ms: f64,
    pub total_frames: u64,
}

impl OverlayFrames {
    pub fn from_scene(scene: &CursorScene<'_>) -> Self {
        Self {
            shape: scene.shape.clone(),
            style: *scene.style,
            keyframes: Arc::from(scene.keyframes),
            viewport: scene.viewport,
            fps: scene.fps,
            click_window_ms: scene.click_window_ms,
            total_frames: total_frames(scene.duration_ms, scene.fps),
        }
    }

    /// A renderer holding the surface reused across frames.
    pub fn renderer(&self) -> DollyResult<OverlayRenderer<'_>> {
        Ok(OverlayRenderer {
            frames: self,
            surface: PixmapSurface::new(self.viewport.w, self.viewport.h)?,
            paths: PixmapPathBuilder::new(),
        })
    }

    /// Render every frame on the calling thread, sending PNGs to `tx`.
    ///
    /// Cancellation is checked before each frame. `on_frame` receives the
    /// index of each frame once it has been handed off. Stops early without
    /// error when the receiver goes away.
    pub fn stream_blocking(
        &self,
        tx: mpsc::Sender<Vec<u8>>,
        cancel: &CancellationToken,
        mut on_frame: impl FnMut(u64),
    ) -> DollyResult<u64> {
        let mut renderer = self.renderer()?;
        let mut sent = 0;
        for index in 0..self.total_frames {
            if cancel.is_cancelled() {
                tracing::debug!(index, "Overlay rendering cancelled");
                break;
            }
            let png = renderer.render_png(index)?;
            if tx.blocking_send(png).is_err() {
                tracing::debug!(index, "Encoder closed overlay input");
                break;
            }
            sent += 1;
            on_frame(index);
        }
        Ok(sent)
    }
}

/// Renders overlay frames onto one reused surface.
pub struct OverlayRenderer<'a> {
    frames: &'a OverlayFrames,
    surface: PixmapSurface,
    paths: PixmapPathBuilder,
}

impl OverlayRenderer<'_> {
    /// Draw frame `index`. The surface is fully reset first.
    pub fn render(&mut self, index: u64) -> DollyResult<&PixmapSurface> {
        let f = self.frames;
        let config = CursorRenderConfig {
            style: &f.style,
            keyframes: &f.keyframes,
            shape: &f.shape,
            click_window_ms: f.click_window_ms,
        };
        render_cursor_frame(
            &mut self.surface,
            &mut self.paths,
            &config,
            frame_time_ms(index, f.fps),
            f.viewport.w,
            f.viewport.h,
        )?;
        Ok(&self.surface)
    }

    pub fn render_png(&mut self, index: u64) -> DollyResult<Vec<u8>> {
        self.render(index)?.encode_png()
    }
}

/// Streams every rendered cursor frame into the encoder. Default backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayFramesBackend;

impl CompositorBackend for OverlayFramesBackend {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn video_stage(&self, scene: &CursorScene<'_>) -> DollyResult<VideoStage> {
        let frames = OverlayFrames::from_scene(scene);
        tracing::debug!(
            frames = frames.total_frames,
            width = frames.viewport.w,
            height = frames.viewport.h,
            "Overlay frames planned"
        );
        Ok(VideoStage {
            input_args: vec![
                "-f".into(),
                "image2pipe".into(),
                "-c:v".into(),
                "png".into(),
                "-framerate".into(),
                scene.fps.to_string(),
                "-i".into(),
                "pipe:0".into(),
            ],
            filters: vec![format!(
                "[0:v][1:v]overlay=0:0:format=auto{VIDEO_OUT}"
            )],
            output_args: Vec::new(),
            overlay: Some(frames),
        })
    }
}
