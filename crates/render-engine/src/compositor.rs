//! Compositor backend contract.
//!
//! A backend decides how the cursor reaches the encoder: which extra input
//! it adds after the raw capture, which video chains turn `[0:v]` into
//! `[vout]`, and whether frames must be streamed into the encoder's stdin.

use std::path::Path;

use dolly_common::config::CompositorKind;
use dolly_common::DollyResult;
use dolly_cursor::{CursorShape, CursorStyle};
use dolly_project_model::{CursorKeyframe, Viewport};

use crate::expression::ExpressionBackend;
use crate::overlay::{OverlayFrames, OverlayFramesBackend};

/// Everything a backend needs to place the cursor.
#[derive(Debug, Clone, Copy)]
pub struct CursorScene<'a> {
    pub shape: &'a CursorShape,
    pub style: &'a CursorStyle,
    pub keyframes: &'a [CursorKeyframe],
    pub viewport: Viewport,
    pub fps: u32,
    pub duration_ms: f64,
    pub click_window_ms: f64,
    /// Directory for intermediate files (beside the export target).
    pub work_dir: &'a Path,
}

impl CursorScene<'_> {
    pub fn clicks(&self) -> impl Iterator<Item = &CursorKeyframe> {
        self.keyframes.iter().filter(|kf| kf.is_click())
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms.max(0.0) / 1000.0
    }
}

/// Cursor video stage produced by a backend.
#[derive(Debug, Clone, Default)]
pub struct VideoStage {
    /// Input arguments for the cursor input (input index 1).
    pub input_args: Vec<String>,
    /// Chains producing `[vout]` from `[0:v]` and `[1:v]`.
    pub filters: Vec<String>,
    /// Output options the stage requires.
    pub output_args: Vec<String>,
    /// Frames to stream into the encoder's stdin.
    pub overlay: Option<OverlayFrames>,
}

/// A way of compositing the cursor over the raw capture.
pub trait CompositorBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the cursor stage. The cursor input is always input 1.
    fn video_stage(&self, scene: &CursorScene<'_>) -> DollyResult<VideoStage>;
}

/// Backend for a configured compositor kind.
pub fn backend_for(kind: CompositorKind) -> Box<dyn CompositorBackend> {
    match kind {
        CompositorKind::Overlay => Box::new(OverlayFramesBackend),
        CompositorKind::Expression => Box::new(ExpressionBackend),
    }
}
