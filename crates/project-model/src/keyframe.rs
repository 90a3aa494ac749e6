//! Cursor keyframe timeline.
//!
//! The timeline is written once per recording: keyframes are appended while
//! the capture runs and the whole file is persisted when it stops. Every
//! export reads it back unchanged.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;
use crate::json::{read_json, write_json};

/// Current keyframe file format version.
pub const KEYFRAMES_VERSION: u32 = 1;

/// What a keyframe records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyframeKind {
    Move,
    Click,
}

/// A recorded pointer position or click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorKeyframe {
    pub x: f64,
    pub y: f64,

    /// Milliseconds since recording start.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: f64,

    #[serde(rename = "type")]
    pub kind: KeyframeKind,

    /// Source action that produced this keyframe.
    pub action_id: String,

    /// Index of the step that owns the action.
    pub step_index: u32,
}

impl CursorKeyframe {
    pub fn new(
        kind: KeyframeKind,
        x: f64,
        y: f64,
        timestamp_ms: f64,
        action_id: impl Into<String>,
        step_index: u32,
    ) -> Self {
        Self {
            x,
            y,
            timestamp_ms,
            kind,
            action_id: action_id.into(),
            step_index,
        }
    }

    pub fn is_click(&self) -> bool {
        self.kind == KeyframeKind::Click
    }
}

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub w: u32,
    pub h: u32,
}

impl Viewport {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Persisted keyframe file (`cursor-keyframes.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeTimeline {
    pub version: u32,
    pub fps: u32,
    pub viewport: Viewport,

    /// Wall-clock time at the recording epoch (RFC 3339).
    pub recording_started_at: String,

    pub duration_ms: f64,

    /// Sorted non-decreasing by `timestamp_ms`.
    pub keyframes: Vec<CursorKeyframe>,
}

impl KeyframeTimeline {
    /// Create an empty timeline.
    pub fn new(fps: u32, viewport: Viewport, recording_started_at: impl Into<String>) -> Self {
        Self {
            version: KEYFRAMES_VERSION,
            fps,
            viewport,
            recording_started_at: recording_started_at.into(),
            duration_ms: 0.0,
            keyframes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Click keyframes in timeline order.
    pub fn click_keyframes(&self) -> impl Iterator<Item = &CursorKeyframe> {
        self.keyframes.iter().filter(|k| k.is_click())
    }

    pub fn click_count(&self) -> usize {
        self.click_keyframes().count()
    }

    pub fn move_count(&self) -> usize {
        self.keyframes.len() - self.click_count()
    }

    pub fn first_timestamp_ms(&self) -> Option<f64> {
        self.keyframes.first().map(|k| k.timestamp_ms)
    }

    pub fn last_timestamp_ms(&self) -> Option<f64> {
        self.keyframes.last().map(|k| k.timestamp_ms)
    }

    /// Check the structural invariants of a loaded file.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.version != KEYFRAMES_VERSION {
            return Err(ProjectError::validation(format!(
                "unsupported keyframe file version {} (expected {KEYFRAMES_VERSION})",
                self.version
            )));
        }
        if self.fps < 1 {
            return Err(ProjectError::validation("fps must be at least 1"));
        }
        if self.viewport.w == 0 || self.viewport.h == 0 {
            return Err(ProjectError::validation(format!(
                "viewport must be non-zero, got {}x{}",
                self.viewport.w, self.viewport.h
            )));
        }
        if !self.duration_ms.is_finite() || self.duration_ms < 0.0 {
            return Err(ProjectError::validation(format!(
                "invalid duration {}",
                self.duration_ms
            )));
        }
        if let Some(i) = self
            .keyframes
            .windows(2)
            .position(|w| w[1].timestamp_ms < w[0].timestamp_ms)
        {
            return Err(ProjectError::validation(format!(
                "keyframes out of order at index {}: {} < {}",
                i + 1,
                self.keyframes[i + 1].timestamp_ms,
                self.keyframes[i].timestamp_ms
            )));
        }
        Ok(())
    }

    /// Load and validate a keyframe file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let timeline: Self = read_json(path.as_ref())?;
        timeline.validate()?;
        Ok(timeline)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        write_json(path.as_ref(), self)
    }
}

/// Append-only builder used while a capture is running.
#[derive(Debug, Clone)]
pub struct KeyframeRecorder {
    timeline: KeyframeTimeline,
}

impl KeyframeRecorder {
    pub fn new(fps: u32, viewport: Viewport, recording_started_at: impl Into<String>) -> Self {
        Self {
            timeline: KeyframeTimeline::new(fps, viewport, recording_started_at),
        }
    }

    /// Append a keyframe.
    ///
    /// A timestamp earlier than the previous keyframe is clamped up to it so
    /// the timeline stays sorted.
    pub fn push(&mut self, mut keyframe: CursorKeyframe) {
        if let Some(last) = self.timeline.last_timestamp_ms() {
            if keyframe.timestamp_ms < last {
                tracing::warn!(
                    timestamp_ms = keyframe.timestamp_ms,
                    previous_ms = last,
                    action_id = %keyframe.action_id,
                    "Out-of-order keyframe clamped"
                );
                keyframe.timestamp_ms = last;
            }
        }
        self.timeline.keyframes.push(keyframe);
    }

    pub fn record_move(
        &mut self,
        x: f64,
        y: f64,
        timestamp_ms: f64,
        action_id: impl Into<String>,
        step_index: u32,
    ) {
        self.push(CursorKeyframe::new(
            KeyframeKind::Move,
            x,
            y,
            timestamp_ms,
            action_id,
            step_index,
        ));
    }

    pub fn record_click(
        &mut self,
        x: f64,
        y: f64,
        timestamp_ms: f64,
        action_id: impl Into<String>,
        step_index: u32,
    ) {
        self.push(CursorKeyframe::new(
            KeyframeKind::Click,
            x,
            y,
            timestamp_ms,
            action_id,
            step_index,
        ));
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Seal the timeline with the final recording duration.
    pub fn finish(mut self, duration_ms: f64) -> KeyframeTimeline {
        self.timeline.duration_ms = duration_ms.max(0.0);
        self.timeline
    }
}
