//! Dolly Render Engine
//!
//! Post-production export: composites the synthetic cursor and click audio
//! onto the raw capture without touching it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! raw.mp4 ────────────────┐  input 0
//!                         │
//! cursor-keyframes.json ──┤
//!                         ├── CompositorBackend ── cursor input 1
//! post-production.json ───┘     (overlay frames | expression sprite)
//!                         │
//! click sound ────────────┤  input 1 or 2, one delayed copy per click
//!                         ▼
//!                 -filter_complex [vout] [aout]
//!                         │
//!                         ▼
//!                  Encode (H.264 / AAC)
//!                         │
//!                         ▼
//!                     output.mp4
//! ```

pub mod compositor;
pub mod encoder;
pub mod export;
pub mod expression;
pub mod filter_graph;
pub mod overlay;

pub use compositor::{backend_for, CompositorBackend, CursorScene, VideoStage};
pub use encoder::{run_encoder, EncoderInvocation, ProgressState};
pub use export::*;
pub use expression::ExpressionBackend;
pub use filter_graph::FilterGraph;
pub use overlay::{OverlayFrames, OverlayFramesBackend};
