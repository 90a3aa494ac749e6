//! Dolly Capture Engine
//!
//! Turns an event-driven screen feed into a constant-framerate raw capture.
//! The source emits an image only when content changes; the recorder paces
//! those arrivals against the recording clock, filling gaps with the last
//! image and dropping frames that arrive ahead of schedule.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │               RecordingSession                  │
//! │  ┌─────────────┐   ┌──────────────────────────┐ │
//! │  │ FrameSource │──▶│   ScreencastRecorder     │ │
//! │  │ (push, ack) │◀──│ FramePacer ─▶ bounded ch │ │
//! │  └─────────────┘   └────────────┬─────────────┘ │
//! │  ┌─────────────┐                ▼               │
//! │  │KeyframeSink │        CaptureEncoder (stdin)  │
//! │  └──────┬──────┘                │               │
//! │         ▼                       ▼               │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │        Recording directory (disk)        │   │
//! │  │ raw.mp4  cursor-keyframes.json  manifest │   │
//! │  └──────────────────────────────────────────┘   │
//! └────────────────────────────────────────────────┘
//! ```

pub mod encoder;
pub mod pacing;
pub mod recorder;
pub mod session;
pub mod source;

pub use encoder::{CaptureEncoder, EncoderCommand};
pub use pacing::{FramePacer, PacingDecision};
pub use recorder::{CaptureStats, RecorderOptions, ScreencastRecorder};
pub use session::*;
pub use source::{ChannelSource, ChannelSourceHandle, FrameAck, FrameSource, SourceControl, SourceFrame};
