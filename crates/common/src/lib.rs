//! Dolly Common Utilities
//!
//! Shared infrastructure for all Dolly crates:
//! - Error types and result aliases
//! - Clock and timing utilities for frame pacing
//! - Tracing/logging initialization
//! - Configuration loading
//! - ffmpeg binary resolution

pub mod clock;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
