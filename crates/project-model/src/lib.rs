//! Dolly Project Model
//!
//! Defines the data contracts of a recording session:
//! - **Keyframes:** timestamped pointer moves and clicks captured alongside the video
//! - **Post-production:** editable cursor and click-sound settings applied at export
//! - **Manifest:** outcome of a capture session (complete or incomplete)
//! - **Recording directory:** on-disk layout tying the files together
//!
//! Coordinates are CSS pixels in the recorded viewport. Timestamps are
//! milliseconds since the recording clock epoch.

pub mod error;
pub mod keyframe;
pub mod manifest;
pub mod post_production;
pub mod recording;

mod json;

pub use error::*;
pub use keyframe::*;
pub use manifest::*;
pub use post_production::*;
pub use recording::*;
