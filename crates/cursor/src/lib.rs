//! Dolly Cursor
//!
//! Everything needed to draw the synthetic cursor for a point in time:
//!
//! ```text
//! PostProductionConfig ──► shape::resolve_shape ──► CursorShape
//!                                                       │
//! KeyframeTimeline ──► interpolate::interpolate_cursor ─┤
//!                                                       ▼
//!                     render::render_cursor_frame(surface, path_builder, ..)
//! ```
//!
//! The renderer only talks to the [`render::CursorSurface`] and
//! [`render::PathBuilder`] traits. [`raster`] provides the headless
//! tiny-skia implementation used for export; an interactive preview plugs
//! in its own pair and gets identical geometry.

pub mod interpolate;
pub mod raster;
pub mod render;
pub mod shape;
pub mod svg;

pub use interpolate::*;
pub use raster::*;
pub use render::*;
pub use shape::*;
pub use svg::parse_svg_cursor;
