//! Cursor shapes: the builtin catalog and resolution from settings.

use std::path::PathBuf;
use std::sync::Arc;

use dolly_common::{DollyError, DollyResult};
use dolly_project_model::CursorSettings;

use crate::svg::parse_svg_cursor;

/// One path of a cursor shape, in viewBox coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePath {
    /// SVG path data.
    pub d: String,
    pub fill: bool,
    pub stroke: bool,
}

impl ShapePath {
    pub fn new(d: impl Into<String>, fill: bool, stroke: bool) -> Self {
        Self {
            d: d.into(),
            fill,
            stroke,
        }
    }
}

/// Fractional anchor inside the viewBox that lands on the tracked point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hotspot {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokeCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokeJoin {
    Miter,
    Round,
    Bevel,
}

impl StrokeCap {
    pub fn from_svg(value: &str) -> Option<Self> {
        match value.trim() {
            "butt" => Some(Self::Butt),
            "round" => Some(Self::Round),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

impl StrokeJoin {
    pub fn from_svg(value: &str) -> Option<Self> {
        match value.trim() {
            "miter" | "miter-clip" | "arcs" => Some(Self::Miter),
            "round" => Some(Self::Round),
            "bevel" => Some(Self::Bevel),
            _ => None,
        }
    }
}

/// A resolved cursor shape. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorShape {
    /// `[x, y, width, height]`.
    pub view_box: [f64; 4],
    pub paths: Vec<ShapePath>,
    pub hotspot: Hotspot,
    pub stroke_width: f64,
    pub stroke_cap: StrokeCap,
    pub stroke_join: StrokeJoin,
}

impl CursorShape {
    /// Height over width of the viewBox.
    pub fn aspect(&self) -> f64 {
        if self.view_box[2] > 0.0 {
            self.view_box[3] / self.view_box[2]
        } else {
            1.0
        }
    }
}

/// Builtin cursor styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCursor {
    /// Filled arrow.
    Pointer,
    /// Outlined arrow with a tail.
    PointerAlt,
    /// Pointing hand.
    Hand,
    /// Filled circle.
    Dot,
}

impl BuiltinCursor {
    pub const ALL: [BuiltinCursor; 4] = [Self::Pointer, Self::PointerAlt, Self::Hand, Self::Dot];

    pub fn key(self) -> &'static str {
        match self {
            Self::Pointer => "pointer",
            Self::PointerAlt => "pointer-alt",
            Self::Hand => "hand",
            Self::Dot => "dot",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn shape(self) -> CursorShape {
        let round = |view_box, paths, hotspot: (f64, f64), stroke_width| CursorShape {
            view_box,
            paths,
            hotspot: Hotspot {
                x: hotspot.0,
                y: hotspot.1,
            },
            stroke_width,
            stroke_cap: StrokeCap::Round,
            stroke_join: StrokeJoin::Round,
        };
        let vb = [0.0, 0.0, 24.0, 24.0];
        match self {
            Self::Pointer => round(
                vb,
                vec![ShapePath::new(
                    "M4.037 4.688a.495.495 0 0 1 .651-.651l16 6.5a.5.5 0 0 1-.063.947l-6.124 1.58a2 2 0 0 0-1.438 1.435l-1.579 6.126a.5.5 0 0 1-.947.063z",
                    true,
                    true,
                )],
                (0.17, 0.2),
                2.0,
            ),
            Self::PointerAlt => round(
                vb,
                vec![
                    ShapePath::new("M3 3l7.07 16.97 2.51-7.39 7.39-2.51L3 3z", true, true),
                    ShapePath::new("M13 13l6 6", false, true),
                ],
                (0.125, 0.125),
                2.0,
            ),
            Self::Hand => round(
                vb,
                vec![
                    ShapePath::new("M14 4.1L12 6", false, true),
                    ShapePath::new("M5.1 8l-2.9-.8", false, true),
                    ShapePath::new("M6 12l-1.9 2", false, true),
                    ShapePath::new("M7.2 2.2L8 5.1", false, true),
                    ShapePath::new(
                        "M9.037 9.69a.498.498 0 0 1 .653-.653l11 4.5a.5.5 0 0 1-.074.949l-4.349 1.041a2 2 0 0 0-1.434 1.434l-1.041 4.349a.5.5 0 0 1-.95.074z",
                        true,
                        true,
                    ),
                ],
                (0.38, 0.4),
                2.0,
            ),
            Self::Dot => round(
                vb,
                vec![ShapePath::new("M12 4a8 8 0 1 0 0 16a8 8 0 1 0 0-16z", true, false)],
                (0.5, 0.5),
                0.0,
            ),
        }
    }
}

/// Builtin shape for a style key. Unknown keys get the pointer.
pub fn builtin_shape(style: &str) -> CursorShape {
    BuiltinCursor::from_key(style)
        .unwrap_or(BuiltinCursor::Pointer)
        .shape()
}

/// Resolve the shape the settings ask for, reading a custom SVG from disk.
pub fn resolve_shape(settings: &CursorSettings) -> DollyResult<CursorShape> {
    let Some(path) = &settings.custom_svg_path else {
        if BuiltinCursor::from_key(&settings.style).is_none() {
            tracing::warn!(style = %settings.style, "Unknown cursor style, using pointer");
        }
        return Ok(builtin_shape(&settings.style));
    };

    let svg = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DollyError::FileNotFound { path: path.clone() }
        } else {
            DollyError::Io(e)
        }
    })?;
    let hotspot = settings.custom_hotspot.map(|h| Hotspot { x: h.x, y: h.y });
    let shape = parse_svg_cursor(&svg, hotspot)?;
    tracing::debug!(
        path = %path.display(),
        paths = shape.paths.len(),
        "Parsed custom cursor"
    );
    Ok(shape)
}

#[derive(Debug, Clone, PartialEq)]
struct ShapeKey {
    style: String,
    custom_svg_path: Option<PathBuf>,
    custom_hotspot: Option<(u64, u64)>,
}

impl ShapeKey {
    fn of(settings: &CursorSettings) -> Self {
        Self {
            style: settings.style.clone(),
            custom_svg_path: settings.custom_svg_path.clone(),
            custom_hotspot: settings
                .custom_hotspot
                .map(|h| (h.x.to_bits(), h.y.to_bits())),
        }
    }
}

/// Keeps the most recently resolved shape until the settings that pick it change.
#[derive(Debug, Default)]
pub struct ShapeCache {
    entry: Option<(ShapeKey, Arc<CursorShape>)>,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, settings: &CursorSettings) -> DollyResult<Arc<CursorShape>> {
        let key = ShapeKey::of(settings);
        if let Some((cached_key, shape)) = &self.entry {
            if *cached_key == key {
                return Ok(Arc::clone(shape));
            }
        }
        let shape = Arc::new(resolve_shape(settings)?);
        self.entry = Some((key, Arc::clone(&shape)));
        Ok(shape)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
