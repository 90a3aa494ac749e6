//! Headless raster surface backed by a tiny-skia pixmap.

use std::collections::HashMap;

use dolly_common::{DollyError, DollyResult};
use dolly_project_model::{CursorKeyframe, KeyframeKind};
use resvg::tiny_skia::{self, FillRule, LineCap, LineJoin, Paint, Pixmap, Stroke, Transform};
use resvg::usvg;

use crate::render::{
    render_cursor_frame, CursorRenderConfig, CursorStyle, CursorSurface, DrawTransform,
    PathBuilder, Rgba, StrokeStyle,
};
use crate::shape::{CursorShape, StrokeCap, StrokeJoin};

/// Parse SVG path data into a tiny-skia path.
///
/// Returns `None` when the data yields no drawable segments.
pub fn parse_path_data(d: &str) -> Option<tiny_skia::Path> {
    if d.contains(&['"', '<', '>', '&'][..]) {
        return None;
    }
    // A visible stroke keeps usvg from dropping paths with no fill area.
    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1" viewBox="0 0 1 1"><path d="{d}" fill="none" stroke="black"/></svg>"#
    );
    let tree = usvg::Tree::from_str(&svg, &usvg::Options::default()).ok()?;
    first_path(tree.root())
}

fn first_path(group: &usvg::Group) -> Option<tiny_skia::Path> {
    group.children().iter().find_map(|node| match node {
        usvg::Node::Path(path) => Some(path.data().clone()),
        usvg::Node::Group(child) => first_path(child),
        _ => None,
    })
}

/// [`PathBuilder`] for [`PixmapSurface`]. Parsed paths are memoized by their
/// path data.
#[derive(Debug, Default)]
pub struct PixmapPathBuilder {
    cache: HashMap<String, tiny_skia::Path>,
}

impl PixmapPathBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathBuilder for PixmapPathBuilder {
    type Path = tiny_skia::Path;

    fn build(&mut self, d: &str) -> DollyResult<tiny_skia::Path> {
        if let Some(path) = self.cache.get(d) {
            return Ok(path.clone());
        }
        let path = parse_path_data(d)
            .ok_or_else(|| DollyError::parse(format!("Invalid path data \"{d}\"")))?;
        self.cache.insert(d.to_string(), path.clone());
        Ok(path)
    }
}

/// Off-screen RGBA surface.
#[derive(Debug, Clone)]
pub struct PixmapSurface {
    pixmap: Pixmap,
    transform: Transform,
    alpha: f32,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> DollyResult<Self> {
        Ok(Self {
            pixmap: new_pixmap(width, height)?,
            transform: Transform::identity(),
            alpha: 1.0,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Premultiplied RGBA bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Straight-alpha RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Rgba {
                r: c.red(),
                g: c.green(),
                b: c.blue(),
                a: c.alpha(),
            }
        })
    }

    pub fn encode_png(&self) -> DollyResult<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| DollyError::encode(format!("PNG encoding failed: {e}")))
    }

    fn paint(&self, color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        let alpha = (color.a as f32 * self.alpha).round().clamp(0.0, 255.0) as u8;
        paint.set_color_rgba8(color.r, color.g, color.b, alpha);
        paint.anti_alias = true;
        paint
    }
}

fn new_pixmap(width: u32, height: u32) -> DollyResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| DollyError::config(format!("invalid surface size {width}x{height}")))
}

impl CursorSurface for PixmapSurface {
    type Path = tiny_skia::Path;

    fn reset(&mut self, width: u32, height: u32) {
        if self.pixmap.width() != width || self.pixmap.height() != height {
            match new_pixmap(width, height) {
                Ok(pixmap) => self.pixmap = pixmap,
                Err(e) => tracing::warn!(error = %e, "Keeping previous surface size"),
            }
        }
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        self.transform = Transform::identity();
        self.alpha = 1.0;
    }

    fn set_transform(&mut self, t: DrawTransform) {
        let s = t.scale as f32;
        self.transform = Transform::from_row(s, 0.0, 0.0, s, t.tx as f32, t.ty as f32);
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn fill(&mut self, path: &tiny_skia::Path, color: Rgba) {
        let paint = self.paint(color);
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, self.transform, None);
    }

    fn stroke(&mut self, path: &tiny_skia::Path, color: Rgba, style: &StrokeStyle) {
        let paint = self.paint(color);
        let stroke = Stroke {
            width: style.width as f32,
            line_cap: match style.cap {
                StrokeCap::Butt => LineCap::Butt,
                StrokeCap::Round => LineCap::Round,
                StrokeCap::Square => LineCap::Square,
            },
            line_join: match style.join {
                StrokeJoin::Miter => LineJoin::Miter,
                StrokeJoin::Round => LineJoin::Round,
                StrokeJoin::Bevel => LineJoin::Bevel,
            },
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(path, &paint, &stroke, self.transform, None);
    }
}

/// A cursor drawn once at rest, for compositors that move a single image.
#[derive(Debug, Clone)]
pub struct CursorSprite {
    pub surface: PixmapSurface,
    /// Hotspot as a fraction of the sprite size.
    pub hotspot_x: f64,
    pub hotspot_y: f64,
}

/// Rasterize `shape` at its unclicked size with the hotspot at the sprite's
/// fractional hotspot position.
pub fn rasterize_cursor_sprite(shape: &CursorShape, style: &CursorStyle) -> DollyResult<CursorSprite> {
    let size = style.draw_size(false);
    let width = size.ceil().max(1.0) as u32;
    let height = (size * shape.aspect()).ceil().max(1.0) as u32;
    let hx = size * shape.hotspot.x;
    let hy = size * shape.hotspot.y;

    let anchor = [CursorKeyframe::new(KeyframeKind::Move, hx, hy, 0.0, "sprite", 0)];
    let mut rest_style = *style;
    rest_style.enabled = true;
    let config = CursorRenderConfig {
        style: &rest_style,
        keyframes: &anchor,
        shape,
        click_window_ms: 0.0,
    };
    let mut surface = PixmapSurface::new(width, height)?;
    render_cursor_frame(
        &mut surface,
        &mut PixmapPathBuilder::new(),
        &config,
        0.0,
        width,
        height,
    )?;

    Ok(CursorSprite {
        surface,
        hotspot_x: hx / width as f64,
        hotspot_y: hy / height as f64,
    })
}
