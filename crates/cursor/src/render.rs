//! The cursor renderer.
//!
//! [`render_cursor_frame`] draws one frame of the cursor overlay. It is a
//! pure function of its inputs: the surface is reset first, nothing is
//! cached, and the same inputs always issue the same draw calls.

use dolly_common::{DollyError, DollyResult};
use dolly_project_model::{parse_hex_color, ClickEffect, CursorKeyframe, CursorSettings};

use crate::interpolate::interpolate_cursor;
use crate::shape::{CursorShape, StrokeCap, StrokeJoin};

/// Size factor applied while a click is active with [`ClickEffect::Scale`].
pub const CLICK_SCALE: f64 = 0.75;

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    pub fn from_hex(hex: &str) -> Option<Self> {
        parse_hex_color(hex).map(|[r, g, b, a]| Self { r, g, b, a })
    }
}

/// Uniform scale followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawTransform {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl DrawTransform {
    pub const IDENTITY: DrawTransform = DrawTransform {
        scale: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Map a point in shape coordinates to surface coordinates.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.tx, y * self.scale + self.ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// Width in shape units. The surface transform scales it.
    pub width: f64,
    pub cap: StrokeCap,
    pub join: StrokeJoin,
}

/// A 2D surface the cursor can be drawn on.
pub trait CursorSurface {
    /// Path representation this surface can paint.
    type Path;

    /// Clear to transparent and restore source-over compositing, identity
    /// transform and full alpha.
    fn reset(&mut self, width: u32, height: u32);

    fn set_transform(&mut self, transform: DrawTransform);

    /// Global alpha multiplied into every subsequent paint.
    fn set_alpha(&mut self, alpha: f32);

    fn fill(&mut self, path: &Self::Path, color: Rgba);

    fn stroke(&mut self, path: &Self::Path, color: Rgba, style: &StrokeStyle);
}

/// Turns SVG path data into a surface's path type.
pub trait PathBuilder {
    type Path;

    fn build(&mut self, d: &str) -> DollyResult<Self::Path>;
}

/// Cursor appearance derived from [`CursorSettings`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorStyle {
    pub enabled: bool,
    pub size: f64,
    pub color: Rgba,
    pub opacity: f32,
    pub click_effect: ClickEffect,
}

impl CursorStyle {
    pub fn from_settings(settings: &CursorSettings) -> DollyResult<Self> {
        let color = Rgba::from_hex(&settings.color).ok_or_else(|| {
            DollyError::config(format!("invalid cursor color {:?}", settings.color))
        })?;
        Ok(Self {
            enabled: settings.enabled,
            size: settings.size as f64,
            color,
            opacity: settings.opacity(),
            click_effect: settings.click_effect,
        })
    }

    /// Drawn width for the given click state.
    pub fn draw_size(&self, clicking: bool) -> f64 {
        if clicking && self.click_effect == ClickEffect::Scale {
            self.size * CLICK_SCALE
        } else {
            self.size
        }
    }
}

/// Everything the renderer reads besides the query time.
#[derive(Debug, Clone, Copy)]
pub struct CursorRenderConfig<'a> {
    pub style: &'a CursorStyle,
    pub keyframes: &'a [CursorKeyframe],
    pub shape: &'a CursorShape,
    pub click_window_ms: f64,
}

/// Transform that puts `shape` at `draw_size` wide with its hotspot on (x, y).
pub fn hotspot_transform(shape: &CursorShape, draw_size: f64, x: f64, y: f64) -> DrawTransform {
    let scale = if shape.view_box[2] > 0.0 {
        draw_size / shape.view_box[2]
    } else {
        1.0
    };
    let dx = x - draw_size * shape.hotspot.x;
    let dy = y - draw_size * shape.hotspot.y;
    DrawTransform {
        scale,
        tx: dx - scale * shape.view_box[0],
        ty: dy - scale * shape.view_box[1],
    }
}

/// Draw the cursor at `time_ms` onto `surface`.
///
/// Returns `Ok(false)` when nothing was drawn (cursor disabled, empty
/// timeline, or a time before the first keyframe).
pub fn render_cursor_frame<S, B>(
    surface: &mut S,
    paths: &mut B,
    config: &CursorRenderConfig<'_>,
    time_ms: f64,
    width: u32,
    height: u32,
) -> DollyResult<bool>
where
    S: CursorSurface,
    B: PathBuilder<Path = S::Path>,
{
    surface.reset(width, height);

    if !config.style.enabled || config.keyframes.is_empty() {
        return Ok(false);
    }
    let Some(pos) = interpolate_cursor(config.keyframes, time_ms, config.click_window_ms) else {
        return Ok(false);
    };

    let shape = config.shape;
    let draw_size = config.style.draw_size(pos.clicking);
    surface.set_alpha(config.style.opacity);
    surface.set_transform(hotspot_transform(shape, draw_size, pos.x, pos.y));

    let stroke = StrokeStyle {
        width: shape.stroke_width,
        cap: shape.stroke_cap,
        join: shape.stroke_join,
    };
    for p in &shape.paths {
        let path = paths.build(&p.d)?;
        if p.fill {
            surface.fill(&path, config.style.color);
        }
        if p.stroke && shape.stroke_width > 0.0 {
            surface.stroke(&path, config.style.color, &stroke);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::BuiltinCursor;
    use dolly_project_model::KeyframeKind;

    /// Records draw calls instead of painting.
    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<String>,
        transform: Option<DrawTransform>,
    }

    impl CursorSurface for RecordingSurface {
        type Path = String;

        fn reset(&mut self, width: u32, height: u32) {
            self.calls.push(format!("reset {width}x{height}"));
        }
        fn set_transform(&mut self, transform: DrawTransform) {
            self.transform = Some(transform);
            self.calls.push("transform".into());
        }
        fn set_alpha(&mut self, alpha: f32) {
            self.calls.push(format!("alpha {alpha}"));
        }
        fn fill(&mut self, path: &String, _color: Rgba) {
            self.calls.push(format!("fill {path}"));
        }
        fn stroke(&mut self, path: &String, _color: Rgba, style: &StrokeStyle) {
            self.calls.push(format!("stroke {path} {}", style.width));
        }
    }

    struct Passthrough;

    impl PathBuilder for Passthrough {
        type Path = String;
        fn build(&mut self, d: &str) -> DollyResult<String> {
            Ok(d.to_string())
        }
    }

    fn style() -> CursorStyle {
        CursorStyle::from_settings(&CursorSettings::default()).unwrap()
    }

    fn keyframes() -> Vec<CursorKeyframe> {
        vec![
            CursorKeyframe::new(KeyframeKind::Move, 100.0, 50.0, 100.0, "a", 0),
            CursorKeyframe::new(KeyframeKind::Click, 100.0, 50.0, 500.0, "a", 0),
        ]
    }

    #[test]
    fn test_nothing_drawn_before_first_keyframe() {
        let shape = BuiltinCursor::Pointer.shape();
        let style = style();
        let keyframes = keyframes();
        let config = CursorRenderConfig {
            style: &style,
            keyframes: &keyframes,
            shape: &shape,
            click_window_ms: 100.0,
        };
        let mut surface = RecordingSurface::default();
        let drawn = render_cursor_frame(&mut surface, &mut Passthrough, &config, 50.0, 64, 32).unwrap();
        assert!(!drawn);
        assert_eq!(surface.calls, vec!["reset 64x32"]);
    }

    #[test]
    fn test_disabled_cursor_only_clears() {
        let shape = BuiltinCursor::Dot.shape();
        let mut style = style();
        style.enabled = false;
        let keyframes = keyframes();
        let config = CursorRenderConfig {
            style: &style,
            keyframes: &keyframes,
            shape: &shape,
            click_window_ms: 100.0,
        };
        let mut surface = RecordingSurface::default();
        assert!(!render_cursor_frame(&mut surface, &mut Passthrough, &config, 300.0, 10, 10).unwrap());
        assert_eq!(surface.calls.len(), 1);
    }

    #[test]
    fn test_hotspot_lands_on_position() {
        let shape = BuiltinCursor::Pointer.shape();
        let t = hotspot_transform(&shape, 20.0, 100.0, 50.0);
        let hx = shape.view_box[0] + shape.view_box[2] * shape.hotspot.x;
        let hy = shape.view_box[1] + shape.view_box[3] * shape.hotspot.y;
        let (x, y) = t.apply(hx, hy);
        assert!((x - 100.0).abs() < 1e-9 && (y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_hotspot_compensates_view_box_origin() {
        let mut shape = BuiltinCursor::Dot.shape();
        shape.view_box = [-12.0, -12.0, 24.0, 24.0];
        let t = hotspot_transform(&shape, 48.0, 10.0, 10.0);
        let (x, y) = t.apply(0.0, 0.0);
        assert!((x - 10.0).abs() < 1e-9 && (y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_scales_draw_size() {
        let shape = BuiltinCursor::PointerAlt.shape();
        let style = style();
        let keyframes = keyframes();
        let config = CursorRenderConfig {
            style: &style,
            keyframes: &keyframes,
            shape: &shape,
            click_window_ms: 100.0,
        };
        let mut surface = RecordingSurface::default();
        render_cursor_frame(&mut surface, &mut Passthrough, &config, 550.0, 200, 200).unwrap();
        let clicked = surface.transform.unwrap();
        assert!((clicked.scale - 15.0 / 24.0).abs() < 1e-9);

        render_cursor_frame(&mut surface, &mut Passthrough, &config, 700.0, 200, 200).unwrap();
        let released = surface.transform.unwrap();
        assert!((released.scale - 20.0 / 24.0).abs() < 1e-9);

        let mut no_effect = style;
        no_effect.click_effect = ClickEffect::None;
        assert_eq!(no_effect.draw_size(true), 20.0);
    }

    #[test]
    fn test_draw_calls_follow_path_flags() {
        let shape = BuiltinCursor::PointerAlt.shape();
        let style = style();
        let keyframes = keyframes();
        let config = CursorRenderConfig {
            style: &style,
            keyframes: &keyframes,
            shape: &shape,
            click_window_ms: 100.0,
        };
        let mut surface = RecordingSurface::default();
        render_cursor_frame(&mut surface, &mut Passthrough, &config, 200.0, 100, 100).unwrap();
        let paints: Vec<_> = surface
            .calls
            .iter()
            .filter(|c| c.starts_with("fill") || c.starts_with("stroke"))
            .collect();
        assert_eq!(paints.len(), 3);
        assert!(paints[0].starts_with("fill M3 3"));
        assert!(paints[1].starts_with("stroke M3 3"));
        assert!(paints[2].starts_with("stroke M13 13l6 6"));
        assert!(surface.calls.contains(&"alpha 0.8".to_string()));
    }

    #[test]
    fn test_invalid_color_is_config_error() {
        let settings = CursorSettings {
            color: "blue".into(),
            ..Default::default()
        };
        assert!(matches!(
            CursorStyle::from_settings(&settings),
            Err(DollyError::Config { .. })
        ));
    }
}
