//! Restricted SVG parser for custom cursors.
//!
//! Accepts `<path>`, `<circle>`, `<rect>` and `<line>`. Elements that need a
//! full SVG renderer (masks, filters, text, references) are rejected up
//! front so custom cursors draw the same way on every surface.

use std::collections::HashMap;
use std::sync::OnceLock;

use dolly_common::{DollyError, DollyResult};
use regex::Regex;

use crate::raster::parse_path_data;
use crate::shape::{CursorShape, Hotspot, ShapePath, StrokeCap, StrokeJoin};

const UNSUPPORTED_ELEMENTS: [&str; 7] = [
    "clipPath",
    "mask",
    "filter",
    "use",
    "text",
    "image",
    "foreignObject",
];

const SHAPE_ELEMENTS: [&str; 4] = ["path", "circle", "rect", "line"];

const DEFAULT_VIEW_BOX: [f64; 4] = [0.0, 0.0, 24.0, 24.0];
const DEFAULT_STROKE_WIDTH: f64 = 2.0;

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z][\w:.-]*)([^>]*)>").expect("valid regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("valid regex")
    })
}

#[derive(Debug)]
struct Element {
    name: String,
    attrs: HashMap<String, String>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn number(&self, key: &str, default: f64) -> f64 {
        self.attr(key).and_then(parse_number).unwrap_or(default)
    }
}

fn elements(source: &str) -> Vec<Element> {
    tag_re()
        .captures_iter(source)
        .map(|caps| {
            let name = caps[1].to_string();
            let mut attrs = HashMap::new();
            for a in attr_re().captures_iter(&caps[2]) {
                let value = a.get(2).or_else(|| a.get(3)).map_or("", |m| m.as_str());
                attrs.insert(a[1].to_string(), value.trim().to_string());
            }
            // Inline style declarations win over presentation attributes.
            if let Some(style) = attrs.get("style").cloned() {
                for decl in style.split(';') {
                    if let Some((k, v)) = decl.split_once(':') {
                        attrs.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
            Element { name, attrs }
        })
        .collect()
}

/// Leading number of an attribute value (`"2px"` is 2).
fn parse_number(value: &str) -> Option<f64> {
    number_re()
        .find(value)
        .and_then(|m| m.as_str().trim().parse().ok())
}

fn parse_view_box(value: &str) -> DollyResult<[f64; 4]> {
    let parts: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| DollyError::parse(format!("Invalid viewBox \"{value}\"")))?;
    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok([*x, *y, *w, *h]),
        _ => Err(DollyError::parse(format!(
            "Invalid viewBox \"{value}\": expected four numbers with positive size"
        ))),
    }
}

/// Whether a paint attribute turns painting on, falling back to the root
/// `<svg>` and then to `default`.
fn paint(el: &Element, root: Option<&Element>, key: &str, default: bool) -> bool {
    el.attr(key)
        .or_else(|| root.and_then(|r| r.attr(key)))
        .map_or(default, |v| v != "none" && v != "transparent")
}

/// Parse SVG text into a cursor shape.
///
/// `hotspot` defaults to the top-left corner of the viewBox.
pub fn parse_svg_cursor(svg: &str, hotspot: Option<Hotspot>) -> DollyResult<CursorShape> {
    let source = comment_re().replace_all(svg, "");
    let elements = elements(&source);

    for el in &elements {
        if let Some(name) = UNSUPPORTED_ELEMENTS
            .iter()
            .find(|u| u.eq_ignore_ascii_case(&el.name))
        {
            return Err(DollyError::parse(format!(
                "Unsupported SVG element <{name}>. Custom cursors only support <path>, <circle>, <rect>, and <line> elements."
            )));
        }
    }

    let root = elements.iter().find(|e| e.name == "svg");
    let view_box = match root.and_then(|r| r.attr("viewBox")) {
        Some(value) => parse_view_box(value)?,
        None => DEFAULT_VIEW_BOX,
    };

    let shapes: Vec<&Element> = elements
        .iter()
        .filter(|e| SHAPE_ELEMENTS.contains(&e.name.as_str()))
        .collect();

    let inherited = |key: &str| -> Option<&str> {
        root.and_then(|r| r.attr(key))
            .or_else(|| shapes.iter().find_map(|e| e.attr(key)))
    };
    let stroke_width = inherited("stroke-width")
        .and_then(parse_number)
        .unwrap_or(DEFAULT_STROKE_WIDTH);
    let stroke_cap = inherited("stroke-linecap")
        .and_then(StrokeCap::from_svg)
        .unwrap_or(StrokeCap::Round);
    let stroke_join = inherited("stroke-linejoin")
        .and_then(StrokeJoin::from_svg)
        .unwrap_or(StrokeJoin::Round);

    let mut paths = Vec::new();
    for el in shapes {
        let d = match el.name.as_str() {
            "path" => {
                let d = el.attr("d").unwrap_or("");
                if d.is_empty() {
                    continue;
                }
                if parse_path_data(d).is_none() {
                    return Err(DollyError::parse(format!("Invalid path data \"{d}\"")));
                }
                d.to_string()
            }
            "circle" => {
                let cx = el.number("cx", 0.0);
                let cy = el.number("cy", 0.0);
                let r = el.number("r", 0.0);
                if r <= 0.0 {
                    continue;
                }
                let dia = r * 2.0;
                format!("M{},{cy}a{r},{r} 0 1,0 {dia},0a{r},{r} 0 1,0 -{dia},0", cx - r)
            }
            "rect" => {
                let x = el.number("x", 0.0);
                let y = el.number("y", 0.0);
                let w = el.number("width", 0.0);
                let h = el.number("height", 0.0);
                if w <= 0.0 || h <= 0.0 {
                    continue;
                }
                format!("M{x},{y}h{w}v{h}h-{w}z")
            }
            _ => {
                let x1 = el.number("x1", 0.0);
                let y1 = el.number("y1", 0.0);
                let x2 = el.number("x2", 0.0);
                let y2 = el.number("y2", 0.0);
                paths.push(ShapePath::new(format!("M{x1},{y1}L{x2},{y2}"), false, true));
                continue;
            }
        };
        paths.push(ShapePath::new(
            d,
            paint(el, root, "fill", true),
            paint(el, root, "stroke", false),
        ));
    }

    if paths.is_empty() {
        return Err(DollyError::parse(
            "No renderable elements found in SVG. Expected <path>, <circle>, <rect>, or <line> elements.",
        ));
    }

    Ok(CursorShape {
        view_box,
        paths,
        hotspot: hotspot.unwrap_or_default(),
        stroke_width,
        stroke_cap,
        stroke_join,
    })
}
