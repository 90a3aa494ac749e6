//! Expression compositor: the encoder moves one cursor sprite.
//!
//! The cursor is rasterized once. Its position is a piecewise-linear
//! function of `t` written as nested `if(between(..))` terms, and the click
//! effect is a per-frame `scale` driven by the same click windows the
//! interpolator uses.

use std::fmt::Write as _;

use dolly_common::{DollyError, DollyResult};
use dolly_cursor::{rasterize_cursor_sprite, CLICK_SCALE};
use dolly_project_model::{ClickEffect, CursorKeyframe};

use crate::compositor::{CompositorBackend, CursorScene, VideoStage};
use crate::filter_graph::VIDEO_OUT;

/// Timelines with more segments than this use grouped `st()/ld()` terms.
pub const MAX_NESTED_SEGMENTS: usize = 200;
/// Minimum segments per group in the grouped form.
pub const SEGMENT_GROUP_SIZE: usize = 20;
/// Expression variables available to `st()/ld()`.
pub const MAX_EXPR_VARIABLES: usize = 10;
/// Coordinate used before the first keyframe.
const OFFSCREEN: &str = "-100";

const SPRITE_FILE: &str = "cursor-sprite.png";

/// Motion between two consecutive keyframes, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub from: (f64, f64),
    pub to: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Segment {
    fn coords(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (self.from.0, self.to.0),
            Axis::Y => (self.from.1, self.to.1),
        }
    }

    fn lerp(&self, axis: Axis) -> String {
        let (a, b) = self.coords(axis);
        // Rounded to the printed precision so the divisor is never `0.0000`.
        let duration = ((self.end - self.start) * 1e4).round() / 1e4;
        if duration > 0.0 {
            format!(
                "{a}+({})*(t-{:.4})/{duration:.4}",
                b - a,
                self.start
            )
        } else {
            format!("{b}")
        }
    }
}

pub fn keyframes_to_segments(keyframes: &[CursorKeyframe]) -> Vec<Segment> {
    keyframes
        .windows(2)
        .map(|pair| Segment {
            start: pair[0].timestamp_ms / 1000.0,
            end: pair[1].timestamp_ms / 1000.0,
            from: (pair[0].x, pair[0].y),
            to: (pair[1].x, pair[1].y),
        })
        .collect()
}

/// `1` while any click window is active, else `0`.
pub fn click_expr<'a>(clicks: impl IntoIterator<Item = &'a CursorKeyframe>, window_ms: f64) -> String {
    let window = window_ms.max(0.0) / 1000.0;
    let terms: Vec<String> = clicks
        .into_iter()
        .map(|kf| {
            let start = kf.timestamp_ms / 1000.0;
            format!("between(t,{start:.4},{:.4})", start + window)
        })
        .collect();
    if terms.is_empty() {
        "0".to_string()
    } else {
        format!("gt({},0)", terms.join("+"))
    }
}

fn nested(segments: &[Segment], axis: Axis, fallback: String) -> String {
    segments.iter().rev().fold(fallback, |tail, seg| {
        format!(
            "if(between(t,{:.4},{:.4}),{},{tail})",
            seg.start,
            seg.end,
            seg.lerp(axis)
        )
    })
}

/// Cursor coordinate along `axis` as a function of `t`.
///
/// `keyframes` must be sorted. A single keyframe yields a constant after
/// its timestamp; an empty timeline is always off screen.
pub fn position_expr(keyframes: &[CursorKeyframe], axis: Axis) -> String {
    let Some(first) = keyframes.first() else {
        return OFFSCREEN.to_string();
    };
    let last = &keyframes[keyframes.len() - 1];
    let hold = match axis {
        Axis::X => format!("{}", last.x),
        Axis::Y => format!("{}", last.y),
    };
    let start = first.timestamp_ms / 1000.0;
    let segments = keyframes_to_segments(keyframes);

    let body = if segments.len() <= MAX_NESTED_SEGMENTS {
        nested(&segments, axis, hold)
    } else {
        grouped(&segments, axis, hold)
    };
    format!("if(lt(t,{start:.4}),{OFFSCREEN},{body})")
}

/// Long timelines: each group's value is stored in its own variable so no
/// single nested chain exceeds the encoder's parser depth.
fn grouped(segments: &[Segment], axis: Axis, hold: String) -> String {
    let group_size = SEGMENT_GROUP_SIZE.max(segments.len().div_ceil(MAX_EXPR_VARIABLES));
    let groups: Vec<&[Segment]> = segments.chunks(group_size).collect();

    let mut stores = Vec::with_capacity(groups.len());
    for (var, group) in groups.iter().enumerate() {
        let (first, last) = (group[0], group[group.len() - 1]);
        stores.push(format!(
            "st({var},if(between(t,{:.4},{:.4}),{},ld({var})))",
            first.start,
            last.end,
            nested(group, axis, hold.clone())
        ));
    }

    let loads = groups
        .iter()
        .enumerate()
        .rev()
        .fold(hold, |tail, (var, group)| {
            format!(
                "if(between(t,{:.4},{:.4}),ld({var}),{tail})",
                group[0].start,
                group[group.len() - 1].end
            )
        });
    format!("({})*0+{loads}", stores.join("+"))
}

/// Composites a looped cursor sprite using filter expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionBackend;

impl CompositorBackend for ExpressionBackend {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn video_stage(&self, scene: &CursorScene<'_>) -> DollyResult<VideoStage> {
        let sprite = rasterize_cursor_sprite(scene.shape, scene.style)?;
        let sprite_path = scene.work_dir.join(SPRITE_FILE);
        let png = sprite.surface.encode_png()?;
        std::fs::create_dir_all(scene.work_dir)?;
        std::fs::write(&sprite_path, png).map_err(|e| {
            DollyError::encode(format!(
                "Failed to write cursor sprite {}: {e}",
                sprite_path.display()
            ))
        })?;

        let (w, h) = (sprite.surface.width(), sprite.surface.height());
        let has_clicks = scene.clicks().next().is_some();
        let mut filters = Vec::with_capacity(2);

        if has_clicks && scene.style.click_effect == ClickEffect::Scale {
            let clicking = click_expr(scene.clicks(), scene.click_window_ms);
            let cw = ((w as f64 * CLICK_SCALE).round() as u32).max(1);
            let ch = ((h as f64 * CLICK_SCALE).round() as u32).max(1);
            filters.push(format!(
                "[1:v]format=rgba,scale=w='if({clicking},{cw},{w})':h='if({clicking},{ch},{h})':flags=lanczos:eval=frame[cursor]"
            ));
        } else {
            filters.push("[1:v]format=rgba[cursor]".to_string());
        }

        let mut overlay = String::from("[0:v][cursor]overlay=");
        let _ = write!(
            overlay,
            "x='({})-{:.6}*overlay_w':y='({})-{:.6}*overlay_h':eval=frame:format=auto{VIDEO_OUT}",
            position_expr(scene.keyframes, Axis::X),
            sprite.hotspot_x,
            position_expr(scene.keyframes, Axis::Y),
            sprite.hotspot_y,
        );
        filters.push(overlay);

        tracing::debug!(
            sprite = %sprite_path.display(),
            width = w,
            height = h,
            keyframes = scene.keyframes.len(),
            "Cursor sprite written"
        );

        Ok(VideoStage {
            input_args: vec![
                "-loop".into(),
                "1".into(),
                "-framerate".into(),
                scene.fps.to_string(),
                "-i".into(),
                sprite_path.to_string_lossy().into_owned(),
            ],
            filters,
            output_args: vec!["-t".into(), format!("{:.4}", scene.duration_secs())],
            overlay: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dolly_cursor::interpolate_cursor;
    use dolly_project_model::KeyframeKind;

    fn mv(x: f64, y: f64, t: f64) -> CursorKeyframe {
        CursorKeyframe::new(KeyframeKind::Move, x, y, t, "a", 0)
    }

    #[test]
    fn test_empty_timeline_is_offscreen() {
        assert_eq!(position_expr(&[], Axis::X), "-100");
    }

    #[test]
    fn test_single_keyframe_holds() {
        assert_eq!(
            position_expr(&[mv(40.0, 50.0, 250.0)], Axis::Y),
            "if(lt(t,0.2500),-100,50)"
        );
    }

    #[test]
    fn test_two_keyframes_lerp() {
        let expr = position_expr(&[mv(0.0, 0.0, 0.0), mv(100.0, 20.0, 1000.0)], Axis::X);
        assert_eq!(
            expr,
            "if(lt(t,0.0000),-100,if(between(t,0.0000,1.0000),0+(100)*(t-0.0000)/1.0000,100))"
        );
    }

    #[test]
    fn test_zero_length_segment_jumps() {
        let segments = keyframes_to_segments(&[mv(0.0, 0.0, 500.0), mv(30.0, 0.0, 500.0)]);
        assert_eq!(segments[0].lerp(Axis::X), "30");
    }

    #[test]
    fn test_click_expr_windows() {
        let clicks = [
            CursorKeyframe::new(KeyframeKind::Click, 0.0, 0.0, 500.0, "a", 0),
            CursorKeyframe::new(KeyframeKind::Click, 0.0, 0.0, 1200.0, "b", 1),
        ];
        assert_eq!(
            click_expr(&clicks, 100.0),
            "gt(between(t,0.5000,0.6000)+between(t,1.2000,1.3000),0)"
        );
        assert_eq!(click_expr(&[], 100.0), "0");
    }

    #[test]
    fn test_long_timelines_use_grouped_variables() {
        let keyframes: Vec<_> = (0..=450)
            .map(|i| mv(i as f64, 0.0, i as f64 * 10.0))
            .collect();
        let expr = position_expr(&keyframes, Axis::X);
        assert!(expr.contains("st(0,") && expr.contains("ld(9)"));
        assert!(!expr.contains("st(10,"));
        // Every segment is still covered.
        assert!(expr.contains("between(t,4.4900,4.5000)"));
    }

    #[test]
    fn test_short_positive_segment_never_divides_by_zero() {
        let segments = keyframes_to_segments(&[mv(0.0, 0.0, 500.0), mv(30.0, 0.0, 500.03)]);
        assert_eq!(segments[0].lerp(Axis::X), "30");
        let expr = position_expr(&[mv(0.0, 0.0, 500.0), mv(30.0, 0.0, 500.03)], Axis::X);
        assert!(!expr.contains("/0.0000"));
    }

    /// Evaluates the subset of the encoder's expression language the
    /// position terms use. `st()/ld()` variables persist across calls the
    /// way they persist across frames.
    struct ExprEval<'a> {
        src: &'a [u8],
        pos: usize,
        t: f64,
        vars: &'a mut [f64; MAX_EXPR_VARIABLES],
    }

    impl ExprEval<'_> {
        fn run(src: &str, t: f64, vars: &mut [f64; MAX_EXPR_VARIABLES]) -> f64 {
            let mut eval = ExprEval {
                src: src.as_bytes(),
                pos: 0,
                t,
                vars,
            };
            let value = eval.sum();
            assert_eq!(eval.pos, eval.src.len(), "trailing input in {src}");
            value
        }

        fn peek(&self) -> Option<u8> {
            self.src.get(self.pos).copied()
        }

        fn eat(&mut self, c: u8) {
            assert_eq!(self.peek(), Some(c), "at {}", self.pos);
            self.pos += 1;
        }

        fn sum(&mut self) -> f64 {
            let mut value = self.product();
            while let Some(op @ (b'+' | b'-')) = self.peek() {
                self.pos += 1;
                let rhs = self.product();
                value = if op == b'+' { value + rhs } else { value - rhs };
            }
            value
        }

        fn product(&mut self) -> f64 {
            let mut value = self.unary();
            while let Some(op @ (b'*' | b'/')) = self.peek() {
                self.pos += 1;
                let rhs = self.unary();
                value = if op == b'*' { value * rhs } else { value / rhs };
            }
            value
        }

        fn unary(&mut self) -> f64 {
            match self.peek() {
                Some(b'-') => {
                    self.pos += 1;
                    -self.unary()
                }
                Some(b'(') => {
                    self.pos += 1;
                    let value = self.sum();
                    self.eat(b')');
                    value
                }
                Some(c) if c.is_ascii_digit() || c == b'.' => {
                    let start = self.pos;
                    while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
                        self.pos += 1;
                    }
                    std::str::from_utf8(&self.src[start..self.pos])
                        .unwrap()
                        .parse()
                        .unwrap()
                }
                _ => self.call(),
            }
        }

        fn call(&mut self) -> f64 {
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
                self.pos += 1;
            }
            let name = std::str::from_utf8(&self.src[start..self.pos]).unwrap().to_string();
            if name == "t" {
                return self.t;
            }
            self.eat(b'(');
            let mut args = vec![self.sum()];
            while self.peek() == Some(b',') {
                self.pos += 1;
                args.push(self.sum());
            }
            self.eat(b')');
            let truth = |b: bool| if b { 1.0 } else { 0.0 };
            match (name.as_str(), args.as_slice()) {
                ("if", [c, a, b]) => if *c != 0.0 { *a } else { *b },
                ("lt", [a, b]) => truth(a < b),
                ("gt", [a, b]) => truth(a > b),
                ("between", [x, lo, hi]) => truth(lo <= x && x <= hi),
                ("st", [var, value]) => {
                    self.vars[*var as usize] = *value;
                    *value
                }
                ("ld", [var]) => self.vars[*var as usize],
                other => panic!("unexpected call {other:?}"),
            }
        }
    }

    fn assert_matches_interpolator(keyframes: &[CursorKeyframe]) {
        let x_expr = position_expr(keyframes, Axis::X);
        let y_expr = position_expr(keyframes, Axis::Y);
        let mut x_vars = [0.0; MAX_EXPR_VARIABLES];
        let mut y_vars = [0.0; MAX_EXPR_VARIABLES];

        let last_ms = keyframes[keyframes.len() - 1].timestamp_ms;
        let mut samples: Vec<f64> = keyframes
            .windows(2)
            .flat_map(|w| [w[0].timestamp_ms, (w[0].timestamp_ms + w[1].timestamp_ms) / 2.0])
            .collect();
        samples.extend([last_ms, last_ms + 1000.0]);

        for ms in samples {
            let t = ms / 1000.0;
            let expected = interpolate_cursor(keyframes, ms, 100.0).unwrap();
            let x = ExprEval::run(&x_expr, t, &mut x_vars);
            let y = ExprEval::run(&y_expr, t, &mut y_vars);
            assert!((x - expected.x).abs() < 1e-3, "x at t={t}: {x} vs {}", expected.x);
            assert!((y - expected.y).abs() < 1e-3, "y at t={t}: {y} vs {}", expected.y);
        }

        let mut vars = [0.0; MAX_EXPR_VARIABLES];
        let before = keyframes[0].timestamp_ms / 1000.0 - 0.5;
        assert_eq!(ExprEval::run(&x_expr, before, &mut vars), -100.0);
    }

    #[test]
    fn test_nested_expression_matches_interpolator() {
        let keyframes: Vec<_> = (0..30)
            .map(|i| mv(10.0 * i as f64, (i % 7) as f64 * 15.0, 500.0 + i as f64 * 100.0))
            .collect();
        assert_matches_interpolator(&keyframes);
    }

    #[test]
    fn test_grouped_expression_matches_interpolator() {
        let keyframes: Vec<_> = (0..250)
            .map(|i| mv(10.0 * i as f64, (i % 9) as f64 * 20.0, i as f64 * 100.0))
            .collect();
        let expr = position_expr(&keyframes, Axis::X);
        assert!(expr.contains(")*0+if(between(t,"));
        assert!(expr.starts_with("if(lt(t,0.0000),-100,(st(0,"));
        assert_matches_interpolator(&keyframes);
    }
}
