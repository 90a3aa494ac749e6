//! Cursor position and click state at an arbitrary time.
//!
//! This is the only place cursor motion is computed. Preview and export
//! both call it so they cannot disagree.

use dolly_project_model::CursorKeyframe;

/// How long a click stays active after its keyframe, in ms.
pub const DEFAULT_CLICK_WINDOW_MS: f64 = 100.0;

/// Interpolated cursor state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
    pub clicking: bool,
}

/// Index of the rightmost keyframe with `timestamp_ms <= time_ms`.
///
/// Times before the first keyframe map to index 0. Returns `None` for an
/// empty timeline.
pub fn find_keyframe_index(keyframes: &[CursorKeyframe], time_ms: f64) -> Option<usize> {
    if keyframes.is_empty() {
        return None;
    }
    let after = keyframes.partition_point(|k| k.timestamp_ms <= time_ms);
    Some(after.saturating_sub(1))
}

/// Cursor state at `time_ms`, or `None` before the first keyframe.
pub fn interpolate_cursor(
    keyframes: &[CursorKeyframe],
    time_ms: f64,
    click_window_ms: f64,
) -> Option<CursorPosition> {
    let first = keyframes.first()?;
    if time_ms < first.timestamp_ms {
        return None;
    }

    let idx = find_keyframe_index(keyframes, time_ms)?;
    let current = &keyframes[idx];
    let clicking = is_click_active(keyframes, time_ms, click_window_ms);

    let Some(next) = keyframes.get(idx + 1) else {
        return Some(CursorPosition {
            x: current.x,
            y: current.y,
            clicking,
        });
    };

    let duration = next.timestamp_ms - current.timestamp_ms;
    let progress = if duration > 0.0 {
        (time_ms - current.timestamp_ms) / duration
    } else {
        1.0
    };
    let f = progress.clamp(0.0, 1.0);

    Some(CursorPosition {
        x: current.x + (next.x - current.x) * f,
        y: current.y + (next.y - current.y) * f,
        clicking,
    })
}

/// Whether any click keyframe's window `[ts, ts + window]` contains `time_ms`.
pub fn is_click_active(keyframes: &[CursorKeyframe], time_ms: f64, click_window_ms: f64) -> bool {
    let end = keyframes.partition_point(|k| k.timestamp_ms <= time_ms);
    keyframes[..end]
        .iter()
        .rev()
        .take_while(|k| k.timestamp_ms >= time_ms - click_window_ms)
        .any(|k| k.is_click())
}
