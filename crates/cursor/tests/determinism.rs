use dolly_cursor::{
    render_cursor_frame, resolve_shape, CursorRenderConfig, CursorStyle, PixmapPathBuilder,
    PixmapSurface, DEFAULT_CLICK_WINDOW_MS,
};
use dolly_project_model::{CursorKeyframe, CursorSettings, HotspotSetting, KeyframeKind};

fn timeline() -> Vec<CursorKeyframe> {
    vec![
        CursorKeyframe::new(KeyframeKind::Move, 30.0, 30.0, 0.0, "a", 0),
        CursorKeyframe::new(KeyframeKind::Move, 120.0, 80.0, 400.0, "b", 1),
        CursorKeyframe::new(KeyframeKind::Click, 120.0, 80.0, 450.0, "b", 1),
        CursorKeyframe::new(KeyframeKind::Move, 60.0, 100.0, 900.0, "c", 2),
    ]
}

fn render_all(settings: &CursorSettings, frames: usize) -> Vec<Vec<u8>> {
    let shape = resolve_shape(settings).unwrap();
    let style = CursorStyle::from_settings(settings).unwrap();
    let keyframes = timeline();
    let config = CursorRenderConfig {
        style: &style,
        keyframes: &keyframes,
        shape: &shape,
        click_window_ms: DEFAULT_CLICK_WINDOW_MS,
    };
    let mut surface = PixmapSurface::new(160, 120).unwrap();
    let mut paths = PixmapPathBuilder::new();
    (0..frames)
        .map(|i| {
            let t = i as f64 * (1000.0 / 30.0);
            render_cursor_frame(&mut surface, &mut paths, &config, t, 160, 120).unwrap();
            surface.encode_png().unwrap()
        })
        .collect()
}

#[test]
fn test_identical_inputs_give_identical_frames() {
    for style in ["pointer", "pointer-alt", "hand", "dot"] {
        let settings = CursorSettings {
            style: style.to_string(),
            ..Default::default()
        };
        assert_eq!(render_all(&settings, 32), render_all(&settings, 32), "{style}");
    }
}

#[test]
fn test_click_frame_differs_from_rest_frame() {
    let frames = render_all(&CursorSettings::default(), 32);
    // Frame 14 (~467ms) is inside the click window that starts at 450ms.
    assert_ne!(frames[14], frames[12]);
}

#[test]
fn test_custom_svg_cursor_renders() {
    let dir = std::env::temp_dir().join("dolly_test_custom_cursor");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("cursor.svg");
    std::fs::write(
        &path,
        r#"<svg viewBox="0 0 16 16"><circle cx="8" cy="8" r="6"/><line x1="0" y1="0" x2="16" y2="16"/></svg>"#,
    )
    .unwrap();

    let settings = CursorSettings {
        custom_svg_path: Some(path),
        custom_hotspot: Some(HotspotSetting { x: 0.5, y: 0.5 }),
        ..Default::default()
    };
    let shape = resolve_shape(&settings).unwrap();
    assert_eq!(shape.paths.len(), 2);
    let frames = render_all(&settings, 4);
    assert_eq!(frames[0], render_all(&settings, 1)[0]);

    std::fs::remove_dir_all(&dir).ok();
}
