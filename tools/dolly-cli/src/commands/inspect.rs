//! Show recording information.

use std::path::PathBuf;

use dolly_project_model::LoadedRecording;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let recording =
        LoadedRecording::load(&path).map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;
    let timeline = &recording.timeline;

    println!("Recording: {}", recording.dir.name());
    println!("  Started: {}", timeline.recording_started_at);
    println!(
        "  Viewport: {}x{} @ {}fps",
        timeline.viewport.w, timeline.viewport.h, timeline.fps
    );
    println!("  Duration: {:.2}s", timeline.duration_ms / 1000.0);
    println!();

    println!("Keyframes:");
    println!("  Moves: {}", timeline.move_count());
    println!("  Clicks: {}", timeline.click_count());
    if let (Some(first), Some(last)) = (timeline.first_timestamp_ms(), timeline.last_timestamp_ms()) {
        println!("  Span: {:.0}ms .. {:.0}ms", first, last);
    }
    println!();

    match &recording.manifest {
        Some(manifest) => {
            println!("Manifest:");
            println!("  Status: {:?}", manifest.status);
            println!("  Frames written: {}", manifest.frames_written);
            if let Some(error) = &manifest.error {
                println!("  Error: {error}");
            }
        }
        None => println!("Manifest: none"),
    }

    let missing = recording.dir.validate_sources();
    if !missing.is_empty() {
        println!();
        for problem in missing {
            println!("[WARN] {problem}");
        }
    }

    Ok(())
}
