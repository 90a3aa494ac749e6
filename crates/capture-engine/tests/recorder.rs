//! Recorder tests against a shell stand-in for the encoder.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dolly_capture_engine::{
    ChannelSource, EncoderCommand, EncoderProfile, RecorderOptions, RecordingSession,
    ScreencastRecorder, SessionConfig, SessionState, SourceControl,
};
use dolly_common::clock::ManualClock;
use dolly_common::DollyError;
use dolly_project_model::{KeyframeTimeline, RecordingDir, RecordingStatus, Viewport};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "dolly-capture-{label}-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn shell(script: &str) -> EncoderCommand {
    EncoderCommand::new("sh", vec!["-c".into(), script.into()])
}

fn cat_to(output: &Path) -> EncoderCommand {
    let mut command = shell(r#"cat > "$0""#);
    command.args.push(output.to_string_lossy().into_owned());
    command
}

fn options(fps: u32, capacity: usize, encoder: EncoderCommand) -> RecorderOptions {
    RecorderOptions {
        fps,
        channel_capacity: capacity,
        encoder,
    }
}

#[tokio::test]
async fn single_frame_is_padded_to_stop_time() {
    let dir = temp_dir("pad");
    let out = dir.join("raw.bin");
    let clock = ManualClock::new();
    let (source, mut handle) = ChannelSource::new();

    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(clock.clone()),
        options(30, 4, cat_to(&out)),
    )
    .await
    .unwrap();
    assert_eq!(handle.next_control().await, Some(SourceControl::Started));

    let id = handle.push(vec![b'x']).await.unwrap();
    handle.wait_for_ack(id).await.unwrap();

    clock.set_ms(2000.0);
    let stats = recorder.stop().await.unwrap();
    assert_eq!(stats.frames_written, 60);
    assert_eq!(stats.padded, 60);
    assert_eq!(stats.skipped, 1);
    assert_eq!(std::fs::read(&out).unwrap(), vec![b'x'; 60]);
    assert!(!handle.is_attached());
}

#[tokio::test]
async fn gaps_are_filled_with_the_previous_frame() {
    let dir = temp_dir("gaps");
    let out = dir.join("raw.bin");
    let clock = ManualClock::new();
    let (source, mut handle) = ChannelSource::new();
    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(clock.clone()),
        options(10, 4, cat_to(&out)),
    )
    .await
    .unwrap();

    clock.set_ms(50.0);
    let a = handle.push(vec![b'a']).await.unwrap();
    handle.wait_for_ack(a).await.unwrap();

    // Ahead of schedule: acknowledged, not written, but becomes the fill image.
    clock.set_ms(60.0);
    let b = handle.push(vec![b'b']).await.unwrap();
    handle.wait_for_ack(b).await.unwrap();

    clock.set_ms(350.0);
    let c = handle.push(vec![b'c']).await.unwrap();
    handle.wait_for_ack(c).await.unwrap();

    clock.set_ms(500.0);
    let stats = recorder.stop().await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"abbcc".to_vec());
    assert_eq!(stats.frames_received, 3);
    assert_eq!(stats.duplicated, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.padded, 1);
    assert_eq!(stats.frames_written, 5);
}

#[tokio::test]
async fn stop_without_frames_is_degenerate() {
    let dir = temp_dir("degenerate");
    let out = dir.join("raw.bin");
    let (source, _handle) = ChannelSource::new();
    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(ManualClock::new()),
        options(30, 4, cat_to(&out)),
    )
    .await
    .unwrap();

    assert!(matches!(
        recorder.stop().await,
        Err(DollyError::DegenerateCapture { .. })
    ));
    assert!(matches!(recorder.stop().await, Err(DollyError::Capture { .. })));
}

#[tokio::test]
async fn encoder_failure_carries_stderr() {
    let clock = ManualClock::new();
    let (source, mut handle) = ChannelSource::new();
    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(clock.clone()),
        options(30, 4, shell("echo 'encoder exploded' >&2; exit 3")),
    )
    .await
    .unwrap();

    clock.set_ms(100.0);
    let id = handle.push(vec![0u8; 16]).await.unwrap();
    handle.wait_for_ack(id).await.unwrap();

    clock.set_ms(200.0);
    let err = recorder.stop().await.unwrap_err();
    assert!(matches!(err, DollyError::Capture { .. }), "{err:?}");
    assert!(err.stderr().unwrap_or_default().contains("encoder exploded"));
}

#[tokio::test]
async fn saturated_encoder_pauses_and_resumes_the_source() {
    let dir = temp_dir("backpressure");
    let out = dir.join("raw.bin");
    let clock = ManualClock::new();
    let (source, mut handle) = ChannelSource::new();
    let mut encoder = shell(r#"sleep 0.3; cat > "$0""#);
    encoder.args.push(out.to_string_lossy().into_owned());
    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(clock.clone()),
        options(10, 1, encoder),
    )
    .await
    .unwrap();

    let frame = vec![7u8; 128 * 1024];
    clock.set_ms(50.0);
    let first = handle.push(frame.clone()).await.unwrap();
    handle.wait_for_ack(first).await.unwrap();

    clock.set_ms(1000.0);
    let second = handle.push(frame.clone()).await.unwrap();
    let seen = handle.wait_for_ack(second).await.unwrap();
    let pause = seen.iter().position(|c| *c == SourceControl::Pause);
    let resume = seen.iter().position(|c| *c == SourceControl::Resume);
    assert!(pause.is_some(), "{seen:?}");
    assert!(pause < resume);

    let stats = recorder.stop().await.unwrap();
    assert!(stats.backpressure_pauses >= 1);
    assert_eq!(stats.frames_written, 10);
    assert_eq!(std::fs::metadata(&out).unwrap().len(), 10 * frame.len() as u64);
}

#[tokio::test]
async fn abort_kills_encoder_and_rejects_stop() {
    let dir = temp_dir("abort");
    let out = dir.join("raw.bin");
    let clock = ManualClock::new();
    let (source, mut handle) = ChannelSource::new();
    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(clock.clone()),
        options(30, 4, cat_to(&out)),
    )
    .await
    .unwrap();

    clock.set_ms(40.0);
    let id = handle.push(vec![1u8]).await.unwrap();
    handle.wait_for_ack(id).await.unwrap();

    recorder.abort().await.unwrap();
    assert!(!recorder.is_running());
    assert!(!handle.is_attached());
    assert!(matches!(recorder.stop().await, Err(DollyError::Capture { .. })));
}

#[tokio::test]
async fn cancellation_token_aborts_recording() {
    let dir = temp_dir("cancel");
    let (source, mut handle) = ChannelSource::new();
    let mut recorder = ScreencastRecorder::start(
        Box::new(source),
        Arc::new(ManualClock::new()),
        options(30, 4, cat_to(&dir.join("raw.bin"))),
    )
    .await
    .unwrap();
    assert_eq!(handle.next_control().await, Some(SourceControl::Started));

    recorder.cancellation_token().cancel();
    assert_eq!(handle.next_control().await, Some(SourceControl::Detach));
    assert!(matches!(recorder.stop().await, Err(DollyError::Aborted)));
}

fn session_config(root: &Path, name: &str, encoder: EncoderCommand) -> SessionConfig {
    SessionConfig {
        name: name.into(),
        output_dir: root.to_path_buf(),
        fps: 10,
        viewport: Viewport::new(320, 200),
        channel_capacity: 4,
        encoder: EncoderProfile::Custom(encoder),
    }
}

#[tokio::test]
async fn session_writes_recording_directory() {
    let root = temp_dir("session");
    let clock = ManualClock::new();
    let mut session = RecordingSession::new(session_config(&root, "demo", shell(r#"cat > "$0""#)));
    let (source, mut handle) = ChannelSource::new();
    let keyframes = session
        .start_with_clock(Box::new(source), Arc::new(clock.clone()))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Recording);

    keyframes.record_move(10.0, 10.0, "nav", 0);
    clock.set_ms(100.0);
    let id = handle.push(vec![b'f']).await.unwrap();
    handle.wait_for_ack(id).await.unwrap();
    clock.set_ms(400.0);
    keyframes.record_click(50.0, 60.0, "click-1", 1);
    clock.set_ms(1000.0);

    let summary = session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(summary.keyframes, 2);
    assert_eq!(summary.stats.frames_written, 10);

    let dir = RecordingDir::new(root.join("demo"));
    assert_eq!(std::fs::read(dir.raw_video_path()).unwrap(), vec![b'f'; 10]);
    let timeline = KeyframeTimeline::load(dir.keyframes_path()).unwrap();
    assert_eq!(timeline.fps, 10);
    assert_eq!(timeline.duration_ms, 1000.0);
    assert_eq!(timeline.click_count(), 1);
    assert_eq!(timeline.keyframes[1].timestamp_ms, 400.0);
    assert!(dir.post_production_path().exists());

    let manifest = dir.load_manifest().unwrap().unwrap();
    assert_eq!(manifest.status, RecordingStatus::Complete);
    assert_eq!(manifest.frames_written, 10);
}

#[tokio::test]
async fn failed_session_is_tagged_incomplete() {
    let root = temp_dir("session-failed");
    let clock = ManualClock::new();
    let mut session = RecordingSession::new(session_config(
        &root,
        "broken",
        shell("cat > /dev/null; echo 'no space left' >&2; exit 1"),
    ));
    let (source, mut handle) = ChannelSource::new();
    let keyframes = session
        .start_with_clock(Box::new(source), Arc::new(clock.clone()))
        .await
        .unwrap();

    clock.set_ms(100.0);
    keyframes.record_move(1.0, 1.0, "a", 0);
    let id = handle.push(vec![1u8]).await.unwrap();
    handle.wait_for_ack(id).await.unwrap();
    clock.set_ms(300.0);

    let err = session.stop().await.unwrap_err();
    assert!(matches!(err, DollyError::Capture { .. }));
    assert_eq!(session.state(), SessionState::Error);

    let dir = RecordingDir::new(root.join("broken"));
    let manifest = dir.load_manifest().unwrap().unwrap();
    assert_eq!(manifest.status, RecordingStatus::Incomplete);
    assert!(manifest.error.unwrap().contains("no space left"));
    assert_eq!(KeyframeTimeline::load(dir.keyframes_path()).unwrap().len(), 1);
}
