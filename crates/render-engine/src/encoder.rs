//! Export encoder invocation.

use std::path::PathBuf;
use std::process::Stdio;

use dolly_common::{DollyError, DollyResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::export::{ExportProgress, ExportStage, ProgressCallback};
use crate::overlay::OverlayFrames;

/// PNG frames buffered between the renderer and the encoder's stdin.
const OVERLAY_QUEUE: usize = 4;

/// A fully planned encoder run.
#[derive(Debug, Clone)]
pub struct EncoderInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Frames streamed into stdin, if the plan reads `pipe:0`.
    pub overlay: Option<OverlayFrames>,
    pub total_frames: u64,
    pub progress_interval_frames: u64,
}

/// State accumulated from `-progress` key/value lines.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressState {
    pub frame: u64,
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    /// Apply one `key=value` line. Returns true at the end of a block.
    pub fn update(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        match key {
            "frame" => {
                if let Ok(frame) = value.trim().parse() {
                    self.frame = frame;
                }
            }
            "out_time_us" | "out_time_ms" => {
                // Both keys carry microseconds.
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
                return true;
            }
            _ => {}
        }
        false
    }
}

fn report(progress: &Option<ProgressCallback>, stage: ExportStage, frame: u64, total: u64) {
    if let Some(cb) = progress {
        cb(ExportProgress::new(stage, frame, total));
    }
}

/// Run the encoder to completion.
///
/// On cancellation the encoder is killed, its exit awaited and
/// [`DollyError::Aborted`] returned. A non-zero exit is an encode error
/// carrying stderr. The output file is never removed.
pub async fn run_encoder(
    invocation: EncoderInvocation,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> DollyResult<()> {
    let EncoderInvocation {
        program,
        args,
        overlay,
        total_frames,
        progress_interval_frames,
    } = invocation;

    tracing::debug!(program = %program.display(), args = ?args, "Running export encoder");
    let mut child = Command::new(&program)
        .args(&args)
        .stdin(if overlay.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            DollyError::encode(format!("Failed to start encoder {}: {e}", program.display()))
        })?;

    tracing::info!(
        pid = child.id(),
        args_len = args.len(),
        total_frames,
        overlay = overlay.is_some(),
        "Export encoder started"
    );

    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DollyError::encode("Failed to capture encoder stderr"))?;
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = stderr_pipe.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, "Encoder stderr read stopped");
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DollyError::encode("Failed to capture encoder stdout"))?;
    // Overlay exports report their own per-frame progress.
    let encoder_progress = if overlay.is_some() { None } else { progress.clone() };
    let progress_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        while let Ok(Some(line)) = lines.next_line().await {
            if state.update(&line) {
                report(&encoder_progress, ExportStage::Encoding, state.frame.min(total_frames), total_frames);
            }
        }
        state
    });

    let overlay_task = match overlay {
        Some(frames) => {
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| DollyError::encode("Failed to capture encoder stdin"))?;
            Some(spawn_overlay(frames, stdin, cancel.clone(), progress.clone(), progress_interval_frames))
        }
        None => None,
    };

    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    let Some(status) = status else {
        tracing::info!("Export cancelled, stopping encoder");
        if let Err(e) = child.start_kill() {
            tracing::debug!(error = %e, "Encoder already exited");
        }
        if let Err(e) = child.wait().await {
            tracing::warn!(error = %e, "Failed to reap export encoder");
        }
        if let Some(task) = overlay_task {
            let _ = task.await;
        }
        return Err(DollyError::Aborted);
    };
    let status =
        status.map_err(|e| DollyError::encode(format!("Failed to wait on encoder: {e}")))?;

    let overlay_result = match overlay_task {
        Some(task) => Some(
            task.await
                .map_err(|e| DollyError::encode(format!("Overlay renderer failed: {e}")))?,
        ),
        None => None,
    };
    let stderr = stderr_task.await.unwrap_or_default();
    let final_state = progress_task.await.unwrap_or_default();

    if !status.success() {
        let code = status
            .code()
            .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
        tracing::error!(%code, "Export encoder failed");
        return Err(DollyError::encode_failed(
            format!("Encoder exited with {code}"),
            stderr,
        ));
    }
    if cancel.is_cancelled() {
        return Err(DollyError::Aborted);
    }
    if let Some(result) = overlay_result {
        let sent = result?;
        if sent < total_frames {
            return Err(DollyError::encode_failed(
                format!("Encoder stopped reading overlay frames after {sent} of {total_frames}"),
                stderr,
            ));
        }
    }

    tracing::info!(
        frames = final_state.frame,
        out_time_secs = final_state.out_time_secs,
        "Export encoder finished"
    );
    Ok(())
}

/// Render overlay frames on a blocking thread and pipe them into stdin.
fn spawn_overlay(
    frames: OverlayFrames,
    mut stdin: tokio::process::ChildStdin,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    interval: u64,
) -> JoinHandle<DollyResult<u64>> {
    let total = frames.total_frames;
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OVERLAY_QUEUE);

    let render = tokio::task::spawn_blocking(move || {
        let interval = interval.max(1);
        frames.stream_blocking(tx, &cancel, |index| {
            let done = index + 1;
            if done % interval == 0 || done == total {
                report(&progress, ExportStage::Rendering, done, total);
            }
        })
    });

    tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(png) = rx.recv().await {
            if let Err(e) = stdin.write_all(&png).await {
                tracing::debug!(error = %e, written, "Encoder stdin closed");
                break;
            }
            written += 1;
        }
        // Closing stdin ends the image2pipe input.
        drop(rx);
        if let Err(e) = stdin.shutdown().await {
            tracing::debug!(error = %e, "Encoder stdin shutdown failed");
        }
        drop(stdin);

        let rendered = render
            .await
            .map_err(|e| DollyError::encode(format!("Overlay renderer panicked: {e}")))??;
        Ok(written.min(rendered))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_progress_block_parsing() {
        let mut state = ProgressState::default();
        assert!(!state.update("frame=42"));
        assert!(!state.update("out_time_us=1400000"));
        assert!(!state.update("garbage"));
        assert!(state.update("progress=continue"));
        assert_eq!(state.frame, 42);
        assert!((state.out_time_secs - 1.4).abs() < 1e-9);
        assert!(!state.complete);
        assert!(state.update("progress=end"));
        assert!(state.complete);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_encoder_carries_stderr() {
        let invocation = EncoderInvocation {
            program: "sh".into(),
            args: vec!["-c".into(), "echo 'Invalid filter graph' >&2; exit 1".into()],
            overlay: None,
            total_frames: 10,
            progress_interval_frames: 30,
        };
        let err = run_encoder(invocation, CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DollyError::Encode { .. }));
        assert_eq!(err.stderr().map(str::trim), Some("Invalid filter graph"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_lines_are_forwarded() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p: ExportProgress| {
            sink.lock().unwrap().push((p.stage, p.frame));
        });
        let invocation = EncoderInvocation {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                "printf 'frame=5\\nprogress=continue\\nframe=10\\nprogress=end\\n'".into(),
            ],
            overlay: None,
            total_frames: 10,
            progress_interval_frames: 30,
        };
        run_encoder(invocation, CancellationToken::new(), Some(callback))
            .await
            .unwrap();
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(ExportStage::Encoding, 5), (ExportStage::Encoding, 10)]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_encoder() {
        let invocation = EncoderInvocation {
            program: "sh".into(),
            args: vec!["-c".into(), "sleep 30".into()],
            overlay: None,
            total_frames: 0,
            progress_interval_frames: 30,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = std::time::Instant::now();
        let err = run_encoder(invocation, cancel, None).await.unwrap_err();
        assert!(matches!(err, DollyError::Aborted));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
