//! Encoder subprocess for the raw capture.
//!
//! Frames travel through a bounded channel to a writer task that owns the
//! encoder's stdin. A full channel is the backpressure signal the recorder
//! reacts to. Stderr is drained concurrently so the encoder never blocks on
//! it, and is attached to any failure.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use dolly_common::ffmpeg::resolve_ffmpeg_binary;
use dolly_common::{DollyError, DollyResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Program and arguments used to encode the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl EncoderCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The fixed raw-capture profile: MJPEG frames on stdin to near-lossless H.264.
    pub fn ffmpeg_capture(ffmpeg: impl Into<PathBuf>, fps: u32, output: &Path) -> Self {
        let fps = fps.to_string();
        let args = [
            "-f",
            "image2pipe",
            "-vcodec",
            "mjpeg",
            "-r",
            &fps,
            "-i",
            "pipe:0",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-crf",
            "4",
            "-pix_fmt",
            "yuv420p",
            "-r",
            &fps,
            "-an",
            "-y",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(output.to_string_lossy().into_owned()))
        .collect();
        Self::new(ffmpeg, args)
    }

    /// Capture profile with the ffmpeg binary resolved from the environment.
    pub fn default_capture(configured_ffmpeg: Option<&Path>, fps: u32, output: &Path) -> Self {
        Self::ffmpeg_capture(resolve_ffmpeg_binary(configured_ffmpeg), fps, output)
    }
}

/// Sending half of the encoder input.
pub type FrameSender = mpsc::Sender<Arc<[u8]>>;

/// A running capture encoder.
pub struct CaptureEncoder {
    child: Child,
    input: Option<FrameSender>,
    writer: JoinHandle<std::io::Result<u64>>,
    stderr: JoinHandle<String>,
}

/// Result of a clean encoder shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderExit {
    pub bytes_written: u64,
}

impl CaptureEncoder {
    /// Spawn the encoder with an input channel of `capacity` frames.
    pub fn spawn(command: &EncoderCommand, capacity: usize) -> DollyResult<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DollyError::capture(format!(
                    "Failed to start encoder {}: {e}",
                    command.program.display()
                ))
            })?;

        tracing::info!(
            pid = child.id(),
            program = %command.program.display(),
            args = command.args.len(),
            "Capture encoder started"
        );

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DollyError::capture("Encoder stdin was not captured"))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| DollyError::capture("Encoder stderr was not captured"))?;

        let (tx, mut rx) = mpsc::channel::<Arc<[u8]>>(capacity.max(1));

        let writer = tokio::spawn(async move {
            let mut bytes = 0u64;
            while let Some(frame) = rx.recv().await {
                stdin.write_all(&frame).await?;
                bytes += frame.len() as u64;
            }
            stdin.flush().await?;
            stdin.shutdown().await?;
            Ok(bytes)
        });

        let stderr = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = stderr_pipe.read_to_end(&mut buf).await {
                tracing::debug!(error = %e, "Encoder stderr read stopped");
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        Ok(Self {
            child,
            input: Some(tx),
            writer,
            stderr,
        })
    }

    /// Channel feeding the encoder's stdin.
    pub fn input(&self) -> Option<FrameSender> {
        self.input.clone()
    }

    /// Close stdin and wait for the encoder to exit.
    pub async fn finish(mut self) -> DollyResult<EncoderExit> {
        self.input.take();
        let written = match (&mut self.writer).await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        };
        let status = self.child.wait().await.map_err(|e| {
            DollyError::capture(format!("Failed to wait for capture encoder: {e}"))
        })?;
        let stderr = (&mut self.stderr).await.unwrap_or_default();

        if !status.success() {
            return Err(DollyError::capture_failed(
                format!("Capture encoder exited with {}", describe(status)),
                stderr,
            ));
        }
        match written {
            Ok(bytes_written) => {
                tracing::info!(bytes_written, "Capture encoder finished");
                Ok(EncoderExit { bytes_written })
            }
            Err(e) => Err(DollyError::capture_failed(
                format!("Writing to capture encoder failed: {e}"),
                stderr,
            )),
        }
    }

    /// Kill the encoder and wait for it to exit.
    pub async fn kill(mut self) -> Option<String> {
        self.input.take();
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Capture encoder already exited");
        }
        if let Err(e) = self.child.wait().await {
            tracing::warn!(error = %e, "Failed to reap capture encoder");
        }
        self.writer.abort();
        (&mut self.stderr).await.ok()
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}
