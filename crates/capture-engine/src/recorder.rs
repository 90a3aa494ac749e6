//! The frame-pacing screencast recorder.
//!
//! One task owns all recorder state. It waits on three things at once: the
//! cancellation token, the stop request and the next frame from the source.
//! The only other suspension point is a write to a saturated encoder input,
//! during which the source is paused.

use std::path::PathBuf;
use std::sync::Arc;

use dolly_common::clock::{Clock, DriftMeasurement};
use dolly_common::{DollyError, DollyResult};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::encoder::{CaptureEncoder, EncoderCommand, FrameSender};
use crate::pacing::{FramePacer, PacingDecision};
use crate::source::{FrameSource, SourceFrame};

/// Drift above this is logged as a warning at stop.
const DRIFT_WARN_MS: f64 = 50.0;

/// Recorder configuration.
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub fps: u32,
    /// Frames buffered between the recorder and the encoder's stdin.
    pub channel_capacity: usize,
    pub encoder: EncoderCommand,
}

impl RecorderOptions {
    /// Default ffmpeg capture profile writing to `output`.
    pub fn ffmpeg(fps: u32, output: impl Into<PathBuf>, ffmpeg: Option<&std::path::Path>) -> Self {
        let output = output.into();
        Self {
            fps,
            channel_capacity: 8,
            encoder: EncoderCommand::default_capture(ffmpeg, fps, &output),
        }
    }
}

/// Counters reported when a recording stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CaptureStats {
    pub frames_received: u64,
    pub frames_written: u64,
    /// Gap-filling repeats of the previous image.
    pub duplicated: u64,
    /// Frames that arrived ahead of schedule.
    pub skipped: u64,
    /// Repeats appended at stop.
    pub padded: u64,
    pub backpressure_pauses: u64,
    pub duration_ms: f64,
    pub bytes_written: u64,
}

struct Running {
    stop: oneshot::Sender<()>,
    task: JoinHandle<DollyResult<CaptureStats>>,
}

/// Records a push-based frame source into a constant-rate video.
pub struct ScreencastRecorder {
    running: Option<Running>,
    cancel: CancellationToken,
    stopped: bool,
}

impl ScreencastRecorder {
    /// Spawn the encoder, attach the source and start recording.
    ///
    /// The clock's epoch is the recording start; frame slots are computed
    /// from its elapsed time.
    pub async fn start(
        mut source: Box<dyn FrameSource>,
        clock: Arc<dyn Clock>,
        options: RecorderOptions,
    ) -> DollyResult<Self> {
        let encoder = CaptureEncoder::spawn(&options.encoder, options.channel_capacity)?;
        let (frames_tx, frames_rx) = mpsc::channel(1);
        if let Err(e) = source.start(frames_tx).await {
            encoder.kill().await;
            return Err(e);
        }

        tracing::info!(
            fps = options.fps,
            capacity = options.channel_capacity,
            "Screencast recorder started"
        );

        let cancel = CancellationToken::new();
        let (stop_tx, stop_rx) = oneshot::channel();
        let recorder = RecorderLoop {
            input: encoder.input(),
            encoder: Some(encoder),
            source,
            clock,
            pacer: FramePacer::new(options.fps),
            last_frame: None,
            stats: CaptureStats::default(),
        };
        let task = tokio::spawn(recorder.run(frames_rx, stop_rx, cancel.clone()));

        Ok(Self {
            running: Some(Running {
                stop: stop_tx,
                task,
            }),
            cancel,
            stopped: false,
        })
    }

    /// Token that aborts the recording when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Stop recording: pad to the stop time, close the encoder and wait for it.
    pub async fn stop(&mut self) -> DollyResult<CaptureStats> {
        let Some(running) = self.running.take() else {
            return Err(DollyError::capture(if self.stopped {
                "Recorder already stopped"
            } else {
                "Recorder was aborted"
            }));
        };
        self.stopped = true;
        // The loop may already have ended on its own; its result is in the task.
        let _ = running.stop.send(());
        join(running.task).await
    }

    /// Abort recording and kill the encoder. The output file is left as is.
    pub async fn abort(&mut self) -> DollyResult<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        self.cancel.cancel();
        match join(running.task).await {
            Ok(_) | Err(DollyError::Aborted) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScreencastRecorder {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.cancel.cancel();
        }
    }
}

async fn join(task: JoinHandle<DollyResult<CaptureStats>>) -> DollyResult<CaptureStats> {
    task.await
        .map_err(|e| DollyError::capture(format!("Recorder task failed: {e}")))?
}

enum Exit {
    Stop,
    Abort,
    /// A write to the encoder failed.
    Broken(DollyError),
}

struct RecorderLoop {
    input: Option<FrameSender>,
    encoder: Option<CaptureEncoder>,
    source: Box<dyn FrameSource>,
    clock: Arc<dyn Clock>,
    pacer: FramePacer,
    last_frame: Option<Arc<[u8]>>,
    stats: CaptureStats,
}

impl RecorderLoop {
    async fn run(
        mut self,
        mut frames: mpsc::Receiver<SourceFrame>,
        mut stop: oneshot::Receiver<()>,
        cancel: CancellationToken,
    ) -> DollyResult<CaptureStats> {
        let mut source_open = true;

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Exit::Abort,
                _ = &mut stop => break Exit::Stop,
                frame = frames.recv(), if source_open => match frame {
                    Some(frame) => {
                        if cancel.is_cancelled() {
                            self.ack(frame).await;
                            break Exit::Abort;
                        }
                        if let Err(e) = self.on_frame(frame).await {
                            break Exit::Broken(e);
                        }
                    }
                    None => {
                        tracing::debug!("Capture source closed its frame stream");
                        source_open = false;
                    }
                },
            }
        };

        let elapsed = self.clock.elapsed_ms();
        match exit {
            Exit::Stop => self.finish(elapsed, &mut frames).await,
            Exit::Abort => {
                tracing::info!(frames = self.stats.frames_written, "Recording aborted");
                self.release(&mut frames).await;
                self.kill_encoder().await;
                Err(DollyError::Aborted)
            }
            Exit::Broken(write_err) => {
                self.release(&mut frames).await;
                match self.close_encoder().await {
                    Err(encoder_err) => Err(encoder_err),
                    Ok(_) => Err(write_err),
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: SourceFrame) -> DollyResult<()> {
        let SourceFrame { data, ack } = frame;
        self.stats.frames_received += 1;
        let elapsed = self.clock.elapsed_ms();

        let result = match self.pacer.on_frame(elapsed) {
            PacingDecision::Skip => {
                self.stats.skipped += 1;
                Ok(())
            }
            PacingDecision::Emit { duplicates } => self.emit(duplicates, &data).await,
        };
        self.last_frame = Some(data);

        if let Err(e) = self.source.ack(ack).await {
            tracing::warn!(error = %e, "Failed to acknowledge frame");
        }
        result
    }

    async fn emit(&mut self, duplicates: u64, frame: &Arc<[u8]>) -> DollyResult<()> {
        if duplicates > 0 {
            if let Some(last) = self.last_frame.clone() {
                for _ in 0..duplicates {
                    self.write(Arc::clone(&last)).await?;
                }
                self.stats.duplicated += duplicates;
            }
        }
        self.write(Arc::clone(frame)).await
    }

    async fn write(&mut self, frame: Arc<[u8]>) -> DollyResult<()> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| DollyError::capture("Capture encoder input is closed"))?;

        match input.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.stats.backpressure_pauses += 1;
                tracing::debug!("Encoder input saturated, pausing source");
                self.source.pause().await?;
                let sent = input.send(frame).await;
                self.source.resume().await?;
                tracing::debug!("Encoder input drained, source resumed");
                sent.map_err(|_| DollyError::capture("Capture encoder stopped reading input"))?;
            }
            Err(TrySendError::Closed(_)) => {
                return Err(DollyError::capture("Capture encoder stopped reading input"));
            }
        }
        self.stats.frames_written += 1;
        Ok(())
    }

    async fn finish(
        mut self,
        elapsed: f64,
        frames: &mut mpsc::Receiver<SourceFrame>,
    ) -> DollyResult<CaptureStats> {
        let Some(last) = self.last_frame.clone() else {
            self.release(frames).await;
            self.kill_encoder().await;
            return Err(DollyError::degenerate_capture(
                "No frames were received from the capture source",
            ));
        };

        let padding = self.pacer.finish(elapsed);
        let mut padded = Ok(());
        for _ in 0..padding {
            padded = self.write(Arc::clone(&last)).await;
            if padded.is_err() {
                break;
            }
            self.stats.padded += 1;
        }
        self.release(frames).await;

        let exit = self.close_encoder().await;
        let exit = match (exit, padded) {
            (Err(e), _) | (Ok(_), Err(e)) => return Err(e),
            (Ok(exit), Ok(())) => exit,
        };

        self.stats.duration_ms = elapsed;
        self.stats.bytes_written = exit.bytes_written;
        let drift = DriftMeasurement::from_frames(elapsed, self.stats.frames_written, self.pacer.fps());
        tracing::info!(
            received = self.stats.frames_received,
            written = self.stats.frames_written,
            duplicated = self.stats.duplicated,
            skipped = self.stats.skipped,
            padded = self.stats.padded,
            pauses = self.stats.backpressure_pauses,
            duration_ms = elapsed,
            drift_ms = drift.drift_ms(),
            "Recording stopped"
        );
        if drift.exceeds_threshold_ms(DRIFT_WARN_MS) {
            tracing::warn!(drift_ms = drift.drift_ms(), "Capture drift exceeds threshold");
        }
        Ok(self.stats)
    }

    /// Detach from the source and acknowledge anything still buffered.
    async fn release(&mut self, frames: &mut mpsc::Receiver<SourceFrame>) {
        if let Err(e) = self.source.detach().await {
            tracing::warn!(error = %e, "Failed to detach capture source");
        }
        frames.close();
        while let Ok(frame) = frames.try_recv() {
            self.stats.frames_received += 1;
            self.ack(frame).await;
        }
    }

    async fn ack(&mut self, frame: SourceFrame) {
        if let Err(e) = self.source.ack(frame.ack).await {
            tracing::warn!(error = %e, "Failed to acknowledge frame");
        }
    }

    async fn close_encoder(&mut self) -> DollyResult<crate::encoder::EncoderExit> {
        self.input.take();
        match self.encoder.take() {
            Some(encoder) => encoder.finish().await,
            None => Err(DollyError::capture("Capture encoder already closed")),
        }
    }

    async fn kill_encoder(&mut self) {
        self.input.take();
        if let Some(encoder) = self.encoder.take() {
            encoder.kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_options_use_capture_profile() {
        let options = RecorderOptions::ffmpeg(25, "/tmp/out/raw.mp4", Some(std::path::Path::new("/opt/ffmpeg")));
        assert_eq!(options.fps, 25);
        assert!(options.encoder.args.iter().any(|a| a == "ultrafast"));
        assert_eq!(options.encoder.args.last().map(String::as_str), Some("/tmp/out/raw.mp4"));
    }
}
