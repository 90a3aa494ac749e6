//! Clock and timing utilities for frame pacing.
//!
//! Every recording is anchored to a monotonic clock epoch taken when the
//! capture starts. Frame pacing and keyframe timestamps both read the same
//! clock so the raw video and the cursor timeline stay aligned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of elapsed time since a recording started.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock epoch.
    fn elapsed_ms(&self) -> f64;

    /// Wall-clock time at the epoch (RFC 3339).
    fn epoch_wall(&self) -> String;
}

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a clock from a known epoch.
    pub fn from_epoch(epoch: Instant, wall: String) -> Self {
        Self {
            epoch,
            epoch_wall: wall,
        }
    }

    /// Seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Clock for RecordingClock {
    fn elapsed_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn epoch_wall(&self) -> String {
        self.epoch_wall.clone()
    }
}

/// A clock that only moves when told to. Shared handles see the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    /// Elapsed time in microseconds.
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute elapsed time.
    pub fn set_ms(&self, ms: f64) {
        self.micros
            .store((ms.max(0.0) * 1000.0).round() as u64, Ordering::SeqCst);
    }

    /// Move forward by the given number of milliseconds.
    pub fn advance_ms(&self, ms: f64) {
        let delta = (ms.max(0.0) * 1000.0).round() as u64;
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed_ms(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1000.0
    }

    fn epoch_wall(&self) -> String {
        "1970-01-01T00:00:00+00:00".to_string()
    }
}

/// Drift between the encoded video timeline and wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Reference duration (wall clock), ms.
    pub reference_ms: f64,
    /// Measured duration (frames / fps), ms.
    pub measured_ms: f64,
}

impl DriftMeasurement {
    /// Build a measurement from a frame count at the given rate.
    pub fn from_frames(elapsed_ms: f64, frames: u64, fps: u32) -> Self {
        Self {
            reference_ms: elapsed_ms,
            measured_ms: frames as f64 * 1000.0 / fps.max(1) as f64,
        }
    }

    /// Drift in milliseconds (positive = video is longer than wall clock).
    pub fn drift_ms(&self) -> f64 {
        self.measured_ms - self.reference_ms
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = RecordingClock::start();
        assert!(clock.elapsed_ms() < 1000.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_ms(250.0);
        handle.advance_ms(0.5);
        assert!((clock.elapsed_ms() - 250.5).abs() < 1e-9);
        clock.set_ms(10.0);
        assert!((handle.elapsed_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_drift_from_frames() {
        let drift = DriftMeasurement::from_frames(2000.0, 61, 30);
        assert!((drift.drift_ms() - 33.333).abs() < 0.01);
        assert!(drift.exceeds_threshold_ms(10.0));
        assert!(!drift.exceeds_threshold_ms(40.0));
    }
}
