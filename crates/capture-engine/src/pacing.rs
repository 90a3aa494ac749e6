//! Frame pacing: turning irregular frame arrivals into a constant frame rate.
//!
//! The output must contain `round(elapsed / 1000 * fps)` frames at any
//! point in time. Frames that arrive ahead of schedule are not written but
//! become the new fill image; gaps are filled by repeating the last image.

/// What to do with an arriving frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    /// Ahead of schedule. Keep it as the fill image only.
    Skip,
    /// Write the previous image `duplicates` times, then this frame once.
    Emit { duplicates: u64 },
}

impl PacingDecision {
    /// Frames this decision writes.
    pub fn frames(&self) -> u64 {
        match self {
            Self::Skip => 0,
            Self::Emit { duplicates } => duplicates + 1,
        }
    }
}

/// Pacing state. Owns no I/O.
#[derive(Debug, Clone)]
pub struct FramePacer {
    fps: u32,
    frames_written: u64,
    has_last_frame: bool,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frames_written: 0,
            has_last_frame: false,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn has_last_frame(&self) -> bool {
        self.has_last_frame
    }

    /// Frames the output should hold after `elapsed_ms`.
    pub fn expected_frames(&self, elapsed_ms: f64) -> u64 {
        (elapsed_ms.max(0.0) / 1000.0 * self.fps as f64).round() as u64
    }

    /// Account for a frame arriving at `elapsed_ms`.
    pub fn on_frame(&mut self, elapsed_ms: f64) -> PacingDecision {
        let expected = self.expected_frames(elapsed_ms);
        if expected <= self.frames_written {
            self.has_last_frame = true;
            return PacingDecision::Skip;
        }
        let duplicates = if self.has_last_frame {
            expected - self.frames_written - 1
        } else {
            0
        };
        self.frames_written += duplicates + 1;
        self.has_last_frame = true;
        PacingDecision::Emit { duplicates }
    }

    /// Padding frames needed at stop time. Zero when no frame was ever seen.
    pub fn finish(&mut self, elapsed_ms: f64) -> u64 {
        if !self.has_last_frame {
            return 0;
        }
        let padding = self
            .expected_frames(elapsed_ms)
            .saturating_sub(self.frames_written);
        self.frames_written += padding;
        padding
    }
}
