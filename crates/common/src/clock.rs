//! Clock and timing utilities for export accounting.
//!
//! An export session anchors all of its timing to a monotonic stopwatch
//! started when the session begins. This module provides:
//! - The session stopwatch
//! - Throughput / ETA derivation from frame counters
//! - Output duration drift checks

use std::time::{Duration, Instant};

/// A monotonic stopwatch anchored at the moment a session started.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    /// The instant the stopwatch started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl Stopwatch {
    /// Start a new stopwatch anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time elapsed since start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Seconds elapsed since start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Frame throughput derived from a frame counter and elapsed wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Frames processed per wall-clock second.
    pub frames_per_sec: f64,
    /// Mean wall time spent per frame, in milliseconds.
    pub average_frame_time_ms: f64,
    /// Projected seconds until the remaining frames are processed.
    pub estimated_secs_remaining: f64,
}

impl Throughput {
    /// Compute throughput after `frames_done` of `total_frames` took `elapsed_secs`.
    ///
    /// All fields are finite and non-negative, including for zero counters.
    pub fn measure(frames_done: u64, total_frames: u64, elapsed_secs: f64) -> Self {
        let elapsed_secs = elapsed_secs.max(0.0);
        if frames_done == 0 {
            return Self {
                frames_per_sec: 0.0,
                average_frame_time_ms: 0.0,
                estimated_secs_remaining: 0.0,
            };
        }

        let average_frame_time_ms = elapsed_secs * 1000.0 / frames_done as f64;
        let frames_per_sec = if elapsed_secs > 0.0 {
            frames_done as f64 / elapsed_secs
        } else {
            0.0
        };
        let remaining = total_frames.saturating_sub(frames_done);

        Self {
            frames_per_sec,
            average_frame_time_ms,
            estimated_secs_remaining: remaining as f64 * average_frame_time_ms / 1000.0,
        }
    }
}

/// Difference between the expected and the produced output duration.
#[derive(Debug, Clone, Copy)]
pub struct DurationDrift {
    /// Duration the timeline asked for (seconds).
    pub expected_secs: f64,
    /// Duration implied by the frames actually produced (seconds).
    pub actual_secs: f64,
}

impl DurationDrift {
    /// Drift derived from a frame count at the given rate.
    pub fn from_frames(expected_secs: f64, frames: u64, fps: u32) -> Self {
        Self {
            expected_secs,
            actual_secs: frames as f64 / fps.max(1) as f64,
        }
    }

    /// Signed drift in seconds (positive = output is longer).
    pub fn drift_secs(&self) -> f64 {
        self.actual_secs - self.expected_secs
    }

    /// Whether drift exceeds an acceptable tolerance.
    pub fn exceeds_tolerance_secs(&self, tolerance_secs: f64) -> bool {
        self.drift_secs().abs() > tolerance_secs
    }
}

/// Number of frames needed to cover `duration_secs` at `fps`.
pub fn total_frames(duration_secs: f64, fps: u32) -> u64 {
    if duration_secs <= 0.0 || fps == 0 {
        return 0;
    }
    let exact = duration_secs * fps as f64;
    // Absorb float noise such as 5.0 * 30.0 landing a hair above 150.
    let rounded = exact.round();
    if (exact - rounded).abs() < 1e-9 {
        rounded as u64
    } else {
        exact.ceil() as u64
    }
}

/// Timeline time of a frame index at `fps`.
pub fn frame_time_secs(frame_index: u64, fps: u32) -> f64 {
    frame_index as f64 / fps.max(1) as f64
}
