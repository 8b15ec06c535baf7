//! Timing and tolerance knobs for rendering.

use std::time::Duration;

/// What the renderer does with an element whose retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementFailurePolicy {
    /// Fail the whole export.
    #[default]
    Abort,
    /// Log the failure and leave the element out of the frame.
    SkipElement,
}

/// Render tuning for one engine instance.
#[derive(Debug, Clone)]
pub struct RenderTuning {
    /// Attempts per video element per frame, including the first.
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * retry_backoff` before retrying.
    pub retry_backoff: Duration,
    /// Lower bound of the base seek timeout.
    pub seek_timeout_min: Duration,
    /// Upper bound of the base seek timeout.
    pub seek_timeout_max: Duration,
    /// Base seek timeout per second of source duration.
    pub seek_timeout_per_source_sec: Duration,
    /// Pause after a completed seek before the frame is read.
    pub seek_settle: Duration,
    /// Pause after each frame handed to a live recorder.
    pub live_frame_yield: Duration,
    /// Minimum share of content samples for a video layer to count as drawn.
    pub min_content_ratio: f64,
    /// Samples per axis when validating a layer.
    pub validation_grid: u32,
    /// Channel value a sample must exceed to count as content.
    pub content_threshold: u8,
    /// Accepted difference between produced and expected duration.
    pub duration_tolerance_secs: f64,
    pub failure_policy: ElementFailurePolicy,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(100),
            seek_timeout_min: Duration::from_millis(500),
            seek_timeout_max: Duration::from_millis(2000),
            seek_timeout_per_source_sec: Duration::from_millis(30),
            seek_settle: Duration::from_millis(150),
            live_frame_yield: Duration::from_millis(50),
            min_content_ratio: 0.05,
            validation_grid: 32,
            content_threshold: 10,
            duration_tolerance_secs: 0.1,
            failure_policy: ElementFailurePolicy::Abort,
        }
    }
}

impl RenderTuning {
    /// Adaptive timeout for seeking from `current_secs` to `target_secs` in a
    /// source of `duration_secs`.
    ///
    /// Longer sources and longer jumps get more time. An unknown duration is
    /// treated as a maximal jump.
    pub fn seek_timeout(&self, duration_secs: f64, current_secs: f64, target_secs: f64) -> Duration {
        let known = duration_secs.is_finite() && duration_secs > 0.0;
        let min_secs = self.seek_timeout_min.as_secs_f64();
        // Bound in seconds first; scaling a Duration by a huge factor overflows.
        let base_secs = if known {
            (self.seek_timeout_per_source_sec.as_secs_f64() * duration_secs)
                .min(self.seek_timeout_max.as_secs_f64())
                .max(min_secs)
        } else {
            min_secs
        };
        let ratio = if known {
            let distance = (target_secs - current_secs).abs() / duration_secs;
            if distance.is_nan() {
                1.0
            } else {
                distance.clamp(0.0, 1.0)
            }
        } else {
            1.0
        };
        Duration::from_secs_f64(base_secs * (1.0 + 2.0 * ratio))
    }

    /// Wait before retry number `attempt` (1-based count of failures so far).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_timeout_bounds() {
        let tuning = RenderTuning::default();
        assert_eq!(tuning.seek_timeout(10.0, 0.0, 0.0), Duration::from_millis(500));
        assert_eq!(tuning.seek_timeout(10.0, 0.0, 5.0), Duration::from_millis(1000));
        assert_eq!(tuning.seek_timeout(100.0, 50.0, 50.0), Duration::from_millis(2000));
        let mid = tuning.seek_timeout(40.0, 0.0, 0.0).as_secs_f64();
        assert!((mid - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_seek_timeout_ratio_is_clamped() {
        let tuning = RenderTuning::default();
        assert_eq!(tuning.seek_timeout(10.0, 0.0, 50.0), Duration::from_millis(1500));
        assert_eq!(tuning.seek_timeout(0.0, 0.0, 3.0), Duration::from_millis(1500));
    }

    #[test]
    fn test_seek_timeout_survives_huge_durations() {
        let tuning = RenderTuning::default();
        assert_eq!(tuning.seek_timeout(1e30, 0.0, 0.0), Duration::from_millis(2000));
        assert_eq!(tuning.seek_timeout(f64::MAX, 0.0, 1.0), Duration::from_millis(2000));
        assert_eq!(
            tuning.seek_timeout(f64::INFINITY, 0.0, 1.0),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let tuning = RenderTuning::default();
        assert_eq!(tuning.backoff_for(1), Duration::from_millis(100));
        assert_eq!(tuning.backoff_for(2), Duration::from_millis(200));
    }
}
