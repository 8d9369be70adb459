//! Rolling frame-time sampler.

use crate::constants::PERF_WINDOW;
use std::collections::VecDeque;
use std::time::Duration;

/// Tracks recent frame durations against a target frame interval.
///
/// A disabled monitor records nothing and reports zeros.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    enabled: bool,
    target: Duration,
    samples: VecDeque<Duration>,
    dropped: u64,
    total_frames: u64,
}

impl PerformanceMonitor {
    pub fn new(enabled: bool, target: Duration) -> Self {
        Self {
            enabled,
            target,
            samples: VecDeque::with_capacity(PERF_WINDOW),
            dropped: 0,
            total_frames: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_frame(&mut self, frame_time: Duration) {
        if !self.enabled {
            return;
        }
        if self.samples.len() == PERF_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(frame_time);
        self.total_frames += 1;
        if frame_time > self.target * 3 / 2 {
            self.dropped += 1;
        }

        if self.total_frames % PERF_WINDOW as u64 == 0 {
            let avg = self.average_frame_time();
            if avg > self.target {
                log::warn!(
                    "Minimap frames over budget: avg {:.2}ms (target {:.2}ms), {} dropped",
                    avg.as_secs_f64() * 1000.0,
                    self.target.as_secs_f64() * 1000.0,
                    self.dropped
                );
            }
        }
    }

    pub fn average_frame_time(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    /// Frames per second implied by the average frame time.
    pub fn fps(&self) -> f64 {
        let avg = self.average_frame_time().as_secs_f64();
        if avg <= 0.0 { 0.0 } else { 1.0 / avg }
    }

    /// Frames that took longer than 1.5x the target interval since creation or reset.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.dropped = 0;
        self.total_frames = 0;
    }

    /// One-line summary for overlays and logs.
    pub fn summary(&self) -> String {
        format!(
            "{:.0} fps | {:.2} ms | {} dropped",
            self.fps(),
            self.average_frame_time().as_secs_f64() * 1000.0,
            self.dropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_monitor_is_a_no_op() {
        let mut perf = PerformanceMonitor::disabled();
        perf.record_frame(Duration::from_millis(100));
        assert_eq!(perf.total_frames(), 0);
        assert_eq!(perf.fps(), 0.0);
        assert_eq!(perf.dropped_frames(), 0);
    }

    #[test]
    fn fps_follows_average() {
        let mut perf = PerformanceMonitor::new(true, Duration::from_millis(16));
        for _ in 0..10 {
            perf.record_frame(Duration::from_millis(10));
        }
        assert_eq!(perf.average_frame_time(), Duration::from_millis(10));
        assert!((perf.fps() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn counts_dropped_frames_and_rolls_window() {
        let mut perf = PerformanceMonitor::new(true, Duration::from_millis(10));
        perf.record_frame(Duration::from_millis(15));
        perf.record_frame(Duration::from_millis(16));
        assert_eq!(perf.dropped_frames(), 1);

        for _ in 0..PERF_WINDOW {
            perf.record_frame(Duration::from_millis(4));
        }
        assert_eq!(perf.average_frame_time(), Duration::from_millis(4));
        assert_eq!(perf.total_frames(), PERF_WINDOW as u64 + 2);
    }
}
