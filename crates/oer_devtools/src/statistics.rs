use std::time::Duration;

use oer_core::engine::{Module, ProcessArg};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub frames: u64,
    /// Frames per second over the last completed interval.
    pub fps: f64,
}

/// Per-tick frame counter that logs the frame rate once per interval.
#[derive(Debug)]
pub struct Statistics {
    interval: Duration,
    window: Duration,
    window_frames: u32,
    snapshot: StatsSnapshot,
}

impl Statistics {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: Duration::ZERO,
            window_frames: 0,
            snapshot: StatsSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.snapshot.frames += 1;
        self.window += elapsed;
        self.window_frames += 1;
        if self.window >= self.interval && !self.window.is_zero() {
            self.snapshot.fps = f64::from(self.window_frames) / self.window.as_secs_f64();
            log::info!("FPS: {:.1}", self.snapshot.fps);
            self.window = Duration::ZERO;
            self.window_frames = 0;
        }
    }
}

impl Module for Statistics {
    fn process(&mut self, arg: &ProcessArg) {
        self.record(arg.elapsed);
    }

    fn deinitialize(&mut self) {
        log::info!("Rendered {} frames", self.snapshot.frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_reported_per_interval() {
        let mut stats = Statistics::new(Duration::from_secs(1));
        for _ in 0..49 {
            stats.record(Duration::from_millis(20));
        }
        assert_eq!(stats.snapshot().fps, 0.0);
        stats.record(Duration::from_millis(20));
        assert_eq!(stats.snapshot().frames, 50);
        assert!((stats.snapshot().fps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_frames_do_not_divide_by_zero() {
        let mut stats = Statistics::new(Duration::ZERO);
        stats.record(Duration::ZERO);
        assert_eq!(stats.snapshot().fps, 0.0);
        assert_eq!(stats.snapshot().frames, 1);
    }
}
