use std::time::{Duration, Instant};

/// Wall-clock stopwatch handing out the time since its last reset.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    last_instant: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self { last_instant: None }
    }

    pub fn start(&mut self) {
        self.last_instant = Some(Instant::now());
    }

    pub fn is_running(&self) -> bool {
        self.last_instant.is_some()
    }

    /// Elapsed time since `start` or the previous call. Zero if never started.
    pub fn elapsed_and_reset(&mut self) -> Duration {
        let now = Instant::now();
        match self.last_instant.replace(now) {
            Some(last) => now.duration_since(last),
            None => Duration::ZERO,
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-timestep accumulator: real time goes in, whole steps come out.
#[derive(Debug, Clone)]
pub struct FixedStep {
    pub fixed_dt: f64,
    pub max_accumulator: f64,
    accumulator: f64,
    pub total_time: f64,
    pub step_count: u64,
}

impl FixedStep {
    pub fn new(fixed_dt: f64) -> Self {
        Self {
            fixed_dt,
            max_accumulator: 0.25,
            accumulator: 0.0,
            total_time: 0.0,
            step_count: 0,
        }
    }

    pub fn advance(&mut self, real_dt: f64) {
        // Spiral-of-death cap
        let real_dt = if real_dt > self.max_accumulator {
            log::warn!(
                "Frame took {:.1}ms, capping accumulator to {}ms",
                real_dt * 1000.0,
                self.max_accumulator * 1000.0
            );
            self.max_accumulator
        } else {
            real_dt
        };
        self.accumulator += real_dt;
    }

    pub fn should_step(&mut self) -> bool {
        if self.fixed_dt > 0.0 && self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            self.total_time += self.fixed_dt;
            self.step_count += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    pub fn interpolation_alpha(&self) -> f64 {
        if self.fixed_dt > 0.0 {
            self.accumulator / self.fixed_dt
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_timer_reports_zero() {
        let mut timer = Timer::new();
        assert!(!timer.is_running());
        assert_eq!(timer.elapsed_and_reset(), Duration::ZERO);
        assert!(timer.is_running());
    }

    #[test]
    fn fixed_step_consumes_whole_steps_only() {
        let mut step = FixedStep::new(0.01);
        step.advance(0.035);
        let mut count = 0;
        while step.should_step() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(step.interpolation_alpha() > 0.4 && step.interpolation_alpha() < 0.6);
    }

    #[test]
    fn long_frames_are_capped() {
        let mut step = FixedStep::new(0.125);
        step.advance(10.0);
        let mut count = 0;
        while step.should_step() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
