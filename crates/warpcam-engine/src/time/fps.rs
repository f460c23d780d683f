use std::time::{Duration, Instant};

/// Counts presented frames and reports the rate once per elapsed second.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    period: Duration,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            period: Duration::from_secs(1),
        }
    }

    /// Records one frame at `now`.
    ///
    /// Returns the measured rate when at least one period has passed since
    /// the last report, then starts a new measurement window.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.period {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_second() {
        let t0 = Instant::now();
        let mut meter = FpsMeter::new(t0);
        let frame = Duration::from_millis(20);

        let reports: Vec<f64> = (1..=100)
            .filter_map(|i| meter.tick(t0 + frame * i))
            .collect();

        assert_eq!(reports.len(), 2);
        assert!((reports[0] - 50.0).abs() < 1e-9);
        assert!((reports[1] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn slow_frames_still_report() {
        let t0 = Instant::now();
        let mut meter = FpsMeter::new(t0);
        let fps = meter.tick(t0 + Duration::from_secs(2)).unwrap();
        assert!((fps - 0.5).abs() < 1e-9);
    }
}
