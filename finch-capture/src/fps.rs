use std::time::{Duration, Instant};

/// Exponentially-smoothed frame-rate estimate sampled over a fixed
/// window: `fps_{n+1} = alpha * fps_n + (1 - alpha) * measured`, with
/// `measured` recomputed once per `period`.
pub struct FrameRateMonitor {
    alpha: f64,
    period: Duration,
    window_start: Instant,
    count_in_window: u64,
    latest_fps: f64,
}

impl FrameRateMonitor {
    pub fn new(period: Duration, alpha: f64) -> Self {
        FrameRateMonitor {
            alpha,
            period,
            window_start: Instant::now(),
            count_in_window: 0,
            latest_fps: 0.0,
        }
    }

    pub fn standard() -> Self {
        FrameRateMonitor::new(Duration::from_secs(1), 0.8)
    }

    /// Call once per observed frame. Recomputes the smoothed rate at
    /// most once per `period`.
    pub fn tick(&mut self) {
        self.count_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.period {
            let measured = self.count_in_window as f64 / elapsed.as_secs_f64();
            self.latest_fps = self.alpha * self.latest_fps + (1.0 - self.alpha) * measured;
            self.count_in_window = 0;
            self.window_start = Instant::now();
        }
    }

    pub fn fps(&self) -> f64 {
        self.latest_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_toward_steady_rate() {
        let mut monitor = FrameRateMonitor::new(Duration::from_millis(1), 0.5);
        for _ in 0..50 {
            monitor.tick();
            std::thread::sleep(Duration::from_micros(500));
        }
        assert!(monitor.fps() > 0.0);
    }

    #[test]
    fn starts_at_zero() {
        let monitor = FrameRateMonitor::standard();
        assert_eq!(monitor.fps(), 0.0);
    }
}
