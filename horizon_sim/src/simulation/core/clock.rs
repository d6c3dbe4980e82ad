// horizon_sim/src/simulation/core/clock.rs

use std::thread;
use std::time::{Duration, Instant};

/// Maps simulated seconds onto wall-clock time, scaled by a real-time factor.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    start: Instant,
    realtime_factor: f64,
}

impl SimClock {
    pub fn start(realtime_factor: f64) -> Self {
        Self {
            start: Instant::now(),
            realtime_factor,
        }
    }

    /// Simulated seconds elapsed so far.
    pub fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * self.realtime_factor
    }

    /// Wall-clock time corresponding to `sim_seconds` of simulated time.
    pub fn wall_duration(&self, sim_seconds: f64) -> Duration {
        Duration::from_secs_f64((sim_seconds / self.realtime_factor).max(0.0))
    }

    /// Blocks until the simulated clock reaches `sim_time`.
    pub fn sleep_until(&self, sim_time: f64) {
        let deadline = self.start + self.wall_duration(sim_time);
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}
