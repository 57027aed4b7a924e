use std::time::{Duration, Instant};

/// Session time in seconds, and a way to wait.
pub trait Timer {
    fn now(&self) -> f64;
    fn sleep(&mut self, seconds: f64);
}

/// Wall-clock timer measuring from a shared epoch, so event stamps from the
/// device gateway and scheduler times agree.
#[derive(Copy, Clone, Debug)]
pub struct WallTimer {
    epoch: Instant,
}

impl WallTimer {
    pub fn new(epoch: Instant) -> Self {
        WallTimer { epoch }
    }
}

impl Timer for WallTimer {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn sleep(&mut self, seconds: f64) {
        if seconds > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(seconds));
        }
    }
}
