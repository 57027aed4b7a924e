//! Loop clock: where we are inside the current cycle, when a cycle ends, and
//! how far the actual cycle starts have wandered from the ideal ones.

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Advance {
    /// Seconds since the start of the current cycle, after any rollover.
    pub elapsed: f64,
    pub rolled_over: bool,
    pub drift: Option<DriftReport>,
}

/// Drift measured over two horizons. A steady cumulative number points at
/// clock skew, a jumpy windowed one at scheduler stalls.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriftReport {
    pub cycles: u64,
    /// Seconds late since the very first cycle.
    pub cumulative: f64,
    /// Seconds late over the last `window` cycles.
    pub windowed: f64,
    pub window: u64,
}

#[derive(Clone, Debug)]
pub struct LoopClock {
    length: f64,
    epsilon: f64,
    drift_every: u64,
    loop_start: f64,
    last_fired: f64,
    cycles: u64,
    first_cycle: f64,
    drift_window_start: f64,
}

impl LoopClock {
    pub fn new(now: f64, length: f64, epsilon: f64, drift_every: u64) -> Self {
        LoopClock {
            length,
            epsilon,
            drift_every: drift_every.max(1),
            loop_start: now,
            last_fired: 0.0,
            cycles: 0,
            first_cycle: now,
            drift_window_start: now,
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    pub fn last_fired(&self) -> f64 {
        self.last_fired
    }

    pub fn loop_start(&self) -> f64 {
        self.loop_start
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.loop_start
    }

    /// Where a session time falls in the loop: its offset into a cycle and
    /// which cycle that is. Times within `epsilon` of a cycle's end belong to
    /// the next cycle at offset 0, since that is where the rollover puts them.
    /// Times before the current cycle belong to an earlier one.
    pub fn position_of(&self, time: f64) -> (f64, u64) {
        let elapsed = time - self.loop_start;
        let whole = ((elapsed + self.epsilon) / self.length).floor();
        let offset = (elapsed - whole * self.length).max(0.0);
        let cycle = (self.cycles as i64).saturating_add(whole as i64).max(0);
        (offset, cycle as u64)
    }

    pub fn rolls_over_at(&self, now: f64) -> bool {
        self.elapsed(now) >= self.length - self.epsilon
    }

    pub fn mark_fired(&mut self, offset: f64) {
        self.last_fired = self.last_fired.max(offset);
    }

    pub fn advance(&mut self, now: f64) -> Advance {
        if !self.rolls_over_at(now) {
            return Advance {
                elapsed: self.elapsed(now),
                rolled_over: false,
                drift: None,
            };
        }
        self.loop_start = now;
        self.last_fired = 0.0;
        self.cycles += 1;

        let drift = if self.cycles % self.drift_every == 0 {
            let report = DriftReport {
                cycles: self.cycles,
                cumulative: now - self.first_cycle - self.cycles as f64 * self.length,
                windowed: now - self.drift_window_start - self.drift_every as f64 * self.length,
                window: self.drift_every,
            };
            self.drift_window_start = now;
            Some(report)
        } else {
            None
        };
        Advance {
            elapsed: 0.0,
            rolled_over: true,
            drift,
        }
    }

    /// Start over from `now`, forgetting cycle count and drift history.
    pub fn restart(&mut self, now: f64) {
        *self = LoopClock::new(now, self.length, self.epsilon, self.drift_every);
    }
}
