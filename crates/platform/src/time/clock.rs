#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Clock {
    now_ns: u64,
}

impl Clock {
    pub const fn new() -> Self {
        Self { now_ns: 0 }
    }

    /// Returns the current monotonic virtual time, in nanoseconds.
    #[inline]
    pub const fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Advances the clock by `ns` nanoseconds, saturating at `u64::MAX` (~584 years).
    #[inline]
    pub fn advance(&mut self, ns: u64) {
        self.now_ns = self.now_ns.saturating_add(ns);
    }

    /// Moves the clock forward to `target_ns`. Targets in the past are ignored.
    #[inline]
    pub fn advance_to(&mut self, target_ns: u64) {
        self.now_ns = self.now_ns.max(target_ns);
    }

    /// Sets the current time, intended for save/restore.
    ///
    /// This may move time backwards; callers must ensure pending deadlines are re-armed
    /// consistently with the restored time.
    #[inline]
    pub fn set_now_ns(&mut self, now_ns: u64) {
        self.now_ns = now_ns;
    }

    #[inline]
    pub const fn save_state(&self) -> ClockState {
        ClockState {
            now_ns: self.now_ns,
        }
    }

    #[inline]
    pub fn restore_state(&mut self, state: ClockState) {
        self.now_ns = state.now_ns;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockState {
    pub now_ns: u64,
}
