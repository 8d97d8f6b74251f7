use std::collections::{BTreeMap, HashMap};

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Handle for a scheduled deadline.
///
/// Ids are never reused within one queue, so a device can safely compare an incoming
/// [`TimerEvent::id`] against the id it is holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent<T> {
    pub id: TimerId,
    pub deadline_ns: u64,
    pub payload: T,
}

/// One-shot deadline queue keyed by virtual time.
///
/// Events with the same deadline are delivered in scheduling order.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    next_id: u64,
    pending: BTreeMap<(u64, TimerId), T>,
    deadlines: HashMap<TimerId, u64>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, deadline_ns: u64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((deadline_ns, id), payload);
        self.deadlines.insert(id, deadline_ns);
        id
    }

    /// Cancels a pending deadline.
    ///
    /// Returns `false` if the id already fired or was canceled; that case is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let Some(deadline_ns) = self.deadlines.remove(&id) else {
            return false;
        };
        self.pending.remove(&(deadline_ns, id));
        true
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(deadline_ns, _)| deadline_ns)
    }

    /// Removes and returns the earliest event whose deadline is `<= now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<TimerEvent<T>> {
        let &(deadline_ns, id) = self.pending.keys().next()?;
        if deadline_ns > now_ns {
            return None;
        }
        let payload = self.pending.remove(&(deadline_ns, id))?;
        self.deadlines.remove(&id);
        Some(TimerEvent {
            id,
            deadline_ns,
            payload,
        })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }
}

/// Fixed-frequency tick source used to convert device tick counts to virtual nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    hz: u64,
}

impl TickRate {
    /// # Panics
    ///
    /// Panics if `hz` is zero.
    pub const fn new(hz: u64) -> Self {
        assert!(hz != 0, "tick rate must be non-zero");
        Self { hz }
    }

    pub const fn hz(&self) -> u64 {
        self.hz
    }

    /// Converts a tick count to nanoseconds, rounding up so a deadline never fires early.
    pub fn ns_from_ticks_ceil(&self, ticks: u64) -> u64 {
        let numer = (ticks as u128) * (NANOS_PER_SEC as u128);
        let denom = self.hz as u128;
        let ns = numer.div_ceil(denom);
        u64::try_from(ns).unwrap_or(u64::MAX)
    }
}
