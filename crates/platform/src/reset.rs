use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

/// Reset request kind emitted by SoC peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Reset the CPU cluster while leaving peripheral state intact.
    Cpu,
    /// Full system reset (CPUs + peripherals), as asserted by the watchdog's reset output.
    System,
}

/// Platform-level sink for reset requests coming from peripherals (e.g. the watchdog).
///
/// Peripherals must not tear down the machine from inside a deadline handler or an MMIO
/// access; they report the request here and the machine loop applies it once the current
/// event has been fully dispatched.
pub trait PlatformResetSink {
    fn request_reset(&mut self, kind: ResetKind);
}

impl<F> PlatformResetSink for F
where
    F: FnMut(ResetKind),
{
    fn request_reset(&mut self, kind: ResetKind) {
        self(kind);
    }
}

/// Cloneable single-slot reset request latch bridging device requests into the machine loop.
///
/// If several requests arrive before the loop consumes the latch, [`ResetKind::System`] wins
/// over [`ResetKind::Cpu`].
#[derive(Debug, Clone, Default)]
pub struct ResetLatch {
    pending: Rc<Cell<Option<ResetKind>>>,
}

impl ResetLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending request without clearing it.
    pub fn peek(&self) -> Option<ResetKind> {
        self.pending.get()
    }

    /// Takes and clears the pending request.
    pub fn take(&self) -> Option<ResetKind> {
        self.pending.take()
    }

    pub fn clear(&self) {
        self.pending.set(None);
    }

    fn set_pending(&self, kind: ResetKind) {
        let next = match (self.pending.get(), kind) {
            (Some(ResetKind::System), _) | (_, ResetKind::System) => ResetKind::System,
            _ => ResetKind::Cpu,
        };
        debug!(requested = ?kind, pending = ?next, "reset request latched");
        self.pending.set(Some(next));
    }
}

impl PlatformResetSink for ResetLatch {
    fn request_reset(&mut self, kind: ResetKind) {
        self.set_pending(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_request_wins_over_cpu() {
        let latch = ResetLatch::new();
        let mut sink = latch.clone();
        sink.request_reset(ResetKind::System);
        sink.request_reset(ResetKind::Cpu);
        assert_eq!(latch.peek(), Some(ResetKind::System));
        assert_eq!(latch.take(), Some(ResetKind::System));
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen: Vec<ResetKind> = Vec::new();
        {
            let mut sink = |kind: ResetKind| seen.push(kind);
            sink.request_reset(ResetKind::Cpu);
        }
        assert_eq!(seen, vec![ResetKind::Cpu]);
    }
}
