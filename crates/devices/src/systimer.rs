//! MT6765 system timer (CPUXGPT-style one-shot compare).
//!
//! Two 32-bit registers inside a 4 KiB window:
//! - `0x40` `SYST_CLOCK`: bit 0 enable, bit 1 IRQ enable, bit 4 IRQ clear (command).
//! - `0x44` `SYST_TICKS`: absolute compare value in 13 MHz ticks. Only honored while enabled.
//!
//! Nothing reads back; every read returns zero.

use bitflags::bitflags;
use mtk_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};
use mtk_platform::irq::{IrqLine, NoIrq};
use mtk_platform::mmio::RegisterMap;
use mtk_platform::time::{TickRate, TimerEvent, TimerId, TimerQueue};
use tracing::{debug, info, warn};

use crate::DeviceTimer;

pub const SYST_MMIO_SIZE: u64 = 0x1000;

/// Counter frequency of the MT6765 system timer.
pub const SYST_TICK_HZ: u64 = 13_000_000;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystClock: u32 {
        const ENABLE = 1 << 0;
        const IRQ_ENABLE = 1 << 1;
        const IRQ_CLEAR = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystReg {
    Clock,
    Ticks,
}

const SYST_REGS: RegisterMap<SystReg> =
    RegisterMap::new(4, &[(0x40, SystReg::Clock), (0x44, SystReg::Ticks)]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystimerState {
    Disabled,
    /// Enabled, but no compare value written since.
    WaitingForTicks,
    Counting,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at_ns: u64,
    timer: Option<TimerId>,
}

pub struct MtkSystimer {
    rate: TickRate,
    enabled: bool,
    deadline: Option<Deadline>,
    irq_level: bool,
    irq: Box<dyn IrqLine>,
    orphaned: Vec<TimerId>,
}

impl MtkSystimer {
    pub fn new(irq: Box<dyn IrqLine>) -> Self {
        Self::with_rate(irq, TickRate::new(SYST_TICK_HZ))
    }

    pub fn with_rate(irq: Box<dyn IrqLine>, rate: TickRate) -> Self {
        Self {
            rate,
            enabled: false,
            deadline: None,
            irq_level: false,
            irq,
            orphaned: Vec::new(),
        }
    }

    pub fn detached() -> Self {
        Self::new(Box::new(NoIrq))
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    pub fn state(&self) -> SystimerState {
        match (self.enabled, self.deadline) {
            (false, _) => SystimerState::Disabled,
            (true, None) => SystimerState::WaitingForTicks,
            (true, Some(_)) => SystimerState::Counting,
        }
    }

    pub fn deadline_ns(&self) -> Option<u64> {
        self.deadline.map(|d| d.at_ns)
    }

    pub fn irq_level(&self) -> bool {
        self.irq_level
    }

    pub fn mmio_read(&self, offset: u64, size: usize) -> u64 {
        match SYST_REGS.decode(offset, size) {
            Ok(reg) => debug!(?reg, "systimer: register is write-only, reading 0"),
            Err(err) => warn!(%err, "systimer: rejected read"),
        }
        0
    }

    pub fn mmio_write(
        &mut self,
        offset: u64,
        size: usize,
        value: u64,
        queue: &mut TimerQueue<DeviceTimer>,
    ) {
        let value = value as u32;
        match SYST_REGS.decode(offset, size) {
            Ok(SystReg::Clock) => self.write_clock(SystClock::from_bits_truncate(value), queue),
            Ok(SystReg::Ticks) => self.write_ticks(value, queue),
            Err(err) => warn!(%err, value, "systimer: rejected write"),
        }
    }

    pub fn reset(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        self.cancel_deadline(queue);
        for id in self.orphaned.drain(..) {
            queue.cancel(id);
        }
        self.enabled = false;
        self.set_irq(false);
    }

    pub fn handle_timer_event(&mut self, event: &TimerEvent<DeviceTimer>) {
        let owned = self.deadline.and_then(|d| d.timer) == Some(event.id);
        if event.payload != DeviceTimer::Systimer || !owned {
            return;
        }
        self.deadline = None;
        info!(at_ns = event.deadline_ns, "systimer: compare reached, raising interrupt");
        self.set_irq(true);
    }

    /// Re-arms the deadline restored by [`IoSnapshot::load_state`].
    pub fn restore_timers(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        for id in self.orphaned.drain(..) {
            queue.cancel(id);
        }
        if let Some(d) = self.deadline.as_mut() {
            if let Some(id) = d.timer.take() {
                queue.cancel(id);
            }
            d.timer = Some(queue.schedule(d.at_ns, DeviceTimer::Systimer));
        }
    }

    pub fn sync_irq_level(&self) {
        self.irq.set_level(self.irq_level);
    }

    fn write_clock(&mut self, bits: SystClock, queue: &mut TimerQueue<DeviceTimer>) {
        if bits.contains(SystClock::IRQ_CLEAR) {
            debug!("systimer: clearing interrupt");
            self.set_irq(false);
        }

        let enable = bits.contains(SystClock::ENABLE);
        match (self.enabled, enable) {
            (false, true) => {
                self.enabled = true;
                debug!("systimer: enabled, waiting for compare value");
            }
            (true, false) => {
                self.enabled = false;
                self.cancel_deadline(queue);
                debug!("systimer: disabled");
            }
            _ => {}
        }
    }

    fn write_ticks(&mut self, ticks: u32, queue: &mut TimerQueue<DeviceTimer>) {
        if !self.enabled {
            debug!(ticks, "systimer: compare write while disabled ignored");
            return;
        }
        self.cancel_deadline(queue);
        let at_ns = self.rate.ns_from_ticks_ceil(u64::from(ticks));
        let id = queue.schedule(at_ns, DeviceTimer::Systimer);
        self.deadline = Some(Deadline {
            at_ns,
            timer: Some(id),
        });
        debug!(ticks, at_ns, "systimer: compare armed");
    }

    fn cancel_deadline(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        if let Some(id) = self.deadline.take().and_then(|d| d.timer) {
            queue.cancel(id);
        }
    }

    fn set_irq(&mut self, level: bool) {
        if self.irq_level == level {
            return;
        }
        self.irq_level = level;
        self.irq.set_level(level);
    }
}

impl IoSnapshot for MtkSystimer {
    const DEVICE_ID: [u8; 4] = *b"MSYT";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        const TAG_ENABLED: u16 = 1;
        const TAG_DEADLINE: u16 = 2;
        const TAG_IRQ_LEVEL: u16 = 3;

        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bool(TAG_ENABLED, self.enabled);
        if let Some(d) = self.deadline {
            w.field_u64(TAG_DEADLINE, d.at_ns);
        }
        w.field_bool(TAG_IRQ_LEVEL, self.irq_level);
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        const TAG_ENABLED: u16 = 1;
        const TAG_DEADLINE: u16 = 2;
        const TAG_IRQ_LEVEL: u16 = 3;

        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;

        let enabled = r.bool(TAG_ENABLED)?.unwrap_or(false);
        let deadline = r.u64(TAG_DEADLINE)?;
        if !enabled && deadline.is_some() {
            return Err(SnapshotError::InvalidFieldEncoding(
                "systimer deadline pending while disabled",
            ));
        }
        let irq_level = r.bool(TAG_IRQ_LEVEL)?.unwrap_or(false);

        if let Some(id) = self.deadline.take().and_then(|d| d.timer) {
            self.orphaned.push(id);
        }
        self.enabled = enabled;
        self.deadline = deadline.map(|at_ns| Deadline { at_ns, timer: None });
        self.irq_level = irq_level;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtk_platform::time::NANOS_PER_SEC;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingIrq(Rc<RefCell<Vec<bool>>>);

    impl IrqLine for RecordingIrq {
        fn set_level(&self, level: bool) {
            self.0.borrow_mut().push(level);
        }
    }

    const CLOCK: u64 = 0x40;
    const TICKS: u64 = 0x44;

    #[test]
    fn ticks_while_disabled_are_dropped() {
        let mut q = TimerQueue::new();
        let mut t = MtkSystimer::detached();
        t.mmio_write(TICKS, 4, 1000, &mut q);
        assert_eq!(t.state(), SystimerState::Disabled);
        assert!(q.is_empty());
    }

    #[test]
    fn enable_then_ticks_counts() {
        let mut q = TimerQueue::new();
        let mut t = MtkSystimer::detached();
        t.mmio_write(CLOCK, 4, 1, &mut q);
        assert_eq!(t.state(), SystimerState::WaitingForTicks);
        assert!(q.is_empty());

        t.mmio_write(TICKS, 4, 13_000_000, &mut q);
        assert_eq!(t.state(), SystimerState::Counting);
        assert_eq!(t.deadline_ns(), Some(NANOS_PER_SEC));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn second_ticks_write_replaces_deadline() {
        let mut q = TimerQueue::new();
        let mut t = MtkSystimer::detached();
        t.mmio_write(CLOCK, 4, 1, &mut q);
        t.mmio_write(TICKS, 4, 13_000_000, &mut q);
        t.mmio_write(TICKS, 4, 26_000_000, &mut q);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_deadline(), Some(2 * NANOS_PER_SEC));
    }

    #[test]
    fn disable_cancels() {
        let mut q = TimerQueue::new();
        let mut t = MtkSystimer::detached();
        t.mmio_write(CLOCK, 4, 1, &mut q);
        t.mmio_write(TICKS, 4, 100, &mut q);
        t.mmio_write(CLOCK, 4, 0, &mut q);
        assert_eq!(t.state(), SystimerState::Disabled);
        assert!(q.is_empty());
    }

    #[test]
    fn expiry_raises_once_and_returns_to_waiting() {
        let irq = RecordingIrq::default();
        let mut q = TimerQueue::new();
        let mut t = MtkSystimer::new(Box::new(irq.clone()));
        t.mmio_write(CLOCK, 4, 0b11, &mut q);
        t.mmio_write(TICKS, 4, 13, &mut q);

        let ev = q.pop_due(1_000).unwrap();
        t.handle_timer_event(&ev);
        t.handle_timer_event(&ev);
        assert_eq!(t.state(), SystimerState::WaitingForTicks);
        assert_eq!(*irq.0.borrow(), vec![true]);

        let clear_and_keep = (SystClock::ENABLE | SystClock::IRQ_CLEAR).bits();
        t.mmio_write(CLOCK, 4, u64::from(clear_and_keep), &mut q);
        t.mmio_write(CLOCK, 4, u64::from(SystClock::IRQ_CLEAR.bits()), &mut q);
        assert_eq!(*irq.0.borrow(), vec![true, false]);
        assert_eq!(t.state(), SystimerState::Disabled);
    }

    #[test]
    fn reads_are_zero_and_bad_widths_dropped() {
        let mut q = TimerQueue::new();
        let mut t = MtkSystimer::detached();
        t.mmio_write(CLOCK, 2, 1, &mut q);
        assert_eq!(t.state(), SystimerState::Disabled);
        t.mmio_write(CLOCK, 4, 1, &mut q);
        assert_eq!(t.mmio_read(CLOCK, 4), 0);
        assert_eq!(t.mmio_read(TICKS, 4), 0);
        assert_eq!(t.mmio_read(0x00, 4), 0);
    }

    #[test]
    fn snapshot_rejects_deadline_while_disabled() {
        let mut w = SnapshotWriter::new(*b"MSYT", SnapshotVersion::new(1, 0));
        w.field_bool(1, false);
        w.field_u64(2, 5);
        let bytes = w.finish();
        let mut t = MtkSystimer::detached();
        assert!(matches!(
            t.load_state(&bytes),
            Err(SnapshotError::InvalidFieldEncoding(_))
        ));
    }
}
