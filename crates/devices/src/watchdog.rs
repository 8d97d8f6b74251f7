//! MediaTek TOPRGU watchdog.
//!
//! Register block (4-byte accesses only, offsets relative to the window base):
//! - `0x00` `WDT_MODE`: enable / IRQ / dual-stage / count-select bits. Writes need
//!   [`WDT_MODE_KEY`] in bits 24..31, except for [`WdtMode::IRQ_CLEAR`] which always applies.
//! - `0x04` `WDT_LENGTH`: timeout. Writes need [`WDT_LENGTH_KEY`]; whole seconds live above
//!   bit 10 (`(raw >> 6) >> 5`).
//! - `0x08` `WDT_RESTART`: writing [`WDT_RESTART_KEY`] in the low half kicks the watchdog.
//! - `0x14`, `0x18`, `0xFC`: software reset controls, logged as unimplemented.
//!
//! Timing: with IRQ or dual mode selected, the interrupt fires after `T` seconds and the
//! system reset after `2T`; otherwise only the reset fires, after `T`. Deadlines are counted
//! from the enabling write or the last kick, never from earlier.
//!
//! Only `WDT_MODE` reads back; every other register reads as zero.

use bitflags::bitflags;
use mtk_io_snapshot::io::state::codec::{Decoder, Encoder};
use mtk_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};
use mtk_platform::irq::{IrqLine, NoIrq};
use mtk_platform::mmio::RegisterMap;
use mtk_platform::reset::{PlatformResetSink, ResetKind};
use mtk_platform::time::{TimerEvent, TimerId, TimerQueue, NANOS_PER_SEC};
use tracing::{debug, info, warn};

use crate::DeviceTimer;

/// The register block decodes 0x100 bytes but is mapped in a 4 KiB window.
pub const WDT_MMIO_SIZE: u64 = 0x1000;

pub const WDT_MODE_KEY: u32 = 0x2200_0000;
const WDT_MODE_KEY_MASK: u32 = 0xFF00_0000;
pub const WDT_LENGTH_KEY: u32 = 0x8;
pub const WDT_RESTART_KEY: u32 = 0x1971;

/// `(raw >> 6) >> 5`.
const WDT_LENGTH_SECS_SHIFT: u32 = 6 + 5;

/// Timeout programmed at reset, in whole seconds.
pub const WDT_DEFAULT_TIMEOUT_SECS: u32 = 31;
const WDT_DEFAULT_LENGTH: u32 = WDT_DEFAULT_TIMEOUT_SECS << WDT_LENGTH_SECS_SHIFT;

const WDT_NUM_REGS: usize = 6;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WdtMode: u32 {
        const ENABLE = 1 << 0;
        const IRQ_ENABLE = 1 << 3;
        /// Write-only command bit: lowers the watchdog interrupt.
        const IRQ_CLEAR = 1 << 4;
        const DUAL_ENABLE = 1 << 6;
        const CNT_SEL = 1 << 8;
    }
}

impl WdtMode {
    /// Bits latched into the mode register by a keyed write.
    const STORED: Self = Self::ENABLE
        .union(Self::IRQ_ENABLE)
        .union(Self::DUAL_ENABLE)
        .union(Self::CNT_SEL);

    fn dual_stage(self) -> bool {
        self.intersects(Self::IRQ_ENABLE | Self::DUAL_ENABLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WdtReg {
    Mode,
    Length,
    Restart,
    SwRst,
    SwSysRst,
    SwSysRstEn,
}

impl WdtReg {
    fn index(self) -> usize {
        match self {
            WdtReg::Mode => 0,
            WdtReg::Length => 1,
            WdtReg::Restart => 2,
            WdtReg::SwRst => 3,
            WdtReg::SwSysRst => 4,
            WdtReg::SwSysRstEn => 5,
        }
    }
}

const WDT_REGS: RegisterMap<WdtReg> = RegisterMap::new(
    4,
    &[
        (0x00, WdtReg::Mode),
        (0x04, WdtReg::Length),
        (0x08, WdtReg::Restart),
        (0x14, WdtReg::SwRst),
        (0x18, WdtReg::SwSysRst),
        (0xFC, WdtReg::SwSysRstEn),
    ],
);

/// Decodes a raw `WDT_LENGTH` value to whole seconds.
pub fn decode_timeout_secs(raw: u32) -> u32 {
    (raw >> 6) >> 5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Disabled,
    Armed,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at_ns: u64,
    /// `None` between a snapshot load and [`MtkWatchdog::restore_timers`].
    timer: Option<TimerId>,
}

pub struct MtkWatchdog {
    regs: [u32; WDT_NUM_REGS],
    pretimeout_secs: u32,
    primary: Option<Deadline>,
    pretimeout: Option<Deadline>,
    irq_level: bool,
    irq: Box<dyn IrqLine>,
    reset_sink: Box<dyn PlatformResetSink>,
    orphaned: Vec<TimerId>,
}

impl MtkWatchdog {
    pub fn new(irq: Box<dyn IrqLine>, reset_sink: Box<dyn PlatformResetSink>) -> Self {
        let mut wdt = Self {
            regs: [0; WDT_NUM_REGS],
            pretimeout_secs: 0,
            primary: None,
            pretimeout: None,
            irq_level: false,
            irq,
            reset_sink,
            orphaned: Vec::new(),
        };
        wdt.load_reset_values();
        wdt
    }

    /// Watchdog with no interrupt wiring whose reset requests are discarded.
    pub fn detached() -> Self {
        Self::new(Box::new(NoIrq), Box::new(|_kind: ResetKind| {}))
    }

    pub fn state(&self) -> WatchdogState {
        if self.mode().contains(WdtMode::ENABLE) {
            WatchdogState::Armed
        } else {
            WatchdogState::Disabled
        }
    }

    pub fn mode(&self) -> WdtMode {
        WdtMode::from_bits_truncate(self.regs[WdtReg::Mode.index()])
    }

    pub fn timeout_raw(&self) -> u32 {
        self.regs[WdtReg::Length.index()]
    }

    pub fn pretimeout_secs(&self) -> u32 {
        self.pretimeout_secs
    }

    pub fn primary_deadline_ns(&self) -> Option<u64> {
        self.primary.map(|d| d.at_ns)
    }

    pub fn pretimeout_deadline_ns(&self) -> Option<u64> {
        self.pretimeout.map(|d| d.at_ns)
    }

    pub fn irq_level(&self) -> bool {
        self.irq_level
    }

    pub fn mmio_read(&self, offset: u64, size: usize) -> u64 {
        match WDT_REGS.decode(offset, size) {
            Ok(WdtReg::Mode) => u64::from(self.regs[WdtReg::Mode.index()]),
            Ok(reg) => {
                warn!(offset, ?reg, "wdt: read of unimplemented register");
                0
            }
            Err(err) => {
                warn!(%err, "wdt: rejected read");
                0
            }
        }
    }

    pub fn mmio_write(
        &mut self,
        offset: u64,
        size: usize,
        value: u64,
        now_ns: u64,
        queue: &mut TimerQueue<DeviceTimer>,
    ) {
        let value = value as u32;
        match WDT_REGS.decode(offset, size) {
            Ok(WdtReg::Mode) => self.write_mode(value, now_ns, queue),
            Ok(WdtReg::Length) => self.write_length(value),
            Ok(WdtReg::Restart) => {
                if value & 0xFFFF == WDT_RESTART_KEY {
                    self.kick(now_ns, queue);
                } else {
                    debug!(value, "wdt: restart write without key ignored");
                }
            }
            Ok(reg) => {
                warn!(offset, ?reg, value, "wdt: write to unimplemented register");
            }
            Err(err) => {
                warn!(%err, value, "wdt: rejected write");
            }
        }
    }

    /// Returns to the quiescent reset state, canceling any pending deadline.
    pub fn reset(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        self.cancel_deadlines(queue);
        for id in self.orphaned.drain(..) {
            queue.cancel(id);
        }
        self.load_reset_values();
        self.set_irq(false);
    }

    /// Dispatches a fired deadline. Events this watchdog no longer owns are ignored.
    pub fn handle_timer_event(
        &mut self,
        event: &TimerEvent<DeviceTimer>,
        queue: &mut TimerQueue<DeviceTimer>,
    ) {
        match event.payload {
            DeviceTimer::WatchdogPretimeout => {
                if !owns(self.pretimeout, event.id) {
                    return;
                }
                self.pretimeout = None;
                info!(at_ns = event.deadline_ns, "wdt: pretimeout expired, raising interrupt");
                self.set_irq(true);
            }
            DeviceTimer::WatchdogPrimary => {
                if !owns(self.primary, event.id) {
                    return;
                }
                self.primary = None;
                warn!(at_ns = event.deadline_ns, "wdt: timer expired, requesting system reset");
                self.reset_sink.request_reset(ResetKind::System);
                self.cancel_deadlines(queue);
            }
            DeviceTimer::Systimer => {}
        }
    }

    /// Re-arms deadlines restored by [`IoSnapshot::load_state`].
    ///
    /// Deadlines that lie before `now_ns` fire on the next queue poll.
    pub fn restore_timers(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        for id in self.orphaned.drain(..) {
            queue.cancel(id);
        }
        if let Some(d) = self.pretimeout.as_mut() {
            if let Some(id) = d.timer.take() {
                queue.cancel(id);
            }
            d.timer = Some(queue.schedule(d.at_ns, DeviceTimer::WatchdogPretimeout));
        }
        if let Some(d) = self.primary.as_mut() {
            if let Some(id) = d.timer.take() {
                queue.cancel(id);
            }
            d.timer = Some(queue.schedule(d.at_ns, DeviceTimer::WatchdogPrimary));
        }
    }

    /// Re-drives the interrupt line from the latched level, e.g. after a snapshot restore.
    pub fn sync_irq_level(&self) {
        self.irq.set_level(self.irq_level);
    }

    fn load_reset_values(&mut self) {
        self.regs = [0; WDT_NUM_REGS];
        self.regs[WdtReg::Length.index()] = WDT_DEFAULT_LENGTH;
        self.update_pretimeout();
    }

    fn write_mode(&mut self, value: u32, now_ns: u64, queue: &mut TimerQueue<DeviceTimer>) {
        let bits = WdtMode::from_bits_truncate(value);
        if bits.contains(WdtMode::IRQ_CLEAR) {
            debug!("wdt: clearing interrupt");
            self.set_irq(false);
        }

        if value & WDT_MODE_KEY_MASK != WDT_MODE_KEY {
            debug!(value, "wdt: mode write without key ignored");
            return;
        }

        let was_enabled = self.mode().contains(WdtMode::ENABLE);
        let mode = bits & WdtMode::STORED;
        self.regs[WdtReg::Mode.index()] = mode.bits();
        self.update_pretimeout();

        let enabled = mode.contains(WdtMode::ENABLE);
        match (was_enabled, enabled) {
            (false, true) => self.arm(now_ns, queue),
            (true, false) => self.cancel_deadlines(queue),
            _ => {}
        }

        debug!(
            enabled,
            irq = mode.contains(WdtMode::IRQ_ENABLE),
            dual = mode.contains(WdtMode::DUAL_ENABLE),
            "wdt: mode updated"
        );
    }

    fn write_length(&mut self, value: u32) {
        if value & WDT_LENGTH_KEY == 0 {
            debug!(value, "wdt: length write without key ignored");
            return;
        }
        self.regs[WdtReg::Length.index()] = value;
        self.update_pretimeout();
        debug!(
            secs = decode_timeout_secs(value),
            "wdt: timeout updated (takes effect on next kick)"
        );
    }

    fn kick(&mut self, now_ns: u64, queue: &mut TimerQueue<DeviceTimer>) {
        if !self.mode().contains(WdtMode::ENABLE) {
            debug!("wdt: kick while disabled ignored");
            return;
        }
        self.arm(now_ns, queue);
    }

    fn update_pretimeout(&mut self) {
        self.pretimeout_secs = if self.mode().dual_stage() {
            decode_timeout_secs(self.timeout_raw())
        } else {
            0
        };
    }

    /// (Re)schedules both deadlines from `now_ns` using the current configuration.
    fn arm(&mut self, now_ns: u64, queue: &mut TimerQueue<DeviceTimer>) {
        self.cancel_deadlines(queue);

        let secs = u64::from(decode_timeout_secs(self.timeout_raw()));
        let dual = self.mode().dual_stage();
        let reset_secs = if dual { secs * 2 } else { secs };

        if dual {
            let at_ns = deadline_after_secs(now_ns, u64::from(self.pretimeout_secs));
            let id = queue.schedule(at_ns, DeviceTimer::WatchdogPretimeout);
            self.pretimeout = Some(Deadline {
                at_ns,
                timer: Some(id),
            });
        }

        let at_ns = deadline_after_secs(now_ns, reset_secs);
        let id = queue.schedule(at_ns, DeviceTimer::WatchdogPrimary);
        self.primary = Some(Deadline {
            at_ns,
            timer: Some(id),
        });

        debug!(reset_secs, dual, now_ns, "wdt: armed");
    }

    fn cancel_deadlines(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        for deadline in [self.primary.take(), self.pretimeout.take()]
            .into_iter()
            .flatten()
        {
            if let Some(id) = deadline.timer {
                queue.cancel(id);
            }
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

fn owns(deadline: Option<Deadline>, id: TimerId) -> bool {
    deadline.and_then(|d| d.timer) == Some(id)
}

fn deadline_after_secs(now_ns: u64, secs: u64) -> u64 {
    now_ns.saturating_add(secs.saturating_mul(NANOS_PER_SEC))
}

impl IoSnapshot for MtkWatchdog {
    const DEVICE_ID: [u8; 4] = *b"MWDT";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        const TAG_REGS: u16 = 1;
        const TAG_PRETIMEOUT_SECS: u16 = 2;
        const TAG_PRIMARY_DEADLINE: u16 = 3;
        const TAG_PRETIMEOUT_DEADLINE: u16 = 4;
        const TAG_IRQ_LEVEL: u16 = 5;

        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);

        let mut enc = Encoder::new().u32(WDT_NUM_REGS as u32);
        for reg in self.regs {
            enc = enc.u32(reg);
        }
        w.field_bytes(TAG_REGS, enc.finish());
        w.field_u32(TAG_PRETIMEOUT_SECS, self.pretimeout_secs);
        if let Some(d) = self.primary {
            w.field_u64(TAG_PRIMARY_DEADLINE, d.at_ns);
        }
        if let Some(d) = self.pretimeout {
            w.field_u64(TAG_PRETIMEOUT_DEADLINE, d.at_ns);
        }
        w.field_bool(TAG_IRQ_LEVEL, self.irq_level);

        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        const TAG_REGS: u16 = 1;
        const TAG_PRETIMEOUT_SECS: u16 = 2;
        const TAG_PRIMARY_DEADLINE: u16 = 3;
        const TAG_PRETIMEOUT_DEADLINE: u16 = 4;
        const TAG_IRQ_LEVEL: u16 = 5;

        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;

        let mut regs = [0u32; WDT_NUM_REGS];
        regs[WdtReg::Length.index()] = WDT_DEFAULT_LENGTH;
        if let Some(buf) = r.bytes(TAG_REGS) {
            let mut d = Decoder::new(buf);
            let count = d.u32()? as usize;
            if count != WDT_NUM_REGS {
                return Err(SnapshotError::InvalidFieldEncoding("wdt register count"));
            }
            for reg in regs.iter_mut() {
                *reg = d.u32()?;
            }
            d.finish()?;
        }
        regs[WdtReg::Mode.index()] &= WdtMode::STORED.bits();

        let mode = WdtMode::from_bits_truncate(regs[WdtReg::Mode.index()]);
        let primary = r.u64(TAG_PRIMARY_DEADLINE)?;
        let pretimeout = r.u64(TAG_PRETIMEOUT_DEADLINE)?;
        if !mode.contains(WdtMode::ENABLE) && (primary.is_some() || pretimeout.is_some()) {
            return Err(SnapshotError::InvalidFieldEncoding(
                "wdt deadline pending while disabled",
            ));
        }
        if pretimeout.is_some() && !mode.dual_stage() {
            return Err(SnapshotError::InvalidFieldEncoding(
                "wdt interrupt stage pending outside dual mode",
            ));
        }
        if pretimeout.is_some() && primary.is_none() {
            return Err(SnapshotError::InvalidFieldEncoding(
                "wdt interrupt stage pending without a reset stage",
            ));
        }
        let pretimeout_secs = r.u32(TAG_PRETIMEOUT_SECS)?;
        let irq_level = r.bool(TAG_IRQ_LEVEL)?.unwrap_or(false);

        // Nothing below can fail.
        // Deadlines scheduled before the load are stale; `restore_timers` cancels them.
        for d in [self.primary.take(), self.pretimeout.take()]
            .into_iter()
            .flatten()
        {
            self.orphaned.extend(d.timer);
        }

        self.regs = regs;
        self.update_pretimeout();
        if let Some(secs) = pretimeout_secs {
            self.pretimeout_secs = secs;
        }
        self.primary = primary.map(|at_ns| Deadline { at_ns, timer: None });
        self.pretimeout = pretimeout.map(|at_ns| Deadline { at_ns, timer: None });
        self.irq_level = irq_level;

        Ok(())
    }
}
