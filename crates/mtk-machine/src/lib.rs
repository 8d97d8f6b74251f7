#![forbid(unsafe_code)]

//! MT6765 machine: wires the watchdog, system timer, efuse table and placeholder windows onto a
//! physical MMIO bus, routes their interrupt outputs into the GIC SPI table and drives their
//! deadlines from a deterministic virtual clock.
//!
//! The machine never runs guest code. Callers issue MMIO accesses and advance virtual time;
//! every deadline that falls inside an advance is dispatched in order, at its own timestamp.

pub mod bus;
pub mod config;
pub mod gic;
pub mod memmap;

use mtk_devices::socinfo::SOCINFO_MMIO_SIZE;
use mtk_devices::systimer::SYST_MMIO_SIZE;
use mtk_devices::watchdog::WDT_MMIO_SIZE;
use mtk_devices::{DeviceTimer, MtkSocinfo, MtkSystimer, MtkWatchdog, SocVariant, StubDevice};
use mtk_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use mtk_platform::mmio::MmioWindow;
use mtk_platform::reset::ResetLatch;
use mtk_platform::time::{Clock, TickRate, TimerEvent, TimerQueue};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use bus::{Device, DeviceKind, MappedDevice, MmioBus};
pub use config::{MachineConfig, WatchdogAction};
pub use gic::{GicSpiLines, SpiLine};

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("system timer tick rate must be non-zero")]
    ZeroTickRate,

    #[error("{device} SPI {spi} is out of range (GIC has {limit} SPIs)")]
    SpiOutOfRange {
        device: &'static str,
        spi: u32,
        limit: u32,
    },

    #[error("SPI {spi} is assigned to more than one device")]
    SpiConflict { spi: u32 },

    #[error("MMIO window for {name} is empty")]
    EmptyWindow { name: &'static str },

    #[error("MMIO window for {second} overlaps {first}")]
    OverlappingWindows {
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid machine config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{device} snapshot: {source}")]
    Snapshot {
        device: &'static str,
        #[source]
        source: SnapshotError,
    },

    #[error("snapshot is missing the {0} state")]
    MissingDeviceState(&'static str),
}

pub type MachineResult<T> = Result<T, MachineError>;

/// Whether [`Machine::advance_to`] may keep dispatching deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Stopped by [`WatchdogAction::Pause`]; [`Machine::resume`] continues.
    Paused,
    /// Stopped by [`WatchdogAction::Shutdown`]; only [`Machine::reset`] recovers.
    ShutDown,
}

const MACHINE_SNAPSHOT_ID: [u8; 4] = *b"MTKM";
const MACHINE_SNAPSHOT_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

const TAG_CLOCK_NS: u16 = 1;
const TAG_WATCHDOG: u16 = 2;
const TAG_SYSTIMER: u16 = 3;

pub struct Machine {
    cfg: MachineConfig,
    clock: Clock,
    timers: TimerQueue<DeviceTimer>,
    bus: MmioBus,
    gic: GicSpiLines,
    reset_latch: ResetLatch,
    reset_count: u64,
    run_state: RunState,
}

impl Machine {
    pub fn new(cfg: MachineConfig) -> MachineResult<Self> {
        cfg.validate()?;

        let gic = GicSpiLines::new();
        let reset_latch = ResetLatch::new();
        let mut bus = MmioBus::new();

        let wdt = MtkWatchdog::new(
            Box::new(gic.line(cfg.wdt_spi)),
            Box::new(reset_latch.clone()),
        );
        bus.map(
            "watchdog",
            MmioWindow::new(cfg.wdt_base, WDT_MMIO_SIZE),
            Device::Watchdog(wdt),
        )?;

        let systimer = MtkSystimer::with_rate(
            Box::new(gic.line(cfg.systimer_spi)),
            TickRate::new(cfg.systimer_tick_hz),
        );
        bus.map(
            "systimer",
            MmioWindow::new(cfg.systimer_base, SYST_MMIO_SIZE),
            Device::Systimer(systimer),
        )?;

        bus.map(
            "topckgen",
            MmioWindow::new(cfg.topckgen_base, memmap::TOPCKGEN_SIZE),
            Device::Stub(StubDevice::clock_tree("topckgen", memmap::TOPCKGEN_SIZE)),
        )?;

        if let Some(base) = cfg.socinfo_base {
            bus.map(
                "socinfo",
                MmioWindow::new(base, SOCINFO_MMIO_SIZE),
                Device::Socinfo(MtkSocinfo::new(Some(SocVariant::Mt6765))),
            )?;
        }

        if cfg.map_unimplemented {
            for region in memmap::UNIMPLEMENTED_REGIONS {
                bus.map(
                    region.name,
                    MmioWindow::new(region.base, region.size),
                    Device::Stub(StubDevice::unimplemented(region.name, region.size)),
                )?;
            }
        }

        debug!(devices = bus.devices().count(), "machine: bus populated");

        Ok(Self {
            cfg,
            clock: Clock::new(),
            timers: TimerQueue::new(),
            bus,
            gic,
            reset_latch,
            reset_count: 0,
            run_state: RunState::Running,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.cfg
    }

    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Number of watchdog-initiated resets applied so far.
    pub fn reset_count(&self) -> u64 {
        self.reset_count
    }

    pub fn gic(&self) -> &GicSpiLines {
        &self.gic
    }

    pub fn bus(&self) -> &MmioBus {
        &self.bus
    }

    pub fn watchdog(&self) -> Option<&MtkWatchdog> {
        self.bus.watchdog()
    }

    pub fn systimer(&self) -> Option<&MtkSystimer> {
        self.bus.systimer()
    }

    pub fn next_deadline_ns(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn mmio_read(&self, addr: u64, size: usize) -> u64 {
        self.bus.read(addr, size)
    }

    pub fn mmio_write(&mut self, addr: u64, size: usize, value: u64) {
        let now = self.clock.now_ns();
        self.bus.write(addr, size, value, now, &mut self.timers);
        self.service_reset_request();
    }

    /// Advances virtual time to `target_ns`, dispatching every deadline on the way.
    ///
    /// Stops early, with the clock at the offending deadline, if a watchdog action halts the
    /// machine. Targets in the past only dispatch what is already due.
    pub fn advance_to(&mut self, target_ns: u64) -> RunState {
        while self.run_state == RunState::Running {
            let Some(event) = self.timers.pop_due(target_ns) else {
                self.clock.advance_to(target_ns);
                break;
            };
            self.clock.advance_to(event.deadline_ns);
            self.dispatch(&event);
            self.service_reset_request();
        }
        self.run_state
    }

    pub fn advance_by(&mut self, delta_ns: u64) -> RunState {
        let target = self.clock.now_ns().saturating_add(delta_ns);
        self.advance_to(target)
    }

    /// Leaves [`RunState::Paused`]. Has no effect in any other state.
    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            info!("machine: resuming");
            self.run_state = RunState::Running;
        }
    }

    /// Returns every device to its power-on state and resumes running.
    ///
    /// Virtual time keeps going; only device state is reset.
    pub fn reset(&mut self) {
        self.bus.reset(&mut self.timers);
        self.reset_latch.clear();
        self.run_state = RunState::Running;
        debug!(now_ns = self.clock.now_ns(), "machine: devices reset");
    }

    /// Serializes the virtual clock plus watchdog and system timer state.
    pub fn save_devices(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(MACHINE_SNAPSHOT_ID, MACHINE_SNAPSHOT_VERSION);
        w.field_u64(TAG_CLOCK_NS, self.clock.now_ns());
        if let Some(wdt) = self.bus.watchdog() {
            w.field_bytes(TAG_WATCHDOG, wdt.save_state());
        }
        if let Some(syst) = self.bus.systimer() {
            w.field_bytes(TAG_SYSTIMER, syst.save_state());
        }
        w.finish()
    }

    /// Restores state written by [`Machine::save_devices`] and re-arms every stored deadline.
    ///
    /// On error the machine may be partially restored and should be reset.
    pub fn load_devices(&mut self, bytes: &[u8]) -> MachineResult<()> {
        let machine_err = |source: SnapshotError| MachineError::Snapshot {
            device: "machine",
            source,
        };
        let r = SnapshotReader::parse(bytes, MACHINE_SNAPSHOT_ID).map_err(machine_err)?;
        r.ensure_device_major(MACHINE_SNAPSHOT_VERSION.major)
            .map_err(machine_err)?;
        let now_ns = r.u64(TAG_CLOCK_NS).map_err(machine_err)?.unwrap_or(0);
        let wdt_state = r
            .bytes(TAG_WATCHDOG)
            .ok_or(MachineError::MissingDeviceState("watchdog"))?;
        let syst_state = r
            .bytes(TAG_SYSTIMER)
            .ok_or(MachineError::MissingDeviceState("systimer"))?;

        if let Some(wdt) = self.bus.watchdog_mut() {
            wdt.load_state(wdt_state)
                .map_err(|source| MachineError::Snapshot {
                    device: "watchdog",
                    source,
                })?;
        }
        if let Some(syst) = self.bus.systimer_mut() {
            syst.load_state(syst_state)
                .map_err(|source| MachineError::Snapshot {
                    device: "systimer",
                    source,
                })?;
        }

        self.clock.set_now_ns(now_ns);
        self.reset_latch.clear();
        self.run_state = RunState::Running;
        if let Some(wdt) = self.bus.watchdog_mut() {
            wdt.restore_timers(&mut self.timers);
            wdt.sync_irq_level();
        }
        if let Some(syst) = self.bus.systimer_mut() {
            syst.restore_timers(&mut self.timers);
            syst.sync_irq_level();
        }
        info!(now_ns, "machine: device state restored");
        Ok(())
    }

    fn dispatch(&mut self, event: &TimerEvent<DeviceTimer>) {
        match event.payload {
            DeviceTimer::WatchdogPrimary | DeviceTimer::WatchdogPretimeout => {
                if let Some(wdt) = self.bus.watchdog_mut() {
                    wdt.handle_timer_event(event, &mut self.timers);
                }
            }
            DeviceTimer::Systimer => {
                if let Some(syst) = self.bus.systimer_mut() {
                    syst.handle_timer_event(event);
                }
            }
        }
    }

    fn service_reset_request(&mut self) {
        let Some(kind) = self.reset_latch.take() else {
            return;
        };
        let now_ns = self.clock.now_ns();
        match self.cfg.watchdog_action {
            WatchdogAction::Reset => {
                self.reset_count += 1;
                info!(?kind, now_ns, count = self.reset_count, "machine: watchdog reset");
                self.reset();
            }
            WatchdogAction::Shutdown => {
                warn!(?kind, now_ns, "machine: watchdog expired, shutting down");
                self.run_state = RunState::ShutDown;
            }
            WatchdogAction::Pause => {
                warn!(?kind, now_ns, "machine: watchdog expired, pausing");
                self.run_state = RunState::Paused;
            }
            WatchdogAction::None => {
                warn!(?kind, now_ns, "machine: watchdog expired, no action configured");
            }
        }
    }
}
