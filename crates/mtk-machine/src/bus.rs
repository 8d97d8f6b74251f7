//! Physical MMIO routing for the peripherals the machine models.

use mtk_devices::{DeviceTimer, MtkSocinfo, MtkSystimer, MtkWatchdog, StubDevice, StubFlavor};
use mtk_platform::mmio::MmioWindow;
use mtk_platform::time::TimerQueue;
use tracing::warn;

use crate::MachineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Watchdog,
    Systimer,
    Socinfo,
    ClockTree,
    Unimplemented,
}

pub enum Device {
    Watchdog(MtkWatchdog),
    Systimer(MtkSystimer),
    Socinfo(MtkSocinfo),
    Stub(StubDevice),
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Watchdog(_) => DeviceKind::Watchdog,
            Device::Systimer(_) => DeviceKind::Systimer,
            Device::Socinfo(_) => DeviceKind::Socinfo,
            Device::Stub(stub) => match stub.flavor() {
                StubFlavor::ClockTree => DeviceKind::ClockTree,
                StubFlavor::Unimplemented => DeviceKind::Unimplemented,
            },
        }
    }

    fn mmio_read(&self, offset: u64, size: usize) -> u64 {
        match self {
            Device::Watchdog(wdt) => wdt.mmio_read(offset, size),
            Device::Systimer(syst) => syst.mmio_read(offset, size),
            Device::Socinfo(soc) => soc.mmio_read(offset, size),
            Device::Stub(stub) => stub.mmio_read(offset, size),
        }
    }

    fn mmio_write(
        &mut self,
        offset: u64,
        size: usize,
        value: u64,
        now_ns: u64,
        timers: &mut TimerQueue<DeviceTimer>,
    ) {
        match self {
            Device::Watchdog(wdt) => wdt.mmio_write(offset, size, value, now_ns, timers),
            Device::Systimer(syst) => syst.mmio_write(offset, size, value, timers),
            Device::Socinfo(soc) => soc.mmio_write(offset, size, value),
            Device::Stub(stub) => stub.mmio_write(offset, size, value),
        }
    }

    fn reset(&mut self, timers: &mut TimerQueue<DeviceTimer>) {
        match self {
            Device::Watchdog(wdt) => wdt.reset(timers),
            Device::Systimer(syst) => syst.reset(timers),
            Device::Socinfo(_) | Device::Stub(_) => {}
        }
    }
}

pub struct MappedDevice {
    pub name: &'static str,
    pub window: MmioWindow,
    pub device: Device,
}

/// Non-overlapping device windows, kept sorted by base address.
#[derive(Default)]
pub struct MmioBus {
    devices: Vec<MappedDevice>,
}

impl MmioBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(
        &mut self,
        name: &'static str,
        window: MmioWindow,
        device: Device,
    ) -> Result<(), MachineError> {
        if window.size == 0 {
            return Err(MachineError::EmptyWindow { name });
        }
        if let Some(other) = self.devices.iter().find(|d| d.window.overlaps(&window)) {
            return Err(MachineError::OverlappingWindows {
                first: other.name,
                second: name,
            });
        }
        let idx = self
            .devices
            .partition_point(|d| d.window.base < window.base);
        self.devices.insert(
            idx,
            MappedDevice {
                name,
                window,
                device,
            },
        );
        Ok(())
    }

    pub fn devices(&self) -> impl Iterator<Item = &MappedDevice> {
        self.devices.iter()
    }

    pub fn find(&self, addr: u64) -> Option<&MappedDevice> {
        let idx = self.devices.partition_point(|d| d.window.base <= addr);
        let candidate = self.devices.get(idx.checked_sub(1)?)?;
        candidate.window.contains(addr).then_some(candidate)
    }

    fn find_mut(&mut self, addr: u64) -> Option<&mut MappedDevice> {
        let idx = self.devices.partition_point(|d| d.window.base <= addr);
        let candidate = self.devices.get_mut(idx.checked_sub(1)?)?;
        if candidate.window.contains(addr) {
            Some(candidate)
        } else {
            None
        }
    }

    pub fn read(&self, addr: u64, size: usize) -> u64 {
        match self.find(addr) {
            Some(mapped) => mapped.device.mmio_read(addr - mapped.window.base, size),
            None => {
                warn!(addr, size, "bus: read from unmapped address");
                0
            }
        }
    }

    pub fn write(
        &mut self,
        addr: u64,
        size: usize,
        value: u64,
        now_ns: u64,
        timers: &mut TimerQueue<DeviceTimer>,
    ) {
        match self.find_mut(addr) {
            Some(mapped) => {
                let offset = addr - mapped.window.base;
                mapped.device.mmio_write(offset, size, value, now_ns, timers);
            }
            None => warn!(addr, size, value, "bus: write to unmapped address"),
        }
    }

    pub fn reset(&mut self, timers: &mut TimerQueue<DeviceTimer>) {
        for mapped in &mut self.devices {
            mapped.device.reset(timers);
        }
    }

    pub fn watchdog(&self) -> Option<&MtkWatchdog> {
        self.devices.iter().find_map(|d| match &d.device {
            Device::Watchdog(wdt) => Some(wdt),
            _ => None,
        })
    }

    pub fn watchdog_mut(&mut self) -> Option<&mut MtkWatchdog> {
        self.devices.iter_mut().find_map(|d| match &mut d.device {
            Device::Watchdog(wdt) => Some(wdt),
            _ => None,
        })
    }

    pub fn systimer(&self) -> Option<&MtkSystimer> {
        self.devices.iter().find_map(|d| match &d.device {
            Device::Systimer(syst) => Some(syst),
            _ => None,
        })
    }

    pub fn systimer_mut(&mut self) -> Option<&mut MtkSystimer> {
        self.devices.iter_mut().find_map(|d| match &mut d.device {
            Device::Systimer(syst) => Some(syst),
            _ => None,
        })
    }
}
