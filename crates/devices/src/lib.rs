#![forbid(unsafe_code)]

//! MT6765 peripheral models: watchdog (TOPRGU), system timer, socinfo efuse cells and
//! register-stub windows.

pub mod socinfo;
pub mod stub;
pub mod systimer;
pub mod watchdog;

pub use socinfo::{MtkSocinfo, SocVariant};
pub use stub::{StubDevice, StubFlavor};
pub use systimer::{MtkSystimer, SystimerState};
pub use watchdog::{MtkWatchdog, WatchdogState, WdtMode};

/// Deadline tags scheduled on the platform [`mtk_platform::time::TimerQueue`].
///
/// The machine loop routes each fired tag back to the device that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceTimer {
    /// Watchdog reset deadline.
    WatchdogPrimary,
    /// Watchdog interrupt-stage deadline (dual mode only).
    WatchdogPretimeout,
    Systimer,
}
