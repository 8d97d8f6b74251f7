use serde::{Deserialize, Serialize};

use crate::memmap;
use crate::MachineError;

/// What the machine does when the watchdog's reset output fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogAction {
    /// Reset every device and keep running.
    #[default]
    Reset,
    /// Stop the run loop for good.
    Shutdown,
    /// Stop the run loop until [`crate::Machine::resume`].
    Pause,
    /// Log the expiry and carry on.
    None,
}

/// Static machine configuration.
///
/// Every field has a default matching the stock MT6765 layout, so a JSON config only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    pub wdt_base: u64,
    pub wdt_spi: u32,
    pub systimer_base: u64,
    pub systimer_spi: u32,
    /// System timer counter frequency. Must be non-zero.
    pub systimer_tick_hz: u64,
    pub topckgen_base: u64,
    /// Base of the efuse socinfo window, or `None` to leave it unmapped.
    pub socinfo_base: Option<u64>,
    /// Map the placeholder windows listed in [`memmap::UNIMPLEMENTED_REGIONS`].
    pub map_unimplemented: bool,
    pub watchdog_action: WatchdogAction,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            wdt_base: memmap::WDT_BASE,
            wdt_spi: memmap::SPI_WDT,
            systimer_base: memmap::SYSTIMER_BASE,
            systimer_spi: memmap::SPI_SYSTIMER,
            systimer_tick_hz: mtk_devices::systimer::SYST_TICK_HZ,
            topckgen_base: memmap::TOPCKGEN_BASE,
            socinfo_base: Some(memmap::SOCINFO_BASE),
            map_unimplemented: true,
            watchdog_action: WatchdogAction::Reset,
        }
    }
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, MachineError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String, MachineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the settings that [`crate::Machine::new`] cannot recover from.
    ///
    /// Window overlaps are detected when the bus is populated.
    pub fn validate(&self) -> Result<(), MachineError> {
        if self.systimer_tick_hz == 0 {
            return Err(MachineError::ZeroTickRate);
        }
        for (device, spi) in [("watchdog", self.wdt_spi), ("systimer", self.systimer_spi)] {
            if spi >= memmap::GIC_SPI_COUNT {
                return Err(MachineError::SpiOutOfRange {
                    device,
                    spi,
                    limit: memmap::GIC_SPI_COUNT,
                });
            }
        }
        if self.wdt_spi == self.systimer_spi {
            return Err(MachineError::SpiConflict { spi: self.wdt_spi });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_matches_mt6765() {
        let cfg = MachineConfig::default();
        assert_eq!(cfg.wdt_base, 0x1000_7000);
        assert_eq!(cfg.systimer_base, 0x1001_7000);
        assert_eq!(cfg.wdt_spi, 139);
        assert_eq!(cfg.systimer_tick_hz, 13_000_000);
        assert_eq!(cfg.watchdog_action, WatchdogAction::Reset);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg =
            MachineConfig::from_json(r#"{ "watchdog_action": "pause", "socinfo_base": null }"#)
                .unwrap();
        assert_eq!(cfg.watchdog_action, WatchdogAction::Pause);
        assert_eq!(cfg.socinfo_base, None);
        assert_eq!(cfg.wdt_base, memmap::WDT_BASE);
    }

    #[test]
    fn json_round_trips() {
        let cfg = MachineConfig {
            map_unimplemented: false,
            watchdog_action: WatchdogAction::None,
            ..MachineConfig::default()
        };
        let json = cfg.to_json().unwrap();
        assert_eq!(MachineConfig::from_json(&json).unwrap(), cfg);
    }

    #[test]
    fn rejects_bad_settings() {
        let zero = MachineConfig {
            systimer_tick_hz: 0,
            ..MachineConfig::default()
        };
        assert!(matches!(zero.validate(), Err(MachineError::ZeroTickRate)));

        let spi = MachineConfig {
            wdt_spi: 288,
            ..MachineConfig::default()
        };
        assert!(matches!(
            spi.validate(),
            Err(MachineError::SpiOutOfRange { spi: 288, .. })
        ));

        let shared = MachineConfig {
            systimer_spi: memmap::SPI_WDT,
            ..MachineConfig::default()
        };
        assert!(matches!(
            shared.validate(),
            Err(MachineError::SpiConflict { .. })
        ));

        assert!(matches!(
            MachineConfig::from_json(r#"{ "wdt_bsae": 0 }"#),
            Err(MachineError::Config(_))
        ));
    }
}
