//! MT6765 physical address map and interrupt numbering.

pub const GIC_DIST_BASE: u64 = 0x0C00_0000;
pub const GIC_REDIST_BASE: u64 = 0x0C10_0000;
pub const TOPCKGEN_BASE: u64 = 0x1000_0000;
pub const PERICFG_BASE: u64 = 0x1000_3000;
pub const WDT_BASE: u64 = 0x1000_7000;
pub const SYSTIMER_BASE: u64 = 0x1001_7000;
pub const UART0_BASE: u64 = 0x1100_2000;
pub const UART1_BASE: u64 = 0x1100_3000;
pub const SOCINFO_BASE: u64 = 0x11F1_0000;
pub const SDRAM_BASE: u64 = 0x4000_0000;

pub const TOPCKGEN_SIZE: u64 = 0x1000;

/// Number of shared peripheral interrupts wired into the distributor.
pub const GIC_SPI_COUNT: u32 = 288;

pub const SPI_UART0: u32 = 91;
pub const SPI_UART1: u32 = 92;
pub const SPI_SYSTIMER: u32 = 113;
pub const SPI_WDT: u32 = 139;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnimplementedRegion {
    pub name: &'static str,
    pub base: u64,
    pub size: u64,
}

const fn region(name: &'static str, base: u64, size: u64) -> UnimplementedRegion {
    UnimplementedRegion { name, base, size }
}

/// Blocks the kernel touches during bring-up that have no model.
pub const UNIMPLEMENTED_REGIONS: &[UnimplementedRegion] = &[
    region("apmixed", 0x1000_C000, 0x1000),
    region("infracfg", 0x1000_1000, 0x1000),
    region("pericfg", PERICFG_BASE, 0x1000),
    region("pinctrl_iocfg0", 0x1000_5000, 0x1000),
    region("pinctrl_iocfg1", 0x1000_2C00, 0x200),
    region("pinctrl_iocfg2", 0x1000_2800, 0x200),
    region("pinctrl_iocfg3", 0x1000_2A00, 0x200),
    region("pinctrl_iocfg4", 0x1000_2000, 0x200),
    region("pinctrl_iocfg5", 0x1000_2200, 0x200),
    region("pinctrl_iocfg6", 0x1000_2400, 0x200),
    region("pinctrl_iocfg7", 0x1000_2600, 0x200),
    region("pinctrl_eint", 0x1000_B000, 0x1000),
    region("scpsys", 0x1000_6000, 0x1000),
    region("sysirq", 0x1020_0A80, 0x50),
];

#[cfg(test)]
mod tests {
    use super::*;
    use mtk_platform::mmio::MmioWindow;

    #[test]
    fn unimplemented_regions_do_not_overlap() {
        for (i, a) in UNIMPLEMENTED_REGIONS.iter().enumerate() {
            let wa = MmioWindow::new(a.base, a.size);
            for b in &UNIMPLEMENTED_REGIONS[i + 1..] {
                assert!(
                    !wa.overlaps(&MmioWindow::new(b.base, b.size)),
                    "{} overlaps {}",
                    a.name,
                    b.name
                );
            }
        }
    }
}
