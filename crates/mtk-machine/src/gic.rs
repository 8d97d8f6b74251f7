//! Level-tracking view of the GIC's shared peripheral interrupt inputs.
//!
//! Distribution, priority and affinity are out of scope: the machine only records which SPI
//! lines peripherals are driving, and how many rising edges each has seen.

use std::cell::RefCell;
use std::rc::Rc;

use mtk_platform::irq::IrqLine;
use tracing::trace;

use crate::memmap::GIC_SPI_COUNT;

#[derive(Debug)]
struct SpiState {
    levels: Vec<bool>,
    rising_edges: Vec<u64>,
}

/// Shared SPI input table. Cloning yields another handle to the same table.
#[derive(Debug, Clone)]
pub struct GicSpiLines {
    inner: Rc<RefCell<SpiState>>,
}

impl Default for GicSpiLines {
    fn default() -> Self {
        Self::new()
    }
}

impl GicSpiLines {
    pub fn new() -> Self {
        let n = GIC_SPI_COUNT as usize;
        Self {
            inner: Rc::new(RefCell::new(SpiState {
                levels: vec![false; n],
                rising_edges: vec![0; n],
            })),
        }
    }

    /// Returns the input for `spi`. Out-of-range numbers yield a line that drives nothing.
    pub fn line(&self, spi: u32) -> SpiLine {
        SpiLine {
            table: self.clone(),
            spi,
        }
    }

    pub fn level(&self, spi: u32) -> bool {
        self.inner
            .borrow()
            .levels
            .get(spi as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn rising_edges(&self, spi: u32) -> u64 {
        self.inner
            .borrow()
            .rising_edges
            .get(spi as usize)
            .copied()
            .unwrap_or(0)
    }

    /// SPIs currently held high, ascending.
    pub fn asserted(&self) -> Vec<u32> {
        self.inner
            .borrow()
            .levels
            .iter()
            .enumerate()
            .filter(|(_, &level)| level)
            .map(|(spi, _)| spi as u32)
            .collect()
    }

    fn set(&self, spi: u32, level: bool) {
        let mut state = self.inner.borrow_mut();
        let idx = spi as usize;
        let Some(slot) = state.levels.get_mut(idx) else {
            return;
        };
        let rising = level && !*slot;
        *slot = level;
        if rising {
            state.rising_edges[idx] += 1;
        }
        trace!(spi, level, "gic: spi level");
    }
}

/// One SPI input, handed to a peripheral as its interrupt output.
#[derive(Debug, Clone)]
pub struct SpiLine {
    table: GicSpiLines,
    spi: u32,
}

impl SpiLine {
    pub fn spi(&self) -> u32 {
        self.spi
    }
}

impl IrqLine for SpiLine {
    fn set_level(&self, level: bool) {
        self.table.set(self.spi, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_share_one_table() {
        let gic = GicSpiLines::new();
        let wdt = gic.line(139);
        wdt.set_level(true);
        wdt.set_level(true);
        assert!(gic.level(139));
        assert_eq!(gic.rising_edges(139), 1);
        assert_eq!(gic.asserted(), vec![139]);

        wdt.set_level(false);
        wdt.set_level(true);
        assert_eq!(gic.rising_edges(139), 2);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let gic = GicSpiLines::new();
        gic.line(GIC_SPI_COUNT).set_level(true);
        assert!(!gic.level(GIC_SPI_COUNT));
        assert!(gic.asserted().is_empty());
    }
}
