//! Register windows that exist on the bus but model nothing.
//!
//! Reads return zero and writes are dropped; every access is logged with the window name so
//! a guest poking at an unmodeled block shows up in the trace.

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubFlavor {
    /// Clock-tree controller placeholder (topckgen). Only 4-byte accesses are valid.
    ClockTree,
    /// Any other unmodeled block. Accepts every width.
    Unimplemented,
}

#[derive(Debug, Clone)]
pub struct StubDevice {
    name: &'static str,
    size: u64,
    flavor: StubFlavor,
}

impl StubDevice {
    pub fn clock_tree(name: &'static str, size: u64) -> Self {
        Self {
            name,
            size,
            flavor: StubFlavor::ClockTree,
        }
    }

    pub fn unimplemented(name: &'static str, size: u64) -> Self {
        Self {
            name,
            size,
            flavor: StubFlavor::Unimplemented,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn flavor(&self) -> StubFlavor {
        self.flavor
    }

    pub fn mmio_read(&self, offset: u64, size: usize) -> u64 {
        match self.flavor {
            StubFlavor::ClockTree => {
                warn!(device = self.name, offset, size, "clk: bad read");
            }
            StubFlavor::Unimplemented => {
                debug!(device = self.name, offset, size, "unimplemented device read");
            }
        }
        0
    }

    pub fn mmio_write(&self, offset: u64, size: usize, value: u64) {
        match self.flavor {
            StubFlavor::ClockTree => {
                warn!(device = self.name, offset, size, value, "clk: bad write");
            }
            StubFlavor::Unimplemented => {
                debug!(device = self.name, offset, size, value, "unimplemented device write");
            }
        }
    }
}
