//! Read-only efuse window the MediaTek kernel probes for the SoC segment/revision.

use mtk_platform::mmio::{RegisterAccessError, RegisterMap};
use tracing::{trace, warn};

pub const SOCINFO_MMIO_SIZE: u64 = 0x1_0000;

/// Value of every cell the variant does not define.
pub const CELL_UNUSED: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocVariant {
    Mt6765,
}

impl SocVariant {
    fn cells(self) -> &'static RegisterMap<u32> {
        match self {
            SocVariant::Mt6765 => &MT6765_CELLS,
        }
    }
}

const MT6765_CELLS: RegisterMap<u32> = RegisterMap::new(
    4,
    &[
        (0x4c, 0x2),
        (0x4d, 0x0),
        (0x4e, 0x19),
        (0x4f, 0x0),
        (0x60, 0x2),
        (0x61, 0x0),
        (0x62, 0x0),
        (0x63, 0x0),
    ],
);

#[derive(Debug, Clone)]
pub struct MtkSocinfo {
    variant: Option<SocVariant>,
}

impl MtkSocinfo {
    /// `None` models an unconfigured part: every cell reads as [`CELL_UNUSED`].
    pub fn new(variant: Option<SocVariant>) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> Option<SocVariant> {
        self.variant
    }

    pub fn mmio_read(&self, offset: u64, size: usize) -> u64 {
        let Some(variant) = self.variant else {
            return u64::from(CELL_UNUSED);
        };
        match variant.cells().decode(offset, size) {
            Ok(value) => u64::from(value),
            Err(RegisterAccessError::Unmapped { .. }) => {
                trace!(offset, "socinfo: unused cell");
                u64::from(CELL_UNUSED)
            }
            Err(err) => {
                warn!(%err, "socinfo: rejected read");
                u64::from(CELL_UNUSED)
            }
        }
    }

    pub fn mmio_write(&self, offset: u64, size: usize, value: u64) {
        warn!(offset, size, value, "socinfo: illegal write to efuse window");
    }
}
