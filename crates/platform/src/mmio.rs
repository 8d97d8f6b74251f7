//! Register decoding shared by the SoC peripheral models.
//!
//! Each device declares a closed table mapping word offsets to its logical registers. Decoding
//! never has side effects: the device decides what to do with a failed decode (log and treat as
//! a no-op, in every current model).

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterAccessError {
    #[error("unsupported {size}-byte access at offset {offset:#x} (device takes {expected}-byte accesses)")]
    UnsupportedWidth {
        offset: u64,
        size: usize,
        expected: usize,
    },

    #[error("no register at offset {offset:#x}")]
    Unmapped { offset: u64 },
}

/// Closed offset -> register lookup table for one device.
#[derive(Debug, Clone, Copy)]
pub struct RegisterMap<R: 'static> {
    access_size: usize,
    registers: &'static [(u64, R)],
}

impl<R: Copy + 'static> RegisterMap<R> {
    pub const fn new(access_size: usize, registers: &'static [(u64, R)]) -> Self {
        Self {
            access_size,
            registers,
        }
    }

    /// Resolves `(offset, size)` to exactly one register.
    ///
    /// The access width is checked before the offset, so a narrow access to a mapped register
    /// still reports [`RegisterAccessError::UnsupportedWidth`].
    pub fn decode(&self, offset: u64, size: usize) -> Result<R, RegisterAccessError> {
        if size != self.access_size {
            return Err(RegisterAccessError::UnsupportedWidth {
                offset,
                size,
                expected: self.access_size,
            });
        }
        self.registers
            .iter()
            .find(|(reg_offset, _)| *reg_offset == offset)
            .map(|&(_, reg)| reg)
            .ok_or(RegisterAccessError::Unmapped { offset })
    }
}

/// A guest-physical MMIO window `[base, base + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioWindow {
    pub base: u64,
    pub size: u64,
}

impl MmioWindow {
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    pub fn end_exclusive(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end_exclusive()
    }

    pub fn overlaps(&self, other: &MmioWindow) -> bool {
        self.base < other.end_exclusive() && other.base < self.end_exclusive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Reg {
        Ctrl,
        Data,
    }

    const MAP: RegisterMap<Reg> = RegisterMap::new(4, &[(0x00, Reg::Ctrl), (0x08, Reg::Data)]);

    #[test]
    fn decodes_mapped_offsets() {
        assert_eq!(MAP.decode(0x00, 4), Ok(Reg::Ctrl));
        assert_eq!(MAP.decode(0x08, 4), Ok(Reg::Data));
    }

    #[test]
    fn width_is_checked_first() {
        assert_eq!(
            MAP.decode(0x00, 1),
            Err(RegisterAccessError::UnsupportedWidth {
                offset: 0,
                size: 1,
                expected: 4
            })
        );
        assert!(matches!(
            MAP.decode(0x0c, 8),
            Err(RegisterAccessError::UnsupportedWidth { .. })
        ));
    }

    #[test]
    fn holes_are_unmapped() {
        assert_eq!(
            MAP.decode(0x04, 4),
            Err(RegisterAccessError::Unmapped { offset: 0x04 })
        );
        assert_eq!(
            MAP.decode(0x02, 4),
            Err(RegisterAccessError::Unmapped { offset: 0x02 })
        );
    }

    #[test]
    fn window_geometry() {
        let a = MmioWindow::new(0x1000_7000, 0x1000);
        let b = MmioWindow::new(0x1000_8000, 0x1000);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&MmioWindow::new(0x1000_7FFC, 4)));
        assert!(a.contains(0x1000_7FFF));
        assert!(!a.contains(0x1000_8000));
    }
}
