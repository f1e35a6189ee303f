//! OAM DMA trigger register.
//!
//! The actual 160-byte copy is performed by the MMU (it's the only
//! component that can read the full address space and write into the
//! PPU's OAM buffer); this module only tracks the register state. Per
//! the resolution of the corresponding open question (see DESIGN.md),
//! the transfer is modeled as instantaneous at the M-cycle the trigger
//! write lands on rather than spanning 160 M-cycles of blocked CPU
//! access.

use std::fmt::{self, Display, Formatter};

use crate::{consts::DMA_ADDR, mmu::BusComponent, warnln};

pub struct Dma {
    value_dma: u8,
    active_dma: bool,
}

impl Dma {
    pub fn new() -> Self {
        Self {
            value_dma: 0x0,
            active_dma: false,
        }
    }

    pub fn reset(&mut self) {
        self.value_dma = 0x0;
        self.active_dma = false;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DMA_ADDR => self.value_dma,
            _ => {
                warnln!("Reading from unknown DMA location 0x{:04x}", addr);
                0xff
            }
        }
    }

    /// Records the trigger value. Returns the source address the MMU
    /// should copy 160 bytes from (`value << 8`).
    pub fn write(&mut self, addr: u16, value: u8) -> Option<u16> {
        match addr {
            DMA_ADDR => {
                self.value_dma = value;
                self.active_dma = true;
                Some((value as u16) << 8)
            }
            _ => {
                warnln!("Writing to unknown DMA location 0x{:04x}", addr);
                None
            }
        }
    }

    pub fn value_dma(&self) -> u8 {
        self.value_dma
    }

    pub fn active_dma(&self) -> bool {
        self.active_dma
    }

    /// Clears the in-progress flag; called by the MMU right after the
    /// (instantaneous) copy completes.
    pub fn finish(&mut self) {
        self.active_dma = false;
    }

    pub fn description(&self) -> String {
        format!(
            "active: {}, value: 0x{:02x}",
            self.active_dma, self.value_dma
        )
    }
}

impl BusComponent for Dma {
    fn read(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Dma {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dma_default() {
        let dma = Dma::default();
        assert!(!dma.active_dma());
    }

    #[test]
    fn test_dma_reset() {
        let mut dma = Dma::new();
        dma.write(DMA_ADDR, 0xc0);
        dma.reset();
        assert_eq!(dma.value_dma(), 0x0);
        assert!(!dma.active_dma());
    }

    #[test]
    fn test_dma_write_reports_source_address() {
        let mut dma = Dma::new();
        let source = dma.write(DMA_ADDR, 0xc0);
        assert_eq!(source, Some(0xc000));
        assert!(dma.active_dma());
        dma.finish();
        assert!(!dma.active_dma());
    }
}
