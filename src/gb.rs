//! Top-level machine: owns the CPU (which owns the MMU, which in turn owns
//! the PPU, DMA engine, joypad, counter and cartridge) and drives the
//! per-M-cycle tick the host loop calls.

use crate::{cpu::Cpu, error::Error, mmu::Mmu, pad::PadKey, rom::Cartridge};

pub struct GameBoy {
    cpu: Cpu,
}

impl GameBoy {
    pub fn new(cartridge: Cartridge) -> Self {
        let mmu = Mmu::new(cartridge);
        let mut cpu = Cpu::new(mmu);
        cpu.boot();
        Self { cpu }
    }

    pub fn from_rom_bytes(rom: Vec<u8>) -> Result<Self, Error> {
        Ok(Self::new(Cartridge::from_bytes(rom)?))
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn mmu(&self) -> &Mmu {
        &self.cpu.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.cpu.mmu
    }

    /// Drives one emulated CPU M-cycle: the CPU, one M-cycle of OAM DMA,
    /// four PPU T-cycles, and the system counter.
    pub fn mcycle(&mut self) {
        self.cpu.mcycle();
        self.cpu.mmu.step_dma();
        for _ in 0..4 {
            self.cpu.mmu.step_ppu();
        }
        self.cpu.mmu.counter.tick(4);
    }

    pub fn key_press(&mut self, key: PadKey) {
        self.cpu.mmu.pad.key_press(key);
    }

    pub fn key_lift(&mut self, key: PadKey) {
        self.cpu.mmu.pad.key_lift(key);
    }

    pub fn framebuffer(&self) -> &[[u8; 160]; 144] {
        &self.cpu.mmu.ppu.framebuffer
    }

    pub fn describe_diagnostics(&self) -> String {
        self.cpu.describe_diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(bytes: &[u8]) -> GameBoy {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0100..0x0100 + bytes.len()].copy_from_slice(bytes);
        GameBoy::from_rom_bytes(rom).unwrap()
    }

    #[test]
    fn oam_dma_copies_160_bytes_and_isolates_the_cpu() {
        let mut gb = machine_with(&[0x00]);
        gb.mmu_mut().ppu.set_lcdc(0x00);
        for i in 0..0xa0u16 {
            gb.mmu_mut().store_raw(0xc000 + i, i as u8 + 1);
        }
        gb.mmu_mut().store(0xff46, 0xc0);

        for _ in 0..161 {
            gb.mcycle();
        }

        for i in 0..0xa0u16 {
            assert_eq!(
                gb.mmu_mut().fetch_raw(0xfe00 + i),
                gb.mmu_mut().fetch_raw(0xc000 + i)
            );
        }
    }

    #[test]
    fn mcycle_advances_the_ppu_by_four_tcycles() {
        let mut gb = machine_with(&[0x00]);
        for _ in 0..114 {
            gb.mcycle();
        }
        assert_eq!(gb.mmu().ppu.ly(), 1);
    }
}
