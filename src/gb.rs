//! Game Boy emulation entrypoint and associated functions and structures.
//!
//! Most of the meaningful publicly available functions and structures to
//! build a working emulator should be present here.
//!
//! # Examples
//!
//! Creates a simple [`GameBoy`] instance, skips the boot sequence and
//! loads an empty cartridge.
//!
//! ```rust
//! use gbcore::gb::GameBoy;
//! let mut game_boy = GameBoy::default();
//! game_boy.boot();
//! game_boy.load_rom_empty().unwrap();
//! let cycles = game_boy.step();
//! println!("Ran {} cycles", cycles);
//! ```

use std::{thread, time::Duration};

use crate::{
    consts::FRAME_DURATION_MS,
    cpu::Cpu,
    error::Error,
    mmu::{Components, Mmu},
    pad::PadKey,
    ppu::{Ppu, PpuMode, FRAME_BUFFER_SIZE},
    rom::{Cartridge, ChecksumPolicy},
};

/// Toggles for the handful of behaviors the ambient stack around the
/// core triple still needs: whether to skip the boot sequence when no
/// boot ROM is supplied, how strictly ROM headers are validated, and
/// whether `step_frame` paces itself to real time by default.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GameBoyConfig {
    /// If no boot ROM has been loaded, jump straight to the post-boot
    /// register state instead of leaving PC at 0x0000 with an empty
    /// boot overlay.
    pub skip_boot: bool,

    /// Strict vs. permissive ROM header checksum validation.
    pub checksum_policy: ChecksumPolicy,

    /// Default pacing behavior for `step_frame` when callers don't
    /// override it explicitly.
    pub pace: bool,
}

impl Default for GameBoyConfig {
    fn default() -> Self {
        Self {
            skip_boot: true,
            checksum_policy: ChecksumPolicy::Permissive,
            pace: false,
        }
    }
}

/// Top level structure that abstracts the usage of the Game Boy system
/// under this emulator.
///
/// Should serve as the main entry-point API.
pub struct GameBoy {
    cpu: Cpu,
    config: GameBoyConfig,
}

impl GameBoy {
    /// The logic frequency of the Game Boy CPU, in Hz.
    pub const CPU_FREQ: u32 = 4_194_304;

    /// The visual frequency (refresh rate), close to 60 Hz.
    pub const VISUAL_FREQ: f32 = 59.7275;

    /// T-states consumed by one complete PPU frame.
    pub const LCD_CYCLES: u32 = 70224;

    pub fn new(config: GameBoyConfig) -> Self {
        let mmu = Mmu::new(Components::default(), Cartridge::default());
        Self {
            cpu: Cpu::new(mmu),
            config,
        }
    }

    pub fn config(&self) -> GameBoyConfig {
        self.config
    }

    pub fn set_config(&mut self, config: GameBoyConfig) {
        self.config = config;
    }

    /// Tears down and recreates every piece of emulator state (CPU
    /// registers, MMU storage and every memory-mapped component), but
    /// keeps the currently loaded cartridge and configuration.
    pub fn reset(&mut self) {
        let rom = self.rom().clone();
        self.cpu.reset();
        self.mmu().reset();
        self.mmu().set_rom(rom);
    }

    /// Validates a candidate ROM image without loading it.
    pub fn verify_rom(data: &[u8], checksum_policy: ChecksumPolicy) -> bool {
        Cartridge::from_data(data, checksum_policy).is_ok()
    }

    /// Loads a cartridge image, replacing whatever ROM is currently
    /// mapped. If no boot ROM has been loaded and `skip_boot` is set,
    /// jumps straight to the post-boot register state.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), Error> {
        let cartridge = Cartridge::from_data(data, self.config.checksum_policy)?;
        self.mmu().set_rom(cartridge);
        if self.config.skip_boot && !self.mmu_i().boot_active() {
            // boot overlay was already disabled by a previous load; PC
            // may still be inside the boot vector, so nothing to do
        } else if self.config.skip_boot {
            self.boot();
        }
        Ok(())
    }

    /// Convenience for test ROMs and smoke tests: loads a 32 KiB
    /// cartridge filled with NOPs (0x00).
    pub fn load_rom_empty(&mut self) -> Result<(), Error> {
        let data = [0u8; 32 * 1024];
        self.load_rom(&data)
    }

    /// Loads a 256-byte boot ROM image into the boot overlay.
    pub fn load_boot(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() != 256 {
            return Err(Error::InvalidBiosSize(data.len()));
        }
        self.mmu().write_boot(data);
        self.mmu().set_boot_active(true);
        Ok(())
    }

    /// Skips the boot sequence entirely, setting registers and the MMU
    /// boot-overlay latch to the state real boot ROMs leave behind.
    pub fn boot(&mut self) {
        self.cpu.boot();
    }

    pub fn key_press(&mut self, key: PadKey) {
        self.mmu().pad().key_press(key);
    }

    pub fn key_lift(&mut self, key: PadKey) {
        self.mmu().pad().key_lift(key);
    }

    /// Advances emulation by one CPU dispatch (a decoded instruction, a
    /// HALT tick, or a serviced interrupt) and lets every clocked
    /// component consume the resulting T-states. Returns the number of
    /// T-states the step took.
    pub fn step(&mut self) -> u16 {
        let cycles = self.cpu.clock() as u16;
        self.ppu().clock(cycles);
        self.apu().clock(cycles);
        self.timer().clock(cycles);
        cycles
    }

    /// Runs `step` until the PPU has produced one complete frame (one
    /// V-Blank entry), optionally pacing the call to real time so
    /// successive frames are spaced by ~16.742 ms. Returns the frame
    /// buffer produced, borrowed for the duration of this call only.
    pub fn step_frame(&mut self, pace: bool) -> &[u8; FRAME_BUFFER_SIZE] {
        let start_frame = self.ppu_i().frame_index();
        while self.ppu_i().frame_index() == start_frame {
            self.step();
        }
        if pace {
            thread::sleep(Duration::from_secs_f64(FRAME_DURATION_MS / 1000.0));
        }
        self.ppu().frame_buffer()
    }

    /// Equivalent to `step_frame`, using the configured default pacing.
    pub fn next_frame(&mut self) -> &[u8; FRAME_BUFFER_SIZE] {
        let pace = self.config.pace;
        self.step_frame(pace)
    }

    /// Steps until the CPU's PC reaches `addr`, used by tests and
    /// debuggers that want to stop mid-frame without tearing the PPU's
    /// in-progress scanline.
    pub fn step_to(&mut self, addr: u16) -> u32 {
        let mut cycles = 0u32;
        while self.cpu.pc() != addr {
            cycles += self.step() as u32;
        }
        cycles
    }

    pub fn cpu(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn cpu_i(&self) -> &Cpu {
        &self.cpu
    }

    pub fn mmu(&mut self) -> &mut Mmu {
        self.cpu.mmu()
    }

    pub fn mmu_i(&self) -> &Mmu {
        self.cpu.mmu_i()
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        self.mmu().ppu()
    }

    pub fn ppu_i(&self) -> &Ppu {
        self.mmu_i().ppu_i()
    }

    pub fn apu(&mut self) -> &mut crate::apu::Apu {
        self.mmu().apu()
    }

    pub fn timer(&mut self) -> &mut crate::timer::Timer {
        self.mmu().timer()
    }

    pub fn rom(&mut self) -> &mut Cartridge {
        self.mmu().rom()
    }

    pub fn rom_i(&self) -> &Cartridge {
        self.mmu_i().rom_i()
    }

    pub fn frame_buffer(&mut self) -> &[u8; FRAME_BUFFER_SIZE] {
        self.ppu().frame_buffer()
    }

    pub fn ppu_mode(&mut self) -> PpuMode {
        self.ppu().mode()
    }

    pub fn ppu_ly(&mut self) -> u8 {
        self.ppu().ly()
    }

    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.mmu().read(addr)
    }

    pub fn write_memory(&mut self, addr: u16, value: u8) {
        self.mmu().write(addr, value);
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new(GameBoyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_sets_post_boot_pc() {
        let mut game_boy = GameBoy::default();
        game_boy.boot();
        assert_eq!(game_boy.cpu_i().pc(), 0x0100);
    }

    #[test]
    fn test_load_rom_with_skip_boot_jumps_past_boot_vector() {
        let mut game_boy = GameBoy::default();
        game_boy.load_rom_empty().unwrap();
        assert_eq!(game_boy.cpu_i().pc(), 0x0100);
    }

    #[test]
    fn test_load_boot_rejects_wrong_size() {
        let mut game_boy = GameBoy::default();
        let result = game_boy.load_boot(&[0u8; 10]);
        assert_eq!(result, Err(Error::InvalidBiosSize(10)));
    }

    #[test]
    fn test_step_advances_pc_by_one_instruction() {
        let mut game_boy = GameBoy::default();
        game_boy.load_rom_empty().unwrap();
        let pc_before = game_boy.cpu_i().pc();
        game_boy.step();
        assert_eq!(game_boy.cpu_i().pc(), pc_before.wrapping_add(1));
    }

    #[test]
    fn test_step_frame_consumes_exactly_one_vblank_worth_of_frames() {
        let mut game_boy = GameBoy::default();
        game_boy.load_rom_empty().unwrap();
        let start = game_boy.ppu_i().frame_index();
        game_boy.step_frame(false);
        assert_eq!(game_boy.ppu_i().frame_index(), start.wrapping_add(1));
    }

    #[test]
    fn test_reset_restores_post_construction_state() {
        let mut game_boy = GameBoy::default();
        game_boy.load_rom_empty().unwrap();
        game_boy.step();
        game_boy.reset();
        assert_eq!(game_boy.cpu_i().pc(), 0x0000);
    }
}
