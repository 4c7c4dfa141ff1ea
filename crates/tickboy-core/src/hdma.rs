use crate::address_space::{AddressSpace, Ram};
use crate::mmu::Mmu;
use crate::ppu::PpuMode;

const HDMA1: u16 = 0xff51;
const HDMA5: u16 = 0xff55;
const BLOCK_SIZE: u16 = 0x10;
// Ticks before the first block is copied
const STARTUP_TICKS: u32 = 0x20;

/// CGB VRAM DMA (FF51-FF55). General transfers run back to back while the
/// CPU is stalled; HBlank transfers copy one block per HBlank.
pub struct Hdma {
    hdma1234: Ram,
    gpu_mode: Option<PpuMode>,
    transfer_in_progress: bool,
    hblank_transfer: bool,
    lcd_enabled: bool,
    length: u8,
    src: u16,
    dst: u16,
    tick: u32,
}

impl Default for Hdma {
    fn default() -> Self {
        Self::new()
    }
}

impl Hdma {
    pub fn new() -> Self {
        Self {
            hdma1234: Ram::new(HDMA1, 4),
            gpu_mode: None,
            transfer_in_progress: false,
            hblank_transfer: false,
            lcd_enabled: false,
            length: 0x7f,
            src: 0,
            dst: 0,
            tick: 0,
        }
    }

    /// Returns `(src, dst)` of the block to copy this tick, if any. The copy
    /// itself goes through the MMU in [`copy_block`].
    pub fn tick(&mut self) -> Option<(u16, u16)> {
        if !self.is_transfer_in_progress() {
            return None;
        }
        self.tick += 1;
        if self.tick < STARTUP_TICKS {
            return None;
        }
        let block = (self.src, self.dst);
        self.src = self.src.wrapping_add(BLOCK_SIZE);
        self.dst = self.dst.wrapping_add(BLOCK_SIZE);
        if self.length == 0 {
            self.transfer_in_progress = false;
            self.length = 0x7f;
        } else {
            self.length -= 1;
            if self.hblank_transfer {
                // wait for the next HBlank
                self.gpu_mode = None;
            }
        }
        Some(block)
    }

    pub fn on_gpu_update(&mut self, new_mode: Option<PpuMode>) {
        self.gpu_mode = new_mode;
    }

    pub fn on_lcd_switch(&mut self, lcd_enabled: bool) {
        self.lcd_enabled = lcd_enabled;
    }

    /// True while the transfer owns the bus; the CPU does not tick then.
    pub fn is_transfer_in_progress(&self) -> bool {
        if !self.transfer_in_progress {
            false
        } else if self.hblank_transfer {
            self.gpu_mode == Some(PpuMode::HBlank) || !self.lcd_enabled
        } else {
            true
        }
    }

    fn start_transfer(&mut self, reg: u8) {
        let h = |a: u16| self.hdma1234.read(a) as u16;
        self.hblank_transfer = reg & 0x80 != 0;
        self.length = reg & 0x7f;
        self.src = ((h(0xff51) << 8) | (h(0xff52) & 0xf0)) & 0xfff0;
        let dst = ((h(0xff53) & 0x1f) << 8) | (h(0xff54) & 0xf0);
        self.dst = (dst & 0x1fff) | 0x8000;
        self.transfer_in_progress = true;
    }

    fn stop_transfer(&mut self) {
        self.transfer_in_progress = false;
    }
}

/// Copy one 16-byte block through the MMU.
pub fn copy_block(mmu: &Mmu, src: u16, dst: u16) {
    for j in 0..BLOCK_SIZE {
        let value = mmu.read(src.wrapping_add(j));
        mmu.write(dst.wrapping_add(j), value);
    }
}

impl AddressSpace for Hdma {
    fn accepts(&self, address: u16) -> bool {
        (HDMA1..=HDMA5).contains(&address)
    }

    fn read(&self, address: u16) -> u8 {
        if address == HDMA5 {
            let active = if self.transfer_in_progress { 0 } else { 0x80 };
            active | self.length
        } else {
            0xff
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address != HDMA5 {
            self.hdma1234.write(address, value);
        } else if self.transfer_in_progress && value & 0x80 == 0 {
            self.stop_transfer();
        } else {
            self.start_transfer(value);
        }
    }
}
