use std::cell::RefCell;
use std::rc::Rc;

mod fetcher;
mod fifo;
mod lcdc;
mod palette;
mod phases;

pub use fetcher::zip;
pub use fifo::{ColorPixelFifo, DmgPixelFifo, IntQueue, PixelFifo};
pub use lcdc::{LCDC_ADDR, Lcdc, PpuRegister};
pub use palette::{ColorPalette, TileAttributes};
pub use phases::{SpritePosition, TICKS_PER_LINE};

use crate::address_space::{AddressSpace, MemoryRegisters, Ram, Register};
use crate::display::Display;
use crate::dma::Dma;
use crate::interrupts::{InterruptManager, InterruptType};
use phases::{HBlankPhase, OamSearch, PixelTransfer, VBlankPhase};

#[cfg(feature = "ppu-trace")]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {
        log::trace!(target: "tickboy::ppu", $($arg)*);
    };
}
#[cfg(not(feature = "ppu-trace"))]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {};
}

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

const VRAM_START: u16 = 0x8000;
const VRAM_BANK_SIZE: usize = 0x2000;
const BG_PALETTE_ADDR: u16 = 0xff68;
const OAM_PALETTE_ADDR: u16 = 0xff6a;

// First line of VBlank and the last line of the frame
const VBLANK_LINE: u8 = 144;
const LAST_LINE: u8 = 153;

// Dots between setting LCDC bit 7 and the first rendered line
const LCD_ENABLE_DELAY: i32 = 244;

// STAT interrupt source bits
const STAT_HBLANK: u8 = 3;
const STAT_VBLANK: u8 = 4;
const STAT_OAM: u8 = 5;
const STAT_LYC: u8 = 6;

/// LCD modes, in STAT encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuMode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    PixelTransfer = 3,
}

/// Everything the pixel pipeline reads while drawing: registers, VRAM
/// banks and the CGB palettes.
#[derive(Debug)]
pub struct VideoState {
    pub registers: MemoryRegisters,
    pub lcdc: Lcdc,
    pub vram0: Ram,
    pub vram1: Option<Ram>,
    pub bg_palette: ColorPalette,
    pub oam_palette: ColorPalette,
    pub gbc: bool,
}

impl VideoState {
    pub fn new(gbc: bool) -> Self {
        let mut oam_palette = ColorPalette::new(OAM_PALETTE_ADDR);
        oam_palette.fill_with_ff();
        Self {
            registers: MemoryRegisters::new(&PpuRegister::ALL),
            lcdc: Lcdc::default(),
            vram0: Ram::new(VRAM_START, VRAM_BANK_SIZE),
            vram1: gbc.then(|| Ram::new(VRAM_START, VRAM_BANK_SIZE)),
            bg_palette: ColorPalette::new(BG_PALETTE_ADDR),
            oam_palette,
            gbc,
        }
    }

    fn vram_bank(&self) -> usize {
        if self.gbc {
            (self.registers.get(PpuRegister::Vbk) & 1) as usize
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Vram,
    Oam,
    Lcdc,
    Registers,
    BgPalette,
    OamPalette,
}

/// The picture processing unit: a dot-by-dot state machine over the four
/// scanline phases, plus the memory-mapped VRAM, OAM and LCD registers.
pub struct Ppu {
    video: VideoState,
    oam: Rc<RefCell<Ram>>,
    dma: Rc<RefCell<Dma>>,
    interrupts: Rc<RefCell<InterruptManager>>,
    display: Box<dyn Display>,

    mode: PpuMode,
    oam_search: OamSearch,
    pixel_transfer: PixelTransfer,
    hblank: HBlankPhase,
    vblank: VBlankPhase,

    lcd_enabled: bool,
    lcd_enabled_delay: i32,
    ticks_in_line: u32,
}

impl Ppu {
    pub fn new(
        display: Box<dyn Display>,
        interrupts: Rc<RefCell<InterruptManager>>,
        dma: Rc<RefCell<Dma>>,
        oam: Rc<RefCell<Ram>>,
        gbc: bool,
    ) -> Self {
        let mut oam_search = OamSearch::new();
        oam_search.start();
        Self {
            video: VideoState::new(gbc),
            oam,
            dma,
            interrupts,
            display,
            mode: PpuMode::OamSearch,
            oam_search,
            pixel_transfer: PixelTransfer::new(gbc),
            hblank: HBlankPhase::default(),
            vblank: VBlankPhase::default(),
            lcd_enabled: true,
            lcd_enabled_delay: 0,
            ticks_in_line: 0,
        }
    }

    pub fn lcdc(&self) -> &Lcdc {
        &self.video.lcdc
    }

    pub fn registers(&self) -> &MemoryRegisters {
        &self.video.registers
    }

    pub fn video(&self) -> &VideoState {
        &self.video
    }

    pub fn oam(&self) -> &Rc<RefCell<Ram>> {
        &self.oam
    }

    pub fn display_mut(&mut self) -> &mut dyn Display {
        self.display.as_mut()
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    pub fn is_gbc(&self) -> bool {
        self.video.gbc
    }

    pub fn is_lcd_enabled(&self) -> bool {
        self.lcd_enabled
    }

    pub fn ticks_in_line(&self) -> u32 {
        self.ticks_in_line
    }

    pub fn stat(&self) -> u8 {
        let r = &self.video.registers;
        let coincidence = if r.get(PpuRegister::Lyc) == r.get(PpuRegister::Ly) {
            1 << 2
        } else {
            0
        };
        r.get(PpuRegister::Stat) | self.mode as u8 | coincidence | 0x80
    }

    fn set_stat(&mut self, value: u8) {
        // mode and coincidence bits are read-only
        self.video.registers.put(PpuRegister::Stat, value & 0b1111_1000);
    }

    /// Advance one dot. Returns the new mode when it changed.
    pub fn tick(&mut self) -> Option<PpuMode> {
        if !self.lcd_enabled && self.lcd_enabled_delay != -1 {
            self.lcd_enabled_delay -= 1;
            if self.lcd_enabled_delay == 0 {
                log::debug!("LCD enabled");
                self.display.enable_lcd();
                self.lcd_enabled = true;
            }
        }
        if !self.lcd_enabled {
            return None;
        }

        let old_mode = self.mode;
        self.ticks_in_line += 1;
        if self.tick_phase() {
            // line 153 reads as line 0 after a few dots
            if self.ticks_in_line == 4
                && self.mode == PpuMode::VBlank
                && self.video.registers.get(PpuRegister::Ly) == LAST_LINE
            {
                self.video.registers.put(PpuRegister::Ly, 0);
                self.request_lyc_equals_ly_interrupt();
            }
        } else {
            self.next_phase(old_mode);
        }

        if old_mode == self.mode {
            None
        } else {
            ppu_trace!(
                "mode {:?} -> {:?} at LY={}",
                old_mode,
                self.mode,
                self.video.registers.get(PpuRegister::Ly)
            );
            Some(self.mode)
        }
    }

    fn tick_phase(&mut self) -> bool {
        match self.mode {
            PpuMode::OamSearch => self.oam_search.tick(&self.video, &self.oam.borrow()),
            PpuMode::PixelTransfer => {
                self.pixel_transfer
                    .tick(&self.video, &self.oam.borrow(), self.display.as_mut())
            }
            PpuMode::HBlank => self.hblank.tick(),
            PpuMode::VBlank => self.vblank.tick(),
        }
    }

    fn next_phase(&mut self, old_mode: PpuMode) {
        match old_mode {
            PpuMode::OamSearch => {
                self.mode = PpuMode::PixelTransfer;
                self.pixel_transfer
                    .start(self.oam_search.sprites(), &self.video);
            }
            PpuMode::PixelTransfer => {
                self.mode = PpuMode::HBlank;
                self.hblank.start(self.ticks_in_line);
                self.request_lcdc_interrupt(STAT_HBLANK);
            }
            PpuMode::HBlank => {
                self.ticks_in_line = 0;
                if self.video.registers.pre_increment(PpuRegister::Ly) == VBLANK_LINE {
                    self.mode = PpuMode::VBlank;
                    self.vblank.start();
                    self.interrupts
                        .borrow_mut()
                        .request_interrupt(InterruptType::VBlank);
                    self.request_lcdc_interrupt(STAT_VBLANK);
                } else {
                    self.mode = PpuMode::OamSearch;
                    self.oam_search.start();
                }
                self.request_lcdc_interrupt(STAT_OAM);
                self.request_lyc_equals_ly_interrupt();
            }
            PpuMode::VBlank => {
                self.ticks_in_line = 0;
                // LY was already reset to 0 at the start of line 153
                if self.video.registers.pre_increment(PpuRegister::Ly) == 1 {
                    self.mode = PpuMode::OamSearch;
                    self.video.registers.put(PpuRegister::Ly, 0);
                    self.oam_search.start();
                    self.request_lcdc_interrupt(STAT_OAM);
                } else {
                    self.vblank.start();
                }
                self.request_lyc_equals_ly_interrupt();
            }
        }
    }

    fn request_lcdc_interrupt(&self, stat_bit: u8) {
        if self.video.registers.get(PpuRegister::Stat) & (1 << stat_bit) != 0 {
            self.interrupts
                .borrow_mut()
                .request_interrupt(InterruptType::Lcdc);
        }
    }

    fn request_lyc_equals_ly_interrupt(&self) {
        let r = &self.video.registers;
        if r.get(PpuRegister::Lyc) == r.get(PpuRegister::Ly) {
            self.request_lcdc_interrupt(STAT_LYC);
        }
    }

    fn set_lcdc(&mut self, value: u8) {
        self.video.lcdc.value = value;
        if value & (1 << 7) == 0 {
            self.disable_lcd();
        } else {
            self.enable_lcd();
        }
    }

    fn disable_lcd(&mut self) {
        self.video.registers.put(PpuRegister::Ly, 0);
        self.ticks_in_line = 0;
        self.hblank.start(250);
        self.mode = PpuMode::HBlank;
        if self.lcd_enabled {
            log::debug!("LCD disabled");
        }
        self.lcd_enabled = false;
        self.lcd_enabled_delay = -1;
        self.display.disable_lcd();
    }

    fn enable_lcd(&mut self) {
        self.lcd_enabled_delay = LCD_ENABLE_DELAY;
    }

    fn region(&self, address: u16) -> Option<Region> {
        if self.video.vram0.accepts(address) {
            Some(Region::Vram)
        } else if self.oam.borrow().accepts(address) && !self.dma.borrow().is_oam_blocked() {
            Some(Region::Oam)
        } else if self.video.lcdc.accepts(address) {
            Some(Region::Lcdc)
        } else if self.video.registers.accepts(address) {
            Some(Region::Registers)
        } else if self.video.gbc && self.video.bg_palette.accepts(address) {
            Some(Region::BgPalette)
        } else if self.video.gbc && self.video.oam_palette.accepts(address) {
            Some(Region::OamPalette)
        } else {
            None
        }
    }

    fn vram(&self) -> &Ram {
        match (&self.video.vram1, self.video.vram_bank()) {
            (Some(vram1), 1) => vram1,
            _ => &self.video.vram0,
        }
    }

    fn vram_mut(&mut self) -> &mut Ram {
        let bank = self.video.vram_bank();
        match (&mut self.video.vram1, bank) {
            (Some(vram1), 1) => vram1,
            _ => &mut self.video.vram0,
        }
    }
}

impl AddressSpace for Ppu {
    fn accepts(&self, address: u16) -> bool {
        self.region(address).is_some()
    }

    fn read(&self, address: u16) -> u8 {
        if address == PpuRegister::Stat.address() {
            return self.stat();
        }
        match self.region(address) {
            None => 0xff,
            Some(Region::Registers) if address == PpuRegister::Vbk.address() => {
                if self.video.gbc {
                    0xfe | self.video.vram_bank() as u8
                } else {
                    0xff
                }
            }
            Some(Region::Vram) => self.vram().read(address),
            Some(Region::Oam) => self.oam.borrow().read(address),
            Some(Region::Lcdc) => self.video.lcdc.read(address),
            Some(Region::Registers) => self.video.registers.read(address),
            Some(Region::BgPalette) => self.video.bg_palette.read(address),
            Some(Region::OamPalette) => self.video.oam_palette.read(address),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == PpuRegister::Stat.address() {
            self.set_stat(value);
            return;
        }
        match self.region(address) {
            None => {}
            Some(Region::Vram) => self.vram_mut().write(address, value),
            Some(Region::Oam) => self.oam.borrow_mut().write(address, value),
            Some(Region::Lcdc) => self.set_lcdc(value),
            Some(Region::Registers) => self.video.registers.write(address, value),
            Some(Region::BgPalette) => self.video.bg_palette.write(address, value),
            Some(Region::OamPalette) => self.video.oam_palette.write(address, value),
        }
    }
}
