//! The four scanline phases. Each `tick` returns `false` once the phase is
//! over and the PPU should move to the next mode.

use super::VideoState;
use super::fetcher::Fetcher;
use super::fifo::{ColorPixelFifo, DmgPixelFifo, PixelFifo};
use super::lcdc::PpuRegister;
use crate::address_space::{AddressSpace, Ram};
use crate::display::Display;

pub const TICKS_PER_LINE: u32 = 456;
pub const MAX_SPRITES_PER_LINE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpritePosition {
    pub x: i32,
    pub y: i32,
    /// OAM address of the entry's Y byte.
    pub address: u16,
}

pub type SpriteSlots = [Option<SpritePosition>; MAX_SPRITES_PER_LINE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OamState {
    ReadingY,
    ReadingX,
}

/// Mode 2: two dots per OAM entry, keeping the first ten sprites that cover
/// the current line.
#[derive(Debug)]
pub struct OamSearch {
    sprites: SpriteSlots,
    sprite_pos_index: usize,
    state: OamState,
    sprite_y: i32,
    i: u16,
}

impl Default for OamSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl OamSearch {
    pub fn new() -> Self {
        Self {
            sprites: [None; MAX_SPRITES_PER_LINE],
            sprite_pos_index: 0,
            state: OamState::ReadingY,
            sprite_y: 0,
            i: 0,
        }
    }

    pub fn start(&mut self) {
        self.sprite_pos_index = 0;
        self.state = OamState::ReadingY;
        self.sprite_y = 0;
        self.i = 0;
        self.sprites = [None; MAX_SPRITES_PER_LINE];
    }

    pub fn tick(&mut self, video: &VideoState, oam: &Ram) -> bool {
        let sprite_address = 0xfe00 + 4 * self.i;
        match self.state {
            OamState::ReadingY => {
                self.sprite_y = oam.read(sprite_address) as i32;
                self.state = OamState::ReadingX;
            }
            OamState::ReadingX => {
                let sprite_x = oam.read(sprite_address + 1) as i32;
                let line = video.registers.get(PpuRegister::Ly) as i32 + 16;
                let visible = self.sprite_y <= line && line < self.sprite_y + video.lcdc.sprite_height();
                if self.sprite_pos_index < MAX_SPRITES_PER_LINE && visible {
                    self.sprites[self.sprite_pos_index] = Some(SpritePosition {
                        x: sprite_x,
                        y: self.sprite_y,
                        address: sprite_address,
                    });
                    self.sprite_pos_index += 1;
                }
                self.i += 1;
                self.state = OamState::ReadingY;
            }
        }
        self.i < 40
    }

    pub fn sprites(&self) -> &SpriteSlots {
        &self.sprites
    }
}

/// Mode 3: shift 160 pixels out to the display, stalling for scroll,
/// window restarts and sprite fetches.
pub struct PixelTransfer {
    fifo: Box<dyn PixelFifo>,
    fetcher: Fetcher,
    sprites: SpriteSlots,
    dropped_pixels: u8,
    x: i32,
    window: bool,
}

impl PixelTransfer {
    pub fn new(gbc: bool) -> Self {
        let fifo: Box<dyn PixelFifo> = if gbc {
            Box::new(ColorPixelFifo::new())
        } else {
            Box::new(DmgPixelFifo::new())
        };
        Self {
            fifo,
            fetcher: Fetcher::new(),
            sprites: [None; MAX_SPRITES_PER_LINE],
            dropped_pixels: 0,
            x: 0,
            window: false,
        }
    }

    pub fn start(&mut self, sprites: &SpriteSlots, video: &VideoState) {
        self.sprites = *sprites;
        self.dropped_pixels = 0;
        self.x = 0;
        self.window = false;

        self.fetcher.init();
        if video.gbc || video.lcdc.is_bg_and_window_display() {
            self.start_fetching_background(video);
        } else {
            self.fetcher.fetching_disabled();
        }
    }

    pub fn tick(&mut self, video: &VideoState, oam: &Ram, display: &mut dyn Display) -> bool {
        self.fetcher.tick(self.fifo.as_mut(), video, oam);
        let r = &video.registers;
        if video.lcdc.is_bg_and_window_display() || video.gbc {
            if self.fifo.len() <= 8 {
                return true;
            }
            if self.dropped_pixels < r.get(PpuRegister::Scx) % 8 {
                self.fifo.drop_pixel(video);
                self.dropped_pixels += 1;
                return true;
            }
            if !self.window
                && video.lcdc.is_window_display()
                && r.get(PpuRegister::Ly) >= r.get(PpuRegister::Wy)
                && self.x == r.get(PpuRegister::Wx) as i32 - 7
            {
                self.window = true;
                self.start_fetching_window(video);
                return true;
            }
        }

        if video.lcdc.is_obj_display() {
            if self.fetcher.sprite_in_progress() {
                return true;
            }
            for i in 0..MAX_SPRITES_PER_LINE {
                let Some(sprite) = self.sprites[i] else {
                    continue;
                };
                let offset = if self.x == 0 && sprite.x < 8 {
                    Some((8 - sprite.x) as usize)
                } else if sprite.x - 8 == self.x {
                    Some(0)
                } else {
                    None
                };
                if let Some(offset) = offset {
                    // one sprite per dot; the next matching one waits
                    self.fetcher.add_sprite(sprite, offset, i, video);
                    self.sprites[i] = None;
                    return true;
                }
            }
        }

        self.fifo.put_pixel_to_screen(video, display);
        self.x += 1;
        self.x != 160
    }

    fn start_fetching_background(&mut self, video: &VideoState) {
        let r = &video.registers;
        let bg_x = r.get(PpuRegister::Scx) as u16 / 0x08;
        let bg_y = (r.get(PpuRegister::Scy) as u16 + r.get(PpuRegister::Ly) as u16) % 0x100;
        self.fetcher.start_fetching(
            self.fifo.as_mut(),
            video.lcdc.bg_tile_map_display() + (bg_y / 0x08) * 0x20,
            video.lcdc.bg_window_tile_data(),
            bg_x,
            video.lcdc.is_bg_window_tile_data_signed(),
            (bg_y % 0x08) as i32,
        );
    }

    fn start_fetching_window(&mut self, video: &VideoState) {
        let r = &video.registers;
        let win_x = ((self.x - r.get(PpuRegister::Wx) as i32 + 7) / 0x08) as u16;
        let win_y = r.get(PpuRegister::Ly) as i32 - r.get(PpuRegister::Wy) as i32;
        self.fetcher.start_fetching(
            self.fifo.as_mut(),
            video.lcdc.window_tile_map_display() + (win_y / 0x08) as u16 * 0x20,
            video.lcdc.bg_window_tile_data(),
            win_x,
            video.lcdc.is_bg_window_tile_data_signed(),
            win_y % 0x08,
        );
    }
}

/// Mode 0: idle until the end of the line.
#[derive(Debug, Default)]
pub struct HBlankPhase {
    ticks: u32,
}

impl HBlankPhase {
    pub fn start(&mut self, ticks_in_line: u32) {
        self.ticks = ticks_in_line;
    }

    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        self.ticks < TICKS_PER_LINE
    }
}

/// Mode 1: one full line per start.
#[derive(Debug, Default)]
pub struct VBlankPhase {
    ticks: u32,
}

impl VBlankPhase {
    pub fn start(&mut self) {
        self.ticks = 0;
    }

    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        self.ticks < TICKS_PER_LINE
    }
}
