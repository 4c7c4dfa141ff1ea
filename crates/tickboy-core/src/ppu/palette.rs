use std::fmt;

use super::lcdc::PpuRegister;
use crate::address_space::AddressSpace;

/// CGB palette memory behind an index/data register pair
/// (FF68/FF69 for background, FF6A/FF6B for sprites).
///
/// Eight palettes of four 15-bit colors. The index register selects a byte
/// and optionally auto-increments after each data write.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    index_addr: u16,
    data_addr: u16,
    palettes: [[u16; 4]; 8],
    index: usize,
    auto_increment: bool,
}

impl ColorPalette {
    pub fn new(offset: u16) -> Self {
        Self {
            index_addr: offset,
            data_addr: offset + 1,
            palettes: [[0; 4]; 8],
            index: 0,
            auto_increment: false,
        }
    }

    pub fn palette(&self, index: usize) -> &[u16; 4] {
        &self.palettes[index]
    }

    /// Every color white, the power-on state of the sprite palettes.
    pub fn fill_with_ff(&mut self) {
        for palette in self.palettes.iter_mut() {
            *palette = [0x7fff; 4];
        }
    }

    fn slot(&self) -> (usize, usize) {
        (self.index / 8, (self.index % 8) / 2)
    }
}

impl AddressSpace for ColorPalette {
    fn accepts(&self, address: u16) -> bool {
        address == self.index_addr || address == self.data_addr
    }

    fn read(&self, address: u16) -> u8 {
        if address == self.index_addr {
            self.index as u8 | if self.auto_increment { 0x80 } else { 0x00 } | 0x40
        } else {
            let (p, c) = self.slot();
            let color = self.palettes[p][c];
            if self.index % 2 == 0 {
                color as u8
            } else {
                (color >> 8) as u8
            }
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == self.index_addr {
            self.index = (value & 0x3f) as usize;
            self.auto_increment = value & 0x80 != 0;
        } else {
            let (p, c) = self.slot();
            let color = &mut self.palettes[p][c];
            if self.index % 2 == 0 {
                *color = (*color & 0xff00) | value as u16;
            } else {
                *color = (*color & 0x00ff) | ((value as u16) << 8);
            }
            if self.auto_increment {
                self.index = (self.index + 1) & 0x3f;
            }
        }
    }
}

impl fmt::Display for ColorPalette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, palette) in self.palettes.iter().enumerate() {
            write!(f, "{i}:")?;
            for c in palette {
                write!(f, " {c:04X}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Background map attribute byte (CGB, VRAM bank 1) or OAM flags byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileAttributes(pub u8);

impl TileAttributes {
    pub const EMPTY: TileAttributes = TileAttributes(0);

    pub fn is_priority(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn is_y_flip(self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn is_x_flip(self) -> bool {
        self.0 & 0x20 != 0
    }

    pub fn dmg_palette(self) -> PpuRegister {
        if self.0 & 0x10 == 0 {
            PpuRegister::Obp0
        } else {
            PpuRegister::Obp1
        }
    }

    pub fn bank(self) -> usize {
        if self.0 & 0x08 == 0 { 0 } else { 1 }
    }

    pub fn color_palette_index(self) -> usize {
        (self.0 & 0x07) as usize
    }
}
