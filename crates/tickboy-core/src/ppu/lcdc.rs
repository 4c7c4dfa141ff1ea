use crate::address_space::{AddressSpace, Register, RegisterType};

pub const LCDC_ADDR: u16 = 0xff40;

/// LCD control register (FF40). See gbdev.io/pandocs/LCDC.html.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcdc {
    pub value: u8,
}

impl Default for Lcdc {
    fn default() -> Self {
        Self { value: 0x91 }
    }
}

impl Lcdc {
    pub fn is_bg_and_window_display(&self) -> bool {
        self.value & 0x01 != 0
    }

    pub fn is_obj_display(&self) -> bool {
        self.value & 0x02 != 0
    }

    pub fn sprite_height(&self) -> i32 {
        if self.value & 0x04 == 0 { 8 } else { 16 }
    }

    pub fn bg_tile_map_display(&self) -> u16 {
        if self.value & 0x08 == 0 { 0x9800 } else { 0x9c00 }
    }

    pub fn bg_window_tile_data(&self) -> u16 {
        if self.value & 0x10 == 0 { 0x9000 } else { 0x8000 }
    }

    /// The 0x9000 tile block is addressed with signed tile ids.
    pub fn is_bg_window_tile_data_signed(&self) -> bool {
        self.value & 0x10 == 0
    }

    pub fn is_window_display(&self) -> bool {
        self.value & 0x20 != 0
    }

    pub fn window_tile_map_display(&self) -> u16 {
        if self.value & 0x40 == 0 { 0x9800 } else { 0x9c00 }
    }

    pub fn is_lcd_enabled(&self) -> bool {
        self.value & 0x80 != 0
    }
}

impl AddressSpace for Lcdc {
    fn accepts(&self, address: u16) -> bool {
        address == LCDC_ADDR
    }

    fn read(&self, _address: u16) -> u8 {
        self.value
    }

    fn write(&mut self, _address: u16, value: u8) {
        self.value = value;
    }
}

/// PPU registers other than LCDC and the CGB palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuRegister {
    Stat,
    Scy,
    Scx,
    Ly,
    Lyc,
    Bgp,
    Obp0,
    Obp1,
    Wy,
    Wx,
    Vbk,
}

impl PpuRegister {
    pub const ALL: [PpuRegister; 11] = [
        PpuRegister::Stat,
        PpuRegister::Scy,
        PpuRegister::Scx,
        PpuRegister::Ly,
        PpuRegister::Lyc,
        PpuRegister::Bgp,
        PpuRegister::Obp0,
        PpuRegister::Obp1,
        PpuRegister::Wy,
        PpuRegister::Wx,
        PpuRegister::Vbk,
    ];
}

impl Register for PpuRegister {
    fn address(&self) -> u16 {
        match self {
            PpuRegister::Stat => 0xff41,
            PpuRegister::Scy => 0xff42,
            PpuRegister::Scx => 0xff43,
            PpuRegister::Ly => 0xff44,
            PpuRegister::Lyc => 0xff45,
            PpuRegister::Bgp => 0xff47,
            PpuRegister::Obp0 => 0xff48,
            PpuRegister::Obp1 => 0xff49,
            PpuRegister::Wy => 0xff4a,
            PpuRegister::Wx => 0xff4b,
            PpuRegister::Vbk => 0xff4f,
        }
    }

    fn kind(&self) -> RegisterType {
        match self {
            PpuRegister::Ly => RegisterType::R,
            PpuRegister::Vbk => RegisterType::W,
            _ => RegisterType::RW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_value() {
        let lcdc = Lcdc::default();
        assert!(lcdc.is_lcd_enabled());
        assert!(lcdc.is_bg_and_window_display());
        assert!(!lcdc.is_obj_display());
        assert_eq!(lcdc.bg_window_tile_data(), 0x8000);
        assert!(!lcdc.is_bg_window_tile_data_signed());
        assert_eq!(lcdc.bg_tile_map_display(), 0x9800);
    }

    #[test]
    fn tall_sprites_and_maps() {
        let lcdc = Lcdc { value: 0x4c };
        assert_eq!(lcdc.sprite_height(), 16);
        assert_eq!(lcdc.bg_tile_map_display(), 0x9c00);
        assert_eq!(lcdc.window_tile_map_display(), 0x9c00);
        assert_eq!(lcdc.bg_window_tile_data(), 0x9000);
    }
}
