use super::battery::Battery;
use super::{is_ram_enable, is_ram_window, rom_byte};
use crate::address_space::AddressSpace;

// 512 half-bytes, echoed through the whole A000-BFFF window
const RAM_SIZE: usize = 0x200;

pub struct Mbc2 {
    rom: Vec<u8>,
    ram: [u8; RAM_SIZE],
    battery: Box<dyn Battery>,
    rom_banks: usize,
    rom_bank: usize,
    ram_enabled: bool,
}

impl Mbc2 {
    pub fn new(rom: Vec<u8>, mut battery: Box<dyn Battery>, rom_banks: usize) -> Self {
        let mut ram = [0xff; RAM_SIZE];
        battery.load_ram(&mut ram);
        Self {
            rom,
            ram,
            battery,
            rom_banks,
            rom_bank: 1,
            ram_enabled: false,
        }
    }

    pub fn flush(&mut self) {
        self.battery.save_ram(&self.ram);
    }
}

impl AddressSpace for Mbc2 {
    fn accepts(&self, address: u16) -> bool {
        address < 0x8000 || is_ram_window(address)
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3fff => rom_byte(&self.rom, 0, address),
            0x4000..=0x7fff => rom_byte(&self.rom, self.rom_bank % self.rom_banks, address),
            _ if self.ram_enabled => 0xf0 | self.ram[address as usize & (RAM_SIZE - 1)],
            _ => 0xff,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            // address bit 8 picks the register
            0x0000..=0x3fff if address & 0x0100 == 0 => {
                let enabled = is_ram_enable(value);
                if self.ram_enabled && !enabled {
                    self.flush();
                }
                self.ram_enabled = enabled;
            }
            0x0000..=0x3fff => {
                self.rom_bank = match value & 0x0f {
                    0 => 1,
                    bank => bank as usize,
                };
            }
            0x4000..=0x7fff => {}
            _ if self.ram_enabled => self.ram[address as usize & (RAM_SIZE - 1)] = value & 0x0f,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::banked_rom;
    use crate::cartridge::battery::NullBattery;

    fn mbc2() -> Mbc2 {
        Mbc2::new(banked_rom(16), Box::new(NullBattery), 16)
    }

    #[test]
    fn address_bit_8_selects_register() {
        let mut mbc = mbc2();
        mbc.write(0x2000, 0x05);
        assert_eq!(mbc.read(0x4000), 1, "bit 8 clear is RAM enable");
        mbc.write(0x2100, 0x05);
        assert_eq!(mbc.read(0x4000), 5);
        mbc.write(0x0100, 0x00);
        assert_eq!(mbc.read(0x4000), 1);
    }

    #[test]
    fn half_byte_ram_echoes() {
        let mut mbc = mbc2();
        assert_eq!(mbc.read(0xa000), 0xff);
        mbc.write(0x0000, 0x0a);
        mbc.write(0xa001, 0xab);
        assert_eq!(mbc.read(0xa001), 0xfb);
        assert_eq!(mbc.read(0xa201), 0xfb);
        assert_eq!(mbc.read(0xbe01), 0xfb);
    }
}
