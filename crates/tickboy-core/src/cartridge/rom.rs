use super::battery::Battery;
use super::{RAM_BANK_SIZE, is_ram_window};
use crate::address_space::AddressSpace;

/// No bank controller: 32 KiB of ROM and, for ROM+RAM boards, up to 8 KiB of
/// always-enabled external RAM.
pub struct Rom {
    rom: Vec<u8>,
    ram: Vec<u8>,
    battery: Box<dyn Battery>,
}

impl Rom {
    pub fn new(rom: Vec<u8>, mut battery: Box<dyn Battery>, ram_banks: usize) -> Self {
        let mut ram = vec![0xff; ram_banks.min(1) * RAM_BANK_SIZE];
        if !ram.is_empty() {
            battery.load_ram(&mut ram);
        }
        Self { rom, ram, battery }
    }

    pub fn flush(&mut self) {
        if !self.ram.is_empty() {
            self.battery.save_ram(&self.ram);
        }
    }
}

impl AddressSpace for Rom {
    fn accepts(&self, address: u16) -> bool {
        address < 0x8000 || is_ram_window(address)
    }

    fn read(&self, address: u16) -> u8 {
        let slot = if address < 0x8000 {
            self.rom.get(address as usize)
        } else {
            self.ram.get((address - 0xa000) as usize)
        };
        slot.copied().unwrap_or(0xff)
    }

    fn write(&mut self, address: u16, value: u8) {
        if is_ram_window(address)
            && let Some(b) = self.ram.get_mut((address - 0xa000) as usize)
        {
            *b = value;
        }
    }
}
