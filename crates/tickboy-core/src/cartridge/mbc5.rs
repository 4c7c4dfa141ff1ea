use super::battery::Battery;
use super::{RAM_BANK_SIZE, is_ram_enable, is_ram_window, rom_byte};
use crate::address_space::AddressSpace;

pub struct Mbc5 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    battery: Box<dyn Battery>,
    rom_banks: usize,
    ram_banks: usize,
    rumble: bool,
    rom_bank: usize,
    ram_bank: usize,
    ram_enabled: bool,
}

impl Mbc5 {
    pub fn new(
        rom: Vec<u8>,
        mut battery: Box<dyn Battery>,
        rom_banks: usize,
        ram_banks: usize,
        rumble: bool,
    ) -> Self {
        let mut ram = vec![0xff; ram_banks * RAM_BANK_SIZE];
        battery.load_ram(&mut ram);
        Self {
            rom,
            ram,
            battery,
            rom_banks,
            ram_banks,
            rumble,
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
        }
    }

    fn ram_index(&self, address: u16) -> Option<usize> {
        if !self.ram_enabled || self.ram_banks == 0 {
            return None;
        }
        Some((self.ram_bank % self.ram_banks) * RAM_BANK_SIZE + (address - 0xa000) as usize)
    }

    pub fn flush(&mut self) {
        if !self.ram.is_empty() {
            self.battery.save_ram(&self.ram);
        }
    }
}

impl AddressSpace for Mbc5 {
    fn accepts(&self, address: u16) -> bool {
        address < 0x8000 || is_ram_window(address)
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3fff => rom_byte(&self.rom, 0, address),
            0x4000..=0x7fff => rom_byte(&self.rom, self.rom_bank % self.rom_banks, address),
            _ => self
                .ram_index(address)
                .and_then(|i| self.ram.get(i))
                .copied()
                .unwrap_or(0xff),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1fff => {
                let enabled = is_ram_enable(value);
                if self.ram_enabled && !enabled {
                    self.flush();
                }
                self.ram_enabled = enabled;
            }
            0x2000..=0x2fff => self.rom_bank = (self.rom_bank & 0x100) | value as usize,
            0x3000..=0x3fff => {
                self.rom_bank = (self.rom_bank & 0xff) | ((value as usize & 0x01) << 8);
            }
            0x4000..=0x5fff => {
                // bit 3 drives the motor on rumble carts
                let mask = if self.rumble { 0x07 } else { 0x0f };
                self.ram_bank = (value & mask) as usize;
            }
            0x6000..=0x7fff => {}
            _ => {
                if let Some(i) = self.ram_index(address)
                    && let Some(b) = self.ram.get_mut(i)
                {
                    *b = value;
                }
            }
        }
    }
}
