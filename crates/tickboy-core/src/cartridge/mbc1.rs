use super::battery::Battery;
use super::{RAM_BANK_SIZE, is_ram_enable, is_ram_window, rom_byte};
use crate::address_space::AddressSpace;

const NINTENDO_LOGO: [u8; 48] = [
    0xce, 0xed, 0x66, 0x66, 0xcc, 0x0d, 0x00, 0x0b, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0c, 0x00, 0x0d,
    0x00, 0x08, 0x11, 0x1f, 0x88, 0x89, 0x00, 0x0e, 0xdc, 0xcc, 0x6e, 0xe6, 0xdd, 0xdd, 0xd9, 0x99,
    0xbb, 0xbb, 0x67, 0x63, 0x6e, 0x0e, 0xec, 0xcc, 0xdd, 0xdc, 0x99, 0x9f, 0xbb, 0xb9, 0x33, 0x3e,
];

// Multicart boards put one game in every 256 KiB
const MULTICART_GAME_SIZE: usize = 0x40000;

pub struct Mbc1 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    battery: Box<dyn Battery>,
    rom_banks: usize,
    ram_banks: usize,
    multicart: bool,
    /// BANK1: low five bits of the ROM bank.
    bank1: u8,
    /// BANK2: RAM bank, or ROM bank bits 5-6.
    bank2: u8,
    advanced_mode: bool,
    ram_enabled: bool,
}

impl Mbc1 {
    pub fn new(
        rom: Vec<u8>,
        mut battery: Box<dyn Battery>,
        rom_banks: usize,
        ram_banks: usize,
    ) -> Self {
        let multicart = rom_banks == 64 && is_multicart(&rom);
        if multicart {
            log::info!("MBC1 multicart detected");
        }
        let mut ram = vec![0xff; ram_banks * RAM_BANK_SIZE];
        battery.load_ram(&mut ram);
        Self {
            rom,
            ram,
            battery,
            rom_banks,
            ram_banks,
            multicart,
            bank1: 1,
            bank2: 0,
            advanced_mode: false,
            ram_enabled: false,
        }
    }

    fn bank2_shift(&self) -> u32 {
        if self.multicart { 4 } else { 5 }
    }

    fn rom_bank_0000(&self) -> usize {
        if !self.advanced_mode {
            return 0;
        }
        ((self.bank2 as usize) << self.bank2_shift()) % self.rom_banks
    }

    fn rom_bank_4000(&self) -> usize {
        let mut low = if self.bank1 == 0 { 1 } else { self.bank1 as usize };
        if self.multicart {
            low &= 0x0f;
        }
        (((self.bank2 as usize) << self.bank2_shift()) | low) % self.rom_banks
    }

    fn ram_index(&self, address: u16) -> usize {
        let bank = if self.advanced_mode && self.ram_banks > 0 {
            self.bank2 as usize % self.ram_banks
        } else {
            0
        };
        bank * RAM_BANK_SIZE + (address - 0xa000) as usize
    }

    pub fn flush(&mut self) {
        if !self.ram.is_empty() {
            self.battery.save_ram(&self.ram);
        }
    }
}

impl AddressSpace for Mbc1 {
    fn accepts(&self, address: u16) -> bool {
        address < 0x8000 || is_ram_window(address)
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3fff => rom_byte(&self.rom, self.rom_bank_0000(), address),
            0x4000..=0x7fff => rom_byte(&self.rom, self.rom_bank_4000(), address),
            _ if self.ram_enabled => self
                .ram
                .get(self.ram_index(address))
                .copied()
                .unwrap_or(0xff),
            _ => 0xff,
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
            0x2000..=0x3fff => self.bank1 = value & 0x1f,
            0x4000..=0x5fff => self.bank2 = value & 0x03,
            0x6000..=0x7fff => self.advanced_mode = value & 0x01 != 0,
            _ if self.ram_enabled => {
                let i = self.ram_index(address);
                if let Some(b) = self.ram.get_mut(i) {
                    *b = value;
                }
            }
            _ => {}
        }
    }
}

fn is_multicart(rom: &[u8]) -> bool {
    (0..rom.len())
        .step_by(MULTICART_GAME_SIZE)
        .filter(|&base| rom.get(base + 0x104..base + 0x134) == Some(&NINTENDO_LOGO[..]))
        .count()
        > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::banked_rom;
    use crate::cartridge::battery::NullBattery;

    fn mbc1(rom_banks: usize, ram_banks: usize) -> Mbc1 {
        Mbc1::new(banked_rom(rom_banks), Box::new(NullBattery), rom_banks, ram_banks)
    }

    #[test]
    fn bank_zero_maps_to_one() {
        let mut mbc = mbc1(32, 0);
        assert_eq!(mbc.read(0x4000), 1);
        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), 1);
        mbc.write(0x2000, 0x1f);
        assert_eq!(mbc.read(0x4000), 0x1f);
        // only the low five bits count
        mbc.write(0x2000, 0x22);
        assert_eq!(mbc.read(0x4000), 0x02);
    }

    #[test]
    fn high_bits_select_upper_banks() {
        let mut mbc = mbc1(128, 0);
        mbc.write(0x4000, 0x02);
        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), 0x41);
        assert_eq!(mbc.read(0x0000), 0x00);
        mbc.write(0x6000, 0x01);
        assert_eq!(mbc.read(0x0000), 0x40, "mode 1 banks the low window");
    }

    #[test]
    fn banks_wrap_on_small_roms() {
        let mut mbc = mbc1(4, 0);
        mbc.write(0x2000, 0x05);
        assert_eq!(mbc.read(0x4000), 0x01);
    }

    #[test]
    fn ram_needs_enable_and_mode_for_banking() {
        let mut mbc = mbc1(4, 4);
        mbc.write(0xa000, 0x12);
        assert_eq!(mbc.read(0xa000), 0xff);

        mbc.write(0x0000, 0x0a);
        mbc.write(0xa000, 0x12);
        assert_eq!(mbc.read(0xa000), 0x12);

        mbc.write(0x4000, 0x02);
        assert_eq!(mbc.read(0xa000), 0x12, "mode 0 pins RAM bank 0");
        mbc.write(0x6000, 0x01);
        assert_eq!(mbc.read(0xa000), 0xff);
        mbc.write(0xa000, 0x34);
        mbc.write(0x6000, 0x00);
        assert_eq!(mbc.read(0xa000), 0x12);

        mbc.write(0x0000, 0x1b);
        assert_eq!(mbc.read(0xa000), 0xff, "only 0x_a enables RAM");
    }

    #[test]
    fn detects_multicart_by_repeated_logo() {
        let mut rom = banked_rom(64);
        for game in 0..4 {
            let base = game * MULTICART_GAME_SIZE + 0x104;
            rom[base..base + 48].copy_from_slice(&NINTENDO_LOGO);
        }
        let mut mbc = Mbc1::new(rom, Box::new(NullBattery), 64, 0);
        assert!(mbc.multicart);

        mbc.write(0x4000, 0x01);
        mbc.write(0x2000, 0x02);
        assert_eq!(mbc.read(0x4000), 0x12);
        mbc.write(0x6000, 0x01);
        assert_eq!(mbc.read(0x0000), 0x10);
        // bank1 = 0x10 still counts as non-zero
        mbc.write(0x2000, 0x10);
        assert_eq!(mbc.read(0x4000), 0x10);
    }

    #[test]
    fn single_logo_is_not_multicart() {
        let mut rom = banked_rom(64);
        rom[0x104..0x134].copy_from_slice(&NINTENDO_LOGO);
        assert!(!is_multicart(&rom));
    }
}
