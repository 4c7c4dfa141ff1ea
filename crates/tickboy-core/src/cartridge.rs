pub mod battery;
mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;
mod rom;
pub mod rtc;

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::address_space::AddressSpace;
use crate::error::{EmulatorError, Result};
use crate::options::GameboyOptions;

use battery::{Battery, FileBattery, NullBattery};
use mbc1::Mbc1;
use mbc2::Mbc2;
use mbc3::Mbc3;
use mbc5::Mbc5;
use rom::Rom;
use rtc::{Clock, SystemClock};

pub(crate) const ROM_BANK_SIZE: usize = 0x4000;
pub(crate) const RAM_BANK_SIZE: usize = 0x2000;

const BOOT_ROM_REG: u16 = 0xff50;
const DMG_BOOT_ROM_SIZE: usize = 0x100;
const CGB_BOOT_ROM_SIZE: usize = 0x900;

const ROM_EXTENSIONS: [&str; 3] = ["gb", "gbc", "rom"];

pub(crate) fn rom_byte(rom: &[u8], bank: usize, address: u16) -> u8 {
    rom.get(bank * ROM_BANK_SIZE + (address as usize & (ROM_BANK_SIZE - 1)))
        .copied()
        .unwrap_or(0xff)
}

pub(crate) fn is_ram_window(address: u16) -> bool {
    (0xa000..0xc000).contains(&address)
}

pub(crate) fn is_ram_enable(value: u8) -> bool {
    value & 0x0f == 0x0a
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

/// Cartridge type byte at 0x147.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeType {
    Rom,
    Mbc1,
    Mbc1Ram,
    Mbc1RamBattery,
    Mbc2,
    Mbc2Battery,
    RomRam,
    RomRamBattery,
    Mmm01,
    Mmm01Sram,
    Mmm01SramBattery,
    Mbc3TimerBattery,
    Mbc3TimerRamBattery,
    Mbc3,
    Mbc3Ram,
    Mbc3RamBattery,
    Mbc5,
    Mbc5Ram,
    Mbc5RamBattery,
    Mbc5Rumble,
    Mbc5RumbleSram,
    Mbc5RumbleSramBattery,
}

impl CartridgeType {
    pub fn from_byte(id: u8) -> Result<Self> {
        use CartridgeType::*;
        Ok(match id {
            0x00 => Rom,
            0x01 => Mbc1,
            0x02 => Mbc1Ram,
            0x03 => Mbc1RamBattery,
            0x05 => Mbc2,
            0x06 => Mbc2Battery,
            0x08 => RomRam,
            0x09 => RomRamBattery,
            0x0b => Mmm01,
            0x0c => Mmm01Sram,
            0x0d => Mmm01SramBattery,
            0x0f => Mbc3TimerBattery,
            0x10 => Mbc3TimerRamBattery,
            0x11 => Mbc3,
            0x12 => Mbc3Ram,
            0x13 => Mbc3RamBattery,
            0x19 => Mbc5,
            0x1a => Mbc5Ram,
            0x1b => Mbc5RamBattery,
            0x1c => Mbc5Rumble,
            0x1d => Mbc5RumbleSram,
            0x1e => Mbc5RumbleSramBattery,
            other => return Err(EmulatorError::UnsupportedCartridgeType(other)),
        })
    }

    /// MMM01 carts run as plain ROM.
    pub fn mbc_type(self) -> MbcType {
        use CartridgeType::*;
        match self {
            Mbc1 | Mbc1Ram | Mbc1RamBattery => MbcType::Mbc1,
            Mbc2 | Mbc2Battery => MbcType::Mbc2,
            Mbc3TimerBattery | Mbc3TimerRamBattery | Mbc3 | Mbc3Ram | Mbc3RamBattery => {
                MbcType::Mbc3
            }
            Mbc5 | Mbc5Ram | Mbc5RamBattery | Mbc5Rumble | Mbc5RumbleSram
            | Mbc5RumbleSramBattery => MbcType::Mbc5,
            Rom | RomRam | RomRamBattery | Mmm01 | Mmm01Sram | Mmm01SramBattery => {
                MbcType::NoMbc
            }
        }
    }

    pub fn has_ram(self) -> bool {
        use CartridgeType::*;
        matches!(
            self,
            Mbc1Ram
                | Mbc1RamBattery
                | RomRam
                | RomRamBattery
                | Mmm01Sram
                | Mmm01SramBattery
                | Mbc3TimerRamBattery
                | Mbc3Ram
                | Mbc3RamBattery
                | Mbc5Ram
                | Mbc5RamBattery
                | Mbc5RumbleSram
                | Mbc5RumbleSramBattery
        )
    }

    pub fn has_battery(self) -> bool {
        use CartridgeType::*;
        matches!(
            self,
            Mbc1RamBattery
                | Mbc2Battery
                | RomRamBattery
                | Mmm01SramBattery
                | Mbc3TimerBattery
                | Mbc3TimerRamBattery
                | Mbc3RamBattery
                | Mbc5RamBattery
                | Mbc5RumbleSramBattery
        )
    }

    pub fn has_timer(self) -> bool {
        matches!(
            self,
            CartridgeType::Mbc3TimerBattery | CartridgeType::Mbc3TimerRamBattery
        )
    }

    pub fn has_rumble(self) -> bool {
        matches!(
            self,
            CartridgeType::Mbc5Rumble
                | CartridgeType::Mbc5RumbleSram
                | CartridgeType::Mbc5RumbleSramBattery
        )
    }
}

/// CGB flag at 0x143.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameboyTypeFlag {
    Universal,
    Cgb,
    NonCgb,
}

impl GameboyTypeFlag {
    fn from_byte(value: u8) -> Self {
        match value {
            0x80 => GameboyTypeFlag::Universal,
            0xc0 => GameboyTypeFlag::Cgb,
            _ => GameboyTypeFlag::NonCgb,
        }
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn byte(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    fn title(&self) -> String {
        let end = 0x0143.min(self.data.len());
        let mut slice = &self.data[0x0134.min(end)..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).to_string()
    }

    fn gameboy_type(&self) -> GameboyTypeFlag {
        GameboyTypeFlag::from_byte(self.byte(0x0143))
    }

    fn cartridge_type(&self) -> Result<CartridgeType> {
        CartridgeType::from_byte(self.byte(0x0147))
    }

    fn rom_banks(&self) -> Result<usize> {
        match self.byte(0x0148) {
            code @ 0..=7 => Ok(2 << code),
            0x52 => Ok(72),
            0x53 => Ok(80),
            0x54 => Ok(96),
            code => Err(EmulatorError::UnsupportedRomSize(code)),
        }
    }

    fn ram_banks(&self) -> Result<usize> {
        match self.byte(0x0149) {
            0 => Ok(0),
            1 | 2 => Ok(1),
            3 => Ok(4),
            4 => Ok(16),
            code => Err(EmulatorError::UnsupportedRamSize(code)),
        }
    }
}

enum Mapper {
    Rom(Rom),
    Mbc1(Mbc1),
    Mbc2(Mbc2),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

impl Mapper {
    fn space(&self) -> &dyn AddressSpace {
        match self {
            Mapper::Rom(m) => m,
            Mapper::Mbc1(m) => m,
            Mapper::Mbc2(m) => m,
            Mapper::Mbc3(m) => m,
            Mapper::Mbc5(m) => m,
        }
    }

    fn space_mut(&mut self) -> &mut dyn AddressSpace {
        match self {
            Mapper::Rom(m) => m,
            Mapper::Mbc1(m) => m,
            Mapper::Mbc2(m) => m,
            Mapper::Mbc3(m) => m,
            Mapper::Mbc5(m) => m,
        }
    }

    fn flush(&mut self) {
        match self {
            Mapper::Rom(m) => m.flush(),
            Mapper::Mbc1(m) => m.flush(),
            Mapper::Mbc2(m) => m.flush(),
            Mapper::Mbc3(m) => m.flush(),
            Mapper::Mbc5(m) => m.flush(),
        }
    }
}

/// The cartridge slot: bank controller, optional battery, and the boot ROM
/// overlay that stays mapped until the first write to FF50.
pub struct Cartridge {
    mapper: Mapper,
    title: String,
    cartridge_type: CartridgeType,
    gameboy_type: GameboyTypeFlag,
    gbc: bool,
    boot_rom: Option<Vec<u8>>,
}

impl Cartridge {
    /// Loads `options.rom_file`, unpacking `.zip` archives, with the battery
    /// stored next to it.
    pub fn from_file(options: &GameboyOptions) -> Result<Self> {
        let path = options.rom_file.as_deref().ok_or(EmulatorError::MissingRom)?;
        let rom = load_rom_file(path)?;
        let battery: Box<dyn Battery> = if options.supports_battery_saves() {
            Box::new(FileBattery::for_rom(path))
        } else {
            Box::new(NullBattery)
        };
        Self::build(options, rom, battery, Box::new(SystemClock))
    }

    /// Builds a cartridge from an in-memory image. Battery saves are off.
    pub fn from_bytes(options: &GameboyOptions, rom: Vec<u8>) -> Result<Self> {
        Self::build(options, rom, Box::new(NullBattery), Box::new(SystemClock))
    }

    pub fn with_battery(
        options: &GameboyOptions,
        rom: Vec<u8>,
        battery: Box<dyn Battery>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        Self::build(options, rom, battery, clock)
    }

    fn build(
        options: &GameboyOptions,
        rom: Vec<u8>,
        battery: Box<dyn Battery>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let header = Header::parse(&rom);
        let cartridge_type = header.cartridge_type()?;
        let title = header.title();
        let gameboy_type = header.gameboy_type();
        let rom_banks = header.rom_banks()?;
        let mut ram_banks = header.ram_banks()?;
        if ram_banks == 0 && cartridge_type.has_ram() {
            log::debug!("RAM bank count is 0, using 1");
            ram_banks = 1;
        }

        let gbc = if options.force_cgb {
            true
        } else {
            match gameboy_type {
                GameboyTypeFlag::NonCgb => false,
                GameboyTypeFlag::Cgb => true,
                GameboyTypeFlag::Universal => !options.force_dmg,
            }
        };

        let boot_rom = if options.use_bootstrap {
            Some(load_boot_rom(options, gbc)?)
        } else {
            None
        };

        let battery: Box<dyn Battery> = if cartridge_type.has_battery() {
            battery
        } else {
            Box::new(NullBattery)
        };

        let mapper = match cartridge_type.mbc_type() {
            MbcType::NoMbc => Mapper::Rom(Rom::new(rom, battery, ram_banks)),
            MbcType::Mbc1 => Mapper::Mbc1(Mbc1::new(rom, battery, rom_banks, ram_banks)),
            MbcType::Mbc2 => Mapper::Mbc2(Mbc2::new(rom, battery, rom_banks)),
            MbcType::Mbc3 => {
                let clock = cartridge_type.has_timer().then_some(clock);
                Mapper::Mbc3(Mbc3::new(rom, battery, rom_banks, ram_banks, clock))
            }
            MbcType::Mbc5 => Mapper::Mbc5(Mbc5::new(
                rom,
                battery,
                rom_banks,
                ram_banks,
                cartridge_type.has_rumble(),
            )),
        };

        log::info!(
            "Loaded ROM: {title} ({cartridge_type:?}, {rom_banks} ROM banks, {ram_banks} RAM banks, CGB: {})",
            if gbc { "yes" } else { "no" }
        );

        Ok(Self {
            mapper,
            title,
            cartridge_type,
            gameboy_type,
            gbc,
            boot_rom,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_gbc(&self) -> bool {
        self.gbc
    }

    pub fn cartridge_type(&self) -> CartridgeType {
        self.cartridge_type
    }

    pub fn gameboy_type(&self) -> GameboyTypeFlag {
        self.gameboy_type
    }

    pub fn is_boot_rom_mapped(&self) -> bool {
        self.boot_rom.is_some()
    }

    /// Write battery-backed RAM (and the clock) to storage.
    pub fn flush(&mut self) {
        self.mapper.flush();
    }

    fn boot_byte(&self, address: u16) -> Option<u8> {
        let boot = self.boot_rom.as_ref()?;
        let a = address as usize;
        let overlaid = a < 0x100 || (self.gbc && (0x200..CGB_BOOT_ROM_SIZE).contains(&a));
        if overlaid { boot.get(a).copied() } else { None }
    }
}

impl AddressSpace for Cartridge {
    fn accepts(&self, address: u16) -> bool {
        address == BOOT_ROM_REG || self.mapper.space().accepts(address)
    }

    fn read(&self, address: u16) -> u8 {
        if address == BOOT_ROM_REG {
            return 0xff;
        }
        match self.boot_byte(address) {
            Some(b) => b,
            None => self.mapper.space().read(address),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == BOOT_ROM_REG {
            if self.boot_rom.take().is_some() {
                log::debug!("boot ROM unmapped");
            }
        } else {
            self.mapper.space_mut().write(address, value);
        }
    }
}

fn has_rom_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ROM_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Reads a ROM image, or the first ROM entry of a `.zip` archive.
pub fn load_rom_file(path: &Path) -> Result<Vec<u8>> {
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Ok(fs::read(path)?);
    }

    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() || !has_rom_extension(Path::new(entry.name())) {
            continue;
        }
        log::debug!("using {} from {}", entry.name(), path.display());
        let mut rom = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut rom)?;
        return Ok(rom);
    }
    Err(EmulatorError::NoRomInArchive)
}

fn load_boot_rom(options: &GameboyOptions, gbc: bool) -> Result<Vec<u8>> {
    let path = options.boot_rom.as_deref().ok_or(EmulatorError::MissingBootRom)?;
    let image = fs::read(path)?;
    let expected = if gbc {
        CGB_BOOT_ROM_SIZE
    } else {
        DMG_BOOT_ROM_SIZE
    };
    if image.len() != expected {
        return Err(EmulatorError::BootRomSize {
            expected,
            actual: image.len(),
        });
    }
    Ok(image)
}

/// ROM where every byte of bank `n` is `n as u8`.
#[cfg(test)]
pub(crate) fn banked_rom(banks: usize) -> Vec<u8> {
    (0..banks)
        .flat_map(|bank| std::iter::repeat_n(bank as u8, ROM_BANK_SIZE))
        .collect()
}
