mod common;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;
use tickboy_core::address_space::AddressSpace;
use tickboy_core::cartridge::battery::FileBattery;
use tickboy_core::cartridge::rtc::VirtualClock;
use tickboy_core::cartridge::{Cartridge, CartridgeType};
use tickboy_core::{EmulatorError, GameboyOptions};
use zip::write::SimpleFileOptions;

const MBC1_RAM_BATTERY: u8 = 0x03;
const MBC3_TIMER_RAM_BATTERY: u8 = 0x10;

fn rom_image(cartridge_type: u8, ram_size: u8, program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0; 0x8000];
    rom[0x134..0x134 + 4].copy_from_slice(b"TEST");
    rom[0x147] = cartridge_type;
    rom[0x148] = 0x00;
    rom[0x149] = ram_size;
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}

fn options_for(path: &Path) -> GameboyOptions {
    GameboyOptions::new(path)
}

#[test]
fn battery_ram_survives_reload() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    fs::write(&rom_path, rom_image(MBC1_RAM_BATTERY, 0x02, &[])).unwrap();
    let options = options_for(&rom_path);

    let mut cart = Cartridge::from_file(&options).unwrap();
    assert_eq!(cart.title(), "TEST");
    assert_eq!(cart.cartridge_type(), CartridgeType::Mbc1RamBattery);
    cart.write(0x0000, 0x0a);
    cart.write(0xa000, 0x12);
    cart.write(0xbfff, 0x34);
    // disabling RAM writes the save
    cart.write(0x0000, 0x00);

    let sav = dir.path().join("game.sav");
    let saved = fs::read(&sav).unwrap();
    assert_eq!(saved.len(), 0x2000);
    assert_eq!(saved[0], 0x12);
    assert_eq!(saved[0x1fff], 0x34);

    let mut reloaded = Cartridge::from_file(&options).unwrap();
    reloaded.write(0x0000, 0x0a);
    assert_eq!(reloaded.read(0xa000), 0x12);
    assert_eq!(reloaded.read(0xbfff), 0x34);
}

#[test]
fn disabled_battery_saves_leave_no_file() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    fs::write(&rom_path, rom_image(MBC1_RAM_BATTERY, 0x02, &[])).unwrap();
    let options = GameboyOptions {
        disable_battery_saves: true,
        ..options_for(&rom_path)
    };

    let mut cart = Cartridge::from_file(&options).unwrap();
    cart.write(0x0000, 0x0a);
    cart.write(0xa000, 0x12);
    cart.flush();
    assert!(!dir.path().join("game.sav").exists());
}

#[test]
fn clock_is_saved_after_ram() {
    let dir = tempdir().unwrap();
    let rom = rom_image(MBC3_TIMER_RAM_BATTERY, 0x03, &[]);
    let sav = dir.path().join("clock.sav");
    let options = GameboyOptions::default();
    let clock = VirtualClock::new();

    let mut cart = Cartridge::with_battery(
        &options,
        rom.clone(),
        Box::new(FileBattery::new(&sav)),
        Box::new(clock.clone()),
    )
    .unwrap();
    clock.forward(Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60));
    cart.flush();

    let saved = fs::read(&sav).unwrap();
    assert_eq!(saved.len(), 4 * 0x2000 + 11 * 4);

    let mut reloaded = Cartridge::with_battery(
        &options,
        rom,
        Box::new(FileBattery::new(&sav)),
        Box::new(clock.clone()),
    )
    .unwrap();
    reloaded.write(0x0000, 0x0a);
    reloaded.write(0x6000, 0x00);
    reloaded.write(0x6000, 0x01);
    let mut reg = |r: u8| {
        reloaded.write(0x4000, r);
        reloaded.read(0xa000)
    };
    assert_eq!(reg(0x09), 4, "minutes");
    assert_eq!(reg(0x0a), 3, "hours");
    assert_eq!(reg(0x0b), 2, "days");
}

#[test]
fn rom_is_read_from_zip() {
    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("game.zip");
    let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
    zip.start_file("readme.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"not a rom").unwrap();
    zip.start_file("game.gb", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&rom_image(0x00, 0x00, &[])).unwrap();
    zip.finish().unwrap();

    let cart = Cartridge::from_file(&options_for(&zip_path)).unwrap();
    assert_eq!(cart.title(), "TEST");
}

#[test]
fn zip_without_rom_is_rejected() {
    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("empty.zip");
    let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
    zip.start_file("readme.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"not a rom").unwrap();
    zip.finish().unwrap();

    let err = Cartridge::from_file(&options_for(&zip_path)).err().unwrap();
    assert!(matches!(err, EmulatorError::NoRomInArchive), "{err}");
}

#[test]
fn program_output_reaches_serial_endpoint() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("hello.gb");
    let program = [
        0x3e, 0x48, // LD A,'H'
        0xe0, 0x01, // LDH (SB),A
        0x3e, 0x81, // LD A,0x81
        0xe0, 0x02, // LDH (SC),A
        0x18, 0xfe, // JR -2
    ];
    fs::write(&rom_path, rom_image(0x00, 0x00, &program)).unwrap();

    let output = common::run_serial_test(&rom_path, common::SECOND);
    assert_eq!(output, "H");
}
