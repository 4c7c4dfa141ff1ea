#![allow(dead_code)]

use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tickboy_core::cartridge::Cartridge;
use tickboy_core::cpu::CpuState;
use tickboy_core::serial::SerialEndpoint;
use tickboy_core::{Gameboy, GameboyOptions, Peripherals};

static INIT: OnceCell<()> = OnceCell::new();

const BUNDLE_URL: &str =
    "https://github.com/c-sp/game-boy-test-roms/releases/download/v7.0/game-boy-test-roms-v7.0.zip";

// One emulated second in master ticks
pub const SECOND: u64 = 4_194_304;

fn ensure_test_roms() {
    INIT.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms");
        fs::create_dir_all(&dir).expect("failed to create test_roms directory");
        ensure_c_sp_test_rom_bundle(&dir);
    });
}

fn ensure_c_sp_test_rom_bundle(dir: &Path) {
    // ROM binaries are not checked in; fetch the bundle once per checkout.
    let has_core_tree = dir.join("blargg").exists() && dir.join("mooneye-test-suite").exists();
    if has_core_tree {
        return;
    }

    let resp = reqwest::blocking::get(BUNDLE_URL).expect("failed to download test roms");
    let status = resp.status();
    if !status.is_success() {
        panic!("failed to download test roms: {status}");
    }
    let bytes = resp.bytes().expect("failed to read rom bytes");
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).expect("failed to open zip archive");
    archive.extract(dir).expect("failed to extract test roms");
}

pub fn roms_dir() -> PathBuf {
    ensure_test_roms();
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms")
}

pub fn rom_path<P: AsRef<Path>>(relative: P) -> PathBuf {
    roms_dir().join(relative)
}

/// Keeps every byte the game shifts out of the serial port.
#[derive(Clone, Default)]
pub struct CollectingEndpoint {
    output: Rc<RefCell<Vec<u8>>>,
}

impl CollectingEndpoint {
    pub fn output(&self) -> Vec<u8> {
        self.output.borrow().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output.borrow()).into_owned()
    }
}

impl SerialEndpoint for CollectingEndpoint {
    fn transfer(&mut self, outgoing: u8) -> io::Result<u8> {
        self.output.borrow_mut().push(outgoing);
        Ok(0xff)
    }
}

pub fn boot<P: AsRef<Path>>(rom_path: P, options: &GameboyOptions) -> (Gameboy, CollectingEndpoint) {
    let rom = fs::read(rom_path.as_ref())
        .unwrap_or_else(|e| panic!("rom not found: {}: {e}", rom_path.as_ref().display()));
    let cartridge = Cartridge::from_bytes(options, rom).expect("unsupported cartridge");
    let serial = CollectingEndpoint::default();
    let peripherals = Peripherals {
        serial_endpoint: Box::new(serial.clone()),
        ..Peripherals::default()
    };
    (Gameboy::new(options, cartridge, peripherals), serial)
}

/// Opcode about to be fetched, if the CPU sits on an instruction boundary.
pub fn next_opcode(gb: &Gameboy) -> Option<u8> {
    if gb.cpu().state() != CpuState::Opcode {
        return None;
    }
    Some(gb.mmu().read(gb.cpu().registers.pc))
}

fn bytes_at_pc(gb: &Gameboy, seq: &[u8]) -> bool {
    if gb.cpu().state() != CpuState::Opcode {
        return false;
    }
    let pc = gb.cpu().registers.pc;
    seq.iter()
        .enumerate()
        .all(|(i, &b)| gb.mmu().read(pc.wrapping_add(i as u16)) == b)
}

/// `JR -2` or `JP pc`.
fn is_spinning(gb: &Gameboy) -> bool {
    let [lo, hi] = gb.cpu().registers.pc.to_le_bytes();
    bytes_at_pc(gb, &[0x18, 0xfe]) || bytes_at_pc(gb, &[0xc3, lo, hi])
}

fn serial_contains_result(serial: &str) -> bool {
    serial.contains("Passed") || serial.contains("Failed")
}

/// Runs a test that reports over the serial port until it prints its
/// verdict, parks in a `JR -2` loop, or `max_ticks` run out.
pub fn run_serial_test<P: AsRef<Path>>(rom_path: P, max_ticks: u64) -> String {
    let (mut gb, serial) = boot(rom_path, &GameboyOptions::default());
    let mut checked_at = 0;
    while gb.ticks() < max_ticks {
        gb.tick().expect("cpu fault");
        // the verdict is polled once per frame
        if gb.frames() != checked_at {
            checked_at = gb.frames();
            if serial_contains_result(&serial.text()) {
                break;
            }
        }
        if is_spinning(&gb) && !serial.output.borrow().is_empty() {
            break;
        }
    }
    serial.text()
}

pub enum MemoryResult {
    Passed(String),
    Failed(u8, String),
    Timeout,
}

const SIGNATURE: [u8; 3] = [0xde, 0xb0, 0x61];

fn memory_text(gb: &Gameboy) -> String {
    let mut text = Vec::new();
    let mut address = 0xa004u16;
    while address < 0xc000 {
        let b = gb.mmu().read(address);
        if b == 0 {
            break;
        }
        text.push(b);
        address += 1;
    }
    String::from_utf8_lossy(&text).into_owned()
}

/// Runs a test that publishes its result in cartridge RAM: the signature at
/// A001-A003 and a status byte at A000 that stays 0x80 while running.
pub fn run_memory_test<P: AsRef<Path>>(rom_path: P, max_ticks: u64) -> MemoryResult {
    let (mut gb, _) = boot(rom_path, &GameboyOptions::default());
    let mut checked_at = 0;
    let mut started = false;
    while gb.ticks() < max_ticks {
        gb.tick().expect("cpu fault");
        if gb.frames() == checked_at {
            continue;
        }
        checked_at = gb.frames();
        let mmu = gb.mmu();
        let signed = (0..3).all(|i| mmu.read(0xa001 + i) == SIGNATURE[i as usize]);
        if !signed {
            continue;
        }
        match mmu.read(0xa000) {
            0x80 => started = true,
            0x00 if started => return MemoryResult::Passed(memory_text(&gb)),
            status if started => return MemoryResult::Failed(status, memory_text(&gb)),
            _ => {}
        }
    }
    MemoryResult::Timeout
}

const FIB_SEQ: [u8; 6] = [3, 5, 8, 13, 21, 34];
const FAIL_SEQ: [u8; 6] = [0x42; 6];

/// Runs a test that signals its verdict with the Fibonacci numbers (pass) or
/// 0x42 (fail) in B, C, D, E, H and L, either at an `LD B,B` breakpoint or
/// when it parks in the `NOP; JR -3` loop.
pub fn run_mooneye_test<P: AsRef<Path>>(
    rom_path: P,
    options: &GameboyOptions,
    max_ticks: u64,
) -> bool {
    let (mut gb, _) = boot(rom_path, options);
    while gb.ticks() < max_ticks {
        gb.tick().expect("cpu fault");
        let parked = bytes_at_pc(&gb, &[0x00, 0x18, 0xfd]);
        if !parked && next_opcode(&gb) != Some(0x40) {
            continue;
        }
        let r = &gb.cpu().registers;
        let regs = [r.b, r.c, r.d, r.e, r.h, r.l];
        if regs == FIB_SEQ {
            return true;
        }
        if regs == FAIL_SEQ || parked {
            println!("mooneye test failed at pc={:04X} regs={regs:02X?}", r.pc);
            return false;
        }
    }
    let r = &gb.cpu().registers;
    println!(
        "mooneye test timed out: pc={:04X} af={:04X} bc={:04X} de={:04X} hl={:04X} sp={:04X}",
        r.pc,
        r.af(),
        r.bc(),
        r.de(),
        r.hl(),
        r.sp
    );
    false
}
