//! Cycle-accurate Game Boy / Game Boy Color emulation core.
//!
//! Every component advances in lockstep with the 4 MiHz master clock. The
//! crate is platform-agnostic: frontends plug in a [`display::Display`], an
//! [`apu::SoundOutput`], a [`joypad::Controller`] and a
//! [`serial::SerialEndpoint`] and drive the machine through [`gameboy`].

/// Memory-mapped regions: plain RAM, echo RAM and register banks.
pub mod address_space;

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// Lock-free sample queue between the APU and an audio backend.
pub mod audio_queue;

pub mod bit_utils;

/// Cartridge mappers (MBC) and ROM/RAM/RTC handling.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// Pixel sinks and the frame handshake with the presenting thread.
pub mod display;

/// OAM DMA.
pub mod dma;

pub mod error;

/// High-level facade that wires every component into a single machine.
pub mod gameboy;

/// Master clock and the CGB speed switch.
pub mod hardware;

/// CGB VRAM DMA.
pub mod hdma;

pub mod interrupts;

/// Joypad input register and controller plumbing.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

pub mod options;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Serial unit and link cable plumbing.
pub mod serial;

/// Divider/timer unit.
pub mod timer;

pub use error::{EmulatorError, Result};
pub use gameboy::{Gameboy, Peripherals, StopHandle};
pub use options::GameboyOptions;
