use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::address_space::{Ram, ShadowAddressSpace, SharedSpace};
use crate::apu::{NullSoundOutput, Sound, SoundOutput};
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::display::{Display, NullDisplay};
use crate::dma::Dma;
use crate::error::Result;
use crate::hardware::SpeedMode;
use crate::hdma::{self, Hdma};
use crate::interrupts::InterruptManager;
use crate::joypad::{Controller, Joypad, NullController};
use crate::mmu::{self, GbcRam, Mmu, UndocumentedGbcRegisters};
use crate::options::GameboyOptions;
use crate::ppu::{Ppu, PpuMode};
use crate::serial::{NullSerialEndpoint, SerialEndpoint, SerialPort};
use crate::timer::Timer;

/// Cloneable flag that ends [`Gameboy::run`] from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything the machine talks to outside itself.
pub struct Peripherals {
    pub display: Box<dyn Display>,
    pub sound_output: Box<dyn SoundOutput>,
    pub controller: Box<dyn Controller>,
    pub serial_endpoint: Box<dyn SerialEndpoint>,
}

impl Default for Peripherals {
    fn default() -> Self {
        Self {
            display: Box::new(NullDisplay),
            sound_output: Box::new(NullSoundOutput),
            controller: Box::new(NullController),
            serial_endpoint: Box::new(NullSerialEndpoint::default()),
        }
    }
}

type TickListener = Box<dyn FnMut(&Gameboy)>;

/// The whole machine. Every component advances once per master tick, in
/// the order of [`Gameboy::tick`].
pub struct Gameboy {
    gbc: bool,
    mmu: Rc<Mmu>,
    cpu: Cpu,
    interrupts: Rc<RefCell<InterruptManager>>,
    ppu: Rc<RefCell<Ppu>>,
    timer: Rc<RefCell<Timer>>,
    dma: Rc<RefCell<Dma>>,
    hdma: Rc<RefCell<Hdma>>,
    sound: Rc<RefCell<Sound>>,
    serial: Rc<RefCell<SerialPort>>,
    joypad: Rc<RefCell<Joypad>>,
    cartridge: Rc<RefCell<Cartridge>>,
    controller: Box<dyn Controller>,
    tick_listeners: Vec<TickListener>,
    stop: StopHandle,
    requested_screen_refresh: bool,
    lcd_disabled: bool,
    frames: u64,
    ticks: u64,
}

impl Gameboy {
    pub fn new(options: &GameboyOptions, cartridge: Cartridge, peripherals: Peripherals) -> Self {
        let gbc = cartridge.is_gbc();
        let Peripherals {
            display,
            sound_output,
            controller,
            serial_endpoint,
        } = peripherals;

        let speed_mode = Rc::new(RefCell::new(SpeedMode::new()));
        let interrupts = mmu::shared(InterruptManager::new(gbc));
        let oam = Rc::new(RefCell::new(Ram::new(0xfe00, 0xa0)));
        let dma = mmu::shared(Dma::new(Rc::clone(&oam), Rc::clone(&speed_mode)));
        let ppu = mmu::shared(Ppu::new(
            display,
            Rc::clone(&interrupts),
            Rc::clone(&dma),
            oam,
            gbc,
        ));
        let timer = mmu::shared(Timer::new(Rc::clone(&interrupts), Rc::clone(&speed_mode)));
        let joypad = mmu::shared(Joypad::new(Rc::clone(&interrupts)));
        let serial = mmu::shared(SerialPort::new(
            Rc::clone(&interrupts),
            serial_endpoint,
            Rc::clone(&speed_mode),
            gbc,
        ));
        let sound = mmu::shared(Sound::new(sound_output, gbc));
        let hdma = mmu::shared(Hdma::new());
        let cartridge = mmu::shared(cartridge);

        let mut mmu = Mmu::new();
        let wram0: SharedSpace = mmu::shared(Ram::new(0xc000, 0x1000));
        let regions: [SharedSpace; 8] = [
            cartridge.clone(),
            ppu.clone(),
            joypad.clone(),
            interrupts.clone(),
            serial.clone(),
            timer.clone(),
            dma.clone(),
            sound.clone(),
        ];
        for region in regions {
            mmu.add_address_space(region);
        }
        mmu.add_address_space(Rc::clone(&wram0));
        let wram1: SharedSpace = if gbc {
            mmu.add_address_space(speed_mode.clone());
            mmu.add_address_space(hdma.clone());
            mmu::shared(GbcRam::new())
        } else {
            mmu::shared(Ram::new(0xd000, 0x1000))
        };
        mmu.add_address_space(Rc::clone(&wram1));
        if gbc {
            mmu.add_address_space(mmu::shared(UndocumentedGbcRegisters::new()));
        }
        mmu.add_address_space(mmu::shared(Ram::new(0xff80, 0x7f)));
        mmu.add_address_space(mmu::shared(ShadowAddressSpace::new(
            vec![wram0, wram1],
            0xe000,
            0xc000,
            0x1e00,
        )));
        let mmu = Rc::new(mmu);

        let mut cpu = Cpu::new(
            Rc::clone(&mmu),
            Rc::clone(&interrupts),
            Some(Rc::clone(&ppu)),
            speed_mode,
        );
        if !options.use_bootstrap {
            cpu.init_registers(gbc);
        }

        let lcd_enabled = ppu.borrow().is_lcd_enabled();
        hdma.borrow_mut().on_lcd_switch(lcd_enabled);

        log::debug!(
            "machine ready: {} regions, {}",
            mmu.region_count(),
            if gbc { "CGB" } else { "DMG" }
        );

        Self {
            gbc,
            mmu,
            cpu,
            interrupts,
            ppu,
            timer,
            dma,
            hdma,
            sound,
            serial,
            joypad,
            cartridge,
            controller,
            tick_listeners: Vec::new(),
            stop: StopHandle::new(),
            requested_screen_refresh: false,
            lcd_disabled: !lcd_enabled,
            frames: 0,
            ticks: 0,
        }
    }

    pub fn is_gbc(&self) -> bool {
        self.gbc
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn ppu(&self) -> &Rc<RefCell<Ppu>> {
        &self.ppu
    }

    pub fn interrupts(&self) -> &Rc<RefCell<InterruptManager>> {
        &self.interrupts
    }

    pub fn cartridge(&self) -> &Rc<RefCell<Cartridge>> {
        &self.cartridge
    }

    /// Frames completed, counted on VBlank entry.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn add_tick_listener(&mut self, listener: impl FnMut(&Gameboy) + 'static) {
        self.tick_listeners.push(Box::new(listener));
    }

    /// Write battery-backed cartridge RAM out.
    pub fn flush_battery(&self) {
        self.cartridge.borrow_mut().flush();
    }

    /// Advance every component by one master tick. Returns the new PPU mode
    /// when it changed.
    fn step(&mut self) -> Result<Option<PpuMode>> {
        self.timer.borrow_mut().tick();

        let hdma_active = self.hdma.borrow().is_transfer_in_progress();
        if hdma_active {
            let block = self.hdma.borrow_mut().tick();
            if let Some((src, dst)) = block {
                hdma::copy_block(&self.mmu, src, dst);
            }
        } else {
            self.cpu.tick()?;
        }

        let dma_source = self.dma.borrow_mut().tick();
        if let Some(from) = dma_source {
            self.dma.borrow().transfer(from, &self.mmu);
        }

        self.sound.borrow_mut().tick();
        self.serial.borrow_mut().tick();
        let new_mode = self.ppu.borrow_mut().tick();
        self.ticks += 1;
        Ok(new_mode)
    }

    /// One master tick plus the frame handshake with the display and the
    /// tick listeners.
    pub fn tick(&mut self) -> Result<()> {
        let new_mode = self.step()?;
        if let Some(mode) = new_mode {
            self.hdma.borrow_mut().on_gpu_update(Some(mode));
        }

        let lcd_enabled = self.ppu.borrow().is_lcd_enabled();
        if !self.lcd_disabled && !lcd_enabled {
            self.lcd_disabled = true;
            self.ppu.borrow_mut().display_mut().request_refresh();
            self.hdma.borrow_mut().on_lcd_switch(false);
        } else if new_mode == Some(PpuMode::VBlank) {
            self.frames += 1;
            self.requested_screen_refresh = true;
            self.ppu.borrow_mut().display_mut().request_refresh();
            self.poll_controller();
        }

        if self.lcd_disabled && lcd_enabled {
            self.lcd_disabled = false;
            self.ppu.borrow_mut().display_mut().wait_for_refresh();
            self.hdma.borrow_mut().on_lcd_switch(true);
        } else if self.requested_screen_refresh && new_mode == Some(PpuMode::OamSearch) {
            self.requested_screen_refresh = false;
            self.ppu.borrow_mut().display_mut().wait_for_refresh();
        }

        if !self.tick_listeners.is_empty() {
            let mut listeners = std::mem::take(&mut self.tick_listeners);
            for listener in &mut listeners {
                listener(self);
            }
            self.tick_listeners = listeners;
        }
        Ok(())
    }

    fn poll_controller(&mut self) {
        let events = self.controller.poll();
        if events.is_empty() {
            return;
        }
        let mut joypad = self.joypad.borrow_mut();
        for event in events {
            joypad.handle(event);
        }
    }

    /// Tick until the stop handle fires or the CPU hits an unknown opcode.
    /// Battery RAM is flushed either way.
    pub fn run(&mut self) -> Result<()> {
        log::info!("emulation started");
        let result = (|| {
            while !self.stop.is_stopped() {
                self.tick()?;
            }
            Ok(())
        })();
        self.flush_battery();
        log::info!("emulation stopped after {} frames", self.frames);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joypad::{Button, ButtonEvent, QueuedController};

    const FRAME_TICKS: u64 = 456 * 154;

    /// 32 KiB ROM whose entry point spins on `JR -2`.
    fn spin_rom(cgb_flag: u8) -> Vec<u8> {
        let mut rom = vec![0; 0x8000];
        rom[0x100] = 0x18;
        rom[0x101] = 0xfe;
        rom[0x143] = cgb_flag;
        rom
    }

    fn gameboy(cgb_flag: u8, peripherals: Peripherals) -> Gameboy {
        let options = GameboyOptions::default();
        let cart = Cartridge::from_bytes(&options, spin_rom(cgb_flag)).unwrap();
        Gameboy::new(&options, cart, peripherals)
    }

    #[test]
    fn starts_with_post_boot_registers() {
        let dmg = gameboy(0x00, Peripherals::default());
        let r = &dmg.cpu().registers;
        assert_eq!((r.pc, r.sp, r.a), (0x0100, 0xfffe, 0x01));
        assert!(!dmg.is_gbc());

        let cgb = gameboy(0xc0, Peripherals::default());
        assert_eq!(cgb.cpu().registers.a, 0x11);
        assert!(cgb.is_gbc());
    }

    #[test]
    fn echo_ram_mirrors_work_ram() {
        let gb = gameboy(0x00, Peripherals::default());
        gb.mmu().write(0xc123, 0x42);
        assert_eq!(gb.mmu().read(0xe123), 0x42);
        gb.mmu().write(0xfdff, 0x17);
        assert_eq!(gb.mmu().read(0xddff), 0x17);
        gb.mmu().write(0xff80, 0x99);
        assert_eq!(gb.mmu().read(0xff80), 0x99);
    }

    #[test]
    fn cgb_maps_banked_wram() {
        let gb = gameboy(0x80, Peripherals::default());
        gb.mmu().write(0xff70, 0x02);
        gb.mmu().write(0xd000, 0x22);
        gb.mmu().write(0xff70, 0x03);
        assert_ne!(gb.mmu().read(0xd000), 0x22);
        gb.mmu().write(0xff70, 0x02);
        assert_eq!(gb.mmu().read(0xf000), 0x22, "echo follows the bank");
    }

    #[test]
    fn counts_frames_and_runs_listeners() {
        let mut gb = gameboy(0x00, Peripherals::default());
        let seen = Rc::new(RefCell::new(0u64));
        let counter = Rc::clone(&seen);
        gb.add_tick_listener(move |_| *counter.borrow_mut() += 1);
        for _ in 0..FRAME_TICKS * 2 {
            gb.tick().unwrap();
        }
        assert_eq!(*seen.borrow(), FRAME_TICKS * 2);
        assert_eq!(gb.ticks(), FRAME_TICKS * 2);
        assert_eq!(gb.frames(), 2);
        assert!((0x0100..=0x0102).contains(&gb.cpu().registers.pc));
    }

    #[test]
    fn controller_events_reach_joypad_on_vblank() {
        let controller = QueuedController::new();
        controller.push(ButtonEvent::Pressed(Button::Start));
        let peripherals = Peripherals {
            controller: Box::new(controller),
            ..Peripherals::default()
        };
        let mut gb = gameboy(0x00, peripherals);
        gb.mmu().write(0xff00, 0x10);
        assert_eq!(gb.mmu().read(0xff00) & 0x0f, 0x0f);
        while gb.frames() == 0 {
            gb.tick().unwrap();
        }
        assert_eq!(gb.mmu().read(0xff00) & 0x0f, 0x07);
    }

    #[test]
    fn stop_handle_ends_run() {
        let mut gb = gameboy(0x00, Peripherals::default());
        let stop = gb.stop_handle();
        gb.add_tick_listener(move |gb| {
            if gb.ticks() == 1_000 {
                stop.stop();
            }
        });
        gb.run().unwrap();
        assert_eq!(gb.ticks(), 1_000);
    }
}
