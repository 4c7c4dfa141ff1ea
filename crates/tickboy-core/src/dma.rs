use std::cell::RefCell;
use std::rc::Rc;

use crate::address_space::{AddressSpace, Ram};
use crate::hardware::SpeedMode;
use crate::mmu::Mmu;

pub const DMA_ADDR: u16 = 0xff46;
const OAM_START: u16 = 0xfe00;
const OAM_SIZE: u16 = 0xa0;
// Master ticks from the FF46 write to the copy, in normal speed
const TRANSFER_TICKS: u32 = 648;

/// OAM DMA (FF46). The copy lands in one step once the transfer time has
/// elapsed; OAM is blocked for the PPU/CPU in the meantime.
pub struct Dma {
    oam: Rc<RefCell<Ram>>,
    speed_mode: Rc<RefCell<SpeedMode>>,
    transfer_in_progress: bool,
    restarted: bool,
    from: u16,
    ticks: u32,
    reg_value: u8,
}

impl Dma {
    pub fn new(oam: Rc<RefCell<Ram>>, speed_mode: Rc<RefCell<SpeedMode>>) -> Self {
        Self {
            oam,
            speed_mode,
            transfer_in_progress: false,
            restarted: false,
            from: 0,
            ticks: 0,
            reg_value: 0xff,
        }
    }

    /// Returns the source address when the copy is due. The caller then runs
    /// [`Dma::transfer`] with no mutable borrow held.
    pub fn tick(&mut self) -> Option<u16> {
        if !self.transfer_in_progress {
            return None;
        }
        self.ticks += 1;
        if self.ticks >= TRANSFER_TICKS / self.speed_mode.borrow().mode() {
            self.transfer_in_progress = false;
            self.restarted = false;
            self.ticks = 0;
            Some(self.from)
        } else {
            None
        }
    }

    /// Copy 0xA0 bytes from `from` into OAM. Sources at E000 and above read
    /// the WRAM they echo.
    pub fn transfer(&self, from: u16, mmu: &Mmu) {
        let mut buffer = [0u8; OAM_SIZE as usize];
        for (i, b) in buffer.iter_mut().enumerate() {
            let address = from.wrapping_add(i as u16);
            *b = if address < 0xe000 {
                mmu.read(address)
            } else {
                mmu.read(address - 0x2000)
            };
        }
        let mut oam = self.oam.borrow_mut();
        for (i, b) in buffer.iter().enumerate() {
            oam.write(OAM_START + i as u16, *b);
        }
    }

    pub fn is_oam_blocked(&self) -> bool {
        self.restarted || (self.transfer_in_progress && self.ticks >= 5)
    }
}

impl AddressSpace for Dma {
    fn accepts(&self, address: u16) -> bool {
        address == DMA_ADDR
    }

    fn read(&self, _address: u16) -> u8 {
        self.reg_value
    }

    fn write(&mut self, _address: u16, value: u8) {
        self.from = value as u16 * 0x100;
        self.restarted = self.is_oam_blocked();
        self.ticks = 0;
        self.transfer_in_progress = true;
        self.reg_value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmu::shared;

    fn setup() -> (Rc<RefCell<Dma>>, Rc<RefCell<Ram>>, Rc<RefCell<SpeedMode>>, Mmu) {
        let oam = Rc::new(RefCell::new(Ram::new(OAM_START, OAM_SIZE as usize)));
        let speed = Rc::new(RefCell::new(SpeedMode::new()));
        let dma = Rc::new(RefCell::new(Dma::new(Rc::clone(&oam), Rc::clone(&speed))));
        let mut mmu = Mmu::new();
        let wram = shared(Ram::new(0xc000, 0x2000));
        for i in 0..0x2000u16 {
            wram.borrow_mut().write(0xc000 + i, (i & 0xff) as u8 ^ 0x5a);
        }
        mmu.add_address_space(wram);
        (dma, oam, speed, mmu)
    }

    fn run(dma: &Rc<RefCell<Dma>>, mmu: &Mmu) -> u32 {
        let mut ticks = 0;
        loop {
            ticks += 1;
            let due = dma.borrow_mut().tick();
            if let Some(from) = due {
                dma.borrow().transfer(from, mmu);
                return ticks;
            }
        }
    }

    #[test]
    fn copies_after_648_ticks() {
        let (dma, oam, _, mmu) = setup();
        dma.borrow_mut().write(DMA_ADDR, 0xc1);
        assert_eq!(dma.borrow().read(DMA_ADDR), 0xc1);
        assert_eq!(run(&dma, &mmu), 648);
        let oam = oam.borrow();
        assert_eq!(oam.read(0xfe00), 0x5a);
        assert_eq!(oam.read(0xfe9f), 0x9f ^ 0x5a);
        assert!(!dma.borrow().is_oam_blocked());
    }

    #[test]
    fn double_speed_halves_the_delay() {
        let (dma, _, speed, mmu) = setup();
        speed.borrow_mut().write(0xff4d, 1);
        speed.borrow_mut().on_stop();
        dma.borrow_mut().write(DMA_ADDR, 0xc0);
        assert_eq!(run(&dma, &mmu), 324);
    }

    #[test]
    fn echo_source_reads_wram() {
        let (dma, oam, _, mmu) = setup();
        dma.borrow_mut().write(DMA_ADDR, 0xe0);
        run(&dma, &mmu);
        assert_eq!(oam.borrow().read(0xfe01), 0x01 ^ 0x5a);
    }

    #[test]
    fn oam_block_window() {
        let (dma, _, _, _) = setup();
        dma.borrow_mut().write(DMA_ADDR, 0xc0);
        for _ in 0..4 {
            dma.borrow_mut().tick();
        }
        assert!(!dma.borrow().is_oam_blocked(), "still accessible during setup");
        dma.borrow_mut().tick();
        assert!(dma.borrow().is_oam_blocked());
        // a restart keeps OAM blocked through the new setup window
        dma.borrow_mut().write(DMA_ADDR, 0xc0);
        assert!(dma.borrow().is_oam_blocked());
    }
}
