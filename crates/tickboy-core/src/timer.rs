use std::cell::RefCell;
use std::rc::Rc;

use crate::address_space::AddressSpace;
use crate::hardware::SpeedMode;
use crate::interrupts::{InterruptManager, InterruptType};

// DIV bit watched for each TAC frequency select
const FREQ_TO_BIT: [u32; 4] = [9, 3, 5, 7];

pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    previous_bit: bool,
    /// TIMA wrapped and the reload from TMA is pending
    overflow: bool,
    ticks_since_overflow: u8,
    interrupts: Rc<RefCell<InterruptManager>>,
    speed_mode: Rc<RefCell<SpeedMode>>,
}

impl Timer {
    pub fn new(interrupts: Rc<RefCell<InterruptManager>>, speed_mode: Rc<RefCell<SpeedMode>>) -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            previous_bit: false,
            overflow: false,
            ticks_since_overflow: 0,
            interrupts,
            speed_mode,
        }
    }

    /// Advance one master cycle. After an overflow TIMA reads 0 for four
    /// cycles, the interrupt fires on the fourth and TMA is loaded on the
    /// fifth and sixth.
    pub fn tick(&mut self) {
        self.update_div(self.div.wrapping_add(1));
        if self.overflow {
            self.ticks_since_overflow += 1;
            match self.ticks_since_overflow {
                4 => self
                    .interrupts
                    .borrow_mut()
                    .request_interrupt(InterruptType::Timer),
                5 => self.tima = self.tma,
                6 => {
                    self.tima = self.tma;
                    self.overflow = false;
                    self.ticks_since_overflow = 0;
                }
                _ => {}
            }
        }
    }

    fn inc_tima(&mut self) {
        self.tima = self.tima.wrapping_add(1);
        if self.tima == 0 {
            self.overflow = true;
            self.ticks_since_overflow = 0;
        }
    }

    /// TIMA counts falling edges of the selected DIV bit AND-ed with the
    /// enable bit, so DIV resets and TAC writes can also clock it.
    fn update_div(&mut self, new_div: u16) {
        self.div = new_div;
        let bit_pos = FREQ_TO_BIT[(self.tac & 0b11) as usize] << (self.speed_mode.borrow().mode() - 1);
        let bit = self.div & (1 << bit_pos) != 0 && self.tac & 0b100 != 0;
        if !bit && self.previous_bit {
            self.inc_tima();
        }
        self.previous_bit = bit;
    }
}

impl AddressSpace for Timer {
    fn accepts(&self, address: u16) -> bool {
        (0xff04..=0xff07).contains(&address)
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0xff04 => (self.div >> 8) as u8,
            0xff05 => self.tima,
            0xff06 => self.tma,
            0xff07 => self.tac | 0b1111_1000,
            _ => 0xff,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0xff04 => self.update_div(0),
            0xff05 => {
                // writes in the reload cycles are ignored
                if self.ticks_since_overflow < 5 {
                    self.tima = value;
                    self.overflow = false;
                    self.ticks_since_overflow = 0;
                }
            }
            0xff06 => self.tma = value,
            0xff07 => self.tac = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> (Timer, Rc<RefCell<InterruptManager>>) {
        let im = Rc::new(RefCell::new(InterruptManager::new(false)));
        let speed = Rc::new(RefCell::new(SpeedMode::new()));
        (Timer::new(im.clone(), speed), im)
    }

    #[test]
    fn div_counts_every_256_ticks() {
        let (mut t, _) = timer();
        for _ in 0..256 {
            t.tick();
        }
        assert_eq!(t.read(0xff04), 1);
        t.write(0xff04, 0x55);
        assert_eq!(t.read(0xff04), 0);
    }

    #[test]
    fn tima_increments_at_selected_rate() {
        let (mut t, _) = timer();
        // enabled, 262144 Hz: one increment per 16 ticks
        t.write(0xff07, 0b101);
        for _ in 0..16 * 10 {
            t.tick();
        }
        assert_eq!(t.read(0xff05), 10);
        assert_eq!(t.read(0xff07), 0xfd);
    }

    #[test]
    fn overflow_reloads_after_delay() {
        let (mut t, im) = timer();
        im.borrow_mut().write(0xff0f, 0);
        t.write(0xff06, 0xab);
        t.write(0xff05, 0xff);
        t.write(0xff07, 0b101);
        // the 16th tick wraps TIMA and counts as the first delay cycle
        for _ in 0..16 {
            t.tick();
        }
        assert_eq!(t.read(0xff05), 0x00, "TIMA reads 0 right after overflow");
        for _ in 0..2 {
            t.tick();
        }
        assert_eq!(im.borrow().read(0xff0f) & 0x04, 0, "no interrupt yet");
        t.tick();
        assert_eq!(im.borrow().read(0xff0f) & 0x04, 0x04, "interrupt on 4th tick");
        t.tick();
        assert_eq!(t.read(0xff05), 0xab, "TMA loaded on 5th tick");
    }

    #[test]
    fn div_reset_can_clock_tima() {
        let (mut t, _) = timer();
        t.write(0xff07, 0b101);
        // bit 3 of DIV is set after 8 ticks
        for _ in 0..8 {
            t.tick();
        }
        assert_eq!(t.read(0xff05), 0);
        t.write(0xff04, 0);
        assert_eq!(t.read(0xff05), 1, "falling edge from the reset");
    }
}
