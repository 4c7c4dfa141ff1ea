use crate::address_space::AddressSpace;

/// Interrupt sources in priority order. The discriminant is the bit in IF/IE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    VBlank = 0,
    Lcdc = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl InterruptType {
    pub const ALL: [InterruptType; 5] = [
        InterruptType::VBlank,
        InterruptType::Lcdc,
        InterruptType::Timer,
        InterruptType::Serial,
        InterruptType::Joypad,
    ];

    #[inline]
    pub fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Address the CPU jumps to when servicing this interrupt.
    #[inline]
    pub fn vector(self) -> u16 {
        0x0040 + 8 * self as u16
    }
}

/// IME plus the IF (FF0F) and IE (FFFF) registers.
///
/// EI takes effect after the following instruction; on CGB DI is delayed the
/// same way. The delay counters tick in `on_instruction_finished`.
#[derive(Debug)]
pub struct InterruptManager {
    cgb: bool,
    ime: bool,
    interrupt_flag: u8,
    interrupt_enabled: u8,
    pending_enable: i8,
    pending_disable: i8,
}

impl InterruptManager {
    pub fn new(cgb: bool) -> Self {
        Self {
            cgb,
            ime: false,
            interrupt_flag: 0xe1,
            interrupt_enabled: 0,
            pending_enable: -1,
            pending_disable: -1,
        }
    }

    pub fn is_ime(&self) -> bool {
        self.ime
    }

    pub fn enable_interrupts(&mut self, with_delay: bool) {
        self.pending_disable = -1;
        if with_delay {
            if self.pending_enable == -1 {
                self.pending_enable = 1;
            }
        } else {
            self.pending_enable = -1;
            self.ime = true;
        }
    }

    pub fn disable_interrupts(&mut self, with_delay: bool) {
        self.pending_enable = -1;
        if with_delay && self.cgb {
            if self.pending_disable == -1 {
                self.pending_disable = 1;
            }
        } else {
            self.pending_disable = -1;
            self.ime = false;
        }
    }

    pub fn request_interrupt(&mut self, kind: InterruptType) {
        self.interrupt_flag |= kind.bit();
    }

    pub fn clear_interrupt(&mut self, kind: InterruptType) {
        self.interrupt_flag &= !kind.bit();
    }

    pub fn on_instruction_finished(&mut self) {
        if self.pending_enable != -1 {
            let was = self.pending_enable;
            self.pending_enable -= 1;
            if was == 0 {
                self.enable_interrupts(false);
            }
        }
        if self.pending_disable != -1 {
            let was = self.pending_disable;
            self.pending_disable -= 1;
            if was == 0 {
                self.disable_interrupts(false);
            }
        }
    }

    pub fn is_interrupt_requested(&self) -> bool {
        self.interrupt_flag & self.interrupt_enabled != 0
    }

    /// HALT with IME set and an interrupt already pending skips the PC
    /// increment of the next fetch.
    pub fn is_halt_bug(&self) -> bool {
        (self.interrupt_flag & self.interrupt_enabled & 0x1f) != 0 && self.ime
    }
}

impl AddressSpace for InterruptManager {
    fn accepts(&self, address: u16) -> bool {
        address == 0xff0f || address == 0xffff
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0xff0f => self.interrupt_flag,
            0xffff => self.interrupt_enabled,
            _ => 0xff,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0xff0f => self.interrupt_flag = value | 0xe0,
            0xffff => self.interrupt_enabled = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_follow_priority() {
        let vectors: Vec<u16> = InterruptType::ALL.iter().map(|t| t.vector()).collect();
        assert_eq!(vectors, vec![0x40, 0x48, 0x50, 0x58, 0x60]);
    }

    #[test]
    fn ei_is_delayed_by_one_instruction() {
        let mut im = InterruptManager::new(false);
        im.enable_interrupts(true);
        assert!(!im.is_ime());
        // EI itself finishes
        im.on_instruction_finished();
        assert!(!im.is_ime());
        // the instruction after EI finishes
        im.on_instruction_finished();
        assert!(im.is_ime());
    }

    #[test]
    fn di_delay_only_on_cgb() {
        let mut dmg = InterruptManager::new(false);
        dmg.enable_interrupts(false);
        dmg.disable_interrupts(true);
        assert!(!dmg.is_ime(), "DMG DI is immediate");

        let mut cgb = InterruptManager::new(true);
        cgb.enable_interrupts(false);
        cgb.disable_interrupts(true);
        assert!(cgb.is_ime());
        cgb.on_instruction_finished();
        cgb.on_instruction_finished();
        assert!(!cgb.is_ime());
    }

    #[test]
    fn if_upper_bits_read_as_set() {
        let mut im = InterruptManager::new(false);
        assert_eq!(im.read(0xff0f), 0xe1);
        im.write(0xff0f, 0x00);
        assert_eq!(im.read(0xff0f), 0xe0);
        im.request_interrupt(InterruptType::Timer);
        assert_eq!(im.read(0xff0f), 0xe4);
        im.write(0xffff, 0x04);
        assert!(im.is_interrupt_requested());
        im.clear_interrupt(InterruptType::Timer);
        assert!(!im.is_interrupt_requested());
    }
}
