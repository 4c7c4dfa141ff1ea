use std::fmt;

use crate::bit_utils::{get_bit, get_lsb, get_msb, set_bit_to, to_word};

const Z_POS: u8 = 7;
const N_POS: u8 = 6;
const H_POS: u8 = 5;
const C_POS: u8 = 4;

/// The F register. The low nibble always reads as zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    bits: u8,
}

impl Flags {
    pub fn byte(&self) -> u8 {
        self.bits
    }

    pub fn set_byte(&mut self, value: u8) {
        self.bits = value & 0xf0;
    }

    pub fn z(&self) -> bool {
        get_bit(self.bits, Z_POS)
    }

    pub fn n(&self) -> bool {
        get_bit(self.bits, N_POS)
    }

    pub fn h(&self) -> bool {
        get_bit(self.bits, H_POS)
    }

    pub fn c(&self) -> bool {
        get_bit(self.bits, C_POS)
    }

    pub fn set_z(&mut self, on: bool) {
        self.bits = set_bit_to(self.bits, Z_POS, on);
    }

    pub fn set_n(&mut self, on: bool) {
        self.bits = set_bit_to(self.bits, N_POS, on);
    }

    pub fn set_h(&mut self, on: bool) {
        self.bits = set_bit_to(self.bits, H_POS, on);
    }

    pub fn set_c(&mut self, on: bool) {
        self.bits = set_bit_to(self.bits, C_POS, on);
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool, c: char| if on { c } else { '-' };
        write!(
            f,
            "{}{}{}{}----",
            flag(self.z(), 'Z'),
            flag(self.n(), 'N'),
            flag(self.h(), 'H'),
            flag(self.c(), 'C')
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub flags: Flags,
}

impl Registers {
    pub fn af(&self) -> u16 {
        to_word(self.a, self.flags.byte())
    }

    pub fn bc(&self) -> u16 {
        to_word(self.b, self.c)
    }

    pub fn de(&self) -> u16 {
        to_word(self.d, self.e)
    }

    pub fn hl(&self) -> u16 {
        to_word(self.h, self.l)
    }

    pub fn set_af(&mut self, value: u16) {
        self.a = get_msb(value);
        self.flags.set_byte(get_lsb(value));
    }

    pub fn set_bc(&mut self, value: u16) {
        self.b = get_msb(value);
        self.c = get_lsb(value);
    }

    pub fn set_de(&mut self, value: u16) {
        self.d = get_msb(value);
        self.e = get_lsb(value);
    }

    pub fn set_hl(&mut self, value: u16) {
        self.h = get_msb(value);
        self.l = get_lsb(value);
    }

    pub fn increment_pc(&mut self) {
        self.pc = self.pc.wrapping_add(1);
    }

    pub fn decrement_sp(&mut self) {
        self.sp = self.sp.wrapping_sub(1);
    }

    pub fn increment_sp(&mut self) {
        self.sp = self.sp.wrapping_add(1);
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF={:04x}, BC={:04x}, DE={:04x}, HL={:04x}, SP={:04x}, PC={:04x}, {}",
            self.af(),
            self.bc(),
            self.de(),
            self.hl(),
            self.sp,
            self.pc,
            self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f_low_nibble_is_masked() {
        let mut r = Registers::default();
        r.set_af(0x12ff);
        assert_eq!(r.a, 0x12);
        assert_eq!(r.af(), 0x12f0);
        assert_eq!(r.flags.to_string(), "ZNHC----");
    }

    #[test]
    fn pairs_split_into_halves() {
        let mut r = Registers::default();
        r.set_hl(0xbeef);
        assert_eq!((r.h, r.l), (0xbe, 0xef));
        r.sp = 0;
        r.decrement_sp();
        assert_eq!(r.sp, 0xffff);
    }
}
