//! Arithmetic and logic functions with their exact flag behavior.
//!
//! Values travel between micro-ops as `i32` so that 8-bit, 16-bit and signed
//! relative operands share one representation; every function masks its
//! result to the width of its first argument.

use super::registers::Flags;
use crate::bit_utils::{clear_bit, get_bit, set_bit};

/// Width/kind of a value flowing through the micro-op context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    D8,
    D16,
    R8,
}

pub type UnaryFn = fn(&mut Flags, i32) -> i32;
pub type BinaryFn = fn(&mut Flags, i32, i32) -> i32;

/// Look up a one-argument function by mnemonic and operand type.
pub fn find_unary(name: &str, ty: DataType) -> Option<UnaryFn> {
    let f: UnaryFn = match (name, ty) {
        ("INC", DataType::D8) => inc8,
        ("INC", DataType::D16) => inc16,
        ("DEC", DataType::D8) => dec8,
        ("DEC", DataType::D16) => dec16,
        ("DAA", DataType::D8) => daa,
        ("CPL", DataType::D8) => cpl,
        ("SCF", DataType::D8) => scf,
        ("CCF", DataType::D8) => ccf,
        ("RLC", DataType::D8) => rlc,
        ("RRC", DataType::D8) => rrc,
        ("RL", DataType::D8) => rl,
        ("RR", DataType::D8) => rr,
        ("SLA", DataType::D8) => sla,
        ("SRA", DataType::D8) => sra,
        ("SWAP", DataType::D8) => swap,
        ("SRL", DataType::D8) => srl,
        _ => return None,
    };
    Some(f)
}

/// Look up a two-argument function by mnemonic and operand types.
pub fn find_binary(name: &str, ty1: DataType, ty2: DataType) -> Option<BinaryFn> {
    use DataType::*;
    let f: BinaryFn = match (name, ty1, ty2) {
        ("ADD", D16, D16) => add16,
        ("ADD", D16, R8) => add16_relative,
        ("ADD_SP", D16, R8) => add_sp,
        ("ADD", D8, D8) => add8,
        ("ADC", D8, D8) => adc,
        ("SUB", D8, D8) => sub,
        ("SBC", D8, D8) => sbc,
        ("AND", D8, D8) => and,
        ("OR", D8, D8) => or,
        ("XOR", D8, D8) => xor,
        ("CP", D8, D8) => cp,
        ("BIT", D8, D8) => bit,
        ("RES", D8, D8) => res,
        ("SET", D8, D8) => set,
        _ => return None,
    };
    Some(f)
}

fn inc8(flags: &mut Flags, arg: i32) -> i32 {
    let result = (arg + 1) & 0xff;
    flags.set_z(result == 0);
    flags.set_n(false);
    flags.set_h((arg & 0x0f) == 0x0f);
    result
}

fn inc16(_flags: &mut Flags, arg: i32) -> i32 {
    (arg + 1) & 0xffff
}

fn dec8(flags: &mut Flags, arg: i32) -> i32 {
    let result = (arg - 1) & 0xff;
    flags.set_z(result == 0);
    flags.set_n(true);
    flags.set_h((arg & 0x0f) == 0x00);
    result
}

fn dec16(_flags: &mut Flags, arg: i32) -> i32 {
    (arg - 1) & 0xffff
}

fn add16(flags: &mut Flags, arg1: i32, arg2: i32) -> i32 {
    flags.set_n(false);
    flags.set_h((arg1 & 0x0fff) + (arg2 & 0x0fff) > 0x0fff);
    flags.set_c(arg1 + arg2 > 0xffff);
    (arg1 + arg2) & 0xffff
}

// JR target: no flags touched
fn add16_relative(_flags: &mut Flags, arg1: i32, arg2: i32) -> i32 {
    (arg1 + arg2) & 0xffff
}

fn add_sp(flags: &mut Flags, arg1: i32, arg2: i32) -> i32 {
    flags.set_z(false);
    flags.set_n(false);
    let result = arg1 + arg2;
    flags.set_c((((arg1 & 0xff) + (arg2 & 0xff)) & 0x100) != 0);
    flags.set_h((((arg1 & 0x0f) + (arg2 & 0x0f)) & 0x10) != 0);
    result & 0xffff
}

fn daa(flags: &mut Flags, arg: i32) -> i32 {
    let mut result = arg;
    if flags.n() {
        if flags.h() {
            result = (result - 6) & 0xff;
        }
        if flags.c() {
            result = (result - 0x60) & 0xff;
        }
    } else {
        if flags.h() || (result & 0x0f) > 9 {
            result += 0x06;
        }
        if flags.c() || result > 0x9f {
            result += 0x60;
        }
    }
    flags.set_h(false);
    if result > 0xff {
        flags.set_c(true);
    }
    result &= 0xff;
    flags.set_z(result == 0);
    result
}

fn cpl(flags: &mut Flags, arg: i32) -> i32 {
    flags.set_n(true);
    flags.set_h(true);
    !arg & 0xff
}

fn scf(flags: &mut Flags, arg: i32) -> i32 {
    flags.set_n(false);
    flags.set_h(false);
    flags.set_c(true);
    arg
}

fn ccf(flags: &mut Flags, arg: i32) -> i32 {
    flags.set_n(false);
    flags.set_h(false);
    let c = flags.c();
    flags.set_c(!c);
    arg
}

fn add8(flags: &mut Flags, a: i32, b: i32) -> i32 {
    flags.set_z(((a + b) & 0xff) == 0);
    flags.set_n(false);
    flags.set_h((a & 0x0f) + (b & 0x0f) > 0x0f);
    flags.set_c(a + b > 0xff);
    (a + b) & 0xff
}

fn adc(flags: &mut Flags, a: i32, b: i32) -> i32 {
    let carry = flags.c() as i32;
    flags.set_z(((a + b + carry) & 0xff) == 0);
    flags.set_n(false);
    flags.set_h((a & 0x0f) + (b & 0x0f) + carry > 0x0f);
    flags.set_c(a + b + carry > 0xff);
    (a + b + carry) & 0xff
}

fn sub(flags: &mut Flags, a: i32, b: i32) -> i32 {
    flags.set_z(((a - b) & 0xff) == 0);
    flags.set_n(true);
    flags.set_h((b & 0x0f) > (a & 0x0f));
    flags.set_c(b > a);
    (a - b) & 0xff
}

fn sbc(flags: &mut Flags, a: i32, b: i32) -> i32 {
    let carry = flags.c() as i32;
    let res = a - b - carry;
    flags.set_z((res & 0xff) == 0);
    flags.set_n(true);
    flags.set_h(((a ^ b ^ (res & 0xff)) & 0x10) != 0);
    flags.set_c(res < 0);
    res & 0xff
}

fn and(flags: &mut Flags, a: i32, b: i32) -> i32 {
    let result = a & b;
    flags.set_z(result == 0);
    flags.set_n(false);
    flags.set_h(true);
    flags.set_c(false);
    result
}

fn or(flags: &mut Flags, a: i32, b: i32) -> i32 {
    let result = a | b;
    flags.set_z(result == 0);
    flags.set_n(false);
    flags.set_h(false);
    flags.set_c(false);
    result
}

fn xor(flags: &mut Flags, a: i32, b: i32) -> i32 {
    let result = (a ^ b) & 0xff;
    flags.set_z(result == 0);
    flags.set_n(false);
    flags.set_h(false);
    flags.set_c(false);
    result
}

fn cp(flags: &mut Flags, a: i32, b: i32) -> i32 {
    flags.set_z(((a - b) & 0xff) == 0);
    flags.set_n(true);
    flags.set_h((b & 0x0f) > (a & 0x0f));
    flags.set_c(b > a);
    a
}

fn shift_flags(flags: &mut Flags, result: i32, carry: bool) {
    flags.set_c(carry);
    flags.set_z(result == 0);
    flags.set_n(false);
    flags.set_h(false);
}

fn rlc(flags: &mut Flags, arg: i32) -> i32 {
    let carry = arg & 0x80 != 0;
    let result = ((arg << 1) & 0xff) | carry as i32;
    shift_flags(flags, result, carry);
    result
}

fn rrc(flags: &mut Flags, arg: i32) -> i32 {
    let carry = arg & 1 != 0;
    let result = (arg >> 1) | if carry { 0x80 } else { 0 };
    shift_flags(flags, result, carry);
    result
}

fn rl(flags: &mut Flags, arg: i32) -> i32 {
    let result = ((arg << 1) & 0xff) | flags.c() as i32;
    shift_flags(flags, result, arg & 0x80 != 0);
    result
}

fn rr(flags: &mut Flags, arg: i32) -> i32 {
    let result = (arg >> 1) | if flags.c() { 0x80 } else { 0 };
    shift_flags(flags, result, arg & 1 != 0);
    result
}

fn sla(flags: &mut Flags, arg: i32) -> i32 {
    let result = (arg << 1) & 0xff;
    shift_flags(flags, result, arg & 0x80 != 0);
    result
}

fn sra(flags: &mut Flags, arg: i32) -> i32 {
    let result = (arg >> 1) | (arg & 0x80);
    shift_flags(flags, result, arg & 1 != 0);
    result
}

fn swap(flags: &mut Flags, arg: i32) -> i32 {
    let result = ((arg & 0x0f) << 4) | ((arg & 0xf0) >> 4);
    shift_flags(flags, result, false);
    result
}

fn srl(flags: &mut Flags, arg: i32) -> i32 {
    let result = arg >> 1;
    shift_flags(flags, result, arg & 1 != 0);
    result
}

fn bit(flags: &mut Flags, arg1: i32, arg2: i32) -> i32 {
    flags.set_n(false);
    flags.set_h(true);
    if arg2 < 8 {
        flags.set_z(!get_bit(arg1 as u8, arg2 as u8));
    }
    arg1
}

fn res(_flags: &mut Flags, arg1: i32, arg2: i32) -> i32 {
    clear_bit(arg1 as u8, arg2 as u8) as i32
}

fn set(_flags: &mut Flags, arg1: i32, arg2: i32) -> i32 {
    set_bit(arg1 as u8, arg2 as u8) as i32
}
