//! Instruction decode tables. Each opcode is a list of micro-ops; the CPU
//! runs them one at a time and spends a machine cycle on every op that
//! touches memory.

use std::fmt;
use std::sync::OnceLock;

use super::alu::{BinaryFn, DataType, UnaryFn, find_binary, find_unary};
use super::registers::Registers;
use super::sprite_bug::{CorruptionType, in_oam_area};
use crate::bit_utils::{get_bit, to_signed, to_word_le};
use crate::interrupts::InterruptManager;
use crate::mmu::Mmu;

/// Operand sources and targets, named after their assembler syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
    D8,
    D16,
    R8,
    A16,
    IndBC,
    IndDE,
    IndHL,
    IndA8,
    IndA16,
    IndC,
}

impl Argument {
    pub fn label(self) -> &'static str {
        match self {
            Argument::A => "A",
            Argument::B => "B",
            Argument::C => "C",
            Argument::D => "D",
            Argument::E => "E",
            Argument::H => "H",
            Argument::L => "L",
            Argument::AF => "AF",
            Argument::BC => "BC",
            Argument::DE => "DE",
            Argument::HL => "HL",
            Argument::SP => "SP",
            Argument::PC => "PC",
            Argument::D8 => "d8",
            Argument::D16 => "d16",
            Argument::R8 => "r8",
            Argument::A16 => "a16",
            Argument::IndBC => "(BC)",
            Argument::IndDE => "(DE)",
            Argument::IndHL => "(HL)",
            Argument::IndA8 => "(a8)",
            Argument::IndA16 => "(a16)",
            Argument::IndC => "(C)",
        }
    }

    pub fn operand_length(self) -> usize {
        match self {
            Argument::D8 | Argument::R8 | Argument::IndA8 => 1,
            Argument::D16 | Argument::A16 | Argument::IndA16 => 2,
            _ => 0,
        }
    }

    pub fn is_memory(self) -> bool {
        matches!(
            self,
            Argument::IndBC
                | Argument::IndDE
                | Argument::IndHL
                | Argument::IndA8
                | Argument::IndA16
                | Argument::IndC
        )
    }

    pub fn data_type(self) -> DataType {
        match self {
            Argument::AF
            | Argument::BC
            | Argument::DE
            | Argument::HL
            | Argument::SP
            | Argument::PC
            | Argument::D16
            | Argument::A16 => DataType::D16,
            Argument::R8 => DataType::R8,
            _ => DataType::D8,
        }
    }

    pub fn read(self, regs: &Registers, mmu: &Mmu, args: &[u8; 2]) -> i32 {
        match self {
            Argument::A => regs.a as i32,
            Argument::B => regs.b as i32,
            Argument::C => regs.c as i32,
            Argument::D => regs.d as i32,
            Argument::E => regs.e as i32,
            Argument::H => regs.h as i32,
            Argument::L => regs.l as i32,
            Argument::AF => regs.af() as i32,
            Argument::BC => regs.bc() as i32,
            Argument::DE => regs.de() as i32,
            Argument::HL => regs.hl() as i32,
            Argument::SP => regs.sp as i32,
            Argument::PC => regs.pc as i32,
            Argument::D8 => args[0] as i32,
            Argument::D16 | Argument::A16 => to_word_le(*args) as i32,
            Argument::R8 => to_signed(args[0]),
            Argument::IndBC => mmu.read(regs.bc()) as i32,
            Argument::IndDE => mmu.read(regs.de()) as i32,
            Argument::IndHL => mmu.read(regs.hl()) as i32,
            Argument::IndA8 => mmu.read(0xff00 | args[0] as u16) as i32,
            Argument::IndA16 => mmu.read(to_word_le(*args)) as i32,
            Argument::IndC => mmu.read(0xff00 | regs.c as u16) as i32,
        }
    }

    /// Immediates are read-only; the builder never emits a store to them.
    pub fn write(self, regs: &mut Registers, mmu: &Mmu, args: &[u8; 2], value: i32) {
        let byte = value as u8;
        let word = value as u16;
        match self {
            Argument::A => regs.a = byte,
            Argument::B => regs.b = byte,
            Argument::C => regs.c = byte,
            Argument::D => regs.d = byte,
            Argument::E => regs.e = byte,
            Argument::H => regs.h = byte,
            Argument::L => regs.l = byte,
            Argument::AF => regs.set_af(word),
            Argument::BC => regs.set_bc(word),
            Argument::DE => regs.set_de(word),
            Argument::HL => regs.set_hl(word),
            Argument::SP => regs.sp = word,
            Argument::PC => regs.pc = word,
            Argument::IndBC => mmu.write(regs.bc(), byte),
            Argument::IndDE => mmu.write(regs.de(), byte),
            Argument::IndHL => mmu.write(regs.hl(), byte),
            Argument::IndA8 => mmu.write(0xff00 | args[0] as u16, byte),
            Argument::IndA16 => mmu.write(to_word_le(*args), byte),
            Argument::IndC => mmu.write(0xff00 | regs.c as u16, byte),
            Argument::D8 | Argument::D16 | Argument::R8 | Argument::A16 => {
                unreachable!("store to immediate {}", self.label())
            }
        }
    }
}

/// Branch conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

impl Condition {
    fn label(self) -> &'static str {
        match self {
            Condition::NZ => "NZ",
            Condition::Z => "Z",
            Condition::NC => "NC",
            Condition::C => "C",
        }
    }

    fn holds(self, regs: &Registers) -> bool {
        match self {
            Condition::NZ => !regs.flags.z(),
            Condition::Z => regs.flags.z(),
            Condition::NC => !regs.flags.c(),
            Condition::C => regs.flags.c(),
        }
    }
}

/// One step of an instruction. The `i32` context carries the value loaded
/// by one op into the next.
#[derive(Debug, Clone)]
pub enum Op {
    Load(Argument),
    LoadWord(u16),
    Store(Argument),
    /// Low byte of a 16-bit value to `(a16)`.
    StoreWordLow,
    /// High byte of a 16-bit value to `(a16 + 1)`.
    StoreWordHigh,
    ProceedIf(Condition),
    Push1,
    Push2,
    Pop1,
    Pop2,
    AluBinary {
        name: &'static str,
        func: BinaryFn,
        arg: Argument,
    },
    AluConst {
        name: &'static str,
        func: BinaryFn,
        value: i32,
    },
    AluUnary {
        name: &'static str,
        func: UnaryFn,
        oam_bug: Option<CorruptionType>,
    },
    BitHl(u8),
    ClearZ,
    SwitchInterrupts {
        enable: bool,
        with_delay: bool,
    },
    ExtraCycle,
    ForceFinish,
}

impl Op {
    pub fn reads_memory(&self) -> bool {
        match self {
            Op::Load(arg) | Op::AluBinary { arg, .. } => arg.is_memory(),
            Op::Pop1 | Op::Pop2 | Op::BitHl(_) | Op::ExtraCycle => true,
            _ => false,
        }
    }

    pub fn writes_memory(&self) -> bool {
        match self {
            Op::Store(arg) => arg.is_memory(),
            Op::StoreWordLow | Op::StoreWordHigh | Op::Push1 | Op::Push2 => true,
            _ => false,
        }
    }

    pub fn operand_length(&self) -> usize {
        match self {
            Op::Load(arg) | Op::Store(arg) | Op::AluBinary { arg, .. } => arg.operand_length(),
            Op::StoreWordLow | Op::StoreWordHigh => Argument::IndA16.operand_length(),
            _ => 0,
        }
    }

    pub fn execute(&self, regs: &mut Registers, mmu: &Mmu, args: &[u8; 2], context: i32) -> i32 {
        match self {
            Op::Load(arg) => arg.read(regs, mmu, args),
            Op::LoadWord(value) => *value as i32,
            Op::Store(arg) => {
                arg.write(regs, mmu, args, context);
                context
            }
            Op::StoreWordLow => {
                mmu.write(to_word_le(*args), (context & 0x00ff) as u8);
                context
            }
            Op::StoreWordHigh => {
                mmu.write(to_word_le(*args).wrapping_add(1), ((context & 0xff00) >> 8) as u8);
                context
            }
            Op::Push1 => {
                regs.decrement_sp();
                mmu.write(regs.sp, ((context & 0xff00) >> 8) as u8);
                context
            }
            Op::Push2 => {
                regs.decrement_sp();
                mmu.write(regs.sp, (context & 0x00ff) as u8);
                context
            }
            Op::Pop1 => {
                let lsb = mmu.read(regs.sp) as i32;
                regs.increment_sp();
                lsb
            }
            Op::Pop2 => {
                let msb = mmu.read(regs.sp) as i32;
                regs.increment_sp();
                context | (msb << 8)
            }
            Op::AluBinary { func, arg, .. } => {
                let v2 = arg.read(regs, mmu, args);
                func(&mut regs.flags, context, v2)
            }
            Op::AluConst { func, value, .. } => func(&mut regs.flags, context, *value),
            Op::AluUnary { func, .. } => func(&mut regs.flags, context),
            Op::BitHl(bit) => {
                let value = mmu.read(regs.hl());
                regs.flags.set_n(false);
                regs.flags.set_h(true);
                if *bit < 8 {
                    regs.flags.set_z(!get_bit(value, *bit));
                }
                context
            }
            Op::ClearZ => {
                regs.flags.set_z(false);
                context
            }
            Op::ProceedIf(_)
            | Op::SwitchInterrupts { .. }
            | Op::ExtraCycle
            | Op::ForceFinish => context,
        }
    }

    pub fn switch_interrupts(&self, interrupts: &mut InterruptManager) {
        if let Op::SwitchInterrupts { enable, with_delay } = *self {
            if enable {
                interrupts.enable_interrupts(with_delay);
            } else {
                interrupts.disable_interrupts(with_delay);
            }
        }
    }

    pub fn proceed(&self, regs: &Registers) -> bool {
        match self {
            Op::ProceedIf(condition) => condition.holds(regs),
            _ => true,
        }
    }

    pub fn force_finish_cycle(&self) -> bool {
        matches!(self, Op::ForceFinish)
    }

    /// Checked before the op executes, so push/pop see the old SP.
    pub fn causes_oam_bug(&self, regs: &Registers, context: i32) -> Option<CorruptionType> {
        let sp = regs.sp as i32;
        match self {
            Op::Push1 if in_oam_area(sp) => Some(CorruptionType::Push1),
            Op::Push2 if in_oam_area(sp) => Some(CorruptionType::Push2),
            Op::Pop1 if in_oam_area(sp) => Some(CorruptionType::Pop1),
            Op::Pop2 if in_oam_area(sp) => Some(CorruptionType::Pop2),
            Op::AluUnary {
                oam_bug: Some(kind),
                ..
            } if in_oam_area(context) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Load(arg) => write!(f, "{} → [_]", arg.label()),
            Op::LoadWord(value) => write!(f, "0x{value:02X} → [__]"),
            Op::Store(arg) => write!(f, "[_] → {}", arg.label()),
            Op::StoreWordLow => write!(f, "[ _] → (a16)"),
            Op::StoreWordHigh => write!(f, "[_ ] → (a16)"),
            Op::ProceedIf(condition) => write!(f, "? {}:", condition.label()),
            Op::Push1 => write!(f, "[_ ] → (SP--)"),
            Op::Push2 => write!(f, "[ _] → (SP--)"),
            Op::Pop1 => write!(f, "(SP++) → [ _]"),
            Op::Pop2 => write!(f, "(SP++) → [_ ]"),
            Op::AluBinary { name, arg, .. } => write!(f, "{name}([_],{}) → [_]", arg.label()),
            Op::AluConst { name, value, .. } => write!(f, "{name}({value},[_]) → [_]"),
            Op::AluUnary { name, .. } => write!(f, "{name}([_]) → [_]"),
            Op::BitHl(bit) => write!(f, "BIT({bit},HL)"),
            Op::ClearZ => write!(f, "0 → Z"),
            Op::SwitchInterrupts { enable, .. } => {
                write!(f, "{} interrupts", if *enable { "enable" } else { "disable" })
            }
            Op::ExtraCycle => write!(f, "wait cycle"),
            Op::ForceFinish => write!(f, "finish cycle"),
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone)]
pub struct Opcode {
    pub opcode: u8,
    pub label: String,
    pub ops: Vec<Op>,
    /// Immediate bytes following the opcode.
    pub operand_length: usize,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x} {}", self.opcode, self.label)
    }
}

struct OpcodeBuilder {
    opcode: u8,
    label: String,
    ops: Vec<Op>,
    last_data_type: DataType,
}

impl OpcodeBuilder {
    fn new(opcode: u8, label: String) -> Self {
        Self {
            opcode,
            label,
            ops: Vec::new(),
            last_data_type: DataType::D8,
        }
    }

    fn copy_byte(&mut self, target: Argument, source: Argument) -> &mut Self {
        self.load(source).store(target)
    }

    fn load(&mut self, source: Argument) -> &mut Self {
        self.last_data_type = source.data_type();
        self.ops.push(Op::Load(source));
        self
    }

    fn load_word(&mut self, value: u16) -> &mut Self {
        self.last_data_type = DataType::D16;
        self.ops.push(Op::LoadWord(value));
        self
    }

    fn store(&mut self, target: Argument) -> &mut Self {
        if self.last_data_type == DataType::D16 && target == Argument::IndA16 {
            self.ops.push(Op::StoreWordLow);
            self.ops.push(Op::StoreWordHigh);
        } else {
            assert!(
                self.last_data_type == target.data_type(),
                "{}: can't write {:?} to {}",
                self.label,
                self.last_data_type,
                target.label()
            );
            self.ops.push(Op::Store(target));
        }
        self
    }

    fn proceed_if(&mut self, condition: Condition) -> &mut Self {
        self.ops.push(Op::ProceedIf(condition));
        self
    }

    fn push(&mut self) -> &mut Self {
        self.ops.push(Op::Push1);
        self.ops.push(Op::Push2);
        self
    }

    fn pop(&mut self) -> &mut Self {
        self.last_data_type = DataType::D16;
        self.ops.push(Op::Pop1);
        self.ops.push(Op::Pop2);
        self
    }

    fn alu(&mut self, name: &'static str, arg: Argument) -> &mut Self {
        let func = lookup_binary(name, self.last_data_type, arg.data_type());
        self.ops.push(Op::AluBinary { name, func, arg });
        self.wide_alu_cycle()
    }

    fn alu_const(&mut self, name: &'static str, value: i32) -> &mut Self {
        let func = lookup_binary(name, self.last_data_type, DataType::D8);
        self.ops.push(Op::AluConst { name, func, value });
        self.wide_alu_cycle()
    }

    fn alu_unary(&mut self, name: &'static str) -> &mut Self {
        let func = lookup_unary(name, self.last_data_type);
        let oam_bug = is_pointer_step(name, self.last_data_type).then_some(CorruptionType::IncDec);
        self.ops.push(Op::AluUnary { name, func, oam_bug });
        self.wide_alu_cycle()
    }

    /// `(HL+)` / `(HL-)` pointer update after the memory access.
    fn alu_hl(&mut self, name: &'static str) -> &mut Self {
        self.load(Argument::HL);
        let func = lookup_unary(name, DataType::D16);
        self.ops.push(Op::AluUnary {
            name,
            func,
            oam_bug: Some(CorruptionType::LdHl),
        });
        self.store(Argument::HL)
    }

    fn bit_hl(&mut self, bit: u8) -> &mut Self {
        self.ops.push(Op::BitHl(bit));
        self
    }

    fn clear_z(&mut self) -> &mut Self {
        self.ops.push(Op::ClearZ);
        self
    }

    fn switch_interrupts(&mut self, enable: bool, with_delay: bool) -> &mut Self {
        self.ops.push(Op::SwitchInterrupts { enable, with_delay });
        self
    }

    fn extra_cycle(&mut self) -> &mut Self {
        self.ops.push(Op::ExtraCycle);
        self
    }

    fn force_finish(&mut self) -> &mut Self {
        self.ops.push(Op::ForceFinish);
        self
    }

    // 16-bit ALU results take one more machine cycle
    fn wide_alu_cycle(&mut self) -> &mut Self {
        if self.last_data_type == DataType::D16 {
            self.extra_cycle();
        }
        self
    }

    fn build(self) -> Opcode {
        let operand_length = self.ops.iter().map(Op::operand_length).max().unwrap_or(0);
        Opcode {
            opcode: self.opcode,
            label: self.label,
            ops: self.ops,
            operand_length,
        }
    }
}

fn lookup_unary(name: &str, ty: DataType) -> UnaryFn {
    find_unary(name, ty).unwrap_or_else(|| panic!("no ALU function {name} for {ty:?}"))
}

fn lookup_binary(name: &str, ty1: DataType, ty2: DataType) -> BinaryFn {
    find_binary(name, ty1, ty2)
        .unwrap_or_else(|| panic!("no ALU function {name} for {ty1:?}, {ty2:?}"))
}

fn is_pointer_step(name: &str, ty: DataType) -> bool {
    ty == DataType::D16 && matches!(name, "INC" | "DEC")
}

struct Tables {
    commands: Vec<Option<Opcode>>,
    ext_commands: Vec<Option<Opcode>>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Unprefixed instruction table, indexed by opcode byte.
pub fn commands() -> &'static [Option<Opcode>] {
    &tables().commands
}

/// `0xCB`-prefixed instruction table, indexed by the second byte.
pub fn ext_commands() -> &'static [Option<Opcode>] {
    &tables().ext_commands
}

fn tables() -> &'static Tables {
    TABLES.get_or_init(build_tables)
}

const REGS_8: [Argument; 8] = [
    Argument::B,
    Argument::C,
    Argument::D,
    Argument::E,
    Argument::H,
    Argument::L,
    Argument::IndHL,
    Argument::A,
];
const REGS_16: [Argument; 4] = [Argument::BC, Argument::DE, Argument::HL, Argument::SP];
const STACK_REGS: [Argument; 4] = [Argument::BC, Argument::DE, Argument::HL, Argument::AF];
const CONDITIONS: [Condition; 4] = [Condition::NZ, Condition::Z, Condition::NC, Condition::C];
const ALU_OPS: [&str; 8] = ["ADD", "ADC", "SUB", "SBC", "AND", "XOR", "OR", "CP"];

fn indexed<T: Copy>(start: usize, step: usize, values: &[T]) -> impl Iterator<Item = (usize, T)> + '_ {
    values
        .iter()
        .enumerate()
        .map(move |(i, v)| (start + i * step, *v))
}

fn reg_cmd(table: &mut [Option<OpcodeBuilder>], opcode: usize, label: String) -> &mut OpcodeBuilder {
    assert!(
        table[opcode].is_none(),
        "opcode {opcode:02x} registered twice"
    );
    table[opcode].insert(OpcodeBuilder::new(opcode as u8, label))
}

fn reg_load(table: &mut [Option<OpcodeBuilder>], opcode: usize, target: Argument, source: Argument) -> &mut OpcodeBuilder {
    reg_cmd(table, opcode, format!("LD {},{}", target.label(), source.label())).copy_byte(target, source)
}

fn build_tables() -> Tables {
    use Argument::*;

    let mut op: Vec<Option<OpcodeBuilder>> = (0..0x100).map(|_| None).collect();
    let mut ext: Vec<Option<OpcodeBuilder>> = (0..0x100).map(|_| None).collect();

    reg_cmd(&mut op, 0x00, "NOP".into());
    for (i, t) in indexed(0x01, 0x10, &REGS_16) {
        reg_load(&mut op, i, t, D16);
    }
    for (i, t) in indexed(0x02, 0x10, &[IndBC, IndDE]) {
        reg_load(&mut op, i, t, A);
    }
    for (i, t) in indexed(0x03, 0x10, &REGS_16) {
        reg_cmd(&mut op, i, format!("INC {}", t.label())).load(t).alu_unary("INC").store(t);
    }
    for (i, t) in indexed(0x04, 0x08, &REGS_8) {
        reg_cmd(&mut op, i, format!("INC {}", t.label())).load(t).alu_unary("INC").store(t);
    }
    for (i, t) in indexed(0x05, 0x08, &REGS_8) {
        reg_cmd(&mut op, i, format!("DEC {}", t.label())).load(t).alu_unary("DEC").store(t);
    }
    for (i, t) in indexed(0x06, 0x08, &REGS_8) {
        reg_load(&mut op, i, t, D8);
    }
    for (i, o) in indexed(0x07, 0x08, &["RLC", "RRC", "RL", "RR"]) {
        reg_cmd(&mut op, i, format!("{o}A")).load(A).alu_unary(o).clear_z().store(A);
    }
    reg_load(&mut op, 0x08, IndA16, SP);
    for (i, t) in indexed(0x09, 0x10, &REGS_16) {
        reg_cmd(&mut op, i, format!("ADD HL,{}", t.label())).load(HL).alu("ADD", t).store(HL);
    }
    for (i, t) in indexed(0x0a, 0x10, &[IndBC, IndDE]) {
        reg_load(&mut op, i, A, t);
    }
    for (i, t) in indexed(0x0b, 0x10, &REGS_16) {
        reg_cmd(&mut op, i, format!("DEC {}", t.label())).load(t).alu_unary("DEC").store(t);
    }
    reg_cmd(&mut op, 0x10, "STOP".into());
    reg_cmd(&mut op, 0x18, "JR r8".into()).load(PC).alu("ADD", R8).store(PC);
    for (i, c) in indexed(0x20, 0x08, &CONDITIONS) {
        reg_cmd(&mut op, i, format!("JR {},r8", c.label()))
            .load(PC)
            .proceed_if(c)
            .alu("ADD", R8)
            .store(PC);
    }
    reg_cmd(&mut op, 0x22, "LD (HL+),A".into()).copy_byte(IndHL, A).alu_hl("INC");
    reg_cmd(&mut op, 0x2a, "LD A,(HL+)".into()).copy_byte(A, IndHL).alu_hl("INC");
    reg_cmd(&mut op, 0x27, "DAA".into()).load(A).alu_unary("DAA").store(A);
    reg_cmd(&mut op, 0x2f, "CPL".into()).load(A).alu_unary("CPL").store(A);
    reg_cmd(&mut op, 0x32, "LD (HL-),A".into()).copy_byte(IndHL, A).alu_hl("DEC");
    reg_cmd(&mut op, 0x3a, "LD A,(HL-)".into()).copy_byte(A, IndHL).alu_hl("DEC");
    reg_cmd(&mut op, 0x37, "SCF".into()).load(A).alu_unary("SCF").store(A);
    reg_cmd(&mut op, 0x3f, "CCF".into()).load(A).alu_unary("CCF").store(A);
    for (row, t) in indexed(0x40, 0x08, &REGS_8) {
        for (i, s) in indexed(row, 0x01, &REGS_8) {
            if i == 0x76 {
                continue;
            }
            reg_load(&mut op, i, t, s);
        }
    }
    reg_cmd(&mut op, 0x76, "HALT".into());
    for (row, o) in indexed(0x80, 0x08, &ALU_OPS) {
        for (i, t) in indexed(row, 0x01, &REGS_8) {
            reg_cmd(&mut op, i, format!("{o} {}", t.label())).load(A).alu(o, t).store(A);
        }
    }
    for (i, c) in indexed(0xc0, 0x08, &CONDITIONS) {
        reg_cmd(&mut op, i, format!("RET {}", c.label()))
            .extra_cycle()
            .proceed_if(c)
            .pop()
            .force_finish()
            .store(PC);
    }
    for (i, t) in indexed(0xc1, 0x10, &STACK_REGS) {
        reg_cmd(&mut op, i, format!("POP {}", t.label())).pop().store(t);
    }
    for (i, c) in indexed(0xc2, 0x08, &CONDITIONS) {
        reg_cmd(&mut op, i, format!("JP {},a16", c.label()))
            .load(A16)
            .proceed_if(c)
            .store(PC)
            .extra_cycle();
    }
    reg_cmd(&mut op, 0xc3, "JP a16".into()).load(A16).store(PC).extra_cycle();
    for (i, c) in indexed(0xc4, 0x08, &CONDITIONS) {
        reg_cmd(&mut op, i, format!("CALL {},a16", c.label()))
            .proceed_if(c)
            .extra_cycle()
            .load(PC)
            .push()
            .load(A16)
            .store(PC);
    }
    for (i, t) in indexed(0xc5, 0x10, &STACK_REGS) {
        reg_cmd(&mut op, i, format!("PUSH {}", t.label())).extra_cycle().load(t).push();
    }
    for (i, o) in indexed(0xc6, 0x08, &ALU_OPS) {
        reg_cmd(&mut op, i, format!("{o} d8")).load(A).alu(o, D8).store(A);
    }
    for (i, target) in (0xc7..=0xff).step_by(0x08).zip((0x00u16..).step_by(0x08)) {
        reg_cmd(&mut op, i, format!("RST {target:02x}H"))
            .load(PC)
            .push()
            .force_finish()
            .load_word(target)
            .store(PC);
    }
    reg_cmd(&mut op, 0xc9, "RET".into()).pop().force_finish().store(PC);
    reg_cmd(&mut op, 0xcd, "CALL a16".into())
        .load(PC)
        .extra_cycle()
        .push()
        .load(A16)
        .store(PC);
    reg_cmd(&mut op, 0xd9, "RETI".into())
        .pop()
        .force_finish()
        .store(PC)
        .switch_interrupts(true, false);
    reg_load(&mut op, 0xe2, IndC, A);
    reg_load(&mut op, 0xf2, A, IndC);
    reg_cmd(&mut op, 0xe9, "JP (HL)".into()).load(HL).store(PC);
    reg_cmd(&mut op, 0xe0, "LDH (a8),A".into()).copy_byte(IndA8, A);
    reg_cmd(&mut op, 0xf0, "LDH A,(a8)".into()).copy_byte(A, IndA8);
    reg_cmd(&mut op, 0xe8, "ADD SP,r8".into())
        .load(SP)
        .alu("ADD_SP", R8)
        .extra_cycle()
        .store(SP);
    reg_cmd(&mut op, 0xf8, "LD HL,SP+r8".into()).load(SP).alu("ADD_SP", R8).store(HL);
    reg_load(&mut op, 0xea, IndA16, A);
    reg_load(&mut op, 0xfa, A, IndA16);
    reg_cmd(&mut op, 0xf3, "DI".into()).switch_interrupts(false, true);
    reg_cmd(&mut op, 0xfb, "EI".into()).switch_interrupts(true, true);
    reg_load(&mut op, 0xf9, SP, HL).extra_cycle();

    let shifts = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];
    for (row, o) in indexed(0x00, 0x08, &shifts) {
        for (i, t) in indexed(row, 0x01, &REGS_8) {
            reg_cmd(&mut ext, i, format!("{o} {}", t.label())).load(t).alu_unary(o).store(t);
        }
    }
    for (base, o) in indexed(0x40, 0x40, &["BIT", "RES", "SET"]) {
        for bit in 0..8u8 {
            for (i, t) in indexed(base + bit as usize * 0x08, 0x01, &REGS_8) {
                if o == "BIT" && t == IndHL {
                    reg_cmd(&mut ext, i, format!("BIT {bit},(HL)")).bit_hl(bit);
                } else {
                    reg_cmd(&mut ext, i, format!("{o} {bit},{}", t.label()))
                        .load(t)
                        .alu_const(o, bit as i32)
                        .store(t);
                }
            }
        }
    }

    Tables {
        commands: op.into_iter().map(|b| b.map(OpcodeBuilder::build)).collect(),
        ext_commands: ext.into_iter().map(|b| b.map(OpcodeBuilder::build)).collect(),
    }
}
