use std::cell::RefCell;
use std::rc::Rc;

mod alu;
mod opcodes;
mod registers;
mod sprite_bug;

pub use alu::DataType;
pub use opcodes::{Argument, Op, Opcode, commands, ext_commands};
pub use registers::{Flags, Registers};
pub use sprite_bug::{CorruptionPolicy, CorruptionType, RowCopyCorruption};

use crate::display::Display;
use crate::error::{EmulatorError, Result};
use crate::hardware::SpeedMode;
use crate::interrupts::{InterruptManager, InterruptType};
use crate::mmu::Mmu;
use crate::ppu::{Ppu, PpuMode};

#[cfg(feature = "cpu-trace")]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {
        log::trace!(target: "tickboy::cpu", $($arg)*);
    };
}
#[cfg(not(feature = "cpu-trace"))]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {};
}

// Post-boot register values (gbdev.io/pandocs/Power_Up_State.html)
const BOOT_AF: u16 = 0x01b0;
const BOOT_BC: u16 = 0x0013;
const BOOT_DE: u16 = 0x00d8;
const BOOT_HL: u16 = 0x014d;
const BOOT_SP: u16 = 0xfffe;
const BOOT_PC: u16 = 0x0100;
const CGB_BOOT_A: u8 = 0x11;

const OPCODE_STOP: u8 = 0x10;
const OPCODE_HALT: u8 = 0x76;
const OPCODE_PREFIX: u8 = 0xcb;

// Only the first 79 ticks of an OAM search line are exposed to the bug
const SPRITE_BUG_TICK_LIMIT: u32 = 79;

/// Where the CPU is within the current instruction or interrupt dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Opcode,
    ExtOpcode,
    Operand,
    Running,
    IrqReadIf,
    IrqReadIe,
    IrqPush1,
    IrqPush2,
    IrqJump,
    Stopped,
    Halted,
}

impl CpuState {
    fn is_irq(self) -> bool {
        matches!(
            self,
            CpuState::IrqReadIf
                | CpuState::IrqReadIe
                | CpuState::IrqPush1
                | CpuState::IrqPush2
                | CpuState::IrqJump
        )
    }
}

/// SM83 core driven one master tick at a time.
///
/// Instructions are executed as the micro-op lists from [`commands`]; at most
/// one memory access happens per machine cycle, which is what makes
/// instruction timing fall out of the tables instead of a cycle count.
pub struct Cpu {
    pub registers: Registers,
    mmu: Rc<Mmu>,
    interrupts: Rc<RefCell<InterruptManager>>,
    ppu: Option<Rc<RefCell<Ppu>>>,
    speed_mode: Rc<RefCell<SpeedMode>>,
    corruption: Box<dyn CorruptionPolicy>,
    opcode1: u8,
    opcode2: u8,
    operand: [u8; 2],
    current: Option<&'static Opcode>,
    operand_index: usize,
    op_index: usize,
    state: CpuState,
    op_context: i32,
    interrupt_flag: u8,
    interrupt_enabled: u8,
    requested_irq: Option<InterruptType>,
    clock_cycle: u32,
    halt_bug_mode: bool,
}

impl Cpu {
    /// `ppu` may be absent for bare CPU setups; the OAM bug and the LCD
    /// switch on STOP are then skipped.
    pub fn new(
        mmu: Rc<Mmu>,
        interrupts: Rc<RefCell<InterruptManager>>,
        ppu: Option<Rc<RefCell<Ppu>>>,
        speed_mode: Rc<RefCell<SpeedMode>>,
    ) -> Self {
        Self {
            registers: Registers::default(),
            mmu,
            interrupts,
            ppu,
            speed_mode,
            corruption: Box::new(RowCopyCorruption),
            opcode1: 0,
            opcode2: 0,
            operand: [0; 2],
            current: None,
            operand_index: 0,
            op_index: 0,
            state: CpuState::Opcode,
            op_context: 0,
            interrupt_flag: 0,
            interrupt_enabled: 0,
            requested_irq: None,
            clock_cycle: 0,
            halt_bug_mode: false,
        }
    }

    pub fn set_corruption_policy(&mut self, policy: Box<dyn CorruptionPolicy>) {
        self.corruption = policy;
    }

    /// Register state right after the boot ROM hands over at 0x0100.
    pub fn init_registers(&mut self, cgb: bool) {
        let r = &mut self.registers;
        r.set_af(BOOT_AF);
        if cgb {
            r.a = CGB_BOOT_A;
        }
        r.set_bc(BOOT_BC);
        r.set_de(BOOT_DE);
        r.set_hl(BOOT_HL);
        r.sp = BOOT_SP;
        r.pc = BOOT_PC;
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn current_opcode(&self) -> Option<&'static Opcode> {
        self.current
    }

    /// Advance one master tick. Work happens every fourth tick, or every
    /// second tick in double speed.
    pub fn tick(&mut self) -> Result<()> {
        self.clock_cycle += 1;
        if self.clock_cycle >= 4 / self.speed_mode.borrow().mode() {
            self.clock_cycle = 0;
        } else {
            return Ok(());
        }

        if matches!(self.state, CpuState::Opcode | CpuState::Halted | CpuState::Stopped) {
            let pending = {
                let im = self.interrupts.borrow();
                im.is_ime() && im.is_interrupt_requested()
            };
            if pending {
                if self.state == CpuState::Stopped {
                    self.with_display(|d| d.enable_lcd());
                }
                self.state = CpuState::IrqReadIf;
            }
        }

        if self.state.is_irq() {
            self.handle_interrupt();
            return Ok(());
        }

        if self.state == CpuState::Halted && self.interrupts.borrow().is_interrupt_requested() {
            self.state = CpuState::Opcode;
        }

        if matches!(self.state, CpuState::Halted | CpuState::Stopped) {
            return Ok(());
        }

        let mut accessed_memory = false;
        loop {
            let pc = self.registers.pc;
            match self.state {
                CpuState::Opcode => {
                    self.clear_state();
                    self.opcode1 = self.mmu.read(pc);
                    accessed_memory = true;
                    if self.opcode1 == OPCODE_PREFIX {
                        self.state = CpuState::ExtOpcode;
                    } else if self.opcode1 == OPCODE_STOP {
                        // STOP swallows the following byte
                        self.current = commands()[OPCODE_STOP as usize].as_ref();
                        self.state = CpuState::ExtOpcode;
                    } else {
                        self.state = CpuState::Operand;
                        self.current = commands()[self.opcode1 as usize].as_ref();
                        if self.current.is_none() {
                            log::error!("unknown opcode {:02x} at {pc:04x}", self.opcode1);
                            return Err(EmulatorError::UnknownOpcode(self.opcode1));
                        }
                    }
                    if self.halt_bug_mode {
                        self.halt_bug_mode = false;
                    } else {
                        self.registers.increment_pc();
                    }
                }
                CpuState::ExtOpcode => {
                    if accessed_memory {
                        return Ok(());
                    }
                    accessed_memory = true;
                    self.opcode2 = self.mmu.read(pc);
                    if self.current.is_none() {
                        self.current = ext_commands()[self.opcode2 as usize].as_ref();
                    }
                    if self.current.is_none() {
                        log::error!("unknown opcode cb {:02x} at {pc:04x}", self.opcode2);
                        return Err(EmulatorError::UnknownExtendedOpcode(self.opcode2));
                    }
                    self.state = CpuState::Operand;
                    self.registers.increment_pc();
                }
                CpuState::Operand => {
                    let Some(current) = self.current else {
                        return Err(EmulatorError::UnknownOpcode(self.opcode1));
                    };
                    while self.operand_index < current.operand_length {
                        if accessed_memory {
                            return Ok(());
                        }
                        accessed_memory = true;
                        self.operand[self.operand_index] = self.mmu.read(pc);
                        self.operand_index += 1;
                        self.registers.increment_pc();
                    }
                    cpu_trace!("{:04x}: {}", pc, current);
                    self.state = CpuState::Running;
                }
                CpuState::Running => {
                    if self.opcode1 == OPCODE_STOP {
                        let switched = self.speed_mode.borrow_mut().on_stop();
                        if switched {
                            self.state = CpuState::Opcode;
                        } else {
                            self.state = CpuState::Stopped;
                            self.with_display(|d| d.disable_lcd());
                        }
                        return Ok(());
                    } else if self.opcode1 == OPCODE_HALT {
                        if self.interrupts.borrow().is_halt_bug() {
                            self.state = CpuState::Opcode;
                            self.halt_bug_mode = true;
                        } else {
                            self.state = CpuState::Halted;
                        }
                        return Ok(());
                    }

                    let Some(current) = self.current else {
                        return Err(EmulatorError::UnknownOpcode(self.opcode1));
                    };
                    let ops = &current.ops;
                    if self.op_index < ops.len() {
                        let op = &ops[self.op_index];
                        let op_accesses_memory = op.reads_memory() || op.writes_memory();
                        if accessed_memory && op_accesses_memory {
                            return Ok(());
                        }
                        self.op_index += 1;
                        if let Some(kind) = op.causes_oam_bug(&self.registers, self.op_context) {
                            self.handle_sprite_bug(kind);
                        }
                        self.op_context =
                            op.execute(&mut self.registers, &self.mmu, &self.operand, self.op_context);
                        if matches!(op, Op::SwitchInterrupts { .. }) {
                            op.switch_interrupts(&mut self.interrupts.borrow_mut());
                        }
                        if !op.proceed(&self.registers) {
                            self.op_index = ops.len();
                            continue;
                        }
                        if op.force_finish_cycle() {
                            return Ok(());
                        }
                        if op_accesses_memory {
                            accessed_memory = true;
                        }
                    }
                    if self.op_index >= ops.len() {
                        self.state = CpuState::Opcode;
                        self.operand_index = 0;
                        self.interrupts.borrow_mut().on_instruction_finished();
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn handle_interrupt(&mut self) {
        match self.state {
            CpuState::IrqReadIf => {
                self.interrupt_flag = self.mmu.read(0xff0f);
                self.state = CpuState::IrqReadIe;
            }
            CpuState::IrqReadIe => {
                self.interrupt_enabled = self.mmu.read(0xffff);
                let pending = self.interrupt_flag & self.interrupt_enabled;
                self.requested_irq = InterruptType::ALL
                    .into_iter()
                    .find(|irq| pending & irq.bit() != 0);
                match self.requested_irq {
                    None => self.state = CpuState::Opcode,
                    Some(irq) => {
                        self.state = CpuState::IrqPush1;
                        let mut im = self.interrupts.borrow_mut();
                        im.clear_interrupt(irq);
                        im.disable_interrupts(false);
                    }
                }
            }
            CpuState::IrqPush1 => {
                self.registers.decrement_sp();
                self.mmu.write(self.registers.sp, (self.registers.pc >> 8) as u8);
                self.state = CpuState::IrqPush2;
            }
            CpuState::IrqPush2 => {
                self.registers.decrement_sp();
                self.mmu.write(self.registers.sp, self.registers.pc as u8);
                self.state = CpuState::IrqJump;
            }
            CpuState::IrqJump => {
                if let Some(irq) = self.requested_irq.take() {
                    cpu_trace!("interrupt {:?} from {:04x}", irq, self.registers.pc);
                    self.registers.pc = irq.vector();
                }
                self.state = CpuState::Opcode;
            }
            _ => {}
        }
    }

    fn handle_sprite_bug(&self, kind: CorruptionType) {
        let Some(ppu) = &self.ppu else {
            return;
        };
        let ppu = ppu.borrow();
        if !ppu.lcdc().is_lcd_enabled() {
            return;
        }
        let stat_mode = ppu.stat() & 0b11;
        let ticks = ppu.ticks_in_line();
        if stat_mode == PpuMode::OamSearch as u8 && ticks < SPRITE_BUG_TICK_LIMIT {
            self.corruption.corrupt(&mut ppu.oam().borrow_mut(), kind, ticks);
        }
    }

    fn with_display(&self, f: impl FnOnce(&mut dyn Display)) {
        if let Some(ppu) = &self.ppu {
            f(ppu.borrow_mut().display_mut());
        }
    }

    /// Forget the instruction in flight. The tick phase is kept.
    pub fn clear_state(&mut self) {
        self.opcode1 = 0;
        self.opcode2 = 0;
        self.current = None;
        self.operand = [0; 2];
        self.operand_index = 0;
        self.op_index = 0;
        self.op_context = 0;
        self.interrupt_flag = 0;
        self.interrupt_enabled = 0;
        self.requested_irq = None;
    }
}
