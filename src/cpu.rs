//! Sharp LR35902 CPU interpreter: interrupt servicing, HALT/STOP, and
//! dispatch onto the decode/execute split in `decode.rs`.
//!
//! Decoding (byte classification) and execution (state mutation) are
//! kept apart so the opcode table stays pure data; this module only
//! owns the mutable state a real CPU owns - registers, IME, the halt
//! latch - and the stack/ALU primitives the executor calls into.

use std::fmt::{self, Display, Formatter};

use crate::{
    consts::{
        IF_ADDR, INT_JOYPAD_BIT, INT_STAT_BIT, INT_TIMER_BIT, INT_VBLANK_BIT, LCDC_ADDR,
        VECTOR_JOYPAD, VECTOR_STAT, VECTOR_TIMER, VECTOR_VBLANK,
    },
    debugln,
    decode::{decode, Condition, DecodedInstruction, OpcodeKind},
    mmu::Mmu,
    panic_gb,
    registers::{Registers, REG_NONE},
};

pub struct Cpu {
    pub regs: Registers,
    ime: bool,
    ime_scheduled: bool,
    halted: bool,

    /// Bus the CPU executes against.
    pub mmu: Mmu,

    /// T-states (4 per M-cycle) taken by the most recently run `clock`.
    pub cycles: u8,

    /// PC of the last instruction actually fetched, kept for tracing.
    pub ppc: u16,
}

impl Cpu {
    pub fn new(mmu: Mmu) -> Self {
        Self {
            regs: Registers::new(),
            ime: false,
            ime_scheduled: false,
            halted: false,
            mmu,
            cycles: 0,
            ppc: 0,
        }
    }

    pub fn reset(&mut self) {
        self.regs = Registers::new();
        self.ime = false;
        self.ime_scheduled = false;
        self.halted = false;
        self.cycles = 0;
        self.ppc = 0;
    }

    /// Sets registers and MMU latches to the state a real boot ROM
    /// leaves behind, skipping the boot ROM entirely.
    pub fn boot(&mut self) {
        self.regs = Registers::new();
        self.regs.a = 0x01;
        self.regs.set_f(0xb0);
        self.regs.set_bc(0x0013);
        self.regs.set_de(0x00d8);
        self.regs.set_hl(0x014d);
        self.regs.sp = 0xfffe;
        self.regs.pc = 0x0100;
        self.ime = false;
        self.ime_scheduled = false;
        self.halted = false;

        self.mmu.set_boot_active(false);
        self.mmu.write(LCDC_ADDR, 0x91);
    }

    /// Services a pending interrupt, or halts/fetches+executes a
    /// single instruction. Returns the number of T-states consumed.
    pub fn clock(&mut self) -> u8 {
        let pc = self.regs.pc;

        let pending = self.mmu.read(IF_ADDR) & self.mmu.ie & 0x1f;

        if self.halted && pending != 0 {
            self.halted = false;
        }

        if self.ime && pending != 0 {
            let cycles = self.service_interrupt(pc, pending);
            self.cycles = cycles;
            return cycles;
        }

        // EI's enable takes effect only once the instruction that
        // follows EI has been fetched - applying it here, after the
        // interrupt check above already ran against the old IME,
        // reproduces that one-instruction delay.
        if self.ime_scheduled {
            self.ime = true;
            self.ime_scheduled = false;
        }

        if self.halted {
            self.cycles = 4;
            return 4;
        }

        let inst = decode(&self.mmu, pc);
        self.ppc = pc;
        let cycles = self.execute(inst);
        self.cycles = cycles;
        cycles
    }

    fn service_interrupt(&mut self, pc: u16, pending: u8) -> u8 {
        self.disable_int();
        self.push_word(pc);

        if pending & (1 << INT_VBLANK_BIT) != 0 {
            debugln!("servicing V-Blank interrupt (0x40)");
            self.regs.pc = VECTOR_VBLANK;
            self.mmu.ppu().ack_vblank();
        } else if pending & (1 << INT_STAT_BIT) != 0 {
            debugln!("servicing LCD STAT interrupt (0x48)");
            self.regs.pc = VECTOR_STAT;
            self.mmu.ppu().ack_stat();
        } else if pending & (1 << INT_TIMER_BIT) != 0 {
            debugln!("servicing Timer interrupt (0x50)");
            self.regs.pc = VECTOR_TIMER;
            self.mmu.timer().ack_tima();
        } else if pending & (1 << INT_JOYPAD_BIT) != 0 {
            debugln!("servicing Joypad interrupt (0x60)");
            self.regs.pc = VECTOR_JOYPAD;
            self.mmu.pad().ack_pad();
        } else {
            panic_gb!(
                "interrupt dispatch with no recognized bit set: 0x{:02x}",
                pending
            );
        }

        self.halted = false;
        20
    }

    /// Advances PC past the instruction, performs its effect, and
    /// returns the T-states it cost (worst-case cycles if a branch
    /// was taken; best==worst already for every non-branch kind).
    fn execute(&mut self, instr: DecodedInstruction) -> u8 {
        self.regs.pc = self.regs.pc.wrapping_add(instr.length as u16);

        let taken = match instr.kind {
            OpcodeKind::Nop => true,
            OpcodeKind::Halt => {
                self.halted = true;
                true
            }
            OpcodeKind::Stop => {
                // Treated as HALT for this core; no CGB speed switch.
                self.halted = true;
                true
            }
            OpcodeKind::Di => {
                self.disable_int();
                true
            }
            OpcodeKind::Ei => {
                self.ime_scheduled = true;
                true
            }
            OpcodeKind::LdRegReg => {
                let value = self.read_operand(instr.reg2);
                self.write_operand(instr.reg, value);
                true
            }
            OpcodeKind::LdImm8Reg => {
                self.write_operand(instr.reg, instr.immediate as u8);
                true
            }
            OpcodeKind::LdImm16Reg16 => {
                self.regs.write_r16(instr.reg, instr.immediate);
                true
            }
            OpcodeKind::LdAToRelAddr => {
                let addr = self.rel_addr(instr.reg2);
                self.mmu.write(addr, self.regs.a);
                true
            }
            OpcodeKind::LdAFromRelAddr => {
                let addr = self.rel_addr(instr.reg2);
                self.regs.a = self.mmu.read(addr);
                true
            }
            OpcodeKind::LdAToIoImm => {
                self.mmu.write(0xff00 | instr.immediate, self.regs.a);
                true
            }
            OpcodeKind::LdAFromIoImm => {
                self.regs.a = self.mmu.read(0xff00 | instr.immediate);
                true
            }
            OpcodeKind::LdAToIoC => {
                let addr = 0xff00 | self.regs.c as u16;
                self.mmu.write(addr, self.regs.a);
                true
            }
            OpcodeKind::LdAFromIoC => {
                let addr = 0xff00 | self.regs.c as u16;
                self.regs.a = self.mmu.read(addr);
                true
            }
            OpcodeKind::LdAToAbs => {
                self.mmu.write(instr.immediate, self.regs.a);
                true
            }
            OpcodeKind::LdAFromAbs => {
                self.regs.a = self.mmu.read(instr.immediate);
                true
            }
            OpcodeKind::LdSpToAbs => {
                let sp = self.regs.sp;
                self.mmu.write(instr.immediate, sp as u8);
                self.mmu.write(instr.immediate.wrapping_add(1), (sp >> 8) as u8);
                true
            }
            OpcodeKind::LdHlSpPlusR8 => {
                let (result, h, c) = add_sp_offset(self.regs.sp, instr.immediate as u8);
                self.regs.set_hl(result);
                self.regs.set_flags(Some(false), Some(false), Some(h), Some(c));
                true
            }
            OpcodeKind::LdSpHl => {
                self.regs.sp = self.regs.hl();
                true
            }
            OpcodeKind::Inc8 => {
                let value = self.read_operand(instr.reg);
                let result = value.wrapping_add(1);
                let h = value & 0x0f == 0x0f;
                self.write_operand(instr.reg, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(h), None);
                true
            }
            OpcodeKind::Dec8 => {
                let value = self.read_operand(instr.reg);
                let result = value.wrapping_sub(1);
                let h = value & 0x0f == 0x00;
                self.write_operand(instr.reg, result);
                self.regs.set_flags(Some(result == 0), Some(true), Some(h), None);
                true
            }
            OpcodeKind::Inc16 => {
                let value = self.regs.read_r16(instr.reg).wrapping_add(1);
                self.regs.write_r16(instr.reg, value);
                true
            }
            OpcodeKind::Dec16 => {
                let value = self.regs.read_r16(instr.reg).wrapping_sub(1);
                self.regs.write_r16(instr.reg, value);
                true
            }
            OpcodeKind::Add8 => {
                let rhs = self.alu_operand(&instr);
                self.regs.a = self.alu_add(rhs, 0);
                true
            }
            OpcodeKind::Adc => {
                let rhs = self.alu_operand(&instr);
                let carry_in = self.regs.carry() as u8;
                self.regs.a = self.alu_add(rhs, carry_in);
                true
            }
            OpcodeKind::Sub => {
                let rhs = self.alu_operand(&instr);
                self.regs.a = self.alu_sub(rhs, 0);
                true
            }
            OpcodeKind::Sbc => {
                let rhs = self.alu_operand(&instr);
                let carry_in = self.regs.carry() as u8;
                self.regs.a = self.alu_sub(rhs, carry_in);
                true
            }
            OpcodeKind::And => {
                let rhs = self.alu_operand(&instr);
                self.regs.a = self.alu_and(rhs);
                true
            }
            OpcodeKind::Xor => {
                let rhs = self.alu_operand(&instr);
                self.regs.a = self.alu_xor(rhs);
                true
            }
            OpcodeKind::Or => {
                let rhs = self.alu_operand(&instr);
                self.regs.a = self.alu_or(rhs);
                true
            }
            OpcodeKind::Cp => {
                let rhs = self.alu_operand(&instr);
                self.alu_sub(rhs, 0);
                true
            }
            OpcodeKind::AddHlR16 => {
                let hl = self.regs.hl();
                let rhs = self.regs.read_r16(instr.reg);
                let result = hl.wrapping_add(rhs);
                let h = (hl & 0x0fff) + (rhs & 0x0fff) > 0x0fff;
                let c = hl as u32 + rhs as u32 > 0xffff;
                self.regs.set_hl(result);
                self.regs.set_flags(None, Some(false), Some(h), Some(c));
                true
            }
            OpcodeKind::AddSpR8 => {
                let (result, h, c) = add_sp_offset(self.regs.sp, instr.immediate as u8);
                self.regs.sp = result;
                self.regs.set_flags(Some(false), Some(false), Some(h), Some(c));
                true
            }
            OpcodeKind::Rlca => {
                let (result, c) = rlc(self.regs.a);
                self.regs.a = result;
                self.regs.set_flags(Some(false), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Rrca => {
                let (result, c) = rrc(self.regs.a);
                self.regs.a = result;
                self.regs.set_flags(Some(false), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Rla => {
                let (result, c) = rl(self.regs.a, self.regs.carry());
                self.regs.a = result;
                self.regs.set_flags(Some(false), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Rra => {
                let (result, c) = rr(self.regs.a, self.regs.carry());
                self.regs.a = result;
                self.regs.set_flags(Some(false), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Daa => {
                self.daa();
                true
            }
            OpcodeKind::Scf => {
                self.regs.set_flags(None, Some(false), Some(false), Some(true));
                true
            }
            OpcodeKind::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.set_flags(None, Some(true), Some(true), None);
                true
            }
            OpcodeKind::Ccf => {
                let carry = !self.regs.carry();
                self.regs.set_flags(None, Some(false), Some(false), Some(carry));
                true
            }
            OpcodeKind::Push => {
                let value = self.regs.read_r16_stack(instr.reg);
                self.push_word(value);
                true
            }
            OpcodeKind::Pop => {
                let value = self.pop_word();
                self.regs.write_r16_stack(instr.reg, value);
                true
            }
            OpcodeKind::Jr => {
                let taken = self.condition_met(instr.condition);
                if taken {
                    let offset = instr.immediate as u8 as i8 as i32;
                    self.regs.pc = (self.regs.pc as i32 + offset) as u16;
                }
                taken
            }
            OpcodeKind::Jp => {
                let taken = self.condition_met(instr.condition);
                if taken {
                    self.regs.pc = instr.immediate;
                }
                taken
            }
            OpcodeKind::JpHl => {
                self.regs.pc = self.regs.hl();
                true
            }
            OpcodeKind::Call => {
                let taken = self.condition_met(instr.condition);
                if taken {
                    let return_pc = self.regs.pc;
                    self.push_word(return_pc);
                    self.regs.pc = instr.immediate;
                }
                taken
            }
            OpcodeKind::Ret => {
                let taken = self.condition_met(instr.condition);
                if taken {
                    self.regs.pc = self.pop_word();
                }
                taken
            }
            OpcodeKind::Reti => {
                self.regs.pc = self.pop_word();
                self.ime = true;
                self.ime_scheduled = false;
                true
            }
            OpcodeKind::Rst => {
                let return_pc = self.regs.pc;
                self.push_word(return_pc);
                self.regs.pc = instr.immediate;
                true
            }
            OpcodeKind::Rlc => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = rlc(value);
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Rrc => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = rrc(value);
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Rl => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = rl(value, self.regs.carry());
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Rr => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = rr(value, self.regs.carry());
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Sla => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = sla(value);
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Sra => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = sra(value);
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Swap => {
                let value = self.read_operand(instr.reg2);
                let result = swap(value);
                self.write_operand(instr.reg2, result);
                self.regs
                    .set_flags(Some(result == 0), Some(false), Some(false), Some(false));
                true
            }
            OpcodeKind::Srl => {
                let value = self.read_operand(instr.reg2);
                let (result, c) = srl(value);
                self.write_operand(instr.reg2, result);
                self.regs.set_flags(Some(result == 0), Some(false), Some(false), Some(c));
                true
            }
            OpcodeKind::Bit => {
                let value = self.read_operand(instr.reg2);
                let bit = instr.immediate as u8;
                let zero = (value >> bit) & 1 == 0;
                self.regs.set_flags(Some(zero), Some(false), Some(true), None);
                true
            }
            OpcodeKind::Res => {
                let value = self.read_operand(instr.reg2);
                let bit = instr.immediate as u8;
                self.write_operand(instr.reg2, value & !(1 << bit));
                true
            }
            OpcodeKind::Set => {
                let value = self.read_operand(instr.reg2);
                let bit = instr.immediate as u8;
                self.write_operand(instr.reg2, value | (1 << bit));
                true
            }
            OpcodeKind::Undefined => {
                panic_gb!(
                    "UNDEFINED opcode reached at 0x{:04x}: 0x{:02x}",
                    self.ppc,
                    self.mmu.read(self.ppc)
                );
            }
        };

        let m_cycles = if taken {
            instr.cycles_worst
        } else {
            instr.cycles_best
        };
        m_cycles * 4
    }

    fn condition_met(&self, condition: Condition) -> bool {
        match condition {
            Condition::Nz => !self.regs.zero(),
            Condition::Z => self.regs.zero(),
            Condition::Nc => !self.regs.carry(),
            Condition::C => self.regs.carry(),
            Condition::Always => true,
        }
    }

    #[inline(always)]
    fn read_operand(&mut self, field: u8) -> u8 {
        if field == crate::registers::REG_HL_INDIRECT {
            self.mmu.read(self.regs.hl())
        } else {
            self.regs.read_r8(field)
        }
    }

    #[inline(always)]
    fn write_operand(&mut self, field: u8, value: u8) {
        if field == crate::registers::REG_HL_INDIRECT {
            self.mmu.write(self.regs.hl(), value);
        } else {
            self.regs.write_r8(field, value);
        }
    }

    #[inline(always)]
    fn alu_operand(&mut self, instr: &DecodedInstruction) -> u8 {
        if instr.reg2 != REG_NONE {
            self.read_operand(instr.reg2)
        } else {
            instr.immediate as u8
        }
    }

    /// Resolves the BC/DE/HL+/HL- indirect-load group, applying the
    /// post-increment/decrement to HL where the index asks for it.
    fn rel_addr(&mut self, index: u8) -> u16 {
        match index {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => {
                let addr = self.regs.hl();
                self.regs.set_hl(addr.wrapping_add(1));
                addr
            }
            3 => {
                let addr = self.regs.hl();
                self.regs.set_hl(addr.wrapping_sub(1));
                addr
            }
            _ => panic_gb!("invalid indirect-load index {index}"),
        }
    }

    fn alu_add(&mut self, rhs: u8, carry_in: u8) -> u8 {
        let a = self.regs.a;
        let sum = a as u16 + rhs as u16 + carry_in as u16;
        let result = sum as u8;
        let h = (a & 0x0f) + (rhs & 0x0f) + carry_in > 0x0f;
        let c = sum > 0xff;
        self.regs.set_flags(Some(result == 0), Some(false), Some(h), Some(c));
        result
    }

    fn alu_sub(&mut self, rhs: u8, carry_in: u8) -> u8 {
        let a = self.regs.a;
        let diff = a as i16 - rhs as i16 - carry_in as i16;
        let result = diff as u8;
        let h = (a & 0x0f) as i16 - (rhs & 0x0f) as i16 - carry_in as i16 < 0;
        let c = diff < 0;
        self.regs.set_flags(Some(result == 0), Some(true), Some(h), Some(c));
        result
    }

    fn alu_and(&mut self, rhs: u8) -> u8 {
        let result = self.regs.a & rhs;
        self.regs
            .set_flags(Some(result == 0), Some(false), Some(true), Some(false));
        result
    }

    fn alu_or(&mut self, rhs: u8) -> u8 {
        let result = self.regs.a | rhs;
        self.regs
            .set_flags(Some(result == 0), Some(false), Some(false), Some(false));
        result
    }

    fn alu_xor(&mut self, rhs: u8) -> u8 {
        let result = self.regs.a ^ rhs;
        self.regs
            .set_flags(Some(result == 0), Some(false), Some(false), Some(false));
        result
    }

    fn daa(&mut self) {
        let mut a = self.regs.a;
        let mut adjust = 0u8;
        let mut carry = self.regs.carry();

        if self.regs.half_carry() || (!self.regs.subtract() && (a & 0x0f) > 0x09) {
            adjust |= 0x06;
        }
        if self.regs.carry() || (!self.regs.subtract() && a > 0x99) {
            adjust |= 0x60;
            carry = true;
        }

        a = if self.regs.subtract() {
            a.wrapping_sub(adjust)
        } else {
            a.wrapping_add(adjust)
        };

        self.regs.a = a;
        self.regs.set_flags(Some(a == 0), None, Some(false), Some(carry));
    }

    #[inline(always)]
    fn push_byte(&mut self, value: u8) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mmu.write(self.regs.sp, value);
    }

    #[inline(always)]
    fn push_word(&mut self, value: u16) {
        self.push_byte((value >> 8) as u8);
        self.push_byte(value as u8);
    }

    #[inline(always)]
    fn pop_byte(&mut self) -> u8 {
        let value = self.mmu.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        value
    }

    #[inline(always)]
    fn pop_word(&mut self) -> u16 {
        let lo = self.pop_byte();
        let hi = self.pop_byte();
        lo as u16 | ((hi as u16) << 8)
    }

    #[inline(always)]
    fn disable_int(&mut self) {
        self.ime = false;
        self.ime_scheduled = false;
    }

    #[inline(always)]
    pub fn ime(&self) -> bool {
        self.ime
    }

    #[inline(always)]
    pub fn halted(&self) -> bool {
        self.halted
    }

    #[inline(always)]
    pub fn set_halted(&mut self, value: bool) {
        self.halted = value;
    }

    #[inline(always)]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    #[inline(always)]
    pub fn set_pc(&mut self, value: u16) {
        self.regs.pc = value;
    }

    #[inline(always)]
    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    #[inline(always)]
    pub fn cycles(&self) -> u8 {
        self.cycles
    }

    #[inline(always)]
    pub fn mmu(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    #[inline(always)]
    pub fn mmu_i(&self) -> &Mmu {
        &self.mmu
    }
}

/// `ADD SP,r8` and `LD HL,SP+r8` share this: the offset is sign-
/// extended for the actual add, but H/C are computed from an unsigned
/// byte add against SP's low byte, matching real silicon.
fn add_sp_offset(sp: u16, byte: u8) -> (u16, bool, bool) {
    let offset = byte as i8 as i16;
    let result = (sp as i32 + offset as i32) as u16;
    let h = (sp & 0x000f) + (byte as u16 & 0x000f) > 0x000f;
    let c = (sp & 0x00ff) + byte as u16 > 0x00ff;
    (result, h, c)
}

fn rlc(value: u8) -> (u8, bool) {
    (value.rotate_left(1), value & 0x80 != 0)
}

fn rrc(value: u8) -> (u8, bool) {
    (value.rotate_right(1), value & 0x01 != 0)
}

fn rl(value: u8, carry_in: bool) -> (u8, bool) {
    ((value << 1) | carry_in as u8, value & 0x80 != 0)
}

fn rr(value: u8, carry_in: bool) -> (u8, bool) {
    ((value >> 1) | ((carry_in as u8) << 7), value & 0x01 != 0)
}

fn sla(value: u8) -> (u8, bool) {
    (value << 1, value & 0x80 != 0)
}

fn sra(value: u8) -> (u8, bool) {
    (((value as i8) >> 1) as u8, value & 0x01 != 0)
}

fn swap(value: u8) -> u8 {
    (value << 4) | (value >> 4)
}

fn srl(value: u8) -> (u8, bool) {
    (value >> 1, value & 0x01 != 0)
}

impl Display for Cpu {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[PC=0x{:04x} SP=0x{:04x}] [A=0x{:02x} F=0x{:02x} BC=0x{:04x} DE=0x{:04x} HL=0x{:04x}]",
            self.regs.pc,
            self.regs.sp,
            self.regs.a,
            self.regs.f(),
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmu::Components;
    use crate::rom::Cartridge;

    fn new_cpu() -> Cpu {
        let mmu = Mmu::new(Components::default(), Cartridge::default());
        Cpu::new(mmu)
    }

    #[test]
    fn test_boot_sets_dmg_post_boot_register_values() {
        let mut cpu = new_cpu();
        cpu.boot();
        assert_eq!(cpu.regs.a, 0x01);
        assert_eq!(cpu.regs.f(), 0xb0);
        assert_eq!(cpu.regs.bc(), 0x0013);
        assert_eq!(cpu.regs.de(), 0x00d8);
        assert_eq!(cpu.regs.hl(), 0x014d);
        assert_eq!(cpu.regs.sp, 0xfffe);
        assert_eq!(cpu.regs.pc, 0x0100);
    }

    #[test]
    fn test_nop_takes_one_m_cycle() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x00);
        let cycles = cpu.clock();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.pc(), 0xc001);
    }

    #[test]
    fn test_ld_a_d8() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x3e);
        cpu.mmu.write(0xc001, 0x42);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.regs.a, 0x42);
        assert_eq!(cpu.pc(), 0xc002);
    }

    #[test]
    fn test_ld_hl_plus_a_increments_hl() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.regs.a = 0x42;
        cpu.regs.set_hl(0xc000);
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x22);
        cpu.clock();
        assert_eq!(cpu.regs.hl(), 0xc001);
        assert_eq!(cpu.mmu.read(0xc000), 0x42);
    }

    #[test]
    fn test_inc_dec_a_flags() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.regs.a = 0x0f;
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x3c); // INC A
        cpu.clock();
        assert_eq!(cpu.regs.a, 0x10);
        assert!(cpu.regs.half_carry());

        cpu.regs.a = 0x00;
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x3d); // DEC A
        cpu.clock();
        assert_eq!(cpu.regs.a, 0xff);
        assert!(cpu.regs.half_carry());
        assert!(cpu.regs.subtract());
    }

    #[test]
    fn test_conditional_jr_not_taken_uses_best_cycles() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.regs.set_flags(Some(true), None, None, None); // Z=1, so JR NZ not taken
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x20); // JR NZ, r8
        cpu.mmu.write(0xc001, 0x05);
        let cycles = cpu.clock();
        assert_eq!(cycles, 8);
        assert_eq!(cpu.pc(), 0xc002);
    }

    #[test]
    fn test_conditional_jr_taken_uses_worst_cycles() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.regs.set_flags(Some(false), None, None, None); // Z=0, so JR NZ taken
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x20);
        cpu.mmu.write(0xc001, 0x05);
        let cycles = cpu.clock();
        assert_eq!(cycles, 12);
        assert_eq!(cpu.pc(), 0xc007);
    }

    #[test]
    fn test_call_and_ret_round_trip_through_stack() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0xcd); // CALL a16
        cpu.mmu.write(0xc001, 0x00);
        cpu.mmu.write(0xc002, 0xd0);
        cpu.clock();
        assert_eq!(cpu.pc(), 0xd000);

        cpu.mmu.write(0xd000, 0xc9); // RET
        cpu.clock();
        assert_eq!(cpu.pc(), 0xc003);
    }

    #[test]
    fn test_ei_enables_ime_after_one_instruction_delay() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0xfb); // EI
        cpu.mmu.write(0xc001, 0x00); // NOP
        cpu.clock();
        assert!(!cpu.ime());
        cpu.clock();
        assert!(cpu.ime());
    }

    #[test]
    fn test_halt_releases_and_services_interrupt_when_ime_set() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0xfb); // EI
        cpu.mmu.write(0xc001, 0x00); // NOP, lets the EI delay elapse
        cpu.clock();
        cpu.clock();
        assert!(cpu.ime());

        cpu.mmu.ie = 0x01;
        cpu.mmu.ppu().set_int_vblank(true);
        cpu.set_halted(true);
        let cycles = cpu.clock();
        assert_eq!(cycles, 20);
        assert!(!cpu.halted());
        assert_eq!(cpu.pc(), VECTOR_VBLANK);
    }

    #[test]
    fn test_halt_with_ime_disabled_resumes_without_dispatch() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_halted(true);
        cpu.mmu.ie = 0x01;
        cpu.mmu.ppu().set_int_vblank(true);
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x00); // NOP
        let cycles = cpu.clock();
        assert!(!cpu.halted());
        assert_eq!(cpu.pc(), 0xc001);
        assert_eq!(cycles, 4);
    }

    #[test]
    #[should_panic]
    fn test_undefined_opcode_panics() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0xd3);
        cpu.clock();
    }

    #[test]
    fn test_daa_corrects_bcd_addition_with_carry() {
        let mut cpu = new_cpu();
        cpu.boot();
        cpu.regs.a = 0x7d;
        cpu.regs.b = 0x38;
        cpu.set_pc(0xc000);
        cpu.mmu.write(0xc000, 0x80); // ADD A, B
        cpu.mmu.write(0xc001, 0x27); // DAA
        cpu.clock();
        assert_eq!(cpu.regs.a, 0xb5);
        assert!(cpu.regs.half_carry());
        assert!(!cpu.regs.carry());

        cpu.clock();
        assert_eq!(cpu.regs.a, 0x1b);
        assert!(cpu.regs.carry());
        assert!(!cpu.regs.half_carry());
        assert!(!cpu.regs.zero());
    }
}
