//! Pure-data instruction decoder for the Sharp LR35902 opcode map.
//!
//! `decode` reads at most three bytes starting at a given address and
//! returns a [`DecodedInstruction`] describing what to do, without
//! touching CPU state. Execution lives in `cpu.rs`; this module only
//! classifies bytes. Kept separate so the same decode can drive
//! disassembly or tracing without side effects, and so the opcode
//! table is data a reviewer can check against a reference sheet rather
//! than 512 special-cased closures.
//!
//! Bit-pattern layout of the base opcode space (`x`/`y`/`z` naming
//! follows the usual Z80-family convention): `0x00-0x3F` holds the
//! irregular block (loads, INC/DEC, rotates on A, JR, ADD HL); the
//! `0x40-0x7F` block is `LD r,r` with `0x76` punched out for HALT;
//! `0x80-0xBF` is ALU-A-with-register; `0xC0-0xFF` holds stack/branch/
//! call/RST/ALU-immediate/IO plus the `0xCB` escape. The `0xCB` page
//! is a regular 8x8 grid of {rotate/shift, BIT, RES, SET} x 8
//! registers.

use crate::mmu::Mmu;
use crate::registers::REG_NONE;

pub const PREFIX: u8 = 0xcb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Nz,
    Z,
    Nc,
    C,
    Always,
}

/// The closed set of opcode kinds. Names describe what the
/// instruction does, not any particular host-language identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeKind {
    Nop,
    Halt,
    Stop,
    Di,
    Ei,
    LdRegReg,
    LdImm8Reg,
    LdImm16Reg16,
    LdAToRelAddr,
    LdAFromRelAddr,
    LdAToIoImm,
    LdAFromIoImm,
    LdAToIoC,
    LdAFromIoC,
    LdAToAbs,
    LdAFromAbs,
    LdSpToAbs,
    LdHlSpPlusR8,
    LdSpHl,
    Inc8,
    Dec8,
    Inc16,
    Dec16,
    Add8,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
    AddHlR16,
    AddSpR8,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Scf,
    Cpl,
    Ccf,
    Push,
    Pop,
    Jr,
    Jp,
    JpHl,
    Call,
    Ret,
    Reti,
    Rst,
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit,
    Res,
    Set,
    Undefined,
}

/// Value produced by `decode`, consumed by `Cpu::execute`.
///
/// `reg`/`reg2` are overloaded by opcode kind: for register-field
/// opcodes they hold the 0..7 field (6 = `(HL)`); for 16-bit pair
/// opcodes they hold the 0..3 pair index (BC/DE/HL/SP, or BC/DE/HL/AF
/// for PUSH/POP); for the BC/DE/HL+/HL- indirect-load group `reg2`
/// holds that 0..3 index. `REG_NONE` marks "not used by this kind".
#[derive(Debug, Clone, Copy)]
pub struct DecodedInstruction {
    pub kind: OpcodeKind,
    pub reg: u8,
    pub reg2: u8,
    pub immediate: u16,
    pub length: u8,
    pub cycles_best: u8,
    pub cycles_worst: u8,
    pub condition: Condition,
}

impl DecodedInstruction {
    fn new(kind: OpcodeKind, length: u8, cycles: u8) -> Self {
        Self {
            kind,
            reg: REG_NONE,
            reg2: REG_NONE,
            immediate: 0,
            length,
            cycles_best: cycles,
            cycles_worst: cycles,
            condition: Condition::Always,
        }
    }

    fn branch(kind: OpcodeKind, length: u8, best: u8, worst: u8, condition: Condition) -> Self {
        Self {
            kind,
            reg: REG_NONE,
            reg2: REG_NONE,
            immediate: 0,
            length,
            cycles_best: best,
            cycles_worst: worst,
            condition,
        }
    }
}

const CC: [Condition; 4] = [Condition::Nz, Condition::Z, Condition::Nc, Condition::C];

/// Reads the opcode (and, for `0xCB`, the extension byte plus any
/// trailing immediate) at `addr` and classifies it. Never mutates the
/// MMU or anything the caller owns; only performs the reads the real
/// fetch would perform.
pub fn decode(mmu: &Mmu, addr: u16) -> DecodedInstruction {
    let opcode = mmu.read(addr);

    if opcode == PREFIX {
        return decode_extended(mmu.read(addr.wrapping_add(1)));
    }

    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;

    match opcode {
        0x00 => DecodedInstruction::new(OpcodeKind::Nop, 1, 1),
        0x10 => DecodedInstruction::new(OpcodeKind::Stop, 2, 1),
        0x76 => DecodedInstruction::new(OpcodeKind::Halt, 1, 1),
        0xf3 => DecodedInstruction::new(OpcodeKind::Di, 1, 1),
        0xfb => DecodedInstruction::new(OpcodeKind::Ei, 1, 1),
        0x07 => DecodedInstruction::new(OpcodeKind::Rlca, 1, 1),
        0x0f => DecodedInstruction::new(OpcodeKind::Rrca, 1, 1),
        0x17 => DecodedInstruction::new(OpcodeKind::Rla, 1, 1),
        0x1f => DecodedInstruction::new(OpcodeKind::Rra, 1, 1),
        0x27 => DecodedInstruction::new(OpcodeKind::Daa, 1, 1),
        0x2f => DecodedInstruction::new(OpcodeKind::Cpl, 1, 1),
        0x37 => DecodedInstruction::new(OpcodeKind::Scf, 1, 1),
        0x3f => DecodedInstruction::new(OpcodeKind::Ccf, 1, 1),
        0xc9 => DecodedInstruction::new(OpcodeKind::Ret, 1, 4),
        0xd9 => DecodedInstruction::new(OpcodeKind::Reti, 1, 4),
        0xe9 => DecodedInstruction::new(OpcodeKind::JpHl, 1, 1),
        0xc3 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Jp, 3, 4);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        0xcd => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Call, 3, 6);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        0x18 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Jr, 2, 3);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0x08 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdSpToAbs, 3, 5);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        0xe0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdAToIoImm, 2, 3);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0xf0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdAFromIoImm, 2, 3);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0xe2 => DecodedInstruction::new(OpcodeKind::LdAToIoC, 1, 2),
        0xf2 => DecodedInstruction::new(OpcodeKind::LdAFromIoC, 1, 2),
        0xea => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdAToAbs, 3, 4);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        0xfa => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdAFromAbs, 3, 4);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        0xe8 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::AddSpR8, 2, 4);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0xf8 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdHlSpPlusR8, 2, 3);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0xf9 => DecodedInstruction::new(OpcodeKind::LdSpHl, 1, 2),
        0xc6 | 0xce | 0xd6 | 0xde | 0xe6 | 0xee | 0xf6 | 0xfe => {
            let mut inst = alu_imm_kind(y);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0xd3 | 0xdb | 0xdd | 0xe3 | 0xe4 | 0xeb | 0xec | 0xed | 0xf4 | 0xfc | 0xfd => {
            DecodedInstruction::new(OpcodeKind::Undefined, 1, 1)
        }
        _ => match x {
            0 => decode_block0(mmu, addr, y, z, p, q),
            1 => {
                let mut inst = DecodedInstruction::new(OpcodeKind::LdRegReg, 1, 1);
                inst.reg = y;
                inst.reg2 = z;
                if z == crate::registers::REG_HL_INDIRECT || y == crate::registers::REG_HL_INDIRECT
                {
                    inst.cycles_best = 2;
                    inst.cycles_worst = 2;
                }
                inst
            }
            2 => {
                let mut inst = alu_reg_kind(y);
                inst.reg2 = z;
                if z == crate::registers::REG_HL_INDIRECT {
                    inst.cycles_best = 2;
                    inst.cycles_worst = 2;
                }
                inst
            }
            _ => decode_block3(mmu, addr, y, z, p, q),
        },
    }
}

fn decode_block0(mmu: &Mmu, addr: u16, y: u8, z: u8, p: u8, q: u8) -> DecodedInstruction {
    match z {
        1 if q == 0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdImm16Reg16, 3, 3);
            inst.reg = p;
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        1 if q == 1 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::AddHlR16, 1, 2);
            inst.reg = p;
            inst
        }
        2 if q == 0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdAToRelAddr, 1, 2);
            inst.reg2 = p;
            inst
        }
        2 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::LdAFromRelAddr, 1, 2);
            inst.reg2 = p;
            inst
        }
        3 if q == 0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Inc16, 1, 2);
            inst.reg = p;
            inst
        }
        3 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Dec16, 1, 2);
            inst.reg = p;
            inst
        }
        4 => {
            let hl = y == crate::registers::REG_HL_INDIRECT;
            let mut inst = DecodedInstruction::new(OpcodeKind::Inc8, 1, if hl { 3 } else { 1 });
            inst.reg = y;
            inst
        }
        5 => {
            let hl = y == crate::registers::REG_HL_INDIRECT;
            let mut inst = DecodedInstruction::new(OpcodeKind::Dec8, 1, if hl { 3 } else { 1 });
            inst.reg = y;
            inst
        }
        6 => {
            let hl = y == crate::registers::REG_HL_INDIRECT;
            let mut inst =
                DecodedInstruction::new(OpcodeKind::LdImm8Reg, 2, if hl { 3 } else { 2 });
            inst.reg = y;
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        0 if y >= 4 => {
            let cc = CC[(y & 3) as usize];
            let mut inst = DecodedInstruction::branch(OpcodeKind::Jr, 2, 2, 3, cc);
            inst.immediate = mmu.read(addr.wrapping_add(1)) as u16;
            inst
        }
        _ => DecodedInstruction::new(OpcodeKind::Undefined, 1, 1),
    }
}

fn decode_block3(mmu: &Mmu, addr: u16, y: u8, z: u8, p: u8, q: u8) -> DecodedInstruction {
    match z {
        0 if y < 4 => {
            DecodedInstruction::branch(OpcodeKind::Ret, 1, 2, 5, CC[y as usize])
        }
        1 if q == 0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Pop, 1, 3);
            inst.reg = p;
            inst
        }
        2 if y < 4 => {
            let mut inst =
                DecodedInstruction::branch(OpcodeKind::Jp, 3, 3, 4, CC[y as usize]);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        4 if y < 4 => {
            let mut inst =
                DecodedInstruction::branch(OpcodeKind::Call, 3, 3, 6, CC[y as usize]);
            inst.immediate = read_u16(mmu, addr.wrapping_add(1));
            inst
        }
        5 if q == 0 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Push, 1, 4);
            inst.reg = p;
            inst
        }
        7 => {
            let mut inst = DecodedInstruction::new(OpcodeKind::Rst, 1, 4);
            inst.immediate = (y as u16) * 8;
            inst
        }
        _ => DecodedInstruction::new(OpcodeKind::Undefined, 1, 1),
    }
}

fn alu_reg_kind(y: u8) -> DecodedInstruction {
    let kind = match y {
        0 => OpcodeKind::Add8,
        1 => OpcodeKind::Adc,
        2 => OpcodeKind::Sub,
        3 => OpcodeKind::Sbc,
        4 => OpcodeKind::And,
        5 => OpcodeKind::Xor,
        6 => OpcodeKind::Or,
        _ => OpcodeKind::Cp,
    };
    DecodedInstruction::new(kind, 1, 1)
}

fn alu_imm_kind(y: u8) -> DecodedInstruction {
    let mut inst = alu_reg_kind(y);
    inst.length = 2;
    inst.cycles_best = 2;
    inst.cycles_worst = 2;
    inst
}

fn decode_extended(ext: u8) -> DecodedInstruction {
    let reg = ext & 7;
    let y = (ext >> 3) & 7;
    let hl = reg == crate::registers::REG_HL_INDIRECT;

    let mut inst = if ext < 0x40 {
        let kind = match y {
            0 => OpcodeKind::Rlc,
            1 => OpcodeKind::Rrc,
            2 => OpcodeKind::Rl,
            3 => OpcodeKind::Rr,
            4 => OpcodeKind::Sla,
            5 => OpcodeKind::Sra,
            6 => OpcodeKind::Swap,
            _ => OpcodeKind::Srl,
        };
        DecodedInstruction::new(kind, 2, if hl { 4 } else { 2 })
    } else if ext < 0x80 {
        DecodedInstruction::new(OpcodeKind::Bit, 2, if hl { 3 } else { 2 })
    } else if ext < 0xc0 {
        DecodedInstruction::new(OpcodeKind::Res, 2, if hl { 4 } else { 2 })
    } else {
        DecodedInstruction::new(OpcodeKind::Set, 2, if hl { 4 } else { 2 })
    };

    inst.reg2 = reg;
    if matches!(inst.kind, OpcodeKind::Bit | OpcodeKind::Res | OpcodeKind::Set) {
        inst.immediate = y as u16;
    }
    inst
}

fn read_u16(mmu: &Mmu, addr: u16) -> u16 {
    let lo = mmu.read(addr) as u16;
    let hi = mmu.read(addr.wrapping_add(1)) as u16;
    lo | (hi << 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::Cartridge;
    use crate::mmu::{Components, Mmu};

    fn new_mmu() -> Mmu {
        Mmu::new(Components::default(), Cartridge::default())
    }

    #[test]
    fn test_decode_nop() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0x00);
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Nop);
        assert_eq!(inst.length, 1);
    }

    #[test]
    fn test_decode_ld_imm8_into_a() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0x3e);
        mmu.write(0xc001, 0x42);
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::LdImm8Reg);
        assert_eq!(inst.reg, 7);
        assert_eq!(inst.immediate, 0x42);
        assert_eq!(inst.length, 2);
    }

    #[test]
    fn test_decode_halt_is_not_ld_reg_reg() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0x76);
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Halt);
    }

    #[test]
    fn test_decode_jp_absolute() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0xc3);
        mmu.write(0xc001, 0x34);
        mmu.write(0xc002, 0x12);
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Jp);
        assert_eq!(inst.immediate, 0x1234);
        assert_eq!(inst.condition, Condition::Always);
        assert_eq!(inst.cycles_best, 4);
        assert_eq!(inst.cycles_worst, 4);
    }

    #[test]
    fn test_decode_jr_nz_has_distinct_best_worst() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0x20);
        mmu.write(0xc001, 0x05);
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Jr);
        assert_eq!(inst.condition, Condition::Nz);
        assert_eq!(inst.cycles_best, 2);
        assert_eq!(inst.cycles_worst, 3);
    }

    #[test]
    fn test_decode_cb_bit_on_hl_indirect() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0xcb);
        mmu.write(0xc001, 0x46); // BIT 0,(HL)
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Bit);
        assert_eq!(inst.reg2, 6);
        assert_eq!(inst.immediate, 0);
        assert_eq!(inst.cycles_best, 3);
    }

    #[test]
    fn test_decode_undefined_opcode() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0xd3);
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Undefined);
    }

    #[test]
    fn test_decode_rst_vector() {
        let mut mmu = new_mmu();
        mmu.write(0xc000, 0xef); // RST 0x28
        let inst = decode(&mmu, 0xc000);
        assert_eq!(inst.kind, OpcodeKind::Rst);
        assert_eq!(inst.immediate, 0x28);
    }
}
