//! Opcode decode table for the 8080/8085.
//!
//! A descriptor list in instruction-set order is expanded at compile time
//! into a single 256-entry dispatch table. Decode is pure: it depends on
//! the opcode byte and the CPU model, nothing else.

use crate::model::CpuModel;
use crate::state::flags::{CARRY, PAR, SIGN, ZERO};
use crate::state::registers::{Reg, RegPair};

/// Operand shape of an instruction family, naming how the opcode byte
/// encodes its fields and how many operand bytes follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// No operand.
    Opr,
    /// One immediate byte.
    Imm,
    /// Two-byte absolute address.
    Abs,
    /// Register pair in bits 4–5, two-byte immediate.
    Lxi,
    /// Register pair in bits 4–5 (SP variant), no operand.
    Regx,
    /// Register pair in bits 4–5 (PSW+A variant), no operand.
    Rp0,
    /// BC/DE only in bit 4, no operand.
    Reg2,
    /// Destination register in bits 3–5, no operand.
    Reg,
    /// Destination register in bits 3–5, one immediate byte.
    Immr,
    /// Destination in bits 3–5, source in bits 0–2.
    Mov,
    /// Source register in bits 0–2.
    Sopr,
    /// Restart vector number in bits 3–5.
    Rst,
    /// Condition code in bits 3–5.
    Cc,
}

/// Branch condition encoded in bits 3–5 of the conditional opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

impl Cond {
    /// Decodes the 3-bit condition field.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Nz,
            1 => Self::Z,
            2 => Self::Nc,
            3 => Self::C,
            4 => Self::Po,
            5 => Self::Pe,
            6 => Self::P,
            _ => Self::M,
        }
    }

    /// Evaluates the condition against a flag word.
    #[must_use]
    pub const fn holds(self, psw: u8) -> bool {
        match self {
            Self::Nz => psw & ZERO == 0,
            Self::Z => psw & ZERO != 0,
            Self::Nc => psw & CARRY == 0,
            Self::C => psw & CARRY != 0,
            Self::Po => psw & PAR == 0,
            Self::Pe => psw & PAR != 0,
            Self::P => psw & SIGN == 0,
            Self::M => psw & SIGN != 0,
        }
    }

    /// Condition suffix for disassembly (`NZ`, `PE`, ...).
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Nz => "NZ",
            Self::Z => "Z",
            Self::Nc => "NC",
            Self::C => "C",
            Self::Po => "PO",
            Self::Pe => "PE",
            Self::P => "P",
            Self::M => "M",
        }
    }
}

/// Instruction identity used by the execution dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpKind {
    Nop,
    Lxi,
    Dad,
    Stax,
    Ldax,
    Shld,
    Lhld,
    Sta,
    Lda,
    Inr,
    Dcr,
    Inx,
    Dcx,
    Mvi,
    Rlc,
    Rrc,
    Ral,
    Rar,
    Daa,
    Cma,
    Stc,
    Cmc,
    Mov,
    Hlt,
    Add,
    Adc,
    Sub,
    Sbb,
    Ana,
    Xra,
    Ora,
    Cmp,
    Rcc,
    Jcc,
    Ccc,
    Pop,
    Push,
    Ret,
    Call,
    Jmp,
    Pchl,
    Sphl,
    Adi,
    Aci,
    Sui,
    Sbi,
    Ani,
    Xri,
    Ori,
    Cpi,
    Out,
    In,
    Di,
    Ei,
    Xthl,
    Xchg,
    Rst,
    Rim,
    Sim,
    Dsub,
    Arhl,
    Rdel,
    Ldhi,
    Ldsi,
    Rstv,
    Shlx,
    Lhlx,
    Jnx5,
    Jx5,
    /// Slot not defined for the executing model.
    Illegal,
}

/// Compile-time instruction descriptor; one entry per instruction family.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    /// Mnemonic (conditional families carry just the prefix letter).
    pub mnemonic: &'static str,
    /// Execution identity.
    pub kind: OpKind,
    /// Encoding shape.
    pub shape: Shape,
    /// Base opcode byte.
    pub base: u8,
    /// Minimum CPU model.
    pub model: CpuModel,
}

const fn desc(
    mnemonic: &'static str,
    kind: OpKind,
    shape: Shape,
    base: u8,
    model: CpuModel,
) -> Descriptor {
    Descriptor {
        mnemonic,
        kind,
        shape,
        base,
        model,
    }
}

/// The instruction set, in the traditional listing order.
pub const DESCRIPTORS: &[Descriptor] = &[
    desc("NOP", OpKind::Nop, Shape::Opr, 0x00, CpuModel::I8080),
    desc("LXI", OpKind::Lxi, Shape::Lxi, 0x01, CpuModel::I8080),
    desc("DAD", OpKind::Dad, Shape::Regx, 0x09, CpuModel::I8080),
    desc("STAX", OpKind::Stax, Shape::Reg2, 0x02, CpuModel::I8080),
    desc("LDAX", OpKind::Ldax, Shape::Reg2, 0x0A, CpuModel::I8080),
    desc("SHLD", OpKind::Shld, Shape::Abs, 0x22, CpuModel::I8080),
    desc("LHLD", OpKind::Lhld, Shape::Abs, 0x2A, CpuModel::I8080),
    desc("STA", OpKind::Sta, Shape::Abs, 0x32, CpuModel::I8080),
    desc("LDA", OpKind::Lda, Shape::Abs, 0x3A, CpuModel::I8080),
    desc("INR", OpKind::Inr, Shape::Reg, 0x04, CpuModel::I8080),
    desc("DCR", OpKind::Dcr, Shape::Reg, 0x05, CpuModel::I8080),
    desc("INX", OpKind::Inx, Shape::Regx, 0x03, CpuModel::I8080),
    desc("DCX", OpKind::Dcx, Shape::Regx, 0x0B, CpuModel::I8080),
    desc("MVI", OpKind::Mvi, Shape::Immr, 0x06, CpuModel::I8080),
    desc("RLC", OpKind::Rlc, Shape::Opr, 0x07, CpuModel::I8080),
    desc("RRC", OpKind::Rrc, Shape::Opr, 0x0F, CpuModel::I8080),
    desc("RAL", OpKind::Ral, Shape::Opr, 0x17, CpuModel::I8080),
    desc("RAR", OpKind::Rar, Shape::Opr, 0x1F, CpuModel::I8080),
    desc("DAA", OpKind::Daa, Shape::Opr, 0x27, CpuModel::I8080),
    desc("CMA", OpKind::Cma, Shape::Opr, 0x2F, CpuModel::I8080),
    desc("STC", OpKind::Stc, Shape::Opr, 0x37, CpuModel::I8080),
    desc("CMC", OpKind::Cmc, Shape::Opr, 0x3F, CpuModel::I8080),
    desc("MOV", OpKind::Mov, Shape::Mov, 0x40, CpuModel::I8080),
    desc("HLT", OpKind::Hlt, Shape::Opr, 0x76, CpuModel::I8080),
    desc("ADD", OpKind::Add, Shape::Sopr, 0x80, CpuModel::I8080),
    desc("ADC", OpKind::Adc, Shape::Sopr, 0x88, CpuModel::I8080),
    desc("SUB", OpKind::Sub, Shape::Sopr, 0x90, CpuModel::I8080),
    desc("SBB", OpKind::Sbb, Shape::Sopr, 0x98, CpuModel::I8080),
    desc("ANA", OpKind::Ana, Shape::Sopr, 0xA0, CpuModel::I8080),
    desc("XRA", OpKind::Xra, Shape::Sopr, 0xA8, CpuModel::I8080),
    desc("ORA", OpKind::Ora, Shape::Sopr, 0xB0, CpuModel::I8080),
    desc("CMP", OpKind::Cmp, Shape::Sopr, 0xB8, CpuModel::I8080),
    desc("R", OpKind::Rcc, Shape::Cc, 0xC0, CpuModel::I8080),
    desc("J", OpKind::Jcc, Shape::Cc, 0xC2, CpuModel::I8080),
    desc("C", OpKind::Ccc, Shape::Cc, 0xC4, CpuModel::I8080),
    desc("POP", OpKind::Pop, Shape::Rp0, 0xC1, CpuModel::I8080),
    desc("RET", OpKind::Ret, Shape::Opr, 0xC9, CpuModel::I8080),
    desc("PCHL", OpKind::Pchl, Shape::Opr, 0xE9, CpuModel::I8080),
    desc("SPHL", OpKind::Sphl, Shape::Opr, 0xF9, CpuModel::I8080),
    desc("ADI", OpKind::Adi, Shape::Imm, 0xC6, CpuModel::I8080),
    desc("ACI", OpKind::Aci, Shape::Imm, 0xCE, CpuModel::I8080),
    desc("SUI", OpKind::Sui, Shape::Imm, 0xD6, CpuModel::I8080),
    desc("SBI", OpKind::Sbi, Shape::Imm, 0xDE, CpuModel::I8080),
    desc("ANI", OpKind::Ani, Shape::Imm, 0xE6, CpuModel::I8080),
    desc("XRI", OpKind::Xri, Shape::Imm, 0xEE, CpuModel::I8080),
    desc("ORI", OpKind::Ori, Shape::Imm, 0xF6, CpuModel::I8080),
    desc("CPI", OpKind::Cpi, Shape::Imm, 0xFE, CpuModel::I8080),
    desc("PUSH", OpKind::Push, Shape::Rp0, 0xC5, CpuModel::I8080),
    desc("CALL", OpKind::Call, Shape::Abs, 0xCD, CpuModel::I8080),
    desc("JMP", OpKind::Jmp, Shape::Abs, 0xC3, CpuModel::I8080),
    desc("OUT", OpKind::Out, Shape::Imm, 0xD3, CpuModel::I8080),
    desc("IN", OpKind::In, Shape::Imm, 0xDB, CpuModel::I8080),
    desc("DI", OpKind::Di, Shape::Opr, 0xF3, CpuModel::I8080),
    desc("EI", OpKind::Ei, Shape::Opr, 0xFB, CpuModel::I8080),
    desc("XTHL", OpKind::Xthl, Shape::Opr, 0xE3, CpuModel::I8080),
    desc("XCHG", OpKind::Xchg, Shape::Opr, 0xEB, CpuModel::I8080),
    desc("RST", OpKind::Rst, Shape::Rst, 0xC7, CpuModel::I8080),
    desc("RIM", OpKind::Rim, Shape::Opr, 0x20, CpuModel::I8085),
    desc("SIM", OpKind::Sim, Shape::Opr, 0x30, CpuModel::I8085),
    desc("DSUB", OpKind::Dsub, Shape::Opr, 0x08, CpuModel::I8085),
    desc("ARHL", OpKind::Arhl, Shape::Opr, 0x10, CpuModel::I8085),
    desc("RDEL", OpKind::Rdel, Shape::Opr, 0x18, CpuModel::I8085),
    desc("LDHI", OpKind::Ldhi, Shape::Imm, 0x28, CpuModel::I8085),
    desc("LDSI", OpKind::Ldsi, Shape::Imm, 0x38, CpuModel::I8085),
    desc("RSTV", OpKind::Rstv, Shape::Opr, 0xCB, CpuModel::I8085),
    desc("SHLX", OpKind::Shlx, Shape::Opr, 0xD9, CpuModel::I8085),
    desc("JNX5", OpKind::Jnx5, Shape::Abs, 0xDD, CpuModel::I8085),
    desc("LHLX", OpKind::Lhlx, Shape::Opr, 0xED, CpuModel::I8085),
    desc("JX5", OpKind::Jx5, Shape::Abs, 0xFD, CpuModel::I8085),
];

/// One slot of the 256-entry dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct TableEntry {
    /// Execution identity.
    pub kind: OpKind,
    /// Encoding shape.
    pub shape: Shape,
    /// Minimum model for this slot.
    pub model: CpuModel,
    /// Mnemonic (or prefix, for conditional families).
    pub mnemonic: &'static str,
}

const ILLEGAL: TableEntry = TableEntry {
    kind: OpKind::Illegal,
    shape: Shape::Opr,
    model: CpuModel::I8080,
    mnemonic: "?",
};

/// The dispatch table, expanded from [`DESCRIPTORS`] at compile time.
pub const DECODE_TABLE: [TableEntry; 256] = build_table();

const fn entry_of(d: &Descriptor) -> TableEntry {
    TableEntry {
        kind: d.kind,
        shape: d.shape,
        model: d.model,
        mnemonic: d.mnemonic,
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn build_table() -> [TableEntry; 256] {
    let mut table = [ILLEGAL; 256];
    let mut i = 0;
    while i < DESCRIPTORS.len() {
        let d = &DESCRIPTORS[i];
        let base = d.base as usize;
        match d.shape {
            Shape::Opr | Shape::Imm | Shape::Abs => {
                table[base] = entry_of(d);
            }
            Shape::Lxi | Shape::Regx | Shape::Rp0 => {
                let mut rp = 0;
                while rp < 4 {
                    table[base + (rp << 4)] = entry_of(d);
                    rp += 1;
                }
            }
            Shape::Reg2 => {
                table[base] = entry_of(d);
                table[base + 0x10] = entry_of(d);
            }
            Shape::Reg | Shape::Immr | Shape::Rst | Shape::Cc => {
                let mut r = 0;
                while r < 8 {
                    table[base + (r << 3)] = entry_of(d);
                    r += 1;
                }
            }
            Shape::Mov => {
                let mut dst = 0;
                while dst < 8 {
                    let mut src = 0;
                    while src < 8 {
                        // MOV M,M is the HLT slot, claimed separately.
                        if !(dst == 6 && src == 6) {
                            table[base + (dst << 3) + src] = entry_of(d);
                        }
                        src += 1;
                    }
                    dst += 1;
                }
            }
            Shape::Sopr => {
                let mut src = 0;
                while src < 8 {
                    table[base + src] = entry_of(d);
                    src += 1;
                }
            }
        }
        i += 1;
    }
    table
}

/// A decoded instruction: the table entry plus the raw opcode byte the
/// field accessors extract from.
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    /// Raw opcode byte.
    pub opcode: u8,
    /// Execution identity (`Illegal` when the slot is gated above the
    /// executing model).
    pub kind: OpKind,
    /// Encoding shape.
    pub shape: Shape,
    /// Mnemonic or conditional prefix.
    pub mnemonic: &'static str,
}

impl Decoded {
    /// Destination register field (bits 3–5).
    #[must_use]
    pub const fn dst(self) -> Reg {
        Reg::from_u3(self.opcode >> 3)
    }

    /// Source register field (bits 0–2).
    #[must_use]
    pub const fn src(self) -> Reg {
        Reg::from_u3(self.opcode)
    }

    /// Register pair field (bits 4–5), SP variant.
    #[must_use]
    pub const fn pair(self) -> RegPair {
        RegPair::from_u2(self.opcode >> 4)
    }

    /// Register pair field (bits 4–5), PSW+A variant (PUSH/POP).
    #[must_use]
    pub const fn pair_psw(self) -> RegPair {
        RegPair::from_u2_psw(self.opcode >> 4)
    }

    /// Condition field (bits 3–5).
    #[must_use]
    pub const fn cond(self) -> Cond {
        Cond::from_u3(self.opcode >> 3)
    }

    /// Restart vector number (bits 3–5).
    #[must_use]
    pub const fn vector(self) -> u8 {
        (self.opcode >> 3) & 0x07
    }

    /// Total instruction length in bytes, including the opcode.
    #[must_use]
    pub const fn length(self) -> usize {
        match self.shape {
            Shape::Abs | Shape::Lxi => 3,
            Shape::Imm | Shape::Immr => 2,
            Shape::Cc => match self.kind {
                OpKind::Jcc | OpKind::Ccc => 3,
                _ => 1,
            },
            _ => 1,
        }
    }
}

/// Decodes one opcode byte for the given model.
///
/// Pure: the result depends only on the arguments. Slots gated above
/// `model` decode as [`OpKind::Illegal`]; the engine treats those as NOP
/// on the 8080 and reports them as informational on the 8085.
#[must_use]
pub const fn decode(opcode: u8, model: CpuModel) -> Decoded {
    let entry = &DECODE_TABLE[opcode as usize];
    if model.supports(entry.model) {
        Decoded {
            opcode,
            kind: entry.kind,
            shape: entry.shape,
            mnemonic: entry.mnemonic,
        }
    } else {
        Decoded {
            opcode,
            kind: OpKind::Illegal,
            shape: Shape::Opr,
            mnemonic: entry.mnemonic,
        }
    }
}
