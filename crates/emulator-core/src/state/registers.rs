//! Architectural register file for the 8080 family.

use crate::model::CpuModel;
use crate::state::flags::{self, PSW_RESET};

/// Number of slots in the general register bank, including the `M`
/// pseudo-register position used by the instruction encoding.
pub const REGISTER_COUNT: usize = 8;

/// General register identifier as encoded in bits of the opcode.
///
/// `M` is not backed by storage: it addresses the byte at `HL` and is
/// resolved through the memory hierarchy by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Reg {
    B = 0,
    C = 1,
    D = 2,
    E = 3,
    H = 4,
    L = 5,
    M = 6,
    A = 7,
}

impl Reg {
    /// Ordered register bank layout.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::H,
        Self::L,
        Self::M,
        Self::A,
    ];

    /// Decodes a 3-bit register field.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::B,
            1 => Self::C,
            2 => Self::D,
            3 => Self::E,
            4 => Self::H,
            5 => Self::L,
            6 => Self::M,
            _ => Self::A,
        }
    }

    /// Bank index for this register.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Assembly-level register name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::H => "H",
            Self::L => "L",
            Self::M => "M",
            Self::A => "A",
        }
    }
}

/// Register pair identifier.
///
/// `Psw` packs the flag word in the low byte and `A` in the high byte;
/// it appears only in PUSH/POP encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum RegPair {
    Bc,
    De,
    Hl,
    Sp,
    Psw,
}

impl RegPair {
    /// Decodes the 2-bit pair field (opcode bits 4–5) with `SP` in slot 3.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Sp,
        }
    }

    /// Decodes the 2-bit pair field with `PSW+A` in slot 3 (PUSH/POP).
    #[must_use]
    pub const fn from_u2_psw(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Psw,
        }
    }

    /// Assembly-level pair name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bc => "B",
            Self::De => "D",
            Self::Hl => "H",
            Self::Sp => "SP",
            Self::Psw => "PSW",
        }
    }
}

/// The per-CPU register file: eight 8-bit slots, flag word, SP, PC and
/// the interrupt-enable latch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    bank: [u8; REGISTER_COUNT],
    /// Program status word.
    pub psw: u8,
    /// Stack pointer.
    pub sp: u16,
    /// Program counter.
    pub pc: u16,
    /// Interrupt-enable latch (EI/DI).
    pub ie: bool,
}

impl RegisterFile {
    /// Reads a directly backed register. `M` reads the unused bank slot;
    /// the engine resolves `M` through memory before getting here.
    #[must_use]
    pub const fn reg(&self, r: Reg) -> u8 {
        self.bank[r.index()]
    }

    /// Writes a directly backed register.
    pub const fn set_reg(&mut self, r: Reg, value: u8) {
        self.bank[r.index()] = value;
    }

    /// Reads a register pair as a 16-bit value, first register high.
    #[must_use]
    pub const fn pair(&self, rp: RegPair) -> u16 {
        match rp {
            RegPair::Bc => u16::from_be_bytes([self.reg(Reg::B), self.reg(Reg::C)]),
            RegPair::De => u16::from_be_bytes([self.reg(Reg::D), self.reg(Reg::E)]),
            RegPair::Hl => u16::from_be_bytes([self.reg(Reg::H), self.reg(Reg::L)]),
            RegPair::Sp => self.sp,
            RegPair::Psw => u16::from_be_bytes([self.reg(Reg::A), self.psw]),
        }
    }

    /// Writes a register pair. Writing `Psw` masks the flag byte to the
    /// bits defined for `model` (POP PSW semantics).
    pub const fn set_pair(&mut self, rp: RegPair, value: u16, model: CpuModel) {
        let [high, low] = value.to_be_bytes();
        match rp {
            RegPair::Bc => {
                self.set_reg(Reg::B, high);
                self.set_reg(Reg::C, low);
            }
            RegPair::De => {
                self.set_reg(Reg::D, high);
                self.set_reg(Reg::E, low);
            }
            RegPair::Hl => {
                self.set_reg(Reg::H, high);
                self.set_reg(Reg::L, low);
            }
            RegPair::Sp => self.sp = value,
            RegPair::Psw => {
                self.psw = flags::mask_psw(low, model);
                self.set_reg(Reg::A, high);
            }
        }
    }

    /// Address held in `HL`, the target of the `M` pseudo-register.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        self.pair(RegPair::Hl)
    }

    /// Tests whether `flag` is set in the flag word.
    #[must_use]
    pub const fn flag(&self, flag: u8) -> bool {
        self.psw & flag != 0
    }

    /// Applies reset values: PC=0, PSW=2, IE clear. Registers, SP and the
    /// rest of the bank are left as-is, matching the hardware.
    pub const fn reset(&mut self) {
        self.pc = 0;
        self.psw = PSW_RESET;
        self.ie = false;
    }
}
