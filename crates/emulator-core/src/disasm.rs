//! Shape-driven disassembly and the trace side channel.

use std::fmt::Write as _;

use crate::cpu::Cpu;
use crate::decoder::{decode, OpKind, Shape};
use crate::state::registers::{Reg, RegisterFile};

/// Disassembles one instruction.
///
/// `operand` is the 16-bit little-endian word following the opcode (its
/// low byte doubles as the one-byte immediate). Returns the rendered
/// text and the instruction length in bytes.
#[must_use]
pub fn disassemble(opcode: u8, operand: u16, model: crate::model::CpuModel) -> (String, usize) {
    let d = decode(opcode, model);
    let mut text = String::new();
    match d.shape {
        Shape::Opr => text.push_str(d.mnemonic),
        Shape::Imm => {
            let _ = write!(text, "{} {:02X}", d.mnemonic, operand & 0xFF);
        }
        Shape::Abs => {
            let _ = write!(text, "{} {:04X}", d.mnemonic, operand);
        }
        Shape::Lxi => {
            let _ = write!(text, "{} {},{:04X}", d.mnemonic, d.pair().name(), operand);
        }
        Shape::Regx => {
            let _ = write!(text, "{} {}", d.mnemonic, d.pair().name());
        }
        Shape::Rp0 => {
            let _ = write!(text, "{} {}", d.mnemonic, d.pair_psw().name());
        }
        Shape::Reg2 => {
            let _ = write!(text, "{} {}", d.mnemonic, d.pair().name());
        }
        Shape::Reg => {
            let _ = write!(text, "{} {}", d.mnemonic, d.dst().name());
        }
        Shape::Immr => {
            let _ = write!(text, "{} {},{:02X}", d.mnemonic, d.dst().name(), operand & 0xFF);
        }
        Shape::Mov => {
            let _ = write!(text, "{} {},{}", d.mnemonic, d.dst().name(), d.src().name());
        }
        Shape::Sopr => {
            let _ = write!(text, "{} {}", d.mnemonic, d.src().name());
        }
        Shape::Rst => {
            let _ = write!(text, "{} {}", d.mnemonic, d.vector());
        }
        Shape::Cc => {
            let _ = write!(text, "{}{}", d.mnemonic, d.cond().suffix());
            if matches!(d.kind, OpKind::Jcc | OpKind::Ccc) {
                let _ = write!(text, " {operand:04X}");
            }
        }
    }
    if matches!(d.kind, OpKind::Illegal) {
        text = format!("{opcode:02X}");
    }
    (text, d.length())
}

/// Renders the data registers, skipping the `M` pseudo-slot.
#[must_use]
pub fn dump_regs(regs: &RegisterFile) -> String {
    let mut out = String::new();
    for r in Reg::ALL {
        if r == Reg::M {
            continue;
        }
        let _ = write!(out, "{}={:02X} ", r.name(), regs.reg(r));
    }
    out
}

impl Cpu {
    /// Formats a trace line for the instruction at PC: registers, SP,
    /// PC, PSW and the disassembly. Reads memory through the fast path
    /// and never mutates state.
    #[must_use]
    pub fn trace_line(&self) -> String {
        let pc = self.regs.pc;
        let opcode = self.mem_read(pc);
        let operand = u16::from_le_bytes([
            self.mem_read(pc.wrapping_add(1)),
            self.mem_read(pc.wrapping_add(2)),
        ]);
        let (text, _len) = disassemble(opcode, operand, self.model());
        format!(
            "{}SP={:04X} {:04X} {:02X} {}",
            dump_regs(&self.regs),
            self.regs.sp,
            pc,
            self.regs.psw,
            text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{disassemble, dump_regs};
    use crate::cpu::{Cpu, ADDRESS_SPACE};
    use crate::memory::Memory;
    use crate::model::CpuModel;
    use crate::state::registers::{Reg, RegisterFile};

    #[test]
    fn shapes_render_their_operand_forms() {
        let m = CpuModel::I8080;
        assert_eq!(disassemble(0x00, 0, m), ("NOP".into(), 1));
        assert_eq!(disassemble(0x3E, 0x0042, m), ("MVI A,42".into(), 2));
        assert_eq!(disassemble(0x01, 0x1234, m), ("LXI B,1234".into(), 3));
        assert_eq!(disassemble(0xC3, 0x0100, m), ("JMP 0100".into(), 3));
        assert_eq!(disassemble(0x78, 0, m), ("MOV A,B".into(), 1));
        assert_eq!(disassemble(0x86, 0, m), ("ADD M".into(), 1));
        assert_eq!(disassemble(0xF5, 0, m), ("PUSH PSW".into(), 1));
        assert_eq!(disassemble(0xEF, 0, m), ("RST 5".into(), 1));
        assert_eq!(disassemble(0x04, 0, m), ("INR B".into(), 1));
        assert_eq!(disassemble(0x09, 0, m), ("DAD B".into(), 1));
        assert_eq!(disassemble(0x0A, 0, m), ("LDAX B".into(), 1));
    }

    #[test]
    fn conditionals_compose_prefix_and_condition() {
        let m = CpuModel::I8080;
        assert_eq!(disassemble(0xC0, 0, m), ("RNZ".into(), 1));
        assert_eq!(disassemble(0xCA, 0x0120, m), ("JZ 0120".into(), 3));
        assert_eq!(disassemble(0xE4, 0x2000, m), ("CPO 2000".into(), 3));
    }

    #[test]
    fn reserved_slots_render_as_raw_bytes_on_8080() {
        let (text, len) = disassemble(0x08, 0, CpuModel::I8080);
        assert_eq!(text, "08");
        assert_eq!(len, 1);
        // The same slot is DSUB on the 8085.
        assert_eq!(disassemble(0x08, 0, CpuModel::I8085).0, "DSUB");
    }

    #[test]
    fn register_dump_skips_the_m_slot() {
        let mut regs = RegisterFile::default();
        regs.set_reg(Reg::A, 0x42);
        let dump = dump_regs(&regs);
        assert!(dump.contains("A=42"));
        assert!(!dump.contains("M="));
    }

    #[test]
    fn trace_line_reports_pc_and_disassembly_without_mutation() {
        let mut cpu = Cpu::new(CpuModel::I8080);
        cpu.init().expect("default chunking");
        cpu.add_memory(Memory::ram(ADDRESS_SPACE, 0).into_handle());
        cpu.mem_write(0x3E, 0x0100);
        cpu.mem_write(0x42, 0x0101);
        cpu.regs.pc = 0x0100;

        let before = cpu.regs.clone();
        let line = cpu.trace_line();
        assert!(line.contains("0100"));
        assert!(line.contains("MVI A,42"));
        assert_eq!(cpu.regs, before);
    }
}
