//! Instruction handlers for the 8080/8085 execution engine.
//!
//! Subtraction runs through the add-via-complement path of the silicon:
//! `A + ~v + carry`, with the carry out of bit 7 inverted to produce the
//! borrow flag. Auxiliary carry always reflects the nibble sum of that
//! same path.

use crate::cpu::Cpu;
use crate::decoder::{Decoded, OpKind};
use crate::model::CpuModel;
use crate::state::flags::{self, AC, CARRY, SIGN, VFLG, XFLG};
use crate::state::registers::{Reg, RegPair};
use crate::timing::CONDITIONAL_TAKEN_EXTRA;

/// Majority function of the three sign bits; the 8085's undocumented
/// X flag source for arithmetic results.
const fn sign_majority(a: u8, v: u8, result: u8) -> bool {
    ((a & v) | (a & result) | (v & result)) & SIGN != 0
}

/// Signed-overflow predicate on the add path.
const fn add_overflow(a: u8, v: u8, result: u8) -> bool {
    ((a & v & !result) | (!a & !v & result)) & SIGN != 0
}

impl Cpu {
    /// Dispatches one decoded instruction.
    pub(crate) fn execute(&mut self, d: &Decoded) {
        match d.kind {
            OpKind::Nop | OpKind::Rim | OpKind::Sim | OpKind::Illegal => {}

            OpKind::Mov => {
                let value = self.get_reg(d.src());
                self.set_reg(d.dst(), value);
            }
            OpKind::Mvi => {
                let value = self.fetch();
                self.set_reg(d.dst(), value);
            }
            OpKind::Lxi => {
                let value = self.fetch_addr();
                let pair = d.pair();
                self.regs.set_pair(pair, value, self.model());
            }

            OpKind::Add => {
                let v = self.get_reg(d.src());
                self.op_add(v, 0);
            }
            OpKind::Adc => {
                let v = self.get_reg(d.src());
                let carry = self.regs.psw & CARRY;
                self.op_add(v, carry);
            }
            OpKind::Sub => {
                let v = self.get_reg(d.src());
                self.op_sub(v, 1, true);
            }
            OpKind::Sbb => {
                let v = self.get_reg(d.src());
                let borrow_in = u8::from(self.regs.psw & CARRY == 0);
                self.op_sub(v, borrow_in, true);
            }
            OpKind::Cmp => {
                let v = self.get_reg(d.src());
                self.op_sub(v, 1, false);
            }
            OpKind::Ana => {
                let v = self.get_reg(d.src());
                self.op_ana(v);
            }
            OpKind::Xra => {
                let v = self.get_reg(d.src());
                self.op_xra(v);
            }
            OpKind::Ora => {
                let v = self.get_reg(d.src());
                self.op_ora(v);
            }

            OpKind::Adi => {
                let v = self.fetch();
                self.op_add(v, 0);
            }
            OpKind::Aci => {
                let v = self.fetch();
                let carry = self.regs.psw & CARRY;
                self.op_add(v, carry);
            }
            OpKind::Sui => {
                let v = self.fetch();
                self.op_sub(v, 1, true);
            }
            OpKind::Sbi => {
                let v = self.fetch();
                let borrow_in = u8::from(self.regs.psw & CARRY == 0);
                self.op_sub(v, borrow_in, true);
            }
            OpKind::Ani => {
                let v = self.fetch();
                self.op_ana(v);
            }
            OpKind::Xri => {
                let v = self.fetch();
                self.op_xra(v);
            }
            OpKind::Ori => {
                let v = self.fetch();
                self.op_ora(v);
            }
            OpKind::Cpi => {
                let v = self.fetch();
                self.op_sub(v, 1, false);
            }

            OpKind::Inr => self.op_inr(d.dst()),
            OpKind::Dcr => self.op_dcr(d.dst()),
            OpKind::Daa => self.op_daa(),

            OpKind::Rlc => self.op_rlc(),
            OpKind::Rrc => self.op_rrc(),
            OpKind::Ral => self.op_ral(),
            OpKind::Rar => self.op_rar(),
            OpKind::Cma => {
                let value = self.get_reg(Reg::A) ^ 0xFF;
                self.set_reg(Reg::A, value);
            }
            OpKind::Stc => self.regs.psw |= CARRY,
            OpKind::Cmc => self.regs.psw ^= CARRY,

            OpKind::Dad => self.op_dad(d.pair()),
            OpKind::Inx => {
                let pair = d.pair();
                let value = self.regs.pair(pair).wrapping_add(1);
                self.regs.set_pair(pair, value, self.model());
            }
            OpKind::Dcx => {
                let pair = d.pair();
                let value = self.regs.pair(pair).wrapping_sub(1);
                self.regs.set_pair(pair, value, self.model());
            }

            OpKind::Stax => {
                let addr = self.regs.pair(d.pair());
                let a = self.regs.reg(Reg::A);
                self.mem_write(a, addr);
            }
            OpKind::Ldax => {
                let addr = self.regs.pair(d.pair());
                let value = self.mem_read(addr);
                self.regs.set_reg(Reg::A, value);
            }
            OpKind::Shld => {
                let addr = self.fetch_addr();
                let hl = self.regs.hl();
                self.store_double(hl, addr);
            }
            OpKind::Lhld => {
                let addr = self.fetch_addr();
                let value = self.read_double(addr);
                self.regs.set_pair(RegPair::Hl, value, self.model());
            }
            OpKind::Sta => {
                let addr = self.fetch_addr();
                let a = self.regs.reg(Reg::A);
                self.mem_write(a, addr);
            }
            OpKind::Lda => {
                let addr = self.fetch_addr();
                let value = self.mem_read(addr);
                self.regs.set_reg(Reg::A, value);
            }

            OpKind::Jmp => {
                self.regs.pc = self.fetch_addr();
            }
            OpKind::Jcc => {
                let addr = self.fetch_addr();
                if d.cond().holds(self.regs.psw) {
                    self.regs.pc = addr;
                }
            }
            OpKind::Call => {
                let addr = self.fetch_addr();
                let pc = self.regs.pc;
                self.push(pc);
                self.regs.pc = addr;
            }
            OpKind::Ccc => {
                let addr = self.fetch_addr();
                if d.cond().holds(self.regs.psw) {
                    let pc = self.regs.pc;
                    self.push(pc);
                    self.regs.pc = addr;
                    self.cycles += CONDITIONAL_TAKEN_EXTRA;
                }
            }
            OpKind::Ret => {
                self.regs.pc = self.pop();
            }
            OpKind::Rcc => {
                if d.cond().holds(self.regs.psw) {
                    self.regs.pc = self.pop();
                    self.cycles += CONDITIONAL_TAKEN_EXTRA;
                }
            }
            OpKind::Rst => {
                let pc = self.regs.pc;
                self.push(pc);
                self.regs.pc = u16::from(d.vector()) * 8;
            }
            OpKind::Pchl => self.regs.pc = self.regs.hl(),
            OpKind::Sphl => self.regs.sp = self.regs.hl(),

            OpKind::Push => {
                let value = self.regs.pair(d.pair_psw());
                self.push(value);
            }
            OpKind::Pop => {
                let value = self.pop();
                let pair = d.pair_psw();
                self.regs.set_pair(pair, value, self.model());
            }
            OpKind::Xthl => self.op_xthl(),
            OpKind::Xchg => {
                let hl = self.regs.hl();
                let de = self.regs.pair(RegPair::De);
                self.regs.set_pair(RegPair::Hl, de, self.model());
                self.regs.set_pair(RegPair::De, hl, self.model());
            }

            OpKind::Out => {
                let port = self.fetch();
                let a = self.regs.reg(Reg::A);
                self.io_output(a, port);
            }
            OpKind::In => {
                let port = self.fetch();
                let value = self.io_input(port);
                self.regs.set_reg(Reg::A, value);
            }
            OpKind::Di => self.regs.ie = false,
            OpKind::Ei => self.regs.ie = true,
            OpKind::Hlt => self.halt(),

            OpKind::Dsub => self.op_dsub(),
            OpKind::Arhl => self.op_arhl(),
            OpKind::Rdel => self.op_rdel(),
            OpKind::Ldhi => {
                let offset = u16::from(self.fetch());
                let value = self.regs.hl().wrapping_add(offset);
                self.regs.set_pair(RegPair::De, value, self.model());
            }
            OpKind::Ldsi => {
                let offset = u16::from(self.fetch());
                let value = self.regs.sp.wrapping_add(offset);
                self.regs.set_pair(RegPair::De, value, self.model());
            }
            OpKind::Rstv => {
                if self.regs.flag(VFLG) {
                    let pc = self.regs.pc;
                    self.push(pc);
                    self.regs.pc = 0x40;
                }
            }
            OpKind::Shlx => {
                let addr = self.regs.pair(RegPair::De);
                let hl = self.regs.hl();
                self.store_double(hl, addr);
            }
            OpKind::Lhlx => {
                let addr = self.regs.pair(RegPair::De);
                let value = self.read_double(addr);
                self.regs.set_pair(RegPair::Hl, value, self.model());
            }
            OpKind::Jnx5 => {
                let addr = self.fetch_addr();
                if !self.regs.flag(XFLG) {
                    self.regs.pc = addr;
                }
            }
            OpKind::Jx5 => {
                let addr = self.fetch_addr();
                if self.regs.flag(XFLG) {
                    self.regs.pc = addr;
                }
            }
        }
    }

    fn op_add(&mut self, v: u8, carry_in: u8) {
        let a = self.get_reg(Reg::A);
        let nibble = (a & 0x0F) + (v & 0x0F) + carry_in;
        let sum = u16::from(a) + u16::from(v) + u16::from(carry_in);
        let carry = sum & 0x100 != 0;
        let result = (sum & 0xFF) as u8;
        let mut psw =
            flags::flag_gen(result, self.model()) | (nibble & AC) | u8::from(carry);
        if self.model() == CpuModel::I8085 {
            if sign_majority(a, v, result) {
                psw |= XFLG;
            }
            if add_overflow(a, v, result) {
                psw |= VFLG;
            }
        }
        self.regs.psw = psw;
        self.set_reg(Reg::A, result);
    }

    /// SUB/SBB/CMP. `carry_in` is 1 for SUB/CMP and the inverted borrow
    /// for SBB; `store` is false for CMP, which discards the result.
    fn op_sub(&mut self, v: u8, carry_in: u8, store: bool) {
        let a = self.get_reg(Reg::A);
        let comp = v ^ 0xFF;
        let nibble = (a & 0x0F) + (comp & 0x0F) + carry_in;
        let sum = u16::from(a) + u16::from(comp) + u16::from(carry_in);
        // Borrow present exactly when the add path did not carry out.
        let borrow = sum & 0x100 == 0;
        let result = (sum & 0xFF) as u8;
        let mut psw =
            flags::flag_gen(result, self.model()) | (nibble & AC) | u8::from(borrow);
        if self.model() == CpuModel::I8085 {
            if ((a & !comp) | (result & a) | (result & !comp)) & SIGN != 0 {
                psw |= XFLG;
            }
            if add_overflow(a, comp, result) {
                psw |= VFLG;
            }
        }
        self.regs.psw = psw;
        if store {
            self.set_reg(Reg::A, result);
        }
    }

    fn op_ana(&mut self, v: u8) {
        let a = self.get_reg(Reg::A);
        let aux = match self.model() {
            CpuModel::I8080 => ((a | v) << 1) & AC,
            CpuModel::I8085 => AC,
        };
        let result = a & v;
        let mut psw = flags::flag_gen(result, self.model()) | aux;
        if self.model() == CpuModel::I8085 && sign_majority(a, v, result) {
            psw |= XFLG;
        }
        self.regs.psw = psw;
        self.set_reg(Reg::A, result);
    }

    fn op_xra(&mut self, v: u8) {
        let a = self.get_reg(Reg::A);
        let result = a ^ v;
        let mut psw = flags::flag_gen(result, self.model());
        if self.model() == CpuModel::I8085 && sign_majority(a, v, result) {
            psw |= XFLG;
        }
        self.regs.psw = psw;
        self.set_reg(Reg::A, result);
    }

    fn op_ora(&mut self, v: u8) {
        let a = self.get_reg(Reg::A);
        let result = a | v;
        let mut psw = flags::flag_gen(result, self.model());
        if self.model() == CpuModel::I8085 && sign_majority(a, v, result) {
            psw |= XFLG;
        }
        self.regs.psw = psw;
        self.set_reg(Reg::A, result);
    }

    fn op_inr(&mut self, r: Reg) {
        let value = self.get_reg(r).wrapping_add(1);
        let aux = if value & 0x0F == 0 { AC } else { 0 };
        self.regs.psw = (self.regs.psw & CARRY) | flags::flag_gen(value, self.model()) | aux;
        self.set_reg(r, value);
    }

    fn op_dcr(&mut self, r: Reg) {
        let value = self.get_reg(r).wrapping_sub(1);
        // Add-via-complement: no nibble borrow unless the result nibble
        // wrapped to 0xF.
        let aux = if value & 0x0F == 0x0F { 0 } else { AC };
        self.regs.psw = (self.regs.psw & CARRY) | flags::flag_gen(value, self.model()) | aux;
        self.set_reg(r, value);
    }

    fn op_daa(&mut self) {
        let a = self.get_reg(Reg::A);
        let mut adjust: u8 = 0;
        let mut aux = 0;
        let mut carry = 0;
        if self.regs.flag(AC) || a & 0x0F > 9 {
            adjust += 0x06;
            aux = if a & 0x0F > 9 { AC } else { 0 };
        }
        if self.regs.flag(CARRY) || a >= 0x9A {
            adjust += 0x60;
            carry = 1;
        }
        let result = a.wrapping_add(adjust);
        self.regs.psw = flags::flag_gen(result, self.model()) | aux | carry;
        self.set_reg(Reg::A, result);
    }

    fn op_rlc(&mut self) {
        let a = self.get_reg(Reg::A);
        let carry = a >> 7;
        self.set_reg(Reg::A, (a << 1) | carry);
        self.regs.psw = (self.regs.psw & !CARRY) | carry;
    }

    fn op_rrc(&mut self) {
        let a = self.get_reg(Reg::A);
        let carry = a & 1;
        self.set_reg(Reg::A, (a >> 1) | (carry << 7));
        self.regs.psw = (self.regs.psw & !CARRY) | carry;
        if self.model() == CpuModel::I8085 {
            self.regs.psw &= !VFLG;
        }
    }

    fn op_ral(&mut self) {
        let a = self.get_reg(Reg::A);
        let carry = a >> 7;
        let value = (a << 1) | (self.regs.psw & CARRY);
        self.set_reg(Reg::A, value);
        self.regs.psw = (self.regs.psw & !CARRY) | carry;
    }

    fn op_rar(&mut self) {
        let a = self.get_reg(Reg::A);
        let carry = a & 1;
        let value = (a >> 1) | ((self.regs.psw & CARRY) << 7);
        self.set_reg(Reg::A, value);
        self.regs.psw = (self.regs.psw & !CARRY) | carry;
        if self.model() == CpuModel::I8085 {
            self.regs.psw &= !VFLG;
        }
    }

    fn op_dad(&mut self, pair: RegPair) {
        let sum = u32::from(self.regs.hl()) + u32::from(self.regs.pair(pair));
        self.regs
            .set_pair(RegPair::Hl, (sum & 0xFFFF) as u16, self.model());
        self.regs.psw &= !CARRY;
        if sum & 0x1_0000 != 0 {
            self.regs.psw |= CARRY;
        }
    }

    fn op_xthl(&mut self) {
        let sp = self.regs.sp;
        let low = self.regs.reg(Reg::L);
        let swapped = self.mem_read(sp);
        self.mem_write(low, sp);
        self.regs.set_reg(Reg::L, swapped);

        let high_addr = sp.wrapping_add(1);
        let high = self.regs.reg(Reg::H);
        let swapped = self.mem_read(high_addr);
        self.mem_write(high, high_addr);
        self.regs.set_reg(Reg::H, swapped);
    }

    fn op_dsub(&mut self) {
        let hl = self.regs.hl();
        let bc = self.regs.pair(RegPair::Bc);
        let (result, borrow) = hl.overflowing_sub(bc);
        self.regs.set_pair(RegPair::Hl, result, self.model());
        self.regs.psw &= !CARRY;
        if borrow {
            self.regs.psw |= CARRY;
        }
    }

    fn op_arhl(&mut self) {
        let hl = self.regs.hl();
        self.regs.psw = (self.regs.psw & !CARRY) | ((hl & 1) as u8);
        let shifted = (hl & 0x8000) | (hl >> 1);
        self.regs.set_pair(RegPair::Hl, shifted, self.model());
    }

    fn op_rdel(&mut self) {
        let de = self.regs.pair(RegPair::De);
        let carry_in = u16::from(self.regs.psw & CARRY);
        let carry_out = de & 0x8000 != 0;
        self.regs
            .set_pair(RegPair::De, (de << 1) | carry_in, self.model());
        self.regs.psw = (self.regs.psw & !CARRY) | u8::from(carry_out);
    }
}
