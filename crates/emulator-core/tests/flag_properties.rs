//! Invariant tests over the flag model and the stack.

use proptest::prelude::*;
use rstest::rstest;

use retro80_core::state::flags;
use retro80_core::{Cpu, CpuModel, Memory, Reg, ADDRESS_SPACE};

fn machine(model: CpuModel) -> Cpu {
    let mut cpu = Cpu::new(model);
    cpu.init().expect("default chunking");
    cpu.add_memory(Memory::ram(ADDRESS_SPACE, 0).into_handle());
    cpu
}

/// Runs a two-instruction program `op A,B`-style against fresh state and
/// returns `(A, PSW)` after the ALU instruction retires.
fn alu_result(model: CpuModel, opcode: u8, a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let mut cpu = machine(model);
    cpu.regs.set_reg(Reg::A, a);
    cpu.regs.set_reg(Reg::B, b);
    if carry_in {
        cpu.regs.psw |= 0x01;
    }
    cpu.mem_write(opcode, 0x0000);
    cpu.start();
    cpu.step();
    (cpu.regs.reg(Reg::A), cpu.regs.psw)
}

#[test]
fn parity_table_matches_popcount_for_every_byte() {
    for value in 0u16..=255 {
        let byte = value as u8;
        assert_eq!(
            flags::parity_even(byte),
            byte.count_ones() % 2 == 0,
            "parity mismatch at {byte:#04x}"
        );
    }
}

proptest! {
    /// Replaying any ALU op over identical inputs yields identical PSW.
    #[test]
    fn flag_words_are_a_pure_function_of_inputs(
        a in any::<u8>(),
        b in any::<u8>(),
        carry in any::<bool>(),
        opcode in prop::sample::select(vec![
            0x80u8, 0x88, 0x90, 0x98, 0xA0, 0xA8, 0xB0, 0xB8,
        ]),
    ) {
        for model in [CpuModel::I8080, CpuModel::I8085] {
            let first = alu_result(model, opcode, a, b, carry);
            let second = alu_result(model, opcode, a, b, carry);
            prop_assert_eq!(first, second);
        }
    }

    /// On the 8080 the flag word always reads bit 1 set, bits 3/5 clear.
    #[test]
    fn i8080_fixed_bits_hold_for_any_alu_result(
        a in any::<u8>(),
        b in any::<u8>(),
        opcode in prop::sample::select(vec![
            0x80u8, 0x88, 0x90, 0x98, 0xA0, 0xA8, 0xB0, 0xB8,
        ]),
    ) {
        let (_a, psw) = alu_result(CpuModel::I8080, opcode, a, b, false);
        prop_assert_eq!(psw & 0x02, 0x02, "bit 1 must read 1");
        prop_assert_eq!(psw & 0x28, 0x00, "bits 3 and 5 must read 0");
    }

    /// PUSH then POP restores the pushed word and SP, and the two stack
    /// bytes hold the value little-endian.
    #[test]
    // SP stays below the program at 0x8000 so the push cannot clobber it.
    fn push_pop_round_trips(sp in 2u16..=0x7FFF, value in any::<u16>()) {
        let mut cpu = machine(CpuModel::I8080);
        cpu.regs.sp = sp;
        cpu.regs.set_reg(Reg::B, (value >> 8) as u8);
        cpu.regs.set_reg(Reg::C, (value & 0xFF) as u8);

        cpu.mem_write(0xC5, 0x8000); // PUSH B
        cpu.mem_write(0xC1, 0x8001); // POP B
        cpu.regs.pc = 0x8000;
        cpu.start();
        cpu.step();

        let low_addr = sp.wrapping_sub(2);
        let high_addr = sp.wrapping_sub(1);
        prop_assert_eq!(cpu.mem_read(low_addr), (value & 0xFF) as u8);
        prop_assert_eq!(cpu.mem_read(high_addr), (value >> 8) as u8);

        cpu.step();
        prop_assert_eq!(cpu.regs.pair(retro80_core::RegPair::Bc), value);
        prop_assert_eq!(cpu.regs.sp, sp);
    }

    /// Adding two packed-BCD bytes and applying DAA yields packed BCD
    /// with the carry reflecting the hundreds digit.
    #[test]
    fn daa_yields_valid_bcd_after_bcd_addition(tens_a in 0u8..10, ones_a in 0u8..10,
                                               tens_b in 0u8..10, ones_b in 0u8..10) {
        let a = (tens_a << 4) | ones_a;
        let b = (tens_b << 4) | ones_b;
        let mut cpu = machine(CpuModel::I8080);
        cpu.regs.set_reg(Reg::A, a);
        cpu.regs.set_reg(Reg::B, b);
        cpu.mem_write(0x80, 0x0000); // ADD B
        cpu.mem_write(0x27, 0x0001); // DAA
        cpu.mem_write(0x76, 0x0002); // HLT
        cpu.start();
        cpu.run();

        let result = cpu.regs.reg(Reg::A);
        prop_assert!(result & 0x0F <= 9, "ones digit {result:#04x}");
        prop_assert!(result >> 4 <= 9, "tens digit {result:#04x}");

        let decimal_a = u16::from(tens_a) * 10 + u16::from(ones_a);
        let decimal_b = u16::from(tens_b) * 10 + u16::from(ones_b);
        let total = decimal_a + decimal_b;
        let expected = ((total % 100 / 10) << 4 | (total % 10)) as u8;
        prop_assert_eq!(result, expected);
        prop_assert_eq!(cpu.regs.psw & 0x01 != 0, total > 99, "hundreds carry");
    }

    /// The checked and unchecked read paths agree everywhere.
    #[test]
    fn get_and_read_agree(addr in any::<u16>()) {
        let region: Memory<u8> = Memory::ram(0x8000, 0);
        let index = usize::from(addr);
        match region.read(index) {
            Some(value) => prop_assert_eq!(region.get(index), Ok(value)),
            None => prop_assert!(region.get(index).is_err()),
        }
    }
}

#[rstest]
#[case(CpuModel::I8080)]
#[case(CpuModel::I8085)]
fn reset_twice_equals_reset_once(#[case] model: CpuModel) {
    let mut cpu = machine(model);
    cpu.regs.pc = 0x1234;
    cpu.regs.psw = 0xFF;
    cpu.regs.ie = true;
    cpu.start();

    cpu.reset();
    let once = (cpu.regs.clone(), cpu.run_state());
    cpu.reset();
    assert_eq!((cpu.regs.clone(), cpu.run_state()), once);
    assert_eq!(cpu.regs.pc, 0);
    assert_eq!(cpu.regs.psw, 0x02);
    assert!(!cpu.regs.ie);
}

#[rstest]
#[case(CpuModel::I8080, false)]
#[case(CpuModel::I8085, true)]
fn mvi_never_derives_flags(#[case] model: CpuModel, #[case] _is_8085: bool) {
    let mut cpu = machine(model);
    let before = cpu.regs.psw;
    cpu.mem_write(0x3E, 0x0000); // MVI A,00
    cpu.mem_write(0x00, 0x0001);
    cpu.start();
    cpu.step();
    assert_eq!(cpu.regs.psw, before);
}
