//! Steps a small program on a bare 8080 and prints the trace channel.
//!
//! ```text
//! cargo run -p retro80-core --example trace_demo
//! ```

use retro80_core::{Cpu, CpuModel, Memory, Reg, ADDRESS_SPACE};

// MVI A,05; MVI B,07; ADD B; STA 2000; HLT
const PROGRAM: &[u8] = &[0x3E, 0x05, 0x06, 0x07, 0x80, 0x32, 0x00, 0x20, 0x76];

fn main() {
    let mut cpu = Cpu::new(CpuModel::I8080);
    cpu.init().expect("default page size is valid");
    cpu.add_memory(Memory::ram(ADDRESS_SPACE, 0).into_handle());

    for (offset, byte) in PROGRAM.iter().enumerate() {
        cpu.mem_write(*byte, 0x0100 + offset as u16);
    }
    cpu.regs.pc = 0x0100;
    cpu.start();

    let mut total = 0;
    while cpu.run_state().is_running() {
        println!("{}", cpu.trace_line());
        total += cpu.step();
    }

    println!();
    println!("A = {:#04x}", cpu.regs.reg(Reg::A));
    println!("[2000] = {:#04x}", cpu.mem_read(0x2000));
    println!("T-states = {total}");
}
