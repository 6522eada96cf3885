//! Assembles a machine from inline configuration text, pokes a program
//! into its RAM and runs it to the halt.
//!
//! ```text
//! cargo run -p retro80-sys --example config_machine
//! ```

use retro80_core::lock;
use retro80_sys::{MemUnit, Registry, System};

const CONFIG: &str = "\
system i8080
cpu i8080:cpu0 (pagesize=4k)
memory ram:main = cpu0 64k
device uart:con0 = 0x10
";

// MVI A,21; ADI 21; STA 2000; HLT
const PROGRAM: &[u8] = &[0x3E, 0x21, 0xC6, 0x21, 0x32, 0x00, 0x20, 0x76];

fn main() {
    let registry = Registry::with_defaults();
    let mut system = System::load_config(&registry, CONFIG).expect("valid configuration");

    let MemUnit::U8(ram) = &system.memories()[0].unit else {
        panic!("main memory should be byte-wide");
    };
    let ram = ram.clone();
    for (offset, byte) in PROGRAM.iter().enumerate() {
        let _ = lock(&ram).write(*byte, offset);
    }

    system.start();
    let tstates = system.run();
    system.stop();

    let result = lock(&ram).read(0x2000).unwrap_or_default();
    println!("system: {}", system.kind());
    println!("[2000] = {result:#04x}");
    println!("T-states = {tstates}");

    system.shutdown();
}
