//! Core emulation library for the retro80 fabric.
//!
//! Interprets the Intel 8080 and 8085 instruction sets at instruction-level
//! T-state accuracy on top of a pluggable memory/IO/device fabric. The
//! companion `retro80-sys` crate assembles complete systems from textual
//! configuration.

/// CPU model selection.
pub mod model;
pub use model::CpuModel;

/// Architectural CPU state: registers, flags, run states.
pub mod state;
pub use state::{Reg, RegPair, RegisterFile, RunState};

/// Fault taxonomy shared across the fabric.
pub mod fault;
pub use fault::{AccessError, DeviceError, OptionError};

/// Module configuration options.
pub mod option;
pub use option::{OptionSetting, OptionValue};

/// Opcode decode tables.
pub mod decoder;
pub use decoder::{decode, Cond, Decoded, OpKind, Shape, DECODE_TABLE, DESCRIPTORS};

/// Published T-state costs.
pub mod timing;
pub use timing::{tstates, CONDITIONAL_TAKEN_EXTRA, TSTATES};

/// The memory hierarchy.
pub mod memory;
pub use memory::{lock, Cell, MemHandle, Memory, MemoryError, Width};

/// The I/O fabric.
pub mod io;
pub use io::{lock_io, DevHandle, Device, DeviceSignal, IoHandle, IoMap, DEFAULT_MAX_PORTS};

/// The processor and its lifecycle surface.
pub mod cpu;
pub use cpu::{Cpu, Processor, ADDRESS_SPACE, DEFAULT_PAGE_SIZE};

mod execute;

/// Disassembly and tracing.
pub mod disasm;
pub use disasm::{disassemble, dump_regs};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
