//! The 8080/8085 processor: fetch, stack and bus helpers, the step
//! loop, and the lifecycle surface the system binder drives.

use crate::decoder::{decode, OpKind};
use crate::fault::OptionError;
use crate::io::{DeviceSignal, IoHandle, IoMap, DEFAULT_MAX_PORTS};
use crate::memory::{self, Cell, MemHandle, Memory, MemoryError};
use crate::model::CpuModel;
use crate::option::OptionValue;
use crate::state::registers::{Reg, RegisterFile};
use crate::state::RunState;
use crate::timing::tstates;

/// Address space of the 8080 family, in bytes.
pub const ADDRESS_SPACE: usize = 64 * 1024;

/// Default Array-controller chunk size when `pagesize` is not configured.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Opcode substituted when an instruction fetch misses memory, so
/// runaway execution into unmapped space halts deterministically.
const FETCH_FAULT_OPCODE: u8 = 0x76;

/// An Intel 8080 or 8085 processor instance.
///
/// The memory controller and I/O controller are allocated by `init` and
/// shared with the rest of the system through handles.
#[derive(Debug)]
pub struct Cpu {
    model: CpuModel,
    name: String,
    /// Architectural register file. Public for tools and tests; the
    /// engine is the only steady-state writer.
    pub regs: RegisterFile,
    run_state: RunState,
    pub(crate) mem: Option<MemHandle<u8>>,
    io: Option<IoHandle<u8>>,
    page_size: usize,
    trace_enabled: bool,
    clock_hz: Option<u64>,
    /// T-states consumed by the instruction in flight. Conditional
    /// handlers add their taken surcharge here.
    pub(crate) cycles: u64,
}

impl Cpu {
    /// New processor of the given model, not yet initialized.
    #[must_use]
    pub fn new(model: CpuModel) -> Self {
        Self {
            model,
            name: String::new(),
            regs: RegisterFile::default(),
            run_state: RunState::Idle,
            mem: None,
            io: None,
            page_size: DEFAULT_PAGE_SIZE,
            trace_enabled: false,
            clock_hz: None,
            cycles: 0,
        }
    }

    /// The model tag this processor executes as.
    #[must_use]
    pub const fn model(&self) -> CpuModel {
        self.model
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Shared handle to the memory controller, once initialized.
    #[must_use]
    pub fn memory(&self) -> Option<MemHandle<u8>> {
        self.mem.clone()
    }

    /// Shared handle to the I/O controller, once initialized.
    #[must_use]
    pub fn io(&self) -> Option<IoHandle<u8>> {
        self.io.clone()
    }

    /// Allocates the default fabric: a 64 KiB Array controller chunked
    /// by `pagesize`, and a 256-port I/O map.
    ///
    /// # Errors
    ///
    /// Fails when the configured `pagesize` is not a power of two that
    /// divides the address space.
    pub fn init(&mut self) -> Result<(), MemoryError> {
        let controller = Memory::array(ADDRESS_SPACE, self.page_size)?;
        self.mem = Some(controller.into_handle());
        self.io = Some(IoMap::new(DEFAULT_MAX_PORTS).into_handle());
        Ok(())
    }

    /// Registers a memory region with this CPU's controller.
    pub fn add_memory(&mut self, region: MemHandle<u8>) {
        match &self.mem {
            Some(controller) => memory::lock(controller).add_child(region),
            None => self.mem = Some(region),
        }
    }

    /// True when `[base, base + size)` would collide with a region
    /// already routed by the controller.
    #[must_use]
    pub fn memory_overlaps(&self, base: usize, size: usize) -> bool {
        self.mem
            .as_ref()
            .is_some_and(|controller| memory::lock(controller).overlaps(base, size))
    }

    /// Replaces the I/O controller.
    pub fn add_io(&mut self, io: IoHandle<u8>) {
        self.io = Some(io);
    }

    /// Hands the I/O controller a memory handle so devices can DMA.
    pub fn bind_io_to_memory(&mut self) {
        if let (Some(io), Some(mem)) = (&self.io, &self.mem) {
            crate::io::lock_io(io).bind_memory(std::sync::Arc::clone(mem));
        }
    }

    /// Moves `Idle` to `Running`.
    pub fn start(&mut self) {
        self.run_state = RunState::Running;
    }

    /// Canonical reset: PC=0, PSW=2, IE clear, state `Idle`.
    pub fn reset(&mut self) {
        self.run_state = crate::state::run_state::reset(&mut self.regs);
    }

    /// External stop; honored at the next step boundary.
    pub fn stop(&mut self) {
        self.run_state = RunState::Stopped;
    }

    /// Parks the CPU after HLT.
    pub(crate) fn halt(&mut self) {
        self.run_state = RunState::Halted;
    }

    /// Executes one instruction and returns its T-state cost.
    ///
    /// A non-running CPU is a fixed point: no state changes, cost 0.
    pub fn step(&mut self) -> u64 {
        if !self.run_state.is_running() {
            return 0;
        }
        let opcode = self.fetch();
        self.cycles = tstates(opcode);
        let decoded = decode(opcode, self.model);
        if matches!(decoded.kind, OpKind::Illegal) {
            // Reserved on this model: executes as NOP; the 8085 surfaces
            // the event for diagnostics.
            if matches!(self.model, CpuModel::I8085) {
                tracing::info!(
                    target: "retro80::cpu",
                    opcode,
                    pc = self.regs.pc,
                    "reserved opcode executed as NOP"
                );
            }
        } else {
            self.execute(&decoded);
        }
        if let Some(io) = &self.io {
            if crate::io::lock_io(io).step() == DeviceSignal::HaltCpu {
                self.run_state = RunState::Stopped;
            }
        }
        self.cycles
    }

    /// Runs until the CPU leaves `Running`; returns total T-states.
    ///
    /// With the `clock` option set, the loop yields to wall time so
    /// simulated T-states track the configured rate. There is never a
    /// suspension inside `step` itself.
    pub fn run(&mut self) -> u64 {
        let started = std::time::Instant::now();
        let mut total: u64 = 0;
        while self.run_state.is_running() {
            if self.trace_enabled {
                Processor::trace(self);
            }
            total += self.step();
            if let Some(hz) = self.clock_hz {
                let target = std::time::Duration::from_nanos(
                    total.saturating_mul(1_000_000_000) / hz.max(1),
                );
                let elapsed = started.elapsed();
                if let Some(ahead) = target.checked_sub(elapsed) {
                    if ahead > std::time::Duration::from_millis(1) {
                        std::thread::sleep(ahead);
                    }
                }
            }
        }
        total
    }

    /// Reads one byte through the memory controller; misses read 0.
    #[must_use]
    pub fn mem_read(&self, addr: u16) -> u8 {
        self.mem
            .as_ref()
            .and_then(|mem| memory::lock(mem).read(addr as usize))
            .unwrap_or_default()
    }

    /// Writes one byte through the memory controller.
    pub fn mem_write(&mut self, value: u8, addr: u16) -> bool {
        self.mem
            .as_ref()
            .is_some_and(|mem| memory::lock(mem).write(value, addr as usize))
    }

    /// Fetches the byte at PC and advances PC. A miss yields the HLT
    /// opcode and leaves PC pointing at the faulting address.
    pub(crate) fn fetch(&mut self) -> u8 {
        let fetched = self
            .mem
            .as_ref()
            .and_then(|mem| memory::lock(mem).read(self.regs.pc as usize));
        match fetched {
            Some(byte) => {
                self.regs.pc = self.regs.pc.wrapping_add(1);
                byte
            }
            None => FETCH_FAULT_OPCODE,
        }
    }

    /// Fetches the two-byte little-endian operand at PC.
    pub(crate) fn fetch_addr(&mut self) -> u16 {
        let low = self.fetch();
        let high = self.fetch();
        u16::from_le_bytes([low, high])
    }

    /// Reads the 16-bit little-endian word at `addr`.
    pub(crate) fn read_double(&self, addr: u16) -> u16 {
        let low = self.mem_read(addr);
        let high = self.mem_read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Stores a 16-bit word little-endian at `addr`.
    pub(crate) fn store_double(&mut self, value: u16, addr: u16) {
        let [low, high] = value.to_le_bytes();
        self.mem_write(low, addr);
        self.mem_write(high, addr.wrapping_add(1));
    }

    /// Pushes a 16-bit value; the stack grows downward, wrapping mod 2^16.
    pub(crate) fn push(&mut self, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        self.store_double(value, self.regs.sp);
    }

    /// Pops a 16-bit value.
    pub(crate) fn pop(&mut self) -> u16 {
        let value = self.read_double(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    /// Reads a register, resolving `M` through memory at `HL`.
    #[must_use]
    pub fn get_reg(&self, r: Reg) -> u8 {
        match r {
            Reg::M => self.mem_read(self.regs.hl()),
            _ => self.regs.reg(r),
        }
    }

    /// Writes a register, resolving `M` through memory at `HL`.
    pub fn set_reg(&mut self, r: Reg, value: u8) {
        match r {
            Reg::M => {
                self.mem_write(value, self.regs.hl());
            }
            _ => self.regs.set_reg(r, value),
        }
    }

    /// Routes a port read through the I/O controller.
    pub(crate) fn io_input(&mut self, port: u8) -> u8 {
        let mut value = 0;
        if let Some(io) = &self.io {
            crate::io::lock_io(io).input(&mut value, usize::from(port));
        }
        value
    }

    /// Routes a port write through the I/O controller.
    pub(crate) fn io_output(&mut self, value: u8, port: u8) {
        if let Some(io) = &self.io {
            crate::io::lock_io(io).output(value, usize::from(port));
        }
    }
}

/// Lifecycle and binding surface a system drives on any processor of
/// cell width `T`. Object-safe so rosters can hold mixed models.
pub trait Processor<T: Cell>: Send {
    /// Model name, as registered with the factory registry.
    fn kind(&self) -> &'static str;

    /// Instance name from the configuration.
    fn name(&self) -> &str;

    /// Renames the instance.
    fn set_name(&mut self, name: &str);

    /// Applies a configuration option.
    ///
    /// # Errors
    ///
    /// [`OptionError`] for unknown names or bad values.
    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), OptionError>;

    /// Allocates the default memory/IO fabric.
    ///
    /// # Errors
    ///
    /// [`MemoryError`] when configured chunking is unusable.
    fn init(&mut self) -> Result<(), MemoryError>;

    /// Whether this processor expects an I/O controller.
    fn requires_io(&self) -> bool;

    /// The processor's I/O controller, if allocated.
    fn io(&self) -> Option<IoHandle<T>>;

    /// The processor's memory controller, if allocated.
    fn memory(&self) -> Option<MemHandle<T>>;

    /// Registers a memory region.
    fn add_memory(&mut self, region: MemHandle<T>);

    /// Probes the controller for a routing collision.
    fn memory_overlaps(&self, base: usize, size: usize) -> bool;

    /// Replaces the I/O controller.
    fn add_io(&mut self, io: IoHandle<T>);

    /// Shares the memory controller with the I/O fabric for DMA.
    fn bind_io_to_memory(&mut self);

    /// Sets the program counter.
    fn set_pc(&mut self, pc: usize);

    /// Lifecycle start.
    fn start(&mut self);

    /// Canonical reset.
    fn reset(&mut self);

    /// External stop.
    fn stop(&mut self);

    /// Final teardown.
    fn shutdown(&mut self);

    /// One instruction; returns T-states consumed.
    fn step(&mut self) -> u64;

    /// Runs to the next halt/stop; returns total T-states.
    fn run(&mut self) -> u64;

    /// True while the run loop should continue.
    fn running(&self) -> bool;

    /// Current run state.
    fn run_state(&self) -> RunState;

    /// Emits a trace line for the instruction at PC. Pure side channel.
    fn trace(&self);
}

impl Processor<u8> for Cpu {
    fn kind(&self) -> &'static str {
        self.model.kind()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), OptionError> {
        match name {
            "pagesize" => {
                let size = value.as_number().ok_or_else(|| OptionError::InvalidValue {
                    name: name.into(),
                    value: value.to_string(),
                })?;
                self.page_size = usize::try_from(size).map_err(|_| OptionError::InvalidValue {
                    name: name.into(),
                    value: value.to_string(),
                })?;
                Ok(())
            }
            "trace" => {
                self.trace_enabled = true;
                Ok(())
            }
            // Wall-clock pacing rate in Hz; unset runs free.
            "clock" => {
                let hz = value.as_number().ok_or_else(|| OptionError::InvalidValue {
                    name: name.into(),
                    value: value.to_string(),
                })?;
                if hz == 0 {
                    return Err(OptionError::InvalidValue {
                        name: name.into(),
                        value: value.to_string(),
                    });
                }
                self.clock_hz = Some(hz);
                Ok(())
            }
            _ => Err(OptionError::Unknown(name.into())),
        }
    }

    fn init(&mut self) -> Result<(), MemoryError> {
        Self::init(self)
    }

    fn requires_io(&self) -> bool {
        true
    }

    fn io(&self) -> Option<IoHandle<u8>> {
        Self::io(self)
    }

    fn memory(&self) -> Option<MemHandle<u8>> {
        Self::memory(self)
    }

    fn add_memory(&mut self, region: MemHandle<u8>) {
        Self::add_memory(self, region);
    }

    fn memory_overlaps(&self, base: usize, size: usize) -> bool {
        Self::memory_overlaps(self, base, size)
    }

    fn add_io(&mut self, io: IoHandle<u8>) {
        Self::add_io(self, io);
    }

    fn bind_io_to_memory(&mut self) {
        Self::bind_io_to_memory(self);
    }

    fn set_pc(&mut self, pc: usize) {
        #[allow(clippy::cast_possible_truncation)]
        {
            self.regs.pc = pc as u16;
        }
    }

    fn start(&mut self) {
        Self::start(self);
    }

    fn reset(&mut self) {
        Self::reset(self);
    }

    fn stop(&mut self) {
        Self::stop(self);
    }

    fn shutdown(&mut self) {
        self.run_state = RunState::Stopped;
    }

    fn step(&mut self) -> u64 {
        Self::step(self)
    }

    fn run(&mut self) -> u64 {
        Self::run(self)
    }

    fn running(&self) -> bool {
        self.run_state.is_running()
    }

    fn run_state(&self) -> RunState {
        self.run_state
    }

    fn trace(&self) {
        tracing::trace!(target: "retro80::cpu", "{}", self.trace_line());
    }
}

#[cfg(test)]
mod tests {
    use super::{Cpu, ADDRESS_SPACE, DEFAULT_PAGE_SIZE};
    use crate::memory::{self, Memory};
    use crate::model::CpuModel;
    use crate::state::registers::Reg;
    use crate::state::RunState;

    fn cpu_with_ram() -> Cpu {
        let mut cpu = Cpu::new(CpuModel::I8080);
        cpu.init().expect("default chunking is valid");
        cpu.add_memory(Memory::ram(ADDRESS_SPACE, 0).into_handle());
        cpu
    }

    #[test]
    fn defaults_match_the_architecture() {
        let cpu = Cpu::new(CpuModel::I8080);
        assert_eq!(cpu.model(), CpuModel::I8080);
        assert_eq!(cpu.run_state(), RunState::Idle);
        assert_eq!(DEFAULT_PAGE_SIZE, 4096);
    }

    #[test]
    fn fetch_advances_pc_and_wraps() {
        let mut cpu = cpu_with_ram();
        cpu.mem_write(0x3E, 0xFFFF);
        cpu.regs.pc = 0xFFFF;
        assert_eq!(cpu.fetch(), 0x3E);
        assert_eq!(cpu.regs.pc, 0x0000);
    }

    #[test]
    fn fetch_miss_yields_the_halt_opcode() {
        let mut cpu = Cpu::new(CpuModel::I8080);
        cpu.init().expect("default chunking is valid");
        // No regions mapped: every fetch misses.
        assert_eq!(cpu.fetch(), 0x76);
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn push_pop_round_trips_and_restores_sp() {
        let mut cpu = cpu_with_ram();
        cpu.regs.sp = 0x0200;
        cpu.push(0xABCD);
        assert_eq!(cpu.regs.sp, 0x01FE);
        assert_eq!(cpu.mem_read(0x01FE), 0xCD);
        assert_eq!(cpu.mem_read(0x01FF), 0xAB);
        assert_eq!(cpu.pop(), 0xABCD);
        assert_eq!(cpu.regs.sp, 0x0200);
    }

    #[test]
    fn stack_wraps_mod_64k() {
        let mut cpu = cpu_with_ram();
        cpu.regs.sp = 0x0001;
        cpu.push(0x1234);
        assert_eq!(cpu.regs.sp, 0xFFFF);
        assert_eq!(cpu.pop(), 0x1234);
        assert_eq!(cpu.regs.sp, 0x0001);
    }

    #[test]
    fn m_register_resolves_through_hl() {
        let mut cpu = cpu_with_ram();
        cpu.regs.set_reg(Reg::H, 0x12);
        cpu.regs.set_reg(Reg::L, 0x34);
        cpu.set_reg(Reg::M, 0x99);
        assert_eq!(cpu.mem_read(0x1234), 0x99);
        assert_eq!(cpu.get_reg(Reg::M), 0x99);
    }

    #[test]
    fn step_is_a_fixed_point_when_not_running() {
        let mut cpu = cpu_with_ram();
        cpu.mem_write(0x3C, 0x0000); // INR A
        let before = cpu.regs.clone();
        assert_eq!(cpu.step(), 0);
        assert_eq!(cpu.regs, before);
    }

    #[test]
    fn reset_is_idempotent_for_all_cpu_state() {
        let mut cpu = cpu_with_ram();
        cpu.start();
        cpu.regs.pc = 0x1234;
        cpu.regs.psw = 0xFF;
        cpu.reset();
        let once = (cpu.regs.clone(), cpu.run_state());
        cpu.reset();
        assert_eq!((cpu.regs.clone(), cpu.run_state()), once);
        assert_eq!(cpu.run_state(), RunState::Idle);
    }

    #[test]
    fn add_memory_routes_through_the_controller() {
        let mut cpu = Cpu::new(CpuModel::I8080);
        cpu.init().expect("default chunking is valid");
        cpu.add_memory(Memory::ram(0x1000, 0x8000).into_handle());
        assert!(cpu.mem_write(0x42, 0x8000));
        assert_eq!(cpu.mem_read(0x8000), 0x42);
        assert!(!cpu.mem_write(0x42, 0x0000));
        assert!(cpu.memory_overlaps(0x8000, 0x100));
        assert!(!cpu.memory_overlaps(0x0000, 0x1000));
    }

    #[test]
    fn dma_binding_shares_the_controller_with_io() {
        let mut cpu = cpu_with_ram();
        cpu.bind_io_to_memory();
        let io = cpu.io().expect("io allocated at init");
        let mem = crate::io::lock_io(&io).memory().expect("dma bound");
        memory::lock(&mem).write(0x77, 0x10);
        assert_eq!(cpu.mem_read(0x0010), 0x77);
    }
}
