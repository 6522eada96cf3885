//! Explicit factory registry for system assembly.
//!
//! Components register under lower-case string keys and construct into
//! width-tagged units; the binder pattern-matches unit pairs and rejects
//! width mismatches. The registry is a plain value handed to
//! `System::load_config` — there is no process-global state.

use std::collections::HashMap;

use retro80_core::{
    Cpu, CpuModel, DevHandle, IoHandle, IoMap, MemHandle, Memory, Processor, Width,
};

use crate::console::ConsoleDevice;
use crate::errors::ConfigError;
use crate::system::SystemModel;

/// A CPU tagged by its cell width.
pub enum CpuUnit {
    /// 8-bit processor.
    U8(Box<dyn Processor<u8>>),
    /// 16-bit processor.
    U16(Box<dyn Processor<u16>>),
    /// 32-bit processor.
    U32(Box<dyn Processor<u32>>),
    /// 64-bit processor.
    U64(Box<dyn Processor<u64>>),
}

macro_rules! with_unit {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Self::U8($inner) => $body,
            Self::U16($inner) => $body,
            Self::U32($inner) => $body,
            Self::U64($inner) => $body,
        }
    };
}

impl CpuUnit {
    /// Cell width of this processor.
    #[must_use]
    pub fn width(&self) -> Width {
        match self {
            Self::U8(_) => Width::U8,
            Self::U16(_) => Width::U16,
            Self::U32(_) => Width::U32,
            Self::U64(_) => Width::U64,
        }
    }

    /// Instance name (set from the configuration).
    #[must_use]
    pub fn name(&self) -> String {
        with_unit!(self, cpu => cpu.name().to_string())
    }

    /// Model name, falling back to it when the instance is unnamed.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            with_unit!(self, cpu => cpu.kind().to_string())
        } else {
            name
        }
    }

    /// Shares the memory controller with the I/O fabric for DMA.
    pub fn bind_io_to_memory(&mut self) {
        with_unit!(self, cpu => cpu.bind_io_to_memory());
    }

    /// Lifecycle start.
    pub fn start(&mut self) {
        with_unit!(self, cpu => cpu.start());
    }

    /// Canonical reset.
    pub fn reset(&mut self) {
        with_unit!(self, cpu => cpu.reset());
    }

    /// External stop.
    pub fn stop(&mut self) {
        with_unit!(self, cpu => cpu.stop());
    }

    /// Final teardown.
    pub fn shutdown(&mut self) {
        with_unit!(self, cpu => cpu.shutdown());
    }

    /// One instruction; returns T-states consumed.
    pub fn step(&mut self) -> u64 {
        with_unit!(self, cpu => cpu.step())
    }

    /// Runs to the next halt/stop; returns total T-states.
    pub fn run(&mut self) -> u64 {
        with_unit!(self, cpu => cpu.run())
    }

    /// True while the run loop should continue.
    #[must_use]
    pub fn running(&self) -> bool {
        with_unit!(self, cpu => cpu.running())
    }
}

impl std::fmt::Debug for CpuUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CpuUnit::{:?}({})", self.width(), self.display_name())
    }
}

/// A memory region tagged by cell width.
#[derive(Clone)]
pub enum MemUnit {
    /// 8-bit cells.
    U8(MemHandle<u8>),
    /// 16-bit cells.
    U16(MemHandle<u16>),
    /// 32-bit cells.
    U32(MemHandle<u32>),
    /// 64-bit cells.
    U64(MemHandle<u64>),
}

impl MemUnit {
    /// Cell width of the region.
    #[must_use]
    pub fn width(&self) -> Width {
        match self {
            Self::U8(_) => Width::U8,
            Self::U16(_) => Width::U16,
            Self::U32(_) => Width::U32,
            Self::U64(_) => Width::U64,
        }
    }

    /// Region base in cell units.
    #[must_use]
    pub fn base(&self) -> usize {
        with_unit!(self, mem => retro80_core::lock(mem).base())
    }

    /// Region size in cell units.
    #[must_use]
    pub fn size(&self) -> usize {
        with_unit!(self, mem => retro80_core::lock(mem).size())
    }

    /// Region instance name.
    #[must_use]
    pub fn name(&self) -> String {
        with_unit!(self, mem => retro80_core::lock(mem).name().to_string())
    }
}

impl std::fmt::Debug for MemUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MemUnit::{:?}({}, base={:#x}, size={:#x})",
            self.width(),
            self.name(),
            self.base(),
            self.size()
        )
    }
}

/// An I/O controller tagged by cell width.
#[derive(Clone)]
pub enum IoUnit {
    /// 8-bit ports.
    U8(IoHandle<u8>),
    /// 16-bit ports.
    U16(IoHandle<u16>),
    /// 32-bit ports.
    U32(IoHandle<u32>),
    /// 64-bit ports.
    U64(IoHandle<u64>),
}

impl IoUnit {
    /// Cell width of the controller.
    #[must_use]
    pub fn width(&self) -> Width {
        match self {
            Self::U8(_) => Width::U8,
            Self::U16(_) => Width::U16,
            Self::U32(_) => Width::U32,
            Self::U64(_) => Width::U64,
        }
    }

    /// Controller instance name.
    #[must_use]
    pub fn name(&self) -> String {
        with_unit!(self, io => retro80_core::lock_io(io).name().to_string())
    }

    /// Renames the controller.
    pub fn set_name(&self, name: &str) {
        with_unit!(self, io => retro80_core::lock_io(io).set_name(name));
    }

    /// Initializes every attached device.
    ///
    /// # Errors
    ///
    /// The first [`retro80_core::DeviceError`] aborts the cascade.
    pub fn init(&self) -> Result<(), retro80_core::DeviceError> {
        with_unit!(self, io => retro80_core::lock_io(io).init())
    }

    /// Starts every attached device.
    pub fn start(&self) {
        with_unit!(self, io => retro80_core::lock_io(io).start());
    }

    /// Resets every attached device.
    pub fn reset(&self) {
        with_unit!(self, io => retro80_core::lock_io(io).reset());
    }

    /// Stops every attached device.
    pub fn stop(&self) {
        with_unit!(self, io => retro80_core::lock_io(io).stop());
    }

    /// Shuts down every attached device.
    pub fn shutdown(&self) {
        with_unit!(self, io => retro80_core::lock_io(io).shutdown());
    }
}

impl std::fmt::Debug for IoUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IoUnit::{:?}({})", self.width(), self.name())
    }
}

/// A device tagged by cell width.
#[derive(Clone)]
pub enum DevUnit {
    /// 8-bit device.
    U8(DevHandle<u8>),
    /// 16-bit device.
    U16(DevHandle<u16>),
    /// 32-bit device.
    U32(DevHandle<u32>),
    /// 64-bit device.
    U64(DevHandle<u64>),
}

impl DevUnit {
    /// Cell width of the device.
    #[must_use]
    pub fn width(&self) -> Width {
        match self {
            Self::U8(_) => Width::U8,
            Self::U16(_) => Width::U16,
            Self::U32(_) => Width::U32,
            Self::U64(_) => Width::U64,
        }
    }
}

impl std::fmt::Debug for DevUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DevUnit::{:?}", self.width())
    }
}

type SystemFactory = fn() -> SystemModel;
type CpuFactory = fn() -> CpuUnit;
type MemFactory = fn(size: usize, base: usize) -> MemUnit;
type IoFactory = fn(max_ports: usize) -> IoUnit;
type DevFactory = fn(base: usize) -> DevUnit;

/// String-keyed factories for every constructible component class.
#[derive(Default)]
pub struct Registry {
    systems: HashMap<String, SystemFactory>,
    cpus: HashMap<String, CpuFactory>,
    memories: HashMap<String, MemFactory>,
    ios: HashMap<String, IoFactory>,
    devices: HashMap<String, DevFactory>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock registry: the `i8080` system model, both CPU parts,
    /// RAM/ROM leaves, the port-table controller, and the console UART.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_system("i8080", || SystemModel {
            kind: "i8080",
            max_cpus: 1,
        });
        registry.register_cpu("i8080", || CpuUnit::U8(Box::new(Cpu::new(CpuModel::I8080))));
        registry.register_cpu("i8085", || CpuUnit::U8(Box::new(Cpu::new(CpuModel::I8085))));
        registry.register_memory("ram", |size, base| {
            MemUnit::U8(Memory::ram(size, base).into_handle())
        });
        registry.register_memory("rom", |size, base| {
            MemUnit::U8(Memory::rom(size, base).into_handle())
        });
        registry.register_io("ports", |max_ports| {
            IoUnit::U8(IoMap::new(max_ports).into_handle())
        });
        registry.register_device("uart", |base| {
            DevUnit::U8(ConsoleDevice::new(base).into_handle())
        });
        registry
    }

    /// Registers a system model factory.
    pub fn register_system(&mut self, name: &str, factory: SystemFactory) {
        self.systems.insert(name.to_ascii_lowercase(), factory);
    }

    /// Registers a CPU factory.
    pub fn register_cpu(&mut self, name: &str, factory: CpuFactory) {
        self.cpus.insert(name.to_ascii_lowercase(), factory);
    }

    /// Registers a memory factory.
    pub fn register_memory(&mut self, name: &str, factory: MemFactory) {
        self.memories.insert(name.to_ascii_lowercase(), factory);
    }

    /// Registers an I/O controller factory.
    pub fn register_io(&mut self, name: &str, factory: IoFactory) {
        self.ios.insert(name.to_ascii_lowercase(), factory);
    }

    /// Registers a device factory.
    pub fn register_device(&mut self, name: &str, factory: DevFactory) {
        self.devices.insert(name.to_ascii_lowercase(), factory);
    }

    fn lookup<'a, F>(
        table: &'a HashMap<String, F>,
        kind: &'static str,
        name: &str,
    ) -> Result<&'a F, ConfigError> {
        table
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::UnknownType {
                kind,
                name: name.to_string(),
            })
    }

    /// Instantiates a system model.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`] for unregistered names.
    pub fn create_system(&self, name: &str) -> Result<SystemModel, ConfigError> {
        Ok(Self::lookup(&self.systems, "system", name)?())
    }

    /// Instantiates a CPU.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`] for unregistered names.
    pub fn create_cpu(&self, name: &str) -> Result<CpuUnit, ConfigError> {
        Ok(Self::lookup(&self.cpus, "cpu", name)?())
    }

    /// Instantiates a memory region.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`] for unregistered names.
    pub fn create_memory(
        &self,
        name: &str,
        size: usize,
        base: usize,
    ) -> Result<MemUnit, ConfigError> {
        Ok(Self::lookup(&self.memories, "memory", name)?(size, base))
    }

    /// Instantiates an I/O controller.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`] for unregistered names.
    pub fn create_io(&self, name: &str, max_ports: usize) -> Result<IoUnit, ConfigError> {
        Ok(Self::lookup(&self.ios, "io", name)?(max_ports))
    }

    /// Instantiates a device at the given base port.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`] for unregistered names.
    pub fn create_device(&self, name: &str, base: usize) -> Result<DevUnit, ConfigError> {
        Ok(Self::lookup(&self.devices, "device", name)?(base))
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::errors::ConfigError;
    use retro80_core::Width;

    #[test]
    fn default_registry_builds_the_stock_parts() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.create_system("i8080").expect("registered").max_cpus, 1);

        let cpu = registry.create_cpu("I8085").expect("case-insensitive lookup");
        assert_eq!(cpu.width(), Width::U8);

        let ram = registry.create_memory("ram", 0x1000, 0x8000).expect("registered");
        assert_eq!(ram.size(), 0x1000);
        assert_eq!(ram.base(), 0x8000);

        assert!(registry.create_io("ports", 256).is_ok());
        assert!(registry.create_device("uart", 0x10).is_ok());
    }

    #[test]
    fn unknown_names_fail_with_kind_and_name() {
        let registry = Registry::with_defaults();
        let fault = registry.create_cpu("z80").expect_err("not registered");
        match fault {
            ConfigError::UnknownType { kind, name } => {
                assert_eq!(kind, "cpu");
                assert_eq!(name, "z80");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.create_system("pdp11").is_err());
        assert!(registry.create_memory("flash", 1, 0).is_err());
        assert!(registry.create_io("dma", 16).is_err());
        assert!(registry.create_device("disk", 0).is_err());
    }
}
