//! The system assembler: dependency-ordered binding of CPUs, memory,
//! I/O controllers and devices, plus the lifecycle cascade.
//!
//! Build order: system model, CPUs (options, name, init, pre-attached
//! I/O), memory regions onto CPUs by name-set and cell width, remaining
//! I/O controllers, I/O↔memory DMA binding, image loads, devices onto
//! controllers, controller init (which cascades to devices).

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use retro80_core::{lock_io, OptionSetting, DEFAULT_MAX_PORTS};

use crate::config::{self, ParsedConfig};
use crate::errors::ConfigError;
use crate::loader;
use crate::registry::{CpuUnit, DevUnit, IoUnit, MemUnit, Registry};

/// A registered system model: identity plus structural limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemModel {
    /// Model name as registered.
    pub kind: &'static str,
    /// Maximum number of CPUs this model accepts.
    pub max_cpus: usize,
}

/// A memory region in the system roster.
#[derive(Debug)]
pub struct MemEntry {
    /// The region, shared with every CPU it bound to.
    pub unit: MemUnit,
    /// Instance name (empty when unnamed).
    pub name: String,
    /// CPU names this region binds to; empty means all.
    pub cpus: Vec<String>,
    /// Pending raw-binary image.
    pub load: Option<PathBuf>,
}

/// An I/O controller in the system roster.
#[derive(Debug)]
pub struct IoEntry {
    /// The controller, shared with its CPU.
    pub unit: IoUnit,
    /// Instance name (empty when unnamed).
    pub name: String,
    /// CPU names this controller binds to; empty means all.
    pub cpus: Vec<String>,
    /// True for controllers a CPU allocated for itself at init.
    pub pre_attached: bool,
}

/// A device in the system roster.
#[derive(Debug)]
pub struct DevEntry {
    /// The device, shared with every controller it registered on.
    pub unit: DevUnit,
    /// Instance name (defaults to the device type).
    pub name: String,
    /// Controller names this device attaches to; empty means all.
    pub ios: Vec<String>,
}

/// A fully assembled system: the exclusive owner of its CPUs, memory
/// regions, I/O controllers and devices.
#[derive(Debug)]
pub struct System {
    kind: &'static str,
    max_cpus: usize,
    cpus: Vec<CpuUnit>,
    memories: Vec<MemEntry>,
    ios: Vec<IoEntry>,
    devices: Vec<DevEntry>,
}

impl System {
    /// Parses `text` against `registry` and binds the whole system.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] on the first lexical, grammatical or binding
    /// fault; nothing of the partially built system escapes.
    pub fn load_config(registry: &Registry, text: &str) -> Result<Self, ConfigError> {
        let parsed = config::parse(text)?;
        Self::assemble(registry, &parsed)
    }

    fn assemble(registry: &Registry, parsed: &ParsedConfig) -> Result<Self, ConfigError> {
        let model_name = parsed.system.as_deref().ok_or(ConfigError::MissingSystem)?;
        let model = registry.create_system(model_name)?;
        info!(target: "retro80::system", system = model.kind, "assembling system");

        let mut system = Self {
            kind: model.kind,
            max_cpus: model.max_cpus,
            cpus: Vec::new(),
            memories: Vec::new(),
            ios: Vec::new(),
            devices: Vec::new(),
        };

        system.build_cpus(registry, parsed)?;
        system.build_memories(registry, parsed)?;
        system.build_ios(registry, parsed)?;
        system.bind_memories()?;
        system.bind_ios()?;
        for cpu in &mut system.cpus {
            cpu.bind_io_to_memory();
        }
        system.load_images()?;
        system.build_devices(registry, parsed)?;
        for entry in &system.ios {
            entry.unit.init()?;
        }

        info!(
            target: "retro80::system",
            cpus = system.cpus.len(),
            memories = system.memories.len(),
            ios = system.ios.len(),
            devices = system.devices.len(),
            "system assembled"
        );
        Ok(system)
    }

    fn build_cpus(&mut self, registry: &Registry, parsed: &ParsedConfig) -> Result<(), ConfigError> {
        for spec in &parsed.cpus {
            if self.cpus.len() >= self.max_cpus {
                return Err(ConfigError::TooManyCpus(self.max_cpus));
            }
            let mut cpu = registry.create_cpu(&spec.model)?;
            match &mut cpu {
                CpuUnit::U8(c) => configure_cpu(c.as_mut(), spec.name.as_deref(), &spec.opts)?,
                CpuUnit::U16(c) => configure_cpu(c.as_mut(), spec.name.as_deref(), &spec.opts)?,
                CpuUnit::U32(c) => configure_cpu(c.as_mut(), spec.name.as_deref(), &spec.opts)?,
                CpuUnit::U64(c) => configure_cpu(c.as_mut(), spec.name.as_deref(), &spec.opts)?,
            }
            debug!(target: "retro80::system", model = %spec.model, name = ?spec.name, "cpu ready");

            // A CPU that brought its own I/O controller joins the roster
            // pre-attached, under the CPU's own name so devices can
            // select it.
            let io = match &cpu {
                CpuUnit::U8(c) => c.requires_io().then(|| c.io().map(IoUnit::U8)).flatten(),
                CpuUnit::U16(c) => c.requires_io().then(|| c.io().map(IoUnit::U16)).flatten(),
                CpuUnit::U32(c) => c.requires_io().then(|| c.io().map(IoUnit::U32)).flatten(),
                CpuUnit::U64(c) => c.requires_io().then(|| c.io().map(IoUnit::U64)).flatten(),
            };
            if let Some(unit) = io {
                let name = cpu.name();
                unit.set_name(&name);
                self.ios.push(IoEntry {
                    unit,
                    name: name.clone(),
                    cpus: vec![name],
                    pre_attached: true,
                });
            }
            self.cpus.push(cpu);
        }
        Ok(())
    }

    fn build_memories(
        &mut self,
        registry: &Registry,
        parsed: &ParsedConfig,
    ) -> Result<(), ConfigError> {
        for spec in &parsed.memories {
            let unit = registry.create_memory(&spec.kind, spec.size, spec.base)?;
            let name = spec.name.clone().unwrap_or_default();
            match &unit {
                MemUnit::U8(handle) => apply_memory_opts(handle, &name, &spec.opts)?,
                MemUnit::U16(handle) => apply_memory_opts(handle, &name, &spec.opts)?,
                MemUnit::U32(handle) => apply_memory_opts(handle, &name, &spec.opts)?,
                MemUnit::U64(handle) => apply_memory_opts(handle, &name, &spec.opts)?,
            }
            self.memories.push(MemEntry {
                unit,
                name,
                cpus: spec.cpus.clone(),
                load: spec.load.clone().map(PathBuf::from),
            });
        }
        Ok(())
    }

    fn build_ios(&mut self, registry: &Registry, parsed: &ParsedConfig) -> Result<(), ConfigError> {
        for spec in &parsed.ios {
            let unit = registry.create_io(&spec.kind, DEFAULT_MAX_PORTS)?;
            let name = spec.name.clone().unwrap_or_default();
            unit.set_name(&name);
            match &unit {
                IoUnit::U8(handle) => apply_io_opts(handle, &spec.opts)?,
                IoUnit::U16(handle) => apply_io_opts(handle, &spec.opts)?,
                IoUnit::U32(handle) => apply_io_opts(handle, &spec.opts)?,
                IoUnit::U64(handle) => apply_io_opts(handle, &spec.opts)?,
            }
            self.ios.push(IoEntry {
                unit,
                name,
                cpus: spec.cpus.clone(),
                pre_attached: false,
            });
        }
        Ok(())
    }

    fn bind_memories(&mut self) -> Result<(), ConfigError> {
        for entry in &self.memories {
            for cpu in &mut self.cpus {
                if !entry.cpus.is_empty() && !entry.cpus.contains(&cpu.name()) {
                    continue;
                }
                match (cpu, &entry.unit) {
                    (CpuUnit::U8(c), MemUnit::U8(mem)) => {
                        let (base, size) = {
                            let region = retro80_core::lock(mem);
                            (region.base(), region.size())
                        };
                        if c.memory_overlaps(base, size) {
                            return Err(ConfigError::OverlappingRegion {
                                name: entry.name.clone(),
                                base,
                            });
                        }
                        c.add_memory(Arc::clone(mem));
                    }
                    (CpuUnit::U16(c), MemUnit::U16(mem)) => c.add_memory(Arc::clone(mem)),
                    (CpuUnit::U32(c), MemUnit::U32(mem)) => c.add_memory(Arc::clone(mem)),
                    (CpuUnit::U64(c), MemUnit::U64(mem)) => c.add_memory(Arc::clone(mem)),
                    (cpu, _) => {
                        return Err(ConfigError::IncompatibleWidth {
                            cpu: cpu.display_name(),
                            peripheral: entry.name.clone(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn bind_ios(&mut self) -> Result<(), ConfigError> {
        for entry in &self.ios {
            if entry.pre_attached {
                continue;
            }
            for cpu in &mut self.cpus {
                if !entry.cpus.is_empty() && !entry.cpus.contains(&cpu.name()) {
                    continue;
                }
                match (cpu, &entry.unit) {
                    (CpuUnit::U8(c), IoUnit::U8(io)) => c.add_io(Arc::clone(io)),
                    (CpuUnit::U16(c), IoUnit::U16(io)) => c.add_io(Arc::clone(io)),
                    (CpuUnit::U32(c), IoUnit::U32(io)) => c.add_io(Arc::clone(io)),
                    (CpuUnit::U64(c), IoUnit::U64(io)) => c.add_io(Arc::clone(io)),
                    (cpu, _) => {
                        return Err(ConfigError::IncompatibleWidth {
                            cpu: cpu.display_name(),
                            peripheral: entry.name.clone(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn load_images(&mut self) -> Result<(), ConfigError> {
        for entry in &self.memories {
            if let Some(path) = &entry.load {
                let loaded = loader::load_image(path, &entry.unit)?;
                info!(
                    target: "retro80::system",
                    region = %entry.name,
                    bytes = loaded,
                    path = %path.display(),
                    "image loaded"
                );
            }
        }
        Ok(())
    }

    fn build_devices(
        &mut self,
        registry: &Registry,
        parsed: &ParsedConfig,
    ) -> Result<(), ConfigError> {
        for spec in &parsed.devices {
            let unit = registry.create_device(&spec.kind, spec.addr.unwrap_or(0))?;
            let name = spec.name.clone().unwrap_or_else(|| spec.kind.clone());

            // `control=` settings pick roster controllers by name;
            // everything else is the device's own business.
            let mut io_names = Vec::new();
            let device_opts: Vec<&OptionSetting> = spec
                .opts
                .iter()
                .filter(|opt| {
                    if opt.name == "control" {
                        if let Some(target) = opt.value.as_text() {
                            io_names.push(target.to_string());
                        }
                        false
                    } else {
                        true
                    }
                })
                .collect();
            if let DevUnit::U8(handle) = &unit {
                let mut dev = handle
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                for opt in device_opts {
                    dev.set_option(&opt.name, &opt.value)?;
                }
            }

            let entry = DevEntry {
                unit,
                name,
                ios: io_names,
            };

            let mut attached = false;
            for io in &self.ios {
                if !entry.ios.is_empty() && !entry.ios.contains(&io.name) {
                    continue;
                }
                match (&io.unit, &entry.unit) {
                    (IoUnit::U8(io_handle), DevUnit::U8(dev)) => {
                        lock_io(io_handle).add_device(Arc::clone(dev))?;
                        attached = true;
                    }
                    (IoUnit::U16(io_handle), DevUnit::U16(dev)) => {
                        lock_io(io_handle).add_device(Arc::clone(dev))?;
                        attached = true;
                    }
                    (IoUnit::U32(io_handle), DevUnit::U32(dev)) => {
                        lock_io(io_handle).add_device(Arc::clone(dev))?;
                        attached = true;
                    }
                    (IoUnit::U64(io_handle), DevUnit::U64(dev)) => {
                        lock_io(io_handle).add_device(Arc::clone(dev))?;
                        attached = true;
                    }
                    _ => {
                        return Err(ConfigError::IncompatibleWidth {
                            cpu: io.name.clone(),
                            peripheral: entry.name.clone(),
                        })
                    }
                }
            }
            if !attached {
                debug!(
                    target: "retro80::system",
                    device = %entry.name,
                    "device matched no controller"
                );
            }
            self.devices.push(entry);
        }
        Ok(())
    }

    /// System model name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// CPU roster.
    #[must_use]
    pub fn cpus(&self) -> &[CpuUnit] {
        &self.cpus
    }

    /// Mutable CPU roster, for monitors and tests.
    pub fn cpus_mut(&mut self) -> &mut [CpuUnit] {
        &mut self.cpus
    }

    /// Memory roster.
    #[must_use]
    pub fn memories(&self) -> &[MemEntry] {
        &self.memories
    }

    /// I/O controller roster.
    #[must_use]
    pub fn ios(&self) -> &[IoEntry] {
        &self.ios
    }

    /// Device roster.
    #[must_use]
    pub fn devices(&self) -> &[DevEntry] {
        &self.devices
    }

    /// Starts every controller (cascading to devices) and CPU.
    pub fn start(&mut self) {
        for entry in &self.ios {
            entry.unit.start();
        }
        for cpu in &mut self.cpus {
            cpu.start();
        }
    }

    /// Resets every CPU and controller.
    pub fn reset(&mut self) {
        for cpu in &mut self.cpus {
            cpu.reset();
        }
        for entry in &self.ios {
            entry.unit.reset();
        }
    }

    /// Stops CPUs first, then controllers — the reverse of `start`.
    pub fn stop(&mut self) {
        for cpu in &mut self.cpus {
            cpu.stop();
        }
        for entry in &self.ios {
            entry.unit.stop();
        }
    }

    /// Final teardown, mirroring `start` in reverse order.
    pub fn shutdown(&mut self) {
        for cpu in &mut self.cpus {
            cpu.shutdown();
        }
        for entry in &self.ios {
            entry.unit.shutdown();
        }
    }

    /// Runs every CPU to its next halt/stop and returns total T-states.
    ///
    /// A single CPU runs on the calling thread; multi-CPU systems get a
    /// thread per CPU with memory serialized by the controllers' locks.
    pub fn run(&mut self) -> u64 {
        match self.cpus.len() {
            0 => 0,
            1 => self.cpus[0].run(),
            _ => std::thread::scope(|scope| {
                let mut workers = Vec::new();
                for cpu in &mut self.cpus {
                    workers.push(scope.spawn(move || cpu.run()));
                }
                workers.into_iter().map(|w| w.join().unwrap_or(0)).sum()
            }),
        }
    }
}

fn configure_cpu<T: retro80_core::Cell>(
    cpu: &mut dyn retro80_core::Processor<T>,
    name: Option<&str>,
    opts: &[OptionSetting],
) -> Result<(), ConfigError> {
    for opt in opts {
        cpu.set_option(&opt.name, &opt.value)?;
    }
    if let Some(name) = name {
        cpu.set_name(name);
    }
    cpu.init()?;
    Ok(())
}

fn apply_memory_opts<T: retro80_core::Cell>(
    handle: &retro80_core::MemHandle<T>,
    name: &str,
    opts: &[OptionSetting],
) -> Result<(), ConfigError> {
    let mut mem = retro80_core::lock(handle);
    mem.set_name(name);
    for opt in opts {
        mem.set_option(&opt.name, &opt.value)?;
    }
    Ok(())
}

fn apply_io_opts<T: retro80_core::Cell>(
    handle: &retro80_core::IoHandle<T>,
    opts: &[OptionSetting],
) -> Result<(), ConfigError> {
    let mut io = lock_io(handle);
    for opt in opts {
        io.set_option(&opt.name, &opt.value)?;
    }
    Ok(())
}
