//! The I/O fabric: a port-routed controller and the device contract.
//!
//! Devices self-register by base address and span; the controller routes
//! `IN`/`OUT` port traffic and fans lifecycle calls out to each distinct
//! device exactly once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::fault::{DeviceError, OptionError};
use crate::memory::{Cell, MemHandle};
use crate::option::OptionValue;

/// Ports decoded by the 8080 family's `IN`/`OUT` immediates.
pub const DEFAULT_MAX_PORTS: usize = 256;

/// Upward signal from a device back to its CPU. The only permitted
/// upward call in the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSignal {
    /// Nothing to report.
    #[default]
    Continue,
    /// Ask the owning CPU to stop at the next step boundary.
    HaltCpu,
}

impl DeviceSignal {
    /// Combines two signals, halting if either side halts.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Continue, Self::Continue) => Self::Continue,
            _ => Self::HaltCpu,
        }
    }
}

/// A port-addressed peripheral.
///
/// `input`/`output` return whether the device claimed the access; the
/// remaining methods are lifecycle propagation with do-nothing defaults.
pub trait Device<T: Cell>: Send {
    /// Device instance name.
    fn name(&self) -> &str;

    /// First port this device answers on.
    fn address(&self) -> usize;

    /// Number of consecutive ports occupied.
    fn span(&self) -> usize;

    /// Reads from a device port.
    fn input(&mut self, val: &mut T, port: usize) -> bool;

    /// Writes to a device port.
    fn output(&mut self, val: T, port: usize) -> bool;

    /// Reads a control/status port; defaults to the data-path read for
    /// devices that do not split the two.
    fn status(&mut self, val: &mut T, port: usize) -> bool {
        self.input(val, port)
    }

    /// Writes a control/command port; defaults to the data-path write.
    fn command(&mut self, val: T, port: usize) -> bool {
        self.output(val, port)
    }

    /// One-time initialization after the controller is wired.
    ///
    /// # Errors
    ///
    /// A [`DeviceError`] aborts system bring-up.
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Lifecycle start.
    fn start(&mut self) {}

    /// Lifecycle reset.
    fn reset(&mut self) {}

    /// Lifecycle stop.
    fn stop(&mut self) {}

    /// Called once per CPU instruction; may signal a halt upward.
    fn step(&mut self) -> DeviceSignal {
        DeviceSignal::Continue
    }

    /// Lifecycle run.
    fn run(&mut self) {}

    /// Lifecycle shutdown.
    fn shutdown(&mut self) {}

    /// Hands the device a shared memory handle for direct memory access.
    fn attach_dma(&mut self, _mem: MemHandle<T>) {}

    /// Applies a configuration option.
    ///
    /// # Errors
    ///
    /// [`OptionError::Unknown`] by default; devices override to accept
    /// their own settings.
    fn set_option(&mut self, name: &str, _value: &OptionValue) -> Result<(), OptionError> {
        Err(OptionError::Unknown(name.into()))
    }
}

/// Shared handle to a device, held by both the port table and the
/// system roster.
pub type DevHandle<T> = Arc<Mutex<dyn Device<T>>>;

fn lock_dev<T: Cell>(dev: &DevHandle<T>) -> MutexGuard<'_, dyn Device<T> + 'static> {
    dev.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to an I/O controller.
pub type IoHandle<T> = Arc<Mutex<IoMap<T>>>;

/// Locks an I/O controller handle, riding through poisoning.
pub fn lock_io<T: Cell>(io: &IoHandle<T>) -> MutexGuard<'_, IoMap<T>> {
    io.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Port-routed I/O controller.
///
/// Unclaimed ports behave as the null device: reads deliver the idle
/// value and report `false`, writes are dropped.
pub struct IoMap<T: Cell> {
    name: String,
    table: Vec<Option<DevHandle<T>>>,
    mem: Option<MemHandle<T>>,
}

impl<T: Cell> std::fmt::Debug for IoMap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoMap")
            .field("name", &self.name)
            .field("ports", &self.table.len())
            .field("dma", &self.mem.is_some())
            .finish()
    }
}

impl<T: Cell> IoMap<T> {
    /// New controller with `max_ports` table entries.
    #[must_use]
    pub fn new(max_ports: usize) -> Self {
        Self {
            name: String::new(),
            table: (0..max_ports).map(|_| None).collect(),
            mem: None,
        }
    }

    /// Wraps this controller in a shared handle.
    #[must_use]
    pub fn into_handle(self) -> IoHandle<T> {
        Arc::new(Mutex::new(self))
    }

    /// Controller instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the controller.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of ports routed by this controller.
    #[must_use]
    pub fn max_ports(&self) -> usize {
        self.table.len()
    }

    /// Shares the CPU's memory controller so devices can DMA.
    pub fn bind_memory(&mut self, mem: MemHandle<T>) {
        self.mem = Some(mem);
    }

    /// Applies a configuration option. The port-table controller has no
    /// recognized options of its own.
    ///
    /// # Errors
    ///
    /// Always [`OptionError::Unknown`].
    pub fn set_option(&mut self, name: &str, _value: &OptionValue) -> Result<(), OptionError> {
        Err(OptionError::Unknown(name.into()))
    }

    /// The bound memory handle, if any.
    #[must_use]
    pub fn memory(&self) -> Option<MemHandle<T>> {
        self.mem.clone()
    }

    /// Installs a device over `table[address .. address + span]`.
    ///
    /// The device receives the DMA memory handle if one is bound.
    ///
    /// # Errors
    ///
    /// [`DeviceError`] when the port range falls outside the table.
    pub fn add_device(&mut self, dev: DevHandle<T>) -> Result<(), DeviceError> {
        let (name, address, span) = {
            let d = lock_dev(&dev);
            (d.name().to_string(), d.address(), d.span())
        };
        let end = address.saturating_add(span);
        if span == 0 || end > self.table.len() {
            return Err(DeviceError::new(
                name,
                format!(
                    "port range {address:#04x}..{end:#04x} outside controller ({} ports)",
                    self.table.len()
                ),
            ));
        }
        if let Some(mem) = &self.mem {
            lock_dev(&dev).attach_dma(Arc::clone(mem));
        }
        for slot in &mut self.table[address..end] {
            *slot = Some(Arc::clone(&dev));
        }
        Ok(())
    }

    /// Routes a port read. Unclaimed ports yield the idle value and
    /// `false`.
    pub fn input(&mut self, val: &mut T, port: usize) -> bool {
        match self.table.get(port) {
            Some(Some(dev)) => lock_dev(dev).input(val, port),
            _ => {
                *val = T::default();
                false
            }
        }
    }

    /// Routes a port write. Unclaimed ports drop the value.
    pub fn output(&mut self, val: T, port: usize) -> bool {
        match self.table.get(port) {
            Some(Some(dev)) => lock_dev(dev).output(val, port),
            _ => false,
        }
    }

    /// Routes a status read.
    pub fn status(&mut self, val: &mut T, port: usize) -> bool {
        match self.table.get(port) {
            Some(Some(dev)) => lock_dev(dev).status(val, port),
            _ => {
                *val = T::default();
                false
            }
        }
    }

    /// Routes a command write.
    pub fn command(&mut self, val: T, port: usize) -> bool {
        match self.table.get(port) {
            Some(Some(dev)) => lock_dev(dev).command(val, port),
            _ => false,
        }
    }

    /// Visits each distinct device once, striding by span.
    fn for_each_device(&mut self, mut visit: impl FnMut(&mut dyn Device<T>)) {
        let mut port = 0;
        while port < self.table.len() {
            match &self.table[port] {
                Some(dev) => {
                    let mut d = lock_dev(dev);
                    visit(&mut *d);
                    port += d.span().max(1);
                }
                None => port += 1,
            }
        }
    }

    /// Initializes every attached device.
    ///
    /// # Errors
    ///
    /// The first [`DeviceError`] aborts the cascade.
    pub fn init(&mut self) -> Result<(), DeviceError> {
        let mut failure = None;
        self.for_each_device(|dev| {
            if failure.is_none() {
                if let Err(fault) = dev.init() {
                    failure = Some(fault);
                }
            }
        });
        failure.map_or(Ok(()), Err)
    }

    /// Starts every attached device.
    pub fn start(&mut self) {
        self.for_each_device(|dev| dev.start());
    }

    /// Resets every attached device.
    pub fn reset(&mut self) {
        self.for_each_device(|dev| dev.reset());
    }

    /// Stops every attached device.
    pub fn stop(&mut self) {
        self.for_each_device(|dev| dev.stop());
    }

    /// Steps every attached device and merges their upward signals.
    pub fn step(&mut self) -> DeviceSignal {
        let mut signal = DeviceSignal::Continue;
        self.for_each_device(|dev| signal = signal.merge(dev.step()));
        signal
    }

    /// Runs every attached device.
    pub fn run(&mut self) {
        self.for_each_device(|dev| dev.run());
    }

    /// Shuts down every attached device.
    pub fn shutdown(&mut self) {
        self.for_each_device(|dev| dev.shutdown());
    }
}
