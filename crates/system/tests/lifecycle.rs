//! Lifecycle cascade ordering: init exactly once per device, start
//! before run, stop and shutdown mirroring in reverse.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use retro80_core::{DevHandle, Device, DeviceError};
use retro80_sys::{DevUnit, Registry, System};

static INITS: AtomicUsize = AtomicUsize::new(0);
static STARTS: AtomicUsize = AtomicUsize::new(0);
static STOPS: AtomicUsize = AtomicUsize::new(0);
static SHUTDOWNS: AtomicUsize = AtomicUsize::new(0);

/// Probe spanning several ports, so stride-by-span dedup is exercised.
struct Probe {
    base: usize,
}

impl Probe {
    fn unit(base: usize) -> DevUnit {
        let dev: DevHandle<u8> = Arc::new(Mutex::new(Self { base }));
        DevUnit::U8(dev)
    }
}

impl Device<u8> for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    fn address(&self) -> usize {
        self.base
    }

    fn span(&self) -> usize {
        8
    }

    fn input(&mut self, val: &mut u8, _port: usize) -> bool {
        *val = 0;
        false
    }

    fn output(&mut self, _val: u8, _port: usize) -> bool {
        false
    }

    fn init(&mut self) -> Result<(), DeviceError> {
        INITS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self) {
        STARTS.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        STOPS.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&mut self) {
        SHUTDOWNS.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn devices_see_each_lifecycle_phase_exactly_once() {
    let mut registry = Registry::with_defaults();
    registry.register_device("probe", |base| Probe::unit(base));

    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                device probe:p0 = 0x40\n";
    let mut system = System::load_config(&registry, text).expect("valid machine");

    // The binder's controller init cascade has already run.
    assert_eq!(INITS.load(Ordering::SeqCst), 1, "one init despite span 8");
    assert_eq!(STARTS.load(Ordering::SeqCst), 0);

    system.start();
    assert_eq!(STARTS.load(Ordering::SeqCst), 1);

    system.stop();
    assert_eq!(STOPS.load(Ordering::SeqCst), 1);

    system.shutdown();
    assert_eq!(SHUTDOWNS.load(Ordering::SeqCst), 1);
}
