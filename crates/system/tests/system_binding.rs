//! End-to-end configuration, binding and execution tests.

use std::io::Write;

use tempfile::NamedTempFile;

use retro80_core::{lock, Memory, MemHandle, Width};
use retro80_sys::{ConfigError, MemUnit, Registry, System};

fn image(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write image");
    file
}

fn byte_at(region: &MemUnit, index: usize) -> Option<u8> {
    match region {
        MemUnit::U8(handle) => lock(handle).read(index),
        _ => None,
    }
}

#[test]
fn full_machine_binds_loads_and_runs() {
    // MVI A,42; STA 2000; HLT
    let file = image(&[0x3E, 0x42, 0x32, 0x00, 0x20, 0x76]);
    let text = format!(
        "system i8080\n\
         cpu i8080:cpu0 (pagesize=4k)\n\
         memory ram:main = cpu0 64k load = \"{}\"\n",
        file.path().display()
    );

    let registry = Registry::with_defaults();
    let mut system = System::load_config(&registry, &text).expect("valid machine");

    assert_eq!(system.kind(), "i8080");
    assert_eq!(system.cpus().len(), 1);
    assert_eq!(system.memories().len(), 1);
    // The 8080 brings its own port controller, named after the CPU.
    assert_eq!(system.ios().len(), 1);
    assert!(system.ios()[0].pre_attached);
    assert_eq!(system.ios()[0].name, "cpu0");

    // The image landed at the region base before execution.
    assert_eq!(byte_at(&system.memories()[0].unit, 0), Some(0x3E));

    system.start();
    let tstates = system.run();
    system.stop();
    system.shutdown();

    assert_eq!(tstates, 7 + 13 + 7);
    assert_eq!(byte_at(&system.memories()[0].unit, 0x2000), Some(0x42));
}

#[test]
fn rom_regions_load_but_reject_bus_writes() {
    let file = image(&[0xAA, 0xBB]);
    let text = format!(
        "system i8080\n\
         cpu i8080:cpu0\n\
         memory rom:boot = cpu0 2k, 0xF800 load = \"{}\"\n",
        file.path().display()
    );

    let registry = Registry::with_defaults();
    let system = System::load_config(&registry, &text).expect("valid machine");

    let MemUnit::U8(handle) = &system.memories()[0].unit else {
        panic!("rom should be byte-wide");
    };
    assert_eq!(lock(handle).read(0), Some(0xAA));
    // The bus write path reports success and discards.
    assert!(lock(handle).write(0x00, 0));
    assert_eq!(lock(handle).read(0), Some(0xAA));
}

#[test]
fn overlapping_regions_fail_the_load() {
    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                memory ram:low = cpu0 32k\n\
                memory ram:clash = cpu0 32k, 0x4000\n";
    let registry = Registry::with_defaults();
    match System::load_config(&registry, text) {
        Err(ConfigError::OverlappingRegion { name, base }) => {
            assert_eq!(name, "clash");
            assert_eq!(base, 0x4000);
        }
        other => panic!("expected overlap rejection, got {other:?}"),
    }
}

#[test]
fn adjacent_regions_bind_cleanly() {
    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                memory ram:low = cpu0 32k\n\
                memory ram:high = cpu0 32k, 0x8000\n";
    let registry = Registry::with_defaults();
    let system = System::load_config(&registry, text).expect("no overlap");
    assert_eq!(system.memories().len(), 2);
}

#[test]
fn unknown_component_types_are_reported_with_kind() {
    let registry = Registry::with_defaults();

    match System::load_config(&registry, "system pdp8") {
        Err(ConfigError::UnknownType { kind, name }) => {
            assert_eq!(kind, "system");
            assert_eq!(name, "pdp8");
        }
        other => panic!("expected unknown system, got {other:?}"),
    }

    match System::load_config(&registry, "system i8080\ncpu z80") {
        Err(ConfigError::UnknownType { kind, .. }) => assert_eq!(kind, "cpu"),
        other => panic!("expected unknown cpu, got {other:?}"),
    }

    match System::load_config(&registry, "system i8080\nmemory flash 4k") {
        Err(ConfigError::UnknownType { kind, .. }) => assert_eq!(kind, "memory"),
        other => panic!("expected unknown memory, got {other:?}"),
    }
}

#[test]
fn the_i8080_model_accepts_a_single_cpu() {
    let text = "system i8080\ncpu i8080:a\ncpu i8085:b\n";
    let registry = Registry::with_defaults();
    assert!(matches!(
        System::load_config(&registry, text),
        Err(ConfigError::TooManyCpus(1))
    ));
}

#[test]
fn width_mismatch_is_rejected_at_bind_time() {
    let mut registry = Registry::with_defaults();
    registry.register_memory("wideram", |size, base| {
        let region: MemHandle<u16> = Memory::ram(size, base).into_handle();
        MemUnit::U16(region)
    });

    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                memory wideram:w16 = cpu0 4k\n";
    match System::load_config(&registry, text) {
        Err(ConfigError::IncompatibleWidth { cpu, peripheral }) => {
            assert_eq!(cpu, "cpu0");
            assert_eq!(peripheral, "w16");
        }
        other => panic!("expected width mismatch, got {other:?}"),
    }

    let wide = registry
        .create_memory("wideram", 16, 0)
        .expect("registered for the test");
    assert_eq!(wide.width(), Width::U16);
}

#[test]
fn console_device_attaches_to_the_cpu_controller() {
    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                device uart:con0 = 0x10 (wru=5)\n";
    let registry = Registry::with_defaults();
    let system = System::load_config(&registry, text).expect("valid machine");

    assert_eq!(system.devices().len(), 1);
    assert_eq!(system.devices()[0].name, "con0");
    assert!(system.devices()[0].ios.is_empty(), "empty set means all");
}

#[test]
fn control_statement_adds_a_selectable_controller() {
    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                control ports:io2 = cpu0\n\
                device uart:con0 = 0x20 (control=io2)\n";
    let registry = Registry::with_defaults();
    let system = System::load_config(&registry, text).expect("valid machine");

    // Pre-attached controller plus the configured one.
    assert_eq!(system.ios().len(), 2);
    let io2 = system
        .ios()
        .iter()
        .find(|entry| entry.name == "io2")
        .expect("configured controller present");
    assert!(!io2.pre_attached);
    assert_eq!(system.devices()[0].ios, vec!["io2".to_string()]);
}

#[test]
fn unknown_options_abort_the_bind() {
    let registry = Registry::with_defaults();
    assert!(matches!(
        System::load_config(&registry, "system i8080\ncpu i8080 (turbo=9)"),
        Err(ConfigError::Option(_))
    ));
    assert!(matches!(
        System::load_config(&registry, "system i8080\nmemory ram 4k (speed=2)"),
        Err(ConfigError::Option(_))
    ));
}

#[test]
fn missing_image_file_fails_the_load() {
    let text = "system i8080\n\
                cpu i8080:cpu0\n\
                memory ram 64k load = \"/nonexistent/image.bin\"\n";
    let registry = Registry::with_defaults();
    assert!(matches!(
        System::load_config(&registry, text),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn reset_returns_the_machine_to_idle() {
    let file = image(&[0x76]);
    let text = format!(
        "system i8080\ncpu i8080:cpu0\nmemory ram 64k load = \"{}\"\n",
        file.path().display()
    );
    let registry = Registry::with_defaults();
    let mut system = System::load_config(&registry, &text).expect("valid machine");

    system.start();
    assert!(system.cpus()[0].running());
    system.run();
    assert!(!system.cpus()[0].running());

    system.reset();
    assert!(!system.cpus()[0].running());
    system.start();
    assert!(system.cpus()[0].running());
}
