//! Console input plumbing and the UART-style console device.
//!
//! A reader thread (spawned at device init) pushes host bytes through
//! the [`ConsoleMux`], which routes them to either the emulated program
//! or the command interpreter: the wake-up character (WRU, default
//! CTRL-E) toggles between the two sinks and is itself never delivered.
//! Queues are bounded; overflow raises the device's overrun status bit
//! rather than dropping bytes silently.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;

use retro80_core::{DevHandle, Device, DeviceSignal, DeviceError, OptionError, OptionValue};

/// Default wake-up character (CTRL-E).
pub const DEFAULT_WRU: u8 = 0x05;

/// CTRL-C stops the owning CPU instead of being buffered.
const ATTENTION: u8 = 0x03;

/// Bound on each console queue.
pub const CONSOLE_QUEUE_DEPTH: usize = 64;

/// Data port offset.
pub const DATA_PORT: usize = 0;
/// Status port offset.
pub const STATUS_PORT: usize = 1;
/// Mode port offset (alternates mode1/mode2 per access).
pub const MODE_PORT: usize = 2;
/// Command port offset.
pub const CMD_PORT: usize = 3;

/// Status: transmitter ready.
pub const TX_RDY: u8 = 0x01;
/// Status: received character ready.
pub const RX_RDY: u8 = 0x02;
/// Status: a character arrived while the queue was full.
pub const RX_OVERRUN: u8 = 0x10;

/// Command: enable transmitter.
pub const CMD_TX_ENABLE: u8 = 0x01;
/// Command: clear error status.
pub const CMD_RESET: u8 = 0x10;

/// Routes host bytes to the program or command sink, toggling on WRU.
#[derive(Debug)]
pub struct ConsoleMux {
    wru: u8,
    command_mode: bool,
    program: SyncSender<u8>,
    command: SyncSender<u8>,
    overrun: Arc<AtomicBool>,
}

impl ConsoleMux {
    /// New multiplexer over the two sinks.
    #[must_use]
    pub fn new(
        wru: u8,
        program: SyncSender<u8>,
        command: SyncSender<u8>,
        overrun: Arc<AtomicBool>,
    ) -> Self {
        Self {
            wru,
            command_mode: false,
            program,
            command,
            overrun,
        }
    }

    /// True while bytes route to the command sink.
    #[must_use]
    pub const fn command_mode(&self) -> bool {
        self.command_mode
    }

    /// Routes one byte. The WRU byte toggles the mode and is consumed.
    pub fn push(&mut self, byte: u8) {
        if byte == self.wru {
            self.command_mode = !self.command_mode;
            return;
        }
        let sink = if self.command_mode {
            &self.command
        } else {
            &self.program
        };
        match sink.try_send(byte) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.overrun.store(true, Ordering::Relaxed);
            }
        }
    }
}

/// Where transmitted bytes go.
enum Sink {
    Stdout,
    Capture(Arc<Mutex<Vec<u8>>>),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "Stdout"),
            Self::Capture(_) => write!(f, "Capture"),
        }
    }
}

impl Sink {
    fn put(&mut self, byte: u8) {
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(&[byte]);
                let _ = out.flush();
            }
            Self::Capture(buffer) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.push(byte);
                }
            }
        }
    }
}

/// Serial console device in the 2651 mold: DATA/STATUS/MODE/CMD ports,
/// one receive buffer, FIFO delivery of at most one byte per read.
#[derive(Debug)]
pub struct ConsoleDevice {
    name: String,
    base: usize,
    wru: u8,
    mode1: u8,
    mode2: u8,
    mode_ptr: bool,
    cmd: u8,
    status: u8,
    recv: Option<u8>,
    rx: Option<Receiver<u8>>,
    command_rx: Option<Receiver<u8>>,
    overrun: Arc<AtomicBool>,
    sink: Sink,
}

impl ConsoleDevice {
    /// New console at `base`; the host reader thread starts at `init`.
    #[must_use]
    pub fn new(base: usize) -> Self {
        Self {
            name: "console".into(),
            base,
            wru: DEFAULT_WRU,
            mode1: 0,
            mode2: 0,
            mode_ptr: false,
            cmd: 0,
            status: 0,
            recv: None,
            rx: None,
            command_rx: None,
            overrun: Arc::new(AtomicBool::new(false)),
            sink: Sink::Stdout,
        }
    }

    /// Test/embedding constructor with an injected program queue; no
    /// reader thread is spawned and output is captured.
    #[must_use]
    pub fn with_input(
        base: usize,
        rx: Receiver<u8>,
        overrun: Arc<AtomicBool>,
    ) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let capture = Arc::new(Mutex::new(Vec::new()));
        let mut device = Self::new(base);
        device.rx = Some(rx);
        device.overrun = overrun;
        device.sink = Sink::Capture(Arc::clone(&capture));
        (device, capture)
    }

    /// Wraps the device for registration with an I/O controller.
    #[must_use]
    pub fn into_handle(self) -> DevHandle<u8> {
        Arc::new(Mutex::new(self))
    }

    /// Bytes waiting on the command sink, if the reader is attached.
    /// Reserved for a command interpreter front-end.
    pub fn command_input(&mut self) -> Option<u8> {
        self.command_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    fn pump(&mut self) -> DeviceSignal {
        if self.recv.is_none() {
            if let Some(rx) = &self.rx {
                match rx.try_recv() {
                    Ok(ATTENTION) => return DeviceSignal::HaltCpu,
                    Ok(byte) => self.recv = Some(byte),
                    Err(_) => {}
                }
            }
        }
        DeviceSignal::Continue
    }
}

impl Device<u8> for ConsoleDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> usize {
        self.base
    }

    fn span(&self) -> usize {
        4
    }

    fn init(&mut self) -> Result<(), DeviceError> {
        if self.rx.is_some() {
            return Ok(());
        }
        let (program_tx, program_rx) = sync_channel(CONSOLE_QUEUE_DEPTH);
        let (command_tx, command_rx) = sync_channel(CONSOLE_QUEUE_DEPTH);
        let mut mux = ConsoleMux::new(
            self.wru,
            program_tx,
            command_tx,
            Arc::clone(&self.overrun),
        );
        thread::Builder::new()
            .name("console-reader".into())
            .spawn(move || {
                let mut stdin = std::io::stdin().lock();
                let mut byte = [0u8; 1];
                while let Ok(1) = stdin.read(&mut byte) {
                    mux.push(byte[0]);
                }
            })
            .map_err(|fault| DeviceError::new(self.name.clone(), fault.to_string()))?;
        self.rx = Some(program_rx);
        self.command_rx = Some(command_rx);
        Ok(())
    }

    fn reset(&mut self) {
        self.mode_ptr = false;
        self.status = 0;
        self.cmd = 0;
        self.mode1 = 0;
        self.mode2 = 0;
    }

    fn step(&mut self) -> DeviceSignal {
        self.pump()
    }

    fn input(&mut self, val: &mut u8, port: usize) -> bool {
        match port.wrapping_sub(self.base) & 0x03 {
            DATA_PORT => {
                *val = self.recv.take().unwrap_or(0);
            }
            STATUS_PORT => {
                let mut status = self.status;
                if self.recv.is_some() {
                    status |= RX_RDY;
                }
                if self.overrun.load(Ordering::Relaxed) {
                    status |= RX_OVERRUN;
                }
                *val = status;
            }
            MODE_PORT => {
                *val = if self.mode_ptr { self.mode2 } else { self.mode1 };
                self.mode_ptr = !self.mode_ptr;
            }
            CMD_PORT => *val = self.cmd,
            _ => {
                *val = 0;
                return false;
            }
        }
        true
    }

    fn output(&mut self, val: u8, port: usize) -> bool {
        match port.wrapping_sub(self.base) & 0x03 {
            DATA_PORT => self.sink.put(val),
            STATUS_PORT => {
                // Sync-character registers on the real part; nothing to do.
            }
            MODE_PORT => {
                if self.mode_ptr {
                    self.mode2 = val;
                } else {
                    self.mode1 = val;
                }
                self.mode_ptr = !self.mode_ptr;
            }
            CMD_PORT => {
                self.cmd = val;
                self.mode_ptr = false;
                if val & CMD_RESET != 0 {
                    self.status &= TX_RDY;
                    self.overrun.store(false, Ordering::Relaxed);
                }
                if val & CMD_TX_ENABLE != 0 {
                    self.status |= TX_RDY;
                }
            }
            _ => return false,
        }
        true
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), OptionError> {
        match name {
            "wru" => {
                let wru = value.as_number().ok_or_else(|| OptionError::InvalidValue {
                    name: name.into(),
                    value: value.to_string(),
                })?;
                self.wru = u8::try_from(wru).map_err(|_| OptionError::InvalidValue {
                    name: name.into(),
                    value: value.to_string(),
                })?;
                Ok(())
            }
            _ => Err(OptionError::Unknown(name.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::sync_channel;
    use std::sync::Arc;

    use super::{
        ConsoleDevice, ConsoleMux, CMD_PORT, CMD_RESET, CMD_TX_ENABLE, DATA_PORT,
        DEFAULT_WRU, MODE_PORT, RX_OVERRUN, RX_RDY, STATUS_PORT, TX_RDY,
    };
    use retro80_core::{Device, DeviceSignal};

    #[test]
    fn wru_toggles_between_program_and_command_sinks() {
        let (program_tx, program_rx) = sync_channel(16);
        let (command_tx, command_rx) = sync_channel(16);
        let overrun = Arc::new(AtomicBool::new(false));
        let mut mux = ConsoleMux::new(DEFAULT_WRU, program_tx, command_tx, overrun);

        for byte in [b'H', b'i', 0x05, b'l', b's', 0x05, b'!'] {
            mux.push(byte);
        }

        let program: Vec<u8> = program_rx.try_iter().collect();
        let command: Vec<u8> = command_rx.try_iter().collect();
        assert_eq!(program, b"Hi!");
        assert_eq!(command, b"ls");
        assert!(!mux.command_mode(), "two toggles land back in program mode");
    }

    #[test]
    fn queue_overflow_raises_the_overrun_flag() {
        let (program_tx, _program_rx) = sync_channel(2);
        let (command_tx, _command_rx) = sync_channel(2);
        let overrun = Arc::new(AtomicBool::new(false));
        let mut mux = ConsoleMux::new(DEFAULT_WRU, program_tx, command_tx, Arc::clone(&overrun));

        mux.push(b'a');
        mux.push(b'b');
        assert!(!overrun.load(Ordering::Relaxed));
        mux.push(b'c');
        assert!(overrun.load(Ordering::Relaxed), "third byte overflows depth 2");
    }

    #[test]
    fn device_delivers_one_fifo_byte_per_read() {
        let (tx, rx) = sync_channel(16);
        let overrun = Arc::new(AtomicBool::new(false));
        let (mut device, _out) = ConsoleDevice::with_input(0x10, rx, overrun);

        tx.send(b'x').expect("queue has room");
        tx.send(b'y').expect("queue has room");

        assert_eq!(device.step(), DeviceSignal::Continue);
        let mut val = 0;
        assert!(device.input(&mut val, 0x10 + STATUS_PORT));
        assert_ne!(val & RX_RDY, 0);

        assert!(device.input(&mut val, 0x10 + DATA_PORT));
        assert_eq!(val, b'x');

        // The buffer is empty until the next pump.
        assert!(device.input(&mut val, 0x10 + STATUS_PORT));
        assert_eq!(val & RX_RDY, 0);
        device.step();
        assert!(device.input(&mut val, 0x10 + DATA_PORT));
        assert_eq!(val, b'y');
    }

    #[test]
    fn attention_byte_halts_the_cpu_instead_of_buffering() {
        let (tx, rx) = sync_channel(16);
        let overrun = Arc::new(AtomicBool::new(false));
        let (mut device, _out) = ConsoleDevice::with_input(0x10, rx, overrun);

        tx.send(0x03).expect("queue has room");
        assert_eq!(device.step(), DeviceSignal::HaltCpu);
        let mut val = 0xFF;
        device.input(&mut val, 0x10 + DATA_PORT);
        assert_eq!(val, 0, "CTRL-C never reaches the data buffer");
    }

    #[test]
    fn output_bytes_reach_the_sink() {
        let (_tx, rx) = sync_channel::<u8>(16);
        let overrun = Arc::new(AtomicBool::new(false));
        let (mut device, out) = ConsoleDevice::with_input(0x10, rx, overrun);

        assert!(device.output(b'o', 0x10 + DATA_PORT));
        assert!(device.output(b'k', 0x10 + DATA_PORT));
        assert_eq!(*out.lock().expect("capture lock"), b"ok".to_vec());
    }

    #[test]
    fn mode_port_alternates_between_the_two_registers() {
        let (_tx, rx) = sync_channel::<u8>(16);
        let overrun = Arc::new(AtomicBool::new(false));
        let (mut device, _out) = ConsoleDevice::with_input(0x10, rx, overrun);

        device.output(0xAA, 0x10 + MODE_PORT);
        device.output(0xBB, 0x10 + MODE_PORT);

        let mut val = 0;
        device.input(&mut val, 0x10 + MODE_PORT);
        assert_eq!(val, 0xAA);
        device.input(&mut val, 0x10 + MODE_PORT);
        assert_eq!(val, 0xBB);
    }

    #[test]
    fn command_reset_clears_overrun_and_enable_raises_txrdy() {
        let (tx, rx) = sync_channel(1);
        let overrun = Arc::new(AtomicBool::new(false));
        let (mut device, _out) = ConsoleDevice::with_input(0x10, rx, Arc::clone(&overrun));

        tx.send(b'a').expect("queue has room");
        overrun.store(true, Ordering::Relaxed);

        let mut val = 0;
        device.input(&mut val, 0x10 + STATUS_PORT);
        assert_ne!(val & RX_OVERRUN, 0);

        device.output(CMD_RESET | CMD_TX_ENABLE, 0x10 + CMD_PORT);
        device.input(&mut val, 0x10 + STATUS_PORT);
        assert_eq!(val & RX_OVERRUN, 0);
        assert_ne!(val & TX_RDY, 0);
    }

    #[test]
    fn wru_option_reconfigures_the_wakeup_byte() {
        use retro80_core::OptionValue;

        let mut device = ConsoleDevice::new(0);
        device
            .set_option("wru", &OptionValue::Number(0x1D))
            .expect("wru is a console option");
        assert!(device.set_option("baud", &OptionValue::Number(9600)).is_err());
    }
}
