//! System assembly for the retro80 emulation fabric.
//!
//! Builds complete machines from textual configuration: a hand-written
//! lexer and statement parser, an explicit factory registry, the
//! dependency-ordered binder, the console device, and raw-binary image
//! loading. The `retro80` binary wraps it all behind a small CLI.

/// Configuration tokenizer.
pub mod lexer;
pub use lexer::{LexError, Lexer, Token};

/// Statement parser and component specifications.
pub mod config;
pub use config::{parse, CpuSpec, DevSpec, IoSpec, MemSpec, ParsedConfig};

/// Error taxonomy for configuration and bring-up.
pub mod errors;
pub use errors::ConfigError;

/// Factory registry and width-tagged component units.
pub mod registry;
pub use registry::{CpuUnit, DevUnit, IoUnit, MemUnit, Registry};

/// The system assembler and lifecycle.
pub mod system;
pub use system::{DevEntry, IoEntry, MemEntry, System, SystemModel};

/// Console input plumbing and the UART device.
pub mod console;
pub use console::{ConsoleDevice, ConsoleMux, DEFAULT_WRU};

/// Raw-binary image loading.
pub mod loader;
pub use loader::{load_image, LoadError};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
