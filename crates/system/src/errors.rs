//! Configuration and bring-up error taxonomy.

use thiserror::Error;

use retro80_core::{DeviceError, MemoryError, OptionError};

use crate::lexer::LexError;
use crate::loader::LoadError;

/// Failure anywhere between reading configuration text and a fully
/// bound system. Surfaced to the caller of `System::load_config`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Tokenizer rejected the input.
    #[error("lexical error: {0}")]
    Lexical(#[from] LexError),
    /// A statement appeared before the `system` line.
    #[error("system must be defined first")]
    MissingSystem,
    /// More than one `system` statement.
    #[error("system can only be defined once")]
    DuplicateSystem,
    /// A statement keyword was not followed by its name.
    #[error("{0} must be followed by a name")]
    ExpectedName(&'static str),
    /// Any other token mismatch.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// What the grammar required here.
        expected: &'static str,
        /// What the lexer produced.
        found: String,
    },
    /// The factory registry has no entry under this name.
    #[error("unknown {kind} type: {name}")]
    UnknownType {
        /// Component category (`system`, `cpu`, `memory`, `io`, `device`).
        kind: &'static str,
        /// The name looked up.
        name: String,
    },
    /// The system model's CPU limit was exceeded.
    #[error("too many cpus defined (limit {0})")]
    TooManyCpus(usize),
    /// A peripheral's cell width does not match its CPU's.
    #[error("cell width mismatch between cpu {cpu} and {peripheral}")]
    IncompatibleWidth {
        /// CPU instance name (or model when unnamed).
        cpu: String,
        /// Peripheral instance name.
        peripheral: String,
    },
    /// A memory region collides with an already-routed region.
    #[error("memory region {name} overlaps an existing mapping at {base:#06x}")]
    OverlappingRegion {
        /// Region instance name.
        name: String,
        /// Configured base of the colliding region.
        base: usize,
    },
    /// A module rejected one of its options.
    #[error(transparent)]
    Option(#[from] OptionError),
    /// A memory controller could not be built.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// A device faulted while binding or initializing.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// A `load=` image could not be applied.
    #[error(transparent)]
    Load(#[from] LoadError),
}
