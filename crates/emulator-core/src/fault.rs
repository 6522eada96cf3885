use thiserror::Error;

/// Memory access failure raised by the checked `get`/`set` accessors.
///
/// The engine itself stays on the unchecked `read`/`write` path and never
/// sees these; they exist for tools (loader, monitor) that want a hard
/// error instead of a quiet miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AccessError {
    /// No memory region is mapped at the given index.
    #[error("invalid memory location {0:#06x}")]
    Unmapped(usize),
    /// The location is mapped read-only.
    #[error("write to read-only location {0:#06x}")]
    ReadOnly(usize),
}

/// Fault reported by a device during initialization.
///
/// Aborts system bring-up; never raised during steady-state execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device {device}: {message}")]
pub struct DeviceError {
    /// Name of the faulting device.
    pub device: String,
    /// Human-readable fault description.
    pub message: String,
}

impl DeviceError {
    /// Builds a device fault for `device` with the given description.
    #[must_use]
    pub fn new(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            message: message.into(),
        }
    }
}

/// Rejected module configuration option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// The option name is not recognized by the module.
    #[error("unknown option: {0}")]
    Unknown(String),
    /// The option exists but the supplied value is unusable.
    #[error("invalid value for option {name}: {value}")]
    InvalidValue {
        /// Option name.
        name: String,
        /// Offending value, rendered as text.
        value: String,
    },
}
