/// CPU model selector for the 8080 family.
///
/// The execution engine branches on this tag wherever the two parts differ
/// (flag derivation, the undocumented 8085 extensions). A stored tag keeps
/// the decode table and the handler set monomorphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CpuModel {
    /// Intel 8080.
    #[default]
    I8080,
    /// Intel 8085, including the undocumented V/X flag instructions.
    I8085,
}

impl CpuModel {
    /// Returns true when this model implements an instruction gated at
    /// `required`. The 8085 is a strict superset of the 8080.
    #[must_use]
    pub const fn supports(self, required: Self) -> bool {
        match required {
            Self::I8080 => true,
            Self::I8085 => matches!(self, Self::I8085),
        }
    }

    /// Canonical display name, as used by the factory registry.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::I8080 => "I8080",
            Self::I8085 => "I8085",
        }
    }
}
