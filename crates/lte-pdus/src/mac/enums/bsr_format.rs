/// 36.321 5.4.5: BSR formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsrFormat {
    /// One LCG, the only one with data
    Short,
    /// Four LCGs
    Long,
    /// One LCG, the highest priority one with data, when a long BSR does not fit
    Truncated,
}

impl core::fmt::Display for BsrFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BsrFormat::Short => write!(f, "Short"),
            BsrFormat::Long => write!(f, "Long"),
            BsrFormat::Truncated => write!(f, "Truncated"),
        }
    }
}
