use core::fmt;

/// Failure while assembling a transport block or RLC PDU. Callers drop the
/// PDU and log, the stack keeps running.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PduBuildErr {
    /// All subheader slots of the PDU are in use
    TooManySubheaders,
    /// Element does not fit the remaining space
    NoSpace { requested: usize, available: usize },
    /// Byte accounting of the finished PDU does not add up to its size
    SizeMismatch { expected: usize, written: usize },
    /// Data source returned more bytes than asked for
    SourceFailed { lcid: u32 },
    /// SDU longer than its length field can express
    SduTooLong { len: usize, max: usize },
}

impl fmt::Display for PduBuildErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PduBuildErr::TooManySubheaders => write!(f, "no free subheader"),
            PduBuildErr::NoSpace { requested, available } => {
                write!(f, "no space: requested {} bytes, {} available", requested, available)
            }
            PduBuildErr::SizeMismatch { expected, written } => {
                write!(f, "size mismatch: pdu is {} bytes, accounted {}", expected, written)
            }
            PduBuildErr::SourceFailed { lcid } => write!(f, "sdu source for lcid {} overran its buffer", lcid),
            PduBuildErr::SduTooLong { len, max } => write!(f, "sdu of {} bytes exceeds the {} byte length field", len, max),
        }
    }
}

impl std::error::Error for PduBuildErr {}
