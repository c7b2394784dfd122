/// 36.321 Table 6.2.1-1: LCID values for DL-SCH control elements
/// Bits: 5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DlCeType {
    ContentionResolutionId = 28,
    TaCommand = 29,
    Drx = 30,
    Padding = 31,
}

/// DL LCIDs below this value carry SDUs (or are reserved and carry a length field)
pub const DL_CE_LCID_MIN: u32 = 28;

impl std::convert::TryFrom<u64> for DlCeType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            28 => Ok(DlCeType::ContentionResolutionId),
            29 => Ok(DlCeType::TaCommand),
            30 => Ok(DlCeType::Drx),
            31 => Ok(DlCeType::Padding),
            _ => Err(()),
        }
    }
}

impl DlCeType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    /// Fixed payload size in bytes
    pub fn payload_size(self) -> usize {
        match self {
            DlCeType::ContentionResolutionId => 6,
            DlCeType::TaCommand => 1,
            DlCeType::Drx => 0,
            DlCeType::Padding => 0,
        }
    }
}

impl From<DlCeType> for u64 {
    fn from(e: DlCeType) -> Self { e.into_raw() }
}

impl core::fmt::Display for DlCeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DlCeType::ContentionResolutionId => write!(f, "ConResId"),
            DlCeType::TaCommand => write!(f, "TA"),
            DlCeType::Drx => write!(f, "DRX"),
            DlCeType::Padding => write!(f, "Padding"),
        }
    }
}
