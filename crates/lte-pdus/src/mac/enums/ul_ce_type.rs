/// 36.321 Table 6.2.1-2: LCID values for UL-SCH control elements
/// Bits: 5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UlCeType {
    Phr = 26,
    CRnti = 27,
    TruncatedBsr = 28,
    ShortBsr = 29,
    LongBsr = 30,
    Padding = 31,
}

/// UL LCIDs below this value carry SDUs (or are reserved and carry a length field)
pub const UL_CE_LCID_MIN: u32 = 26;

impl std::convert::TryFrom<u64> for UlCeType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            26 => Ok(UlCeType::Phr),
            27 => Ok(UlCeType::CRnti),
            28 => Ok(UlCeType::TruncatedBsr),
            29 => Ok(UlCeType::ShortBsr),
            30 => Ok(UlCeType::LongBsr),
            31 => Ok(UlCeType::Padding),
            _ => Err(()),
        }
    }
}

impl UlCeType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    /// Fixed payload size in bytes
    pub fn payload_size(self) -> usize {
        match self {
            UlCeType::Phr => 1,
            UlCeType::CRnti => 2,
            UlCeType::TruncatedBsr => 1,
            UlCeType::ShortBsr => 1,
            UlCeType::LongBsr => 3,
            UlCeType::Padding => 0,
        }
    }
}

impl From<UlCeType> for u64 {
    fn from(e: UlCeType) -> Self { e.into_raw() }
}

impl core::fmt::Display for UlCeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UlCeType::Phr => write!(f, "PHR"),
            UlCeType::CRnti => write!(f, "C-RNTI"),
            UlCeType::TruncatedBsr => write!(f, "TruncatedBSR"),
            UlCeType::ShortBsr => write!(f, "ShortBSR"),
            UlCeType::LongBsr => write!(f, "LongBSR"),
            UlCeType::Padding => write!(f, "Padding"),
        }
    }
}
