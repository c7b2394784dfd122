/// 36.322 6.2.2.6: Framing Info, where the data field starts and ends relative to SDUs
/// Bits: 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FramingInfo {
    /// First byte starts an SDU, last byte ends an SDU
    #[default]
    FullSdu = 0,
    /// First byte starts an SDU, last byte does not end one
    FirstSegment = 1,
    /// First byte continues an SDU, last byte ends an SDU
    LastSegment = 2,
    /// Neither
    MiddleSegment = 3,
}

impl std::convert::TryFrom<u64> for FramingInfo {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(FramingInfo::FullSdu),
            1 => Ok(FramingInfo::FirstSegment),
            2 => Ok(FramingInfo::LastSegment),
            3 => Ok(FramingInfo::MiddleSegment),
            _ => Err(()),
        }
    }
}

impl FramingInfo {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn from_flags(starts_sdu: bool, ends_sdu: bool) -> Self {
        match (starts_sdu, ends_sdu) {
            (true, true) => FramingInfo::FullSdu,
            (true, false) => FramingInfo::FirstSegment,
            (false, true) => FramingInfo::LastSegment,
            (false, false) => FramingInfo::MiddleSegment,
        }
    }

    /// First byte of the data field is the first byte of an SDU
    pub fn starts_sdu(self) -> bool {
        self.into_raw() & 0b10 == 0
    }

    /// Last byte of the data field is the last byte of an SDU
    pub fn ends_sdu(self) -> bool {
        self.into_raw() & 0b01 == 0
    }
}

impl From<FramingInfo> for u64 {
    fn from(e: FramingInfo) -> Self { e.into_raw() }
}

impl core::fmt::Display for FramingInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FramingInfo::FullSdu => write!(f, "FullSdu"),
            FramingInfo::FirstSegment => write!(f, "FirstSegment"),
            FramingInfo::LastSegment => write!(f, "LastSegment"),
            FramingInfo::MiddleSegment => write!(f, "MiddleSegment"),
        }
    }
}
