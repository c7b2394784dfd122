use core::fmt;

pub const N_SRB: usize = 3;
pub const N_DRB: usize = 8;
/// Number of radio bearers; LCIDs are the dense range [0, N_RADIO_BEARERS)
pub const N_RADIO_BEARERS: usize = N_SRB + N_DRB;

pub type Lcid = u32;

/// Radio bearer identities. The LCID of a bearer equals its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RbId {
    Srb0 = 0,
    Srb1,
    Srb2,
    Drb1,
    Drb2,
    Drb3,
    Drb4,
    Drb5,
    Drb6,
    Drb7,
    Drb8,
}

impl RbId {
    pub const ALL: [RbId; N_RADIO_BEARERS] = [
        RbId::Srb0, RbId::Srb1, RbId::Srb2,
        RbId::Drb1, RbId::Drb2, RbId::Drb3, RbId::Drb4,
        RbId::Drb5, RbId::Drb6, RbId::Drb7, RbId::Drb8,
    ];

    pub fn into_raw(self) -> Lcid {
        self as Lcid
    }

    pub fn is_srb(self) -> bool {
        (self as usize) < N_SRB
    }
}

impl TryFrom<u32> for RbId {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        RbId::ALL.get(value as usize).copied().ok_or(())
    }
}

impl fmt::Display for RbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RbId::Srb0 => "SRB0",
            RbId::Srb1 => "SRB1",
            RbId::Srb2 => "SRB2",
            RbId::Drb1 => "DRB1",
            RbId::Drb2 => "DRB2",
            RbId::Drb3 => "DRB3",
            RbId::Drb4 => "DRB4",
            RbId::Drb5 => "DRB5",
            RbId::Drb6 => "DRB6",
            RbId::Drb7 => "DRB7",
            RbId::Drb8 => "DRB8",
        };
        write!(f, "{}", s)
    }
}

/// Display name for an LCID, falling back to the raw number for anything outside the bearer range
pub fn rb_name(lcid: Lcid) -> String {
    match RbId::try_from(lcid) {
        Ok(rb) => rb.to_string(),
        Err(_) => format!("LCID{}", lcid),
    }
}

/// RNTI a PDU was addressed with. Values match the MAC-LTE pcap encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RntiType {
    NoRnti = 0,
    PRnti = 1,
    RaRnti = 2,
    CRnti = 3,
    SiRnti = 4,
    SpsRnti = 5,
    MRnti = 6,
    TempCRnti = 7,
}

impl RntiType {
    pub fn into_raw(self) -> u8 {
        self as u8
    }
}

pub const SI_RNTI: u16 = 0xFFFF;
pub const P_RNTI: u16 = 0xFFFE;
