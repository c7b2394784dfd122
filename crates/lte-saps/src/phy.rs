use lte_core::{HarqPid, RntiType, Rnti, Tti};

/// Downlink or uplink grant decoded by the PHY, or given by a RAR
#[derive(Debug, Clone, Copy)]
pub struct MacGrant {
    pub rnti: Rnti,
    pub rnti_type: RntiType,
    pub ndi: bool,
    /// Transport block size in bytes
    pub tbs: usize,
    pub rv: u32,
    pub pid: HarqPid,
    pub tti: Tti,
    /// Msg3 grant from a random access response
    pub is_from_rar: bool,
}

/// What the PHY does with an uplink grant in this TTI
#[derive(Debug, Clone, Default)]
pub struct UlAction {
    pub tx_enabled: bool,
    pub expect_ack: bool,
    pub rnti: Rnti,
    pub rv: u32,
    /// Transmission number of this transport block, 0 for the first transmission
    pub current_tx_nb: u32,
    pub payload: Vec<u8>,
}

impl UlAction {
    pub fn no_tx() -> Self {
        Self::default()
    }
}

/// What the PHY does with a downlink assignment in this TTI
#[derive(Debug, Clone, Copy, Default)]
pub struct DlAction {
    pub decode_enabled: bool,
    /// ACK to report without decoding (duplicate of already received data)
    pub default_ack: bool,
    pub generate_ack: bool,
    pub pid: HarqPid,
    pub rv: u32,
    pub tbs: usize,
}
