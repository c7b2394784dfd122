use lte_core::Rnti;

/// Random access procedure completed, C-RNTI confirmed
#[derive(Debug)]
pub struct MacRaCompleteInd {
    pub crnti: Rnti,
}

/// Preamble transmission counter exceeded preamble_trans_max
#[derive(Debug)]
pub struct MacRaProblemInd {
    pub preamble_tx_count: u32,
}

/// SR counter reached sr_trans_max. PUCCH/SRS are released and random access is initiated.
#[derive(Debug)]
pub struct MacSrReleaseInd {
    pub sr_count: u32,
}

/// Time alignment timer expired, uplink is no longer synchronized
#[derive(Debug)]
pub struct MacTaExpiredInd {}
