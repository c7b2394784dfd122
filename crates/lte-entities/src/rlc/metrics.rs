/// Counters of one RLC entity over a reporting period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RlcBearerMetrics {
    pub tx_sdus: u64,
    /// PDU bytes handed to the MAC, headers included
    pub tx_bytes: u64,
    pub rx_sdus: u64,
    /// PDU bytes received from the MAC
    pub rx_bytes: u64,
    pub retx_pdus: u64,
    /// SDUs or PDUs dropped: queue full, outside the window, or malformed
    pub dropped: u64,
}

impl RlcBearerMetrics {
    /// Return the counters and start a new period
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}
