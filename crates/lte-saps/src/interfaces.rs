//! Function-call interfaces between the MAC and its neighbours. The MAC runs
//! in the TTI context, so every implementation returns within bounded time.

use lte_core::{Lcid, Rnti, RntiType, Tti};

/// MAC calls into the PHY
pub trait PhyInterfaceMac: Send {
    /// Transmit a PRACH preamble in the next available PRACH occasion
    fn send_prach(&mut self, preamble_index: u32, target_power_dbm: f32);
    fn send_sr(&mut self);

    /// Look for DCIs with the given RNTI, optionally limited to a window of TTIs
    fn pdcch_ul_search(&mut self, rnti_type: RntiType, rnti: Rnti, window: Option<(Tti, Tti)>);
    fn pdcch_dl_search(&mut self, rnti_type: RntiType, rnti: Rnti, window: Option<(Tti, Tti)>);
    fn pdcch_ul_search_reset(&mut self);
    fn pdcch_dl_search_reset(&mut self);

    fn set_crnti(&mut self, rnti: Rnti);
    /// Initial timing advance from a RAR, 11 bits
    fn set_timing_adv_rar(&mut self, ta_cmd: u32);
    /// Timing advance adjustment from a TA command CE, 6 bits
    fn set_timing_adv(&mut self, ta_cmd: u32);
    /// Uplink grant carried in a RAR, 20 bits, received in `tti`
    fn set_rar_grant(&mut self, tti: Tti, grant: u32);

    /// Current power headroom in dB
    fn get_phr(&mut self) -> f32;
}

/// MAC calls into the RLC. Called from the TTI context, so calls must return quickly.
pub trait RlcInterfaceMac: Send + Sync {
    /// Bytes needed to transmit everything pending on `lcid`, headers included
    fn get_buffer_state(&self, lcid: Lcid) -> u32;
    /// Build one RLC PDU of at most `payload.len()` bytes. Returns the bytes written.
    fn read_pdu(&self, lcid: Lcid, payload: &mut [u8]) -> usize;
    fn write_pdu(&self, lcid: Lcid, payload: &[u8]);
    fn write_pdu_bcch_bch(&self, payload: &[u8]);
    fn write_pdu_bcch_dlsch(&self, payload: &[u8]);
}
