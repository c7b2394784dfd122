use std::sync::{Arc, Mutex};

use lte_core::{Rnti, RntiType, Tti};
use lte_saps::interfaces::PhyInterfaceMac;

#[derive(Debug, Clone, PartialEq)]
pub enum PhyCall {
    Prach(u32),
    Sr,
    UlSearch(RntiType, Rnti),
    DlSearch(RntiType, Rnti, Option<(Tti, Tti)>),
    UlSearchReset,
    DlSearchReset,
    SetCrnti(Rnti),
    TaRar(u32),
    Ta(u32),
    RarGrant(Tti, u32),
}

/// PHY for testing purposes. Records every call from the MAC; clones share the record.
#[derive(Clone, Default)]
pub struct MockPhy {
    calls: Arc<Mutex<Vec<PhyCall>>>,
    pub phr_db: f32,
}

impl MockPhy {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: PhyCall) {
        tracing::debug!("phy: {:?}", call);
        self.calls.lock().unwrap().push(call);
    }

    pub fn take_calls(&self) -> Vec<PhyCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Preamble of the most recent PRACH, consuming the record
    pub fn last_prach(&self) -> Option<u32> {
        self.take_calls().into_iter().rev().find_map(|c| match c {
            PhyCall::Prach(p) => Some(p),
            _ => None,
        })
    }
}

impl PhyInterfaceMac for MockPhy {
    fn send_prach(&mut self, preamble_index: u32, _target_power_dbm: f32) {
        self.push(PhyCall::Prach(preamble_index));
    }
    fn send_sr(&mut self) {
        self.push(PhyCall::Sr);
    }
    fn pdcch_ul_search(&mut self, rnti_type: RntiType, rnti: Rnti, _window: Option<(Tti, Tti)>) {
        self.push(PhyCall::UlSearch(rnti_type, rnti));
    }
    fn pdcch_dl_search(&mut self, rnti_type: RntiType, rnti: Rnti, window: Option<(Tti, Tti)>) {
        self.push(PhyCall::DlSearch(rnti_type, rnti, window));
    }
    fn pdcch_ul_search_reset(&mut self) {
        self.push(PhyCall::UlSearchReset);
    }
    fn pdcch_dl_search_reset(&mut self) {
        self.push(PhyCall::DlSearchReset);
    }
    fn set_crnti(&mut self, rnti: Rnti) {
        self.push(PhyCall::SetCrnti(rnti));
    }
    fn set_timing_adv_rar(&mut self, ta_cmd: u32) {
        self.push(PhyCall::TaRar(ta_cmd));
    }
    fn set_timing_adv(&mut self, ta_cmd: u32) {
        self.push(PhyCall::Ta(ta_cmd));
    }
    fn set_rar_grant(&mut self, tti: Tti, grant: u32) {
        self.push(PhyCall::RarGrant(tti, grant));
    }
    fn get_phr(&mut self) -> f32 {
        self.phr_db
    }
}
