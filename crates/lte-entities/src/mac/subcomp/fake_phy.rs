use lte_core::{Rnti, RntiType, Tti};
use lte_saps::interfaces::PhyInterfaceMac;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PhyCall {
    Prach(u32),
    Sr,
    UlSearch(RntiType, Rnti),
    DlSearch(RntiType, Rnti, Option<(Tti, Tti)>),
    SearchReset,
    SetCrnti(Rnti),
    TaRar(u32),
    Ta(u32),
    RarGrant(u32),
}

/// PHY stand-in recording every call
#[derive(Default)]
pub(crate) struct FakePhy {
    pub calls: Vec<PhyCall>,
}

impl FakePhy {
    pub fn take(&mut self) -> Vec<PhyCall> {
        std::mem::take(&mut self.calls)
    }
}

impl PhyInterfaceMac for FakePhy {
    fn send_prach(&mut self, preamble_index: u32, _target_power_dbm: f32) {
        self.calls.push(PhyCall::Prach(preamble_index));
    }
    fn send_sr(&mut self) {
        self.calls.push(PhyCall::Sr);
    }
    fn pdcch_ul_search(&mut self, rnti_type: RntiType, rnti: Rnti, _window: Option<(Tti, Tti)>) {
        self.calls.push(PhyCall::UlSearch(rnti_type, rnti));
    }
    fn pdcch_dl_search(&mut self, rnti_type: RntiType, rnti: Rnti, window: Option<(Tti, Tti)>) {
        self.calls.push(PhyCall::DlSearch(rnti_type, rnti, window));
    }
    fn pdcch_ul_search_reset(&mut self) {
        self.calls.push(PhyCall::SearchReset);
    }
    fn pdcch_dl_search_reset(&mut self) {
        self.calls.push(PhyCall::SearchReset);
    }
    fn set_crnti(&mut self, rnti: Rnti) {
        self.calls.push(PhyCall::SetCrnti(rnti));
    }
    fn set_timing_adv_rar(&mut self, ta_cmd: u32) {
        self.calls.push(PhyCall::TaRar(ta_cmd));
    }
    fn set_timing_adv(&mut self, ta_cmd: u32) {
        self.calls.push(PhyCall::Ta(ta_cmd));
    }
    fn set_rar_grant(&mut self, _tti: Tti, grant: u32) {
        self.calls.push(PhyCall::RarGrant(grant));
    }
    fn get_phr(&mut self) -> f32 {
        10.0
    }
}
