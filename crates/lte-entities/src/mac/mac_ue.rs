use std::sync::Arc;

use lte_config::{CfgMac, SharedConfig};
use lte_core::{HarqPid, Lcid, LteEntity, N_RADIO_BEARERS, Rnti, RntiType, Sap, Tti, rb_name};
use lte_saps::interfaces::{PhyInterfaceMac, RlcInterfaceMac};
use lte_saps::mac::{MacRaCompleteInd, MacRaProblemInd, MacSrReleaseInd, MacTaExpiredInd};
use lte_saps::phy::{DlAction, MacGrant, UlAction};
use lte_saps::{SapMsg, SapMsgInner, UpperSink};

use crate::mac::metrics::{MacCounters, MacMetrics};
use crate::mac::subcomp::bsr_proc::BsrProc;
use crate::mac::subcomp::demux::{Demux, DemuxResult};
use crate::mac::subcomp::dl_harq::DlHarq;
use crate::mac::subcomp::mux::Mux;
use crate::mac::subcomp::pcap::MacPcap;
use crate::mac::subcomp::phr_proc::PhrProc;
use crate::mac::subcomp::ra_proc::{RaCtx, RaEvent, RaProc, RaState};
use crate::mac::subcomp::sr_proc::SrProc;
use crate::mac::subcomp::ul_harq::UlHarq;
use crate::mac::{MacTimer, MacTimers};

/// Borrow the pieces the random access procedure works on
macro_rules! ra_ctx {
    ($self:ident) => {
        RaCtx {
            phy: $self.phy.as_mut(),
            rlc: $self.rlc.as_ref(),
            mux: &mut $self.mux,
            timers: &mut $self.timers,
        }
    };
}

/// UE MAC. Runs entirely in the TTI context: the PHY calls `tti_clock` once per
/// subframe, then reports grants and decoded transport blocks for that subframe.
pub struct Mac {
    self_component: LteEntity,
    config: SharedConfig,
    cfg: CfgMac,

    phy: Box<dyn PhyInterfaceMac>,
    rlc: Arc<dyn RlcInterfaceMac>,
    sink: UpperSink,

    timers: MacTimers,
    tti: Tti,
    /// 0 until random access completes
    crnti: Rnti,

    mux: Mux,
    demux: Demux,
    ul_harq: UlHarq,
    dl_harq: DlHarq,

    ra: RaProc,
    sr: SrProc,
    bsr: BsrProc,
    phr: PhrProc,

    pcap: Option<MacPcap>,
    counters: MacCounters,
}

impl Mac {
    pub fn new(config: SharedConfig, phy: Box<dyn PhyInterfaceMac>, rlc: Arc<dyn RlcInterfaceMac>, sink: UpperSink) -> Self {
        let stack_cfg = config.config();
        let cfg = stack_cfg.mac.clone();
        let crnti = config.state_read().crnti;

        let mut mac = Self {
            self_component: LteEntity::Mac,
            config,
            phy,
            rlc,
            sink,
            timers: MacTimers::new(),
            tti: Tti::default(),
            crnti,
            mux: Mux::new(),
            demux: Demux::new(),
            ul_harq: UlHarq::new(cfg.max_harq_tx, cfg.max_harq_msg3_tx),
            dl_harq: DlHarq::new(),
            ra: RaProc::new(cfg.rach.clone()),
            sr: SrProc::new(cfg.sr_trans_max),
            bsr: BsrProc::new(cfg.bsr_periodic_timer_ms, cfg.bsr_retx_timer_ms),
            phr: PhrProc::new(cfg.phr_periodic_timer_ms, cfg.phr_prohibit_timer_ms),
            pcap: None,
            counters: MacCounters::default(),
            cfg,
        };

        for bearer in stack_cfg.bearers.iter() {
            let lch = &bearer.lch;
            mac.setup_lcid(bearer.lcid, lch.lcg, lch.priority, lch.pbr, lch.bucket_size_duration_ms);
        }
        if mac.crnti != 0 {
            tracing::info!("starting with c-rnti 0x{:04x}", mac.crnti);
            mac.search_crnti();
        }
        mac
    }

    pub fn crnti(&self) -> Rnti {
        self.crnti
    }

    pub fn tti(&self) -> Tti {
        self.tti
    }

    pub fn ra_state(&self) -> RaState {
        self.ra.state()
    }

    pub fn is_timer_running(&self, timer: MacTimer) -> bool {
        self.timers.is_running(timer)
    }

    pub fn start_pcap(&mut self, pcap: MacPcap) {
        self.pcap = Some(pcap);
    }

    pub fn stop_pcap(&mut self) -> Option<MacPcap> {
        self.pcap.take()
    }

    fn send_rrc(&self, msg: SapMsgInner) {
        tracing::debug!("-> RRC {}", msg);
        self.sink.deliver(SapMsg::new(Sap::RrcSap, self.self_component, LteEntity::Rrc, self.tti, msg));
    }

    fn search_crnti(&mut self) {
        self.phy.set_crnti(self.crnti);
        self.phy.pdcch_ul_search(RntiType::CRnti, self.crnti, None);
        self.phy.pdcch_dl_search(RntiType::CRnti, self.crnti, None);
    }

    /// Map a logical channel to its prioritization parameters and LCG
    pub fn setup_lcid(&mut self, lcid: Lcid, lcg: u8, priority: u32, pbr: Option<u32>, bsd_ms: u32) {
        if lcid as usize >= N_RADIO_BEARERS {
            tracing::warn!("setup_lcid: lcid {} out of range", lcid);
            return;
        }
        tracing::info!("setup {} lcg {} priority {}", rb_name(lcid), lcg, priority);
        self.mux.set_priority(lcid, priority, pbr, bsd_ms);
        self.bsr.setup_lcg(lcid, lcg, priority);
    }

    /// Apply a new MAC-MainConfig. Running timers keep their old duration.
    pub fn reconfigure(&mut self, cfg: CfgMac) {
        tracing::info!("MAC reconfigured");
        self.ul_harq.set_config(cfg.max_harq_tx, cfg.max_harq_msg3_tx);
        self.bsr.set_config(cfg.bsr_periodic_timer_ms, cfg.bsr_retx_timer_ms);
        self.phr.set_config(cfg.phr_periodic_timer_ms, cfg.phr_prohibit_timer_ms, &mut self.timers);
        self.sr.set_config(cfg.sr_trans_max);
        self.ra.set_config(cfg.rach.clone());
        if cfg.time_alignment_timer_ms == 0 {
            self.timers.stop(MacTimer::TimeAlignment);
        }
        self.cfg = cfg;
    }

    /// Back to the state after construction, as on radio link failure. Logical
    /// channel configuration is kept.
    pub fn reset(&mut self) {
        tracing::info!("MAC reset");
        self.timers.stop_all();
        self.ul_harq.reset();
        self.dl_harq.reset();
        self.mux.reset();
        self.ra.reset();
        self.sr.reset();
        self.bsr.reset();
        self.phr.reset();
        self.crnti = 0;
        self.config.state_write().crnti = 0;
        self.phy.pdcch_ul_search_reset();
        self.phy.pdcch_dl_search_reset();
    }

    /// Counters since the previous call
    pub fn get_metrics(&mut self) -> MacMetrics {
        let ul_buffer = (0..N_RADIO_BEARERS as Lcid).map(|lcid| self.rlc.get_buffer_state(lcid)).sum();
        self.counters.take(ul_buffer)
    }

    /// Start of subframe `tti`. Drives the timers and the MAC procedures.
    pub fn tti_clock(&mut self, tti: Tti) {
        self.tti = tti;
        self.counters.nof_ttis += 1;

        for timer in self.timers.tick() {
            self.timer_expired(timer);
        }

        self.mux.update_tokens();
        self.bsr.step(self.rlc.as_ref());

        // Connection request from RRC while no C-RNTI is assigned
        if self.crnti == 0 && self.ra.is_idle() && self.mux.is_pending_ccch_sdu(self.rlc.as_ref()) {
            self.ra.start(0);
        }

        if self.bsr.need_to_send_sr() {
            if self.crnti != 0 {
                self.sr.start();
            } else if self.ra.is_idle() {
                self.ra.start(0);
            }
        }

        if self.ra.is_idle() {
            if let Some(sr_count) = self.sr.step(self.phy.as_mut()) {
                self.send_rrc(SapMsgInner::MacSrReleaseInd(MacSrReleaseInd { sr_count }));
                self.ra.start(self.crnti);
            }
        }

        let event = {
            let mut ctx = ra_ctx!(self);
            self.ra.step(tti, &mut ctx)
        };
        if let Some(event) = event {
            self.ra_event(event);
        }
    }

    fn timer_expired(&mut self, timer: MacTimer) {
        match timer {
            MacTimer::TimeAlignment => {
                tracing::info!("time alignment timer expired, uplink out of sync");
                self.ul_harq.reset();
                self.dl_harq.reset();
                self.sr.reset();
                self.send_rrc(SapMsgInner::MacTaExpiredInd(MacTaExpiredInd {}));
            }
            MacTimer::ContentionResolution => {
                let mut ctx = ra_ctx!(self);
                self.ra.contention_failed(&mut ctx);
            }
            MacTimer::BsrPeriodic | MacTimer::BsrRetx => self.bsr.timer_expired(timer, self.rlc.as_ref()),
            MacTimer::PhrPeriodic | MacTimer::PhrProhibit => self.phr.timer_expired(timer),
        }
    }

    fn ra_event(&mut self, event: RaEvent) {
        match event {
            RaEvent::Completed { crnti } => {
                let was_connected = self.crnti != 0;
                self.crnti = crnti;
                self.config.state_write().crnti = crnti;
                if !was_connected {
                    self.search_crnti();
                }
                self.send_rrc(SapMsgInner::MacRaCompleteInd(MacRaCompleteInd { crnti }));
            }
            RaEvent::Problem { preamble_tx_count } => {
                self.send_rrc(SapMsgInner::MacRaProblemInd(MacRaProblemInd { preamble_tx_count }));
            }
        }
    }

    fn restart_ta_timer(&mut self) {
        if self.cfg.time_alignment_timer_ms > 0 {
            self.timers.start(MacTimer::TimeAlignment, self.cfg.time_alignment_timer_ms);
        }
    }

    /// Transport block for a new transmission, None when nothing could be built
    fn build_ul_pdu(&mut self, grant: &MacGrant) -> Option<Vec<u8>> {
        if grant.is_from_rar || grant.rnti_type == RntiType::TempCRnti {
            return self.mux.msg3_get(grant.tbs, self.rlc.as_ref(), &mut self.bsr, &mut self.timers);
        }
        let phr = if self.phr.generate_phr_on_ul_grant(&mut self.timers) { Some(self.phy.get_phr()) } else { None };
        match self.mux.pdu_get(grant.tbs, self.rlc.as_ref(), &mut self.bsr, &mut self.timers, phr) {
            Ok(pdu) => Some(pdu),
            Err(e) => {
                tracing::error!("UL PDU for a {} byte grant failed: {}", grant.tbs, e);
                None
            }
        }
    }

    fn ul_tx_done(&mut self, action: &UlAction, is_msg3: bool) {
        self.counters.tx_errors += self.ul_harq.take_nof_failed();
        if !action.tx_enabled {
            return;
        }
        self.counters.tx_pkts += 1;
        self.counters.tx_bits += action.payload.len() as u64 * 8;
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.write_ul_crnti(&action.payload, action.rnti, action.current_tx_nb, self.tti);
        }
        if is_msg3 && action.current_tx_nb == 0 {
            self.ra.msg3_transmitted(&action.payload, &mut self.timers);
        }
    }

    /// Uplink grant decoded on the PDCCH or received in a RAR
    pub fn new_grant_ul(&mut self, grant: MacGrant) -> UlAction {
        let needs_new_data = self.ul_harq.needs_new_data(&grant);

        if grant.rnti_type == RntiType::CRnti && self.ra.in_contention_resolution() {
            let event = {
                let mut ctx = ra_ctx!(self);
                self.ra.pdcch_to_crnti(needs_new_data, &mut ctx)
            };
            if let Some(event) = event {
                self.ra_event(event);
            }
        }

        let is_msg3 = grant.is_from_rar || grant.rnti_type == RntiType::TempCRnti;
        let payload = if needs_new_data {
            let Some(pdu) = self.build_ul_pdu(&grant) else {
                return UlAction::no_tx();
            };
            if self.bsr.take_sr_cancel() {
                self.sr.reset();
            }
            Some(pdu)
        } else {
            None
        };

        let action = self.ul_harq.new_grant(&grant, payload);
        self.ul_tx_done(&action, is_msg3);
        action
    }

    /// Uplink grant with its PHICH feedback in the same subframe
    pub fn new_grant_ul_ack(&mut self, grant: MacGrant, ack: bool) -> UlAction {
        self.ul_harq.set_ack(grant.pid, ack);
        self.new_grant_ul(grant)
    }

    /// PHICH feedback without a grant
    pub fn harq_recv(&mut self, pid: HarqPid, ack: bool) -> UlAction {
        let action = self.ul_harq.harq_recv(pid, ack);
        // Always a retransmission
        self.ul_tx_done(&action, false);
        action
    }

    /// Downlink assignment decoded on the PDCCH
    pub fn new_grant_dl(&mut self, grant: MacGrant) -> DlAction {
        match grant.rnti_type {
            RntiType::RaRnti => {
                if !self.ra.is_rar_rnti(grant.rnti) {
                    tracing::debug!("<- DL assignment for unexpected ra-rnti {}", grant.rnti);
                    return DlAction::default();
                }
                DlAction {
                    decode_enabled: true,
                    default_ack: false,
                    generate_ack: false,
                    pid: grant.pid,
                    rv: grant.rv,
                    tbs: grant.tbs,
                }
            }
            _ => self.dl_harq.new_grant(&grant),
        }
    }

    /// Result of decoding the transport block of a DL assignment
    pub fn tb_decoded(&mut self, grant: &MacGrant, crc_ok: bool, payload: &[u8]) {
        if crc_ok {
            self.counters.rx_pkts += 1;
            self.counters.rx_bits += payload.len() as u64 * 8;
        } else {
            self.counters.rx_errors += 1;
        }

        match grant.rnti_type {
            RntiType::RaRnti => {
                if let Some(pcap) = self.pcap.as_mut() {
                    pcap.write_dl_ranti(payload, grant.rnti, crc_ok, self.tti);
                }
                if !crc_ok {
                    return;
                }
                let accepted = {
                    let mut ctx = ra_ctx!(self);
                    self.ra.rar_received(payload, &mut ctx)
                };
                if accepted {
                    self.restart_ta_timer();
                }
            }
            RntiType::SiRnti => {
                if let Some(pcap) = self.pcap.as_mut() {
                    pcap.write_dl_sirnti(payload, crc_ok, self.tti);
                }
                if self.dl_harq.tb_decoded(grant.pid, grant.rnti_type, crc_ok) {
                    self.rlc.write_pdu_bcch_dlsch(payload);
                }
            }
            RntiType::TempCRnti => {
                if let Some(pcap) = self.pcap.as_mut() {
                    pcap.write_dl_crnti(payload, grant.rnti, crc_ok, self.tti);
                }
                if !self.dl_harq.tb_decoded(grant.pid, grant.rnti_type, crc_ok) {
                    return;
                }
                let ra = &self.ra;
                let mut foreign = false;
                let result = self.demux.push_pdu_temp_crnti(payload, self.rlc.as_ref(), |id| {
                    let ours = ra.matches_contention_id(id);
                    foreign = !ours;
                    ours
                });
                if let Some(result) = result {
                    self.apply_dl_ces(&result);
                    if self.ra.in_contention_resolution() {
                        let event = {
                            let mut ctx = ra_ctx!(self);
                            self.ra.contention_resolved(&mut ctx)
                        };
                        self.ra_event(event);
                    }
                } else if foreign {
                    let mut ctx = ra_ctx!(self);
                    self.ra.contention_failed(&mut ctx);
                }
            }
            RntiType::CRnti | RntiType::SpsRnti => {
                if let Some(pcap) = self.pcap.as_mut() {
                    pcap.write_dl_crnti(payload, grant.rnti, crc_ok, self.tti);
                }
                if !self.dl_harq.tb_decoded(grant.pid, grant.rnti_type, crc_ok) {
                    return;
                }
                if let Some(result) = self.demux.push_pdu(payload, self.rlc.as_ref()) {
                    self.apply_dl_ces(&result);
                }
            }
            other => tracing::warn!("<- DL transport block for unsupported {:?}", other),
        }
    }

    fn apply_dl_ces(&mut self, result: &DemuxResult) {
        if let Some(ta) = result.ta_cmd {
            tracing::debug!("<- TA command {}", ta);
            self.phy.set_timing_adv(ta as u32);
            self.restart_ta_timer();
        }
    }

    /// MIB decoded on the BCH
    pub fn bch_decoded_ok(&mut self, payload: &[u8]) {
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.write_dl_bch(payload, true, self.tti);
        }
        self.rlc.write_pdu_bcch_bch(payload);
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::Receiver;
    use lte_config::StackConfig;
    use lte_core::debug;
    use lte_pdus::mac::pdus::rar_pdu::{RarPdu, RarResponse};
    use lte_pdus::mac::pdus::sch_pdu_builder::SchPduBuilder;

    use super::*;
    use crate::mac::subcomp::fake_phy::{FakePhy, PhyCall};
    use crate::mac::subcomp::fake_rlc::FakeRlc;

    struct SharedPhy(Arc<std::sync::Mutex<FakePhy>>);

    impl PhyInterfaceMac for SharedPhy {
        fn send_prach(&mut self, preamble_index: u32, power: f32) {
            self.0.lock().unwrap().send_prach(preamble_index, power)
        }
        fn send_sr(&mut self) {
            self.0.lock().unwrap().send_sr()
        }
        fn pdcch_ul_search(&mut self, t: RntiType, rnti: Rnti, w: Option<(Tti, Tti)>) {
            self.0.lock().unwrap().pdcch_ul_search(t, rnti, w)
        }
        fn pdcch_dl_search(&mut self, t: RntiType, rnti: Rnti, w: Option<(Tti, Tti)>) {
            self.0.lock().unwrap().pdcch_dl_search(t, rnti, w)
        }
        fn pdcch_ul_search_reset(&mut self) {
            self.0.lock().unwrap().pdcch_ul_search_reset()
        }
        fn pdcch_dl_search_reset(&mut self) {
            self.0.lock().unwrap().pdcch_dl_search_reset()
        }
        fn set_crnti(&mut self, rnti: Rnti) {
            self.0.lock().unwrap().set_crnti(rnti)
        }
        fn set_timing_adv_rar(&mut self, ta: u32) {
            self.0.lock().unwrap().set_timing_adv_rar(ta)
        }
        fn set_timing_adv(&mut self, ta: u32) {
            self.0.lock().unwrap().set_timing_adv(ta)
        }
        fn set_rar_grant(&mut self, tti: Tti, grant: u32) {
            self.0.lock().unwrap().set_rar_grant(tti, grant)
        }
        fn get_phr(&mut self) -> f32 {
            self.0.lock().unwrap().get_phr()
        }
    }

    struct Env {
        mac: Mac,
        phy: Arc<std::sync::Mutex<FakePhy>>,
        rlc: Arc<FakeRlc>,
        rx: Receiver<SapMsg>,
        tti: Tti,
    }

    impl Env {
        fn new(cfg: StackConfig) -> Self {
            let phy = Arc::new(std::sync::Mutex::new(FakePhy::default()));
            let rlc = Arc::new(FakeRlc::default());
            let (tx, rx) = crossbeam_channel::bounded(16);
            let mac = Mac::new(
                SharedConfig::from_config(cfg),
                Box::new(SharedPhy(phy.clone())),
                rlc.clone(),
                UpperSink::new(tx),
            );
            Env { mac, phy, rlc, rx, tti: Tti::new(0) }
        }

        fn clock(&mut self) {
            self.tti = self.tti.add_ttis(1);
            self.mac.tti_clock(self.tti);
        }

        fn calls(&self) -> Vec<PhyCall> {
            self.phy.lock().unwrap().take()
        }

        fn grant(&self, rnti_type: RntiType, rnti: Rnti, tbs: usize) -> MacGrant {
            MacGrant { rnti, rnti_type, ndi: true, tbs, rv: 0, pid: 0, tti: self.tti, is_from_rar: false }
        }
    }

    fn run_until_prach(env: &mut Env) -> u32 {
        for _ in 0..10 {
            env.clock();
            if let Some(PhyCall::Prach(p)) = env.calls().into_iter().find(|c| matches!(c, PhyCall::Prach(_))) {
                return p;
            }
        }
        panic!("no PRACH sent");
    }

    #[test]
    fn test_random_access_through_mac() {
        debug::setup_logging_verbose();
        let mut env = Env::new(StackConfig::default());
        env.rlc.set_pending(0, 6);

        let preamble = run_until_prach(&mut env);
        env.clock();
        let ra_rnti = env.mac.ra.ra_rnti();

        let rar = RarPdu {
            backoff_indicator: None,
            responses: vec![RarResponse { rapid: preamble as u8, ta_cmd: 3, grant: 0x1234, temp_crnti: 0x4601 }],
        };
        let g = env.grant(RntiType::RaRnti, ra_rnti, 7);
        assert!(env.mac.new_grant_dl(g).decode_enabled);
        env.mac.tb_decoded(&g, true, &rar.to_bytes(7).unwrap());
        assert_eq!(env.mac.ra_state(), RaState::ContentionResolution);

        let mut msg3_grant = env.grant(RntiType::TempCRnti, 0x4601, 7);
        msg3_grant.is_from_rar = true;
        let action = env.mac.new_grant_ul(msg3_grant);
        assert!(action.tx_enabled);
        assert_eq!(action.payload, vec![0x00, 0, 0, 0, 0, 0, 0]);
        assert!(env.mac.is_timer_running(MacTimer::ContentionResolution));

        // Contention resolution identity echoing the CCCH SDU
        let mut b = SchPduBuilder::new_dl(10);
        b.set_con_res_id(0).unwrap();
        let dl = b.write().unwrap();
        let g = env.grant(RntiType::TempCRnti, 0x4601, 10);
        assert!(env.mac.new_grant_dl(g).decode_enabled);
        env.mac.tb_decoded(&g, true, &dl);

        assert_eq!(env.mac.crnti(), 0x4601);
        assert_eq!(env.mac.ra_state(), RaState::Idle);
        let msg = env.rx.try_recv().unwrap();
        assert!(matches!(msg.msg, SapMsgInner::MacRaCompleteInd(MacRaCompleteInd { crnti: 0x4601 })));
        assert!(env.calls().contains(&PhyCall::SetCrnti(0x4601)));
    }

    #[test]
    fn test_foreign_contention_identity() {
        debug::setup_logging_verbose();
        let mut env = Env::new(StackConfig::default());
        env.rlc.set_pending(0, 6);
        let preamble = run_until_prach(&mut env);
        env.clock();
        let rar = RarPdu {
            backoff_indicator: None,
            responses: vec![RarResponse { rapid: preamble as u8, ta_cmd: 3, grant: 0x1234, temp_crnti: 0x4601 }],
        };
        let g = env.grant(RntiType::RaRnti, env.mac.ra.ra_rnti(), 7);
        env.mac.tb_decoded(&g, true, &rar.to_bytes(7).unwrap());
        let mut msg3_grant = env.grant(RntiType::TempCRnti, 0x4601, 7);
        msg3_grant.is_from_rar = true;
        env.mac.new_grant_ul(msg3_grant);

        let mut b = SchPduBuilder::new_dl(10);
        b.set_con_res_id(0xdead).unwrap();
        let dl = b.write().unwrap();
        let g = env.grant(RntiType::TempCRnti, 0x4601, 10);
        env.mac.new_grant_dl(g);
        env.mac.tb_decoded(&g, true, &dl);

        assert_eq!(env.mac.crnti(), 0);
        assert_eq!(env.mac.ra_state(), RaState::ResponseError);
        assert!(!env.mac.is_timer_running(MacTimer::ContentionResolution));
    }

    #[test]
    fn test_sr_then_grant() {
        debug::setup_logging_verbose();
        let mut cfg = StackConfig::default();
        cfg.mac.sr_trans_max = 2;
        let state = lte_config::StackState { crnti: 0x46, rrc_connected: true };
        let phy = Arc::new(std::sync::Mutex::new(FakePhy::default()));
        let rlc = Arc::new(FakeRlc::default());
        let (tx, rx) = crossbeam_channel::bounded(16);
        let mut mac = Mac::new(
            SharedConfig::from_parts(cfg, state),
            Box::new(SharedPhy(phy.clone())),
            rlc.clone(),
            UpperSink::new(tx),
        );
        mac.setup_lcid(3, 1, 2, None, 0);
        phy.lock().unwrap().take();

        rlc.set_pending(3, 100);
        mac.tti_clock(Tti::new(1));
        mac.tti_clock(Tti::new(2));
        assert_eq!(phy.lock().unwrap().take(), vec![PhyCall::Sr, PhyCall::Sr]);

        // Grant with a regular BSR cancels the SR
        let g = MacGrant { rnti: 0x46, rnti_type: RntiType::CRnti, ndi: true, tbs: 40, rv: 0, pid: 1, tti: Tti::new(2), is_from_rar: false };
        let action = mac.new_grant_ul(g);
        assert!(action.tx_enabled);
        assert_eq!(action.payload.len(), 40);
        mac.tti_clock(Tti::new(3));
        assert!(phy.lock().unwrap().take().iter().all(|c| *c != PhyCall::Sr));
        assert!(rx.try_recv().is_err());

        let metrics = mac.get_metrics();
        assert_eq!(metrics.tx_pkts, 1);
        // 40 bytes: short BSR and PHR take two each, the last SDU subheader one
        assert_eq!(metrics.ul_buffer, 100 - 35);
    }

    #[test]
    fn test_sr_release_starts_random_access() {
        debug::setup_logging_verbose();
        let mut cfg = StackConfig::default();
        cfg.mac.sr_trans_max = 1;
        let state = lte_config::StackState { crnti: 0x46, rrc_connected: true };
        let phy = Arc::new(std::sync::Mutex::new(FakePhy::default()));
        let rlc = Arc::new(FakeRlc::default());
        let (tx, rx) = crossbeam_channel::bounded(16);
        let mut mac = Mac::new(
            SharedConfig::from_parts(cfg, state),
            Box::new(SharedPhy(phy.clone())),
            rlc.clone(),
            UpperSink::new(tx),
        );
        mac.setup_lcid(3, 1, 2, None, 0);
        rlc.set_pending(3, 10);
        mac.tti_clock(Tti::new(1));
        mac.tti_clock(Tti::new(2));
        let msg = rx.try_recv().unwrap();
        assert!(matches!(msg.msg, SapMsgInner::MacSrReleaseInd(MacSrReleaseInd { sr_count: 1 })));
        assert!(phy.lock().unwrap().take().iter().any(|c| matches!(c, PhyCall::Prach(_))));
    }

    #[test]
    fn test_dl_data_and_ta_command() {
        debug::setup_logging_verbose();
        let mut cfg = StackConfig::default();
        cfg.mac.time_alignment_timer_ms = 500;
        let mut env = Env::new(cfg);
        env.mac.crnti = 0x46;

        let mut b = SchPduBuilder::new_dl(20);
        b.set_ta_cmd(33).unwrap();
        b.add_sdu(1, &[1, 2, 3, 4]).unwrap();
        let pdu = b.write().unwrap();

        let g = env.grant(RntiType::CRnti, 0x46, 20);
        assert!(env.mac.new_grant_dl(g).decode_enabled);
        env.mac.tb_decoded(&g, true, &pdu);
        assert_eq!(env.rlc.received.lock().unwrap()[0], (1, vec![1, 2, 3, 4]));
        assert!(env.calls().contains(&PhyCall::Ta(33)));
        assert!(env.mac.is_timer_running(MacTimer::TimeAlignment));

        // Duplicate is acked without decoding
        let a = env.mac.new_grant_dl(g);
        assert!(!a.decode_enabled && a.default_ack);

        for _ in 0..500 {
            env.clock();
        }
        let msg = env.rx.try_recv().unwrap();
        assert!(matches!(msg.msg, SapMsgInner::MacTaExpiredInd(_)));
    }

    #[test]
    fn test_reset() {
        debug::setup_logging_verbose();
        let mut env = Env::new(StackConfig::default());
        env.rlc.set_pending(0, 6);
        run_until_prach(&mut env);
        env.mac.reset();
        assert_eq!(env.mac.ra_state(), RaState::Idle);
        assert_eq!(env.mac.crnti(), 0);
        assert!(env.calls().contains(&PhyCall::SearchReset));
    }
}
