use core::fmt;

use lte_config::CfgRach;
use lte_core::{Direction, Rnti, RntiType, Tti, debug};
use lte_pdus::mac::pdus::rar_pdu::RarPdu;
use lte_pdus::mac::pdus::sch_pdu::SchPdu;
use lte_saps::interfaces::{PhyInterfaceMac, RlcInterfaceMac};

use crate::mac::subcomp::mux::Mux;
use crate::mac::{MacTimer, MacTimers};

/// 36.321 Table 7.2-1, backoff parameter in ms per backoff indicator
const BACKOFF_TABLE_MS: [u32; 16] = [0, 10, 20, 30, 40, 60, 80, 120, 160, 240, 320, 480, 960, 960, 960, 960];

/// The RAR window starts this many subframes after the PRACH subframe
const RAR_WINDOW_OFFSET: u32 = 3;

const PREAMBLE_INITIAL_RX_TARGET_POWER_DBM: f32 = -104.0;
const POWER_RAMPING_STEP_DB: f32 = 4.0;

/// MAC subheader of the CCCH SDU, for preamble group selection
const MSG3_HEADER_LEN: u32 = 1;

/// Bytes of the CCCH SDU echoed in the UE contention resolution identity
const CONTENTION_ID_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaState {
    Idle,
    ResourceSelection,
    PdcchSetup,
    ResponseReception,
    ResponseError,
    Backoff,
    ContentionResolution,
}

impl fmt::Display for RaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaState::Idle => write!(f, "Idle"),
            RaState::ResourceSelection => write!(f, "ResourceSelection"),
            RaState::PdcchSetup => write!(f, "PdcchSetup"),
            RaState::ResponseReception => write!(f, "ResponseReception"),
            RaState::ResponseError => write!(f, "ResponseError"),
            RaState::Backoff => write!(f, "Backoff"),
            RaState::ContentionResolution => write!(f, "ContentionResolution"),
        }
    }
}

/// Outcome of a random access procedure, for RRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaEvent {
    Completed { crnti: Rnti },
    Problem { preamble_tx_count: u32 },
}

/// What the procedure needs from the rest of the MAC
pub struct RaCtx<'a> {
    pub phy: &'a mut dyn PhyInterfaceMac,
    pub rlc: &'a dyn RlcInterfaceMac,
    pub mux: &'a mut Mux,
    pub timers: &'a mut MacTimers,
}

/// Contention based random access, 36.321 5.1
pub struct RaProc {
    cfg: CfgRach,
    state: RaState,
    tti: Tti,

    preamble_tx_counter: u32,
    preamble_index: u32,
    /// Preamble group, fixed once a Msg3 was built
    group_b: Option<bool>,
    ra_rnti: Rnti,
    window_end: Tti,
    backoff_param_ms: u32,
    backoff_until: Tti,

    temp_crnti: Rnti,
    /// C-RNTI of a UE in RRC_CONNECTED, sent in Msg3 as a C-RNTI CE
    crnti: Rnti,
    contention_id: Option<u64>,
}

impl RaProc {
    pub fn new(cfg: CfgRach) -> Self {
        RaProc {
            cfg,
            state: RaState::Idle,
            tti: Tti::default(),
            preamble_tx_counter: 0,
            preamble_index: 0,
            group_b: None,
            ra_rnti: 0,
            window_end: Tti::default(),
            backoff_param_ms: 0,
            backoff_until: Tti::default(),
            temp_crnti: 0,
            crnti: 0,
            contention_id: None,
        }
    }

    pub fn set_config(&mut self, cfg: CfgRach) {
        self.cfg = cfg;
    }

    pub fn state(&self) -> RaState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RaState::Idle
    }

    pub fn preamble_index(&self) -> u32 {
        self.preamble_index
    }

    pub fn preamble_tx_counter(&self) -> u32 {
        self.preamble_tx_counter
    }

    pub fn temp_crnti(&self) -> Rnti {
        self.temp_crnti
    }

    pub fn ra_rnti(&self) -> Rnti {
        self.ra_rnti
    }

    pub fn reset(&mut self) {
        if self.state != RaState::Idle {
            tracing::info!("random access aborted in state {}", self.state);
        }
        self.state = RaState::Idle;
        self.group_b = None;
        self.temp_crnti = 0;
        self.contention_id = None;
    }

    /// Initiate random access. `crnti` is nonzero in RRC_CONNECTED.
    pub fn start(&mut self, crnti: Rnti) {
        if self.state != RaState::Idle {
            tracing::debug!("random access already running ({})", self.state);
            return;
        }
        tracing::info!("random access initiated{}", if crnti != 0 { " in connected mode" } else { "" });
        self.preamble_tx_counter = 1;
        self.backoff_param_ms = 0;
        self.group_b = None;
        self.contention_id = None;
        self.temp_crnti = 0;
        self.crnti = crnti;
        self.state = RaState::ResourceSelection;
    }

    pub fn step(&mut self, tti: Tti, ctx: &mut RaCtx) -> Option<RaEvent> {
        self.tti = tti;
        match self.state {
            RaState::Idle | RaState::ContentionResolution => None,
            RaState::ResourceSelection => {
                self.resource_selection(ctx);
                None
            }
            RaState::PdcchSetup => {
                let start = self.tti.add_ttis(RAR_WINDOW_OFFSET - 1);
                self.window_end = start.add_ttis(self.cfg.response_window_ms - 1);
                ctx.phy.pdcch_dl_search(RntiType::RaRnti, self.ra_rnti, Some((start, self.window_end)));
                tracing::debug!("RAR window {}..{} for ra-rnti {}", start, self.window_end, self.ra_rnti);
                self.state = RaState::ResponseReception;
                None
            }
            RaState::ResponseReception => {
                if self.tti.diff(self.window_end) > 0 {
                    tracing::info!("no RAR for preamble {} in the response window", self.preamble_index);
                    return self.response_error(ctx);
                }
                None
            }
            RaState::ResponseError => self.response_error(ctx),
            RaState::Backoff => {
                if self.tti.diff(self.backoff_until) >= 0 {
                    self.resource_selection(ctx);
                }
                None
            }
        }
    }

    fn resource_selection(&mut self, ctx: &mut RaCtx) {
        let msg3_size = ctx.rlc.get_buffer_state(0) + MSG3_HEADER_LEN;
        let has_group_b = self.cfg.nof_groupa_preambles < self.cfg.nof_preambles;
        let threshold = self.cfg.msg3_size_threshold;
        let group_b = *self.group_b.get_or_insert(has_group_b && msg3_size > threshold);
        let range = if group_b {
            self.cfg.nof_groupa_preambles..self.cfg.nof_preambles
        } else {
            0..self.cfg.nof_groupa_preambles
        };
        self.preamble_index = rand::random_range(range);

        let power = PREAMBLE_INITIAL_RX_TARGET_POWER_DBM + (self.preamble_tx_counter - 1) as f32 * POWER_RAMPING_STEP_DB;
        ctx.phy.send_prach(self.preamble_index, power);
        // FDD, one PRACH frequency resource: RA-RNTI = 1 + t_id
        self.ra_rnti = 1 + self.tti.sf_idx() as Rnti;
        tracing::info!(
            "-> PRACH preamble {} (group {}) attempt {} at {:.0} dBm",
            self.preamble_index,
            if group_b { "B" } else { "A" },
            self.preamble_tx_counter,
            power
        );
        self.state = RaState::PdcchSetup;
    }

    fn response_error(&mut self, ctx: &mut RaCtx) -> Option<RaEvent> {
        self.preamble_tx_counter += 1;
        if self.preamble_tx_counter > self.cfg.preamble_trans_max {
            let preamble_tx_count = self.preamble_tx_counter - 1;
            tracing::warn!("random access failed after {} preambles", preamble_tx_count);
            ctx.mux.msg3_flush();
            self.state = RaState::Idle;
            return Some(RaEvent::Problem { preamble_tx_count });
        }

        let backoff_ms = if self.backoff_param_ms > 0 { rand::random_range(0..=self.backoff_param_ms) } else { 0 };
        if backoff_ms > 0 {
            tracing::debug!("backoff {} ms before the next preamble", backoff_ms);
            self.backoff_until = self.tti.add_ttis(backoff_ms);
            self.state = RaState::Backoff;
        } else {
            self.state = RaState::ResourceSelection;
        }
        None
    }

    /// Is a DL assignment with this RA-RNTI the one awaited
    pub fn is_rar_rnti(&self, rnti: Rnti) -> bool {
        self.state == RaState::ResponseReception && rnti == self.ra_rnti
    }

    /// Decoded PDU on the RA-RNTI. Returns true when it carried a response to our preamble.
    pub fn rar_received(&mut self, payload: &[u8], ctx: &mut RaCtx) -> bool {
        if self.state != RaState::ResponseReception {
            tracing::debug!("<- RAR outside the response window, ignored");
            return false;
        }
        let rar = match RarPdu::from_bytes(payload) {
            Ok(rar) => rar,
            Err(e) => {
                tracing::warn!("<- RAR parse error {:?}: {}", e, debug::hex(payload));
                return false;
            }
        };
        tracing::debug!("<- {}", rar);
        if let Some(bi) = rar.backoff_indicator {
            self.backoff_param_ms = BACKOFF_TABLE_MS[bi as usize & 0xf];
        }
        let Some(resp) = rar.find(self.preamble_index as u8) else {
            return false;
        };

        ctx.phy.set_timing_adv_rar(resp.ta_cmd as u32);
        self.temp_crnti = resp.temp_crnti;
        ctx.phy.set_rar_grant(self.tti, resp.grant);
        ctx.phy.pdcch_ul_search(RntiType::TempCRnti, self.temp_crnti, None);
        ctx.phy.pdcch_dl_search(RntiType::TempCRnti, self.temp_crnti, None);
        if self.crnti != 0 {
            ctx.mux.append_crnti_ce_next_tx(self.crnti);
        }
        tracing::info!("<- RAR for preamble {}: tc-rnti 0x{:04x} ta {}", self.preamble_index, resp.temp_crnti, resp.ta_cmd);
        self.state = RaState::ContentionResolution;
        true
    }

    /// First transmission of Msg3 went out. Starts the contention resolution timer.
    pub fn msg3_transmitted(&mut self, msg3: &[u8], timers: &mut MacTimers) {
        if self.state != RaState::ContentionResolution {
            return;
        }
        if self.contention_id.is_none() {
            self.contention_id = contention_id_from_msg3(msg3);
        }
        timers.start(MacTimer::ContentionResolution, self.cfg.contention_resolution_timer_ms);
        tracing::debug!("-> Msg3, contention resolution timer {} ms", self.cfg.contention_resolution_timer_ms);
    }

    pub fn in_contention_resolution(&self) -> bool {
        self.state == RaState::ContentionResolution
    }

    /// Does a received UE contention resolution identity match our Msg3
    pub fn matches_contention_id(&self, id: u64) -> bool {
        self.in_contention_resolution() && self.contention_id == Some(id)
    }

    /// PDCCH addressed to the C-RNTI while resolving contention for a UE in RRC_CONNECTED.
    /// A UL grant for a new transmission resolves the contention.
    pub fn pdcch_to_crnti(&mut self, is_ul_new_tx: bool, ctx: &mut RaCtx) -> Option<RaEvent> {
        if self.in_contention_resolution() && self.crnti != 0 && is_ul_new_tx && ctx.timers.is_running(MacTimer::ContentionResolution) {
            return Some(self.contention_resolved(ctx));
        }
        None
    }

    /// Contention resolved in our favour
    pub fn contention_resolved(&mut self, ctx: &mut RaCtx) -> RaEvent {
        ctx.timers.stop(MacTimer::ContentionResolution);
        if self.crnti == 0 {
            self.crnti = self.temp_crnti;
            ctx.phy.set_crnti(self.crnti);
        }
        ctx.mux.msg3_flush();
        tracing::info!("random access complete, c-rnti 0x{:04x}", self.crnti);
        self.temp_crnti = 0;
        self.state = RaState::Idle;
        RaEvent::Completed { crnti: self.crnti }
    }

    /// Contention lost: wrong identity or timer expiry. The Msg3 is kept for the next attempt.
    pub fn contention_failed(&mut self, ctx: &mut RaCtx) {
        if !self.in_contention_resolution() {
            return;
        }
        tracing::info!("contention resolution failed for tc-rnti 0x{:04x}", self.temp_crnti);
        ctx.timers.stop(MacTimer::ContentionResolution);
        ctx.phy.pdcch_ul_search_reset();
        ctx.phy.pdcch_dl_search_reset();
        self.temp_crnti = 0;
        self.state = RaState::ResponseError;
    }
}

/// First 48 bits of the CCCH SDU carried in a Msg3
fn contention_id_from_msg3(msg3: &[u8]) -> Option<u64> {
    let pdu = match SchPdu::from_bytes(Direction::Ul, msg3) {
        Ok(pdu) => pdu,
        Err(e) => {
            tracing::warn!("cannot parse own Msg3: {:?}", e);
            return None;
        }
    };
    let (_, sdu) = pdu.sdus().find(|(lcid, _)| *lcid == 0)?;
    if sdu.len() < CONTENTION_ID_LEN {
        tracing::warn!("CCCH SDU of {} bytes too short for contention resolution", sdu.len());
        return None;
    }
    Some(sdu[..CONTENTION_ID_LEN].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}
