use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use lte_core::{Direction, HarqPid, Lcid, PduBuildErr, Rnti, RntiType, Tti, debug};
use lte_entities::mac::Mac;
use lte_pdus::mac::fields::mac_ce::MacCe;
use lte_pdus::mac::fields::rar_grant::RarGrant;
use lte_pdus::mac::pdus::rar_pdu::{RarPdu, RarResponse};
use lte_pdus::mac::pdus::sch_pdu::SchPdu;
use lte_pdus::mac::pdus::sch_pdu_builder::SchPduBuilder;
use lte_saps::interfaces::PhyInterfaceMac;
use lte_saps::phy::MacGrant;

/// RAR sent this many TTIs after the preamble, inside the response window
const RAR_DELAY: u32 = 4;
/// Msg3 scheduled this many TTIs after the RAR
const MSG3_DELAY: u32 = 6;
/// Contention resolution sent this many TTIs after Msg3
const CON_RES_DELAY: u32 = 4;
/// PHICH feedback this many TTIs after an UL transmission
const PHICH_DELAY: u32 = 4;

const RAR_TBS: usize = 8;
const MSG3_TBS: usize = 11;
const UL_TBS: usize = 128;
const DL_TBS: usize = 256;
const TA_CMD_INTERVAL: u32 = 200;
/// TA command meaning no adjustment
const TA_CMD_NONE: u8 = 31;

const FIRST_CRNTI: Rnti = 0x46;
/// Opaque connection setup payload delivered on SRB0 with the contention resolution
const CONNECTION_SETUP: [u8; 4] = [0x60, 0x12, 0x98, 0x0b];

/// Requests the MAC made to the PHY since the emulator last looked
#[derive(Debug, Default)]
struct PhyRequests {
    prach: Option<u32>,
    sr: bool,
    ra_rnti: Option<Rnti>,
    rar_grant: Option<Tti>,
    crnti: Rnti,
}

/// PHY handed to the MAC. Records every request for the emulator, which plays
/// the eNB side of the air interface.
#[derive(Clone, Default)]
pub struct LoopbackPhy {
    req: Arc<Mutex<PhyRequests>>,
}

impl LoopbackPhy {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PhyRequests> {
        self.req.lock().expect("loopback PHY mutex poisoned")
    }
}

impl PhyInterfaceMac for LoopbackPhy {
    fn send_prach(&mut self, preamble_index: u32, target_power_dbm: f32) {
        tracing::debug!("-> PRACH preamble {} at {} dBm", preamble_index, target_power_dbm);
        self.lock().prach = Some(preamble_index);
    }

    fn send_sr(&mut self) {
        self.lock().sr = true;
    }

    fn pdcch_ul_search(&mut self, _rnti_type: RntiType, _rnti: Rnti, _window: Option<(Tti, Tti)>) {}

    fn pdcch_dl_search(&mut self, rnti_type: RntiType, rnti: Rnti, _window: Option<(Tti, Tti)>) {
        if rnti_type == RntiType::RaRnti {
            self.lock().ra_rnti = Some(rnti);
        }
    }

    fn pdcch_ul_search_reset(&mut self) {}

    fn pdcch_dl_search_reset(&mut self) {
        self.lock().ra_rnti = None;
    }

    fn set_crnti(&mut self, rnti: Rnti) {
        self.lock().crnti = rnti;
    }

    fn set_timing_adv_rar(&mut self, ta_cmd: u32) {
        tracing::trace!("initial timing advance {}", ta_cmd);
    }

    fn set_timing_adv(&mut self, ta_cmd: u32) {
        tracing::trace!("timing advance adjustment {}", ta_cmd);
    }

    fn set_rar_grant(&mut self, tti: Tti, _grant: u32) {
        self.lock().rar_grant = Some(tti);
    }

    fn get_phr(&mut self) -> f32 {
        20.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    Idle,
    RarPending { rapid: u8, at: Tti },
    Msg3Pending { temp_crnti: Rnti },
    Msg3Scheduled { temp_crnti: Rnti, at: Tti },
    ConResPending { temp_crnti: Rnti, con_res_id: u64, at: Tti },
    Connected { crnti: Rnti },
}

/// Minimal eNB scheduler looping the UE uplink back into its downlink. RLC PDUs
/// the UE sends on a bearer come back on the same bearer, so AM data and status
/// PDUs acknowledge each other.
pub struct EnbEmulator {
    phy: LoopbackPhy,
    attach: Attach,
    next_crnti: Rnti,
    ul_ndi: [bool; 8],
    dl_ndi: [bool; 8],
    ul_backlog: bool,
    phich: VecDeque<(Tti, HarqPid)>,
    dl_queue: VecDeque<(Lcid, Vec<u8>)>,
    last_ta_cmd: Tti,
}

impl EnbEmulator {
    pub fn new(phy: LoopbackPhy) -> Self {
        Self {
            phy,
            attach: Attach::Idle,
            next_crnti: FIRST_CRNTI,
            ul_ndi: [false; 8],
            dl_ndi: [false; 8],
            ul_backlog: false,
            phich: VecDeque::new(),
            dl_queue: VecDeque::new(),
            last_ta_cmd: Tti::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.attach, Attach::Connected { .. })
    }

    /// Play one subframe of the eNB side after the UE MAC was clocked
    pub fn run_tti(&mut self, mac: &mut Mac, tti: Tti) {
        let (prach, sr, ra_rnti, rar_grant) = {
            let mut req = self.phy.lock();
            (req.prach.take(), std::mem::take(&mut req.sr), req.ra_rnti, req.rar_grant.take())
        };

        self.send_phich(mac, tti);

        if let Some(preamble) = prach {
            tracing::info!("<- PRACH preamble {}", preamble);
            self.attach = Attach::RarPending { rapid: preamble as u8, at: tti.add_ttis(RAR_DELAY) };
        }

        let attach = self.attach;
        match attach {
            Attach::Idle => {}
            Attach::RarPending { rapid, at } if at == tti => match ra_rnti {
                Some(ra_rnti) => self.send_rar(mac, tti, ra_rnti, rapid),
                None => {
                    tracing::warn!("UE not listening for a RAR, dropping preamble {}", rapid);
                    self.attach = Attach::Idle;
                }
            },
            Attach::RarPending { .. } => {}
            Attach::Msg3Pending { temp_crnti } => {
                if let Some(rar_tti) = rar_grant {
                    self.attach = Attach::Msg3Scheduled { temp_crnti, at: rar_tti.add_ttis(MSG3_DELAY) };
                }
            }
            Attach::Msg3Scheduled { temp_crnti, at } if at == tti => self.schedule_msg3(mac, tti, temp_crnti),
            Attach::Msg3Scheduled { .. } => {}
            Attach::ConResPending { temp_crnti, con_res_id, at } if at == tti => {
                self.send_con_res(mac, tti, temp_crnti, con_res_id)
            }
            Attach::ConResPending { .. } => {}
            Attach::Connected { crnti } => {
                if mac.crnti() != crnti {
                    tracing::info!("UE dropped C-RNTI 0x{:04x}", crnti);
                    self.attach = Attach::Idle;
                    return;
                }
                if sr {
                    tracing::debug!("<- SR from 0x{:04x}", crnti);
                    self.ul_backlog = true;
                }
                if self.ul_backlog {
                    self.schedule_ul(mac, tti, crnti);
                }
                self.schedule_dl(mac, tti, crnti);
            }
        }
    }

    fn send_phich(&mut self, mac: &mut Mac, tti: Tti) {
        while let Some(&(at, pid)) = self.phich.front() {
            if at.diff(tti) > 0 {
                break;
            }
            self.phich.pop_front();
            mac.harq_recv(pid, true);
        }
    }

    fn send_rar(&mut self, mac: &mut Mac, tti: Tti, ra_rnti: Rnti, rapid: u8) {
        let temp_crnti = self.next_crnti;
        let grant_bits = RarGrant { rb_assignment: 6, trunc_mcs: 4, ..Default::default() }.into_bits();
        let rar = RarPdu {
            backoff_indicator: None,
            responses: vec![RarResponse { rapid, ta_cmd: 0, grant: grant_bits, temp_crnti }],
        };
        let bytes = match rar.to_bytes(RAR_TBS) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("cannot build RAR: {}", e);
                self.attach = Attach::Idle;
                return;
            }
        };
        tracing::info!("-> {} on ra-rnti {}", rar, ra_rnti);
        let grant = dl_grant(RntiType::RaRnti, ra_rnti, 0, false, bytes.len(), tti);
        deliver_dl(mac, grant, &bytes);
        self.attach = Attach::Msg3Pending { temp_crnti };
    }

    fn schedule_msg3(&mut self, mac: &mut Mac, tti: Tti, temp_crnti: Rnti) {
        let pid = tti.get() % 8;
        let grant = MacGrant {
            rnti: temp_crnti,
            rnti_type: RntiType::TempCRnti,
            ndi: true,
            tbs: MSG3_TBS,
            rv: 0,
            pid,
            tti,
            is_from_rar: true,
        };
        let action = mac.new_grant_ul(grant);
        if !action.tx_enabled {
            tracing::warn!("UE sent no Msg3, back to idle");
            self.attach = Attach::Idle;
            return;
        }
        self.phich.push_back((tti.add_ttis(PHICH_DELAY), pid));

        let pdu = match SchPdu::from_bytes(Direction::Ul, &action.payload) {
            Ok(pdu) => pdu,
            Err(e) => {
                tracing::warn!("<- Msg3 parse error {:?}: {}", e, debug::hex(&action.payload));
                self.attach = Attach::Idle;
                return;
            }
        };
        tracing::info!("<- Msg3 {}", pdu);

        // Connected UE identifies itself with a C-RNTI CE, resolved by the next UL grant
        if let Some(crnti) = pdu.ces().find_map(|ce| match ce {
            MacCe::CRnti(c) => Some(*c),
            _ => None,
        }) {
            self.attach = Attach::Connected { crnti };
            self.ul_backlog = true;
            return;
        }

        let Some(con_res_id) = pdu.sdus().find(|(lcid, _)| *lcid == 0).and_then(|(_, ccch)| contention_id(ccch))
        else {
            tracing::warn!("<- Msg3 without CCCH SDU or C-RNTI, back to idle");
            self.attach = Attach::Idle;
            return;
        };
        self.attach = Attach::ConResPending { temp_crnti, con_res_id, at: tti.add_ttis(CON_RES_DELAY) };
    }

    fn send_con_res(&mut self, mac: &mut Mac, tti: Tti, temp_crnti: Rnti, con_res_id: u64) {
        let bytes = match con_res_pdu(con_res_id) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("cannot build contention resolution: {}", e);
                self.attach = Attach::Idle;
                return;
            }
        };
        let pid = tti.get() % 8;
        self.dl_ndi[pid as usize] = !self.dl_ndi[pid as usize];
        tracing::info!("-> contention resolution 0x{:012x} to 0x{:04x}", con_res_id, temp_crnti);
        let grant = dl_grant(RntiType::TempCRnti, temp_crnti, pid, self.dl_ndi[pid as usize], bytes.len(), tti);
        deliver_dl(mac, grant, &bytes);

        let phy_crnti = self.phy.lock().crnti;
        if phy_crnti == temp_crnti {
            self.attach = Attach::Connected { crnti: temp_crnti };
            self.next_crnti = self.next_crnti.wrapping_add(1).max(FIRST_CRNTI);
        } else {
            tracing::warn!("UE did not take C-RNTI 0x{:04x}", temp_crnti);
            self.attach = Attach::Idle;
        }
    }

    fn schedule_ul(&mut self, mac: &mut Mac, tti: Tti, crnti: Rnti) {
        let pid = tti.get() % 8;
        self.ul_ndi[pid as usize] = !self.ul_ndi[pid as usize];
        let grant = MacGrant {
            rnti: crnti,
            rnti_type: RntiType::CRnti,
            ndi: self.ul_ndi[pid as usize],
            tbs: UL_TBS,
            rv: 0,
            pid,
            tti,
            is_from_rar: false,
        };
        let action = mac.new_grant_ul(grant);
        if !action.tx_enabled {
            self.ul_backlog = false;
            return;
        }
        self.phich.push_back((tti.add_ttis(PHICH_DELAY), pid));

        let pdu = match SchPdu::from_bytes(Direction::Ul, &action.payload) {
            Ok(pdu) => pdu,
            Err(e) => {
                tracing::warn!("<- UL-SCH parse error {:?}: {}", e, debug::hex(&action.payload));
                return;
            }
        };
        tracing::trace!("<- {}", pdu);

        let mut reported = None;
        for ce in pdu.ces() {
            match ce {
                MacCe::ShortBsr { level, .. } | MacCe::TruncatedBsr { level, .. } => reported = Some(*level > 0),
                MacCe::LongBsr { levels } => reported = Some(levels.iter().any(|&l| l > 0)),
                _ => {}
            }
        }
        let mut nof_sdus = 0;
        for (lcid, data) in pdu.sdus() {
            nof_sdus += 1;
            if lcid != 0 {
                self.dl_queue.push_back((lcid, data.to_vec()));
            }
        }
        self.ul_backlog = reported.unwrap_or(nof_sdus > 0);
    }

    fn schedule_dl(&mut self, mac: &mut Mac, tti: Tti, crnti: Rnti) {
        let send_ta = tti.diff(self.last_ta_cmd) >= TA_CMD_INTERVAL as i32;
        if self.dl_queue.is_empty() && !send_ta {
            return;
        }

        let mut builder = SchPduBuilder::new_dl(DL_TBS);
        if send_ta {
            if let Err(e) = builder.set_ta_cmd(TA_CMD_NONE) {
                tracing::warn!("cannot add TA command: {}", e);
            }
            self.last_ta_cmd = tti;
        }
        while let Some((lcid, data)) = self.dl_queue.front() {
            if !builder.has_space_sdu(data.len()) {
                break;
            }
            if let Err(e) = builder.add_sdu(*lcid, data) {
                tracing::warn!("cannot loop back {} bytes on lcid {}: {}", data.len(), lcid, e);
                break;
            }
            self.dl_queue.pop_front();
        }
        let bytes = match builder.write() {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("cannot build DL-SCH PDU: {}", e);
                return;
            }
        };

        let pid = tti.get() % 8;
        self.dl_ndi[pid as usize] = !self.dl_ndi[pid as usize];
        let grant = dl_grant(RntiType::CRnti, crnti, pid, self.dl_ndi[pid as usize], bytes.len(), tti);
        deliver_dl(mac, grant, &bytes);
    }
}

/// UE contention resolution identity: the first 48 bits of the CCCH SDU
fn contention_id(ccch: &[u8]) -> Option<u64> {
    if ccch.len() < 6 {
        return None;
    }
    Some(ccch[..6].iter().fold(0u64, |acc, &b| acc << 8 | b as u64))
}

fn con_res_pdu(con_res_id: u64) -> Result<Vec<u8>, PduBuildErr> {
    let mut builder = SchPduBuilder::new_dl(DL_TBS);
    builder.set_con_res_id(con_res_id)?;
    builder.add_sdu(0, &CONNECTION_SETUP)?;
    builder.write()
}

fn dl_grant(rnti_type: RntiType, rnti: Rnti, pid: HarqPid, ndi: bool, tbs: usize, tti: Tti) -> MacGrant {
    MacGrant { rnti, rnti_type, ndi, tbs, rv: 0, pid, tti, is_from_rar: false }
}

fn deliver_dl(mac: &mut Mac, grant: MacGrant, payload: &[u8]) {
    let action = mac.new_grant_dl(grant);
    if action.decode_enabled {
        mac.tb_decoded(&grant, true, payload);
    }
}
