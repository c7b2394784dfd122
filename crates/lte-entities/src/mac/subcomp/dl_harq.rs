use lte_core::{HarqPid, Rnti, RntiType};
use lte_saps::phy::{DlAction, MacGrant};

pub const NOF_DL_HARQ_PROC: usize = 8;

#[derive(Debug, Default)]
struct DlHarqProcess {
    ndi: Option<bool>,
    /// Current transport block was decoded
    acked: bool,
    tbs: usize,
    nof_retx: u32,
}

impl DlHarqProcess {
    fn reset(&mut self) {
        *self = DlHarqProcess::default();
    }
}

/// Downlink HARQ entity, 36.321 5.3.2. Eight processes for the DL-SCH plus a
/// dedicated broadcast process for SI.
pub struct DlHarq {
    procs: [DlHarqProcess; NOF_DL_HARQ_PROC],
    bcch: DlHarqProcess,
    last_temp_crnti: Option<Rnti>,
}

impl Default for DlHarq {
    fn default() -> Self {
        Self::new()
    }
}

impl DlHarq {
    pub fn new() -> Self {
        DlHarq { procs: Default::default(), bcch: DlHarqProcess::default(), last_temp_crnti: None }
    }

    pub fn reset(&mut self) {
        for p in self.procs.iter_mut() {
            p.reset();
        }
        self.bcch.reset();
        self.last_temp_crnti = None;
    }

    fn process_mut(&mut self, rnti_type: RntiType, pid: HarqPid) -> Option<&mut DlHarqProcess> {
        if rnti_type == RntiType::SiRnti {
            return Some(&mut self.bcch);
        }
        let p = self.procs.get_mut(pid as usize);
        if p.is_none() {
            tracing::warn!("invalid DL HARQ pid {}", pid);
        }
        p
    }

    /// Decide what the PHY does with a DL assignment
    pub fn new_grant(&mut self, grant: &MacGrant) -> DlAction {
        // A new temporary C-RNTI always starts a new transmission
        let new_temp_crnti = grant.rnti_type == RntiType::TempCRnti && self.last_temp_crnti != Some(grant.rnti);
        if grant.rnti_type == RntiType::TempCRnti {
            self.last_temp_crnti = Some(grant.rnti);
        }
        let Some(p) = self.process_mut(grant.rnti_type, grant.pid) else {
            return DlAction::default();
        };

        let is_new = match grant.rnti_type {
            // SI windows restart with redundancy version 0
            RntiType::SiRnti => grant.rv == 0,
            _ => new_temp_crnti || p.ndi != Some(grant.ndi),
        };
        if is_new {
            p.ndi = Some(grant.ndi);
            p.acked = false;
            p.tbs = grant.tbs;
            p.nof_retx = 0;
        } else {
            p.nof_retx += 1;
        }

        let generate_ack = grant.rnti_type != RntiType::SiRnti;
        if !is_new && p.acked {
            tracing::debug!("<- DL duplicate pid {}, acking without decoding", grant.pid);
            return DlAction {
                decode_enabled: false,
                default_ack: true,
                generate_ack,
                pid: grant.pid,
                rv: grant.rv,
                tbs: grant.tbs,
            };
        }

        tracing::trace!("<- DL grant pid {} tbs {} new {} rv {}", grant.pid, grant.tbs, is_new, grant.rv);
        DlAction { decode_enabled: true, default_ack: false, generate_ack, pid: grant.pid, rv: grant.rv, tbs: p.tbs }
    }

    /// Record the decoding result. Returns true when the data goes up.
    pub fn tb_decoded(&mut self, pid: HarqPid, rnti_type: RntiType, ack: bool) -> bool {
        let Some(p) = self.process_mut(rnti_type, pid) else {
            return false;
        };
        if p.acked {
            return false;
        }
        p.acked = ack;
        if !ack {
            tracing::debug!("<- DL CRC error pid {} after {} retx", pid, p.nof_retx);
        }
        ack
    }
}
