use lte_core::{HarqPid, Rnti, RntiType};
use lte_saps::phy::{MacGrant, UlAction};

pub const NOF_UL_HARQ_PROC: usize = 8;

/// Redundancy version per transmission number, 36.321 5.4.2.2
const RV_SEQUENCE: [u32; 4] = [0, 2, 3, 1];

#[derive(Debug, Default)]
struct UlHarqProcess {
    /// Last NDI received for this process
    ndi: Option<bool>,
    /// Transport block kept for retransmissions
    payload: Option<Vec<u8>>,
    rnti: Rnti,
    /// Transmissions done so far
    nof_tx: u32,
    is_msg3: bool,
    acked: bool,
}

impl UlHarqProcess {
    fn flush(&mut self) {
        self.payload = None;
        self.nof_tx = 0;
        self.is_msg3 = false;
        self.acked = false;
    }

    fn action(&self, rv: u32) -> UlAction {
        UlAction {
            tx_enabled: true,
            expect_ack: true,
            rnti: self.rnti,
            rv,
            current_tx_nb: self.nof_tx.saturating_sub(1),
            payload: self.payload.clone().unwrap_or_default(),
        }
    }
}

/// Uplink HARQ entity, 36.321 5.4.2
pub struct UlHarq {
    procs: [UlHarqProcess; NOF_UL_HARQ_PROC],
    max_harq_tx: u32,
    max_harq_msg3_tx: u32,
    nof_failed: u32,
}

impl UlHarq {
    pub fn new(max_harq_tx: u32, max_harq_msg3_tx: u32) -> Self {
        UlHarq { procs: Default::default(), max_harq_tx, max_harq_msg3_tx, nof_failed: 0 }
    }

    pub fn set_config(&mut self, max_harq_tx: u32, max_harq_msg3_tx: u32) {
        self.max_harq_tx = max_harq_tx;
        self.max_harq_msg3_tx = max_harq_msg3_tx;
    }

    /// Flush every process
    pub fn reset(&mut self) {
        for p in self.procs.iter_mut() {
            p.flush();
            p.ndi = None;
        }
    }

    fn proc_mut(&mut self, pid: HarqPid) -> Option<&mut UlHarqProcess> {
        let p = self.procs.get_mut(pid as usize);
        if p.is_none() {
            tracing::warn!("invalid UL HARQ pid {}", pid);
        }
        p
    }

    pub fn has_data(&self, pid: HarqPid) -> bool {
        self.procs.get(pid as usize).is_some_and(|p| p.payload.is_some())
    }

    /// Transport blocks dropped after their last transmission, since the previous call
    pub fn take_nof_failed(&mut self) -> u32 {
        std::mem::take(&mut self.nof_failed)
    }

    /// A grant asks for new data on an empty process, on a Msg3 grant, or when
    /// the NDI toggled. Grants to the temporary C-RNTI retransmit the Msg3.
    pub fn needs_new_data(&self, grant: &MacGrant) -> bool {
        let Some(p) = self.procs.get(grant.pid as usize) else {
            return false;
        };
        if grant.is_from_rar || p.payload.is_none() {
            return true;
        }
        if grant.rnti_type == RntiType::TempCRnti && p.is_msg3 {
            return false;
        }
        p.ndi != Some(grant.ndi)
    }

    /// Handle an uplink grant. `new_payload` is the new transport block when
    /// `needs_new_data` said so, None for an adaptive retransmission.
    pub fn new_grant(&mut self, grant: &MacGrant, new_payload: Option<Vec<u8>>) -> UlAction {
        let max_harq_tx = self.max_harq_tx;
        let max_harq_msg3_tx = self.max_harq_msg3_tx;
        let Some(p) = self.proc_mut(grant.pid) else {
            return UlAction::no_tx();
        };
        p.ndi = Some(grant.ndi);

        if let Some(payload) = new_payload {
            p.flush();
            if payload.len() != grant.tbs {
                tracing::error!("UL PDU of {} bytes for a {} byte grant, not transmitting", payload.len(), grant.tbs);
                return UlAction::no_tx();
            }
            p.payload = Some(payload);
            p.is_msg3 = grant.is_from_rar;
            p.rnti = grant.rnti;
            p.nof_tx = 1;
            tracing::debug!("-> UL new tx pid {} tbs {} rnti 0x{:04x}", grant.pid, grant.tbs, grant.rnti);
            return p.action(grant.rv);
        }

        // Adaptive retransmission, redundancy version from the grant
        if p.payload.is_none() {
            tracing::warn!("adaptive retx on empty UL HARQ pid {}", grant.pid);
            return UlAction::no_tx();
        }
        let max_tx = if p.is_msg3 { max_harq_msg3_tx } else { max_harq_tx };
        if p.nof_tx >= max_tx {
            tracing::info!("UL HARQ pid {} dropped after {} transmissions", grant.pid, p.nof_tx);
            p.flush();
            self.nof_failed += 1;
            return UlAction::no_tx();
        }
        p.nof_tx += 1;
        p.acked = false;
        tracing::debug!("-> UL adaptive retx pid {} tx_nb {} rv {}", grant.pid, p.nof_tx - 1, grant.rv);
        p.action(grant.rv)
    }

    /// HARQ feedback on the PHICH without a grant. A NACK causes a non-adaptive
    /// retransmission until the transmission limit is reached.
    pub fn harq_recv(&mut self, pid: HarqPid, ack: bool) -> UlAction {
        let max_harq_tx = self.max_harq_tx;
        let max_harq_msg3_tx = self.max_harq_msg3_tx;
        let Some(p) = self.proc_mut(pid) else {
            return UlAction::no_tx();
        };
        if p.payload.is_none() {
            return UlAction::no_tx();
        }
        if ack {
            tracing::trace!("<- UL ACK pid {}", pid);
            p.acked = true;
            return UlAction::no_tx();
        }

        let max_tx = if p.is_msg3 { max_harq_msg3_tx } else { max_harq_tx };
        if p.nof_tx >= max_tx {
            tracing::info!("UL HARQ pid {} dropped after {} transmissions", pid, p.nof_tx);
            p.flush();
            self.nof_failed += 1;
            return UlAction::no_tx();
        }
        p.nof_tx += 1;
        let rv = RV_SEQUENCE[(p.nof_tx as usize - 1) % RV_SEQUENCE.len()];
        tracing::debug!("<- UL NACK pid {}, retx tx_nb {} rv {}", pid, p.nof_tx - 1, rv);
        p.action(rv)
    }

    /// Record PHICH feedback that arrives together with a grant
    pub fn set_ack(&mut self, pid: HarqPid, ack: bool) {
        if let Some(p) = self.procs.get_mut(pid as usize) {
            p.acked = ack;
        }
    }

    pub fn is_acked(&self, pid: HarqPid) -> bool {
        self.procs.get(pid as usize).is_some_and(|p| p.acked)
    }
}
