use lte_core::{Direction, N_RADIO_BEARERS, debug, rb_name};
use lte_pdus::mac::fields::mac_ce::MacCe;
use lte_pdus::mac::pdus::sch_pdu::{SchPayload, SchPdu};
use lte_saps::interfaces::RlcInterfaceMac;

/// Control elements of a received PDU that the MAC procedures act on
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DemuxResult {
    pub ta_cmd: Option<u8>,
    pub con_res_id: Option<u64>,
    pub nof_sdus: usize,
}

/// Splits DL-SCH transport blocks and routes the SDUs to the RLC
#[derive(Debug, Default)]
pub struct Demux {
    nof_dropped: u64,
}

impl Demux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nof_dropped(&self) -> u64 {
        self.nof_dropped
    }

    fn parse(&mut self, payload: &[u8]) -> Option<SchPdu> {
        match SchPdu::from_bytes(Direction::Dl, payload) {
            Ok(pdu) => Some(pdu),
            Err(e) => {
                tracing::warn!("<- DL-SCH parse error {:?}: {}", e, debug::hex(payload));
                self.nof_dropped += 1;
                None
            }
        }
    }

    /// PDU addressed to the C-RNTI
    pub fn push_pdu(&mut self, payload: &[u8], rlc: &dyn RlcInterfaceMac) -> Option<DemuxResult> {
        let pdu = self.parse(payload)?;
        Some(self.process_pdu(pdu, rlc))
    }

    /// PDU addressed to the temporary C-RNTI during contention resolution. SDUs
    /// are only delivered when `con_res_check` accepts the contention resolution
    /// identity the PDU carries.
    pub fn push_pdu_temp_crnti(
        &mut self,
        payload: &[u8],
        rlc: &dyn RlcInterfaceMac,
        mut con_res_check: impl FnMut(u64) -> bool,
    ) -> Option<DemuxResult> {
        let pdu = self.parse(payload)?;
        let con_res_id = pdu.ces().find_map(|ce| match ce {
            MacCe::ContentionResolutionId(id) => Some(*id),
            _ => None,
        });
        let Some(id) = con_res_id else {
            tracing::debug!("<- PDU for temporary C-RNTI without contention resolution identity, discarding");
            self.nof_dropped += 1;
            return None;
        };
        if !con_res_check(id) {
            tracing::info!("<- contention resolution identity 0x{:012x} not ours, discarding PDU", id);
            self.nof_dropped += 1;
            return None;
        }
        Some(self.process_pdu(pdu, rlc))
    }

    fn process_pdu(&mut self, pdu: SchPdu, rlc: &dyn RlcInterfaceMac) -> DemuxResult {
        let mut result = DemuxResult::default();
        for sh in pdu.subheaders {
            match sh.payload {
                SchPayload::Sdu(data) => {
                    if (sh.lcid as usize) < N_RADIO_BEARERS {
                        tracing::trace!("<- {} {} bytes", rb_name(sh.lcid), data.len());
                        rlc.write_pdu(sh.lcid, &data);
                        result.nof_sdus += 1;
                    } else {
                        tracing::warn!("<- SDU on reserved lcid {}, dropping {} bytes", sh.lcid, data.len());
                        self.nof_dropped += 1;
                    }
                }
                SchPayload::Ce(MacCe::TaCommand(ta)) => result.ta_cmd = Some(ta),
                SchPayload::Ce(MacCe::ContentionResolutionId(id)) => result.con_res_id = Some(id),
                SchPayload::Ce(MacCe::Drx) => tracing::debug!("<- DRX command ignored, DRX not configured"),
                SchPayload::Ce(ce) => tracing::warn!("<- unexpected {} in DL-SCH", ce),
                SchPayload::Padding(_) => {}
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use lte_core::debug;
    use lte_pdus::mac::pdus::sch_pdu_builder::SchPduBuilder;

    use super::*;
    use crate::mac::subcomp::fake_rlc::FakeRlc;

    fn dl_pdu(tbs: usize, con_res: Option<u64>, sdus: &[(u32, &[u8])]) -> Vec<u8> {
        let mut b = SchPduBuilder::new_dl(tbs);
        if let Some(id) = con_res {
            b.set_con_res_id(id).unwrap();
        }
        b.set_ta_cmd(31).unwrap();
        for (lcid, data) in sdus {
            b.add_sdu(*lcid, data).unwrap();
        }
        b.write().unwrap()
    }

    #[test]
    fn test_route_sdus_and_ces() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut demux = Demux::new();
        let bytes = dl_pdu(30, None, &[(1, &[1, 2, 3]), (3, &[4; 10])]);
        let result = demux.push_pdu(&bytes, &rlc).unwrap();
        assert_eq!(result.ta_cmd, Some(31));
        assert_eq!(result.nof_sdus, 2);
        let received = rlc.received.lock().unwrap();
        assert_eq!(received[0], (1, vec![1, 2, 3]));
        assert_eq!(received[1], (3, vec![4; 10]));
    }

    #[test]
    fn test_reserved_lcid_and_garbage() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut demux = Demux::new();
        let bytes = dl_pdu(20, None, &[(20, &[1, 2, 3])]);
        assert_eq!(demux.push_pdu(&bytes, &rlc).unwrap().nof_sdus, 0);
        assert!(rlc.received.lock().unwrap().is_empty());
        assert_eq!(demux.nof_dropped(), 1);

        // Subheader declares more bytes than present
        assert!(demux.push_pdu(&[0x21, 0x7f, 0x00], &rlc).is_none());
        assert_eq!(demux.nof_dropped(), 2);
    }

    #[test]
    fn test_contention_resolution_filter() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut demux = Demux::new();
        let ours = 0x0102_0304_0506u64;
        let bytes = dl_pdu(30, Some(ours), &[(1, &[7; 5])]);

        assert!(demux.push_pdu_temp_crnti(&bytes, &rlc, |id| id == ours + 1).is_none());
        assert!(rlc.received.lock().unwrap().is_empty());

        let result = demux.push_pdu_temp_crnti(&bytes, &rlc, |id| id == ours).unwrap();
        assert_eq!(result.con_res_id, Some(ours));
        assert_eq!(rlc.received.lock().unwrap().len(), 1);

        // No identity at all
        let bytes = dl_pdu(30, None, &[(1, &[7; 5])]);
        assert!(demux.push_pdu_temp_crnti(&bytes, &rlc, |_| true).is_none());
    }
}
