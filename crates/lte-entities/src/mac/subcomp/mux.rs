use lte_core::{Direction, Lcid, PduBuildErr, Rnti, rb_name};
use lte_pdus::mac::fields::mac_ce::MacCe;
use lte_pdus::mac::pdus::sch_pdu::SchPdu;
use lte_pdus::mac::pdus::sch_pdu_builder::SchPduBuilder;
use lte_saps::interfaces::RlcInterfaceMac;

use crate::mac::MacTimers;
use crate::mac::subcomp::bsr_proc::BsrProc;

/// Largest Msg3 content kept for retransmission, bigger grants are padded
pub const MSG3_BUFF_SZ: usize = 128;

const CCCH_LCID: Lcid = 0;

/// Logical channel prioritization state, 36.321 5.4.3.1
#[derive(Debug, Clone, Copy)]
struct LogicalChannel {
    lcid: Lcid,
    priority: u32,
    /// Bytes per TTI, None for infinity
    pbr: Option<u32>,
    bsd_ms: u32,
    /// Token bucket, may go negative when an RLC PDU overshoots the tokens
    bj: i64,
}

impl LogicalChannel {
    fn bucket_size(&self) -> i64 {
        self.pbr.map_or(i64::MAX, |pbr| pbr as i64 * self.bsd_ms.max(1) as i64)
    }
}

/// What went into the last PDU, for the MAC procedures
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MuxReport {
    pub bsr_included: bool,
    pub phr_included: bool,
    pub crnti_included: bool,
    pub ccch_bytes: usize,
    pub sdu_bytes: usize,
}

/// Msg3 as last sent, with the SDUs and C-RNTI CE it was built from
struct Msg3 {
    bytes: Vec<u8>,
    sdus: Vec<(Lcid, Vec<u8>)>,
    crnti: Option<Rnti>,
}

impl Msg3 {
    fn from_pdu(bytes: Vec<u8>) -> Option<Self> {
        let pdu = match SchPdu::from_bytes(Direction::Ul, &bytes) {
            Ok(pdu) => pdu,
            Err(e) => {
                tracing::error!("Msg3 does not parse back: {}", e);
                return None;
            }
        };
        let sdus = pdu.sdus().map(|(lcid, data)| (lcid, data.to_vec())).collect();
        let crnti = pdu.ces().find_map(|ce| match ce {
            MacCe::CRnti(rnti) => Some(*rnti),
            _ => None,
        });
        Some(Msg3 { bytes, sdus, crnti })
    }

    /// Same SDUs and C-RNTI CE in a transport block of `tbs` bytes, with a padding
    /// BSR for the current buffer state if it fits
    fn repack(&self, tbs: usize, rlc: &dyn RlcInterfaceMac, bsr: &BsrProc) -> Result<Vec<u8>, PduBuildErr> {
        let mut pdu = SchPduBuilder::new_ul(tbs);
        for (lcid, data) in &self.sdus {
            pdu.add_sdu(*lcid, data)?;
        }
        if let Some(crnti) = self.crnti {
            pdu.set_crnti(crnti)?;
        }
        if let Some(b) = bsr.generate_padding_bsr(pdu.rem_size(), rlc) {
            if pdu.set_bsr(b.format, &b.buff_size).is_err() {
                tracing::debug!("no room for BSR in repacked Msg3");
            }
        }
        pdu.write()
    }
}

/// Builds uplink transport blocks from control elements and RLC data
pub struct Mux {
    /// Sorted by priority, highest (lowest value) first
    channels: Vec<LogicalChannel>,
    pending_crnti_ce: Option<Rnti>,
    msg3_buff: Option<Msg3>,
    last_report: MuxReport,
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl Mux {
    pub fn new() -> Self {
        Mux { channels: Vec::new(), pending_crnti_ce: None, msg3_buff: None, last_report: MuxReport::default() }
    }

    /// Empty the token buckets and forget the Msg3. Channel configuration is kept.
    pub fn reset(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.bj = 0;
        }
        self.pending_crnti_ce = None;
        self.msg3_flush();
    }

    /// Configure or reconfigure the prioritization of a logical channel. CCCH
    /// data always goes first and is not part of the prioritization.
    pub fn set_priority(&mut self, lcid: Lcid, priority: u32, pbr: Option<u32>, bsd_ms: u32) {
        if lcid == CCCH_LCID {
            tracing::warn!("CCCH has no prioritization parameters");
            return;
        }
        match self.channels.iter_mut().find(|ch| ch.lcid == lcid) {
            Some(ch) => {
                ch.priority = priority;
                ch.pbr = pbr;
                ch.bsd_ms = bsd_ms;
                ch.bj = ch.bj.min(ch.bucket_size());
            }
            None => self.channels.push(LogicalChannel { lcid, priority, pbr, bsd_ms, bj: 0 }),
        }
        self.channels.sort_by_key(|ch| ch.priority);
        tracing::debug!(
            "{} priority {} pbr {} bsd {} ms",
            rb_name(lcid),
            priority,
            pbr.map_or("inf".to_string(), |p| p.to_string()),
            bsd_ms
        );
    }

    pub fn bj(&self, lcid: Lcid) -> Option<i64> {
        self.channels.iter().find(|ch| ch.lcid == lcid).map(|ch| ch.bj)
    }

    /// Add the prioritized bit rate of one TTI to every bucket
    pub fn update_tokens(&mut self) {
        for ch in self.channels.iter_mut() {
            if let Some(pbr) = ch.pbr {
                ch.bj = (ch.bj + pbr as i64).min(ch.bucket_size());
            }
        }
    }

    pub fn is_pending_ccch_sdu(&self, rlc: &dyn RlcInterfaceMac) -> bool {
        rlc.get_buffer_state(CCCH_LCID) > 0
    }

    pub fn is_pending_any_sdu(&self, rlc: &dyn RlcInterfaceMac) -> bool {
        self.is_pending_ccch_sdu(rlc) || self.channels.iter().any(|ch| rlc.get_buffer_state(ch.lcid) > 0)
    }

    /// Put a C-RNTI CE in the next transport block, for a Msg3 sent in RRC_CONNECTED
    pub fn append_crnti_ce_next_tx(&mut self, crnti: Rnti) {
        self.pending_crnti_ce = Some(crnti);
    }

    pub fn last_report(&self) -> MuxReport {
        self.last_report
    }

    /// Add as much of `lcid` as fits, up to `max` bytes, one RLC PDU per subheader.
    /// Returns the bytes taken.
    fn allocate_sdu(
        pdu: &mut SchPduBuilder,
        lcid: Lcid,
        max: usize,
        rlc: &dyn RlcInterfaceMac,
    ) -> Result<usize, PduBuildErr> {
        let mut total = 0;
        while total < max && pdu.has_free_subheader() {
            let pending = rlc.get_buffer_state(lcid) as usize;
            let requested = pending.min(max - total).min(pdu.get_sdu_space());
            if requested == 0 {
                break;
            }
            let n = pdu.set_sdu(lcid, requested, |payload| rlc.read_pdu(lcid, payload))?;
            if n == 0 {
                break;
            }
            tracing::trace!("-> {} {} bytes", rb_name(lcid), n);
            total += n;
        }
        Ok(total)
    }

    /// Build the transport block for an uplink grant of `tbs` bytes. Control
    /// elements go first, then prioritized data, then best effort data. A padding
    /// BSR is added when no regular or periodic one was.
    pub fn pdu_get(
        &mut self,
        tbs: usize,
        rlc: &dyn RlcInterfaceMac,
        bsr: &mut BsrProc,
        timers: &mut MacTimers,
        phr_db: Option<f32>,
    ) -> Result<Vec<u8>, PduBuildErr> {
        let mut pdu = SchPduBuilder::new_ul(tbs);
        let mut report = MuxReport::default();

        // CCCH SDU, or C-RNTI CE when there is none
        report.ccch_bytes = Self::allocate_sdu(&mut pdu, CCCH_LCID, usize::MAX, rlc)?;
        if let Some(crnti) = self.pending_crnti_ce.take() {
            if report.ccch_bytes == 0 {
                match pdu.set_crnti(crnti) {
                    Ok(()) => report.crnti_included = true,
                    Err(e) => tracing::warn!("no room for C-RNTI CE: {}", e),
                }
            }
        }

        let regular_bsr = bsr.need_to_send_bsr_on_ul_grant(pdu.rem_size(), rlc, timers);
        if let Some(b) = regular_bsr {
            match pdu.set_bsr(b.format, &b.buff_size) {
                Ok(()) => report.bsr_included = true,
                Err(e) => tracing::warn!("no room for {} BSR: {}", b.format, e),
            }
        }

        if let Some(headroom) = phr_db {
            match pdu.set_phr(headroom) {
                Ok(()) => report.phr_included = true,
                Err(e) => tracing::debug!("no room for PHR: {}", e),
            }
        }

        // Phase 1: channels with tokens left, or an infinite prioritized bit rate
        for i in 0..self.channels.len() {
            let ch = self.channels[i];
            if ch.pbr.is_some() && ch.bj <= 0 {
                continue;
            }
            let max = if ch.pbr.is_some() { ch.bj as usize } else { usize::MAX };
            let n = Self::allocate_sdu(&mut pdu, ch.lcid, max, rlc)?;
            if ch.pbr.is_some() {
                self.channels[i].bj -= n as i64;
            }
            report.sdu_bytes += n;
        }

        // Phase 2: whatever space is left, strictly by priority
        for i in 0..self.channels.len() {
            if pdu.get_sdu_space() == 0 {
                break;
            }
            let lcid = self.channels[i].lcid;
            report.sdu_bytes += Self::allocate_sdu(&mut pdu, lcid, usize::MAX, rlc)?;
        }

        if regular_bsr.is_none() {
            if let Some(b) = bsr.generate_padding_bsr(pdu.rem_size(), rlc) {
                if pdu.set_bsr(b.format, &b.buff_size).is_ok() {
                    report.bsr_included = true;
                }
            }
        }

        self.last_report = report;
        pdu.write()
    }

    /// Msg3 for a grant received in a random access response. The content is
    /// built once, at most `MSG3_BUFF_SZ` bytes of it. A grant of another size in
    /// a later attempt gets the same SDUs and C-RNTI CE until `msg3_flush`.
    pub fn msg3_get(
        &mut self,
        tbs: usize,
        rlc: &dyn RlcInterfaceMac,
        bsr: &mut BsrProc,
        timers: &mut MacTimers,
    ) -> Option<Vec<u8>> {
        if self.msg3_buff.is_none() {
            let build_len = tbs.min(MSG3_BUFF_SZ);
            if build_len < tbs {
                tracing::debug!("Msg3 grant of {} bytes, content limited to {} bytes", tbs, build_len);
            }
            match self.pdu_get(build_len, rlc, bsr, timers, None) {
                Ok(bytes) => {
                    tracing::debug!("-> Msg3 built, {} bytes", build_len);
                    self.msg3_buff = Some(Msg3::from_pdu(bytes)?);
                }
                Err(e) => {
                    tracing::error!("Msg3 construction failed: {}", e);
                    return None;
                }
            }
        }

        let msg3 = self.msg3_buff.as_mut()?;
        if msg3.bytes.len() == tbs {
            tracing::debug!("-> Msg3 from buffer, {} bytes", tbs);
            return Some(msg3.bytes.clone());
        }
        match msg3.repack(tbs, rlc, bsr) {
            Ok(bytes) => {
                tracing::debug!("-> Msg3 repacked from {} to {} bytes", msg3.bytes.len(), tbs);
                msg3.bytes = bytes.clone();
                Some(bytes)
            }
            Err(e) => {
                tracing::warn!("Msg3 content does not fit a {} byte grant: {}", tbs, e);
                None
            }
        }
    }

    pub fn msg3_flush(&mut self) {
        if self.msg3_buff.take().is_some() {
            tracing::debug!("Msg3 buffer flushed");
        }
    }

    pub fn msg3_is_transmitted(&self) -> bool {
        self.msg3_buff.is_some()
    }

    pub fn msg3(&self) -> Option<&[u8]> {
        self.msg3_buff.as_ref().map(|m| m.bytes.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use lte_core::{Direction, debug};
    use lte_pdus::mac::fields::mac_ce::MacCe;
    use lte_pdus::mac::pdus::sch_pdu::{SchPayload, SchPdu};

    use super::*;
    use crate::mac::subcomp::fake_rlc::FakeRlc;

    fn parse(bytes: &[u8]) -> SchPdu {
        SchPdu::from_bytes(Direction::Ul, bytes).unwrap()
    }

    fn sdu_lens(pdu: &SchPdu) -> Vec<(Lcid, usize)> {
        pdu.sdus().map(|(lcid, data)| (lcid, data.len())).collect()
    }

    #[test]
    fn test_priority_then_best_effort() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        mux.set_priority(3, 1, None, 0);
        mux.set_priority(4, 2, Some(0), 0);
        rlc.set_pending(3, 50);
        rlc.set_pending(4, 100);

        mux.update_tokens();
        let bytes = mux.pdu_get(60, &rlc, &mut bsr, &mut timers, None).unwrap();
        assert_eq!(bytes.len(), 60);

        // Channel 3 empties in phase 1, channel 4 fills the rest in phase 2
        let pdu = parse(&bytes);
        assert_eq!(sdu_lens(&pdu), vec![(3, 50), (4, 7)]);
        assert_eq!(pdu.nof_padding_bytes(), 0);
        assert_eq!(rlc.pending(3), 0);
        assert_eq!(rlc.pending(4), 93);
        assert_eq!(mux.last_report().sdu_bytes, 57);
    }

    #[test]
    fn test_token_bucket() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        // Low priority channel with a guaranteed rate beats a high priority best effort one
        mux.set_priority(3, 1, Some(0), 0);
        mux.set_priority(4, 5, Some(8), 2);
        rlc.set_pending(3, 200);
        rlc.set_pending(4, 200);

        for _ in 0..5 {
            mux.update_tokens();
        }
        // Clamped to pbr * bsd
        assert_eq!(mux.bj(4), Some(16));

        let bytes = mux.pdu_get(40, &rlc, &mut bsr, &mut timers, None).unwrap();
        let pdu = parse(&bytes);
        assert_eq!(sdu_lens(&pdu), vec![(4, 16), (3, 21)]);
        assert_eq!(mux.bj(4), Some(0));
    }

    #[test]
    fn test_ccch_and_ces_first() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        bsr.setup_lcg(3, 0, 1);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        mux.set_priority(3, 1, None, 0);
        rlc.set_pending(0, 6);
        rlc.set_pending(3, 100);
        bsr.step(&rlc);

        let bytes = mux.pdu_get(20, &rlc, &mut bsr, &mut timers, Some(10.0)).unwrap();
        let pdu = parse(&bytes);
        let ces: Vec<MacCe> = pdu.ces().copied().collect();
        assert!(matches!(ces[0], MacCe::ShortBsr { lcg: 0, .. }));
        assert_eq!(ces[1], MacCe::phr(10.0));
        // 2 CE subheaders and 2 CE bytes, 2 bytes CCCH header, 1 byte DTCH header
        assert_eq!(sdu_lens(&pdu), vec![(0, 6), (3, 7)]);
        let report = mux.last_report();
        assert!(report.bsr_included && report.phr_included);
        assert_eq!(report.ccch_bytes, 6);
    }

    #[test]
    fn test_crnti_ce_and_padding_bsr() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        bsr.setup_lcg(3, 1, 1);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        mux.set_priority(3, 1, None, 0);
        mux.append_crnti_ce_next_tx(0x4601);
        rlc.set_pending(3, 4);

        let bytes = mux.pdu_get(16, &rlc, &mut bsr, &mut timers, None).unwrap();
        let pdu = parse(&bytes);
        let ces: Vec<MacCe> = pdu.ces().copied().collect();
        assert_eq!(ces[0], MacCe::CRnti(0x4601));
        // Padding BSR after the data was taken: buffers empty
        assert_eq!(ces[1], MacCe::ShortBsr { lcg: 0, level: 0 });
        assert_eq!(sdu_lens(&pdu), vec![(3, 4)]);
        assert!(mux.last_report().crnti_included);

        // Sent once only
        let bytes = mux.pdu_get(16, &rlc, &mut bsr, &mut timers, None).unwrap();
        assert!(parse(&bytes).ces().all(|ce| !matches!(ce, MacCe::CRnti(_))));
    }

    #[test]
    fn test_msg3_buffer() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        rlc.set_pending(0, 6);
        assert!(mux.is_pending_ccch_sdu(&rlc));

        let first = mux.msg3_get(7, &rlc, &mut bsr, &mut timers).unwrap();
        assert!(mux.msg3_is_transmitted());
        assert!(!mux.is_pending_ccch_sdu(&rlc));
        let again = mux.msg3_get(7, &rlc, &mut bsr, &mut timers).unwrap();
        assert_eq!(first, again);
        assert_eq!(sdu_lens(&parse(&first)), vec![(0, 6)]);

        mux.msg3_flush();
        assert!(!mux.msg3_is_transmitted());
    }

    #[test]
    fn test_msg3_regrant_keeps_ccch() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        bsr.setup_lcg(3, 0, 1);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        mux.set_priority(3, 1, None, 0);
        rlc.set_pending(0, 6);

        let first = mux.msg3_get(7, &rlc, &mut bsr, &mut timers).unwrap();
        assert_eq!(sdu_lens(&parse(&first)), vec![(0, 6)]);
        assert_eq!(rlc.pending(0), 0);

        // Next attempt gets a larger grant while DTCH data arrived
        rlc.set_pending(3, 40);
        let bigger = mux.msg3_get(20, &rlc, &mut bsr, &mut timers).unwrap();
        assert_eq!(bigger.len(), 20);
        let pdu = parse(&bigger);
        assert_eq!(pdu.sdus().collect::<Vec<_>>(), parse(&first).sdus().collect::<Vec<_>>());
        assert!(pdu.ces().any(|ce| matches!(ce, MacCe::ShortBsr { lcg: 0, .. })));
        assert_eq!(rlc.pending(3), 40);
        assert_eq!(mux.msg3(), Some(&bigger[..]));

        // Back to the original size, and too small for the CCCH SDU
        let again = mux.msg3_get(7, &rlc, &mut bsr, &mut timers).unwrap();
        assert_eq!(sdu_lens(&parse(&again)), vec![(0, 6)]);
        assert!(mux.msg3_get(5, &rlc, &mut bsr, &mut timers).is_none());
        assert!(mux.msg3_is_transmitted());
    }

    #[test]
    fn test_msg3_large_grant_padded() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        rlc.set_pending(0, 300);

        let msg3 = mux.msg3_get(MSG3_BUFF_SZ + 72, &rlc, &mut bsr, &mut timers).unwrap();
        assert_eq!(msg3.len(), MSG3_BUFF_SZ + 72);
        let pdu = parse(&msg3);
        let ccch = sdu_lens(&pdu);
        assert_eq!(ccch.len(), 1);
        assert_eq!(ccch[0].0, 0);
        assert!(ccch[0].1 < MSG3_BUFF_SZ);
        assert!(pdu.nof_padding_bytes() >= 64);
    }

    #[test]
    fn test_small_grant() {
        debug::setup_logging_verbose();
        let rlc = FakeRlc::default();
        let mut bsr = BsrProc::new(0, 0);
        let mut timers = MacTimers::new();
        let mut mux = Mux::new();
        mux.set_priority(3, 1, None, 0);
        rlc.set_pending(3, 100);

        let bytes = mux.pdu_get(1, &rlc, &mut bsr, &mut timers, None).unwrap();
        assert_eq!(bytes.len(), 1);
        assert_eq!(rlc.pending(3), 100);
        assert!(matches!(parse(&bytes).subheaders[0].payload, SchPayload::Padding(_)));
    }
}
