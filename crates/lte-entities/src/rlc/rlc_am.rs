use std::collections::{BTreeSet, VecDeque};

use lte_config::RlcAmConfig;
use lte_core::{ByteBuffer, Lcid, TimerService, debug};
use lte_pdus::rlc::enums::framing_info::FramingInfo;
use lte_pdus::rlc::pdus::amd_pdu_header::{
    AM_SN_MODULUS, AMD_FIXED_HEADER_LEN, AmdPduHeader, AmdSegmentInfo, SO_END_OF_PDU, is_control_pdu,
};
use lte_pdus::rlc::pdus::status_pdu::{StatusNack, StatusPdu};

use crate::rlc::components::sdu_reassembler::SduReassembler;
use crate::rlc::components::sn_math::{sn_add, sn_in_range, sn_sub};
use crate::rlc::components::tx_sdu_queue::TxSduQueue;
use crate::rlc::metrics::RlcBearerMetrics;
use crate::rlc::rlc_entity::RlcUpInd;

/// Half the AM SN space
pub const AM_WINDOW_SIZE: u16 = 512;

const MODULUS: u16 = AM_SN_MODULUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AmTimer {
    PollRetx,
    Reordering,
    StatusProhibit,
}

/// A transmitted AMD PDU kept until acknowledged
struct TxPdu {
    /// Header as first sent, poll cleared
    hdr: AmdPduHeader,
    data: Vec<u8>,
    retx_count: u32,
}

/// Byte range [so_start, so_end) of a PDU data field waiting for retransmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetxItem {
    sn: u16,
    so_start: usize,
    so_end: usize,
}

struct RxSegment {
    so: usize,
    hdr: AmdPduHeader,
    data: Vec<u8>,
}

impl RxSegment {
    fn end(&self) -> usize {
        self.so + self.data.len()
    }

    /// Whether this segment carries the last byte of the PDU
    fn is_last(&self) -> bool {
        self.hdr.segment.is_none_or(|s| s.lsf)
    }
}

/// Received AMD PDU, possibly still missing segments
#[derive(Default)]
struct RxPdu {
    segments: Vec<RxSegment>,
}

impl RxPdu {
    /// Store a PDU or PDU segment. Returns false for bytes already held.
    fn insert(&mut self, hdr: AmdPduHeader, data: &[u8]) -> bool {
        let so = hdr.segment.map_or(0, |s| s.so as usize);
        let end = so + data.len();
        if self.segments.iter().any(|s| s.so <= so && s.end() >= end) {
            return false;
        }
        let pos = self.segments.partition_point(|s| s.so <= so);
        self.segments.insert(pos, RxSegment { so, hdr, data: data.to_vec() });
        true
    }

    /// Length of the data field, once the segment carrying its last byte is in
    fn total_len(&self) -> Option<usize> {
        self.segments.iter().find(|s| s.is_last()).map(|s| s.end())
    }

    fn is_complete(&self) -> bool {
        let Some(total) = self.total_len() else {
            return false;
        };
        let mut covered = 0;
        for seg in &self.segments {
            if seg.so > covered {
                return false;
            }
            covered = covered.max(seg.end());
        }
        covered >= total
    }

    /// Byte ranges not received yet, as (SOstart, SOend) pairs for a status PDU
    fn missing_ranges(&self) -> Vec<(u16, u16)> {
        let mut ranges = Vec::new();
        let mut covered = 0;
        for seg in &self.segments {
            if seg.so > covered {
                ranges.push((covered as u16, (seg.so - 1) as u16));
            }
            covered = covered.max(seg.end());
        }
        match self.total_len() {
            Some(total) if covered < total => ranges.push((covered as u16, (total - 1) as u16)),
            Some(_) => {}
            None => ranges.push((covered as u16, SO_END_OF_PDU)),
        }
        ranges
    }

    /// Merge all segments into one data field with its framing info and LIs
    fn assemble(self) -> (FramingInfo, Vec<u16>, Vec<u8>) {
        let mut data = Vec::new();
        let mut boundaries = BTreeSet::new();
        let mut starts_sdu = true;
        let mut ends_sdu = true;
        for (i, seg) in self.segments.iter().enumerate() {
            if i == 0 {
                starts_sdu = seg.hdr.fi.starts_sdu();
            }
            if seg.is_last() {
                ends_sdu = seg.hdr.fi.ends_sdu();
            }
            if seg.end() > data.len() {
                data.extend_from_slice(&seg.data[data.len() - seg.so..]);
            }
            // SDU boundaries: LIs, plus segment edges that FI marks as SDU edges
            if seg.so > 0 && seg.hdr.fi.starts_sdu() {
                boundaries.insert(seg.so);
            }
            if !seg.is_last() && seg.hdr.fi.ends_sdu() {
                boundaries.insert(seg.end());
            }
            let mut pos = seg.so;
            for li in &seg.hdr.li {
                pos += *li as usize;
                boundaries.insert(pos);
            }
        }
        let mut li = Vec::with_capacity(boundaries.len());
        let mut prev = 0;
        for b in boundaries {
            li.push((b - prev) as u16);
            prev = b;
        }
        (FramingInfo::from_flags(starts_sdu, ends_sdu), li, data)
    }
}

/// Acknowledged mode entity, 36.322 5.1.3 and 5.2.
pub struct RlcAm {
    lcid: Lcid,
    cfg: RlcAmConfig,
    timers: TimerService<AmTimer>,

    // Transmitter
    tx_queue: TxSduQueue,
    /// Sent PDUs not yet acknowledged, indexed by SN
    tx_window: Vec<Option<TxPdu>>,
    retx_queue: VecDeque<RetxItem>,
    /// VT(A), low edge of the transmit window
    tx_ack: u16,
    /// VT(S), SN of the next new PDU
    tx_next: u16,
    /// POLL_SN
    last_poll_sn: u16,
    pdu_without_poll: u32,
    byte_without_poll: u32,
    /// Set by t-PollRetransmit expiry, the next PDU carries a poll
    poll_retx_expired: bool,

    // Receiver
    rx_window: Vec<Option<RxPdu>>,
    /// VR(R), low edge of the receive window
    rx_next: u16,
    /// VR(X), SN following the PDU that started t-Reordering
    rx_reordering_sn: u16,
    /// VR(MS), highest value usable as ACK_SN after reordering
    rx_max_status: u16,
    /// VR(H), SN following the highest SN received
    rx_next_highest: u16,
    reassembler: SduReassembler,
    status_triggered: bool,

    pub metrics: RlcBearerMetrics,
}

impl RlcAm {
    pub fn new(lcid: Lcid, cfg: RlcAmConfig) -> Self {
        Self {
            lcid,
            cfg,
            timers: TimerService::new(),
            tx_queue: TxSduQueue::new(),
            tx_window: (0..MODULUS).map(|_| None).collect(),
            retx_queue: VecDeque::new(),
            tx_ack: 0,
            tx_next: 0,
            last_poll_sn: 0,
            pdu_without_poll: 0,
            byte_without_poll: 0,
            poll_retx_expired: false,
            rx_window: (0..MODULUS).map(|_| None).collect(),
            rx_next: 0,
            rx_reordering_sn: 0,
            rx_max_status: 0,
            rx_next_highest: 0,
            reassembler: SduReassembler::new(),
            status_triggered: false,
            metrics: RlcBearerMetrics::default(),
        }
    }

    pub fn config(&self) -> &RlcAmConfig {
        &self.cfg
    }

    /// New timer and poll parameters apply from the next event
    pub fn reconfigure(&mut self, cfg: RlcAmConfig) {
        self.cfg = cfg;
    }

    pub fn reset(&mut self) {
        let metrics = self.metrics;
        *self = RlcAm::new(self.lcid, self.cfg);
        self.metrics = metrics;
    }

    pub fn tx_ack(&self) -> u16 {
        self.tx_ack
    }

    pub fn tx_next(&self) -> u16 {
        self.tx_next
    }

    /// VT(MS), high edge of the transmit window
    pub fn tx_max_send(&self) -> u16 {
        sn_add(self.tx_ack, AM_WINDOW_SIZE, MODULUS)
    }

    pub fn last_poll_sn(&self) -> u16 {
        self.last_poll_sn
    }

    pub fn rx_next(&self) -> u16 {
        self.rx_next
    }

    /// VR(MR), high edge of the receive window
    pub fn rx_max_accept(&self) -> u16 {
        sn_add(self.rx_next, AM_WINDOW_SIZE, MODULUS)
    }

    /// Highest SN received so far
    pub fn rx_highest(&self) -> u16 {
        sn_sub(self.rx_next_highest, 1, MODULUS)
    }

    pub fn is_tracked(&self, sn: u16) -> bool {
        self.tx_window[sn as usize].is_some()
    }

    pub fn is_queued_for_retx(&self, sn: u16) -> bool {
        self.retx_queue.iter().any(|r| r.sn == sn)
    }

    pub fn status_pending(&self) -> bool {
        self.status_triggered
    }

    /// Entries of `tx_window` outside [tx_ack, tx_next) are always empty
    fn window_stalled(&self) -> bool {
        sn_sub(self.tx_next, self.tx_ack, MODULUS) >= AM_WINDOW_SIZE
    }

    fn status_due(&self) -> bool {
        self.status_triggered && !self.timers.is_running(AmTimer::StatusProhibit)
    }

    pub fn write_sdu(&mut self, sdu: ByteBuffer) -> bool {
        let len = sdu.len();
        if !self.tx_queue.push(sdu) {
            tracing::warn!("lcid {} tx queue full, dropping {} byte SDU", self.lcid, len);
            self.metrics.dropped += 1;
            return false;
        }
        tracing::trace!("lcid {} queued {} byte SDU", self.lcid, len);
        true
    }

    pub fn get_buffer_state(&self) -> u32 {
        let mut bytes = 0;
        if self.status_due() {
            bytes += self.build_status().packed_len();
        }
        for item in &self.retx_queue {
            if let Some(pdu) = &self.tx_window[item.sn as usize] {
                let hdr_len = AmdPduHeader::len_for(true, pdu.hdr.li.len());
                bytes += hdr_len + item.so_end.min(pdu.data.len()).saturating_sub(item.so_start);
            }
        }
        bytes += self.tx_queue.pending_with_header(AMD_FIXED_HEADER_LEN);
        bytes as u32
    }

    /// Build one PDU of at most `payload.len()` bytes: a due status report first,
    /// then retransmissions, then new data.
    pub fn read_pdu(&mut self, payload: &mut [u8]) -> usize {
        let mut written = 0;
        if self.status_due() {
            written = self.write_status(payload);
        }
        if written == 0 && !self.retx_queue.is_empty() {
            written = self.write_retx(payload);
        }
        if written == 0 {
            written = self.write_new(payload);
        }
        self.metrics.tx_bytes += written as u64;
        written
    }

    fn write_status(&mut self, payload: &mut [u8]) -> usize {
        let mut status = self.build_status();
        if !status.truncate_to(payload.len()) {
            return 0;
        }
        let bytes = status.to_bytes();
        payload[..bytes.len()].copy_from_slice(&bytes);
        self.status_triggered = false;
        if self.cfg.t_status_prohibit_ms > 0 {
            self.timers.start(AmTimer::StatusProhibit, self.cfg.t_status_prohibit_ms);
        }
        tracing::debug!("-> lcid {} {}", self.lcid, status);
        bytes.len()
    }

    /// ACK up to VR(H), NACK every PDU or byte range still missing below it
    fn build_status(&self) -> StatusPdu {
        let mut nacks = Vec::new();
        let mut sn = self.rx_next;
        while sn != self.rx_next_highest {
            match &self.rx_window[sn as usize] {
                None => nacks.push(StatusNack::whole(sn)),
                Some(pdu) if !pdu.is_complete() => {
                    for range in pdu.missing_ranges() {
                        nacks.push(StatusNack { sn, so: Some(range) });
                    }
                }
                Some(_) => {}
            }
            sn = sn_add(sn, 1, MODULUS);
        }
        StatusPdu { ack_sn: self.rx_next_highest, nacks }
    }

    fn poll_required(&self) -> bool {
        self.poll_retx_expired
            || (self.tx_queue.is_empty() && self.retx_queue.is_empty())
            || self.window_stalled()
    }

    fn set_poll(&mut self) {
        self.pdu_without_poll = 0;
        self.byte_without_poll = 0;
        self.poll_retx_expired = false;
        self.last_poll_sn = sn_sub(self.tx_next, 1, MODULUS);
        self.timers.start(AmTimer::PollRetx, self.cfg.t_poll_retx_ms);
    }

    fn write_amd(hdr: &AmdPduHeader, data: &[u8], payload: &mut [u8]) -> usize {
        let hdr_bytes = hdr.to_bytes();
        let total = hdr_bytes.len() + data.len();
        payload[..hdr_bytes.len()].copy_from_slice(&hdr_bytes);
        payload[hdr_bytes.len()..total].copy_from_slice(data);
        total
    }

    fn write_new(&mut self, payload: &mut [u8]) -> usize {
        if self.tx_queue.is_empty() {
            return 0;
        }
        if self.window_stalled() {
            tracing::debug!("lcid {} tx window stalled, tx_ack {} tx_next {}", self.lcid, self.tx_ack, self.tx_next);
            return 0;
        }
        let Some(data) = self.tx_queue.fill(AMD_FIXED_HEADER_LEN, payload.len()) else {
            return 0;
        };

        let sn = self.tx_next;
        let mut hdr = AmdPduHeader { poll: false, fi: data.fi, sn, segment: None, li: data.li };
        self.tx_next = sn_add(sn, 1, MODULUS);
        self.pdu_without_poll += 1;
        self.byte_without_poll += data.payload.len() as u32;

        hdr.poll = self.cfg.poll_pdu.is_some_and(|p| self.pdu_without_poll >= p)
            || self.cfg.poll_byte.is_some_and(|b| self.byte_without_poll >= b)
            || self.poll_required();
        if hdr.poll {
            self.set_poll();
        }

        let written = Self::write_amd(&hdr, &data.payload, payload);
        tracing::debug!("-> lcid {} {} ({} bytes)", self.lcid, hdr, written);
        if hdr.fi.ends_sdu() {
            self.metrics.tx_sdus += 1;
        }
        hdr.poll = false;
        self.tx_window[sn as usize] = Some(TxPdu { hdr, data: data.payload, retx_count: 0 });
        written
    }

    fn write_retx(&mut self, payload: &mut [u8]) -> usize {
        let cap = payload.len();
        while let Some(item) = self.retx_queue.front().copied() {
            let Some(pdu) = self.tx_window[item.sn as usize].as_ref() else {
                self.retx_queue.pop_front();
                continue;
            };
            let data_len = pdu.data.len();
            let so_end = item.so_end.min(data_len);
            if item.so_start >= so_end {
                self.retx_queue.pop_front();
                continue;
            }

            // Unchanged PDU if it still fits
            if item.so_start == 0 && so_end == data_len && pdu.hdr.packed_len() + data_len <= cap {
                let mut hdr = pdu.hdr.clone();
                let data = pdu.data.clone();
                self.retx_queue.pop_front();
                hdr.poll = self.poll_required();
                if hdr.poll {
                    self.set_poll();
                }
                let written = Self::write_amd(&hdr, &data, payload);
                tracing::debug!("-> lcid {} retx {} ({} bytes)", self.lcid, hdr, written);
                return written;
            }

            // Re-segment. SDU boundaries inside the segment need LIs, which grow the header.
            let boundaries: Vec<usize> = pdu
                .hdr
                .li
                .iter()
                .scan(0usize, |pos, li| {
                    *pos += *li as usize;
                    Some(*pos)
                })
                .collect();
            let mut nof_li = 0;
            let (end, inner) = loop {
                let hdr_len = AmdPduHeader::len_for(true, nof_li);
                if cap <= hdr_len {
                    return 0;
                }
                let end = so_end.min(item.so_start + cap - hdr_len);
                let inner: Vec<usize> =
                    boundaries.iter().copied().filter(|b| *b > item.so_start && *b < end).collect();
                if inner.len() <= nof_li {
                    break (end, inner);
                }
                nof_li = inner.len();
            };

            let mut li = Vec::with_capacity(inner.len());
            let mut prev = item.so_start;
            for b in inner {
                li.push((b - prev) as u16);
                prev = b;
            }
            let starts_sdu =
                if item.so_start == 0 { pdu.hdr.fi.starts_sdu() } else { boundaries.contains(&item.so_start) };
            let ends_sdu = if end == data_len { pdu.hdr.fi.ends_sdu() } else { boundaries.contains(&end) };
            let mut hdr = AmdPduHeader {
                poll: false,
                fi: FramingInfo::from_flags(starts_sdu, ends_sdu),
                sn: item.sn,
                segment: Some(AmdSegmentInfo { lsf: end == data_len, so: item.so_start as u16 }),
                li,
            };
            let data = pdu.data[item.so_start..end].to_vec();

            if end >= so_end {
                self.retx_queue.pop_front();
            } else if let Some(front) = self.retx_queue.front_mut() {
                front.so_start = end;
            }
            hdr.poll = self.poll_required();
            if hdr.poll {
                self.set_poll();
            }
            let written = Self::write_amd(&hdr, &data, payload);
            tracing::debug!("-> lcid {} retx {} ({} bytes)", self.lcid, hdr, written);
            return written;
        }
        0
    }

    /// Count one more transmission attempt. Returns false if the PDU was given up.
    fn bump_retx(&mut self, sn: u16, out: &mut Vec<RlcUpInd>) -> bool {
        let Some(pdu) = self.tx_window[sn as usize].as_mut() else {
            return false;
        };
        pdu.retx_count += 1;
        if pdu.retx_count > self.cfg.max_retx_thresh {
            tracing::warn!("lcid {} sn {} reached max_retx_thresh {}", self.lcid, sn, self.cfg.max_retx_thresh);
            self.tx_window[sn as usize] = None;
            self.retx_queue.retain(|r| r.sn != sn);
            self.metrics.dropped += 1;
            out.push(RlcUpInd::MaxRetx(sn));
            return false;
        }
        self.metrics.retx_pdus += 1;
        true
    }

    fn queue_retx(&mut self, item: RetxItem) {
        if !self.retx_queue.contains(&item) {
            self.retx_queue.push_back(item);
        }
    }

    fn handle_status(&mut self, status: StatusPdu, out: &mut Vec<RlcUpInd>) {
        let acked = sn_sub(status.ack_sn, self.tx_ack, MODULUS);
        if acked > sn_sub(self.tx_next, self.tx_ack, MODULUS) {
            tracing::warn!("lcid {} ack_sn {} outside [{}, {}]", self.lcid, status.ack_sn, self.tx_ack, self.tx_next);
            return;
        }

        for i in 0..acked {
            let sn = sn_add(self.tx_ack, i, MODULUS);
            let Some(pdu) = &self.tx_window[sn as usize] else {
                continue;
            };
            let data_len = pdu.data.len();
            let nacks: Vec<StatusNack> = status.nacks.iter().filter(|n| n.sn == sn).copied().collect();
            if nacks.is_empty() {
                self.tx_window[sn as usize] = None;
                self.retx_queue.retain(|r| r.sn != sn);
                continue;
            }
            if !self.is_queued_for_retx(sn) && !self.bump_retx(sn, out) {
                continue;
            }
            for nack in nacks {
                let (so_start, so_end) = nack.byte_range(data_len);
                self.queue_retx(RetxItem { sn, so_start, so_end });
            }
        }

        if sn_in_range(self.last_poll_sn, self.tx_ack, acked, MODULUS) {
            self.timers.stop(AmTimer::PollRetx);
        }
        self.advance_tx_ack();
    }

    /// Move tx_ack up to the lowest SN still waiting for an acknowledgement
    fn advance_tx_ack(&mut self) {
        while self.tx_ack != self.tx_next && self.tx_window[self.tx_ack as usize].is_none() {
            self.tx_ack = sn_add(self.tx_ack, 1, MODULUS);
        }
    }

    fn on_poll_retx_expiry(&mut self, out: &mut Vec<RlcUpInd>) {
        let start = self.tx_ack;
        let mut outstanding = false;
        for i in 0..sn_sub(self.tx_next, start, MODULUS) {
            let sn = sn_add(start, i, MODULUS);
            if self.tx_window[sn as usize].is_none() || self.is_queued_for_retx(sn) {
                outstanding |= self.tx_window[sn as usize].is_some();
                continue;
            }
            if self.bump_retx(sn, out) {
                self.retx_queue.push_back(RetxItem { sn, so_start: 0, so_end: usize::MAX });
                outstanding = true;
            }
        }
        self.advance_tx_ack();
        tracing::debug!("lcid {} t-PollRetransmit expired, {} queued for retx", self.lcid, self.retx_queue.len());
        if outstanding {
            self.poll_retx_expired = true;
            self.timers.start(AmTimer::PollRetx, self.cfg.t_poll_retx_ms);
        }
    }

    pub fn write_pdu(&mut self, payload: &[u8], out: &mut Vec<RlcUpInd>) {
        self.metrics.rx_bytes += payload.len() as u64;
        if is_control_pdu(payload) {
            match StatusPdu::from_bytes(payload) {
                Ok(status) => {
                    tracing::debug!("<- lcid {} {}", self.lcid, status);
                    self.handle_status(status, out);
                }
                Err(e) => {
                    tracing::warn!("lcid {} malformed status PDU: {} {}", self.lcid, e, debug::hex(payload));
                    self.metrics.dropped += 1;
                }
            }
            return;
        }

        let (hdr, data) = match AmdPduHeader::split(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("lcid {} malformed AMD PDU: {} {}", self.lcid, e, debug::hex(payload));
                self.metrics.dropped += 1;
                return;
            }
        };
        tracing::debug!("<- lcid {} {}", self.lcid, hdr);
        let sn = hdr.sn;
        let poll = hdr.poll;

        if !sn_in_range(sn, self.rx_next, AM_WINDOW_SIZE, MODULUS) {
            tracing::debug!("lcid {} sn {} outside rx window [{}, {})", self.lcid, sn, self.rx_next, self.rx_max_accept());
            self.metrics.dropped += 1;
            self.status_triggered |= poll;
            return;
        }

        let slot = self.rx_window[sn as usize].get_or_insert_with(RxPdu::default);
        if !slot.insert(hdr, data) {
            tracing::debug!("lcid {} duplicate sn {}", self.lcid, sn);
            self.metrics.dropped += 1;
        }
        let complete = slot.is_complete();

        if sn_sub(sn, self.rx_next, MODULUS) >= sn_sub(self.rx_next_highest, self.rx_next, MODULUS) {
            self.rx_next_highest = sn_add(sn, 1, MODULUS);
        }
        if complete && sn == self.rx_max_status {
            self.rx_max_status = self.first_incomplete_from(sn);
        }
        if complete && sn == self.rx_next {
            self.deliver_in_sequence(out);
        }

        if self.timers.is_running(AmTimer::Reordering) {
            let x = self.rx_reordering_sn;
            let in_window = sn_in_range(x, self.rx_next, AM_WINDOW_SIZE, MODULUS) && x != self.rx_next;
            if x == self.rx_next || (!in_window && x != self.rx_max_accept()) {
                self.timers.stop(AmTimer::Reordering);
            }
        }
        if !self.timers.is_running(AmTimer::Reordering) && self.rx_next_highest != self.rx_next {
            self.timers.start(AmTimer::Reordering, self.cfg.t_reordering_ms);
            self.rx_reordering_sn = self.rx_next_highest;
        }

        self.status_triggered |= poll;
    }

    fn first_incomplete_from(&self, mut sn: u16) -> u16 {
        while sn != self.rx_next_highest
            && self.rx_window[sn as usize].as_ref().is_some_and(RxPdu::is_complete)
        {
            sn = sn_add(sn, 1, MODULUS);
        }
        sn
    }

    /// Advance rx_next over completely received PDUs and pass their data upward
    fn deliver_in_sequence(&mut self, out: &mut Vec<RlcUpInd>) {
        let mut sdus = Vec::new();
        while self.rx_next != self.rx_next_highest
            && self.rx_window[self.rx_next as usize].as_ref().is_some_and(RxPdu::is_complete)
        {
            if let Some(pdu) = self.rx_window[self.rx_next as usize].take() {
                let (fi, li, data) = pdu.assemble();
                self.reassembler.push(fi, &li, &data, true, &mut sdus);
            }
            self.rx_next = sn_add(self.rx_next, 1, MODULUS);
        }
        if sn_sub(self.rx_max_status, self.rx_next, MODULUS) >= AM_WINDOW_SIZE {
            self.rx_max_status = self.rx_next;
        }
        for sdu in sdus {
            tracing::debug!("lcid {} delivering {} byte SDU", self.lcid, sdu.len());
            self.metrics.rx_sdus += 1;
            out.push(RlcUpInd::Sdu(sdu));
        }
    }

    fn on_reordering_expiry(&mut self) {
        self.rx_max_status = self.first_incomplete_from(self.rx_reordering_sn);
        tracing::debug!("lcid {} t-Reordering expired, rx_next {} rx_max_status {}",
            self.lcid, self.rx_next, self.rx_max_status);
        self.status_triggered = true;
        if sn_sub(self.rx_next_highest, self.rx_next, MODULUS) > sn_sub(self.rx_max_status, self.rx_next, MODULUS) {
            self.timers.start(AmTimer::Reordering, self.cfg.t_reordering_ms);
            self.rx_reordering_sn = self.rx_next_highest;
        }
    }

    pub fn tti_tick(&mut self, out: &mut Vec<RlcUpInd>) {
        for timer in self.timers.tick() {
            match timer {
                AmTimer::PollRetx => self.on_poll_retx_expiry(out),
                AmTimer::Reordering => self.on_reordering_expiry(),
                AmTimer::StatusProhibit => tracing::trace!("lcid {} t-StatusProhibit expired", self.lcid),
            }
        }
    }
}
