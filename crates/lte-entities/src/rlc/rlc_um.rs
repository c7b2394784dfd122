use lte_config::RlcUmConfig;
use lte_core::{BitBuffer, ByteBuffer, Lcid, TimerService};
use lte_pdus::rlc::pdus::umd_pdu_header::UmdPduHeader;

use crate::rlc::components::sdu_reassembler::SduReassembler;
use crate::rlc::components::sn_math::{sn_add, sn_sub};
use crate::rlc::components::tx_sdu_queue::TxSduQueue;
use crate::rlc::metrics::RlcBearerMetrics;
use crate::rlc::rlc_entity::RlcUpInd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UmTimer {
    Reordering,
}

struct RxPdu {
    hdr: UmdPduHeader,
    data: Vec<u8>,
}

/// Unacknowledged mode entity, 36.322 5.1.2. Segmentation and concatenation on
/// transmit, reordering and reassembly on receive, no retransmissions.
pub struct RlcUm {
    lcid: Lcid,
    cfg: RlcUmConfig,
    timers: TimerService<UmTimer>,

    // Transmitter
    tx_queue: TxSduQueue,
    /// VT(US), SN of the next UMD PDU
    tx_next: u16,

    // Receiver
    rx_buffer: Vec<Option<RxPdu>>,
    /// VR(UR), earliest SN still considered for reordering
    rx_next: u16,
    /// VR(UX), SN following the one that started t-Reordering
    rx_reordering_sn: u16,
    /// VR(UH), SN following the highest SN received
    rx_next_highest: u16,
    /// SN expected by the reassembler, None before the first delivery
    reasm_next_sn: Option<u16>,
    reassembler: SduReassembler,

    pub metrics: RlcBearerMetrics,
}

impl RlcUm {
    pub fn new(lcid: Lcid, cfg: RlcUmConfig) -> Self {
        let modulus = cfg.rx_sn_bits.modulus() as usize;
        Self {
            lcid,
            cfg,
            timers: TimerService::new(),
            tx_queue: TxSduQueue::new(),
            tx_next: 0,
            rx_buffer: (0..modulus).map(|_| None).collect(),
            rx_next: 0,
            rx_reordering_sn: 0,
            rx_next_highest: 0,
            reasm_next_sn: None,
            reassembler: SduReassembler::new(),
            metrics: RlcBearerMetrics::default(),
        }
    }

    pub fn config(&self) -> &RlcUmConfig {
        &self.cfg
    }

    /// Apply a new configuration. Changing SN lengths restarts the entity.
    pub fn reconfigure(&mut self, cfg: RlcUmConfig) {
        if cfg.rx_sn_bits != self.cfg.rx_sn_bits || cfg.tx_sn_bits != self.cfg.tx_sn_bits {
            *self = RlcUm::new(self.lcid, cfg);
        } else {
            self.cfg = cfg;
        }
    }

    pub fn reset(&mut self) {
        let metrics = self.metrics;
        *self = RlcUm::new(self.lcid, self.cfg);
        self.metrics = metrics;
    }

    fn tx_hdr_len(&self) -> usize {
        UmdPduHeader::len_for(self.cfg.tx_sn_bits.bits(), 0)
    }

    fn rx_modulus(&self) -> u16 {
        self.cfg.rx_sn_bits.modulus() as u16
    }

    fn rx_window(&self) -> u16 {
        self.cfg.rx_sn_bits.window() as u16
    }

    /// Position of `sn` relative to the low edge of the reordering window, VR(UH) - window
    fn rx_rel(&self, sn: u16) -> u16 {
        let base = sn_sub(self.rx_next_highest, self.rx_window(), self.rx_modulus());
        sn_sub(sn, base, self.rx_modulus())
    }

    fn in_reordering_window(&self, sn: u16) -> bool {
        self.rx_rel(sn) < self.rx_window()
    }

    pub fn write_sdu(&mut self, sdu: ByteBuffer) -> bool {
        if !self.cfg.tx_enabled {
            tracing::warn!("lcid {} UM transmitter disabled, dropping SDU", self.lcid);
            self.metrics.dropped += 1;
            return false;
        }
        let len = sdu.len();
        if !self.tx_queue.push(sdu) {
            tracing::warn!("lcid {} tx queue full, dropping {} byte SDU", self.lcid, len);
            self.metrics.dropped += 1;
            return false;
        }
        true
    }

    pub fn get_buffer_state(&self) -> u32 {
        if !self.cfg.tx_enabled {
            return 0;
        }
        self.tx_queue.pending_with_header(self.tx_hdr_len()) as u32
    }

    pub fn read_pdu(&mut self, payload: &mut [u8]) -> usize {
        if !self.cfg.tx_enabled {
            return 0;
        }
        let sn_bits = self.cfg.tx_sn_bits.bits();
        let Some(data) = self.tx_queue.fill(self.tx_hdr_len(), payload.len()) else {
            return 0;
        };

        let hdr = UmdPduHeader { fi: data.fi, sn: self.tx_next, li: data.li };
        let hdr_len = hdr.packed_len(sn_bits);
        let mut buf = BitBuffer::new(hdr_len * 8);
        hdr.to_bitbuf(&mut buf, sn_bits);
        payload[..hdr_len].copy_from_slice(&buf.into_bytes());
        payload[hdr_len..hdr_len + data.payload.len()].copy_from_slice(&data.payload);

        self.tx_next = sn_add(self.tx_next, 1, self.cfg.tx_sn_bits.modulus() as u16);
        let total = hdr_len + data.payload.len();
        self.metrics.tx_bytes += total as u64;
        if hdr.fi.ends_sdu() {
            self.metrics.tx_sdus += 1;
        }
        tracing::debug!("-> lcid {} {} ({} bytes)", self.lcid, hdr, total);
        total
    }

    pub fn write_pdu(&mut self, payload: &[u8], out: &mut Vec<RlcUpInd>) {
        if !self.cfg.rx_enabled {
            tracing::warn!("lcid {} UM receiver disabled, dropping PDU", self.lcid);
            self.metrics.dropped += 1;
            return;
        }
        let (hdr, data) = match UmdPduHeader::split(payload, self.cfg.rx_sn_bits.bits()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("lcid {} malformed UMD PDU: {} {}", self.lcid, e, lte_core::debug::hex(payload));
                self.metrics.dropped += 1;
                return;
            }
        };
        tracing::debug!("<- lcid {} {}", self.lcid, hdr);
        self.metrics.rx_bytes += payload.len() as u64;

        let sn = hdr.sn;
        let rel_sn = self.rx_rel(sn);
        let rel_next = self.rx_rel(self.rx_next);
        let window = self.rx_window();
        let duplicate = rel_next < rel_sn && rel_sn < window && self.rx_buffer[sn as usize].is_some();
        if duplicate || rel_sn < rel_next {
            tracing::debug!("lcid {} discarding UMD PDU sn {} (rx_next {})", self.lcid, sn, self.rx_next);
            self.metrics.dropped += 1;
            return;
        }
        self.rx_buffer[sn as usize] = Some(RxPdu { hdr, data: data.to_vec() });

        let modulus = self.rx_modulus();
        if !self.in_reordering_window(sn) {
            self.rx_next_highest = sn_add(sn, 1, modulus);
            // Everything below the new window is delivered as it stands
            let mut next = self.rx_next;
            while !self.in_reordering_window(next) && next != self.rx_next_highest {
                next = sn_add(next, 1, modulus);
            }
            self.deliver_up_to(next, out);
        }

        if self.rx_buffer[self.rx_next as usize].is_some() {
            let mut next = self.rx_next;
            while self.rx_buffer[next as usize].is_some() && next != self.rx_next_highest {
                next = sn_add(next, 1, modulus);
            }
            self.deliver_up_to(next, out);
        }

        if self.timers.is_running(UmTimer::Reordering) {
            let rel_x = self.rx_rel(self.rx_reordering_sn);
            let outside = !self.in_reordering_window(self.rx_reordering_sn)
                && self.rx_reordering_sn != self.rx_next_highest;
            if rel_x <= self.rx_rel(self.rx_next) || outside {
                self.timers.stop(UmTimer::Reordering);
            }
        }
        self.maybe_start_reordering();
    }

    fn maybe_start_reordering(&mut self) {
        if !self.timers.is_running(UmTimer::Reordering)
            && self.rx_rel(self.rx_next_highest) > self.rx_rel(self.rx_next)
        {
            self.timers.start(UmTimer::Reordering, self.cfg.t_reordering_ms);
            self.rx_reordering_sn = self.rx_next_highest;
        }
    }

    /// Deliver buffered PDUs in SN order from rx_next up to, not including, `new_next`
    fn deliver_up_to(&mut self, new_next: u16, out: &mut Vec<RlcUpInd>) {
        let modulus = self.rx_modulus();
        let mut sdus = Vec::new();
        while self.rx_next != new_next {
            let sn = self.rx_next;
            if let Some(pdu) = self.rx_buffer[sn as usize].take() {
                let contiguous = self.reasm_next_sn.is_none_or(|expected| expected == sn);
                self.reassembler.push(pdu.hdr.fi, &pdu.hdr.li, &pdu.data, contiguous, &mut sdus);
                self.reasm_next_sn = Some(sn_add(sn, 1, modulus));
            }
            self.rx_next = sn_add(sn, 1, modulus);
        }
        for sdu in sdus {
            tracing::debug!("lcid {} delivering {} byte SDU", self.lcid, sdu.len());
            self.metrics.rx_sdus += 1;
            out.push(RlcUpInd::Sdu(sdu));
        }
    }

    fn on_reordering_expiry(&mut self, out: &mut Vec<RlcUpInd>) {
        tracing::debug!("lcid {} t-Reordering expired, rx_next {} reordering_sn {}",
            self.lcid, self.rx_next, self.rx_reordering_sn);
        let modulus = self.rx_modulus();
        let mut next = self.rx_reordering_sn;
        while self.rx_buffer[next as usize].is_some() && next != self.rx_next_highest {
            next = sn_add(next, 1, modulus);
        }
        self.deliver_up_to(next, out);
        self.maybe_start_reordering();
    }

    pub fn tti_tick(&mut self, out: &mut Vec<RlcUpInd>) {
        for timer in self.timers.tick() {
            match timer {
                UmTimer::Reordering => self.on_reordering_expiry(out),
            }
        }
    }

    pub fn rx_next(&self) -> u16 {
        self.rx_next
    }
}
