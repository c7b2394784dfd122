use std::collections::VecDeque;

use lte_core::{ByteBuffer, Lcid, debug};

use crate::rlc::components::tx_sdu_queue::TX_QUEUE_MAX_SDUS;
use crate::rlc::metrics::RlcBearerMetrics;
use crate::rlc::rlc_entity::RlcUpInd;

/// Transparent mode entity. No header and no segmentation: an SDU that does
/// not fit the offered PDU size waits for a larger grant.
pub struct RlcTm {
    lcid: Lcid,
    tx_queue: VecDeque<ByteBuffer>,
    tx_bytes: usize,
    pub metrics: RlcBearerMetrics,
}

impl RlcTm {
    pub fn new(lcid: Lcid) -> Self {
        Self { lcid, tx_queue: VecDeque::new(), tx_bytes: 0, metrics: RlcBearerMetrics::default() }
    }

    pub fn reset(&mut self) {
        self.tx_queue.clear();
        self.tx_bytes = 0;
    }

    pub fn write_sdu(&mut self, sdu: ByteBuffer) -> bool {
        if self.tx_queue.len() >= TX_QUEUE_MAX_SDUS {
            self.metrics.dropped += 1;
            return false;
        }
        tracing::debug!("lcid {} queued {} byte SDU", self.lcid, sdu.len());
        self.tx_bytes += sdu.len();
        self.tx_queue.push_back(sdu);
        true
    }

    pub fn get_buffer_state(&self) -> u32 {
        self.tx_bytes as u32
    }

    pub fn read_pdu(&mut self, payload: &mut [u8]) -> usize {
        let Some(front) = self.tx_queue.front() else {
            return 0;
        };
        let len = front.len();
        if len > payload.len() {
            tracing::info!("lcid {} SDU of {} bytes does not fit {} byte PDU", self.lcid, len, payload.len());
            return 0;
        }
        payload[..len].copy_from_slice(front.as_slice());
        self.tx_queue.pop_front();
        self.tx_bytes -= len;
        self.metrics.tx_sdus += 1;
        self.metrics.tx_bytes += len as u64;
        tracing::debug!("-> TM lcid {} {}", self.lcid, debug::hex(&payload[..len]));
        len
    }

    pub fn write_pdu(&mut self, payload: &[u8], out: &mut Vec<RlcUpInd>) {
        tracing::debug!("<- TM lcid {} {}", self.lcid, debug::hex(payload));
        self.metrics.rx_sdus += 1;
        self.metrics.rx_bytes += payload.len() as u64;
        out.push(RlcUpInd::Sdu(payload.to_vec()));
    }
}
