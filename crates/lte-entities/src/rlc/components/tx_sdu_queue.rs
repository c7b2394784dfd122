use std::collections::VecDeque;

use lte_core::ByteBuffer;
use lte_pdus::rlc::enums::framing_info::FramingInfo;
use lte_pdus::rlc::fields::li_list::{LI_MAX, li_list_len};

/// SDUs queued per entity before new ones are refused
pub const TX_QUEUE_MAX_SDUS: usize = 256;

/// Data field of one UMD or AMD PDU, cut from the SDU queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduData {
    pub fi: FramingInfo,
    pub li: Vec<u16>,
    pub payload: Vec<u8>,
}

/// Transmit SDU queue shared by UM and AM. Tracks how much of the front SDU
/// went out already so SDUs can be segmented over several PDUs.
#[derive(Debug, Default)]
pub struct TxSduQueue {
    sdus: VecDeque<ByteBuffer>,
    /// Bytes of the front SDU already sent
    offset: usize,
    /// Unsent bytes over all SDUs
    bytes: usize,
}

impl TxSduQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an SDU. Returns false, dropping the SDU, when the queue is full.
    pub fn push(&mut self, sdu: ByteBuffer) -> bool {
        if self.sdus.len() >= TX_QUEUE_MAX_SDUS {
            return false;
        }
        if sdu.is_empty() {
            return true;
        }
        self.bytes += sdu.len();
        self.sdus.push_back(sdu);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.sdus.is_empty()
    }

    pub fn nof_sdus(&self) -> usize {
        self.sdus.len()
    }

    pub fn nof_bytes(&self) -> usize {
        self.bytes
    }

    pub fn clear(&mut self) {
        self.sdus.clear();
        self.offset = 0;
        self.bytes = 0;
    }

    /// Bytes needed to send everything queued in a single PDU with a `fixed_hdr` byte header
    pub fn pending_with_header(&self, fixed_hdr: usize) -> usize {
        if self.sdus.is_empty() {
            return 0;
        }
        fixed_hdr + li_list_len(self.sdus.len() - 1) + self.bytes
    }

    /// Cut the data field of the next PDU, of at most `cap` bytes including a header of
    /// `fixed_hdr` bytes plus the length indicators. SDUs are concatenated while space remains.
    pub fn fill(&mut self, fixed_hdr: usize, cap: usize) -> Option<PduData> {
        if self.sdus.is_empty() || cap <= fixed_hdr {
            return None;
        }

        let starts_sdu = self.offset == 0;
        let mut ends_sdu = false;
        let mut remaining = cap - fixed_hdr;
        let mut li: Vec<u16> = Vec::new();
        let mut payload = Vec::with_capacity(remaining.min(self.bytes));
        // Length of the last element in this PDU, becomes an LI once another one follows
        let mut last_part = 0usize;

        while let Some(front) = self.sdus.front() {
            if !payload.is_empty() {
                // Another element needs an LI for the previous one
                let extra = li_list_len(li.len() + 1) - li_list_len(li.len());
                if last_part > LI_MAX as usize || remaining <= extra {
                    break;
                }
                remaining -= extra;
                li.push(last_part as u16);
            }

            let left = front.len() - self.offset;
            let take = left.min(remaining);
            payload.extend_from_slice(&front.as_slice()[self.offset..self.offset + take]);
            remaining -= take;
            self.bytes -= take;
            last_part = take;

            if take == left {
                self.sdus.pop_front();
                self.offset = 0;
                ends_sdu = true;
            } else {
                self.offset += take;
                ends_sdu = false;
                break;
            }
            if remaining == 0 {
                break;
            }
        }

        Some(PduData { fi: FramingInfo::from_flags(starts_sdu, ends_sdu), li, payload })
    }
}
