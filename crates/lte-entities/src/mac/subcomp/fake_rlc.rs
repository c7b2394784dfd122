use std::sync::Mutex;

use lte_core::{Lcid, N_RADIO_BEARERS};
use lte_saps::interfaces::RlcInterfaceMac;

/// RLC stand-in: each LCID holds a byte count of pending data, filled with the LCID value
#[derive(Default)]
pub(crate) struct FakeRlc {
    pending: Mutex<[u32; N_RADIO_BEARERS]>,
    pub received: Mutex<Vec<(Lcid, Vec<u8>)>>,
    pub bcch: Mutex<Vec<Vec<u8>>>,
}

impl FakeRlc {
    pub fn set_pending(&self, lcid: Lcid, nof_bytes: u32) {
        self.pending.lock().unwrap()[lcid as usize] = nof_bytes;
    }

    pub fn pending(&self, lcid: Lcid) -> u32 {
        self.pending.lock().unwrap()[lcid as usize]
    }
}

impl RlcInterfaceMac for FakeRlc {
    fn get_buffer_state(&self, lcid: Lcid) -> u32 {
        self.pending.lock().unwrap().get(lcid as usize).copied().unwrap_or(0)
    }

    fn read_pdu(&self, lcid: Lcid, payload: &mut [u8]) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let Some(left) = pending.get_mut(lcid as usize) else {
            return 0;
        };
        let n = payload.len().min(*left as usize);
        payload[..n].fill(lcid as u8);
        *left -= n as u32;
        n
    }

    fn write_pdu(&self, lcid: Lcid, payload: &[u8]) {
        self.received.lock().unwrap().push((lcid, payload.to_vec()));
    }

    fn write_pdu_bcch_bch(&self, payload: &[u8]) {
        self.bcch.lock().unwrap().push(payload.to_vec());
    }

    fn write_pdu_bcch_dlsch(&self, payload: &[u8]) {
        self.bcch.lock().unwrap().push(payload.to_vec());
    }
}
