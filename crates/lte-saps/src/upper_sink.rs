use crossbeam_channel::{Sender, TrySendError};

use crate::SapMsg;

/// Producer end of a bounded queue toward the upper layers. Never blocks:
/// the TTI context must not wait on PDCP/RRC.
#[derive(Clone)]
pub struct UpperSink {
    tx: Sender<SapMsg>,
}

impl UpperSink {
    pub fn new(tx: Sender<SapMsg>) -> Self {
        Self { tx }
    }

    /// Queue a primitive. Returns false if it was dropped.
    pub fn deliver(&self, msg: SapMsg) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                tracing::warn!("upper layer queue full, dropping {} for {:?}", msg.msg, msg.dest);
                false
            }
            Err(TrySendError::Disconnected(msg)) => {
                tracing::error!("upper layer gone, dropping {} for {:?}", msg.msg, msg.dest);
                false
            }
        }
    }
}
