use crossbeam_channel::{Receiver, bounded};
use lte_saps::{SapMsg, UpperSink};

/// Upper layer end of the queue, collects everything the MAC and RLC deliver
pub struct UpperRx {
    rx: Receiver<SapMsg>,
}

impl UpperRx {
    pub fn new(depth: usize) -> (UpperSink, Self) {
        let (tx, rx) = bounded(depth);
        (UpperSink::new(tx), Self { rx })
    }

    pub fn take_msgs(&self) -> Vec<SapMsg> {
        let msgs: Vec<SapMsg> = self.rx.try_iter().collect();
        for m in msgs.iter() {
            tracing::debug!("upper rx: {} from {:?} to {:?}", m.msg, m.src, m.dest);
        }
        msgs
    }
}
