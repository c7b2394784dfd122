use lte_saps::interfaces::PhyInterfaceMac;

/// Scheduling request, 36.321 5.4.4. One SR opportunity per TTI.
pub struct SrProc {
    sr_trans_max: u32,
    sr_counter: u32,
    pending: bool,
}

impl SrProc {
    pub fn new(sr_trans_max: u32) -> Self {
        SrProc { sr_trans_max, sr_counter: 0, pending: false }
    }

    pub fn set_config(&mut self, sr_trans_max: u32) {
        self.sr_trans_max = sr_trans_max;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn sr_counter(&self) -> u32 {
        self.sr_counter
    }

    /// Trigger an SR. A pending SR keeps its counter.
    pub fn start(&mut self) {
        if !self.pending {
            tracing::debug!("SR triggered");
            self.sr_counter = 0;
            self.pending = true;
        }
    }

    /// Cancel the pending SR
    pub fn reset(&mut self) {
        if self.pending {
            tracing::debug!("SR cancelled after {} transmissions", self.sr_counter);
        }
        self.pending = false;
    }

    /// Signal the SR on the PUCCH while the counter allows it. Returns the
    /// counter when the limit is reached: PUCCH resources are released and
    /// random access has to be initiated.
    pub fn step(&mut self, phy: &mut dyn PhyInterfaceMac) -> Option<u32> {
        if !self.pending {
            return None;
        }
        if self.sr_counter < self.sr_trans_max {
            self.sr_counter += 1;
            tracing::debug!("-> SR {}/{}", self.sr_counter, self.sr_trans_max);
            phy.send_sr();
            return None;
        }
        tracing::info!("SR sent {} times without a grant, releasing PUCCH", self.sr_counter);
        self.pending = false;
        Some(self.sr_counter)
    }
}
