use lte_config::RlcConfig;
use lte_core::{ByteBuffer, Lcid};

use crate::rlc::metrics::RlcBearerMetrics;
use crate::rlc::rlc_am::RlcAm;
use crate::rlc::rlc_tm::RlcTm;
use crate::rlc::rlc_um::RlcUm;

/// Produced by an entity while its lock is held, passed upward by the layer afterwards
#[derive(Debug, PartialEq, Eq)]
pub enum RlcUpInd {
    /// Reassembled SDU for PDCP
    Sdu(Vec<u8>),
    /// AM PDU with this SN was given up after max_retx_thresh retransmissions
    MaxRetx(u16),
}

/// One RLC entity, per logical channel
pub enum RlcEntity {
    Tm(RlcTm),
    Um(RlcUm),
    Am(RlcAm),
}

impl RlcEntity {
    pub fn new(lcid: Lcid, cfg: &RlcConfig) -> Self {
        match cfg {
            RlcConfig::Tm => RlcEntity::Tm(RlcTm::new(lcid)),
            RlcConfig::Um(um) => RlcEntity::Um(RlcUm::new(lcid, *um)),
            RlcConfig::Am(am) => RlcEntity::Am(RlcAm::new(lcid, *am)),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            RlcEntity::Tm(_) => "TM",
            RlcEntity::Um(_) => "UM",
            RlcEntity::Am(_) => "AM",
        }
    }

    /// Apply `cfg` in place if the mode is unchanged. Returns false on a mode change.
    pub fn reconfigure(&mut self, cfg: &RlcConfig) -> bool {
        match (self, cfg) {
            (RlcEntity::Tm(_), RlcConfig::Tm) => true,
            (RlcEntity::Um(um), RlcConfig::Um(c)) => {
                um.reconfigure(*c);
                true
            }
            (RlcEntity::Am(am), RlcConfig::Am(c)) => {
                am.reconfigure(*c);
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        match self {
            RlcEntity::Tm(e) => e.reset(),
            RlcEntity::Um(e) => e.reset(),
            RlcEntity::Am(e) => e.reset(),
        }
    }

    pub fn write_sdu(&mut self, sdu: ByteBuffer) -> bool {
        match self {
            RlcEntity::Tm(e) => e.write_sdu(sdu),
            RlcEntity::Um(e) => e.write_sdu(sdu),
            RlcEntity::Am(e) => e.write_sdu(sdu),
        }
    }

    pub fn get_buffer_state(&self) -> u32 {
        match self {
            RlcEntity::Tm(e) => e.get_buffer_state(),
            RlcEntity::Um(e) => e.get_buffer_state(),
            RlcEntity::Am(e) => e.get_buffer_state(),
        }
    }

    pub fn read_pdu(&mut self, payload: &mut [u8]) -> usize {
        match self {
            RlcEntity::Tm(e) => e.read_pdu(payload),
            RlcEntity::Um(e) => e.read_pdu(payload),
            RlcEntity::Am(e) => e.read_pdu(payload),
        }
    }

    pub fn write_pdu(&mut self, payload: &[u8], out: &mut Vec<RlcUpInd>) {
        match self {
            RlcEntity::Tm(e) => e.write_pdu(payload, out),
            RlcEntity::Um(e) => e.write_pdu(payload, out),
            RlcEntity::Am(e) => e.write_pdu(payload, out),
        }
    }

    /// Advance entity timers by one TTI
    pub fn tti_tick(&mut self, out: &mut Vec<RlcUpInd>) {
        match self {
            RlcEntity::Tm(_) => {}
            RlcEntity::Um(e) => e.tti_tick(out),
            RlcEntity::Am(e) => e.tti_tick(out),
        }
    }

    pub fn take_metrics(&mut self) -> RlcBearerMetrics {
        match self {
            RlcEntity::Tm(e) => e.metrics.take(),
            RlcEntity::Um(e) => e.metrics.take(),
            RlcEntity::Am(e) => e.metrics.take(),
        }
    }
}
