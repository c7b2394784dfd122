use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lte_config::{RlcAmConfig, RlcConfig, SharedConfig};
use lte_core::{BufferPool, ByteBuffer, Lcid, LteEntity, N_RADIO_BEARERS, RbId, Sap, Tti, rb_name};
use lte_saps::interfaces::RlcInterfaceMac;
use lte_saps::rlc::{RlcBcchBchInd, RlcBcchDlschInd, RlcDataInd, RlcMaxRetxInd};
use lte_saps::{SapMsg, SapMsgInner, UpperSink};

use crate::rlc::metrics::RlcBearerMetrics;
use crate::rlc::rlc_entity::{RlcEntity, RlcUpInd};

type EntitySlot = Mutex<Option<RlcEntity>>;

/// RLC layer: one entity per configured LCID, each behind its own lock so the
/// TTI context and the upper layers only contend per bearer.
pub struct Rlc {
    self_component: LteEntity,
    config: SharedConfig,
    pool: Arc<BufferPool>,
    sink: UpperSink,
    tti: AtomicU32,
    entities: [EntitySlot; N_RADIO_BEARERS],
}

impl Rlc {
    /// SRB0 is created in TM, followed by every bearer of the configuration
    pub fn new(config: SharedConfig, pool: Arc<BufferPool>, sink: UpperSink) -> Self {
        let rlc = Self {
            self_component: LteEntity::Rlc,
            config,
            pool,
            sink,
            tti: AtomicU32::new(0),
            entities: std::array::from_fn(|_| Mutex::new(None)),
        };
        rlc.add_bearer(RbId::Srb0.into_raw(), &RlcConfig::Tm);
        for bearer in rlc.config.config().bearers.iter() {
            rlc.add_bearer(bearer.lcid, &bearer.rlc);
        }
        rlc
    }

    fn slot(&self, lcid: Lcid) -> Option<MutexGuard<'_, Option<RlcEntity>>> {
        let slot = self.entities.get(lcid as usize)?;
        Some(slot.lock().expect("RLC entity mutex poisoned"))
    }

    fn current_tti(&self) -> Tti {
        Tti::new(self.tti.load(Ordering::Relaxed))
    }

    pub fn add_bearer(&self, lcid: Lcid, cfg: &RlcConfig) {
        if lcid == 0 && *cfg != RlcConfig::Tm {
            tracing::error!("SRB0 is always TM, refusing {} configuration", cfg.mode_name());
            return;
        }
        let Some(mut slot) = self.slot(lcid) else {
            tracing::error!("cannot add bearer, lcid {} out of range", lcid);
            return;
        };
        if let Some(entity) = slot.as_mut() {
            if entity.reconfigure(cfg) {
                tracing::info!("reconfigured {} {}", rb_name(lcid), cfg.mode_name());
                return;
            }
            tracing::warn!("{} changes mode {} -> {}, re-establishing", rb_name(lcid), entity.mode_name(), cfg.mode_name());
        } else {
            tracing::info!("added {} {}", rb_name(lcid), cfg.mode_name());
        }
        *slot = Some(RlcEntity::new(lcid, cfg));
    }

    /// Default SRB configuration, 36.331 9.2.1.1. Only SRB1 and SRB2 have one.
    pub fn add_bearer_default(&self, lcid: Lcid) {
        match RbId::try_from(lcid) {
            Ok(RbId::Srb1) | Ok(RbId::Srb2) => self.add_bearer(lcid, &RlcConfig::Am(RlcAmConfig::default())),
            _ => tracing::error!("no default configuration for {}", rb_name(lcid)),
        }
    }

    pub fn has_bearer(&self, lcid: Lcid) -> bool {
        self.slot(lcid).is_some_and(|slot| slot.is_some())
    }

    /// Remove every bearer but SRB0, which is reset
    pub fn reset(&self) {
        for (lcid, slot) in self.entities.iter().enumerate() {
            let mut slot = slot.lock().expect("RLC entity mutex poisoned");
            if lcid == 0 {
                if let Some(entity) = slot.as_mut() {
                    entity.reset();
                }
            } else {
                *slot = None;
            }
        }
        tracing::info!("RLC reset");
    }

    /// SDU from PDCP
    pub fn write_sdu(&self, lcid: Lcid, sdu: ByteBuffer) {
        match self.slot(lcid) {
            Some(mut slot) => match slot.as_mut() {
                Some(entity) => {
                    entity.write_sdu(sdu);
                }
                None => tracing::warn!("write_sdu on unconfigured {}", rb_name(lcid)),
            },
            None => tracing::warn!("write_sdu on invalid lcid {}", lcid),
        }
    }

    /// Drive all entity timers. Called once per TTI.
    pub fn tti_tick(&self, tti: Tti) {
        self.tti.store(tti.get(), Ordering::Relaxed);
        for lcid in 0..N_RADIO_BEARERS as Lcid {
            let mut inds = Vec::new();
            if let Some(mut slot) = self.slot(lcid) {
                if let Some(entity) = slot.as_mut() {
                    entity.tti_tick(&mut inds);
                }
            }
            self.deliver(lcid, inds);
        }
    }

    /// Counters of every configured bearer since the previous call
    pub fn get_metrics(&self) -> Vec<(Lcid, RlcBearerMetrics)> {
        let mut metrics = Vec::new();
        for lcid in 0..N_RADIO_BEARERS as Lcid {
            if let Some(mut slot) = self.slot(lcid) {
                if let Some(entity) = slot.as_mut() {
                    metrics.push((lcid, entity.take_metrics()));
                }
            }
        }
        metrics
    }

    fn send_up(&self, sap: Sap, dest: LteEntity, msg: SapMsgInner) {
        self.sink.deliver(SapMsg::new(sap, self.self_component, dest, self.current_tti(), msg));
    }

    fn alloc(&self, data: &[u8]) -> Option<ByteBuffer> {
        let buf = self.pool.try_allocate_from(data);
        if buf.is_none() {
            tracing::warn!("no buffer for {} byte SDU, dropping", data.len());
        }
        buf
    }

    /// Pass entity output upward, after the entity lock was released
    fn deliver(&self, lcid: Lcid, inds: Vec<RlcUpInd>) {
        for ind in inds {
            match ind {
                RlcUpInd::Sdu(data) => {
                    if let Some(sdu) = self.alloc(&data) {
                        self.send_up(Sap::RlcSap, LteEntity::Pdcp, SapMsgInner::RlcDataInd(RlcDataInd { lcid, sdu }));
                    }
                }
                RlcUpInd::MaxRetx(sn) => {
                    tracing::warn!("{} max retransmissions reached for sn {}", rb_name(lcid), sn);
                    self.send_up(Sap::RrcSap, LteEntity::Rrc, SapMsgInner::RlcMaxRetxInd(RlcMaxRetxInd { lcid, sn }));
                }
            }
        }
    }
}

impl RlcInterfaceMac for Rlc {
    fn get_buffer_state(&self, lcid: Lcid) -> u32 {
        self.slot(lcid)
            .and_then(|slot| slot.as_ref().map(RlcEntity::get_buffer_state))
            .unwrap_or(0)
    }

    fn read_pdu(&self, lcid: Lcid, payload: &mut [u8]) -> usize {
        match self.slot(lcid) {
            Some(mut slot) => match slot.as_mut() {
                Some(entity) => entity.read_pdu(payload),
                None => {
                    tracing::warn!("read_pdu on unconfigured {}", rb_name(lcid));
                    0
                }
            },
            None => 0,
        }
    }

    fn write_pdu(&self, lcid: Lcid, payload: &[u8]) {
        let mut inds = Vec::new();
        match self.slot(lcid) {
            Some(mut slot) => match slot.as_mut() {
                Some(entity) => entity.write_pdu(payload, &mut inds),
                None => tracing::warn!("write_pdu on unconfigured {}, dropping", rb_name(lcid)),
            },
            None => tracing::warn!("write_pdu on invalid lcid {}, dropping", lcid),
        }
        self.deliver(lcid, inds);
    }

    fn write_pdu_bcch_bch(&self, payload: &[u8]) {
        tracing::debug!("<- BCCH-BCH {} bytes", payload.len());
        if let Some(pdu) = self.alloc(payload) {
            self.send_up(Sap::RrcSap, LteEntity::Rrc, SapMsgInner::RlcBcchBchInd(RlcBcchBchInd { pdu }));
        }
    }

    fn write_pdu_bcch_dlsch(&self, payload: &[u8]) {
        tracing::debug!("<- BCCH-DLSCH {} bytes", payload.len());
        if let Some(pdu) = self.alloc(payload) {
            self.send_up(Sap::RrcSap, LteEntity::Rrc, SapMsgInner::RlcBcchDlschInd(RlcBcchDlschInd { pdu }));
        }
    }
}
