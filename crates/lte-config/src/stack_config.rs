use std::sync::{Arc, RwLock};

use lte_core::{N_RADIO_BEARERS, Rnti};

use crate::rlc_config::CfgBearer;

#[derive(Debug, Clone)]
pub struct CfgBufferPool {
    pub nof_buffers: usize,
    /// Capacity of each buffer in bytes
    pub buffer_capacity: usize,
    /// Longest wait for a free buffer outside the TTI context
    pub alloc_timeout_ms: u64,
}

impl Default for CfgBufferPool {
    fn default() -> Self {
        Self {
            nof_buffers: 512,
            buffer_capacity: lte_core::buffer_pool::DEFAULT_BUFFER_CAPACITY,
            alloc_timeout_ms: 1,
        }
    }
}

/// Random access parameters, 36.331 RACH-ConfigCommon
#[derive(Debug, Clone)]
pub struct CfgRach {
    pub nof_preambles: u32,
    pub nof_groupa_preambles: u32,
    pub response_window_ms: u32,
    pub preamble_trans_max: u32,
    pub contention_resolution_timer_ms: u32,
    /// Msg3 size in bytes above which a group B preamble is selected
    pub msg3_size_threshold: u32,
}

impl Default for CfgRach {
    fn default() -> Self {
        Self {
            nof_preambles: 64,
            nof_groupa_preambles: 52,
            response_window_ms: 10,
            preamble_trans_max: 10,
            contention_resolution_timer_ms: 64,
            msg3_size_threshold: 56,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CfgMac {
    pub max_harq_msg3_tx: u32,
    pub max_harq_tx: u32,
    /// 0 disables periodic BSR
    pub bsr_periodic_timer_ms: u32,
    pub bsr_retx_timer_ms: u32,
    /// 0 disables periodic PHR
    pub phr_periodic_timer_ms: u32,
    pub phr_prohibit_timer_ms: u32,
    /// 0 means infinity
    pub time_alignment_timer_ms: u32,
    pub sr_trans_max: u32,
    pub rach: CfgRach,
}

impl Default for CfgMac {
    fn default() -> Self {
        Self {
            max_harq_msg3_tx: 5,
            max_harq_tx: 5,
            bsr_periodic_timer_ms: 20,
            bsr_retx_timer_ms: 2560,
            phr_periodic_timer_ms: 20,
            phr_prohibit_timer_ms: 0,
            time_alignment_timer_ms: 0,
            sr_trans_max: 64,
            rach: CfgRach::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CfgPcap {
    pub enable: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StackConfig {
    pub debug_log: Option<String>,
    /// UE identifier written to pcap records
    pub ue_id: u16,

    pub buffer_pool: CfgBufferPool,
    pub mac: CfgMac,

    /// Bearers configured at startup, on top of SRB0
    pub bearers: Vec<CfgBearer>,

    pub pcap: CfgPcap,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StackConfig {
    pub fn new() -> Self {
        StackConfig {
            debug_log: None,
            ue_id: 0,
            buffer_pool: CfgBufferPool::default(),
            mac: CfgMac::default(),
            bearers: Vec::new(),
            pcap: CfgPcap::default(),
        }
    }

    /// Validate that all required configuration fields are properly set.
    pub fn validate(&self) -> Result<(), &str> {
        if self.buffer_pool.nof_buffers == 0 {
            return Err("buffer_pool.nof_buffers must be at least 1");
        }
        if self.buffer_pool.buffer_capacity < 128 {
            return Err("buffer_pool.buffer_capacity must hold at least a Msg3 (128 bytes)");
        }

        let rach = &self.mac.rach;
        if rach.nof_preambles == 0 || rach.nof_preambles > 64 {
            return Err("mac.rach.nof_preambles must be in 1..=64");
        }
        if rach.nof_groupa_preambles == 0 || rach.nof_groupa_preambles > rach.nof_preambles {
            return Err("mac.rach.nof_groupa_preambles must be in 1..=nof_preambles");
        }
        if rach.response_window_ms == 0 {
            return Err("mac.rach.response_window_ms must be nonzero");
        }
        if self.mac.max_harq_tx == 0 || self.mac.max_harq_msg3_tx == 0 {
            return Err("mac harq transmission limits must be nonzero");
        }

        let mut seen = [false; N_RADIO_BEARERS];
        for bearer in &self.bearers {
            let Some(slot) = seen.get_mut(bearer.lcid as usize) else {
                return Err("bearer lcid out of range");
            };
            if bearer.lcid == 0 {
                return Err("lcid 0 is always TM and cannot be configured");
            }
            if *slot {
                return Err("duplicate bearer lcid");
            }
            *slot = true;
            if bearer.lch.lcg > 3 {
                return Err("bearer lcg must be in 0..=3");
            }
        }

        if self.pcap.enable && self.pcap.filename.is_none() {
            return Err("pcap.filename must be set when pcap is enabled");
        }

        Ok(())
    }
}

/// Mutable, stack-editable state (mutex-protected).
#[derive(Debug, Clone, Default)]
pub struct StackState {
    /// C-RNTI assigned by the network, 0 when none
    pub crnti: Rnti,
    pub rrc_connected: bool,
}

/// Global shared configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<StackConfig>,
    /// Mutable state guarded with RwLock (write by the stack, read by others).
    state: Arc<RwLock<StackState>>,
}

impl SharedConfig {
    pub fn new() -> Self {
        Self::from_config(StackConfig::new())
    }

    pub fn from_config(cfg: StackConfig) -> Self {
        Self::from_parts(cfg, StackState::default())
    }

    pub fn from_parts(cfg: StackConfig, state: StackState) -> Self {
        // Check config for validity before returning the SharedConfig object
        match cfg.validate() {
            Ok(_) => {}
            Err(e) => panic!("Invalid stack configuration: {}", e),
        }

        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<StackConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, StackState> {
        self.state.read().expect("StackState RwLock blocked")
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, StackState> {
        self.state.write().expect("StackState RwLock blocked")
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new()
    }
}
