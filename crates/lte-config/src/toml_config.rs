use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use super::rlc_config::{CfgBearer, LchConfig, RlcAmConfig, RlcConfig, RlcMode, RlcUmConfig, UmSnBits};
use super::stack_config::{CfgBufferPool, CfgMac, CfgPcap, CfgRach, SharedConfig, StackConfig, StackState};

/// Build `SharedConfig` from a TOML configuration file
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "0.1";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref bp) = root.buffer_pool {
        if !bp.extra.is_empty() {
            return Err(format!("Unrecognized fields: buffer_pool::{:?}", sorted_keys(&bp.extra)).into());
        }
    }
    if let Some(ref mac) = root.mac {
        if !mac.extra.is_empty() {
            return Err(format!("Unrecognized fields: mac::{:?}", sorted_keys(&mac.extra)).into());
        }
        if let Some(ref rach) = mac.rach {
            if !rach.extra.is_empty() {
                return Err(format!("Unrecognized fields: mac.rach::{:?}", sorted_keys(&rach.extra)).into());
            }
        }
    }
    for bearer in &root.bearer {
        if !bearer.extra.is_empty() {
            return Err(format!("Unrecognized fields in bearer {}: {:?}", bearer.lcid, sorted_keys(&bearer.extra)).into());
        }
    }
    if let Some(ref pcap) = root.pcap {
        if !pcap.extra.is_empty() {
            return Err(format!("Unrecognized fields in pcap: {:?}", sorted_keys(&pcap.extra)).into());
        }
    }
    if let Some(ref ss) = root.stack_state {
        if !ss.extra.is_empty() {
            return Err(format!("Unrecognized fields in stack_state: {:?}", sorted_keys(&ss.extra)).into());
        }
    }

    // Build config from required and optional values
    let mut cfg = StackConfig {
        debug_log: root.debug_log,
        ue_id: root.ue_id.unwrap_or(0),
        buffer_pool: CfgBufferPool::default(),
        mac: CfgMac::default(),
        bearers: Vec::with_capacity(root.bearer.len()),
        pcap: CfgPcap::default(),
    };

    if let Some(bp) = root.buffer_pool {
        apply_buffer_pool_patch(&mut cfg.buffer_pool, bp);
    }
    if let Some(mac) = root.mac {
        apply_mac_patch(&mut cfg.mac, mac);
    }
    for bearer in root.bearer {
        cfg.bearers.push(bearer_from_dto(bearer)?);
    }
    if let Some(pcap) = root.pcap {
        cfg.pcap.enable = pcap.enable;
        cfg.pcap.filename = pcap.filename;
    }

    let mut state = StackState::default();
    if let Some(ss) = root.stack_state {
        if let Some(v) = ss.crnti {
            state.crnti = v;
        }
    }

    // Report validation problems as errors instead of letting from_parts panic
    cfg.validate().map_err(|e| format!("Invalid stack configuration: {}", e))?;

    Ok(SharedConfig::from_parts(cfg, state))
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn apply_buffer_pool_patch(dst: &mut CfgBufferPool, src: BufferPoolDto) {
    if let Some(v) = src.nof_buffers {
        dst.nof_buffers = v;
    }
    if let Some(v) = src.buffer_capacity {
        dst.buffer_capacity = v;
    }
    if let Some(v) = src.alloc_timeout_ms {
        dst.alloc_timeout_ms = v;
    }
}

fn apply_mac_patch(dst: &mut CfgMac, src: MacDto) {
    if let Some(v) = src.max_harq_msg3_tx {
        dst.max_harq_msg3_tx = v;
    }
    if let Some(v) = src.max_harq_tx {
        dst.max_harq_tx = v;
    }
    if let Some(v) = src.bsr_periodic_timer_ms {
        dst.bsr_periodic_timer_ms = v;
    }
    if let Some(v) = src.bsr_retx_timer_ms {
        dst.bsr_retx_timer_ms = v;
    }
    if let Some(v) = src.phr_periodic_timer_ms {
        dst.phr_periodic_timer_ms = v;
    }
    if let Some(v) = src.phr_prohibit_timer_ms {
        dst.phr_prohibit_timer_ms = v;
    }
    if let Some(v) = src.time_alignment_timer_ms {
        dst.time_alignment_timer_ms = v;
    }
    if let Some(v) = src.sr_trans_max {
        dst.sr_trans_max = v;
    }
    if let Some(rach) = src.rach {
        apply_rach_patch(&mut dst.rach, rach);
    }
}

fn apply_rach_patch(dst: &mut CfgRach, src: RachDto) {
    if let Some(v) = src.nof_preambles {
        dst.nof_preambles = v;
    }
    if let Some(v) = src.nof_groupa_preambles {
        dst.nof_groupa_preambles = v;
    }
    if let Some(v) = src.response_window_ms {
        dst.response_window_ms = v;
    }
    if let Some(v) = src.preamble_trans_max {
        dst.preamble_trans_max = v;
    }
    if let Some(v) = src.contention_resolution_timer_ms {
        dst.contention_resolution_timer_ms = v;
    }
    if let Some(v) = src.msg3_size_threshold {
        dst.msg3_size_threshold = v;
    }
}

fn bearer_from_dto(src: BearerDto) -> Result<CfgBearer, Box<dyn std::error::Error>> {
    let am_defaults = RlcAmConfig::default();
    let rlc = match src.mode {
        RlcMode::Tm => RlcConfig::Tm,
        RlcMode::Am => RlcConfig::Am(RlcAmConfig {
            t_poll_retx_ms: src.t_poll_retx_ms.unwrap_or(am_defaults.t_poll_retx_ms),
            poll_pdu: src.poll_pdu,
            poll_byte: src.poll_byte,
            max_retx_thresh: src.max_retx_thresh.unwrap_or(am_defaults.max_retx_thresh),
            t_reordering_ms: src.t_reordering_ms.unwrap_or(am_defaults.t_reordering_ms),
            t_status_prohibit_ms: src.t_status_prohibit_ms.unwrap_or(am_defaults.t_status_prohibit_ms),
        }),
        RlcMode::UmBi | RlcMode::UmUniUl | RlcMode::UmUniDl => {
            let sn_bits = match src.um_sn_bits.unwrap_or(10) {
                5 => UmSnBits::Size5,
                10 => UmSnBits::Size10,
                other => return Err(format!("bearer {}: um_sn_bits must be 5 or 10, got {}", src.lcid, other).into()),
            };
            RlcConfig::Um(RlcUmConfig::new(src.mode, sn_bits, src.t_reordering_ms.unwrap_or(35)))
        }
    };

    let lch_defaults = LchConfig::default();
    let lch = LchConfig {
        priority: src.priority.unwrap_or(lch_defaults.priority),
        pbr: src.pbr_bytes_per_tti,
        bucket_size_duration_ms: src.bucket_size_duration_ms.unwrap_or(lch_defaults.bucket_size_duration_ms),
        lcg: src.lcg.unwrap_or(lch_defaults.lcg),
    };

    Ok(CfgBearer { lcid: src.lcid, rlc, lch })
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,
    ue_id: Option<u16>,

    #[serde(default)]
    buffer_pool: Option<BufferPoolDto>,

    #[serde(default)]
    mac: Option<MacDto>,

    #[serde(default)]
    bearer: Vec<BearerDto>,

    #[serde(default)]
    pcap: Option<PcapDto>,

    #[serde(default)]
    stack_state: Option<StackStatePatch>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct BufferPoolDto {
    nof_buffers: Option<usize>,
    buffer_capacity: Option<usize>,
    alloc_timeout_ms: Option<u64>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct MacDto {
    max_harq_msg3_tx: Option<u32>,
    max_harq_tx: Option<u32>,
    bsr_periodic_timer_ms: Option<u32>,
    bsr_retx_timer_ms: Option<u32>,
    phr_periodic_timer_ms: Option<u32>,
    phr_prohibit_timer_ms: Option<u32>,
    time_alignment_timer_ms: Option<u32>,
    sr_trans_max: Option<u32>,

    #[serde(default)]
    rach: Option<RachDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct RachDto {
    nof_preambles: Option<u32>,
    nof_groupa_preambles: Option<u32>,
    response_window_ms: Option<u32>,
    preamble_trans_max: Option<u32>,
    contention_resolution_timer_ms: Option<u32>,
    msg3_size_threshold: Option<u32>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct BearerDto {
    lcid: u32,
    mode: RlcMode,

    priority: Option<u32>,
    pbr_bytes_per_tti: Option<u32>,
    bucket_size_duration_ms: Option<u32>,
    lcg: Option<u8>,

    t_poll_retx_ms: Option<u32>,
    poll_pdu: Option<u32>,
    poll_byte: Option<u32>,
    max_retx_thresh: Option<u32>,
    t_reordering_ms: Option<u32>,
    t_status_prohibit_ms: Option<u32>,
    um_sn_bits: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct PcapDto {
    #[serde(default)]
    enable: bool,
    filename: Option<String>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct StackStatePatch {
    pub crnti: Option<u16>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
