use serde::Deserialize;

/// RLC mode of a radio bearer, as named in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RlcMode {
    Tm,
    UmBi,
    UmUniUl,
    UmUniDl,
    Am,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmSnBits {
    Size5,
    Size10,
}

impl UmSnBits {
    pub fn bits(self) -> usize {
        match self {
            UmSnBits::Size5 => 5,
            UmSnBits::Size10 => 10,
        }
    }

    pub fn modulus(self) -> u32 {
        1 << self.bits()
    }

    /// Reordering window, half the SN space
    pub fn window(self) -> u32 {
        self.modulus() / 2
    }
}

/// Acknowledged mode parameters, 36.331 RLC-Config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlcAmConfig {
    // Transmitter
    pub t_poll_retx_ms: u32,
    /// PDUs between polls, None is infinity
    pub poll_pdu: Option<u32>,
    /// Bytes between polls, None is infinity
    pub poll_byte: Option<u32>,
    pub max_retx_thresh: u32,

    // Receiver
    pub t_reordering_ms: u32,
    pub t_status_prohibit_ms: u32,
}

impl Default for RlcAmConfig {
    /// Default SRB configuration, 36.331 9.2.1.1
    fn default() -> Self {
        RlcAmConfig {
            t_poll_retx_ms: 45,
            poll_pdu: None,
            poll_byte: None,
            max_retx_thresh: 4,
            t_reordering_ms: 35,
            t_status_prohibit_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlcUmConfig {
    pub tx_sn_bits: UmSnBits,
    pub rx_sn_bits: UmSnBits,
    pub t_reordering_ms: u32,
    pub tx_enabled: bool,
    pub rx_enabled: bool,
}

impl RlcUmConfig {
    pub fn new(mode: RlcMode, sn_bits: UmSnBits, t_reordering_ms: u32) -> Self {
        RlcUmConfig {
            tx_sn_bits: sn_bits,
            rx_sn_bits: sn_bits,
            t_reordering_ms,
            tx_enabled: mode != RlcMode::UmUniDl,
            rx_enabled: mode != RlcMode::UmUniUl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlcConfig {
    Tm,
    Um(RlcUmConfig),
    Am(RlcAmConfig),
}

impl RlcConfig {
    pub fn mode_name(&self) -> &'static str {
        match self {
            RlcConfig::Tm => "TM",
            RlcConfig::Um(_) => "UM",
            RlcConfig::Am(_) => "AM",
        }
    }
}

/// MAC logical channel configuration, 36.331 LogicalChannelConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LchConfig {
    /// Lower value is served first
    pub priority: u32,
    /// Prioritized bit rate in bytes per TTI, None is infinity
    pub pbr: Option<u32>,
    pub bucket_size_duration_ms: u32,
    pub lcg: u8,
}

impl Default for LchConfig {
    fn default() -> Self {
        LchConfig { priority: 1, pbr: None, bucket_size_duration_ms: 0, lcg: 0 }
    }
}

/// A configured radio bearer: RLC entity plus its MAC logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgBearer {
    pub lcid: u32,
    pub rlc: RlcConfig,
    pub lch: LchConfig,
}
