use const_format::concatcp;
use git_version::git_version;

pub const GIT_VERSION: &str = git_version!(args = ["--always", "--dirty=-modified"], fallback = "unknown");
pub const STACK_VERSION: &str = concatcp!(env!("CARGO_PKG_VERSION"), "-", GIT_VERSION);

/// Service access points between the entities of the stack
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Sap {
    /// PHY/MAC
    PhySap,
    /// MAC/RLC, logical channels
    MacSap,
    /// RLC/PDCP, radio bearers
    RlcSap,
    /// MAC and RLC to RRC, control indications
    RrcSap,
}

/// Direction of a PDU on the radio interface
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Ul,
    Dl,
}
