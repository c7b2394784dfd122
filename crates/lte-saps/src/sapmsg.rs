use core::fmt::Display;

use lte_core::{LteEntity, Sap, Tti};

use super::mac::*;
use super::rlc::*;

/// Exhaustive list of primitives passed upward from the MAC/RLC core
#[derive(Debug)]
pub enum SapMsgInner {
    // RLC-SAP
    RlcDataInd(RlcDataInd),
    RlcBcchBchInd(RlcBcchBchInd),
    RlcBcchDlschInd(RlcBcchDlschInd),

    // RRC-SAP, RLC
    RlcMaxRetxInd(RlcMaxRetxInd),

    // RRC-SAP, MAC
    MacRaCompleteInd(MacRaCompleteInd),
    MacRaProblemInd(MacRaProblemInd),
    MacSrReleaseInd(MacSrReleaseInd),
    MacTaExpiredInd(MacTaExpiredInd),
}

impl Display for SapMsgInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SapMsgInner::RlcDataInd(_) => write!(f, "RlcDataInd"),
            SapMsgInner::RlcBcchBchInd(_) => write!(f, "RlcBcchBchInd"),
            SapMsgInner::RlcBcchDlschInd(_) => write!(f, "RlcBcchDlschInd"),
            SapMsgInner::RlcMaxRetxInd(_) => write!(f, "RlcMaxRetxInd"),
            SapMsgInner::MacRaCompleteInd(_) => write!(f, "MacRaCompleteInd"),
            SapMsgInner::MacRaProblemInd(_) => write!(f, "MacRaProblemInd"),
            SapMsgInner::MacSrReleaseInd(_) => write!(f, "MacSrReleaseInd"),
            SapMsgInner::MacTaExpiredInd(_) => write!(f, "MacTaExpiredInd"),
        }
    }
}

#[derive(Debug)]
pub struct SapMsg {
    pub sap: Sap,
    pub src: LteEntity,
    pub dest: LteEntity,
    /// TTI at the time the message was created
    pub tti: Tti,

    pub msg: SapMsgInner,
}

impl SapMsg {
    pub fn new(sap: Sap, src: LteEntity, dest: LteEntity, tti: Tti, msg: SapMsgInner) -> Self {
        Self { sap, src, dest, tti, msg }
    }

    pub fn get_source(&self) -> &LteEntity {
        &self.src
    }
    pub fn get_dest(&self) -> &LteEntity {
        &self.dest
    }
    pub fn get_sap(&self) -> &Sap {
        &self.sap
    }
}
