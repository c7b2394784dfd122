use lte_core::{ByteBuffer, Lcid};

/// RLC-DATA indication: a reassembled SDU for PDCP, delivered in sequence
#[derive(Debug)]
pub struct RlcDataInd {
    pub lcid: Lcid,
    pub sdu: ByteBuffer,
}

/// BCCH message received on the BCH (MIB)
#[derive(Debug)]
pub struct RlcBcchBchInd {
    pub pdu: ByteBuffer,
}

/// BCCH message received on the DL-SCH (SIBs)
#[derive(Debug)]
pub struct RlcBcchDlschInd {
    pub pdu: ByteBuffer,
}

/// An AM PDU reached the maximum number of retransmissions. RRC is expected
/// to start connection re-establishment.
#[derive(Debug)]
pub struct RlcMaxRetxInd {
    pub lcid: Lcid,
    pub sn: u16,
}
