use core::fmt;

use lte_core::{BitBuffer, PduParseErr, expect_value, let_field};

use crate::rlc::pdus::amd_pdu_header::SO_END_OF_PDU;

/// Upper bound on NACKs accepted in one status PDU
pub const MAX_NOF_NACKS: usize = 512;

/// One NACK_SN entry, optionally limited to a byte range of the PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusNack {
    pub sn: u16,
    /// SOstart and SOend, SOend == 0x7FFF meaning up to the end of the PDU
    pub so: Option<(u16, u16)>,
}

impl StatusNack {
    pub fn whole(sn: u16) -> Self {
        StatusNack { sn, so: None }
    }

    /// Byte range within the data field this NACK covers, given the data field length
    pub fn byte_range(&self, data_len: usize) -> (usize, usize) {
        match self.so {
            None => (0, data_len),
            Some((start, end)) if end == SO_END_OF_PDU => (start as usize, data_len),
            Some((start, end)) => (start as usize, (end as usize + 1).min(data_len)),
        }
    }

    fn packed_bits(&self) -> usize {
        if self.so.is_some() { 12 + 30 } else { 12 }
    }
}

/// 36.322 6.2.1.6: STATUS PDU
/// D/C(1)=0 CPT(3)=0 ACK_SN(10) E1(1) {NACK_SN(10) E1(1) E2(1) [SOstart(15) SOend(15)]}
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusPdu {
    pub ack_sn: u16,
    pub nacks: Vec<StatusNack>,
}

impl StatusPdu {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let_field!(buf, dc, 1);
        expect_value!(dc, 0u64, "dc")?;
        let_field!(buf, cpt, 3);
        expect_value!(cpt, 0u64, "cpt")?;
        let_field!(buf, ack_sn, 10);

        let mut nacks = Vec::new();
        let mut e1 = buf.read_flag("e1")?;
        while e1 {
            if nacks.len() >= MAX_NOF_NACKS {
                return Err(PduParseErr::TooManyElements { field: "nack", max: MAX_NOF_NACKS });
            }
            let_field!(buf, nack_sn, 10);
            e1 = buf.read_flag("e1")?;
            let e2 = buf.read_flag("e2")?;
            let so = if e2 {
                let_field!(buf, so_start, 15);
                let_field!(buf, so_end, 15);
                if so_end != SO_END_OF_PDU as u64 && so_end < so_start {
                    return Err(PduParseErr::Inconsistency { field: "so_end", reason: "smaller than so_start" });
                }
                Some((so_start as u16, so_end as u16))
            } else {
                None
            };
            nacks.push(StatusNack { sn: nack_sn as u16, so });
        }

        Ok(StatusPdu { ack_sn: ack_sn as u16, nacks })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        Self::from_bitbuf(&mut buf)
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bit(0);
        buf.write_zeroes(3);
        buf.write_bits(self.ack_sn as u64, 10);
        buf.write_flag(!self.nacks.is_empty());
        for (i, nack) in self.nacks.iter().enumerate() {
            buf.write_bits(nack.sn as u64, 10);
            buf.write_flag(i + 1 < self.nacks.len());
            buf.write_flag(nack.so.is_some());
            if let Some((start, end)) = nack.so {
                buf.write_bits(start as u64, 15);
                buf.write_bits(end as u64, 15);
            }
        }
        buf.write_align_zeroes();
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BitBuffer::new(self.packed_len() * 8);
        self.to_bitbuf(&mut buf);
        buf.into_bytes()
    }

    /// Length in bytes, including the padding to the next byte boundary
    pub fn packed_len(&self) -> usize {
        let bits = 15 + self.nacks.iter().map(StatusNack::packed_bits).sum::<usize>();
        bits.div_ceil(8)
    }

    /// Drop trailing NACKs until the PDU fits `max_len` bytes. ACK_SN moves down to the
    /// first dropped NACK so nothing unreported is acknowledged. All byte ranges of
    /// that SN go together, no NACK_SN may equal ACK_SN.
    /// Returns false if even the bare ACK does not fit.
    pub fn truncate_to(&mut self, max_len: usize) -> bool {
        while self.packed_len() > max_len {
            let Some(dropped) = self.nacks.pop() else {
                return false;
            };
            self.ack_sn = dropped.sn;
            while self.nacks.last().is_some_and(|n| n.sn == dropped.sn) {
                self.nacks.pop();
            }
        }
        true
    }

    pub fn is_nacked(&self, sn: u16) -> bool {
        self.nacks.iter().any(|n| n.sn == sn)
    }
}

impl fmt::Display for StatusPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STATUS ack_sn: {}", self.ack_sn)?;
        if !self.nacks.is_empty() {
            write!(f, " nacks:")?;
            for nack in &self.nacks {
                match nack.so {
                    Some((start, end)) => write!(f, " {}[{}:{}]", nack.sn, start, end)?,
                    None => write!(f, " {}", nack.sn)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_core::debug;

    #[test]
    fn test_ack_only() {
        debug::setup_logging_verbose();
        let pdu = StatusPdu { ack_sn: 5, nacks: vec![] };
        let bytes = pdu.to_bytes();
        tracing::info!("-> {} {:02x?}", pdu, bytes);
        // 0 000 0000000101 0 0
        assert_eq!(bytes, vec![0x00, 0x14]);
        assert_eq!(StatusPdu::from_bytes(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_nacks_with_segments() {
        debug::setup_logging_verbose();
        let pdu = StatusPdu {
            ack_sn: 10,
            nacks: vec![
                StatusNack::whole(3),
                StatusNack { sn: 7, so: Some((100, SO_END_OF_PDU)) },
                StatusNack::whole(8),
            ],
        };
        // 15 + 12 + 42 + 12 = 81 bits
        assert_eq!(pdu.packed_len(), 11);
        let bytes = pdu.to_bytes();
        tracing::info!("-> {} {:02x?}", pdu, bytes);
        let parsed = StatusPdu::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, pdu);
        assert!(parsed.is_nacked(7));
        assert!(!parsed.is_nacked(9));
        assert_eq!(parsed.nacks[1].byte_range(250), (100, 250));
    }

    #[test]
    fn test_truncate_moves_ack() {
        debug::setup_logging_verbose();
        let mut pdu = StatusPdu {
            ack_sn: 20,
            nacks: vec![StatusNack::whole(3), StatusNack::whole(7), StatusNack::whole(12)],
        };
        // 15 + 36 bits
        assert_eq!(pdu.packed_len(), 7);
        assert!(pdu.truncate_to(4));
        assert_eq!(pdu.nacks, vec![StatusNack::whole(3)]);
        assert_eq!(pdu.ack_sn, 7);
        assert!(pdu.truncate_to(2));
        assert_eq!(pdu.ack_sn, 3);
        assert!(pdu.nacks.is_empty());
        assert!(!pdu.truncate_to(1));
    }

    #[test]
    fn test_truncate_drops_all_ranges_of_sn() {
        debug::setup_logging_verbose();
        let mut pdu = StatusPdu {
            ack_sn: 20,
            nacks: vec![
                StatusNack::whole(3),
                StatusNack { sn: 7, so: Some((0, 9)) },
                StatusNack { sn: 7, so: Some((20, 29)) },
                StatusNack::whole(12),
            ],
        };
        // 15 + 12 + 42 + 42 + 12 = 123 bits
        assert_eq!(pdu.packed_len(), 16);
        assert!(pdu.truncate_to(13));
        assert_eq!(pdu.ack_sn, 7);
        assert_eq!(pdu.nacks, vec![StatusNack::whole(3)]);
        assert!(!pdu.is_nacked(pdu.ack_sn));
    }

    #[test]
    fn test_reject_data_pdu() {
        debug::setup_logging_verbose();
        assert!(StatusPdu::from_bytes(&[0x80, 0x00]).is_err());
        // CPT != 0
        assert!(StatusPdu::from_bytes(&[0x10, 0x00]).is_err());
        // E1 set but NACK cut off
        assert!(StatusPdu::from_bytes(&[0x00, 0x16]).is_err());
    }
}
