use core::fmt;

use lte_core::{BitBuffer, PduParseErr, let_field};

use crate::rlc::enums::framing_info::FramingInfo;
use crate::rlc::fields::li_list::{li_list_len, read_li_list, write_li_list};

/// 36.322 6.2.1.3: UMD PDU header
/// 5-bit SN:  FI(2) E(1) SN(5) {E(1) LI(11)}
/// 10-bit SN: R(3) FI(2) E(1) SN(10) {E(1) LI(11)}
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UmdPduHeader {
    pub fi: FramingInfo,
    pub sn: u16,
    pub li: Vec<u16>,
}

fn fixed_len(sn_bits: usize) -> usize {
    if sn_bits == 5 { 1 } else { 2 }
}

impl UmdPduHeader {
    /// `sn_bits` is 5 or 10, as configured for the entity
    pub fn from_bitbuf(buf: &mut BitBuffer, sn_bits: usize) -> Result<Self, PduParseErr> {
        assert!(sn_bits == 5 || sn_bits == 10);
        if sn_bits == 10 {
            let_field!(buf, _reserved, 3);
        }
        let_field!(buf, fi, 2);
        let e = buf.read_flag("e")?;
        let_field!(buf, sn, sn_bits);
        let li = read_li_list(buf, e)?;
        Ok(UmdPduHeader {
            // 2-bit field, always valid
            fi: FramingInfo::try_from(fi).unwrap_or_default(),
            sn: sn as u16,
            li,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer, sn_bits: usize) {
        assert!(sn_bits == 5 || sn_bits == 10);
        if sn_bits == 10 {
            buf.write_zeroes(3);
        }
        buf.write_bits(self.fi.into_raw(), 2);
        buf.write_flag(!self.li.is_empty());
        buf.write_bits(self.sn as u64 & ((1 << sn_bits) - 1), sn_bits);
        write_li_list(buf, &self.li);
    }

    pub fn packed_len(&self, sn_bits: usize) -> usize {
        Self::len_for(sn_bits, self.li.len())
    }

    pub fn len_for(sn_bits: usize, nof_li: usize) -> usize {
        fixed_len(sn_bits) + li_list_len(nof_li)
    }

    /// Parse the header and return it together with the data field
    pub fn split(data: &[u8], sn_bits: usize) -> Result<(Self, &[u8]), PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let hdr = Self::from_bitbuf(&mut buf, sn_bits)?;
        let payload = &data[hdr.packed_len(sn_bits).min(data.len())..];
        let li_sum: usize = hdr.li.iter().map(|l| *l as usize).sum();
        if !hdr.li.is_empty() && li_sum >= payload.len() {
            return Err(PduParseErr::InconsistentLength { expected: li_sum + 1, found: payload.len() });
        }
        if payload.is_empty() {
            return Err(PduParseErr::BufferEnded { field: Some("data") });
        }
        Ok((hdr, payload))
    }

    pub fn to_bytes(&self, sn_bits: usize) -> Vec<u8> {
        let mut buf = BitBuffer::new(self.packed_len(sn_bits) * 8);
        self.to_bitbuf(&mut buf, sn_bits);
        buf.into_bytes()
    }
}

impl fmt::Display for UmdPduHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UMD sn: {} fi: {}", self.sn, self.fi)?;
        if !self.li.is_empty() {
            write!(f, " li: {:?}", self.li)?;
        }
        Ok(())
    }
}
