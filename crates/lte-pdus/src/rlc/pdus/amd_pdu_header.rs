use core::fmt;

use lte_core::{BitBuffer, PduParseErr, expect_value, let_field};

use crate::rlc::enums::framing_info::FramingInfo;
use crate::rlc::fields::li_list::{li_list_len, read_li_list, write_li_list};

/// 10-bit AM sequence number space
pub const AM_SN_MODULUS: u16 = 1024;
/// Value of SOend meaning "up to the last byte of the AMD PDU"
pub const SO_END_OF_PDU: u16 = 0x7FFF;
/// Fixed part of the AMD PDU header
pub const AMD_FIXED_HEADER_LEN: usize = 2;
/// Extra bytes carried by an AMD PDU segment header
pub const AMD_SEGMENT_HEADER_LEN: usize = 2;

/// True when the first bit (D/C) of an AM PDU marks a control PDU
pub fn is_control_pdu(data: &[u8]) -> bool {
    data.first().is_some_and(|b| b & 0x80 == 0)
}

/// Segment location carried when RF is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmdSegmentInfo {
    /// Last segment flag
    pub lsf: bool,
    /// Segment offset, in bytes, within the data field of the original AMD PDU
    pub so: u16,
}

/// 36.322 6.2.1.4: AMD PDU and AMD PDU segment header
/// D/C(1)=1 RF(1) P(1) FI(2) E(1) SN(10) [LSF(1) SO(15)] {E(1) LI(11)}
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AmdPduHeader {
    pub poll: bool,
    pub fi: FramingInfo,
    pub sn: u16,
    /// Present for re-segmented PDUs (RF=1)
    pub segment: Option<AmdSegmentInfo>,
    pub li: Vec<u16>,
}

impl AmdPduHeader {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let_field!(buf, dc, 1);
        expect_value!(dc, 1u64, "dc")?;
        let rf = buf.read_flag("rf")?;
        let poll = buf.read_flag("p")?;
        let_field!(buf, fi, 2);
        let e = buf.read_flag("e")?;
        let_field!(buf, sn, 10);

        let segment = if rf {
            let lsf = buf.read_flag("lsf")?;
            let_field!(buf, so, 15);
            Some(AmdSegmentInfo { lsf, so: so as u16 })
        } else {
            None
        };

        let li = read_li_list(buf, e)?;

        Ok(AmdPduHeader {
            poll,
            // 2-bit field, always valid
            fi: FramingInfo::try_from(fi).unwrap_or_default(),
            sn: sn as u16,
            segment,
            li,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bit(1);
        buf.write_flag(self.segment.is_some());
        buf.write_flag(self.poll);
        buf.write_bits(self.fi.into_raw(), 2);
        buf.write_flag(!self.li.is_empty());
        buf.write_bits((self.sn % AM_SN_MODULUS) as u64, 10);
        if let Some(seg) = &self.segment {
            buf.write_flag(seg.lsf);
            buf.write_bits(seg.so as u64, 15);
        }
        write_li_list(buf, &self.li);
    }

    /// Header length in bytes
    pub fn packed_len(&self) -> usize {
        Self::len_for(self.segment.is_some(), self.li.len())
    }

    pub fn len_for(is_segment: bool, nof_li: usize) -> usize {
        let seg = if is_segment { AMD_SEGMENT_HEADER_LEN } else { 0 };
        AMD_FIXED_HEADER_LEN + seg + li_list_len(nof_li)
    }

    /// Parse the header and return it together with the data field
    pub fn split(data: &[u8]) -> Result<(Self, &[u8]), PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let hdr = Self::from_bitbuf(&mut buf)?;
        let hdr_len = hdr.packed_len();
        let payload = &data[hdr_len.min(data.len())..];
        let li_sum: usize = hdr.li.iter().map(|l| *l as usize).sum();
        if li_sum >= payload.len() && !hdr.li.is_empty() {
            return Err(PduParseErr::InconsistentLength { expected: li_sum + 1, found: payload.len() });
        }
        if payload.is_empty() {
            return Err(PduParseErr::BufferEnded { field: Some("data") });
        }
        Ok((hdr, payload))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BitBuffer::new(self.packed_len() * 8);
        self.to_bitbuf(&mut buf);
        buf.into_bytes()
    }
}

impl fmt::Display for AmdPduHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AMD sn: {} fi: {} p: {}", self.sn, self.fi, self.poll as u8)?;
        if let Some(seg) = &self.segment {
            write!(f, " so: {} lsf: {}", seg.so, seg.lsf as u8)?;
        }
        if !self.li.is_empty() {
            write!(f, " li: {:?}", self.li)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_core::debug;

    #[test]
    fn test_parse_single_segment() {
        debug::setup_logging_verbose();
        let mut buf = BitBuffer::from_bytes(&[0x88, 0x06]);
        let hdr = AmdPduHeader::from_bitbuf(&mut buf).unwrap();
        tracing::info!("<- {}", hdr);
        assert_eq!(hdr.fi, FramingInfo::FirstSegment);
        assert_eq!(hdr.sn, 6);
        assert!(!hdr.poll);
        assert!(hdr.segment.is_none());
        assert!(hdr.li.is_empty());
        assert_eq!(hdr.packed_len(), 2);
        assert_eq!(hdr.to_bytes(), vec![0x88, 0x06]);
    }

    #[test]
    fn test_parse_li_list() {
        debug::setup_logging_verbose();
        let data = [0x8C, 0x00, 0xDD, 0xCD, 0xDC, 0x5D, 0xC0];
        let mut buf = BitBuffer::from_bytes(&data);
        let hdr = AmdPduHeader::from_bitbuf(&mut buf).unwrap();
        tracing::info!("<- {}", hdr);
        assert_eq!(hdr.fi, FramingInfo::FirstSegment);
        assert_eq!(hdr.sn, 0);
        assert_eq!(hdr.li, vec![1500, 1500, 1500]);
        assert_eq!(hdr.packed_len(), 7);
        assert_eq!(buf.get_pos(), 7 * 8);
        assert_eq!(hdr.to_bytes(), data.to_vec());
    }

    #[test]
    fn test_segment_header() {
        debug::setup_logging_verbose();
        let hdr = AmdPduHeader {
            poll: true,
            fi: FramingInfo::LastSegment,
            sn: 1023,
            segment: Some(AmdSegmentInfo { lsf: true, so: 300 }),
            li: vec![],
        };
        let bytes = hdr.to_bytes();
        // 1 1 1 10 0 11 1111 1111 | 1 000000100101100
        assert_eq!(bytes, vec![0xF3, 0xFF, 0x81, 0x2C]);
        let mut buf = BitBuffer::from_bytes(&bytes);
        assert_eq!(AmdPduHeader::from_bitbuf(&mut buf).unwrap(), hdr);
    }

    #[test]
    fn test_split_rejects_bad_pdus() {
        debug::setup_logging_verbose();
        // Control PDU
        assert!(is_control_pdu(&[0x00, 0x04]));
        assert!(AmdPduHeader::split(&[0x00, 0x04, 0x00]).is_err());
        // Header only
        assert!(AmdPduHeader::split(&[0x80, 0x01]).is_err());
        // LI claims more bytes than carried
        assert!(AmdPduHeader::split(&[0x84, 0x01, 0x00, 0x50, 0xAA]).is_err());
        let (hdr, payload) = AmdPduHeader::split(&[0x80, 0x05, 0xAA, 0xBB]).unwrap();
        assert_eq!(hdr.sn, 5);
        assert_eq!(payload, &[0xAA, 0xBB]);
    }
}
