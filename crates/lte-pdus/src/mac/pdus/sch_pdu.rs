use core::fmt;

use lte_core::{BitBuffer, Direction, Lcid, PduParseErr, let_field};

use crate::mac::enums::dl_ce_type::{DL_CE_LCID_MIN, DlCeType};
use crate::mac::enums::ul_ce_type::{UL_CE_LCID_MIN, UlCeType};
use crate::mac::fields::mac_ce::MacCe;
use crate::mac::pdus::sch_pdu_builder::{MAX_NOF_SUBHEADERS, PADDING_LCID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchPayload {
    Sdu(Vec<u8>),
    Ce(MacCe),
    /// Padding subheader and the number of padding bytes it covers
    Padding(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchSubheader {
    pub lcid: Lcid,
    pub payload: SchPayload,
}

impl SchSubheader {
    pub fn is_sdu(&self) -> bool {
        matches!(self.payload, SchPayload::Sdu(_))
    }
}

/// Parsed UL-SCH or DL-SCH transport block, 36.321 6.1.2
#[derive(Debug, Clone)]
pub struct SchPdu {
    pub dir: Direction,
    pub subheaders: Vec<SchSubheader>,
}

/// Subheader as read from the header, before its payload
struct RawSubheader {
    lcid: u32,
    is_ce: bool,
    /// None for the last subheader of an SDU or multi-byte padding: takes all remaining bytes
    len: Option<usize>,
}

impl SchPdu {
    pub fn from_bytes(dir: Direction, data: &[u8]) -> Result<Self, PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let ce_lcid_min = match dir {
            Direction::Ul => UL_CE_LCID_MIN,
            Direction::Dl => DL_CE_LCID_MIN,
        };

        // Walk the header until the subheader with E=0
        let mut raw = Vec::new();
        loop {
            if raw.len() >= MAX_NOF_SUBHEADERS + 2 {
                return Err(PduParseErr::TooManyElements { field: "subheaders", max: MAX_NOF_SUBHEADERS + 2 });
            }
            let_field!(buf, _reserved, 2);
            let more = buf.read_flag("e")?;
            let_field!(buf, lcid, 5);
            let lcid = lcid as u32;

            let is_ce = lcid >= ce_lcid_min;
            let len = if lcid == PADDING_LCID {
                if more { Some(0) } else { None }
            } else if is_ce {
                Some(ce_payload_size(dir, lcid)?)
            } else if more {
                let f = buf.read_flag("f")?;
                let l = buf.read_field(if f { 15 } else { 7 }, "l")?;
                Some(l as usize)
            } else {
                None
            };
            raw.push(RawSubheader { lcid, is_ce, len });
            if !more {
                break;
            }
        }

        let header_len = buf.get_pos() / 8;
        let declared: usize = raw.iter().filter_map(|r| r.len).sum();
        let Some(rest) = data.len().checked_sub(header_len + declared) else {
            return Err(PduParseErr::InconsistentLength { expected: header_len + declared, found: data.len() });
        };
        let last_takes_rest = raw.last().map(|r| r.len.is_none()).unwrap_or(false);
        if rest > 0 && !last_takes_rest {
            return Err(PduParseErr::InconsistentLength { expected: header_len + declared, found: data.len() });
        }

        let mut subheaders = Vec::with_capacity(raw.len());
        for r in raw {
            let len = r.len.unwrap_or(rest);
            let payload = if r.lcid == PADDING_LCID {
                buf.seek(buf.get_pos() + len * 8);
                SchPayload::Padding(len)
            } else if r.is_ce {
                match MacCe::from_bitbuf(dir, r.lcid, &mut buf)? {
                    Some(ce) => SchPayload::Ce(ce),
                    None => SchPayload::Padding(len),
                }
            } else {
                let mut sdu = vec![0u8; len];
                buf.read_bytes_into(&mut sdu)?;
                SchPayload::Sdu(sdu)
            };
            subheaders.push(SchSubheader { lcid: r.lcid, payload });
        }

        Ok(SchPdu { dir, subheaders })
    }

    /// SDUs in header order
    pub fn sdus(&self) -> impl Iterator<Item = (Lcid, &[u8])> {
        self.subheaders.iter().filter_map(|s| match &s.payload {
            SchPayload::Sdu(data) => Some((s.lcid, data.as_slice())),
            _ => None,
        })
    }

    pub fn ces(&self) -> impl Iterator<Item = &MacCe> {
        self.subheaders.iter().filter_map(|s| match &s.payload {
            SchPayload::Ce(ce) => Some(ce),
            _ => None,
        })
    }

    pub fn nof_padding_bytes(&self) -> usize {
        self.subheaders
            .iter()
            .map(|s| match s.payload {
                SchPayload::Padding(n) => n,
                _ => 0,
            })
            .sum()
    }
}

fn ce_payload_size(dir: Direction, lcid: u32) -> Result<usize, PduParseErr> {
    let size = match dir {
        Direction::Ul => UlCeType::try_from(lcid as u64).map(|t| t.payload_size()),
        Direction::Dl => DlCeType::try_from(lcid as u64).map(|t| t.payload_size()),
    };
    size.map_err(|_| PduParseErr::InvalidValue { field: "ce_lcid", value: lcid as u64 })
}

impl fmt::Display for SchPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}-SCH {{", self.dir)?;
        for s in &self.subheaders {
            match &s.payload {
                SchPayload::Sdu(data) => write!(f, " [lcid {}: {} bytes]", s.lcid, data.len())?,
                SchPayload::Ce(ce) => write!(f, " [{}]", ce)?,
                SchPayload::Padding(n) => write!(f, " [padding {}]", n)?,
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use lte_core::debug;

    use super::*;

    #[test]
    fn test_parse_ccch_phr_bsr() {
        debug::setup_logging_verbose();
        let bytes = [0x3a, 0x3d, 0x00, 0x21, 0xc1, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60];
        let pdu = SchPdu::from_bytes(Direction::Ul, &bytes).unwrap();
        tracing::info!("Parsed: {}", pdu);
        assert_eq!(pdu.subheaders.len(), 3);
        assert_eq!(pdu.subheaders[0].payload, SchPayload::Ce(MacCe::Phr { level: 33 }));
        assert_eq!(pdu.subheaders[1].payload, SchPayload::Ce(MacCe::ShortBsr { lcg: 3, level: 1 }));
        assert_eq!(pdu.sdus().collect::<Vec<_>>(), vec![(0, &bytes[5..])]);
    }

    #[test]
    fn test_parse_two_byte_length() {
        debug::setup_logging_verbose();
        // lcid 3 with 200 bytes, then lcid 4 taking the remaining 5
        let mut bytes = vec![0x23, 0x80, 200, 0x04];
        bytes.extend(std::iter::repeat_n(0xaa, 200));
        bytes.extend([1, 2, 3, 4, 5]);
        let pdu = SchPdu::from_bytes(Direction::Dl, &bytes).unwrap();
        let sdus: Vec<_> = pdu.sdus().collect();
        assert_eq!(sdus.len(), 2);
        assert_eq!(sdus[0].0, 3);
        assert_eq!(sdus[0].1.len(), 200);
        assert_eq!(sdus[1], (4, &[1u8, 2, 3, 4, 5][..]));
    }

    #[test]
    fn test_parse_malformed() {
        debug::setup_logging_verbose();
        // Declared length beyond the end of the transport block
        assert_eq!(
            SchPdu::from_bytes(Direction::Dl, &[0x23, 0x10, 0x04, 1, 2]).err(),
            Some(PduParseErr::InconsistentLength { expected: 19, found: 5 })
        );
        // Header never terminates
        assert!(SchPdu::from_bytes(Direction::Ul, &[0x3f, 0x3f]).is_err());
        // Length field cut off
        assert_eq!(
            SchPdu::from_bytes(Direction::Dl, &[0x23]).err(),
            Some(PduParseErr::BufferEnded { field: Some("f") })
        );
        // Fixed-size CE last with trailing bytes left over
        assert!(SchPdu::from_bytes(Direction::Dl, &[0x1d, 0x05, 0x00]).is_err());
    }
}
