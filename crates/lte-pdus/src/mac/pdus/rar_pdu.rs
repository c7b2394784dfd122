use core::fmt;

use lte_core::{BitBuffer, PduBuildErr, PduParseErr, Rnti, let_field};

/// Bytes of MAC RAR payload following each RAPID subheader
pub const RAR_PAYLOAD_LEN: usize = 6;

/// One MAC RAR, 36.321 6.1.5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RarResponse {
    /// 6 bits, random access preamble identifier
    pub rapid: u8,
    /// 11 bits, timing advance command
    pub ta_cmd: u16,
    /// 20 bits, see RarGrant
    pub grant: u32,
    pub temp_crnti: Rnti,
}

/// MAC PDU on the DL-SCH addressed to an RA-RNTI
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RarPdu {
    /// 4-bit backoff indicator, at most one per PDU
    pub backoff_indicator: Option<u8>,
    pub responses: Vec<RarResponse>,
}

impl RarPdu {
    pub fn from_bytes(data: &[u8]) -> Result<Self, PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let mut backoff_indicator = None;
        let mut rapids = Vec::new();

        // E/T/RAPID or E/T/R/R/BI subheaders
        loop {
            let more = buf.read_flag("e")?;
            let is_rapid = buf.read_flag("t")?;
            if is_rapid {
                let_field!(buf, rapid, 6);
                rapids.push(rapid as u8);
            } else {
                let_field!(buf, _reserved, 2);
                let_field!(buf, bi, 4);
                if backoff_indicator.is_some() {
                    return Err(PduParseErr::Inconsistency { field: "bi", reason: "more than one backoff indicator" });
                }
                backoff_indicator = Some(bi as u8);
            }
            if !more {
                break;
            }
        }

        let mut responses = Vec::with_capacity(rapids.len());
        for rapid in rapids {
            let_field!(buf, _reserved, 1);
            let_field!(buf, ta_cmd, 11);
            let_field!(buf, grant, 20);
            let_field!(buf, temp_crnti, 16);
            responses.push(RarResponse {
                rapid,
                ta_cmd: ta_cmd as u16,
                grant: grant as u32,
                temp_crnti: temp_crnti as Rnti,
            });
        }
        // Anything left is padding

        Ok(RarPdu { backoff_indicator, responses })
    }

    /// Bytes needed for the subheaders and payloads, without padding
    pub fn packed_len(&self) -> usize {
        self.backoff_indicator.is_some() as usize + self.responses.len() * (1 + RAR_PAYLOAD_LEN)
    }

    /// Serialize into a transport block of `pdu_len` bytes. Unused bytes are zero.
    pub fn to_bytes(&self, pdu_len: usize) -> Result<Vec<u8>, PduBuildErr> {
        let needed = self.packed_len();
        if needed > pdu_len || needed == 0 {
            return Err(PduBuildErr::NoSpace { requested: needed, available: pdu_len });
        }

        let mut buf = BitBuffer::new(pdu_len * 8);
        let nof_subh = self.backoff_indicator.is_some() as usize + self.responses.len();
        let mut idx = 0;
        if let Some(bi) = self.backoff_indicator {
            idx += 1;
            buf.write_flag(idx < nof_subh);
            buf.write_flag(false);
            buf.write_bits(0, 2);
            buf.write_bits(bi as u64 & 0xf, 4);
        }
        for r in &self.responses {
            idx += 1;
            buf.write_flag(idx < nof_subh);
            buf.write_flag(true);
            buf.write_bits(r.rapid as u64 & 0x3f, 6);
        }
        for r in &self.responses {
            buf.write_bits(0, 1);
            buf.write_bits(r.ta_cmd as u64 & 0x7ff, 11);
            buf.write_bits(r.grant as u64 & 0xfffff, 20);
            buf.write_bits(r.temp_crnti as u64, 16);
        }
        Ok(buf.into_bytes())
    }

    pub fn find(&self, rapid: u8) -> Option<&RarResponse> {
        self.responses.iter().find(|r| r.rapid == rapid)
    }
}

impl fmt::Display for RarPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RAR {{")?;
        if let Some(bi) = self.backoff_indicator {
            write!(f, " bi: {}", bi)?;
        }
        for r in &self.responses {
            write!(f, " [rapid {} ta {} grant 0x{:05x} tc-rnti 0x{:04x}]", r.rapid, r.ta_cmd, r.grant, r.temp_crnti)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use lte_core::debug;

    use super::*;

    #[test]
    fn test_rar_layout() {
        debug::setup_logging_verbose();
        let pdu = RarPdu {
            backoff_indicator: Some(5),
            responses: vec![RarResponse { rapid: 17, ta_cmd: 0x4a3, grant: 0xabcde, temp_crnti: 0x4601 }],
        };
        let bytes = pdu.to_bytes(10).unwrap();
        // BI subheader with E set, then the last RAPID subheader with T set
        assert_eq!(bytes[0], 0x85);
        assert_eq!(bytes[1], 0x51);
        // R + TA[10:4], TA[3:0] + grant[19:16], grant[15:0], temp C-RNTI
        assert_eq!(&bytes[2..8], &[0x4a, 0x3a, 0xbc, 0xde, 0x46, 0x01]);
        assert_eq!(&bytes[8..], &[0, 0]);

        let parsed = RarPdu::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, pdu);
        assert_eq!(parsed.find(17).map(|r| r.temp_crnti), Some(0x4601));
        assert!(parsed.find(18).is_none());
    }

    #[test]
    fn test_rar_multiple_responses() {
        debug::setup_logging_verbose();
        let pdu = RarPdu {
            backoff_indicator: None,
            responses: vec![
                RarResponse { rapid: 1, ta_cmd: 1, grant: 2, temp_crnti: 3 },
                RarResponse { rapid: 63, ta_cmd: 0x7ff, grant: 0xfffff, temp_crnti: 0xffff },
            ],
        };
        let bytes = pdu.to_bytes(14).unwrap();
        assert_eq!(&bytes[..2], &[0xc1, 0x7f]);
        assert_eq!(RarPdu::from_bytes(&bytes).unwrap(), pdu);
        assert!(pdu.to_bytes(13).is_err());
    }

    #[test]
    fn test_rar_truncated() {
        debug::setup_logging_verbose();
        assert!(RarPdu::from_bytes(&[0x51, 0x4a, 0x3a]).is_err());
        // A lone backoff indicator, trailing bytes are padding
        assert_eq!(RarPdu::from_bytes(&[0x05, 0x85]).unwrap().backoff_indicator, Some(5));
    }
}
