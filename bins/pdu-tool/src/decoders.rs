use lte_core::{Direction, PduParseErr, debug};
use lte_pdus::mac::pdus::rar_pdu::RarPdu;
use lte_pdus::mac::pdus::sch_pdu::SchPdu;
use lte_pdus::rlc::pdus::amd_pdu_header::{AmdPduHeader, is_control_pdu};
use lte_pdus::rlc::pdus::status_pdu::StatusPdu;
use lte_pdus::rlc::pdus::umd_pdu_header::UmdPduHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    UlSch,
    DlSch,
    Rar,
    Amd,
    Status,
    Umd5,
    Umd10,
}

impl PduKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "ul-sch" | "ulsch" => Some(PduKind::UlSch),
            "dl-sch" | "dlsch" => Some(PduKind::DlSch),
            "rar" => Some(PduKind::Rar),
            "amd" => Some(PduKind::Amd),
            "status" => Some(PduKind::Status),
            "umd5" => Some(PduKind::Umd5),
            "umd10" => Some(PduKind::Umd10),
            _ => None,
        }
    }
}

/// Hex string to bytes. Whitespace, ':' and a leading 0x are ignored.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let digits: Vec<u8> = s.bytes().filter(|c| !c.is_ascii_whitespace() && *c != b':').collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16);
            let lo = (pair[1] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi << 4 | lo) as u8),
                _ => Err(format!("invalid hex digits '{}{}'", pair[0] as char, pair[1] as char)),
            }
        })
        .collect()
}

fn with_payload(header: String, payload: &[u8]) -> String {
    format!("{}\ndata: {} bytes {}", header, payload.len(), debug::hex(payload))
}

/// Decode `data` as a PDU of the given kind into a printable description
pub fn decode(kind: PduKind, data: &[u8]) -> Result<String, PduParseErr> {
    match kind {
        PduKind::UlSch => SchPdu::from_bytes(Direction::Ul, data).map(|pdu| pdu.to_string()),
        PduKind::DlSch => SchPdu::from_bytes(Direction::Dl, data).map(|pdu| pdu.to_string()),
        PduKind::Rar => RarPdu::from_bytes(data).map(|pdu| pdu.to_string()),
        PduKind::Amd => {
            if is_control_pdu(data) {
                return Err(PduParseErr::Inconsistency { field: "dc", reason: "control PDU, decode as status" });
            }
            let (hdr, payload) = AmdPduHeader::split(data)?;
            Ok(with_payload(hdr.to_string(), payload))
        }
        PduKind::Status => StatusPdu::from_bytes(data).map(|pdu| pdu.to_string()),
        PduKind::Umd5 | PduKind::Umd10 => {
            let sn_bits = if kind == PduKind::Umd5 { 5 } else { 10 };
            let (hdr, payload) = UmdPduHeader::split(data, sn_bits)?;
            Ok(with_payload(hdr.to_string(), payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        debug::setup_logging_verbose();
        assert_eq!(parse_hex("0x8c00 dd:cd").unwrap(), vec![0x8c, 0x00, 0xdd, 0xcd]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_decode_kinds() {
        debug::setup_logging_verbose();
        assert_eq!(PduKind::from_name("DL-SCH"), Some(PduKind::DlSch));
        assert_eq!(PduKind::from_name("foo"), None);

        let amd = parse_hex("880600112233").unwrap();
        let out = decode(PduKind::Amd, &amd).unwrap();
        assert!(out.contains("data: 3 bytes 112233"));
        // Header announcing three 1500 byte SDUs with no data behind it
        assert!(decode(PduKind::Amd, &parse_hex("8C00DDCDDC5DC0").unwrap()).is_err());
        assert!(decode(PduKind::Amd, &[0x00, 0x00]).is_err());

        // Subheader announces more bytes than present
        assert!(decode(PduKind::DlSch, &[0x21, 0x7f, 0x00]).is_err());
    }
}
