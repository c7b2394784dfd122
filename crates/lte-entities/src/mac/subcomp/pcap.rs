use std::fs::File;
use std::io::{self, BufWriter, Write};

use chrono::Utc;
use lte_core::{Rnti, RntiType, SI_RNTI, Tti};

const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_SNAPLEN: u32 = 65535;

/// DLT_USER0, decoded by the Wireshark mac-lte-framed dissector
pub const MAC_LTE_DLT: u32 = 147;

const MAC_LTE_START_STRING: &[u8] = b"mac-lte";
const FDD_RADIO: u8 = 1;
const DIRECTION_UPLINK: u8 = 0;
const DIRECTION_DOWNLINK: u8 = 1;

const MAC_LTE_PAYLOAD_TAG: u8 = 0x01;
const MAC_LTE_RNTI_TAG: u8 = 0x02;
const MAC_LTE_UEID_TAG: u8 = 0x03;
const MAC_LTE_FRAME_SUBFRAME_TAG: u8 = 0x04;
const MAC_LTE_RETX_TAG: u8 = 0x06;
const MAC_LTE_CRC_STATUS_TAG: u8 = 0x07;

/// Context written in front of every MAC PDU
struct RecordContext {
    direction: u8,
    rnti_type: RntiType,
    rnti: Rnti,
    retx: u32,
    crc_ok: bool,
    tti: Tti,
}

/// Writes MAC PDUs to a libpcap file with MAC-LTE framing
pub struct MacPcap {
    out: Box<dyn Write + Send>,
    ue_id: u16,
    nof_records: u64,
}

impl MacPcap {
    pub fn open(filename: &str, ue_id: u16) -> io::Result<Self> {
        let file = File::create(filename)?;
        tracing::info!("writing MAC pcap to {}", filename);
        Self::new(Box::new(BufWriter::new(file)), ue_id)
    }

    /// Wrap any writer; the global header is written immediately
    pub fn new(mut out: Box<dyn Write + Send>, ue_id: u16) -> io::Result<Self> {
        let mut hdr = Vec::with_capacity(24);
        hdr.extend_from_slice(&PCAP_MAGIC.to_le_bytes());
        hdr.extend_from_slice(&PCAP_VERSION_MAJOR.to_le_bytes());
        hdr.extend_from_slice(&PCAP_VERSION_MINOR.to_le_bytes());
        // thiszone, sigfigs
        hdr.extend_from_slice(&0i32.to_le_bytes());
        hdr.extend_from_slice(&0u32.to_le_bytes());
        hdr.extend_from_slice(&PCAP_SNAPLEN.to_le_bytes());
        hdr.extend_from_slice(&MAC_LTE_DLT.to_le_bytes());
        out.write_all(&hdr)?;
        Ok(MacPcap { out, ue_id, nof_records: 0 })
    }

    pub fn nof_records(&self) -> u64 {
        self.nof_records
    }

    pub fn write_ul_crnti(&mut self, pdu: &[u8], rnti: Rnti, retx: u32, tti: Tti) {
        let ctx = RecordContext { direction: DIRECTION_UPLINK, rnti_type: RntiType::CRnti, rnti, retx, crc_ok: true, tti };
        self.write_or_log(&ctx, pdu);
    }

    pub fn write_dl_crnti(&mut self, pdu: &[u8], rnti: Rnti, crc_ok: bool, tti: Tti) {
        let ctx = RecordContext { direction: DIRECTION_DOWNLINK, rnti_type: RntiType::CRnti, rnti, retx: 0, crc_ok, tti };
        self.write_or_log(&ctx, pdu);
    }

    pub fn write_dl_ranti(&mut self, pdu: &[u8], rnti: Rnti, crc_ok: bool, tti: Tti) {
        let ctx = RecordContext { direction: DIRECTION_DOWNLINK, rnti_type: RntiType::RaRnti, rnti, retx: 0, crc_ok, tti };
        self.write_or_log(&ctx, pdu);
    }

    pub fn write_dl_bch(&mut self, pdu: &[u8], crc_ok: bool, tti: Tti) {
        let ctx = RecordContext { direction: DIRECTION_DOWNLINK, rnti_type: RntiType::NoRnti, rnti: 0, retx: 0, crc_ok, tti };
        self.write_or_log(&ctx, pdu);
    }

    pub fn write_dl_sirnti(&mut self, pdu: &[u8], crc_ok: bool, tti: Tti) {
        let ctx = RecordContext { direction: DIRECTION_DOWNLINK, rnti_type: RntiType::SiRnti, rnti: SI_RNTI, retx: 0, crc_ok, tti };
        self.write_or_log(&ctx, pdu);
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!("pcap flush failed: {}", e);
        }
    }

    fn write_or_log(&mut self, ctx: &RecordContext, pdu: &[u8]) {
        match self.write_record(ctx, pdu) {
            Ok(()) => self.nof_records += 1,
            Err(e) => tracing::warn!("pcap write failed: {}", e),
        }
    }

    fn write_record(&mut self, ctx: &RecordContext, pdu: &[u8]) -> io::Result<()> {
        let mut rec = Vec::with_capacity(pdu.len() + 32);
        rec.extend_from_slice(MAC_LTE_START_STRING);
        rec.push(FDD_RADIO);
        rec.push(ctx.direction);
        rec.push(ctx.rnti_type.into_raw());

        if ctx.rnti != 0 {
            rec.push(MAC_LTE_RNTI_TAG);
            rec.extend_from_slice(&ctx.rnti.to_be_bytes());
        }
        rec.push(MAC_LTE_UEID_TAG);
        rec.extend_from_slice(&self.ue_id.to_be_bytes());
        if ctx.retx > 0 {
            rec.push(MAC_LTE_RETX_TAG);
            rec.push(ctx.retx.min(u8::MAX as u32) as u8);
        }
        rec.push(MAC_LTE_FRAME_SUBFRAME_TAG);
        let sfn_sf = ((ctx.tti.sfn() << 4) | ctx.tti.sf_idx()) as u16;
        rec.extend_from_slice(&sfn_sf.to_be_bytes());
        rec.push(MAC_LTE_CRC_STATUS_TAG);
        rec.push(ctx.crc_ok as u8);
        rec.push(MAC_LTE_PAYLOAD_TAG);
        rec.extend_from_slice(pdu);

        let now = Utc::now();
        let mut hdr = Vec::with_capacity(16);
        hdr.extend_from_slice(&(now.timestamp() as u32).to_le_bytes());
        hdr.extend_from_slice(&now.timestamp_subsec_micros().to_le_bytes());
        hdr.extend_from_slice(&(rec.len() as u32).to_le_bytes());
        hdr.extend_from_slice(&(rec.len() as u32).to_le_bytes());

        self.out.write_all(&hdr)?;
        self.out.write_all(&rec)
    }
}

impl Drop for MacPcap {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use lte_core::debug;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_global_header() {
        debug::setup_logging_verbose();
        let buf = SharedBuf::default();
        let _pcap = MacPcap::new(Box::new(buf.clone()), 1).unwrap();
        let out = buf.0.lock().unwrap().clone();
        assert_eq!(out.len(), 24);
        assert_eq!(&out[0..4], &[0xd4, 0xc3, 0xb2, 0xa1]);
        assert_eq!(&out[4..8], &[2, 0, 4, 0]);
        assert_eq!(&out[20..24], &[147, 0, 0, 0]);
    }

    #[test]
    fn test_dl_crnti_record() {
        debug::setup_logging_verbose();
        let buf = SharedBuf::default();
        let mut pcap = MacPcap::new(Box::new(buf.clone()), 0x0102).unwrap();
        pcap.write_dl_crnti(&[0xAA, 0xBB], 0x4601, true, Tti::new(1234));
        assert_eq!(pcap.nof_records(), 1);

        let out = buf.0.lock().unwrap().clone();
        let rec = &out[24..];
        let incl_len = u32::from_le_bytes([rec[8], rec[9], rec[10], rec[11]]) as usize;
        assert_eq!(incl_len, rec.len() - 16);

        // sfn 123, subframe 4
        let expected: &[u8] = &[
            b'm', b'a', b'c', b'-', b'l', b't', b'e', 1, 1, 3,
            0x02, 0x46, 0x01,
            0x03, 0x01, 0x02,
            0x04, 0x07, 0xB4,
            0x07, 0x01,
            0x01, 0xAA, 0xBB,
        ];
        assert_eq!(&rec[16..], expected);
    }

    #[test]
    fn test_bch_has_no_rnti_tag() {
        debug::setup_logging_verbose();
        let buf = SharedBuf::default();
        let mut pcap = MacPcap::new(Box::new(buf.clone()), 0).unwrap();
        pcap.write_dl_bch(&[0x55], false, Tti::new(0));
        let out = buf.0.lock().unwrap().clone();
        let rec = &out[24 + 16..];
        assert_eq!(&rec[7..10], &[1, 1, 0]);
        assert_eq!(rec[10], MAC_LTE_UEID_TAG);
        assert_eq!(&rec[rec.len() - 4..], &[0x07, 0x00, 0x01, 0x55]);
    }
}
