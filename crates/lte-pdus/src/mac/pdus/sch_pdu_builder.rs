use lte_core::{BitBuffer, Direction, Lcid, PduBuildErr, Rnti, assert_warn};

use crate::mac::enums::bsr_format::BsrFormat;
use crate::mac::enums::ul_ce_type::UlCeType;
use crate::mac::fields::mac_ce::{MacCe, NOF_LCG};

/// Subheaders per transport block, padding subheaders not included
pub const MAX_NOF_SUBHEADERS: usize = 20;

/// Largest SDU the 15-bit L field can describe
pub const MAX_SDU_LEN: usize = 0x7fff;

/// LCID of a padding subheader, the same in both directions
pub const PADDING_LCID: u32 = UlCeType::Padding as u32;

/// Size of an SDU subheader that carries a length field: 7-bit L below 128 bytes, 15-bit L above
pub fn sdu_subheader_size(nof_bytes: usize) -> usize {
    if nof_bytes < 128 { 2 } else { 3 }
}

#[derive(Debug, Clone, Copy)]
struct SduSlot {
    lcid: Lcid,
    len: usize,
}

/// Builds one UL-SCH or DL-SCH transport block of a fixed size, 36.321 6.1.2.
///
/// Space accounting assumes the most recent SDU is the last subheader, which
/// carries no length field. Adding another SDU charges the full header of the
/// previous one. `write` lays out the header, the control elements, the SDUs
/// and the padding, and checks the byte count against the transport block size.
#[derive(Debug)]
pub struct SchPduBuilder {
    dir: Direction,
    pdu_len: usize,
    rem_len: usize,
    ces: Vec<MacCe>,
    sdus: Vec<SduSlot>,
    sdu_payload: Vec<u8>,
}

impl SchPduBuilder {
    pub fn new(dir: Direction, pdu_len: usize) -> Self {
        SchPduBuilder {
            dir,
            pdu_len,
            rem_len: pdu_len,
            ces: Vec::new(),
            sdus: Vec::new(),
            sdu_payload: Vec::with_capacity(pdu_len),
        }
    }

    pub fn new_ul(pdu_len: usize) -> Self {
        Self::new(Direction::Ul, pdu_len)
    }

    pub fn new_dl(pdu_len: usize) -> Self {
        Self::new(Direction::Dl, pdu_len)
    }

    pub fn pdu_len(&self) -> usize {
        self.pdu_len
    }

    /// Bytes not yet accounted to any subheader or payload
    pub fn rem_size(&self) -> usize {
        self.rem_len
    }

    pub fn nof_subheaders(&self) -> usize {
        self.ces.len() + self.sdus.len()
    }

    pub fn has_free_subheader(&self) -> bool {
        self.nof_subheaders() < MAX_NOF_SUBHEADERS
    }

    pub fn nof_sdu_bytes(&self) -> usize {
        self.sdu_payload.len()
    }

    /// Header bytes the current last SDU needs once it stops being last
    fn last_sdu_correction(&self) -> usize {
        self.sdus.last().map(|s| sdu_subheader_size(s.len) - 1).unwrap_or(0)
    }

    pub fn has_space_ce(&self, nof_bytes: usize) -> bool {
        self.rem_len >= nof_bytes + 1
    }

    pub fn has_space_sdu(&self, nof_bytes: usize) -> bool {
        self.rem_len >= nof_bytes + 1 + self.last_sdu_correction()
    }

    /// Largest SDU that still fits, if added as the last subheader
    pub fn get_sdu_space(&self) -> usize {
        self.rem_len.saturating_sub(1 + self.last_sdu_correction())
    }

    /// Append a control element subheader and payload
    pub fn add_ce(&mut self, ce: MacCe) -> Result<(), PduBuildErr> {
        assert_warn!(ce.direction() == self.dir, "{} in a {:?} transport block", ce, self.dir);
        if !self.has_free_subheader() {
            return Err(PduBuildErr::TooManySubheaders);
        }
        let nof_bytes = ce.payload_size();
        if !self.has_space_ce(nof_bytes) {
            return Err(PduBuildErr::NoSpace { requested: nof_bytes + 1, available: self.rem_len });
        }
        self.rem_len -= nof_bytes + 1;
        self.ces.push(ce);
        Ok(())
    }

    pub fn set_bsr(&mut self, format: BsrFormat, buff_size: &[u32; NOF_LCG]) -> Result<(), PduBuildErr> {
        self.add_ce(MacCe::bsr(format, buff_size))
    }

    pub fn set_phr(&mut self, headroom_db: f32) -> Result<(), PduBuildErr> {
        self.add_ce(MacCe::phr(headroom_db))
    }

    pub fn set_crnti(&mut self, crnti: Rnti) -> Result<(), PduBuildErr> {
        self.add_ce(MacCe::CRnti(crnti))
    }

    pub fn set_con_res_id(&mut self, con_res_id: u64) -> Result<(), PduBuildErr> {
        self.add_ce(MacCe::ContentionResolutionId(con_res_id))
    }

    pub fn set_ta_cmd(&mut self, ta_cmd: u8) -> Result<(), PduBuildErr> {
        self.add_ce(MacCe::TaCommand(ta_cmd))
    }

    /// Ask `source` for at most `requested` bytes of `lcid` data, written in place.
    /// Returns the bytes taken. Nothing is added when the source has no data.
    pub fn set_sdu<F>(&mut self, lcid: Lcid, requested: usize, source: F) -> Result<usize, PduBuildErr>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        if requested > MAX_SDU_LEN {
            return Err(PduBuildErr::SduTooLong { len: requested, max: MAX_SDU_LEN });
        }
        if !self.has_free_subheader() {
            return Err(PduBuildErr::TooManySubheaders);
        }
        let available = self.get_sdu_space();
        if requested > available {
            return Err(PduBuildErr::NoSpace { requested, available });
        }
        if requested == 0 {
            return Ok(0);
        }

        let start = self.sdu_payload.len();
        self.sdu_payload.resize(start + requested, 0);
        let nof_bytes = source(&mut self.sdu_payload[start..]);
        if nof_bytes > requested {
            self.sdu_payload.truncate(start);
            return Err(PduBuildErr::SourceFailed { lcid });
        }
        self.sdu_payload.truncate(start + nof_bytes);
        if nof_bytes == 0 {
            return Ok(0);
        }

        self.rem_len -= nof_bytes + 1 + self.last_sdu_correction();
        self.sdus.push(SduSlot { lcid, len: nof_bytes });
        Ok(nof_bytes)
    }

    /// Convenience for callers that already hold the SDU bytes
    pub fn add_sdu(&mut self, lcid: Lcid, data: &[u8]) -> Result<usize, PduBuildErr> {
        self.set_sdu(lcid, data.len(), |out| {
            out.copy_from_slice(data);
            data.len()
        })
    }

    /// Finalize the transport block
    pub fn write(self) -> Result<Vec<u8>, PduBuildErr> {
        let mut rem = self.rem_len;
        let mut multibyte_padding = false;
        let mut onetwo_padding = 0;

        if rem > 2 {
            // Padding subheader at the end, the last SDU regains its length field
            multibyte_padding = true;
            rem -= 1 + self.last_sdu_correction();
        } else if rem > 0 {
            onetwo_padding = rem;
            rem = 0;
        }

        let nof_sdus = self.sdus.len();
        let sdu_hdr_bytes: usize = self
            .sdus
            .iter()
            .enumerate()
            .map(|(i, s)| if i + 1 == nof_sdus && !multibyte_padding { 1 } else { sdu_subheader_size(s.len) })
            .sum();
        let header_bytes = onetwo_padding + self.ces.len() + sdu_hdr_bytes + multibyte_padding as usize;
        let ce_bytes: usize = self.ces.iter().map(|c| c.payload_size()).sum();
        let total = header_bytes + ce_bytes + self.sdu_payload.len() + rem;
        if total != self.pdu_len {
            tracing::error!(
                "-> {:?}-SCH accounting error: hdr {} ce {} sdu {} pad {} != {}",
                self.dir,
                header_bytes,
                ce_bytes,
                self.sdu_payload.len(),
                rem,
                self.pdu_len
            );
            return Err(PduBuildErr::SizeMismatch { expected: self.pdu_len, written: total });
        }

        let nof_subh = onetwo_padding + self.ces.len() + nof_sdus + multibyte_padding as usize;
        let mut idx = 0;
        let mut buf = BitBuffer::new(self.pdu_len * 8);

        for _ in 0..onetwo_padding {
            idx += 1;
            write_subheader(&mut buf, PADDING_LCID, idx == nof_subh, None);
        }
        for ce in &self.ces {
            idx += 1;
            write_subheader(&mut buf, ce.lcid(), idx == nof_subh, None);
        }
        for sdu in &self.sdus {
            idx += 1;
            let is_last = idx == nof_subh;
            write_subheader(&mut buf, sdu.lcid, is_last, if is_last { None } else { Some(sdu.len) });
        }
        if multibyte_padding {
            write_subheader(&mut buf, PADDING_LCID, true, None);
        }

        for ce in &self.ces {
            ce.to_bitbuf(&mut buf);
        }
        buf.write_bytes(&self.sdu_payload);
        // Padding stays zero

        tracing::trace!("-> {:?}-SCH {} bytes, hdr {} ce {} sdu {} pad {}",
            self.dir, self.pdu_len, header_bytes, ce_bytes, self.sdu_payload.len(), rem + onetwo_padding);
        Ok(buf.into_bytes())
    }
}

/// R/R/E/LCID, followed by F/L for SDUs that are not last
fn write_subheader(buf: &mut BitBuffer, lcid: u32, is_last: bool, sdu_len: Option<usize>) {
    buf.write_bits(0, 2);
    buf.write_flag(!is_last);
    buf.write_bits(lcid as u64 & 0x1f, 5);
    if let Some(len) = sdu_len {
        if len < 128 {
            buf.write_flag(false);
            buf.write_bits(len as u64, 7);
        } else {
            buf.write_flag(true);
            buf.write_bits(len as u64, 15);
        }
    }
}

#[cfg(test)]
mod tests {
    use lte_core::debug;

    use super::*;
    use crate::mac::pdus::sch_pdu::{SchPayload, SchPdu};

    fn payload(n: usize, seed: u8) -> Vec<u8> {
        (0..n).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn test_ccch_phr_short_bsr() {
        debug::setup_logging_verbose();
        let ccch = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60];
        let mut pdu = SchPduBuilder::new_ul(11);
        assert_eq!(pdu.add_sdu(0, &ccch).unwrap(), 6);
        pdu.set_phr(10.0).unwrap();
        pdu.set_bsr(BsrFormat::Short, &[1, 2, 3, 4]).unwrap();
        assert_eq!(pdu.rem_size(), 0);
        let bytes = pdu.write().unwrap();
        assert_eq!(bytes, vec![0x3a, 0x3d, 0x00, 0x21, 0xc1, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
    }

    #[test]
    fn test_single_sdu_fills_pdu() {
        debug::setup_logging_verbose();
        let data = payload(15, 0x80);
        let mut pdu = SchPduBuilder::new_ul(16);
        assert_eq!(pdu.get_sdu_space(), 15);
        pdu.add_sdu(1, &data).unwrap();
        let bytes = pdu.write().unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..], &data[..]);
    }

    fn two_sdus(pdu_len: usize) -> Vec<u8> {
        let mut pdu = SchPduBuilder::new_ul(pdu_len);
        pdu.add_sdu(2, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        pdu.add_sdu(3, &[0x0a, 0x0b]).unwrap();
        pdu.write().unwrap()
    }

    #[test]
    fn test_padding_regimes() {
        debug::setup_logging_verbose();
        let payload = [1, 2, 3, 4, 5, 6, 7, 8, 0x0a, 0x0b];

        // Multi-byte padding, the last SDU gets its length field back
        let bytes = two_sdus(18);
        assert_eq!(&bytes[..5], &[0x22, 0x08, 0x23, 0x02, 0x1f]);
        assert_eq!(&bytes[5..15], &payload);
        assert_eq!(&bytes[15..], &[0, 0, 0]);

        // Two single-byte padding subheaders in front
        let bytes = two_sdus(15);
        assert_eq!(&bytes[..5], &[0x3f, 0x3f, 0x22, 0x08, 0x03]);
        assert_eq!(&bytes[5..], &payload);

        let bytes = two_sdus(14);
        assert_eq!(&bytes[..4], &[0x3f, 0x22, 0x08, 0x03]);
        assert_eq!(&bytes[4..], &payload);

        // Exact fit
        let bytes = two_sdus(13);
        assert_eq!(&bytes[..3], &[0x22, 0x08, 0x03]);
        assert_eq!(&bytes[3..], &payload);
    }

    #[test]
    fn test_roundtrip_length_field_boundary() {
        debug::setup_logging_verbose();
        for first_len in [127usize, 128] {
            for pdu_len in [first_len + 1 + 3 + 10, first_len + 3 + 10 + 5, first_len + 3 + 10 + 2 + 1] {
                let first = payload(first_len, 3);
                let second = payload(10, 200);
                let mut pdu = SchPduBuilder::new_ul(pdu_len);
                pdu.set_crnti(0x1234).unwrap();
                if pdu.add_sdu(4, &first).is_err() {
                    continue;
                }
                if pdu.add_sdu(5, &second).is_err() {
                    continue;
                }
                let bytes = pdu.write().unwrap();
                assert_eq!(bytes.len(), pdu_len);

                let parsed = SchPdu::from_bytes(Direction::Ul, &bytes).unwrap();
                let sdus: Vec<(u32, &[u8])> = parsed.sdus().collect();
                assert_eq!(sdus, vec![(4, &first[..]), (5, &second[..])]);
                assert_eq!(parsed.ces().copied().collect::<Vec<_>>(), vec![MacCe::CRnti(0x1234)]);
            }
        }
    }

    #[test]
    fn test_ce_only_padding() {
        debug::setup_logging_verbose();
        // Multi-byte padding after a single C-RNTI CE
        let mut pdu = SchPduBuilder::new_ul(10);
        pdu.set_crnti(0xbeef).unwrap();
        let bytes = pdu.write().unwrap();
        assert_eq!(&bytes[..4], &[0x3b, 0x1f, 0xbe, 0xef]);
        assert!(bytes[4..].iter().all(|&b| b == 0));

        // One single-byte padding subheader in front
        let mut pdu = SchPduBuilder::new_ul(4);
        pdu.set_crnti(0xbeef).unwrap();
        assert_eq!(pdu.write().unwrap(), vec![0x3f, 0x1b, 0xbe, 0xef]);

        let parsed = SchPdu::from_bytes(Direction::Ul, &[0x3f, 0x1b, 0xbe, 0xef]).unwrap();
        assert_eq!(parsed.subheaders[0].payload, SchPayload::Padding(0));
        assert_eq!(parsed.subheaders[1].payload, SchPayload::Ce(MacCe::CRnti(0xbeef)));
    }

    #[test]
    fn test_padding_only() {
        debug::setup_logging_verbose();
        let bytes = SchPduBuilder::new_ul(5).write().unwrap();
        assert_eq!(bytes, vec![0x1f, 0, 0, 0, 0]);
        let bytes = SchPduBuilder::new_ul(2).write().unwrap();
        assert_eq!(bytes, vec![0x3f, 0x1f]);
    }

    #[test]
    fn test_capacity_errors() {
        debug::setup_logging_verbose();
        let mut pdu = SchPduBuilder::new_ul(4);
        assert_eq!(pdu.get_sdu_space(), 3);
        assert_eq!(pdu.add_sdu(3, &[0; 4]), Err(PduBuildErr::NoSpace { requested: 4, available: 3 }));
        assert_eq!(pdu.set_sdu(3, 2, |out| out.len() + 1), Err(PduBuildErr::SourceFailed { lcid: 3 }));
        assert_eq!(pdu.set_sdu(3, 2, |_| 0), Ok(0));
        assert_eq!(pdu.nof_subheaders(), 0);
        pdu.add_sdu(3, &[9, 9]).unwrap();
        assert!(!pdu.has_space_ce(1));
        assert!(pdu.set_phr(0.0).is_err());

        let mut pdu = SchPduBuilder::new_ul(100);
        for _ in 0..MAX_NOF_SUBHEADERS {
            pdu.add_sdu(1, &[1]).unwrap();
        }
        assert_eq!(pdu.add_sdu(1, &[1]), Err(PduBuildErr::TooManySubheaders));
        assert_eq!(pdu.set_crnti(1), Err(PduBuildErr::TooManySubheaders));
        assert_eq!(pdu.write().unwrap().len(), 100);
    }

    #[test]
    fn test_sdu_length_field_limit() {
        debug::setup_logging_verbose();
        let mut pdu = SchPduBuilder::new_dl(MAX_SDU_LEN + 20);
        let too_long = vec![0x55; MAX_SDU_LEN + 1];
        assert_eq!(pdu.add_sdu(3, &too_long), Err(PduBuildErr::SduTooLong { len: MAX_SDU_LEN + 1, max: MAX_SDU_LEN }));
        assert_eq!(pdu.nof_subheaders(), 0);

        // Largest SDU still gets an exact L field, ahead of the padding
        let longest = vec![0x55; MAX_SDU_LEN];
        pdu.add_sdu(3, &longest).unwrap();
        let bytes = pdu.write().unwrap();
        let parsed = SchPdu::from_bytes(Direction::Dl, &bytes).unwrap();
        assert_eq!(parsed.sdus().collect::<Vec<_>>(), vec![(3, &longest[..])]);
    }

    #[test]
    fn test_dl_con_res_and_ta() {
        debug::setup_logging_verbose();
        let mut pdu = SchPduBuilder::new_dl(20);
        pdu.set_con_res_id(0x1122_3344_5566).unwrap();
        pdu.set_ta_cmd(31).unwrap();
        pdu.add_sdu(0, &[7; 5]).unwrap();
        let bytes = pdu.write().unwrap();
        let parsed = SchPdu::from_bytes(Direction::Dl, &bytes).unwrap();
        let ces: Vec<MacCe> = parsed.ces().copied().collect();
        assert_eq!(ces, vec![MacCe::ContentionResolutionId(0x1122_3344_5566), MacCe::TaCommand(31)]);
        assert_eq!(parsed.sdus().collect::<Vec<_>>(), vec![(0, &[7u8; 5][..])]);
    }
}
