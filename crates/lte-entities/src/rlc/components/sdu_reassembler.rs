use lte_pdus::rlc::enums::framing_info::FramingInfo;

/// Rebuilds SDUs from the data fields of in-sequence UMD/AMD PDUs
#[derive(Debug, Default)]
pub struct SduReassembler {
    partial: Option<Vec<u8>>,
}

impl SduReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.partial = None;
    }

    pub fn has_partial(&self) -> bool {
        self.partial.is_some()
    }

    /// Feed the data field of the next PDU. `contiguous` is false when PDUs were lost
    /// since the previous call, in which case a partially rebuilt SDU is discarded.
    /// The LI sum must be smaller than `data.len()`.
    pub fn push(&mut self, fi: FramingInfo, li: &[u16], data: &[u8], contiguous: bool, out: &mut Vec<Vec<u8>>) {
        if !contiguous && self.partial.take().is_some() {
            tracing::debug!("discarding partial SDU after lost PDUs");
        }

        let nof_parts = li.len() + 1;
        let mut pos = 0usize;
        for i in 0..nof_parts {
            let end = if i < li.len() { pos + li[i] as usize } else { data.len() };
            let part = &data[pos..end];
            pos = end;
            let is_last = i + 1 == nof_parts;

            if i == 0 && !fi.starts_sdu() {
                match self.partial.as_mut() {
                    Some(p) => p.extend_from_slice(part),
                    None => tracing::debug!("dropping {} byte segment without SDU start", part.len()),
                }
            } else {
                if self.partial.is_some() {
                    tracing::warn!("discarding incomplete SDU, next one started");
                }
                self.partial = Some(part.to_vec());
            }

            if !is_last || fi.ends_sdu() {
                if let Some(sdu) = self.partial.take() {
                    out.push(sdu);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_core::debug;

    #[test]
    fn test_segments_and_concatenation() {
        debug::setup_logging_verbose();
        let mut r = SduReassembler::new();
        let mut out = Vec::new();
        r.push(FramingInfo::FirstSegment, &[], &[1, 2], true, &mut out);
        assert!(out.is_empty());
        r.push(FramingInfo::MiddleSegment, &[], &[3], true, &mut out);
        // End of SDU 1, full SDU 2, start of SDU 3
        r.push(FramingInfo::MiddleSegment, &[1, 2], &[4, 5, 6, 7], true, &mut out);
        assert_eq!(out, vec![vec![1, 2, 3, 4], vec![5, 6]]);
        r.push(FramingInfo::LastSegment, &[], &[8], true, &mut out);
        assert_eq!(out[2], vec![7, 8]);
        assert!(!r.has_partial());
    }

    #[test]
    fn test_gap_discards_partial() {
        debug::setup_logging_verbose();
        let mut r = SduReassembler::new();
        let mut out = Vec::new();
        r.push(FramingInfo::FirstSegment, &[], &[1, 2], true, &mut out);
        r.push(FramingInfo::LastSegment, &[], &[3], false, &mut out);
        assert!(out.is_empty());
        r.push(FramingInfo::FullSdu, &[], &[9], false, &mut out);
        assert_eq!(out, vec![vec![9]]);
    }
}
