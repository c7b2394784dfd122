use lte_core::{BitBuffer, PduParseErr};

/// Largest value of an 11-bit length indicator
pub const LI_MAX: u16 = 2047;

/// Upper bound on length indicators accepted in one PDU
pub const MAX_NOF_LI: usize = 256;

/// Bytes taken by `nof_li` E/LI fields, including the 4 padding bits after an odd count
pub fn li_list_len(nof_li: usize) -> usize {
    (nof_li * 12).div_ceil(8)
}

/// Read E/LI fields while the preceding E bit is set, then skip the alignment padding.
/// `e` is the E bit of the fixed header.
pub fn read_li_list(buf: &mut BitBuffer, mut e: bool) -> Result<Vec<u16>, PduParseErr> {
    let mut li = Vec::new();
    while e {
        if li.len() >= MAX_NOF_LI {
            return Err(PduParseErr::TooManyElements { field: "li", max: MAX_NOF_LI });
        }
        e = buf.read_flag("e")?;
        let value = buf.read_field(11, "li")? as u16;
        if value == 0 {
            return Err(PduParseErr::InvalidValue { field: "li", value: 0 });
        }
        li.push(value);
    }
    if li.len() % 2 == 1 {
        buf.read_field(4, "li_padding")?;
    }
    Ok(li)
}

/// Write E/LI fields, E set on all but the last, and pad to a byte boundary
pub fn write_li_list(buf: &mut BitBuffer, li: &[u16]) {
    for (i, value) in li.iter().enumerate() {
        buf.write_flag(i + 1 < li.len());
        buf.write_bits(*value as u64 & LI_MAX as u64, 11);
    }
    if li.len() % 2 == 1 {
        buf.write_zeroes(4);
    }
}
