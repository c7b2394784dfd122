//! Modular sequence number arithmetic. All window checks go through these,
//! never through plain integer comparison.

/// (a - b) mod `modulus`
#[inline]
pub fn sn_sub(a: u16, b: u16, modulus: u16) -> u16 {
    ((a as u32 + modulus as u32 - (b as u32 % modulus as u32)) % modulus as u32) as u16
}

/// (sn + n) mod `modulus`
#[inline]
pub fn sn_add(sn: u16, n: u16, modulus: u16) -> u16 {
    ((sn as u32 + n as u32) % modulus as u32) as u16
}

/// True if `sn` lies in [start, start + len) modulo `modulus`
#[inline]
pub fn sn_in_range(sn: u16, start: u16, len: u16, modulus: u16) -> bool {
    sn_sub(sn, start, modulus) < len
}
