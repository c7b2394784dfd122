/// 36.321 Table 6.1.3.1-1: upper bound in bytes of each buffer size level.
/// Level i+1 covers (BSR_TABLE[i-1], BSR_TABLE[i]].
pub const BSR_TABLE: [u32; 61] = [
    10, 12, 14, 17, 19, 22, 26, 31, 36, 42, 49, 57, 67, 78, 91, 107, 125, 146, 171, 200, 234, 274, 321, 376,
    440, 515, 603, 706, 826, 967, 1132, 1326, 1552, 1817, 2127, 2490, 2915, 3413, 3995, 4667, 5476, 6411,
    7505, 8787, 10287, 12043, 14099, 16507, 19325, 22624, 26487, 31009, 36304, 42502, 49759, 58255,
    68201, 79846, 93479, 109439, 128125,
];

/// Anything above this many bytes is reported as level 63
pub const BSR_MAX_BYTES: u32 = 150000;

pub const PHR_MIN_DB: f32 = -23.0;
pub const PHR_MAX_DB: f32 = 40.0;

/// Map a buffer size in bytes to a 6-bit BSR level
pub fn bsr_level(nof_bytes: u32) -> u8 {
    if nof_bytes == 0 {
        return 0;
    }
    if nof_bytes > BSR_MAX_BYTES {
        return 63;
    }
    match BSR_TABLE.iter().position(|&t| nof_bytes < t) {
        Some(i) => i as u8 + 1,
        None => 62,
    }
}

/// Largest buffer size reported by a BSR level, for display and for the network side
pub fn bsr_level_max_bytes(level: u8) -> Option<u32> {
    match level {
        0 => Some(0),
        1..=61 => Some(BSR_TABLE[level as usize - 1]),
        62 => Some(BSR_MAX_BYTES),
        _ => None,
    }
}

/// Map a power headroom in dB to a 6-bit PHR level, 36.133 Table 9.1.8.4-1
pub fn phr_level(headroom_db: f32) -> u8 {
    (headroom_db.clamp(PHR_MIN_DB, PHR_MAX_DB) - PHR_MIN_DB).floor() as u8
}

/// Lower bound in dB of a PHR level
pub fn phr_level_db(level: u8) -> i32 {
    (level & 0x3f) as i32 + PHR_MIN_DB as i32
}
