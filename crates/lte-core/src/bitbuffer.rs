use std::{cmp::{max, min}, fmt};

use crate::pdu_parse_error::PduParseErr;

/// MSB-first bit cursor over a byte vector. Used for every header that is not
/// byte aligned (RLC length indicators, status PDU NACK lists, BSR fields).
pub struct BitBuffer {
    buffer: Vec<u8>,
    start: usize,       // bits before this are out of window
    pos: usize,         // next bit offset for read/write (absolute)
    end: usize,         // bits at or after this are out of window
    flag_autoexpand: bool,   // if true, writes move `end` and grow the buffer as needed
}

impl BitBuffer {
    /// Create a zeroed buffer capable of holding exactly `len_bits` bits.
    pub fn new(len_bits: usize) -> Self {
        BitBuffer {
            buffer: vec![0; len_bits.div_ceil(8)],
            start: 0,
            pos: 0,
            end: len_bits,
            flag_autoexpand: false,
        }
    }

    /// Create an empty buffer (end at 0) with some preallocated capacity.
    /// Writes advance the end pointer and reallocate when needed.
    pub fn new_autoexpand(initial_max_len_bits: usize) -> Self {
        BitBuffer {
            buffer: vec![0; initial_max_len_bits.div_ceil(8)],
            start: 0,
            pos: 0,
            end: 0,
            flag_autoexpand: true,
        }
    }

    /// Copy of `data`, all bits readable and writeable.
    pub fn from_bytes(data: &[u8]) -> Self {
        BitBuffer {
            buffer: data.to_vec(),
            start: 0,
            pos: 0,
            end: data.len() * 8,
            flag_autoexpand: false,
        }
    }

    /// Read `num_bits` at the current pos, advancing on success.
    /// Returns None on overflow or if `num_bits>64`.
    pub fn read_bits(&mut self, num_bits: usize) -> Option<u64> {
        if num_bits > 64 || self.pos + num_bits > self.end {
            return None;
        }
        let v = self.read_bits_at_unchecked(self.pos, num_bits);
        self.pos += num_bits;
        Some(v)
    }

    /// Similar to read_bits, but returns PduParseErr::BufferEnded naming the field if not enough bits are available.
    pub fn read_field(&mut self, num_bits: usize, error_string: &'static str) -> Result<u64, PduParseErr> {
        self.read_bits(num_bits).ok_or(PduParseErr::BufferEnded { field: Some(error_string) })
    }

    /// Read a single-bit flag
    pub fn read_flag(&mut self, error_string: &'static str) -> Result<bool, PduParseErr> {
        Ok(self.read_field(1, error_string)? == 1)
    }

    /// Copy `out.len()` whole bytes from the current pos into `out`. The pos need not be byte aligned.
    pub fn read_bytes_into(&mut self, out: &mut [u8]) -> Result<(), PduParseErr> {
        if self.end - self.pos < out.len() * 8 {
            return Err(PduParseErr::BufferEnded { field: Some("payload") });
        }
        if self.pos % 8 == 0 {
            let idx = self.pos / 8;
            out.copy_from_slice(&self.buffer[idx..idx + out.len()]);
            self.pos += out.len() * 8;
        } else {
            for b in out.iter_mut() {
                *b = self.read_bits_at_unchecked(self.pos, 8) as u8;
                self.pos += 8;
            }
        }
        Ok(())
    }

    fn realloc_tail(&mut self, new_cap_bits: usize) {
        let new_cap_bytes = new_cap_bits.div_ceil(8);
        assert!(new_cap_bytes >= self.buffer.len(), "new capacity must be larger than current buffer size");
        self.buffer.resize(new_cap_bytes, 0);
    }

    /// When a write would exceed the end of an autoexpanding buffer, grow `end`
    /// and, if needed, the backing storage.
    fn move_end(&mut self, needed_extra_bits: usize) {
        let free_cap_bits = self.buffer.len() * 8 - self.end;
        if needed_extra_bits > free_cap_bits {
            let needed_total_bits = self.end + needed_extra_bits;
            let double_cap_bits = self.buffer.len() * 8 * 2;
            self.realloc_tail(max(needed_total_bits, double_cap_bits));
        }
        self.end += needed_extra_bits;
    }

    fn ensure_writable(&mut self, num_bits: usize) {
        if self.pos + num_bits > self.end {
            if self.flag_autoexpand {
                let extra = self.pos + num_bits - self.end;
                self.move_end(extra);
            } else {
                panic!("write would exceed buffer end");
            }
        }
    }

    /// Write a single bit to pos
    pub fn write_bit(&mut self, value: u8) {
        assert!(value == 0 || value == 1, "write_bit: value must be 0 or 1");
        self.ensure_writable(1);

        let index = self.pos / 8;
        let shift = 7 - (self.pos % 8);
        self.buffer[index] &= !(1 << shift);
        self.buffer[index] |= value << shift;
        self.pos += 1;
    }

    pub fn write_flag(&mut self, value: bool) {
        self.write_bit(value as u8);
    }

    /// Write an arbitrary amount of zero-bits
    pub fn write_zeroes(&mut self, num_bits: usize) {
        let mut bits_remaining = num_bits;
        while bits_remaining > 0 {
            let chunk_size = min(bits_remaining, 64);
            self.write_bits(0, chunk_size);
            bits_remaining -= chunk_size;
        }
    }

    /// Write up to 64 bits, advancing pos.
    /// An autoexpanding buffer grows; a fixed one panics when the write exceeds its end.
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        assert!(num_bits <= 64, "can only write up to 64 bits");
        assert!(num_bits == 64 || value >> num_bits == 0, "value exceeds num_bits {} {}", value, num_bits);
        self.ensure_writable(num_bits);

        let mut remaining = num_bits;
        let mut cur = self.pos;

        // 1) head bits up to the next byte boundary
        let head_offset = cur % 8;
        if head_offset != 0 && remaining > 0 {
            let h = min(remaining, 8 - head_offset);
            let bits_to_write = ((value >> (remaining - h)) as u8) & ((1u16 << h) - 1) as u8;
            let shift = 8 - (head_offset + h);
            let mask = (((1u16 << h) - 1) << shift) as u8;
            let byte = &mut self.buffer[cur / 8];
            *byte = (*byte & !mask) | (bits_to_write << shift);
            cur += h;
            remaining -= h;
        }

        // 2) full bytes
        while remaining >= 8 {
            self.buffer[cur / 8] = ((value >> (remaining - 8)) & 0xFF) as u8;
            cur += 8;
            remaining -= 8;
        }

        // 3) tail bits
        if remaining > 0 {
            let bits_to_write = (value as u8) & ((1u16 << remaining) - 1) as u8;
            let shift = 8 - remaining;
            let mask = (((1u16 << remaining) - 1) << shift) as u8;
            let byte = &mut self.buffer[cur / 8];
            *byte = (*byte & !mask) | (bits_to_write << shift);
        }

        self.pos += num_bits;
    }

    /// Write whole bytes at pos
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.ensure_writable(data.len() * 8);
        if self.pos % 8 == 0 {
            let idx = self.pos / 8;
            self.buffer[idx..idx + data.len()].copy_from_slice(data);
            self.pos += data.len() * 8;
        } else {
            for b in data {
                self.write_bits(*b as u64, 8);
            }
        }
    }

    /// Pad with zero bits up to the next byte boundary
    pub fn write_align_zeroes(&mut self) {
        let rel = self.pos - self.start;
        let pad = (8 - rel % 8) % 8;
        self.write_zeroes(pad);
    }

    /// Extract the internal byte vector (all bytes, including any unused bits).
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes from window start up to pos, rounded up to a whole byte.
    /// Only meaningful for buffers whose window starts on a byte boundary.
    pub fn into_written_bytes(mut self) -> Vec<u8> {
        let n = (self.pos - self.start).div_ceil(8);
        let first = self.start / 8;
        self.buffer.truncate(first + n);
        self.buffer.drain(..first);
        self.buffer
    }

    /// Number of bits written, from start to pos.
    pub fn get_len_written(&self) -> usize {
        self.pos - self.start
    }

    /// Get the current position, relative to window
    pub fn get_pos(&self) -> usize {
        self.pos - self.start
    }

    /// Seek `pos` to `offset` (relative to window start).
    pub fn seek(&mut self, offset: usize) {
        let abs = self.start + offset;
        assert!(abs <= self.end, "seek out of window: got {}, allowed [{},{}]", abs, self.start, self.end);
        self.pos = abs;
    }

    /// Reads `num_bits` (<= 64) at absolute `bit_pos` without bounds checks against the window.
    fn read_bits_at_unchecked(&self, mut bit_pos: usize, num_bits: usize) -> u64 {
        let mut result = 0u64;
        let mut bits_remaining = num_bits;

        // 1) head bits to align to next byte
        let head = bit_pos % 8;
        if head != 0 && bits_remaining > 0 {
            let take = min(8 - head, bits_remaining);
            let byte = self.buffer[bit_pos / 8];
            let shift = 8 - head - take;
            let mask = ((1u16 << take) - 1) as u8;
            result = ((byte >> shift) & mask) as u64;
            bit_pos += take;
            bits_remaining -= take;
        }

        // 2) full bytes
        while bits_remaining >= 8 {
            result = (result << 8) | self.buffer[bit_pos / 8] as u64;
            bit_pos += 8;
            bits_remaining -= 8;
        }

        // 3) tail bits
        if bits_remaining > 0 {
            let byte = self.buffer[bit_pos / 8];
            let shift = 8 - bits_remaining;
            result = (result << bits_remaining) | (byte >> shift) as u64;
        }

        result
    }

}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuffer {{ <{} ^{} >{} {:02x?} }}", self.start, self.pos, self.end, self.buffer)
    }
}
