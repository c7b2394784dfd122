use core::fmt;

use lte_core::{BitBuffer, PduParseErr, let_field};

/// 36.213 6.2: 20-bit uplink grant carried in a random access response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RarGrant {
    // 1
    pub hopping_flag: bool,
    // 10
    pub rb_assignment: u16,
    // 4
    pub trunc_mcs: u8,
    // 3
    pub tpc: u8,
    // 1
    pub ul_delay: bool,
    // 1
    pub cqi_request: bool,
}

impl RarGrant {
    pub fn from_bits(grant: u32) -> Self {
        let mut buf = BitBuffer::new(20);
        buf.write_bits(grant as u64 & 0xfffff, 20);
        buf.seek(0);
        // Exactly 20 bits available
        Self::from_bitbuf(&mut buf).unwrap_or_default()
    }

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let hopping_flag = buf.read_flag("hopping_flag")?;
        let_field!(buf, rb_assignment, 10);
        let_field!(buf, trunc_mcs, 4);
        let_field!(buf, tpc, 3);
        let ul_delay = buf.read_flag("ul_delay")?;
        let cqi_request = buf.read_flag("cqi_request")?;
        Ok(RarGrant {
            hopping_flag,
            rb_assignment: rb_assignment as u16,
            trunc_mcs: trunc_mcs as u8,
            tpc: tpc as u8,
            ul_delay,
            cqi_request,
        })
    }

    pub fn into_bits(self) -> u32 {
        (self.hopping_flag as u32) << 19
            | (self.rb_assignment as u32 & 0x3ff) << 9
            | (self.trunc_mcs as u32 & 0xf) << 5
            | (self.tpc as u32 & 0x7) << 2
            | (self.ul_delay as u32) << 1
            | self.cqi_request as u32
    }
}

impl fmt::Display for RarGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RarGrant {{ hopping: {} rba: {} mcs: {} tpc: {} ul_delay: {} cqi_req: {} }}",
            self.hopping_flag, self.rb_assignment, self.trunc_mcs, self.tpc, self.ul_delay, self.cqi_request
        )
    }
}
