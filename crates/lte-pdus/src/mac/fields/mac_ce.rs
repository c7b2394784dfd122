use core::fmt;

use lte_core::{BitBuffer, Direction, PduParseErr, Rnti, let_field};

use crate::mac::enums::bsr_format::BsrFormat;
use crate::mac::enums::dl_ce_type::DlCeType;
use crate::mac::enums::ul_ce_type::UlCeType;
use crate::mac::fields::ce_tables::{bsr_level, phr_level};

pub const NOF_LCG: usize = 4;

/// MAC control element, 36.321 6.1.3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacCe {
    // UL-SCH
    Phr { level: u8 },
    CRnti(Rnti),
    ShortBsr { lcg: u8, level: u8 },
    TruncatedBsr { lcg: u8, level: u8 },
    LongBsr { levels: [u8; NOF_LCG] },

    // DL-SCH
    /// 48-bit UE contention resolution identity
    ContentionResolutionId(u64),
    /// 6-bit timing advance command
    TaCommand(u8),
    Drx,
}

impl MacCe {
    /// BSR from per-LCG buffer sizes in bytes. Short and truncated formats report
    /// the last LCG with data.
    pub fn bsr(format: BsrFormat, buff_size: &[u32; NOF_LCG]) -> MacCe {
        match format {
            BsrFormat::Long => MacCe::LongBsr { levels: (*buff_size).map(bsr_level) },
            BsrFormat::Short | BsrFormat::Truncated => {
                let lcg = buff_size.iter().rposition(|&b| b > 0).unwrap_or(0);
                let level = bsr_level(buff_size[lcg]);
                let lcg = lcg as u8;
                if format == BsrFormat::Short {
                    MacCe::ShortBsr { lcg, level }
                } else {
                    MacCe::TruncatedBsr { lcg, level }
                }
            }
        }
    }

    pub fn phr(headroom_db: f32) -> MacCe {
        MacCe::Phr { level: phr_level(headroom_db) }
    }

    pub fn direction(&self) -> Direction {
        match self {
            MacCe::Phr { .. }
            | MacCe::CRnti(_)
            | MacCe::ShortBsr { .. }
            | MacCe::TruncatedBsr { .. }
            | MacCe::LongBsr { .. } => Direction::Ul,
            MacCe::ContentionResolutionId(_) | MacCe::TaCommand(_) | MacCe::Drx => Direction::Dl,
        }
    }

    pub fn lcid(&self) -> u32 {
        let raw = match self {
            MacCe::Phr { .. } => UlCeType::Phr.into_raw(),
            MacCe::CRnti(_) => UlCeType::CRnti.into_raw(),
            MacCe::ShortBsr { .. } => UlCeType::ShortBsr.into_raw(),
            MacCe::TruncatedBsr { .. } => UlCeType::TruncatedBsr.into_raw(),
            MacCe::LongBsr { .. } => UlCeType::LongBsr.into_raw(),
            MacCe::ContentionResolutionId(_) => DlCeType::ContentionResolutionId.into_raw(),
            MacCe::TaCommand(_) => DlCeType::TaCommand.into_raw(),
            MacCe::Drx => DlCeType::Drx.into_raw(),
        };
        raw as u32
    }

    pub fn payload_size(&self) -> usize {
        match self {
            MacCe::Phr { .. } => UlCeType::Phr.payload_size(),
            MacCe::CRnti(_) => UlCeType::CRnti.payload_size(),
            MacCe::ShortBsr { .. } => UlCeType::ShortBsr.payload_size(),
            MacCe::TruncatedBsr { .. } => UlCeType::TruncatedBsr.payload_size(),
            MacCe::LongBsr { .. } => UlCeType::LongBsr.payload_size(),
            MacCe::ContentionResolutionId(_) => DlCeType::ContentionResolutionId.payload_size(),
            MacCe::TaCommand(_) => DlCeType::TaCommand.payload_size(),
            MacCe::Drx => DlCeType::Drx.payload_size(),
        }
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        match *self {
            MacCe::Phr { level } => {
                buf.write_bits(0, 2);
                buf.write_bits(level as u64 & 0x3f, 6);
            }
            MacCe::CRnti(rnti) => buf.write_bits(rnti as u64, 16),
            MacCe::ShortBsr { lcg, level } | MacCe::TruncatedBsr { lcg, level } => {
                buf.write_bits(lcg as u64 & 0x3, 2);
                buf.write_bits(level as u64 & 0x3f, 6);
            }
            MacCe::LongBsr { levels } => {
                for level in levels {
                    buf.write_bits(level as u64 & 0x3f, 6);
                }
            }
            MacCe::ContentionResolutionId(id) => buf.write_bits(id & 0xffff_ffff_ffff, 48),
            MacCe::TaCommand(ta) => {
                buf.write_bits(0, 2);
                buf.write_bits(ta as u64 & 0x3f, 6);
            }
            MacCe::Drx => {}
        }
    }

    /// Parse the payload of a control element. Returns None for padding.
    pub fn from_bitbuf(dir: Direction, lcid: u32, buf: &mut BitBuffer) -> Result<Option<MacCe>, PduParseErr> {
        let ce = match dir {
            Direction::Ul => {
                let ce_type = UlCeType::try_from(lcid as u64)
                    .map_err(|_| PduParseErr::InvalidValue { field: "ul_ce_lcid", value: lcid as u64 })?;
                match ce_type {
                    UlCeType::Phr => {
                        let_field!(buf, _reserved, 2);
                        let_field!(buf, level, 6);
                        MacCe::Phr { level: level as u8 }
                    }
                    UlCeType::CRnti => {
                        let_field!(buf, crnti, 16);
                        MacCe::CRnti(crnti as Rnti)
                    }
                    UlCeType::ShortBsr | UlCeType::TruncatedBsr => {
                        let_field!(buf, lcg, 2);
                        let_field!(buf, level, 6);
                        if ce_type == UlCeType::ShortBsr {
                            MacCe::ShortBsr { lcg: lcg as u8, level: level as u8 }
                        } else {
                            MacCe::TruncatedBsr { lcg: lcg as u8, level: level as u8 }
                        }
                    }
                    UlCeType::LongBsr => {
                        let mut levels = [0u8; NOF_LCG];
                        for level in levels.iter_mut() {
                            *level = buf.read_field(6, "bsr_level")? as u8;
                        }
                        MacCe::LongBsr { levels }
                    }
                    UlCeType::Padding => return Ok(None),
                }
            }
            Direction::Dl => {
                let ce_type = DlCeType::try_from(lcid as u64)
                    .map_err(|_| PduParseErr::InvalidValue { field: "dl_ce_lcid", value: lcid as u64 })?;
                match ce_type {
                    DlCeType::ContentionResolutionId => {
                        let_field!(buf, con_res_id, 48);
                        MacCe::ContentionResolutionId(con_res_id)
                    }
                    DlCeType::TaCommand => {
                        let_field!(buf, _reserved, 2);
                        let_field!(buf, ta_cmd, 6);
                        MacCe::TaCommand(ta_cmd as u8)
                    }
                    DlCeType::Drx => MacCe::Drx,
                    DlCeType::Padding => return Ok(None),
                }
            }
        };
        Ok(Some(ce))
    }
}

impl fmt::Display for MacCe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacCe::Phr { level } => write!(f, "PHR level {}", level),
            MacCe::CRnti(rnti) => write!(f, "C-RNTI 0x{:04x}", rnti),
            MacCe::ShortBsr { lcg, level } => write!(f, "ShortBSR lcg {} level {}", lcg, level),
            MacCe::TruncatedBsr { lcg, level } => write!(f, "TruncatedBSR lcg {} level {}", lcg, level),
            MacCe::LongBsr { levels } => write!(f, "LongBSR levels {:?}", levels),
            MacCe::ContentionResolutionId(id) => write!(f, "ConResId 0x{:012x}", id),
            MacCe::TaCommand(ta) => write!(f, "TA {}", ta),
            MacCe::Drx => write!(f, "DRX"),
        }
    }
}
