pub mod bsr_format;
pub mod dl_ce_type;
pub mod ul_ce_type;
