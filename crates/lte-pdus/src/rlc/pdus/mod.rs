pub mod amd_pdu_header;
pub mod status_pdu;
pub mod umd_pdu_header;
