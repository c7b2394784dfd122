//! LTE UE layer 2 PDU codecs
//!
//! - MAC: UL/DL-SCH PDUs with their control elements, and random access responses
//! - RLC: AMD and UMD headers and the AM status PDU

pub mod mac;
pub mod rlc;
