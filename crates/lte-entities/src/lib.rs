//! MAC and RLC protocol entities of the LTE UE stack

pub mod mac;
pub mod rlc;
