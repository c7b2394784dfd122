pub mod components;
pub mod metrics;
pub mod rlc_am;
pub mod rlc_entity;
pub mod rlc_layer;
pub mod rlc_tm;
pub mod rlc_um;
