pub mod sdu_reassembler;
pub mod sn_math;
pub mod tx_sdu_queue;
