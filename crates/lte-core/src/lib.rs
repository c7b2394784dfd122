//! Core utilities for the LTE UE stack
//!
//! This crate provides fundamental types and utilities used across the stack:
//! - BitBuffer for bit-level header manipulation
//! - Tti for subframe timing
//! - Radio bearer and RNTI identifiers
//! - The shared byte buffer pool and the TTI-driven timer service
//! - Common macros and debug utilities

pub mod bitbuffer;
pub mod buffer_pool;
pub mod debug;
pub mod lte_common;
pub mod lte_entities;
pub mod pdu_build_error;
pub mod pdu_parse_error;
pub mod radio_bearer;
pub mod timers;
pub mod tti;

// Re-export commonly used items
pub use bitbuffer::BitBuffer;
pub use buffer_pool::{BufferPool, ByteBuffer};
pub use lte_common::*;
pub use lte_entities::LteEntity;
pub use pdu_build_error::PduBuildErr;
pub use pdu_parse_error::PduParseErr;
pub use radio_bearer::*;
pub use timers::TimerService;
pub use tti::Tti;

/// 16-bit radio network temporary identifier
pub type Rnti = u16;

/// HARQ process identifier
pub type HarqPid = u32;
