//! LTE UE configuration management
//!
//! This crate provides configuration loading and parsing for the UE stack:
//! - TOML configuration file parsing
//! - Stack configuration structures
//! - RLC and logical channel bearer configuration

pub mod rlc_config;
pub mod stack_config;
pub mod toml_config;

pub use rlc_config::*;
pub use stack_config::*;
pub use toml_config::*;
