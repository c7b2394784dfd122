#![allow(dead_code)]

pub mod mock_phy;
pub mod sink;
pub mod stack_test;

pub use mock_phy::PhyCall;
pub use sink::UpperRx;
pub use stack_test::{StackTest, default_test_config};
