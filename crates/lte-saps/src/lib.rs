//! Primitives and call interfaces between the MAC/RLC core and its neighbours

pub mod interfaces;
pub mod mac;
pub mod phy;
pub mod rlc;
pub mod sapmsg;
pub mod upper_sink;

pub use sapmsg::*;
pub use upper_sink::UpperSink;
