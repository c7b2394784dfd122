pub mod framing_info;
