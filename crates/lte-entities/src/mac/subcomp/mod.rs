pub mod bsr_proc;
pub mod demux;
pub mod dl_harq;
pub mod mux;
pub mod pcap;
pub mod phr_proc;
pub mod ra_proc;
pub mod sr_proc;
pub mod ul_harq;

#[cfg(test)]
pub(crate) mod fake_rlc;
#[cfg(test)]
pub(crate) mod fake_phy;
