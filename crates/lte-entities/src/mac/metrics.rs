use core::fmt;

/// MAC counters over one reporting period
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacMetrics {
    pub tx_pkts: u32,
    /// Transport blocks dropped after the last HARQ transmission
    pub tx_errors: u32,
    /// Bits per second
    pub tx_brate: f64,
    pub rx_pkts: u32,
    /// Transport blocks with a CRC error
    pub rx_errors: u32,
    /// Bits per second
    pub rx_brate: f64,
    /// Bytes pending in the RLC at the time of reading
    pub ul_buffer: u32,
}

/// Raw counters accumulated per TTI, turned into `MacMetrics` on read
#[derive(Debug, Default)]
pub(crate) struct MacCounters {
    pub nof_ttis: u32,
    pub tx_pkts: u32,
    pub tx_errors: u32,
    pub tx_bits: u64,
    pub rx_pkts: u32,
    pub rx_errors: u32,
    pub rx_bits: u64,
}

impl MacCounters {
    pub fn take(&mut self, ul_buffer: u32) -> MacMetrics {
        let c = std::mem::take(self);
        let secs = c.nof_ttis.max(1) as f64 / 1000.0;
        MacMetrics {
            tx_pkts: c.tx_pkts,
            tx_errors: c.tx_errors,
            tx_brate: c.tx_bits as f64 / secs,
            rx_pkts: c.rx_pkts,
            rx_errors: c.rx_errors,
            rx_brate: c.rx_bits as f64 / secs,
            ul_buffer,
        }
    }
}

impl fmt::Display for MacMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ul {} pkts ({} err) {:.1} kbps | dl {} pkts ({} err) {:.1} kbps | ul buffer {} bytes",
            self.tx_pkts,
            self.tx_errors,
            self.tx_brate / 1000.0,
            self.rx_pkts,
            self.rx_errors,
            self.rx_brate / 1000.0,
            self.ul_buffer
        )
    }
}
