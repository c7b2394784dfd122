use crate::mac::{MacTimer, MacTimers};

/// Power headroom reporting, 36.321 5.4.6. Pathloss changes are not reported by
/// the PHY, so reports are triggered by configuration and the periodic timer.
pub struct PhrProc {
    periodic_ms: u32,
    prohibit_ms: u32,
    triggered: bool,
}

impl PhrProc {
    pub fn new(periodic_ms: u32, prohibit_ms: u32) -> Self {
        PhrProc { periodic_ms, prohibit_ms, triggered: periodic_ms > 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.periodic_ms > 0
    }

    /// Configuring the reporting functionality triggers a report
    pub fn set_config(&mut self, periodic_ms: u32, prohibit_ms: u32, timers: &mut MacTimers) {
        self.periodic_ms = periodic_ms;
        self.prohibit_ms = prohibit_ms;
        timers.stop(MacTimer::PhrPeriodic);
        timers.stop(MacTimer::PhrProhibit);
        self.triggered = self.is_enabled();
    }

    pub fn reset(&mut self) {
        self.triggered = self.is_enabled();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn timer_expired(&mut self, timer: MacTimer) {
        if timer == MacTimer::PhrPeriodic && self.is_enabled() {
            tracing::debug!("periodic PHR triggered");
            self.triggered = true;
        }
    }

    /// True when a PHR goes into the PDU being built. Restarts both timers.
    pub fn generate_phr_on_ul_grant(&mut self, timers: &mut MacTimers) -> bool {
        if !self.triggered || timers.is_running(MacTimer::PhrProhibit) {
            return false;
        }
        self.triggered = false;
        if self.periodic_ms > 0 {
            timers.start(MacTimer::PhrPeriodic, self.periodic_ms);
        }
        if self.prohibit_ms > 0 {
            timers.start(MacTimer::PhrProhibit, self.prohibit_ms);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use lte_core::debug;

    use super::*;

    #[test]
    fn test_periodic_and_prohibit() {
        debug::setup_logging_verbose();
        let mut timers = MacTimers::new();
        let mut phr = PhrProc::new(20, 50);
        assert!(phr.generate_phr_on_ul_grant(&mut timers));
        assert!(!phr.generate_phr_on_ul_grant(&mut timers));

        for t in timers.advance(20) {
            phr.timer_expired(t);
        }
        assert!(phr.is_triggered());
        // Prohibit still running
        assert!(!phr.generate_phr_on_ul_grant(&mut timers));
        timers.advance(30);
        assert!(phr.generate_phr_on_ul_grant(&mut timers));
    }

    #[test]
    fn test_disabled() {
        debug::setup_logging_verbose();
        let mut timers = MacTimers::new();
        let mut phr = PhrProc::new(0, 0);
        assert!(!phr.generate_phr_on_ul_grant(&mut timers));
        phr.set_config(10, 0, &mut timers);
        assert!(phr.generate_phr_on_ul_grant(&mut timers));
        assert!(timers.is_running(MacTimer::PhrPeriodic));
        assert!(!timers.is_running(MacTimer::PhrProhibit));
    }
}
