use core::fmt;

use lte_core::{Lcid, N_RADIO_BEARERS, rb_name};
use lte_pdus::mac::enums::bsr_format::BsrFormat;
use lte_pdus::mac::fields::mac_ce::NOF_LCG;
use lte_saps::interfaces::RlcInterfaceMac;

use crate::mac::{MacTimer, MacTimers};

/// Subheader plus payload of a short or truncated BSR
const SHORT_BSR_LEN: usize = 2;
/// Subheader plus payload of a long BSR
const LONG_BSR_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsrTrigger {
    Regular,
    Periodic,
}

impl fmt::Display for BsrTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BsrTrigger::Regular => write!(f, "Regular"),
            BsrTrigger::Periodic => write!(f, "Periodic"),
        }
    }
}

/// Buffer status report ready to be put in a PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bsr {
    pub format: BsrFormat,
    /// Bytes pending per logical channel group
    pub buff_size: [u32; NOF_LCG],
}

#[derive(Debug, Clone, Copy)]
struct LchInfo {
    lcg: u8,
    priority: u32,
}

/// Buffer status reporting, 36.321 5.4.5
pub struct BsrProc {
    periodic_ms: u32,
    retx_ms: u32,
    lch: [Option<LchInfo>; N_RADIO_BEARERS],
    last_pending: [u32; N_RADIO_BEARERS],
    triggered: Option<BsrTrigger>,
    sr_sent: bool,
    cancel_sr: bool,
}

impl BsrProc {
    pub fn new(periodic_ms: u32, retx_ms: u32) -> Self {
        BsrProc {
            periodic_ms,
            retx_ms,
            lch: [None; N_RADIO_BEARERS],
            last_pending: [0; N_RADIO_BEARERS],
            triggered: None,
            sr_sent: false,
            cancel_sr: false,
        }
    }

    pub fn set_config(&mut self, periodic_ms: u32, retx_ms: u32) {
        self.periodic_ms = periodic_ms;
        self.retx_ms = retx_ms;
    }

    /// Forget triggers and pending data. LCG mapping is kept.
    pub fn reset(&mut self) {
        self.last_pending = [0; N_RADIO_BEARERS];
        self.triggered = None;
        self.sr_sent = false;
        self.cancel_sr = false;
    }

    pub fn setup_lcg(&mut self, lcid: Lcid, lcg: u8, priority: u32) {
        let Some(slot) = self.lch.get_mut(lcid as usize) else {
            tracing::warn!("cannot map lcid {} to an LCG", lcid);
            return;
        };
        if lcg as usize >= NOF_LCG {
            tracing::warn!("invalid lcg {} for {}", lcg, rb_name(lcid));
            return;
        }
        *slot = Some(LchInfo { lcg, priority });
        tracing::debug!("{} in lcg {} priority {}", rb_name(lcid), lcg, priority);
    }

    pub fn triggered(&self) -> Option<BsrTrigger> {
        self.triggered
    }

    fn trigger(&mut self, trigger: BsrTrigger) {
        // A regular BSR is not downgraded by a periodic one
        if self.triggered != Some(BsrTrigger::Regular) {
            tracing::debug!("{} BSR triggered", trigger);
            self.triggered = Some(trigger);
        }
    }

    fn lcg_buffer_sizes(&self, rlc: &dyn RlcInterfaceMac) -> [u32; NOF_LCG] {
        let mut sizes = [0u32; NOF_LCG];
        for (lcid, info) in self.lch.iter().enumerate() {
            if let Some(info) = info {
                sizes[info.lcg as usize] += rlc.get_buffer_state(lcid as Lcid);
            }
        }
        sizes
    }

    fn nof_lcg_with_data(sizes: &[u32; NOF_LCG]) -> usize {
        sizes.iter().filter(|&&s| s > 0).count()
    }

    /// Look for new data on the channels mapped to an LCG. Called once per TTI.
    /// New data on a channel with higher priority than every channel already
    /// holding data, or on any channel when none holds data, triggers a regular BSR.
    pub fn step(&mut self, rlc: &dyn RlcInterfaceMac) {
        let best_before = self
            .lch
            .iter()
            .zip(self.last_pending.iter())
            .filter_map(|(info, &pending)| info.filter(|_| pending > 0).map(|i| i.priority))
            .min();

        let mut new_data = false;
        for lcid in 0..N_RADIO_BEARERS {
            let Some(info) = self.lch[lcid] else {
                continue;
            };
            let now = rlc.get_buffer_state(lcid as Lcid);
            if now > self.last_pending[lcid] {
                match best_before {
                    None => new_data = true,
                    Some(best) if info.priority < best => new_data = true,
                    _ => {}
                }
            }
            self.last_pending[lcid] = now;
        }

        if new_data {
            self.trigger(BsrTrigger::Regular);
        }
    }

    pub fn timer_expired(&mut self, timer: MacTimer, rlc: &dyn RlcInterfaceMac) {
        match timer {
            MacTimer::BsrPeriodic => self.trigger(BsrTrigger::Periodic),
            MacTimer::BsrRetx => {
                let sizes = self.lcg_buffer_sizes(rlc);
                if Self::nof_lcg_with_data(&sizes) > 0 {
                    self.trigger(BsrTrigger::Regular);
                }
            }
            _ => {}
        }
    }

    fn restart_timers(&self, timers: &mut MacTimers) {
        if self.periodic_ms > 0 {
            timers.start(MacTimer::BsrPeriodic, self.periodic_ms);
        }
        if self.retx_ms > 0 {
            timers.start(MacTimer::BsrRetx, self.retx_ms);
        }
    }

    /// Regular or periodic BSR to put in a PDU with `grant_size` bytes left.
    /// Clears the trigger and restarts the BSR timers when one is returned.
    pub fn need_to_send_bsr_on_ul_grant(
        &mut self,
        grant_size: usize,
        rlc: &dyn RlcInterfaceMac,
        timers: &mut MacTimers,
    ) -> Option<Bsr> {
        let trigger = self.triggered?;
        if grant_size < SHORT_BSR_LEN {
            return None;
        }

        let buff_size = self.lcg_buffer_sizes(rlc);
        let format = if Self::nof_lcg_with_data(&buff_size) > 1 {
            if grant_size >= LONG_BSR_LEN { BsrFormat::Long } else { BsrFormat::Truncated }
        } else {
            BsrFormat::Short
        };

        self.restart_timers(timers);
        self.triggered = None;
        self.sr_sent = false;
        // Pending SR is cancelled by a PDU carrying this report
        self.cancel_sr = true;
        tracing::debug!("-> {} {} BSR {:?}", trigger, format, buff_size);
        Some(Bsr { format, buff_size })
    }

    /// BSR filling the padding of a PDU, when no other BSR is included
    pub fn generate_padding_bsr(&self, nof_padding_bytes: usize, rlc: &dyn RlcInterfaceMac) -> Option<Bsr> {
        if nof_padding_bytes < SHORT_BSR_LEN {
            return None;
        }
        let buff_size = self.lcg_buffer_sizes(rlc);
        let multiple = Self::nof_lcg_with_data(&buff_size) > 1;
        let format = match (nof_padding_bytes >= LONG_BSR_LEN, multiple) {
            (true, true) => BsrFormat::Long,
            (false, true) => BsrFormat::Truncated,
            (_, false) => BsrFormat::Short,
        };
        tracing::trace!("-> Padding {} BSR {:?}", format, buff_size);
        Some(Bsr { format, buff_size })
    }

    /// True once per regular BSR that still waits for an uplink grant
    pub fn need_to_send_sr(&mut self) -> bool {
        if self.triggered == Some(BsrTrigger::Regular) && !self.sr_sent {
            self.sr_sent = true;
            return true;
        }
        false
    }

    /// True once after a PDU carried a regular or periodic BSR
    pub fn take_sr_cancel(&mut self) -> bool {
        std::mem::take(&mut self.cancel_sr)
    }
}

#[cfg(test)]
mod tests {
    use lte_core::debug;

    use super::*;
    use crate::mac::subcomp::fake_rlc::FakeRlc;

    fn setup() -> (BsrProc, FakeRlc, MacTimers) {
        let mut bsr = BsrProc::new(20, 2560);
        bsr.setup_lcg(1, 0, 1);
        bsr.setup_lcg(3, 1, 5);
        bsr.setup_lcg(4, 2, 7);
        (bsr, FakeRlc::default(), MacTimers::new())
    }

    #[test]
    fn test_regular_trigger_on_first_data() {
        debug::setup_logging_verbose();
        let (mut bsr, rlc, mut timers) = setup();
        bsr.step(&rlc);
        assert_eq!(bsr.triggered(), None);

        rlc.set_pending(3, 100);
        bsr.step(&rlc);
        assert_eq!(bsr.triggered(), Some(BsrTrigger::Regular));
        assert!(bsr.need_to_send_sr());
        assert!(!bsr.need_to_send_sr());

        let report = bsr.need_to_send_bsr_on_ul_grant(50, &rlc, &mut timers).unwrap();
        assert_eq!(report.format, BsrFormat::Short);
        assert_eq!(report.buff_size, [0, 100, 0, 0]);
        assert!(bsr.take_sr_cancel());
        assert!(timers.is_running(MacTimer::BsrPeriodic));
        assert!(timers.is_running(MacTimer::BsrRetx));
        assert_eq!(bsr.triggered(), None);
    }

    #[test]
    fn test_priority_rule() {
        debug::setup_logging_verbose();
        let (mut bsr, rlc, mut timers) = setup();
        rlc.set_pending(3, 100);
        bsr.step(&rlc);
        bsr.need_to_send_bsr_on_ul_grant(50, &rlc, &mut timers);

        // Lower priority data does not trigger
        rlc.set_pending(4, 10);
        bsr.step(&rlc);
        assert_eq!(bsr.triggered(), None);

        // Higher priority data does
        rlc.set_pending(1, 10);
        bsr.step(&rlc);
        assert_eq!(bsr.triggered(), Some(BsrTrigger::Regular));
        let report = bsr.need_to_send_bsr_on_ul_grant(50, &rlc, &mut timers).unwrap();
        assert_eq!(report.format, BsrFormat::Long);
        let report_small = {
            rlc.set_pending(1, 20);
            bsr.timer_expired(MacTimer::BsrRetx, &rlc);
            bsr.need_to_send_bsr_on_ul_grant(3, &rlc, &mut timers).unwrap()
        };
        assert_eq!(report.buff_size, [10, 100, 10, 0]);
        assert_eq!(report_small.format, BsrFormat::Truncated);
    }

    #[test]
    fn test_padding_formats() {
        debug::setup_logging_verbose();
        let (bsr, rlc, _) = setup();
        assert!(bsr.generate_padding_bsr(1, &rlc).is_none());
        assert_eq!(bsr.generate_padding_bsr(2, &rlc).unwrap().format, BsrFormat::Short);

        rlc.set_pending(1, 5);
        rlc.set_pending(4, 5);
        assert_eq!(bsr.generate_padding_bsr(3, &rlc).unwrap().format, BsrFormat::Truncated);
        assert_eq!(bsr.generate_padding_bsr(4, &rlc).unwrap().format, BsrFormat::Long);
    }

    #[test]
    fn test_timer_triggers() {
        debug::setup_logging_verbose();
        let (mut bsr, rlc, _) = setup();
        bsr.timer_expired(MacTimer::BsrRetx, &rlc);
        assert_eq!(bsr.triggered(), None);
        bsr.timer_expired(MacTimer::BsrPeriodic, &rlc);
        assert_eq!(bsr.triggered(), Some(BsrTrigger::Periodic));
        // Periodic BSR does not ask for an SR
        assert!(!bsr.need_to_send_sr());

        rlc.set_pending(1, 5);
        bsr.timer_expired(MacTimer::BsrRetx, &rlc);
        assert_eq!(bsr.triggered(), Some(BsrTrigger::Regular));
    }
}
