pub mod mac_ue;
pub mod metrics;
pub mod subcomp;

pub use mac_ue::Mac;
pub use metrics::MacMetrics;

use lte_core::TimerService;

/// MAC timers, 36.321. HARQ RTT is implicit in the PHY scheduling and not kept here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MacTimer {
    TimeAlignment,
    ContentionResolution,
    BsrPeriodic,
    BsrRetx,
    PhrPeriodic,
    PhrProhibit,
}

pub type MacTimers = TimerService<MacTimer>;
