use std::sync::Arc;
use std::time::Duration;

use lte_config::{CfgBearer, LchConfig, RlcAmConfig, RlcConfig, SharedConfig, StackConfig, StackState};
use lte_core::{BufferPool, ByteBuffer, Lcid, Rnti, RntiType, Tti};
use lte_entities::mac::Mac;
use lte_entities::rlc::rlc_layer::Rlc;
use lte_saps::phy::MacGrant;

use super::mock_phy::MockPhy;
use super::sink::UpperRx;

/// Creates a default config for testing: SRB1 in AM and DRB1 in TM on LCG 1.
/// It can still be modified before passing it to the StackTest constructor.
pub fn default_test_config() -> StackConfig {
    let mut cfg = StackConfig::default();
    cfg.bearers = vec![
        CfgBearer {
            lcid: 1,
            rlc: RlcConfig::Am(RlcAmConfig::default()),
            lch: LchConfig { priority: 1, pbr: None, bucket_size_duration_ms: 0, lcg: 0 },
        },
        CfgBearer {
            lcid: 3,
            rlc: RlcConfig::Tm,
            lch: LchConfig { priority: 2, pbr: Some(0), bucket_size_duration_ms: 100, lcg: 1 },
        },
    ];
    // PHR off so transport blocks only carry what the tests expect
    cfg.mac.phr_periodic_timer_ms = 0;
    cfg
}

/// RLC and MAC wired together around a mock PHY
pub struct StackTest {
    pub config: SharedConfig,
    pub pool: Arc<BufferPool>,
    pub rlc: Arc<Rlc>,
    pub mac: Mac,
    pub phy: MockPhy,
    pub upper: UpperRx,
    pub tti: Tti,
}

impl StackTest {
    pub fn new(config: StackConfig, crnti: Rnti) -> Self {
        let shared = SharedConfig::from_parts(config, StackState { crnti, rrc_connected: crnti != 0 });
        let pool = BufferPool::new(64, 2048, Duration::from_millis(1));
        let (sink, upper) = UpperRx::new(64);
        let rlc = Arc::new(Rlc::new(shared.clone(), pool.clone(), sink.clone()));
        let phy = MockPhy::new();
        let mac = Mac::new(shared.clone(), Box::new(phy.clone()), rlc.clone(), sink);
        Self { config: shared, pool, rlc, mac, phy, upper, tti: Tti::new(0) }
    }

    /// Advance one TTI through RLC and MAC
    pub fn clock(&mut self) {
        self.tti = self.tti.add_ttis(1);
        self.rlc.tti_tick(self.tti);
        self.mac.tti_clock(self.tti);
    }

    pub fn clock_n(&mut self, n: usize) {
        for _ in 0..n {
            self.clock();
        }
    }

    pub fn write_sdu(&self, lcid: Lcid, data: &[u8]) {
        self.rlc.write_sdu(lcid, ByteBuffer::from_slice(data));
    }

    pub fn grant(&self, rnti_type: RntiType, rnti: Rnti, pid: u32, ndi: bool, tbs: usize) -> MacGrant {
        MacGrant { rnti, rnti_type, ndi, tbs, rv: 0, pid, tti: self.tti, is_from_rar: false }
    }
}
