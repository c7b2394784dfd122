use clap::Parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use lte_config::{SharedConfig, toml_config};
use lte_core::{BufferPool, ByteBuffer, Lcid, RbId, STACK_VERSION, Tti, debug, rb_name};
use lte_entities::mac::Mac;
use lte_entities::mac::subcomp::pcap::MacPcap;
use lte_entities::rlc::rlc_layer::Rlc;
use lte_saps::{SapMsg, SapMsgInner, UpperSink};

mod enb_emu;
use enb_emu::{EnbEmulator, LoopbackPhy};

const TTI_DURATION: Duration = Duration::from_millis(1);
const METRICS_PERIOD_TTIS: u32 = 1000;
const UPPER_QUEUE_DEPTH: usize = 1024;
/// Uplink traffic on the default data bearer once connected
const TRAFFIC_PERIOD_TTIS: u32 = 20;
const TRAFFIC_SDU_LEN: usize = 300;
/// RRC connection request stand-in, its first 48 bits identify the UE during contention
const CONNECTION_REQUEST: [u8; 6] = [0x40, 0x12, 0x34, 0x56, 0x78, 0x9a];

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

/// Consume everything the MAC and RLC deliver upward, standing in for PDCP and RRC
fn run_upper_layer(rx: Receiver<SapMsg>, running: Arc<AtomicBool>) {
    let mut nof_sdus = 0u64;
    let mut nof_bytes = 0u64;
    while running.load(Ordering::SeqCst) {
        let msg = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match msg.msg {
            SapMsgInner::RlcDataInd(ind) => {
                nof_sdus += 1;
                nof_bytes += ind.sdu.len() as u64;
                tracing::debug!("<- {} SDU {} bytes at {}", rb_name(ind.lcid), ind.sdu.len(), msg.tti);
            }
            SapMsgInner::MacRaCompleteInd(ind) => tracing::info!("<- random access complete, c-rnti 0x{:04x}", ind.crnti),
            SapMsgInner::MacRaProblemInd(ind) => {
                tracing::warn!("<- random access problem after {} preambles", ind.preamble_tx_count)
            }
            SapMsgInner::MacSrReleaseInd(ind) => tracing::warn!("<- PUCCH released after {} SRs", ind.sr_count),
            SapMsgInner::MacTaExpiredInd(_) => tracing::warn!("<- time alignment lost"),
            SapMsgInner::RlcMaxRetxInd(ind) => {
                tracing::warn!("<- lcid {} sn {} reached max retransmissions", ind.lcid, ind.sn)
            }
            other => tracing::debug!("<- {}", other),
        }
    }
    tracing::info!("upper layer received {} SDUs, {} bytes", nof_sdus, nof_bytes);
}

/// Lowest-priority data bearer of the configuration
fn traffic_lcid(cfg: &SharedConfig) -> Option<Lcid> {
    cfg.config()
        .bearers
        .iter()
        .filter(|b| RbId::try_from(b.lcid).is_ok_and(|rb| !rb.is_srb()))
        .max_by_key(|b| b.lch.priority)
        .map(|b| b.lcid)
}

/// Drive the stack with a 1 ms TTI clock until `running` is cleared
fn run_tti_clock(cfg: SharedConfig, rlc: Arc<Rlc>, mut mac: Mac, mut enb: EnbEmulator, running: Arc<AtomicBool>) {
    let data_lcid = traffic_lcid(&cfg);
    let mut tti = Tti::default();
    let mut next_deadline = Instant::now();
    let mut nof_ttis = 0u32;

    rlc.write_sdu(RbId::Srb0.into_raw(), ByteBuffer::from_slice(&CONNECTION_REQUEST));

    while running.load(Ordering::SeqCst) {
        tti = tti.add_ttis(1);
        nof_ttis = nof_ttis.wrapping_add(1);

        rlc.tti_tick(tti);
        mac.tti_clock(tti);
        enb.run_tti(&mut mac, tti);

        if let Some(lcid) = data_lcid {
            if enb.is_connected() && nof_ttis % TRAFFIC_PERIOD_TTIS == 0 {
                let payload: Vec<u8> = (0..TRAFFIC_SDU_LEN).map(|i| (i as u32 + nof_ttis) as u8).collect();
                rlc.write_sdu(lcid, ByteBuffer::from_slice(&payload));
            }
        }

        if nof_ttis % METRICS_PERIOD_TTIS == 0 {
            tracing::info!("{} mac: {}", tti, mac.get_metrics());
            for (lcid, m) in rlc.get_metrics() {
                tracing::info!(
                    "{} rlc lcid {}: tx {} sdus {} bytes, rx {} sdus {} bytes, retx {}, dropped {}",
                    tti,
                    lcid,
                    m.tx_sdus,
                    m.tx_bytes,
                    m.rx_sdus,
                    m.rx_bytes,
                    m.retx_pdus,
                    m.dropped
                );
            }
        }

        next_deadline += TTI_DURATION;
        let now = Instant::now();
        if next_deadline > now {
            thread::sleep(next_deadline - now);
        } else if now - next_deadline > Duration::from_millis(10) {
            tracing::warn!("TTI clock {} ms late, resyncing", (now - next_deadline).as_millis());
            next_deadline = now;
        }
    }

    if let Some(mut pcap) = mac.stop_pcap() {
        pcap.flush();
        tracing::info!("pcap closed after {} records", pcap.nof_records());
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LTE UE layer 2 stack",
    long_about = "Runs the LTE UE MAC and RLC against a loopback eNB emulator using the provided TOML configuration file"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with MAC, RACH and bearer parameters")]
    config: String,
}

fn main() {
    eprintln!("[+] LTE UE layer 2 stack {}", STACK_VERSION);

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    let stack_cfg = cfg.config();
    let bp = &stack_cfg.buffer_pool;
    let pool = BufferPool::new(bp.nof_buffers, bp.buffer_capacity, Duration::from_millis(bp.alloc_timeout_ms));
    let (tx, rx) = bounded(UPPER_QUEUE_DEPTH);
    let sink = UpperSink::new(tx);

    let rlc = Arc::new(Rlc::new(cfg.clone(), pool, sink.clone()));
    let phy = LoopbackPhy::new();
    let mut mac = Mac::new(cfg.clone(), Box::new(phy.clone()), rlc.clone(), sink);
    let enb = EnbEmulator::new(phy);

    let pcap_cfg = &stack_cfg.pcap;
    if pcap_cfg.enable {
        let filename = pcap_cfg.filename.clone().unwrap_or_else(|| "ue_mac.pcap".to_string());
        match MacPcap::open(&filename, stack_cfg.ue_id) {
            Ok(pcap) => {
                eprintln!(" -> Writing MAC pcap to {}", filename);
                mac.start_pcap(pcap);
            }
            Err(e) => tracing::error!("cannot open pcap file {}: {}", filename, e),
        }
    }

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let upper = {
        let running = running.clone();
        thread::Builder::new()
            .name("upper".to_string())
            .spawn(move || run_upper_layer(rx, running))
            .expect("failed to spawn upper layer thread")
    };
    let clock = {
        let running = running.clone();
        let cfg = cfg.clone();
        thread::Builder::new()
            .name("tti-clock".to_string())
            .spawn(move || run_tti_clock(cfg, rlc, mac, enb, running))
            .expect("failed to spawn TTI clock thread")
    };

    if clock.join().is_err() {
        tracing::error!("TTI clock thread panicked");
        running.store(false, Ordering::SeqCst);
    }
    if upper.join().is_err() {
        tracing::error!("upper layer thread panicked");
    }
}
