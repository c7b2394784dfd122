mod common;

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use common::{PhyCall, StackTest, default_test_config};
use lte_config::{CfgBearer, LchConfig, RlcConfig};
use lte_core::{Direction, RntiType, debug};
use lte_entities::mac::subcomp::pcap::MacPcap;
use lte_entities::mac::subcomp::ra_proc::RaState;
use lte_pdus::mac::fields::mac_ce::MacCe;
use lte_pdus::mac::pdus::rar_pdu::{RarPdu, RarResponse};
use lte_pdus::mac::pdus::sch_pdu::SchPdu;
use lte_pdus::mac::pdus::sch_pdu_builder::SchPduBuilder;
use lte_saps::SapMsgInner;
use lte_saps::interfaces::RlcInterfaceMac;

const CRNTI: u16 = 0x46;

#[test]
/// Priority 1 with an infinite PBR and 50 bytes pending, priority 2 with a zero
/// PBR and 100 bytes pending, 60 byte grant: all of channel 1 and none of channel 2
fn test_mux_priority_through_stack() {
    debug::setup_logging_verbose();
    let mut cfg = default_test_config();
    cfg.bearers = vec![
        CfgBearer { lcid: 3, rlc: RlcConfig::Tm, lch: LchConfig { priority: 1, pbr: None, bucket_size_duration_ms: 0, lcg: 0 } },
        CfgBearer { lcid: 4, rlc: RlcConfig::Tm, lch: LchConfig { priority: 2, pbr: Some(0), bucket_size_duration_ms: 50, lcg: 1 } },
    ];
    let mut test = StackTest::new(cfg, CRNTI);
    test.write_sdu(3, &[0x33; 50]);
    test.write_sdu(4, &[0x44; 100]);
    test.phy.take_calls();

    test.clock();
    assert!(test.phy.take_calls().contains(&PhyCall::Sr));

    let action = test.mac.new_grant_ul(test.grant(RntiType::CRnti, CRNTI, 0, true, 60));
    assert!(action.tx_enabled);
    assert_eq!(action.payload.len(), 60);

    let pdu = SchPdu::from_bytes(Direction::Ul, &action.payload).unwrap();
    assert!(pdu.ces().any(|ce| matches!(ce, MacCe::LongBsr { .. })));
    let sdus: Vec<(u32, usize)> = pdu.sdus().map(|(lcid, data)| (lcid, data.len())).collect();
    assert_eq!(sdus, vec![(3, 50)]);
    assert_eq!(test.rlc.get_buffer_state(3), 0);
    assert_eq!(test.rlc.get_buffer_state(4), 100);

    // The BSR in the PDU cancelled the pending SR
    test.clock();
    assert!(!test.phy.take_calls().contains(&PhyCall::Sr));
}

#[test]
/// Connection request on SRB0 from an idle UE, through RAR, Msg3 and contention resolution
fn test_random_access_with_ccch() {
    debug::setup_logging_verbose();
    let mut test = StackTest::new(default_test_config(), 0);
    let conn_request = [0x40, 0x12, 0x34, 0x56, 0x78, 0x9a];
    test.write_sdu(0, &conn_request);

    test.clock();
    let preamble = test.phy.last_prach().expect("PRACH after CCCH data");
    test.clock();
    let ra_rnti = test
        .phy
        .take_calls()
        .into_iter()
        .find_map(|c| match c {
            PhyCall::DlSearch(RntiType::RaRnti, rnti, Some(_)) => Some(rnti),
            _ => None,
        })
        .unwrap();
    assert_eq!(test.mac.ra_state(), RaState::ResponseReception);

    let rar = RarPdu {
        backoff_indicator: Some(2),
        responses: vec![RarResponse { rapid: preamble as u8, ta_cmd: 12, grant: 0x0a0b0, temp_crnti: 0x4601 }],
    };
    let g = test.grant(RntiType::RaRnti, ra_rnti, 0, false, 9);
    assert!(test.mac.new_grant_dl(g).decode_enabled);
    test.mac.tb_decoded(&g, true, &rar.to_bytes(9).unwrap());
    let calls = test.phy.take_calls();
    assert!(calls.contains(&PhyCall::TaRar(12)));
    assert!(calls.contains(&PhyCall::UlSearch(RntiType::TempCRnti, 0x4601)));

    let mut msg3_grant = test.grant(RntiType::TempCRnti, 0x4601, 2, false, 7);
    msg3_grant.is_from_rar = true;
    let msg3 = test.mac.new_grant_ul(msg3_grant);
    assert!(msg3.tx_enabled);
    let mut expected = vec![0x00];
    expected.extend_from_slice(&conn_request);
    assert_eq!(msg3.payload, expected);

    // Msg3 lost once: non-adaptive retransmission of the same bytes
    let retx = test.mac.harq_recv(2, false);
    assert_eq!(retx.payload, expected);
    assert_eq!(retx.current_tx_nb, 1);
    assert!(!test.mac.harq_recv(2, true).tx_enabled);

    // Contention resolution identity plus the connection setup on SRB0
    let conn_setup = [0x60, 0x12, 0x98, 0x0b, 0xfd, 0xd2];
    let mut b = SchPduBuilder::new_dl(24);
    b.set_con_res_id(0x4012_3456_789a).unwrap();
    b.add_sdu(0, &conn_setup).unwrap();
    let dl = b.write().unwrap();
    let g = test.grant(RntiType::TempCRnti, 0x4601, 1, true, 24);
    assert!(test.mac.new_grant_dl(g).decode_enabled);
    test.mac.tb_decoded(&g, true, &dl);

    assert_eq!(test.mac.crnti(), 0x4601);
    assert_eq!(test.config.state_read().crnti, 0x4601);
    let msgs = test.upper.take_msgs();
    assert_eq!(msgs.len(), 2);
    match &msgs[0].msg {
        SapMsgInner::RlcDataInd(ind) => {
            assert_eq!(ind.lcid, 0);
            assert_eq!(ind.sdu.as_slice(), &conn_setup);
        }
        other => panic!("unexpected {}", other),
    }
    assert!(matches!(&msgs[1].msg, SapMsgInner::MacRaCompleteInd(ind) if ind.crnti == 0x4601));
}

#[test]
fn test_ul_harq_and_metrics() {
    debug::setup_logging_verbose();
    let mut cfg = default_test_config();
    cfg.mac.max_harq_tx = 2;
    let mut test = StackTest::new(cfg, CRNTI);
    test.write_sdu(3, &[0x5a; 20]);
    test.clock();

    let first = test.mac.new_grant_ul(test.grant(RntiType::CRnti, CRNTI, 5, false, 30));
    assert!(first.tx_enabled);

    // Same NDI: adaptive retransmission, nothing new read from the RLC
    let mut retx_grant = test.grant(RntiType::CRnti, CRNTI, 5, false, 30);
    retx_grant.rv = 2;
    let retx = test.mac.new_grant_ul(retx_grant);
    assert_eq!(retx.payload, first.payload);
    assert_eq!(retx.rv, 2);

    // Limit of two transmissions reached
    assert!(!test.mac.harq_recv(5, false).tx_enabled);

    let metrics = test.mac.get_metrics();
    assert_eq!(metrics.tx_pkts, 2);
    assert_eq!(metrics.tx_errors, 1);
    assert_eq!(metrics.ul_buffer, 0);
    assert_eq!(test.mac.get_metrics().tx_pkts, 0);
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_pcap_and_broadcast() {
    debug::setup_logging_verbose();
    let mut test = StackTest::new(default_test_config(), CRNTI);
    let out = SharedBuf::default();
    test.mac.start_pcap(MacPcap::new(Box::new(out.clone()), 1).unwrap());

    test.mac.bch_decoded_ok(&[0xa1, 0x5b, 0x00]);
    let si = test.grant(RntiType::SiRnti, 0xffff, 0, false, 4);
    assert!(!test.mac.new_grant_dl(si).generate_ack);
    test.mac.tb_decoded(&si, true, &[0x40, 0x4c, 0x00, 0x01]);

    let msgs = test.upper.take_msgs();
    assert!(matches!(msgs[0].msg, SapMsgInner::RlcBcchBchInd(_)));
    assert!(matches!(msgs[1].msg, SapMsgInner::RlcBcchDlschInd(_)));

    let pcap = test.mac.stop_pcap().unwrap();
    assert_eq!(pcap.nof_records(), 2);
    drop(pcap);
    let bytes = out.0.lock().unwrap();
    assert_eq!(&bytes[..4], &[0xd4, 0xc3, 0xb2, 0xa1]);
}

#[test]
fn test_reset_and_reconfigure() {
    debug::setup_logging_verbose();
    let mut cfg = default_test_config();
    cfg.mac.time_alignment_timer_ms = 100;
    let mut test = StackTest::new(cfg.clone(), CRNTI);

    let mut b = SchPduBuilder::new_dl(8);
    b.set_ta_cmd(31).unwrap();
    let dl = b.write().unwrap();
    let g = test.grant(RntiType::CRnti, CRNTI, 0, true, 8);
    test.mac.new_grant_dl(g);
    test.mac.tb_decoded(&g, true, &dl);
    assert!(test.phy.take_calls().contains(&PhyCall::Ta(31)));

    // Infinity stops the running timer
    let mut mac_cfg = cfg.mac.clone();
    mac_cfg.time_alignment_timer_ms = 0;
    test.mac.reconfigure(mac_cfg);
    test.clock_n(150);
    assert!(test.upper.take_msgs().is_empty());

    test.mac.reset();
    assert_eq!(test.mac.crnti(), 0);
    assert_eq!(test.config.state_read().crnti, 0);
    let calls = test.phy.take_calls();
    assert!(calls.contains(&PhyCall::UlSearchReset) && calls.contains(&PhyCall::DlSearchReset));
}
